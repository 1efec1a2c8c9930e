//! DomainDriver trait definition.
//!
//! A driver executes actions against one subsystem (UI, API, database,
//! custom) and reports what it observed as a `RawOutcome`. Validation is
//! pure and defaults to the core evaluator for the domain.

use interlock_types::domain::{Domain, RawOutcome, StepAction, Validation};
use interlock_types::result::ValidationResult;

use crate::workflow::evaluator;

/// Errors a driver can report from `execute`.
///
/// Any driver error makes the dispatcher retry (within the step's retry
/// budget); validation mismatches are not driver errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DriverError {
    #[error("{domain} driver cannot execute a {actual} action")]
    WrongDomain { domain: Domain, actual: Domain },

    #[error("invalid action: {0}")]
    InvalidAction(String),

    #[error("connection '{0}' is not configured")]
    UnknownConnection(String),

    #[error("handler '{0}' is not registered")]
    UnknownHandler(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("handler failed: {0}")]
    Handler(String),
}

/// Trait for per-domain execution backends.
///
/// Uses native async fn in traits (RPITIT). Wrap implementations in
/// [`BoxDomainDriver`](super::BoxDomainDriver) to register them.
pub trait DomainDriver: Send + Sync {
    /// The domain this driver serves.
    fn domain(&self) -> Domain;

    /// Execute an already-interpolated action.
    fn execute(
        &self,
        action: &StepAction,
    ) -> impl std::future::Future<Output = Result<RawOutcome, DriverError>> + Send;

    /// Check an outcome against a validation.
    fn validate(&self, outcome: &RawOutcome, validation: &Validation) -> ValidationResult {
        evaluator::validate(outcome, validation)
    }
}
