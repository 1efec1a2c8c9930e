//! BoxDomainDriver -- object-safe dynamic dispatch wrapper for DomainDriver.
//!
//! 1. `DomainDriverDyn` is an object-safe mirror of `DomainDriver` with boxed futures
//! 2. Every `T: DomainDriver` gets `DomainDriverDyn` through a blanket impl
//! 3. `BoxDomainDriver` wraps `Box<dyn DomainDriverDyn>` and delegates

use std::future::Future;
use std::pin::Pin;

use interlock_types::domain::{Domain, RawOutcome, StepAction, Validation};
use interlock_types::result::ValidationResult;

use super::domain_driver::{DomainDriver, DriverError};

/// Object-safe version of [`DomainDriver`] with boxed futures.
pub trait DomainDriverDyn: Send + Sync {
    fn domain(&self) -> Domain;

    fn execute_boxed<'a>(
        &'a self,
        action: &'a StepAction,
    ) -> Pin<Box<dyn Future<Output = Result<RawOutcome, DriverError>> + Send + 'a>>;

    fn validate(&self, outcome: &RawOutcome, validation: &Validation) -> ValidationResult;
}

impl<T: DomainDriver> DomainDriverDyn for T {
    fn domain(&self) -> Domain {
        DomainDriver::domain(self)
    }

    fn execute_boxed<'a>(
        &'a self,
        action: &'a StepAction,
    ) -> Pin<Box<dyn Future<Output = Result<RawOutcome, DriverError>> + Send + 'a>> {
        Box::pin(self.execute(action))
    }

    fn validate(&self, outcome: &RawOutcome, validation: &Validation) -> ValidationResult {
        DomainDriver::validate(self, outcome, validation)
    }
}

/// Type-erased domain driver.
pub struct BoxDomainDriver {
    inner: Box<dyn DomainDriverDyn + Send + Sync>,
}

impl BoxDomainDriver {
    pub fn new<T: DomainDriver + 'static>(driver: T) -> Self {
        Self {
            inner: Box::new(driver),
        }
    }

    pub fn domain(&self) -> Domain {
        self.inner.domain()
    }

    pub async fn execute(&self, action: &StepAction) -> Result<RawOutcome, DriverError> {
        self.inner.execute_boxed(action).await
    }

    pub fn validate(&self, outcome: &RawOutcome, validation: &Validation) -> ValidationResult {
        self.inner.validate(outcome, validation)
    }
}

impl std::fmt::Debug for BoxDomainDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxDomainDriver")
            .field("domain", &self.domain())
            .finish()
    }
}
