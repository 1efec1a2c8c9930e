//! Orchestration engine for interlock.
//!
//! Defines the `DomainDriver` port that interlock-infra implements, and the
//! workflow machinery that drives it: interpolation, dispatch, validation,
//! output binding, and compensation. Depends only on `interlock-types`,
//! never on concrete HTTP or database crates.

pub mod driver;
pub mod event;
pub mod workflow;
