//! Domain driver abstractions.
//!
//! - `DomainDriver`: RPITIT trait implemented by concrete drivers
//! - `BoxDomainDriver`: object-safe wrapper for dynamic dispatch
//! - `DriverRegistry`: domain-indexed lookup used by the dispatcher
//!
//! Concrete drivers (HTTP, SQLite, custom handlers) live in interlock-infra.

pub mod box_driver;
pub mod domain_driver;
pub mod registry;

pub use box_driver::BoxDomainDriver;
pub use domain_driver::{DomainDriver, DriverError};
pub use registry::DriverRegistry;
