//! Driver registry for runtime lookup by domain.

use std::collections::HashMap;

use interlock_types::domain::Domain;

use super::box_driver::BoxDomainDriver;
use super::domain_driver::DomainDriver;

/// Registry of domain drivers, at most one per domain.
#[derive(Debug, Default)]
pub struct DriverRegistry {
    drivers: HashMap<Domain, BoxDomainDriver>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a driver under its own domain, replacing any previous one.
    pub fn register<T: DomainDriver + 'static>(&mut self, driver: T) {
        self.register_boxed(BoxDomainDriver::new(driver));
    }

    pub fn register_boxed(&mut self, driver: BoxDomainDriver) {
        let domain = driver.domain();
        if self.drivers.insert(domain, driver).is_some() {
            tracing::debug!(%domain, "replaced registered driver");
        }
    }

    /// Builder-style [`register`](Self::register).
    pub fn with<T: DomainDriver + 'static>(mut self, driver: T) -> Self {
        self.register(driver);
        self
    }

    pub fn get(&self, domain: Domain) -> Option<&BoxDomainDriver> {
        self.drivers.get(&domain)
    }

    pub fn contains(&self, domain: Domain) -> bool {
        self.drivers.contains_key(&domain)
    }

    /// Registered domains, sorted.
    pub fn domains(&self) -> Vec<Domain> {
        let mut domains: Vec<Domain> = self.drivers.keys().copied().collect();
        domains.sort();
        domains
    }
}
