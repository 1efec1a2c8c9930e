//! Concrete `DomainDriver` implementations.
//!
//! - `http`: reqwest-backed API driver
//! - `sqlite`: sqlx-backed database driver with named pools
//! - `custom`: in-process named handlers
//!
//! No UI driver ships here; register one with `DriverRegistry::register`.

pub mod custom;
pub mod http;
pub mod sqlite;

pub use custom::CustomDriver;
pub use http::HttpApiDriver;
pub use sqlite::SqliteDatabaseDriver;

use interlock_core::driver::DriverRegistry;
use interlock_types::config::RunnerConfig;

#[derive(Debug, thiserror::Error)]
pub enum DriverSetupError {
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to open database connection: {0}")]
    Database(#[from] sqlx::Error),
}

/// A registry with the bundled drivers configured from `config`.
///
/// The database driver is only registered when at least one connection is
/// configured, so workflows using that domain fail preflight instead of
/// failing at their first query.
pub async fn build_registry(config: &RunnerConfig) -> Result<DriverRegistry, DriverSetupError> {
    let mut registry = DriverRegistry::new()
        .with(HttpApiDriver::new(&config.api)?)
        .with(CustomDriver::new());

    if !config.database.connections.is_empty() {
        registry.register(SqliteDatabaseDriver::connect(&config.database).await?);
    }

    tracing::debug!(domains = ?registry.domains(), "driver registry built");
    Ok(registry)
}
