//! Infrastructure layer for interlock.
//!
//! Implements the `DomainDriver` port from `interlock-core` against real
//! systems: HTTP APIs through reqwest, SQLite through sqlx, and in-process
//! custom handlers. Also loads `interlock.toml`.

pub mod config;
pub mod driver;
