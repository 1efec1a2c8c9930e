//! Shared domain types for interlock.
//!
//! This crate contains the data model consumed by every other crate in the
//! workspace: workflow and step definitions, the per-domain action, validation
//! and outcome payloads, run results, run events, and runner configuration.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono.

pub mod config;
pub mod domain;
pub mod event;
pub mod result;
pub mod workflow;
