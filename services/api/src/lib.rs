//! services/api/src/lib.rs
//!
//! The HTTP service for Santri Online: SQLite adapter, configuration, and the
//! axum router. The `api` binary wires these together.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
