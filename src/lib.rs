//! Dokploy resource lifecycle adapter.
//!
//! Reconciles declared databases and application environment blocks against
//! a Dokploy server, one pass at a time, on behalf of an external lifecycle
//! runner.

pub mod api;
pub mod config;
pub mod envfile;
pub mod provider;
pub mod resources;
