//! Server module for building the ledger's HTTP server
//!
//! [`ServerBuilder`] wires a storage backend, the ledger settings and an
//! optional event bus into an axum router with request tracing.

pub mod builder;
pub mod router;

pub use builder::ServerBuilder;
pub use router::build_ledger_routes;
