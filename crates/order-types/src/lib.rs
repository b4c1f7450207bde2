//! Common types module for the order lifecycle engine.
//!
//! This module defines the core data types shared by every crate in the
//! workspace: the status model and its transition tables, the order record,
//! payment-gateway payloads, domain events and the HTTP API surface.

/// API types for HTTP endpoints and request/response structures.
pub mod api;
/// Domain events emitted when an order changes.
pub mod events;
/// Payment-gateway notification payloads and the payment audit trail.
pub mod gateway;
/// The order record, its line items and transition results.
pub mod order;
/// Registry trait for self-registering backend implementations.
pub mod registry;
/// Order and payment status enums with their legal-transition tables.
pub mod status;
/// Storage namespaces.
pub mod storage;
/// Configuration validation types for backend configuration tables.
pub mod validation;

pub use api::*;
pub use events::*;
pub use gateway::*;
pub use order::*;
pub use registry::ImplementationRegistry;
pub use status::*;
pub use storage::*;
pub use validation::*;
