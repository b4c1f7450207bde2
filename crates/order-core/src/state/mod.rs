//! Persistent order state and per-order serialization.
//!
//! [`OrderStore`] maps orders, reference claims, audit trails and
//! idempotency records onto the storage namespaces. [`KeyedLocks`] provides
//! the per-order critical section every read-validate-write runs in.

pub mod locks;
pub mod store;

pub use locks::{KeyedLocks, LockTimeout};
pub use store::OrderStore;
