//! Storage-related types for the order engine.

use std::str::FromStr;

/// Storage namespaces for the different data collections.
///
/// This enum provides type safety for storage operations by replacing
/// string literals with strongly typed variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	/// Order records, keyed by order reference.
	Orders,
	/// Claimed order references, mapping reference to internal id.
	OrderRefs,
	/// Payment audit trail, keyed by order reference.
	PaymentEvents,
	/// Short-lived idempotency reservations for order creation.
	Idempotency,
	/// Engine counters such as the last allocated order id.
	Counters,
}

impl StorageKey {
	/// Returns the string representation of the storage key.
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::Orders => "orders",
			StorageKey::OrderRefs => "order_refs",
			StorageKey::PaymentEvents => "payment_events",
			StorageKey::Idempotency => "idempotency",
			StorageKey::Counters => "counters",
		}
	}

	/// Returns an iterator over all StorageKey variants.
	pub fn all() -> impl Iterator<Item = Self> {
		[
			Self::Orders,
			Self::OrderRefs,
			Self::PaymentEvents,
			Self::Idempotency,
			Self::Counters,
		]
		.into_iter()
	}
}

impl FromStr for StorageKey {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::all().find(|key| key.as_str() == s).ok_or(())
	}
}

impl From<StorageKey> for &'static str {
	fn from(key: StorageKey) -> Self {
		key.as_str()
	}
}
