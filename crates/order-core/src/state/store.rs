//! Typed access to the storage namespaces the engine owns.

use order_storage::{Snapshot, StorageError, StorageService};
use order_types::{Order, StorageKey, WebhookEvent};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

const ORDER_ID_COUNTER: &str = "order_id";

/// Bound on optimistic retries when appending to an audit trail.
const APPEND_ATTEMPTS: u32 = 8;

/// Order persistence on top of [`StorageService`].
///
/// Orders are keyed by their reference. The reference index maps each
/// claimed reference to the numeric id it was issued for; claiming is an
/// atomic insert-if-absent, which is the durable uniqueness guarantee for
/// references.
pub struct OrderStore {
	storage: Arc<StorageService>,
	/// Highest id handed out so far.
	last_id: AtomicU64,
	/// Serializes persisting the id high-water mark.
	counter_lock: Mutex<()>,
}

fn missing_as_none<T>(result: Result<T, StorageError>) -> Result<Option<T>, StorageError> {
	match result {
		Ok(value) => Ok(Some(value)),
		Err(StorageError::NotFound) => Ok(None),
		Err(e) => Err(e),
	}
}

impl OrderStore {
	/// Opens the store, resuming the id counter from storage.
	pub async fn load(storage: Arc<StorageService>) -> Result<Self, StorageError> {
		let last_id: u64 = missing_as_none(
			storage
				.retrieve(StorageKey::Counters.as_str(), ORDER_ID_COUNTER)
				.await,
		)?
		.unwrap_or(0);

		tracing::debug!(last_id, "Order id counter loaded");
		Ok(Self {
			storage,
			last_id: AtomicU64::new(last_id),
			counter_lock: Mutex::new(()),
		})
	}

	/// Allocates the next order id and persists the new high-water mark.
	pub async fn allocate_id(&self) -> Result<u64, StorageError> {
		let id = self.last_id.fetch_add(1, Ordering::SeqCst) + 1;

		let _guard = self.counter_lock.lock().await;
		// Persist the current maximum, not `id`, so a slower writer never
		// moves the stored mark backwards.
		let high_water = self.last_id.load(Ordering::SeqCst);
		self.storage
			.store(StorageKey::Counters.as_str(), ORDER_ID_COUNTER, &high_water)
			.await?;
		Ok(id)
	}

	/// Claims an order reference for `id`. Returns false if already taken.
	pub async fn claim_ref(&self, order_ref: &str, id: u64) -> Result<bool, StorageError> {
		self.storage
			.insert_if_absent(StorageKey::OrderRefs.as_str(), order_ref, &id, None)
			.await
	}

	pub async fn release_ref(&self, order_ref: &str) -> Result<(), StorageError> {
		self.storage
			.remove(StorageKey::OrderRefs.as_str(), order_ref)
			.await
	}

	/// Persists a new order. Returns false if one already exists under its reference.
	pub async fn insert(&self, order: &Order) -> Result<bool, StorageError> {
		self.storage
			.insert_if_absent(StorageKey::Orders.as_str(), &order.order_ref, order, None)
			.await
	}

	pub async fn get(&self, order_ref: &str) -> Result<Option<Snapshot<Order>>, StorageError> {
		missing_as_none(
			self.storage
				.retrieve_snapshot(StorageKey::Orders.as_str(), order_ref)
				.await,
		)
	}

	/// Writes `next` only if the stored order is still the one in `current`.
	///
	/// Returns false on a lost race; the caller re-reads and retries.
	pub async fn update_if_version(
		&self,
		current: &Snapshot<Order>,
		next: &Order,
	) -> Result<bool, StorageError> {
		debug_assert_eq!(next.version, current.value.version + 1);
		self.storage
			.compare_and_swap(
				StorageKey::Orders.as_str(),
				&current.value.order_ref,
				&current.raw,
				next,
			)
			.await
	}

	/// Appends to an order's payment audit trail. Returns the new trail length.
	pub async fn append_event(
		&self,
		order_ref: &str,
		event: &WebhookEvent,
	) -> Result<usize, StorageError> {
		let namespace = StorageKey::PaymentEvents.as_str();

		for _ in 0..APPEND_ATTEMPTS {
			let current: Option<Snapshot<Vec<WebhookEvent>>> =
				missing_as_none(self.storage.retrieve_snapshot(namespace, order_ref).await)?;

			let written = match current {
				None => {
					self.storage
						.insert_if_absent(namespace, order_ref, &[event], None)
						.await?
				},
				Some(snapshot) => {
					let mut trail = snapshot.value;
					trail.push(event.clone());
					if self
						.storage
						.compare_and_swap(namespace, order_ref, &snapshot.raw, &trail)
						.await?
					{
						return Ok(trail.len());
					}
					false
				},
			};
			if written {
				return Ok(1);
			}
		}

		Err(StorageError::Backend(format!(
			"audit trail for {} kept changing during append",
			order_ref
		)))
	}

	/// The payment audit trail in arrival order.
	pub async fn events(&self, order_ref: &str) -> Result<Vec<WebhookEvent>, StorageError> {
		Ok(missing_as_none(
			self.storage
				.retrieve(StorageKey::PaymentEvents.as_str(), order_ref)
				.await,
		)?
		.unwrap_or_default())
	}

	/// The order reference recorded for an idempotency key, if still live.
	pub async fn idempotent_ref(&self, key: &str) -> Result<Option<String>, StorageError> {
		missing_as_none(
			self.storage
				.retrieve(StorageKey::Idempotency.as_str(), key)
				.await,
		)
	}

	pub async fn remember_idempotent_ref(
		&self,
		key: &str,
		order_ref: &str,
		window: Duration,
	) -> Result<(), StorageError> {
		self.storage
			.store_with_ttl(
				StorageKey::Idempotency.as_str(),
				key,
				&order_ref,
				Some(window),
			)
			.await
	}
}
