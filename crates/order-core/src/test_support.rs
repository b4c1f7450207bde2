//! Fixtures shared by the engine tests.

use crate::engine::create::NewOrder;
use crate::engine::event_bus::EventBus;
use crate::engine::OrderLifecycle;
use crate::state::OrderStore;
use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use order_config::builders::config::ConfigBuilder;
use order_gateway::implementations::mock::MockGateway;
use order_gateway::GatewayService;
use order_inventory::implementations::memory::MemoryInventory;
use order_inventory::InventoryService;
use order_storage::implementations::memory::MemoryStorage;
use order_storage::{StorageError, StorageInterface, StorageService};
use order_types::{
	Actor, ConfigSchema, LineItem, Order, OrderEvent, OrderStatus, PaymentStatus, ShippingInfo,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

pub fn shipping() -> ShippingInfo {
	ShippingInfo {
		recipient_name: "Budi Santoso".to_string(),
		phone: "+628123456789".to_string(),
		address: "Jl. Merdeka 1, Bandung".to_string(),
		courier: Some("jne".to_string()),
		cost: dec!(10000),
	}
}

pub fn sample_order() -> Order {
	let created_at = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
	let line_items = vec![LineItem {
		product_id: 1,
		name: "Kopi Arabika 250g".to_string(),
		unit_price: dec!(50000),
		quantity: 2,
	}];
	Order {
		id: 1,
		order_ref: "ORD-20240101-TEST01".to_string(),
		version: 1,
		status: OrderStatus::WaitingForPayment,
		payment_status: PaymentStatus::Pending,
		line_items,
		shipping: shipping(),
		subtotal: dec!(100000),
		shipping_cost: dec!(10000),
		total_amount: dec!(110000),
		payment_method: "bank_transfer".to_string(),
		payment_deadline: created_at + Duration::days(1),
		created_at,
		status_updated_at: created_at,
		status_updated_by: Actor::System,
		paid_at: None,
		shipped_at: None,
		delivered_at: None,
		cancelled_at: None,
		cancellation_reason: None,
	}
}

/// An order request over `(product_id, quantity, unit_price)` triples.
pub fn new_order(items: &[(u64, u32, Decimal)]) -> NewOrder {
	NewOrder {
		line_items: items
			.iter()
			.map(|&(product_id, quantity, unit_price)| LineItem {
				product_id,
				name: format!("Product {}", product_id),
				unit_price,
				quantity,
			})
			.collect(),
		shipping: shipping(),
		payment_method: "bank_transfer".to_string(),
	}
}

pub fn admin() -> Actor {
	Actor::Admin("7".to_string())
}

/// Memory storage that can be told to fail writes to the order namespace.
#[derive(Default)]
pub struct FailingOrderWrites {
	inner: MemoryStorage,
	pub fail: Arc<AtomicBool>,
}

impl FailingOrderWrites {
	fn check(&self, key: &str) -> Result<(), StorageError> {
		if self.fail.load(Ordering::SeqCst) && key.starts_with("orders:") {
			return Err(StorageError::Backend("disk full".to_string()));
		}
		Ok(())
	}
}

#[async_trait]
impl StorageInterface for FailingOrderWrites {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		self.inner.get_bytes(key).await
	}

	async fn set_bytes(
		&self,
		key: &str,
		value: Vec<u8>,
		ttl: Option<std::time::Duration>,
	) -> Result<(), StorageError> {
		self.check(key)?;
		self.inner.set_bytes(key, value, ttl).await
	}

	async fn compare_and_set(
		&self,
		key: &str,
		expected: Option<&[u8]>,
		value: Vec<u8>,
		ttl: Option<std::time::Duration>,
	) -> Result<bool, StorageError> {
		self.check(key)?;
		self.inner.compare_and_set(key, expected, value, ttl).await
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		self.inner.delete(key).await
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		self.inner.exists(key).await
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		self.inner.config_schema()
	}
}

/// A lifecycle over memory backends with handles for driving it.
pub struct Harness {
	pub lifecycle: Arc<OrderLifecycle>,
	pub gateway: MockGateway,
	pub events: broadcast::Receiver<OrderEvent>,
}

impl Harness {
	pub async fn new(stock: &[(u64, u64)]) -> Self {
		Self::with_storage(Box::new(MemoryStorage::new()), stock).await
	}

	pub async fn with_storage(backend: Box<dyn StorageInterface>, stock: &[(u64, u64)]) -> Self {
		let storage = Arc::new(StorageService::new(backend));
		let store = Arc::new(OrderStore::load(storage.clone()).await.unwrap());
		let inventory = Arc::new(InventoryService::new(Box::new(MemoryInventory::new())));
		for &(product_id, quantity) in stock {
			inventory.set_stock(product_id, quantity).await.unwrap();
		}
		let gateway = MockGateway::new();
		let event_bus = EventBus::new(64);
		let events = event_bus.subscribe();

		let lifecycle = OrderLifecycle::new(
			ConfigBuilder::new().build(),
			storage,
			store,
			inventory,
			Arc::new(GatewayService::new(Box::new(gateway.clone()))),
			event_bus,
		);
		Self {
			lifecycle: Arc::new(lifecycle),
			gateway,
			events,
		}
	}

	pub async fn stock(&self, product_id: u64) -> u64 {
		self.lifecycle
			.inventory()
			.available(product_id)
			.await
			.unwrap()
			.unwrap_or(0)
	}

	/// Events published since the last call.
	pub fn drain_events(&mut self) -> Vec<OrderEvent> {
		let mut events = Vec::new();
		while let Ok(event) = self.events.try_recv() {
			events.push(event);
		}
		events
	}

	/// Creates an order for `quantity` of product 1 at 50 000.
	pub async fn place_order(&mut self, quantity: u32) -> Order {
		let created = self
			.lifecycle
			.create_order(new_order(&[(1, quantity, dec!(50000))]), None)
			.await
			.unwrap();
		self.drain_events();
		created.order
	}
}

/// Collects formatted log output for assertions.
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
	pub fn contents(&self) -> String {
		String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
	}
}

impl std::io::Write for LogBuffer {
	fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
		self.0.lock().unwrap().extend_from_slice(buf);
		Ok(buf.len())
	}

	fn flush(&mut self) -> std::io::Result<()> {
		Ok(())
	}
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogBuffer {
	type Writer = LogBuffer;

	fn make_writer(&'a self) -> Self::Writer {
		self.clone()
	}
}
