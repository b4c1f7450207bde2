//! HTTP server for the order engine API.
//!
//! Exposes order creation, reads, administrative status updates and the
//! payment gateway webhook under `/api`.

use crate::apis;
use axum::{
	response::{IntoResponse, Json},
	routing::{get, post},
	Router,
};
use order_config::ApiConfig;
use order_core::OrderLifecycle;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
	cors::CorsLayer, limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer,
};

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	/// Reference to the lifecycle engine for processing requests.
	pub lifecycle: Arc<OrderLifecycle>,
}

/// Builds the API router with its middleware stack.
pub fn router(state: AppState, api_config: &ApiConfig) -> Router {
	Router::new()
		.route("/health", get(handle_health))
		.nest(
			"/api",
			Router::new()
				.route("/orders", post(apis::order::create_order))
				.route("/orders/{ref}", get(apis::order::get_order))
				.route("/orders/{ref}/status", post(apis::order::update_status))
				.route(
					"/orders/{ref}/payment-status",
					post(apis::order::update_payment_status),
				)
				.route("/orders/{ref}/sync", post(apis::order::sync_payment_status))
				.route(
					"/orders/{ref}/payment-events",
					get(apis::order::payment_events),
				)
				.route(
					"/webhooks/payment",
					post(apis::webhook::handle_payment_notification),
				),
		)
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(CorsLayer::permissive())
				.layer(TimeoutLayer::new(Duration::from_secs(
					api_config.timeout_seconds,
				)))
				.map_response(IntoResponse::into_response)
				.layer(RequestBodyLimitLayer::new(api_config.max_request_size)),
		)
		.with_state(state)
}

/// Starts the HTTP server for the API.
pub async fn start_server(
	api_config: ApiConfig,
	lifecycle: Arc<OrderLifecycle>,
) -> Result<(), Box<dyn std::error::Error>> {
	let app = router(AppState { lifecycle }, &api_config);

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Order API server starting on {}", bind_address);

	axum::serve(listener, app).await?;

	Ok(())
}

/// Handles GET /health.
async fn handle_health() -> Json<Value> {
	Json(json!({ "status": "ok" }))
}
