//! API types for the order engine HTTP API.
//!
//! Request bodies, acknowledgement bodies and the structured error type
//! returned by every endpoint.

use crate::order::{LineItem, ShippingInfo, TransitionResult};
use crate::status::{OrderStatus, PaymentStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

/// A line item as submitted by the customer-facing checkout.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LineItemRequest {
	pub product_id: u64,
	#[validate(length(min = 1, max = 255))]
	pub name: String,
	pub unit_price: Decimal,
	#[validate(range(min = 1))]
	pub quantity: u32,
}

impl From<LineItemRequest> for LineItem {
	fn from(req: LineItemRequest) -> Self {
		LineItem {
			product_id: req.product_id,
			name: req.name,
			unit_price: req.unit_price,
			quantity: req.quantity,
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ShippingRequest {
	#[validate(length(min = 1, max = 255))]
	pub recipient_name: String,
	#[validate(length(min = 3, max = 32))]
	pub phone: String,
	#[validate(length(min = 1, max = 1024))]
	pub address: String,
	#[serde(default)]
	pub courier: Option<String>,
	pub cost: Decimal,
}

impl From<ShippingRequest> for ShippingInfo {
	fn from(req: ShippingRequest) -> Self {
		ShippingInfo {
			recipient_name: req.recipient_name,
			phone: req.phone,
			address: req.address,
			courier: req.courier,
			cost: req.cost,
		}
	}
}

/// Request body for `POST /api/orders`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
	#[validate(length(min = 1), nested)]
	pub line_items: Vec<LineItemRequest>,
	#[validate(nested)]
	pub shipping: ShippingRequest,
	#[validate(length(min = 1, max = 64))]
	pub payment_method: String,
}

/// Request body for `POST /api/orders/{ref}/status`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
	pub status: OrderStatus,
	/// Administrator identifier; recorded as `admin:<id>`.
	#[serde(default)]
	#[validate(length(min = 1, max = 64))]
	pub admin_id: Option<String>,
	#[serde(default)]
	#[validate(length(max = 1000))]
	pub notes: Option<String>,
	/// When false, the change is applied without publishing events.
	#[serde(default)]
	pub notify: Option<bool>,
}

/// Request body for `POST /api/orders/{ref}/payment-status`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePaymentStatusRequest {
	pub payment_status: PaymentStatus,
	#[serde(default)]
	#[validate(length(min = 1, max = 64))]
	pub admin_id: Option<String>,
}

/// Acknowledgement returned to the payment gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAck {
	pub order_ref: String,
	/// True once the event is in the audit trail.
	pub recorded: bool,
	pub mapped_status: Option<PaymentStatus>,
	pub transition: Option<TransitionResult>,
}

/// API error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Error type/code
	pub error: String,
	/// Human-readable description
	pub message: String,
	/// Additional error context
	pub details: Option<serde_json::Value>,
	/// Suggested retry delay in seconds
	#[serde(rename = "retryAfter")]
	pub retry_after: Option<u64>,
}

/// Structured API error type with appropriate HTTP status mapping.
#[derive(Debug)]
pub enum APIError {
	/// Malformed or invalid request (400)
	BadRequest {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// Order status advance blocked until the order is paid (402)
	PaymentRequired { message: String },
	/// Unknown order reference (404)
	NotFound { message: String },
	/// Request conflicts with the order's current state (409)
	Conflict {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// Transient failure, safe to retry (503)
	ServiceUnavailable {
		error_type: String,
		message: String,
		retry_after: Option<u64>,
	},
	/// Internal server error (500)
	InternalServerError { error_type: String, message: String },
}

impl APIError {
	/// Get the HTTP status code for this error.
	pub fn status_code(&self) -> u16 {
		match self {
			APIError::BadRequest { .. } => 400,
			APIError::PaymentRequired { .. } => 402,
			APIError::NotFound { .. } => 404,
			APIError::Conflict { .. } => 409,
			APIError::ServiceUnavailable { .. } => 503,
			APIError::InternalServerError { .. } => 500,
		}
	}

	/// Convert to ErrorResponse for JSON serialization.
	pub fn to_error_response(&self) -> ErrorResponse {
		let (error, message, details, retry_after) = match self {
			APIError::BadRequest {
				error_type,
				message,
				details,
			}
			| APIError::Conflict {
				error_type,
				message,
				details,
			} => (error_type.as_str(), message, details.clone(), None),
			APIError::PaymentRequired { message } => ("PAYMENT_REQUIRED", message, None, None),
			APIError::NotFound { message } => ("ORDER_NOT_FOUND", message, None, None),
			APIError::ServiceUnavailable {
				error_type,
				message,
				retry_after,
			} => (error_type.as_str(), message, None, *retry_after),
			APIError::InternalServerError {
				error_type,
				message,
			} => (error_type.as_str(), message, None, None),
		};
		ErrorResponse {
			error: error.to_string(),
			message: message.clone(),
			details,
			retry_after,
		}
	}
}

impl fmt::Display for APIError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			APIError::BadRequest { message, .. } => write!(f, "Bad Request: {}", message),
			APIError::PaymentRequired { message } => write!(f, "Payment Required: {}", message),
			APIError::NotFound { message } => write!(f, "Not Found: {}", message),
			APIError::Conflict { message, .. } => write!(f, "Conflict: {}", message),
			APIError::ServiceUnavailable { message, .. } => {
				write!(f, "Service Unavailable: {}", message)
			},
			APIError::InternalServerError { message, .. } => {
				write!(f, "Internal Server Error: {}", message)
			},
		}
	}
}

impl std::error::Error for APIError {}

impl From<validator::ValidationErrors> for APIError {
	fn from(errors: validator::ValidationErrors) -> Self {
		APIError::BadRequest {
			error_type: "VALIDATION_ERROR".to_string(),
			message: "Request validation failed".to_string(),
			details: serde_json::to_value(&errors).ok(),
		}
	}
}

impl axum::response::IntoResponse for APIError {
	fn into_response(self) -> axum::response::Response {
		use axum::{http::StatusCode, response::Json};

		let status =
			StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
		(status, Json(self.to_error_response())).into_response()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rust_decimal_macros::dec;

	fn request() -> CreateOrderRequest {
		CreateOrderRequest {
			line_items: vec![LineItemRequest {
				product_id: 1,
				name: "Kopi".into(),
				unit_price: dec!(50000),
				quantity: 2,
			}],
			shipping: ShippingRequest {
				recipient_name: "Sari".into(),
				phone: "0812000".into(),
				address: "Jl. Merdeka 1".into(),
				courier: None,
				cost: dec!(10000),
			},
			payment_method: "bank_transfer".into(),
		}
	}

	#[test]
	fn test_create_order_request_validation() {
		assert!(request().validate().is_ok());

		let mut empty = request();
		empty.line_items.clear();
		assert!(empty.validate().is_err());

		let mut zero_qty = request();
		zero_qty.line_items[0].quantity = 0;
		assert!(zero_qty.validate().is_err());
	}

	#[test]
	fn test_error_status_codes() {
		let err = APIError::PaymentRequired {
			message: "unpaid".into(),
		};
		assert_eq!(err.status_code(), 402);
		assert_eq!(err.to_error_response().error, "PAYMENT_REQUIRED");

		let err = APIError::ServiceUnavailable {
			error_type: "CONCURRENT_MODIFICATION".into(),
			message: "busy".into(),
			retry_after: Some(1),
		};
		assert_eq!(err.status_code(), 503);
		assert_eq!(err.to_error_response().retry_after, Some(1));
	}
}
