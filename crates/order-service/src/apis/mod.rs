//! HTTP API handlers.

pub mod order;
pub mod webhook;

use order_core::LifecycleError;
use order_types::APIError;

/// Maps an engine error onto the HTTP error taxonomy.
pub fn api_error(err: LifecycleError) -> APIError {
	let message = err.to_string();
	match err {
		LifecycleError::NotFound(_) => APIError::NotFound { message },
		LifecycleError::InvalidTransition { from, to } => APIError::Conflict {
			error_type: "INVALID_TRANSITION".to_string(),
			message,
			details: Some(serde_json::json!({ "from": from, "to": to })),
		},
		LifecycleError::PaymentRequired { .. } => APIError::PaymentRequired { message },
		LifecycleError::InsufficientStock { items } => APIError::Conflict {
			error_type: "INSUFFICIENT_STOCK".to_string(),
			message,
			details: serde_json::to_value(&items).ok(),
		},
		LifecycleError::ConcurrentModification(_) => APIError::ServiceUnavailable {
			error_type: "CONCURRENT_MODIFICATION".to_string(),
			message,
			retry_after: Some(1),
		},
		LifecycleError::Validation(_) => APIError::BadRequest {
			error_type: "VALIDATION_ERROR".to_string(),
			message,
			details: None,
		},
		LifecycleError::Gateway(_) => APIError::InternalServerError {
			error_type: "GATEWAY_ERROR".to_string(),
			message,
		},
		LifecycleError::Storage(_) | LifecycleError::Inventory(_) => {
			APIError::InternalServerError {
				error_type: "INTERNAL_ERROR".to_string(),
				message,
			}
		},
	}
}
