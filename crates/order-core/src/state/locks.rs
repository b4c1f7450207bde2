//! Per-key async mutexes with bounded waiting.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// The lock stayed contended for every attempt.
#[derive(Debug, Error)]
#[error("Timed out waiting for lock on {key} after {attempts} attempt(s)")]
pub struct LockTimeout {
	pub key: String,
	pub attempts: u32,
}

/// Hands out one mutex per key, created on first use.
///
/// Waiting is bounded: each attempt waits at most `timeout`, and after
/// `attempts` failed attempts [`acquire`](Self::acquire) gives up.
pub struct KeyedLocks {
	locks: DashMap<String, Arc<Mutex<()>>>,
	timeout: Duration,
	attempts: u32,
}

impl KeyedLocks {
	pub fn new(timeout: Duration, attempts: u32) -> Self {
		Self {
			locks: DashMap::new(),
			timeout,
			attempts: attempts.max(1),
		}
	}

	pub async fn acquire(&self, key: &str) -> Result<OwnedMutexGuard<()>, LockTimeout> {
		let lock = self
			.locks
			.entry(key.to_string())
			.or_insert_with(|| Arc::new(Mutex::new(())))
			.clone();

		for attempt in 1..=self.attempts {
			match tokio::time::timeout(self.timeout, lock.clone().lock_owned()).await {
				Ok(guard) => return Ok(guard),
				Err(_) => {
					tracing::debug!(key = %key, attempt, "Lock wait timed out");
				},
			}
		}
		Err(LockTimeout {
			key: key.to_string(),
			attempts: self.attempts,
		})
	}

	/// Drops mutexes nobody holds or waits on. Returns how many were removed.
	pub fn prune(&self) -> usize {
		let before = self.locks.len();
		self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
		before.saturating_sub(self.locks.len())
	}

	pub fn len(&self) -> usize {
		self.locks.len()
	}

	pub fn is_empty(&self) -> bool {
		self.locks.is_empty()
	}
}
