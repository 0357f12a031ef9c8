use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use super::{QueueProcessor, RetryHandle, RetryPolicy};

/// Default number of drain attempts before giving up on a signal.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 8;

/// Drains the retry queue on a Tokio task with exponential backoff.
///
/// At most one drain task runs at a time; signals arriving while it runs are
/// absorbed by it. The task stops when the queue is empty, the engine is
/// dropped, or `max_attempts` drains left calls behind. The next signal
/// starts over.
#[derive(Debug)]
pub struct BackoffQueueProcessor {
	policy: RetryPolicy,
	max_attempts: u32,
	running: Arc<AtomicBool>,
}

impl Default for BackoffQueueProcessor {
	fn default() -> Self {
		Self::new(RetryPolicy::default())
	}
}

impl BackoffQueueProcessor {
	pub fn new(policy: RetryPolicy) -> Self {
		Self {
			policy,
			max_attempts: DEFAULT_MAX_ATTEMPTS,
			running: Arc::new(AtomicBool::new(false)),
		}
	}

	pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
		self.max_attempts = max_attempts.max(1);
		self
	}

	pub fn policy(&self) -> RetryPolicy {
		self.policy
	}

	/// Whether a drain task is currently scheduled.
	pub fn is_running(&self) -> bool {
		self.running.load(Ordering::Acquire)
	}
}

impl QueueProcessor for BackoffQueueProcessor {
	fn process_queue(&self, handle: RetryHandle) {
		if self
			.running
			.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
			.is_err()
		{
			debug!("retry drain already scheduled");
			return;
		}

		let runtime = match tokio::runtime::Handle::try_current() {
			Ok(runtime) => runtime,
			Err(e) => {
				warn!(error = %e, "no Tokio runtime; queued calls wait for a manual retry");
				self.running.store(false, Ordering::Release);
				return;
			}
		};

		let policy = self.policy;
		let max_attempts = self.max_attempts;
		let running = Arc::clone(&self.running);
		runtime.spawn(async move {
			drain(handle, policy, max_attempts).await;
			running.store(false, Ordering::Release);
		});
	}
}

async fn drain(handle: RetryHandle, policy: RetryPolicy, max_attempts: u32) {
	for attempt in 0..max_attempts {
		tokio::time::sleep(policy.delay_for_attempt(attempt, None)).await;
		match handle.retry() {
			None => {
				debug!("engine dropped; abandoning retry drain");
				return;
			}
			Some(0) => {
				info!(attempt, "retry queue drained");
				return;
			}
			Some(remaining) => debug!(attempt, remaining, "retry queue still blocked"),
		}
	}
	warn!(
		max_attempts,
		remaining = handle.len(),
		"giving up on retry queue until the next signal"
	);
}
