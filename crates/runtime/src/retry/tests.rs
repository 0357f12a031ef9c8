use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::json;

use super::*;

/// Queue whose resend succeeds only after `blocked_for` retries.
struct FakeTarget {
	remaining: AtomicUsize,
	blocked_for: AtomicUsize,
	retries: AtomicUsize,
}

impl FakeTarget {
	fn new(queued: usize, blocked_for: usize) -> Arc<Self> {
		Arc::new(Self {
			remaining: AtomicUsize::new(queued),
			blocked_for: AtomicUsize::new(blocked_for),
			retries: AtomicUsize::new(0),
		})
	}
}

impl RetryTarget for FakeTarget {
	fn retry_queued(&self) -> usize {
		self.retries.fetch_add(1, Ordering::SeqCst);
		if self.blocked_for.load(Ordering::SeqCst) > 0 {
			self.blocked_for.fetch_sub(1, Ordering::SeqCst);
		} else {
			self.remaining.store(0, Ordering::SeqCst);
		}
		self.remaining.load(Ordering::SeqCst)
	}

	fn queued_len(&self) -> usize {
		self.remaining.load(Ordering::SeqCst)
	}
}

async fn wait_until(mut done: impl FnMut() -> bool) {
	for _ in 0..500 {
		if done() {
			return;
		}
		tokio::time::sleep(Duration::from_millis(2)).await;
	}
	panic!("condition not reached");
}

#[test]
fn queue_is_fifo() {
	let mut queue = RetryQueue::default();
	queue.push(QueuedCall::new(
		RequestId::new(3),
		MethodCall::new("a", vec![json!(1)]),
	));
	queue.push(QueuedCall::new(RequestId::new(5), MethodCall::new("b", vec![])));

	assert_eq!(queue.len(), 2);
	assert!(queue.contains(RequestId::new(5)));
	assert!(!queue.contains(RequestId::new(4)));
	assert_eq!(
		queue.ids().collect::<Vec<_>>(),
		vec![RequestId::new(3), RequestId::new(5)]
	);

	let first = queue.pop_front().unwrap();
	assert_eq!(first.method, "a");
	assert_eq!(first.to_method_call().params, vec![json!(1)]);
	assert_eq!(queue.front().map(|c| c.id), Some(RequestId::new(5)));
}

#[test]
fn handle_reports_target_state() {
	let target = FakeTarget::new(2, 0);
	let handle = RetryHandle::new(&target);
	assert!(handle.is_alive());
	assert_eq!(handle.len(), 2);
	assert_eq!(handle.retry(), Some(0));
	assert!(handle.is_empty());
}

#[test]
fn handle_does_not_keep_target_alive() {
	let target = FakeTarget::new(1, 0);
	let handle = RetryHandle::new(&target);
	drop(target);
	assert!(!handle.is_alive());
	assert_eq!(handle.retry(), None);
	assert_eq!(handle.len(), 0);
}

#[test]
fn policy_starts_with_base_delay() {
	let policy = RetryPolicy::new(250, 8_000);
	assert_eq!(policy.delay_for_attempt(0, None), Duration::from_millis(250));
}

#[test]
fn policy_scales_exponentially() {
	let policy = RetryPolicy::new(100, 10_000);
	assert_eq!(policy.delay_for_attempt(3, None), Duration::from_millis(800));
}

#[test]
fn policy_caps_at_max() {
	let policy = RetryPolicy::new(1_000, 4_000);
	assert_eq!(policy.delay_for_attempt(5, None), Duration::from_millis(4_000));
	assert_eq!(policy.delay_for_attempt(u32::MAX, None), Duration::from_millis(4_000));
}

#[test]
fn policy_honors_larger_hint() {
	let policy = RetryPolicy::new(500, 20_000);
	assert_eq!(
		policy.delay_for_attempt(1, Some(10_000)),
		Duration::from_millis(10_000)
	);
}

#[test]
fn backoff_without_runtime_stays_idle() {
	let processor = BackoffQueueProcessor::default();
	let target = FakeTarget::new(1, 0);
	processor.process_queue(RetryHandle::new(&target));
	assert!(!processor.is_running());
	assert_eq!(target.retries.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn backoff_drains_once_target_accepts() {
	let processor = BackoffQueueProcessor::new(RetryPolicy::new(1, 4));
	let target = FakeTarget::new(3, 2);
	processor.process_queue(RetryHandle::new(&target));
	assert!(processor.is_running());

	wait_until(|| !processor.is_running()).await;
	assert_eq!(target.queued_len(), 0);
	assert_eq!(target.retries.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn backoff_absorbs_signals_while_running() {
	let processor = BackoffQueueProcessor::new(RetryPolicy::new(5, 5));
	let target = FakeTarget::new(1, 0);
	processor.process_queue(RetryHandle::new(&target));
	processor.process_queue(RetryHandle::new(&target));

	wait_until(|| !processor.is_running()).await;
	assert_eq!(target.retries.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn backoff_gives_up_after_max_attempts() {
	let processor = BackoffQueueProcessor::new(RetryPolicy::new(1, 1)).with_max_attempts(2);
	let target = FakeTarget::new(1, 100);
	processor.process_queue(RetryHandle::new(&target));

	wait_until(|| !processor.is_running()).await;
	assert_eq!(target.retries.load(Ordering::SeqCst), 2);
	assert_eq!(target.queued_len(), 1);

	// A later signal starts a fresh drain.
	processor.process_queue(RetryHandle::new(&target));
	wait_until(|| !processor.is_running()).await;
	assert_eq!(target.retries.load(Ordering::SeqCst), 4);
}
