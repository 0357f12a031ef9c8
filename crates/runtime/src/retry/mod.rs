//! Retry queue for Persistent calls whose send came up short.
//!
//! The engine owns the queue. When it appends, it signals a
//! [`QueueProcessor`] with a [`RetryHandle`]; the processor decides when to
//! drain, and drains by calling [`RetryHandle::retry`], which resends queued
//! calls in order with their original ids.

mod backoff;
mod policy;

#[cfg(test)]
mod tests;

use std::collections::VecDeque;
use std::sync::{Arc, Weak};

use ddp_protocol::{MethodCall, RequestId};
use serde_json::Value;

pub use backoff::BackoffQueueProcessor;
pub use policy::RetryPolicy;

/// A Persistent call waiting to be resent.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedCall {
	/// Id allocated when the call was first issued; reused on resend.
	pub id: RequestId,
	pub method: String,
	pub params: Vec<Value>,
}

impl QueuedCall {
	pub fn new(id: RequestId, call: MethodCall) -> Self {
		Self {
			id,
			method: call.method,
			params: call.params,
		}
	}

	pub fn to_method_call(&self) -> MethodCall {
		MethodCall::new(self.method.clone(), self.params.clone())
	}
}

/// FIFO of [`QueuedCall`]s.
#[derive(Debug, Default)]
pub struct RetryQueue {
	calls: VecDeque<QueuedCall>,
}

impl RetryQueue {
	pub fn push(&mut self, call: QueuedCall) {
		self.calls.push_back(call);
	}

	pub fn front(&self) -> Option<&QueuedCall> {
		self.calls.front()
	}

	pub fn pop_front(&mut self) -> Option<QueuedCall> {
		self.calls.pop_front()
	}

	/// Drops the call with `id`, returning whether it was queued.
	pub fn remove(&mut self, id: RequestId) -> bool {
		let before = self.calls.len();
		self.calls.retain(|call| call.id != id);
		self.calls.len() != before
	}

	pub fn contains(&self, id: RequestId) -> bool {
		self.calls.iter().any(|call| call.id == id)
	}

	pub fn ids(&self) -> impl Iterator<Item = RequestId> + '_ {
		self.calls.iter().map(|call| call.id)
	}

	pub fn len(&self) -> usize {
		self.calls.len()
	}

	pub fn is_empty(&self) -> bool {
		self.calls.is_empty()
	}

	pub fn snapshot(&self) -> Vec<QueuedCall> {
		self.calls.iter().cloned().collect()
	}
}

/// Whatever owns a retry queue and can resend it.
pub(crate) trait RetryTarget: Send + Sync {
	/// Resends queued calls in order; returns how many remain queued.
	fn retry_queued(&self) -> usize;
	fn queued_len(&self) -> usize;
}

/// Weak handle to the engine's retry queue, given to [`QueueProcessor`]s.
///
/// Holding one does not keep the engine alive.
#[derive(Clone)]
pub struct RetryHandle {
	target: Weak<dyn RetryTarget>,
}

impl RetryHandle {
	pub(crate) fn new<T: RetryTarget + 'static>(target: &Arc<T>) -> Self {
		let target: Arc<dyn RetryTarget> = Arc::clone(target) as Arc<dyn RetryTarget>;
		Self {
			target: Arc::downgrade(&target),
		}
	}

	/// Resends the queue. `None` once the engine is gone.
	pub fn retry(&self) -> Option<usize> {
		self.target.upgrade().map(|target| target.retry_queued())
	}

	/// Number of queued calls; zero once the engine is gone.
	pub fn len(&self) -> usize {
		self.target
			.upgrade()
			.map_or(0, |target| target.queued_len())
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn is_alive(&self) -> bool {
		self.target.strong_count() > 0
	}
}

impl std::fmt::Debug for RetryHandle {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RetryHandle")
			.field("alive", &self.is_alive())
			.finish()
	}
}

/// Told when the retry queue needs draining.
///
/// Called outside the engine lock, possibly from inside a `call`. It must
/// return promptly; draining belongs on a task.
pub trait QueueProcessor: Send + Sync {
	fn process_queue(&self, handle: RetryHandle);
}

/// Leaves queued calls alone until someone calls
/// [`Engine::retry_queued`](crate::Engine::retry_queued).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopQueueProcessor;

impl QueueProcessor for NoopQueueProcessor {
	fn process_queue(&self, _handle: RetryHandle) {}
}
