//! Correlation table: request ids to pending completions.

use std::collections::HashMap;

use ddp_protocol::RequestId;
use tracing::warn;

use crate::completion::Completion;

/// Whether a call is worth resending after a failed write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MessageKind {
	/// Lost if the write fails.
	#[default]
	Volatile,
	/// Queued for retry if the write fails.
	Persistent,
}

#[derive(Debug)]
pub(crate) struct PendingCall {
	pub id: RequestId,
	pub completion: Completion,
	pub kind: MessageKind,
}

/// Allocates ids and holds one completion per outstanding call.
#[derive(Debug)]
pub(crate) struct PendingCalls {
	next_id: RequestId,
	calls: HashMap<RequestId, PendingCall>,
}

impl Default for PendingCalls {
	fn default() -> Self {
		Self {
			next_id: RequestId::FIRST,
			calls: HashMap::new(),
		}
	}
}

impl PendingCalls {
	/// Returns a fresh id. Ids are never handed out twice.
	pub fn allocate(&mut self) -> RequestId {
		let id = self.next_id;
		self.next_id = id.next();
		id
	}

	/// Stores the completion for `id`, replacing (and dropping) any previous
	/// entry.
	pub fn register(&mut self, id: RequestId, completion: Completion, kind: MessageKind) {
		let previous = self.calls.insert(
			id,
			PendingCall {
				id,
				completion,
				kind,
			},
		);
		if let Some(previous) = previous {
			warn!(
				id = %id,
				completion = previous.completion.kind(),
				"replaced pending call with the same id"
			);
		}
	}

	pub fn resolve(&mut self, id: RequestId) -> Option<PendingCall> {
		self.calls.remove(&id)
	}

	/// Removes every entry whose id is not in `except`.
	pub fn fail_all(&mut self, except: &[RequestId]) -> Vec<PendingCall> {
		let ids: Vec<RequestId> = self
			.calls
			.keys()
			.copied()
			.filter(|id| !except.contains(id))
			.collect();
		let mut failed: Vec<PendingCall> = ids
			.into_iter()
			.filter_map(|id| self.calls.remove(&id))
			.collect();
		failed.sort_by_key(|call| call.id);
		failed
	}

	pub fn contains(&self, id: RequestId) -> bool {
		self.calls.contains_key(&id)
	}

	pub fn len(&self) -> usize {
		self.calls.len()
	}

	pub fn ids(&self) -> Vec<RequestId> {
		let mut ids: Vec<RequestId> = self.calls.keys().copied().collect();
		ids.sort();
		ids
	}
}
