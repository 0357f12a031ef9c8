//! Engine events for external listeners.
//!
//! Events fan out over a [`broadcast`] channel. Listeners that only care
//! about results can watch [`EngineEvent::Result`] instead of passing
//! completions; document events (`added`/`changed`) are only delivered here.

use ddp_protocol::RequestId;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::completion::MethodOutcome;
use crate::login::{LoginStatus, LoginType};

/// Something observable happened in the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
	/// Handshake completed (`true`) or transport dropped (`false`).
	ConnectedChanged(bool),
	LoginStatusChanged(LoginStatus),
	LoginTypeChanged(LoginType),
	/// A `result` arrived, whether or not a completion was registered.
	Result { id: RequestId, outcome: MethodOutcome },
	/// Raw `added` message.
	Added(Value),
	/// Raw `changed` message.
	Changed(Value),
	/// Server sent a protocol-level `error` message.
	ServerError(Value),
	/// Inbound text that was not a JSON object.
	MalformedFrame(String),
}

/// Broadcast sender for [`EngineEvent`]s.
pub(crate) struct EventBus {
	tx: broadcast::Sender<EngineEvent>,
}

impl EventBus {
	pub fn new(capacity: usize) -> Self {
		let (tx, _) = broadcast::channel(capacity.max(1));
		Self { tx }
	}

	/// Emits to all current subscribers. Having none is not an error.
	pub fn emit(&self, event: EngineEvent) {
		let _ = self.tx.send(event);
	}

	pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
		self.tx.subscribe()
	}
}
