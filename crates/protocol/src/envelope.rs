//! Outbound envelopes.
//!
//! Every frame the client writes is one [`ClientMessage`] encoded as compact
//! JSON. The `msg` discriminator is always the first key:
//!
//! ```text
//! {"msg":"connect","version":"1","support":["1"]}
//! {"msg":"method","id":"3","method":"login","params":[{"resume":"..."}]}
//! {"msg":"sub","id":"4","name":"stream-room-messages","params":["GENERAL",false]}
//! {"msg":"pong"}
//! ```

use serde::Serialize;
use serde_json::Value;

use crate::id::RequestId;
use crate::methods::MethodCall;

/// Protocol version proposed in the handshake.
pub const DDP_VERSION: &str = "1";

/// Protocol versions advertised in the handshake `support` list.
pub const SUPPORTED_VERSIONS: &[&str] = &["1"];

/// Message sent from the client to the server.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "msg", rename_all = "lowercase")]
pub enum ClientMessage {
	/// Handshake, sent once the transport is open.
	Connect {
		version: String,
		support: Vec<String>,
	},
	/// Remote method invocation, answered by a `result` with the same id.
	Method {
		id: RequestId,
		method: String,
		params: Vec<Value>,
	},
	/// Subscription request; data arrives as `added`/`changed`/`ready`.
	Sub {
		id: RequestId,
		name: String,
		params: Vec<Value>,
	},
	/// Reply to a server `ping`, echoing its id when it had one.
	Pong {
		#[serde(skip_serializing_if = "Option::is_none")]
		id: Option<String>,
	},
}

impl ClientMessage {
	/// Builds the handshake envelope.
	pub fn connect() -> Self {
		Self::Connect {
			version: DDP_VERSION.to_string(),
			support: SUPPORTED_VERSIONS.iter().map(|v| v.to_string()).collect(),
		}
	}

	/// Builds a `method` envelope for `call` under `id`.
	pub fn method(id: RequestId, call: &MethodCall) -> Self {
		Self::Method {
			id,
			method: call.method.clone(),
			params: call.params.clone(),
		}
	}

	/// Builds a `sub` envelope.
	pub fn sub(id: RequestId, name: impl Into<String>, params: Vec<Value>) -> Self {
		Self::Sub {
			id,
			name: name.into(),
			params,
		}
	}

	/// Builds a `pong` envelope.
	pub fn pong(id: Option<String>) -> Self {
		Self::Pong { id }
	}

	/// Returns the wire name of this envelope (`connect`, `method`, ...).
	pub fn kind(&self) -> &'static str {
		match self {
			Self::Connect { .. } => "connect",
			Self::Method { .. } => "method",
			Self::Sub { .. } => "sub",
			Self::Pong { .. } => "pong",
		}
	}

	/// Encodes the envelope as compact JSON text.
	pub fn encode(&self) -> serde_json::Result<String> {
		serde_json::to_string(self)
	}
}
