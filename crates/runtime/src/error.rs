//! Error types for the DDP runtime.

use thiserror::Error;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the DDP runtime.
///
/// The engine itself degrades to observable state (login status, events)
/// rather than returning these; they surface from setup calls such as
/// [`Engine::start`](crate::Engine::start) and from awaited typed results.
#[derive(Debug, Error)]
pub enum Error {
	/// The session has no server URL to connect to.
	#[error("Server URL is empty")]
	EmptyServerUrl,

	/// The server URL could not be turned into a WebSocket endpoint.
	#[error("Invalid server URL '{url}': {reason}")]
	InvalidUrl { url: String, reason: String },

	/// The connection dropped before the call was answered.
	#[error("Connection lost before the call completed")]
	ConnectionLost,

	/// The server answered the call with an error.
	#[error("Method error{}: {reason}", code.map(|c| format!(" {c}")).unwrap_or_default())]
	Method {
		/// Numeric code, when the server sent one (403 for auth failures).
		code: Option<i64>,
		/// Human-readable reason.
		reason: String,
	},

	/// Completion channel dropped without a value.
	#[error("Channel closed unexpectedly")]
	ChannelClosed,

	/// JSON serialization/deserialization error.
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

impl Error {
	/// Returns the server error code if this is a method error.
	pub fn code(&self) -> Option<i64> {
		match self {
			Error::Method { code, .. } => *code,
			_ => None,
		}
	}

	/// Returns true if the server rejected credentials.
	pub fn is_auth_failure(&self) -> bool {
		self.code() == Some(403)
	}

	/// Returns true if the call was abandoned because the connection dropped.
	pub fn is_connection_lost(&self) -> bool {
		matches!(self, Error::ConnectionLost)
	}
}
