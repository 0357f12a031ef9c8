//! Inbound messages.
//!
//! [`parse`] never fails loudly. Text that is not a JSON object yields
//! `None`; an object with an unknown or missing `msg` yields
//! [`ServerMessage::Unrecognized`]. Individual fields are read leniently so a
//! server sending slightly off-shape data still gets its frame dispatched.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::id::RequestId;

/// Message received from the server.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
	/// Handshake accepted.
	Connected { session: Option<String> },
	/// Completion of a `method` call.
	Result(MethodResult),
	/// Writes of the listed method calls are reflected in subscriptions.
	Updated { methods: Vec<String> },
	/// Subscription document added. Carries the whole root object.
	Added(Value),
	/// Subscription document changed. Carries the whole root object.
	Changed(Value),
	/// Listed subscriptions have sent their initial data.
	Ready { subs: Vec<String> },
	/// Liveness probe.
	Ping { id: Option<String> },
	/// Protocol-level error.
	Error {
		reason: Option<String>,
		offending_message: Option<Value>,
	},
	/// Anything else, kept verbatim for diagnostics.
	Unrecognized { msg: Option<String>, raw: Value },
}

impl ServerMessage {
	/// Returns the wire name of the message.
	pub fn kind(&self) -> &str {
		match self {
			Self::Connected { .. } => "connected",
			Self::Result(_) => "result",
			Self::Updated { .. } => "updated",
			Self::Added(_) => "added",
			Self::Changed(_) => "changed",
			Self::Ready { .. } => "ready",
			Self::Ping { .. } => "ping",
			Self::Error { .. } => "error",
			Self::Unrecognized { msg, .. } => msg.as_deref().unwrap_or("<none>"),
		}
	}
}

/// Payload of a `result` message.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodResult {
	/// Id of the call this result answers.
	pub id: RequestId,
	/// Return value, absent for void methods and failures.
	pub result: Option<Value>,
	/// Failure details, mutually exclusive with a meaningful `result`.
	pub error: Option<MethodError>,
}

impl MethodResult {
	/// Numeric error code, if the call failed with one.
	pub fn error_code(&self) -> Option<i64> {
		self.error.as_ref().and_then(MethodError::code)
	}

	/// Splits the result into the return value or the error.
	pub fn into_outcome(self) -> Result<Value, MethodError> {
		match self.error {
			Some(error) => Err(error),
			None => Ok(self.result.unwrap_or(Value::Null)),
		}
	}
}

/// Error object attached to a failed `result`.
///
/// Meteor-style servers put the code in `error`, either as a number (`403`)
/// or as a string (`"403"`, `"too-many-requests"`).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodError {
	#[serde(default)]
	pub error: Value,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub reason: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error_type: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub details: Option<Value>,
}

impl MethodError {
	/// Numeric code from the `error` field.
	pub fn code(&self) -> Option<i64> {
		match &self.error {
			Value::Number(n) => n.as_i64(),
			Value::String(s) => s.trim().parse().ok(),
			_ => None,
		}
	}

	/// Forbidden: wrong password or expired resume token on `login`.
	pub fn is_forbidden(&self) -> bool {
		self.code() == Some(403)
	}
}

impl fmt::Display for MethodError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let text = self
			.reason
			.as_deref()
			.or(self.message.as_deref())
			.unwrap_or("method failed");
		match &self.error {
			Value::Null => write!(f, "{text}"),
			Value::String(code) => write!(f, "{text} [{code}]"),
			code => write!(f, "{text} [{code}]"),
		}
	}
}

/// Parses one inbound text frame.
///
/// Returns `None` for unparsable text and for JSON that is not an object.
pub fn parse(text: &str) -> Option<ServerMessage> {
	let root: Value = serde_json::from_str(text).ok()?;
	let object = root.as_object()?;

	let message = match object.get("msg").and_then(Value::as_str) {
		Some("connected") => ServerMessage::Connected {
			session: string_field(object, "session"),
		},
		Some("result") => ServerMessage::Result(MethodResult {
			id: object
				.get("id")
				.map(RequestId::from_value)
				.unwrap_or(RequestId::UNASSIGNED),
			result: object.get("result").cloned(),
			error: object.get("error").and_then(parse_method_error),
		}),
		Some("updated") => ServerMessage::Updated {
			methods: string_list(object, "methods"),
		},
		Some("added") => ServerMessage::Added(root.clone()),
		Some("changed") => ServerMessage::Changed(root.clone()),
		Some("ready") => ServerMessage::Ready {
			subs: string_list(object, "subs"),
		},
		Some("ping") => ServerMessage::Ping {
			id: string_field(object, "id"),
		},
		Some("error") => ServerMessage::Error {
			reason: string_field(object, "reason"),
			offending_message: object.get("offendingMessage").cloned(),
		},
		other => ServerMessage::Unrecognized {
			msg: other.map(str::to_string),
			raw: root.clone(),
		},
	};

	Some(message)
}

fn parse_method_error(value: &Value) -> Option<MethodError> {
	match value {
		Value::Null => None,
		Value::Object(_) => Some(serde_json::from_value(value.clone()).unwrap_or_else(|_| {
			MethodError {
				error: value.get("error").cloned().unwrap_or(Value::Null),
				..MethodError::default()
			}
		})),
		other => Some(MethodError {
			error: other.clone(),
			..MethodError::default()
		}),
	}
}

fn string_field(object: &Map<String, Value>, key: &str) -> Option<String> {
	object.get(key).and_then(Value::as_str).map(str::to_string)
}

fn string_list(object: &Map<String, Value>, key: &str) -> Vec<String> {
	object
		.get(key)
		.and_then(Value::as_array)
		.map(|items| {
			items
				.iter()
				.filter_map(Value::as_str)
				.map(str::to_string)
				.collect()
		})
		.unwrap_or_default()
}
