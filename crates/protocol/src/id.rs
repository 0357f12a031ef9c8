//! Request identifiers.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Identifier of an outbound `method` or `sub` envelope.
///
/// Serialized as a decimal string. Inbound ids are parsed leniently: a
/// missing or non-numeric id becomes [`RequestId::UNASSIGNED`], which never
/// matches an allocated identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct RequestId(u64);

impl RequestId {
	/// Placeholder for ids that could not be read off the wire.
	pub const UNASSIGNED: RequestId = RequestId(0);

	/// First identifier handed out by an allocator.
	pub const FIRST: RequestId = RequestId(1);

	pub const fn new(value: u64) -> Self {
		Self(value)
	}

	pub const fn get(self) -> u64 {
		self.0
	}

	/// Returns the identifier following this one.
	pub const fn next(self) -> Self {
		Self(self.0 + 1)
	}

	pub const fn is_assigned(self) -> bool {
		self.0 != 0
	}

	/// Reads an id from a JSON value, accepting decimal strings and numbers.
	pub fn from_value(value: &Value) -> Self {
		match value {
			Value::String(s) => s.trim().parse().map(Self).unwrap_or(Self::UNASSIGNED),
			Value::Number(n) => n.as_u64().map(Self).unwrap_or(Self::UNASSIGNED),
			_ => Self::UNASSIGNED,
		}
	}
}

impl fmt::Display for RequestId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl From<u64> for RequestId {
	fn from(value: u64) -> Self {
		Self(value)
	}
}

impl Serialize for RequestId {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.collect_str(&self.0)
	}
}

impl<'de> Deserialize<'de> for RequestId {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let value = Value::deserialize(deserializer)?;
		Ok(Self::from_value(&value))
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn serializes_as_decimal_string() {
		let id = RequestId::new(42);
		assert_eq!(serde_json::to_string(&id).unwrap(), r#""42""#);
	}

	#[test]
	fn parses_strings_and_numbers() {
		assert_eq!(RequestId::from_value(&json!("7")), RequestId::new(7));
		assert_eq!(RequestId::from_value(&json!(7)), RequestId::new(7));
	}

	#[test]
	fn garbage_ids_are_unassigned() {
		assert_eq!(RequestId::from_value(&json!("abc")), RequestId::UNASSIGNED);
		assert_eq!(RequestId::from_value(&json!(null)), RequestId::UNASSIGNED);
		assert_eq!(RequestId::from_value(&json!(-3)), RequestId::UNASSIGNED);
		assert!(!RequestId::UNASSIGNED.is_assigned());
	}

	#[test]
	fn next_is_monotonic() {
		let first = RequestId::FIRST;
		assert!(first.next() > first);
		assert_eq!(first.next().get(), 2);
	}
}
