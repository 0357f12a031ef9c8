//! Method names, parameter builders and typed results.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Name of the authentication method.
pub const LOGIN_METHOD: &str = "login";

/// A method name with its positional parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
	pub method: String,
	pub params: Vec<Value>,
}

impl MethodCall {
	pub fn new(method: impl Into<String>, params: Vec<Value>) -> Self {
		Self {
			method: method.into(),
			params,
		}
	}

	/// `login` with a username/password pair.
	pub fn login_with_password(username: &str, password: &str) -> Self {
		Self::new(
			LOGIN_METHOD,
			vec![json!({
				"user": { "username": username },
				"password": password,
			})],
		)
	}

	/// `login` resuming a previously issued auth token.
	pub fn login_with_token(token: &str) -> Self {
		Self::new(LOGIN_METHOD, vec![json!({ "resume": token })])
	}

	pub fn leave_room(room_id: &str) -> Self {
		Self::new("leaveRoom", vec![json!(room_id)])
	}

	pub fn hide_room(room_id: &str) -> Self {
		Self::new("hideRoom", vec![json!(room_id)])
	}

	/// Typing indicator, broadcast to the room's `typing` stream.
	pub fn typing(room_id: &str, username: &str, typing: bool) -> Self {
		Self::new(
			"stream-notify-room",
			vec![json!(format!("{room_id}/typing")), json!(username), json!(typing)],
		)
	}

	pub fn is_login(&self) -> bool {
		self.method == LOGIN_METHOD
	}
}

/// Result payload of a successful `login`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResult {
	/// User id of the authenticated account.
	#[serde(default)]
	pub id: Option<String>,
	/// Resume token for later logins.
	#[serde(default)]
	pub token: Option<String>,
	/// Token expiry as sent by the server (`{"$date": millis}`).
	#[serde(default)]
	pub token_expires: Option<Value>,
	/// Login type reported by the server, e.g. `"password"` or `"resume"`.
	#[serde(default, rename = "type")]
	pub kind: Option<String>,
}

impl LoginResult {
	pub fn from_value(value: &Value) -> serde_json::Result<Self> {
		serde_json::from_value(value.clone())
	}

	/// Token expiry in milliseconds since the epoch, when present.
	pub fn token_expires_millis(&self) -> Option<i64> {
		match self.token_expires.as_ref()? {
			Value::Object(map) => map.get("$date").and_then(Value::as_i64),
			Value::Number(n) => n.as_i64(),
			_ => None,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn password_login_payload() {
		let call = MethodCall::login_with_password("alice", "s3cret");
		assert!(call.is_login());
		assert_eq!(
			call.params,
			vec![json!({"user": {"username": "alice"}, "password": "s3cret"})]
		);
	}

	#[test]
	fn resume_login_payload() {
		let call = MethodCall::login_with_token("tok");
		assert_eq!(call.method, "login");
		assert_eq!(call.params, vec![json!({"resume": "tok"})]);
	}

	#[test]
	fn room_methods() {
		assert_eq!(MethodCall::leave_room("r1").params, vec![json!("r1")]);
		assert_eq!(MethodCall::hide_room("r1").method, "hideRoom");
		let typing = MethodCall::typing("r1", "bob", true);
		assert_eq!(typing.method, "stream-notify-room");
		assert_eq!(typing.params, vec![json!("r1/typing"), json!("bob"), json!(true)]);
	}

	#[test]
	fn login_result_decodes() {
		let value = json!({
			"id": "uid1",
			"token": "abc",
			"tokenExpires": {"$date": 1_700_000_000_000_i64},
			"type": "password"
		});
		let result = LoginResult::from_value(&value).unwrap();
		assert_eq!(result.id.as_deref(), Some("uid1"));
		assert_eq!(result.token.as_deref(), Some("abc"));
		assert_eq!(result.kind.as_deref(), Some("password"));
		assert_eq!(result.token_expires_millis(), Some(1_700_000_000_000));
	}

	#[test]
	fn login_result_tolerates_missing_fields() {
		let result = LoginResult::from_value(&json!({})).unwrap();
		assert_eq!(result, LoginResult::default());
	}
}
