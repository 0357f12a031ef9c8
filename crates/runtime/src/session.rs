//! Session/credentials collaborator.
//!
//! The engine does not own credentials. It reads them from a
//! [`SessionProvider`] each time it logs in or reconnects, and writes the
//! auth token back after a successful login.

use parking_lot::RwLock;

/// Source of credentials and the configured server.
pub trait SessionProvider: Send + Sync {
	fn username(&self) -> String;
	fn password(&self) -> String;
	fn auth_token(&self) -> String;
	fn server_url(&self) -> String;

	/// Stores the token returned by a successful login.
	fn set_auth_token(&self, token: &str);

	/// Snapshot of the three login inputs.
	fn credentials(&self) -> Credentials {
		Credentials {
			username: self.username(),
			password: self.password(),
			auth_token: self.auth_token(),
		}
	}
}

/// Credentials read at the start of a login attempt.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
	pub username: String,
	pub password: String,
	pub auth_token: String,
}

impl Credentials {
	pub fn has_password(&self) -> bool {
		!self.password.is_empty()
	}

	pub fn has_token(&self) -> bool {
		!self.auth_token.is_empty()
	}
}

impl std::fmt::Debug for Credentials {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Credentials")
			.field("username", &self.username)
			.field("password", &if self.has_password() { "<set>" } else { "<empty>" })
			.field("auth_token", &if self.has_token() { "<set>" } else { "<empty>" })
			.finish()
	}
}

#[derive(Debug, Default)]
struct SessionData {
	username: String,
	password: String,
	auth_token: String,
	server_url: String,
}

/// In-memory [`SessionProvider`] with setters.
#[derive(Debug, Default)]
pub struct MemorySession {
	data: RwLock<SessionData>,
}

impl MemorySession {
	pub fn new(server_url: impl Into<String>) -> Self {
		let session = Self::default();
		session.set_server_url(server_url);
		session
	}

	pub fn with_password(self, username: impl Into<String>, password: impl Into<String>) -> Self {
		self.set_username(username);
		self.set_password(password);
		self
	}

	pub fn with_token(self, token: impl Into<String>) -> Self {
		self.data.write().auth_token = token.into();
		self
	}

	pub fn set_username(&self, username: impl Into<String>) {
		self.data.write().username = username.into();
	}

	pub fn set_password(&self, password: impl Into<String>) {
		self.data.write().password = password.into();
	}

	pub fn set_server_url(&self, url: impl Into<String>) {
		self.data.write().server_url = url.into();
	}
}

impl SessionProvider for MemorySession {
	fn username(&self) -> String {
		self.data.read().username.clone()
	}

	fn password(&self) -> String {
		self.data.read().password.clone()
	}

	fn auth_token(&self) -> String {
		self.data.read().auth_token.clone()
	}

	fn server_url(&self) -> String {
		self.data.read().server_url.clone()
	}

	fn set_auth_token(&self, token: &str) {
		self.data.write().auth_token = token.to_string();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn credentials_snapshot() {
		let session = MemorySession::new("https://example.com").with_password("alice", "pw");
		let creds = session.credentials();
		assert_eq!(creds.username, "alice");
		assert!(creds.has_password());
		assert!(!creds.has_token());

		session.set_auth_token("tok");
		assert!(session.credentials().has_token());
	}

	#[test]
	fn debug_hides_secrets() {
		let creds = Credentials {
			username: "alice".into(),
			password: "hunter2".into(),
			auth_token: String::new(),
		};
		let rendered = format!("{creds:?}");
		assert!(!rendered.contains("hunter2"));
		assert!(rendered.contains("<set>"));
		assert!(rendered.contains("<empty>"));
	}
}
