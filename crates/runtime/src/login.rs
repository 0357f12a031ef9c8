//! Login state machine.
//!
//! Tracks authentication progress and the one-attempt-per-credential rule.
//! The machine decides; the engine sends. A cycle ends in
//! [`LoginStatus::LoggedIn`] or [`LoginStatus::LoginFailed`]; entering
//! `LoginFailed` re-arms both credential strategies for the next cycle.

use std::fmt;

use ddp_protocol::{MethodCall, RequestId};
use serde::Serialize;

use crate::session::Credentials;

/// Authentication progress of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginStatus {
	#[default]
	NotConnected,
	LoggingIn,
	LoggedIn,
	LoginFailed,
}

impl fmt::Display for LoginStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			LoginStatus::NotConnected => "not connected",
			LoginStatus::LoggingIn => "logging in",
			LoginStatus::LoggedIn => "logged in",
			LoginStatus::LoginFailed => "login failed",
		})
	}
}

/// Credential strategy used by the current login attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginType {
	#[default]
	Password,
	ResumeToken,
}

/// What the engine should do for one `login()` invocation.
#[derive(Clone, PartialEq, Eq)]
pub enum LoginAttempt {
	Password { username: String, password: String },
	ResumeToken { token: String },
	/// No usable credential left in this cycle.
	Exhausted,
}

impl LoginAttempt {
	pub fn login_type(&self) -> Option<LoginType> {
		match self {
			LoginAttempt::Password { .. } => Some(LoginType::Password),
			LoginAttempt::ResumeToken { .. } => Some(LoginType::ResumeToken),
			LoginAttempt::Exhausted => None,
		}
	}

	/// The `login` method call for this attempt.
	pub fn method_call(&self) -> Option<MethodCall> {
		match self {
			LoginAttempt::Password { username, password } => {
				Some(MethodCall::login_with_password(username, password))
			}
			LoginAttempt::ResumeToken { token } => Some(MethodCall::login_with_token(token)),
			LoginAttempt::Exhausted => None,
		}
	}
}

impl fmt::Debug for LoginAttempt {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			LoginAttempt::Password { username, .. } => f
				.debug_struct("Password")
				.field("username", username)
				.finish_non_exhaustive(),
			LoginAttempt::ResumeToken { .. } => f.debug_struct("ResumeToken").finish_non_exhaustive(),
			LoginAttempt::Exhausted => f.write_str("Exhausted"),
		}
	}
}

#[derive(Debug, Clone, Default)]
pub struct LoginStateMachine {
	status: LoginStatus,
	login_type: LoginType,
	attempted_password: bool,
	attempted_token: bool,
	active_request: Option<RequestId>,
}

impl LoginStateMachine {
	pub fn status(&self) -> LoginStatus {
		self.status
	}

	pub fn login_type(&self) -> LoginType {
		self.login_type
	}

	pub fn attempted_password(&self) -> bool {
		self.attempted_password
	}

	pub fn attempted_token(&self) -> bool {
		self.attempted_token
	}

	/// Id of the in-flight `login` call.
	pub fn active_request(&self) -> Option<RequestId> {
		self.active_request
	}

	/// Moves to `next`, returning whether the status changed.
	///
	/// Entering `LoginFailed` always resets both attempted flags, even when
	/// already failed.
	pub fn set_status(&mut self, next: LoginStatus) -> bool {
		if next == LoginStatus::LoginFailed {
			self.attempted_password = false;
			self.attempted_token = false;
			self.active_request = None;
		}
		let changed = self.status != next;
		self.status = next;
		changed
	}

	/// Returns whether the type changed.
	pub fn set_login_type(&mut self, login_type: LoginType) -> bool {
		let changed = self.login_type != login_type;
		self.login_type = login_type;
		changed
	}

	/// Picks the next strategy and marks it attempted.
	///
	/// A configured password takes precedence over a token and, once tried,
	/// ends the cycle: the token is not consulted while a password is set.
	pub fn next_attempt(&mut self, credentials: &Credentials) -> LoginAttempt {
		if credentials.has_password() {
			if self.attempted_password {
				return LoginAttempt::Exhausted;
			}
			self.attempted_password = true;
			LoginAttempt::Password {
				username: credentials.username.clone(),
				password: credentials.password.clone(),
			}
		} else if credentials.has_token() && !self.attempted_token {
			self.attempted_token = true;
			LoginAttempt::ResumeToken {
				token: credentials.auth_token.clone(),
			}
		} else {
			LoginAttempt::Exhausted
		}
	}

	/// Re-arms both strategies for a new session without touching the status.
	pub fn reset_cycle(&mut self) {
		self.attempted_password = false;
		self.attempted_token = false;
		self.active_request = None;
	}

	pub fn begin(&mut self, id: RequestId) {
		self.active_request = Some(id);
	}

	/// Clears the active request if it is `id`, returning whether it was.
	pub fn take_active(&mut self, id: RequestId) -> bool {
		if self.active_request == Some(id) {
			self.active_request = None;
			true
		} else {
			false
		}
	}

	/// Transport went away. Returns whether the status changed.
	pub fn on_disconnected(&mut self) -> bool {
		self.active_request = None;
		self.set_status(LoginStatus::NotConnected)
	}
}
