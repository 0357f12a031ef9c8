//! Engine state and the reactions to transport events.
//!
//! Everything here runs under the engine lock. Work that must not (invoking
//! completions, broadcasting, writing the session, waking the queue
//! processor) is recorded as an [`Effect`] and run by the engine after the
//! lock is released.

use std::sync::Arc;

use ddp_protocol::{ClientMessage, LoginResult, MethodCall, MethodResult, RequestId, ServerMessage};
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use url::Url;

use super::pending::{MessageKind, PendingCalls};
use crate::completion::{CallError, Completion, MethodOutcome};
use crate::events::EngineEvent;
use crate::login::{LoginStateMachine, LoginStatus};
use crate::retry::{QueuedCall, RetryQueue};
use crate::session::Credentials;
use crate::transport::{SessionGeneration, Transport, TransportEvent, TransportEvents};

/// Deferred work produced under the lock.
pub(crate) enum Effect {
	Emit(EngineEvent),
	Complete(Completion, MethodOutcome),
	SignalQueue,
	StoreToken(String),
}

pub(crate) type Effects = Vec<Effect>;

pub(crate) struct EngineState {
	pub transport: Arc<dyn Transport>,
	pub generation: SessionGeneration,
	/// Server address as configured, compared on `server_url_changed`.
	pub server_url: String,
	/// Normalized endpoint of the current session.
	pub endpoint: Option<Url>,
	pub connected: bool,
	pub pending: PendingCalls,
	pub login: LoginStateMachine,
	pub queue: RetryQueue,
}

impl EngineState {
	pub fn new(transport: Arc<dyn Transport>) -> Self {
		Self {
			transport,
			generation: 0,
			server_url: String::new(),
			endpoint: None,
			connected: false,
			pending: PendingCalls::default(),
			login: LoginStateMachine::default(),
			queue: RetryQueue::default(),
		}
	}

	/// Encodes and writes one envelope. Returns whether every byte went out.
	fn send(&self, message: &ClientMessage) -> bool {
		let text = match message.encode() {
			Ok(text) => text,
			Err(e) => {
				error!(msg = message.kind(), error = %e, "failed to encode envelope");
				return false;
			}
		};
		let written = self.transport.send_text(&text);
		if written < text.len() {
			warn!(
				msg = message.kind(),
				written,
				expected = text.len(),
				valid = self.transport.is_valid(),
				"short write"
			);
			false
		} else {
			debug!(frame = %text, "sent");
			true
		}
	}

	/// Sends a method envelope for an already registered call.
	pub fn send_call(&mut self, id: RequestId, call: MethodCall, kind: MessageKind, fx: &mut Effects) {
		if self.send(&ClientMessage::method(id, &call)) {
			return;
		}
		match kind {
			MessageKind::Persistent => {
				info!(id = %id, method = %call.method, "queueing call for retry");
				self.queue.push(QueuedCall::new(id, call));
				fx.push(Effect::SignalQueue);
			}
			MessageKind::Volatile => {
				debug!(id = %id, method = %call.method, "dropping volatile call after short write");
			}
		}
	}

	pub fn call(&mut self, call: MethodCall, completion: Completion, kind: MessageKind, fx: &mut Effects) -> RequestId {
		let id = self.pending.allocate();
		self.pending.register(id, completion, kind);
		self.send_call(id, call, kind, fx);
		id
	}

	pub fn subscribe(&mut self, name: &str, params: Vec<Value>) -> RequestId {
		let id = self.pending.allocate();
		if !self.send(&ClientMessage::sub(id, name, params)) {
			warn!(id = %id, name, "subscription not sent");
		}
		id
	}

	/// Sends a call that expects no completion, such as typing notifications.
	pub fn notify(&mut self, call: MethodCall) -> RequestId {
		let id = self.pending.allocate();
		if !self.send(&ClientMessage::method(id, &call)) {
			debug!(id = %id, method = %call.method, "notification not sent");
		}
		id
	}

	/// Resends queued calls in order with their original ids, stopping at
	/// the first short write. Returns how many remain.
	pub fn retry_queued(&mut self) -> usize {
		while let Some(queued) = self.queue.front() {
			let id = queued.id;
			if !self.send(&ClientMessage::method(id, &queued.to_method_call())) {
				break;
			}
			debug!(id = %id, "resent queued call");
			self.queue.pop_front();
		}
		self.queue.len()
	}

	fn set_status(&mut self, status: LoginStatus, fx: &mut Effects) {
		if self.login.set_status(status) {
			info!(status = %status, "login status changed");
			fx.push(Effect::Emit(EngineEvent::LoginStatusChanged(status)));
		}
	}

	/// Runs one step of the login policy.
	pub fn login(&mut self, credentials: &Credentials, fx: &mut Effects) {
		let attempt = self.login.next_attempt(credentials);
		let (Some(login_type), Some(call)) = (attempt.login_type(), attempt.method_call()) else {
			info!("no usable credentials left");
			self.set_status(LoginStatus::LoginFailed, fx);
			return;
		};

		// A manual retry after LoginFailed opens a new cycle.
		self.set_status(LoginStatus::LoggingIn, fx);
		if self.login.set_login_type(login_type) {
			fx.push(Effect::Emit(EngineEvent::LoginTypeChanged(login_type)));
		}
		let id = self.call(call, Completion::Noop, MessageKind::Volatile, fx);
		self.login.begin(id);
		info!(id = %id, login_type = ?login_type, "login sent");
	}

	/// Tears down local session state: connectivity, login progress and
	/// every pending call that is not waiting in the retry queue.
	pub fn drop_session(&mut self, fx: &mut Effects) {
		if self.connected {
			self.connected = false;
			fx.push(Effect::Emit(EngineEvent::ConnectedChanged(false)));
		}
		if self.login.on_disconnected() {
			fx.push(Effect::Emit(EngineEvent::LoginStatusChanged(LoginStatus::NotConnected)));
		}
		let queued: Vec<RequestId> = self.queue.ids().collect();
		let failed = self.pending.fail_all(&queued);
		if !failed.is_empty() {
			info!(count = failed.len(), "failing pending calls after disconnect");
		}
		fx.extend(
			failed
				.into_iter()
				.map(|call| Effect::Complete(call.completion, Err(CallError::ConnectionLost))),
		);
	}

	/// Closes the transport session, connected or still connecting, and
	/// applies the disconnect locally since its own `Disconnected` event
	/// will be stale.
	pub fn close_session(&mut self, fx: &mut Effects) {
		if self.transport.is_valid() {
			self.transport.flush();
		}
		self.transport.close();
		self.generation += 1;
		self.drop_session(fx);
	}

	/// Opens a new session generation against `endpoint`. Each session
	/// starts a fresh login cycle.
	pub fn open_session(
		&mut self,
		endpoint: Url,
		tx: &mpsc::UnboundedSender<(SessionGeneration, TransportEvent)>,
	) {
		self.generation += 1;
		self.login.reset_cycle();
		info!(url = %endpoint, generation = self.generation, "connecting");
		let events = TransportEvents::new(self.generation, tx.clone());
		self.transport.open(&endpoint, events);
		self.endpoint = Some(endpoint);
	}

	/// Reacts to one event of the current session.
	pub fn on_transport_event(&mut self, event: TransportEvent, credentials: impl Fn() -> Credentials, fx: &mut Effects) {
		match event {
			TransportEvent::Connected => {
				info!(url = ?self.endpoint.as_ref().map(Url::as_str), "websocket connected, sending handshake");
				if !self.send(&ClientMessage::connect()) {
					warn!("handshake not sent");
				}
			}
			TransportEvent::TextReceived(text) => self.on_text(text, credentials, fx),
			TransportEvent::Disconnected { reason } => {
				info!(reason = ?reason, "disconnected");
				self.drop_session(fx);
			}
			TransportEvent::Error(message) => error!(error = %message, "transport error"),
		}
	}

	fn on_text(&mut self, text: String, credentials: impl Fn() -> Credentials, fx: &mut Effects) {
		let Some(message) = ddp_protocol::parse(&text) else {
			warn!(frame = %text, "dropping malformed frame");
			fx.push(Effect::Emit(EngineEvent::MalformedFrame(text)));
			return;
		};
		debug!(msg = message.kind(), "received");

		match message {
			ServerMessage::Connected { session } => {
				info!(session = ?session, "connected");
				if !self.connected {
					self.connected = true;
					fx.push(Effect::Emit(EngineEvent::ConnectedChanged(true)));
				}
				self.set_status(LoginStatus::LoggingIn, fx);
				self.login(&credentials(), fx);
			}
			ServerMessage::Result(result) => self.on_result(result, credentials, fx),
			ServerMessage::Ping { id } => {
				if !self.send(&ClientMessage::pong(id)) {
					warn!("pong not sent");
				}
			}
			ServerMessage::Added(root) => fx.push(Effect::Emit(EngineEvent::Added(root))),
			ServerMessage::Changed(root) => fx.push(Effect::Emit(EngineEvent::Changed(root))),
			ServerMessage::Updated { methods } => debug!(?methods, "methods updated"),
			ServerMessage::Ready { subs } => debug!(?subs, "subscriptions ready"),
			ServerMessage::Error {
				reason,
				offending_message,
			} => {
				warn!(reason = ?reason, "server reported a protocol error");
				let mut body = Map::new();
				body.insert("msg".into(), Value::from("error"));
				if let Some(reason) = reason {
					body.insert("reason".into(), Value::from(reason));
				}
				if let Some(offending) = offending_message {
					body.insert("offendingMessage".into(), offending);
				}
				fx.push(Effect::Emit(EngineEvent::ServerError(Value::Object(body))));
			}
			ServerMessage::Unrecognized { msg, .. } => {
				debug!(msg = ?msg, frame = %text, "unhandled message")
			}
		}
	}

	fn on_result(&mut self, result: MethodResult, credentials: impl Fn() -> Credentials, fx: &mut Effects) {
		let id = result.id;
		let is_login = id.is_assigned() && self.login.take_active(id);
		let outcome: MethodOutcome = result.into_outcome().map_err(CallError::Method);

		if self.queue.remove(id) {
			debug!(id = %id, "result arrived for a queued call");
		}
		match self.pending.resolve(id) {
			Some(call) => fx.push(Effect::Complete(call.completion, outcome.clone())),
			None => debug!(id = %id, "result for unknown call"),
		}
		fx.push(Effect::Emit(EngineEvent::Result {
			id,
			outcome: outcome.clone(),
		}));

		if is_login {
			self.on_login_result(outcome, credentials, fx);
		}
	}

	fn on_login_result(&mut self, outcome: MethodOutcome, credentials: impl Fn() -> Credentials, fx: &mut Effects) {
		match outcome {
			Ok(value) => {
				match LoginResult::from_value(&value) {
					Ok(LoginResult { token: Some(token), .. }) if !token.is_empty() => {
						fx.push(Effect::StoreToken(token));
					}
					_ => warn!("login result carried no token"),
				}
				self.set_status(LoginStatus::LoggedIn, fx);
				if !self.queue.is_empty() {
					fx.push(Effect::SignalQueue);
				}
			}
			Err(CallError::Method(error)) if error.is_forbidden() => {
				info!("wrong password or token expired");
				self.login(&credentials(), fx);
			}
			Err(error) => {
				warn!(error = %error, "login failed");
				self.set_status(LoginStatus::LoginFailed, fx);
			}
		}
	}
}
