//! Protocol engine: owns the transport, correlates calls with results, and
//! drives the login state machine and the retry queue.
//!
//! # Message Flow
//!
//! 1. [`Engine::call`] allocates a [`RequestId`], registers the completion
//!    and writes a `method` envelope through the [`Transport`]
//! 2. The transport reports frames as [`TransportEvent`]s tagged with the
//!    session generation
//! 3. [`Engine::run`] (or [`Engine::pump`]) parses each frame and resolves
//!    the matching completion, answers pings, advances login
//! 4. Completions, events and session writes run after the state lock is
//!    released
//!
//! Events from a previous session generation are discarded, so a session
//! being torn down cannot disturb its replacement.

mod pending;
mod state;


use std::sync::Arc;

use ddp_protocol::{MethodCall, RequestId};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{Mutex as TokioMutex, Notify, broadcast, mpsc};
use tracing::{debug, error, info};
use url::Url;

pub use pending::MessageKind;
use state::{Effect, Effects, EngineState};

use crate::completion::{Completion, PendingResult};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::events::{EngineEvent, EventBus};
use crate::login::{LoginStatus, LoginType};
use crate::retry::{BackoffQueueProcessor, QueueProcessor, QueuedCall, RetryHandle, RetryTarget};
use crate::server_url::websocket_url;
use crate::session::SessionProvider;
use crate::transport::{SessionGeneration, Transport, TransportEvent, WebSocketTransport};

type EventReceiver = mpsc::UnboundedReceiver<(SessionGeneration, TransportEvent)>;

struct EngineInner {
	session: Arc<dyn SessionProvider>,
	queue_processor: Arc<dyn QueueProcessor>,
	state: Mutex<EngineState>,
	bus: EventBus,
	event_tx: mpsc::UnboundedSender<(SessionGeneration, TransportEvent)>,
	event_rx: TokioMutex<EventReceiver>,
	shutdown: Notify,
}

impl RetryTarget for EngineInner {
	fn retry_queued(&self) -> usize {
		self.state.lock().retry_queued()
	}

	fn queued_len(&self) -> usize {
		self.state.lock().queue.len()
	}
}

/// Builder for [`Engine`].
pub struct EngineBuilder {
	session: Arc<dyn SessionProvider>,
	config: EngineConfig,
	transport: Option<Arc<dyn Transport>>,
	queue_processor: Option<Arc<dyn QueueProcessor>>,
}

impl EngineBuilder {
	pub fn new(session: Arc<dyn SessionProvider>) -> Self {
		Self {
			session,
			config: EngineConfig::default(),
			transport: None,
			queue_processor: None,
		}
	}

	pub fn config(mut self, config: EngineConfig) -> Self {
		self.config = config;
		self
	}

	/// Uses `transport` instead of a [`WebSocketTransport`].
	pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
		self.transport = Some(transport);
		self
	}

	/// Uses `processor` instead of a default [`BackoffQueueProcessor`].
	pub fn queue_processor(mut self, processor: Arc<dyn QueueProcessor>) -> Self {
		self.queue_processor = Some(processor);
		self
	}

	pub fn build(self) -> Engine {
		let transport = self
			.transport
			.unwrap_or_else(|| Arc::new(WebSocketTransport::new(self.config.transport)));
		let queue_processor = self
			.queue_processor
			.unwrap_or_else(|| Arc::new(BackoffQueueProcessor::default()));
		let (event_tx, event_rx) = mpsc::unbounded_channel();

		Engine {
			inner: Arc::new(EngineInner {
				session: self.session,
				queue_processor,
				state: Mutex::new(EngineState::new(transport)),
				bus: EventBus::new(self.config.event_capacity),
				event_tx,
				event_rx: TokioMutex::new(event_rx),
				shutdown: Notify::new(),
			}),
		}
	}
}

/// DDP client engine.
///
/// Cheap to clone; clones share one engine. Nothing here awaits a round
/// trip: calls return their [`RequestId`] immediately and outcomes arrive
/// through completions and [`EngineEvent`]s once [`run`](Engine::run) or
/// [`pump`](Engine::pump) processes the reply.
#[derive(Clone)]
pub struct Engine {
	inner: Arc<EngineInner>,
}

impl Engine {
	/// Engine with the default WebSocket transport and backoff processor.
	pub fn new(session: Arc<dyn SessionProvider>) -> Self {
		EngineBuilder::new(session).build()
	}

	pub fn builder(session: Arc<dyn SessionProvider>) -> EngineBuilder {
		EngineBuilder::new(session)
	}

	/// Locks the state, runs `f`, then runs the effects it recorded.
	fn with_state<R>(&self, f: impl FnOnce(&mut EngineState, &mut Effects) -> R) -> R {
		let mut fx = Effects::new();
		let value = {
			let mut state = self.inner.state.lock();
			f(&mut state, &mut fx)
		};
		self.apply(fx);
		value
	}

	fn apply(&self, fx: Effects) {
		for effect in fx {
			match effect {
				Effect::Emit(event) => self.inner.bus.emit(event),
				Effect::Complete(completion, outcome) => completion.complete(outcome),
				Effect::SignalQueue => self.inner.queue_processor.process_queue(self.retry_handle()),
				Effect::StoreToken(token) => self.inner.session.set_auth_token(&token),
			}
		}
	}

	/// Handle for draining the retry queue without keeping the engine alive.
	pub fn retry_handle(&self) -> RetryHandle {
		RetryHandle::new(&self.inner)
	}

	/// Subscribes to engine events from now on.
	pub fn events(&self) -> broadcast::Receiver<EngineEvent> {
		self.inner.bus.subscribe()
	}

	/// Connects to the session's server URL.
	///
	/// A live session is closed first.
	pub fn start(&self) -> Result<()> {
		let raw = self.inner.session.server_url();
		if raw.trim().is_empty() {
			error!("cannot connect: server URL is empty");
			return Err(Error::EmptyServerUrl);
		}
		self.connect_to(raw)
	}

	/// Reconnects if the session's server URL changed or the transport is
	/// not usable. Returns whether a new session was opened.
	///
	/// Subscriptions of the old session are not renewed.
	pub fn server_url_changed(&self) -> Result<bool> {
		let raw = self.inner.session.server_url();
		let needed = {
			let state = self.inner.state.lock();
			raw != state.server_url || !state.transport.is_valid()
		};
		if !needed {
			debug!(url = %raw, "server URL unchanged and transport valid");
			return Ok(false);
		}
		info!(url = %raw, "reconnecting");
		self.connect_to(raw).map(|()| true)
	}

	fn connect_to(&self, raw: String) -> Result<()> {
		let endpoint = websocket_url(&raw).inspect_err(|e| error!(url = %raw, error = %e, "cannot connect"))?;
		let tx = self.inner.event_tx.clone();
		self.with_state(|state, fx| {
			if state.endpoint.is_some() {
				state.close_session(fx);
			}
			state.server_url = raw;
			state.open_session(endpoint, &tx);
		});
		Ok(())
	}

	/// Replaces the transport. A live session on the old one is closed;
	/// call [`server_url_changed`](Engine::server_url_changed) or
	/// [`start`](Engine::start) to open one on the new transport.
	pub fn set_transport(&self, transport: Arc<dyn Transport>) {
		self.with_state(|state, fx| {
			state.close_session(fx);
			state.transport = transport;
		});
	}

	/// Closes the session and stops [`run`](Engine::run).
	pub fn shutdown(&self) {
		self.with_state(|state, fx| state.close_session(fx));
		self.inner.shutdown.notify_one();
	}

	/// Processes transport events until [`shutdown`](Engine::shutdown).
	///
	/// Only one dispatch loop runs at a time; a second `run` waits for the
	/// first to return.
	pub async fn run(&self) {
		let mut rx = self.inner.event_rx.lock().await;
		loop {
			tokio::select! {
				_ = self.inner.shutdown.notified() => {
					debug!("engine loop stopped");
					break;
				}
				next = rx.recv() => match next {
					Some((generation, event)) => self.dispatch(generation, event),
					None => break,
				},
			}
		}
	}

	/// Processes the transport events already queued, without waiting.
	/// Returns how many were taken off the channel.
	///
	/// Returns zero while [`run`](Engine::run) owns the channel.
	pub fn pump(&self) -> usize {
		let Ok(mut rx) = self.inner.event_rx.try_lock() else {
			return 0;
		};
		let mut processed = 0;
		while let Ok((generation, event)) = rx.try_recv() {
			self.dispatch(generation, event);
			processed += 1;
		}
		processed
	}

	/// Feeds an event as if the current transport session reported it.
	pub fn handle_event(&self, event: TransportEvent) {
		let generation = self.inner.state.lock().generation;
		self.dispatch(generation, event);
	}

	fn dispatch(&self, generation: SessionGeneration, event: TransportEvent) {
		let session = Arc::clone(&self.inner.session);
		self.with_state(|state, fx| {
			if generation != state.generation {
				debug!(generation, current = state.generation, ?event, "dropping stale transport event");
				return;
			}
			state.on_transport_event(event, || session.credentials(), fx);
		});
	}

	/// Calls `method` without a completion.
	pub fn call(&self, method: &str, params: Vec<Value>, kind: MessageKind) -> RequestId {
		self.call_with(method, params, Completion::Noop, kind)
	}

	/// Calls `method`; `completion` receives the outcome exactly once.
	pub fn call_with(&self, method: &str, params: Vec<Value>, completion: Completion, kind: MessageKind) -> RequestId {
		self.send_call(MethodCall::new(method, params), completion, kind)
	}

	/// Calls `method` and returns a future decoding its result as `T`.
	pub fn call_typed<T: DeserializeOwned>(
		&self,
		method: &str,
		params: Vec<Value>,
		kind: MessageKind,
	) -> (RequestId, PendingResult<T>) {
		let (completion, pending) = Completion::typed();
		(self.call_with(method, params, completion, kind), pending)
	}

	fn send_call(&self, call: MethodCall, completion: Completion, kind: MessageKind) -> RequestId {
		self.with_state(|state, fx| state.call(call, completion, kind, fx))
	}

	/// Subscribes to a publication. Fire-and-forget.
	pub fn subscribe(&self, name: &str, params: Vec<Value>) -> RequestId {
		self.with_state(|state, _| state.subscribe(name, params))
	}

	/// Runs one step of the login policy with the session's credentials.
	pub fn login(&self) {
		let credentials = self.inner.session.credentials();
		self.with_state(|state, fx| state.login(&credentials, fx));
	}

	pub fn leave_room(&self, room_id: &str) -> RequestId {
		self.send_call(MethodCall::leave_room(room_id), Completion::Noop, MessageKind::Persistent)
	}

	pub fn hide_room(&self, room_id: &str) -> RequestId {
		self.send_call(MethodCall::hide_room(room_id), Completion::Noop, MessageKind::Persistent)
	}

	/// Tells the room whether the session user is typing.
	pub fn inform_typing_status(&self, room_id: &str, typing: bool) -> RequestId {
		let call = MethodCall::typing(room_id, &self.inner.session.username(), typing);
		self.with_state(|state, _| state.notify(call))
	}

	/// Resends queued calls with their original ids. Returns how many are
	/// still queued.
	pub fn retry_queued(&self) -> usize {
		self.inner.retry_queued()
	}

	pub fn queued_calls(&self) -> Vec<QueuedCall> {
		self.inner.state.lock().queue.snapshot()
	}

	pub fn login_status(&self) -> LoginStatus {
		self.inner.state.lock().login.status()
	}

	pub fn login_type(&self) -> LoginType {
		self.inner.state.lock().login.login_type()
	}

	pub fn is_connected(&self) -> bool {
		self.inner.state.lock().connected
	}

	pub fn is_logged_in(&self) -> bool {
		self.login_status() == LoginStatus::LoggedIn
	}

	/// Server address the current session was opened for.
	pub fn server_url(&self) -> String {
		self.inner.state.lock().server_url.clone()
	}

	/// Normalized WebSocket endpoint of the current session.
	pub fn endpoint(&self) -> Option<Url> {
		self.inner.state.lock().endpoint.clone()
	}

	pub fn generation(&self) -> SessionGeneration {
		self.inner.state.lock().generation
	}

	/// Number of calls still waiting for a result.
	pub fn pending_calls(&self) -> usize {
		self.inner.state.lock().pending.len()
	}
}

impl std::fmt::Debug for Engine {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let state = self.inner.state.lock();
		f.debug_struct("Engine")
			.field("server_url", &state.server_url)
			.field("generation", &state.generation)
			.field("connected", &state.connected)
			.field("login_status", &state.login.status())
			.field("pending", &state.pending.len())
			.field("queued", &state.queue.len())
			.finish()
	}
}
