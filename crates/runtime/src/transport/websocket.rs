//! WebSocket transport on tokio-tungstenite.
//!
//! Each `open` spawns one session task that owns the socket. The engine
//! talks to it through an unbounded command channel, so `send_text` never
//! blocks; the task applies the configured timeouts to the actual I/O.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, info, warn};
use url::Url;

use super::{Transport, TransportEvents};
use crate::config::TransportConfig;

enum Outbound {
	Text(String),
	Flush,
	Close,
}

struct Session {
	generation: u64,
	outbound: mpsc::UnboundedSender<Outbound>,
	writable: Arc<AtomicBool>,
}

/// [`Transport`] over a WebSocket connection (`ws://` or `wss://`).
pub struct WebSocketTransport {
	config: TransportConfig,
	session: Mutex<Option<Session>>,
}

impl Default for WebSocketTransport {
	fn default() -> Self {
		Self::new(TransportConfig::default())
	}
}

impl WebSocketTransport {
	pub fn new(config: TransportConfig) -> Self {
		Self {
			config,
			session: Mutex::new(None),
		}
	}

	pub fn config(&self) -> &TransportConfig {
		&self.config
	}

	fn end_session(session: Session) {
		session.writable.store(false, Ordering::Release);
		let _ = session.outbound.send(Outbound::Close);
		debug!(generation = session.generation, "closing websocket session");
	}
}

impl Transport for WebSocketTransport {
	fn open(&self, url: &Url, events: TransportEvents) {
		let mut slot = self.session.lock();
		if let Some(previous) = slot.take() {
			Self::end_session(previous);
		}

		let handle = match tokio::runtime::Handle::try_current() {
			Ok(handle) => handle,
			Err(e) => {
				events.error(format!("cannot open {url}: no Tokio runtime ({e})"));
				events.disconnected(Some("no runtime".to_string()));
				return;
			}
		};

		let (outbound, rx) = mpsc::unbounded_channel();
		let writable = Arc::new(AtomicBool::new(false));

		*slot = Some(Session {
			generation: events.generation(),
			outbound,
			writable: Arc::clone(&writable),
		});

		handle.spawn(run_session(
			url.to_string(),
			rx,
			events,
			writable,
			self.config,
		));
	}

	fn send_text(&self, text: &str) -> usize {
		let slot = self.session.lock();
		match slot.as_ref() {
			Some(session) if session.writable.load(Ordering::Acquire) => {
				match session.outbound.send(Outbound::Text(text.to_owned())) {
					Ok(()) => text.len(),
					Err(_) => 0,
				}
			}
			_ => 0,
		}
	}

	fn flush(&self) {
		if let Some(session) = self.session.lock().as_ref() {
			let _ = session.outbound.send(Outbound::Flush);
		}
	}

	fn close(&self) {
		if let Some(session) = self.session.lock().take() {
			Self::end_session(session);
		}
	}

	fn is_valid(&self) -> bool {
		self.session
			.lock()
			.as_ref()
			.is_some_and(|s| s.writable.load(Ordering::Acquire))
	}
}

impl Drop for WebSocketTransport {
	fn drop(&mut self) {
		if let Some(session) = self.session.get_mut().take() {
			Self::end_session(session);
		}
	}
}

async fn run_session(
	url: String,
	mut rx: mpsc::UnboundedReceiver<Outbound>,
	events: TransportEvents,
	writable: Arc<AtomicBool>,
	config: TransportConfig,
) {
	let generation = events.generation();
	debug!(generation, url = %url, "connecting websocket");

	let stream = match timeout(config.connect_timeout, connect_async(url.as_str())).await {
		Ok(Ok((stream, _response))) => stream,
		Ok(Err(e)) => {
			events.error(format!("connect to {url} failed: {e}"));
			events.disconnected(Some(e.to_string()));
			return;
		}
		Err(_) => {
			events.error(format!(
				"connect to {url} timed out after {:?}",
				config.connect_timeout
			));
			events.disconnected(Some("connect timeout".to_string()));
			return;
		}
	};

	info!(generation, url = %url, "websocket connected");
	writable.store(true, Ordering::Release);
	events.connected();

	let (mut sink, mut stream) = stream.split();

	let reason = loop {
		tokio::select! {
			command = rx.recv() => match command {
				Some(Outbound::Text(text)) => {
					match timeout(config.send_timeout, sink.send(Message::Text(text))).await {
						Ok(Ok(())) => {}
						Ok(Err(e)) => {
							events.error(format!("websocket write failed: {e}"));
							break Some(e.to_string());
						}
						Err(_) => {
							events.error(format!("websocket write timed out after {:?}", config.send_timeout));
							break Some("send timeout".to_string());
						}
					}
				}
				Some(Outbound::Flush) => {
					if let Ok(Err(e)) = timeout(config.send_timeout, sink.flush()).await {
						warn!(generation, error = %e, "websocket flush failed");
					}
				}
				Some(Outbound::Close) | None => {
					writable.store(false, Ordering::Release);
					if let Ok(Err(e)) = timeout(config.send_timeout, sink.close()).await {
						debug!(generation, error = %e, "websocket close handshake failed");
					}
					break Some("closed by client".to_string());
				}
			},
			frame = stream.next() => match frame {
				Some(Ok(Message::Text(text))) => {
					events.text(text);
				}
				Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
					Ok(text) => {
						events.text(text);
					}
					Err(_) => warn!(generation, "dropping non-UTF-8 binary frame"),
				},
				Some(Ok(Message::Close(frame))) => {
					break frame.map(|f| format!("{} {}", f.code, f.reason));
				}
				Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
				Some(Err(e)) => {
					events.error(format!("websocket read failed: {e}"));
					break Some(e.to_string());
				}
				None => break None,
			},
		}
	};

	writable.store(false, Ordering::Release);
	info!(generation, url = %url, reason = ?reason, "websocket closed");
	events.disconnected(reason);
}
