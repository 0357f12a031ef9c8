//! Transport contract between the engine and the socket.
//!
//! The engine never touches sockets directly. A [`Transport`] opens a session
//! against a URL, accepts text frames through a non-blocking
//! [`send_text`](Transport::send_text), and reports what happens on the wire
//! through the [`TransportEvents`] sink it was handed on
//! [`open`](Transport::open).
//!
//! Every `open` gets a sink stamped with a fresh session generation. The
//! engine drops events from older generations, so a session that is being
//! torn down cannot trigger a handshake or a disconnect on its replacement.

mod websocket;

#[cfg(test)]
mod tests;

use tokio::sync::mpsc;
use url::Url;

pub use websocket::WebSocketTransport;

/// Monotonic counter identifying one `open` of a transport.
pub type SessionGeneration = u64;

/// Something the transport observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
	/// The socket is open and writable.
	Connected,
	/// A text frame arrived.
	TextReceived(String),
	/// The session ended. Always the last event of a session.
	Disconnected { reason: Option<String> },
	/// A failure worth logging. A fatal one is followed by `Disconnected`.
	Error(String),
}

/// Sink for the events of one transport session.
#[derive(Debug, Clone)]
pub struct TransportEvents {
	generation: SessionGeneration,
	tx: mpsc::UnboundedSender<(SessionGeneration, TransportEvent)>,
}

impl TransportEvents {
	pub(crate) fn new(
		generation: SessionGeneration,
		tx: mpsc::UnboundedSender<(SessionGeneration, TransportEvent)>,
	) -> Self {
		Self { generation, tx }
	}

	/// Creates a standalone sink and its receiver, for driving a transport
	/// without an engine.
	pub fn channel(
		generation: SessionGeneration,
	) -> (
		Self,
		mpsc::UnboundedReceiver<(SessionGeneration, TransportEvent)>,
	) {
		let (tx, rx) = mpsc::unbounded_channel();
		(Self::new(generation, tx), rx)
	}

	pub fn generation(&self) -> SessionGeneration {
		self.generation
	}

	/// Delivers an event. Returns `false` once the receiving side is gone.
	pub fn emit(&self, event: TransportEvent) -> bool {
		self.tx.send((self.generation, event)).is_ok()
	}

	pub fn connected(&self) -> bool {
		self.emit(TransportEvent::Connected)
	}

	pub fn text(&self, text: impl Into<String>) -> bool {
		self.emit(TransportEvent::TextReceived(text.into()))
	}

	pub fn disconnected(&self, reason: Option<String>) -> bool {
		self.emit(TransportEvent::Disconnected { reason })
	}

	pub fn error(&self, message: impl Into<String>) -> bool {
		self.emit(TransportEvent::Error(message.into()))
	}
}

/// Abstract duplex text socket owned by the engine.
///
/// Implementations must not block in any method: the engine calls them while
/// holding its state lock. Slow work belongs on a task fed by the methods.
pub trait Transport: Send + Sync {
	/// Starts a session against `url`; outcomes arrive through `events`.
	///
	/// Opening while a session is active replaces it.
	fn open(&self, url: &Url, events: TransportEvents);

	/// Queues a text frame, returning how many bytes were accepted.
	///
	/// Anything short of `text.len()` means the frame was not sent.
	fn send_text(&self, text: &str) -> usize;

	/// Pushes out anything buffered.
	fn flush(&self);

	/// Ends the current session.
	fn close(&self);

	/// Whether a session is open and writable.
	fn is_valid(&self) -> bool;
}
