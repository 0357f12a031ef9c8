//! Engine and transport configuration.

use std::time::Duration;

/// Default capacity of the engine event broadcast channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Default bound on establishing the WebSocket connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default bound on a single frame write.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Settings for [`WebSocketTransport`](crate::WebSocketTransport).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportConfig {
	/// Upper bound on the TCP/TLS/WebSocket handshake.
	pub connect_timeout: Duration,
	/// Upper bound on each write, flush and close.
	pub send_timeout: Duration,
}

impl Default for TransportConfig {
	fn default() -> Self {
		Self {
			connect_timeout: DEFAULT_CONNECT_TIMEOUT,
			send_timeout: DEFAULT_SEND_TIMEOUT,
		}
	}
}

impl TransportConfig {
	pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
		self.connect_timeout = timeout;
		self
	}

	pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
		self.send_timeout = timeout;
		self
	}
}

/// Settings for [`Engine`](crate::Engine).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
	/// Capacity of the event broadcast channel. Slow subscribers that fall
	/// further behind than this observe a lag and skip events.
	pub event_capacity: usize,
	/// Used when the engine builds its default WebSocket transport.
	pub transport: TransportConfig,
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			event_capacity: DEFAULT_EVENT_CAPACITY,
			transport: TransportConfig::default(),
		}
	}
}

impl EngineConfig {
	pub fn with_event_capacity(mut self, capacity: usize) -> Self {
		self.event_capacity = capacity.max(1);
		self
	}

	pub fn with_transport(mut self, transport: TransportConfig) -> Self {
		self.transport = transport;
		self
	}
}
