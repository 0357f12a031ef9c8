//! DDP runtime - Connection lifecycle, correlation, login and retry
//!
//! This crate is the client-side protocol engine for DDP-style servers:
//!
//! - **Transport**: Duplex text socket contract, with a WebSocket implementation
//! - **Correlation**: Request ids matched to completions when `result` arrives
//! - **Login**: Password and resume-token strategies, one attempt each per cycle
//! - **Retry queue**: Persistent calls whose write came up short, drained by a
//!   pluggable [`QueueProcessor`]
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐
//! │   ddp-cli    │  Command-line driver
//! └──────┬───────┘
//!        │ Engine::call / subscribe / events
//! ┌──────▼───────┐
//! │  ddp-runtime │  This crate
//! │  ┌────────┐  │
//! │  │ Engine │  │  Correlation, login, retry queue
//! │  └────────┘  │
//! │  ┌────────┐  │
//! │  │ Trans  │  │  WebSocket transport
//! │  └────────┘  │
//! └──────┬───────┘
//!        │ envelopes
//! ┌──────▼───────┐
//! │ ddp-protocol │  Wire types and codec
//! └──────────────┘
//! ```
//!
//! # Collaborators
//!
//! The engine reads credentials from a [`SessionProvider`], writes through a
//! [`Transport`] and wakes a [`QueueProcessor`] when calls need resending.
//! All three are injected through [`EngineBuilder`]; [`testing`] has
//! recording versions for tests.

pub mod completion;
pub mod config;
pub mod connection;
pub mod error;
pub mod events;
pub mod login;
pub mod retry;
pub mod server_url;
pub mod session;
pub mod testing;
pub mod transport;

// Re-export key types at crate root
pub use completion::{CallError, Completion, MethodOutcome, PendingResult};
pub use config::{EngineConfig, TransportConfig};
pub use connection::{Engine, EngineBuilder, MessageKind};
pub use ddp_protocol::{MethodCall, MethodError, RequestId};
pub use error::{Error, Result};
pub use events::EngineEvent;
pub use login::{LoginStatus, LoginType};
pub use retry::{
	BackoffQueueProcessor, NoopQueueProcessor, QueueProcessor, QueuedCall, RetryHandle,
	RetryPolicy,
};
pub use server_url::websocket_url;
pub use session::{Credentials, MemorySession, SessionProvider};
pub use transport::{
	SessionGeneration, Transport, TransportEvent, TransportEvents, WebSocketTransport,
};
