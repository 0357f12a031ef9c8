//! Wire types for the DDP protocol.
//!
//! This crate is the envelope codec used by `ddp-runtime`. It has no I/O and
//! no state: it turns semantic inputs into outbound JSON envelopes and turns
//! inbound JSON text into [`ServerMessage`] values.
//!
//! # Main Types
//!
//! - [`RequestId`] - Identifier correlating a method call with its result
//! - [`ClientMessage`] - Outbound envelopes (`connect`, `method`, `sub`, `pong`)
//! - [`ServerMessage`] - Inbound messages, parsed with [`parse`]
//! - [`MethodCall`] - Method name plus positional params, with builders for
//!   the login and room methods
//! - [`LoginResult`] - Typed payload of a successful `login` result

pub mod envelope;
pub mod id;
pub mod message;
pub mod methods;

pub use envelope::{ClientMessage, DDP_VERSION, SUPPORTED_VERSIONS};
pub use id::RequestId;
pub use message::{MethodError, MethodResult, ServerMessage, parse};
pub use methods::{LOGIN_METHOD, LoginResult, MethodCall};
