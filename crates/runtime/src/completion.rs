//! Completion handles for pending method calls.
//!
//! A call's completion is consumed exactly once: by its `result`, or by the
//! disconnect policy with [`CallError::ConnectionLost`].

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};

use ddp_protocol::MethodError;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::{Error, Result};

/// Why a call did not produce a value.
#[derive(Debug, Clone, PartialEq)]
pub enum CallError {
	/// The server answered with an error object.
	Method(MethodError),
	/// The connection dropped before the result arrived.
	ConnectionLost,
}

impl fmt::Display for CallError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			CallError::Method(error) => write!(f, "{error}"),
			CallError::ConnectionLost => f.write_str("connection lost"),
		}
	}
}

impl From<CallError> for Error {
	fn from(error: CallError) -> Self {
		match error {
			CallError::Method(error) => Error::Method {
				code: error.code(),
				reason: error.to_string(),
			},
			CallError::ConnectionLost => Error::ConnectionLost,
		}
	}
}

/// Outcome handed to a completion.
pub type MethodOutcome = std::result::Result<Value, CallError>;

type Callback = Box<dyn FnOnce(MethodOutcome) + Send + 'static>;

/// What to do with a call's outcome.
#[derive(Default)]
pub enum Completion {
	/// Drop the outcome. Installed when the caller supplies nothing.
	#[default]
	Noop,
	/// Invoke a one-shot function.
	Callback(Callback),
	/// Send through a oneshot channel (backs [`PendingResult`]).
	Sink(oneshot::Sender<MethodOutcome>),
}

impl Completion {
	pub fn callback<F>(f: F) -> Self
	where
		F: FnOnce(MethodOutcome) + Send + 'static,
	{
		Completion::Callback(Box::new(f))
	}

	/// Creates a sink completion and the typed future reading from it.
	pub fn typed<T: DeserializeOwned>() -> (Self, PendingResult<T>) {
		let (tx, rx) = oneshot::channel();
		(
			Completion::Sink(tx),
			PendingResult {
				rx,
				_marker: PhantomData,
			},
		)
	}

	pub fn complete(self, outcome: MethodOutcome) {
		match self {
			Completion::Noop => {}
			Completion::Callback(f) => f(outcome),
			Completion::Sink(tx) => {
				let _ = tx.send(outcome);
			}
		}
	}

	pub fn kind(&self) -> &'static str {
		match self {
			Completion::Noop => "noop",
			Completion::Callback(_) => "callback",
			Completion::Sink(_) => "sink",
		}
	}
}

impl fmt::Debug for Completion {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Completion").field(&self.kind()).finish()
	}
}

/// Future resolving to the decoded result of a call.
///
/// Dropping it does not cancel the call; the outcome is discarded when it
/// arrives.
pub struct PendingResult<T> {
	rx: oneshot::Receiver<MethodOutcome>,
	_marker: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> Future for PendingResult<T> {
	type Output = Result<T>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		match Pin::new(&mut self.rx).poll(cx) {
			Poll::Ready(Ok(Ok(value))) => Poll::Ready(serde_json::from_value(value).map_err(Into::into)),
			Poll::Ready(Ok(Err(error))) => Poll::Ready(Err(error.into())),
			Poll::Ready(Err(_)) => Poll::Ready(Err(Error::ChannelClosed)),
			Poll::Pending => Poll::Pending,
		}
	}
}

impl<T> fmt::Debug for PendingResult<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("PendingResult").finish_non_exhaustive()
	}
}
