//! In-memory collaborators for driving an [`Engine`](crate::Engine) in
//! tests: a transport that records what the engine writes and lets the test
//! play the server, and a queue processor that records signals.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use ddp_protocol::RequestId;
use parking_lot::Mutex;
use serde_json::Value;
use url::Url;

use crate::retry::{QueueProcessor, RetryHandle};
use crate::transport::{Transport, TransportEvents};

#[derive(Default)]
struct Recorded {
	opened: Vec<Url>,
	sessions: Vec<TransportEvents>,
	sent: Vec<String>,
	closes: usize,
	flushes: usize,
}

/// [`Transport`] that keeps every frame instead of sending it.
///
/// Sessions become valid on [`open`](Transport::open), or on
/// [`connect`](RecordingTransport::connect) after
/// [`defer_connect`](RecordingTransport::defer_connect). Nothing is emitted
/// until the test calls `connect` or [`receive`](RecordingTransport::receive).
#[derive(Default)]
pub struct RecordingTransport {
	recorded: Mutex<Recorded>,
	valid: AtomicBool,
	/// Upcoming writes that report zero bytes.
	short_writes: AtomicUsize,
	/// When set, every write reports zero bytes.
	refuse_writes: AtomicBool,
	/// When set, opened sessions stay unwritable until `connect`.
	defer_connect: AtomicBool,
}

impl RecordingTransport {
	pub fn new() -> Self {
		Self::default()
	}

	/// Makes the next `count` writes fail.
	pub fn fail_next_writes(&self, count: usize) {
		self.short_writes.store(count, Ordering::SeqCst);
	}

	/// Makes every write fail until called again with `false`.
	pub fn refuse_writes(&self, refuse: bool) {
		self.refuse_writes.store(refuse, Ordering::SeqCst);
	}

	/// Keeps new sessions in the connecting state until [`connect`](Self::connect).
	pub fn defer_connect(&self, defer: bool) {
		self.defer_connect.store(defer, Ordering::SeqCst);
	}

	/// Sink of the most recent session.
	pub fn events(&self) -> Option<TransportEvents> {
		self.recorded.lock().sessions.last().cloned()
	}

	/// Sink of the `index`-th session (0-based).
	pub fn session(&self, index: usize) -> Option<TransportEvents> {
		self.recorded.lock().sessions.get(index).cloned()
	}

	/// Reports the socket as open on the current session.
	pub fn connect(&self) {
		if let Some(events) = self.events() {
			self.valid.store(true, Ordering::SeqCst);
			events.connected();
		}
	}

	/// Delivers a server frame on the current session.
	pub fn receive(&self, frame: impl Into<String>) {
		if let Some(events) = self.events() {
			events.text(frame);
		}
	}

	/// Delivers a JSON server message on the current session.
	pub fn receive_json(&self, message: Value) {
		self.receive(message.to_string());
	}

	/// Drops the socket from the server side.
	pub fn drop_connection(&self, reason: Option<&str>) {
		self.valid.store(false, Ordering::SeqCst);
		if let Some(events) = self.events() {
			events.disconnected(reason.map(str::to_string));
		}
	}

	pub fn opened(&self) -> Vec<Url> {
		self.recorded.lock().opened.clone()
	}

	pub fn close_count(&self) -> usize {
		self.recorded.lock().closes
	}

	pub fn flush_count(&self) -> usize {
		self.recorded.lock().flushes
	}

	/// Frames written so far, as text.
	pub fn sent(&self) -> Vec<String> {
		self.recorded.lock().sent.clone()
	}

	/// Frames written so far, parsed.
	pub fn sent_messages(&self) -> Vec<Value> {
		self.sent()
			.iter()
			.filter_map(|frame| serde_json::from_str(frame).ok())
			.collect()
	}

	/// Written frames whose `msg` is `kind`.
	pub fn sent_of_kind(&self, kind: &str) -> Vec<Value> {
		self.sent_messages()
			.into_iter()
			.filter(|message| message["msg"] == kind)
			.collect()
	}

	/// Written `method` frames calling `method`.
	pub fn sent_calls(&self, method: &str) -> Vec<Value> {
		self.sent_of_kind("method")
			.into_iter()
			.filter(|message| message["method"] == method)
			.collect()
	}

	/// Id of the last `method` frame calling `method`.
	pub fn last_call_id(&self, method: &str) -> Option<RequestId> {
		self.sent_calls(method)
			.last()
			.map(|message| RequestId::from_value(&message["id"]))
	}

	pub fn clear_sent(&self) {
		self.recorded.lock().sent.clear();
	}
}

impl Transport for RecordingTransport {
	fn open(&self, url: &Url, events: TransportEvents) {
		let mut recorded = self.recorded.lock();
		recorded.opened.push(url.clone());
		recorded.sessions.push(events);
		self.valid
			.store(!self.defer_connect.load(Ordering::SeqCst), Ordering::SeqCst);
	}

	fn send_text(&self, text: &str) -> usize {
		if self.refuse_writes.load(Ordering::SeqCst) {
			return 0;
		}
		let short = self
			.short_writes
			.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
			.is_ok();
		if short {
			return 0;
		}
		self.recorded.lock().sent.push(text.to_string());
		text.len()
	}

	fn flush(&self) {
		self.recorded.lock().flushes += 1;
	}

	fn close(&self) {
		self.recorded.lock().closes += 1;
		self.valid.store(false, Ordering::SeqCst);
	}

	fn is_valid(&self) -> bool {
		self.valid.load(Ordering::SeqCst)
	}
}

/// [`QueueProcessor`] that only remembers it was signalled.
#[derive(Default)]
pub struct RecordingQueueProcessor {
	handles: Mutex<Vec<RetryHandle>>,
}

impl RecordingQueueProcessor {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn signals(&self) -> usize {
		self.handles.lock().len()
	}

	/// Handle from the latest signal.
	pub fn last_handle(&self) -> Option<RetryHandle> {
		self.handles.lock().last().cloned()
	}
}

impl QueueProcessor for RecordingQueueProcessor {
	fn process_queue(&self, handle: RetryHandle) {
		self.handles.lock().push(handle);
	}
}
