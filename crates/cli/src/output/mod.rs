//! Rendering of engine events and call results.
//!
//! JSON output is one object per line on stdout:
//!
//! ```json
//! {"event":"login","status":"logged_in"}
//! {"event":"result","id":"3","ok":true,"result":["owner"]}
//! ```
//!
//! Text output is coloured for terminals.


use std::io::{self, Write};

use colored::Colorize;
use ddp_runtime::{CallError, EngineEvent, RequestId};
use serde_json::{Value, json};

/// Output format for CLI results.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
	/// Human-readable text
	#[default]
	Text,
	/// One JSON object per line
	Json,
}

/// JSON record for an engine event.
pub fn event_record(event: &EngineEvent) -> Value {
	match event {
		EngineEvent::ConnectedChanged(connected) => json!({"event": "connected", "connected": connected}),
		EngineEvent::LoginStatusChanged(status) => json!({"event": "login", "status": status}),
		EngineEvent::LoginTypeChanged(login_type) => json!({"event": "login_type", "type": login_type}),
		EngineEvent::Result { id, outcome } => result_record(*id, outcome.as_ref()),
		EngineEvent::Added(doc) => json!({"event": "added", "document": doc}),
		EngineEvent::Changed(doc) => json!({"event": "changed", "document": doc}),
		EngineEvent::ServerError(error) => json!({"event": "server_error", "error": error}),
		EngineEvent::MalformedFrame(frame) => json!({"event": "malformed", "frame": frame}),
	}
}

/// JSON record for the outcome of one call.
pub fn result_record(id: RequestId, outcome: Result<&Value, &CallError>) -> Value {
	match outcome {
		Ok(value) => json!({"event": "result", "id": id, "ok": true, "result": value}),
		Err(CallError::Method(error)) => json!({"event": "result", "id": id, "ok": false, "error": error}),
		Err(CallError::ConnectionLost) => {
			json!({"event": "result", "id": id, "ok": false, "error": "connection lost"})
		}
	}
}

fn compact(value: &Value) -> String {
	serde_json::to_string(value).unwrap_or_else(|_| "<unprintable>".to_string())
}

/// One text line for an engine event.
pub fn event_line(event: &EngineEvent) -> String {
	match event {
		EngineEvent::ConnectedChanged(true) => format!("{}", "connected".green().bold()),
		EngineEvent::ConnectedChanged(false) => format!("{}", "disconnected".yellow().bold()),
		EngineEvent::LoginStatusChanged(status) => format!("{} {status}", "login:".cyan()),
		EngineEvent::LoginTypeChanged(login_type) => format!("{} {login_type:?}", "login type:".cyan()),
		EngineEvent::Result { id, outcome } => result_line(*id, outcome.as_ref()),
		EngineEvent::Added(doc) => document_line("added", doc),
		EngineEvent::Changed(doc) => document_line("changed", doc),
		EngineEvent::ServerError(error) => format!("{} {}", "server error:".red().bold(), compact(error)),
		EngineEvent::MalformedFrame(frame) => format!("{} {frame}", "malformed frame:".red()),
	}
}

/// One text line for the outcome of one call.
pub fn result_line(id: RequestId, outcome: Result<&Value, &CallError>) -> String {
	let label = format!("result #{id}:");
	match outcome {
		Ok(value) => format!("{} {}", label.green(), compact(value)),
		Err(error) => format!("{} {}", label.red(), error),
	}
}

fn document_line(kind: &str, doc: &Value) -> String {
	let collection = doc.get("collection").and_then(Value::as_str).unwrap_or("?");
	let id = doc.get("id").and_then(Value::as_str).unwrap_or("?");
	let fields = doc.get("fields").map(compact).unwrap_or_default();
	format!("{} {collection}/{id} {fields}", kind.blue().bold()).trim_end().to_string()
}

/// Writes events and results to stdout in the chosen format.
#[derive(Debug, Clone, Copy)]
pub struct Printer {
	format: OutputFormat,
}

impl Printer {
	pub fn new(format: OutputFormat) -> Self {
		Self { format }
	}

	pub fn event(&self, event: &EngineEvent) {
		match self.format {
			OutputFormat::Json => self.line(&compact(&event_record(event))),
			OutputFormat::Text => self.line(&event_line(event)),
		}
	}

	pub fn result(&self, id: RequestId, outcome: Result<&Value, &CallError>) {
		match self.format {
			OutputFormat::Json => self.line(&compact(&result_record(id, outcome))),
			OutputFormat::Text => self.line(&result_line(id, outcome)),
		}
	}

	/// Reports a failed command; JSON mode also gets an envelope on stdout.
	pub fn failure(&self, error: &anyhow::Error) {
		eprintln!("{} {error:#}", "error:".red().bold());
		if self.format == OutputFormat::Json {
			self.line(&compact(&json!({"ok": false, "error": format!("{error:#}")})));
		}
	}

	fn line(&self, text: &str) {
		let mut stdout = io::stdout().lock();
		let _ = writeln!(stdout, "{text}");
	}
}
