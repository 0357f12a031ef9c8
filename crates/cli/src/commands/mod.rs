//! Command implementations.
//!
//! Every command builds one engine from the connection flags, drives it on
//! a background task and waits for the session to become usable before
//! doing its own work.

mod call;
mod connect;
mod subscribe;


use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use ddp_runtime::{Engine, EngineEvent, LoginStatus};
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info};

use crate::cli::{Cli, Commands, ConnectionArgs};
use crate::output::Printer;

pub async fn dispatch(cli: Cli) -> Result<()> {
	let printer = Printer::new(cli.format);
	match cli.command {
		Commands::Connect => connect::execute(&cli.connection, printer).await,
		Commands::Call(args) => call::execute(&cli.connection, &args, printer).await,
		Commands::Subscribe(args) => subscribe::execute(&cli.connection, &args, printer).await,
	}
}

/// Parses `--params`: an array is the parameter list, any other value is
/// the single parameter.
pub fn parse_params(raw: Option<&str>) -> Result<Vec<Value>> {
	let Some(raw) = raw else {
		return Ok(Vec::new());
	};
	let value: Value = serde_json::from_str(raw).with_context(|| format!("--params is not valid JSON: {raw}"))?;
	Ok(match value {
		Value::Array(items) => items,
		other => vec![other],
	})
}

/// A started engine whose events are pumped on a background task.
pub(crate) struct Session {
	pub engine: Engine,
	pub events: broadcast::Receiver<EngineEvent>,
	runner: JoinHandle<()>,
}

impl Session {
	/// Builds the engine from the flags and opens the connection.
	pub fn start(args: &ConnectionArgs) -> Result<Self> {
		let url = args.url.as_deref().unwrap_or_default();
		if url.trim().is_empty() {
			bail!("no server given; pass --url or set DDP_URL");
		}

		let provider = Arc::new(args.session());
		let engine = Engine::builder(provider)
			.config(args.engine_config())
			.build();
		// Subscribe before starting so no early event is missed.
		let events = engine.events();
		let runner = {
			let engine = engine.clone();
			tokio::spawn(async move { engine.run().await })
		};
		engine.start().with_context(|| format!("cannot connect to {url}"))?;
		info!(endpoint = ?engine.endpoint().map(|u| u.to_string()), "session started");

		Ok(Self { engine, events, runner })
	}

	/// Waits until the session can serve calls: logged in when credentials
	/// were given, otherwise handshake done.
	pub async fn wait_ready(&mut self, needs_login: bool, limit: Duration, printer: Printer) -> Result<()> {
		let events = &mut self.events;
		let wait = async {
			loop {
				let event = match events.recv().await {
					Ok(event) => event,
					Err(broadcast::error::RecvError::Lagged(skipped)) => {
						debug!(skipped, "event listener lagged");
						continue;
					}
					Err(broadcast::error::RecvError::Closed) => bail!("engine stopped"),
				};
				if let EngineEvent::ServerError(_) | EngineEvent::MalformedFrame(_) = &event {
					printer.event(&event);
				}
				if let Some(outcome) = ready_step(&event, needs_login) {
					return outcome;
				}
			}
		};
		tokio::time::timeout(limit, wait)
			.await
			.map_err(|_| anyhow!("session not ready after {} ms", limit.as_millis()))?
	}

	/// Hands the buffered events over as a stream, keeping a fresh receiver.
	pub fn stream(&mut self) -> BroadcastStream<EngineEvent> {
		let fresh = self.engine.events();
		BroadcastStream::new(std::mem::replace(&mut self.events, fresh))
	}

	pub async fn close(self) {
		self.engine.shutdown();
		let _ = self.runner.await;
	}
}

/// Whether `event` settles readiness, and how.
fn ready_step(event: &EngineEvent, needs_login: bool) -> Option<Result<()>> {
	match event {
		EngineEvent::ConnectedChanged(true) if !needs_login => Some(Ok(())),
		EngineEvent::LoginStatusChanged(LoginStatus::LoggedIn) if needs_login => Some(Ok(())),
		EngineEvent::LoginStatusChanged(LoginStatus::LoginFailed) if needs_login => {
			Some(Err(anyhow!("login failed; check --user/--password or --token")))
		}
		EngineEvent::ConnectedChanged(false) => Some(Err(anyhow!("connection closed before the session was ready"))),
		_ => None,
	}
}
