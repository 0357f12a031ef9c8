use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde_json::Value;
use tracing::info;

use super::{Session, parse_params};
use crate::cli::{CallArgs, ConnectionArgs};
use crate::output::Printer;

/// Calls one method and prints its result.
pub async fn execute(args: &ConnectionArgs, call: &CallArgs, printer: Printer) -> Result<()> {
	let params = parse_params(call.params.as_deref())?;
	let mut session = Session::start(args)?;
	session
		.wait_ready(args.has_credentials(), args.ready_timeout(), printer)
		.await?;

	let (id, pending) = session.engine.call_typed::<Value>(&call.method, params, call.kind());
	info!(id = %id, method = %call.method, "call sent");

	let limit = Duration::from_millis(call.timeout_ms);
	let outcome = tokio::time::timeout(limit, pending)
		.await
		.map_err(|_| anyhow!("no result for {} after {} ms", call.method, call.timeout_ms));
	session.close().await;

	let value = outcome?.with_context(|| format!("{} failed", call.method))?;
	printer.result(id, Ok(&value));
	Ok(())
}
