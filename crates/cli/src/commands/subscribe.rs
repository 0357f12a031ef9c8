use anyhow::Result;
use ddp_runtime::EngineEvent;
use tokio_stream::StreamExt;
use tracing::{debug, info};

use super::{Session, parse_params};
use crate::cli::{ConnectionArgs, SubscribeArgs};
use crate::output::Printer;

/// Subscribes and prints `added`/`changed` documents until Ctrl-C.
pub async fn execute(args: &ConnectionArgs, sub: &SubscribeArgs, printer: Printer) -> Result<()> {
	let params = parse_params(sub.params.as_deref())?;
	let mut session = Session::start(args)?;
	session
		.wait_ready(args.has_credentials(), args.ready_timeout(), printer)
		.await?;

	let id = session.engine.subscribe(&sub.name, params);
	info!(id = %id, name = %sub.name, "subscribed");
	let mut stream = session.stream();

	loop {
		tokio::select! {
			_ = tokio::signal::ctrl_c() => {
				info!("interrupted");
				break;
			}
			next = stream.next() => match next {
				Some(Ok(event @ (EngineEvent::Added(_) | EngineEvent::Changed(_) | EngineEvent::ServerError(_)))) => {
					printer.event(&event)
				}
				Some(Ok(EngineEvent::ConnectedChanged(false))) => {
					info!("connection closed");
					break;
				}
				Some(Ok(_)) => {}
				Some(Err(lagged)) => debug!(error = %lagged, "event stream lagged"),
				None => break,
			}
		}
	}

	session.close().await;
	Ok(())
}
