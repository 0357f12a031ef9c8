use anyhow::Result;
use tokio_stream::StreamExt;
use tracing::{debug, info};

use super::Session;
use crate::cli::ConnectionArgs;
use crate::output::Printer;

/// Prints every engine event until Ctrl-C or the engine stops.
pub async fn execute(args: &ConnectionArgs, printer: Printer) -> Result<()> {
	let mut session = Session::start(args)?;
	let mut stream = session.stream();

	loop {
		tokio::select! {
			_ = tokio::signal::ctrl_c() => {
				info!("interrupted");
				break;
			}
			next = stream.next() => match next {
				Some(Ok(event)) => printer.event(&event),
				Some(Err(lagged)) => debug!(error = %lagged, "event stream lagged"),
				None => break,
			}
		}
	}

	session.close().await;
	Ok(())
}
