use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

pub fn init_logging(verbosity: u8) {
	let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(verbosity)));

	let stderr = std::io::stderr.with_max_level(tracing::Level::TRACE);

	tracing_subscriber::fmt()
		.with_env_filter(env_filter)
		.with_writer(stderr)
		.with_target(true)
		.with_level(true)
		.compact()
		.init();
}

/// Filter used when `RUST_LOG` is unset.
fn default_filter(verbosity: u8) -> &'static str {
	// 0 = command errors only; the engine reports through events
	// 1 (-v) = connection lifecycle and login progress, socket noise at warn
	// 2 (-vv) = every frame the engine sends or receives
	// 3+ = everything, tungstenite included
	match verbosity {
		0 => "error,ddp_runtime=off",
		1 => "warn,ddp=info,ddp_cli=info,ddp_runtime=info",
		2 => "warn,ddp=debug,ddp_cli=debug,ddp_runtime=debug",
		_ => "trace",
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn verbosity_levels_target_this_workspace() {
		assert_eq!(default_filter(0), "error,ddp_runtime=off");
		assert!(default_filter(1).contains("ddp_runtime=info"));
		assert!(default_filter(1).starts_with("warn,"));
		assert!(default_filter(2).contains("ddp_runtime=debug"));
		assert_eq!(default_filter(7), "trace");
		for verbosity in 0..4 {
			assert!(EnvFilter::try_new(default_filter(verbosity)).is_ok());
		}
	}
}
