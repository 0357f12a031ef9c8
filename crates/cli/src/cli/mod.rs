#[cfg(test)]
mod tests;

use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use ddp_runtime::{EngineConfig, MemorySession, MessageKind, TransportConfig};

use crate::output::OutputFormat;

/// Root CLI for ddp.
#[derive(Parser, Debug)]
#[command(name = "ddp")]
#[command(about = "DDP client - connect, log in, call methods and watch subscriptions")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug, -vvv trace)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Output format: text (default) or json (one object per line)
	#[arg(short = 'f', long, global = true, value_enum, default_value = "text")]
	pub format: OutputFormat,

	#[command(flatten)]
	pub connection: ConnectionArgs,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Connect, log in and print engine events until interrupted.
	Connect,
	/// Call a method once logged in and print its result.
	Call(CallArgs),
	/// Subscribe to a publication and print documents as they arrive.
	Subscribe(SubscribeArgs),
}

/// Where to connect and how to authenticate.
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
	/// Server address (https://host, wss://host/websocket or a bare host)
	#[arg(long, global = true, env = "DDP_URL", value_name = "URL")]
	pub url: Option<String>,

	/// Username for password login
	#[arg(long, global = true, env = "DDP_USER", value_name = "NAME")]
	pub user: Option<String>,

	/// Password for password login
	#[arg(long, global = true, env = "DDP_PASSWORD", value_name = "PASSWORD", hide_env_values = true)]
	pub password: Option<String>,

	/// Resume token from an earlier login
	#[arg(long, global = true, env = "DDP_TOKEN", value_name = "TOKEN", hide_env_values = true)]
	pub token: Option<String>,

	/// Bound on the WebSocket handshake
	#[arg(long, global = true, value_name = "MS", default_value_t = 30_000)]
	pub connect_timeout_ms: u64,

	/// Bound on each frame write
	#[arg(long, global = true, value_name = "MS", default_value_t = 10_000)]
	pub send_timeout_ms: u64,

	/// How long to wait for the session to become ready
	#[arg(long, global = true, value_name = "MS", default_value_t = 30_000)]
	pub ready_timeout_ms: u64,
}

impl ConnectionArgs {
	pub fn has_credentials(&self) -> bool {
		let set = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.is_empty());
		set(&self.password) || set(&self.token)
	}

	/// Session seeded from the flags.
	pub fn session(&self) -> MemorySession {
		let session = MemorySession::new(self.url.clone().unwrap_or_default());
		session.set_username(self.user.clone().unwrap_or_default());
		session.set_password(self.password.clone().unwrap_or_default());
		match self.token.as_deref() {
			Some(token) if !token.is_empty() => session.with_token(token),
			_ => session,
		}
	}

	pub fn engine_config(&self) -> EngineConfig {
		EngineConfig::default().with_transport(
			TransportConfig::default()
				.with_connect_timeout(Duration::from_millis(self.connect_timeout_ms))
				.with_send_timeout(Duration::from_millis(self.send_timeout_ms)),
		)
	}

	pub fn ready_timeout(&self) -> Duration {
		Duration::from_millis(self.ready_timeout_ms)
	}
}

#[derive(Args, Debug, Clone)]
pub struct CallArgs {
	/// Method name, e.g. getPermissions
	#[arg(value_name = "METHOD")]
	pub method: String,

	/// Parameters as JSON; a non-array value is sent as the only parameter
	#[arg(long, value_name = "JSON")]
	pub params: Option<String>,

	/// Queue the call for retry if the write fails
	#[arg(long)]
	pub persistent: bool,

	/// How long to wait for the result
	#[arg(long, value_name = "MS", default_value_t = 30_000)]
	pub timeout_ms: u64,
}

impl CallArgs {
	pub fn kind(&self) -> MessageKind {
		if self.persistent {
			MessageKind::Persistent
		} else {
			MessageKind::Volatile
		}
	}
}

#[derive(Args, Debug, Clone)]
pub struct SubscribeArgs {
	/// Publication name, e.g. stream-room-messages
	#[arg(value_name = "NAME")]
	pub name: String,

	/// Parameters as JSON; a non-array value is sent as the only parameter
	#[arg(long, value_name = "JSON")]
	pub params: Option<String>,
}
