use std::time::Duration;

use clap::Parser;

use super::*;

#[test]
fn parse_call_command() {
	let args = vec![
		"ddp",
		"--url",
		"https://chat.example.com",
		"call",
		"getRoomRoles",
		"--params",
		r#"["GENERAL"]"#,
		"--persistent",
	];
	let cli = Cli::try_parse_from(args).unwrap();

	assert_eq!(cli.connection.url.as_deref(), Some("https://chat.example.com"));
	match cli.command {
		Commands::Call(args) => {
			assert_eq!(args.method, "getRoomRoles");
			assert_eq!(args.params.as_deref(), Some(r#"["GENERAL"]"#));
			assert_eq!(args.kind(), MessageKind::Persistent);
			assert_eq!(args.timeout_ms, 30_000);
		}
		_ => panic!("Expected Call command"),
	}
}

#[test]
fn call_defaults_to_volatile() {
	let cli = Cli::try_parse_from(["ddp", "call", "ping"]).unwrap();
	match cli.command {
		Commands::Call(args) => assert_eq!(args.kind(), MessageKind::Volatile),
		_ => panic!("Expected Call command"),
	}
}

#[test]
fn parse_subscribe_command() {
	let cli = Cli::try_parse_from([
		"ddp",
		"subscribe",
		"stream-room-messages",
		"--params",
		r#"["GENERAL", false]"#,
	])
	.unwrap();

	match cli.command {
		Commands::Subscribe(args) => {
			assert_eq!(args.name, "stream-room-messages");
			assert!(args.params.is_some());
		}
		_ => panic!("Expected Subscribe command"),
	}
}

#[test]
fn global_flags_after_subcommand() {
	let cli = Cli::try_parse_from([
		"ddp",
		"connect",
		"-vv",
		"--format",
		"json",
		"--user",
		"alice",
		"--password",
		"pw",
	])
	.unwrap();

	assert!(matches!(cli.command, Commands::Connect));
	assert_eq!(cli.verbose, 2);
	assert_eq!(cli.format, OutputFormat::Json);
	assert!(cli.connection.has_credentials());
}

#[test]
fn timeouts_feed_engine_config() {
	let cli = Cli::try_parse_from([
		"ddp",
		"--connect-timeout-ms",
		"1500",
		"--send-timeout-ms",
		"250",
		"connect",
	])
	.unwrap();

	let config = cli.connection.engine_config();
	assert_eq!(config.transport.connect_timeout, Duration::from_millis(1500));
	assert_eq!(config.transport.send_timeout, Duration::from_millis(250));
	assert_eq!(cli.connection.ready_timeout(), Duration::from_secs(30));
}

#[test]
fn session_is_seeded_from_flags() {
	use ddp_runtime::SessionProvider;

	let cli = Cli::try_parse_from([
		"ddp", "--url", "chat.example.com", "--token", "tok", "connect",
	])
	.unwrap();
	assert!(cli.connection.has_credentials());

	let session = cli.connection.session();
	assert_eq!(session.server_url(), "chat.example.com");
	assert_eq!(session.auth_token(), "tok");
	assert_eq!(session.password(), "");
}

#[test]
fn missing_subcommand_is_an_error() {
	assert!(Cli::try_parse_from(["ddp"]).is_err());
}

#[test]
fn unknown_format_is_rejected() {
	assert!(Cli::try_parse_from(["ddp", "-f", "toml", "connect"]).is_err());
}
