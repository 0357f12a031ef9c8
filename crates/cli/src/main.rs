use clap::Parser;
use ddp_cli::{cli::Cli, commands, logging, output::Printer};

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	let printer = Printer::new(cli.format);

	if let Err(err) = commands::dispatch(cli).await {
		printer.failure(&err);
		std::process::exit(1);
	}
}
