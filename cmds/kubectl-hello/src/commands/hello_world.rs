//! `hello-world` command handler.

use std::io::Write;

use anyhow::{Context, Result};
use clap::Args;
use tracing::Level;

use super::util::InertArgs;

#[derive(Args, Debug, Clone, Default)]
pub struct HelloWorldArgs {
	/// Output format. Accepted for kubectl compatibility; has no effect
	#[arg(short = 'o', long)]
	pub output: Option<String>,

	/// Accepted for kubectl compatibility; nothing is recorded
	#[arg(long)]
	pub record: bool,

	/// Log level (trace, debug, info, warn, error). Defaults to $RUST_LOG, then warn
	#[arg(long)]
	pub log_level: Option<Level>,
}

/// Run the hello-world command.
pub fn run<W: Write>(args: HelloWorldArgs, mut writer: W) -> Result<()> {
	InertArgs {
		output: args.output.as_deref(),
	}
	.warn_if_set();

	writeln!(writer, "Hello world").context("writing greeting")?;
	writer.flush().context("writing greeting")
}
