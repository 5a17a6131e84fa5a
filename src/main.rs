//! dealscope command-line entry point.

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use dealscope::cli::{Cli, execute};

fn init_tracing(verbose: bool) {
    let default = if verbose { "dealscope=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[allow(clippy::print_stdout)]
fn emit(output: &str) {
    if output.is_empty() {
        return;
    }
    print!("{output}");
    if !output.ends_with('\n') {
        println!();
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let output = execute(&cli).context("dealscope failed")?;
    emit(&output);
    Ok(())
}
