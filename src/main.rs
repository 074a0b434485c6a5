use std::io;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use mdpdf::Config;

#[derive(Parser)]
#[command(name = "mdpdf", version)]
#[command(about = "Convert document.md in the current directory to document.pdf")]
struct Cli {}

fn main() -> Result<()> {
    let _cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let config = Config::compiled_default();
    let output = &config.paths.output;

    mdpdf::convert(&config.paths.input, output, &config)?;
    println!("PDF created: {}", output.display());
    Ok(())
}
