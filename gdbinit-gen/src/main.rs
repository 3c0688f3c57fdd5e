use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod gdbinit;
mod macros;

#[derive(Parser)]
#[command(name = "gdbinit-gen", about = "Generate a .gdbinit sized by kernel cache macros")]
struct Cli {
    /// Headers to scan for NFILE, NIOBUF and NINODE
    #[arg(required = true)]
    headers: Vec<PathBuf>,

    /// Where to write the generated script
    #[arg(short, long, default_value = ".gdbinit")]
    output: PathBuf,

    /// gdbserver address of the emulator
    #[arg(short, long, default_value = "127.0.0.1:1234")]
    remote: String,

    /// Kernel ELF to load symbols from
    #[arg(short, long, default_value = "kernel")]
    symbol_file: String,
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    tracing::info!(headers = cli.headers.len(), "Scanning kernel headers");

    let sizes = macros::scrape(&cli.headers)?;
    let target = gdbinit::Target {
        remote: cli.remote,
        symbol_file: cli.symbol_file,
    };
    std::fs::write(&cli.output, gdbinit::render(&sizes, &target))
        .with_context(|| format!("writing {}", cli.output.display()))?;

    tracing::info!(output = %cli.output.display(), "Wrote gdb init script");
    Ok(())
}
