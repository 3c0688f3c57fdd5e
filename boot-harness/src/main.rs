use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use boot_harness::{logging, report, Campaign, Config};

#[derive(Parser)]
#[command(name = "boot-harness", about = "Repeated boot-trace test for the emulated kernel")]
#[command(version, long_about = None)]
struct Cli {
    /// TOML config file (command, campaign timing, patterns)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of trials to run
    #[arg(short = 'n', long)]
    trials: Option<usize>,

    /// Liveness timeout per trial, in milliseconds
    #[arg(short, long = "timeout-ms")]
    timeout_ms: Option<u64>,

    /// Wait between SIGTERM and SIGKILL, in milliseconds
    #[arg(long = "grace-ms")]
    grace_ms: Option<u64>,

    /// Expected output pattern (regex). Repeat to replace the default set
    #[arg(short, long = "expect")]
    expect: Vec<String>,

    /// Also write the campaign result as JSON
    #[arg(long)]
    report_json: Option<PathBuf>,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,

    /// Boot command and its arguments (default: make qemu CPUS=1)
    #[arg(last = true)]
    command: Vec<String>,
}

impl Cli {
    fn into_config(self) -> Result<(Config, Option<PathBuf>)> {
        let mut config = Config::load(self.config.as_deref())?;

        if let Some(trials) = self.trials {
            config.campaign.trials = trials;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.campaign.timeout_ms = timeout_ms;
        }
        if let Some(grace_ms) = self.grace_ms {
            config.campaign.grace_ms = grace_ms;
        }
        if !self.expect.is_empty() {
            config.patterns = self.expect;
        }
        if let Some((program, args)) = self.command.split_first() {
            config.command.program = program.clone();
            config.command.args = args.to_vec();
        }

        Ok((config, self.report_json))
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(2)
        }
    }
}

/// Returns whether every trial passed
async fn run(cli: Cli) -> Result<bool> {
    let (config, report_json) = cli.into_config()?;

    let runner = config.trial_runner()?;
    let campaign = Campaign::new(config.campaign.trials, runner)?;

    match which::which(&config.command.program) {
        Ok(path) => tracing::debug!(path = %path.display(), "Resolved boot command"),
        Err(e) => tracing::warn!(
            program = %config.command.program,
            error = %e,
            "Boot command not found on PATH"
        ),
    }

    tracing::info!(
        command = %campaign.runner().command_line(),
        trials = campaign.trial_count(),
        timeout_ms = config.campaign.timeout_ms,
        "Starting boot campaign"
    );

    let mut stdout = std::io::stdout().lock();
    report::banner(&mut stdout, &campaign)?;

    let patterns = campaign.runner().patterns().clone();
    let result = campaign
        .run_with(|trial, outcome| {
            if let Err(e) = report::trial_line(&mut stdout, trial, outcome, &patterns) {
                tracing::warn!(error = %e, "Failed to write progress line");
            }
            if let Err(e) = stdout.flush() {
                tracing::warn!(error = %e, "Failed to flush progress line");
            }
        })
        .await;

    report::summary(&mut stdout, &result)?;
    stdout.flush()?;

    if let Some(path) = report_json {
        report::write_json(&path, &result)
            .with_context(|| format!("writing JSON report to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Wrote JSON report");
    }

    Ok(result.all_passed())
}
