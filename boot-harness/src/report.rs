//! Human-readable and JSON campaign reports
//!
//! The text report goes to stdout and is meant to be scraped by CI logs, so
//! the failing trial's output is fenced with `=` rulers.

use std::io::{self, Write};
use std::path::Path;

use colored::Colorize;

use crate::campaign::{Campaign, CampaignResult};
use crate::error::Result;
use crate::pattern::PatternSet;
use crate::trial::TrialOutcome;

const SECTION_RULE: usize = 50;
const DUMP_RULE: usize = 80;

/// Campaign header: trial count, command and every expected pattern
pub fn banner(w: &mut impl Write, campaign: &Campaign) -> io::Result<()> {
    let runner = campaign.runner();
    writeln!(
        w,
        "{} {} trials of '{}' (liveness timeout {} ms)",
        "Running".cyan().bold(),
        campaign.trial_count(),
        runner.command_line(),
        runner.liveness_timeout().as_millis()
    )?;
    writeln!(w, "Expected output:")?;
    for pattern in runner.patterns().iter() {
        writeln!(w, "  - {pattern}")?;
    }
    writeln!(w, "{}", "-".repeat(SECTION_RULE))
}

/// One progress line per finished trial
pub fn trial_line(
    w: &mut impl Write,
    trial: usize,
    outcome: &TrialOutcome,
    patterns: &PatternSet,
) -> io::Result<()> {
    match outcome {
        TrialOutcome::Matched { elapsed, .. } => writeln!(
            w,
            "Trial #{trial:03} {} in {:.3}s",
            "PASSED".green(),
            elapsed.as_secs_f64()
        ),
        TrialOutcome::TimedOut { output, output_closed } => {
            let reason = if *output_closed {
                "child closed its output"
            } else {
                "deadline reached"
            };
            writeln!(
                w,
                "Trial #{trial:03} {} ({reason}), missing: {:?}",
                "TIMEOUT".red(),
                patterns.missing(output.as_bytes())
            )
        }
        TrialOutcome::ProcessError { error, .. } => {
            writeln!(w, "Trial #{trial:03} {}: {error}", "ERROR".red())
        }
    }
}

/// Totals, plus the full dump of the failing trial if there was one
pub fn summary(w: &mut impl Write, result: &CampaignResult) -> io::Result<()> {
    writeln!(w, "{}", "-".repeat(SECTION_RULE))?;
    writeln!(
        w,
        "trials run: {}, passed: {}, failed: {}",
        result.executed(),
        result.passed,
        result.failed()
    )?;

    let Some(failure) = &result.failure else {
        return writeln!(
            w,
            "{}",
            format!("All {} trials passed", result.passed).green().bold()
        );
    };

    writeln!(w)?;
    if !failure.missing.is_empty() {
        writeln!(w, "Missing patterns:")?;
        for pattern in &failure.missing {
            writeln!(w, "  - {pattern}")?;
        }
    }
    writeln!(w, "Full output of failing trial #{}:", failure.trial)?;
    writeln!(w, "{}", "=".repeat(DUMP_RULE))?;
    if let Some(error) = &failure.error {
        writeln!(w, "error: {error}")?;
    }
    write!(w, "{}", failure.output)?;
    if !failure.output.is_empty() && !failure.output.as_bytes().ends_with(b"\n") {
        writeln!(w)?;
    }
    writeln!(w, "{}", "=".repeat(DUMP_RULE))?;
    writeln!(
        w,
        "{}",
        format!("Campaign failed at trial #{}", failure.trial).red().bold()
    )
}

/// Write the campaign result as pretty JSON
pub fn write_json(path: &Path, result: &CampaignResult) -> Result<()> {
    let file = std::fs::File::create(path)?;
    let mut writer = io::BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, result)?;
    writer.flush()?;
    Ok(())
}
