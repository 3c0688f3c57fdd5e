//! Campaign execution: the same trial, many times, until the first failure

use serde::Serialize;

use crate::buffer::OutputBuffer;
use crate::error::{Error, Result};
use crate::trial::{TrialOutcome, TrialRunner};

/// Per-trial summary kept for every executed trial
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TrialStatus {
    Passed { elapsed_ms: u64 },
    Timeout { output_closed: bool },
    Error { message: String },
}

impl From<&TrialOutcome> for TrialStatus {
    fn from(outcome: &TrialOutcome) -> Self {
        match outcome {
            TrialOutcome::Matched { elapsed, .. } => TrialStatus::Passed {
                elapsed_ms: elapsed.as_millis() as u64,
            },
            TrialOutcome::TimedOut { output_closed, .. } => TrialStatus::Timeout {
                output_closed: *output_closed,
            },
            TrialOutcome::ProcessError { error, .. } => TrialStatus::Error {
                message: error.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TrialRecord {
    pub trial: usize,
    pub outcome: TrialStatus,
}

/// Diagnostics for the trial that stopped the campaign
#[derive(Debug, Clone, Serialize)]
pub struct Failure {
    pub trial: usize,
    pub missing: Vec<String>,
    /// Spawn or read error, when the child never produced a verdict
    pub error: Option<String>,
    pub output: OutputBuffer,
}

/// Everything a finished campaign has to say
#[derive(Debug, Clone, Serialize)]
pub struct CampaignResult {
    pub planned: usize,
    pub passed: usize,
    pub trials: Vec<TrialRecord>,
    pub failure: Option<Failure>,
}

impl CampaignResult {
    pub fn executed(&self) -> usize {
        self.trials.len()
    }

    pub fn failed(&self) -> usize {
        self.executed() - self.passed
    }

    pub fn all_passed(&self) -> bool {
        self.failure.is_none() && self.passed == self.planned
    }
}

/// Runs trials sequentially and stops at the first one that does not match
#[derive(Debug)]
pub struct Campaign {
    trial_count: usize,
    runner: TrialRunner,
}

impl Campaign {
    pub fn new(trial_count: usize, runner: TrialRunner) -> Result<Self> {
        if trial_count == 0 {
            return Err(Error::Config("trial count must be at least 1".to_string()));
        }
        Ok(Self {
            trial_count,
            runner,
        })
    }

    pub fn trial_count(&self) -> usize {
        self.trial_count
    }

    pub fn runner(&self) -> &TrialRunner {
        &self.runner
    }

    pub async fn run(&self) -> CampaignResult {
        self.run_with(|_, _| {}).await
    }

    /// Run the campaign, handing each outcome to `observe` as soon as it is known
    pub async fn run_with<F>(&self, mut observe: F) -> CampaignResult
    where
        F: FnMut(usize, &TrialOutcome),
    {
        let mut trials = Vec::with_capacity(self.trial_count);
        let mut passed = 0;
        let mut failure = None;

        for trial in 1..=self.trial_count {
            let outcome = self.runner.run().await;
            observe(trial, &outcome);
            trials.push(TrialRecord {
                trial,
                outcome: TrialStatus::from(&outcome),
            });

            if outcome.is_pass() {
                passed += 1;
                tracing::info!(
                    trial,
                    elapsed_ms = outcome.elapsed().map(|d| d.as_millis() as u64),
                    "Trial passed"
                );
                continue;
            }

            let missing = self
                .runner
                .patterns()
                .missing(outcome.output().as_bytes())
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>();
            tracing::warn!(
                trial,
                outcome = outcome.label(),
                missing = missing.len(),
                "Trial failed, stopping campaign"
            );
            failure = Some(Failure {
                trial,
                missing,
                error: outcome.error().map(String::from),
                output: outcome.into_output(),
            });
            break;
        }

        CampaignResult {
            planned: self.trial_count,
            passed,
            trials,
            failure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::PatternSet;
    use std::time::Duration;

    fn runner(script: &str) -> TrialRunner {
        let patterns = PatternSet::new(["ready", "done"]).unwrap();
        TrialRunner::new(
            "sh",
            vec!["-c".into(), script.into()],
            patterns,
            Duration::from_secs(5),
        )
    }

    #[test]
    fn test_zero_trials_rejected() {
        let err = Campaign::new(0, runner("true")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_status_from_outcome() {
        let outcome = TrialOutcome::Matched {
            output: OutputBuffer::from("ready done"),
            elapsed: Duration::from_millis(42),
        };
        assert_eq!(
            TrialStatus::from(&outcome),
            TrialStatus::Passed { elapsed_ms: 42 }
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_all_trials_pass() {
        let campaign = Campaign::new(3, runner("echo ready; echo done")).unwrap();
        let mut seen = Vec::new();
        let result = campaign.run_with(|n, o| seen.push((n, o.is_pass()))).await;
        assert!(result.all_passed());
        assert_eq!(result.executed(), 3);
        assert_eq!(result.passed, 3);
        assert_eq!(result.failed(), 0);
        assert_eq!(seen, vec![(1, true), (2, true), (3, true)]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_first_trial_failure_stops_campaign() {
        let campaign = Campaign::new(4, runner("echo ready; echo boom")).unwrap();
        let result = campaign.run().await;
        assert!(!result.all_passed());
        assert_eq!(result.executed(), 1);
        assert_eq!(result.passed, 0);
        let failure = result.failure.expect("failure recorded");
        assert_eq!(failure.trial, 1);
        assert_eq!(failure.missing, vec!["done".to_string()]);
        assert_eq!(failure.output.text(), "ready\nboom\n");
        assert_eq!(failure.error, None);
    }

    #[tokio::test]
    async fn test_spawn_error_is_kept_in_failure() {
        let patterns = PatternSet::new(["ready"]).unwrap();
        let runner = TrialRunner::new(
            "/nonexistent/make",
            vec![],
            patterns,
            Duration::from_secs(1),
        );
        let result = Campaign::new(2, runner).unwrap().run().await;
        let failure = result.failure.expect("failure recorded");
        let error = failure.error.expect("spawn error kept");
        assert!(error.contains("/nonexistent/make"), "error was: {error}");
        assert!(failure.output.is_empty());
    }
}
