//! Single trial execution
//!
//! A trial spawns the boot command, merges its stdout and stderr into one
//! [`OutputBuffer`], and races the pattern set against a liveness deadline.
//! Whatever the result, the child is stopped before [`TrialRunner::run`]
//! returns.

use std::io;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::buffer::OutputBuffer;
use crate::error::Error;
use crate::pattern::PatternSet;
use crate::process::{self, Termination};

/// Time between SIGTERM and SIGKILL
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_millis(100);

const READ_CHUNK: usize = 4096;
const CHANNEL_DEPTH: usize = 64;

type Chunk = io::Result<Vec<u8>>;

/// How a trial ended, together with everything the child printed
#[derive(Debug, Clone)]
pub enum TrialOutcome {
    /// Every pattern matched
    Matched {
        output: OutputBuffer,
        elapsed: Duration,
    },
    /// The deadline passed, or the child closed its output, before every pattern matched
    TimedOut {
        output: OutputBuffer,
        /// Both pipes hit EOF (usually the child exited) instead of running out the clock
        output_closed: bool,
    },
    /// The child could not be started or its output could not be read
    ProcessError { output: OutputBuffer, error: String },
}

impl TrialOutcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, TrialOutcome::Matched { .. })
    }

    pub fn output(&self) -> &OutputBuffer {
        match self {
            TrialOutcome::Matched { output, .. }
            | TrialOutcome::TimedOut { output, .. }
            | TrialOutcome::ProcessError { output, .. } => output,
        }
    }

    pub fn into_output(self) -> OutputBuffer {
        match self {
            TrialOutcome::Matched { output, .. }
            | TrialOutcome::TimedOut { output, .. }
            | TrialOutcome::ProcessError { output, .. } => output,
        }
    }

    /// Why the child could not be run, for process errors
    pub fn error(&self) -> Option<&str> {
        match self {
            TrialOutcome::ProcessError { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn elapsed(&self) -> Option<Duration> {
        match self {
            TrialOutcome::Matched { elapsed, .. } => Some(*elapsed),
            _ => None,
        }
    }

    /// Short label used in reports
    pub fn label(&self) -> &'static str {
        match self {
            TrialOutcome::Matched { .. } => "passed",
            TrialOutcome::TimedOut { .. } => "timeout",
            TrialOutcome::ProcessError { .. } => "error",
        }
    }
}

/// Runs one spawn-observe-decide cycle of the boot command
#[derive(Debug, Clone)]
pub struct TrialRunner {
    command: String,
    args: Vec<String>,
    patterns: PatternSet,
    liveness_timeout: Duration,
    grace_period: Duration,
}

impl TrialRunner {
    pub fn new(
        command: impl Into<String>,
        args: Vec<String>,
        patterns: PatternSet,
        liveness_timeout: Duration,
    ) -> Self {
        Self {
            command: command.into(),
            args,
            patterns,
            liveness_timeout,
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn patterns(&self) -> &PatternSet {
        &self.patterns
    }

    pub fn liveness_timeout(&self) -> Duration {
        self.liveness_timeout
    }

    /// The command line as it would be typed into a shell
    pub fn command_line(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Execute one trial. Never returns while the child is still running.
    pub async fn run(&self) -> TrialOutcome {
        let start = Instant::now();

        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        process::isolate(&mut cmd);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(source) => {
                let err = Error::Spawn {
                    command: self.command.clone(),
                    source,
                };
                tracing::error!(error = %err, "Trial could not start");
                return TrialOutcome::ProcessError {
                    output: OutputBuffer::new(),
                    error: err.to_string(),
                };
            }
        };
        tracing::debug!(pid = ?child.id(), command = %self.command_line(), "Child spawned");

        let (tx, mut rx) = mpsc::channel(CHANNEL_DEPTH);
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(tokio::spawn(pump(stdout, tx.clone())));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(tokio::spawn(pump(stderr, tx.clone())));
        }
        // Channel closes once both pipes hit EOF
        drop(tx);

        let outcome = self.observe(&mut rx, start).await;

        for reader in &readers {
            reader.abort();
        }
        match process::terminate(&mut child, self.grace_period).await {
            Termination::Forced => tracing::warn!(
                grace_ms = self.grace_period.as_millis() as u64,
                "Child ignored termination request and was killed"
            ),
            how => tracing::debug!(?how, "Child stopped"),
        }

        outcome
    }

    /// Wait for more output or the deadline, whichever comes first
    async fn observe(&self, rx: &mut mpsc::Receiver<Chunk>, start: Instant) -> TrialOutcome {
        let deadline = start + self.liveness_timeout;
        let mut output = OutputBuffer::new();

        loop {
            tokio::select! {
                biased;

                chunk = rx.recv() => match chunk {
                    Some(Ok(bytes)) => {
                        output.append(&bytes);
                        if self.patterns.all_matched(output.as_bytes()) {
                            return TrialOutcome::Matched { elapsed: start.elapsed(), output };
                        }
                        // A child that never stops talking must still run out of time
                        if Instant::now() >= deadline {
                            return TrialOutcome::TimedOut { output, output_closed: false };
                        }
                    }
                    Some(Err(e)) => {
                        return TrialOutcome::ProcessError {
                            error: format!("Failed to read child output: {e}"),
                            output,
                        };
                    }
                    None => {
                        tracing::debug!(bytes = output.len(), "Child closed its output");
                        return if self.patterns.all_matched(output.as_bytes()) {
                            TrialOutcome::Matched { elapsed: start.elapsed(), output }
                        } else {
                            TrialOutcome::TimedOut { output, output_closed: true }
                        };
                    }
                },

                _ = tokio::time::sleep_until(deadline) => {
                    return TrialOutcome::TimedOut { output, output_closed: false };
                }
            }
        }
    }
}

/// Forward raw chunks from one pipe until EOF, a read error, or the trial hangs up
async fn pump<R>(mut reader: R, tx: mpsc::Sender<Chunk>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if tx.send(Ok(buf[..n].to_vec())).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                let _ = tx.send(Err(e)).await;
                break;
            }
        }
    }
}
