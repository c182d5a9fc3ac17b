//! Trial lifecycle phases and outcome.

use std::fmt;
use std::time::Duration;

/// Where the current PRESENT exchange stands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TrialPhase {
    /// No trial in progress.
    #[default]
    Idle,
    /// PRESENT received; global parameters being validated.
    AwaitingGlobalParams,
    /// Waiting for the step line with this index.
    AwaitingStepParams(usize),
    /// Stimulus on screen.
    Presenting,
    /// Stimulus cleared, response window still open.
    ResponseWindowOpen,
    /// Trial concluded with an outcome.
    Done,
    /// Parameter negotiation failed; nothing was presented.
    Aborted,
}

impl TrialPhase {
    /// Whether a trial currently occupies the session.
    #[must_use]
    pub fn is_in_progress(self) -> bool {
        !matches!(self, Self::Idle | Self::Done | Self::Aborted)
    }
}

impl fmt::Display for TrialPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::AwaitingGlobalParams => f.write_str("awaiting global params"),
            Self::AwaitingStepParams(index) => write!(f, "awaiting step {index}"),
            Self::Presenting => f.write_str("presenting"),
            Self::ResponseWindowOpen => f.write_str("response window open"),
            Self::Done => f.write_str("done"),
            Self::Aborted => f.write_str("aborted"),
        }
    }
}

/// Result of one presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrialOutcome {
    /// Time from onset to the accepted response, if any.
    pub latency: Option<Duration>,
}

impl TrialOutcome {
    /// Outcome with no response.
    #[must_use]
    pub fn not_seen() -> Self {
        Self { latency: None }
    }

    /// Outcome for a response `latency` after onset.
    #[must_use]
    pub fn seen_after(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
        }
    }

    /// Response latency in whole milliseconds; `0` when not seen.
    #[must_use]
    pub fn latency_ms(&self) -> u64 {
        self.latency
            .map_or(0, |latency| u64::try_from(latency.as_millis()).unwrap_or(u64::MAX))
    }

    /// Whether the stimulus was seen (`latency_ms > 0`).
    #[must_use]
    pub fn seen(&self) -> bool {
        self.latency_ms() > 0
    }

    /// The three result lines: error text (empty), `true`/`false`, latency.
    #[must_use]
    pub fn to_lines(&self) -> [String; 3] {
        [
            String::new(),
            self.seen().to_string(),
            self.latency_ms().to_string(),
        ]
    }
}
