//! Presentation engine: stimulus timing and response capture.
//!
//! A trial runs on absolute deadlines measured from onset on the
//! monotonic tokio clock:
//!
//! | Deadline           | Effect                                              |
//! |--------------------|-----------------------------------------------------|
//! | end of step `i`    | show step `i + 1`, or hold the last step            |
//! | onset + `d`        | clear the stimulus; background only from here on    |
//! | onset + `w`        | close the window; not seen                          |
//!
//! The engine sleeps until the nearest deadline or the next trigger event,
//! whichever comes first; nothing spins. A trigger stamped at `t` after
//! onset is accepted when `min_response <= t < w`. Once a response is
//! accepted the trial ends as soon as `d` has elapsed. Steps scheduled to
//! run past `d` are cut off when the stimulus is cleared.

pub mod phase;

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, info_span, Instrument};

use crate::display::Scene;
use crate::models::stimulus::Stimulus;
use crate::trigger::{TriggerEvent, TriggerQueue};

pub use phase::{TrialOutcome, TrialPhase};

/// Runs one trial at a time against the live scene.
#[derive(Debug)]
pub struct PresentationEngine {
    scene: Scene,
    triggers: TriggerQueue,
    phase: watch::Sender<TrialPhase>,
    min_response: Duration,
}

/// Absolute deadlines of one trial.
#[derive(Debug, Clone, Copy)]
struct Timeline {
    onset: Instant,
    accept_from: Instant,
    min_end: Instant,
    window_end: Instant,
}

impl Timeline {
    fn new(onset: Instant, min_response: Duration, stimulus: &Stimulus) -> Self {
        Self {
            onset,
            accept_from: onset + min_response,
            min_end: onset + stimulus.duration(),
            window_end: onset + stimulus.window(),
        }
    }

    /// Latency of `event` if it falls inside the acceptance window.
    fn accept(&self, event: &TriggerEvent) -> Option<Duration> {
        (event.at >= self.accept_from && event.at < self.window_end)
            .then(|| event.at.duration_since(self.onset))
    }
}

impl PresentationEngine {
    /// Create an engine drawing into `scene` and consuming `triggers`.
    #[must_use]
    pub fn new(scene: Scene, triggers: TriggerQueue, min_response: Duration) -> Self {
        let (phase, _rx) = watch::channel(TrialPhase::Idle);
        Self {
            scene,
            triggers,
            phase,
            min_response,
        }
    }

    /// Current trial phase.
    #[must_use]
    pub fn phase(&self) -> TrialPhase {
        *self.phase.borrow()
    }

    /// Observe phase transitions.
    #[must_use]
    pub fn subscribe_phase(&self) -> watch::Receiver<TrialPhase> {
        self.phase.subscribe()
    }

    /// Record a phase reached during parameter negotiation.
    pub fn enter(&self, phase: TrialPhase) {
        self.phase.send_replace(phase);
    }

    /// Whether a trial currently occupies the engine.
    #[must_use]
    pub fn trial_in_progress(&self) -> bool {
        self.phase().is_in_progress()
    }

    /// Present `stimulus` and wait for the outcome.
    ///
    /// Blocks the caller until a response has been accepted and `d` has
    /// elapsed, or until the response window `w` expires.
    pub async fn present(&mut self, stimulus: &Stimulus) -> TrialOutcome {
        let span = info_span!(
            "trial",
            steps = stimulus.steps().len(),
            d_ms = stimulus.duration().as_millis(),
            w_ms = stimulus.window().as_millis(),
        );
        self.run_trial(stimulus).instrument(span).await
    }

    async fn run_trial(&mut self, stimulus: &Stimulus) -> TrialOutcome {
        let stale = self.triggers.discard_pending();
        if stale > 0 {
            debug!(stale, "discarded triggers received outside a trial");
        }

        let steps = stimulus.steps();
        let Some(first) = steps.first().copied() else {
            return TrialOutcome::not_seen();
        };
        let timeline = Timeline::new(Instant::now(), self.min_response, stimulus);

        let mut index = 0;
        let mut step_end = timeline.onset + first.duration;
        let mut stepping = true;
        let mut visible = true;
        let mut response: Option<Duration> = None;
        let mut triggers_open = true;

        self.scene.show_step(first);
        self.enter(TrialPhase::Presenting);

        loop {
            if response.is_some() && !visible {
                break;
            }

            let deadline = match (visible, stepping) {
                (true, true) => step_end.min(timeline.min_end),
                (true, false) => timeline.min_end,
                (false, _) => timeline.window_end,
            };

            tokio::select! {
                biased;

                event = self.triggers.recv(), if triggers_open && response.is_none() => {
                    match event {
                        Some(event) => match timeline.accept(&event) {
                            Some(latency) => {
                                debug!(
                                    source = ?event.source,
                                    latency_ms = latency.as_millis(),
                                    "response accepted"
                                );
                                response = Some(latency);
                            }
                            None => debug!(
                                source = ?event.source,
                                "trigger outside acceptance window ignored"
                            ),
                        },
                        None => {
                            debug!("trigger inputs closed");
                            triggers_open = false;
                        }
                    }
                }

                () = sleep_until(deadline) => {
                    if !visible {
                        break;
                    }
                    if deadline == timeline.min_end {
                        self.scene.clear_stimulus();
                        visible = false;
                        if response.is_none() {
                            self.enter(TrialPhase::ResponseWindowOpen);
                        }
                    } else {
                        index += 1;
                        match steps.get(index) {
                            Some(step) => {
                                self.scene.show_step(*step);
                                step_end += step.duration;
                            }
                            None => stepping = false,
                        }
                    }
                }
            }
        }

        self.scene.clear_stimulus();
        self.enter(TrialPhase::Done);

        let outcome = response.map_or_else(TrialOutcome::not_seen, TrialOutcome::seen_after);
        info!(
            seen = outcome.seen(),
            latency_ms = outcome.latency_ms(),
            steps_shown = index.min(steps.len() - 1) + 1,
            "trial concluded"
        );
        outcome
    }
}
