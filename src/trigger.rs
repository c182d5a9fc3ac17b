//! Response trigger input.
//!
//! Physical sources (a hardware key, an on-screen button, a Bluetooth
//! shutter remote, or the console) hold cloneable [`TriggerInput`]
//! handles and stamp each event with the monotonic instant at which it
//! occurred. The presentation engine owns the single [`TriggerQueue`]
//! consumer and decides whether an event counts as a response.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

/// Where a trigger event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    /// A physical key on the device.
    HardwareKey,
    /// A touch on the display surface.
    SoftButton,
    /// A paired remote shutter.
    RemoteShutter,
    /// A line typed on the server console.
    Console,
}

/// "A response occurred at `at`."
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerEvent {
    /// Monotonic time of the response.
    pub at: Instant,
    /// Originating input.
    pub source: TriggerSource,
}

/// Producer handle given to trigger sources.
#[derive(Debug, Clone)]
pub struct TriggerInput {
    tx: mpsc::Sender<TriggerEvent>,
}

impl TriggerInput {
    /// Report a trigger that happened just now.
    ///
    /// Returns `false` if the event could not be queued.
    pub fn fire(&self, source: TriggerSource) -> bool {
        self.fire_at(source, Instant::now())
    }

    /// Report a trigger that happened at `at`.
    ///
    /// Never blocks; when the queue is full the event is dropped, since
    /// the engine accepts at most one response per trial anyway.
    pub fn fire_at(&self, source: TriggerSource, at: Instant) -> bool {
        match self.tx.try_send(TriggerEvent { at, source }) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!(?source, "trigger queue full, event dropped");
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!(?source, "trigger queue closed, event dropped");
                false
            }
        }
    }
}

/// Consumer side of the trigger channel.
#[derive(Debug)]
pub struct TriggerQueue {
    rx: mpsc::Receiver<TriggerEvent>,
}

impl TriggerQueue {
    /// Drop every queued event, returning how many were discarded.
    pub fn discard_pending(&mut self) -> usize {
        let mut discarded = 0;
        while self.rx.try_recv().is_ok() {
            discarded += 1;
        }
        discarded
    }

    /// Wait for the next event; `None` once every producer is gone.
    pub async fn recv(&mut self) -> Option<TriggerEvent> {
        self.rx.recv().await
    }
}

/// Create a bounded trigger channel.
#[must_use]
pub fn channel(capacity: usize) -> (TriggerInput, TriggerQueue) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (TriggerInput { tx }, TriggerQueue { rx })
}

/// Spawn a source that fires one [`TriggerSource::Console`] event per
/// line read from stdin.
#[must_use]
pub fn spawn_stdin_source(input: TriggerInput, ct: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(
        async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            info!("console trigger source ready; press enter to respond");
            loop {
                tokio::select! {
                    () = ct.cancelled() => break,
                    line = lines.next_line() => match line {
                        Ok(Some(_)) => {
                            input.fire(TriggerSource::Console);
                        }
                        Ok(None) => {
                            debug!("stdin closed");
                            break;
                        }
                        Err(err) => {
                            warn!(%err, "stdin read failed");
                            break;
                        }
                    }
                }
            }
        }
        .instrument(info_span!("stdin_trigger")),
    )
}
