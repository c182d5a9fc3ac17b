//! Display collaborator boundary and the live scene.
//!
//! The scene (current background plus the stimulus step on screen, if
//! any) lives in a [`watch`] channel. Writers replace it wholesale, and the
//! render loop redraws whenever it changes, so a display only ever sees a
//! complete, validated frame.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, trace, Instrument};

use crate::models::background::Background;
use crate::models::eye::Eye;
use crate::models::metrics::ScreenMetrics;
use crate::models::shape::Shape;
use crate::models::stimulus::StimulusStep;

/// One complete picture to draw.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Frame {
    /// Background field and fixation target.
    pub background: Background,
    /// Stimulus step drawn over the background, if a trial is presenting.
    pub stimulus: Option<StimulusStep>,
}

impl Frame {
    /// What the image for `view` (`Left` or `Right`) contains.
    #[must_use]
    pub fn view(&self, view: Eye) -> EyeView {
        let bg = &self.background;
        let fixation = if bg.fix_eye.shows_in(view) {
            bg.fix_type
        } else {
            Shape::None
        };
        let stimulus = self
            .stimulus
            .filter(|step| step.eye.shows_in(view))
            .map_or(Shape::None, |step| step.shape);
        EyeView {
            background: bg.bg_eye.shows_in(view),
            fixation: fixation.code(),
            stimulus: stimulus.code(),
        }
    }
}

/// Per-eye contents of a frame, as renderer type codes.
///
/// Shape codes are `-1` when nothing is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EyeView {
    /// Whether the background field is filled in this eye.
    pub background: bool,
    /// Fixation target shape code.
    pub fixation: i8,
    /// Stimulus shape code.
    pub stimulus: i8,
}

/// Graphics backend that draws frames and reports screen geometry.
pub trait Display: Send + Sync {
    /// Physical screen properties.
    fn metrics(&self) -> ScreenMetrics;

    /// Draw `frame`. Called from the render loop whenever the scene changes.
    fn render(&self, frame: &Frame);
}

/// Source of the current ambient light reading.
pub trait LightSensor: Send + Sync {
    /// Latest reading; negative when none is available.
    fn light_level(&self) -> f32;
}

/// Lock-free holder for the latest ambient light reading.
#[derive(Debug)]
pub struct AmbientLight {
    bits: AtomicU32,
}

impl AmbientLight {
    /// Create a holder reporting `initial` until the first reading.
    #[must_use]
    pub fn new(initial: f32) -> Self {
        Self {
            bits: AtomicU32::new(initial.to_bits()),
        }
    }

    /// Store a new sensor reading.
    pub fn record(&self, level: f32) {
        self.bits.store(level.to_bits(), Ordering::Release);
    }
}

impl LightSensor for AmbientLight {
    fn light_level(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Acquire))
    }
}

/// Display with no graphics output; frames are traced.
#[derive(Debug, Clone)]
pub struct HeadlessDisplay {
    metrics: ScreenMetrics,
}

impl HeadlessDisplay {
    /// Create a headless display reporting `metrics`.
    #[must_use]
    pub fn new(metrics: ScreenMetrics) -> Self {
        Self { metrics }
    }
}

impl Display for HeadlessDisplay {
    fn metrics(&self) -> ScreenMetrics {
        self.metrics
    }

    fn render(&self, frame: &Frame) {
        match frame.stimulus {
            Some(step) => trace!(
                background = %frame.background,
                stimulus = %step,
                "render frame"
            ),
            None => trace!(background = %frame.background, "render frame"),
        }
        for eye in [Eye::Left, Eye::Right] {
            let view = frame.view(eye);
            trace!(
                ?eye,
                background = view.background,
                fixation = view.fixation,
                stimulus = view.stimulus,
                "render view"
            );
        }
    }
}

/// Shared handle on the live scene.
#[derive(Debug, Clone)]
pub struct Scene {
    tx: Arc<watch::Sender<Frame>>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    /// Create a scene showing the default background.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Frame::default());
        Self { tx: Arc::new(tx) }
    }

    /// Observe scene changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Frame> {
        self.tx.subscribe()
    }

    /// Snapshot of the frame currently on screen.
    #[must_use]
    pub fn current(&self) -> Frame {
        *self.tx.borrow()
    }

    /// Swap in a new background, keeping any stimulus step.
    pub fn set_background(&self, background: Background) {
        self.tx.send_modify(|frame| frame.background = background);
    }

    /// Draw `step` over the background.
    pub fn show_step(&self, step: StimulusStep) {
        self.tx.send_modify(|frame| frame.stimulus = Some(step));
    }

    /// Remove the stimulus, leaving the background only.
    pub fn clear_stimulus(&self) {
        self.tx.send_if_modified(|frame| frame.stimulus.take().is_some());
    }

    /// Restore the default background with no stimulus.
    pub fn reset(&self) {
        self.tx.send_replace(Frame::default());
    }
}

/// Spawn the task that redraws `display` whenever `scene` changes.
#[must_use]
pub fn spawn_render_loop(
    display: Arc<dyn Display>,
    scene: &Scene,
    ct: CancellationToken,
) -> JoinHandle<()> {
    let mut frames = scene.subscribe();

    tokio::spawn(
        async move {
            let initial = *frames.borrow_and_update();
            display.render(&initial);
            loop {
                tokio::select! {
                    () = ct.cancelled() => break,
                    changed = frames.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let frame = *frames.borrow_and_update();
                        display.render(&frame);
                    }
                }
            }
            debug!("render loop stopped");
        }
        .instrument(info_span!("render_loop")),
    )
}
