//! Command dispatcher: routes requests and owns the session context.
//!
//! The dispatcher holds the live scene, the presentation engine, and the
//! read-only device collaborators. One client is served at a time; a
//! PRESENT exchange occupies the session until its trial concludes.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWrite;
use tracing::{debug, info, warn};

use crate::display::{Display, LightSensor, Scene};
use crate::engine::{PresentationEngine, TrialPhase};
use crate::models::background::Background;
use crate::models::metrics::DeviceMetrics;
use crate::models::stimulus::{StimulusBuilder, StimulusHeader};
use crate::protocol::command::Command;
use crate::protocol::connection::Connection;
use crate::protocol::{
    tokenize, BACKGROUND_INVALID, GLOBAL_INVALID, OK, STEP_INVALID, STEP_TIMEOUT,
    UNKNOWN_COMMAND,
};
use crate::{AppError, Result};

/// Tunables for request handling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOptions {
    /// Maximum wait for each stimulus step line; `None` waits forever.
    pub step_read_timeout: Option<Duration>,
    /// Reply with an error line to unknown commands.
    pub reply_to_unknown: bool,
}

/// What the session should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep reading commands.
    Continue,
    /// End the session.
    Close,
}

/// Routes protocol commands to their handlers.
pub struct CommandDispatcher {
    scene: Scene,
    engine: PresentationEngine,
    display: Arc<dyn Display>,
    light: Arc<dyn LightSensor>,
    options: DispatchOptions,
}

impl std::fmt::Debug for CommandDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandDispatcher")
            .field("scene", &self.scene)
            .field("engine", &self.engine)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl CommandDispatcher {
    /// Assemble a dispatcher from its collaborators.
    #[must_use]
    pub fn new(
        scene: Scene,
        engine: PresentationEngine,
        display: Arc<dyn Display>,
        light: Arc<dyn LightSensor>,
        options: DispatchOptions,
    ) -> Self {
        Self {
            scene,
            engine,
            display,
            light,
            options,
        }
    }

    /// Background currently on screen.
    #[must_use]
    pub fn background(&self) -> Background {
        self.scene.current().background
    }

    /// The presentation engine.
    #[must_use]
    pub fn engine(&self) -> &PresentationEngine {
        &self.engine
    }

    /// Current device metrics.
    #[must_use]
    pub fn metrics(&self) -> DeviceMetrics {
        DeviceMetrics {
            screen: self.display.metrics(),
            light_level: self.light.light_level(),
        }
    }

    /// Serve one client until it closes, sends `OPI_CLOSE`, or fails.
    ///
    /// The scene is reset to the default background whenever the session
    /// ends, however it ends.
    ///
    /// # Errors
    ///
    /// Returns the transport error that ended the session.
    pub async fn serve<W>(&mut self, conn: &mut Connection<W>) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let result = self.command_loop(conn).await;
        self.end_session();
        result
    }

    async fn command_loop<W>(&mut self, conn: &mut Connection<W>) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        while let Some(line) = conn.next_line().await? {
            let Some(command) = Command::parse(&line) else {
                continue;
            };
            if self.handle(command, conn).await? == Flow::Close {
                break;
            }
        }
        Ok(())
    }

    /// Handle one command, writing its reply lines to `conn`.
    ///
    /// # Errors
    ///
    /// Returns a transport error; parameter errors are answered on the
    /// connection and do not surface here.
    pub async fn handle<W>(&mut self, command: Command, conn: &mut Connection<W>) -> Result<Flow>
    where
        W: AsyncWrite + Unpin,
    {
        debug!(command = command.name(), "dispatch");
        match command {
            Command::GetMetrics => {
                conn.send_lines(self.metrics().to_lines()).await?;
            }
            Command::SetBackground(params) => {
                let reply = self.set_background(&params);
                conn.send_line(reply).await?;
            }
            Command::Present(params) => {
                self.present(&params, conn).await?;
            }
            Command::Close => {
                self.scene.reset();
                conn.send_line(OK).await?;
                info!("client closed the session");
                return Ok(Flow::Close);
            }
            Command::Unknown(name) => {
                warn!(command = %name, "unknown command");
                if self.options.reply_to_unknown {
                    conn.send_line(format!("{UNKNOWN_COMMAND} {name}")).await?;
                }
            }
        }
        Ok(Flow::Continue)
    }

    /// Validate and apply a background; returns the reply line.
    fn set_background(&mut self, params: &[String]) -> &'static str {
        let tokens: Vec<&str> = params.iter().map(String::as_str).collect();
        match Background::parse(&tokens) {
            Ok(background) => {
                self.scene.set_background(background);
                info!(%background, "background changed");
                OK
            }
            Err(err) => {
                warn!(%err, "background rejected");
                BACKGROUND_INVALID
            }
        }
    }

    /// Negotiate stimulus parameters, run the trial, and report its outcome.
    async fn present<W>(&mut self, params: &[String], conn: &mut Connection<W>) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        self.engine.enter(TrialPhase::AwaitingGlobalParams);
        let tokens: Vec<&str> = params.iter().map(String::as_str).collect();
        let header = match StimulusHeader::parse(&tokens) {
            Ok(header) => header,
            Err(err) if err.is_parameter_error() => {
                warn!(%err, "stimulus header rejected");
                return self.abort(conn, GLOBAL_INVALID).await;
            }
            Err(err) => {
                self.engine.enter(TrialPhase::Aborted);
                return Err(err);
            }
        };
        conn.send_line(OK).await?;

        let mut builder = StimulusBuilder::new(header);
        while !builder.is_complete() {
            let index = builder.next_index();
            self.engine.enter(TrialPhase::AwaitingStepParams(index));

            let line = match conn.next_line_within(self.options.step_read_timeout).await {
                Ok(line) => line,
                Err(AppError::Timeout(msg)) => {
                    warn!(step = index, %msg, "step line timed out");
                    return self.abort(conn, STEP_TIMEOUT).await;
                }
                Err(err) => {
                    self.engine.enter(TrialPhase::Aborted);
                    return Err(err);
                }
            };

            match builder.push_tokens(&tokenize(&line)) {
                Ok(()) => {}
                Err(err) if err.is_parameter_error() => {
                    warn!(step = index, %err, "stimulus step rejected");
                    return self.abort(conn, STEP_INVALID).await;
                }
                Err(err) => {
                    self.engine.enter(TrialPhase::Aborted);
                    return Err(err);
                }
            }
            conn.send_line(OK).await?;
        }

        let stimulus = builder.build()?;
        let outcome = self.engine.present(&stimulus).await;
        conn.send_lines(outcome.to_lines()).await
    }

    async fn abort<W>(&mut self, conn: &mut Connection<W>, reply: &str) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        self.engine.enter(TrialPhase::Aborted);
        conn.send_line(reply).await
    }

    /// Restore defaults after a session, however it ended.
    pub fn end_session(&mut self) {
        self.scene.reset();
        if self.engine.trial_in_progress() {
            self.engine.enter(TrialPhase::Aborted);
        }
    }
}
