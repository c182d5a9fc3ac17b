//! One client session's line transport.
//!
//! A reader task decodes request lines and queues them; the dispatcher
//! pulls from the queue at its own pace, which lets a PRESENT exchange
//! read its step lines with a bounded wait. Replies go through a
//! [`FramedWrite`] sink that flushes after every line.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, trace, warn};

use crate::protocol::codec::OpiCodec;
use crate::{AppError, Result};

/// Request lines buffered ahead of the dispatcher.
const LINE_QUEUE_DEPTH: usize = 32;

/// Line-oriented duplex transport for one client.
#[derive(Debug)]
pub struct Connection<W> {
    lines: mpsc::Receiver<Result<String>>,
    writer: FramedWrite<W, OpiCodec>,
    reader_task: JoinHandle<()>,
}

impl<W> Connection<W>
where
    W: AsyncWrite + Unpin,
{
    /// Start reading requests from `reader`; replies go to `writer`.
    pub fn new<R>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (tx, lines) = mpsc::channel(LINE_QUEUE_DEPTH);
        let reader_task = tokio::spawn(read_lines(reader, tx));
        Self {
            lines,
            writer: FramedWrite::new(writer, OpiCodec::new()),
            reader_task,
        }
    }

    /// Next request line, or `None` once the client has closed its side.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` when the underlying read failed.
    pub async fn next_line(&mut self) -> Result<Option<String>> {
        self.lines.recv().await.transpose()
    }

    /// Next line, waiting at most `limit` (forever when `None`).
    ///
    /// # Errors
    ///
    /// Returns `AppError::Timeout` when `limit` expires,
    /// `AppError::Protocol` when the client closed the stream, and
    /// `AppError::Io` when the read failed.
    pub async fn next_line_within(&mut self, limit: Option<Duration>) -> Result<String> {
        let next = match limit {
            Some(limit) => tokio::time::timeout(limit, self.next_line())
                .await
                .map_err(|_| {
                    AppError::Timeout(format!("no line within {} ms", limit.as_millis()))
                })??,
            None => self.next_line().await?,
        };
        next.ok_or_else(|| AppError::Protocol("stream closed mid-exchange".into()))
    }

    /// Write and flush one reply line.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` when the write or flush fails.
    pub async fn send_line(&mut self, line: impl Into<String>) -> Result<()> {
        let line = line.into();
        trace!(reply = %line, "send");
        self.writer.send(line).await
    }

    /// Write several reply lines, flushing after each.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` on the first failed write.
    pub async fn send_lines<I>(&mut self, lines: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        for line in lines {
            self.send_line(line).await?;
        }
        Ok(())
    }
}

impl<W> Drop for Connection<W> {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

/// Reader task: decode lines and queue them until EOF or a read error.
async fn read_lines<R>(reader: R, tx: mpsc::Sender<Result<String>>)
where
    R: AsyncRead + Unpin,
{
    let mut framed = FramedRead::new(reader, OpiCodec::new());

    while let Some(item) = framed.next().await {
        let fatal = item.is_err();
        if let Err(ref err) = item {
            warn!(%err, "read failed, reader stopping");
        } else {
            trace!("request line queued");
        }
        if tx.send(item).await.is_err() {
            debug!("line queue closed, reader stopping");
            return;
        }
        if fatal {
            return;
        }
    }

    debug!("client closed the stream");
}
