//! TCP listener serving one OPI client at a time.
//!
//! The listen backlog is a single slot, and a new connection is accepted
//! only after the previous session has ended. A session that fails is
//! logged and dropped; the server itself keeps running until cancelled.

use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::protocol::connection::Connection;
use crate::protocol::dispatcher::CommandDispatcher;
use crate::{AppError, Result};

/// Pending connections the kernel may hold while a session is active.
const LISTEN_BACKLOG: u32 = 1;

/// Accept loop bound to one listening socket.
#[derive(Debug)]
pub struct ProtocolServer {
    listener: TcpListener,
    dispatcher: CommandDispatcher,
}

impl ProtocolServer {
    /// Bind `addr` and prepare to serve clients through `dispatcher`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the socket cannot be bound.
    pub fn bind(addr: SocketAddr, dispatcher: CommandDispatcher) -> Result<Self> {
        let socket = match addr {
            SocketAddr::V4(_) => TcpSocket::new_v4(),
            SocketAddr::V6(_) => TcpSocket::new_v6(),
        }
        .map_err(|err| AppError::Io(format!("failed to create socket: {err}")))?;

        socket
            .set_reuseaddr(true)
            .map_err(|err| AppError::Io(format!("failed to set SO_REUSEADDR: {err}")))?;
        socket
            .bind(addr)
            .map_err(|err| AppError::Io(format!("failed to bind {addr}: {err}")))?;
        let listener = socket
            .listen(LISTEN_BACKLOG)
            .map_err(|err| AppError::Io(format!("failed to listen on {addr}: {err}")))?;

        Ok(Self {
            listener,
            dispatcher,
        })
    }

    /// Address actually bound (useful when binding port 0).
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the socket address cannot be read.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve clients one after another until `ct` is cancelled.
    ///
    /// Returns the dispatcher so callers can inspect the final state.
    pub async fn run(mut self, ct: CancellationToken) -> CommandDispatcher {
        let span = info_span!("opi_server", addr = ?self.listener.local_addr().ok());
        async {
            info!("OPI server listening");
            loop {
                tokio::select! {
                    () = ct.cancelled() => {
                        info!("OPI server shutting down");
                        break;
                    }
                    accepted = self.listener.accept() => match accepted {
                        Ok((stream, peer)) => self.serve_client(stream, peer, &ct).await,
                        Err(err) => warn!(%err, "accept failed"),
                    }
                }
            }
        }
        .instrument(span)
        .await;

        self.dispatcher
    }

    async fn serve_client(&mut self, stream: TcpStream, peer: SocketAddr, ct: &CancellationToken) {
        let session_id = Uuid::new_v4();
        let span = info_span!("opi_session", %session_id, %peer);
        async {
            info!("client connected");
            if let Err(err) = stream.set_nodelay(true) {
                warn!(%err, "failed to set TCP_NODELAY");
            }
            let (reader, writer) = stream.into_split();
            let mut conn = Connection::new(reader, writer);

            tokio::select! {
                () = ct.cancelled() => {
                    self.dispatcher.end_session();
                    info!("session cancelled by shutdown");
                }
                result = self.dispatcher.serve(&mut conn) => match result {
                    Ok(()) => info!("session ended"),
                    Err(err) => warn!(%err, "session ended with transport error"),
                }
            }
        }
        .instrument(span)
        .await;
    }
}
