//! TCP server tests against a real loopback listener.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use opi_server::display::Scene;
use opi_server::models::background::Background;
use opi_server::protocol::dispatcher::{CommandDispatcher, DispatchOptions};
use opi_server::protocol::server::ProtocolServer;
use opi_server::protocol::OK;

use super::test_helpers::{rig, Rig, BACKGROUND_PARAMS};

const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

struct TcpClient {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl TcpClient {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("connect");
        let (reader, writer) = stream.into_split();
        Self {
            lines: BufReader::new(reader).lines(),
            writer,
        }
    }

    async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\n").as_bytes())
            .await
            .expect("send");
    }

    async fn recv(&mut self) -> Option<String> {
        timeout(REPLY_TIMEOUT, self.lines.next_line())
            .await
            .expect("reply within timeout")
            .expect("read reply")
    }
}

struct RunningServer {
    addr: SocketAddr,
    scene: Scene,
    ct: CancellationToken,
    handle: JoinHandle<CommandDispatcher>,
}

fn start_server() -> RunningServer {
    let Rig {
        dispatcher, scene, ..
    } = rig(DispatchOptions::default());
    let server = ProtocolServer::bind(
        "127.0.0.1:0".parse().expect("loopback address"),
        dispatcher,
    )
    .expect("bind loopback");
    let addr = server.local_addr().expect("local addr");
    let ct = CancellationToken::new();
    let handle = tokio::spawn(server.run(ct.clone()));
    RunningServer {
        addr,
        scene,
        ct,
        handle,
    }
}

#[tokio::test]
async fn serves_metrics_over_tcp() {
    let server = start_server();
    let mut client = TcpClient::connect(server.addr).await;

    client.send("OPI_GET_METRICS").await;
    let mut lines = Vec::new();
    for _ in 0..9 {
        lines.push(client.recv().await.expect("metrics line"));
    }
    assert_eq!(lines[0], "1920");
    assert_eq!(lines[8], "-1.0");

    server.ct.cancel();
    server.handle.await.expect("server joins");
}

#[tokio::test]
async fn close_ends_session_and_next_client_is_served() {
    let server = start_server();

    let mut first = TcpClient::connect(server.addr).await;
    first.send("OPI_CLOSE").await;
    assert_eq!(first.recv().await.as_deref(), Some(OK));
    assert_eq!(first.recv().await, None, "server closes the socket");

    let mut second = TcpClient::connect(server.addr).await;
    second.send("OPI_GET_METRICS").await;
    assert_eq!(second.recv().await.as_deref(), Some("1920"));

    server.ct.cancel();
    server.handle.await.expect("server joins");
}

#[tokio::test]
async fn disconnect_resets_background_before_next_session() {
    let server = start_server();

    let mut first = TcpClient::connect(server.addr).await;
    first
        .send(&format!("OPI_SET_BACKGROUND {BACKGROUND_PARAMS}"))
        .await;
    assert_eq!(first.recv().await.as_deref(), Some(OK));
    assert_ne!(server.scene.current().background, Background::default());
    drop(first);

    // The second session only starts once the first has been torn down.
    let mut second = TcpClient::connect(server.addr).await;
    second.send("OPI_GET_METRICS").await;
    assert!(second.recv().await.is_some());
    assert_eq!(server.scene.current().background, Background::default());

    server.ct.cancel();
    server.handle.await.expect("server joins");
}

#[tokio::test]
async fn cancellation_during_a_session_returns_dispatcher() {
    let server = start_server();

    let mut client = TcpClient::connect(server.addr).await;
    client
        .send(&format!("OPI_SET_BACKGROUND {BACKGROUND_PARAMS}"))
        .await;
    assert_eq!(client.recv().await.as_deref(), Some(OK));

    server.ct.cancel();
    let dispatcher = timeout(REPLY_TIMEOUT, server.handle)
        .await
        .expect("server stops promptly")
        .expect("server joins");

    assert_eq!(dispatcher.background(), Background::default());
    assert!(!dispatcher.engine().trial_in_progress());
}

#[tokio::test]
async fn cancellation_while_idle_stops_the_server() {
    let server = start_server();
    server.ct.cancel();

    let dispatcher = timeout(REPLY_TIMEOUT, server.handle)
        .await
        .expect("server stops promptly")
        .expect("server joins");
    assert_eq!(dispatcher.background(), Background::default());
}
