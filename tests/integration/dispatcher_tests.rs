//! Command dispatcher tests over an in-memory connection.
//!
//! Each test serves one session on a background task and plays the OPI
//! client from the test body, on a paused clock.

use std::time::Duration;

use tokio::time::sleep;

use opi_server::engine::TrialPhase;
use opi_server::models::background::Background;
use opi_server::protocol::dispatcher::DispatchOptions;
use opi_server::protocol::{
    BACKGROUND_INVALID, GLOBAL_INVALID, OK, STEP_INVALID, STEP_TIMEOUT, UNKNOWN_COMMAND,
};
use opi_server::trigger::TriggerSource;
use opi_server::AppError;

use super::test_helpers::{
    duplex_connection, rig, spawn_session, step_line, Rig, BACKGROUND_PARAMS,
};

const METRICS: [&str; 9] = [
    "1920", "1080", "441.0", "442.5", "40.0", "41.0", "42.0", "43.0", "-1.0",
];

fn expected_background() -> Background {
    let tokens: Vec<&str> = BACKGROUND_PARAMS.split(' ').collect();
    Background::parse(&tokens).expect("valid background")
}

// ── Metrics and background ──────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn metrics_reply_has_nine_lines_in_order() {
    let Rig { dispatcher, .. } = rig(DispatchOptions::default());
    let (mut client, conn) = duplex_connection();
    let _session = spawn_session(dispatcher, conn);

    client.send("OPI_GET_METRICS").await;
    assert_eq!(client.recv_n(9).await, METRICS);
}

#[tokio::test(start_paused = true)]
async fn metrics_report_latest_light_reading() {
    let Rig {
        dispatcher, light, ..
    } = rig(DispatchOptions::default());
    let (mut client, conn) = duplex_connection();
    let _session = spawn_session(dispatcher, conn);

    light.record(12.5);
    client.send("OPI_GET_METRICS").await;
    let lines = client.recv_n(9).await;
    assert_eq!(lines[8], "12.5");
}

#[tokio::test(start_paused = true)]
async fn valid_background_is_applied() {
    let Rig {
        dispatcher, scene, ..
    } = rig(DispatchOptions::default());
    let (mut client, conn) = duplex_connection();
    let _session = spawn_session(dispatcher, conn);

    client
        .send(&format!("OPI_SET_BACKGROUND {BACKGROUND_PARAMS}"))
        .await;
    assert_eq!(client.recv().await, OK);
    assert_eq!(scene.current().background, expected_background());
}

#[tokio::test(start_paused = true)]
async fn invalid_background_keeps_previous_one() {
    let Rig {
        dispatcher, scene, ..
    } = rig(DispatchOptions::default());
    let (mut client, conn) = duplex_connection();
    let _session = spawn_session(dispatcher, conn);

    client
        .send(&format!("OPI_SET_BACKGROUND {BACKGROUND_PARAMS}"))
        .await;
    assert_eq!(client.recv().await, OK);

    let out_of_range = BACKGROUND_PARAMS.replacen("0.2", "1.5", 1);
    client
        .send(&format!("OPI_SET_BACKGROUND {out_of_range}"))
        .await;
    assert_eq!(client.recv().await, BACKGROUND_INVALID);

    client.send("OPI_SET_BACKGROUND 2 0.1").await;
    assert_eq!(client.recv().await, BACKGROUND_INVALID);

    assert_eq!(scene.current().background, expected_background());
}

#[tokio::test(start_paused = true)]
async fn non_utf8_background_is_rejected_and_session_continues() {
    let Rig {
        dispatcher, scene, ..
    } = rig(DispatchOptions::default());
    let (mut client, conn) = duplex_connection();
    let session = spawn_session(dispatcher, conn);

    let mut line = b"OPI_SET_BACKGROUND 2 0.".to_vec();
    line.push(0xB5);
    line.extend_from_slice(b" 1 1 1 1 0 cross 1.5 -2 0.5 0.5 45 0.8 0 1 0 1");
    client.send_raw(&line).await;
    assert_eq!(client.recv().await, BACKGROUND_INVALID);

    client.send("OPI_GET_METRICS").await;
    assert_eq!(client.recv_n(9).await, METRICS);
    assert_eq!(scene.current().background, Background::default());
    assert!(!session.is_finished());
}

// ── PRESENT ─────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn present_acknowledges_each_line_then_reports_response() {
    let Rig {
        dispatcher,
        triggers,
        ..
    } = rig(DispatchOptions::default());
    let (mut client, conn) = duplex_connection();
    let _session = spawn_session(dispatcher, conn);

    client.send("OPI_PRESENT 3 500 2000").await;
    assert_eq!(client.recv().await, OK);
    for duration in [100, 100, 300] {
        client.send(&step_line(duration)).await;
        assert_eq!(client.recv().await, OK);
    }

    sleep(Duration::from_millis(1200)).await;
    triggers.fire(TriggerSource::HardwareKey);

    assert_eq!(client.recv_n(3).await, ["", "true", "1200"]);
}

#[tokio::test(start_paused = true)]
async fn present_without_response_reports_not_seen() {
    let Rig { dispatcher, .. } = rig(DispatchOptions::default());
    let (mut client, conn) = duplex_connection();
    let _session = spawn_session(dispatcher, conn);

    client.send("OPI_PRESENT 1 200 1000").await;
    assert_eq!(client.recv().await, OK);
    client.send(&step_line(200)).await;
    assert_eq!(client.recv().await, OK);

    assert_eq!(client.recv_n(3).await, ["", "false", "0"]);
}

#[tokio::test(start_paused = true)]
async fn malformed_second_step_aborts_after_two_acknowledgements() {
    let Rig { dispatcher, .. } = rig(DispatchOptions::default());
    let (mut client, conn) = duplex_connection();
    let session = spawn_session(dispatcher, conn);

    client.send("OPI_PRESENT 3 500 2000").await;
    assert_eq!(client.recv().await, OK);
    client.send(&step_line(100)).await;
    assert_eq!(client.recv().await, OK);
    client.send("2 circle 10 -5 0.43").await;
    assert_eq!(client.recv().await, STEP_INVALID);

    // The session is back to reading commands; no third step is expected.
    client.send("OPI_GET_METRICS").await;
    assert_eq!(client.recv_n(9).await, METRICS);

    client.shutdown().await;
    let (dispatcher, result) = session.await.expect("session task joins");
    result.expect("session ends cleanly");
    assert_eq!(dispatcher.engine().phase(), TrialPhase::Aborted);
}

#[tokio::test(start_paused = true)]
async fn out_of_range_step_is_rejected() {
    let Rig { dispatcher, .. } = rig(DispatchOptions::default());
    let (mut client, conn) = duplex_connection();
    let _session = spawn_session(dispatcher, conn);

    client.send("OPI_PRESENT 1 500 2000").await;
    assert_eq!(client.recv().await, OK);
    client.send(&step_line(100).replace(" 0.75 ", " 2 ")).await;
    assert_eq!(client.recv().await, STEP_INVALID);
}

#[tokio::test(start_paused = true)]
async fn invalid_global_parameters_consume_no_step_lines() {
    let Rig { dispatcher, .. } = rig(DispatchOptions::default());
    let (mut client, conn) = duplex_connection();
    let _session = spawn_session(dispatcher, conn);

    client.send("OPI_PRESENT 1 500 400").await;
    assert_eq!(client.recv().await, GLOBAL_INVALID);

    // A step line sent anyway is read as an (unknown) command and ignored.
    client.send(&step_line(100)).await;
    client.send("OPI_GET_METRICS").await;
    assert_eq!(client.recv().await, METRICS[0]);
}

#[tokio::test(start_paused = true)]
async fn present_with_missing_global_parameters_is_rejected() {
    let Rig { dispatcher, .. } = rig(DispatchOptions::default());
    let (mut client, conn) = duplex_connection();
    let _session = spawn_session(dispatcher, conn);

    client.send("OPI_PRESENT").await;
    assert_eq!(client.recv().await, GLOBAL_INVALID);
}

#[tokio::test(start_paused = true)]
async fn step_line_timeout_aborts_but_keeps_the_session() {
    let Rig { dispatcher, .. } = rig(DispatchOptions {
        step_read_timeout: Some(Duration::from_secs(5)),
        reply_to_unknown: false,
    });
    let (mut client, conn) = duplex_connection();
    let session = spawn_session(dispatcher, conn);

    client.send("OPI_PRESENT 2 500 2000").await;
    assert_eq!(client.recv().await, OK);
    client.send(&step_line(100)).await;
    assert_eq!(client.recv().await, OK);

    assert_eq!(client.recv().await, STEP_TIMEOUT);

    client.send("OPI_GET_METRICS").await;
    assert_eq!(client.recv().await, METRICS[0]);

    client.shutdown().await;
    let (dispatcher, result) = session.await.expect("session task joins");
    result.expect("session ends cleanly");
    assert_eq!(dispatcher.engine().phase(), TrialPhase::Aborted);
}

#[tokio::test(start_paused = true)]
async fn disconnect_mid_exchange_ends_the_session() {
    let Rig {
        dispatcher, scene, ..
    } = rig(DispatchOptions::default());
    let (mut client, conn) = duplex_connection();
    let session = spawn_session(dispatcher, conn);

    client
        .send(&format!("OPI_SET_BACKGROUND {BACKGROUND_PARAMS}"))
        .await;
    assert_eq!(client.recv().await, OK);
    client.send("OPI_PRESENT 2 500 2000").await;
    assert_eq!(client.recv().await, OK);
    client.shutdown().await;

    let (dispatcher, result) = session.await.expect("session task joins");
    assert!(matches!(result, Err(AppError::Protocol(_))), "got {result:?}");
    assert_eq!(dispatcher.engine().phase(), TrialPhase::Aborted);
    assert_eq!(scene.current().background, Background::default());
}

// ── Unknown, blank, and CLOSE ───────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn unknown_commands_are_ignored_by_default() {
    let Rig { dispatcher, .. } = rig(DispatchOptions::default());
    let (mut client, conn) = duplex_connection();
    let _session = spawn_session(dispatcher, conn);

    client.send("OPI_CALIBRATE 1 2 3").await;
    client.send("").await;
    client.send("   ").await;
    client.send("OPI_GET_METRICS").await;
    assert_eq!(client.recv().await, METRICS[0]);
}

#[tokio::test(start_paused = true)]
async fn unknown_commands_can_be_answered() {
    let Rig { dispatcher, .. } = rig(DispatchOptions {
        step_read_timeout: None,
        reply_to_unknown: true,
    });
    let (mut client, conn) = duplex_connection();
    let _session = spawn_session(dispatcher, conn);

    client.send("OPI_CALIBRATE").await;
    assert_eq!(
        client.recv().await,
        format!("{UNKNOWN_COMMAND} OPI_CALIBRATE")
    );
}

#[tokio::test(start_paused = true)]
async fn close_resets_background_and_ends_session() {
    let Rig {
        dispatcher, scene, ..
    } = rig(DispatchOptions::default());
    let (mut client, conn) = duplex_connection();
    let session = spawn_session(dispatcher, conn);

    client
        .send(&format!("OPI_SET_BACKGROUND {BACKGROUND_PARAMS}"))
        .await;
    assert_eq!(client.recv().await, OK);

    client.send("OPI_CLOSE").await;
    assert_eq!(client.recv().await, OK);
    assert_eq!(client.try_recv().await, None, "server closes the stream");

    let (dispatcher, result) = session.await.expect("session task joins");
    result.expect("close is a clean end");
    assert_eq!(dispatcher.background(), Background::default());
    assert_eq!(scene.current().background, Background::default());
}

#[tokio::test(start_paused = true)]
async fn client_eof_resets_background() {
    let Rig {
        dispatcher, scene, ..
    } = rig(DispatchOptions::default());
    let (mut client, conn) = duplex_connection();
    let session = spawn_session(dispatcher, conn);

    client
        .send(&format!("OPI_SET_BACKGROUND {BACKGROUND_PARAMS}"))
        .await;
    assert_eq!(client.recv().await, OK);
    client.shutdown().await;

    let (_dispatcher, result) = session.await.expect("session task joins");
    result.expect("eof is a clean end");
    assert_eq!(scene.current().background, Background::default());
}
