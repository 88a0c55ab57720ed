//! Endpoint integration tests over real loopback UDP sockets.

use std::net::SocketAddr;
use std::time::Duration;

use netump_tokio::{NetUmpConfig, NetUmpEndpoint, NetUmpError, SessionState, UmpHandler};
use tokio::sync::mpsc;

const NOTE_ON: u32 = 0x2091_4040;

/// Poll `condition` every few milliseconds until it holds or the deadline
/// passes.
async fn wait_for(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Handler forwarding every UMP message into a channel.
fn channel_handler() -> (Box<dyn UmpHandler>, mpsc::UnboundedReceiver<Vec<u32>>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handler = move |message: &[u32]| {
        let _ = tx.send(message.to_vec());
    };
    (Box::new(handler), rx)
}

async fn open_loopback_pair() -> (
    NetUmpEndpoint,
    NetUmpEndpoint,
    mpsc::UnboundedReceiver<Vec<u32>>,
    mpsc::UnboundedReceiver<Vec<u32>>,
) {
    let (listener_handler, listener_rx) = channel_handler();
    let listener = NetUmpConfig::new()
        .endpoint_name("loopback-listener")
        .listen(0, listener_handler)
        .await
        .expect("bind listener");

    let remote: SocketAddr = format!("127.0.0.1:{}", listener.local_addr().port())
        .parse()
        .expect("addr");

    let (initiator_handler, initiator_rx) = channel_handler();
    let initiator = NetUmpConfig::new()
        .endpoint_name("loopback-initiator")
        .initiate(remote, 0, initiator_handler)
        .await
        .expect("bind initiator");

    wait_for("initiator to open", || {
        initiator.status() == SessionState::Opened
    })
    .await;
    wait_for("listener to open", || {
        listener.status() == SessionState::Opened
    })
    .await;

    (initiator, listener, initiator_rx, listener_rx)
}

#[tokio::test]
async fn session_opens_and_round_trips_both_ways() {
    let (initiator, listener, mut initiator_rx, mut listener_rx) = open_loopback_pair().await;

    assert!(initiator.send_ump(&[NOTE_ON]));
    let received = tokio::time::timeout(Duration::from_secs(5), listener_rx.recv())
        .await
        .expect("listener delivery timed out")
        .expect("listener channel closed");
    assert_eq!(received, vec![NOTE_ON]);

    // The listener can talk back on the same session.
    let midi2_note = [0x4090_4000, 0x8000_0000];
    assert!(listener.send_ump(&midi2_note));
    let received = tokio::time::timeout(Duration::from_secs(5), initiator_rx.recv())
        .await
        .expect("initiator delivery timed out")
        .expect("initiator channel closed");
    assert_eq!(received, midi2_note.to_vec());

    initiator.close().await.expect("close initiator");
    listener.close().await.expect("close listener");
}

#[tokio::test]
async fn initiator_close_notifies_listener() {
    let (initiator, listener, _initiator_rx, _listener_rx) = open_loopback_pair().await;

    initiator.close().await.expect("close initiator");

    wait_for("listener to return to wait-invite", || {
        listener.status() == SessionState::WaitInvite
    })
    .await;
    wait_for("peer-closed latch", || listener.read_and_clear_peer_closed()).await;
    assert!(!listener.read_and_clear_peer_closed(), "edge-triggered");

    listener.close().await.expect("close listener");
}

#[tokio::test]
async fn listener_bye_restarts_the_initiator() {
    let (initiator, listener, _initiator_rx, _listener_rx) = open_loopback_pair().await;

    listener.close().await.expect("close listener");

    wait_for("initiator to re-invite", || {
        initiator.status() == SessionState::Invite
    })
    .await;
    wait_for("connection-lost latch", || {
        initiator.read_and_clear_connection_lost()
    })
    .await;

    // The session is gone, so producers are rejected again.
    assert!(!initiator.send_ump(&[NOTE_ON]));

    initiator.close().await.expect("close initiator");
}

#[tokio::test]
async fn bind_failure_reports_transport_unavailable() {
    let (handler, _rx) = channel_handler();
    let listener = NetUmpConfig::new()
        .listen(0, handler)
        .await
        .expect("bind listener");
    let taken_port = listener.local_addr().port();

    let (handler, _rx) = channel_handler();
    let error = NetUmpConfig::new()
        .listen(taken_port, handler)
        .await
        .expect_err("second bind on the same port must fail");
    assert!(matches!(error, NetUmpError::TransportUnavailable(_)));

    listener.close().await.expect("close listener");
}
