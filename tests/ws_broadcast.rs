//! End-to-end broadcast tests over real sockets
//!
//! Each test binds an ephemeral port, runs the hub and server tasks, and
//! drives real WebSocket clients against them.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use wshub_rs::{ChatMessage, Hub, HubConfig, HubHandle, HubServer, ServerConfig};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

async fn start_server(hub_config: HubConfig, max_connections: usize) -> (SocketAddr, HubHandle) {
    let (hub, handle) = Hub::new(hub_config);
    tokio::spawn(hub.run());

    let config = ServerConfig::with_addr("127.0.0.1:0".parse().unwrap())
        .max_connections(max_connections);
    let server = HubServer::bind(config, handle.clone()).await.unwrap();
    let addr = server.local_addr();
    tokio::spawn(async move { server.run().await });

    (addr, handle)
}

async fn connect(addr: SocketAddr) -> Client {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", addr))
        .await
        .unwrap();
    ws
}

async fn send(client: &mut Client, username: &str, body: &str) {
    let json = serde_json::to_string(&ChatMessage::new(username, body)).unwrap();
    client.send(Message::text(json)).await.unwrap();
}

async fn recv(client: &mut Client) -> ChatMessage {
    loop {
        let frame = timeout(WAIT, client.next())
            .await
            .expect("timed out waiting for message")
            .expect("connection ended")
            .expect("read failed");
        if let Message::Text(txt) = frame {
            return serde_json::from_str(txt.as_str()).unwrap();
        }
    }
}

async fn wait_for_count(handle: &HubHandle, expected: usize) {
    timeout(WAIT, async {
        while handle.connection_count() != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("registry never reached expected size");
}

#[tokio::test]
async fn broadcast_reaches_every_client_including_sender() {
    let (addr, handle) = start_server(HubConfig::default(), 0).await;

    let mut a = connect(addr).await;
    let mut b = connect(addr).await;
    let mut c = connect(addr).await;
    wait_for_count(&handle, 3).await;

    send(&mut a, "a", "hi").await;

    let expected = ChatMessage::new("a", "hi");
    assert_eq!(recv(&mut a).await, expected);
    assert_eq!(recv(&mut b).await, expected);
    assert_eq!(recv(&mut c).await, expected);
}

#[tokio::test]
async fn dead_connection_is_pruned_and_others_still_receive() {
    let (addr, handle) = start_server(HubConfig::default(), 0).await;

    let mut a = connect(addr).await;
    let b = connect(addr).await;
    let mut c = connect(addr).await;
    wait_for_count(&handle, 3).await;

    // B's transport goes away
    drop(b);
    wait_for_count(&handle, 2).await;

    // A later message from C reaches the survivors, with no error raised to C
    send(&mut c, "c", "still here").await;

    let expected = ChatMessage::new("c", "still here");
    assert_eq!(recv(&mut a).await, expected);
    assert_eq!(recv(&mut c).await, expected);
    assert_eq!(handle.connection_count(), 2);
}

#[tokio::test]
async fn messages_arrive_in_send_order() {
    let (addr, handle) = start_server(HubConfig::default(), 0).await;

    let mut a = connect(addr).await;
    let mut b = connect(addr).await;
    wait_for_count(&handle, 2).await;

    for i in 0..5 {
        send(&mut a, "a", &format!("msg-{}", i)).await;
    }

    for i in 0..5 {
        assert_eq!(recv(&mut b).await.message, format!("msg-{}", i));
    }
}

#[tokio::test]
async fn echo_disabled_skips_the_sender() {
    let (addr, handle) = start_server(HubConfig::default().echo_to_sender(false), 0).await;

    let mut a = connect(addr).await;
    let mut b = connect(addr).await;
    wait_for_count(&handle, 2).await;

    send(&mut a, "a", "no echo").await;
    send(&mut a, "a", "second").await;

    assert_eq!(recv(&mut b).await.message, "no echo");
    assert_eq!(recv(&mut b).await.message, "second");

    let silence = timeout(Duration::from_millis(300), a.next()).await;
    assert!(silence.is_err(), "sender should not receive its own message");
}

#[tokio::test]
async fn malformed_payload_terminates_only_that_connection() {
    let (addr, handle) = start_server(HubConfig::default(), 0).await;

    let mut a = connect(addr).await;
    let mut b = connect(addr).await;
    wait_for_count(&handle, 2).await;

    a.send(Message::text("not json")).await.unwrap();
    wait_for_count(&handle, 1).await;

    // B is unaffected
    send(&mut b, "b", "alone now").await;
    assert_eq!(recv(&mut b).await.message, "alone now");
}

#[tokio::test]
async fn upgrade_on_wrong_path_is_rejected() {
    let (addr, _handle) = start_server(HubConfig::default(), 0).await;

    let result = tokio_tungstenite::connect_async(format!("ws://{}/other", addr)).await;

    assert!(result.is_err());
}

#[tokio::test]
async fn connection_limit_rejects_excess_peers() {
    let (addr, handle) = start_server(HubConfig::default(), 1).await;

    let _a = connect(addr).await;
    wait_for_count(&handle, 1).await;

    // The listener drops the socket before the upgrade completes
    let result = tokio_tungstenite::connect_async(format!("ws://{}/ws", addr)).await;
    assert!(result.is_err());
    assert_eq!(handle.connection_count(), 1);
}

#[tokio::test]
async fn registry_registration_tracks_connection_lifecycle() {
    let (addr, handle) = start_server(HubConfig::default(), 0).await;
    assert_eq!(handle.connection_count(), 0);

    let a = connect(addr).await;
    wait_for_count(&handle, 1).await;

    drop(a);
    wait_for_count(&handle, 0).await;

    assert_eq!(handle.stats().total_connections(), 1);
}
