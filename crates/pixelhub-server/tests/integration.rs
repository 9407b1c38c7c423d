//! End-to-end integration tests using real WebSocket clients.

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use pixelhub_protocol::{ChunkAssembler, OutboundFrame};
use pixelhub_server::{HubServer, ServerConfig};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

const TIMEOUT: Duration = Duration::from_secs(5);

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Boot a test server on an ephemeral port.
async fn boot_server(config: ServerConfig) -> (String, SocketAddr, HubServer) {
    let server = HubServer::new(ServerConfig {
        host: "127.0.0.1".into(),
        port: 0,
        ..config
    });
    let (addr, _handle) = server.listen().await.unwrap();
    let ws_url = format!("ws://{addr}{}", server.config().ws_path);
    (ws_url, addr, server)
}

async fn boot_default() -> (String, SocketAddr, HubServer) {
    boot_server(ServerConfig::default()).await
}

async fn connect(url: &str) -> WsStream {
    let (ws, _) = connect_async(url).await.unwrap();
    ws
}

/// Wait until the registry holds exactly `n` connections.
async fn wait_for_count(server: &HubServer, n: usize) {
    timeout(TIMEOUT, async {
        while server.registry().count() != n {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| {
        panic!(
            "expected {n} connections, have {}",
            server.registry().count()
        )
    });
}

/// Read the next data frame, skipping control frames.
async fn read_frame(ws: &mut WsStream) -> Message {
    loop {
        let msg = timeout(TIMEOUT, ws.next())
            .await
            .expect("timeout waiting for message")
            .expect("stream closed")
            .expect("ws error");
        match msg {
            Message::Text(_) | Message::Binary(_) => return msg,
            _ => {}
        }
    }
}

async fn read_text(ws: &mut WsStream) -> String {
    match read_frame(ws).await {
        Message::Text(text) => text.as_str().to_owned(),
        other => panic!("expected text frame, got {other:?}"),
    }
}

/// Drive the stream until the server closes it.
async fn expect_closed(ws: &mut WsStream) {
    timeout(TIMEOUT, async {
        loop {
            match ws.next().await {
                None | Some(Err(_) | Ok(Message::Close(_))) => return,
                Some(Ok(_)) => {}
            }
        }
    })
    .await
    .expect("server did not close the connection");
}

fn pixel_fields(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("{},{},{:04x}", i % 64, i / 64, i * 97)).collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_full_state_mirrored_to_every_client() {
    let (url, _addr, server) = boot_default().await;
    let mut c1 = connect(&url).await;
    let mut c2 = connect(&url).await;
    wait_for_count(&server, 2).await;

    let payload = format!("full,{}", "f800,".repeat(200));
    c1.send(Message::text(payload.clone())).await.unwrap();

    assert_eq!(read_text(&mut c2).await, payload);
    assert_eq!(read_text(&mut c1).await, payload);
}

#[tokio::test]
async fn e2e_binary_full_state_keeps_frame_kind() {
    let (url, _addr, server) = boot_default().await;
    let mut c1 = connect(&url).await;
    let mut c2 = connect(&url).await;
    wait_for_count(&server, 2).await;

    let mut payload = b"full,".to_vec();
    payload.extend_from_slice(&[0x00, 0xff, 0x10, 0x80]);
    c1.send(Message::binary(payload.clone())).await.unwrap();

    match read_frame(&mut c2).await {
        Message::Binary(data) => assert_eq!(&data[..], &payload[..]),
        other => panic!("expected binary frame, got {other:?}"),
    }
}

#[tokio::test]
async fn e2e_small_batch_is_compressed() {
    let (url, _addr, server) = boot_default().await;
    let mut c1 = connect(&url).await;
    let mut c2 = connect(&url).await;
    wait_for_count(&server, 2).await;

    let fields = pixel_fields(5);
    c1.send(Message::text(format!("batch;{}", fields.join(";"))))
        .await
        .unwrap();

    let text = read_text(&mut c2).await;
    assert_eq!(text, format!("compressed;5;{}", fields.join(";")));
}

#[tokio::test]
async fn e2e_large_batch_is_chunked_in_order() {
    let (url, _addr, server) = boot_default().await;
    let mut c1 = connect(&url).await;
    let mut c2 = connect(&url).await;
    wait_for_count(&server, 2).await;

    let fields = pixel_fields(65);
    c1.send(Message::text(format!("batch;{}", fields.join(";"))))
        .await
        .unwrap();

    let mut assembler = ChunkAssembler::new();
    let mut headers = Vec::new();
    let mut rebuilt = None;
    for _ in 0..3 {
        let text = read_text(&mut c2).await;
        let OutboundFrame::Chunk(chunk) = OutboundFrame::parse(&text).unwrap() else {
            panic!("expected chunk frame, got {text}");
        };
        headers.push((chunk.index, chunk.total, chunk.count));
        rebuilt = assembler.push(&chunk);
    }
    assert_eq!(headers, vec![(0, 3, 32), (1, 3, 32), (2, 3, 1)]);
    assert_eq!(rebuilt.unwrap(), fields);
}

#[tokio::test]
async fn e2e_clear_and_other_text_pass_through() {
    let (url, _addr, server) = boot_default().await;
    let mut c1 = connect(&url).await;
    wait_for_count(&server, 1).await;

    c1.send(Message::text("clear")).await.unwrap();
    c1.send(Message::text("hello panel")).await.unwrap();
    assert_eq!(read_text(&mut c1).await, "clear");
    assert_eq!(read_text(&mut c1).await, "hello panel");
}

#[tokio::test]
async fn e2e_disconnected_client_is_removed() {
    let (url, _addr, server) = boot_default().await;
    let mut c1 = connect(&url).await;
    let mut c2 = connect(&url).await;
    let c3 = connect(&url).await;
    wait_for_count(&server, 3).await;

    drop(c3);
    wait_for_count(&server, 2).await;

    c1.send(Message::text("full,after")).await.unwrap();
    assert_eq!(read_text(&mut c1).await, "full,after");
    assert_eq!(read_text(&mut c2).await, "full,after");
}

#[tokio::test]
async fn e2e_client_close_frame_unregisters() {
    let (url, _addr, server) = boot_default().await;
    let mut c1 = connect(&url).await;
    wait_for_count(&server, 1).await;

    c1.close(None).await.unwrap();
    wait_for_count(&server, 0).await;
}

#[tokio::test]
async fn e2e_health_reports_connections() {
    let (url, addr, server) = boot_default().await;
    let _c1 = connect(&url).await;
    let _c2 = connect(&url).await;
    wait_for_count(&server, 2).await;

    let resp = reqwest::get(format!("http://{addr}/health")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["connections"], 2);
}

#[tokio::test]
async fn e2e_disallowed_origin_rejected() {
    let (url, _addr, server) = boot_server(ServerConfig {
        allowed_origins: vec!["http://panel.local".into()],
        ..ServerConfig::default()
    })
    .await;

    let mut req = url.as_str().into_client_request().unwrap();
    let _ = req
        .headers_mut()
        .insert("origin", "http://evil.example".parse().unwrap());
    match connect_async(req).await {
        Err(WsError::Http(resp)) => assert_eq!(resp.status(), 403),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("upgrade should have been rejected"),
    }
    assert_eq!(server.registry().count(), 0);

    let mut req = url.as_str().into_client_request().unwrap();
    let _ = req
        .headers_mut()
        .insert("origin", "http://panel.local".parse().unwrap());
    let (_ws, _) = connect_async(req).await.unwrap();
    wait_for_count(&server, 1).await;
}

#[tokio::test]
async fn e2e_connection_limit_enforced() {
    let (url, _addr, server) = boot_server(ServerConfig {
        max_connections: 1,
        ..ServerConfig::default()
    })
    .await;
    let _c1 = connect(&url).await;
    wait_for_count(&server, 1).await;

    match connect_async(url.as_str()).await {
        Err(WsError::Http(resp)) => assert_eq!(resp.status(), 503),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("upgrade should have been rejected"),
    }
    assert_eq!(server.registry().count(), 1);
}

#[tokio::test]
async fn e2e_oversize_frame_evicts_sender() {
    let (url, _addr, server) = boot_server(ServerConfig {
        max_frame_size: 1024,
        ..ServerConfig::default()
    })
    .await;
    let mut c1 = connect(&url).await;
    let mut c2 = connect(&url).await;
    wait_for_count(&server, 2).await;

    let _ = c1.send(Message::text("x".repeat(4096))).await;
    wait_for_count(&server, 1).await;

    // The survivor still gets broadcasts.
    c2.send(Message::text("full,ok")).await.unwrap();
    assert_eq!(read_text(&mut c2).await, "full,ok");
}

#[tokio::test]
async fn e2e_responsive_client_survives_idle_timeout() {
    let (url, _addr, server) = boot_server(ServerConfig {
        idle_timeout: Duration::from_millis(400),
        ping_interval: Duration::from_millis(100),
        ping_timeout: Duration::from_millis(100),
        ..ServerConfig::default()
    })
    .await;
    let mut c1 = connect(&url).await;
    wait_for_count(&server, 1).await;

    // Reading lets tungstenite answer every ping with a pong.
    let reader = tokio::spawn(async move {
        while let Some(Ok(_)) = c1.next().await {}
    });
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(server.registry().count(), 1);
    reader.abort();
}

#[tokio::test]
async fn e2e_silent_client_idles_out() {
    let (url, _addr, server) = boot_server(ServerConfig {
        idle_timeout: Duration::from_millis(300),
        ping_interval: Duration::from_millis(100),
        ping_timeout: Duration::from_millis(100),
        ..ServerConfig::default()
    })
    .await;
    // Never polled, so pings go unanswered.
    let _c1 = connect(&url).await;
    wait_for_count(&server, 1).await;
    wait_for_count(&server, 0).await;
}

#[tokio::test]
async fn e2e_graceful_shutdown_closes_clients() {
    let (url, _addr, server) = boot_default().await;
    let mut c1 = connect(&url).await;
    let mut c2 = connect(&url).await;
    wait_for_count(&server, 2).await;

    assert!(
        server
            .shutdown()
            .graceful_shutdown(Some(Duration::from_secs(5)))
            .await
    );
    assert_eq!(server.registry().count(), 0);
    expect_closed(&mut c1).await;
    expect_closed(&mut c2).await;
}

#[tokio::test]
async fn e2e_concurrent_clients_converge() {
    let (url, _addr, server) = boot_default().await;
    let mut source = connect(&url).await;
    wait_for_count(&server, 1).await;

    let joiners: Vec<_> = (0..20)
        .map(|_| {
            let url = url.clone();
            tokio::spawn(async move { connect(&url).await })
        })
        .collect();
    for i in 0..50 {
        source
            .send(Message::text(format!("batch;{i},0,ffff")))
            .await
            .unwrap();
    }
    let mut clients = Vec::new();
    for j in joiners {
        clients.push(j.await.unwrap());
    }
    wait_for_count(&server, 21).await;

    // Everyone, including late joiners, sees the next frame.
    source.send(Message::text("full,sync")).await.unwrap();
    for client in &mut clients {
        loop {
            if read_text(client).await == "full,sync" {
                break;
            }
        }
    }
}
