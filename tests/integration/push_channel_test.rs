//! WebSocket Push Channel Integration Tests
//!
//! Runs a local WebSocket server and checks the subscribe handshake, frame
//! validation and end-to-end reassembly through a `Subscription`.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use workorder_safety::services::push::{PushConnector, WebSocketChannel, WebSocketConnector};
use workorder_safety_core::{
    Chunk, ChunkAssembler, CoreError, JobOutcome, PushChannel, PushMessage, Subscription,
    TerminalEvent,
};

struct ServerObservations {
    auth_header: Option<String>,
    subscribe_frame: Option<serde_json::Value>,
}

/// Accept one connection, record the handshake and subscribe frame, then
/// send `frames` and wait for the client to go away.
async fn serve_once(
    frames: Vec<Message>,
) -> (String, Arc<Mutex<ServerObservations>>, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let seen = Arc::new(Mutex::new(ServerObservations {
        auth_header: None,
        subscribe_frame: None,
    }));

    let record = seen.clone();
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let headers = record.clone();
        let callback = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            headers.lock().unwrap().auth_header = req
                .headers()
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            Ok(resp)
        };
        let mut ws = tokio_tungstenite::accept_hdr_async(stream, callback)
            .await
            .unwrap();

        if let Some(Ok(Message::Text(text))) = ws.next().await {
            record.lock().unwrap().subscribe_frame = serde_json::from_str(&text).ok();
        }

        for frame in frames {
            if ws.send(frame).await.is_err() {
                return;
            }
        }

        while let Some(Ok(_)) = ws.next().await {}
    });

    (url, seen, server)
}

fn text(frame: &str) -> Message {
    Message::Text(frame.into())
}

#[tokio::test]
async fn test_channel_parses_frames_and_skips_control_frames() {
    let (url, seen, server) = serve_once(vec![
        text(r#"{"index": 1, "chunk": "World"}"#),
        Message::Ping(vec![1, 2].into()),
        text("not json"),
        text(r#"{"type": "complete"}"#),
    ])
    .await;

    let mut channel = WebSocketChannel::connect(&url, "J1", Some("secret"))
        .await
        .unwrap();

    assert_eq!(
        channel.next_message().await.unwrap().unwrap(),
        PushMessage::Chunk(Chunk::indexed(1, "World"))
    );
    assert!(matches!(
        channel.next_message().await.unwrap(),
        Err(CoreError::Validation(_))
    ));
    assert_eq!(
        channel.next_message().await.unwrap().unwrap(),
        PushMessage::Terminal(TerminalEvent::Completed { payload: None })
    );

    channel.close().await;
    channel.close().await;
    assert!(channel.next_message().await.is_none());
    drop(channel);
    server.await.unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.auth_header.as_deref(), Some("Bearer secret"));
    let frame = seen.subscribe_frame.as_ref().unwrap();
    assert_eq!(frame["action"], "subscribe");
    assert_eq!(frame["requestId"], "J1");
}

#[tokio::test]
async fn test_server_close_ends_stream() {
    let (url, _seen, server) = serve_once(vec![
        text(r#"{"index": 0, "chunk": "only"}"#),
        Message::Close(None),
    ])
    .await;

    let connector = WebSocketConnector::new(url, None);
    let mut channel = connector.connect("J2").await.unwrap();

    assert!(matches!(
        channel.next_message().await,
        Some(Ok(PushMessage::Chunk(_)))
    ));
    assert!(channel.next_message().await.is_none());
    channel.close().await;
    drop(channel);
    server.await.unwrap();
}

#[tokio::test]
async fn test_subscription_over_websocket_assembles_report() {
    let (url, _seen, server) = serve_once(vec![
        text(r#"{"index": 1, "chunk": "World"}"#),
        text(r#"{"index": 0, "chunk": "Hello "}"#),
        text(r#"{"index": 2, "chunk": "!"}"#),
        text(r#"{"type": "complete"}"#),
    ])
    .await;

    let channel = WebSocketChannel::connect(&url, "J1", None).await.unwrap();
    let assembler = Arc::new(Mutex::new(ChunkAssembler::new()));
    let sink = assembler.clone();

    let subscription = Subscription::open(
        "J1",
        channel,
        move |chunk| {
            sink.lock().unwrap().add_chunk(chunk).unwrap();
        },
        |_| {},
        Duration::from_secs(10),
    );

    let outcome = tokio::time::timeout(Duration::from_secs(10), subscription.finished())
        .await
        .unwrap();
    assert_eq!(outcome, JobOutcome::Completed { payload: None });
    assert_eq!(assembler.lock().unwrap().current_text(), "Hello World!");
    server.await.unwrap();
}
