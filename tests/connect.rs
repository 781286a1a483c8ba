use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use sioclient::{handshake::HandshakeError, Client, ConnectError, ConnectionState, Error};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    sync::mpsc,
};
use tokio_tungstenite::tungstenite::Message;

const OPEN: &str = r#"0{"sid":"abc","upgrades":[],"pingInterval":25000,"pingTimeout":60000}"#;

#[derive(Debug, Clone, Copy)]
enum Behaviour {
    Accept,
    Reject,
}

async fn read_head(stream: &TcpStream) -> (String, usize) {
    let mut buf = [0u8; 4096];
    loop {
        let n = stream.peek(&mut buf).await.unwrap();
        let head = String::from_utf8_lossy(&buf[..n]).to_string();
        if head.contains("\r\n\r\n") || n == buf.len() {
            return (head, n);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

async fn reply_http(mut stream: TcpStream, consumed: usize, status: &str, body: &str) {
    let mut buf = vec![0u8; consumed];
    stream.read_exact(&mut buf).await.unwrap();

    let resp = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/plain; charset=UTF-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    stream.write_all(resp.as_bytes()).await.unwrap();
    stream.shutdown().await.unwrap();
}

async fn serve_websocket(stream: TcpStream, frames: mpsc::UnboundedSender<String>) {
    let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

    ws.send(Message::Text(OPEN.to_string())).await.unwrap();
    ws.send(Message::Text("40".to_string())).await.unwrap();

    while let Some(Ok(msg)) = ws.next().await {
        if let Message::Text(text) = msg {
            if text == r#"42["hello","world"]"# {
                ws.send(Message::Text(r#"42["news","hi",{"n":1}]"#.to_string()))
                    .await
                    .unwrap();
            }
            let _ = frames.send(text);
        }
    }
}

async fn handle(stream: TcpStream, behaviour: Behaviour, frames: mpsc::UnboundedSender<String>) {
    let (head, n) = read_head(&stream).await;

    if head.to_lowercase().contains("upgrade: websocket") {
        serve_websocket(stream, frames).await;
        return;
    }

    assert!(head.starts_with("GET /socket.io/?EIO=3&transport=polling"));

    match behaviour {
        Behaviour::Accept => {
            let body = format!("{}:{}", OPEN.len(), OPEN);
            reply_http(stream, n, "200 OK", &body).await
        }
        Behaviour::Reject => reply_http(stream, n, "404 Not Found", "no such path").await,
    }
}

async fn spawn_server(behaviour: Behaviour) -> (u16, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        loop {
            let (stream, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => break,
            };
            tokio::spawn(handle(stream, behaviour, tx.clone()));
        }
    });

    (port, rx)
}

async fn next_frame(frames: &mut mpsc::UnboundedReceiver<String>) -> String {
    tokio::time::timeout(Duration::from_secs(5), frames.recv())
        .await
        .expect("server frame timeout")
        .expect("server stopped")
}

#[tokio::test]
async fn test_connect_emit_receive_disconnect() {
    let _ = pretty_env_logger::try_init();

    let (port, mut frames) = spawn_server(Behaviour::Accept).await;
    let client = Client::new(&format!("http://127.0.0.1:{}", port)).unwrap();

    let (tx, mut news) = mpsc::unbounded_channel();
    client.on("news", move |_: &str, args: &[Value]| {
        let _ = tx.send(args.to_vec());
    });

    client.connect().await.unwrap();

    assert!(client.is_connected());
    let params = client.handshake().unwrap();
    assert_eq!(params.sid, "abc");
    assert_eq!(params.ping_interval, Duration::from_millis(25000));
    assert_eq!(params.ping_timeout, Duration::from_millis(60000));

    // connected already, nothing happens
    client.connect().await.unwrap();

    assert!(client.emit("hello", vec![json!("world")]).await);
    assert_eq!(next_frame(&mut frames).await, r#"42["hello","world"]"#);

    let args = tokio::time::timeout(Duration::from_secs(5), news.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(args, vec![json!("hi"), json!({"n": 1})]);

    assert!(client.send("plain text").await);
    assert_eq!(
        next_frame(&mut frames).await,
        r#"42["message","plain text"]"#
    );

    client.disconnect().await;
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(next_frame(&mut frames).await, "41");

    client.disconnect().await;
    assert!(!client.emit("late", vec![]).await);
}

#[tokio::test]
async fn test_reconnect_after_disconnect() {
    let (port, mut frames) = spawn_server(Behaviour::Accept).await;
    let client = Client::new(&format!("ws://127.0.0.1:{}/", port)).unwrap();

    client.connect().await.unwrap();
    client.disconnect().await;
    assert_eq!(next_frame(&mut frames).await, "41");

    client.connect().await.unwrap();
    assert!(client.is_connected());
    client.disconnect().await;
    assert_eq!(next_frame(&mut frames).await, "41");
}

#[tokio::test]
async fn test_handshake_rejected() {
    let (port, _frames) = spawn_server(Behaviour::Reject).await;
    let client = Client::new(&format!("http://127.0.0.1:{}", port)).unwrap();

    let result = client.connect().await;

    match result {
        Err(Error::ConnectFailed {
            source:
                ConnectError::Handshake {
                    source: HandshakeError::Rejected { status, body, .. },
                },
            ..
        }) => {
            assert_eq!(status.as_u16(), 404);
            assert_eq!(body, "no such path");
        }
        other => panic!("unexpected result {:?}", other),
    }

    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_secure_scheme_unsupported() {
    let client = Client::new("wss://127.0.0.1:8443").unwrap();

    let result = client.connect().await;

    assert!(matches!(
        result,
        Err(Error::ConnectFailed {
            source: ConnectError::Handshake {
                source: HandshakeError::UnsupportedScheme { .. }
            },
            ..
        })
    ));
}
