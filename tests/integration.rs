//! Black-box integration tests driving the protocol engine over a real
//! `TcpStream`, end to end. The webhook-forwarding leg isn't exercised
//! here (it needs a live HTTPS endpoint); instead the engine is wired
//! to an in-memory message-received callback, the same collaborator
//! `host::handle_connection` plugs `webhook::WebhookClient` into.

use smtp_engine::core::engine::{Engine, Validation};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

/// Minimal stand-in for `host::handle_connection`: binds one engine to
/// one accepted socket and drives its read/reply loop.
async fn serve_one_connection(
    listener: TcpListener,
    received: Arc<Mutex<Vec<String>>>,
) {
    let (stream, _) = listener.accept().await.expect("accept failed");
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    let mut engine = Engine::new("test.example", Validation { max_line_length: 0, max_receivers: 0 })
        .with_message_received(move |envelope| {
            received.lock().unwrap().push(envelope.body.clone());
            Ok("queued-id".to_string())
        });

    let greeting = engine.welcome("");
    for line in greeting.format() {
        writer.write_all(line.as_bytes()).await.unwrap();
    }
    writer.flush().await.unwrap();

    let mut line = String::new();
    loop {
        line.clear();
        let n = reader.read_line(&mut line).await.unwrap();
        if n == 0 {
            break;
        }
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if let Some(reply) = engine.handle_line(trimmed) {
            let is_bye = reply.code() == 221;
            for l in reply.format() {
                writer.write_all(l.as_bytes()).await.unwrap();
            }
            writer.flush().await.unwrap();
            if is_bye {
                break;
            }
        }
    }
}

async fn read_reply(reader: &mut (impl AsyncBufReadExt + Unpin)) -> String {
    let mut line = String::new();
    reader.read_line(&mut line).await.unwrap();
    line
}

#[tokio::test]
async fn full_transaction_over_a_real_socket() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let received = Arc::new(Mutex::new(Vec::new()));
    let received_clone = Arc::clone(&received);

    let server = tokio::spawn(serve_one_connection(listener, received_clone));

    let stream = TcpStream::connect(addr).await.unwrap();
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let banner = read_reply(&mut reader).await;
    assert!(banner.starts_with("220 "));
    assert!(banner.contains("test.example"));

    write_half.write_all(b"HELO client.example\r\n").await.unwrap();
    let reply = read_reply(&mut reader).await;
    assert!(reply.starts_with("250 "));

    write_half.write_all(b"MAIL FROM:<sender@example.com>\r\n").await.unwrap();
    let reply = read_reply(&mut reader).await;
    assert!(reply.starts_with("250 "));

    write_half.write_all(b"RCPT TO:<recipient@example.com>\r\n").await.unwrap();
    let reply = read_reply(&mut reader).await;
    assert!(reply.starts_with("250 "));

    write_half.write_all(b"DATA\r\n").await.unwrap();
    let reply = read_reply(&mut reader).await;
    assert!(reply.starts_with("354 "));

    write_half.write_all(b"Hello, world.\r\n").await.unwrap();
    write_half.write_all(b".\r\n").await.unwrap();
    let reply = read_reply(&mut reader).await;
    assert!(reply.starts_with("250 "));
    assert!(reply.contains("queued-id"));

    write_half.write_all(b"QUIT\r\n").await.unwrap();
    let reply = read_reply(&mut reader).await;
    assert!(reply.starts_with("221 "));

    server.await.unwrap();
    assert_eq!(received.lock().unwrap().as_slice(), ["Hello, world."]);
}

#[tokio::test]
async fn unrecognised_command_is_rejected_without_closing_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let received = Arc::new(Mutex::new(Vec::new()));

    let server = tokio::spawn(serve_one_connection(listener, received));

    let stream = TcpStream::connect(addr).await.unwrap();
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let _banner = read_reply(&mut reader).await;

    write_half.write_all(b"BOGUS\r\n").await.unwrap();
    let reply = read_reply(&mut reader).await;
    assert!(reply.starts_with("500 "));

    write_half.write_all(b"QUIT\r\n").await.unwrap();
    let reply = read_reply(&mut reader).await;
    assert!(reply.starts_with("221 "));

    server.await.unwrap();
}
