//! Requests against a throwaway local HTTP endpoint

use pretty_assertions::assert_eq;
use ra_core::{GenerationError, Generator};
use ra_openai::{OpenAiConfig, OpenAiGenerator};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Serve one canned response and hand back the raw request
async fn serve_once(status: &'static str, body: &'static str, delay: Duration) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;
        tokio::time::sleep(delay).await;
        let response = format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        let _ = socket.write_all(response.as_bytes()).await;
        let _ = socket.shutdown().await;
        request
    });
    (format!("http://{addr}/v1"), handle)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        let text = String::from_utf8_lossy(&buf);
        if let Some(head_end) = text.find("\r\n\r\n") {
            let length = text[..head_end]
                .lines()
                .find_map(|l| {
                    let (name, value) = l.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= head_end + 4 + length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn generator(base_url: String, timeout_secs: u64) -> OpenAiGenerator {
    OpenAiGenerator::new(
        OpenAiConfig::new()
            .with_api_key("sk-local")
            .with_base_url(base_url)
            .with_timeout_secs(timeout_secs),
    )
    .unwrap()
}

#[tokio::test]
async fn returns_first_choice_content() {
    let (url, server) = serve_once(
        "200 OK",
        r#"{"choices":[{"message":{"role":"assistant","content":"{\"ok\":true}"}}]}"#,
        Duration::ZERO,
    )
    .await;

    let out = generator(url, 5).generate("find related work").await.unwrap();
    assert_eq!(out, "{\"ok\":true}");

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /v1/chat/completions"));
    assert!(request.to_ascii_lowercase().contains("authorization: bearer sk-local"));
    assert!(request.contains("\"response_format\":{\"type\":\"json_object\"}"));
    assert!(request.contains("find related work"));
}

#[tokio::test]
async fn error_status_is_provider_error() {
    let (url, _server) = serve_once("429 Too Many Requests", r#"{"error":"slow down"}"#, Duration::ZERO).await;
    let err = generator(url, 5).generate("p").await.unwrap_err();
    assert_eq!(
        err,
        GenerationError::Provider {
            status: 429,
            body: r#"{"error":"slow down"}"#.to_string()
        }
    );
}

#[tokio::test]
async fn missing_content_is_empty_response() {
    let (url, _server) = serve_once("200 OK", r#"{"choices":[]}"#, Duration::ZERO).await;
    let err = generator(url, 5).generate("p").await.unwrap_err();
    assert_eq!(err, GenerationError::EmptyResponse);
}

#[tokio::test]
async fn slow_provider_times_out() {
    let (url, _server) = serve_once("200 OK", "{}", Duration::from_secs(3)).await;
    let err = generator(url, 1).generate("p").await.unwrap_err();
    assert_eq!(err, GenerationError::Timeout { secs: 1 });
}

#[tokio::test]
async fn unreachable_endpoint_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = generator(format!("http://{addr}/v1"), 5).generate("p").await.unwrap_err();
    assert!(matches!(err, GenerationError::Transport(_)), "{err:?}");
}
