#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use news_digest::Config;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const COMPLETIONS_PATH: &str = "/v1/chat/completions";

/// Render a minimal RSS 2.0 document
pub fn rss(items: &[(&str, &str)]) -> String {
    let body: String = items
        .iter()
        .map(|(title, link)| format!("<item><title>{title}</title><link>{link}</link></item>"))
        .collect();
    format!(r#"<?xml version="1.0" encoding="UTF-8"?><rss version="2.0"><channel><title>test</title>{body}</channel></rss>"#)
}

/// A chat-completion response carrying `content`
pub fn completion(content: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [
            {"index": 0, "message": {"role": "assistant", "content": content}, "finish_reason": "stop"}
        ]
    })
}

pub async fn mount_feed(server: &MockServer, feed_path: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(feed_path))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

/// A port on localhost with nothing listening
pub fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// A fake relay that greets every client with a permanent failure
pub async fn rejecting_relay() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let _ = socket
                .write_all(b"554 5.3.2 Service not available\r\n")
                .await;
        }
    });
    port
}

/// A fake plaintext relay that accepts the session but rejects every AUTH.
///
/// Returns the port and a counter of AUTH commands received.
pub async fn auth_rejecting_relay() -> (u16, Arc<AtomicUsize>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let attempts = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&attempts);

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let seen = Arc::clone(&seen);
            tokio::spawn(async move {
                let (read, mut write) = socket.into_split();
                let mut lines = BufReader::new(read).lines();
                if write.write_all(b"220 relay.test ESMTP\r\n").await.is_err() {
                    return;
                }
                while let Ok(Some(line)) = lines.next_line().await {
                    let verb = line
                        .split_whitespace()
                        .next()
                        .map(str::to_ascii_uppercase)
                        .unwrap_or_default();
                    let reply: &[u8] = match verb.as_str() {
                        "EHLO" | "HELO" => b"250-relay.test\r\n250 AUTH PLAIN LOGIN\r\n",
                        "AUTH" => {
                            seen.fetch_add(1, Ordering::SeqCst);
                            b"535 5.7.8 Authentication credentials invalid\r\n"
                        }
                        "QUIT" => {
                            let _ = write.write_all(b"221 2.0.0 Bye\r\n").await;
                            return;
                        }
                        _ => b"502 5.5.1 Unrecognized command\r\n",
                    };
                    if write.write_all(reply).await.is_err() {
                        return;
                    }
                }
            });
        }
    });
    (port, attempts)
}

/// Config pointing every outbound call at `server`, with the relay on `smtp_port`
pub fn config_for(server: &MockServer, feed_paths: &[&str], smtp_port: u16) -> Config {
    let mut config = Config::default();
    config.feeds.urls = feed_paths
        .iter()
        .map(|p| format!("{}{}", server.uri(), p))
        .collect();
    config.feeds.timeout_secs = 5;
    config.model.endpoint = format!("{}{}", server.uri(), COMPLETIONS_PATH);
    config.model.timeout_secs = 5;
    config.mail.smtp_host = "127.0.0.1".to_string();
    config.mail.smtp_port = smtp_port;
    config.mail.timeout_secs = 2;
    config.credentials.openai_key = Some("sk-test".to_string());
    config.credentials.email_user = Some("digest@example.com".to_string());
    config.credentials.email_password = Some("app-password".to_string());
    config
}

/// Bodies of the completion requests `server` received
pub async fn completion_requests(server: &MockServer) -> Vec<serde_json::Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|request| request.url.path() == COMPLETIONS_PATH)
        .map(|request| serde_json::from_slice(&request.body).unwrap())
        .collect()
}
