//! Consumer port protocol over an in-memory duplex pipe.

use pretty_assertions::assert_eq;
use recap::{serve_port, ConnectionSupervisor, JsonLinesPort, RecapConfig};
use std::time::Duration;
use tokio::io::{duplex, split, AsyncBufReadExt, AsyncWriteExt, BufReader};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sse_body(texts: &[&str]) -> String {
    let mut body = String::new();
    for text in texts {
        let envelope = serde_json::json!({
            "message": {"author": {"role": "assistant"}, "content": {"parts": [text]}}
        });
        body.push_str(&format!("data: {envelope}\n\n"));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

async fn backend(delay: Duration) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/session"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"accessToken": "abc"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/backend-api/conversation"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(sse_body(&["Hel", "Hello"]))
                .set_delay(delay),
        )
        .mount(&server)
        .await;
    server
}

async fn read_line<R>(lines: &mut tokio::io::Lines<R>) -> serde_json::Value
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    let line = tokio::time::timeout(Duration::from_secs(5), lines.next_line())
        .await
        .expect("line within 5s")
        .unwrap()
        .expect("port still open");
    serde_json::from_str(&line).unwrap()
}

#[tokio::test]
async fn query_round_trip() {
    let server = backend(Duration::ZERO).await;
    let supervisor = ConnectionSupervisor::connect(RecapConfig::new(server.uri()))
        .await
        .unwrap();

    let (client, host) = duplex(4096);
    let (host_read, host_write) = split(host);
    let serving = {
        let supervisor = supervisor.clone();
        tokio::spawn(async move {
            serve_port(&supervisor, JsonLinesPort::new(host_read, host_write)).await
        })
    };

    let (client_read, mut client_write) = split(client);
    let mut lines = BufReader::new(client_read).lines();
    client_write
        .write_all(b"{\"type\":\"query\",\"prompt\":\"Hi\"}\n")
        .await
        .unwrap();

    assert_eq!(read_line(&mut lines).await, serde_json::json!({"type": "status", "status": "loading"}));
    assert_eq!(read_line(&mut lines).await, serde_json::json!({"type": "query", "response": "Hel"}));
    assert_eq!(read_line(&mut lines).await, serde_json::json!({"type": "query", "response": "lo"}));
    assert_eq!(read_line(&mut lines).await, serde_json::json!({"type": "status", "status": "connected"}));

    client_write
        .write_all(b"{\"type\":\"status\"}\n")
        .await
        .unwrap();
    assert_eq!(read_line(&mut lines).await, serde_json::json!({"type": "status", "status": "connected"}));

    assert_eq!(supervisor.status_bus().subscriber_count(), 1);
    client_write.shutdown().await.unwrap();
    serving.await.unwrap().unwrap();
    assert_eq!(supervisor.status_bus().subscriber_count(), 0);
}

#[tokio::test]
async fn overlapping_query_error_goes_to_requester_only() {
    let server = backend(Duration::from_millis(300)).await;
    let supervisor = ConnectionSupervisor::connect(RecapConfig::new(server.uri()))
        .await
        .unwrap();
    let mut observer = supervisor.subscribe();

    let (client, host) = duplex(4096);
    let (host_read, host_write) = split(host);
    let serving = {
        let supervisor = supervisor.clone();
        tokio::spawn(async move {
            serve_port(&supervisor, JsonLinesPort::new(host_read, host_write)).await
        })
    };

    let (client_read, mut client_write) = split(client);
    let mut lines = BufReader::new(client_read).lines();
    client_write
        .write_all(b"{\"type\":\"query\",\"prompt\":\"one\"}\n")
        .await
        .unwrap();
    assert_eq!(read_line(&mut lines).await["status"], "loading");

    client_write
        .write_all(b"{\"type\":\"query\",\"prompt\":\"two\"}\n")
        .await
        .unwrap();
    assert_eq!(
        read_line(&mut lines).await,
        serde_json::json!({"type": "status", "status": "error", "error": "A query is already in progress"})
    );

    assert_eq!(read_line(&mut lines).await["response"], "Hel");
    assert_eq!(read_line(&mut lines).await["response"], "lo");
    assert_eq!(read_line(&mut lines).await["status"], "connected");

    let seen = observer.drain();
    assert_eq!(seen.len(), 2);
    assert!(seen[0].is_loading());
    assert!(seen[1].is_connected());

    client_write.shutdown().await.unwrap();
    serving.await.unwrap().unwrap();
}

#[tokio::test]
async fn binary_noise_keeps_consumer_attached() {
    let server = backend(Duration::ZERO).await;
    let supervisor = ConnectionSupervisor::connect(RecapConfig::new(server.uri()))
        .await
        .unwrap();

    let (client, host) = duplex(4096);
    let (host_read, host_write) = split(host);
    let serving = {
        let supervisor = supervisor.clone();
        tokio::spawn(async move {
            serve_port(&supervisor, JsonLinesPort::new(host_read, host_write)).await
        })
    };

    let (client_read, mut client_write) = split(client);
    let mut lines = BufReader::new(client_read).lines();
    client_write
        .write_all(b"\xff\xfe garbage\n{\"type\":\"status\"}\n")
        .await
        .unwrap();

    assert_eq!(read_line(&mut lines).await, serde_json::json!({"type": "status", "status": "connected"}));
    assert_eq!(supervisor.status_bus().subscriber_count(), 1);

    client_write.shutdown().await.unwrap();
    serving.await.unwrap().unwrap();
    assert_eq!(supervisor.status_bus().subscriber_count(), 0);
}
