//! End-to-end supervisor behavior against mocked identity and conversation
//! endpoints.

use futures::StreamExt;
use pretty_assertions::assert_eq;
use recap::{ConnectionSupervisor, RecapConfig, SupervisorError};
use recap_core::{Status, StatusSubscription};
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SESSION_PATH: &str = "/api/auth/session";
const CONVERSATION_PATH: &str = "/backend-api/conversation";

fn sse_body(texts: &[&str]) -> String {
    let mut body = String::new();
    for text in texts {
        let envelope = serde_json::json!({
            "message": {
                "id": "m1",
                "author": {"role": "assistant"},
                "content": {"content_type": "text", "parts": [text]}
            },
            "error": null
        });
        body.push_str(&format!("data: {envelope}\n\n"));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

fn token(value: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({ "accessToken": value }))
}

fn stream_of(texts: &[&str]) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_string(sse_body(texts))
}

async fn mount_session(server: &MockServer, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(SESSION_PATH))
        .respond_with(response)
        .mount(server)
        .await;
}

async fn mount_conversation(server: &MockServer, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path(CONVERSATION_PATH))
        .respond_with(response)
        .mount(server)
        .await;
}

async fn connect(server: &MockServer) -> ConnectionSupervisor {
    let config = RecapConfig::new(server.uri()).with_read_timeout(Some(Duration::from_secs(5)));
    ConnectionSupervisor::connect(config).await.unwrap()
}

async fn session_requests(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == SESSION_PATH)
        .count()
}

async fn next_status(subscription: &mut StatusSubscription) -> Status {
    tokio::time::timeout(Duration::from_secs(5), subscription.recv())
        .await
        .expect("status within 5s")
        .expect("subscription open")
}

#[tokio::test]
async fn challenge_reports_refresh_cloudflare_and_fast_keepalive() {
    let server = MockServer::start().await;
    mount_session(&server, ResponseTemplate::new(403)).await;

    let supervisor = connect(&server).await;

    assert_eq!(supervisor.status().error_message(), Some("Refresh Cloudflare"));
    assert_eq!(supervisor.keepalive_period(), Duration::from_secs(15));

    let status = supervisor.tick().await;
    assert_eq!(status.error_message(), Some("Refresh Cloudflare"));
    assert_eq!(supervisor.keepalive_period(), Duration::from_secs(15));
}

#[tokio::test]
async fn keepalive_timer_retries_until_recovery() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(SESSION_PATH))
        .respond_with(ResponseTemplate::new(403))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    mount_session(&server, token("abc")).await;

    let config = RecapConfig::new(server.uri())
        .with_keepalive(Duration::from_millis(200), Duration::from_secs(3600));
    let supervisor = ConnectionSupervisor::connect(config).await.unwrap();
    assert!(supervisor.status().is_error());
    assert_eq!(supervisor.keepalive_period(), Duration::from_millis(200));

    // No manual ticks: only the timer drives the identity endpoint from here.
    let mut statuses = supervisor.subscribe();
    let mut seen = Vec::new();
    loop {
        let status = next_status(&mut statuses).await;
        let connected = status.is_connected();
        seen.push(status);
        if connected {
            break;
        }
    }
    assert_eq!(seen.iter().filter(|s| s.is_error()).count(), 1);
    assert_eq!(supervisor.session().unwrap().token(), "abc");

    tokio::time::timeout(Duration::from_secs(5), async {
        while supervisor.keepalive_period() != Duration::from_secs(3600) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("healthy period after recovery");

    // The healthy period is long enough that nothing else fires.
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(session_requests(&server).await, 3);
}

#[tokio::test]
async fn keepalive_tick_recovers_and_slows_down() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(SESSION_PATH))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_session(&server, token("abc")).await;

    let supervisor = connect(&server).await;
    assert_eq!(supervisor.status().error_message(), Some("Failed to refresh session"));
    assert_eq!(supervisor.keepalive_period(), Duration::from_secs(15));

    let mut statuses = supervisor.subscribe();
    assert!(supervisor.tick().await.is_connected());

    assert!(next_status(&mut statuses).await.is_connected());
    assert_eq!(supervisor.keepalive_period(), Duration::from_secs(30 * 60));
    assert_eq!(supervisor.session().unwrap().token(), "abc");
}

#[tokio::test]
async fn query_streams_suffix_fragments_then_connects() {
    let server = MockServer::start().await;
    mount_session(&server, token("abc")).await;
    Mock::given(method("POST"))
        .and(path(CONVERSATION_PATH))
        .and(header("authorization", "Bearer abc"))
        .respond_with(stream_of(&["Hel", "Hello"]))
        .expect(1)
        .mount(&server)
        .await;

    let supervisor = connect(&server).await;
    assert!(supervisor.status().is_connected());
    let mut statuses = supervisor.subscribe();

    let fragments: Vec<String> = supervisor
        .query("Hi")
        .unwrap()
        .map(|fragment| fragment.unwrap().into_string())
        .collect()
        .await;

    assert_eq!(fragments, vec!["Hel".to_string(), "lo".to_string()]);
    assert!(next_status(&mut statuses).await.is_loading());
    assert!(next_status(&mut statuses).await.is_connected());
    assert!(supervisor.status().is_connected());
    assert_eq!(supervisor.keepalive_period(), Duration::from_secs(30 * 60));
}

#[tokio::test]
async fn divergent_record_is_skipped() {
    let server = MockServer::start().await;
    mount_session(&server, token("abc")).await;
    mount_conversation(&server, stream_of(&["hello", "goodbye", "hello world"])).await;

    let supervisor = connect(&server).await;
    let text = supervisor.query("Hi").unwrap().collect_text().await.unwrap();

    assert_eq!(text, "hello world");
    assert!(supervisor.status().is_connected());
}

#[tokio::test]
async fn send_failure_reports_status_line_and_no_fragments() {
    let server = MockServer::start().await;
    mount_session(&server, token("abc")).await;
    mount_conversation(&server, ResponseTemplate::new(500)).await;

    let supervisor = connect(&server).await;
    let mut statuses = supervisor.subscribe();

    let items: Vec<_> = supervisor.query("Hi").unwrap().collect().await;

    assert_eq!(items.len(), 1);
    assert_eq!(
        items[0].as_ref().unwrap_err().to_string(),
        "500 Internal Server Error"
    );
    assert!(next_status(&mut statuses).await.is_loading());
    assert_eq!(
        next_status(&mut statuses).await.error_message(),
        Some("500 Internal Server Error")
    );
    assert_eq!(supervisor.keepalive_period(), Duration::from_secs(15));
}

#[tokio::test]
async fn empty_body_is_reported() {
    let server = MockServer::start().await;
    mount_session(&server, token("abc")).await;
    mount_conversation(&server, ResponseTemplate::new(200)).await;

    let supervisor = connect(&server).await;
    let err = supervisor.query("Hi").unwrap().collect_text().await.unwrap_err();

    assert_eq!(err.to_string(), "No response body");
    assert_eq!(supervisor.status().error_message(), Some("No response body"));
}

#[tokio::test]
async fn query_without_token_fails_before_sending() {
    let server = MockServer::start().await;
    mount_session(&server, ResponseTemplate::new(403)).await;
    Mock::given(method("POST"))
        .and(path(CONVERSATION_PATH))
        .respond_with(stream_of(&["never"]))
        .expect(0)
        .mount(&server)
        .await;

    let supervisor = connect(&server).await;
    let err = supervisor.query("Hi").unwrap().collect_text().await.unwrap_err();

    assert!(matches!(err, SupervisorError::Auth(_)));
    assert_eq!(supervisor.status().error_message(), Some("Refresh Cloudflare"));
}

#[tokio::test]
async fn query_falls_back_to_previous_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(SESSION_PATH))
        .respond_with(token("abc"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_session(&server, ResponseTemplate::new(403)).await;
    Mock::given(method("POST"))
        .and(path(CONVERSATION_PATH))
        .and(header("authorization", "Bearer abc"))
        .respond_with(stream_of(&["ok"]))
        .expect(1)
        .mount(&server)
        .await;

    let supervisor = connect(&server).await;
    let mut statuses = supervisor.subscribe();

    let text = supervisor.query("Hi").unwrap().collect_text().await.unwrap();

    assert_eq!(text, "ok");
    assert!(next_status(&mut statuses).await.is_loading());
    let refresh_failure = next_status(&mut statuses).await;
    assert_eq!(refresh_failure.error_message(), Some("Refresh Cloudflare"));
    assert!(next_status(&mut statuses).await.is_connected());
    assert!(supervisor.status().is_connected());
}

#[tokio::test]
async fn overlapping_query_is_rejected() {
    let server = MockServer::start().await;
    mount_session(&server, token("abc")).await;
    mount_conversation(
        &server,
        stream_of(&["slow"]).set_delay(Duration::from_millis(300)),
    )
    .await;

    let supervisor = connect(&server).await;
    let first = supervisor.query("one").unwrap();

    let second = supervisor.query("two");

    assert!(matches!(second, Err(SupervisorError::QueryInFlight)));
    assert!(supervisor.status().is_loading());
    assert_eq!(first.collect_text().await.unwrap(), "slow");
    assert!(!supervisor.is_loading());
    assert!(supervisor.query("three").is_ok());
}

#[tokio::test]
async fn unsubscribe_mid_query_stops_only_that_subscriber() {
    let server = MockServer::start().await;
    mount_session(&server, token("abc")).await;
    mount_conversation(
        &server,
        stream_of(&["Hel", "Hello"]).set_delay(Duration::from_millis(200)),
    )
    .await;

    let supervisor = connect(&server).await;
    let mut stays = supervisor.subscribe();
    let mut leaves = supervisor.subscribe();

    let fragments = supervisor.query("Hi").unwrap();
    assert!(next_status(&mut stays).await.is_loading());
    assert!(next_status(&mut leaves).await.is_loading());

    assert!(supervisor.unsubscribe(leaves.id()));
    assert!(!supervisor.unsubscribe(leaves.id()));

    assert_eq!(fragments.collect_text().await.unwrap(), "Hello");
    assert!(next_status(&mut stays).await.is_connected());
    assert!(leaves.recv().await.is_none());
}

#[tokio::test]
async fn dropped_query_stream_still_completes() {
    let server = MockServer::start().await;
    mount_session(&server, token("abc")).await;
    mount_conversation(
        &server,
        stream_of(&["a", "ab"]).set_delay(Duration::from_millis(100)),
    )
    .await;

    let supervisor = connect(&server).await;
    let mut statuses = supervisor.subscribe();

    drop(supervisor.query("Hi").unwrap());

    assert!(next_status(&mut statuses).await.is_loading());
    assert!(next_status(&mut statuses).await.is_connected());
}

#[tokio::test]
async fn slow_response_times_out() {
    let server = MockServer::start().await;
    mount_session(&server, token("abc")).await;
    mount_conversation(
        &server,
        stream_of(&["late"]).set_delay(Duration::from_secs(3)),
    )
    .await;

    let config = RecapConfig::new(server.uri()).with_read_timeout(Some(Duration::from_millis(200)));
    let supervisor = ConnectionSupervisor::connect(config).await.unwrap();

    let err = supervisor.query("Hi").unwrap().collect_text().await.unwrap_err();

    assert_eq!(err.to_string(), "Timed out waiting for response");
    assert_eq!(
        supervisor.status().error_message(),
        Some("Timed out waiting for response")
    );
}

#[tokio::test]
async fn probe_reauthenticates_and_publishes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(SESSION_PATH))
        .respond_with(token("abc"))
        .expect(2)
        .mount(&server)
        .await;

    let supervisor = connect(&server).await;
    let mut statuses = supervisor.subscribe();

    assert!(supervisor.probe().await.is_connected());
    assert!(next_status(&mut statuses).await.is_connected());
}

#[tokio::test]
async fn invalid_config_is_rejected() {
    let err = ConnectionSupervisor::connect(RecapConfig::new("not a url"))
        .await
        .unwrap_err();

    assert!(matches!(err, SupervisorError::Config(_)));
}
