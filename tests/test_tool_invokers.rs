//! Integration tests for the summary lookup tool
//!
//! Tests behavioral contracts against a mock summary service:
//! - Successful lookups and the missing-extract placeholder
//! - Non-OK statuses, undecodable bodies and network errors as failure outcomes
//! - Request shape (escaped topic segment, user agent)
//! - Optional request timeout
//! - Failure outcomes flowing through a reviewed pipeline

use agent_relay::agent::{PipelineMode, RunStatus, TerminalKind};
use agent_relay::config::LookupSection;
use agent_relay::observability::metrics;
use agent_relay::tools::{Outcome, SummaryLookupTool, ToolInvoker};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use test_helpers::{drain, lines, pipeline_with};

fn lookup_config(server: &MockServer) -> LookupSection {
    LookupSection {
        endpoint: format!("{}/summary", server.uri()),
        user_agent: "relay-test/1.0".to_string(),
        timeout_secs: Some(5),
    }
}

fn lookup_tool(server: &MockServer) -> SummaryLookupTool {
    SummaryLookupTool::new(&lookup_config(server)).unwrap()
}

#[tokio::test]
async fn test_lookup_returns_extract_on_200() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/summary/Alan_Turing"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "title": "Alan Turing",
            "extract": "Alan Mathison Turing was an English mathematician and computer scientist."
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let outcome = lookup_tool(&mock_server).invoke("Alan_Turing").await;

    assert_eq!(
        outcome,
        Outcome::success("Alan Mathison Turing was an English mathematician and computer scientist.")
    );
}

#[tokio::test]
async fn test_lookup_without_extract_uses_placeholder() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/summary/Nobody"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"title": "Nobody"})),
        )
        .mount(&mock_server)
        .await;

    let outcome = lookup_tool(&mock_server).invoke("Nobody").await;
    assert_eq!(outcome, Outcome::success("No summary found."));
}

#[tokio::test]
async fn test_lookup_non_ok_status_is_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/summary/Missing_Page"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "type": "https://mediawiki.org/wiki/HyperSwitch/errors/not_found",
            "title": "Not found."
        })))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/summary/Broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let tool = lookup_tool(&mock_server);

    assert_eq!(
        tool.invoke("Missing_Page").await,
        Outcome::failure("lookup failed with status 404")
    );
    assert_eq!(
        tool.invoke("Broken").await,
        Outcome::failure("lookup failed with status 500")
    );
}

#[tokio::test]
async fn test_lookup_undecodable_body_is_tool_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/summary/Garbage"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&mock_server)
        .await;

    let outcome = lookup_tool(&mock_server).invoke("Garbage").await;

    assert!(!outcome.is_success());
    assert!(outcome.text().starts_with("tool error:"), "got {outcome}");
}

#[tokio::test]
async fn test_lookup_connection_refused_is_tool_error() {
    let tool = SummaryLookupTool::from_endpoint("http://127.0.0.1:1/summary").unwrap();

    let outcome = tool.invoke("Alan_Turing").await;

    assert!(!outcome.is_success());
    assert!(outcome.text().starts_with("tool error:"), "got {outcome}");
}

#[tokio::test]
async fn test_lookup_escapes_topic_and_sends_user_agent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/summary/Ada%20Lovelace"))
        .and(header("user-agent", "relay-test/1.0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "extract": "Augusta Ada King, Countess of Lovelace."
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let outcome = lookup_tool(&mock_server).invoke("Ada Lovelace").await;
    assert_eq!(outcome, Outcome::success("Augusta Ada King, Countess of Lovelace."));
}

#[tokio::test]
async fn test_lookup_timeout_is_tool_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/summary/Slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"extract": "too late"}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&mock_server)
        .await;

    let config = LookupSection {
        timeout_secs: Some(1),
        ..lookup_config(&mock_server)
    };
    let tool = SummaryLookupTool::new(&config).unwrap();

    let outcome = tool.invoke("Slow").await;
    assert!(outcome.text().starts_with("tool error:"), "got {outcome}");
}

#[tokio::test]
async fn test_failed_lookup_flows_through_reviewed_pipeline() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/summary/Missing_Page"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let pipeline = pipeline_with(PipelineMode::Reviewed, Arc::new(lookup_tool(&mock_server)));
    let (events, run) = drain(pipeline.start("Missing_Page", CancellationToken::new())).await;

    assert_eq!(
        lines(&events)[5..],
        [
            "[executor] Tool result: lookup failed with status 404",
            "[system] Shared tool result: lookup failed with status 404",
            "[system] All agents finished.",
        ]
    );
    assert_eq!(run.terminal(), Some(TerminalKind::Completed));
    assert_eq!(run.state().status(), RunStatus::ToolFailed);
    assert_eq!(run.state().result(), Some("lookup failed with status 404"));

    let snapshot = metrics().get_metrics();
    let stats = &snapshot.tools.tool_stats["summary_lookup"];
    assert!(stats.invocations >= 1);
    assert!(stats.failures >= 1);
}
