//! End-to-end methods generation against a mocked Galaxy server.
//!
//! The dispatcher connects over HTTP, so every request the pipeline makes is
//! visible to wiremock and counted by `.expect(..)`.

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use galaxy_agent::cancel::CancelToken;
use galaxy_agent::config::{IwcConfig, RequestConfig};
use galaxy_agent::dispatch::HttpConnector;
use galaxy_agent::error::AgentError;
use galaxy_agent::galaxy::IwcClient;
use galaxy_agent::{ConnectionContext, Dispatcher};

const TEST_API_KEY: &str = "test-api-key";

fn request_config() -> RequestConfig {
    RequestConfig {
        timeout_ms: 5000,
        max_retries: 0,
        retry_delay_ms: 100,
    }
}

async fn connected_dispatcher(server: &MockServer) -> Dispatcher {
    Mock::given(method("GET"))
        .and(path("/api/users/current"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "u1",
            "username": "ada"
        })))
        .mount(server)
        .await;

    let catalog = IwcClient::new(
        &IwcConfig {
            manifest_url: format!("{}/iwc/manifest.json", server.uri()),
        },
        &request_config(),
    )
    .unwrap();
    let dispatcher = Dispatcher::new(
        ConnectionContext::new(),
        Arc::new(HttpConnector::new(request_config())),
        Arc::new(catalog),
    );
    dispatcher
        .connect(Some(server.uri()), Some(TEST_API_KEY.to_string()))
        .await
        .expect("connect failed");
    dispatcher
}

async fn mount_json(server: &MockServer, route: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// History h1: toolA, toolB, toolA (listed newest first) plus a failed job.
async fn mount_history_h1(server: &MockServer) {
    mount_json(server, "/api/histories/h1", json!({"id": "h1", "name": "RNA-seq run"})).await;

    Mock::given(method("GET"))
        .and(path("/api/jobs"))
        .and(query_param("history_id", "h1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "j4", "tool_id": "toolC", "state": "error", "create_time": "2024-01-01T10:15:00"},
            {"id": "j3", "tool_id": "toolA", "tool_version": "1.0", "state": "ok", "create_time": "2024-01-01T10:10:00"},
            {"id": "j2", "tool_id": "toolB", "tool_version": "2.1", "state": "ok", "create_time": "2024-01-01T10:05:00"},
            {"id": "j1", "tool_id": "toolA", "tool_version": "1.0", "state": "ok", "create_time": "2024-01-01T10:00:00"}
        ])))
        .expect(1)
        .mount(server)
        .await;

    mount_json(
        server,
        "/api/jobs/j1",
        json!({
            "id": "j1", "tool_id": "toolA", "tool_version": "1.0", "state": "ok",
            "create_time": "2024-01-01T10:00:00",
            "params": {"threshold": "\"5\"", "mode": "\"fast\"", "__job_resource": {"__current_case__": 0}},
            "outputs": {"out_file": {"id": "d1", "src": "hda"}}
        }),
    )
    .await;
    mount_json(
        server,
        "/api/jobs/j2",
        json!({
            "id": "j2", "tool_id": "toolB", "tool_version": "2.1", "state": "ok",
            "create_time": "2024-01-01T10:05:00",
            "params": {"input": "{\"values\": [{\"id\": \"d1\", \"src\": \"hda\"}]}", "paired": "false"},
            "outputs": {"report": {"id": "d2", "src": "hda"}}
        }),
    )
    .await;
    mount_json(
        server,
        "/api/jobs/j3",
        json!({
            "id": "j3", "tool_id": "toolA", "tool_version": "1.0", "state": "ok",
            "create_time": "2024-01-01T10:10:00",
            "params": {"threshold": "\"7\"", "mode": "\"fast\""},
            "outputs": {"out_file": {"id": "d3", "src": "hda"}}
        }),
    )
    .await;
}

async fn mount_citations(server: &MockServer, tool_id: &str, version: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/api/tools/{}/citations", tool_id)))
        .and(query_param("tool_version", version))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_methods_for_history_with_repeated_tool() {
    let server = MockServer::start().await;
    let dispatcher = connected_dispatcher(&server).await;
    mount_history_h1(&server).await;

    // One citation lookup per distinct tool release, even though toolA ran twice.
    mount_citations(
        &server,
        "toolA",
        "1.0",
        json!([{"format": "doi", "content": "10.1000/toola"}]),
    )
    .await;
    mount_citations(
        &server,
        "toolB",
        "2.1",
        json!([{"format": "bibtex", "content": "@article{b, author={Jane Doe}, title={Tool B}, journal={Journal}, year={2020}}"}]),
    )
    .await;

    let document = dispatcher.generate_methods("h1").await.unwrap();

    assert_eq!(document.history_name(), "RNA-seq run");
    assert_eq!(
        document.overview(),
        "The analysis recorded in the Galaxy history \"RNA-seq run\" comprised 3 completed tool invocations using 2 distinct tools."
    );

    let blocks = document.blocks();
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0].tool.tool_id, "toolA");
    assert_eq!(blocks[0].citation_marker, 1);
    assert_eq!(
        blocks[0].narrative,
        "toolA (version 1.0) was run 2 times, at steps 1 and 3 [1]."
    );
    assert_eq!(blocks[1].tool.tool_id, "toolB");
    assert_eq!(blocks[1].citation_marker, 2);

    let references = document.references();
    assert_eq!(references.len(), 2);
    assert!(references.iter().all(|r| r.available));
    assert_eq!(
        references[0].text,
        "toolA (version 1.0): doi:10.1000/toola"
    );
    assert_eq!(
        references[1].text,
        "toolB (version 2.1): Jane Doe (2020). Tool B. Journal."
    );

    let markdown = document.to_markdown();
    assert!(markdown.contains("- threshold: 5\n"));
    assert!(markdown.contains("- threshold: 7\n"));
    assert!(markdown.contains("- mode: fast\n"));
    assert!(markdown.contains("- input: output `out_file` of step 1\n"));
    assert!(markdown.contains("- paired: no\n"));
    assert!(!markdown.contains("__job_resource"));
    assert!(!markdown.contains("toolC"));
}

#[tokio::test]
async fn test_citation_failure_yields_placeholder() {
    let server = MockServer::start().await;
    let dispatcher = connected_dispatcher(&server).await;
    mount_history_h1(&server).await;

    mount_citations(&server, "toolA", "1.0", json!([])).await;
    Mock::given(method("GET"))
        .and(path("/api/tools/toolB/citations"))
        .respond_with(ResponseTemplate::new(500).set_body_string("citation service down"))
        .expect(1)
        .mount(&server)
        .await;

    let document = dispatcher.generate_methods("h1").await.unwrap();

    assert_eq!(document.blocks().len(), 2);
    let references = document.references();
    assert_eq!(references.len(), 2);

    assert!(!references[0].available);
    assert_eq!(
        references[0].unavailable_reason.as_deref(),
        Some("no citations registered for this tool")
    );
    assert!(!references[1].available);
    assert!(references[1]
        .unavailable_reason
        .as_deref()
        .unwrap()
        .contains("citation service down"));
    assert_eq!(
        references[1].text,
        "toolB (version 2.1): citation unavailable."
    );
}

#[tokio::test]
async fn test_generation_is_deterministic() {
    let server = MockServer::start().await;
    let dispatcher = connected_dispatcher(&server).await;
    mount_json(&server, "/api/histories/h1", json!({"id": "h1", "name": "RNA-seq run"})).await;
    mount_json(
        &server,
        "/api/jobs",
        json!([{"id": "j1", "tool_id": "toolA", "tool_version": "1.0", "state": "ok"}]),
    )
    .await;
    mount_json(
        &server,
        "/api/jobs/j1",
        json!({
            "id": "j1", "tool_id": "toolA", "tool_version": "1.0", "state": "ok",
            "params": {"b": "2", "a": "1", "c": "[\"x\", \"y\"]"}
        }),
    )
    .await;
    mount_json(
        &server,
        "/api/tools/toolA/citations",
        json!([{"format": "doi", "content": "https://doi.org/10.1000/toola"}]),
    )
    .await;

    let first = dispatcher.generate_methods("h1").await.unwrap();
    let second = dispatcher.generate_methods("h1").await.unwrap();

    assert_eq!(first.to_markdown(), second.to_markdown());
    assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
    assert!(first
        .to_markdown()
        .contains("- a: 1\n- b: 2\n- c: x, y\n"));
}

#[tokio::test]
async fn test_unreadable_job_is_flagged_not_fatal() {
    let server = MockServer::start().await;
    let dispatcher = connected_dispatcher(&server).await;
    mount_json(&server, "/api/histories/h2", json!({"id": "h2", "name": "Partial"})).await;
    mount_json(
        &server,
        "/api/jobs",
        json!([
            {"id": "j1", "tool_id": "toolA", "tool_version": "1.0", "state": "ok", "create_time": "2024-01-01T10:00:00"},
            {"id": "j2", "tool_id": "toolA", "tool_version": "1.0", "state": "ok", "create_time": "2024-01-01T11:00:00"}
        ]),
    )
    .await;
    mount_json(
        &server,
        "/api/jobs/j1",
        json!({
            "id": "j1", "tool_id": "toolA", "tool_version": "1.0", "state": "ok",
            "params": {"reference": {"__class__": "RuntimeValue"}}
        }),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/api/jobs/j2"))
        .respond_with(ResponseTemplate::new(403).set_body_string("access denied"))
        .mount(&server)
        .await;
    mount_json(&server, "/api/tools/toolA/citations", json!([])).await;

    let document = dispatcher.generate_methods("h2").await.unwrap();

    let block = &document.blocks()[0];
    assert_eq!(block.invocations.len(), 2);
    assert_eq!(
        block.invocations[0].incomplete.as_deref(),
        Some("unresolved parameters: reference")
    );
    assert!(block.invocations[1]
        .incomplete
        .as_deref()
        .unwrap()
        .starts_with("job details unavailable"));

    let markdown = document.to_markdown();
    assert!(markdown.contains("- reference: unresolved (set at run time)\n"));
    assert!(markdown.contains("*Parameters incomplete:"));
}

#[tokio::test]
async fn test_history_without_completed_jobs() {
    let server = MockServer::start().await;
    let dispatcher = connected_dispatcher(&server).await;
    mount_json(&server, "/api/histories/h3", json!({"id": "h3", "name": "Failed"})).await;
    mount_json(
        &server,
        "/api/jobs",
        json!([
            {"id": "j1", "tool_id": "toolA", "state": "error"},
            {"id": "j2", "tool_id": "toolA", "state": "running"}
        ]),
    )
    .await;

    let result = dispatcher.generate_methods("h3").await;

    assert!(matches!(
        result,
        Err(AgentError::EmptyHistory { ref history_id }) if history_id == "h3"
    ));
}

#[tokio::test]
async fn test_unknown_history_through_dispatch() {
    let server = MockServer::start().await;
    let dispatcher = connected_dispatcher(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/histories/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let result = dispatcher
        .dispatch("generateMethods", json!({"historyId": "missing"}))
        .await;

    assert!(matches!(
        result,
        Err(AgentError::NotFound { ref id, .. }) if id == "missing"
    ));
}

#[tokio::test]
async fn test_generate_methods_operation_result() {
    let server = MockServer::start().await;
    let dispatcher = connected_dispatcher(&server).await;
    mount_history_h1(&server).await;
    mount_json(&server, "/api/tools/toolA/citations", json!([])).await;
    mount_json(&server, "/api/tools/toolB/citations", json!([])).await;

    let result = dispatcher
        .dispatch("generate_methods", json!({"history_id": "h1"}))
        .await
        .unwrap();

    assert_eq!(result["history_id"], "h1");
    assert_eq!(result["history_name"], "RNA-seq run");
    let text = result["methods_text"].as_str().unwrap();
    assert!(text.starts_with("# Methods\n"));
    assert!(text.contains("## References"));
    assert!(result["document"].is_object());
}

#[tokio::test]
async fn test_slow_history_is_cancelled() {
    let server = MockServer::start().await;
    let dispatcher = connected_dispatcher(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/histories/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"id": "slow", "name": "Slow"}))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let cancel = CancelToken::never().with_timeout(Duration::from_millis(50));
    let result = dispatcher.generate_methods_with("slow", &cancel).await;

    assert!(matches!(result, Err(AgentError::Cancelled { .. })));
}

async fn mount_delayed_citations(server: &MockServer, tool_id: &str, body: Value, delay: Duration) {
    Mock::given(method("GET"))
        .and(path(format!("/api/tools/{}/citations", tool_id)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(body)
                .set_delay(delay),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_references_keep_first_occurrence_order_when_lookups_finish_late() {
    let server = MockServer::start().await;
    let dispatcher = connected_dispatcher(&server).await;
    mount_history_h1(&server).await;

    // toolA is used first but its lookup answers last.
    mount_delayed_citations(
        &server,
        "toolA",
        json!([{"format": "doi", "content": "10.1000/toola"}]),
        Duration::from_millis(300),
    )
    .await;
    mount_delayed_citations(
        &server,
        "toolB",
        json!([{"format": "doi", "content": "10.1000/toolb"}]),
        Duration::ZERO,
    )
    .await;

    let document = dispatcher.generate_methods("h1").await.unwrap();

    let references = document.references();
    assert_eq!(references.len(), 2);
    assert_eq!(references[0].text, "toolA (version 1.0): doi:10.1000/toola");
    assert_eq!(references[1].text, "toolB (version 2.1): doi:10.1000/toolb");
    assert_eq!(document.blocks()[0].citation_marker, 1);
    assert_eq!(document.blocks()[1].citation_marker, 2);
}

#[tokio::test]
async fn test_slow_citations_are_cancelled() {
    let server = MockServer::start().await;
    let dispatcher = connected_dispatcher(&server).await;
    mount_history_h1(&server).await;

    for tool_id in ["toolA", "toolB"] {
        mount_delayed_citations(&server, tool_id, json!([]), Duration::from_secs(5)).await;
    }

    let cancel = CancelToken::never().with_timeout(Duration::from_millis(1000));
    let result = dispatcher.generate_methods_with("h1", &cancel).await;

    match result {
        Err(AgentError::Cancelled { stage }) => assert_eq!(stage, "citation resolution"),
        other => panic!("expected cancellation during citation resolution, got {:?}", other.map(|_| ())),
    }
}
