//! End-to-end pipeline tests over mock backends, the in-memory store, and a
//! wiremock webhook target.
//!
//! The webhook mocks are mounted with `expect(1)`: every scenario, whatever
//! combination of step failures it exercises, must attempt exactly one
//! terminal notification. wiremock verifies the expectation when the mock
//! server drops.

use std::sync::Arc;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use delve_core::defaults::report_path;
use delve_core::{JobStatus, QueryItemState, ResearchJob};
use delve_inference::MockBackend;
use delve_pipeline::{
    InMemoryStore, JobOutcome, PipelineConfig, ResearchPipeline, WebhookNotifier,
};

const PLAN_ONE: &str = r#"[{"query": "tea origins", "researchGoal": "earliest cultivation"}]"#;

const PLAN_THREE: &str = r#"[
    {"query": "tea origins", "researchGoal": "earliest cultivation"},
    {"query": "tea trade", "researchGoal": "trade routes"},
    {"query": "tea ceremony", "researchGoal": "cultural role"}
]"#;

async fn webhook_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    server
}

async fn run_job(
    thinking: MockBackend,
    networking: MockBackend,
    store: InMemoryStore,
    config: PipelineConfig,
    callback_url: Option<String>,
) -> JobOutcome {
    let pipeline = ResearchPipeline::new(
        Arc::new(thinking),
        Arc::new(networking),
        Arc::new(store),
        WebhookNotifier::new().unwrap(),
        config,
    );
    pipeline
        .run(ResearchJob::new("history of tea").with_callback_url(callback_url))
        .await
}

async fn terminal_message(server: &MockServer) -> String {
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1, "expected exactly one terminal webhook");
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    body["text"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn successful_job_stores_report_and_links_id() {
    let server = webhook_server().await;
    let store = InMemoryStore::new();

    let thinking = MockBackend::new()
        .with_reply(PLAN_ONE)
        .with_reply("# The History of Tea\n\nTea originated in China.");
    let networking = MockBackend::new().with_reply("tea was first cultivated in Yunnan");

    let outcome = run_job(
        thinking,
        networking,
        store.clone(),
        PipelineConfig {
            public_base_url: Some("https://delve.example.com".to_string()),
            ..Default::default()
        },
        Some(format!("{}/hook", server.uri())),
    )
    .await;

    assert_eq!(outcome.status, JobStatus::Succeeded);
    let report = outcome.report.expect("report should exist");
    assert!(!report.id.is_empty());
    assert_eq!(
        store.content(&report_path(&report.id)).unwrap(),
        "# The History of Tea\n\nTea originated in China."
    );

    let message = terminal_message(&server).await;
    assert!(message.contains("Research complete in"));
    assert!(message.contains(&report.id));
    assert!(message.contains("https://delve.example.com/api/reports/"));
}

#[tokio::test]
async fn item_failure_is_isolated_from_the_job() {
    let server = webhook_server().await;

    let thinking = MockBackend::new()
        .with_reply(PLAN_THREE)
        .with_reply("# Report");
    let networking = MockBackend::new()
        .with_reply("learning about origins")
        .with_error("model overloaded")
        .with_reply("learning about ceremony");

    let outcome = run_job(
        thinking.clone(),
        networking,
        InMemoryStore::new(),
        PipelineConfig::default(),
        Some(format!("{}/hook", server.uri())),
    )
    .await;

    assert_eq!(outcome.status, JobStatus::Succeeded);

    let states: Vec<QueryItemState> = outcome.items.iter().map(|i| i.state).collect();
    assert_eq!(
        states,
        vec![
            QueryItemState::Processed,
            QueryItemState::Failed,
            QueryItemState::Processed,
        ]
    );

    let learnings = outcome.learnings();
    assert_eq!(
        learnings,
        vec!["learning about origins", "learning about ceremony"]
    );

    // The synthesis prompt saw both surviving learnings, in order
    let calls = thinking.calls();
    assert_eq!(calls.len(), 2);
    let synthesis_prompt = &calls[1].prompt;
    let first = synthesis_prompt.find("learning about origins").unwrap();
    let second = synthesis_prompt.find("learning about ceremony").unwrap();
    assert!(first < second);

    let message = terminal_message(&server).await;
    assert!(message.contains("Research complete in"));
}

#[tokio::test]
async fn generation_failure_short_circuits_to_notification() {
    let server = webhook_server().await;
    let store = InMemoryStore::new();

    let thinking = MockBackend::new().with_reply("the model refused to answer in JSON");
    let networking = MockBackend::new();

    let outcome = run_job(
        thinking,
        networking.clone(),
        store.clone(),
        PipelineConfig::default(),
        Some(format!("{}/hook", server.uri())),
    )
    .await;

    assert_eq!(outcome.status, JobStatus::Failed);
    assert!(outcome
        .error
        .as_ref()
        .unwrap()
        .to_string()
        .contains("Query generation failed"));
    assert!(outcome.items.is_empty());
    assert!(store.is_empty());
    // Retrieval never started
    assert_eq!(networking.call_count(), 0);

    let message = terminal_message(&server).await;
    assert!(message.contains("Research failed after"));
}

#[tokio::test]
async fn empty_query_plan_fails_the_job() {
    let server = webhook_server().await;

    let thinking = MockBackend::new().with_reply("[]");
    let outcome = run_job(
        thinking,
        MockBackend::new(),
        InMemoryStore::new(),
        PipelineConfig::default(),
        Some(format!("{}/hook", server.uri())),
    )
    .await;

    assert_eq!(outcome.status, JobStatus::Failed);
    let message = terminal_message(&server).await;
    assert!(message.contains("no usable queries"));
}

#[tokio::test]
async fn empty_synthesis_fails_the_job() {
    let server = webhook_server().await;
    let store = InMemoryStore::new();

    let thinking = MockBackend::new().with_reply(PLAN_ONE).with_reply("  \n  ");
    let networking = MockBackend::new().with_reply("a learning");

    let outcome = run_job(
        thinking,
        networking,
        store.clone(),
        PipelineConfig::default(),
        Some(format!("{}/hook", server.uri())),
    )
    .await;

    assert_eq!(outcome.status, JobStatus::Failed);
    assert!(outcome
        .error
        .as_ref()
        .unwrap()
        .to_string()
        .contains("Report synthesis failed"));
    assert!(store.is_empty());

    let message = terminal_message(&server).await;
    assert!(message.contains("Research failed after"));
}

#[tokio::test]
async fn storage_failure_degrades_but_keeps_content_visible() {
    let server = webhook_server().await;

    let thinking = MockBackend::new()
        .with_reply(PLAN_ONE)
        .with_reply("# The History of Tea");
    let networking = MockBackend::new().with_reply("a learning");

    let outcome = run_job(
        thinking,
        networking,
        InMemoryStore::with_put_error("disk full"),
        PipelineConfig::default(),
        Some(format!("{}/hook", server.uri())),
    )
    .await;

    // Degraded success: job is failed, but the report body survives with
    // the storage error rendered into it
    assert_eq!(outcome.status, JobStatus::Failed);
    let report = outcome.report.expect("degraded report should be kept");
    assert!(report.content.contains("disk full"));
    assert!(report.content.contains("# The History of Tea"));
    assert!(report.storage_url.is_none());

    let message = terminal_message(&server).await;
    assert!(message.contains("Research failed after"));
    assert!(message.contains("disk full"));
    // Elapsed seconds with one decimal place
    assert!(message.contains('s'));
}

#[tokio::test]
async fn malformed_plan_is_repaired_before_validation() {
    let server = webhook_server().await;

    let thinking = MockBackend::new()
        .with_reply("```json\n[{query: 'tea origins', researchGoal: 'cultivation'}]\n```")
        .with_reply("# Report");
    let networking = MockBackend::new().with_reply("a learning");

    let outcome = run_job(
        thinking,
        networking,
        InMemoryStore::new(),
        PipelineConfig::default(),
        Some(format!("{}/hook", server.uri())),
    )
    .await;

    assert_eq!(outcome.status, JobStatus::Succeeded);
    assert_eq!(outcome.items.len(), 1);
    assert_eq!(outcome.items[0].query, "tea origins");
}

#[tokio::test]
async fn chunked_stream_accumulates_across_boundaries() {
    let server = webhook_server().await;

    let thinking = MockBackend::new()
        .with_chunked_reply([
            "[{\"query\": \"tea",
            " origins\", \"research",
            "Goal\": \"cultivation\"}]",
        ])
        .with_chunked_reply(["# The History", " of Tea"]);
    let networking = MockBackend::new().with_chunked_reply(["learning ", "in parts"]);

    let outcome = run_job(
        thinking,
        networking,
        InMemoryStore::new(),
        PipelineConfig::default(),
        Some(format!("{}/hook", server.uri())),
    )
    .await;

    assert_eq!(outcome.status, JobStatus::Succeeded);
    assert_eq!(outcome.items[0].query, "tea origins");
    assert_eq!(outcome.items[0].learning, "learning in parts");
    assert_eq!(outcome.report.unwrap().content, "# The History of Tea");
}

#[tokio::test]
async fn absent_callback_completes_without_notification() {
    let thinking = MockBackend::new().with_reply(PLAN_ONE).with_reply("# Report");
    let networking = MockBackend::new().with_reply("a learning");

    let outcome = run_job(
        thinking,
        networking,
        InMemoryStore::new(),
        PipelineConfig::default(),
        None,
    )
    .await;

    assert_eq!(outcome.status, JobStatus::Succeeded);
}

#[tokio::test]
async fn success_without_public_base_url_reports_raw_id() {
    let server = webhook_server().await;

    let thinking = MockBackend::new().with_reply(PLAN_ONE).with_reply("# Report");
    let networking = MockBackend::new().with_reply("a learning");

    let outcome = run_job(
        thinking,
        networking,
        InMemoryStore::new(),
        PipelineConfig::default(),
        Some(format!("{}/hook", server.uri())),
    )
    .await;

    let report_id = outcome.report.unwrap().id;
    let message = terminal_message(&server).await;
    assert!(message.contains(&format!("Report id: {}", report_id)));
    assert!(message.contains("public base URL"));
}
