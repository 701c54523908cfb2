use std::{
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use ai_llm_service::{AiLlmError, ChatMessage};
use api::{AppState, router};
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use contextor::{APOLOGY, ChatFuture, ChatModel, ChatPipeline, ContextorConfig};
use rag_store::{RagConfig, RagStore, RetrievalFailurePolicy, StaticEmbedder};
use serde_json::{Value, json};
use tower::util::ServiceExt;

struct MockModel {
    calls: AtomicUsize,
    fail: bool,
}

impl ChatModel for MockModel {
    fn chat<'a>(&'a self, messages: &'a [ChatMessage]) -> ChatFuture<'a> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let turns = messages.len();
        let fail = self.fail;
        Box::pin(async move {
            if fail {
                Err(AiLlmError::Timeout(Duration::from_secs(1)))
            } else {
                Ok(format!("Peace be with you ({turns} messages)"))
            }
        })
    }
}

struct Harness {
    app: Router,
    model: Arc<MockModel>,
    embedder: StaticEmbedder,
    dir: tempfile::TempDir,
}

impl Harness {
    fn chunks_path(&self) -> std::path::PathBuf {
        self.dir.path().join("chunks.json")
    }
}

fn write_kb(dir: &Path, policy: RetrievalFailurePolicy) -> RagConfig {
    let index = dir.join("index.json");
    let chunks = dir.join("chunks.json");
    std::fs::write(&index, r#"{"metric":"l2","dim":2,"vectors":[[0,0],[1,0]]}"#).unwrap();
    std::fs::write(
        &chunks,
        r#"["Perform your duty without attachment.", "The soul is eternal."]"#,
    )
    .unwrap();
    RagConfig {
        index_path: index,
        chunks_path: chunks,
        top_k: 3,
        embedding_dim: None,
        on_embed_failure: policy,
    }
}

fn harness(embedder: StaticEmbedder, policy: RetrievalFailurePolicy, fail: bool) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let rag = RagStore::new(write_kb(dir.path(), policy), Arc::new(embedder.clone())).unwrap();
    let model = Arc::new(MockModel {
        calls: AtomicUsize::new(0),
        fail,
    });
    let pipeline = ChatPipeline::new(rag, model.clone(), &ContextorConfig::default()).unwrap();
    Harness {
        app: router(Arc::new(AppState::new(pipeline))),
        model,
        embedder,
        dir,
    }
}

fn default_harness() -> Harness {
    harness(
        StaticEmbedder::constant(vec![0.0, 0.0]),
        RetrievalFailurePolicy::Degrade,
        false,
    )
}

fn post_chat(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/api/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(body.into())
        .unwrap()
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn health_is_ok() {
    let h = default_harness();
    let req = Request::builder()
        .uri("/api/health")
        .body(Body::empty())
        .unwrap();

    let (status, body) = send(&h.app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn valid_query_gets_a_response() {
    let h = default_harness();

    let (status, body) = send(
        &h.app,
        post_chat(json!({"query": "How do I stay calm?"}).to_string()),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    // persona + the new user turn
    assert_eq!(body, json!({"response": "Peace be with you (2 messages)"}));
    assert_eq!(h.embedder.calls(), 1);
}

#[tokio::test]
async fn history_grows_within_a_thread() {
    let h = default_harness();

    for _ in 0..2 {
        let (status, _) = send(
            &h.app,
            post_chat(json!({"query": "again", "thread_id": "t-1"}).to_string()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
    let (_, body) = send(
        &h.app,
        post_chat(json!({"query": "third", "thread_id": "t-1"}).to_string()),
    )
    .await;
    assert_eq!(body["response"], "Peace be with you (6 messages)");

    let (_, other) = send(
        &h.app,
        post_chat(json!({"query": "fresh", "thread_id": "t-2"}).to_string()),
    )
    .await;
    assert_eq!(other["response"], "Peace be with you (2 messages)");
}

#[tokio::test]
async fn unusable_queries_are_bad_requests() {
    let h = default_harness();
    let bodies = [
        json!({"query": ""}).to_string(),
        json!({"query": "   "}).to_string(),
        json!({}).to_string(),
        json!({"query": 7}).to_string(),
        "{not json".to_string(),
    ];

    for b in bodies {
        let (status, body) = send(&h.app, post_chat(b.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body: {b}");
        assert_eq!(body, json!({"error": "No query provided"}));
    }
    assert_eq!(h.embedder.calls(), 0);
    assert_eq!(h.model.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_chunks_file_is_reported() {
    let h = default_harness();
    std::fs::remove_file(h.chunks_path()).unwrap();

    let (status, body) = send(&h.app, post_chat(json!({"query": "dharma"}).to_string())).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": "Knowledge base not found"}));
    assert_eq!(h.model.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn retrieval_failure_under_fail_policy_is_generic() {
    let h = harness(
        StaticEmbedder::failing(),
        RetrievalFailurePolicy::Fail,
        false,
    );

    let (status, body) = send(&h.app, post_chat(json!({"query": "karma"}).to_string())).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body,
        json!({"error": "An error occurred processing your request"})
    );
}

#[tokio::test]
async fn retrieval_failure_degrades_by_default() {
    let h = harness(
        StaticEmbedder::failing(),
        RetrievalFailurePolicy::Degrade,
        false,
    );

    let (status, body) = send(&h.app, post_chat(json!({"query": "karma"}).to_string())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"], "Peace be with you (2 messages)");
}

#[tokio::test]
async fn provider_failure_returns_the_apology() {
    let h = harness(
        StaticEmbedder::constant(vec![1.0, 0.0]),
        RetrievalFailurePolicy::Degrade,
        true,
    );

    let (status, body) = send(&h.app, post_chat(json!({"query": "why?"}).to_string())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"response": APOLOGY}));
}

#[tokio::test]
async fn request_id_is_echoed_or_generated() {
    let h = default_harness();

    let req = Request::builder()
        .uri("/api/health")
        .header("x-request-id", "abc-123")
        .body(Body::empty())
        .unwrap();
    let res = h.app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.headers()["x-request-id"], "abc-123");

    let req = Request::builder()
        .uri("/api/health")
        .body(Body::empty())
        .unwrap();
    let res = h.app.clone().oneshot(req).await.unwrap();
    let id = res.headers()["x-request-id"].to_str().unwrap();
    assert!(id.starts_with("req-"));
}

#[tokio::test]
async fn cors_preflight_is_allowed() {
    let h = default_harness();
    let req = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/chat")
        .header(header::ORIGIN, "http://localhost:3000")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();

    let res = h.app.clone().oneshot(req).await.unwrap();
    assert!(res.status().is_success());
    assert_eq!(res.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}
