//! End-to-end flows against a mock quota API.
//!
//! These tests start an axum server on a random port that mimics the
//! estimate, search, step1 and refresh endpoints, count every call, and
//! drive `HttpApi` + `Orchestrator` through complete flows.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use quota_gate::gate::ConfirmationPrompt;
use quota_gate::prelude::*;
use serde::Deserialize;
use serde_json::{Value, json};

// ── Mock server ──────────────────────────────────────────────────────

#[derive(Default)]
struct Counters {
    estimates: AtomicUsize,
    probes: AtomicUsize,
    cache_loads: AtomicUsize,
    executes: AtomicUsize,
}

impl Counters {
    fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

struct Mock {
    /// Reply to an unconfirmed search.
    probe_reply: Value,
    used_today: u64,
    estimated_calls: u32,
    actual_calls: u32,
    fail_estimates: bool,
    counters: Counters,
    /// Every request seen, as JSON.
    requests: Mutex<Vec<Value>>,
}

impl Default for Mock {
    fn default() -> Self {
        Self {
            probe_reply: json!({"success": false, "message": "no probe reply configured"}),
            used_today: 100,
            estimated_calls: 10,
            actual_calls: 12,
            fail_estimates: false,
            counters: Counters::default(),
            requests: Mutex::new(Vec::new()),
        }
    }
}

impl Mock {
    fn record(&self, request: Value) {
        self.requests.lock().unwrap().push(request);
    }

    fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }

    fn estimate_body(&self, details: Value) -> Response {
        self.counters.estimates.fetch_add(1, Ordering::SeqCst);
        if self.fail_estimates {
            return (StatusCode::INTERNAL_SERVER_ERROR, "estimator offline").into_response();
        }
        let mut body = json!({
            "success": true,
            "api_calls": 200,
            "details": {
                "estimated_time": {"seconds": 100.0, "display": "1.7m"},
                "cost_info": {"daily_limit": 1000, "used_today": self.used_today},
            },
        });
        if let Value::Object(extra) = details {
            for (key, value) in extra {
                body["details"][key.as_str()] = value;
            }
        }
        Json(body).into_response()
    }

    fn executed(&self, operation_type: &str) -> Json<Value> {
        self.counters.executes.fetch_add(1, Ordering::SeqCst);
        let calls: Vec<Value> = (0..self.actual_calls)
            .map(|i| {
                json!({
                    "api_type": "sale",
                    "region_code": "11680",
                    "deal_ymd": format!("2024{:02}", i % 12 + 1),
                    "response_time": 0.4,
                    "data_count": 10,
                    "success": true,
                })
            })
            .collect();
        let total = u64::from(self.actual_calls) * 10;
        Json(json!({
            "success": true,
            "total_count": total,
            "data": [],
            "api_tracking_result": {
                "operation_info": {
                    "operation_id": format!("{operation_type}_1714550000_1"),
                    "operation_type": operation_type,
                    "status": "completed",
                    "duration": 6.0,
                    "total_data_count": total,
                    "start_time": 1714550000.0,
                    "end_time": 1714550006.0,
                },
                "prediction_vs_actual": {
                    "estimated_calls": self.estimated_calls,
                    "actual_calls": self.actual_calls,
                    "estimated_duration": 5.0,
                    "actual_duration": 6.0,
                },
                "api_call_details": calls,
            },
        }))
    }
}

async fn search(State(mock): State<Arc<Mock>>, Json(body): Json<Value>) -> Json<Value> {
    mock.record(json!({"endpoint": "search", "body": body.clone()}));
    if body["confirmed"] == true {
        return mock.executed("search");
    }
    if body["cache_choice"] == "use_cache" {
        mock.counters.cache_loads.fetch_add(1, Ordering::SeqCst);
        return Json(json!({"success": true, "from_cache": true, "total_count": 1200, "data": []}));
    }
    mock.counters.probes.fetch_add(1, Ordering::SeqCst);
    Json(mock.probe_reply.clone())
}

async fn search_estimate(State(mock): State<Arc<Mock>>, Json(body): Json<Value>) -> Response {
    mock.record(json!({"endpoint": "search_estimate", "body": body}));
    mock.estimate_body(json!({"api_type": "sale", "months": 6}))
}

async fn step1_estimate(State(mock): State<Arc<Mock>>, Json(body): Json<Value>) -> Response {
    mock.record(json!({"endpoint": "step1_estimate", "body": body.clone()}));
    mock.estimate_body(json!({
        "operation": "step1_search",
        "city": body["city"],
        "district": body["district"],
        "api_type": body["search_type"],
        "months": 100,
    }))
}

async fn step1(State(mock): State<Arc<Mock>>, Json(body): Json<Value>) -> Response {
    mock.record(json!({"endpoint": "step1", "body": body.clone()}));
    if body["confirmed"] != true {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"success": false, "requires_confirmation": true})),
        )
            .into_response();
    }
    mock.executed("step1").into_response()
}

#[derive(Deserialize)]
struct RefreshQuery {
    months: Option<u32>,
    confirmed: Option<bool>,
}

async fn refresh_estimate(
    State(mock): State<Arc<Mock>>,
    Path((name, code)): Path<(String, String)>,
    Query(query): Query<RefreshQuery>,
) -> Response {
    mock.record(json!({"endpoint": "refresh_estimate", "name": name, "code": code}));
    mock.estimate_body(json!({
        "operation": "refresh",
        "apt_name": name,
        "region_code": code,
        "months": query.months.unwrap_or(6),
    }))
}

async fn refresh(
    State(mock): State<Arc<Mock>>,
    Path((name, code)): Path<(String, String)>,
    Query(query): Query<RefreshQuery>,
) -> Response {
    let confirmed = query.confirmed.unwrap_or(false);
    mock.record(json!({
        "endpoint": "refresh",
        "name": name,
        "code": code,
        "confirmed": confirmed,
    }));
    if !confirmed {
        return Json(json!({"success": false, "requires_confirmation": true})).into_response();
    }
    mock.executed("refresh").into_response()
}

/// Start the mock on a random port and return a client for it.
async fn spawn_mock(mock: Mock) -> (Arc<Mock>, HttpApi) {
    let mock = Arc::new(mock);
    let app = Router::new()
        .route("/api/search", post(search))
        .route("/api/search/estimate", post(search_estimate))
        .route("/api/search/step1", post(step1))
        .route("/api/search/step1/estimate", post(step1_estimate))
        .route("/api/refresh/estimate/{name}/{code}", get(refresh_estimate))
        .route("/api/refresh/{name}/{code}", get(refresh))
        .with_state(mock.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let api = HttpApi::with_client(reqwest::Client::new(), &format!("http://{addr}")).unwrap();
    (mock, api)
}

fn cache_reply() -> Value {
    json!({
        "success": false,
        "has_cache": true,
        "cache_info": {
            "region_name": "Seoul-Gangnam",
            "total_count": 1200,
            "created_at": "2024-05-01 09:30:00",
            "data_age_hours": 5.0,
        },
    })
}

fn search_request() -> OperationRequest {
    OperationRequest::search(SearchParams::new("Seoul", "Gangnam-gu"))
}

fn step1_request() -> OperationRequest {
    OperationRequest::step1(Step1Params::new("Seoul", "Gangnam-gu"))
}

fn refresh_request() -> OperationRequest {
    OperationRequest::refresh(RefreshParams::new("Raemian One", "11680"))
}

// ── Scenarios ────────────────────────────────────────────────────────

#[tokio::test]
async fn ready_probe_returns_without_estimating() {
    let (mock, api) = spawn_mock(Mock {
        probe_reply: json!({"success": true, "total_count": 3, "data": [1, 2, 3]}),
        ..Mock::default()
    })
    .await;
    let orchestrator = Orchestrator::new(api, fixed_gate(Decision::Cancel, CacheDecision::Cancel));

    let outcome = orchestrator.run(search_request()).await.unwrap();
    let result = outcome.result().expect("completed");
    assert_eq!(result.total_count(), Some(3));
    assert_eq!(result.payload["data"], json!([1, 2, 3]));

    assert_eq!(Counters::get(&mock.counters.probes), 1);
    assert_eq!(Counters::get(&mock.counters.estimates), 0);
    assert_eq!(Counters::get(&mock.counters.executes), 0);
}

#[tokio::test]
async fn refreshing_an_available_cache() {
    let (mock, api) = spawn_mock(Mock {
        probe_reply: cache_reply(),
        ..Mock::default()
    })
    .await;

    let offered = Arc::new(Mutex::new(Vec::new()));
    let gate = FnGate::new(|_: &Estimate| Decision::Proceed, {
        let offered = offered.clone();
        move |info: &CacheInfo| {
            offered.lock().unwrap().push(info.clone());
            CacheDecision::Refresh
        }
    });
    let orchestrator = Orchestrator::new(api, gate);

    let outcome = orchestrator.run(search_request()).await.unwrap();
    assert!(matches!(outcome, FlowOutcome::Completed(_)));

    let offered = offered.lock().unwrap();
    assert_eq!(offered.len(), 1);
    assert_eq!(offered[0].region_label, "Seoul-Gangnam");
    assert_eq!(offered[0].record_count, 1200);
    assert_eq!(offered[0].age_hours, 5.0);

    assert_eq!(Counters::get(&mock.counters.estimates), 1);
    assert_eq!(Counters::get(&mock.counters.executes), 1);
    assert_eq!(Counters::get(&mock.counters.cache_loads), 0);

    let requests = mock.requests();
    let estimate = requests
        .iter()
        .find(|r| r["endpoint"] == "search_estimate")
        .unwrap();
    assert_eq!(estimate["body"]["cache_choice"], "refresh");
    let executed = requests
        .iter()
        .find(|r| r["endpoint"] == "search" && r["body"]["confirmed"] == true)
        .unwrap();
    assert_eq!(executed["body"]["cache_choice"], "refresh");
}

#[tokio::test]
async fn using_an_available_cache_is_free() {
    let (mock, api) = spawn_mock(Mock {
        probe_reply: cache_reply(),
        ..Mock::default()
    })
    .await;
    let orchestrator =
        Orchestrator::new(api, fixed_gate(Decision::Proceed, CacheDecision::UseCache));

    let outcome = orchestrator.run(search_request()).await.unwrap();
    assert!(outcome.result().unwrap().from_cache());
    assert_eq!(Counters::get(&mock.counters.cache_loads), 1);
    assert_eq!(Counters::get(&mock.counters.estimates), 0);
    assert_eq!(Counters::get(&mock.counters.executes), 0);
}

#[tokio::test]
async fn high_quota_usage_is_critical() {
    let (_mock, api) = spawn_mock(Mock {
        used_today: 950,
        ..Mock::default()
    })
    .await;

    let estimate = api.estimate(&step1_request()).await.unwrap();
    assert_eq!(estimate.predicted_call_count, 200);
    assert_eq!(estimate.quota.usage_percentage(), 95.0);
    assert_eq!(estimate.quota.severity(), Severity::Critical);
    assert_eq!(estimate.kind(), OperationKind::Step1Search);

    let text = ConfirmationPrompt::from_estimate(&estimate).render();
    assert!(text.contains("95.0%"), "{text}");
    assert!(text.contains("critical"), "{text}");
}

#[tokio::test]
async fn refresh_is_reconciled_and_exported() {
    let (mock, api) = spawn_mock(Mock::default()).await;
    let orchestrator =
        Orchestrator::new(api, fixed_gate(Decision::Proceed, CacheDecision::Cancel));

    let outcome = orchestrator.run(refresh_request()).await.unwrap();
    let record = outcome.result().unwrap().tracking_record.clone().unwrap();
    assert_eq!(record.calls().len(), 12);

    let report = orchestrator.reporter().current_report().unwrap();
    assert_eq!(report.operation_kind, OperationKind::Refresh);
    assert_eq!(report.calls.accuracy, 80.0);
    assert_eq!(report.calls.grade, Grade::Good);
    assert_eq!(report.performance.successful_calls, 12);
    assert_eq!(report.total_data_count, 120);

    // The refresh name travelled percent-encoded and arrived intact.
    let requests = mock.requests();
    let executed = requests
        .iter()
        .find(|r| r["endpoint"] == "refresh")
        .unwrap();
    assert_eq!(executed["name"], "Raemian One");
    assert_eq!(executed["code"], "11680");
    assert_eq!(executed["confirmed"], true);

    let dir = tempfile::tempdir().unwrap();
    let path = orchestrator.reporter().export(dir.path()).unwrap();
    let parsed = TrackingRecord::from_json(&std::fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(parsed, record);
}

#[tokio::test]
async fn cancel_at_confirmation_issues_no_costed_call() {
    let (mock, api) = spawn_mock(Mock::default()).await;
    let orchestrator = Arc::new(Orchestrator::new(
        api,
        fixed_gate(Decision::Cancel, CacheDecision::Cancel),
    ));
    let continuations = Arc::new(AtomicUsize::new(0));

    // However often the user cancels, nothing costed is sent.
    for _ in 0..3 {
        let (ok, err) = (continuations.clone(), continuations.clone());
        let handle = orchestrator.spawn(
            step1_request(),
            move |_| {
                ok.fetch_add(1, Ordering::SeqCst);
            },
            move |_| {
                err.fetch_add(1, Ordering::SeqCst);
            },
        );
        assert_eq!(handle.wait().await, FlowEnd::Cancelled(CancelReason::User));
    }

    assert_eq!(continuations.load(Ordering::SeqCst), 0);
    assert_eq!(Counters::get(&mock.counters.estimates), 3);
    assert_eq!(Counters::get(&mock.counters.executes), 0);
    assert!(mock.requests().iter().all(|r| r["endpoint"] != "step1"));
}

#[tokio::test]
async fn step1_flow_skips_the_probe() {
    let (mock, api) = spawn_mock(Mock {
        estimated_calls: 12,
        ..Mock::default()
    })
    .await;
    let orchestrator =
        Orchestrator::new(api, fixed_gate(Decision::Proceed, CacheDecision::Cancel));

    orchestrator.run(step1_request()).await.unwrap();
    assert_eq!(Counters::get(&mock.counters.probes), 0);
    assert_eq!(Counters::get(&mock.counters.estimates), 1);
    assert_eq!(Counters::get(&mock.counters.executes), 1);

    let report = orchestrator.reporter().current_report().unwrap();
    assert_eq!(report.operation_kind, OperationKind::Step1Search);
    assert_eq!(report.calls.accuracy, 100.0);
}

#[tokio::test]
async fn server_rejection_carries_the_raw_body() {
    let (_mock, api) = spawn_mock(Mock {
        probe_reply: json!({"success": false, "message": "daily limit reached"}),
        ..Mock::default()
    })
    .await;
    let orchestrator =
        Orchestrator::new(api, fixed_gate(Decision::Proceed, CacheDecision::Refresh));

    let err = orchestrator.run(search_request()).await.unwrap_err();
    match &err {
        GateError::ServerRejection { message, raw } => {
            assert_eq!(message, "daily limit reached");
            assert_eq!(raw["success"], false);
        }
        other => panic!("expected a rejection, got {other:?}"),
    }
    assert!(err.is_network());
}

#[tokio::test]
async fn transport_errors_reach_on_error() {
    let (mock, api) = spawn_mock(Mock {
        fail_estimates: true,
        ..Mock::default()
    })
    .await;
    let orchestrator = Arc::new(Orchestrator::new(
        api,
        fixed_gate(Decision::Proceed, CacheDecision::Cancel),
    ));
    let (tx, rx) = tokio::sync::oneshot::channel();

    let handle = orchestrator.spawn(
        refresh_request(),
        |_| panic!("success continuation must not run"),
        move |e| {
            let _ = tx.send(e);
        },
    );
    assert_eq!(handle.wait().await, FlowEnd::Failed);

    let err = rx.await.unwrap();
    assert!(matches!(&err, GateError::Transport(msg) if msg.contains("500")), "{err}");
    assert_eq!(Counters::get(&mock.counters.executes), 0);
}

#[tokio::test]
async fn invalid_requests_are_rejected_locally() {
    let (mock, api) = spawn_mock(Mock::default()).await;
    let orchestrator =
        Orchestrator::new(api, fixed_gate(Decision::Proceed, CacheDecision::Refresh));

    let bad = OperationRequest::refresh(RefreshParams::new("Raemian One", "seoul"));
    let err = orchestrator.run(bad).await.unwrap_err();
    assert!(matches!(err, GateError::Validation { field: "region_code", .. }));
    assert!(mock.requests().is_empty());
}
