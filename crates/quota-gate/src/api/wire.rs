//! Decoding of the API's JSON responses into workflow types.
//!
//! Only the fields the workflow consumes are read; everything else in a
//! response stays in the opaque [`OperationResult::payload`].

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::cache::{CacheInfo, ProbeOutcome};
use crate::error::GateError;
use crate::estimate::{Estimate, EstimatedTime, OperationDetail, Quota};
use crate::request::OperationKind;
use crate::result::OperationResult;
use crate::tracking::{CallRecord, Measure, OperationStatus, TrackingParts, TrackingRecord};

fn flag(body: &Value, key: &str) -> bool {
    body.get(key).and_then(Value::as_bool).unwrap_or(false)
}

/// A `success=false` payload as a [`GateError::ServerRejection`].
pub(crate) fn rejection(body: Value) -> GateError {
    let message = ["message", "error"]
        .iter()
        .find_map(|k| body.get(*k).and_then(Value::as_str))
        .unwrap_or("server reported success=false")
        .to_string();
    GateError::ServerRejection { message, raw: body }
}

fn require_success(body: Value) -> Result<Value, GateError> {
    if flag(&body, "success") {
        Ok(body)
    } else {
        Err(rejection(body))
    }
}

// ── Estimate ──────────────────────────────────────────────────────

/// Decode an estimate endpoint response.
pub(crate) fn decode_estimate(
    endpoint: &str,
    kind: OperationKind,
    body: Value,
) -> Result<Estimate, GateError> {
    let body = require_success(body)?;
    estimate_fields(endpoint, kind, &body)
}

/// Read `{api_calls, details}` without checking `success`; the probe's
/// confirmation-required reply carries `success=false`.
fn estimate_fields(
    endpoint: &str,
    kind: OperationKind,
    body: &Value,
) -> Result<Estimate, GateError> {
    let calls = body
        .get("api_calls")
        .and_then(Value::as_u64)
        .ok_or_else(|| GateError::malformed(endpoint, "missing api_calls"))?;
    let predicted_call_count = u32::try_from(calls)
        .map_err(|_| GateError::malformed(endpoint, format!("api_calls {calls} out of range")))?;

    let details = body
        .get("details")
        .and_then(Value::as_object)
        .ok_or_else(|| GateError::malformed(endpoint, "missing details"))?;

    let time = details
        .get("estimated_time")
        .ok_or_else(|| GateError::malformed(endpoint, "missing details.estimated_time"))?;
    let seconds = time.get("seconds").and_then(Value::as_f64);
    let display = time.get("display").and_then(Value::as_str);
    let predicted_duration = match (seconds, display) {
        (Some(seconds), Some(display)) => EstimatedTime {
            seconds,
            display: display.to_string(),
        },
        (Some(seconds), None) => EstimatedTime::from_seconds(seconds),
        // Display-only estimates carry no numeric duration.
        (None, Some(display)) => EstimatedTime {
            seconds: 0.0,
            display: display.to_string(),
        },
        (None, None) => {
            return Err(GateError::malformed(
                endpoint,
                "estimated_time has neither seconds nor display",
            ));
        }
    };

    let cost = details
        .get("cost_info")
        .ok_or_else(|| GateError::malformed(endpoint, "missing details.cost_info"))?;
    let daily_limit = cost
        .get("daily_limit")
        .and_then(Value::as_u64)
        .ok_or_else(|| GateError::malformed(endpoint, "missing cost_info.daily_limit"))?;
    let used_today = cost
        .get("used_today")
        .or_else(|| cost.get("current_usage"))
        .and_then(Value::as_u64)
        .or_else(|| {
            cost.get("usage_percentage")
                .and_then(Value::as_f64)
                .map(|pct| (pct / 100.0 * daily_limit as f64).round().max(0.0) as u64)
        })
        .ok_or_else(|| GateError::malformed(endpoint, "cost_info carries no usage"))?;

    // Validate the tag before destructuring; search details omit it.
    let mut detail = Value::Object(details.clone());
    match details.get("operation").and_then(Value::as_str) {
        Some(tag) if tag != kind.as_str() => {
            return Err(GateError::malformed(
                endpoint,
                format!("expected {kind} details, got '{tag}'"),
            ));
        }
        Some(_) => {}
        None => detail["operation"] = Value::from(kind.as_str()),
    }
    let operation_detail: OperationDetail = serde_json::from_value(detail)
        .map_err(|e| GateError::malformed(endpoint, format!("details: {e}")))?;

    Ok(Estimate {
        predicted_call_count,
        predicted_duration,
        quota: Quota {
            used_today,
            daily_limit,
        },
        operation_detail,
    })
}

// ── Probe ─────────────────────────────────────────────────────────

/// Classify a search probe response. Exactly one outcome per body.
pub(crate) fn decode_probe(endpoint: &str, body: Value) -> ProbeOutcome {
    if flag(&body, "success") {
        return match decode_result(endpoint, OperationKind::Search, body) {
            Ok(result) => ProbeOutcome::Ready(result),
            Err(e) => ProbeOutcome::Failed(e),
        };
    }
    if flag(&body, "has_cache") {
        let info = body
            .get("cache_info")
            .cloned()
            .ok_or_else(|| GateError::malformed(endpoint, "has_cache without cache_info"))
            .and_then(|raw| {
                serde_json::from_value::<CacheInfo>(raw)
                    .map_err(|e| GateError::malformed(endpoint, format!("cache_info: {e}")))
            });
        return match info {
            Ok(info) => ProbeOutcome::CacheAvailable(info),
            Err(e) => ProbeOutcome::Failed(e),
        };
    }
    if flag(&body, "requires_confirmation") {
        return match estimate_fields(endpoint, OperationKind::Search, &body) {
            Ok(estimate) => ProbeOutcome::ConfirmationRequired(estimate),
            Err(e) => ProbeOutcome::Failed(e),
        };
    }
    ProbeOutcome::Failed(rejection(body))
}

// ── Result ────────────────────────────────────────────────────────

/// Decode an execute or cache response, lifting `api_tracking_result`
/// into a [`TrackingRecord`] when present.
pub(crate) fn decode_result(
    endpoint: &str,
    kind: OperationKind,
    body: Value,
) -> Result<OperationResult, GateError> {
    let body = require_success(body)?;
    let tracking = match body.get("api_tracking_result") {
        None | Some(Value::Null) => None,
        Some(raw) => Some(decode_tracking(endpoint, kind, raw)?),
    };
    let result = OperationResult::new(body);
    Ok(match tracking {
        Some(record) => result.with_tracking(record),
        None => result,
    })
}

#[derive(Deserialize)]
struct RawTracking {
    operation_info: RawOperationInfo,
    prediction_vs_actual: RawPrediction,
    #[serde(default)]
    api_call_details: Vec<CallRecord>,
}

#[derive(Deserialize)]
struct RawOperationInfo {
    operation_id: String,
    #[serde(default)]
    operation_type: Option<String>,
    #[serde(default)]
    status: Option<String>,
    duration: f64,
    #[serde(default)]
    total_data_count: Option<u64>,
    #[serde(default)]
    start_time: Option<f64>,
    #[serde(default)]
    end_time: Option<f64>,
}

#[derive(Deserialize)]
struct RawPrediction {
    estimated_calls: u32,
    actual_calls: u32,
    estimated_duration: f64,
    actual_duration: f64,
}

fn epoch(secs: f64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis((secs * 1000.0).round() as i64)
}

pub(crate) fn decode_tracking(
    endpoint: &str,
    kind: OperationKind,
    raw: &Value,
) -> Result<TrackingRecord, GateError> {
    let parsed = RawTracking::deserialize(raw)
        .map_err(|e| GateError::malformed(endpoint, format!("api_tracking_result: {e}")))?;
    let info = parsed.operation_info;
    let prediction = parsed.prediction_vs_actual;

    let operation_kind = info
        .operation_type
        .and_then(|t| serde_json::from_value::<OperationKind>(Value::String(t)).ok())
        .unwrap_or(kind);
    let status = match info.status.as_deref() {
        Some("failed") => OperationStatus::Failed,
        _ => OperationStatus::Completed,
    };

    TrackingRecord::new(TrackingParts {
        operation_id: info.operation_id,
        operation_kind,
        status,
        started_at: info.start_time.and_then(epoch),
        ended_at: info.end_time.and_then(epoch),
        duration: info.duration,
        estimate: Measure {
            calls: prediction.estimated_calls,
            duration: prediction.estimated_duration,
        },
        actual: Measure {
            calls: prediction.actual_calls,
            duration: prediction.actual_duration,
        },
        calls: parsed.api_call_details,
        total_data_count: info.total_data_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimate::Severity;
    use serde_json::json;

    fn refresh_estimate_body() -> Value {
        json!({
            "success": true,
            "api_calls": 6,
            "details": {
                "operation": "refresh",
                "apt_name": "Raemian",
                "region_code": "11680",
                "months": 6,
                "total_calls": 6,
                "estimated_time": {"seconds": 3.0, "display": "3s"},
                "cost_info": {"is_free": true, "daily_limit": 10000, "usage_percentage": 0.06}
            }
        })
    }

    fn tracking_json(estimated: u32, actual: u32) -> Value {
        let calls: Vec<Value> = (0..actual)
            .map(|i| {
                let timestamp = 1714550000.0 + f64::from(i);
                json!({
                    "timestamp": timestamp,
                    "api_type": "sale",
                    "region_code": "11680",
                    "deal_ymd": format!("2024{:02}", i % 12 + 1),
                    "success": true,
                    "response_time": 0.4,
                    "data_count": 10
                })
            })
            .collect();
        let difference = i64::from(actual) - i64::from(estimated);
        json!({
            "operation_info": {
                "operation_id": "search_1714550000_7",
                "operation_type": "search",
                "status": "completed",
                "duration": 5.5,
                "total_data_count": actual * 10
            },
            "prediction_vs_actual": {
                "estimated_calls": estimated,
                "actual_calls": actual,
                "call_difference": difference,
                "call_accuracy": 80.0,
                "estimated_duration": 5.0,
                "actual_duration": 5.5,
                "time_difference": 0.5,
                "time_accuracy": 90.0
            },
            "api_call_details": calls
        })
    }

    #[test]
    fn estimate_decodes_refresh_details() {
        let est = decode_estimate("refresh/estimate", OperationKind::Refresh, refresh_estimate_body())
            .unwrap();
        assert_eq!(est.predicted_call_count, 6);
        assert_eq!(est.predicted_duration.display, "3s");
        assert_eq!(est.quota.daily_limit, 10000);
        assert_eq!(est.quota.used_today, 6);
        assert_eq!(est.kind(), OperationKind::Refresh);
    }

    #[test]
    fn estimate_tag_mismatch_is_malformed() {
        let err = decode_estimate("search/estimate", OperationKind::Search, refresh_estimate_body())
            .unwrap_err();
        assert!(matches!(err, GateError::MalformedResponse { .. }));
    }

    #[test]
    fn search_details_get_their_tag_filled_in() {
        let body = json!({
            "success": true,
            "api_calls": 200,
            "details": {
                "search_type": "sale",
                "api_type": "sale",
                "months": 100,
                "force_refresh": false,
                "estimated_time": {"seconds": 100.0},
                "cost_info": {"daily_limit": 1000, "used_today": 950}
            }
        });
        let est = decode_estimate("search/estimate", OperationKind::Search, body).unwrap();
        assert_eq!(est.predicted_duration.display, "1.7m");
        assert!((est.quota.usage_percentage() - 95.0).abs() < 1e-9);
        assert_eq!(est.quota.severity(), Severity::Critical);
        assert_eq!(est.kind(), OperationKind::Search);
    }

    #[test]
    fn unsuccessful_estimate_is_a_rejection() {
        let body = json!({"success": false, "message": "region not found"});
        let err = decode_estimate("step1/estimate", OperationKind::Step1Search, body).unwrap_err();
        match err {
            GateError::ServerRejection { message, raw } => {
                assert_eq!(message, "region not found");
                assert_eq!(raw["success"], false);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn probe_outcomes_are_exclusive() {
        let ready = decode_probe("search", json!({"success": true, "data": [], "total_count": 3}));
        assert!(matches!(ready, ProbeOutcome::Ready(_)));

        let cached = decode_probe(
            "search",
            json!({
                "success": false,
                "has_cache": true,
                "cache_info": {
                    "region_name": "Seoul-Gangnam",
                    "total_count": 1200,
                    "created_at": "2024-05-01 09:30:00",
                    "data_age_hours": 5
                }
            }),
        );
        match cached {
            ProbeOutcome::CacheAvailable(info) => {
                assert_eq!(info.region_label, "Seoul-Gangnam");
                assert_eq!(info.record_count, 1200);
            }
            other => panic!("unexpected outcome: {}", other.tag()),
        }

        let confirm = decode_probe(
            "search",
            json!({
                "success": false,
                "requires_confirmation": true,
                "api_calls": 12,
                "details": {
                    "months": 6,
                    "estimated_time": {"seconds": 6.0, "display": "6s"},
                    "cost_info": {"daily_limit": 10000, "usage_percentage": 0.12}
                }
            }),
        );
        assert!(matches!(confirm, ProbeOutcome::ConfirmationRequired(_)));

        let failed = decode_probe("search", json!({"success": false, "message": "boom"}));
        assert!(matches!(
            failed,
            ProbeOutcome::Failed(GateError::ServerRejection { .. })
        ));
    }

    #[test]
    fn cache_flag_without_info_fails() {
        let out = decode_probe("search", json!({"success": false, "has_cache": true}));
        assert!(matches!(
            out,
            ProbeOutcome::Failed(GateError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn result_lifts_tracking_record() {
        let body = json!({"success": true, "api_tracking_result": tracking_json(10, 12)});
        let result = decode_result("search", OperationKind::Search, body).unwrap();
        let record = result.tracking_record.as_ref().unwrap();
        assert_eq!(record.operation_id(), "search_1714550000_7");
        assert_eq!(record.calls().len(), 12);
        assert_eq!(record.calls()[0].period, "202401");
        assert_eq!(record.call_comparison().accuracy, 80.0);
        assert_eq!(record.total_data_count(), 120);
    }

    #[test]
    fn tracking_log_length_is_checked() {
        let mut raw = tracking_json(10, 12);
        raw["prediction_vs_actual"]["actual_calls"] = json!(13);
        let body = json!({"success": true, "api_tracking_result": raw});
        let err = decode_result("search", OperationKind::Search, body).unwrap_err();
        assert!(matches!(err, GateError::InvalidTrackingRecord(_)));
    }

    #[test]
    fn legacy_step1_operation_type_decodes() {
        let mut raw = tracking_json(3, 3);
        raw["operation_info"]["operation_type"] = json!("step1");
        raw["operation_info"]["start_time"] = json!(1714550000.25);
        raw["operation_info"]["end_time"] = json!(1714550005.75);
        let record = decode_tracking("step1", OperationKind::Search, &raw).unwrap();
        assert_eq!(record.operation_kind(), OperationKind::Step1Search);
        let start = record.started_at().unwrap();
        let end = record.ended_at().unwrap();
        assert_eq!((end - start).num_milliseconds(), 5500);
    }
}
