//! Server-recorded ground truth for a confirmed operation, and the accuracy
//! figures derived from it.
//!
//! A [`TrackingRecord`] is immutable after construction and always satisfies
//! `calls().len() == actual().calls`. Everything else in this module
//! ([`AccuracyAssessment`], [`PerformanceMetrics`], [`Recommendation`]) is
//! computed on demand and never stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::GateError;
use crate::request::OperationKind;

/// Calls and duration, either predicted or observed.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Measure {
    pub calls: u32,
    /// Seconds.
    pub duration: f64,
}

/// One remote API call made while executing the operation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CallRecord {
    pub api_type: String,
    pub region_code: String,
    /// Year-month the call covered (`YYYYMM`).
    #[serde(alias = "deal_ymd")]
    pub period: String,
    /// Seconds.
    pub response_time: f64,
    #[serde(alias = "data_count")]
    pub record_count: u64,
    pub success: bool,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    #[default]
    Completed,
    Failed,
}

/// What a confirmed operation actually did, next to what was predicted.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TrackingRecord {
    operation_id: String,
    operation_kind: OperationKind,
    #[serde(default)]
    status: OperationStatus,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    /// Seconds.
    duration: f64,
    estimate: Measure,
    actual: Measure,
    calls: Vec<CallRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    total_data_count: Option<u64>,
}

/// Builder input for [`TrackingRecord::new`].
#[derive(Clone, Debug)]
pub struct TrackingParts {
    pub operation_id: String,
    pub operation_kind: OperationKind,
    pub status: OperationStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration: f64,
    pub estimate: Measure,
    pub actual: Measure,
    pub calls: Vec<CallRecord>,
    pub total_data_count: Option<u64>,
}

impl TrackingRecord {
    /// Build a record, enforcing its invariants.
    pub fn new(parts: TrackingParts) -> Result<Self, GateError> {
        let record = Self {
            operation_id: parts.operation_id,
            operation_kind: parts.operation_kind,
            status: parts.status,
            started_at: parts.started_at,
            ended_at: parts.ended_at,
            duration: parts.duration,
            estimate: parts.estimate,
            actual: parts.actual,
            calls: parts.calls,
            total_data_count: parts.total_data_count,
        };
        record.validate()?;
        Ok(record)
    }

    /// Parse an exported record, enforcing its invariants.
    pub fn from_json(json: &str) -> Result<Self, GateError> {
        let record: Self = serde_json::from_str(json)?;
        record.validate()?;
        Ok(record)
    }

    fn validate(&self) -> Result<(), GateError> {
        if self.operation_id.is_empty() {
            return Err(GateError::InvalidTrackingRecord(
                "operation_id is empty".into(),
            ));
        }
        if self.calls.len() != self.actual.calls as usize {
            return Err(GateError::InvalidTrackingRecord(format!(
                "call log has {} entries but actual.calls is {}",
                self.calls.len(),
                self.actual.calls
            )));
        }
        if let (Some(start), Some(end)) = (self.started_at, self.ended_at)
            && end < start
        {
            return Err(GateError::InvalidTrackingRecord(
                "ended_at precedes started_at".into(),
            ));
        }
        Ok(())
    }

    pub fn operation_id(&self) -> &str {
        &self.operation_id
    }

    pub fn operation_kind(&self) -> OperationKind {
        self.operation_kind
    }

    pub fn status(&self) -> OperationStatus {
        self.status
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn estimate(&self) -> Measure {
        self.estimate
    }

    pub fn actual(&self) -> Measure {
        self.actual
    }

    pub fn calls(&self) -> &[CallRecord] {
        &self.calls
    }

    /// Server-reported total, falling back to the sum over the call log.
    pub fn total_data_count(&self) -> u64 {
        self.total_data_count
            .unwrap_or_else(|| self.calls.iter().map(|c| c.record_count).sum())
    }

    pub fn call_comparison(&self) -> MetricComparison {
        MetricComparison::new(self.estimate.calls as f64, self.actual.calls as f64)
    }

    pub fn time_comparison(&self) -> MetricComparison {
        MetricComparison::new(self.estimate.duration, self.actual.duration)
    }

    pub fn assessment(&self) -> AccuracyAssessment {
        AccuracyAssessment::new(
            self.call_comparison().accuracy,
            self.time_comparison().accuracy,
        )
    }

    pub fn performance(&self) -> PerformanceMetrics {
        PerformanceMetrics::from_calls(&self.calls, self.actual.calls)
    }

    pub fn recommendations(&self) -> Vec<Recommendation> {
        Recommendation::for_record(self)
    }
}

// ── Accuracy ──────────────────────────────────────────────────────

/// `100 × (1 − |estimated − actual| / max(estimated, 1))`, clamped to
/// `[0, 100]` and rounded to one decimal.
pub fn accuracy(estimated: f64, actual: f64) -> f64 {
    let raw = 100.0 * (1.0 - (estimated - actual).abs() / estimated.max(1.0));
    round1(raw.clamp(0.0, 100.0))
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Four-tier accuracy grade, used both per metric and overall.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Grade {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl Grade {
    pub fn from_accuracy(accuracy: f64) -> Self {
        if accuracy >= 90.0 {
            Grade::Excellent
        } else if accuracy >= 70.0 {
            Grade::Good
        } else if accuracy >= 50.0 {
            Grade::Fair
        } else {
            Grade::Poor
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Grade::Excellent => "excellent",
            Grade::Good => "good",
            Grade::Fair => "fair",
            Grade::Poor => "poor",
        }
    }
}

/// One row of the estimate-vs-actual table.
#[derive(Serialize, Clone, Copy, Debug, PartialEq)]
pub struct MetricComparison {
    pub estimated: f64,
    pub actual: f64,
    /// `actual − estimated`.
    pub difference: f64,
    pub accuracy: f64,
    pub grade: Grade,
}

impl MetricComparison {
    pub fn new(estimated: f64, actual: f64) -> Self {
        let accuracy = accuracy(estimated, actual);
        Self {
            estimated,
            actual,
            difference: actual - estimated,
            accuracy,
            grade: Grade::from_accuracy(accuracy),
        }
    }

    /// A non-positive difference (at or under the estimate) is favorable.
    pub fn is_favorable(&self) -> bool {
        self.difference <= 0.0
    }
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq)]
pub struct AccuracyAssessment {
    pub call_accuracy: f64,
    pub time_accuracy: f64,
    pub overall_accuracy: f64,
    pub grade: Grade,
}

impl AccuracyAssessment {
    pub fn new(call_accuracy: f64, time_accuracy: f64) -> Self {
        let overall_accuracy = (call_accuracy + time_accuracy) / 2.0;
        Self {
            call_accuracy,
            time_accuracy,
            overall_accuracy,
            grade: Grade::from_accuracy(overall_accuracy),
        }
    }
}

// ── Performance ───────────────────────────────────────────────────

/// Health tier for the per-call success rate.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SuccessTier {
    Healthy,
    Degraded,
    Failing,
}

impl SuccessTier {
    pub fn from_rate(rate: f64) -> Self {
        if rate >= 95.0 {
            SuccessTier::Healthy
        } else if rate >= 80.0 {
            SuccessTier::Degraded
        } else {
            SuccessTier::Failing
        }
    }
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq)]
pub struct PerformanceMetrics {
    pub successful_calls: u32,
    pub failed_calls: u32,
    /// Percent of `actual.calls`; 0 when no calls were made.
    pub success_rate: f64,
    /// Mean seconds per call; 0 when no calls were made.
    pub avg_response_time: f64,
    pub total_data_received: u64,
    pub success_tier: SuccessTier,
}

impl PerformanceMetrics {
    fn from_calls(calls: &[CallRecord], actual_calls: u32) -> Self {
        let successful_calls = calls.iter().filter(|c| c.success).count() as u32;
        let failed_calls = calls.len() as u32 - successful_calls;
        let success_rate = if actual_calls > 0 {
            successful_calls as f64 / actual_calls as f64 * 100.0
        } else {
            0.0
        };
        let avg_response_time = if calls.is_empty() {
            0.0
        } else {
            calls.iter().map(|c| c.response_time).sum::<f64>() / calls.len() as f64
        };
        Self {
            successful_calls,
            failed_calls,
            success_rate,
            avg_response_time,
            total_data_received: calls.iter().map(|c| c.record_count).sum(),
            success_tier: SuccessTier::from_rate(success_rate),
        }
    }
}

// ── Recommendations ───────────────────────────────────────────────

/// Accuracy below this triggers a calls/time recommendation.
const RECOMMEND_ACCURACY_BELOW: f64 = 80.0;
/// Success rate below this triggers a failure recommendation.
const RECOMMEND_SUCCESS_BELOW: f64 = 95.0;
/// Average response time (seconds) above this triggers a latency recommendation.
const RECOMMEND_LATENCY_ABOVE: f64 = 2.0;

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    MoreCallsThanExpected,
    FewerCallsThanExpected,
    SlowerThanExpected,
    FasterThanExpected,
    CallFailures,
    SlowResponses,
    AllHealthy,
}

impl Recommendation {
    fn for_record(record: &TrackingRecord) -> Vec<Self> {
        let mut out = Vec::new();
        let calls = record.call_comparison();
        let time = record.time_comparison();
        let perf = record.performance();

        if calls.accuracy < RECOMMEND_ACCURACY_BELOW {
            out.push(if calls.difference > 0.0 {
                Recommendation::MoreCallsThanExpected
            } else {
                Recommendation::FewerCallsThanExpected
            });
        }
        if time.accuracy < RECOMMEND_ACCURACY_BELOW {
            out.push(if time.difference > 0.0 {
                Recommendation::SlowerThanExpected
            } else {
                Recommendation::FasterThanExpected
            });
        }
        if perf.success_rate < RECOMMEND_SUCCESS_BELOW {
            out.push(Recommendation::CallFailures);
        }
        if !record.calls.is_empty() && perf.avg_response_time > RECOMMEND_LATENCY_ABOVE {
            out.push(Recommendation::SlowResponses);
        }
        if out.is_empty() {
            out.push(Recommendation::AllHealthy);
        }
        out
    }

    pub fn message(self) -> &'static str {
        match self {
            Recommendation::MoreCallsThanExpected => {
                "More API calls than expected; lean on cached results more."
            }
            Recommendation::FewerCallsThanExpected => {
                "Fewer API calls than expected; the call estimator needs tuning."
            }
            Recommendation::SlowerThanExpected => {
                "Took longer than expected; check the network or raise concurrency."
            }
            Recommendation::FasterThanExpected => {
                "Finished faster than expected; the time estimator can be tightened."
            }
            Recommendation::CallFailures => "Some API calls failed; review the retry policy.",
            Recommendation::SlowResponses => {
                "API responses are slow; widen the request interval or check server health."
            }
            Recommendation::AllHealthy => "All metrics look healthy; keep the current settings.",
        }
    }
}
