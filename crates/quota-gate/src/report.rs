//! Reconciliation of tracking records against their estimates.
//!
//! [`Reconciler`] is the report sink the orchestrator hands each tracking
//! record to. It keeps the most recent record for export and produces a
//! [`ReconciliationReport`], a pure view over the record that frontends
//! render.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::Serialize;
use tracing::info;

use crate::error::GateError;
use crate::estimate::format_duration;
use crate::gate::prompt::group_thousands;
use crate::request::OperationKind;
use crate::tracking::{
    AccuracyAssessment, CallRecord, MetricComparison, OperationStatus, PerformanceMetrics,
    Recommendation, TrackingRecord,
};

/// Estimate-vs-actual comparison for one tracking record.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ReconciliationReport {
    pub operation_id: String,
    pub operation_kind: OperationKind,
    pub status: OperationStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub total_duration: f64,
    pub total_data_count: u64,
    pub calls: MetricComparison,
    pub time: MetricComparison,
    pub assessment: AccuracyAssessment,
    pub performance: PerformanceMetrics,
    pub recommendations: Vec<Recommendation>,
    pub call_log: Vec<CallRecord>,
}

impl ReconciliationReport {
    pub fn from_record(record: &TrackingRecord) -> Self {
        Self {
            operation_id: record.operation_id().to_string(),
            operation_kind: record.operation_kind(),
            status: record.status(),
            started_at: record.started_at(),
            ended_at: record.ended_at(),
            total_duration: record.duration(),
            total_data_count: record.total_data_count(),
            calls: record.call_comparison(),
            time: record.time_comparison(),
            assessment: record.assessment(),
            performance: record.performance(),
            recommendations: record.recommendations(),
            call_log: record.calls().to_vec(),
        }
    }

    /// Multi-line completion summary.
    pub fn render(&self) -> String {
        let status = match self.status {
            OperationStatus::Completed => "completed",
            OperationStatus::Failed => "failed",
        };
        let mut out = format!(
            "{} {status} ({})\n",
            self.operation_kind.display_name(),
            self.operation_id
        );

        out.push_str("Prediction vs actual:\n");
        out.push_str(&format!(
            "  API calls: estimated {}, actual {} ({:+}, {}) accuracy {:.1}% [{}]\n",
            self.calls.estimated,
            self.calls.actual,
            self.calls.difference,
            favorability(&self.calls),
            self.calls.accuracy,
            self.calls.grade.label(),
        ));
        out.push_str(&format!(
            "  Duration:  estimated {}, actual {} ({:+.1}s, {}) accuracy {:.1}% [{}]\n",
            format_duration(self.time.estimated),
            format_duration(self.time.actual),
            self.time.difference,
            favorability(&self.time),
            self.time.accuracy,
            self.time.grade.label(),
        ));

        let perf = &self.performance;
        out.push_str("Performance:\n");
        out.push_str(&format!(
            "  Success rate: {:.1}% ({} ok, {} failed)\n",
            perf.success_rate, perf.successful_calls, perf.failed_calls
        ));
        out.push_str(&format!(
            "  Avg response: {:.2}s   Records: {}   Total time: {}\n",
            perf.avg_response_time,
            group_thousands(self.total_data_count),
            format_duration(self.total_duration),
        ));

        out.push_str(&format!(
            "Overall accuracy: {:.1}% ({})\n",
            self.assessment.overall_accuracy,
            self.assessment.grade.label()
        ));

        out.push_str("Recommendations:\n");
        for rec in &self.recommendations {
            out.push_str(&format!("  - {}\n", rec.message()));
        }

        if !self.call_log.is_empty() {
            out.push_str("Calls:\n");
            for call in &self.call_log {
                out.push_str(&format!(
                    "  {} {:<5} {} {:>6.2}s {:>6} records {}\n",
                    call.period,
                    call.api_type,
                    call.region_code,
                    call.response_time,
                    call.record_count,
                    if call.success { "ok" } else { "FAILED" },
                ));
            }
        }
        out
    }
}

fn favorability(cmp: &MetricComparison) -> &'static str {
    if cmp.is_favorable() {
        "favorable"
    } else {
        "unfavorable"
    }
}

// ── Reconciler ────────────────────────────────────────────────────

/// Holds the latest tracking record and renders reports for it.
#[derive(Default)]
pub struct Reconciler {
    current: Mutex<Option<TrackingRecord>>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `record` the current record and build its report.
    pub fn report(&self, record: &TrackingRecord) -> ReconciliationReport {
        let report = ReconciliationReport::from_record(record);
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = Some(record.clone());
        report
    }

    pub fn current(&self) -> Option<TrackingRecord> {
        self.current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn current_report(&self) -> Option<ReconciliationReport> {
        self.current().as_ref().map(ReconciliationReport::from_record)
    }

    /// Write the current record to `dir` as
    /// `api_result_<operation_id>_<YYYY-MM-DD>.json`.
    pub fn export(&self, dir: &Path) -> Result<PathBuf, GateError> {
        let record = self.current().ok_or(GateError::EmptyExport)?;
        export_record(&record, dir, Local::now().date_naive())
    }
}

pub fn export_file_name(operation_id: &str, date: NaiveDate) -> String {
    let safe_id: String = operation_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();
    format!("api_result_{safe_id}_{}.json", date.format("%Y-%m-%d"))
}

/// Serialize `record` into `dir`, returning the written path.
pub fn export_record(
    record: &TrackingRecord,
    dir: &Path,
    date: NaiveDate,
) -> Result<PathBuf, GateError> {
    let path = dir.join(export_file_name(record.operation_id(), date));
    let json = serde_json::to_string_pretty(record)?;
    std::fs::write(&path, json)?;
    info!("exported tracking record to {}", path.display());
    Ok(path)
}
