//! Server-predicted cost of a not-yet-executed operation.

use serde::{Deserialize, Serialize};

use crate::request::OperationKind;

/// Usage below this percentage of the daily limit is [`Severity::Safe`].
pub const WARNING_THRESHOLD_PCT: f64 = 50.0;
/// Usage at or above this percentage of the daily limit is [`Severity::Critical`].
pub const CRITICAL_THRESHOLD_PCT: f64 = 80.0;

/// Predicted cost of an operation, shown at the confirmation gate.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Estimate {
    pub predicted_call_count: u32,
    pub predicted_duration: EstimatedTime,
    pub quota: Quota,
    pub operation_detail: OperationDetail,
}

impl Estimate {
    pub fn kind(&self) -> OperationKind {
        self.operation_detail.kind()
    }
}

/// Predicted wall-clock duration with a display string.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct EstimatedTime {
    pub seconds: f64,
    pub display: String,
}

impl EstimatedTime {
    pub fn from_seconds(seconds: f64) -> Self {
        Self {
            seconds,
            display: format_duration(seconds),
        }
    }
}

/// Compact duration label: seconds under a minute, minutes under an hour,
/// hours beyond that.
pub fn format_duration(seconds: f64) -> String {
    if seconds < 60.0 {
        format!("{seconds:.0}s")
    } else if seconds < 3600.0 {
        format!("{:.1}m", seconds / 60.0)
    } else {
        format!("{:.1}h", seconds / 3600.0)
    }
}

// ── Quota ─────────────────────────────────────────────────────────

/// Daily quota consumption at estimate time.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Quota {
    pub used_today: u64,
    pub daily_limit: u64,
}

impl Quota {
    /// Percentage of the daily limit already used, capped at 100.
    ///
    /// A zero limit counts as exhausted.
    pub fn usage_percentage(&self) -> f64 {
        if self.daily_limit == 0 {
            return 100.0;
        }
        (self.used_today as f64 / self.daily_limit as f64 * 100.0).min(100.0)
    }

    pub fn remaining(&self) -> u64 {
        self.daily_limit.saturating_sub(self.used_today)
    }

    pub fn severity(&self) -> Severity {
        Severity::from_percentage(self.usage_percentage())
    }
}

/// Three-tier quota pressure shown alongside the usage bar.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Safe,
    Warning,
    Critical,
}

impl Severity {
    pub fn from_percentage(pct: f64) -> Self {
        if pct < WARNING_THRESHOLD_PCT {
            Severity::Safe
        } else if pct < CRITICAL_THRESHOLD_PCT {
            Severity::Warning
        } else {
            Severity::Critical
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Severity::Safe => "safe",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

// ── Operation detail ──────────────────────────────────────────────

/// Kind-specific estimate details. One variant per operation kind, each
/// carrying only its own fields.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum OperationDetail {
    Search {
        #[serde(default)]
        api_type: Option<String>,
        #[serde(default)]
        months: Option<u32>,
        #[serde(default)]
        force_refresh: bool,
    },
    Step1Search {
        city: String,
        district: String,
        api_type: String,
        months: u32,
    },
    Refresh {
        #[serde(rename = "apt_name")]
        target_name: String,
        #[serde(default)]
        region_code: Option<String>,
        months: u32,
    },
}

impl OperationDetail {
    pub fn kind(&self) -> OperationKind {
        match self {
            OperationDetail::Search { .. } => OperationKind::Search,
            OperationDetail::Step1Search { .. } => OperationKind::Step1Search,
            OperationDetail::Refresh { .. } => OperationKind::Refresh,
        }
    }

    /// Label/value rows for the confirmation prompt's detail list.
    pub fn rows(&self) -> Vec<(&'static str, String)> {
        match self {
            OperationDetail::Refresh {
                target_name,
                months,
                ..
            } => vec![
                ("Target", target_name.clone()),
                ("Period", format!("{months} months")),
            ],
            OperationDetail::Step1Search {
                city,
                district,
                api_type,
                months,
            } => vec![
                ("Region", format!("{city} {district}")),
                ("Search type", api_type.clone()),
                ("Period", format!("{months} months")),
            ],
            OperationDetail::Search {
                api_type,
                months,
                force_refresh,
            } => {
                let mut rows = Vec::new();
                if let Some(t) = api_type {
                    rows.push(("Search type", t.clone()));
                }
                if let Some(m) = months {
                    rows.push(("Period", format!("{m} months")));
                }
                if *force_refresh {
                    rows.push(("Force refresh", "yes".to_string()));
                }
                rows
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_percentage_is_capped() {
        let q = Quota {
            used_today: 1500,
            daily_limit: 1000,
        };
        assert_eq!(q.usage_percentage(), 100.0);
        assert_eq!(q.remaining(), 0);
    }

    #[test]
    fn critical_when_quota_nearly_spent() {
        let q = Quota {
            used_today: 950,
            daily_limit: 1000,
        };
        assert!((q.usage_percentage() - 95.0).abs() < 1e-9);
        assert_eq!(q.severity(), Severity::Critical);
    }

    #[test]
    fn severity_tier_boundaries() {
        assert_eq!(Severity::from_percentage(0.0), Severity::Safe);
        assert_eq!(Severity::from_percentage(49.99), Severity::Safe);
        assert_eq!(Severity::from_percentage(50.0), Severity::Warning);
        assert_eq!(Severity::from_percentage(79.9), Severity::Warning);
        assert_eq!(Severity::from_percentage(80.0), Severity::Critical);
        assert_eq!(Severity::from_percentage(100.0), Severity::Critical);
    }

    #[test]
    fn every_usage_maps_to_exactly_one_tier() {
        for used in (0..=1200).step_by(7) {
            let q = Quota {
                used_today: used,
                daily_limit: 1000,
            };
            let pct = q.usage_percentage();
            assert!((0.0..=100.0).contains(&pct));
            let tier = q.severity();
            let expected = if pct < 50.0 {
                Severity::Safe
            } else if pct < 80.0 {
                Severity::Warning
            } else {
                Severity::Critical
            };
            assert_eq!(tier, expected, "used={used}");
        }
    }

    #[test]
    fn zero_limit_counts_as_exhausted() {
        let q = Quota {
            used_today: 0,
            daily_limit: 0,
        };
        assert_eq!(q.usage_percentage(), 100.0);
        assert_eq!(q.severity(), Severity::Critical);
    }

    #[test]
    fn duration_display_scales_units() {
        assert_eq!(format_duration(18.0), "18s");
        assert_eq!(format_duration(90.0), "1.5m");
        assert_eq!(format_duration(5400.0), "1.5h");
    }

    #[test]
    fn detail_tag_decodes_per_kind() {
        let json = serde_json::json!({
            "operation": "step1_search",
            "city": "Seoul",
            "district": "Gangnam-gu",
            "api_type": "sale",
            "months": 36
        });
        let detail: OperationDetail = serde_json::from_value(json).unwrap();
        assert_eq!(detail.kind(), OperationKind::Step1Search);
        let rows = detail.rows();
        assert_eq!(rows[0], ("Region", "Seoul Gangnam-gu".to_string()));
        assert_eq!(rows[2], ("Period", "36 months".to_string()));
    }

    #[test]
    fn refresh_detail_requires_target() {
        let json = serde_json::json!({"operation": "refresh", "months": 6});
        assert!(serde_json::from_value::<OperationDetail>(json).is_err());
    }

    #[test]
    fn search_rows_skip_absent_fields() {
        let detail = OperationDetail::Search {
            api_type: None,
            months: Some(6),
            force_refresh: true,
        };
        let labels: Vec<&str> = detail.rows().iter().map(|(l, _)| *l).collect();
        assert_eq!(labels, vec!["Period", "Force refresh"]);
    }
}
