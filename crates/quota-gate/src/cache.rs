//! Cache probe outcomes.
//!
//! A probe sends the unconfirmed search request. The server either answers
//! from cache, describes a cached alternative, or demands confirmation for a
//! costed call. [`ProbeOutcome`] is the flow's central branch point.

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::GateError;
use crate::estimate::Estimate;
use crate::result::OperationResult;

/// Metadata for an existing cached result set.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CacheInfo {
    #[serde(rename = "region_name", alias = "region_label")]
    pub region_label: String,
    #[serde(rename = "total_count", alias = "record_count")]
    pub record_count: u64,
    pub created_at: String,
    #[serde(rename = "data_age_hours", alias = "age_hours")]
    pub age_hours: f64,
}

impl CacheInfo {
    /// Parse `created_at`, accepting RFC 3339 and the server's plain
    /// `YYYY-MM-DD HH:MM:SS` form.
    pub fn created(&self) -> Option<NaiveDateTime> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(&self.created_at) {
            return Some(dt.naive_utc());
        }
        ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(&self.created_at, fmt).ok())
    }
}

/// Result of probing the search endpoint. Exactly one per probe.
#[derive(Debug)]
pub enum ProbeOutcome {
    /// The server returned the full result immediately.
    Ready(OperationResult),
    /// A cached alternative exists; the caller decides use vs. refresh.
    CacheAvailable(CacheInfo),
    /// No usable cache; a costed call is mandatory.
    ConfirmationRequired(Estimate),
    Failed(GateError),
}

impl ProbeOutcome {
    pub fn tag(&self) -> &'static str {
        match self {
            ProbeOutcome::Ready(_) => "ready",
            ProbeOutcome::CacheAvailable(_) => "cache_available",
            ProbeOutcome::ConfirmationRequired(_) => "confirmation_required",
            ProbeOutcome::Failed(_) => "failed",
        }
    }
}
