//! Frontend-neutral view models for the two gate prompts.
//!
//! Frontends render these however they like; [`render`](GatePrompt::render)
//! gives a plain-text version used by the terminal gate and the web
//! snapshot.

use serde::Serialize;

use super::GateAnswer;
use crate::cache::CacheInfo;
use crate::estimate::{Estimate, Severity};
use crate::request::OperationKind;

/// Width of the text usage bar, in cells.
const USAGE_BAR_WIDTH: usize = 20;

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct DetailRow {
    pub label: &'static str,
    pub value: String,
}

/// Everything the confirmation prompt shows.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ConfirmationPrompt {
    pub kind: OperationKind,
    pub predicted_call_count: u32,
    pub duration_display: String,
    pub usage_percentage: f64,
    pub severity: Severity,
    pub used_today: u64,
    pub daily_limit: u64,
    pub remaining: u64,
    pub details: Vec<DetailRow>,
}

impl ConfirmationPrompt {
    pub fn from_estimate(estimate: &Estimate) -> Self {
        Self {
            kind: estimate.kind(),
            predicted_call_count: estimate.predicted_call_count,
            duration_display: estimate.predicted_duration.display.clone(),
            usage_percentage: estimate.quota.usage_percentage(),
            severity: estimate.quota.severity(),
            used_today: estimate.quota.used_today,
            daily_limit: estimate.quota.daily_limit,
            remaining: estimate.quota.remaining(),
            details: estimate
                .operation_detail
                .rows()
                .into_iter()
                .map(|(label, value)| DetailRow { label, value })
                .collect(),
        }
    }

    /// `[#########-----------]` filled in proportion to usage.
    pub fn usage_bar(&self) -> String {
        let filled = ((self.usage_percentage / 100.0) * USAGE_BAR_WIDTH as f64).round() as usize;
        let filled = filled.min(USAGE_BAR_WIDTH);
        format!(
            "[{}{}]",
            "#".repeat(filled),
            "-".repeat(USAGE_BAR_WIDTH - filled)
        )
    }

    pub fn render(&self) -> String {
        let mut out = format!(
            "{} will call the external API.\n\
             Estimated API calls: {}\n\
             Estimated time:      {}\n",
            self.kind.display_name(),
            group_thousands(self.predicted_call_count as u64),
            self.duration_display,
        );
        if !self.details.is_empty() {
            out.push_str("Details:\n");
            for row in &self.details {
                out.push_str(&format!("  {}: {}\n", row.label, row.value));
            }
        }
        out.push_str(&format!(
            "Quota usage: {} {:.1}% ({})\n\
             Daily limit: {} calls, {} used, {} planned\n",
            self.usage_bar(),
            self.usage_percentage,
            self.severity.label(),
            group_thousands(self.daily_limit),
            group_thousands(self.used_today),
            group_thousands(self.predicted_call_count as u64),
        ));
        out
    }
}

/// One side of the cache choice, with its trade-offs.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct CacheOption {
    pub answer: GateAnswer,
    pub title: &'static str,
    pub points: [&'static str; 3],
}

const CACHE_OPTIONS: [CacheOption; 2] = [
    CacheOption {
        answer: GateAnswer::UseCache,
        title: "Use cache",
        points: ["instant results", "no API calls", "fast loading"],
    },
    CacheOption {
        answer: GateAnswer::Refresh,
        title: "Refresh",
        points: ["latest data", "accurate figures", "API time required"],
    },
];

/// Everything the cache-choice prompt shows.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct CachePrompt {
    pub region_label: String,
    pub record_count: u64,
    pub created_at: String,
    pub age_hours: f64,
    pub options: Vec<CacheOption>,
}

impl CachePrompt {
    pub fn from_info(info: &CacheInfo) -> Self {
        let created_at = info
            .created()
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| info.created_at.clone());
        Self {
            region_label: info.region_label.clone(),
            record_count: info.record_count,
            created_at,
            age_hours: info.age_hours,
            options: CACHE_OPTIONS.to_vec(),
        }
    }

    pub fn render(&self) -> String {
        let mut out = format!(
            "Cached data found for {}.\n\
             Records: {}   Created: {}   Age: {} hours\n",
            self.region_label,
            group_thousands(self.record_count),
            self.created_at,
            self.age_hours,
        );
        for option in &self.options {
            out.push_str(&format!(
                "  {:<10} {}\n",
                option.title,
                option.points.join(", ")
            ));
        }
        out
    }
}

/// The prompt currently on display.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatePrompt {
    Confirm(ConfirmationPrompt),
    CacheChoice(CachePrompt),
}

impl GatePrompt {
    /// Answers this prompt accepts, in display order.
    pub fn choices(&self) -> &'static [GateAnswer] {
        match self {
            GatePrompt::Confirm(_) => &[GateAnswer::Proceed, GateAnswer::Cancel],
            GatePrompt::CacheChoice(_) => {
                &[GateAnswer::UseCache, GateAnswer::Refresh, GateAnswer::Cancel]
            }
        }
    }

    pub fn accepts(&self, answer: GateAnswer) -> bool {
        self.choices().contains(&answer)
    }

    pub fn render(&self) -> String {
        match self {
            GatePrompt::Confirm(p) => p.render(),
            GatePrompt::CacheChoice(p) => p.render(),
        }
    }
}

/// `1234567` → `"1,234,567"`.
pub fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
