//! Shared fixtures for unit tests.

use chrono::DateTime;

use crate::cache::CacheInfo;
use crate::estimate::{Estimate, EstimatedTime, OperationDetail, Quota};
use crate::request::OperationKind;
use crate::tracking::{CallRecord, Measure, OperationStatus, TrackingParts, TrackingRecord};

/// A 200-call search estimate against the given quota.
pub(crate) fn estimate(used_today: u64, daily_limit: u64) -> Estimate {
    Estimate {
        predicted_call_count: 200,
        predicted_duration: EstimatedTime::from_seconds(100.0),
        quota: Quota {
            used_today,
            daily_limit,
        },
        operation_detail: OperationDetail::Search {
            api_type: Some("sale".into()),
            months: Some(100),
            force_refresh: false,
        },
    }
}

pub(crate) fn cache_info() -> CacheInfo {
    CacheInfo {
        region_label: "Seoul-Gangnam".into(),
        record_count: 1200,
        created_at: "2024-05-01 09:30:00".into(),
        age_hours: 5.0,
    }
}

/// A completed search record with `actual_calls` successful calls.
pub(crate) fn tracking_record(estimated_calls: u32, actual_calls: u32) -> TrackingRecord {
    let calls = (0..actual_calls)
        .map(|i| CallRecord {
            api_type: if i % 2 == 0 { "sale" } else { "rent" }.into(),
            region_code: "11680".into(),
            period: format!("2024{:02}", i % 12 + 1),
            response_time: 0.5,
            record_count: 10,
            success: true,
        })
        .collect();
    TrackingRecord::new(TrackingParts {
        operation_id: "search_1714550000_42".into(),
        operation_kind: OperationKind::Search,
        status: OperationStatus::Completed,
        started_at: DateTime::from_timestamp(1_714_550_000, 0),
        ended_at: DateTime::from_timestamp(1_714_550_006, 0),
        duration: 6.0,
        estimate: Measure {
            calls: estimated_calls,
            duration: 5.0,
        },
        actual: Measure {
            calls: actual_calls,
            duration: 6.0,
        },
        calls,
        total_data_count: None,
    })
    .expect("fixture record is valid")
}

/// A refresh record carrying wall-clock measurements with full f64
/// precision, as the server reports them.
pub(crate) fn measured_tracking_record() -> TrackingRecord {
    let response_times = [0.4172859191894531, 1.3080739974975586, 0.29861369731570406];
    let calls = response_times
        .iter()
        .map(|&response_time| CallRecord {
            api_type: "sale".into(),
            region_code: "11680".into(),
            period: "202405".into(),
            response_time,
            record_count: 7,
            success: true,
        })
        .collect();
    TrackingRecord::new(TrackingParts {
        operation_id: "refresh_1714550000_7".into(),
        operation_kind: OperationKind::Refresh,
        status: OperationStatus::Completed,
        started_at: DateTime::from_timestamp_millis(1_714_550_000_123),
        ended_at: DateTime::from_timestamp_millis(1_714_550_021_972),
        duration: 21.849505305053462,
        estimate: Measure {
            calls: 3,
            duration: 29.861369731570406,
        },
        actual: Measure {
            calls: 3,
            duration: 26.933740237363814,
        },
        calls,
        total_data_count: None,
    })
    .expect("fixture record is valid")
}
