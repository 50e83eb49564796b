//! Terminal artifact of a successful flow.

use serde::Serialize;

use crate::tracking::TrackingRecord;

/// Result of a completed operation. The payload is opaque to the workflow
/// and handed to the caller untouched.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct OperationResult {
    pub success: bool,
    pub payload: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_record: Option<TrackingRecord>,
}

impl OperationResult {
    pub fn new(payload: serde_json::Value) -> Self {
        Self {
            success: true,
            payload,
            tracking_record: None,
        }
    }

    pub fn with_tracking(mut self, record: TrackingRecord) -> Self {
        self.tracking_record = Some(record);
        self
    }

    /// Whether the server reports having answered from its cache.
    pub fn from_cache(&self) -> bool {
        self.payload
            .get("from_cache")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// Server-reported record count, when present.
    pub fn total_count(&self) -> Option<u64> {
        self.payload.get("total_count").and_then(|v| v.as_u64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_accessors() {
        let result = OperationResult::new(serde_json::json!({
            "success": true,
            "from_cache": true,
            "total_count": 1200
        }));
        assert!(result.success);
        assert!(result.from_cache());
        assert_eq!(result.total_count(), Some(1200));
        assert!(result.tracking_record.is_none());
    }

    #[test]
    fn missing_fields_default() {
        let result = OperationResult::new(serde_json::json!({"success": true}));
        assert!(!result.from_cache());
        assert_eq!(result.total_count(), None);
    }
}
