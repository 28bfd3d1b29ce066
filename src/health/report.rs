//! Health report record.

use serde::Serialize;

use super::process::{CpuUsage, HeapSpaceStatistics, HeapStatistics, MemoryUsage};

/// One health snapshot, serialized with camelCase keys.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub pid: u32,
    pub cpu_usage: CpuUsage,
    /// CPU time since the previous report; raw usage on the first one.
    pub cpu_diff: CpuUsage,
    pub memory: MemoryUsage,
    pub heap_statistics: HeapStatistics,
    pub heap_space_statistics: Vec<HeapSpaceStatistics>,
    pub uptime: f64,
    pub listening: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connections: Option<u64>,
    pub pending_responses: usize,
    pub database_state: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthReport {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!(r#"{{"error":"{e}"}}"#))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(connections: Option<u64>, error: Option<String>) -> HealthReport {
        HealthReport {
            pid: 7,
            cpu_usage: CpuUsage { user: 10, system: 2 },
            cpu_diff: CpuUsage { user: 10, system: 2 },
            memory: MemoryUsage::default(),
            heap_statistics: HeapStatistics::default(),
            heap_space_statistics: Vec::new(),
            uptime: 1.5,
            listening: true,
            connections,
            pending_responses: 3,
            database_state: 1,
            error,
        }
    }

    #[test]
    fn serializes_camel_case_with_connections() {
        let value = serde_json::to_value(report(Some(4), None)).unwrap();
        assert_eq!(value["connections"], 4);
        assert_eq!(value["pendingResponses"], 3);
        assert_eq!(value["databaseState"], 1);
        assert_eq!(value["cpuDiff"]["user"], 10);
        assert!(value.get("heapSpaceStatistics").is_some());
        assert!(value.get("error").is_none());
    }

    #[test]
    fn failure_report_omits_connections() {
        let value = serde_json::to_value(report(None, Some("refused".into()))).unwrap();
        assert!(value.get("connections").is_none());
        assert_eq!(value["error"], "refused");
    }
}
