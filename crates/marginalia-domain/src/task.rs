//! Task module - snapshots of fetch and analysis work
//!
//! A snapshot is the complete state of a task at one instant. Workers never
//! patch a snapshot in place; every transition replaces it.

use crate::analysis::PartialResults;
use crate::book::BookId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Worker is running
    Processing,
    /// Worker finished and its result is cached
    Complete,
    /// Worker stopped with an error message
    Error,
}

impl TaskStatus {
    /// Wire name of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Processing => "processing",
            TaskStatus::Complete => "complete",
            TaskStatus::Error => "error",
        }
    }

    /// Whether no further transitions follow
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::Processing)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durations recorded when a fetch completes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FetchTimings {
    /// Seconds spent downloading the text
    pub fetch_duration: f64,
    /// Seconds from worker start to completion
    pub total_duration: f64,
    /// Cleaned text length, in characters
    pub content_size: usize,
}

/// Full state of a fetch or analysis task at one instant
///
/// Error snapshots carry only `status` and `message`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    /// Lifecycle state
    pub status: TaskStatus,

    /// Percentage, 0-100
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,

    /// Human-readable description of the current step
    pub message: String,

    /// Stage tag (e.g. "metadata_fetch")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,

    /// Analysis results accumulated so far
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial_results: Option<PartialResults>,

    /// Fetch durations, present on the completed fetch snapshot
    #[serde(flatten)]
    pub timings: Option<FetchTimings>,
}

impl TaskSnapshot {
    /// A running task at the given stage
    pub fn processing(progress: u8, stage: &str, message: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Processing,
            progress: Some(progress),
            message: message.into(),
            stage: Some(stage.to_string()),
            partial_results: None,
            timings: None,
        }
    }

    /// A finished task (progress 100, stage "complete")
    pub fn complete(message: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Complete,
            progress: Some(100),
            message: message.into(),
            stage: Some("complete".to_string()),
            partial_results: None,
            timings: None,
        }
    }

    /// A failed task, carrying only the message
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Error,
            progress: None,
            message: message.into(),
            stage: None,
            partial_results: None,
            timings: None,
        }
    }

    /// Attach accumulated analysis results
    pub fn with_partial_results(mut self, partial: PartialResults) -> Self {
        self.partial_results = Some(partial);
        self
    }

    /// Attach fetch durations
    pub fn with_timings(mut self, timings: FetchTimings) -> Self {
        self.timings = Some(timings);
        self
    }

    /// Whether the worker is still running
    pub fn is_processing(&self) -> bool {
        self.status == TaskStatus::Processing
    }

    /// The `(progress, stage)` pair used to detect distinct observations
    pub fn observation(&self) -> (Option<u8>, Option<&str>) {
        (self.progress, self.stage.as_deref())
    }
}

/// Identifies one background worker
///
/// Only one worker may run per key at a time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskKey {
    /// Book fetch worker
    Fetch(BookId),
    /// Book analysis worker
    Analysis(BookId),
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKey::Fetch(id) => write!(f, "book_fetch_{}", id),
            TaskKey::Analysis(id) => write!(f, "analysis_{}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_snapshot_carries_only_status_and_message() {
        let json = serde_json::to_value(TaskSnapshot::failed("boom")).unwrap();
        assert_eq!(json, serde_json::json!({"status": "error", "message": "boom"}));
    }

    #[test]
    fn test_processing_snapshot_shape() {
        let snapshot = TaskSnapshot::processing(10, "metadata_fetch", "Fetching book metadata...");
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["status"], "processing");
        assert_eq!(json["progress"], 10);
        assert_eq!(json["stage"], "metadata_fetch");
        assert!(json.get("partial_results").is_none());
        assert!(snapshot.is_processing());
    }

    #[test]
    fn test_timings_are_flattened_into_snapshot() {
        let snapshot = TaskSnapshot::complete("done").with_timings(FetchTimings {
            fetch_duration: 1.5,
            total_duration: 2.0,
            content_size: 1200,
        });
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["fetch_duration"], 1.5);
        assert_eq!(json["content_size"], 1200);
        assert_eq!(json["progress"], 100);
    }

    #[test]
    fn test_task_key_display() {
        let id = BookId::parse("1787").unwrap();
        assert_eq!(TaskKey::Fetch(id.clone()).to_string(), "book_fetch_1787");
        assert_eq!(TaskKey::Analysis(id).to_string(), "analysis_1787");
    }

    #[test]
    fn test_status_terminality() {
        assert!(!TaskStatus::Processing.is_terminal());
        assert!(TaskStatus::Complete.is_terminal());
        assert!(TaskStatus::Error.is_terminal());
    }
}
