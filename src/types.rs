use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One row of a GMP listing (target, port list, scan config).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub id: String,
    pub name: String,
}

/// Task state as reported by the management daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    New,
    Requested,
    Queued,
    Running,
    StopRequested,
    Stopped,
    Done,
    Interrupted,
    Other(String),
}

impl TaskStatus {
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "New" => TaskStatus::New,
            "Requested" => TaskStatus::Requested,
            "Queued" => TaskStatus::Queued,
            "Running" => TaskStatus::Running,
            "Stop Requested" => TaskStatus::StopRequested,
            "Stopped" => TaskStatus::Stopped,
            "Done" => TaskStatus::Done,
            "Interrupted" => TaskStatus::Interrupted,
            other => TaskStatus::Other(other.to_string()),
        }
    }

    /// Done, Stopped and Interrupted end the poll loop; nothing else does.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Done | TaskStatus::Stopped | TaskStatus::Interrupted
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::New => "New",
            TaskStatus::Requested => "Requested",
            TaskStatus::Queued => "Queued",
            TaskStatus::Running => "Running",
            TaskStatus::StopRequested => "Stop Requested",
            TaskStatus::Stopped => "Stopped",
            TaskStatus::Done => "Done",
            TaskStatus::Interrupted => "Interrupted",
            TaskStatus::Other(s) => s.as_str(),
        };
        f.write_str(s)
    }
}

/// A single poll observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskProgress {
    pub status: TaskStatus,
    pub progress: i32,
}

/// Record of one run, optionally written as pretty JSON.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ScanSummary {
    pub target_id: String,
    pub target_created: bool,
    pub port_list_id: String,
    pub config_id: String,
    pub task_id: String,
    pub report_id: String,
    pub final_status: String,
    pub polls: u32,
    pub report_path: PathBuf,
    pub started_at: String,
    pub finished_at: String,
}
