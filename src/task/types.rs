use serde::{Deserialize, Serialize};
use std::fmt;

/// 任务ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 任务类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    ReindexItems,
    ReindexItemsAndSets,
    ReindexItemSets,
    ReindexMedia,
}

impl JobKind {
    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::ReindexItems => "reindex_items",
            JobKind::ReindexItemsAndSets => "reindex_items_and_sets",
            JobKind::ReindexItemSets => "reindex_item_sets",
            JobKind::ReindexMedia => "reindex_media",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "reindex_items" => Some(JobKind::ReindexItems),
            "reindex_items_and_sets" => Some(JobKind::ReindexItemsAndSets),
            "reindex_item_sets" => Some(JobKind::ReindexItemSets),
            "reindex_media" => Some(JobKind::ReindexMedia),
            _ => None,
        }
    }
}

/// 任务状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Stopped,
    Failed,
    Interrupted,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Stopped => "stopped",
            JobStatus::Failed => "failed",
            JobStatus::Interrupted => "interrupted",
        }
    }

    /// 重启后运行中的任务视为中断
    pub fn from_db(s: &str) -> Self {
        match s {
            "pending" | "running" => JobStatus::Interrupted,
            "completed" => JobStatus::Completed,
            "stopped" => JobStatus::Stopped,
            "failed" => JobStatus::Failed,
            _ => JobStatus::Interrupted,
        }
    }

    pub fn is_active(self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Running)
    }
}
