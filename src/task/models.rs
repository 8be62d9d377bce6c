use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

use super::types::{JobId, JobKind, JobStatus};

/// 后台任务
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub kind: JobKind,
    pub status: JobStatus,
    /// 已请求停止（持久化，跨进程可见）
    pub stop_requested: bool,
    /// 追加式日志
    pub log: String,
    pub error: Option<String>,
    pub created: DateTime<Utc>,
    pub started: Option<DateTime<Utc>>,
    pub ended: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(kind: JobKind) -> Self {
        Self {
            id: JobId::new(),
            kind,
            status: JobStatus::Pending,
            stop_requested: false,
            log: String::new(),
            error: None,
            created: Utc::now(),
            started: None,
            ended: None,
        }
    }

    /// 最后一行日志
    pub fn last_log_line(&self) -> Option<&str> {
        self.log.lines().rev().find(|l| !l.trim().is_empty())
    }
}

/// 任务摘要（用于列表和诊断）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: JobId,
    pub kind: JobKind,
    pub status: JobStatus,
    pub started: Option<DateTime<Utc>>,
    pub ended: Option<DateTime<Utc>>,
    pub last_log: Option<String>,
    pub error: Option<String>,
}

impl From<&Job> for JobSummary {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id.clone(),
            kind: job.kind,
            status: job.status,
            started: job.started,
            ended: job.ended,
            last_log: job.last_log_line().map(str::to_string),
            error: job.error.clone(),
        }
    }
}

/// 运行中任务的句柄，每次会话清理后需重新获取
#[derive(Debug, Clone)]
pub struct JobHandle {
    pub id: JobId,
    pub kind: JobKind,
    pub status: JobStatus,
    pub stop_requested: bool,
}

impl From<&Job> for JobHandle {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id.clone(),
            kind: job.kind,
            status: job.status,
            stop_requested: job.stop_requested,
        }
    }
}

/// 任务停止信号
#[derive(Debug, Default)]
pub struct JobSignal {
    pub stop: AtomicBool,
}

impl JobSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}
