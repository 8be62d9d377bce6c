use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::models::{Job, JobHandle, JobSignal, JobSummary};
use super::types::{JobId, JobKind, JobStatus};
use crate::error::{Error, Result};
use crate::reindex::JobControl;
use crate::store::{Connection, Row, SqlValue};

const JOB_COLUMNS: &str = "id, kind, status, stop_requested, log, error, created, started, ended";

const SAVE_JOB_SQL: &str = "INSERT INTO `fulltext_jobs` (id, kind, status, stop_requested, log, error, created, started, ended) \
     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) \
     ON DUPLICATE KEY UPDATE kind = VALUES(kind), status = VALUES(status), \
     stop_requested = VALUES(stop_requested), log = VALUES(log), error = VALUES(error), \
     started = VALUES(started), ended = VALUES(ended)";

const APPEND_LOG_SQL: &str =
    "UPDATE `fulltext_jobs` SET log = CONCAT(COALESCE(log, ''), ?) WHERE id = ?";

/// 任务管理器（内存 + 数据库持久化）
#[derive(Clone)]
pub struct JobManager {
    jobs: Arc<RwLock<HashMap<JobId, Job>>>,
    signals: Arc<RwLock<HashMap<JobId, Arc<JobSignal>>>>,
    db: Option<Arc<dyn Connection>>,
}

impl Default for JobManager {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_time(value: Option<&SqlValue>) -> Option<DateTime<Utc>> {
    let text = value.filter(|v| !v.is_null())?.to_text();
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

fn job_from_row(row: &Row) -> Option<Job> {
    let kind = JobKind::parse(&row.get_text("kind"))?;
    let error = Some(row.get_text("error")).filter(|e| !e.is_empty());
    Some(Job {
        id: JobId::from(row.get_text("id")),
        kind,
        status: JobStatus::from_db(&row.get_text("status")),
        stop_requested: row.get_i64("stop_requested").unwrap_or(0) != 0,
        log: row.get_text("log"),
        error,
        created: parse_time(row.get("created")).unwrap_or_else(Utc::now),
        started: parse_time(row.get("started")),
        ended: parse_time(row.get("ended")),
    })
}

impl JobManager {
    pub fn new() -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            signals: Arc::new(RwLock::new(HashMap::new())),
            db: None,
        }
    }

    /// 设置数据库连接（用于持久化）
    pub fn set_db(&mut self, db: Arc<dyn Connection>) {
        self.db = Some(db);
    }

    /// 从数据库加载任务到内存，运行中的任务标记为中断
    pub async fn load_jobs_from_db(&self) {
        let Some(db) = &self.db else {
            return;
        };
        let sql = format!("SELECT {} FROM `fulltext_jobs`", JOB_COLUMNS);
        let rows = match db.query(&sql, &[]).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!("Failed to load jobs: {}", e);
                return;
            }
        };

        let mut interrupted = Vec::new();
        let mut jobs = self.jobs.write().await;
        for row in &rows {
            let Some(job) = job_from_row(row) else {
                continue;
            };
            if job.status == JobStatus::Interrupted && row.get_text("status") != "interrupted" {
                interrupted.push(job.clone());
            }
            jobs.insert(job.id.clone(), job);
        }
        tracing::info!("Loaded {} jobs from database", jobs.len());
        drop(jobs);

        for job in &interrupted {
            self.save_job_to_db(job).await;
        }
    }

    /// 创建任务
    pub async fn create_job(&self, kind: JobKind) -> Job {
        let job = Job::new(kind);
        let mut jobs = self.jobs.write().await;
        jobs.insert(job.id.clone(), job.clone());
        drop(jobs);
        self.signals
            .write()
            .await
            .insert(job.id.clone(), Arc::new(JobSignal::new()));
        self.save_job_to_db(&job).await;
        tracing::info!("Created job {} ({})", job.id, kind.as_str());
        job
    }

    /// 开始任务
    pub async fn start_job(&self, id: &JobId) {
        self.update_job(id, |job| {
            job.status = JobStatus::Running;
            job.started = Some(Utc::now());
        })
        .await;
    }

    /// 完成任务
    pub async fn complete_job(&self, id: &JobId) {
        self.update_job(id, |job| {
            job.status = JobStatus::Completed;
            job.ended = Some(Utc::now());
        })
        .await;
        self.signals.write().await.remove(id);
    }

    /// 任务已按请求停止
    pub async fn stop_job(&self, id: &JobId) {
        self.update_job(id, |job| {
            job.status = JobStatus::Stopped;
            job.ended = Some(Utc::now());
        })
        .await;
        self.signals.write().await.remove(id);
    }

    /// 任务失败
    pub async fn fail_job(&self, id: &JobId, error: &str) {
        self.update_job(id, |job| {
            job.status = JobStatus::Failed;
            job.error = Some(error.to_string());
            job.ended = Some(Utc::now());
        })
        .await;
        self.signals.write().await.remove(id);
    }

    /// 请求停止任务，只对未结束的任务有效
    pub async fn request_stop(&self, id: &JobId) -> bool {
        let mut jobs = self.jobs.write().await;
        let Some(job) = jobs.get_mut(id) else {
            return false;
        };
        if !job.status.is_active() {
            return false;
        }
        job.stop_requested = true;
        let job_clone = job.clone();
        drop(jobs);

        if let Some(signal) = self.signals.read().await.get(id) {
            signal.stop();
        }
        self.save_job_to_db(&job_clone).await;
        tracing::info!("Stop requested for job {}", id);
        true
    }

    /// 获取任务
    pub async fn get_job(&self, id: &JobId) -> Option<Job> {
        self.jobs.read().await.get(id).cloned()
    }

    /// 最近的任务，按创建时间倒序
    pub async fn recent_jobs(&self, limit: usize) -> Vec<JobSummary> {
        let jobs = self.jobs.read().await;
        let mut list: Vec<&Job> = jobs.values().collect();
        list.sort_by(|a, b| b.created.cmp(&a.created));
        list.into_iter().take(limit).map(JobSummary::from).collect()
    }

    async fn update_job(&self, id: &JobId, f: impl FnOnce(&mut Job)) {
        let mut jobs = self.jobs.write().await;
        if let Some(job) = jobs.get_mut(id) {
            f(job);
            let job_clone = job.clone();
            drop(jobs);
            self.save_job_to_db(&job_clone).await;
        }
    }

    /// 保存任务到数据库
    async fn save_job_to_db(&self, job: &Job) {
        let Some(db) = &self.db else {
            return;
        };
        let params = [
            SqlValue::from(job.id.as_str()),
            SqlValue::from(job.kind.as_str()),
            SqlValue::from(job.status.as_str()),
            SqlValue::from(job.stop_requested),
            SqlValue::from(job.log.as_str()),
            SqlValue::from(job.error.clone()),
            SqlValue::from(job.created.to_rfc3339()),
            SqlValue::from(job.started.map(|t| t.to_rfc3339())),
            SqlValue::from(job.ended.map(|t| t.to_rfc3339())),
        ];
        if let Err(e) = db.execute(SAVE_JOB_SQL, &params).await {
            tracing::warn!("Failed to persist job {}: {}", job.id, e);
        }
    }

    async fn load_job_from_db(&self, id: &JobId) -> Option<Job> {
        let db = self.db.as_ref()?;
        let sql = format!("SELECT {} FROM `fulltext_jobs` WHERE id = ?", JOB_COLUMNS);
        match db.query(&sql, &[SqlValue::from(id.as_str())]).await {
            Ok(rows) => rows.first().and_then(job_from_row),
            Err(e) => {
                tracing::debug!("Reloading job {} failed: {}", id, e);
                None
            }
        }
    }
}

#[async_trait]
impl JobControl for JobManager {
    async fn reacquire(&self, id: &JobId) -> Result<JobHandle> {
        if let Some(mut stored) = self.load_job_from_db(id).await {
            // 数据库里的 running 读出来是 interrupted，以内存状态为准
            if let Some(current) = self.jobs.read().await.get(id) {
                stored.status = current.status;
            }
            return Ok(JobHandle::from(&stored));
        }
        self.jobs
            .read()
            .await
            .get(id)
            .map(JobHandle::from)
            .ok_or_else(|| Error::Job(format!("Job {} not found", id)))
    }

    async fn should_stop(&self, job: &JobHandle) -> bool {
        if job.stop_requested {
            return true;
        }
        self.signals
            .read()
            .await
            .get(&job.id)
            .map(|s| s.is_stopped())
            .unwrap_or(false)
    }

    async fn append_log(&self, job: &JobHandle, message: &str) {
        tracing::info!("[job {}] {}", job.id, message);
        let line = format!("{}\n", message);
        let mut jobs = self.jobs.write().await;
        if let Some(j) = jobs.get_mut(&job.id) {
            j.log.push_str(&line);
        }
        drop(jobs);

        if let Some(db) = &self.db {
            let params = [SqlValue::from(line), SqlValue::from(job.id.as_str())];
            if let Err(e) = db.execute(APPEND_LOG_SQL, &params).await {
                tracing::warn!("Failed to append log for job {}: {}", job.id, e);
            }
        }
    }
}
