//! Scoped, checkpointed reindex / 分段可恢复重建索引

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::models::{ResourceRecord, ResourceType};
use crate::store::{quote_ident, Connection, SqlValue};
use crate::task::{JobHandle, JobId, JobKind};

/// Which resource types a run covers / 重建范围
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReindexScope {
    ItemsOnly,
    ItemsAndSets,
    ItemSetsOnly,
    MediaOnly,
}

impl ReindexScope {
    pub fn resource_types(self) -> &'static [ResourceType] {
        match self {
            ReindexScope::ItemsOnly => &[ResourceType::Items],
            ReindexScope::ItemsAndSets => &[ResourceType::Items, ResourceType::ItemSets],
            ReindexScope::ItemSetsOnly => &[ResourceType::ItemSets],
            ReindexScope::MediaOnly => &[ResourceType::Media],
        }
    }

    /// Label used in job log lines / 日志标签
    pub fn label(self) -> &'static str {
        match self {
            ReindexScope::ItemsOnly => "items",
            ReindexScope::ItemsAndSets => "items+item_sets",
            ReindexScope::ItemSetsOnly => "item_sets",
            ReindexScope::MediaOnly => "media",
        }
    }

    pub fn kind(self) -> JobKind {
        match self {
            ReindexScope::ItemsOnly => JobKind::ReindexItems,
            ReindexScope::ItemsAndSets => JobKind::ReindexItemsAndSets,
            ReindexScope::ItemSetsOnly => JobKind::ReindexItemSets,
            ReindexScope::MediaOnly => JobKind::ReindexMedia,
        }
    }

    pub fn from_kind(kind: JobKind) -> Self {
        match kind {
            JobKind::ReindexItems => ReindexScope::ItemsOnly,
            JobKind::ReindexItemsAndSets => ReindexScope::ItemsAndSets,
            JobKind::ReindexItemSets => ReindexScope::ItemSetsOnly,
            JobKind::ReindexMedia => ReindexScope::MediaOnly,
        }
    }
}

/// One page of the resource listing / 列表分页结果
#[derive(Debug, Clone, Default)]
pub struct CatalogPage {
    pub items: Vec<ResourceRecord>,
    /// Total count for the type, independent of paging / 总数
    pub total: u64,
}

/// Paged resource listing keyed by type; pages start at 1 / 资源分页列表
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn list(&self, resource_type: ResourceType, page: u32, per_page: u32) -> Result<CatalogPage>;
}

/// Writes records into the search table / 索引写入
#[async_trait]
pub trait IndexWriter: Send + Sync {
    async fn write_one(&self, record: &ResourceRecord, resource_type: ResourceType) -> Result<()>;

    /// Persist buffered writes and drop any cached state / 刷新并清理会话
    async fn flush_and_clear(&self) -> Result<()>;
}

/// Cooperative stop poll and log sink of the running job / 任务控制
#[async_trait]
pub trait JobControl: Send + Sync {
    /// Resolve the job again after a session clear / 重新获取任务
    async fn reacquire(&self, id: &JobId) -> Result<JobHandle>;

    async fn should_stop(&self, job: &JobHandle) -> bool;

    async fn append_log(&self, job: &JobHandle, message: &str);
}

/// Summary of one run / 运行结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReindexReport {
    pub processed: u64,
    pub total: u64,
    pub stopped: bool,
}

pub struct ReindexRunner {
    conn: Arc<dyn Connection>,
    catalog: Arc<dyn Catalog>,
    writer: Arc<dyn IndexWriter>,
    jobs: Arc<dyn JobControl>,
    table: String,
    page_size: u32,
}

impl ReindexRunner {
    pub fn new(
        conn: Arc<dyn Connection>,
        catalog: Arc<dyn Catalog>,
        writer: Arc<dyn IndexWriter>,
        jobs: Arc<dyn JobControl>,
        table: impl Into<String>,
        page_size: u32,
    ) -> Self {
        Self {
            conn,
            catalog,
            writer,
            jobs,
            table: table.into(),
            page_size: page_size.max(1),
        }
    }

    /// Delete the scope's rows and rebuild them page by page / 执行重建
    ///
    /// The job is only held by id between pages; every flush is followed by
    /// a fresh [`JobControl::reacquire`]. A stop request is honoured before
    /// each page and returns `Ok` with `stopped` set. A failed page listing
    /// aborts the run, the log written so far stays.
    pub async fn run(&self, scope: ReindexScope, job_id: &JobId) -> Result<ReindexReport> {
        let label = scope.label();
        let mut job = self.jobs.reacquire(job_id).await?;

        self.delete_scope(scope).await?;
        let total = self.count_total(scope).await;
        self.jobs
            .append_log(&job, &format!("Reindex {}: start (total={})", label, total))
            .await;

        let mut processed: u64 = 0;
        for &resource_type in scope.resource_types() {
            let resource = resource_type.api_name();
            let mut page: u32 = 1;
            loop {
                if self.jobs.should_stop(&job).await {
                    self.jobs
                        .append_log(
                            &job,
                            &format!(
                                "Reindex {}: stopping (processed={}/{}, page={}, resource={})",
                                label, processed, total, page, resource
                            ),
                        )
                        .await;
                    return Ok(ReindexReport {
                        processed,
                        total,
                        stopped: true,
                    });
                }

                let listing = self
                    .catalog
                    .list(resource_type, page, self.page_size)
                    .await
                    .map_err(|e| match e {
                        Error::Listing { .. } => e,
                        other => Error::Listing {
                            resource_type: resource.to_string(),
                            message: other.to_string(),
                        },
                    })?;
                if listing.items.is_empty() {
                    break;
                }

                for record in &listing.items {
                    self.writer.write_one(record, resource_type).await?;
                    processed += 1;
                }
                self.jobs
                    .append_log(
                        &job,
                        &format!(
                            "Reindex {}: processed {} / {} (page={}, resource={})",
                            label, processed, total, page, resource
                        ),
                    )
                    .await;

                self.writer.flush_and_clear().await?;
                job = self.jobs.reacquire(job_id).await?;
                page += 1;
            }
        }

        self.jobs
            .append_log(
                &job,
                &format!("Reindex {}: completed (processed={} / {})", label, processed, total),
            )
            .await;
        Ok(ReindexReport {
            processed,
            total,
            stopped: false,
        })
    }

    async fn delete_scope(&self, scope: ReindexScope) -> Result<u64> {
        let types = scope.resource_types();
        let placeholders = vec!["?"; types.len()].join(", ");
        let sql = format!(
            "DELETE FROM {} WHERE `resource` IN ({})",
            quote_ident(&self.table),
            placeholders
        );
        let params: Vec<SqlValue> = types.iter().map(|t| SqlValue::from(t.api_name())).collect();
        let deleted = self.conn.execute(&sql, &params).await?;
        tracing::debug!("Removed {} rows of {} from {}", deleted, scope.label(), self.table);
        Ok(deleted)
    }

    /// 单条探测获取总数，失败计 0
    async fn count_total(&self, scope: ReindexScope) -> u64 {
        let mut total = 0;
        for &resource_type in scope.resource_types() {
            match self.catalog.list(resource_type, 1, 1).await {
                Ok(page) => total += page.total,
                Err(e) => tracing::debug!("Total probe for {} failed: {}", resource_type.api_name(), e),
            }
        }
        total
    }
}
