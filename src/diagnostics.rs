//! Admin diagnostics snapshot / 管理诊断信息
//!
//! Every field is collected independently; a failing query leaves its field
//! empty instead of failing the whole report.

use serde::Serialize;

use crate::engine::{EngineDetector, IndexInfo};
use crate::models::ResourceType;
use crate::store::{quote_ident, Connection};
use crate::task::{JobManager, JobSummary};

/// Number of jobs shown in the report / 显示的任务数
pub const RECENT_JOBS: usize = 6;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResourceCounts {
    pub items: Option<i64>,
    pub item_sets: Option<i64>,
    pub media: Option<i64>,
}

impl ResourceCounts {
    fn slot(&mut self, resource_type: ResourceType) -> &mut Option<i64> {
        match resource_type {
            ResourceType::Items => &mut self.items,
            ResourceType::ItemSets => &mut self.item_sets,
            ResourceType::Media => &mut self.media,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Diagnostics {
    pub plugin_active: bool,
    pub table_engine: String,
    pub table_comment: String,
    pub effective: bool,
    pub optional_tokenizer_available: bool,
    pub indexes: Vec<IndexInfo>,
    /// Rows per type in the search table / 搜索表中各类型行数
    pub counts: ResourceCounts,
    /// Rows per type in the host tables / 宿主表中各类型总数
    pub totals: ResourceCounts,
    pub jobs: Vec<JobSummary>,
    pub build_time: Option<String>,
}

/// 收集诊断信息
pub async fn collect(detector: &EngineDetector, conn: &dyn Connection, jobs: &JobManager) -> Diagnostics {
    let table = detector.config().search_table.clone();
    let plugin_active = detector.check_plugin_active().await;

    let (table_engine, table_comment) = match detector.table_status(&table).await {
        Ok(Some(status)) => (status.engine, status.comment),
        Ok(None) => (String::new(), String::new()),
        Err(e) => {
            tracing::debug!("Diagnostics: table status unavailable: {}", e);
            (String::new(), String::new())
        }
    };
    let effective = plugin_active && detector.is_enhanced_engine(&table_engine);

    // 插件未启用时探测必然失败，不执行
    let optional_tokenizer_available =
        plugin_active && detector.probe_optional_tokenizer_available().await;

    let indexes = detector.indexes(&table).await.unwrap_or_else(|e| {
        tracing::debug!("Diagnostics: index listing failed: {}", e);
        Vec::new()
    });

    Diagnostics {
        plugin_active,
        table_engine,
        table_comment,
        effective,
        optional_tokenizer_available,
        indexes,
        counts: search_counts(conn, &table).await,
        totals: host_totals(conn).await,
        jobs: jobs.recent_jobs(RECENT_JOBS).await,
        build_time: None,
    }
}

async fn search_counts(conn: &dyn Connection, table: &str) -> ResourceCounts {
    let sql = format!(
        "SELECT `resource`, COUNT(*) AS cnt FROM {} GROUP BY `resource`",
        quote_ident(table)
    );
    let mut counts = ResourceCounts::default();
    match conn.query(&sql, &[]).await {
        Ok(rows) => {
            for resource_type in ResourceType::ALL {
                *counts.slot(resource_type) = Some(0);
            }
            for row in &rows {
                if let Some(resource_type) = ResourceType::from_api_name(&row.get_text("resource")) {
                    *counts.slot(resource_type) = row.get_i64("cnt");
                }
            }
        }
        Err(e) => tracing::debug!("Diagnostics: search row counts failed: {}", e),
    }
    counts
}

async fn host_totals(conn: &dyn Connection) -> ResourceCounts {
    let mut totals = ResourceCounts::default();
    for resource_type in ResourceType::ALL {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(resource_type.table()));
        match conn.query_scalar(&sql, &[]).await {
            Ok(value) => *totals.slot(resource_type) = value.and_then(|v| v.as_i64()),
            Err(e) => tracing::debug!("Diagnostics: total of {} failed: {}", resource_type.table(), e),
        }
    }
    totals
}
