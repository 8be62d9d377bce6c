//! Storage engine migrations for the search table / 搜索表引擎迁移
//!
//! Statements are applied one by one, not inside a transaction (engine
//! changes are DDL). Every operation re-reads engine, FK and index state
//! before acting, so a half-applied switch is repaired by running it again.
//!
//! enhanced:  drop owner FK -> ALTER ENGINE=<enhanced> -> ensure full-text index
//!            (ALTER rejected -> remove orphans -> DROP + CREATE -> ensure index)
//! baseline:  [remove orphans] -> drop owner FK -> ALTER ENGINE=<baseline> -> ensure owner FK
//!            (rejected -> DROP + CREATE -> ensure owner FK)
//!
//! While the enhanced engine is effective its objects still back the live
//! table, so the baseline switch only removes them when it is not.

use std::sync::Arc;

use serde::Serialize;

use super::detector::EngineDetector;
use super::schema::{
    add_fulltext_index_sql, add_owner_fk_sql, alter_engine_sql, create_table_sql,
    drop_foreign_key_sql, drop_table_sql, enhanced_comment, FULLTEXT_COLUMNS,
};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::store::{Connection, SqlValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationOutcome {
    /// Table already had the target engine, nothing issued / 已是目标引擎
    AlreadyInState,
    /// In-place ALTER succeeded, data kept / 原地切换
    Altered,
    /// Table was dropped and recreated, a reindex is required / 重建表，需要重建索引
    Recreated,
}

impl MigrationOutcome {
    pub fn needs_reindex(self) -> bool {
        self == MigrationOutcome::Recreated
    }
}

/// Engine switch state machine / 引擎切换
#[derive(Clone)]
pub struct Migrator {
    conn: Arc<dyn Connection>,
    detector: EngineDetector,
    config: EngineConfig,
}

impl Migrator {
    pub fn new(conn: Arc<dyn Connection>, config: EngineConfig) -> Self {
        Self {
            detector: EngineDetector::new(conn.clone(), config.clone()),
            conn,
            config,
        }
    }

    pub fn detector(&self) -> &EngineDetector {
        &self.detector
    }

    fn table(&self) -> &str {
        &self.config.search_table
    }

    /// Switch the search table to the enhanced engine / 切换到增强引擎
    pub async fn switch_to_enhanced(&self) -> Result<MigrationOutcome> {
        let engine = self.detector.get_table_engine(self.table()).await;
        if self.detector.is_enhanced_engine(&engine) {
            tracing::debug!("{} already uses {}", self.table(), self.config.enhanced_engine);
            return Ok(MigrationOutcome::AlreadyInState);
        }

        // 增强引擎不支持外键
        self.drop_owner_fk().await?;

        let tokenizer = if self.detector.probe_optional_tokenizer_available().await {
            Some(self.config.optional_tokenizer.as_str())
        } else {
            None
        };
        let comment = enhanced_comment(self.config.pinned_table_name.as_deref(), tokenizer);

        let alter = alter_engine_sql(self.table(), &self.config.enhanced_engine, &comment);
        match self.conn.execute(&alter, &[]).await {
            Ok(_) => {
                self.ensure_fulltext_index(self.table(), &FULLTEXT_COLUMNS).await;
                tracing::info!(
                    "Switched {} to {} ({})",
                    self.table(),
                    self.config.enhanced_engine,
                    comment
                );
                Ok(MigrationOutcome::Altered)
            }
            Err(e) => {
                tracing::warn!(
                    "ALTER TABLE to {} failed, recreating {} (data will need a reindex): {}",
                    self.config.enhanced_engine,
                    self.table(),
                    e
                );
                self.remove_orphan_objects().await;
                self.recreate(&self.config.enhanced_engine, Some(comment.as_str())).await?;
                self.ensure_fulltext_index(self.table(), &FULLTEXT_COLUMNS).await;
                tracing::warn!(
                    "{} was recreated as {}. Run the reindex jobs manually.",
                    self.table(),
                    self.config.enhanced_engine
                );
                Ok(MigrationOutcome::Recreated)
            }
        }
    }

    /// Switch the search table back to the baseline engine / 切换回基础引擎
    pub async fn switch_to_baseline(&self) -> Result<MigrationOutcome> {
        if self.detector.is_effective().await {
            tracing::debug!("{} is live on {}, keeping its objects", self.table(), self.config.enhanced_engine);
        } else {
            self.remove_orphan_objects().await;
        }

        match self.revert_in_place().await {
            Ok(()) => {
                tracing::info!("Switched {} to {}", self.table(), self.config.baseline_engine);
                Ok(MigrationOutcome::Altered)
            }
            Err(e) => {
                tracing::warn!(
                    "ALTER TABLE to {} failed, recreating {} (data will need a reindex): {}",
                    self.config.baseline_engine,
                    self.table(),
                    e
                );
                self.recreate(&self.config.baseline_engine, None).await?;
                self.ensure_owner_fk()
                    .await
                    .map_err(|e| Error::Migration(format!("owner foreign key: {}", e)))?;
                tracing::warn!(
                    "{} was recreated as {}. Run the reindex jobs manually.",
                    self.table(),
                    self.config.baseline_engine
                );
                Ok(MigrationOutcome::Recreated)
            }
        }
    }

    /// Drop FK, ALTER to baseline with an empty comment, recreate FK / 原地切回基础引擎
    ///
    /// No fallback; errors propagate.
    pub async fn revert_in_place(&self) -> Result<()> {
        self.drop_owner_fk().await?;
        let alter = alter_engine_sql(self.table(), &self.config.baseline_engine, "");
        self.conn.execute(&alter, &[]).await?;
        self.ensure_owner_fk().await?;
        Ok(())
    }

    /// Drop the owner FK when one exists / 删除所有者外键
    pub async fn drop_owner_fk(&self) -> Result<bool> {
        match self.detector.find_owner_fk().await? {
            Some(name) => {
                self.conn
                    .execute(&drop_foreign_key_sql(self.table(), &name), &[])
                    .await?;
                tracing::debug!("Dropped foreign key {} on {}", name, self.table());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Create the owner FK under its stable name when missing / 补建所有者外键
    pub async fn ensure_owner_fk(&self) -> Result<bool> {
        if self.detector.find_owner_fk().await?.is_some() {
            return Ok(false);
        }
        let sql = add_owner_fk_sql(
            self.table(),
            &self.config.owner_fk_name,
            &self.config.owner_table,
        );
        self.conn.execute(&sql, &[]).await?;
        tracing::debug!("Created foreign key {} on {}", self.config.owner_fk_name, self.table());
        Ok(true)
    }

    /// Create a FULLTEXT index over `columns` unless an identical one exists / 确保全文索引
    ///
    /// Creation failure is logged and swallowed. Returns whether the index is
    /// known to be present afterwards.
    pub async fn ensure_fulltext_index(&self, table: &str, columns: &[&str]) -> bool {
        if columns.is_empty() {
            return false;
        }
        if self.detector.has_fulltext_index(table, columns).await {
            return true;
        }
        match self.conn.execute(&add_fulltext_index_sql(table, columns), &[]).await {
            Ok(_) => {
                tracing::info!("Created full-text index on {} ({})", table, columns.join(", "));
                true
            }
            Err(e) => {
                tracing::warn!("Could not create full-text index on {}: {}", table, e);
                false
            }
        }
    }

    /// Best-effort removal of enhanced-engine objects left under the default
    /// and the pinned name / 清理残留的引擎内部对象
    pub async fn remove_orphan_objects(&self) {
        let command_sql = format!(
            "SELECT {}_command(?)",
            self.config.enhanced_engine.to_lowercase()
        );
        let mut names = vec![self.table().to_string()];
        if let Some(pinned) = self.config.pinned_table_name.as_deref() {
            if !pinned.is_empty() && pinned != self.table() {
                names.push(pinned.to_string());
            }
        }
        for name in names {
            let arg = SqlValue::from(format!("object_remove {}", name));
            if let Err(e) = self.conn.query(&command_sql, &[arg]).await {
                tracing::debug!("object_remove {} skipped: {}", name, e);
            }
        }
    }

    /// Drop and recreate from the canonical definition / 删除并重建表
    async fn recreate(&self, engine: &str, comment: Option<&str>) -> Result<()> {
        let result: Result<()> = async {
            self.conn.execute(&drop_table_sql(self.table()), &[]).await?;
            self.conn
                .execute(&create_table_sql(self.table(), engine, comment), &[])
                .await?;
            Ok(())
        }
        .await;

        result.map_err(|e| {
            tracing::error!("Recreating {} as {} failed: {}", self.table(), engine, e);
            Error::Migration(format!("recreate {} as {}: {}", self.table(), engine, e))
        })
    }
}
