//! Engine state detection / 引擎状态检测
//!
//! All reads are side-effect free and computed fresh on every call. Query
//! failures degrade to a negative answer and are only logged at debug level.

use std::sync::Arc;

use serde::Serialize;

use super::schema::{tokenizer_probe_sql, FULLTEXT_COLUMNS, OWNER_COLUMN};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::store::{Connection, SqlValue};

const PLUGIN_STATUS_SQL: &str =
    "SELECT PLUGIN_STATUS FROM information_schema.PLUGINS WHERE PLUGIN_NAME = ?";

const TABLE_STATUS_SQL: &str = "SELECT ENGINE, TABLE_COMMENT FROM information_schema.TABLES \
     WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?";

const FOREIGN_KEY_SQL: &str = "SELECT CONSTRAINT_NAME FROM information_schema.KEY_COLUMN_USAGE \
     WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? AND COLUMN_NAME = ? \
     AND REFERENCED_TABLE_NAME IS NOT NULL LIMIT 1";

const INDEXES_SQL: &str = "SELECT INDEX_NAME, INDEX_TYPE, \
     GROUP_CONCAT(COLUMN_NAME ORDER BY SEQ_IN_INDEX) AS cols \
     FROM information_schema.STATISTICS \
     WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? \
     GROUP BY INDEX_NAME, INDEX_TYPE";

/// Snapshot of engine state, never cached / 引擎状态快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineState {
    pub plugin_active: bool,
    pub table_engine: String,
    pub effective: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableStatus {
    pub engine: String,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub index_type: String,
    pub cols: String,
}

impl IndexInfo {
    pub fn is_fulltext(&self) -> bool {
        self.index_type.eq_ignore_ascii_case("FULLTEXT")
    }
}

/// Reads plugin and table state from the store / 引擎检测器
#[derive(Clone)]
pub struct EngineDetector {
    conn: Arc<dyn Connection>,
    config: EngineConfig,
}

impl EngineDetector {
    pub fn new(conn: Arc<dyn Connection>, config: EngineConfig) -> Self {
        Self { conn, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Case-insensitive comparison with the enhanced engine name / 是否为增强引擎
    pub fn is_enhanced_engine(&self, engine: &str) -> bool {
        !engine.is_empty() && engine.eq_ignore_ascii_case(&self.config.enhanced_engine)
    }

    /// Enhanced engine plugin installed and ACTIVE / 插件是否启用
    pub async fn check_plugin_active(&self) -> bool {
        let params = [SqlValue::from(self.config.enhanced_engine.as_str())];
        match self.conn.query_scalar(PLUGIN_STATUS_SQL, &params).await {
            Ok(status) => status.map(|s| s.to_text() == "ACTIVE").unwrap_or(false),
            Err(e) => {
                tracing::debug!("Plugin status check failed: {}", e);
                false
            }
        }
    }

    /// Engine and comment of a table, `None` when the table does not exist / 表状态
    pub async fn table_status(&self, table: &str) -> Result<Option<TableStatus>> {
        let rows = self
            .conn
            .query(TABLE_STATUS_SQL, &[SqlValue::from(table)])
            .await?;
        Ok(rows.first().map(|row| TableStatus {
            engine: row.get_text("ENGINE"),
            comment: row.get_text("TABLE_COMMENT"),
        }))
    }

    /// Storage engine of a table, errors propagate / 获取表引擎（返回错误）
    pub async fn try_table_engine(&self, table: &str) -> Result<String> {
        Ok(self
            .table_status(table)
            .await?
            .map(|s| s.engine)
            .unwrap_or_default())
    }

    /// Storage engine of a table, empty on failure / 获取表引擎
    pub async fn get_table_engine(&self, table: &str) -> String {
        match self.try_table_engine(table).await {
            Ok(engine) => engine,
            Err(e) => {
                tracing::debug!("Engine lookup for {} failed: {}", table, e);
                String::new()
            }
        }
    }

    /// Plugin, table engine and the combined flag / 完整状态
    pub async fn state(&self) -> EngineState {
        let plugin_active = self.check_plugin_active().await;
        let table_engine = self.get_table_engine(&self.config.search_table).await;
        let effective = plugin_active && self.is_enhanced_engine(&table_engine);
        EngineState {
            plugin_active,
            table_engine,
            effective,
        }
    }

    /// Plugin active and bound to the search table / 增强引擎是否实际生效
    pub async fn is_effective(&self) -> bool {
        if !self.check_plugin_active().await {
            return false;
        }
        let engine = self.get_table_engine(&self.config.search_table).await;
        self.is_enhanced_engine(&engine)
    }

    /// Name of the FK on `column` that references another table / 查找外键名
    pub async fn find_foreign_key(&self, table: &str, column: &str) -> Result<Option<String>> {
        let params = [SqlValue::from(table), SqlValue::from(column)];
        let name = self.conn.query_scalar(FOREIGN_KEY_SQL, &params).await?;
        Ok(name.map(|v| v.to_text()).filter(|n| !n.is_empty()))
    }

    pub async fn find_owner_fk(&self) -> Result<Option<String>> {
        self.find_foreign_key(&self.config.search_table, OWNER_COLUMN)
            .await
    }

    /// All indexes of a table with their ordered columns / 表的索引列表
    pub async fn indexes(&self, table: &str) -> Result<Vec<IndexInfo>> {
        let rows = self.conn.query(INDEXES_SQL, &[SqlValue::from(table)]).await?;
        Ok(rows
            .iter()
            .map(|row| IndexInfo {
                name: row.get_text("INDEX_NAME"),
                index_type: row.get_text("INDEX_TYPE"),
                cols: row.get_text("cols"),
            })
            .collect())
    }

    /// A FULLTEXT index over exactly these columns, in order / 是否存在全文索引
    pub async fn has_fulltext_index(&self, table: &str, columns: &[&str]) -> bool {
        let wanted = columns.join(",");
        match self.indexes(table).await {
            Ok(indexes) => indexes
                .iter()
                .any(|idx| idx.is_fulltext() && idx.cols.eq_ignore_ascii_case(&wanted)),
            Err(e) => {
                tracing::debug!("Index lookup for {} failed: {}", table, e);
                false
            }
        }
    }

    pub async fn has_required_index(&self) -> bool {
        self.has_fulltext_index(&self.config.search_table, &FULLTEXT_COLUMNS)
            .await
    }

    /// Try creating a throwaway table with the optional tokenizer / 探测可选分词器
    ///
    /// Runs on its own session so it never touches a transaction held by
    /// another caller of the shared connection. Only a transaction the probe
    /// opened itself is rolled back.
    pub async fn probe_optional_tokenizer_available(&self) -> bool {
        let tokenizer = self.config.optional_tokenizer.trim();
        if tokenizer.is_empty() {
            return false;
        }
        let (create_sql, drop_sql) = tokenizer_probe_sql(&self.config.enhanced_engine, tokenizer);

        let session = self.conn.session();
        let mut began = false;
        let probe: Result<()> = async {
            session.begin().await?;
            began = true;
            session.execute(&create_sql, &[]).await?;
            session.execute(&drop_sql, &[]).await?;
            session.commit().await
        }
        .await;

        match probe {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!("Tokenizer {} not available: {}", tokenizer, e);
                if began {
                    if let Err(e) = session.rollback().await {
                        tracing::debug!("Probe rollback failed: {}", e);
                    }
                }
                false
            }
        }
    }
}
