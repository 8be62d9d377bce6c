//! Catalog and writer backed by the host database / 基于宿主数据库的列表与写入

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

use super::runner::{Catalog, CatalogPage, IndexWriter};
use crate::error::{Error, Result};
use crate::models::{ResourceRecord, ResourceType, SearchRow};
use crate::store::{quote_ident, Connection, Row, SqlValue};

const COUNT_SQL: &str = "SELECT COUNT(*) AS total FROM `resource` WHERE resource_type = ?";

// 全文 text 为所有值按顺序换行拼接
const PAGE_SQL: &str = "SELECT r.id, r.owner_id, r.is_public, r.title, \
     GROUP_CONCAT(v.value ORDER BY v.id SEPARATOR '\\n') AS text \
     FROM `resource` r \
     LEFT JOIN `value` v ON v.resource_id = r.id AND v.value IS NOT NULL \
     WHERE r.resource_type = ? \
     GROUP BY r.id, r.owner_id, r.is_public, r.title \
     ORDER BY r.id \
     LIMIT ? OFFSET ?";

fn optional_text(row: &Row, name: &str) -> Option<String> {
    row.get(name).filter(|v| !v.is_null()).map(SqlValue::to_text)
}

fn record_from_row(row: &Row) -> Option<ResourceRecord> {
    Some(ResourceRecord {
        id: row.get_i64("id")?,
        owner_id: row.get_i64("owner_id"),
        is_public: row.get_i64("is_public").unwrap_or(0) != 0,
        title: optional_text(row, "title"),
        text: optional_text(row, "text"),
    })
}

/// Paged listing over the host's `resource` / `value` tables / 资源列表
pub struct SqlCatalog {
    conn: Arc<dyn Connection>,
}

impl SqlCatalog {
    pub fn new(conn: Arc<dyn Connection>) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl Catalog for SqlCatalog {
    async fn list(&self, resource_type: ResourceType, page: u32, per_page: u32) -> Result<CatalogPage> {
        let listing_error = |e: Error| Error::Listing {
            resource_type: resource_type.api_name().to_string(),
            message: e.to_string(),
        };
        let class = SqlValue::from(resource_type.entity_class());

        let total = self
            .conn
            .query_scalar(COUNT_SQL, std::slice::from_ref(&class))
            .await
            .map_err(listing_error)?
            .and_then(|v| v.as_i64())
            .unwrap_or(0);

        let offset = i64::from(page.max(1) - 1) * i64::from(per_page);
        let params = [class, SqlValue::Int(i64::from(per_page)), SqlValue::Int(offset)];
        let rows = self.conn.query(PAGE_SQL, &params).await.map_err(listing_error)?;

        // 缺少 id 的行不能跳过，否则整页为空时会提前结束该类型
        let items = rows
            .iter()
            .map(|row| {
                record_from_row(row).ok_or_else(|| Error::Listing {
                    resource_type: resource_type.api_name().to_string(),
                    message: format!("row without a usable id on page {}", page),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(CatalogPage {
            items,
            total: total.max(0) as u64,
        })
    }
}

/// Buffers search rows and upserts them on flush / 索引写入器
pub struct SqlIndexWriter {
    conn: Arc<dyn Connection>,
    table: String,
    pending: Mutex<Vec<SearchRow>>,
}

impl SqlIndexWriter {
    pub fn new(conn: Arc<dyn Connection>, table: impl Into<String>) -> Self {
        Self {
            conn,
            table: table.into(),
            pending: Mutex::new(Vec::new()),
        }
    }

    fn upsert_sql(&self) -> String {
        format!(
            "INSERT INTO {} (`id`, `resource`, `owner_id`, `is_public`, `title`, `text`) \
             VALUES (?, ?, ?, ?, ?, ?) \
             ON DUPLICATE KEY UPDATE `owner_id` = VALUES(`owner_id`), `is_public` = VALUES(`is_public`), \
             `title` = VALUES(`title`), `text` = VALUES(`text`)",
            quote_ident(&self.table)
        )
    }

    async fn write_rows(&self, rows: &[SearchRow]) -> Result<()> {
        let sql = self.upsert_sql();
        for row in rows {
            let params = [
                SqlValue::Int(row.id),
                SqlValue::from(row.resource.as_str()),
                SqlValue::from(row.owner_id),
                SqlValue::from(row.is_public),
                SqlValue::from(row.title.clone()),
                SqlValue::from(row.text.clone()),
            ];
            self.conn.execute(&sql, &params).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl IndexWriter for SqlIndexWriter {
    async fn write_one(&self, record: &ResourceRecord, resource_type: ResourceType) -> Result<()> {
        self.pending.lock().push(SearchRow::from_record(record, resource_type));
        Ok(())
    }

    async fn flush_and_clear(&self) -> Result<()> {
        let rows: Vec<SearchRow> = std::mem::take(&mut *self.pending.lock());
        if rows.is_empty() {
            return Ok(());
        }

        self.conn.begin().await.map_err(|e| Error::Index(e.to_string()))?;
        if let Err(e) = self.write_rows(&rows).await {
            if let Err(rb) = self.conn.rollback().await {
                tracing::warn!("Rollback after failed index write failed: {}", rb);
            }
            return Err(Error::Index(e.to_string()));
        }
        self.conn.commit().await.map_err(|e| Error::Index(e.to_string()))?;
        tracing::debug!("Flushed {} rows into {}", rows.len(), self.table);
        Ok(())
    }
}
