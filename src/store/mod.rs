//! Relational store access / 关系数据库访问
//!
//! Everything that talks to the database goes through [`Connection`]:
//! engine detection, DDL, the reindex runner and the job log. The sqlx
//! MySQL pool implements it in [`mysql`]; tests use a scripted in-memory
//! store.

pub mod mysql;

#[cfg(test)]
pub mod mock;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;

pub use mysql::MySqlStore;

/// Bound parameter / 绑定参数
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl SqlValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Int(v) => Some(*v),
            SqlValue::Float(v) => Some(*v as i64),
            SqlValue::Text(s) => s.trim().parse().ok(),
            SqlValue::Null => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Render as text; NULL becomes empty / 转为字符串
    pub fn to_text(&self) -> String {
        match self {
            SqlValue::Null => String::new(),
            SqlValue::Int(v) => v.to_string(),
            SqlValue::Float(v) => v.to_string(),
            SqlValue::Text(s) => s.clone(),
        }
    }
}

impl From<&str> for SqlValue {
    fn from(s: &str) -> Self {
        SqlValue::Text(s.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(s: String) -> Self {
        SqlValue::Text(s)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Int(if v { 1 } else { 0 })
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// One result row, columns in select order / 查询结果行
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Row {
    columns: Vec<(String, SqlValue)>,
}

impl Row {
    pub fn new(columns: Vec<(String, SqlValue)>) -> Self {
        Self { columns }
    }

    /// Case-insensitive column lookup / 按列名获取（忽略大小写）
    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|(col, _)| col.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    pub fn get_text(&self, name: &str) -> String {
        self.get(name).map(SqlValue::to_text).unwrap_or_default()
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(SqlValue::as_i64)
    }

    pub fn first(&self) -> Option<&SqlValue> {
        self.columns.first().map(|(_, v)| v)
    }
}

/// Relational execute/query interface / 关系数据库执行接口
#[async_trait]
pub trait Connection: Send + Sync {
    /// Execute a statement, returns affected rows / 执行语句
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64>;

    /// Run a query and collect all rows / 查询
    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>>;

    /// First column of the first row / 查询单个值
    async fn query_scalar(&self, sql: &str, params: &[SqlValue]) -> Result<Option<SqlValue>> {
        let rows = self.query(sql, params).await?;
        Ok(rows
            .first()
            .and_then(|r| r.first().cloned())
            .filter(|v| !v.is_null()))
    }

    async fn begin(&self) -> Result<()>;

    async fn commit(&self) -> Result<()>;

    async fn rollback(&self) -> Result<()>;

    async fn in_transaction(&self) -> bool;

    /// Handle on the same store with its own transaction slot / 独立事务的会话
    fn session(&self) -> Arc<dyn Connection>;
}

/// Quote an identifier with backticks / 标识符加反引号
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}
