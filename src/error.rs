//! Error types / 错误类型
//!
//! Detection and rewrite paths never surface these (they degrade to a
//! negative result or a skipped stage); migrations, reindex runs and the
//! admin surface do.

use thiserror::Error;

/// Result alias used across the crate / 统一返回类型
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Relational store error (query/DDL/transaction) / 数据库错误
    #[error("Database error: {0}")]
    Database(String),

    /// Engine switch could not be completed, not even by recreating the table / 迁移失败
    #[error("Migration failed: {0}")]
    Migration(String),

    /// Paged resource listing failed / 资源列表获取失败
    #[error("Listing failed for {resource_type}: {message}")]
    Listing {
        resource_type: String,
        message: String,
    },

    /// Writing a record into the search table failed / 索引写入失败
    #[error("Index write failed: {0}")]
    Index(String),

    /// Job record missing or not writable / 任务错误
    #[error("Job error: {0}")]
    Job(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        Error::Database(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Config(e.to_string())
    }
}
