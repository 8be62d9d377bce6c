//! sqlx MySQL/MariaDB implementation of [`Connection`] / MySQL 连接实现

use async_trait::async_trait;
use sqlx::mysql::{MySqlArguments, MySqlPoolOptions, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, Executor, MySql, Pool, Row as _, Transaction};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{Connection, Row, SqlValue};
use crate::error::{Error, Result};

/// Pool-backed store; `begin()` pins one connection until commit/rollback / 连接池存储
pub struct MySqlStore {
    pool: Pool<MySql>,
    tx: Mutex<Option<Transaction<'static, MySql>>>,
}

impl MySqlStore {
    pub fn new(pool: Pool<MySql>) -> Self {
        Self {
            pool,
            tx: Mutex::new(None),
        }
    }

    /// Connect with a small pool / 建立连接池
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        tracing::info!("Connected to search database (pool size {})", max_connections);
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &Pool<MySql> {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn bind_params<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    params: &'q [SqlValue],
) -> Query<'q, MySql, MySqlArguments> {
    for param in params {
        query = match param {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Int(v) => query.bind(*v),
            SqlValue::Float(v) => query.bind(*v),
            SqlValue::Text(s) => query.bind(s.as_str()),
        };
    }
    query
}

/// Decode a column without knowing its type up front / 按类型逐一尝试解码
fn decode_value(row: &MySqlRow, idx: usize) -> SqlValue {
    if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
        return v.map(SqlValue::Int).unwrap_or(SqlValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<u64>, _>(idx) {
        return v
            .map(|n| SqlValue::Int(n.min(i64::MAX as u64) as i64))
            .unwrap_or(SqlValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
        return v.map(SqlValue::Float).unwrap_or(SqlValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
        return v.map(SqlValue::Text).unwrap_or(SqlValue::Null);
    }
    // information_schema returns some columns as binary strings
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(idx) {
        return v
            .map(|b| SqlValue::Text(String::from_utf8_lossy(&b).into_owned()))
            .unwrap_or(SqlValue::Null);
    }
    SqlValue::Null
}

fn decode_row(row: &MySqlRow) -> Row {
    let columns = row
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, col)| (col.name().to_string(), decode_value(row, idx)))
        .collect();
    Row::new(columns)
}

async fn run_execute<'e, E>(executor: E, sql: &str, params: &[SqlValue]) -> Result<u64>
where
    E: Executor<'e, Database = MySql>,
{
    // 无参数时走文本协议，DDL 不需要预处理
    let result = if params.is_empty() {
        executor.execute(sql).await?
    } else {
        bind_params(sqlx::query(sql), params).execute(executor).await?
    };
    Ok(result.rows_affected())
}

async fn run_query<'e, E>(executor: E, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>>
where
    E: Executor<'e, Database = MySql>,
{
    let rows = if params.is_empty() {
        executor.fetch_all(sql).await?
    } else {
        bind_params(sqlx::query(sql), params).fetch_all(executor).await?
    };
    Ok(rows.iter().map(decode_row).collect())
}

#[async_trait]
impl Connection for MySqlStore {
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        let mut guard = self.tx.lock().await;
        if let Some(tx) = guard.as_mut() {
            return run_execute(&mut **tx, sql, params).await;
        }
        drop(guard);
        run_execute(&self.pool, sql, params).await
    }

    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
        let mut guard = self.tx.lock().await;
        if let Some(tx) = guard.as_mut() {
            return run_query(&mut **tx, sql, params).await;
        }
        drop(guard);
        run_query(&self.pool, sql, params).await
    }

    async fn begin(&self) -> Result<()> {
        let mut guard = self.tx.lock().await;
        if guard.is_some() {
            return Err(Error::Database("transaction already active".to_string()));
        }
        *guard = Some(self.pool.begin().await?);
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        let tx = self.tx.lock().await.take();
        match tx {
            Some(tx) => Ok(tx.commit().await?),
            None => Err(Error::Database("no active transaction".to_string())),
        }
    }

    async fn rollback(&self) -> Result<()> {
        let tx = self.tx.lock().await.take();
        match tx {
            Some(tx) => Ok(tx.rollback().await?),
            None => Ok(()),
        }
    }

    async fn in_transaction(&self) -> bool {
        self.tx.lock().await.is_some()
    }

    fn session(&self) -> Arc<dyn Connection> {
        Arc::new(MySqlStore::new(self.pool.clone()))
    }
}
