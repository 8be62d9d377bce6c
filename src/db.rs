use anyhow::Result;

use crate::store::Connection;

const JOBS_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS `fulltext_jobs` (
        id VARCHAR(36) NOT NULL PRIMARY KEY,
        kind VARCHAR(64) NOT NULL,
        status VARCHAR(32) NOT NULL,
        stop_requested TINYINT(1) NOT NULL DEFAULT 0,
        log LONGTEXT NULL,
        error TEXT NULL,
        created VARCHAR(40) NOT NULL,
        started VARCHAR(40) NULL,
        ended VARCHAR(40) NULL,
        KEY idx_fulltext_jobs_created (created)
    ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4
"#;

/// Run database migrations / 运行数据库迁移
pub async fn run_migrations(conn: &dyn Connection) -> Result<()> {
    conn.execute(JOBS_TABLE_SQL, &[]).await?;
    tracing::info!("Database migration completed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::mock::MockConnection;

    #[tokio::test]
    async fn test_creates_jobs_table() {
        let conn = MockConnection::baseline();
        run_migrations(&conn).await.unwrap();
        let statements = conn.statements();
        assert_eq!(statements.len(), 1);
        assert!(statements[0].contains("CREATE TABLE IF NOT EXISTS `fulltext_jobs`"));
        assert!(statements[0].contains("stop_requested TINYINT(1)"));

        // 重复执行不报错
        run_migrations(&conn).await.unwrap();
    }
}
