//! Run a reindex as a tracked background job / 以后台任务方式执行重建

use super::runner::{ReindexReport, ReindexRunner, ReindexScope};
use crate::error::Result;
use crate::task::{JobId, JobManager};

/// Drive one run and record the final status / 执行并记录最终状态
///
/// Stopped runs end as `stopped`, errors as `failed` with the message kept
/// on the job. A rerun of the same scope starts over from deletion.
pub async fn execute(
    runner: &ReindexRunner,
    jobs: &JobManager,
    scope: ReindexScope,
    id: &JobId,
) -> Result<ReindexReport> {
    jobs.start_job(id).await;
    match runner.run(scope, id).await {
        Ok(report) if report.stopped => {
            jobs.stop_job(id).await;
            tracing::info!("Reindex job {} stopped after {} records", id, report.processed);
            Ok(report)
        }
        Ok(report) => {
            jobs.complete_job(id).await;
            tracing::info!(
                "Reindex job {} completed: {} / {} records",
                id,
                report.processed,
                report.total
            );
            Ok(report)
        }
        Err(e) => {
            tracing::error!("Reindex job {} failed: {}", id, e);
            jobs.fail_job(id, &e.to_string()).await;
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResourceType;
    use crate::reindex::{SqlCatalog, SqlIndexWriter};
    use crate::store::mock::MockConnection;
    use crate::task::JobStatus;
    use std::sync::Arc;

    fn runner(conn: &Arc<MockConnection>, jobs: &JobManager) -> ReindexRunner {
        ReindexRunner::new(
            conn.clone(),
            Arc::new(SqlCatalog::new(conn.clone())),
            Arc::new(SqlIndexWriter::new(conn.clone(), "fulltext_search")),
            Arc::new(jobs.clone()),
            "fulltext_search",
            100,
        )
    }

    #[tokio::test]
    async fn test_completed_job() {
        let conn = Arc::new(MockConnection::baseline());
        conn.seed_resources(ResourceType::Media, 1, 2);
        let jobs = JobManager::new();
        let job = jobs.create_job(ReindexScope::MediaOnly.kind()).await;

        let report = execute(&runner(&conn, &jobs), &jobs, ReindexScope::MediaOnly, &job.id)
            .await
            .unwrap();
        assert_eq!(report.processed, 2);
        assert_eq!(jobs.get_job(&job.id).await.unwrap().status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_stop_requested_before_start() {
        let conn = Arc::new(MockConnection::baseline());
        conn.seed_resources(ResourceType::Items, 1, 2);
        let jobs = JobManager::new();
        let job = jobs.create_job(ReindexScope::ItemsOnly.kind()).await;
        assert!(jobs.request_stop(&job.id).await);

        let report = execute(&runner(&conn, &jobs), &jobs, ReindexScope::ItemsOnly, &job.id)
            .await
            .unwrap();
        assert!(report.stopped);
        assert_eq!(report.processed, 0);
        let stored = jobs.get_job(&job.id).await.unwrap();
        assert_eq!(stored.status, JobStatus::Stopped);
        assert!(stored
            .log
            .contains("Reindex items: stopping (processed=0/2, page=1, resource=items)"));
    }

    #[tokio::test]
    async fn test_failed_job_keeps_error() {
        let conn = Arc::new(MockConnection::baseline());
        conn.update(|s| s.listing_fails = true);
        let jobs = JobManager::new();
        let job = jobs.create_job(ReindexScope::ItemsOnly.kind()).await;

        assert!(execute(&runner(&conn, &jobs), &jobs, ReindexScope::ItemsOnly, &job.id)
            .await
            .is_err());
        let stored = jobs.get_job(&job.id).await.unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert!(stored.error.unwrap().contains("items"));
        assert!(stored.log.starts_with("Reindex items: start (total=0)"));
    }
}
