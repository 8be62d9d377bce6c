use std::sync::Arc;

use fulltext_strict::config::AppConfig;
use fulltext_strict::engine::{EngineDetector, Migrator};
use fulltext_strict::reindex::{job, ReindexRunner, ReindexScope, SqlCatalog, SqlIndexWriter};
use fulltext_strict::search::{strict_pipeline, Pipeline};
use fulltext_strict::store::Connection;
use fulltext_strict::task::{Job, JobManager};

/// Shared application state / 应用共享状态
pub struct AppState {
    pub conn: Arc<dyn Connection>,
    pub detector: EngineDetector,
    pub migrator: Migrator,
    pub pipeline: Pipeline,
    pub jobs: JobManager,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(conn: Arc<dyn Connection>, jobs: JobManager, config: AppConfig) -> Self {
        let migrator = Migrator::new(conn.clone(), config.engine.clone());
        let detector = migrator.detector().clone();
        let pipeline = strict_pipeline(detector.clone(), config.search.clone());
        Self {
            conn,
            detector,
            migrator,
            pipeline,
            jobs,
            config,
        }
    }

    /// 创建重建任务并在后台执行
    pub async fn spawn_reindex(&self, scope: ReindexScope) -> Job {
        let job = self.jobs.create_job(scope.kind()).await;

        // 写入使用独立会话，事务不与其他请求共用
        let session = self.conn.session();
        let table = self.config.engine.search_table.clone();
        let runner = ReindexRunner::new(
            session.clone(),
            Arc::new(SqlCatalog::new(self.conn.clone())),
            Arc::new(SqlIndexWriter::new(session, table.clone())),
            Arc::new(self.jobs.clone()),
            table,
            self.config.reindex.page_size,
        );

        let jobs = self.jobs.clone();
        let id = job.id.clone();
        tokio::spawn(async move {
            // 失败已记录在任务上
            if let Err(e) = job::execute(&runner, &jobs, scope, &id).await {
                tracing::debug!("Reindex job {} ended with error: {}", id, e);
            }
        });
        job
    }
}
