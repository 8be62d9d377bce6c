use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use fulltext_strict::diagnostics::{self, Diagnostics};
use fulltext_strict::engine::MigrationOutcome;
use fulltext_strict::reindex::ReindexScope;
use fulltext_strict::task::{JobId, JobSummary};

use crate::api::ApiResponse;
use crate::state::AppState;

/// 任务列表的最大长度
const JOB_LIST_LIMIT: usize = 50;

#[derive(Debug, Clone, Serialize)]
pub struct EngineSwitchResult {
    pub outcome: MigrationOutcome,
    pub needs_reindex: bool,
}

/// GET /api/admin/fulltext/diagnostics - 诊断信息
pub async fn get_diagnostics(State(state): State<Arc<AppState>>) -> Json<ApiResponse<Diagnostics>> {
    let mut report = diagnostics::collect(&state.detector, state.conn.as_ref(), &state.jobs).await;
    report.build_time = Some(env!("BUILD_TIME").to_string());
    Json(ApiResponse::success(report))
}

async fn start_reindex(state: &AppState, scope: ReindexScope) -> Json<ApiResponse<JobSummary>> {
    let job = state.spawn_reindex(scope).await;
    tracing::info!("Dispatched reindex job {} ({})", job.id, scope.label());
    Json(ApiResponse::success_with(
        &format!("Reindex job dispatched ({})", scope.label()),
        JobSummary::from(&job),
    ))
}

/// POST /api/admin/fulltext/reindex/items
pub async fn reindex_items(State(state): State<Arc<AppState>>) -> Json<ApiResponse<JobSummary>> {
    start_reindex(&state, ReindexScope::ItemsOnly).await
}

/// POST /api/admin/fulltext/reindex/items-sets
pub async fn reindex_items_and_sets(State(state): State<Arc<AppState>>) -> Json<ApiResponse<JobSummary>> {
    start_reindex(&state, ReindexScope::ItemsAndSets).await
}

/// POST /api/admin/fulltext/reindex/item-sets
pub async fn reindex_item_sets(State(state): State<Arc<AppState>>) -> Json<ApiResponse<JobSummary>> {
    start_reindex(&state, ReindexScope::ItemSetsOnly).await
}

/// POST /api/admin/fulltext/reindex/media
pub async fn reindex_media(State(state): State<Arc<AppState>>) -> Json<ApiResponse<JobSummary>> {
    start_reindex(&state, ReindexScope::MediaOnly).await
}

/// GET /api/admin/fulltext/jobs - 最近的任务
pub async fn list_jobs(State(state): State<Arc<AppState>>) -> Json<ApiResponse<Vec<JobSummary>>> {
    Json(ApiResponse::success(state.jobs.recent_jobs(JOB_LIST_LIMIT).await))
}

/// POST /api/admin/fulltext/jobs/:id/stop - 请求停止任务
pub async fn stop_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Json<ApiResponse<bool>> {
    let id = JobId::from(id);
    if state.jobs.request_stop(&id).await {
        Json(ApiResponse::success_with("Stop requested", true))
    } else {
        Json(ApiResponse::error(&format!("Job {} is not running", id)))
    }
}

fn switch_result(outcome: MigrationOutcome, done: &str) -> Json<ApiResponse<EngineSwitchResult>> {
    let message = match outcome {
        MigrationOutcome::AlreadyInState => format!("{} Nothing to do.", done),
        _ => format!("{} Please run reindex jobs.", done),
    };
    Json(ApiResponse::success_with(
        &message,
        EngineSwitchResult {
            outcome,
            needs_reindex: outcome.needs_reindex(),
        },
    ))
}

/// POST /api/admin/fulltext/engine/enhanced - 切换到增强引擎
pub async fn switch_to_enhanced(State(state): State<Arc<AppState>>) -> Json<ApiResponse<EngineSwitchResult>> {
    let engine = &state.config.engine;
    if !state.detector.check_plugin_active().await {
        return Json(ApiResponse::error(&format!(
            "{} plugin is not active. Cannot switch {}.",
            engine.enhanced_engine, engine.search_table
        )));
    }
    match state.migrator.switch_to_enhanced().await {
        Ok(outcome) => switch_result(
            outcome,
            &format!("Switched {} to {}.", engine.search_table, engine.enhanced_engine),
        ),
        Err(e) => {
            tracing::error!("Switching to {} failed: {}", engine.enhanced_engine, e);
            Json(ApiResponse::error(&e.to_string()))
        }
    }
}

/// POST /api/admin/fulltext/engine/baseline - 切换回基础引擎
pub async fn switch_to_baseline(State(state): State<Arc<AppState>>) -> Json<ApiResponse<EngineSwitchResult>> {
    let engine = &state.config.engine;
    match state.migrator.switch_to_baseline().await {
        Ok(outcome) => switch_result(
            outcome,
            &format!("Switched {} to {}.", engine.search_table, engine.baseline_engine),
        ),
        Err(e) => {
            tracing::error!("Switching to {} failed: {}", engine.baseline_engine, e);
            Json(ApiResponse::error(&e.to_string()))
        }
    }
}
