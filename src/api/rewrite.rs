use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

use fulltext_strict::models::ResourceType;
use fulltext_strict::search::builder::{Join, Parameter};
use fulltext_strict::search::{SearchContext, SqlQueryBuilder, StageReport};

use crate::api::ApiResponse;
use crate::state::AppState;

fn default_resource() -> String {
    ResourceType::Items.api_name().to_string()
}

#[derive(Debug, Deserialize)]
pub struct RewriteRequest {
    /// API resource name / 资源类型
    #[serde(default = "default_resource")]
    pub resource: String,
    /// Search request parameters as the host received them / 搜索请求参数
    #[serde(default)]
    pub request: Map<String, Value>,
}

#[derive(Debug, Serialize)]
pub struct RewriteResponse {
    pub request: Map<String, Value>,
    pub joins: Vec<Join>,
    pub wheres: Vec<String>,
    pub parameters: Vec<Parameter>,
    pub stages: Vec<StageReport>,
}

/// POST /api/search/rewrite - 预览查询改写结果
pub async fn preview_rewrite(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RewriteRequest>,
) -> Json<ApiResponse<RewriteResponse>> {
    if ResourceType::from_api_name(&req.resource).is_none() {
        return Json(ApiResponse::error(&format!("Unknown resource type: {}", req.resource)));
    }

    let mut request = req.request;
    let mut builder = SqlQueryBuilder::new(req.resource);
    let stages = {
        let mut ctx = SearchContext::new(&mut request, &mut builder);
        state.pipeline.dispatch(&mut ctx).await
    };

    Json(ApiResponse::success(RewriteResponse {
        request,
        joins: builder.joins,
        wheres: builder.wheres,
        parameters: builder.parameters,
        stages,
    }))
}
