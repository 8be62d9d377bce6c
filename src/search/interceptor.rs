//! Query interception pipeline / 查询拦截管线
//!
//! Stages run in descending priority order around the host's own query
//! building:
//!
//! | stage           | priority | role                                              |
//! |-----------------|----------|---------------------------------------------------|
//! | divert          | 10000    | move the raw query off the host's natural path    |
//! | strict-enhanced | -100     | natural MATCH per term, enhanced engine only      |
//! | strict-fallback | -120     | boolean MATCH / CJK LIKE per term, baseline only  |
//!
//! A stage error never reaches the host; it is turned into [`Outcome::Skip`].

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

use super::builder::QueryBuilder;
use super::dialect::{decide, Logic, RewriteDecision};
use super::tokenizer::tokenize_with_limit;
use crate::config::SearchConfig;
use crate::engine::EngineDetector;
use crate::error::Result;

pub const DIVERT_PRIORITY: i32 = 10000;
pub const STRICT_ENHANCED_PRIORITY: i32 = -100;
pub const STRICT_FALLBACK_PRIORITY: i32 = -120;

/// Per-request state handed to each stage / 单次请求上下文
pub struct SearchContext<'a> {
    /// Request content, keyed like the host's query parameters / 请求参数
    pub request: &'a mut Map<String, Value>,
    pub builder: &'a mut dyn QueryBuilder,
}

impl<'a> SearchContext<'a> {
    pub fn new(request: &'a mut Map<String, Value>, builder: &'a mut dyn QueryBuilder) -> Self {
        Self { request, builder }
    }

    /// First present key wins, even when its value is blank / 按顺序读取第一个存在的键
    fn read_first<S: AsRef<str>>(&self, keys: &[S]) -> String {
        keys.iter()
            .find_map(|k| self.request.get(k.as_ref()).filter(|v| !v.is_null()))
            .map(value_text)
            .unwrap_or_default()
            .trim()
            .to_string()
    }

    fn logic(&self, config: &SearchConfig) -> Logic {
        Logic::parse(&self.read_first(&[&config.logic_key, &config.fallback_logic_key]))
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(true) => "1".to_string(),
        _ => String::new(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum Outcome {
    /// Request or query was modified / 已修改
    Applied,
    /// Stage ran and had nothing to do / 无需处理
    Unchanged,
    /// Stage did not apply / 跳过
    Skip(String),
}

#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &str;

    fn priority(&self) -> i32;

    async fn apply(&self, ctx: &mut SearchContext<'_>) -> Result<Outcome>;
}

type StageFn = dyn Fn(&mut SearchContext<'_>) -> Result<Outcome> + Send + Sync;

/// Synchronous stage from a closure, for host-registered hooks / 闭包阶段
pub struct FnStage {
    name: String,
    priority: i32,
    f: Box<StageFn>,
}

impl FnStage {
    pub fn new<F>(name: impl Into<String>, priority: i32, f: F) -> Self
    where
        F: Fn(&mut SearchContext<'_>) -> Result<Outcome> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            priority,
            f: Box::new(f),
        }
    }
}

#[async_trait]
impl Stage for FnStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    async fn apply(&self, ctx: &mut SearchContext<'_>) -> Result<Outcome> {
        (self.f)(ctx)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub stage: String,
    pub priority: i32,
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// Ordered set of stages with a single dispatcher / 阶段管线
#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stage; equal priorities keep registration order / 注册阶段
    pub fn register(&mut self, stage: Arc<dyn Stage>) -> &mut Self {
        self.stages.push(stage);
        self.stages.sort_by(|a, b| b.priority().cmp(&a.priority()));
        self
    }

    pub fn stage_names(&self) -> Vec<String> {
        self.stages.iter().map(|s| s.name().to_string()).collect()
    }

    /// Run every stage in order / 依次执行所有阶段
    pub async fn dispatch(&self, ctx: &mut SearchContext<'_>) -> Vec<StageReport> {
        let mut reports = Vec::with_capacity(self.stages.len());
        for stage in &self.stages {
            let outcome = match stage.apply(ctx).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::debug!("Search stage {} skipped: {}", stage.name(), e);
                    Outcome::Skip(e.to_string())
                }
            };
            reports.push(StageReport {
                stage: stage.name().to_string(),
                priority: stage.priority(),
                outcome,
            });
        }
        reports
    }
}

/// Pipeline with the three strict-search stages / 构建严格搜索管线
pub fn strict_pipeline(detector: EngineDetector, config: SearchConfig) -> Pipeline {
    let mut pipeline = Pipeline::new();
    pipeline
        .register(Arc::new(DivertStage::new(detector.clone(), config.clone())))
        .register(Arc::new(StrictEnhancedStage::new(detector.clone(), config.clone())))
        .register(Arc::new(StrictFallbackStage::new(detector, config)));
    pipeline
}

/// Moves the raw query to the private key / 转移原始查询
pub struct DivertStage {
    detector: EngineDetector,
    config: SearchConfig,
}

impl DivertStage {
    pub fn new(detector: EngineDetector, config: SearchConfig) -> Self {
        Self { detector, config }
    }
}

#[async_trait]
impl Stage for DivertStage {
    fn name(&self) -> &str {
        "divert"
    }

    fn priority(&self) -> i32 {
        DIVERT_PRIORITY
    }

    async fn apply(&self, ctx: &mut SearchContext<'_>) -> Result<Outcome> {
        let raw = ctx.read_first(&[&self.config.query_key]);
        if raw.is_empty() {
            return Ok(Outcome::Unchanged);
        }
        let terms = tokenize_with_limit(&raw, self.config.max_terms);
        if terms.is_empty() {
            return Ok(Outcome::Unchanged);
        }
        let effective = self.detector.is_effective().await;
        if !decide(&terms, effective, Logic::default()).divert {
            return Ok(Outcome::Unchanged);
        }
        if let Some(value) = ctx.request.remove(&self.config.query_key) {
            ctx.request.insert(self.config.private_key.clone(), value);
        }
        Ok(Outcome::Applied)
    }
}

/// Strict AND/OR on the enhanced engine / 增强引擎下的严格逻辑
pub struct StrictEnhancedStage {
    detector: EngineDetector,
    config: SearchConfig,
}

impl StrictEnhancedStage {
    pub fn new(detector: EngineDetector, config: SearchConfig) -> Self {
        Self { detector, config }
    }
}

#[async_trait]
impl Stage for StrictEnhancedStage {
    fn name(&self) -> &str {
        "strict-enhanced"
    }

    fn priority(&self) -> i32 {
        STRICT_ENHANCED_PRIORITY
    }

    async fn apply(&self, ctx: &mut SearchContext<'_>) -> Result<Outcome> {
        if !self.detector.is_effective().await {
            return Ok(Outcome::Skip("enhanced engine not effective".to_string()));
        }
        let raw = ctx.read_first(&[&self.config.private_key, &self.config.query_key]);
        if raw.is_empty() {
            return Ok(Outcome::Unchanged);
        }
        let terms = tokenize_with_limit(&raw, self.config.max_terms);
        let mut decision = decide(&terms, true, ctx.logic(&self.config));
        Ok(render(&mut decision, ctx, &self.detector, &self.config))
    }
}

/// Strict AND/OR on the baseline engine / 基础引擎下的严格逻辑
pub struct StrictFallbackStage {
    detector: EngineDetector,
    config: SearchConfig,
}

impl StrictFallbackStage {
    pub fn new(detector: EngineDetector, config: SearchConfig) -> Self {
        Self { detector, config }
    }
}

#[async_trait]
impl Stage for StrictFallbackStage {
    fn name(&self) -> &str {
        "strict-fallback"
    }

    fn priority(&self) -> i32 {
        STRICT_FALLBACK_PRIORITY
    }

    async fn apply(&self, ctx: &mut SearchContext<'_>) -> Result<Outcome> {
        if self.detector.is_effective().await {
            return Ok(Outcome::Skip("enhanced engine is effective".to_string()));
        }
        // 表仍是增强引擎但插件未启用时不能访问该表
        let engine = self
            .detector
            .try_table_engine(&self.detector.config().search_table)
            .await?;
        if self.detector.is_enhanced_engine(&engine) {
            return Ok(Outcome::Skip("table engine without active plugin".to_string()));
        }

        let raw = ctx.read_first(&[
            &self.config.private_key,
            &self.config.query_key,
            &self.config.generic_key,
        ]);
        if raw.is_empty() {
            return Ok(Outcome::Unchanged);
        }
        let terms = tokenize_with_limit(&raw, self.config.max_terms);
        let mut decision = decide(&terms, false, ctx.logic(&self.config));
        Ok(render(&mut decision, ctx, &self.detector, &self.config))
    }
}

fn render(
    decision: &mut RewriteDecision,
    ctx: &mut SearchContext<'_>,
    detector: &EngineDetector,
    config: &SearchConfig,
) -> Outcome {
    if decision.is_pass_through() {
        return Outcome::Unchanged;
    }
    decision.render(
        ctx.builder,
        &detector.config().search_table,
        &config.root_alias,
    );
    tracing::debug!(
        "Search rewritten with {:?}: {}",
        decision.strategy,
        decision.condition_fragment.as_deref().unwrap_or_default()
    );
    Outcome::Applied
}
