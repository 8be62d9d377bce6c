//! Search-time query rewriting / 搜索时的查询改写
//!
//! Only rewrites; never executes the search itself:
//! - tokenizer: raw query -> ordered, de-duplicated terms
//! - dialect: terms + engine state -> matching strategy and condition
//! - interceptor: staged pipeline around the host's query building
//! - builder: the host query seam

pub mod builder;
pub mod dialect;
pub mod interceptor;
pub mod tokenizer;

pub use builder::{QueryBuilder, SqlQueryBuilder};
pub use dialect::{decide, Logic, RewriteDecision, Strategy, TermMatch};
pub use interceptor::{strict_pipeline, FnStage, Outcome, Pipeline, SearchContext, Stage, StageReport};
pub use tokenizer::{is_single_cjk_term, tokenize, MAX_TERMS};
