//! Dialect selection / 匹配方言选择
//!
//! Picks how each term is matched and renders the grouped condition:
//!
//! | engine        | term            | condition                                        |
//! |---------------|-----------------|--------------------------------------------------|
//! | effective     | any             | `MATCH(a.title, a.text) AGAINST (p) > 0`         |
//! | not effective | single CJK run  | `(a.title LIKE p OR a.text LIKE p)`, p = `%t%`   |
//! | not effective | other           | `MATCH(...) AGAINST (p IN BOOLEAN MODE) > 0`     |
//!
//! On the enhanced engine a single term is left to the host. On the baseline
//! engine the raw query is always diverted, so even one term is filtered here.

use serde::Serialize;

use super::builder::QueryBuilder;
use super::tokenizer::is_single_cjk_term;

/// How terms are combined / 词之间的逻辑
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Logic {
    #[default]
    And,
    Or,
}

impl Logic {
    /// `or` (any case) selects OR, anything else AND / 解析逻辑参数
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("or") {
            Logic::Or
        } else {
            Logic::And
        }
    }

    fn glue(self) -> &'static str {
        match self {
            Logic::And => " AND ",
            Logic::Or => " OR ",
        }
    }
}

/// Matching strategy / 匹配策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Leave the query to the host's own full-text path / 交给宿主处理
    PassThrough,
    /// Natural-mode MATCH per term on the enhanced engine / 增强引擎自然模式
    StrictNaturalBoolean,
    /// Boolean-mode MATCH per term (LIKE for CJK terms) / 布尔模式
    StrictBooleanMode,
    /// Every term is a CJK run matched by substring / 全部为中日文子串匹配
    CjkSubstring,
}

/// Per-term condition / 单个词的匹配方式
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", content = "term", rename_all = "snake_case")]
pub enum TermMatch {
    Natural(String),
    Boolean(String),
    Substring(String),
}

impl TermMatch {
    fn render(&self, qb: &mut dyn QueryBuilder, alias: &str) -> String {
        match self {
            TermMatch::Natural(term) => {
                let p = qb.create_named_parameter(term);
                format!("MATCH({a}.title, {a}.text) AGAINST ({p}) > 0", a = alias, p = p)
            }
            TermMatch::Boolean(term) => {
                let p = qb.create_named_parameter(term);
                format!(
                    "MATCH({a}.title, {a}.text) AGAINST ({p} IN BOOLEAN MODE) > 0",
                    a = alias,
                    p = p
                )
            }
            TermMatch::Substring(term) => {
                let p = qb.create_named_parameter(&format!("%{}%", term));
                format!("({a}.title LIKE {p} OR {a}.text LIKE {p})", a = alias, p = p)
            }
        }
    }
}

/// Outcome of dialect selection for one request / 单次请求的改写决定
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RewriteDecision {
    /// Move the raw query away from the host's natural-language path / 是否转移原始查询
    pub divert: bool,
    pub strategy: Strategy,
    pub logic: Logic,
    pub matches: Vec<TermMatch>,
    /// Set once rendered / 渲染后填充
    pub join_alias: Option<String>,
    pub condition_fragment: Option<String>,
}

impl RewriteDecision {
    fn pass_through(divert: bool, logic: Logic) -> Self {
        Self {
            divert,
            strategy: Strategy::PassThrough,
            logic,
            matches: Vec::new(),
            join_alias: None,
            condition_fragment: None,
        }
    }

    pub fn is_pass_through(&self) -> bool {
        self.matches.is_empty()
    }

    /// Join the search table and add the grouped condition / 注入连接与条件
    ///
    /// Does nothing when there is nothing to match.
    pub fn render(&mut self, qb: &mut dyn QueryBuilder, entity: &str, root_alias: &str) {
        if self.matches.is_empty() {
            return;
        }
        let alias = qb.create_alias();
        let resource = qb.resource_type_name();
        let resource_param = qb.create_named_parameter(&resource);
        let join_condition = format!(
            "{a}.id = {root}.id AND {a}.resource = {p}",
            a = alias,
            root = root_alias,
            p = resource_param
        );
        qb.inner_join(entity, &alias, &join_condition);

        let parts: Vec<String> = self.matches.iter().map(|m| m.render(qb, &alias)).collect();
        let fragment = format!("({})", parts.join(self.logic.glue()));
        qb.and_where(&fragment);

        self.join_alias = Some(alias);
        self.condition_fragment = Some(fragment);
    }
}

/// Always when the enhanced engine is not effective, otherwise only for
/// multi-term queries / 是否需要转移
fn should_divert(term_count: usize, effective: bool) -> bool {
    term_count > 0 && (!effective || term_count >= 2)
}

/// Decide a strategy for the term list / 为词列表选择策略
///
/// Every stage goes through here. No terms pass through; one term passes
/// through only while the enhanced engine is effective.
pub fn decide(terms: &[String], effective: bool, logic: Logic) -> RewriteDecision {
    let divert = should_divert(terms.len(), effective);
    if terms.is_empty() || (effective && terms.len() == 1) {
        return RewriteDecision::pass_through(divert, logic);
    }
    if effective {
        return RewriteDecision {
            divert,
            strategy: Strategy::StrictNaturalBoolean,
            logic,
            matches: terms.iter().cloned().map(TermMatch::Natural).collect(),
            join_alias: None,
            condition_fragment: None,
        };
    }
    decide_baseline(terms, logic)
}

fn decide_baseline(terms: &[String], logic: Logic) -> RewriteDecision {
    let matches: Vec<TermMatch> = terms
        .iter()
        .map(|t| {
            if is_single_cjk_term(t) {
                TermMatch::Substring(t.clone())
            } else {
                TermMatch::Boolean(t.clone())
            }
        })
        .collect();
    let strategy = if matches.iter().all(|m| matches!(m, TermMatch::Substring(_))) {
        Strategy::CjkSubstring
    } else {
        Strategy::StrictBooleanMode
    };
    RewriteDecision {
        divert: true,
        strategy,
        logic,
        matches,
        join_alias: None,
        condition_fragment: None,
    }
}
