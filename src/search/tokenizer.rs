//! Query tokenizer and script classifier / 查询分词与文字类别判断
//!
//! - Quoted phrases stay whole, `\"` inside quotes is a literal quote / 引号短语整体保留
//! - Everything else is split on whitespace / 其余按空白切分
//! - Phrases come first in scan order, then plain words / 先短语后单词
//! - De-duplicated, then capped at [`MAX_TERMS`] / 去重后截断

use once_cell::sync::Lazy;
use regex::Regex;

/// Hard cap on terms per query / 每个查询的最大词数
pub const MAX_TERMS: usize = 20;

/// Han, kana and the iteration/prolongation marks 々 〆 ヶ ー / 中日文字符
static CJK_TERM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\p{Han}\p{Hiragana}\p{Katakana}\x{3005}\x{3006}\x{30F6}\x{30FC}]+$")
        .expect("CJK term pattern is valid")
});

/// Tokenize a raw query with the default cap / 对原始查询分词
pub fn tokenize(raw: &str) -> Vec<String> {
    tokenize_with_limit(raw, MAX_TERMS)
}

/// Tokenize a raw query keeping at most `limit` terms / 分词并限制词数
pub fn tokenize_with_limit(raw: &str, limit: usize) -> Vec<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Vec::new();
    }

    let mut phrases: Vec<String> = Vec::new();
    let mut unquoted = String::with_capacity(raw.len());
    let mut buf = String::new();
    let mut in_quotes = false;
    let mut escape = false;

    for ch in raw.chars() {
        if in_quotes {
            if escape {
                buf.push(ch);
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_quotes = false;
                let phrase = buf.trim();
                if !phrase.is_empty() {
                    phrases.push(phrase.to_string());
                }
                buf.clear();
                unquoted.push(' ');
            } else {
                buf.push(ch);
            }
            continue;
        }

        if ch == '"' {
            in_quotes = true;
            // 开引号也补空格，避免前后单词粘连
            unquoted.push(' ');
        } else {
            unquoted.push(ch);
        }
    }
    // An unterminated phrase in `buf` is dropped

    let mut terms: Vec<String> = Vec::new();
    let words = unquoted.split_whitespace().map(str::to_string);
    for term in phrases.into_iter().chain(words) {
        if !terms.contains(&term) {
            terms.push(term);
        }
    }
    terms.truncate(limit);
    terms
}

/// True when the term is one contiguous run of CJK characters / 是否为单个连续的中日文词
///
/// A term containing whitespace (e.g. a quoted phrase) never qualifies.
pub fn is_single_cjk_term(term: &str) -> bool {
    !term.is_empty() && !term.chars().any(char::is_whitespace) && CJK_TERM.is_match(term)
}
