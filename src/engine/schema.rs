//! Canonical search table definition and DDL helpers / 搜索表定义

use crate::store::quote_ident;

/// Column holding the owning user / 所有者列
pub const OWNER_COLUMN: &str = "owner_id";

/// Columns covered by the required full-text index / 全文索引列
pub const FULLTEXT_COLUMNS: [&str; 2] = ["title", "text"];

/// Throwaway table used by the tokenizer probe / 分词器探测表
pub const TOKENIZER_PROBE_TABLE: &str = "__fulltext_tokenizer_probe";

/// Quote a value as a SQL string literal / 转为 SQL 字符串字面量
pub fn sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
}

/// Canonical `CREATE TABLE` for the search table / 搜索表建表语句
///
/// The owner foreign key is not part of it; callers add it separately where
/// the engine supports one.
pub fn create_table_sql(table: &str, engine: &str, comment: Option<&str>) -> String {
    let mut sql = format!(
        "CREATE TABLE {table} (
  `id` INT NOT NULL,
  `resource` VARCHAR(190) CHARACTER SET utf8mb4 COLLATE utf8mb4_unicode_ci NOT NULL,
  `owner_id` INT DEFAULT NULL,
  `is_public` TINYINT(1) NOT NULL,
  `title` LONGTEXT CHARACTER SET utf8mb4 COLLATE utf8mb4_unicode_ci,
  `text` LONGTEXT CHARACTER SET utf8mb4 COLLATE utf8mb4_unicode_ci,
  PRIMARY KEY (`id`, `resource`),
  KEY `IDX_AA31FE4A7E3C61F9` (`owner_id`),
  FULLTEXT KEY `IDX_AA31FE4A2B36786B3B8BA7C7` (`title`, `text`)
) ENGINE={engine} DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci",
        table = quote_ident(table),
        engine = engine,
    );
    if let Some(comment) = comment {
        sql.push_str(" COMMENT=");
        sql.push_str(&sql_literal(comment));
    }
    sql
}

/// `ALTER TABLE ... ENGINE=... COMMENT=...` / 切换引擎语句
pub fn alter_engine_sql(table: &str, engine: &str, comment: &str) -> String {
    format!(
        "ALTER TABLE {} ENGINE={} COMMENT={}",
        quote_ident(table),
        engine,
        sql_literal(comment)
    )
}

pub fn drop_table_sql(table: &str) -> String {
    format!("DROP TABLE IF EXISTS {}", quote_ident(table))
}

pub fn drop_foreign_key_sql(table: &str, fk_name: &str) -> String {
    format!(
        "ALTER TABLE {} DROP FOREIGN KEY {}",
        quote_ident(table),
        quote_ident(fk_name)
    )
}

/// Owner FK with delete-sets-null / 所有者外键
pub fn add_owner_fk_sql(table: &str, fk_name: &str, owner_table: &str) -> String {
    format!(
        "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {}(`id`) ON DELETE SET NULL",
        quote_ident(table),
        quote_ident(fk_name),
        quote_ident(OWNER_COLUMN),
        quote_ident(owner_table)
    )
}

/// Default index name: `ft_` + columns joined by `_` / 默认索引名
pub fn fulltext_index_name(columns: &[&str]) -> String {
    format!("ft_{}", columns.join("_"))
}

pub fn add_fulltext_index_sql(table: &str, columns: &[&str]) -> String {
    let cols: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
    format!(
        "ALTER TABLE {} ADD FULLTEXT INDEX {} ({})",
        quote_ident(table),
        quote_ident(&fulltext_index_name(columns)),
        cols.join(", ")
    )
}

/// Table comment for the enhanced engine / 增强引擎表注释
///
/// e.g. `table "ms_fulltext" tokenizer "TokenMecab"`
pub fn enhanced_comment(pinned_table: Option<&str>, tokenizer: Option<&str>) -> String {
    let mut opts = Vec::new();
    if let Some(name) = pinned_table.filter(|n| !n.is_empty()) {
        opts.push(format!("table \"{}\"", name));
    }
    if let Some(tok) = tokenizer.filter(|t| !t.is_empty()) {
        opts.push(format!("tokenizer \"{}\"", tok));
    }
    opts.join(" ")
}

pub fn tokenizer_probe_sql(engine: &str, tokenizer: &str) -> (String, String) {
    let create = format!(
        "CREATE TABLE IF NOT EXISTS {} (f TEXT, FULLTEXT INDEX (f)) ENGINE={} COMMENT={}",
        quote_ident(TOKENIZER_PROBE_TABLE),
        engine,
        sql_literal(&format!("tokenizer \"{}\"", tokenizer))
    );
    (create, drop_table_sql(TOKENIZER_PROBE_TABLE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enhanced_comment() {
        assert_eq!(
            enhanced_comment(Some("ms_fulltext"), Some("TokenMecab")),
            "table \"ms_fulltext\" tokenizer \"TokenMecab\""
        );
        assert_eq!(enhanced_comment(Some("ms_fulltext"), None), "table \"ms_fulltext\"");
        assert_eq!(enhanced_comment(None, None), "");
    }

    #[test]
    fn test_create_table_sql() {
        let sql = create_table_sql("fulltext_search", "Mroonga", Some("table \"ms_fulltext\""));
        assert!(sql.starts_with("CREATE TABLE `fulltext_search` ("));
        assert!(sql.contains("PRIMARY KEY (`id`, `resource`)"));
        assert!(sql.contains(") ENGINE=Mroonga DEFAULT CHARSET=utf8mb4"));
        assert!(sql.ends_with("COMMENT='table \"ms_fulltext\"'"));
        assert!(!sql.contains("CONSTRAINT"));

        let sql = create_table_sql("fulltext_search", "InnoDB", None);
        assert!(!sql.contains("COMMENT"));
    }

    #[test]
    fn test_fulltext_index_sql() {
        assert_eq!(
            add_fulltext_index_sql("fulltext_search", &FULLTEXT_COLUMNS),
            "ALTER TABLE `fulltext_search` ADD FULLTEXT INDEX `ft_title_text` (`title`, `text`)"
        );
    }

    #[test]
    fn test_owner_fk_sql() {
        assert_eq!(
            add_owner_fk_sql("fulltext_search", "fk_fulltext_search_owner", "user"),
            "ALTER TABLE `fulltext_search` ADD CONSTRAINT `fk_fulltext_search_owner` \
             FOREIGN KEY (`owner_id`) REFERENCES `user`(`id`) ON DELETE SET NULL"
        );
    }

    #[test]
    fn test_sql_literal_escapes_quotes() {
        assert_eq!(sql_literal("it's"), "'it''s'");
        assert_eq!(sql_literal(""), "''");
    }
}
