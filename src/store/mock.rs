//! Scripted in-memory store for unit tests / 测试用内存数据库
//!
//! Interprets the handful of metadata queries and DDL statements this crate
//! issues and keeps just enough state (engine, comment, owner FKs, full-text
//! indexes, search rows) to check migrations and reindex runs.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{Connection, Row, SqlValue};
use crate::error::{Error, Result};
use crate::models::{ResourceRecord, ResourceType};

#[derive(Debug, Clone)]
pub struct MockState {
    pub plugin_status: Option<String>,
    pub plugin_query_fails: bool,
    pub table_exists: bool,
    pub engine: String,
    pub comment: String,
    pub owner_fks: Vec<String>,
    pub fulltext_indexes: Vec<(String, String)>,
    /// Objects the enhanced engine keeps for its tables / 增强引擎内部对象
    pub engine_objects: Vec<String>,
    /// Names passed to a successful `object_remove` / 已删除的内部对象
    pub removed_objects: Vec<String>,
    pub tokenizer_available: bool,
    pub alter_engine_fails: bool,
    pub create_table_fails: bool,
    pub engine_query_fails: bool,
    pub index_create_fails: bool,
    pub transaction_open: bool,
    pub commits: usize,
    pub rollbacks: usize,
    pub search_rows: Vec<(i64, String)>,
    pub index_write_fails: bool,
    /// Host resources as (type, record) / 宿主资源
    pub resources: Vec<(ResourceType, ResourceRecord)>,
    pub listing_fails: bool,
    /// Page rows come back with a NULL id / 分页结果 id 为空
    pub listing_null_ids: bool,
    /// `fulltext_jobs` rows / 任务表
    pub jobs: Vec<Vec<(String, SqlValue)>>,
    pub statements: Vec<String>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            plugin_status: None,
            plugin_query_fails: false,
            table_exists: true,
            engine: "InnoDB".to_string(),
            comment: String::new(),
            owner_fks: vec!["FK_AA31FE4A7E3C61F9".to_string()],
            fulltext_indexes: vec![(
                "IDX_AA31FE4A2B36786B3B8BA7C7".to_string(),
                "title,text".to_string(),
            )],
            engine_objects: Vec::new(),
            removed_objects: Vec::new(),
            tokenizer_available: false,
            alter_engine_fails: false,
            create_table_fails: false,
            engine_query_fails: false,
            index_create_fails: false,
            transaction_open: false,
            commits: 0,
            rollbacks: 0,
            search_rows: Vec::new(),
            index_write_fails: false,
            resources: Vec::new(),
            listing_fails: false,
            listing_null_ids: false,
            jobs: Vec::new(),
            statements: Vec::new(),
        }
    }
}

#[derive(Default)]
pub struct MockConnection {
    state: Arc<Mutex<MockState>>,
    /// Transaction flag of a session handle; the root handle uses
    /// `MockState::transaction_open` / 会话自己的事务标记
    session_tx: Option<Mutex<bool>>,
}

impl MockConnection {
    /// InnoDB table with the stock FK and full-text index, plugin absent
    pub fn baseline() -> Self {
        Self::default()
    }

    /// Plugin active, table still on the baseline engine
    pub fn plugin_active() -> Self {
        let conn = Self::default();
        conn.update(|s| s.plugin_status = Some("ACTIVE".to_string()));
        conn
    }

    /// Plugin active and table already on the enhanced engine
    pub fn enhanced() -> Self {
        let conn = Self::plugin_active();
        conn.update(|s| {
            s.engine = "Mroonga".to_string();
            s.comment = "table \"ms_fulltext\"".to_string();
            s.owner_fks.clear();
            s.engine_objects = vec!["ms_fulltext".to_string()];
        });
        conn
    }

    fn tx_open(&self, s: &MockState) -> bool {
        match &self.session_tx {
            Some(flag) => *flag.lock(),
            None => s.transaction_open,
        }
    }

    fn set_tx_open(&self, s: &mut MockState, open: bool) {
        match &self.session_tx {
            Some(flag) => *flag.lock() = open,
            None => s.transaction_open = open,
        }
    }

    pub fn update(&self, f: impl FnOnce(&mut MockState)) {
        f(&mut self.state.lock());
    }

    pub fn snapshot(&self) -> MockState {
        self.state.lock().clone()
    }

    pub fn statements(&self) -> Vec<String> {
        self.state.lock().statements.clone()
    }

    pub fn clear_statements(&self) {
        self.state.lock().statements.clear();
    }

    /// ALTER/CREATE/DROP statements issued so far (probe table excluded)
    pub fn ddl_statements(&self) -> Vec<String> {
        self.statements()
            .into_iter()
            .filter(|s| {
                let upper = s.trim_start().to_uppercase();
                (upper.starts_with("ALTER") || upper.starts_with("CREATE") || upper.starts_with("DROP"))
                    && !s.contains("tokenizer_probe")
            })
            .collect()
    }

    /// Add `count` host resources of one type with ids starting at `first_id`
    pub fn seed_resources(&self, resource_type: ResourceType, first_id: i64, count: usize) {
        self.update(|s| {
            for offset in 0..count as i64 {
                let id = first_id + offset;
                s.resources.push((
                    resource_type,
                    ResourceRecord {
                        id,
                        owner_id: Some(1),
                        is_public: true,
                        title: Some(format!("{} {}", resource_type.api_name(), id)),
                        text: Some(format!("text of {}", id)),
                    },
                ));
            }
        });
    }

    pub fn seed_rows(&self, rows: &[(i64, &str)]) {
        self.update(|s| {
            for (id, resource) in rows {
                s.search_rows.push((*id, resource.to_string()));
            }
        });
    }
}

fn resources_of<'a>(s: &'a MockState, entity_class: &str) -> Vec<&'a ResourceRecord> {
    s.resources
        .iter()
        .filter(|(t, _)| t.entity_class() == entity_class)
        .map(|(_, r)| r)
        .collect()
}

fn job_row_value<'a>(row: &'a [(String, SqlValue)], name: &str) -> Option<&'a SqlValue> {
    row.iter().find(|(col, _)| col == name).map(|(_, v)| v)
}

fn rejected(msg: &str) -> Error {
    Error::Database(msg.to_string())
}

/// Object backing a table on the enhanced engine: the `table "<name>"`
/// comment option, or the table itself / 增强引擎表对应的内部对象
fn backing_object(table: &str, comment: &str) -> String {
    comment
        .strip_prefix("table \"")
        .and_then(|rest| rest.split('"').next())
        .filter(|name| !name.is_empty())
        .unwrap_or(table)
        .to_string()
}

fn bind_engine_objects(s: &mut MockState, table: &str) {
    s.engine_objects.clear();
    if s.engine.eq_ignore_ascii_case("Mroonga") {
        let object = backing_object(table, &s.comment);
        s.engine_objects.push(object);
    }
}

/// Token following `ENGINE=` / 解析 ENGINE= 后的值
fn parse_engine(sql: &str) -> Option<String> {
    let pos = sql.find("ENGINE=")?;
    let rest = &sql[pos + "ENGINE=".len()..];
    let engine: String = rest.chars().take_while(|c| c.is_ascii_alphanumeric()).collect();
    Some(engine)
}

fn parse_comment(sql: &str) -> Option<String> {
    let pos = sql.rfind("COMMENT='")?;
    let rest = &sql[pos + "COMMENT='".len()..];
    rest.find('\'').map(|end| rest[..end].to_string())
}

/// First backtick-quoted name after `marker` / 解析标记之后的反引号名称
fn name_after(sql: &str, marker: &str) -> Option<String> {
    let pos = sql.find(marker)?;
    let rest = &sql[pos + marker.len()..];
    let start = rest.find('`')? + 1;
    let end = rest[start..].find('`')? + start;
    Some(rest[start..end].to_string())
}

/// Column list inside the parentheses after `marker`, joined by commas
fn cols_after(sql: &str, marker: &str) -> Option<String> {
    let pos = sql.find(marker)?;
    let rest = &sql[pos..];
    let start = rest.find('(')? + 1;
    let end = rest[start..].find(')')? + start;
    let cols: Vec<String> = rest[start..end]
        .split(',')
        .map(|c| c.trim().trim_matches('`').to_string())
        .collect();
    Some(cols.join(","))
}

#[async_trait]
impl Connection for MockConnection {
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        let mut s = self.state.lock();
        s.statements.push(sql.to_string());
        let upper = sql.trim_start().to_uppercase();

        if sql.contains("tokenizer_probe") {
            if upper.starts_with("CREATE") && !s.tokenizer_available {
                return Err(rejected("unknown tokenizer"));
            }
            return Ok(0);
        }
        if upper.starts_with("ALTER TABLE") && !s.table_exists {
            return Err(rejected("table doesn't exist"));
        }
        if upper.contains("DROP FOREIGN KEY") {
            let name = name_after(sql, "DROP FOREIGN KEY").unwrap_or_default();
            let before = s.owner_fks.len();
            s.owner_fks.retain(|fk| fk != &name);
            if s.owner_fks.len() == before {
                return Err(rejected("can't drop foreign key; check that it exists"));
            }
            return Ok(0);
        }
        if upper.contains("ADD CONSTRAINT") {
            let name = name_after(sql, "ADD CONSTRAINT").unwrap_or_default();
            if s.owner_fks.contains(&name) {
                return Err(rejected("duplicate foreign key constraint name"));
            }
            if s.engine.eq_ignore_ascii_case("Mroonga") {
                return Err(rejected("engine does not support foreign keys"));
            }
            s.owner_fks.push(name);
            return Ok(0);
        }
        if upper.contains("ADD FULLTEXT INDEX") {
            if s.index_create_fails {
                return Err(rejected("index creation rejected"));
            }
            let name = name_after(sql, "FULLTEXT INDEX").unwrap_or_default();
            let cols = cols_after(sql, "FULLTEXT INDEX").unwrap_or_default();
            s.fulltext_indexes.push((name, cols));
            return Ok(0);
        }
        if upper.starts_with("ALTER TABLE") && upper.contains("ENGINE=") {
            if s.alter_engine_fails {
                return Err(rejected("metadata incompatible with target engine"));
            }
            s.engine = parse_engine(sql).unwrap_or_default();
            s.comment = parse_comment(sql).unwrap_or_default();
            let table = name_after(sql, "ALTER TABLE").unwrap_or_default();
            bind_engine_objects(&mut s, &table);
            return Ok(0);
        }
        if upper.starts_with("DROP TABLE") {
            s.table_exists = false;
            s.engine_objects.clear();
            s.engine.clear();
            s.comment.clear();
            s.owner_fks.clear();
            s.fulltext_indexes.clear();
            s.search_rows.clear();
            return Ok(0);
        }
        if upper.starts_with("CREATE TABLE") && !upper.contains("IF NOT EXISTS") {
            if s.create_table_fails {
                return Err(rejected("create table rejected"));
            }
            s.table_exists = true;
            s.engine = parse_engine(sql).unwrap_or_default();
            s.comment = parse_comment(sql).unwrap_or_default();
            let table = name_after(sql, "CREATE TABLE").unwrap_or_default();
            bind_engine_objects(&mut s, &table);
            if let (Some(name), Some(cols)) =
                (name_after(sql, "FULLTEXT KEY"), cols_after(sql, "FULLTEXT KEY"))
            {
                s.fulltext_indexes.push((name, cols));
            }
            if let Some(name) = name_after(sql, "CONSTRAINT") {
                s.owner_fks.push(name);
            }
            return Ok(0);
        }
        if sql.contains("`fulltext_jobs`") {
            if upper.starts_with("INSERT INTO") {
                let cols = cols_after(sql, "`fulltext_jobs`").unwrap_or_default();
                let row: Vec<(String, SqlValue)> =
                    cols.split(',').map(str::to_string).zip(params.iter().cloned()).collect();
                let id = params.first().map(SqlValue::to_text).unwrap_or_default();
                s.jobs.retain(|r| job_row_value(r, "id").map(SqlValue::to_text) != Some(id.clone()));
                s.jobs.push(row);
                return Ok(1);
            }
            if upper.starts_with("UPDATE") && params.len() == 2 {
                let chunk = params[0].to_text();
                let id = params[1].to_text();
                for row in s.jobs.iter_mut() {
                    if job_row_value(row, "id").map(SqlValue::to_text) == Some(id.clone()) {
                        if let Some((_, log)) = row.iter_mut().find(|(c, _)| c == "log") {
                            *log = SqlValue::Text(format!("{}{}", log.to_text(), chunk));
                        }
                        return Ok(1);
                    }
                }
                return Ok(0);
            }
            return Ok(0);
        }
        if upper.starts_with("DELETE") {
            let types: Vec<String> = params.iter().map(SqlValue::to_text).collect();
            let before = s.search_rows.len();
            s.search_rows.retain(|(_, r)| !types.contains(r));
            return Ok((before - s.search_rows.len()) as u64);
        }
        if upper.starts_with("INSERT INTO") && sql.contains("fulltext_search") && params.len() >= 2 {
            if s.index_write_fails {
                return Err(rejected("Data too long for column 'text'"));
            }
            let id = params[0].as_i64().unwrap_or_default();
            let resource = params[1].to_text();
            s.search_rows.retain(|(i, r)| !(*i == id && r == &resource));
            s.search_rows.push((id, resource));
            return Ok(1);
        }
        Ok(0)
    }

    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
        let mut s = self.state.lock();
        s.statements.push(sql.to_string());

        if sql.contains("information_schema.PLUGINS") {
            if s.plugin_query_fails {
                return Err(rejected("access denied to information_schema"));
            }
            return Ok(s
                .plugin_status
                .iter()
                .map(|st| Row::new(vec![("PLUGIN_STATUS".to_string(), SqlValue::from(st.as_str()))]))
                .collect());
        }
        if sql.contains("information_schema.TABLES") {
            if s.engine_query_fails {
                return Err(rejected("lost connection"));
            }
            if !s.table_exists {
                return Ok(Vec::new());
            }
            return Ok(vec![Row::new(vec![
                ("ENGINE".to_string(), SqlValue::from(s.engine.as_str())),
                ("TABLE_COMMENT".to_string(), SqlValue::from(s.comment.as_str())),
            ])]);
        }
        if sql.contains("KEY_COLUMN_USAGE") {
            return Ok(s
                .owner_fks
                .iter()
                .take(1)
                .map(|fk| Row::new(vec![("CONSTRAINT_NAME".to_string(), SqlValue::from(fk.as_str()))]))
                .collect());
        }
        if sql.contains("information_schema.STATISTICS") {
            if !s.table_exists {
                return Ok(Vec::new());
            }
            let mut rows = vec![Row::new(vec![
                ("INDEX_NAME".to_string(), SqlValue::from("PRIMARY")),
                ("INDEX_TYPE".to_string(), SqlValue::from("BTREE")),
                ("cols".to_string(), SqlValue::from("id,resource")),
            ])];
            for (name, cols) in &s.fulltext_indexes {
                rows.push(Row::new(vec![
                    ("INDEX_NAME".to_string(), SqlValue::from(name.as_str())),
                    ("INDEX_TYPE".to_string(), SqlValue::from("FULLTEXT")),
                    ("cols".to_string(), SqlValue::from(cols.as_str())),
                ]));
            }
            return Ok(rows);
        }
        if sql.contains("`fulltext_jobs`") {
            let id = sql.contains("WHERE id = ?").then(|| params.first().map(SqlValue::to_text)).flatten();
            return Ok(s
                .jobs
                .iter()
                .filter(|r| id.is_none() || job_row_value(r, "id").map(SqlValue::to_text) == id)
                .map(|r| Row::new(r.clone()))
                .collect());
        }
        if sql.contains("FROM `resource`") {
            if s.listing_fails {
                return Err(rejected("listing timed out"));
            }
            let class = params.first().map(SqlValue::to_text).unwrap_or_default();
            let records = resources_of(&s, &class);
            if sql.contains("COUNT(*)") {
                return Ok(vec![Row::new(vec![(
                    "total".to_string(),
                    SqlValue::Int(records.len() as i64),
                )])]);
            }
            let limit = params.get(1).and_then(SqlValue::as_i64).unwrap_or(0) as usize;
            let offset = params.get(2).and_then(SqlValue::as_i64).unwrap_or(0) as usize;
            let null_ids = s.listing_null_ids;
            return Ok(records
                .into_iter()
                .skip(offset)
                .take(limit)
                .map(|r| {
                    Row::new(vec![
                        ("id".to_string(), if null_ids { SqlValue::Null } else { SqlValue::Int(r.id) }),
                        ("owner_id".to_string(), SqlValue::from(r.owner_id)),
                        ("is_public".to_string(), SqlValue::from(r.is_public)),
                        ("title".to_string(), SqlValue::from(r.title.clone())),
                        ("text".to_string(), SqlValue::from(r.text.clone())),
                    ])
                })
                .collect());
        }
        if sql.starts_with("SELECT COUNT(*) FROM `") {
            let table = name_after(sql, "FROM").unwrap_or_default();
            let count = s.resources.iter().filter(|(t, _)| t.table() == table).count();
            return Ok(vec![Row::new(vec![("COUNT(*)".to_string(), SqlValue::Int(count as i64))])]);
        }
        if sql.contains("_command(") {
            if s.plugin_status.as_deref() != Some("ACTIVE") {
                return Err(rejected("FUNCTION mroonga_command does not exist"));
            }
            let arg = params.first().map(SqlValue::to_text).unwrap_or_default();
            if let Some(name) = arg.strip_prefix("object_remove ") {
                let name = name.trim().to_string();
                if !s.engine_objects.contains(&name) {
                    return Err(rejected("[object][remove] target object doesn't exist"));
                }
                s.engine_objects.retain(|o| o != &name);
                s.removed_objects.push(name);
            }
            return Ok(vec![Row::new(vec![("result".to_string(), SqlValue::from("true"))])]);
        }
        if sql.contains("GROUP BY `resource`") {
            let mut counts: Vec<(String, i64)> = Vec::new();
            for (_, r) in &s.search_rows {
                match counts.iter_mut().find(|(name, _)| name == r) {
                    Some((_, n)) => *n += 1,
                    None => counts.push((r.clone(), 1)),
                }
            }
            return Ok(counts
                .into_iter()
                .map(|(r, n)| {
                    Row::new(vec![
                        ("resource".to_string(), SqlValue::from(r)),
                        ("cnt".to_string(), SqlValue::Int(n)),
                    ])
                })
                .collect());
        }
        Ok(Vec::new())
    }

    async fn begin(&self) -> Result<()> {
        let mut s = self.state.lock();
        if self.tx_open(&s) {
            return Err(rejected("transaction already active"));
        }
        self.set_tx_open(&mut s, true);
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        let mut s = self.state.lock();
        if !self.tx_open(&s) {
            return Err(rejected("no active transaction"));
        }
        self.set_tx_open(&mut s, false);
        s.commits += 1;
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        let mut s = self.state.lock();
        self.set_tx_open(&mut s, false);
        s.rollbacks += 1;
        Ok(())
    }

    async fn in_transaction(&self) -> bool {
        let s = self.state.lock();
        self.tx_open(&s)
    }

    /// Shares all table state, only the transaction flag is separate
    fn session(&self) -> Arc<dyn Connection> {
        Arc::new(MockConnection {
            state: self.state.clone(),
            session_tx: Some(Mutex::new(false)),
        })
    }
}
