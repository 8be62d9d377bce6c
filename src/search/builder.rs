//! Host query builder seam / 宿主查询构建接口
//!
//! The rewriter never writes SQL into the host query directly; it asks the
//! builder for an alias and named parameters and hands back join and where
//! fragments. [`SqlQueryBuilder`] records everything it is given.

use serde::Serialize;

/// Query under construction by the host / 宿主正在构建的查询
pub trait QueryBuilder: Send {
    /// Fresh, unique table alias / 新的表别名
    fn create_alias(&mut self) -> String;

    /// API resource name of the queried type (`items`, `media`, ...) / 资源名
    fn resource_type_name(&self) -> String;

    /// Bind a value, returns its placeholder / 绑定参数，返回占位符
    fn create_named_parameter(&mut self, value: &str) -> String;

    fn inner_join(&mut self, entity: &str, alias: &str, condition: &str);

    fn and_where(&mut self, fragment: &str);
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Join {
    pub entity: String,
    pub alias: String,
    pub condition: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    pub name: String,
    pub value: String,
}

/// Recording builder, used by the rewrite preview and tests / 记录型查询构建器
#[derive(Debug, Clone, Default, Serialize)]
pub struct SqlQueryBuilder {
    resource_name: String,
    pub joins: Vec<Join>,
    pub wheres: Vec<String>,
    pub parameters: Vec<Parameter>,
    #[serde(skip)]
    alias_seq: usize,
}

impl SqlQueryBuilder {
    pub fn new(resource_name: impl Into<String>) -> Self {
        Self {
            resource_name: resource_name.into(),
            ..Default::default()
        }
    }

    /// Value bound to a placeholder / 查找占位符对应的值
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }
}

impl QueryBuilder for SqlQueryBuilder {
    fn create_alias(&mut self) -> String {
        self.alias_seq += 1;
        format!("ms_ft{}", self.alias_seq)
    }

    fn resource_type_name(&self) -> String {
        self.resource_name.clone()
    }

    fn create_named_parameter(&mut self, value: &str) -> String {
        let name = format!(":ms_p{}", self.parameters.len() + 1);
        self.parameters.push(Parameter {
            name: name.clone(),
            value: value.to_string(),
        });
        name
    }

    fn inner_join(&mut self, entity: &str, alias: &str, condition: &str) {
        self.joins.push(Join {
            entity: entity.to_string(),
            alias: alias.to_string(),
            condition: condition.to_string(),
        });
    }

    fn and_where(&mut self, fragment: &str) {
        self.wheres.push(fragment.to_string());
    }
}
