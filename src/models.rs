use serde::{Deserialize, Serialize};

/// Resource types kept in the search table / 搜索表中的资源类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Items,
    ItemSets,
    Media,
}

impl ResourceType {
    pub const ALL: [ResourceType; 3] = [ResourceType::Items, ResourceType::ItemSets, ResourceType::Media];

    /// Value of the `resource` column / 资源 API 名称
    pub fn api_name(self) -> &'static str {
        match self {
            ResourceType::Items => "items",
            ResourceType::ItemSets => "item_sets",
            ResourceType::Media => "media",
        }
    }

    /// Discriminator in the host's `resource` table / 宿主实体类名
    pub fn entity_class(self) -> &'static str {
        match self {
            ResourceType::Items => "Omeka\\Entity\\Item",
            ResourceType::ItemSets => "Omeka\\Entity\\ItemSet",
            ResourceType::Media => "Omeka\\Entity\\Media",
        }
    }

    /// Host table holding the type, used for totals / 宿主数据表
    pub fn table(self) -> &'static str {
        match self {
            ResourceType::Items => "item",
            ResourceType::ItemSets => "item_set",
            ResourceType::Media => "media",
        }
    }

    pub fn from_api_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.api_name() == name)
    }
}

/// One resource as returned by the paged listing / 资源记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub id: i64,
    pub owner_id: Option<i64>,
    pub is_public: bool,
    pub title: Option<String>,
    pub text: Option<String>,
}

/// One row of the search table, keyed by (id, resource) / 搜索表行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRow {
    pub id: i64,
    pub resource: String,
    pub owner_id: Option<i64>,
    pub is_public: bool,
    pub title: Option<String>,
    pub text: Option<String>,
}

impl SearchRow {
    pub fn from_record(record: &ResourceRecord, resource_type: ResourceType) -> Self {
        Self {
            id: record.id,
            resource: resource_type.api_name().to_string(),
            owner_id: record.owner_id,
            is_public: record.is_public,
            title: record.title.clone(),
            text: record.text.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_names() {
        assert_eq!(ResourceType::ItemSets.api_name(), "item_sets");
        assert_eq!(ResourceType::from_api_name("media"), Some(ResourceType::Media));
        assert_eq!(ResourceType::from_api_name("users"), None);
    }
}
