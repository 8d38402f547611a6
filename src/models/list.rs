//! Zero Trust list models

use serde::{Deserialize, Serialize};

/// List as returned by the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayList {
    /// Remote identifier
    pub id: String,

    /// List name
    pub name: String,

    /// List type (`DOMAIN`, `IP`, ...)
    #[serde(default, rename = "type")]
    pub list_type: Option<String>,

    /// Number of items, when reported
    #[serde(default)]
    pub count: Option<u64>,

    /// Description, when set
    #[serde(default)]
    pub description: Option<String>,
}

/// Kind of entries a list holds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ListType {
    /// Domain names
    #[default]
    Domain,
}

/// Single list item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListItem {
    /// Item value, a normalized domain
    pub value: String,
}

/// Body for `POST /lists`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateListRequest {
    /// List name
    pub name: String,

    /// List type
    #[serde(rename = "type")]
    pub list_type: ListType,

    /// Items in order
    pub items: Vec<ListItem>,
}

impl CreateListRequest {
    /// Domain list with the given entries, order preserved
    pub fn domains(name: impl Into<String>, entries: &[String]) -> Self {
        Self {
            name: name.into(),
            list_type: ListType::Domain,
            items: entries
                .iter()
                .map(|value| ListItem {
                    value: value.clone(),
                })
                .collect(),
        }
    }
}
