//! Knowledge — the cross-cutting notes store (spec.md §6 knowledge layer).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The closed category set for knowledge entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    General,
    Architecture,
    Convention,
    Decision,
    Environment,
    ApiContract,
    Discovery,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::General => "general",
            Category::Architecture => "architecture",
            Category::Convention => "convention",
            Category::Decision => "decision",
            Category::Environment => "environment",
            Category::ApiContract => "api-contract",
            Category::Discovery => "discovery",
        }
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "general" => Ok(Category::General),
            "architecture" => Ok(Category::Architecture),
            "convention" => Ok(Category::Convention),
            "decision" => Ok(Category::Decision),
            "environment" => Ok(Category::Environment),
            "api-contract" => Ok(Category::ApiContract),
            "discovery" => Ok(Category::Discovery),
            other => Err(format!("unknown knowledge category: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub id: String,
    pub project: String,
    pub key: String,
    pub content: String,
    pub category: Category,
    pub source_node: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeAction {
    Created,
    Updated,
    Deleted,
}

impl KnowledgeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            KnowledgeAction::Created => "created",
            KnowledgeAction::Updated => "updated",
            KnowledgeAction::Deleted => "deleted",
        }
    }
}

/// An append-only companion row written on every knowledge mutation,
/// independent of whether the entry itself is later overwritten or deleted
/// (spec.md §9 Open Question: knowledge writes always log, see DESIGN.md).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeLogEntry {
    pub id: i64,
    pub project: String,
    pub key: String,
    pub action: KnowledgeAction,
    pub old_content: Option<String>,
    pub new_content: Option<String>,
    pub agent: String,
    pub timestamp: DateTime<Utc>,
}
