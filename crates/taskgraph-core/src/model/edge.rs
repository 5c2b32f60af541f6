//! Edge — typed relationships between nodes (spec.md §4.3 connect layer).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// `DependsOn` is engine-interpreted: it feeds actionability and cycle
/// detection. Every other kind is an opaque, agent-defined label stored
/// and returned verbatim but never reasoned about by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeType {
    DependsOn,
    Other(String),
}

impl EdgeType {
    pub fn as_str(&self) -> &str {
        match self {
            EdgeType::DependsOn => "depends_on",
            EdgeType::Other(s) => s.as_str(),
        }
    }

    pub fn is_depends_on(&self) -> bool {
        matches!(self, EdgeType::DependsOn)
    }
}

impl From<&str> for EdgeType {
    fn from(s: &str) -> Self {
        if s == "depends_on" {
            EdgeType::DependsOn
        } else {
            EdgeType::Other(s.to_string())
        }
    }
}

impl Serialize for EdgeType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EdgeType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(EdgeType::from(s.as_str()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub kind: EdgeType,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}
