//! Node — the core entity of the task graph (spec.md §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value::PropertyMap;

/// Discovery gates decomposition: `pending` means "no children yet".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Discovery {
    Pending,
    Done,
}

impl Discovery {
    pub fn as_str(&self) -> &'static str {
        match self {
            Discovery::Pending => "pending",
            Discovery::Done => "done",
        }
    }
}

impl std::str::FromStr for Discovery {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Discovery::Pending),
            "done" => Ok(Discovery::Done),
            other => Err(format!("unknown discovery state: {other}")),
        }
    }
}

/// A typed record of outcome or advice attached to a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evidence {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "ref")]
    pub reference: String,
    pub agent: String,
    pub timestamp: DateTime<Utc>,
}

impl Evidence {
    pub fn new(kind: impl Into<String>, reference: impl Into<String>, agent: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            reference: reference.into(),
            agent: agent.into(),
            timestamp: Utc::now(),
        }
    }
}

/// A fully-projected node row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub rev: i64,
    pub parent: Option<String>,
    pub project: String,
    pub summary: String,
    pub resolved: bool,
    pub depth: i64,
    pub discovery: Option<Discovery>,
    pub blocked: bool,
    pub blocked_reason: Option<String>,
    pub plan: Option<Vec<String>>,
    pub state: Option<serde_json::Value>,
    pub properties: PropertyMap,
    pub context_links: Vec<String>,
    pub evidence: Vec<Evidence>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Node {
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn priority(&self) -> f64 {
        self.properties
            .get("priority")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0)
        // missing => 0, per spec.md §4.5 ranking rule 1.
    }

    pub fn auto_resolve_enabled(&self) -> bool {
        self.properties
            .get("auto_resolve")
            .and_then(|v| v.as_bool())
            .unwrap_or(true)
        // default true: cascade runs unless explicitly disabled.
    }

    pub fn cascade_resolve_enabled(&self) -> bool {
        self.properties
            .get("cascade_resolve")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    pub fn strict(&self) -> bool {
        self.properties
            .get("strict")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    pub fn claimed_by(&self) -> Option<&str> {
        self.properties.get("_claimed_by").and_then(|v| v.as_str())
    }

    pub fn claimed_at(&self) -> Option<DateTime<Utc>> {
        self.properties
            .get("_claimed_at")
            .and_then(|v| v.as_str())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn needs_verification(&self) -> bool {
        self.properties
            .get("_needs_verification")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}
