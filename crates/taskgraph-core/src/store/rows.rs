//! Row-to-model mapping shared by every operation module.

use chrono::{DateTime, Utc};
use rusqlite::Row;

use crate::model::{
    Category, Discovery, Edge, EdgeType, Event, EventAction, Evidence, KnowledgeAction,
    KnowledgeEntry, KnowledgeLogEntry, Node,
};
use crate::value::PropertyMap;

fn parse_dt(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

pub fn row_to_node(row: &Row) -> rusqlite::Result<Node> {
    let properties_json: String = row.get("properties")?;
    let properties: PropertyMap = serde_json::from_str(&properties_json).unwrap_or_default();

    let context_links_json: String = row.get("context_links")?;
    let context_links: Vec<String> = serde_json::from_str(&context_links_json).unwrap_or_default();

    let evidence_json: String = row.get("evidence")?;
    let evidence: Vec<Evidence> = serde_json::from_str(&evidence_json).unwrap_or_default();

    let discovery: Option<String> = row.get("discovery")?;
    let plan_json: Option<String> = row.get("plan")?;
    let state_json: Option<String> = row.get("state")?;

    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(Node {
        id: row.get("id")?,
        rev: row.get("rev")?,
        parent: row.get("parent")?,
        project: row.get("project")?,
        summary: row.get("summary")?,
        resolved: row.get::<_, i64>("resolved")? != 0,
        depth: row.get("depth")?,
        discovery: discovery.and_then(|d| d.parse::<Discovery>().ok()),
        blocked: row.get::<_, i64>("blocked")? != 0,
        blocked_reason: row.get("blocked_reason")?,
        plan: plan_json.and_then(|p| serde_json::from_str(&p).ok()),
        state: state_json.and_then(|s| serde_json::from_str(&s).ok()),
        properties,
        context_links,
        evidence,
        created_by: row.get("created_by")?,
        created_at: parse_dt(&created_at),
        updated_at: parse_dt(&updated_at),
    })
}

pub fn row_to_edge(row: &Row) -> rusqlite::Result<Edge> {
    let edge_type: String = row.get("edge_type")?;
    let created_at: String = row.get("created_at")?;
    Ok(Edge {
        id: row.get("id")?,
        from: row.get("from_node")?,
        to: row.get("to_node")?,
        kind: EdgeType::from(edge_type.as_str()),
        created_by: row.get("created_by")?,
        created_at: parse_dt(&created_at),
    })
}

pub fn row_to_event(row: &Row) -> rusqlite::Result<Event> {
    let action: String = row.get("action")?;
    let changes_json: String = row.get("changes")?;
    let timestamp: String = row.get("timestamp")?;
    Ok(Event {
        id: row.get("id")?,
        node_id: row.get("node_id")?,
        project: row.get("project")?,
        action: action.parse::<EventAction>().unwrap_or(EventAction::Updated),
        changes: serde_json::from_str(&changes_json).unwrap_or_default(),
        agent: row.get("agent")?,
        note: row.get("note")?,
        timestamp: parse_dt(&timestamp),
    })
}

pub fn row_to_knowledge(row: &Row) -> rusqlite::Result<KnowledgeEntry> {
    let category: String = row.get("category")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;
    Ok(KnowledgeEntry {
        id: row.get("id")?,
        project: row.get("project")?,
        key: row.get("key")?,
        content: row.get("content")?,
        category: category.parse::<Category>().unwrap_or(Category::General),
        source_node: row.get("source_node")?,
        created_by: row.get("created_by")?,
        created_at: parse_dt(&created_at),
        updated_at: parse_dt(&updated_at),
    })
}

pub fn row_to_knowledge_log(row: &Row) -> rusqlite::Result<KnowledgeLogEntry> {
    let action: String = row.get("action")?;
    let timestamp: String = row.get("timestamp")?;
    Ok(KnowledgeLogEntry {
        id: row.get("id")?,
        project: row.get("project")?,
        key: row.get("key")?,
        action: match action.as_str() {
            "created" => KnowledgeAction::Created,
            "deleted" => KnowledgeAction::Deleted,
            _ => KnowledgeAction::Updated,
        },
        old_content: row.get("old_content")?,
        new_content: row.get("new_content")?,
        agent: row.get("agent")?,
        timestamp: parse_dt(&timestamp),
    })
}
