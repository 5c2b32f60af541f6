//! Project-scoped knowledge store: write/read/delete/search plus
//! near-duplicate key detection (spec.md §4.7).

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::error::{EngineError, EngineResult, StoreError};
use crate::model::{Category, KnowledgeAction, KnowledgeEntry};
use crate::store::{new_id, now_rfc3339, row_to_knowledge};

#[derive(Debug, Clone, Serialize)]
pub struct WriteOutcome {
    pub entry: KnowledgeEntry,
    pub similar_keys: Vec<String>,
    pub same_category_overlap: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct KnowledgeView {
    pub entry: KnowledgeEntry,
    pub days_since_update: i64,
    /// `None` when the entry has no `source_node`, otherwise whether that
    /// node currently reads as resolved.
    pub source_node_resolved: Option<bool>,
}

fn normalize(key: &str) -> String {
    key.to_lowercase().replace(['-', '_'], "")
}

fn longest_common_substring_len(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev = vec![0usize; b.len() + 1];
    let mut best = 0;
    for i in 1..=a.len() {
        let mut cur = vec![0usize; b.len() + 1];
        for j in 1..=b.len() {
            if a[i - 1] == b[j - 1] {
                cur[j] = prev[j - 1] + 1;
                best = best.max(cur[j]);
            }
        }
        prev = cur;
    }
    best
}

/// Simple, dependency-free duplicate-key heuristic: normalized
/// longest-common-substring ratio, plus a prefix/substring shortcut for
/// keys like `auth-design` vs `authdesign`.
pub(crate) fn keys_are_similar(a: &str, b: &str) -> bool {
    let na = normalize(a);
    let nb = normalize(b);
    if na == nb {
        return true;
    }
    if na.contains(&nb) || nb.contains(&na) {
        return true;
    }
    let lcs = longest_common_substring_len(&na, &nb);
    let ratio = lcs as f64 / na.len().max(nb.len()).max(1) as f64;
    ratio >= 0.6
}

fn existing_keys(conn: &Connection, project: &str) -> EngineResult<Vec<(String, String)>> {
    let mut stmt = conn
        .prepare("SELECT key, category FROM knowledge WHERE project = ?1")
        .map_err(|e| EngineError::from(StoreError::from(e)))?;
    let rows = stmt
        .query_map(params![project], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
        .map_err(|e| EngineError::from(StoreError::from(e)))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| EngineError::from(StoreError::from(e)))?;
    Ok(rows)
}

fn find_claimed_node(conn: &Connection, project: &str, agent: &str) -> EngineResult<Option<String>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, properties FROM nodes WHERE project = ?1
             AND json_extract(properties, '$._claimed_by') = ?2
             ORDER BY json_extract(properties, '$._claimed_at') DESC LIMIT 1",
        )
        .map_err(|e| EngineError::from(StoreError::from(e)))?;
    let id = stmt
        .query_row(params![project, agent], |row| row.get::<_, String>(0))
        .optional()
        .map_err(|e| EngineError::from(StoreError::from(e)))?;
    Ok(id)
}

fn get_opt(conn: &Connection, project: &str, key: &str) -> EngineResult<Option<KnowledgeEntry>> {
    conn.query_row(
        "SELECT * FROM knowledge WHERE project = ?1 AND key = ?2",
        params![project, key],
        row_to_knowledge,
    )
    .optional()
    .map_err(|e| EngineError::from(StoreError::from(e)))
}

pub fn write(
    conn: &Connection,
    project: &str,
    key: &str,
    content: &str,
    category: Category,
    source_node: Option<&str>,
    agent: &str,
) -> EngineResult<WriteOutcome> {
    let existing = get_opt(conn, project, key)?;
    let now = now_rfc3339();

    let mut similar_keys = Vec::new();
    let mut same_category_overlap = Vec::new();
    if existing.is_none() {
        for (other_key, other_category) in existing_keys(conn, project)? {
            if keys_are_similar(key, &other_key) {
                similar_keys.push(other_key.clone());
                if other_category == category.as_str() {
                    same_category_overlap.push(other_key);
                }
            }
        }
    }

    let resolved_source = source_node
        .map(|s| s.to_string())
        .or(existing.as_ref().and_then(|e| e.source_node.clone()))
        .or(find_claimed_node(conn, project, agent)?);

    let (id, created_by, created_at, old_content, action) = match &existing {
        Some(e) => (
            e.id.clone(),
            e.created_by.clone(),
            e.created_at.to_rfc3339(),
            Some(e.content.clone()),
            KnowledgeAction::Updated,
        ),
        None => (new_id(), agent.to_string(), now.clone(), None, KnowledgeAction::Created),
    };

    conn.execute(
        "INSERT INTO knowledge (id, project, key, content, category, source_node, created_by, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(project, key) DO UPDATE SET
            content = excluded.content, category = excluded.category,
            source_node = excluded.source_node, updated_at = excluded.updated_at",
        params![id, project, key, content, category.as_str(), resolved_source, created_by, created_at, now],
    )
    .map_err(StoreError::from)?;

    conn.execute(
        "INSERT INTO knowledge_log (project, key, action, old_content, new_content, agent, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![project, key, action.as_str(), old_content, content, agent, now],
    )
    .map_err(StoreError::from)?;

    let entry = get_opt(conn, project, key)?.expect("just written");
    Ok(WriteOutcome { entry, similar_keys, same_category_overlap })
}

pub fn read(conn: &Connection, project: &str, key: Option<&str>) -> EngineResult<Vec<KnowledgeView>> {
    let entries = match key {
        Some(k) => match get_opt(conn, project, k)? {
            Some(e) => vec![e],
            None => vec![],
        },
        None => {
            let mut stmt = conn
                .prepare("SELECT * FROM knowledge WHERE project = ?1 ORDER BY key ASC")
                .map_err(|e| EngineError::from(StoreError::from(e)))?;
            stmt.query_map(params![project], row_to_knowledge)
                .map_err(|e| EngineError::from(StoreError::from(e)))?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|e| EngineError::from(StoreError::from(e)))?
        }
    };

    let now = Utc::now();
    let mut out = Vec::with_capacity(entries.len());
    for entry in entries {
        let days_since_update = now.signed_duration_since(entry.updated_at).num_days();
        let source_node_resolved = match &entry.source_node {
            Some(id) => crate::node_ops::get_opt(conn, id)?.map(|n| n.resolved),
            None => None,
        };
        out.push(KnowledgeView { entry, days_since_update, source_node_resolved });
    }
    Ok(out)
}

pub fn delete(conn: &Connection, project: &str, key: &str, agent: &str) -> EngineResult<()> {
    let existing = get_opt(conn, project, key)?
        .ok_or_else(|| EngineError::new(crate::error::ErrorCode::NodeNotFound, format!("knowledge key '{key}' not found in '{project}'")))?;

    conn.execute("DELETE FROM knowledge WHERE project = ?1 AND key = ?2", params![project, key])
        .map_err(StoreError::from)?;

    let now = now_rfc3339();
    conn.execute(
        "INSERT INTO knowledge_log (project, key, action, old_content, new_content, agent, timestamp)
         VALUES (?1, ?2, ?3, ?4, NULL, ?5, ?6)",
        params![project, key, KnowledgeAction::Deleted.as_str(), existing.content, agent, now],
    )
    .map_err(StoreError::from)?;

    Ok(())
}

pub fn search(conn: &Connection, project: &str, query: &str) -> EngineResult<Vec<KnowledgeEntry>> {
    let pattern = format!("%{}%", query.to_lowercase());
    let mut stmt = conn
        .prepare(
            "SELECT * FROM knowledge WHERE project = ?1
             AND (LOWER(key) LIKE ?2 OR LOWER(content) LIKE ?2) ORDER BY key ASC",
        )
        .map_err(|e| EngineError::from(StoreError::from(e)))?;
    let rows = stmt
        .query_map(params![project, pattern], row_to_knowledge)
        .map_err(|e| EngineError::from(StoreError::from(e)))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| EngineError::from(StoreError::from(e)))?;
    Ok(rows)
}
