//! `retro` — gathers resolved work since the last retro, optionally records
//! findings as knowledge (spec.md §4.7).

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::error::{EngineError, EngineResult};
use crate::knowledge_store::{write, WriteOutcome};
use crate::model::{Category, KnowledgeEntry, Node};
use crate::store::{now_rfc3339, row_to_knowledge};

#[derive(Debug, Clone, Serialize)]
pub struct RetroResult {
    pub resolved_since_last_retro: Vec<Node>,
    pub knowledge_context: Vec<KnowledgeEntry>,
    pub recorded: Option<WriteOutcome>,
    pub instruction_candidates: Vec<String>,
}

fn last_retro_at(conn: &Connection, project: &str) -> EngineResult<Option<DateTime<Utc>>> {
    conn.query_row(
        "SELECT * FROM knowledge WHERE project = ?1 AND key LIKE 'retro-%' ORDER BY created_at DESC LIMIT 1",
        params![project],
        row_to_knowledge,
    )
    .optional()
    .map_err(|e| EngineError::from(crate::error::StoreError::from(e)))
    .map(|opt: Option<KnowledgeEntry>| opt.map(|e| e.created_at))
}

/// Resolved nodes since the last `retro-` knowledge entry, or since the
/// project's beginning if none exists yet. Shared with `next`'s retro-nudge
/// (spec.md §4.6) so both handlers agree on what "since the last retro" means.
pub(crate) fn resolved_since_last_retro(conn: &Connection, project: &str) -> EngineResult<Vec<Node>> {
    let since = last_retro_at(conn, project)?;

    let mut stmt = conn
        .prepare("SELECT * FROM nodes WHERE project = ?1 AND resolved = 1")
        .map_err(crate::error::StoreError::from)?;
    let mut resolved: Vec<Node> = stmt
        .query_map(params![project], crate::store::row_to_node)
        .map_err(crate::error::StoreError::from)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(crate::error::StoreError::from)?;
    if let Some(since) = since {
        resolved.retain(|n| n.updated_at > since);
    }
    resolved.sort_by(|a, b| a.updated_at.cmp(&b.updated_at));
    Ok(resolved)
}

fn instruction_candidates(findings: Option<&str>, resolved: &[Node]) -> Vec<String> {
    let mut out = Vec::new();
    if let Some(findings) = findings {
        for line in findings.lines() {
            let line = line.trim().trim_start_matches(['-', '*']).trim();
            if !line.is_empty() {
                out.push(line.to_string());
            }
        }
    }
    let decisions: Vec<&str> = resolved
        .iter()
        .flat_map(|n| n.evidence.iter())
        .filter(|e| e.kind == "note")
        .map(|e| e.reference.as_str())
        .collect();
    for d in decisions.into_iter().take(5) {
        out.push(format!("remember: {d}"));
    }
    out
}

pub fn retro(conn: &Connection, project: &str, findings: Option<&str>, agent: &str) -> EngineResult<RetroResult> {
    let resolved = resolved_since_last_retro(conn, project)?;

    let mut kstmt = conn
        .prepare("SELECT * FROM knowledge WHERE project = ?1 ORDER BY updated_at DESC LIMIT 10")
        .map_err(crate::error::StoreError::from)?;
    let knowledge_context: Vec<KnowledgeEntry> = kstmt
        .query_map(params![project], row_to_knowledge)
        .map_err(crate::error::StoreError::from)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(crate::error::StoreError::from)?;

    let instruction_candidates = instruction_candidates(findings, &resolved);

    let recorded = match findings {
        Some(text) => {
            let key = format!("retro-{}", now_rfc3339());
            Some(write(conn, project, &key, text, Category::Discovery, None, agent)?)
        }
        None => None,
    };

    Ok(RetroResult { resolved_since_last_retro: resolved, knowledge_context, recorded, instruction_candidates })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node_ops::{create, update, EvidenceInput, NodePatch};
    use crate::value::PropertyMap;
    use tempfile::TempDir;

    fn open_store() -> (crate::store::Store, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = crate::store::Store::new(Some(dir.path().join("t.db"))).unwrap();
        (store, dir)
    }

    #[test]
    fn retro_gathers_resolved_nodes_and_records_findings() {
        let (store, _dir) = open_store();
        let conn = store.writer();
        let root = create(&conn, "p", None, "root", PropertyMap::new(), vec![], None, None, None, "a").unwrap();
        let leaf = create(&conn, "p", Some(&root.id), "leaf", PropertyMap::new(), vec![], None, None, None, "a").unwrap();

        let mut patch = NodePatch::default();
        patch.evidence_add.push(EvidenceInput { kind: "note".into(), reference: "shipped it".into() });
        patch.resolved = Some(true);
        update(&conn, &leaf.id, "a", patch, None).unwrap();

        let result = retro(&conn, "p", Some("- keep tests close to code"), "agent").unwrap();
        assert_eq!(result.resolved_since_last_retro.len(), 1);
        assert!(result.recorded.is_some());
        assert!(result.instruction_candidates.iter().any(|i| i.contains("keep tests close to code")));
    }
}
