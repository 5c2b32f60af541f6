//! `knowledge_audit` — flags stale, orphaned, and overlap-candidate
//! knowledge entries (spec.md §4.7).

use rusqlite::Connection;
use serde::Serialize;

use crate::error::EngineResult;
use crate::knowledge_store::{keys_are_similar, read, KnowledgeView};

const STALE_DAYS: i64 = 90;

#[derive(Debug, Clone, Serialize)]
pub struct FlaggedEntry {
    pub view: KnowledgeView,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct KnowledgeAuditResult {
    pub flagged: Vec<FlaggedEntry>,
    /// Compact `"key|category|days_since_update"` lines for entries with
    /// nothing to flag.
    pub healthy: Vec<String>,
}

pub fn knowledge_audit(conn: &Connection, project: &str) -> EngineResult<KnowledgeAuditResult> {
    let views = read(conn, project, None)?;

    let mut overlap_keys = std::collections::HashSet::new();
    for (i, a) in views.iter().enumerate() {
        for b in views.iter().skip(i + 1) {
            if keys_are_similar(&a.entry.key, &b.entry.key) {
                overlap_keys.insert(a.entry.key.clone());
                overlap_keys.insert(b.entry.key.clone());
            }
        }
    }

    let mut flagged = Vec::new();
    let mut healthy = Vec::new();

    for view in views {
        let mut reasons = Vec::new();
        if view.days_since_update > STALE_DAYS {
            reasons.push(format!("not updated in {} days", view.days_since_update));
        }
        if view.entry.source_node.is_none() {
            reasons.push("no source_node recorded".to_string());
        }
        if overlap_keys.contains(&view.entry.key) {
            reasons.push("key overlaps with another entry in this project".to_string());
        }

        if reasons.is_empty() {
            healthy.push(format!("{}|{}|{}d", view.entry.key, view.entry.category.as_str(), view.days_since_update));
        } else {
            flagged.push(FlaggedEntry { view, reasons });
        }
    }

    Ok(KnowledgeAuditResult { flagged, healthy })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge_store::write;
    use crate::model::Category;
    use tempfile::TempDir;

    fn open_store() -> (crate::store::Store, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = crate::store::Store::new(Some(dir.path().join("t.db"))).unwrap();
        (store, dir)
    }

    #[test]
    fn orphaned_entry_without_source_node_is_flagged() {
        let (store, _dir) = open_store();
        let conn = store.writer();
        write(&conn, "p", "gotcha", "watch out for X", Category::General, None, "agent").unwrap();

        let result = knowledge_audit(&conn, "p").unwrap();
        assert_eq!(result.flagged.len(), 1);
        assert!(result.flagged[0].reasons.iter().any(|r| r.contains("source_node")));
    }

    #[test]
    fn overlapping_keys_are_both_flagged() {
        let (store, _dir) = open_store();
        let conn = store.writer();
        write(&conn, "p", "auth-design", "use JWT", Category::Decision, Some("n1"), "agent").unwrap();
        write(&conn, "p", "authdesign", "use JWT too", Category::Decision, Some("n2"), "agent").unwrap();

        let result = knowledge_audit(&conn, "p").unwrap();
        assert_eq!(result.flagged.len(), 2);
    }

    #[test]
    fn clean_entry_is_reported_as_healthy() {
        let (store, _dir) = open_store();
        let conn = store.writer();
        write(&conn, "p", "convention", "use snake_case", Category::Convention, Some("n1"), "agent").unwrap();

        let result = knowledge_audit(&conn, "p").unwrap();
        assert_eq!(result.healthy.len(), 1);
        assert!(result.healthy[0].starts_with("convention|convention|"));
    }
}
