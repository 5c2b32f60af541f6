//! `open` — project entry point (spec.md §4.6).

use rusqlite::Connection;
use serde::Serialize;

use crate::error::EngineResult;
use crate::model::{Discovery, Node};
use crate::node_ops::{self, ProjectSummary};
use crate::value::PropertyMap;

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum OpenResult {
    Projects { projects: Vec<ProjectSummary> },
    Project { root: Node, hint: String },
}

fn hint_for(root: &Node) -> String {
    if root.discovery == Some(Discovery::Pending) {
        return format!(
            "root '{}' has no decomposition yet — call graph_plan to break it into nodes, then graph_update(updates:[{{id:'{}',discovery:'done'}}])",
            root.id, root.id
        );
    }
    if root.resolved {
        return "project root is resolved — call graph_onboard to review before closing out".into();
    }
    format!("call graph_next(project:'{}', claim:true) to pick up the next actionable task", root.project)
}

pub fn open(conn: &Connection, project: Option<&str>, goal: Option<&str>, agent: &str) -> EngineResult<OpenResult> {
    let Some(project) = project else {
        return Ok(OpenResult::Projects { projects: node_ops::list_projects(conn)? });
    };

    let root = match node_ops::project_root(conn, project)? {
        Some(root) => root,
        None => {
            let summary = goal.unwrap_or(project);
            node_ops::create(
                conn,
                project,
                None,
                summary,
                PropertyMap::new(),
                vec![],
                None,
                None,
                Some(Discovery::Pending),
                agent,
            )?
        }
    };

    let hint = hint_for(&root);
    Ok(OpenResult::Project { root, hint })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store() -> (crate::store::Store, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = crate::store::Store::new(Some(dir.path().join("t.db"))).unwrap();
        (store, dir)
    }

    #[test]
    fn opening_new_project_creates_pending_root() {
        let (store, _dir) = open_store();
        let conn = store.writer();
        let result = open(&conn, Some("demo"), Some("ship v1"), "agent").unwrap();
        match result {
            OpenResult::Project { root, hint } => {
                assert_eq!(root.summary, "ship v1");
                assert_eq!(root.discovery, Some(Discovery::Pending));
                assert!(hint.contains("graph_plan"));
            }
            _ => panic!("expected a project result"),
        }
    }

    #[test]
    fn opening_without_project_lists_projects() {
        let (store, _dir) = open_store();
        let conn = store.writer();
        open(&conn, Some("demo"), None, "agent").unwrap();
        match open(&conn, None, None, "agent").unwrap() {
            OpenResult::Projects { projects } => assert_eq!(projects.len(), 1),
            _ => panic!("expected a projects listing"),
        }
    }
}
