//! `connect` — batch edge add/remove (spec.md §4.6).

use rusqlite::Connection;
use serde::Serialize;

use crate::error::{EngineError, EngineResult, ErrorCode};
use crate::model::Edge;

#[derive(Debug, Clone)]
pub struct ConnectInput {
    pub from: String,
    pub to: String,
    pub edge_type: String,
    pub remove: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectResult {
    pub added: Vec<Edge>,
    pub removed: usize,
}

pub fn connect(conn: &Connection, edges: Vec<ConnectInput>, agent: &str) -> EngineResult<ConnectResult> {
    let mut added = Vec::new();
    let mut removed = 0usize;

    for input in edges {
        if input.edge_type == "parent" {
            return Err(EngineError::new(
                ErrorCode::EdgeRejected,
                "type=parent is rejected by connect; use restructure{op:move} to change a node's parent",
            ));
        }

        if input.remove {
            crate::edge_ops::remove_edge(conn, &input.from, &input.to, &input.edge_type, agent)?;
            removed += 1;
        } else {
            let edge = crate::edge_ops::add_edge(conn, &input.from, &input.to, &input.edge_type, agent)?;
            added.push(edge);
        }
    }

    Ok(ConnectResult { added, removed })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node_ops::create;
    use crate::value::PropertyMap;
    use tempfile::TempDir;

    fn open_store() -> (crate::store::Store, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = crate::store::Store::new(Some(dir.path().join("t.db"))).unwrap();
        (store, dir)
    }

    #[test]
    fn parent_type_is_rejected() {
        let (store, _dir) = open_store();
        let conn = store.writer();
        let root = create(&conn, "p", None, "root", PropertyMap::new(), vec![], None, None, None, "a").unwrap();
        let leaf = create(&conn, "p", Some(&root.id), "leaf", PropertyMap::new(), vec![], None, None, None, "a").unwrap();

        let err = connect(
            &conn,
            vec![ConnectInput { from: leaf.id.clone(), to: root.id.clone(), edge_type: "parent".into(), remove: false }],
            "agent",
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::EdgeRejected);
    }

    #[test]
    fn batch_add_then_remove() {
        let (store, _dir) = open_store();
        let conn = store.writer();
        let root = create(&conn, "p", None, "root", PropertyMap::new(), vec![], None, None, None, "a").unwrap();
        let a = create(&conn, "p", Some(&root.id), "a", PropertyMap::new(), vec![], None, None, None, "a").unwrap();
        let b = create(&conn, "p", Some(&root.id), "b", PropertyMap::new(), vec![], None, None, None, "a").unwrap();

        let result = connect(
            &conn,
            vec![ConnectInput { from: a.id.clone(), to: b.id.clone(), edge_type: "depends_on".into(), remove: false }],
            "agent",
        )
        .unwrap();
        assert_eq!(result.added.len(), 1);

        let result = connect(
            &conn,
            vec![ConnectInput { from: a.id.clone(), to: b.id.clone(), edge_type: "depends_on".into(), remove: true }],
            "agent",
        )
        .unwrap();
        assert_eq!(result.removed, 1);
    }
}
