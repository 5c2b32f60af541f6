//! `context` — node + ancestors + children tree + dependency neighbourhood (spec.md §4.6).

use rusqlite::Connection;
use serde::Serialize;

use crate::algorithms::is_actionable;
use crate::error::EngineResult;
use crate::model::Node;
use crate::node_ops;

#[derive(Debug, Clone, Serialize)]
pub struct ChildTree {
    pub node: Node,
    pub children: Vec<ChildTree>,
    /// Set instead of recursing further when `depth` truncated the walk.
    pub child_count: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DependencyNeighbour {
    pub node: Node,
    pub satisfied: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContextResult {
    pub node: Node,
    pub ancestors: Vec<Node>,
    pub children: Vec<ChildTree>,
    pub depends_on: Vec<DependencyNeighbour>,
    pub depended_on_by: Vec<DependencyNeighbour>,
}

fn build_tree(conn: &Connection, node: Node, remaining_depth: i64) -> EngineResult<ChildTree> {
    let children = node_ops::children(conn, &node.id)?;
    if remaining_depth <= 0 {
        return Ok(ChildTree {
            child_count: (!children.is_empty()).then(|| children.len() as i64),
            node,
            children: vec![],
        });
    }

    let mut subtrees = Vec::with_capacity(children.len());
    for child in children {
        subtrees.push(build_tree(conn, child, remaining_depth - 1)?);
    }
    Ok(ChildTree { node, children: subtrees, child_count: None })
}

pub fn context(conn: &Connection, node_id: &str, children_depth: i64) -> EngineResult<ContextResult> {
    let node = node_ops::get(conn, node_id)?;
    let ancestors = node_ops::ancestors(conn, node_id)?;

    let root_tree = build_tree(conn, node.clone(), children_depth)?;
    let children = root_tree.children;

    let mut depends_on = Vec::new();
    for edge in crate::edge_ops::edges_from(conn, node_id, Some("depends_on"))? {
        let dep = node_ops::get(conn, &edge.to)?;
        depends_on.push(DependencyNeighbour { satisfied: dep.resolved, node: dep });
    }

    let mut depended_on_by = Vec::new();
    for edge in crate::edge_ops::edges_to(conn, node_id, Some("depends_on"))? {
        let dependent = node_ops::get(conn, &edge.from)?;
        let satisfied = is_actionable(conn, &dependent)?;
        depended_on_by.push(DependencyNeighbour { satisfied, node: dependent });
    }

    Ok(ContextResult { node, ancestors, children, depends_on, depended_on_by })
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
    fn children_tree_truncates_at_requested_depth() {
        let (store, _dir) = open_store();
        let conn = store.writer();
        let root = create(&conn, "p", None, "root", PropertyMap::new(), vec![], None, None, None, "a").unwrap();
        let mid = create(&conn, "p", Some(&root.id), "mid", PropertyMap::new(), vec![], None, None, None, "a").unwrap();
        create(&conn, "p", Some(&mid.id), "leaf", PropertyMap::new(), vec![], None, None, None, "a").unwrap();

        let result = context(&conn, &root.id, 1).unwrap();
        assert_eq!(result.children.len(), 1);
        assert_eq!(result.children[0].children.len(), 0);
        assert_eq!(result.children[0].child_count, Some(1));
    }

    #[test]
    fn dependency_neighbourhood_flags_satisfaction() {
        let (store, _dir) = open_store();
        let conn = store.writer();
        let root = create(&conn, "p", None, "root", PropertyMap::new(), vec![], None, None, None, "a").unwrap();
        let dep = create(&conn, "p", Some(&root.id), "dep", PropertyMap::new(), vec![], None, None, None, "a").unwrap();
        let task = create(&conn, "p", Some(&root.id), "task", PropertyMap::new(), vec![], None, None, None, "a").unwrap();
        crate::edge_ops::add_edge(&conn, &task.id, &dep.id, "depends_on", "a").unwrap();

        let result = context(&conn, &task.id, 0).unwrap();
        assert_eq!(result.depends_on.len(), 1);
        assert!(!result.depends_on[0].satisfied);

        let dep_ctx = context(&conn, &dep.id, 0).unwrap();
        assert_eq!(dep_ctx.depended_on_by.len(), 1);
    }
}
