//! Thin handler-layer wrappers over [`crate::knowledge_store`] (spec.md §4.7).

use rusqlite::Connection;

use crate::error::EngineResult;
use crate::knowledge_store::{KnowledgeView, WriteOutcome};
use crate::model::{Category, KnowledgeEntry};

pub fn knowledge_write(
    conn: &Connection,
    project: &str,
    key: &str,
    content: &str,
    category: Category,
    source_node: Option<&str>,
    agent: &str,
) -> EngineResult<WriteOutcome> {
    crate::knowledge_store::write(conn, project, key, content, category, source_node, agent)
}

pub fn knowledge_read(conn: &Connection, project: &str, key: Option<&str>) -> EngineResult<Vec<KnowledgeView>> {
    crate::knowledge_store::read(conn, project, key)
}

pub fn knowledge_delete(conn: &Connection, project: &str, key: &str, agent: &str) -> EngineResult<()> {
    crate::knowledge_store::delete(conn, project, key, agent)
}

pub fn knowledge_search(conn: &Connection, project: &str, query: &str) -> EngineResult<Vec<KnowledgeEntry>> {
    crate::knowledge_store::search(conn, project, query)
}
