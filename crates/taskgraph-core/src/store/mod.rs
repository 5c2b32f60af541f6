//! Storage layer: connection management, migrations, and row mapping.

pub mod migrations;
mod rows;
mod sqlite;

pub use rows::{row_to_edge, row_to_event, row_to_knowledge, row_to_knowledge_log, row_to_node};
pub use sqlite::{new_id, now_rfc3339, Store};
