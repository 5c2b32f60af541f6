//! Persistent, agent-facing task-graph engine.
//!
//! Nodes form a rooted tree per project; `depends_on` edges layer a DAG on
//! top for ordering; every mutation is logged to an append-only event
//! table. Handlers in [`handlers`] compose the lower layers and are the
//! surface a transport (see the `taskgraph-agent` crate) dispatches into.

pub mod algorithms;
pub mod claims;
pub mod config;
pub mod edge_ops;
pub mod error;
pub mod events;
pub mod handlers;
pub mod integrity;
pub mod knowledge_store;
mod model;
pub mod node_ops;
pub mod restructure;
mod store;
pub mod value;

pub use config::Config;
pub use error::{EngineError, EngineResult, ErrorCode, StoreError, StoreResult};
pub use model::{
    Category, Change, Discovery, Edge, EdgeType, Evidence, Event, EventAction, KnowledgeAction,
    KnowledgeEntry, KnowledgeLogEntry, Node,
};
pub use store::Store;
pub use value::{PropertyMap, Value};
