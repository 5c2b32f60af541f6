//! Tool handlers — the semantic surface a transport dispatches into
//! (spec.md §4.6/§4.7). Each module is a thin composition of the lower
//! `node_ops`/`edge_ops`/`algorithms`/`restructure`/`claims`/`knowledge_store`
//! layers; handlers hold no state of their own beyond the connection.

pub mod connect;
pub mod context;
pub mod history;
pub mod knowledge;
pub mod knowledge_audit;
pub mod next;
pub mod onboard;
pub mod open;
pub mod plan;
pub mod query;
pub mod resolve;
pub mod restructure;
pub mod retro;
pub mod roadmap;
pub mod status;
pub mod update;

pub use connect::{connect, ConnectInput, ConnectResult};
pub use context::{context, ContextResult};
pub use history::{history, HistoryResult};
pub use knowledge::{knowledge_delete, knowledge_read, knowledge_search, knowledge_write};
pub use knowledge_audit::{knowledge_audit, KnowledgeAuditResult};
pub use next::{next, NextFilter, NextResult};
pub use onboard::{onboard, OnboardResult};
pub use open::{open, OpenResult};
pub use plan::{plan, PlanNodeInput, PlanResult};
pub use query::{query, QueryFilter, QueryResult, Sort};
pub use resolve::{resolve, KnowledgeInput, ResolveResult};
pub use restructure::{restructure, RestructureOp, RestructureResult};
pub use retro::{retro, RetroResult};
pub use roadmap::{roadmap, RoadmapResult};
pub use status::status;
pub use update::{update, UpdateInput, UpdateResult};
