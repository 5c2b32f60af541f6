//! Resolves a `method` name to a `taskgraph-core` handler call, translating
//! the loosely-typed JSON `params` object into the handler's argument types
//! and its return value back into JSON. No graph semantics live here.

use serde_json::Value;

use taskgraph_core::handlers::{
    self, ConnectInput, NextFilter, PlanNodeInput, QueryFilter, RestructureOp, Sort, UpdateInput,
};
use taskgraph_core::knowledge_store::KnowledgeView;
use taskgraph_core::{Category, Config, Discovery, EngineError, Store};

use crate::protocol::types::ErrorEnvelope;

pub struct Engine {
    pub store: Store,
    pub cfg: Config,
}

impl Engine {
    pub fn new(store: Store, cfg: Config) -> Self {
        Self { store, cfg }
    }
}

type DispatchResult = Result<Value, ErrorEnvelope>;

pub fn dispatch(engine: &Engine, method: &str, params: Option<Value>) -> DispatchResult {
    let params = params.unwrap_or(Value::Null);
    match method {
        "graph_open" => graph_open(engine, params),
        "graph_plan" => graph_plan(engine, params),
        "graph_next" => graph_next(engine, params),
        "graph_context" => graph_context(engine, params),
        "graph_update" => graph_update(engine, params),
        "graph_connect" => graph_connect(engine, params),
        "graph_query" => graph_query(engine, params),
        "graph_restructure" => graph_restructure(engine, params),
        "graph_history" => graph_history(engine, params),
        "graph_onboard" => graph_onboard(engine, params),
        "graph_status" => graph_status(engine, params),
        "graph_resolve" => graph_resolve(engine, params),
        "graph_knowledge_read" => graph_knowledge_read(engine, params),
        "graph_knowledge_write" => graph_knowledge_write(engine, params),
        "graph_knowledge_delete" => graph_knowledge_delete(engine, params),
        "graph_knowledge_search" => graph_knowledge_search(engine, params),
        "graph_knowledge_audit" => graph_knowledge_audit(engine, params),
        "graph_retro" => graph_retro(engine, params),
        "graph_roadmap" => graph_roadmap(engine, params),
        other => Err(ErrorEnvelope::method_not_found(other)),
    }
}

// ---------------------------------------------------------------------
// param extraction helpers — `Value::get` already returns `None` for any
// non-object/array value, so a missing or malformed `params` body degrades
// to "every field absent" rather than needing a special case here.
// ---------------------------------------------------------------------

fn require_str<'a>(params: &'a Value, field: &str) -> Result<&'a str, ErrorEnvelope> {
    params
        .get(field)
        .and_then(|v| v.as_str())
        .ok_or_else(|| ErrorEnvelope::invalid_params(format!("'{field}' is required and must be a string")))
}

fn require_array<'a>(params: &'a Value, field: &str) -> Result<&'a Vec<Value>, ErrorEnvelope> {
    params
        .get(field)
        .and_then(|v| v.as_array())
        .ok_or_else(|| ErrorEnvelope::invalid_params(format!("'{field}' is required and must be an array")))
}

fn opt_str<'a>(params: &'a Value, field: &str) -> Option<&'a str> {
    params.get(field).and_then(|v| v.as_str())
}

fn opt_i64(params: &Value, field: &str) -> Option<i64> {
    params.get(field).and_then(|v| v.as_i64())
}

fn opt_bool(params: &Value, field: &str) -> Option<bool> {
    params.get(field).and_then(|v| v.as_bool())
}

fn opt_str_vec(params: &Value, field: &str) -> Vec<String> {
    params
        .get(field)
        .and_then(|v| v.as_array())
        .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

fn opt_property_map(params: &Value, field: &str) -> taskgraph_core::PropertyMap {
    match params.get(field) {
        Some(v @ Value::Object(_)) => match taskgraph_core::Value::from(v.clone()) {
            taskgraph_core::Value::Map(m) => m,
            _ => Default::default(),
        },
        _ => Default::default(),
    }
}

/// Parses a `[key, value]` pair (e.g. `filter.property_equals`,
/// `filter.ancestor_filter`) into `(String, taskgraph_core::Value)`.
fn opt_property_pair(raw: &Value, field: &str) -> Option<(String, taskgraph_core::Value)> {
    let pair = raw.get(field)?.as_array()?;
    if pair.len() != 2 {
        return None;
    }
    Some((pair[0].as_str()?.to_string(), taskgraph_core::Value::from(pair[1].clone())))
}

fn agent_or_default<'a>(params: &'a Value, cfg: &'a Config) -> &'a str {
    opt_str(params, "agent").unwrap_or(cfg.agent_id.as_str())
}

fn to_json<T: serde::Serialize>(v: T) -> Value {
    serde_json::to_value(v).unwrap_or(Value::Null)
}

fn engine_err(e: EngineError) -> ErrorEnvelope {
    ErrorEnvelope::from(e)
}

// ---------------------------------------------------------------------
// handlers
// ---------------------------------------------------------------------

fn graph_open(engine: &Engine, params: Value) -> DispatchResult {
    let project = opt_str(&params, "project");
    let goal = opt_str(&params, "goal");
    let agent = agent_or_default(&params, &engine.cfg);

    let conn = engine.store.writer();
    handlers::open(&conn, project, goal, agent).map(to_json).map_err(engine_err)
}

fn graph_plan(engine: &Engine, params: Value) -> DispatchResult {
    let project = require_str(&params, "project")?;
    let agent = agent_or_default(&params, &engine.cfg).to_string();
    let decision_context = opt_str(&params, "decision_context");
    let raw_nodes = require_array(&params, "nodes")?;

    let mut nodes = Vec::with_capacity(raw_nodes.len());
    for n in raw_nodes {
        nodes.push(PlanNodeInput {
            node_ref: require_str(n, "ref")?.to_string(),
            parent_ref: require_str(n, "parent_ref")?.to_string(),
            summary: require_str(n, "summary")?.to_string(),
            context_links: opt_str_vec(n, "context_links"),
            properties: opt_property_map(n, "properties"),
            depends_on: opt_str_vec(n, "depends_on"),
        });
    }

    let conn = engine.store.writer();
    handlers::plan(&conn, project, nodes, decision_context, &agent).map(to_json).map_err(engine_err)
}

fn graph_next(engine: &Engine, params: Value) -> DispatchResult {
    let project = require_str(&params, "project")?;
    let scope = opt_str(&params, "scope");
    let filter_raw = params.get("filter").cloned().unwrap_or(Value::Null);
    let filter = NextFilter {
        property_equals: opt_property_pair(&filter_raw, "property_equals"),
        ancestor_filter: opt_property_pair(&params, "ancestor_filter"),
    };
    let limit = opt_i64(&params, "count").or_else(|| opt_i64(&params, "limit")).unwrap_or(5);
    let claim = opt_bool(&params, "claim").unwrap_or(false);
    let agent = agent_or_default(&params, &engine.cfg);

    // Claiming mutates node state, so `next` always takes the writer
    // connection rather than branching on whether `claim` was requested.
    let conn = engine.store.writer();
    handlers::next(&conn, project, scope, &filter, limit, claim, agent, &engine.cfg).map(to_json).map_err(engine_err)
}

fn graph_context(engine: &Engine, params: Value) -> DispatchResult {
    let node_id = require_str(&params, "node_id")?;
    let children_depth = opt_i64(&params, "children_depth").unwrap_or(2);

    let conn = engine.store.reader();
    handlers::context(&conn, node_id, children_depth).map(to_json).map_err(engine_err)
}

fn parse_discovery(v: &Value, field: &str) -> Result<Option<Discovery>, ErrorEnvelope> {
    match v.get(field).and_then(|v| v.as_str()) {
        Some(s) => s.parse::<Discovery>().map(Some).map_err(ErrorEnvelope::invalid_params),
        None => Ok(None),
    }
}

fn graph_update(engine: &Engine, params: Value) -> DispatchResult {
    let decision_context = opt_str(&params, "decision_context");
    let agent = agent_or_default(&params, &engine.cfg).to_string();
    let raw_updates = require_array(&params, "updates")?;

    let mut inputs = Vec::with_capacity(raw_updates.len());
    for u in raw_updates {
        let evidence_add = u
            .get("evidence_add")
            .and_then(|v| v.as_array())
            .map(|a| {
                a.iter()
                    .filter_map(|e| {
                        Some(taskgraph_core::node_ops::EvidenceInput {
                            kind: require_str(e, "type").ok()?.to_string(),
                            reference: require_str(e, "ref").ok()?.to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        inputs.push(UpdateInput {
            node_id: require_str(u, "node_id")?.to_string(),
            expected_rev: opt_i64(u, "expected_rev"),
            summary: opt_str(u, "summary").map(str::to_string),
            resolved: opt_bool(u, "resolved"),
            resolved_reason: opt_str(u, "resolved_reason").map(str::to_string),
            blocked: opt_bool(u, "blocked"),
            blocked_reason: opt_str(u, "blocked_reason").map(str::to_string),
            discovery: parse_discovery(u, "discovery")?,
            plan: u
                .get("plan")
                .and_then(|v| v.as_array())
                .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect()),
            state: u.get("state").cloned(),
            properties_patch: opt_property_map(u, "properties_patch"),
            context_links_add: opt_str_vec(u, "context_links_add"),
            context_links_remove: opt_str_vec(u, "context_links_remove"),
            evidence_add,
        });
    }

    let conn = engine.store.writer();
    handlers::update(&conn, inputs, decision_context, &agent).map(to_json).map_err(engine_err)
}

fn graph_connect(engine: &Engine, params: Value) -> DispatchResult {
    let agent = agent_or_default(&params, &engine.cfg).to_string();
    let raw_edges = require_array(&params, "edges")?;

    let mut edges = Vec::with_capacity(raw_edges.len());
    for e in raw_edges {
        edges.push(ConnectInput {
            from: require_str(e, "from")?.to_string(),
            to: require_str(e, "to")?.to_string(),
            edge_type: require_str(e, "edge_type")?.to_string(),
            remove: opt_bool(e, "remove").unwrap_or(false),
        });
    }

    let conn = engine.store.writer();
    handlers::connect(&conn, edges, &agent).map(to_json).map_err(engine_err)
}

fn parse_sort(s: Option<&str>) -> Sort {
    match s {
        Some("depth") => Sort::Depth,
        Some("recent") => Sort::Recent,
        Some("created") => Sort::Created,
        _ => Sort::Readiness,
    }
}

fn graph_query(engine: &Engine, params: Value) -> DispatchResult {
    let project = require_str(&params, "project")?;
    let sort = parse_sort(opt_str(&params, "sort"));
    let limit = opt_i64(&params, "limit").unwrap_or(20);
    let cursor = opt_str(&params, "cursor");
    let filter_raw = params.get("filter").cloned().unwrap_or(Value::Null);

    let claimed_by = match filter_raw.get("claimed_by") {
        None => None,
        Some(Value::Null) => Some(None),
        Some(v) => v.as_str().map(|s| Some(s.to_string())),
    };
    let filter = QueryFilter {
        resolved: filter_raw.get("resolved").and_then(|v| v.as_bool()),
        property_equals: opt_property_pair(&filter_raw, "property_equals"),
        text: filter_raw.get("text").and_then(|v| v.as_str()).map(str::to_string),
        ancestor: filter_raw.get("ancestor").and_then(|v| v.as_str()).map(str::to_string),
        has_evidence_type: filter_raw.get("has_evidence_type").and_then(|v| v.as_str()).map(str::to_string),
        is_leaf: filter_raw.get("is_leaf").and_then(|v| v.as_bool()),
        is_actionable: filter_raw.get("is_actionable").and_then(|v| v.as_bool()),
        is_blocked: filter_raw.get("is_blocked").and_then(|v| v.as_bool()),
        claimed_by,
    };

    let conn = engine.store.reader();
    handlers::query(&conn, project, filter, sort, limit, cursor).map(to_json).map_err(engine_err)
}

fn graph_restructure(engine: &Engine, params: Value) -> DispatchResult {
    let agent = agent_or_default(&params, &engine.cfg).to_string();
    let raw_ops = require_array(&params, "operations")?;

    let mut operations = Vec::with_capacity(raw_ops.len());
    for op in raw_ops {
        let kind = require_str(op, "op")?;
        let parsed = match kind {
            "move" => RestructureOp::Move {
                node_id: require_str(op, "node_id")?.to_string(),
                new_parent_id: require_str(op, "new_parent_id")?.to_string(),
            },
            "merge" => RestructureOp::Merge {
                source_id: require_str(op, "source_id")?.to_string(),
                target_id: require_str(op, "target_id")?.to_string(),
            },
            "drop" => RestructureOp::Drop {
                node_id: require_str(op, "node_id")?.to_string(),
                reason: require_str(op, "reason")?.to_string(),
            },
            "delete" => RestructureOp::Delete { node_id: require_str(op, "node_id")?.to_string() },
            other => return Err(ErrorEnvelope::invalid_params(format!("unknown restructure op '{other}'"))),
        };
        operations.push(parsed);
    }

    let conn = engine.store.writer();
    handlers::restructure(&conn, operations, &agent).map(to_json).map_err(engine_err)
}

fn graph_history(engine: &Engine, params: Value) -> DispatchResult {
    let node_id = require_str(&params, "node_id")?;
    let limit = opt_i64(&params, "limit").unwrap_or(50);
    let cursor = opt_str(&params, "cursor");

    let conn = engine.store.reader();
    handlers::history(&conn, node_id, limit, cursor).map(to_json).map_err(engine_err)
}

fn graph_onboard(engine: &Engine, params: Value) -> DispatchResult {
    let project = require_str(&params, "project")?;
    let evidence_limit = opt_i64(&params, "evidence_limit").unwrap_or(10);

    let conn = engine.store.reader();
    handlers::onboard(&conn, project, evidence_limit).map(to_json).map_err(engine_err)
}

fn graph_status(engine: &Engine, params: Value) -> DispatchResult {
    let project = require_str(&params, "project")?;

    let conn = engine.store.reader();
    handlers::status(&conn, project).map(Value::String).map_err(engine_err)
}

fn graph_resolve(engine: &Engine, params: Value) -> DispatchResult {
    let node_id = require_str(&params, "node_id")?;
    let message = require_str(&params, "message")?;
    let agent = agent_or_default(&params, &engine.cfg).to_string();
    let test_result = opt_str(&params, "test_result");
    let commit = opt_str(&params, "commit");
    let context_links = opt_str_vec(&params, "context_links");
    let repo_root = opt_str(&params, "repo_root").map(std::path::Path::new);

    let knowledge = match params.get("knowledge") {
        Some(k) if !k.is_null() => {
            let category = match opt_str(k, "category") {
                Some(c) => c.parse::<Category>().map_err(ErrorEnvelope::invalid_params)?,
                None => Category::General,
            };
            Some(handlers::KnowledgeInput {
                key: require_str(k, "key")?.to_string(),
                content: require_str(k, "content")?.to_string(),
                category: Some(category),
            })
        }
        _ => None,
    };

    let conn = engine.store.writer();
    handlers::resolve(&conn, node_id, message, test_result, commit, context_links, knowledge, repo_root, &agent)
        .map(to_json)
        .map_err(engine_err)
}

fn graph_knowledge_read(engine: &Engine, params: Value) -> DispatchResult {
    let project = require_str(&params, "project")?;
    let key = opt_str(&params, "key");

    let conn = engine.store.reader();
    handlers::knowledge_read(&conn, project, key)
        .map(|views: Vec<KnowledgeView>| to_json(views))
        .map_err(engine_err)
}

fn graph_knowledge_write(engine: &Engine, params: Value) -> DispatchResult {
    let project = require_str(&params, "project")?;
    let key = require_str(&params, "key")?;
    let content = require_str(&params, "content")?;
    let category = match opt_str(&params, "category") {
        Some(c) => c.parse::<Category>().map_err(ErrorEnvelope::invalid_params)?,
        None => Category::General,
    };
    let source_node = opt_str(&params, "source_node");
    let agent = agent_or_default(&params, &engine.cfg).to_string();

    let conn = engine.store.writer();
    handlers::knowledge_write(&conn, project, key, content, category, source_node, &agent)
        .map(to_json)
        .map_err(engine_err)
}

fn graph_knowledge_delete(engine: &Engine, params: Value) -> DispatchResult {
    let project = require_str(&params, "project")?;
    let key = require_str(&params, "key")?;
    let agent = agent_or_default(&params, &engine.cfg).to_string();

    let conn = engine.store.writer();
    handlers::knowledge_delete(&conn, project, key, &agent).map(|_| Value::Null).map_err(engine_err)
}

fn graph_knowledge_search(engine: &Engine, params: Value) -> DispatchResult {
    let project = require_str(&params, "project")?;
    let query = require_str(&params, "query")?;

    let conn = engine.store.reader();
    handlers::knowledge_search(&conn, project, query).map(to_json).map_err(engine_err)
}

fn graph_knowledge_audit(engine: &Engine, params: Value) -> DispatchResult {
    let project = require_str(&params, "project")?;

    let conn = engine.store.reader();
    handlers::knowledge_audit(&conn, project).map(to_json).map_err(engine_err)
}

fn graph_retro(engine: &Engine, params: Value) -> DispatchResult {
    let project = require_str(&params, "project")?;
    let findings = opt_str(&params, "findings");
    let agent = agent_or_default(&params, &engine.cfg).to_string();

    let conn = engine.store.writer();
    handlers::retro(&conn, project, findings, &agent).map(to_json).map_err(engine_err)
}

fn graph_roadmap(engine: &Engine, params: Value) -> DispatchResult {
    let project = require_str(&params, "project")?;

    let conn = engine.store.reader();
    handlers::roadmap(&conn, project).map(to_json).map_err(engine_err)
}
