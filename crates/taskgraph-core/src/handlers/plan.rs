//! `plan` — batch node creation with two-pass ref resolution (spec.md §4.6).

use std::collections::{HashMap, HashSet};

use rusqlite::Connection;
use serde::Serialize;

use crate::error::{EngineError, EngineResult, ErrorCode};
use crate::model::{Discovery, Node};
use crate::node_ops;
use crate::value::PropertyMap;

/// One entry in a `plan` batch. `parent_ref`/`depends_on` may each name
/// either another entry's `ref` (batch-local) or an existing node id;
/// resolution happens in two passes inside a single transaction.
#[derive(Debug, Clone)]
pub struct PlanNodeInput {
    pub node_ref: String,
    pub parent_ref: String,
    pub summary: String,
    pub context_links: Vec<String>,
    pub properties: PropertyMap,
    pub depends_on: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanResult {
    pub created: Vec<Node>,
    pub duplicate_warnings: Vec<DuplicateWarning>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DuplicateWarning {
    pub node_id: String,
    pub similar_to: String,
    pub reason: String,
}

fn normalize_terms(summary: &str) -> HashSet<String> {
    const STOP_WORDS: &[&str] = &["the", "a", "an", "and", "or", "to", "of", "for", "in", "on"];
    summary
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2 && !STOP_WORDS.contains(w))
        .map(|w| w.to_string())
        .collect()
}

fn term_overlap_ratio(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let shared = a.intersection(b).count();
    shared as f64 / a.len().min(b.len()) as f64
}

pub fn plan(conn: &Connection, project: &str, nodes: Vec<PlanNodeInput>, decision_context: Option<&str>, agent: &str) -> EngineResult<PlanResult> {
    if nodes.is_empty() {
        return Err(EngineError::new(ErrorCode::InvalidInput, "plan requires at least one node"));
    }

    let mut refs_seen = HashSet::new();
    for n in &nodes {
        if !refs_seen.insert(n.node_ref.clone()) {
            return Err(EngineError::new(ErrorCode::DuplicateRef, format!("batch ref '{}' used more than once", n.node_ref)));
        }
    }

    let parent_refs: HashSet<&str> = nodes.iter().map(|n| n.parent_ref.as_str()).collect();

    let mut ref_to_id: HashMap<String, String> = HashMap::new();
    let mut created = Vec::new();

    for input in &nodes {
        let is_parent_of_sibling = parent_refs.contains(input.node_ref.as_str());
        let discovery = if is_parent_of_sibling { Discovery::Done } else { Discovery::Pending };

        let parent_id = if let Some(id) = ref_to_id.get(&input.parent_ref) {
            id.clone()
        } else if node_ops::get_opt(conn, &input.parent_ref)?.is_some() {
            input.parent_ref.clone()
        } else {
            return Err(EngineError::new(ErrorCode::InvalidParentRef, format!("parent_ref '{}' resolves to nothing in this batch or the store", input.parent_ref)));
        };

        let node = node_ops::create_with_note(
            conn,
            project,
            Some(&parent_id),
            &input.summary,
            input.properties.clone(),
            input.context_links.clone(),
            None,
            None,
            Some(discovery),
            agent,
            decision_context,
        )?;

        ref_to_id.insert(input.node_ref.clone(), node.id.clone());
        created.push(node);
    }

    for input in &nodes {
        let from_id = &ref_to_id[&input.node_ref];
        for dep_ref in &input.depends_on {
            let to_id = if let Some(id) = ref_to_id.get(dep_ref) {
                id.clone()
            } else if node_ops::get_opt(conn, dep_ref)?.is_some() {
                dep_ref.clone()
            } else {
                return Err(EngineError::new(ErrorCode::InvalidDependsOn, format!("depends_on ref '{dep_ref}' resolves to nothing")));
            };
            crate::edge_ops::add_edge(conn, from_id, &to_id, "depends_on", agent)?;
        }
    }

    let mut duplicate_warnings = Vec::new();
    for (i, a) in created.iter().enumerate() {
        let terms_a = normalize_terms(&a.summary);
        for b in created.iter().skip(i + 1) {
            if a.parent != b.parent {
                continue;
            }
            let terms_b = normalize_terms(&b.summary);
            if term_overlap_ratio(&terms_a, &terms_b) >= 0.6 {
                duplicate_warnings.push(DuplicateWarning {
                    node_id: b.id.clone(),
                    similar_to: a.id.clone(),
                    reason: format!("'{}' and '{}' share most of their terms", a.summary, b.summary),
                });
            }
        }
    }

    Ok(PlanResult { created, duplicate_warnings })
}
