//! `next` — top-N actionable nodes, ranked, with claim context (spec.md §4.6).

use rusqlite::Connection;
use serde::Serialize;

use crate::algorithms;
use crate::claims;
use crate::config::Config;
use crate::error::EngineResult;
use crate::handlers::retro::resolved_since_last_retro;
use crate::model::{Evidence, Node};
use crate::node_ops;
use crate::value::Value;

/// Scope/property filters for a `next` call (spec.md §4.5 "Scope and
/// ancestor filters"). `property_equals` matches the candidate itself;
/// `ancestor_filter` matches if any ancestor of the candidate carries the
/// given property, independent of `scope`.
#[derive(Debug, Clone, Default)]
pub struct NextFilter {
    pub property_equals: Option<(String, Value)>,
    pub ancestor_filter: Option<(String, Value)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NextCandidate {
    pub node: Node,
    pub ancestors: Vec<Node>,
    pub own_context_links: Vec<String>,
    pub inherited_context_links: Vec<String>,
    pub resolved_dependencies: Vec<DependencyEvidence>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DependencyEvidence {
    pub node_id: String,
    pub summary: String,
    pub evidence: Vec<Evidence>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NextResult {
    pub candidates: Vec<NextCandidate>,
    pub my_claims: Vec<Node>,
    pub needs_verification: Vec<Node>,
    /// Set when the count of tasks resolved since the last retro exceeds
    /// a threshold — a nudge to run `retro` before starting more work.
    pub retro_nudge: Option<String>,
}

fn dependency_evidence(conn: &Connection, node_id: &str) -> EngineResult<Vec<DependencyEvidence>> {
    let mut out = Vec::new();
    for edge in crate::edge_ops::edges_from(conn, node_id, Some("depends_on"))? {
        let dep = node_ops::get(conn, &edge.to)?;
        if dep.resolved {
            out.push(DependencyEvidence {
                node_id: dep.id.clone(),
                summary: dep.summary.clone(),
                evidence: dep.evidence.clone(),
            });
        }
    }
    Ok(out)
}

fn build_candidate(conn: &Connection, node: Node) -> EngineResult<NextCandidate> {
    let ancestors = node_ops::ancestors(conn, &node.id)?;
    let own_context_links = node.context_links.clone();
    let inherited_context_links: Vec<String> = ancestors
        .iter()
        .flat_map(|a| a.context_links.iter().cloned())
        .filter(|l| !own_context_links.contains(l))
        .collect();
    let resolved_dependencies = dependency_evidence(conn, &node.id)?;
    Ok(NextCandidate {
        node,
        ancestors,
        own_context_links,
        inherited_context_links,
        resolved_dependencies,
    })
}

#[allow(clippy::too_many_arguments)]
pub fn next(
    conn: &Connection,
    project: &str,
    scope: Option<&str>,
    filter: &NextFilter,
    limit: i64,
    claim: bool,
    agent: &str,
    cfg: &Config,
) -> EngineResult<NextResult> {
    let mut actionable = algorithms::actionable_in_project(conn, project)?;

    if let Some(scope) = scope {
        let mut scoped = Vec::with_capacity(actionable.len());
        for n in actionable {
            if algorithms::is_descendant_of(conn, &n, scope)? {
                scoped.push(n);
            }
        }
        actionable = scoped;
    }

    if let Some((key, expected)) = &filter.property_equals {
        actionable.retain(|n| n.properties.get(key) == Some(expected));
    }

    if let Some((key, expected)) = &filter.ancestor_filter {
        let mut scoped = Vec::with_capacity(actionable.len());
        for n in actionable {
            if algorithms::any_ancestor_matches(conn, &n, key, expected)? {
                scoped.push(n);
            }
        }
        actionable = scoped;
    }

    actionable.retain(|n| claims::is_visible_to(n, agent, cfg.claim_ttl));
    actionable.truncate(limit.max(0) as usize);

    let mut candidates = Vec::with_capacity(actionable.len());
    for node in actionable {
        let node = if claim && node.claimed_by().is_none() {
            claims::claim(conn, &node.id, agent)?
        } else {
            node
        };
        candidates.push(build_candidate(conn, node)?);
    }

    let all_project_nodes: Vec<Node> = {
        let mut stmt = conn
            .prepare("SELECT * FROM nodes WHERE project = ?1")
            .map_err(crate::error::StoreError::from)?;
        stmt.query_map([project], crate::store::row_to_node)
            .map_err(crate::error::StoreError::from)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(crate::error::StoreError::from)?
    };

    let my_claims: Vec<Node> = all_project_nodes
        .iter()
        .filter(|n| !n.resolved && n.claimed_by() == Some(agent))
        .cloned()
        .collect();

    let needs_verification: Vec<Node> = all_project_nodes
        .into_iter()
        .filter(|n| n.needs_verification())
        .collect();

    let resolved_count = resolved_since_last_retro(conn, project)?.len();
    let retro_nudge = if resolved_count > 10 {
        Some(format!(
            "{resolved_count} tasks resolved in '{project}' since the last retro — consider running retro before starting more work"
        ))
    } else {
        None
    };

    Ok(NextResult { candidates, my_claims, needs_verification, retro_nudge })
}
