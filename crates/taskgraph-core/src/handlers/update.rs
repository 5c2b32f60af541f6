//! `update` — batch mutation with optimistic concurrency and strict-mode
//! enforcement (spec.md §4.6).

use rusqlite::Connection;
use serde::Serialize;

use crate::algorithms::auto_resolve_cascade;
use crate::edge_ops::find_newly_actionable;
use crate::error::{EngineError, EngineResult, ErrorCode};
use crate::model::Node;
use crate::node_ops::{self, EvidenceInput, NodePatch};
use crate::value::PropertyMap;

/// One entry of an `update` batch. `resolved_reason` is sugar for an
/// evidence entry of `{type:"note"}`; everything else maps straight onto
/// [`NodePatch`].
#[derive(Debug, Clone, Default)]
pub struct UpdateInput {
    pub node_id: String,
    pub expected_rev: Option<i64>,
    pub summary: Option<String>,
    pub resolved: Option<bool>,
    pub resolved_reason: Option<String>,
    pub blocked: Option<bool>,
    pub blocked_reason: Option<String>,
    pub discovery: Option<crate::model::Discovery>,
    pub plan: Option<Vec<String>>,
    pub state: Option<serde_json::Value>,
    pub properties_patch: PropertyMap,
    pub context_links_add: Vec<String>,
    pub context_links_remove: Vec<String>,
    pub evidence_add: Vec<EvidenceInput>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateResult {
    pub updated: Vec<Node>,
    pub newly_actionable: Vec<Node>,
    pub auto_resolved: Vec<String>,
    pub warnings: Vec<String>,
}

fn has_traceable_artifact(evidence: &[crate::model::Evidence]) -> bool {
    evidence.iter().any(|e| e.kind == "git" || e.kind == "test")
}

pub fn update(conn: &Connection, inputs: Vec<UpdateInput>, decision_context: Option<&str>, agent: &str) -> EngineResult<UpdateResult> {
    let mut updated = Vec::with_capacity(inputs.len());
    let mut resolved_ids = Vec::new();
    let mut warnings = Vec::new();

    for input in inputs {
        let current = node_ops::get(conn, &input.node_id)?;

        if let Some(expected) = input.expected_rev {
            if current.rev != expected {
                return Err(EngineError::rev_mismatch(&input.node_id, expected, current.rev));
            }
        }

        let is_resolving = input.resolved == Some(true) && !current.resolved;
        if is_resolving {
            let unresolved_children: i64 = node_ops::children(conn, &input.node_id)?
                .iter()
                .filter(|c| !c.resolved)
                .count() as i64;
            if unresolved_children > 0 {
                return Err(EngineError::unresolved_children(&input.node_id));
            }
        }

        let mut patch = NodePatch {
            summary: input.summary.clone(),
            resolved: input.resolved,
            blocked: input.blocked,
            blocked_reason: input.blocked_reason.clone(),
            discovery: input.discovery,
            plan: input.plan.clone(),
            state: input.state.clone(),
            properties_patch: input.properties_patch.clone(),
            context_links_add: input.context_links_add.clone(),
            context_links_remove: input.context_links_remove.clone(),
            evidence_add: input.evidence_add.clone(),
        };

        if let Some(reason) = &input.resolved_reason {
            patch.evidence_add.push(EvidenceInput { kind: "note".into(), reference: reason.clone() });
        }

        let project_strict = node_ops::project_root(conn, &current.project)?
            .map(|root| root.strict())
            .unwrap_or(false);

        if is_resolving && project_strict {
            let prospective_evidence_count = current.evidence.len() + patch.evidence_add.len();
            let has_note = patch.evidence_add.iter().any(|e| e.kind == "note")
                || current.evidence.iter().any(|e| e.kind == "note");
            let has_artifact = patch.evidence_add.iter().any(|e| e.kind == "git" || e.kind == "test")
                || has_traceable_artifact(&current.evidence);
            let will_have_link = !current.context_links.is_empty() || !patch.context_links_add.is_empty();
            let is_leaf = node_ops::children(conn, &input.node_id)?.is_empty();

            if is_leaf && (prospective_evidence_count == 0 || !has_note || !has_artifact || !will_have_link) {
                return Err(EngineError::new(
                    ErrorCode::StrictModeViolation,
                    format!(
                        "'{}' is in a strict project: resolving requires a note, a traceable artifact (git/test), and a context link",
                        input.node_id
                    ),
                ));
            }
        }

        let (node, _changes) = node_ops::update(conn, &input.node_id, agent, patch, decision_context)?;

        if is_resolving {
            resolved_ids.push(node.id.clone());

            let explicit_evidence_count = node.evidence.len() - current.evidence.len();
            if explicit_evidence_count <= 1 && !has_traceable_artifact(&node.evidence) {
                warnings.push(format!("'{}' resolved with thin evidence (no git/test reference)", node.id));
            }
            let is_leaf = node_ops::children(conn, &node.id)?.is_empty();
            if is_leaf && node.context_links.is_empty() {
                warnings.push(format!("'{}' resolved leaf has no context links", node.id));
            }
            if is_leaf && node.discovery == Some(crate::model::Discovery::Pending) {
                warnings.push(format!("'{}' resolved leaf still has discovery=pending", node.id));
            }
            if is_leaf && node.plan.is_none() {
                warnings.push(format!("'{}' resolved leaf has no recorded plan", node.id));
            }
        }

        updated.push(node);
    }

    let auto_resolved = if resolved_ids.is_empty() {
        Vec::new()
    } else {
        auto_resolve_cascade(conn, agent, &resolved_ids)?
    };

    let mut all_resolved = resolved_ids.clone();
    all_resolved.extend(auto_resolved.iter().cloned());

    let project = updated.first().map(|n| n.project.clone());
    let newly_actionable = match project {
        Some(project) if !all_resolved.is_empty() => find_newly_actionable(conn, &project, Some(&all_resolved))?,
        _ => Vec::new(),
    };

    Ok(UpdateResult { updated, newly_actionable, auto_resolved, warnings })
}
