//! `onboard` — aggregated rehydration state for a new agent (spec.md §4.6).

use chrono::Utc;
use rusqlite::Connection;
use serde::Serialize;

use crate::algorithms::actionable_in_project;
use crate::error::{EngineError, EngineResult};
use crate::integrity::{continuity_confidence, integrity_audit, rehydrate_checklist, ChecklistItem, ConfidenceReport, IntegrityReport};
use crate::model::Node;
use crate::node_ops::{self, ProjectSummary};

const EVIDENCE_REF_TRUNCATE: usize = 120;
const CONTEXT_LINK_CAP: usize = 30;

#[derive(Debug, Clone, Serialize)]
pub struct EvidenceExcerpt {
    pub node_id: String,
    pub kind: String,
    pub reference: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BlockedSummary {
    pub node_id: String,
    pub summary: String,
    pub reason: Option<String>,
    pub age_hours: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClaimedSummary {
    pub node_id: String,
    pub summary: String,
    pub owner: String,
    pub age_hours: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OnboardResult {
    pub summary: ProjectSummary,
    pub root_children_resolved: i64,
    pub root_children_total: i64,
    pub recent_evidence: Vec<EvidenceExcerpt>,
    pub context_links: Vec<String>,
    pub knowledge_keys: Vec<String>,
    pub recently_resolved: Vec<Node>,
    pub last_activity: Option<chrono::DateTime<Utc>>,
    pub blocked: Vec<BlockedSummary>,
    pub claimed: Vec<ClaimedSummary>,
    pub confidence: ConfidenceReport,
    pub integrity: IntegrityReport,
    pub actionable: Vec<Node>,
    pub top_recommendation: Option<Node>,
    pub checklist: Vec<ChecklistItem>,
    pub hint: String,
}

fn truncate_ref(s: &str) -> String {
    if s.len() <= EVIDENCE_REF_TRUNCATE {
        s.to_string()
    } else {
        format!("{}…", &s[..EVIDENCE_REF_TRUNCATE])
    }
}

pub fn onboard(conn: &Connection, project: &str, evidence_limit: i64) -> EngineResult<OnboardResult> {
    let root = node_ops::project_root(conn, project)?.ok_or_else(|| EngineError::project_not_found(project))?;

    let mut stmt = conn
        .prepare("SELECT * FROM nodes WHERE project = ?1")
        .map_err(crate::error::StoreError::from)?;
    let all_nodes: Vec<Node> = stmt
        .query_map([project], crate::store::row_to_node)
        .map_err(crate::error::StoreError::from)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(crate::error::StoreError::from)?;

    let summary = node_ops::list_projects(conn)?
        .into_iter()
        .find(|p| p.project == project)
        .unwrap_or(ProjectSummary { project: project.to_string(), total: all_nodes.len() as i64, resolved: 0 });

    let root_children = node_ops::children(conn, &root.id)?;
    let root_children_total = root_children.len() as i64;
    let root_children_resolved = root_children.iter().filter(|c| c.resolved).count() as i64;

    let mut evidence_excerpts = Vec::new();
    let mut resolved_sorted: Vec<&Node> = all_nodes.iter().filter(|n| n.resolved).collect();
    resolved_sorted.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    'outer: for node in &resolved_sorted {
        for e in node.evidence.iter().rev() {
            evidence_excerpts.push(EvidenceExcerpt { node_id: node.id.clone(), kind: e.kind.clone(), reference: truncate_ref(&e.reference) });
            if evidence_excerpts.len() as i64 >= evidence_limit {
                break 'outer;
            }
        }
    }

    let mut context_links: Vec<String> = all_nodes.iter().flat_map(|n| n.context_links.iter().cloned()).collect();
    context_links.sort();
    context_links.dedup();
    context_links.truncate(CONTEXT_LINK_CAP);

    let knowledge_keys: Vec<String> = {
        let mut stmt = conn
            .prepare("SELECT key FROM knowledge WHERE project = ?1 ORDER BY key ASC")
            .map_err(crate::error::StoreError::from)?;
        stmt.query_map([project], |r| r.get::<_, String>(0))
            .map_err(crate::error::StoreError::from)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(crate::error::StoreError::from)?
    };

    let now = Utc::now();
    let recently_resolved: Vec<Node> = all_nodes
        .iter()
        .filter(|n| n.resolved && now.signed_duration_since(n.updated_at).num_hours() <= 24)
        .cloned()
        .collect();

    let last_activity = all_nodes.iter().map(|n| n.updated_at).max();

    let blocked: Vec<BlockedSummary> = all_nodes
        .iter()
        .filter(|n| n.blocked)
        .map(|n| BlockedSummary {
            node_id: n.id.clone(),
            summary: n.summary.clone(),
            reason: n.blocked_reason.clone(),
            age_hours: now.signed_duration_since(n.updated_at).num_hours(),
        })
        .collect();

    let claimed: Vec<ClaimedSummary> = all_nodes
        .iter()
        .filter_map(|n| {
            let owner = n.claimed_by()?;
            let claimed_at = n.claimed_at().unwrap_or(n.updated_at);
            Some(ClaimedSummary {
                node_id: n.id.clone(),
                summary: n.summary.clone(),
                owner: owner.to_string(),
                age_hours: now.signed_duration_since(claimed_at).num_hours(),
            })
        })
        .collect();

    let confidence = continuity_confidence(conn, project)?;
    let integrity = integrity_audit(conn, project)?;
    let actionable = actionable_in_project(conn, project)?;
    let top_recommendation = actionable.first().cloned();
    let checklist = rehydrate_checklist(conn, project)?;

    let hint = match &top_recommendation {
        Some(n) => format!("pick up '{}' ({}) next — it is the top-ranked actionable node", n.summary, n.id),
        None if root.discovery == Some(crate::model::Discovery::Pending) => {
            "no decomposition yet — call graph_plan to break down the root".to_string()
        }
        None => "no actionable nodes right now — check the blocked list or decompose further".to_string(),
    };

    Ok(OnboardResult {
        summary,
        root_children_resolved,
        root_children_total,
        recent_evidence: evidence_excerpts,
        context_links,
        knowledge_keys,
        recently_resolved,
        last_activity,
        blocked,
        claimed,
        confidence,
        integrity,
        actionable,
        top_recommendation,
        checklist,
        hint,
    })
}
