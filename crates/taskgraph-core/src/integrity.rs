//! Confidence and integrity signals (spec.md §4.7 / §4.6 `onboard`/`status`).

use chrono::Utc;
use rusqlite::{params, Connection};
use serde::Serialize;

use crate::error::{EngineError, EngineResult, StoreError};
use crate::model::Node;
use crate::node_ops;

#[derive(Debug, Clone, Serialize)]
pub struct IntegrityIssue {
    pub kind: String,
    pub node_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IntegrityReport {
    pub issues: Vec<IntegrityIssue>,
    pub score: i64,
}

fn nodes_in_project(conn: &Connection, project: &str) -> EngineResult<Vec<Node>> {
    let mut stmt = conn
        .prepare("SELECT * FROM nodes WHERE project = ?1")
        .map_err(|e| EngineError::from(StoreError::from(e)))?;
    let rows = stmt
        .query_map(params![project], crate::store::row_to_node)
        .map_err(|e| EngineError::from(StoreError::from(e)))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| EngineError::from(StoreError::from(e)))?;
    Ok(rows)
}

fn has_weak_evidence(node: &Node) -> bool {
    if node.evidence.is_empty() {
        return true;
    }
    let has_git = node.evidence.iter().any(|e| e.kind == "git" || e.kind == "test");
    !has_git && node.context_links.is_empty()
}

/// Scans resolved nodes for weak evidence, stale claims (>24h), orphans
/// (unresolved children of resolved parents), and stale tasks (unresolved,
/// unblocked, unclaimed, >7 days untouched). Score is 100 minus a weighted
/// issue density.
pub fn integrity_audit(conn: &Connection, project: &str) -> EngineResult<IntegrityReport> {
    let nodes = nodes_in_project(conn, project)?;
    let now = Utc::now();
    let mut issues = Vec::new();

    for node in &nodes {
        if node.resolved && has_weak_evidence(node) {
            issues.push(IntegrityIssue {
                kind: "weak_evidence".into(),
                node_id: node.id.clone(),
                message: format!("'{}' resolved without a traceable artifact or context link", node.summary),
            });
        }

        if let Some(claimed_at) = node.claimed_at() {
            let age = now.signed_duration_since(claimed_at);
            if age.num_hours() > 24 {
                issues.push(IntegrityIssue {
                    kind: "stale_claim".into(),
                    node_id: node.id.clone(),
                    message: format!("'{}' has been claimed by '{}' for over 24h", node.summary, node.claimed_by().unwrap_or("?")),
                });
            }
        }

        if node.resolved {
            for child in node_ops::children(conn, &node.id)? {
                if !child.resolved {
                    issues.push(IntegrityIssue {
                        kind: "orphan".into(),
                        node_id: child.id.clone(),
                        message: format!("'{}' is unresolved under resolved parent '{}'", child.summary, node.summary),
                    });
                }
            }
        }

        if !node.resolved && !node.blocked && node.claimed_by().is_none() {
            let age = now.signed_duration_since(node.updated_at);
            if age.num_days() > 7 {
                issues.push(IntegrityIssue {
                    kind: "stale_task".into(),
                    node_id: node.id.clone(),
                    message: format!("'{}' has been untouched for {} days", node.summary, age.num_days()),
                });
            }
        }
    }

    let weight = |k: &str| -> i64 {
        match k {
            "orphan" => 4,
            "weak_evidence" => 3,
            "stale_claim" => 2,
            _ => 1,
        }
    };
    let penalty: i64 = issues.iter().map(|i| weight(&i.kind)).sum();
    let score = (100 - penalty).clamp(0, 100);

    Ok(IntegrityReport { issues, score })
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfidenceReport {
    pub score: i64,
    pub band: &'static str,
    pub reasons: Vec<String>,
}

/// 0-100 score built from evidence coverage, activity recency, knowledge
/// presence, stale blockers, and project maturity, each capped per
/// spec.md §4.7.
pub fn continuity_confidence(conn: &Connection, project: &str) -> EngineResult<ConfidenceReport> {
    let nodes = nodes_in_project(conn, project)?;
    let mut score = 100i64;
    let mut reasons = Vec::new();

    if nodes.is_empty() {
        return Ok(ConfidenceReport { score: 90, band: "high", reasons: vec!["project has no nodes yet".into()] });
    }

    let resolved: Vec<&Node> = nodes.iter().filter(|n| n.resolved).collect();
    if !resolved.is_empty() {
        let weak = resolved.iter().filter(|n| has_weak_evidence(n)).count();
        let penalty = ((weak as f64 / resolved.len() as f64) * 40.0).round() as i64;
        if penalty > 0 {
            score -= penalty.min(40);
            reasons.push(format!("{weak}/{} resolved nodes lack traceable evidence", resolved.len()));
        }
    }

    let most_recent = nodes.iter().map(|n| n.updated_at).max();
    if let Some(last) = most_recent {
        let idle_days = Utc::now().signed_duration_since(last).num_days();
        if idle_days > 14 {
            score -= 25;
            reasons.push(format!("no activity in {idle_days} days"));
        } else if idle_days > 3 {
            let penalty = ((idle_days - 3) * 25 / 11).min(25);
            score -= penalty;
            reasons.push(format!("{idle_days} days since last activity"));
        }
    }

    if nodes.len() > 10 {
        let knowledge_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM knowledge WHERE project = ?1", params![project], |r| r.get(0))
            .map_err(|e| EngineError::from(StoreError::from(e)))?;
        if knowledge_count == 0 {
            score -= 15;
            reasons.push("mature project has no recorded knowledge entries".into());
        }
    }

    let stale_blockers = nodes
        .iter()
        .filter(|n| n.blocked && Utc::now().signed_duration_since(n.updated_at).num_hours() > 72)
        .count();
    if stale_blockers > 0 {
        score -= 10;
        reasons.push(format!("{stale_blockers} blocker(s) untouched for over 72h"));
    }

    score = score.clamp(0, 100);
    let band = if score >= 70 {
        "high"
    } else if score >= 40 {
        "medium"
    } else {
        "low"
    };

    Ok(ConfidenceReport { score, band, reasons })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Pass,
    Warn,
    ActionRequired,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChecklistItem {
    pub check: String,
    pub status: CheckStatus,
    pub message: String,
    pub action: Option<String>,
}

/// The `onboard` rehydrate checklist: a fixed set of checks covering
/// evidence review, knowledge review, blocker confirmation, staleness,
/// claimed-but-unresolved, pending verification, missing context links,
/// and next-action readiness.
pub fn rehydrate_checklist(conn: &Connection, project: &str) -> EngineResult<Vec<ChecklistItem>> {
    let nodes = nodes_in_project(conn, project)?;
    let mut items = Vec::new();

    let resolved: Vec<&Node> = nodes.iter().filter(|n| n.resolved).collect();
    let weak = resolved.iter().filter(|n| has_weak_evidence(n)).count();
    items.push(ChecklistItem {
        check: "evidence_review".into(),
        status: if weak == 0 { CheckStatus::Pass } else { CheckStatus::Warn },
        message: format!("{weak} resolved node(s) with weak evidence"),
        action: (weak > 0).then(|| "review evidence on recently resolved nodes".into()),
    });

    let knowledge_count: i64 = conn
        .query_row("SELECT COUNT(*) FROM knowledge WHERE project = ?1", params![project], |r| r.get(0))
        .map_err(|e| EngineError::from(StoreError::from(e)))?;
    items.push(ChecklistItem {
        check: "knowledge_review".into(),
        status: if knowledge_count > 0 { CheckStatus::Pass } else { CheckStatus::Warn },
        message: format!("{knowledge_count} knowledge entries recorded"),
        action: (knowledge_count == 0).then(|| "call graph_knowledge_write for durable decisions".into()),
    });

    let blocked: Vec<&Node> = nodes.iter().filter(|n| n.blocked).collect();
    items.push(ChecklistItem {
        check: "blocker_confirmation".into(),
        status: if blocked.is_empty() { CheckStatus::Pass } else { CheckStatus::Warn },
        message: format!("{} blocked node(s)", blocked.len()),
        action: (!blocked.is_empty()).then(|| "confirm each blocked_reason is still accurate".into()),
    });

    let stale = nodes
        .iter()
        .filter(|n| !n.resolved && !n.blocked && Utc::now().signed_duration_since(n.updated_at).num_days() > 7)
        .count();
    items.push(ChecklistItem {
        check: "staleness".into(),
        status: if stale == 0 { CheckStatus::Pass } else { CheckStatus::Warn },
        message: format!("{stale} node(s) untouched for over 7 days"),
        action: (stale > 0).then(|| "revisit stale tasks or drop them with a reason".into()),
    });

    let claimed_unresolved = nodes.iter().filter(|n| !n.resolved && n.claimed_by().is_some()).count();
    items.push(ChecklistItem {
        check: "claimed_but_unresolved".into(),
        status: if claimed_unresolved == 0 { CheckStatus::Pass } else { CheckStatus::Warn },
        message: format!("{claimed_unresolved} node(s) claimed but not yet resolved"),
        action: (claimed_unresolved > 0).then(|| "confirm claims are still active or release them".into()),
    });

    let needs_verification = nodes.iter().filter(|n| n.needs_verification()).count();
    items.push(ChecklistItem {
        check: "pending_verification".into(),
        status: if needs_verification == 0 { CheckStatus::Pass } else { CheckStatus::ActionRequired },
        message: format!("{needs_verification} node(s) flagged _needs_verification"),
        action: (needs_verification > 0).then(|| "verify flagged nodes before trusting their resolution".into()),
    });

    let missing_links = resolved.iter().filter(|n| n.context_links.is_empty()).count();
    items.push(ChecklistItem {
        check: "missing_context_links".into(),
        status: if missing_links == 0 { CheckStatus::Pass } else { CheckStatus::Warn },
        message: format!("{missing_links} resolved node(s) with no context links"),
        action: (missing_links > 0).then(|| "backfill file/commit references where possible".into()),
    });

    let actionable = crate::algorithms::actionable_in_project(conn, project)?;
    items.push(ChecklistItem {
        check: "next_action_readiness".into(),
        status: if actionable.is_empty() { CheckStatus::ActionRequired } else { CheckStatus::Pass },
        message: format!("{} actionable node(s) available", actionable.len()),
        action: actionable.is_empty().then(|| "call graph_plan to decompose further work".into()),
    });

    Ok(items)
}
