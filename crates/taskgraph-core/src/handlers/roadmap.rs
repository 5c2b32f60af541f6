//! `roadmap` — groups depth-1 root children into releases, flags at-risk
//! ones (spec.md §4.7).

use chrono::Utc;
use rusqlite::Connection;
use serde::Serialize;

use crate::error::{EngineError, EngineResult};
use crate::model::Node;
use crate::node_ops;

#[derive(Debug, Clone, Serialize)]
pub struct ReleaseSummary {
    pub node: Node,
    pub resolved: i64,
    pub total: i64,
    pub at_risk: bool,
    pub risk_reasons: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub enum RoadmapResult {
    Flat { releases: Vec<ReleaseSummary> },
    ByHorizon { horizons: Vec<(String, Vec<ReleaseSummary>)> },
}

fn horizon_of(node: &Node) -> Option<String> {
    node.properties
        .get("horizon")
        .and_then(|v| v.as_str())
        .or_else(|| node.properties.get("version").and_then(|v| v.as_str()))
        .map(|s| s.to_string())
}

fn is_pm_flagged(node: &Node) -> bool {
    node.properties.get("at_risk").and_then(|v| v.as_bool()).unwrap_or(false)
}

fn subtree_has_blocked(conn: &Connection, node_id: &str) -> EngineResult<bool> {
    let mut frontier = vec![node_id.to_string()];
    while let Some(id) = frontier.pop() {
        let node = node_ops::get(conn, &id)?;
        if node.blocked {
            return Ok(true);
        }
        for child in node_ops::children(conn, &id)? {
            frontier.push(child.id);
        }
    }
    Ok(false)
}

fn assess_risk(conn: &Connection, node: &Node, resolved: i64, total: i64, sibling_progress: &[f64]) -> EngineResult<(bool, Vec<String>)> {
    let mut reasons = Vec::new();

    if is_pm_flagged(node) {
        reasons.push("flagged at_risk by a project manager property".to_string());
    }
    if subtree_has_blocked(conn, &node.id)? {
        reasons.push("contains a blocked descendant".to_string());
    }
    let idle_days = Utc::now().signed_duration_since(node.updated_at).num_days();
    if idle_days > 14 {
        reasons.push(format!("no activity in {idle_days} days"));
    }
    let progress = if total > 0 { resolved as f64 / total as f64 } else { 0.0 };
    if progress == 0.0 && sibling_progress.iter().any(|p| *p > 0.5) {
        reasons.push("zero progress while sibling releases are over halfway done".to_string());
    }

    Ok((!reasons.is_empty(), reasons))
}

pub fn roadmap(conn: &Connection, project: &str) -> EngineResult<RoadmapResult> {
    let root = node_ops::project_root(conn, project)?.ok_or_else(|| EngineError::project_not_found(project))?;
    let releases_raw = node_ops::children(conn, &root.id)?;

    let mut progress = Vec::with_capacity(releases_raw.len());
    for r in &releases_raw {
        let (resolved, total) = node_ops::subtree_progress(conn, &r.id)?;
        progress.push((resolved, total));
    }
    let progress_ratios: Vec<f64> = progress.iter().map(|(r, t)| if *t > 0 { *r as f64 / *t as f64 } else { 0.0 }).collect();

    let mut releases = Vec::with_capacity(releases_raw.len());
    for (node, (resolved, total)) in releases_raw.into_iter().zip(progress.into_iter()) {
        let (at_risk, risk_reasons) = assess_risk(conn, &node, resolved, total, &progress_ratios)?;
        releases.push(ReleaseSummary { node, resolved, total, at_risk, risk_reasons });
    }

    let uses_horizons = releases.iter().any(|r| horizon_of(&r.node).is_some());
    if !uses_horizons {
        return Ok(RoadmapResult::Flat { releases });
    }

    let mut horizons: Vec<(String, Vec<ReleaseSummary>)> = Vec::new();
    for release in releases {
        let key = horizon_of(&release.node).unwrap_or_else(|| "unscheduled".to_string());
        match horizons.iter_mut().find(|(h, _)| h == &key) {
            Some((_, list)) => list.push(release),
            None => horizons.push((key, vec![release])),
        }
    }
    horizons.sort_by(|a, b| a.0.cmp(&b.0));

    Ok(RoadmapResult::ByHorizon { horizons })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node_ops::create;
    use crate::value::{PropertyMap, Value};
    use tempfile::TempDir;

    fn open_store() -> (crate::store::Store, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = crate::store::Store::new(Some(dir.path().join("t.db"))).unwrap();
        (store, dir)
    }

    #[test]
    fn flat_roadmap_when_no_horizon_convention() {
        let (store, _dir) = open_store();
        let conn = store.writer();
        let root = create(&conn, "p", None, "root", PropertyMap::new(), vec![], None, None, None, "a").unwrap();
        create(&conn, "p", Some(&root.id), "release-a", PropertyMap::new(), vec![], None, None, None, "a").unwrap();

        match roadmap(&conn, "p").unwrap() {
            RoadmapResult::Flat { releases } => assert_eq!(releases.len(), 1),
            _ => panic!("expected flat roadmap"),
        }
    }

    #[test]
    fn grouped_by_horizon_when_property_present() {
        let (store, _dir) = open_store();
        let conn = store.writer();
        let root = create(&conn, "p", None, "root", PropertyMap::new(), vec![], None, None, None, "a").unwrap();
        let mut props = PropertyMap::new();
        props.insert("horizon".into(), Value::String("q1".into()));
        create(&conn, "p", Some(&root.id), "release-a", props, vec![], None, None, None, "a").unwrap();

        match roadmap(&conn, "p").unwrap() {
            RoadmapResult::ByHorizon { horizons } => assert_eq!(horizons.len(), 1),
            _ => panic!("expected horizon grouping"),
        }
    }
}
