//! `status` — non-mutating Markdown-like project render (spec.md §4.6).

use rusqlite::Connection;

use crate::algorithms::{actionable_in_project, blocked_set};
use crate::error::{EngineError, EngineResult};
use crate::integrity::{continuity_confidence, integrity_audit};
use crate::model::Node;
use crate::node_ops;

fn progress_bar(resolved: i64, total: i64, width: usize) -> String {
    if total == 0 {
        return "[".to_string() + &"-".repeat(width) + "] 0%";
    }
    let filled = ((resolved as f64 / total as f64) * width as f64).round() as usize;
    let filled = filled.min(width);
    format!(
        "[{}{}] {}%",
        "#".repeat(filled),
        "-".repeat(width - filled),
        (resolved * 100 / total)
    )
}

fn icon(node: &Node) -> &'static str {
    if node.resolved {
        "[x]"
    } else if node.blocked {
        "[!]"
    } else {
        "[ ]"
    }
}

fn render_tree(conn: &Connection, node: &Node, indent: usize, out: &mut String) -> EngineResult<()> {
    out.push_str(&"  ".repeat(indent));
    out.push_str(icon(node));
    out.push(' ');
    out.push_str(&node.summary);
    out.push('\n');
    for child in node_ops::children(conn, &node.id)? {
        render_tree(conn, &child, indent + 1, out)?;
    }
    Ok(())
}

pub fn status(conn: &Connection, project: &str) -> EngineResult<String> {
    let root = node_ops::project_root(conn, project)?.ok_or_else(|| EngineError::project_not_found(project))?;
    let (resolved, total) = node_ops::subtree_progress(conn, &root.id)?;
    let actionable = actionable_in_project(conn, project)?;
    let blocked = blocked_set(conn, project)?;
    let confidence = continuity_confidence(conn, project)?;
    let integrity = integrity_audit(conn, project)?;

    let mut out = String::new();
    out.push_str(&format!("# {project}\n\n"));
    out.push_str(&format!("{}\n\n", progress_bar(resolved, total, 20)));
    out.push_str(&format!(
        "actionable: {} | blocked: {} | waiting: {}\n",
        actionable.len(),
        blocked.iter().filter(|n| n.blocked).count(),
        blocked.iter().filter(|n| !n.blocked).count()
    ));
    out.push_str(&format!("continuity confidence: {} ({})\n", confidence.score, confidence.band));
    out.push_str(&format!("integrity score: {}\n\n", integrity.score));

    out.push_str("## Tasks\n");
    render_tree(conn, &root, 0, &mut out)?;

    if !blocked.is_empty() {
        out.push_str("\n## Blocked\n");
        for n in &blocked {
            out.push_str(&format!("- {} — {}\n", n.summary, n.blocked_reason.as_deref().unwrap_or("waiting on a dependency")));
        }
    }

    let mut stmt = conn
        .prepare("SELECT DISTINCT key FROM knowledge WHERE project = ?1 ORDER BY key ASC")
        .map_err(crate::error::StoreError::from)?;
    let keys: Vec<String> = stmt
        .query_map([project], |r| r.get(0))
        .map_err(crate::error::StoreError::from)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(crate::error::StoreError::from)?;
    if !keys.is_empty() {
        out.push_str("\n## Knowledge\n");
        out.push_str(&keys.join(", "));
        out.push('\n');
    }

    if !integrity.issues.is_empty() {
        out.push_str("\n## Integrity issues\n");
        let mut by_kind: std::collections::BTreeMap<&str, Vec<&str>> = std::collections::BTreeMap::new();
        for issue in &integrity.issues {
            by_kind.entry(issue.kind.as_str()).or_default().push(&issue.message);
        }
        for (kind, messages) in by_kind {
            out.push_str(&format!("- {kind}: {}\n", messages.len()));
            for m in messages {
                out.push_str(&format!("  - {m}\n"));
            }
        }
    }

    Ok(out)
}
