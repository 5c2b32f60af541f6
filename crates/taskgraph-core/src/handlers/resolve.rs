//! `resolve` — convenience wrapper over `update` that assembles evidence
//! and optionally writes a knowledge entry (spec.md §4.6).

use rusqlite::Connection;
use serde::Serialize;

use crate::error::EngineResult;
use crate::handlers::update::{update, UpdateInput, UpdateResult};
use crate::knowledge_store::{self, WriteOutcome};
use crate::model::{Category, Node};
use crate::node_ops::EvidenceInput;

#[derive(Debug, Clone, Default)]
pub struct KnowledgeInput {
    pub key: String,
    pub content: String,
    pub category: Option<Category>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolveResult {
    pub node: Node,
    pub update: UpdateResult,
    pub knowledge: Option<WriteOutcome>,
}

/// Runs `git log --since=<claimed_at> --oneline` in `repo_root` and returns
/// one commit ref per line, newest first. Returns an empty vec on any
/// failure (no repo, git missing) rather than failing the resolve.
fn collect_git_commits_since(repo_root: &std::path::Path, since_rfc3339: &str) -> Vec<String> {
    let output = std::process::Command::new("git")
        .args(["log", &format!("--since={since_rfc3339}"), "--oneline"])
        .current_dir(repo_root)
        .output();

    match output {
        Ok(out) if out.status.success() => String::from_utf8_lossy(&out.stdout)
            .lines()
            .map(|l| l.to_string())
            .collect(),
        _ => Vec::new(),
    }
}

#[allow(clippy::too_many_arguments)]
pub fn resolve(
    conn: &Connection,
    node_id: &str,
    message: &str,
    test_result: Option<&str>,
    commit: Option<&str>,
    context_links: Vec<String>,
    knowledge: Option<KnowledgeInput>,
    repo_root: Option<&std::path::Path>,
    agent: &str,
) -> EngineResult<ResolveResult> {
    let current = crate::node_ops::get(conn, node_id)?;

    let mut evidence_add = vec![EvidenceInput { kind: "note".into(), reference: message.to_string() }];

    if let Some(commit) = commit {
        evidence_add.push(EvidenceInput { kind: "git".into(), reference: commit.to_string() });
    } else if let (Some(root), Some(claimed_at)) = (repo_root, current.claimed_at()) {
        for commit_line in collect_git_commits_since(root, &claimed_at.to_rfc3339()) {
            evidence_add.push(EvidenceInput { kind: "git".into(), reference: commit_line });
        }
    }

    if let Some(test_result) = test_result {
        evidence_add.push(EvidenceInput { kind: "test".into(), reference: test_result.to_string() });
    }

    let update_input = UpdateInput {
        node_id: node_id.to_string(),
        resolved: Some(true),
        context_links_add: context_links,
        evidence_add,
        ..Default::default()
    };

    let update_result = update(conn, vec![update_input], None, agent)?;
    let node = update_result
        .updated
        .iter()
        .find(|n| n.id == node_id)
        .cloned()
        .unwrap_or_else(|| update_result.updated[0].clone());

    let knowledge_outcome = match knowledge {
        Some(k) => Some(knowledge_store::write(
            conn,
            &node.project,
            &k.key,
            &k.content,
            k.category.unwrap_or(Category::General),
            Some(node_id),
            agent,
        )?),
        None => None,
    };

    Ok(ResolveResult { node, update: update_result, knowledge: knowledge_outcome })
}
