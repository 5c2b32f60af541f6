//! Error types
//!
//! Two families per spec: `StoreError` for connection/migration failures
//! bubbled up from the embedded database, and `EngineError` for the closed
//! set of validation/engine-state codes every handler surfaces.

use serde::Serialize;

/// Errors from the storage layer itself (connection, migration, I/O).
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("initialization error: {0}")]
    Init(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// The closed set of machine-readable codes every handler can surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NodeNotFound,
    ProjectNotFound,
    RevMismatch,
    CycleDetected,
    DuplicateEdge,
    InvalidParentRef,
    InvalidDependsOn,
    DuplicateRef,
    MissingParent,
    DiscoveryPending,
    EvidenceRequired,
    BlockedReasonRequired,
    UnresolvedChildren,
    StrictModeViolation,
    InvalidCategory,
    InvalidFinding,
    CrossProject,
    EdgeRejected,
    FreeTierLimit,
    InvalidInput,
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NodeNotFound => "node_not_found",
            ErrorCode::ProjectNotFound => "project_not_found",
            ErrorCode::RevMismatch => "rev_mismatch",
            ErrorCode::CycleDetected => "cycle_detected",
            ErrorCode::DuplicateEdge => "duplicate_edge",
            ErrorCode::InvalidParentRef => "invalid_parent_ref",
            ErrorCode::InvalidDependsOn => "invalid_depends_on",
            ErrorCode::DuplicateRef => "duplicate_ref",
            ErrorCode::MissingParent => "missing_parent",
            ErrorCode::DiscoveryPending => "discovery_pending",
            ErrorCode::EvidenceRequired => "evidence_required",
            ErrorCode::BlockedReasonRequired => "blocked_reason_required",
            ErrorCode::UnresolvedChildren => "unresolved_children",
            ErrorCode::StrictModeViolation => "strict_mode_violation",
            ErrorCode::InvalidCategory => "invalid_category",
            ErrorCode::InvalidFinding => "invalid_finding",
            ErrorCode::CrossProject => "cross_project",
            ErrorCode::EdgeRejected => "edge_rejected",
            ErrorCode::FreeTierLimit => "free_tier_limit",
            ErrorCode::InvalidInput => "invalid_input",
            ErrorCode::Internal => "internal",
        }
    }
}

/// A structured engine error: code + offending entity + remediation.
///
/// Handlers never catch these — they propagate via `?` to the transport,
/// which embeds `{code, message}` in the response envelope (spec.md §6/§7).
#[derive(Debug, Clone, Serialize)]
pub struct EngineError {
    pub code: ErrorCode,
    pub message: String,
}

impl EngineError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn node_not_found(id: &str) -> Self {
        Self::new(ErrorCode::NodeNotFound, format!("node '{id}' does not exist"))
    }

    pub fn project_not_found(project: &str) -> Self {
        Self::new(
            ErrorCode::ProjectNotFound,
            format!("project '{project}' has no root node; call open('{project}') first"),
        )
    }

    pub fn rev_mismatch(id: &str, expected: i64, actual: i64) -> Self {
        Self::new(
            ErrorCode::RevMismatch,
            format!(
                "node '{id}' is at rev {actual}, expected {expected}; re-read the node and retry"
            ),
        )
    }

    pub fn cycle_detected(from: &str, to: &str) -> Self {
        Self::new(
            ErrorCode::CycleDetected,
            format!("adding depends_on '{from}' -> '{to}' would create a cycle"),
        )
    }

    pub fn discovery_pending(parent: &str) -> Self {
        Self::new(
            ErrorCode::DiscoveryPending,
            format!(
                "node '{parent}' has discovery=pending; call update(updates=[{{id:'{parent}', discovery:'done'}}]) before adding children"
            ),
        )
    }

    pub fn evidence_required(id: &str) -> Self {
        Self::new(
            ErrorCode::EvidenceRequired,
            format!("node '{id}' needs at least one evidence entry before it can be resolved"),
        )
    }

    pub fn blocked_reason_required(id: &str) -> Self {
        Self::new(
            ErrorCode::BlockedReasonRequired,
            format!("node '{id}' cannot be blocked without a blocked_reason"),
        )
    }

    pub fn unresolved_children(id: &str) -> Self {
        Self::new(
            ErrorCode::UnresolvedChildren,
            format!("node '{id}' has unresolved children; resolve them first or drop the subtree"),
        )
    }

    pub fn cross_project(a: &str, b: &str) -> Self {
        Self::new(
            ErrorCode::CrossProject,
            format!("'{a}' and '{b}' belong to different projects"),
        )
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for EngineError {}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        EngineError::new(ErrorCode::Internal, e.to_string())
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
