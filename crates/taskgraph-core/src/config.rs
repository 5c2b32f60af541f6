//! Environment-driven configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Default soft-claim TTL: a claim older than this is ignored by
/// `next`'s actionability filter even if never explicitly released.
const DEFAULT_CLAIM_TTL_SECS: u64 = 60 * 60;

#[derive(Debug, Clone)]
pub struct Config {
    /// Identity recorded as `created_by`/`agent` on every mutation this
    /// process makes, unless a handler call overrides it explicitly.
    pub agent_id: String,
    pub db_path: Option<PathBuf>,
    pub claim_ttl: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        let agent_id = std::env::var("TASKGRAPH_AGENT_ID").unwrap_or_else(|_| "agent".to_string());

        let db_path = std::env::var("TASKGRAPH_DB_PATH").ok().map(PathBuf::from);

        let claim_ttl = std::env::var("TASKGRAPH_CLAIM_TTL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_CLAIM_TTL_SECS));

        Self {
            agent_id,
            db_path,
            claim_ttl,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            agent_id: "agent".to_string(),
            db_path: None,
            claim_ttl: Duration::from_secs(DEFAULT_CLAIM_TTL_SECS),
        }
    }
}
