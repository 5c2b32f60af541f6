//! taskgraph-agent — stdio shell around the taskgraph-core engine.
//!
//! Reads one JSON request per line from stdin, dispatches it into the
//! engine, writes one JSON response per line to stdout. Logging goes to
//! stderr so the response stream stays clean.

mod dispatch;
mod protocol;

use std::io;
use std::path::PathBuf;

use taskgraph_core::{Config, Store};
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use crate::dispatch::Engine;
use crate::protocol::stdio::StdioTransport;

/// Parses `--db-path`/`--agent-id`/`--help`/`--version`, returning overrides
/// for the corresponding `Config` fields. Exits the process for `--help`
/// and `--version` directly, matching the teacher CLI's behavior.
fn parse_args() -> (Option<PathBuf>, Option<String>) {
    let args: Vec<String> = std::env::args().collect();
    let mut db_path: Option<PathBuf> = None;
    let mut agent_id: Option<String> = None;
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                println!("taskgraph-agent v{}", env!("CARGO_PKG_VERSION"));
                println!();
                println!("Stdio shell for the taskgraph engine.");
                println!();
                println!("USAGE:");
                println!("    taskgraph-agent [OPTIONS]");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help              Print help information");
                println!("    -V, --version           Print version information");
                println!("    --db-path <PATH>        Custom database file path");
                println!("    --agent-id <ID>         Identity recorded on mutations this process makes");
                println!();
                println!("ENVIRONMENT:");
                println!("    RUST_LOG                       Log level filter (e.g. debug, info, warn)");
                println!("    TASKGRAPH_DB_PATH              Database file path");
                println!("    TASKGRAPH_AGENT_ID             Default agent identity");
                println!("    TASKGRAPH_CLAIM_TTL_SECS       Soft-claim expiry, in seconds");
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("taskgraph-agent {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--db-path" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --db-path requires a path argument");
                    std::process::exit(1);
                }
                db_path = Some(PathBuf::from(&args[i]));
            }
            "--agent-id" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --agent-id requires a value");
                    std::process::exit(1);
                }
                agent_id = Some(args[i].clone());
            }
            arg => {
                eprintln!("error: unknown argument '{arg}'");
                eprintln!("Try 'taskgraph-agent --help' for more information.");
                std::process::exit(1);
            }
        }
        i += 1;
    }

    (db_path, agent_id)
}

fn main() {
    let (db_path_override, agent_id_override) = parse_args();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with_writer(io::stderr)
        .with_target(false)
        .with_ansi(false)
        .init();

    info!("taskgraph-agent v{} starting...", env!("CARGO_PKG_VERSION"));

    let mut cfg = Config::from_env();
    if let Some(p) = db_path_override {
        cfg.db_path = Some(p);
    }
    if let Some(a) = agent_id_override {
        cfg.agent_id = a;
    }

    let store = match Store::new(cfg.db_path.clone()) {
        Ok(s) => {
            info!("store opened at {:?}", cfg.db_path);
            s
        }
        Err(e) => {
            error!("failed to open store: {e}");
            std::process::exit(1);
        }
    };

    let engine = Engine::new(store, cfg);
    let transport = StdioTransport::new();

    info!("listening on stdio");

    if let Err(e) = transport.run(&engine) {
        error!("transport error: {e}");
        std::process::exit(1);
    }

    info!("taskgraph-agent shutting down");
}
