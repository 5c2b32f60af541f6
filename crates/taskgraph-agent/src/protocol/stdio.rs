//! stdio transport — one request per line in, one response per line out.
//!
//! Logging goes to stderr (see `main.rs`) so stdout stays reserved for the
//! response stream.

use std::io::{self, BufRead, BufReader, Write};

use tracing::{debug, error, warn};

use super::types::{ErrorEnvelope, Request, Response};
use crate::dispatch;

pub struct StdioTransport;

impl StdioTransport {
    pub fn new() -> Self {
        Self
    }

    /// Run the loop until stdin closes. Each line is handled independently;
    /// a malformed line produces an error response but never kills the loop.
    pub fn run(self, conn: &dispatch::Engine) -> io::Result<()> {
        let stdin = io::stdin();
        let stdout = io::stdout();

        let reader = BufReader::new(stdin.lock());
        let mut stdout = stdout.lock();

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            debug!(bytes = line.len(), "received request line");

            let request: Request = match serde_json::from_str(&line) {
                Ok(r) => r,
                Err(e) => {
                    warn!("failed to parse request: {e}");
                    let resp = Response::failure(None, ErrorEnvelope::parse_error(e.to_string()));
                    write_response(&mut stdout, &resp)?;
                    continue;
                }
            };

            let id = request.id.clone();
            let response = match dispatch::dispatch(conn, &request.method, request.params) {
                Ok(result) => Response::success(id, result),
                Err(e) => Response::failure(id, e),
            };

            if let Err(e) = write_response(&mut stdout, &response) {
                error!("failed to write response: {e}");
                return Err(e);
            }
        }

        Ok(())
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn write_response(out: &mut impl Write, response: &Response) -> io::Result<()> {
    match serde_json::to_string(response) {
        Ok(json) => {
            writeln!(out, "{json}")?;
            out.flush()
        }
        Err(e) => {
            error!("failed to serialize response: {e}");
            writeln!(out, r#"{{"error":{{"code":"internal","message":"response serialization failed"}}}}"#)?;
            out.flush()
        }
    }
}
