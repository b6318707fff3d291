//! Error kinds shared across the workspace.
//!
//! Every crate boundary returns `Result<_, DepscanError>` so `?` composes
//! without manual boxing; binaries (CLI, HTTP server) are the only places
//! that render these into user-facing text or JSON.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DepscanError {
    #[error("failed to parse {file}: {reason}")]
    Parse { file: String, reason: String },

    #[error("resolver error: {0}")]
    Resolver(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("busy: at most {0} scans may run concurrently")]
    Busy(usize),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("cancelled")]
    Cancelled,

    #[error("timeout")]
    Timeout,

    #[error("internal error: {0}")]
    Internal(String),
}

impl DepscanError {
    /// Truncate the error's message to at most 512 bytes, as required for
    /// `ScanProgress.error_message` (§7).
    pub fn truncated_message(&self) -> String {
        let msg = self.to_string();
        if msg.len() <= 512 {
            msg
        } else {
            let mut end = 512;
            while !msg.is_char_boundary(end) {
                end -= 1;
            }
            msg[..end].to_string()
        }
    }
}

impl From<serde_json::Error> for DepscanError {
    fn from(e: serde_json::Error) -> Self {
        DepscanError::Parse {
            file: String::new(),
            reason: e.to_string(),
        }
    }
}
