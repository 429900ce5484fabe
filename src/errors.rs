//! Error taxonomy for the agent layer
//!
//! The manager, tool bridge, and connectors return typed errors so callers
//! can match on the failure class. The application layer (main, repl) wraps
//! these in eyre reports with context, same as the rest of the CLI.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A mandatory connector could not be started
    #[error("failed to start {server}: {reason}")]
    Startup { server: String, reason: String },

    /// A persona resource is malformed (missing header, bad YAML, empty body)
    #[error("invalid persona '{name}': {reason}")]
    PersonaFormat { name: String, reason: String },

    /// An operation was called outside the Ready state
    #[error("agent manager is not ready (state: {0})")]
    InvalidState(String),

    /// A persona string did not match any known agent
    #[error("unknown agent: {0}")]
    UnknownAgent(String),

    /// `explain_file` was called without a filesystem connector
    #[error("filesystem server not connected; file explanations are unavailable")]
    NoFilesystem,

    /// Session creation or a send on the completion backend failed
    #[error("backend error: {0}")]
    Backend(String),

    /// A JSON-RPC exchange with a tool server failed
    #[error("{server} request failed: {reason}")]
    Mcp { server: String, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_are_labeled() {
        let err = Error::UnknownAgent("wizard".to_string());
        assert_eq!(err.to_string(), "unknown agent: wizard");

        let err = Error::Mcp {
            server: "git".to_string(),
            reason: "broken pipe".to_string(),
        };
        assert!(err.to_string().contains("git"));
        assert!(err.to_string().contains("broken pipe"));
    }

    #[test]
    fn test_no_filesystem_message() {
        let err = Error::NoFilesystem;
        assert!(err.to_string().contains("filesystem"));
    }
}
