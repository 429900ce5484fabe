//! Connector startup for the external tool servers
//!
//! Three servers are known: filesystem (always attempted), git (only when
//! `uvx` is on PATH and the working directory is a git repo), and github
//! (only when a token is present in the environment). Optional servers that
//! refuse to start are downgraded to warnings; the caller decides what zero
//! successful connections means.

use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::errors::Result;
use crate::mcp::client::McpClient;

pub const FILESYSTEM: &str = "filesystem";
pub const GIT: &str = "git";
pub const GITHUB: &str = "github";

const GITHUB_TOKEN_ENV: &str = "GITHUB_PERSONAL_ACCESS_TOKEN";

/// A named, shareable handle to a connected server. Tool handlers and the
/// file-read path clone the inner client; access stays strictly sequential.
#[derive(Clone)]
pub struct McpConnection {
    pub name: &'static str,
    pub client: Arc<Mutex<McpClient>>,
}

impl McpConnection {
    fn new(name: &'static str, client: McpClient) -> McpConnection {
        McpConnection {
            name,
            client: Arc::new(Mutex::new(client)),
        }
    }

    /// Close the underlying server if this is the last handle to it.
    pub fn close(self) {
        if let Ok(mutex) = Arc::try_unwrap(self.client) {
            let client = mutex.into_inner().unwrap_or_else(|e| e.into_inner());
            client.close();
        }
    }
}

/// A non-fatal startup failure for an optional connector.
#[derive(Debug)]
pub struct ConnectorWarning {
    pub name: &'static str,
    pub reason: String,
}

/// Attempt every applicable server for `working_dir`. Returns the successful
/// connections plus one warning per server that was skipped or failed.
pub fn connect_all(working_dir: &Path) -> (Vec<McpConnection>, Vec<ConnectorWarning>) {
    let mut connections = Vec::new();
    let mut warnings = Vec::new();

    match connect_filesystem(working_dir) {
        Ok(conn) => connections.push(conn),
        Err(e) => warnings.push(ConnectorWarning {
            name: FILESYSTEM,
            reason: e.to_string(),
        }),
    }

    match connect_git(working_dir) {
        Ok(Some(conn)) => connections.push(conn),
        Ok(None) => warnings.push(ConnectorWarning {
            name: GIT,
            reason: "skipped (uvx not available or not a git repo)".to_string(),
        }),
        Err(e) => warnings.push(ConnectorWarning {
            name: GIT,
            reason: e.to_string(),
        }),
    }

    match connect_github() {
        Ok(Some(conn)) => connections.push(conn),
        Ok(None) => warnings.push(ConnectorWarning {
            name: GITHUB,
            reason: format!("skipped (no {} set)", GITHUB_TOKEN_ENV),
        }),
        Err(e) => warnings.push(ConnectorWarning {
            name: GITHUB,
            reason: e.to_string(),
        }),
    }

    (connections, warnings)
}

/// Local file access, scoped to the working directory.
pub fn connect_filesystem(working_dir: &Path) -> Result<McpConnection> {
    let dir = working_dir.to_string_lossy();
    let client = McpClient::connect(
        FILESYSTEM,
        "npx",
        &["-y", "@modelcontextprotocol/server-filesystem", dir.as_ref()],
        &[],
    )?;
    Ok(McpConnection::new(FILESYSTEM, client))
}

/// Version-control history. Requires `uvx` and a git repository; returns
/// `Ok(None)` when the preconditions are not met.
pub fn connect_git(working_dir: &Path) -> Result<Option<McpConnection>> {
    if which::which("uvx").is_err() || !working_dir.join(".git").exists() {
        return Ok(None);
    }

    let dir = working_dir.to_string_lossy();
    let client = McpClient::connect(GIT, "uvx", &["mcp-server-git", "--repository", dir.as_ref()], &[])?;
    Ok(Some(McpConnection::new(GIT, client)))
}

/// Hosted-repository queries. Requires a token in the environment; returns
/// `Ok(None)` when none is set.
pub fn connect_github() -> Result<Option<McpConnection>> {
    let token = match std::env::var(GITHUB_TOKEN_ENV) {
        Ok(t) if !t.trim().is_empty() => t,
        _ => return Ok(None),
    };

    let client = McpClient::connect(
        GITHUB,
        "npx",
        &["-y", "@modelcontextprotocol/server-github"],
        &[(GITHUB_TOKEN_ENV, token)],
    )?;
    Ok(Some(McpConnection::new(GITHUB, client)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_git_skips_outside_repo() {
        let dir = tempfile::tempdir().unwrap();
        // No .git directory: must skip regardless of uvx availability
        let result = connect_git(dir.path()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_connection_names_are_distinct() {
        let names = [FILESYSTEM, GIT, GITHUB];
        let mut unique = names.to_vec();
        unique.dedup();
        assert_eq!(unique.len(), names.len());
    }
}
