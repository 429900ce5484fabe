//! Stdio JSON-RPC client for MCP tool servers
//!
//! Speaks the Model Context Protocol over a child process's stdin/stdout:
//! line-delimited JSON-RPC 2.0. The lifecycle is `initialize` handshake →
//! `tools/list` / `tools/call` exchanges → close.
//!
//! Requests and responses are strictly sequential; server-initiated
//! notifications arriving between a request and its response are skipped.

use serde::Deserialize;
use serde_json::{Value, json};
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use crate::errors::{Error, Result};

const PROTOCOL_VERSION: &str = "2024-11-05";

/// One tool advertised by a server via `tools/list`
#[derive(Debug, Clone, Deserialize)]
pub struct McpToolInfo {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "inputSchema", default)]
    pub input_schema: Option<Value>,
}

/// One segment of a `tools/call` result. Servers return text segments for
/// normal output; anything else is kept as raw JSON and serialized when the
/// result is flattened to a string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ContentSegment {
    Text { text: String },
    Raw(Value),
}

impl ContentSegment {
    /// Fold a segment to display text.
    pub fn to_text(&self) -> String {
        match self {
            ContentSegment::Text { text } => text.clone(),
            ContentSegment::Raw(value) => value.to_string(),
        }
    }
}

/// Join a result's segments into a single text blob.
pub fn flatten_content(segments: &[ContentSegment]) -> String {
    segments
        .iter()
        .map(ContentSegment::to_text)
        .collect::<Vec<_>>()
        .join("\n")
}

/// A connected MCP server: the child process plus its JSON-RPC channel.
pub struct McpClient {
    name: String,
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    next_id: u64,
}

impl McpClient {
    /// Spawn the server process and perform the MCP initialize handshake.
    pub fn connect(
        name: &str,
        command: &str,
        args: &[&str],
        envs: &[(&str, String)],
    ) -> Result<McpClient> {
        let startup_err = |reason: String| Error::Startup {
            server: name.to_string(),
            reason,
        };

        let mut cmd = Command::new(command);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        for (key, value) in envs {
            cmd.env(key, value);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| startup_err(format!("failed to spawn '{}': {}", command, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| startup_err("no stdin handle".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| startup_err("no stdout handle".to_string()))?;

        let mut client = McpClient {
            name: name.to_string(),
            child,
            stdin,
            reader: BufReader::new(stdout),
            next_id: 0,
        };

        client
            .request(
                "initialize",
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": "splain",
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                }),
            )
            .map_err(|e| startup_err(format!("initialize failed: {}", e)))?;

        client
            .notify("notifications/initialized", json!({}))
            .map_err(|e| startup_err(format!("initialized notification failed: {}", e)))?;

        log::info!("Connected to MCP server: {}", name);
        Ok(client)
    }

    /// List the tools this server exposes.
    pub fn list_tools(&mut self) -> Result<Vec<McpToolInfo>> {
        let result = self.request("tools/list", json!({}))?;
        let tools = result.get("tools").cloned().unwrap_or_else(|| json!([]));
        serde_json::from_value(tools).map_err(|e| self.protocol_err(format!("bad tools/list result: {}", e)))
    }

    /// Invoke a tool by its (unprefixed) server-side name.
    pub fn call_tool(&mut self, tool: &str, arguments: Value) -> Result<Vec<ContentSegment>> {
        let result = self.request(
            "tools/call",
            json!({ "name": tool, "arguments": arguments }),
        )?;
        let content = result.get("content").cloned().unwrap_or_else(|| json!([]));
        serde_json::from_value(content)
            .map_err(|e| self.protocol_err(format!("bad tools/call result: {}", e)))
    }

    /// Shut the server down. Best effort: errors are logged, not returned.
    pub fn close(mut self) {
        // Dropping stdin signals EOF; well-behaved servers exit on it.
        drop(self.stdin);
        let _ = self.child.kill();
        let _ = self.child.wait();
        log::info!("Disconnected from MCP server: {}", self.name);
    }

    /// Send one request and block for its matching response.
    fn request(&mut self, method: &str, params: Value) -> Result<Value> {
        self.next_id += 1;
        let id = self.next_id;

        let message = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        self.write_message(&message)?;

        loop {
            let line = self.read_line()?;
            if line.trim().is_empty() {
                continue;
            }
            let value: Value = match serde_json::from_str(&line) {
                Ok(v) => v,
                Err(e) => {
                    log::debug!("{}: skipping unparseable line: {}", self.name, e);
                    continue;
                }
            };

            // Not our response: notifications and unrelated ids are skipped
            if value.get("id").and_then(Value::as_u64) != Some(id) {
                log::trace!("{}: skipping message for other id", self.name);
                continue;
            }

            if let Some(err) = value.get("error") {
                let message = err
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error");
                return Err(self.protocol_err(format!("{} returned error: {}", method, message)));
            }

            return Ok(value.get("result").cloned().unwrap_or(Value::Null));
        }
    }

    /// Send a notification (no id, no response expected).
    fn notify(&mut self, method: &str, params: Value) -> Result<()> {
        let message = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
        });
        self.write_message(&message)
    }

    fn write_message(&mut self, message: &Value) -> Result<()> {
        let mut line = message.to_string();
        line.push('\n');
        self.stdin
            .write_all(line.as_bytes())
            .and_then(|_| self.stdin.flush())
            .map_err(|e| self.protocol_err(format!("write failed: {}", e)))
    }

    fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        let n = self
            .reader
            .read_line(&mut line)
            .map_err(|e| self.protocol_err(format!("read failed: {}", e)))?;
        if n == 0 {
            return Err(self.protocol_err("server closed its stdout".to_string()));
        }
        Ok(line)
    }

    fn protocol_err(&self, reason: String) -> Error {
        Error::Mcp {
            server: self.name.clone(),
            reason,
        }
    }
}
