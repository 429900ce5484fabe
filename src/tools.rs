//! Tool bridge: exposing connector operations to the completion backend
//!
//! Every operation a connected MCP server advertises becomes one
//! `ToolDescriptor` whose qualified name is prefixed with the server name
//! (`filesystem_read_file`), guaranteeing uniqueness across the aggregated
//! set. Two built-in tools need no server at all.
//!
//! Invocation failures never escape a handler: they are folded into the
//! returned text so a broken tool cannot abort the enclosing explanation.

use indexmap::IndexMap;
use serde_json::{Value, json};
use std::sync::Arc;

use crate::mcp::{McpConnection, flatten_content};

/// A tool invocation callable. Takes the parsed argument object, returns the
/// tool output as text; errors are already folded in.
pub type ToolHandler = Arc<dyn Fn(&Value) -> String + Send + Sync>;

/// One callable exposed to the backend.
#[derive(Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Value,
    pub handler: ToolHandler,
}

impl std::fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// The aggregated tool set, in collection order. Read-only after
/// initialization; shared by every agent session.
#[derive(Debug, Default)]
pub struct ToolSet {
    tools: IndexMap<String, ToolDescriptor>,
}

impl ToolSet {
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }

    fn insert(&mut self, tool: ToolDescriptor) {
        if self.tools.contains_key(&tool.name) {
            log::warn!("Duplicate tool name '{}' ignored", tool.name);
            return;
        }
        self.tools.insert(tool.name.clone(), tool);
    }

    /// Tool schemas in the chat-completions function format.
    pub fn schemas(&self) -> Vec<Value> {
        self.tools
            .values()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameters,
                    },
                })
            })
            .collect()
    }

    /// Run a tool by qualified name. Unknown names come back as error text,
    /// matching the contained-failure policy for everything tool-related.
    pub fn invoke(&self, name: &str, arguments: &Value) -> String {
        match self.tools.get(name) {
            Some(tool) => (tool.handler)(arguments),
            None => format!("Error calling {}: no such tool", name),
        }
    }
}

/// Default parameter schema for server tools that advertise none.
fn empty_object_schema() -> Value {
    json!({ "type": "object", "properties": {} })
}

/// Collect every tool from every connection, plus the built-ins. A listing
/// failure on one connection contributes zero tools and one warning; it does
/// not abort the collection.
pub fn collect_tools(connections: &[McpConnection]) -> (ToolSet, Vec<String>) {
    let mut set = ToolSet::default();
    let mut warnings = Vec::new();

    for conn in connections {
        let listed = {
            let mut client = conn.client.lock().unwrap_or_else(|e| e.into_inner());
            client.list_tools()
        };

        let infos = match listed {
            Ok(infos) => infos,
            Err(e) => {
                warnings.push(format!("could not list {} tools: {}", conn.name, e));
                continue;
            }
        };

        log::info!("{}: {} tools", conn.name, infos.len());

        for info in infos {
            let qualified = format!("{}_{}", conn.name, info.name);
            let description = if info.description.is_empty() {
                format!("[{}] {}", conn.name, info.name)
            } else {
                format!("[{}] {}", conn.name, info.description)
            };
            let parameters = info.input_schema.clone().unwrap_or_else(empty_object_schema);

            let client = Arc::clone(&conn.client);
            let op = info.name.clone();
            let handler: ToolHandler = Arc::new(move |args: &Value| {
                let mut client = client.lock().unwrap_or_else(|e| e.into_inner());
                match client.call_tool(&op, args.clone()) {
                    Ok(segments) => flatten_content(&segments),
                    Err(e) => format!("Error calling {}: {}", op, e),
                }
            });

            set.insert(ToolDescriptor {
                name: qualified,
                description,
                parameters,
                handler,
            });
        }
    }

    for tool in builtin_tools() {
        set.insert(tool);
    }

    (set, warnings)
}

/// The two locally implemented utility tools.
pub fn builtin_tools() -> Vec<ToolDescriptor> {
    let format_explanation = ToolDescriptor {
        name: "format_explanation".to_string(),
        description: "Format an explanation with proper markdown and emojis".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "title": { "type": "string", "description": "Title of the explanation" },
                "content": { "type": "string", "description": "The explanation content" },
                "codeSnippet": { "type": "string", "description": "Optional code snippet to include" },
            },
            "required": ["title", "content"],
        }),
        handler: Arc::new(|args: &Value| {
            let title = args.get("title").and_then(Value::as_str).unwrap_or("");
            let content = args.get("content").and_then(Value::as_str).unwrap_or("");
            let mut formatted = format!("## {}\n\n{}", title, content);
            if let Some(snippet) = args.get("codeSnippet").and_then(Value::as_str) {
                formatted.push_str(&format!("\n\n```\n{}\n```", snippet));
            }
            formatted
        }),
    };

    let complexity = ToolDescriptor {
        name: "get_complexity_rating".to_string(),
        description: "Rate the complexity of a code snippet".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "linesOfCode": { "type": "integer" },
                "nestedDepth": { "type": "integer" },
                "numFunctions": { "type": "integer" },
            },
            "required": ["linesOfCode", "nestedDepth", "numFunctions"],
        }),
        handler: Arc::new(|args: &Value| {
            let lines = args.get("linesOfCode").and_then(Value::as_u64).unwrap_or(0);
            let depth = args.get("nestedDepth").and_then(Value::as_u64).unwrap_or(0);
            let functions = args.get("numFunctions").and_then(Value::as_u64).unwrap_or(0);
            complexity_rating(lines, depth, functions).to_string()
        }),
    };

    vec![format_explanation, complexity]
}

/// Heuristic rating from simple counts. Each dimension scores 1-3; the
/// average decides the bucket.
fn complexity_rating(lines: u64, depth: u64, functions: u64) -> &'static str {
    let mut score = 0u32;
    score += if lines > 100 { 3 } else if lines > 50 { 2 } else { 1 };
    score += if depth > 4 { 3 } else if depth > 2 { 2 } else { 1 };
    score += if functions > 10 { 3 } else if functions > 5 { 2 } else { 1 };

    let avg = f64::from(score) / 3.0;
    if avg > 2.5 {
        "🔴 Complex"
    } else if avg > 1.5 {
        "🟡 Moderate"
    } else {
        "🟢 Simple"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toolset_with(tools: Vec<ToolDescriptor>) -> ToolSet {
        let mut set = ToolSet::default();
        for tool in tools {
            set.insert(tool);
        }
        set
    }

    #[test]
    fn test_builtin_format_explanation() {
        let set = toolset_with(builtin_tools());
        let out = set.invoke(
            "format_explanation",
            &json!({"title": "Loops", "content": "They repeat."}),
        );
        assert_eq!(out, "## Loops\n\nThey repeat.");
    }

    #[test]
    fn test_builtin_format_explanation_with_snippet() {
        let set = toolset_with(builtin_tools());
        let out = set.invoke(
            "format_explanation",
            &json!({"title": "T", "content": "C", "codeSnippet": "x = 1"}),
        );
        assert!(out.ends_with("```\nx = 1\n```"));
    }

    #[test]
    fn test_complexity_rating_buckets() {
        assert_eq!(complexity_rating(10, 1, 2), "🟢 Simple");
        assert_eq!(complexity_rating(60, 3, 6), "🟡 Moderate");
        assert_eq!(complexity_rating(150, 5, 12), "🔴 Complex");
    }

    #[test]
    fn test_complexity_rating_boundary() {
        // 50 lines / 2 deep / 5 functions all land in the low bucket
        assert_eq!(complexity_rating(50, 2, 5), "🟢 Simple");
        // One step past each threshold moves to moderate
        assert_eq!(complexity_rating(51, 3, 6), "🟡 Moderate");
    }

    #[test]
    fn test_invoke_unknown_tool_is_inline_error() {
        let set = toolset_with(builtin_tools());
        let out = set.invoke("nonexistent", &json!({}));
        assert!(out.starts_with("Error calling nonexistent"));
    }

    #[test]
    fn test_handler_failure_stays_inline() {
        let failing = ToolDescriptor {
            name: "boom".to_string(),
            description: "always fails".to_string(),
            parameters: empty_object_schema(),
            handler: Arc::new(|_| "Error calling boom: simulated failure".to_string()),
        };
        let set = toolset_with(vec![failing]);
        let out = set.invoke("boom", &json!({}));
        assert!(out.contains("simulated failure"));
    }

    #[test]
    fn test_duplicate_names_keep_first() {
        let mk = |desc: &str| ToolDescriptor {
            name: "dup".to_string(),
            description: desc.to_string(),
            parameters: empty_object_schema(),
            handler: Arc::new(|_| String::new()),
        };
        let mut set = ToolSet::default();
        set.insert(mk("first"));
        set.insert(mk("second"));
        assert_eq!(set.len(), 1);
    }

    /// Drive collection against real child-process servers: one that lists
    /// and answers tools, and one that exits right after the handshake.
    #[test]
    #[cfg(unix)]
    fn test_collect_tools_prefixes_and_downgrades_failures() {
        use crate::mcp::client::McpClient;
        use std::sync::Mutex;

        let serving = r#"
while IFS= read -r line; do
  case "$line" in
    *'"method":"initialize"'*)
      echo '{"jsonrpc":"2.0","id":1,"result":{}}' ;;
    *'"method":"tools/list"'*)
      echo '{"jsonrpc":"2.0","id":2,"result":{"tools":[{"name":"read_file","description":"Read a file"},{"name":"list_dir"}]}}' ;;
    *'"method":"tools/call"'*)
      echo '{"jsonrpc":"2.0","id":3,"result":{"content":[{"type":"text","text":"data"}]}}' ;;
  esac
done
"#;
        let dying = r#"
read -r line
echo '{"jsonrpc":"2.0","id":1,"result":{}}'
read -r line
"#;

        let connections = vec![
            McpConnection {
                name: "filesystem",
                client: Arc::new(Mutex::new(
                    McpClient::connect("filesystem", "sh", &["-c", serving], &[]).unwrap(),
                )),
            },
            McpConnection {
                name: "git",
                client: Arc::new(Mutex::new(
                    McpClient::connect("git", "sh", &["-c", dying], &[]).unwrap(),
                )),
            },
        ];

        let (set, warnings) = collect_tools(&connections);

        // Connector tools carry the server prefix; built-ins are unprefixed
        let names: Vec<&str> = set.names().collect();
        assert!(names.contains(&"filesystem_read_file"));
        assert!(names.contains(&"filesystem_list_dir"));
        assert!(names.contains(&"format_explanation"));
        assert_eq!(set.len(), 4);

        // The dead server contributed zero tools and exactly one warning
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("git"));

        // Invocation forwards to the server and flattens the text content
        let out = set.invoke("filesystem_read_file", &json!({"path": "a.rs"}));
        assert_eq!(out, "data");

        for conn in connections {
            conn.close();
        }
    }

    #[test]
    fn test_schemas_use_function_format() {
        let set = toolset_with(builtin_tools());
        let schemas = set.schemas();
        assert_eq!(schemas.len(), 2);
        assert_eq!(schemas[0]["type"], "function");
        assert_eq!(schemas[0]["function"]["name"], "format_explanation");
        assert_eq!(schemas[1]["function"]["name"], "get_complexity_rating");
    }
}
