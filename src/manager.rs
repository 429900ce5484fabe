//! Agent session manager
//!
//! Owns one backend session per persona, bound to that persona's instructions
//! and the shared tool set. States: Uninitialized → Ready → Closed; the
//! explain operations are valid only in Ready. `initialize` either brings up
//! the complete agent set or leaves the manager Uninitialized; there is never
//! a partially-ready set.
//!
//! All operations are strictly sequential: `explain_all` walks the personas
//! in declaration order so aggregated output and progress reporting stay
//! deterministic.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use serde_json::json;

use crate::backend::{ChatBackend, ChatSession};
use crate::errors::{Error, Result};
use crate::mcp::client::McpClient;
use crate::mcp::connect::FILESYSTEM;
use crate::mcp::{McpConnection, flatten_content};
use crate::persona::{PersonaKey, PersonaSet};
use crate::tools::{ToolSet, collect_tools};

/// One agent's answer to an explain request.
#[derive(Debug, Clone)]
pub struct Explanation {
    pub key: PersonaKey,
    pub agent: String,
    pub glyph: &'static str,
    pub text: String,
}

/// Who an explain request is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExplainTarget {
    One(PersonaKey),
    All,
}

impl FromStr for ExplainTarget {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(ExplainTarget::All)
        } else {
            Ok(ExplainTarget::One(s.parse()?))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Uninitialized,
    Ready,
    Closed,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            State::Uninitialized => "uninitialized",
            State::Ready => "ready",
            State::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// What `initialize` brought up. Returned again, unchanged, if `initialize`
/// is called while already Ready.
#[derive(Debug, Clone, Default)]
pub struct InitSummary {
    pub agents: usize,
    pub tools: usize,
    pub warnings: Vec<String>,
}

struct AgentSession {
    key: PersonaKey,
    session: Box<dyn ChatSession>,
}

/// Listing entry for menus and status output.
#[derive(Debug, Clone)]
pub struct AgentInfo {
    pub key: PersonaKey,
    pub name: String,
    pub glyph: &'static str,
    pub description: String,
}

pub struct AgentManager {
    backend: Box<dyn ChatBackend>,
    personas: PersonaSet,
    sessions: Vec<AgentSession>,
    filesystem: Option<Arc<Mutex<McpClient>>>,
    state: State,
    summary: InitSummary,
}

impl AgentManager {
    pub fn new(backend: Box<dyn ChatBackend>, personas: PersonaSet) -> AgentManager {
        AgentManager {
            backend,
            personas,
            sessions: Vec::new(),
            filesystem: None,
            state: State::Uninitialized,
            summary: InitSummary::default(),
        }
    }

    /// Aggregate tools from the connectors and open one session per persona,
    /// in declaration order. Idempotent: a Ready manager returns its current
    /// summary without touching the sessions.
    pub fn initialize(&mut self, connections: &[McpConnection]) -> Result<InitSummary> {
        match self.state {
            State::Ready => return Ok(self.summary.clone()),
            State::Closed => return Err(Error::InvalidState(self.state.to_string())),
            State::Uninitialized => {}
        }

        let (tools, warnings) = collect_tools(connections);
        for warning in &warnings {
            log::warn!("{}", warning);
        }
        let tool_count = tools.len();
        let tools = Arc::new(tools);

        // Build the full set before committing; one failure discards it all.
        let mut sessions = Vec::with_capacity(self.personas.len());
        for persona in self.personas.iter() {
            let session = self
                .backend
                .open_session(&persona.system_prompt, Arc::clone(&tools))?;
            log::info!("{} Created agent: {}", persona.key.glyph(), persona.name);
            sessions.push(AgentSession {
                key: persona.key,
                session,
            });
        }

        self.sessions = sessions;
        self.filesystem = connections
            .iter()
            .find(|c| c.name == FILESYSTEM)
            .map(|c| Arc::clone(&c.client));
        self.summary = InitSummary {
            agents: self.sessions.len(),
            tools: tool_count,
            warnings,
        };
        self.state = State::Ready;
        Ok(self.summary.clone())
    }

    /// Ask one persona to explain a piece of code.
    pub fn explain(&mut self, key: PersonaKey, code: &str, question: Option<&str>) -> Result<Explanation> {
        self.ensure_ready()?;

        let prompt = build_prompt(code, question);
        let persona = self.personas.get(key);
        let agent = persona.name.clone();
        let glyph = key.glyph();

        let entry = self
            .sessions
            .iter_mut()
            .find(|s| s.key == key)
            .ok_or_else(|| Error::UnknownAgent(key.to_string()))?;

        let text = entry.session.send(&prompt)?;

        Ok(Explanation { key, agent, glyph, text })
    }

    /// Ask every persona, sequentially and in declaration order. Any single
    /// failure fails the whole batch. `progress` fires before each agent.
    pub fn explain_all(
        &mut self,
        code: &str,
        question: Option<&str>,
        mut progress: impl FnMut(&AgentInfo),
    ) -> Result<Vec<Explanation>> {
        self.ensure_ready()?;

        let mut results = Vec::with_capacity(PersonaKey::ALL.len());
        for key in PersonaKey::ALL {
            progress(&self.info(key));
            results.push(self.explain(key, code, question)?);
        }
        Ok(results)
    }

    /// Read a file through the filesystem connector and explain its content.
    pub fn explain_file(
        &mut self,
        path: &str,
        target: ExplainTarget,
        question: Option<&str>,
        progress: impl FnMut(&AgentInfo),
    ) -> Result<Vec<Explanation>> {
        self.ensure_ready()?;

        let filesystem = self.filesystem.clone().ok_or(Error::NoFilesystem)?;
        let code = {
            let mut client = filesystem.lock().unwrap_or_else(|e| e.into_inner());
            let segments = client.call_tool("read_file", json!({ "path": path }))?;
            flatten_content(&segments)
        };

        match target {
            ExplainTarget::One(key) => Ok(vec![self.explain(key, &code, question)?]),
            ExplainTarget::All => self.explain_all(&code, question, progress),
        }
    }

    /// Destroy every session (best effort) and stop the backend. A second
    /// call is a no-op.
    pub fn shutdown(&mut self) -> Result<()> {
        if self.state == State::Closed {
            return Ok(());
        }

        for mut entry in self.sessions.drain(..) {
            if let Err(e) = entry.session.destroy() {
                log::warn!("failed to destroy {} session: {}", entry.key, e);
            }
        }
        self.filesystem = None;

        if let Err(e) = self.backend.stop() {
            log::warn!("failed to stop backend: {}", e);
        }

        self.state = State::Closed;
        Ok(())
    }

    /// Whether file explanations are possible.
    pub fn has_filesystem(&self) -> bool {
        self.filesystem.is_some()
    }

    /// The agents in declaration order, for menus.
    pub fn agents(&self) -> Vec<AgentInfo> {
        PersonaKey::ALL.iter().map(|&key| self.info(key)).collect()
    }

    fn info(&self, key: PersonaKey) -> AgentInfo {
        let persona = self.personas.get(key);
        AgentInfo {
            key,
            name: persona.name.clone(),
            glyph: key.glyph(),
            description: persona.description.clone(),
        }
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.state == State::Ready {
            Ok(())
        } else {
            Err(Error::InvalidState(self.state.to_string()))
        }
    }
}

/// The one prompt shape every agent receives.
fn build_prompt(code: &str, question: Option<&str>) -> String {
    match question {
        Some(q) if !q.trim().is_empty() => {
            format!("Explain this code, focusing on: {}\n\n```\n{}\n```", q.trim(), code)
        }
        _ => format!("Explain this code:\n\n```\n{}\n```", code),
    }
}
