//! Persona definitions and loading
//!
//! Each agent persona is backed by a markdown resource with YAML frontmatter:
//!
//! ```markdown
//! ---
//! name: ELI5
//! description: Explains like you're 5
//! ---
//!
//! You are ELI5, a friendly explainer...
//! ```
//!
//! The header carries display metadata; the body is used verbatim as the
//! agent's system prompt. Default resources are compiled into the binary;
//! a configured personas directory can override them per key.
//!
//! Loading is eager and fail-fast: a single malformed persona aborts startup
//! so there is never a partial agent set.

use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::errors::{Error, Result};

/// The closed set of agent personas, in declaration (display) order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PersonaKey {
    Eli5,
    Tech,
    Analogy,
    Roast,
}

impl PersonaKey {
    /// All personas, in the order they appear in menus and roundtables.
    pub const ALL: [PersonaKey; 4] = [
        PersonaKey::Eli5,
        PersonaKey::Tech,
        PersonaKey::Analogy,
        PersonaKey::Roast,
    ];

    /// Stable string key, used for resource filenames and CLI input.
    pub fn key(self) -> &'static str {
        match self {
            PersonaKey::Eli5 => "eli5",
            PersonaKey::Tech => "tech",
            PersonaKey::Analogy => "analogy",
            PersonaKey::Roast => "roast",
        }
    }

    /// Display glyph shown next to the agent's name.
    pub fn glyph(self) -> &'static str {
        match self {
            PersonaKey::Eli5 => "🧒",
            PersonaKey::Tech => "🔬",
            PersonaKey::Analogy => "🌉",
            PersonaKey::Roast => "🔥",
        }
    }

    /// Signature color for the agent's output blocks.
    pub fn rgb(self) -> (u8, u8, u8) {
        match self {
            PersonaKey::Eli5 => (255, 179, 71),    // warm orange
            PersonaKey::Tech => (135, 206, 235),   // sky blue
            PersonaKey::Analogy => (221, 160, 221), // plum
            PersonaKey::Roast => (255, 107, 107),  // coral red
        }
    }

    /// The compiled-in default resource for this persona.
    fn embedded_resource(self) -> &'static str {
        match self {
            PersonaKey::Eli5 => include_str!("../personas/eli5.md"),
            PersonaKey::Tech => include_str!("../personas/tech.md"),
            PersonaKey::Analogy => include_str!("../personas/analogy.md"),
            PersonaKey::Roast => include_str!("../personas/roast.md"),
        }
    }
}

impl fmt::Display for PersonaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for PersonaKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "eli5" => Ok(PersonaKey::Eli5),
            "tech" => Ok(PersonaKey::Tech),
            "analogy" => Ok(PersonaKey::Analogy),
            "roast" => Ok(PersonaKey::Roast),
            other => Err(Error::UnknownAgent(other.to_string())),
        }
    }
}

/// A loaded persona: display metadata plus the full system prompt.
#[derive(Debug, Clone)]
pub struct Persona {
    pub key: PersonaKey,
    pub name: String,
    pub description: String,
    pub system_prompt: String,
}

/// Frontmatter header of a persona resource
#[derive(Debug, Deserialize)]
struct PersonaHeader {
    name: String,
    #[serde(default)]
    description: String,
}

/// The complete, immutable persona set. One entry per key, declaration order.
#[derive(Debug, Clone)]
pub struct PersonaSet {
    personas: Vec<Persona>,
}

impl PersonaSet {
    /// Load every persona eagerly. If `override_dir` is given, a
    /// `<dir>/<key>.md` file replaces the embedded resource for that key.
    pub fn load(override_dir: Option<&Path>) -> Result<PersonaSet> {
        let mut personas = Vec::with_capacity(PersonaKey::ALL.len());

        for key in PersonaKey::ALL {
            let content = match override_dir {
                Some(dir) => {
                    let path = dir.join(format!("{}.md", key.key()));
                    if path.exists() {
                        log::info!("Loading persona '{}' from {}", key, path.display());
                        fs::read_to_string(&path).map_err(|e| Error::PersonaFormat {
                            name: key.key().to_string(),
                            reason: format!("failed to read {}: {}", path.display(), e),
                        })?
                    } else {
                        key.embedded_resource().to_string()
                    }
                }
                None => key.embedded_resource().to_string(),
            };

            personas.push(parse_persona(key, &content)?);
        }

        Ok(PersonaSet { personas })
    }

    /// Look up a persona. Infallible: the set always holds every key.
    pub fn get(&self, key: PersonaKey) -> &Persona {
        // ALL and the personas vec share declaration order
        let idx = PersonaKey::ALL.iter().position(|k| *k == key).unwrap_or(0);
        &self.personas[idx]
    }

    /// Iterate personas in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Persona> {
        self.personas.iter()
    }

    pub fn len(&self) -> usize {
        self.personas.len()
    }
}

/// Parse one persona resource: YAML frontmatter header, then the prompt body.
fn parse_persona(key: PersonaKey, content: &str) -> Result<Persona> {
    let content = content.trim_start();

    let format_err = |reason: &str| Error::PersonaFormat {
        name: key.key().to_string(),
        reason: reason.to_string(),
    };

    if !content.starts_with("---") {
        return Err(format_err("missing frontmatter delimiter (---)"));
    }

    let rest = &content[3..];
    let end = rest
        .find("\n---")
        .or_else(|| rest.find("\r\n---"))
        .ok_or_else(|| format_err("no closing frontmatter delimiter (---)"))?;

    let header: PersonaHeader = serde_yaml::from_str(rest[..end].trim())
        .map_err(|e| format_err(&format!("bad frontmatter: {}", e)))?;

    if header.name.trim().is_empty() {
        return Err(format_err("name must not be empty"));
    }

    // Skip past the closing delimiter line
    let body_start = end + "\n---".len();
    let body = rest[body_start..]
        .trim_start_matches('-')
        .trim()
        .to_string();

    if body.is_empty() {
        return Err(format_err("instruction body must not be empty"));
    }

    Ok(Persona {
        key,
        name: header.name.trim().to_string(),
        description: header.description.trim().to_string(),
        system_prompt: body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_personas_all_load() {
        let set = PersonaSet::load(None).unwrap();
        assert_eq!(set.len(), 4);
        for key in PersonaKey::ALL {
            let persona = set.get(key);
            assert!(!persona.name.is_empty(), "{} has empty name", key);
            assert!(!persona.system_prompt.is_empty(), "{} has empty prompt", key);
        }
    }

    #[test]
    fn test_persona_set_preserves_declaration_order() {
        let set = PersonaSet::load(None).unwrap();
        let keys: Vec<PersonaKey> = set.iter().map(|p| p.key).collect();
        assert_eq!(keys, PersonaKey::ALL.to_vec());
    }

    #[test]
    fn test_parse_persona_valid() {
        let content = r#"---
name: Test Agent
description: A test
---

You are a test agent.
"#;
        let persona = parse_persona(PersonaKey::Eli5, content).unwrap();
        assert_eq!(persona.name, "Test Agent");
        assert_eq!(persona.description, "A test");
        assert_eq!(persona.system_prompt, "You are a test agent.");
    }

    #[test]
    fn test_parse_persona_minimal_header() {
        let content = "---\nname: Minimal\n---\nBody text";
        let persona = parse_persona(PersonaKey::Tech, content).unwrap();
        assert_eq!(persona.name, "Minimal");
        assert_eq!(persona.description, "");
        assert_eq!(persona.system_prompt, "Body text");
    }

    #[test]
    fn test_parse_persona_missing_delimiter() {
        let result = parse_persona(PersonaKey::Eli5, "# Just Markdown\n\nNo header");
        assert!(matches!(result, Err(Error::PersonaFormat { .. })));
    }

    #[test]
    fn test_parse_persona_unclosed_header() {
        let result = parse_persona(PersonaKey::Eli5, "---\nname: Broken\nno closing");
        assert!(matches!(result, Err(Error::PersonaFormat { .. })));
    }

    #[test]
    fn test_parse_persona_missing_name() {
        let content = "---\ndescription: nameless\n---\nBody";
        let result = parse_persona(PersonaKey::Roast, content);
        assert!(matches!(result, Err(Error::PersonaFormat { .. })));
    }

    #[test]
    fn test_parse_persona_empty_body() {
        let content = "---\nname: Hollow\n---\n   ";
        let result = parse_persona(PersonaKey::Analogy, content);
        assert!(matches!(result, Err(Error::PersonaFormat { .. })));
    }

    #[test]
    fn test_override_dir_replaces_embedded() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("eli5.md"),
            "---\nname: Custom ELI5\n---\nCustom prompt.",
        )
        .unwrap();

        let set = PersonaSet::load(Some(dir.path())).unwrap();
        assert_eq!(set.get(PersonaKey::Eli5).name, "Custom ELI5");
        // Keys without an override file keep the embedded resource
        assert_eq!(set.get(PersonaKey::Roast).name, "Code Roaster");
    }

    #[test]
    fn test_override_dir_malformed_fails_startup() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("tech.md"), "no frontmatter here").unwrap();

        let result = PersonaSet::load(Some(dir.path()));
        assert!(matches!(result, Err(Error::PersonaFormat { .. })));
    }

    #[test]
    fn test_key_from_str() {
        assert_eq!("eli5".parse::<PersonaKey>().unwrap(), PersonaKey::Eli5);
        assert_eq!(" ROAST ".parse::<PersonaKey>().unwrap(), PersonaKey::Roast);
        assert!(matches!(
            "wizard".parse::<PersonaKey>(),
            Err(Error::UnknownAgent(_))
        ));
    }
}
