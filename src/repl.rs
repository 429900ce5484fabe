//! Interactive conversation loop
//!
//! Menu-driven: pick an agent (or everyone), then choose what to discuss —
//! a file, pasted code, or a general question. Recoverable errors print a
//! labeled message and the loop continues; only quitting leaves it.

use eyre::Result;
use std::io::{self, BufRead, Write};

use crate::display;
use crate::manager::{AgentInfo, AgentManager, ExplainTarget, Explanation};
use crate::persona::PersonaKey;

/// Sentinel line that ends pasted code input.
const PASTE_SENTINEL: &str = "END";

/// Placeholder "code" for questions about the codebase at large; the agents
/// are expected to use their tools to look around.
const GENERAL_QUESTION_CODE: &str =
    "[General question about the codebase - no specific code provided]";

/// Focusing question for pasted code when the user doesn't supply one.
const DEFAULT_PASTE_QUESTION: &str = "Explain what this does";

enum MenuChoice {
    Target(ExplainTarget),
    Quit,
    Invalid,
}

enum InputKind {
    File,
    Paste,
    Question,
    Back,
    Invalid,
}

pub fn run(manager: &mut AgentManager) -> Result<()> {
    let agents = manager.agents();

    loop {
        display::menu(&agents);

        let choice = parse_menu_choice(&prompt_line("💭 Your choice: ")?, agents.len());
        let target = match choice {
            MenuChoice::Quit => break,
            MenuChoice::Invalid => {
                display::error("I didn't understand that. Please pick 1-5 or 'q' to quit.");
                continue;
            }
            MenuChoice::Target(target) => target,
        };

        match target {
            ExplainTarget::One(key) => {
                let agent = &agents[position_of(key, &agents)];
                display::greeting(agent);
            }
            ExplainTarget::All => {
                println!("\n🎭 All agents are ready to share their perspectives!");
            }
        }

        println!("\n  [1] 📄 Read and explain a file");
        println!("  [2] 📝 Explain code I'll paste");
        println!("  [3] ❓ Answer a question about the codebase");
        println!("  [4] ← Go back");

        match parse_input_kind(&prompt_line("💭 Your choice: ")?) {
            InputKind::Back => continue,
            InputKind::Invalid => {
                display::error("Please pick 1-4.");
                continue;
            }
            InputKind::File => {
                if !manager.has_filesystem() {
                    display::error("The filesystem server is not connected; file reading is unavailable.");
                    continue;
                }
                let path = prompt_line("📄 Which file? ")?;
                if path.trim().is_empty() {
                    display::error("No file given.");
                    continue;
                }
                let question = optional(prompt_line("🎯 Any specific aspect to focus on? ")?);
                run_file(manager, target, path.trim(), question.as_deref());
            }
            InputKind::Paste => {
                let code = read_pasted_code()?;
                if code.trim().is_empty() {
                    display::error("No code pasted.");
                    continue;
                }
                let question =
                    paste_question(prompt_line("🎯 What would you like to know about this code? ")?);
                run_explain(manager, target, &code, Some(&question));
            }
            InputKind::Question => {
                let question = prompt_line("💬 What would you like to know? ")?;
                if question.trim().is_empty() {
                    display::error("No question given.");
                    continue;
                }
                // General questions go to one agent; "everyone" falls back
                // to the first persona, matching the menu's promise of a
                // single conversational answer.
                let key = match target {
                    ExplainTarget::One(key) => key,
                    ExplainTarget::All => PersonaKey::ALL[0],
                };
                run_explain(
                    manager,
                    ExplainTarget::One(key),
                    GENERAL_QUESTION_CODE,
                    Some(question.trim()),
                );
            }
        }

        let again = prompt_line("💭 Would you like to ask something else? [Y/n] ")?;
        if again.trim().eq_ignore_ascii_case("n") {
            break;
        }
    }

    Ok(())
}

fn run_explain(manager: &mut AgentManager, target: ExplainTarget, code: &str, question: Option<&str>) {
    let outcome = match target {
        ExplainTarget::One(key) => manager
            .explain(key, code, question)
            .map(|result| vec![result]),
        ExplainTarget::All => manager.explain_all(code, question, display::thinking),
    };
    render(target, outcome);
}

fn run_file(manager: &mut AgentManager, target: ExplainTarget, path: &str, question: Option<&str>) {
    let outcome = manager.explain_file(path, target, question, display::thinking);
    render(target, outcome);
}

fn render(target: ExplainTarget, outcome: crate::errors::Result<Vec<Explanation>>) {
    match outcome {
        Ok(results) => match target {
            ExplainTarget::All => display::roundtable(&results),
            ExplainTarget::One(_) => {
                for result in &results {
                    display::explanation(result);
                }
            }
        },
        Err(e) => display::error(&e.to_string()),
    }
}

fn parse_menu_choice(input: &str, agent_count: usize) -> MenuChoice {
    let input = input.trim();
    if input.eq_ignore_ascii_case("q") {
        return MenuChoice::Quit;
    }
    match input.parse::<usize>() {
        Ok(n) if n >= 1 && n <= agent_count => {
            MenuChoice::Target(ExplainTarget::One(PersonaKey::ALL[n - 1]))
        }
        Ok(n) if n == agent_count + 1 => MenuChoice::Target(ExplainTarget::All),
        _ => MenuChoice::Invalid,
    }
}

fn parse_input_kind(input: &str) -> InputKind {
    match input.trim() {
        "1" => InputKind::File,
        "2" => InputKind::Paste,
        "3" => InputKind::Question,
        "4" | "b" | "B" => InputKind::Back,
        _ => InputKind::Invalid,
    }
}

fn position_of(key: PersonaKey, agents: &[AgentInfo]) -> usize {
    agents.iter().position(|a| a.key == key).unwrap_or(0)
}

fn paste_question(input: String) -> String {
    optional(input).unwrap_or_else(|| DEFAULT_PASTE_QUESTION.to_string())
}

fn optional(input: String) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn prompt_line(prompt: &str) -> Result<String> {
    print!("\n{}", prompt);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line)
}

/// Read lines until the sentinel (case-insensitive) or EOF.
fn read_pasted_code() -> Result<String> {
    println!(
        "\n  Paste your code below. Type '{}' on a new line when done:\n",
        PASTE_SENTINEL
    );

    let mut lines = Vec::new();
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().eq_ignore_ascii_case(PASTE_SENTINEL) {
            break;
        }
        lines.push(line);
    }
    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_menu_choice_agents() {
        assert!(matches!(
            parse_menu_choice("1", 4),
            MenuChoice::Target(ExplainTarget::One(PersonaKey::Eli5))
        ));
        assert!(matches!(
            parse_menu_choice(" 4 ", 4),
            MenuChoice::Target(ExplainTarget::One(PersonaKey::Roast))
        ));
        assert!(matches!(
            parse_menu_choice("5", 4),
            MenuChoice::Target(ExplainTarget::All)
        ));
    }

    #[test]
    fn test_parse_menu_choice_quit_and_invalid() {
        assert!(matches!(parse_menu_choice("q", 4), MenuChoice::Quit));
        assert!(matches!(parse_menu_choice("Q", 4), MenuChoice::Quit));
        assert!(matches!(parse_menu_choice("0", 4), MenuChoice::Invalid));
        assert!(matches!(parse_menu_choice("6", 4), MenuChoice::Invalid));
        assert!(matches!(parse_menu_choice("banana", 4), MenuChoice::Invalid));
    }

    #[test]
    fn test_optional_blank_is_none() {
        assert_eq!(optional("   \n".to_string()), None);
        assert_eq!(optional(" why? \n".to_string()), Some("why?".to_string()));
    }

    #[test]
    fn test_paste_question_defaults_when_blank() {
        assert_eq!(paste_question("  \n".to_string()), DEFAULT_PASTE_QUESTION);
        assert_eq!(paste_question(" tail call? \n".to_string()), "tail call?");
    }
}
