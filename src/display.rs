//! Terminal presentation
//!
//! Chat-styled rendering for agent responses: a banner, a numbered persona
//! menu, per-agent colored blocks, and a roundtable frame when every agent
//! answers. Pure output; all input prompting lives in the repl.

use colored::{ColoredString, Colorize};
use terminal_size::{Width, terminal_size};

use crate::manager::{AgentInfo, Explanation};
use crate::mcp::ConnectorWarning;
use crate::persona::PersonaKey;

const MIN_WIDTH: usize = 40;
const MAX_WIDTH: usize = 72;

/// Width for rules and frames, clamped to something chat-bubble sized.
fn frame_width() -> usize {
    let cols = terminal_size().map(|(Width(w), _)| w as usize).unwrap_or(60);
    cols.clamp(MIN_WIDTH, MAX_WIDTH)
}

/// Paint text in an agent's signature color.
fn agent_color(key: PersonaKey, text: &str) -> ColoredString {
    let (r, g, b) = key.rgb();
    text.truecolor(r, g, b)
}

pub fn welcome(agents: &[AgentInfo]) {
    let width = frame_width();
    println!();
    println!("{}", format!("╭{}╮", "─".repeat(width - 2)).cyan());
    println!("{}  {}", "│".cyan(), "🤖 CODE EXPLAINER AGENTS".bold());
    println!("{}  {}", "│".cyan(), "Your AI team for understanding code".dimmed());
    println!("{}", format!("╰{}╯", "─".repeat(width - 2)).cyan());
    println!();
    println!("    Meet your agents:\n");
    for agent in agents {
        println!(
            "    {} {}  {}",
            agent.glyph,
            agent_color(agent.key, &format!("{:<15}", agent.name)),
            agent.description.dimmed()
        );
    }
    println!();
}

pub fn menu(agents: &[AgentInfo]) {
    println!();
    println!("{}", "Who would you like to talk to?".cyan());
    println!();
    for (i, agent) in agents.iter().enumerate() {
        println!(
            "  [{}] {} {}",
            i + 1,
            agent.glyph,
            agent_color(agent.key, &agent.name)
        );
    }
    println!("  [{}] 🎭 {}", agents.len() + 1, "Everyone".magenta());
    println!("{}", "\n  [q] Exit".dimmed());
}

pub fn greeting(agent: &AgentInfo) {
    let width = frame_width();
    let line = "━".repeat(width);
    println!();
    println!("{}", agent_color(agent.key, &line));
    println!(
        "{} {}",
        agent_color(agent.key, &format!("{} {}:", agent.glyph, agent.name)),
        "\"Ready when you are!\"".white()
    );
    println!("{}", agent_color(agent.key, &line));
}

pub fn thinking(agent: &AgentInfo) {
    println!(
        "\n{}",
        format!("{} {} is thinking...", agent.glyph, agent.name).dimmed()
    );
}

pub fn explanation(result: &Explanation) {
    let width = frame_width();
    println!();
    println!("{}", agent_color(result.key, &format!("┌{}┐", "─".repeat(width - 2))));
    println!(
        "{} {} {}",
        agent_color(result.key, "│"),
        result.glyph,
        agent_color(result.key, &result.agent)
    );
    println!("{}", agent_color(result.key, &format!("└{}┘", "─".repeat(width - 2))));
    for line in result.text.lines() {
        println!("  {}", line);
    }
    println!();
}

pub fn roundtable(results: &[Explanation]) {
    let width = frame_width();
    println!();
    println!("{}", format!("╔{}╗", "═".repeat(width - 2)).magenta().bold());
    println!("{}  {}", "║".magenta().bold(), "🎭 AGENT ROUNDTABLE".bold());
    println!(
        "{}  {}",
        "║".magenta().bold(),
        "Multiple perspectives on your code".dimmed()
    );
    println!("{}", format!("╚{}╝", "═".repeat(width - 2)).magenta().bold());

    for result in results {
        explanation(result);
    }

    println!("{}", "─".repeat(width).dimmed());
    println!("{}", "  💬 All agents have shared their perspectives!".dimmed());
    println!("{}", "─".repeat(width).dimmed());
}

pub fn error(message: &str) {
    println!("\n{} {}", "❌ Error:".red(), message);
}

pub fn info(message: &str) {
    println!("{}", format!("    ℹ️  {}", message).dimmed());
}

pub fn connector_warnings(warnings: &[ConnectorWarning]) {
    for warning in warnings {
        info(&format!("{}: {}", warning.name, warning.reason));
    }
}

pub fn goodbye() {
    println!();
    println!("{}", "👋 Thanks for chatting with us!".bold().cyan());
    println!();
    println!("   🧒 \"Bye bye, friend!\"");
    println!("   🔬 \"Until next time.\"");
    println!("   🌉 \"Like saying goodbye to old friends!\"");
    println!("   🔥 \"Your code will miss my roasts!\"");
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_width_is_clamped() {
        let width = frame_width();
        assert!((MIN_WIDTH..=MAX_WIDTH).contains(&width));
    }
}
