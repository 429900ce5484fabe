use clap::Parser;
use eyre::{Context, Result, bail};
use log::info;
use std::fs;
use std::path::PathBuf;

mod backend;
mod cli;
mod config;
mod display;
mod errors;
mod manager;
mod mcp;
mod persona;
mod repl;
mod tools;

use backend::HttpBackend;
use cli::Cli;
use config::{Config, LogLevel};
use manager::AgentManager;
use persona::PersonaSet;

fn setup_logging(log_level: LogLevel) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("splain")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("splain.log");

    // The UI owns stdout, so logs go to a file
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    // RUST_LOG env var takes precedence, otherwise use config log_level
    let mut builder = env_logger::Builder::new();

    if std::env::var("RUST_LOG").is_ok() {
        builder.parse_default_env();
    } else {
        builder.filter_level(log_level.as_filter());
    }

    builder.target(env_logger::Target::Pipe(target)).init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn run(cli: Cli, config: Config) -> Result<()> {
    let working_dir = match cli.working_dir {
        Some(dir) => Config::expand_path(&dir),
        None => std::env::current_dir().context("Failed to resolve current directory")?,
    };

    if !working_dir.is_dir() {
        bail!("working directory does not exist: {}", working_dir.display());
    }

    // Load personas before touching any external process; a malformed
    // persona must abort startup with nothing to clean up.
    let personas_dir = config.personas_dir.as_ref().map(|p| Config::expand_path(p));
    let personas =
        PersonaSet::load(personas_dir.as_deref()).context("Failed to load personas")?;

    let backend = HttpBackend::from_config(&config.backend).context("Failed to set up backend")?;

    let mut manager = AgentManager::new(Box::new(backend), personas);
    display::welcome(&manager.agents());
    println!("    📂 Working in: {}\n", working_dir.display());

    println!("    Connecting to MCP servers...");
    let (connections, warnings) = mcp::connect_all(&working_dir);
    display::connector_warnings(&warnings);

    if connections.is_empty() {
        display::error("Failed to connect to any MCP servers");
        bail!("no MCP servers available");
    }
    let names: Vec<&str> = connections.iter().map(|c| c.name).collect();
    println!("    Connected: {}\n", names.join(", "));

    println!("    Waking up the agents...");
    let summary = manager
        .initialize(&connections)
        .context("Failed to initialize agents")?;
    info!("{} agents ready, {} tools", summary.agents, summary.tools);
    println!("    All agents are ready to chat!\n");

    let outcome = repl::run(&mut manager);

    // Teardown is best-effort either way; the repl result decides exit status
    if let Err(e) = manager.shutdown() {
        log::warn!("shutdown: {}", e);
    }
    for connection in connections {
        connection.close();
    }

    outcome?;
    display::goodbye();
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration before logging so Config::load stays quiet
    let config = Config::load().context("Failed to load configuration")?;

    setup_logging(config.log_level).context("Failed to setup logging")?;

    info!("Starting splain");

    run(cli, config).context("splain failed")?;

    Ok(())
}
