//! Thin CLI entry point for ThreadBox: flag parsing, working-directory /
//! environment discovery, and the stdio tool-call loop. Everything here is
//! deliberately outside the storage engine's scope (spec §1c) — it only
//! wires `threadbox_core` to the outside world.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use serde::Deserialize;
use serde_json::json;

use threadbox_core::config::DataPathConfig;
use threadbox_core::dispatcher::Dispatcher;
use threadbox_core::engine::Engine;

#[derive(Parser, Debug)]
#[command(name = "threadbox", about = "ThreadBox agent sandbox filesystem")]
struct Cli {
    /// Run the tool-call loop over standard streams.
    #[arg(long)]
    mcp_server: bool,

    /// Print a JSON summary of every session to standard out.
    #[arg(long)]
    dump: bool,

    /// Session to operate on (used with --zip).
    #[arg(long)]
    session: Option<String>,

    /// Export --session as a ZIP archive and print its path.
    #[arg(long)]
    zip: bool,

    /// Override the data directory (defaults to `$HOME/.threadbox/data`).
    #[arg(long)]
    data_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct ToolCall {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("threadbox: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let data_path = DataPathConfig::resolve(cli.data_path.clone())?;
    let engine = Engine::open(&data_path.db_path())?;

    if cli.mcp_server {
        return run_mcp_server(engine);
    }
    if cli.dump {
        return run_dump(&engine);
    }
    if cli.zip {
        let dest = engine.export_session_zip(cli.session.as_deref(), None)?;
        println!("{}", dest.display());
        return Ok(());
    }

    anyhow::bail!("no action specified; pass --mcp-server, --dump, or --zip")
}

/// Tool-call loop: one JSON object per line on stdin (`{"name", "arguments"}`),
/// one JSON object per line on stdout (`{"isError", "payload"}`). No stdout
/// logging is permitted; diagnostics go to stderr only (spec §6).
fn run_mcp_server(engine: Engine) -> anyhow::Result<()> {
    let mut dispatcher = Dispatcher::new(engine);
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<ToolCall>(&line) {
            Ok(call) => {
                let result = dispatcher.dispatch(&call.name, &call.arguments);
                json!({ "isError": result.is_error, "payload": result.payload })
            }
            Err(e) => {
                tracing::warn!(error = %e, "malformed tool call");
                json!({ "isError": true, "payload": format!("malformed request: {e}") })
            }
        };
        writeln!(out, "{response}")?;
        out.flush()?;
    }
    Ok(())
}

fn run_dump(engine: &Engine) -> anyhow::Result<()> {
    let mut sessions = serde_json::Map::new();
    for session in engine.sessions()? {
        let entries = engine.dump_session(&session)?;
        let file_count = entries.iter().filter(|e| !e.is_directory).count();
        let files: Vec<_> = entries
            .iter()
            .map(|e| {
                json!({
                    "path": e.path,
                    "isDirectory": e.is_directory,
                    "version": e.version,
                    "size": e.size,
                })
            })
            .collect();
        sessions.insert(
            session,
            json!({
                "fileCount": file_count,
                "files": files,
            }),
        );
    }
    println!("{}", serde_json::Value::Object(sessions));
    Ok(())
}
