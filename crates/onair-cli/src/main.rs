use std::path::Path;
use std::process::ExitCode;

use chrono::Weekday;
use clap::Parser;
use onair_schedule::ScheduleEngine;
use onair_staffing::RosterManager;
use rusqlite::Connection;
use tracing::info;

mod args;
mod commands;

use args::Cli;

fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "onair=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // config: --config > ONAIR_CONFIG > ~/.onair/onair.toml
    let config = onair_core::OnairConfig::load(cli.config.as_deref()).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        onair_core::OnairConfig::default()
    });
    let db_path = cli
        .db
        .clone()
        .unwrap_or_else(|| config.database.path.clone().into());
    info!(
        path = %db_path.display(),
        week_start = ?config.schedule.week_start,
        "opening SQLite database"
    );
    let (engine, roster) = open(&db_path, config.schedule.week_start.weekday())?;

    let outcome = commands::run(cli.command, &engine, &roster)?;
    println!("{}", serde_json::to_string_pretty(&outcome.output)?);
    Ok(if outcome.conflict {
        ExitCode::from(2)
    } else {
        ExitCode::SUCCESS
    })
}

/// Open (creating if needed) the database at `path`. Schedule and staffing
/// each get their own connection.
fn open(path: &Path, week_start: Weekday) -> anyhow::Result<(ScheduleEngine, RosterManager)> {
    ensure_parent_dir(path);
    let db = Connection::open(path)?;
    db.execute_batch("PRAGMA journal_mode=WAL;")?;
    let engine = ScheduleEngine::new(db, week_start)?;
    let roster = RosterManager::new(Connection::open(path)?)?;
    Ok((engine, roster))
}

fn ensure_parent_dir(path: &Path) {
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}
