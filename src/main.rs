use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use observer::ingest::{BatchReport, IngestError, RegenPolicy};
use observer::{config, db, ingest, loader};

const USAGE: &str = "usage: observer <command>

commands:
  load <path>            ingest a .json file or a directory of them
  regenerate <msid>...   rebuild the given articles from stored history
  regenerate-all         rebuild every known article

the database lives at ~/.observer/observer.sqlite3 unless OBSERVER_DB is set";

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("observer starting v{}", config::APP_VERSION);

    let args: Vec<String> = env::args().skip(1).collect();
    match run(&args) {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(error = %err, "command failed");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &[String]) -> Result<ExitCode, IngestError> {
    let Some(command) = args.first() else {
        eprintln!("{USAGE}");
        return Ok(ExitCode::FAILURE);
    };

    let mut conn = open_database()?;
    let policy = RegenPolicy::default();

    let report = match command.as_str() {
        "load" => {
            let Some(target) = args.get(1) else {
                eprintln!("{USAGE}");
                return Ok(ExitCode::FAILURE);
            };
            loader::load_path(&mut conn, PathBuf::from(target).as_path(), &policy)?
        }
        "regenerate" => {
            let msids = &args[1..];
            if msids.is_empty() {
                eprintln!("{USAGE}");
                return Ok(ExitCode::FAILURE);
            }
            ingest::regenerate_many(&mut conn, msids, &policy)?
        }
        "regenerate-all" => ingest::regenerate_all(&mut conn, &policy)?,
        _ => {
            eprintln!("{USAGE}");
            return Ok(ExitCode::FAILURE);
        }
    };

    Ok(print_report(&report))
}

fn open_database() -> Result<rusqlite::Connection, IngestError> {
    let path = match env::var_os("OBSERVER_DB") {
        Some(p) => PathBuf::from(p),
        None => config::database_path(),
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            IngestError::Unclassified(format!("cannot create {}: {e}", parent.display()))
        })?;
    }
    tracing::info!(path = %path.display(), "opening database");
    Ok(db::open_database(&path)?)
}

fn print_report(report: &BatchReport) -> ExitCode {
    println!("regenerated {} article(s)", report.committed.len());
    for skipped in &report.skipped {
        println!("skipped {}: {}", skipped.msid, skipped.reason);
    }
    if report.committed.is_empty() && !report.skipped.is_empty() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
