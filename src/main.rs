use std::path::{Path, PathBuf};
use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use radmart::config::{self, EngineConfig};
use radmart::db::open_database;
use radmart::etl::LoadEngine;
use radmart::feed::read_feed;
use radmart::warehouse;

const USAGE: &str = "\
Usage: radmart <database> <command> [args]

Commands:
  load <feed.csv>      incremental load of a feed into the operational store
  transform            rebuild the warehouse from the operational store
  qa [summary.md]      run the QA battery and write the markdown summary
  run <feed.csv>       load, transform and qa in sequence";

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!("{} v{}", config::APP_NAME, config::APP_VERSION);

    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("Fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &[String]) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let (database, command) = match args {
        [database, command, ..] => (PathBuf::from(database), command.as_str()),
        _ => {
            eprintln!("{USAGE}");
            return Ok(ExitCode::FAILURE);
        }
    };

    let engine_config = EngineConfig::new(&database);
    let mut conn = open_database(&engine_config.database_path)?;

    match command {
        "load" => {
            let feed_path = required_arg(args, 2, "load needs a feed path")?;
            run_load(&mut conn, &engine_config, Path::new(&feed_path))?;
        }
        "transform" => {
            run_transform(&mut conn)?;
        }
        "qa" => {
            let summary = args.get(2).map(String::as_str).unwrap_or("warehouse_qa_summary.md");
            run_qa(&conn, Path::new(summary))?;
        }
        "run" => {
            let feed_path = required_arg(args, 2, "run needs a feed path")?;
            run_load(&mut conn, &engine_config, Path::new(&feed_path))?;
            run_transform(&mut conn)?;
            run_qa(&conn, Path::new("warehouse_qa_summary.md"))?;
        }
        other => {
            eprintln!("Unknown command: {other}\n\n{USAGE}");
            return Ok(ExitCode::FAILURE);
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn required_arg(args: &[String], index: usize, message: &str) -> Result<String, String> {
    args.get(index).cloned().ok_or_else(|| format!("{message}\n\n{USAGE}"))
}

fn run_load(
    conn: &mut rusqlite::Connection,
    engine_config: &EngineConfig,
    feed_path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let records = read_feed(feed_path)?;
    let engine = LoadEngine::new(conn, engine_config)?;
    let stats = engine.run(conn, records)?;
    tracing::info!(counters = %serde_json::to_string(&stats)?, "Load finished");
    Ok(())
}

fn run_transform(conn: &mut rusqlite::Connection) -> Result<(), Box<dyn std::error::Error>> {
    let stats = warehouse::rebuild(conn)?;
    tracing::info!(counters = %serde_json::to_string(&stats)?, "Transform finished");
    Ok(())
}

fn run_qa(
    conn: &rusqlite::Connection,
    summary_path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let report = warehouse::run_checks(conn);
    std::fs::write(summary_path, report.to_markdown())?;

    // QA failures are report content, not process failures.
    if report.all_passed() {
        tracing::info!("QA finished: all checks passed");
    } else {
        tracing::warn!(failing = report.failures(), "QA finished with failing checks");
    }
    tracing::info!("QA summary written to {}", summary_path.display());
    Ok(())
}
