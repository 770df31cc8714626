//! ARA command line.
//!
//! Usage:
//!   ara migrate-scenarios --snapshot <file> --project-code <code> [--output <file>]
//!   ara assign-problems --snapshot <file> --project-id <id> [--errors <id,id,...>] [--output <file>]
//!   ara find-errors --snapshot <file> --project-id <id> --pattern <file> [--page <n>] [--size <n>]

use std::env;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use ara_lib::config::Config;
use ara_lib::db::{errors, scenarios, DbPool};
use ara_lib::error::{AppError, AppResult};
use ara_lib::models::{Pageable, ProblemPattern};
use ara_lib::services::snapshot::{write_json, Snapshot};
use ara_lib::services::{auto_assign_problems_to_new_errors, find_matching_errors, migrate_scenarios};

fn main() {
    dotenvy::dotenv().ok();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }
    let command = args[1].as_str();
    if matches!(command, "help" | "--help" | "-h") {
        print_usage();
        return;
    }

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            std::process::exit(1);
        }
    };

    // Logs go to stderr so that JSON results on stdout stay clean
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    info!("ARA {} ({})", env!("CARGO_PKG_VERSION"), config.environment);
    if config.is_development() {
        warn!("Running in DEVELOPMENT mode");
    }

    let result = match command {
        "migrate-scenarios" => migrate(&config, &args),
        "assign-problems" => assign_problems(&config, &args),
        "find-errors" => find_errors(&config, &args),
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        error!("{} failed: {}", command, e);
        eprintln!("Error: {}", e);
        std::process::exit(if e.is_validation() || e.is_not_found() { 2 } else { 1 });
    }
}

fn arg_value(args: &[String], name: &str) -> Option<String> {
    args.iter()
        .skip(2)
        .position(|arg| arg == name)
        .and_then(|index| args.get(index + 3))
        .cloned()
}

fn required_arg(args: &[String], name: &str) -> AppResult<String> {
    arg_value(args, name).ok_or_else(|| AppError::InvalidInput(format!("{} is required", name)))
}

fn parse_arg<T: std::str::FromStr>(args: &[String], name: &str) -> AppResult<Option<T>> {
    arg_value(args, name)
        .map(|value| {
            value
                .parse::<T>()
                .map_err(|_| AppError::InvalidInput(format!("{} has an invalid value: {}", name, value)))
        })
        .transpose()
}

fn snapshot_path(config: &Config, args: &[String]) -> AppResult<PathBuf> {
    arg_value(args, "--snapshot")
        .map(PathBuf::from)
        .or_else(|| config.snapshot_path.clone())
        .ok_or_else(|| {
            AppError::InvalidInput("--snapshot is required when ARA_SNAPSHOT_PATH is not set".to_string())
        })
}

fn load_snapshot(config: &Config, args: &[String]) -> AppResult<(Snapshot, DbPool)> {
    let snapshot = Snapshot::from_file(&snapshot_path(config, args)?)?;
    let pool = DbPool::new()?;
    snapshot.load_into(&pool)?;
    Ok((snapshot, pool))
}

fn output_path(args: &[String]) -> Option<PathBuf> {
    arg_value(args, "--output").map(PathBuf::from)
}

fn migrate(config: &Config, args: &[String]) -> AppResult<()> {
    let project_code = required_arg(args, "--project-code")?;
    let (snapshot, pool) = load_snapshot(config, args)?;

    let legacy_project = snapshot.legacy_project(&project_code);
    let migration_project = snapshot.migration_project(&project_code);
    let executions = legacy_project
        .and_then(|project| project.id)
        .map(|project_id| snapshot.executions_of(project_id))
        .unwrap_or_default();
    let (features, tags) = migration_project
        .map(|project| snapshot.features_and_tags_of(project))
        .unwrap_or_default();

    let migrated = pool.transaction(|tx| {
        migrate_scenarios(
            tx,
            legacy_project,
            migration_project,
            &features,
            &tags,
            &executions,
        )
    })?;

    let stored = match migration_project {
        Some(project) => pool.read(|conn| scenarios::scenarios_of_project(conn, project.id))?,
        None => Vec::new(),
    };
    info!(
        "Migrated {} scenarios ({} stored) with {} versions",
        migrated.len(),
        stored.len(),
        migrated.iter().map(|scenario| scenario.versions.len()).sum::<usize>()
    );

    write_json(&migrated, output_path(args).as_deref())
}

fn assign_problems(config: &Config, args: &[String]) -> AppResult<()> {
    let project_id: i64 = parse_arg(args, "--project-id")?
        .ok_or_else(|| AppError::InvalidInput("--project-id is required".to_string()))?;
    let (_, pool) = load_snapshot(config, args)?;

    let error_ids: Vec<i64> = match arg_value(args, "--errors") {
        Some(ids) => ids
            .split(',')
            .filter(|id| !id.trim().is_empty())
            .map(|id| {
                id.trim()
                    .parse::<i64>()
                    .map_err(|_| AppError::InvalidInput(format!("Invalid error id: {}", id)))
            })
            .collect::<AppResult<_>>()?,
        None => pool.read(|conn| errors::error_ids_of_project(conn, project_id))?,
    };

    let problems = pool.transaction(|tx| auto_assign_problems_to_new_errors(tx, project_id, &error_ids))?;
    info!("{} problems matched {} errors", problems.len(), error_ids.len());

    write_json(&problems, output_path(args).as_deref())
}

fn find_errors(config: &Config, args: &[String]) -> AppResult<()> {
    let project_id: i64 = parse_arg(args, "--project-id")?
        .ok_or_else(|| AppError::InvalidInput("--project-id is required".to_string()))?;
    let pattern_path = required_arg(args, "--pattern")?;
    let pattern: ProblemPattern = serde_json::from_str(&std::fs::read_to_string(Path::new(&pattern_path))?)?;

    let page: Option<u32> = parse_arg(args, "--page")?;
    let size: Option<u32> = parse_arg(args, "--size")?;
    let pageable = (page.is_some() || size.is_some())
        .then(|| Pageable::of(page.unwrap_or(0), config.page_size(size)));

    let (_, pool) = load_snapshot(config, args)?;
    let matched = pool.read(|conn| find_matching_errors(conn, project_id, &pattern, pageable))?;

    write_json(&matched, output_path(args).as_deref())
}

fn print_usage() {
    eprintln!();
    eprintln!("Usage: ara <command> [options]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  migrate-scenarios   Migrate the scenarios of a legacy project");
    eprintln!("      --snapshot <file>       JSON snapshot (default: ARA_SNAPSHOT_PATH)");
    eprintln!("      --project-code <code>   Legacy and destination project code");
    eprintln!("      --output <file>         Write the result here instead of stdout");
    eprintln!("  assign-problems     Assign problems to errors from the patterns they match");
    eprintln!("      --snapshot <file>       JSON snapshot (default: ARA_SNAPSHOT_PATH)");
    eprintln!("      --project-id <id>       Project of the errors");
    eprintln!("      --errors <id,id,...>    Errors to assign (default: every error)");
    eprintln!("      --output <file>         Write the result here instead of stdout");
    eprintln!("  find-errors         List the errors matching a problem pattern");
    eprintln!("      --snapshot <file>       JSON snapshot (default: ARA_SNAPSHOT_PATH)");
    eprintln!("      --project-id <id>       Project of the errors");
    eprintln!("      --pattern <file>        JSON problem pattern");
    eprintln!("      --page <n> --size <n>   Page to return (default: first 10 errors)");
    eprintln!("  help                Show this help");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  ara migrate-scenarios --snapshot legacy.json --project-code shop --output v2.json");
    eprintln!("  ara assign-problems --snapshot legacy.json --project-id 1 --errors 12,13");
    eprintln!();
}
