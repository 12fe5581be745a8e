mod api;
mod calendar;
mod cli;
mod config;
mod db;
mod insights;
mod prompts;
mod streak;

use crate::calendar::day_key;
use crate::cli::onboard::run_onboarding;
use crate::cli::{Cli, Commands, ConfigCommands};
use crate::config::Config;
use crate::db::Database;
use crate::insights::report::{InsightRange, render_text};
use crate::prompts::FALLBACK_PROMPT;
use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Onboard => {
            run_onboarding()?;
            Ok(())
        }
        Commands::Config { command } => handle_config_command(command),
        Commands::Status => handle_status(),
        Commands::Doctor => handle_doctor(),
        Commands::Serve { port } => {
            let mut config = load_or_default_config()?;
            if let Some(port) = port {
                config.api_port = port;
            }
            run_service(config).await
        }
        Commands::Streaks { activity_type } => handle_streaks(activity_type),
        Commands::Prompt { date } => handle_prompt(date),
        Commands::Insights { range, json } => handle_insights(&range, json),
        Commands::MigrateDates { apply } => handle_migrate_dates(apply),
    }
}

fn handle_config_command(command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Set { key, value } => {
            let mut config = load_or_default_config()?;
            config.set_value(&key, &value)?;
            config.ensure_bootstrap_files()?;
            config.save()?;

            println!("Config saved: {key} = {value}");
            Ok(())
        }
        ConfigCommands::Get { key } => {
            let config = load_config()?;
            let value = config
                .get_value(&key)
                .with_context(|| format!("Unsupported config key: {key}"))?;

            println!("{value}");
            Ok(())
        }
    }
}

fn handle_status() -> Result<()> {
    let config = load_config()?;
    let clock = config.clock()?;
    let database = Database::open(&config.db_path)?;
    let counts = database.table_counts()?;

    println!("Digital Diary status");
    println!("- db_path: {}", config.db_path.display());
    println!("- utc_offset_minutes: {}", clock.offset_minutes());
    println!("- local_today: {}", day_key(clock.today()));
    println!("- tasks: {}", counts.tasks);
    println!("- categories: {}", counts.categories);
    println!("- diary_entries: {}", counts.diary_entries);
    println!("- streaks: {}", counts.streaks);
    println!("- prompts: {}", counts.prompts);
    println!("- quotes: {}", counts.quotes);

    Ok(())
}

fn handle_doctor() -> Result<()> {
    let config_path = Config::config_path()?;
    let mut issues = Vec::new();

    if config_path.exists() {
        println!("[OK] config.json found: {}", config_path.display());
    } else {
        println!("[WARN] config.json not found: {}", config_path.display());
        issues.push("config missing".to_string());
    }

    let config = load_or_default_config()?;

    match config.clock() {
        Ok(clock) => println!(
            "[OK] utc_offset_minutes valid: {} (local today {})",
            clock.offset_minutes(),
            day_key(clock.today())
        ),
        Err(error) => {
            println!("[WARN] {error:#}");
            issues.push("invalid utc offset".to_string());
        }
    }

    match Database::open(&config.db_path) {
        Ok(database) => {
            println!("[OK] SQLite reachable: {}", config.db_path.display());

            match config
                .clock()
                .and_then(|clock| database.preview_date_migration(&clock))
            {
                Ok(migrations) => {
                    let pending = migrations
                        .iter()
                        .filter(|migration| migration.needs_update)
                        .count();
                    if pending == 0 {
                        println!("[OK] task dates are canonical");
                    } else {
                        println!(
                            "[WARN] {pending} task date(s) off local noon. Run `diary migrate-dates --apply`"
                        );
                        issues.push("task dates not canonical".to_string());
                    }
                }
                Err(error) => {
                    println!("[WARN] task date check failed: {error:#}");
                    issues.push("task date check failed".to_string());
                }
            }
        }
        Err(error) => {
            println!("[WARN] SQLite check failed: {error:#}");
            issues.push("db unreachable".to_string());
        }
    }

    if issues.is_empty() {
        println!("doctor result: no issues");
    } else {
        println!("doctor result: {} warning(s)", issues.len());
    }

    Ok(())
}

fn handle_streaks(activity_type: Option<String>) -> Result<()> {
    let config = load_config()?;
    let clock = config.clock()?;
    let database = Database::open(&config.db_path)?;
    let streaks = database.list_streaks(activity_type.as_deref())?;

    if streaks.is_empty() {
        println!("No streaks recorded yet");
        return Ok(());
    }

    streaks.iter().for_each(|record| {
        let last_day = record
            .last_activity_at
            .map(|instant| day_key(clock.local_day_of(instant)))
            .unwrap_or_else(|| "never".to_string());
        println!(
            "- {}: current {} / longest {} (last active {})",
            record.activity_type, record.current_streak, record.longest_streak, last_day
        );
    });

    Ok(())
}

fn handle_prompt(date: Option<String>) -> Result<()> {
    let config = load_config()?;
    let clock = config.clock()?;
    let day = date
        .as_deref()
        .map(|raw| clock.parse_day(raw))
        .transpose()?
        .unwrap_or_else(|| clock.today());

    let mut database = Database::open(&config.db_path)?;
    let prompt = database.prompt_for_day(day, Utc::now())?;

    println!(
        "{}: {}",
        day_key(day),
        prompt
            .map(|prompt| prompt.content)
            .unwrap_or_else(|| FALLBACK_PROMPT.to_string())
    );

    Ok(())
}

fn handle_insights(range: &str, json: bool) -> Result<()> {
    let config = load_config()?;
    let clock = config.clock()?;
    let range = range.parse::<InsightRange>().map_err(|error| anyhow!(error))?;
    let database = Database::open(&config.db_path)?;

    let report = insights::generate_insights(&database, &clock, range, Utc::now())?;

    if json {
        let content =
            serde_json::to_string_pretty(&report).context("Failed to serialize insights")?;
        println!("{content}");
    } else {
        print!("{}", render_text(&report));
    }

    Ok(())
}

fn handle_migrate_dates(apply: bool) -> Result<()> {
    let config = load_config()?;
    let clock = config.clock()?;
    let mut database = Database::open(&config.db_path)?;

    let migrations = if apply {
        let applied = database.apply_date_migration(&clock, Utc::now())?;
        info!(migrated = applied.len(), "task dates migrated");
        applied
    } else {
        database
            .preview_date_migration(&clock)?
            .into_iter()
            .filter(|migration| migration.needs_update)
            .collect()
    };

    if migrations.is_empty() {
        println!("All task dates are canonical");
        return Ok(());
    }

    migrations.iter().for_each(|migration| {
        println!(
            "- {} \"{}\": {} -> {}",
            migration.id,
            migration.title,
            migration.original_date.to_rfc3339(),
            migration.corrected_date.to_rfc3339()
        );
    });

    if apply {
        println!("Migrated {} task(s)", migrations.len());
    } else {
        println!(
            "{} task(s) need migration. Re-run with --apply to update",
            migrations.len()
        );
    }

    Ok(())
}

async fn run_service(config: Config) -> Result<()> {
    config.ensure_bootstrap_files()?;
    Database::open(&config.db_path)?;

    let shared_config = Arc::new(config);

    info!(
        db_path = %shared_config.db_path.display(),
        "Digital Diary service started"
    );

    tokio::select! {
        api_result = api::run_server(Arc::clone(&shared_config)) => {
            api_result?;
        }
        _ = signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    Ok(())
}

fn load_or_default_config() -> Result<Config> {
    Config::load().or_else(|_| {
        let config = Config::default();
        config.ensure_bootstrap_files()?;
        config.save()?;
        Ok(config)
    })
}

fn load_config() -> Result<Config> {
    Config::load().with_context(|| "Config file not found. Run `diary onboard` first.".to_string())
}
