use crate::calendar::DayClock;
use crate::config::{Config, expand_home};
use crate::db::Database;
use anyhow::{Context, Result};
use chrono::Utc;
use dialoguer::{Confirm, Input, theme::ColorfulTheme};
use tracing::info;

pub fn run_onboarding() -> Result<Config> {
    println!("──────────────────────────────────────────");
    println!("  Welcome to Digital Diary onboarding.");
    println!("──────────────────────────────────────────");

    let theme = ColorfulTheme::default();
    let defaults = Config::default();

    println!("\n[1/4] Database location");
    let db_path_input: String = Input::with_theme(&theme)
        .with_prompt("  SQLite database file")
        .default(defaults.db_path.display().to_string())
        .interact_text()
        .context("Failed to read database path")?;
    let db_path = expand_home(db_path_input.trim());
    println!("  ✓ {}", db_path.display());

    println!("\n[2/4] Day boundary");
    println!("  Days roll over at local midnight for a fixed UTC offset (minutes).");
    let utc_offset_minutes: i32 = Input::with_theme(&theme)
        .with_prompt("  UTC offset in minutes (330 = UTC+05:30)")
        .default(defaults.utc_offset_minutes)
        .validate_with(|input: &i32| -> std::result::Result<(), String> {
            DayClock::new(*input)
                .map(|_| ())
                .map_err(|error| error.to_string())
        })
        .interact_text()
        .context("Failed to read UTC offset")?;
    println!(
        "  ✓ Today is {} locally",
        DayClock::new(utc_offset_minutes)?.today()
    );

    println!("\n[3/4] API port");
    let api_port: u16 = Input::with_theme(&theme)
        .with_prompt("  Local HTTP port")
        .default(defaults.api_port)
        .interact_text()
        .context("Failed to read API port")?;
    println!("  ✓ http://127.0.0.1:{api_port}");

    println!("\n[4/4] Daily prompts");
    let seed_prompts = Confirm::with_theme(&theme)
        .with_prompt("  Seed the default reflection prompts now?")
        .default(true)
        .interact()
        .context("Failed to read prompt seeding input")?;

    let config = Config {
        db_path,
        api_port,
        utc_offset_minutes,
        ..defaults
    };

    config.ensure_bootstrap_files()?;
    config.save()?;
    let mut database = Database::open(&config.db_path)?;

    if seed_prompts {
        let seeded = database.seed_default_prompts(Utc::now())?;
        info!(count = seeded, "seeded default prompts");
        println!("  ✓ {seeded} prompt(s) added");
    } else {
        println!("  ✓ Prompts will be seeded on first request");
    }

    println!("\n──────────────────────────────────────────");
    println!("  Onboarding complete!");
    println!("  Run `diary serve` to start the API.");
    println!("──────────────────────────────────────────");

    Ok(config)
}
