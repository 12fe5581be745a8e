pub mod onboard;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "diary",
    about = "Digital Diary: tasks, journal, streaks and daily prompts"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Interactive first-run setup
    Onboard,
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    Status,
    Doctor,
    /// Run the HTTP API in the foreground
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
    Streaks {
        #[arg(long = "type")]
        activity_type: Option<String>,
    },
    /// Print today's prompt
    Prompt {
        #[arg(long)]
        date: Option<String>,
    },
    Insights {
        #[arg(long, default_value = "week")]
        range: String,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Re-anchor task dates to local noon of their creation day
    MigrateDates {
        #[arg(long, default_value_t = false)]
        apply: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    Set { key: String, value: String },
    Get { key: String },
}

#[cfg(test)]
mod tests {
    use super::{Cli, Commands};
    use clap::Parser;

    #[test]
    fn parses_streak_type_flag() {
        let cli = Cli::try_parse_from(["diary", "streaks", "--type", "journal"]).expect("parse");
        assert!(matches!(
            cli.command,
            Commands::Streaks { activity_type: Some(ref value) } if value == "journal"
        ));
    }

    #[test]
    fn migrate_dates_defaults_to_preview() {
        let cli = Cli::try_parse_from(["diary", "migrate-dates"]).expect("parse");
        assert!(matches!(cli.command, Commands::MigrateDates { apply: false }));
    }
}
