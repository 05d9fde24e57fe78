mod app;
mod commands;
mod render;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use lingualab::flashcards::algorithm::{Rating, MAX_QUALITY};

#[derive(Parser)]
#[command(name = "lingualab-cli", about = "LinguaLab spaced-repetition trainer", version)]
struct Cli {
    /// Config file (default: platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory, overrides the config file
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "plain")]
    format: OutputFormat,

    /// Disable ANSI colors
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Plain,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Add a card
    Add {
        /// Text in the source language
        front: String,
        /// Translation
        back: String,
        /// Source language (default from config)
        #[arg(long)]
        src: Option<String>,
        /// Target language (default from config)
        #[arg(long)]
        dst: Option<String>,
        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,
    },

    /// Show cards due for review
    Due {
        /// Maximum cards (default from config)
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Grade a card: 0-5 or again/hard/good/easy
    Grade {
        /// Card id (unique prefix is enough)
        id: String,
        #[arg(value_parser = parse_grade)]
        grade: i32,
    },

    /// Show a card with its schedule and history
    Show {
        /// Card id (unique prefix is enough)
        id: String,
    },

    /// List cards by creation date
    List {
        /// Created on or after (YYYY-MM-DD)
        #[arg(long)]
        since: Option<String>,
        /// Created before (YYYY-MM-DD)
        #[arg(long)]
        until: Option<String>,
        /// Maximum results
        #[arg(long, default_value = "100")]
        limit: usize,
    },

    /// Delete a card
    Rm {
        /// Card id (unique prefix is enough)
        id: String,
    },

    /// Add or remove tags on a card
    Tag {
        /// Card id (unique prefix is enough)
        id: String,
        /// Comma-separated tags to add
        #[arg(long)]
        add: Option<String>,
        /// Comma-separated tags to remove
        #[arg(long)]
        remove: Option<String>,
    },

    /// Review statistics
    Stats,

    /// Import a legacy deck from the flat store
    Migrate {
        /// Flat-store key to import from (default from config)
        #[arg(long)]
        key: Option<String>,
    },

    /// Pull from and push to the sync mirror
    Sync,

    /// Compare an answer with the expected text
    Check {
        expected: String,
        answer: String,
    },

    /// Saved translations
    #[command(subcommand)]
    Fav(FavCommand),
}

#[derive(Subcommand)]
enum FavCommand {
    /// Save a translation
    Add {
        /// Text as typed
        input: String,
        /// Its translation
        out: String,
        /// Source language (default from config)
        #[arg(long)]
        src: Option<String>,
        /// Target language (default from config)
        #[arg(long)]
        dst: Option<String>,
    },

    /// List saved translations, newest first
    List,

    /// Remove the entry at INDEX (0 = newest)
    Rm { index: usize },
}

/// Accept a 0-5 quality or a button name
fn parse_grade(value: &str) -> Result<i32, String> {
    if let Some(rating) = Rating::parse(value) {
        return Ok(rating.quality());
    }
    match value.parse::<i32>() {
        Ok(q) if (0..=MAX_QUALITY as i32).contains(&q) => Ok(q),
        _ => Err(format!(
            "expected 0-{} or again/hard/good/easy, got '{}'",
            MAX_QUALITY, value
        )),
    }
}

/// Split a comma-separated tag list
fn parse_tags(tags: Option<&str>) -> Vec<String> {
    tags.map(|t| {
        t.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let use_color = !cli.no_color && atty_check();
    let config_path = cli.config.as_deref();
    let data_dir = cli.data_dir;

    match cli.command {
        Command::Add { front, back, src, dst, tags } => {
            let app = app::App::open(config_path, data_dir).await?;
            commands::add::run(
                &app,
                &front,
                &back,
                src.as_deref(),
                dst.as_deref(),
                parse_tags(tags.as_deref()),
                &cli.format,
            )
            .await?;
        }
        Command::Due { limit } => {
            let app = app::App::open(config_path, data_dir).await?;
            commands::due::run(&app, limit, &cli.format, use_color).await?;
        }
        Command::Grade { id, grade } => {
            let app = app::App::open(config_path, data_dir).await?;
            commands::grade::run(&app, &id, grade, &cli.format, use_color).await?;
        }
        Command::Show { id } => {
            let app = app::App::open(config_path, data_dir).await?;
            commands::show::run(&app, &id, &cli.format, use_color).await?;
        }
        Command::List { since, until, limit } => {
            let app = app::App::open(config_path, data_dir).await?;
            commands::list::run(&app, since.as_deref(), until.as_deref(), limit, &cli.format, use_color)
                .await?;
        }
        Command::Rm { id } => {
            let app = app::App::open(config_path, data_dir).await?;
            commands::rm::run(&app, &id, &cli.format).await?;
        }
        Command::Tag { id, add, remove } => {
            let app = app::App::open(config_path, data_dir).await?;
            commands::tag::run(
                &app,
                &id,
                parse_tags(add.as_deref()),
                parse_tags(remove.as_deref()),
                &cli.format,
            )
            .await?;
        }
        Command::Stats => {
            let app = app::App::open(config_path, data_dir).await?;
            commands::stats::run(&app, &cli.format).await?;
        }
        Command::Migrate { key } => {
            let app = app::App::open(config_path, data_dir).await?;
            commands::sync::run_migrate(&app, key.as_deref(), &cli.format).await?;
        }
        Command::Sync => {
            let app = app::App::open(config_path, data_dir).await?;
            commands::sync::run_sync(&app, &cli.format).await?;
        }
        Command::Check { expected, answer } => {
            commands::check::run(&expected, &answer, &cli.format, use_color)?;
        }
        Command::Fav(subcmd) => {
            let app = app::App::open(config_path, data_dir).await?;
            match subcmd {
                FavCommand::Add { input, out, src, dst } => {
                    commands::fav::run_add(&app, &input, &out, src.as_deref(), dst.as_deref(), &cli.format)
                        .await?;
                }
                FavCommand::List => {
                    commands::fav::run_list(&app, &cli.format)?;
                }
                FavCommand::Rm { index } => {
                    commands::fav::run_rm(&app, index, &cli.format).await?;
                }
            }
        }
    }

    Ok(())
}

/// Check if stdout is a terminal (for color support)
fn atty_check() -> bool {
    unsafe { libc_isatty(1) != 0 }
}

extern "C" {
    #[link_name = "isatty"]
    fn libc_isatty(fd: i32) -> i32;
}
