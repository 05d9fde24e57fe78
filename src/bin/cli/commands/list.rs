use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};

use crate::app::App;
use crate::render::terminal;
use crate::OutputFormat;

/// Parse YYYY-MM-DD as midnight UTC
fn parse_day(value: &str) -> Result<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", value))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .with_context(|| format!("Invalid date '{}'", value))?;
    Ok(midnight.and_utc())
}

pub async fn run(
    app: &App,
    since: Option<&str>,
    until: Option<&str>,
    limit: usize,
    format: &OutputFormat,
    use_color: bool,
) -> Result<()> {
    let from = since.map(parse_day).transpose()?;
    let to = until.map(parse_day).transpose()?;

    let cards = app
        .session
        .created_range(from, to, limit)
        .await
        .context("Failed to list cards")?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&cards)?);
        }
        OutputFormat::Plain => {
            if cards.is_empty() {
                println!("No cards found.");
                return Ok(());
            }

            let now = Utc::now();
            println!("{}", terminal::card_header());
            for card in &cards {
                println!("{}", terminal::card_row(card, now, use_color));
            }
            println!("\n{} card(s)", cards.len());
        }
    }

    Ok(())
}
