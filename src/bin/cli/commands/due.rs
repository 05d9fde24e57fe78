use anyhow::{Context, Result};
use chrono::Utc;

use crate::app::App;
use crate::render::terminal;
use crate::OutputFormat;

pub async fn run(app: &App, limit: Option<usize>, format: &OutputFormat, use_color: bool) -> Result<()> {
    let now = Utc::now();
    let cards = app
        .session
        .due_at(now, limit)
        .await
        .context("Failed to read due cards")?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&cards)?);
        }
        OutputFormat::Plain => {
            if cards.is_empty() {
                println!("Nothing due. Come back later.");
                return Ok(());
            }

            println!("{}", terminal::card_header());
            for card in &cards {
                println!("{}", terminal::card_row(card, now, use_color));
            }
            println!("\n{} card(s) due", cards.len());
        }
    }

    Ok(())
}
