use anyhow::{Context, Result};

use crate::app::App;
use crate::OutputFormat;

pub async fn run(app: &App, id: &str, format: &OutputFormat) -> Result<()> {
    let card = app.find_card(id).await?;
    let removed = app
        .session
        .remove(&card.id)
        .await
        .context("Failed to remove card")?;

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({ "id": card.id.as_str(), "removed": removed });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            if removed {
                println!("Removed {} ({})", card.id, card.front);
            } else {
                println!("Card {} was already gone", card.id);
            }
        }
    }

    Ok(())
}
