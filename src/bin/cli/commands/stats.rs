use anyhow::{Context, Result};

use crate::app::App;
use crate::OutputFormat;

pub async fn run(app: &App, format: &OutputFormat) -> Result<()> {
    let stats = app.session.stats().await.context("Failed to read stats")?;
    let favorites = app.session.favorites().context("Failed to read favorites")?;

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "cards": stats,
                "favorites": favorites.len(),
                "syncEnabled": app.session.sync_enabled(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            println!("Cards:     {}", stats.total_cards);
            println!("  due      {}", stats.due_cards);
            println!("  new      {}", stats.new_cards);
            println!("  learning {}", stats.learning_cards);
            println!("  review   {}", stats.review_cards);
            println!("Favorites: {}", favorites.len());
            println!(
                "Sync:      {}",
                if app.session.sync_enabled() { "on" } else { "off" }
            );
        }
    }

    Ok(())
}
