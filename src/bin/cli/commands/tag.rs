use anyhow::{bail, Context, Result};

use lingualab::flashcards::UpdateOutcome;

use crate::app::App;
use crate::OutputFormat;

pub async fn run(
    app: &App,
    id: &str,
    add: Vec<String>,
    remove: Vec<String>,
    format: &OutputFormat,
) -> Result<()> {
    let mut card = app.find_card(id).await?;
    card.tags.retain(|t| !remove.contains(t));
    card.tags.extend(add);

    let outcome = app
        .session
        .update(card)
        .await
        .context("Failed to update tags")?;
    let UpdateOutcome::Updated(card) = outcome else {
        bail!("Card {} no longer exists", id);
    };

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({ "id": card.id.as_str(), "tags": card.tags });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            if card.tags.is_empty() {
                println!("{}: no tags", card.id);
            } else {
                let tags = card
                    .tags
                    .iter()
                    .map(|t| format!("#{}", t))
                    .collect::<Vec<_>>()
                    .join(" ");
                println!("{}: {}", card.id, tags);
            }
        }
    }

    Ok(())
}
