use anyhow::{Context, Result};

use lingualab::flashcards::CreateOutcome;

use crate::app::App;
use crate::OutputFormat;

pub async fn run(
    app: &App,
    front: &str,
    back: &str,
    src: Option<&str>,
    dst: Option<&str>,
    tags: Vec<String>,
    format: &OutputFormat,
) -> Result<()> {
    let outcome = app
        .session
        .create(front, back, src, dst, tags)
        .await
        .context("Failed to add card")?;

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "ok": outcome.is_created(),
                "id": outcome.id().as_str(),
                "reason": if outcome.is_created() { None } else { Some("exists") },
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => match outcome {
            CreateOutcome::Created(id) => println!("Added card {}", id),
            CreateOutcome::Exists(id) => println!("Already in deck: {}", id),
        },
    }

    Ok(())
}
