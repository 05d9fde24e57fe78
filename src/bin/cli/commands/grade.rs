use anyhow::{bail, Context, Result};
use chrono::Utc;

use lingualab::flashcards::algorithm::format_interval;
use lingualab::flashcards::GradeOutcome;

use crate::app::App;
use crate::render::terminal::{self, Color};
use crate::OutputFormat;

pub async fn run(app: &App, id: &str, grade: i32, format: &OutputFormat, use_color: bool) -> Result<()> {
    let card = app.find_card(id).await?;
    let outcome = app
        .session
        .grade(&card.id, grade)
        .await
        .context("Failed to grade card")?;

    let GradeOutcome::Graded(card) = outcome else {
        // Removed between lookup and grade
        bail!("Card {} no longer exists", card.id);
    };

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&card)?);
        }
        OutputFormat::Plain => {
            let color = if grade >= 3 { Color::GREEN } else { Color::RED };
            println!(
                "{}  {}",
                terminal::paint(&format!("{}/5", grade), color, use_color),
                card.front
            );
            println!(
                "Next review in {} ({}), ease {:.2}, {} repetition(s)",
                format_interval(card.state.interval),
                terminal::due_label(&card, Utc::now()),
                card.state.ease,
                card.state.repetitions
            );
        }
    }

    Ok(())
}
