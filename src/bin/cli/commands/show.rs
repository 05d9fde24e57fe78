use anyhow::Result;
use chrono::Utc;

use lingualab::flashcards::algorithm::{format_interval, preview_intervals, Rating};

use crate::app::App;
use crate::render::terminal::{self, Color};
use crate::OutputFormat;

pub async fn run(app: &App, id: &str, format: &OutputFormat, use_color: bool) -> Result<()> {
    let card = app.find_card(id).await?;
    let now = Utc::now();

    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(&card)?);
        return Ok(());
    }

    println!("{}", terminal::paint(&card.front, Color::BOLD, use_color));
    println!("{}", card.back);
    println!(
        "{}",
        terminal::paint(
            &format!("{} \u{2192} {}   {}", card.src_lang, card.dst_lang, card.id),
            Color::DIM,
            use_color
        )
    );

    if !card.tags.is_empty() {
        let tags = card
            .tags
            .iter()
            .map(|t| format!("#{}", t))
            .collect::<Vec<_>>()
            .join(" ");
        println!("{}", terminal::paint(&tags, Color::CYAN, use_color));
    }

    println!();
    println!("Created:     {}", card.created.format("%Y-%m-%d %H:%M"));
    println!(
        "Due:         {} ({})",
        card.state.due.format("%Y-%m-%d %H:%M"),
        terminal::due_label(&card, now)
    );
    println!("Interval:    {}", format_interval(card.state.interval));
    println!("Ease:        {:.2}", card.state.ease);
    println!("Repetitions: {}", card.state.repetitions);

    let preview = preview_intervals(&card.state, now);
    let buttons = Rating::ALL
        .iter()
        .zip(preview)
        .map(|(rating, days)| format!("{:?} {}", rating, format_interval(days)))
        .collect::<Vec<_>>()
        .join("  ");
    println!("Next:        {}", buttons);

    if !card.state.history.is_empty() {
        println!("\nHistory:");
        for entry in &card.state.history {
            println!("  {}  {}/5", entry.ts.format("%Y-%m-%d %H:%M"), entry.grade);
        }
    }

    Ok(())
}
