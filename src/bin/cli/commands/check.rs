use anyhow::Result;

use lingualab::flashcards::matching::{distance, loose_distance, similarity};

use crate::render::terminal::{self, Color};
use crate::OutputFormat;

pub fn run(expected: &str, answer: &str, format: &OutputFormat, use_color: bool) -> Result<()> {
    let exact = distance(expected, answer);
    let loose = loose_distance(expected, answer);
    let score = similarity(expected, answer);

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "distance": exact,
                "looseDistance": loose,
                "similarity": score,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            let verdict = match (exact, loose) {
                (0, _) => terminal::paint("correct", Color::GREEN, use_color),
                (_, 0) => terminal::paint("correct apart from accents", Color::YELLOW, use_color),
                _ => terminal::paint("different", Color::RED, use_color),
            };
            println!("{} (distance {}, similarity {:.0}%)", verdict, exact, score * 100.0);
        }
    }

    Ok(())
}
