use chrono::{DateTime, Utc};

use lingualab::flashcards::algorithm::format_interval;
use lingualab::flashcards::Card;

/// ANSI color codes
#[allow(dead_code)]
pub struct Color;

#[allow(dead_code)]
impl Color {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";
    pub const RED: &str = "\x1b[31m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GRAY: &str = "\x1b[90m";
}

/// Wrap `text` in `color` when colors are on
pub fn paint(text: &str, color: &str, use_color: bool) -> String {
    if use_color {
        format!("{}{}{}", color, text, Color::RESET)
    } else {
        text.to_string()
    }
}

/// Cut `text` to `width` chars, marking the cut with an ellipsis
pub fn truncate(text: &str, width: usize) -> String {
    let text = text.replace('\n', " ");
    if text.chars().count() <= width {
        return text;
    }
    let cut: String = text.chars().take(width.saturating_sub(1)).collect();
    format!("{}\u{2026}", cut)
}

/// Shortened id for tables; `find_card` accepts any unique prefix
pub fn short_id(card: &Card) -> String {
    card.id.as_str().chars().take(12).collect()
}

/// "due now", "in 3d", "2w ago"...
pub fn due_label(card: &Card, now: DateTime<Utc>) -> String {
    let days = (card.state.due - now).num_days();
    if card.state.due <= now {
        if days == 0 {
            "due now".to_string()
        } else {
            format!("{} overdue", format_interval(days.unsigned_abs() as u32))
        }
    } else if days == 0 {
        "today".to_string()
    } else {
        format!("in {}", format_interval(days as u32))
    }
}

/// One table row: id, front, back, due
pub fn card_row(card: &Card, now: DateTime<Utc>, use_color: bool) -> String {
    let due = due_label(card, now);
    let due = if card.state.due <= now {
        paint(&due, Color::YELLOW, use_color)
    } else {
        paint(&due, Color::GRAY, use_color)
    };
    format!(
        "{:<12}  {:<28}  {:<28}  {}",
        short_id(card),
        truncate(&card.front, 28),
        truncate(&card.back, 28),
        due
    )
}

/// Header matching [`card_row`]
pub fn card_header() -> String {
    format!(
        "{:<12}  {:<28}  {:<28}  {}\n{}",
        "Id",
        "Front",
        "Back",
        "Due",
        "\u{2500}".repeat(84)
    )
}
