//! SM-2 Spaced Repetition Algorithm
//!
//! Simplified SuperMemo 2: a failing grade resets the repetition streak
//! without touching the ease factor, a passing grade adjusts ease and grows
//! the interval.
//!
//! Quality ratings (0-5):
//! - 0: Complete blackout, no recall
//! - 1: Incorrect, but upon seeing answer, remembered
//! - 2: Incorrect, but answer seemed easy to recall
//! - 3: Correct response with serious difficulty
//! - 4: Correct response after hesitation
//! - 5: Perfect response with no hesitation

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::models::{ReviewEntry, SchedulingState, MIN_EASE};

/// Lowest quality that counts as a pass
pub const PASS_THRESHOLD: u8 = 3;

/// Highest quality rating
pub const MAX_QUALITY: u8 = 5;

/// Longest interval the scheduler hands out (about a century)
pub const MAX_INTERVAL_DAYS: u32 = 36_500;

/// Apply one grade to `state` at time `now`.
///
/// Pure: the result depends only on the arguments, so a card's scheduling
/// fields can always be rebuilt from its history with [`replay`].
pub fn schedule(state: &SchedulingState, grade: i32, now: DateTime<Utc>) -> SchedulingState {
    // Clamp quality to valid range
    let quality = grade.clamp(0, MAX_QUALITY as i32) as u8;

    let mut next = state.clone();

    if quality < PASS_THRESHOLD {
        next.repetitions = 0;
        next.interval = 1;
    } else {
        // EF' = EF + (0.1 - (5-q) * (0.08 + (5-q) * 0.02))
        let q = (MAX_QUALITY - quality) as f64;
        next.ease = (state.ease + 0.1 - q * (0.08 + q * 0.02)).max(MIN_EASE);

        next.interval = match state.repetitions {
            0 => 1,
            1 => 6,
            _ => (state.interval as f64 * next.ease).round() as u32,
        }
        .min(MAX_INTERVAL_DAYS);
        next.repetitions = state.repetitions + 1;
    }

    next.due = now
        .checked_add_signed(Duration::days(next.interval as i64))
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    next.history.push(ReviewEntry { ts: now, grade: quality });
    next
}

/// Rebuild scheduling fields by re-applying `history` on top of `initial`.
pub fn replay(initial: &SchedulingState, history: &[ReviewEntry]) -> SchedulingState {
    history.iter().fold(initial.clone(), |state, entry| {
        schedule(&state, entry.grade as i32, entry.ts)
    })
}

/// Four-button rating shown by the trainer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    Again,
    Hard,
    Good,
    Easy,
}

impl Rating {
    pub const ALL: [Rating; 4] = [Rating::Again, Rating::Hard, Rating::Good, Rating::Easy];

    /// Map UI rating to SM-2 quality (0-5)
    pub fn quality(self) -> i32 {
        match self {
            Rating::Again => 1, // incorrect but recognized
            Rating::Hard => 3,  // correct with difficulty
            Rating::Good => 4,  // correct with hesitation
            Rating::Easy => 5,  // perfect
        }
    }

    /// Case-insensitive button name
    pub fn parse(name: &str) -> Option<Rating> {
        match name.trim().to_lowercase().as_str() {
            "again" => Some(Rating::Again),
            "hard" => Some(Rating::Hard),
            "good" => Some(Rating::Good),
            "easy" => Some(Rating::Easy),
            _ => None,
        }
    }
}

/// Calculate the preview intervals for each rating, in [`Rating::ALL`] order.
/// Used to show users what interval each rating would give.
pub fn preview_intervals(state: &SchedulingState, now: DateTime<Utc>) -> [u32; 4] {
    Rating::ALL.map(|rating| schedule(state, rating.quality(), now).interval)
}

/// Format an interval in days to a human-readable string
pub fn format_interval(days: u32) -> String {
    match days {
        0 => "now".to_string(),
        1..=6 => format!("{}d", days),
        7..=29 => format!("{}w", days / 7),
        30..=364 => format!("{}mo", days / 30),
        _ => format!("{}y", days / 365),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 10, 8, 0, 0).unwrap()
    }

    fn new_state() -> SchedulingState {
        SchedulingState::new(t0())
    }

    #[test]
    fn test_first_review_correct() {
        let result = schedule(&new_state(), 4, t0());

        assert_eq!(result.interval, 1);
        assert_eq!(result.repetitions, 1);
        assert_eq!(result.due, t0() + Duration::days(1));
    }

    #[test]
    fn test_second_review_correct() {
        let first = schedule(&new_state(), 4, t0());
        let result = schedule(&first, 4, t0() + Duration::days(1));

        assert_eq!(result.interval, 6);
        assert_eq!(result.repetitions, 2);
    }

    #[test]
    fn test_third_review_uses_new_ease() {
        let mut state = new_state();
        state.repetitions = 2;
        state.interval = 6;
        state.ease = 2.5;

        let result = schedule(&state, 3, t0());

        // q=3: 2.5 + 0.1 - 2 * (0.08 + 2 * 0.02) = 2.36
        assert!((result.ease - 2.36).abs() < 1e-9);
        assert_eq!(result.interval, (6.0 * result.ease).round() as u32);
        assert_eq!(result.interval, 14);
    }

    #[test]
    fn test_subsequent_review_correct() {
        let mut state = new_state();
        state.repetitions = 5;
        state.interval = 10;
        state.ease = 2.5;

        let result = schedule(&state, 4, t0());

        // q=4 leaves ease at 2.5; 10 * 2.5 = 25
        assert!((result.ease - 2.5).abs() < 1e-9);
        assert_eq!(result.interval, 25);
    }

    #[test]
    fn test_review_incorrect_resets() {
        let mut state = new_state();
        state.repetitions = 5;
        state.interval = 30;
        state.ease = 2.1;

        for grade in 0..PASS_THRESHOLD as i32 {
            let result = schedule(&state, grade, t0());
            assert_eq!(result.interval, 1);
            assert_eq!(result.repetitions, 0);
            assert_eq!(result.due, t0() + Duration::days(1));
            assert_eq!(result.history.len(), state.history.len() + 1);
            // ease only moves on passing grades
            assert_eq!(result.ease, 2.1);
        }
    }

    #[test]
    fn test_long_streak_is_capped() {
        let mut state = new_state();
        let mut now = t0();
        for _ in 0..60 {
            state = schedule(&state, 5, now);
            assert!(state.interval <= MAX_INTERVAL_DAYS);
            assert!(state.due > now);
            now = state.due;
        }

        assert_eq!(state.interval, MAX_INTERVAL_DAYS);
        assert_eq!(state.repetitions, 60);
        assert_eq!(state.history.len(), 60);
    }

    #[test]
    fn test_due_saturates_at_max_date() {
        let mut state = new_state();
        state.repetitions = 3;
        state.interval = MAX_INTERVAL_DAYS;
        let near_end = DateTime::<Utc>::MAX_UTC - Duration::days(10);

        let result = schedule(&state, 5, near_end);

        assert_eq!(result.due, DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn test_ease_factor_minimum() {
        let mut state = new_state();
        for day in 0..30 {
            state = schedule(&state, 3, t0() + Duration::days(day));
            assert!(state.ease >= MIN_EASE);
        }
        assert_eq!(state.ease, MIN_EASE);
        assert_eq!(state.history.len(), 30);
    }

    #[test]
    fn test_out_of_range_grades_are_clamped() {
        let high = schedule(&new_state(), 9, t0());
        assert_eq!(high.history[0].grade, 5);
        assert_eq!(high.repetitions, 1);

        let low = schedule(&new_state(), -4, t0());
        assert_eq!(low.history[0].grade, 0);
        assert_eq!(low.repetitions, 0);
    }

    #[test]
    fn test_replay_reproduces_state() {
        let mut state = new_state();
        let grades = [4, 5, 2, 3, 4, 5, 1, 4];
        for (i, g) in grades.iter().enumerate() {
            state = schedule(&state, *g, t0() + Duration::days(i as i64 * 3));
        }

        let rebuilt = replay(&new_state(), &state.history);
        assert_eq!(rebuilt, state);
    }

    #[test]
    fn test_preview_intervals() {
        let mut state = new_state();
        state.repetitions = 2;
        state.interval = 6;

        let [again, hard, good, easy] = preview_intervals(&state, t0());
        assert_eq!(again, 1);
        assert!(hard <= good && good <= easy);
        assert_eq!(good, 15);
    }

    #[test]
    fn test_rating_to_quality() {
        assert_eq!(Rating::Again.quality(), 1);
        assert_eq!(Rating::Hard.quality(), 3);
        assert_eq!(Rating::Good.quality(), 4);
        assert_eq!(Rating::Easy.quality(), 5);
        assert_eq!(Rating::parse(" Good"), Some(Rating::Good));
        assert_eq!(Rating::parse("AGAIN"), Some(Rating::Again));
        assert_eq!(Rating::parse("4"), None);
    }

    #[test]
    fn test_format_interval() {
        assert_eq!(format_interval(0), "now");
        assert_eq!(format_interval(1), "1d");
        assert_eq!(format_interval(5), "5d");
        assert_eq!(format_interval(7), "1w");
        assert_eq!(format_interval(14), "2w");
        assert_eq!(format_interval(30), "1mo");
        assert_eq!(format_interval(90), "3mo");
        assert_eq!(format_interval(365), "1y");
        assert_eq!(format_interval(730), "2y");
    }
}
