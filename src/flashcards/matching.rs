//! Text normalization and answer matching
//!
//! Used for identity-adjacent lookups and by the trainer to grade typed
//! answers. Inputs are sentence-sized, so the full DP matrix is fine.
//!
//! Two comparison strengths:
//! - [`distance`] folds case and whitespace but keeps accents, so a missing
//!   accent costs exactly one edit ("café" vs "cafe" = 1).
//! - [`loose_distance`] compares [`normalize`]d forms, ignoring accents.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Lowercase, strip diacritics, trim.
pub fn normalize(s: &str) -> String {
    let stripped: String = s
        .nfd()
        .filter(|c| !is_diacritic(*c))
        .collect::<String>()
        .to_lowercase();
    let trimmed = stripped.trim();

    // Input made only of combining marks decomposes to nothing
    if trimmed.is_empty() && !s.trim().is_empty() {
        return s.to_lowercase().trim().to_string();
    }
    trimmed.to_string()
}

/// Composed, lowercased, trimmed. Accents are kept.
pub fn fold(s: &str) -> String {
    s.nfc().collect::<String>().to_lowercase().trim().to_string()
}

fn is_diacritic(c: char) -> bool {
    ('\u{0300}'..='\u{036f}').contains(&c) || is_combining_mark(c)
}

/// Levenshtein distance between the [`fold`]ed forms of `a` and `b`.
///
/// Accents count: `distance("café", "cafe") == 1`, so a missing accent costs
/// one edit when grading an answer. Use [`loose_distance`] to ignore them.
pub fn distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = fold(a).chars().collect();
    let b: Vec<char> = fold(b).chars().collect();
    levenshtein(&a, &b)
}

/// Levenshtein distance between the [`normalize`]d forms of `a` and `b`.
pub fn loose_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = normalize(a).chars().collect();
    let b: Vec<char> = normalize(b).chars().collect();
    levenshtein(&a, &b)
}

/// `1 - distance / longest` over folded forms, in `[0, 1]`.
/// Two empty strings are identical.
pub fn similarity(a: &str, b: &str) -> f64 {
    let fa: Vec<char> = fold(a).chars().collect();
    let fb: Vec<char> = fold(b).chars().collect();
    let longest = fa.len().max(fb.len());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(&fa, &fb) as f64 / longest as f64
}

fn levenshtein(a: &[char], b: &[char]) -> usize {
    let (m, n) = (a.len(), b.len());
    let mut dp = vec![vec![0usize; n + 1]; m + 1];
    for (i, row) in dp.iter_mut().enumerate() {
        row[0] = i;
    }
    for j in 0..=n {
        dp[0][j] = j;
    }
    for i in 1..=m {
        for j in 1..=n {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            dp[i][j] = (dp[i - 1][j] + 1)
                .min(dp[i][j - 1] + 1)
                .min(dp[i - 1][j - 1] + cost);
        }
    }
    dp[m][n]
}
