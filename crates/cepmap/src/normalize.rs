//! Comparison keys for accent- and case-insensitive matching.
//!
//! All functions are total and pure: any input, including the empty string,
//! produces a key, and applying a function to its own output is a no-op.
use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

/// Lower-case, decompose (NFD), drop combining marks, then drop everything
/// that is not a letter, digit or whitespace.
///
/// ```rust
/// use cepmap::normalize::normalize;
///
/// assert_eq!(normalize("Álvares Ótica"), normalize("alvares otica"));
/// assert_eq!(normalize("Av. São João, 12"), "av sao joao 12");
/// ```
pub fn normalize(text: &str) -> String {
    fold(text)
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect()
}

/// ASCII decimal digits only.
pub fn digits_only(text: &str) -> String {
    text.chars().filter(char::is_ascii_digit).collect()
}

/// Lower-cased, accent-folded text that keeps punctuation and spacing.
///
/// Used as the sort key so "Avenida Flórida" collates next to "Avenida Florida".
pub fn collation_key(text: &str) -> String {
    fold(text).collect()
}

/// Character count of the trimmed normalized text; drives the minimum length gate.
pub fn normalized_len(text: &str) -> usize {
    normalize(text).trim().chars().count()
}

fn fold(text: &str) -> impl Iterator<Item = char> + '_ {
    text.chars()
        .flat_map(char::to_lowercase)
        .nfd()
        .filter(|c| !is_combining_mark(*c))
}
