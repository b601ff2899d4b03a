//! Text normalization shared by the lexical index, reason matching and
//! field-mention detection.
//!
//! User input arrives with or without Romanian diacritics, in any case and
//! with arbitrary punctuation. Everything that compares text goes through
//! [`normalize`] first so that "Work & Travel", "work and travel" and
//! "WORK-AND-TRAVEL" compare equal.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Runs of characters that are not letters, digits or underscores.
    static ref SEPARATOR_PATTERN: Regex = Regex::new(r"[^\p{L}\p{N}_]+").unwrap();

    /// Words carrying no retrieval signal (Romanian and English).
    static ref STOPWORDS: Vec<&'static str> = vec![
        "a", "ai", "al", "ale", "am", "an", "and", "are", "as", "at", "au", "be", "by", "ca",
        "care", "ce", "cu", "da", "de", "din", "e", "este", "for", "in", "is", "la", "mai",
        "ma", "mi", "nu", "of", "on", "or", "pe", "pentru", "sa", "se", "si", "sunt", "the",
        "to", "un", "una", "unei", "unui", "o", "sau",
    ];
}

/// Fold Romanian diacritics (both comma-below and cedilla forms) to ASCII.
pub fn fold_diacritics(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            'ă' | 'â' | 'á' | 'à' => 'a',
            'Ă' | 'Â' | 'Á' | 'À' => 'A',
            'î' | 'í' => 'i',
            'Î' | 'Í' => 'I',
            'ș' | 'ş' => 's',
            'Ș' | 'Ş' => 'S',
            'ț' | 'ţ' => 't',
            'Ț' | 'Ţ' => 'T',
            'é' | 'è' => 'e',
            'É' | 'È' => 'E',
            other => other,
        })
        .collect()
}

/// Lowercase, fold diacritics, read `&` as `and`, and collapse every run of
/// punctuation or whitespace into a single space.
pub fn normalize(input: &str) -> String {
    let folded = fold_diacritics(input).to_lowercase().replace('&', " and ");
    SEPARATOR_PATTERN
        .replace_all(&folded, " ")
        .trim()
        .to_string()
}

/// Split text into retrieval terms: normalized words minus stopwords.
pub fn tokenize(input: &str) -> Vec<String> {
    normalize(input)
        .split(' ')
        .filter(|t| !t.is_empty() && !STOPWORDS.contains(t))
        .map(str::to_string)
        .collect()
}

/// Whether `phrase` occurs in `text` as a whole-word sequence.
///
/// Both sides are normalized, so `contains_phrase("prenumele", "numele")`
/// is false while `contains_phrase("Numele tau?", "numele")` is true.
pub fn contains_phrase(text: &str, phrase: &str) -> bool {
    let phrase = normalize(phrase);
    if phrase.is_empty() {
        return false;
    }
    let haystack = format!(" {} ", normalize(text));
    haystack.contains(&format!(" {} ", phrase))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_folds_case_punctuation_and_ampersand() {
        assert_eq!(normalize("Work & Travel"), "work and travel");
        assert_eq!(normalize("  WORK-and-travel!! "), "work and travel");
        assert_eq!(normalize("Evaziune fiscală"), "evaziune fiscala");
        assert_eq!(normalize("Județ / Țară"), "judet tara");
    }

    #[test]
    fn test_tokenize_drops_stopwords() {
        let tokens = tokenize("Adeverinta pentru Work and Travel, va rog");
        assert_eq!(tokens, vec!["adeverinta", "work", "travel", "va", "rog"]);
    }

    #[test]
    fn test_contains_phrase_respects_word_boundaries() {
        assert!(contains_phrase("Care este numele tau?", "numele"));
        assert!(!contains_phrase("Care este prenumele tau?", "numele"));
        assert!(contains_phrase("Spune-mi judetul sau tara.", "judetul sau tara"));
        assert!(!contains_phrase("anything", ""));
    }
}
