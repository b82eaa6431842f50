//! Text quality filter for narrative fields
//!
//! A cheap heuristic, not a classifier. Checks run in a fixed order and the
//! first failing check decides. The checks are reproduced exactly, including
//! the mixed-script rule's false positives on code-switched text.

use crate::types::{FieldErrors, IdeaSubmission, NarrativeField};

/// Minimum trimmed length, in characters
pub const MIN_TRIMMED_CHARS: usize = 10;

/// Minimum length after stripping non-letters
pub const MIN_CLEANED_CHARS: usize = 5;

/// Highest allowed share of the most frequent letter
pub const MAX_REPETITION_RATIO: f64 = 0.45;

/// Arabic-script letters: the core alphabet (U+0620..=U+064A) and the
/// extended letters used by Persian and Urdu (U+066E..=U+06D3)
const ARABIC_LETTERS: [std::ops::RangeInclusive<char>; 2] =
    ['\u{0620}'..='\u{064A}', '\u{066E}'..='\u{06D3}'];

fn is_arabic_letter(c: char) -> bool {
    ARABIC_LETTERS.iter().any(|range| range.contains(&c))
}

fn is_kept_letter(c: char) -> bool {
    c.is_ascii_alphabetic() || is_arabic_letter(c)
}

/// One heuristic check; `fails` returns true when the text is low quality
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityCheck {
    /// Empty, or fewer than 10 characters once trimmed
    MinimumLength,
    /// Fewer than 5 basic Latin or Arabic letters
    CleanedLength,
    /// A single letter makes up more than 45% of the cleaned text
    RepetitionRatio,
    /// A Latin letter directly followed by Arabic letters in the cleaned text
    LatinThenArabic,
}

/// Checks in evaluation order
pub const CHECKS: [QualityCheck; 4] = [
    QualityCheck::MinimumLength,
    QualityCheck::CleanedLength,
    QualityCheck::RepetitionRatio,
    QualityCheck::LatinThenArabic,
];

impl QualityCheck {
    pub fn name(&self) -> &'static str {
        match self {
            QualityCheck::MinimumLength => "minimum_length",
            QualityCheck::CleanedLength => "cleaned_length",
            QualityCheck::RepetitionRatio => "repetition_ratio",
            QualityCheck::LatinThenArabic => "latin_then_arabic",
        }
    }

    /// `raw` is the field as submitted, `cleaned` holds only kept letters
    fn fails(&self, raw: &str, cleaned: &[char]) -> bool {
        match self {
            QualityCheck::MinimumLength => {
                raw.is_empty() || raw.trim().chars().count() < MIN_TRIMMED_CHARS
            }
            QualityCheck::CleanedLength => cleaned.len() < MIN_CLEANED_CHARS,
            QualityCheck::RepetitionRatio => {
                if cleaned.len() <= 2 {
                    return false;
                }
                let max_count = max_char_frequency(cleaned);
                max_count as f64 / cleaned.len() as f64 > MAX_REPETITION_RATIO
            }
            QualityCheck::LatinThenArabic => cleaned
                .windows(2)
                .any(|pair| pair[0].is_ascii_alphabetic() && is_arabic_letter(pair[1])),
        }
    }
}

fn max_char_frequency(chars: &[char]) -> usize {
    let mut counts = std::collections::HashMap::new();
    for c in chars {
        *counts.entry(*c).or_insert(0usize) += 1;
    }
    counts.into_values().max().unwrap_or(0)
}

/// Strip everything except basic Latin and Arabic letters
pub fn clean(text: &str) -> Vec<char> {
    text.chars().filter(|c| is_kept_letter(*c)).collect()
}

/// First check the text fails, if any
pub fn first_failed_check(text: &str) -> Option<QualityCheck> {
    let cleaned = clean(text);
    CHECKS.iter().copied().find(|check| check.fails(text, &cleaned))
}

/// True when the text should be rejected as low quality
pub fn is_low_quality(text: &str) -> bool {
    first_failed_check(text).is_some()
}

/// Check every narrative field of a submission
///
/// All three fields are checked so that every error is reported at once.
/// Returns `None` when the submission passes.
pub fn check_submission(submission: &IdeaSubmission) -> Option<FieldErrors> {
    let mut errors = FieldErrors::new();

    for field in NarrativeField::ALL {
        if let Some(check) = first_failed_check(field.text(submission)) {
            tracing::debug!(field = field.key(), check = check.name(), "narrative field rejected");
            errors.insert(field.key().to_string(), field.message().to_string());
        }
    }

    if errors.is_empty() {
        None
    } else {
        Some(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_fails() {
        assert!(is_low_quality(""));
        assert!(is_low_quality("short"));
        assert!(is_low_quality("   too short   "));
        assert_eq!(first_failed_check("123456789"), Some(QualityCheck::MinimumLength));
    }

    #[test]
    fn test_few_letters_fails() {
        // Long enough, but almost no letters survive cleaning
        assert_eq!(
            first_failed_check("1234 5678 90 !!"),
            Some(QualityCheck::CleanedLength)
        );
        assert_eq!(
            first_failed_check("ab 12345678 ??"),
            Some(QualityCheck::CleanedLength)
        );
    }

    #[test]
    fn test_repeated_letters_fail() {
        let spam = "a".repeat(20);
        assert_eq!(first_failed_check(&spam), Some(QualityCheck::RepetitionRatio));
        assert!(is_low_quality("aaaaaaaaab bbbb"));
    }

    #[test]
    fn test_repetition_is_case_sensitive() {
        // 5 'a' + 5 'A' out of 10 letters: each is 50%, still over the limit
        assert!(is_low_quality("aaaaaAAAAA"));
        // Evenly spread letters pass
        assert!(!is_low_quality("abcdefghij klmnop"));
    }

    #[test]
    fn test_clean_latin_sentence_passes() {
        let sentence = "The quick brown fox jumps over a lazy dog";
        assert_eq!(sentence.chars().count(), 41);
        assert!(!is_low_quality(sentence));
    }

    #[test]
    fn test_arabic_sentence_passes() {
        assert!(!is_low_quality("مشكلة كبيرة في هدر الطعام يوميا"));
    }

    #[test]
    fn test_persian_letters_survive_cleaning() {
        let cleaned = clean("گچ پیک ژی چگ گی");
        assert_eq!(cleaned.len(), 11);
        assert!(!is_low_quality("گچ پیک ژی چگ گی"));
        assert!(!is_low_quality("مشکل بزرگ هدر رفتن غذا در رستوران"));
    }

    #[test]
    fn test_latin_followed_by_arabic_fails() {
        // Cleaning removes the space, so the Latin and Arabic letters touch
        assert_eq!(
            first_failed_check("great idea مشروع جديد"),
            Some(QualityCheck::LatinThenArabic)
        );
    }

    #[test]
    fn test_arabic_followed_by_latin_passes() {
        assert!(!is_low_quality("مشروع جديد for shelters"));
    }

    #[test]
    fn test_check_submission_reports_every_field() {
        let submission = IdeaSubmission {
            name: "Bad".to_string(),
            problem: Some("meh".to_string()),
            solution: None,
            advantages: Some("zzzzzzzzzzzzzzzz".to_string()),
            ..Default::default()
        };

        let errors = check_submission(&submission).unwrap();
        assert_eq!(errors.len(), 3);
        assert_eq!(errors["problem"], "Please provide a clear Problem.");
        assert_eq!(errors["solution"], "Please provide a clear Solution.");
        assert_eq!(errors["advantages"], "Please provide a clear Advantage.");
    }

    #[test]
    fn test_check_submission_passes_good_idea() {
        let submission = IdeaSubmission {
            name: "Food Bridge".to_string(),
            problem: Some("Too many restaurants waste unsold food daily".to_string()),
            solution: Some("An app connecting restaurants with surplus food to nearby shelters".to_string()),
            advantages: Some("Real-time matching reduces waste and feeds people faster".to_string()),
            fields: vec!["foodtech".to_string()],
            ..Default::default()
        };
        assert!(check_submission(&submission).is_none());
    }
}
