//! Advisory improvement tags.
//!
//! After a successful enhancement, the original and enhanced text are
//! compared at the character-class level to label what changed.  Tags are
//! opportunistic and advisory — a missed tag is never an error, and no tag
//! affects the result's validity.

use std::fmt;

use serde::Serialize;

// ---------------------------------------------------------------------------
// ImprovementTag
// ---------------------------------------------------------------------------

/// What a comparison of original and enhanced text suggests was fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ImprovementTag {
    /// OCR digits inside words were turned back into letters (0→O, 1→l …).
    #[serde(rename = "digit→letter substitutions corrected")]
    DigitLetterSubstitutions,
    /// Missing punctuation was added.
    #[serde(rename = "punctuation added")]
    PunctuationAdded,
    /// Accent marks and diacritics were restored.
    #[serde(rename = "diacritics added")]
    DiacriticsAdded,
    /// Line breaks were added or removed.
    #[serde(rename = "line breaks normalized")]
    LineBreaksNormalized,
    /// Runs of extra spaces were collapsed.
    #[serde(rename = "spacing normalized")]
    SpacingNormalized,
    /// Only letter case changed.
    #[serde(rename = "casing corrected")]
    CasingCorrected,
}

impl ImprovementTag {
    /// The human-readable label.
    pub fn as_str(&self) -> &'static str {
        match self {
            ImprovementTag::DigitLetterSubstitutions => "digit→letter substitutions corrected",
            ImprovementTag::PunctuationAdded => "punctuation added",
            ImprovementTag::DiacriticsAdded => "diacritics added",
            ImprovementTag::LineBreaksNormalized => "line breaks normalized",
            ImprovementTag::SpacingNormalized => "spacing normalized",
            ImprovementTag::CasingCorrected => "casing corrected",
        }
    }
}

impl fmt::Display for ImprovementTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Character-class counting
// ---------------------------------------------------------------------------

#[derive(Debug, Default, PartialEq)]
struct CharClassCounts {
    digits: usize,
    letters: usize,
    accented_letters: usize,
    punctuation: usize,
    newlines: usize,
    spaces: usize,
}

fn count_classes(text: &str) -> CharClassCounts {
    let mut counts = CharClassCounts::default();
    for c in text.chars() {
        if c.is_ascii_digit() {
            counts.digits += 1;
        } else if c.is_alphabetic() {
            counts.letters += 1;
            if !c.is_ascii() {
                counts.accented_letters += 1;
            }
        } else if c == '\n' {
            counts.newlines += 1;
        } else if c == ' ' {
            counts.spaces += 1;
        } else if c.is_ascii_punctuation() {
            counts.punctuation += 1;
        }
    }
    counts
}

fn has_space_runs(text: &str) -> bool {
    text.contains("  ")
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

/// Compare original and enhanced text and return the applicable tags.
///
/// The output order is stable (enum declaration order) so downstream
/// consumers and tests can rely on it.
pub fn detect_improvements(original: &str, enhanced: &str) -> Vec<ImprovementTag> {
    if original == enhanced {
        return Vec::new();
    }

    let before = count_classes(original);
    let after = count_classes(enhanced);
    let mut tags = Vec::new();

    if after.digits < before.digits && after.letters > before.letters {
        tags.push(ImprovementTag::DigitLetterSubstitutions);
    }
    if after.punctuation > before.punctuation {
        tags.push(ImprovementTag::PunctuationAdded);
    }
    if after.accented_letters > before.accented_letters {
        tags.push(ImprovementTag::DiacriticsAdded);
    }
    if after.newlines != before.newlines {
        tags.push(ImprovementTag::LineBreaksNormalized);
    }
    if has_space_runs(original) && !has_space_runs(enhanced) {
        tags.push(ImprovementTag::SpacingNormalized);
    }
    if original != enhanced && original.to_lowercase() == enhanced.to_lowercase() {
        tags.push(ImprovementTag::CasingCorrected);
    }

    tags
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
