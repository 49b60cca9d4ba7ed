//! Document types and heuristic classification.
//!
//! [`DocumentType`] is a closed enumeration — every variant has a prompt
//! template, and adding a variant without one fails the exhaustive match in
//! the catalog.  [`DocumentClassifier`] guesses a type from the text when
//! the caller does not know it; only `Code`, `Invoice` and `Form` are ever
//! auto-detected (`Handwritten` and `Multilingual` carry upstream knowledge
//! the text alone cannot reveal, so callers must pass them explicitly).

use std::fmt;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DocumentType
// ---------------------------------------------------------------------------

/// Kind of document the OCR text came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    /// Prose or anything that fits no other category.
    #[default]
    General,
    /// Source code or technical documentation.
    Code,
    /// Invoices and receipts — numbers and dates must survive untouched.
    Invoice,
    /// Forms with labelled fields.
    Form,
    /// Handwriting run through OCR — heavier character confusion expected.
    Handwritten,
    /// Text mixing several languages.
    Multilingual,
}

impl DocumentType {
    /// The lowercase name used in configs and results.
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::General => "general",
            DocumentType::Code => "code",
            DocumentType::Invoice => "invoice",
            DocumentType::Form => "form",
            DocumentType::Handwritten => "handwritten",
            DocumentType::Multilingual => "multilingual",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "general" => Ok(DocumentType::General),
            "code" => Ok(DocumentType::Code),
            "invoice" => Ok(DocumentType::Invoice),
            "form" => Ok(DocumentType::Form),
            "handwritten" => Ok(DocumentType::Handwritten),
            "multilingual" => Ok(DocumentType::Multilingual),
            _ => Err(()),
        }
    }
}

// ---------------------------------------------------------------------------
// DocumentClassifier
// ---------------------------------------------------------------------------

/// Minimum code-keyword hits before text counts as code.
const CODE_KEYWORD_THRESHOLD: usize = 2;
/// Minimum labelled-field lines before text counts as a form.
const FORM_FIELD_THRESHOLD: usize = 3;

/// Guesses a [`DocumentType`] from raw OCR text.
///
/// Checks run in order of specificity: code fences or clustered programming
/// keywords → `Code`; currency amounts together with date patterns →
/// `Invoice`; several `Label: value` lines → `Form`; otherwise `General`.
///
/// # Example
/// ```rust
/// use ocr_enhance::enhance::{DocumentClassifier, DocumentType};
///
/// let classifier = DocumentClassifier::new();
/// assert_eq!(
///     classifier.classify("fn main() {\n    println!(\"hi\");\n}"),
///     DocumentType::Code
/// );
/// ```
pub struct DocumentClassifier {
    code_fence: Regex,
    code_keyword: Regex,
    currency: Regex,
    date: Regex,
    field_label: Regex,
}

impl DocumentClassifier {
    /// Compile the built-in heuristics.
    pub fn new() -> Self {
        Self {
            code_fence: Regex::new(r"```").expect("hardcoded pattern compiles"),
            code_keyword: Regex::new(
                r"(?i)\b(fn|def|class|function|import|return|const|let|var|void|struct|printf|SELECT|INSERT|public|private)\b|println!|console\.log|#include",
            )
            .expect("hardcoded pattern compiles"),
            currency: Regex::new(r"[$€£¥₫]\s*\d|\b(USD|EUR|VND|GBP)\b")
                .expect("hardcoded pattern compiles"),
            date: Regex::new(r"\b\d{1,2}[/.\-]\d{1,2}[/.\-]\d{2,4}\b")
                .expect("hardcoded pattern compiles"),
            field_label: Regex::new(r"(?m)^\s*[A-Za-z][A-Za-z0-9 _/()-]{0,30}:\s*\S")
                .expect("hardcoded pattern compiles"),
        }
    }

    /// Classify `text`, defaulting to [`DocumentType::General`].
    pub fn classify(&self, text: &str) -> DocumentType {
        if self.looks_like_code(text) {
            DocumentType::Code
        } else if self.looks_like_invoice(text) {
            DocumentType::Invoice
        } else if self.looks_like_form(text) {
            DocumentType::Form
        } else {
            DocumentType::General
        }
    }

    fn looks_like_code(&self, text: &str) -> bool {
        self.code_fence.is_match(text)
            || self.code_keyword.find_iter(text).count() >= CODE_KEYWORD_THRESHOLD
    }

    fn looks_like_invoice(&self, text: &str) -> bool {
        self.currency.is_match(text) && self.date.is_match(text)
    }

    fn looks_like_form(&self, text: &str) -> bool {
        self.field_label.find_iter(text).count() >= FORM_FIELD_THRESHOLD
    }
}

impl Default for DocumentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_fence_triggers_code() {
        let c = DocumentClassifier::new();
        let text = "Here is the snippet:\n```\nx = 1\n```";
        assert_eq!(c.classify(text), DocumentType::Code);
    }

    #[test]
    fn clustered_keywords_trigger_code() {
        let c = DocumentClassifier::new();
        let text = "def load(path):\n    return parse(path)\n\nclass Loader: pass";
        assert_eq!(c.classify(text), DocumentType::Code);
    }

    #[test]
    fn single_keyword_is_not_code() {
        let c = DocumentClassifier::new();
        // "return" alone appears in plenty of prose.
        let text = "Please return the signed copy by Friday.";
        assert_eq!(c.classify(text), DocumentType::General);
    }

    #[test]
    fn currency_with_date_triggers_invoice() {
        let c = DocumentClassifier::new();
        let text = "Invoice 2024-113\nDate 12/03/2024\nTotal $1,250.00";
        assert_eq!(c.classify(text), DocumentType::Invoice);
    }

    #[test]
    fn currency_without_date_is_not_invoice() {
        let c = DocumentClassifier::new();
        let text = "The ticket costs $25 at the door.";
        assert_eq!(c.classify(text), DocumentType::General);
    }

    #[test]
    fn labelled_fields_trigger_form() {
        let c = DocumentClassifier::new();
        let text = "Name: Nguyen Van A\nAddress: 1 Dai Co Viet\nPhone: 0912 345 678\n";
        assert_eq!(c.classify(text), DocumentType::Form);
    }

    #[test]
    fn two_labels_are_not_enough_for_form() {
        let c = DocumentClassifier::new();
        let text = "Subject: hello\nNote: see attachment\nThanks for reading.";
        assert_eq!(c.classify(text), DocumentType::General);
    }

    #[test]
    fn plain_prose_is_general() {
        let c = DocumentClassifier::new();
        let text = "Truong Dai hoc Bach Khoa Ha Noi";
        assert_eq!(c.classify(text), DocumentType::General);
    }

    #[test]
    fn code_wins_over_form_shaped_text() {
        let c = DocumentClassifier::new();
        let text = "```\nname: x\nkind: y\nspec: z\n```";
        assert_eq!(c.classify(text), DocumentType::Code);
    }

    // -----------------------------------------------------------------------
    // DocumentType parsing
    // -----------------------------------------------------------------------

    #[test]
    fn from_str_round_trips_every_variant() {
        for doc in [
            DocumentType::General,
            DocumentType::Code,
            DocumentType::Invoice,
            DocumentType::Form,
            DocumentType::Handwritten,
            DocumentType::Multilingual,
        ] {
            assert_eq!(DocumentType::from_str(doc.as_str()), Ok(doc));
        }
    }

    #[test]
    fn unknown_strings_do_not_parse() {
        assert!(DocumentType::from_str("unknown").is_err());
        assert!(DocumentType::from_str("").is_err());
    }

    #[test]
    fn serialises_lowercase() {
        let json = serde_json::to_string(&DocumentType::Handwritten).unwrap();
        assert_eq!(json, "\"handwritten\"");
    }
}
