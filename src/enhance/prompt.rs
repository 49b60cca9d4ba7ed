//! Prompt catalog and template rendering for OCR correction.
//!
//! Each [`DocumentType`] maps to a [`PromptTemplate`]: a system preamble
//! carrying the correction instructions, and a body with exactly one
//! `{text}` placeholder for the OCR text.  Rendering is a single literal
//! substitution — the inserted text is never re-scanned for placeholders,
//! so OCR content that happens to contain `{text}` cannot inject anything.
//!
//! The built-in catalog covers every document type; callers may override
//! individual entries with [`PromptCatalog::with_override`].

use std::collections::HashMap;

use super::document::DocumentType;

/// The one placeholder a template body must contain.
pub const PLACEHOLDER: &str = "{text}";

// ---------------------------------------------------------------------------
// System instructions
// ---------------------------------------------------------------------------

/// Shared core of every system preamble.
const SYSTEM_BASE: &str = "\
You are an OCR post-correction assistant.
Task: improve the OCR text below while preserving its meaning.

Rules:
1. Correct spelling mistakes and OCR errors (digit/letter confusions such as 0/O, 1/l, 5/S).
2. Fix formatting, spacing and broken punctuation.
3. Restore missing diacritics and accent marks where the language requires them.
4. Preserve the original structure and keep all information.
5. Reply with ONLY the corrected text — no explanations or comments.
6. If the text is already correct, return it unchanged.";

const SYSTEM_CODE: &str = "\nThe text is source code or technical documentation. \
Preserve code syntax, identifiers, operators and technical terms exactly; never rename or reformat code.";

const SYSTEM_INVOICE: &str = "\nThe text is an invoice or receipt. \
Preserve every number, date, amount and currency symbol exactly as written.";

const SYSTEM_FORM: &str = "\nThe text is a form. \
Preserve field labels and their order; keep labels and values on their own lines.";

const SYSTEM_HANDWRITTEN: &str = "\nThe text was handwritten before OCR, so expect heavier \
character confusion. Reconstruct the most plausible words while preserving the writer's meaning.";

const SYSTEM_MULTILINGUAL: &str = "\nThe text may mix several languages. Keep each language as \
written — do not translate. For Vietnamese, restore tone marks (dấu thanh), \
e.g. \"Truong Dai hoc\" becomes \"Trường Đại học\" and \"Ha Noi\" becomes \"Hà Nội\".";

/// Default body shared by every template.
const BODY: &str = "Original OCR text:\n{text}\n\nCorrected text:";

/// Prompt for the vision path: the model reads the page image directly.
const VISION_PROMPT: &str = "Extract and correct the text from this image, fixing any OCR \
errors and restoring missing diacritics. Preserve the document's structure. Return ONLY the \
corrected text.";

// ---------------------------------------------------------------------------
// PromptTemplate
// ---------------------------------------------------------------------------

/// A system preamble plus a body with exactly one `{text}` slot.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    system: String,
    body: String,
}

/// A rendered prompt, ready to become chat turns.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPrompt {
    /// The system turn.
    pub system: String,
    /// The user turn, with the OCR text substituted in.
    pub user: String,
}

impl PromptTemplate {
    /// Build a template, validating that `body` contains the placeholder
    /// exactly once.  Returns `None` otherwise.
    pub fn new(system: impl Into<String>, body: impl Into<String>) -> Option<Self> {
        let body = body.into();
        if body.matches(PLACEHOLDER).count() != 1 {
            return None;
        }
        Some(Self {
            system: system.into(),
            body,
        })
    }

    /// Substitute `text` into the placeholder, literally and exactly once.
    pub fn render(&self, text: &str) -> RenderedPrompt {
        // splitn keeps any later brace pairs in the tail untouched, and the
        // inserted text itself is never re-expanded.
        let mut parts = self.body.splitn(2, PLACEHOLDER);
        let before = parts.next().unwrap_or_default();
        let after = parts.next().unwrap_or_default();
        RenderedPrompt {
            system: self.system.clone(),
            user: format!("{before}{text}{after}"),
        }
    }

    fn builtin(doc: DocumentType) -> Self {
        let suffix = match doc {
            DocumentType::General => "",
            DocumentType::Code => SYSTEM_CODE,
            DocumentType::Invoice => SYSTEM_INVOICE,
            DocumentType::Form => SYSTEM_FORM,
            DocumentType::Handwritten => SYSTEM_HANDWRITTEN,
            DocumentType::Multilingual => SYSTEM_MULTILINGUAL,
        };
        Self {
            system: format!("{SYSTEM_BASE}{suffix}"),
            body: BODY.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// PromptCatalog
// ---------------------------------------------------------------------------

/// The per-document-type template map.
#[derive(Debug, Clone)]
pub struct PromptCatalog {
    templates: HashMap<DocumentType, PromptTemplate>,
}

impl PromptCatalog {
    /// Catalog with the built-in template for every document type.
    pub fn new() -> Self {
        let templates = [
            DocumentType::General,
            DocumentType::Code,
            DocumentType::Invoice,
            DocumentType::Form,
            DocumentType::Handwritten,
            DocumentType::Multilingual,
        ]
        .into_iter()
        .map(|doc| (doc, PromptTemplate::builtin(doc)))
        .collect();
        Self { templates }
    }

    /// Replace the template for one document type.
    pub fn with_override(mut self, doc: DocumentType, template: PromptTemplate) -> Self {
        self.templates.insert(doc, template);
        self
    }

    /// Fetch the template for `doc`, falling back to the `General` entry.
    ///
    /// The second element is `true` when the fallback was taken — the
    /// orchestrator surfaces that in the result metadata.
    pub fn template_for(&self, doc: DocumentType) -> (&PromptTemplate, bool) {
        if let Some(template) = self.templates.get(&doc) {
            return (template, false);
        }
        log::warn!("no prompt template for {doc}, falling back to general");
        (
            self.templates
                .get(&DocumentType::General)
                .expect("catalog always carries the general template"),
            true,
        )
    }

    /// Prompt used when a vision-capable provider reads the page image.
    pub fn vision_prompt(&self) -> &'static str {
        VISION_PROMPT
    }
}

impl Default for PromptCatalog {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
