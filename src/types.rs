use serde::{Deserialize, Serialize};

/// Text of one PDF page after whitespace normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageText {
    pub page_index: u32,
    pub text: String,
}

/// Page-ordered text of one document. Indices are assigned on push, so they
/// always run 0, 1, 2, ... without gaps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedText {
    pages: Vec<PageText>,
}

impl ExtractedText {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_page(&mut self, text: String) {
        let page_index = self.pages.len() as u32;
        self.pages.push(PageText { page_index, text });
    }

    pub fn pages(&self) -> &[PageText] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// True when there are no pages or every page is whitespace only.
    pub fn is_blank(&self) -> bool {
        self.pages.iter().all(|p| p.text.trim().is_empty())
    }

    /// Concatenate pages with `--- PAGE <n> ---` markers (1-based) for the prompt.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for page in &self.pages {
            out.push_str(&format!(
                "--- PAGE {} ---\n{}\n\n",
                page.page_index + 1,
                page.text
            ));
        }
        out
    }
}

/// Raw text returned by the model. No structure is guaranteed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawModelOutput(pub String);

impl RawModelOutput {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Warning,
    Error,
}

/// User-visible message attached to an extraction session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A document from a batch that could not be read or validated.
#[derive(Debug, Clone, Serialize)]
pub struct FailedExtraction {
    pub file_path: String,
    pub file_name: String,
    pub error: String,
}
