use crate::config::Settings;
use crate::error::AppError;
use crate::llm::CompletionBackend;
use crate::models::FieldRecord;
use crate::prompt::build_prompt;
use crate::services::normalizer::{normalize_traced, ParseStrategy};
use crate::services::pdf_text;
use crate::types::{ExtractedText, FailedExtraction, Notice, RawModelOutput, ValidationResult};
use serde::Serialize;
use std::fs;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

pub const MAX_DOCUMENT_BYTES: u64 = 50 * 1024 * 1024;

const NO_TEXT_WARNING: &str = "No text could be extracted from your PDF. Please try another PDF.";

/// Everything one document went through, stage by stage.
#[derive(Debug, Clone)]
pub struct ExtractionSession {
    pub file_name: String,
    pub text: ExtractedText,
    pub raw_output: Option<RawModelOutput>,
    pub record: Option<FieldRecord>,
    pub strategy: Option<ParseStrategy>,
    pub notices: Vec<Notice>,
}

impl ExtractionSession {
    fn new(file_name: &str) -> Self {
        Self {
            file_name: file_name.to_string(),
            text: ExtractedText::new(),
            raw_output: None,
            record: None,
            strategy: None,
            notices: Vec::new(),
        }
    }
}

/// Run the pipeline on an in-memory PDF. Extraction and provider failures end
/// up as notices on the session; the backend is called at most once.
pub fn run_extraction(
    pdf_bytes: &[u8],
    file_name: &str,
    backend: &dyn CompletionBackend,
) -> ExtractionSession {
    let mut session = ExtractionSession::new(file_name);

    match pdf_text::extract_text(pdf_bytes) {
        Ok(text) => session.text = text,
        Err(e) => {
            warn!(file = file_name, error = %e, "text extraction failed");
            session.notices.push(Notice::error(e.to_string()));
        }
    }

    if session.text.is_blank() {
        session.notices.push(Notice::warning(NO_TEXT_WARNING));
        return session;
    }

    let prompt = build_prompt(&session.text);
    match backend.complete(&prompt) {
        Ok(raw) => {
            let (record, strategy) = normalize_traced(raw.as_str());
            if strategy == ParseStrategy::Sentinel {
                session
                    .notices
                    .push(Notice::warning("The model response contained no usable fields."));
            }
            session.raw_output = Some(raw);
            session.record = Some(record);
            session.strategy = Some(strategy);
        }
        Err(e) => {
            warn!(file = file_name, error = %e, "extraction request failed");
            session.notices.push(Notice::error(e.to_string()));
        }
    }
    session
}

pub fn validate_document_file(path: &Path) -> Result<ValidationResult, AppError> {
    if !path.exists() {
        return Ok(ValidationResult {
            valid: false,
            error: Some("File not found.".to_string()),
        });
    }
    let io_err = |source| AppError::Io {
        path: path.to_path_buf(),
        source,
    };
    let metadata = fs::metadata(path).map_err(io_err)?;
    if metadata.len() > MAX_DOCUMENT_BYTES {
        return Ok(ValidationResult {
            valid: false,
            error: Some("File too large (max 50MB).".to_string()),
        });
    }
    let mut f = fs::File::open(path).map_err(io_err)?;
    let mut header = [0u8; 8];
    if f.read(&mut header).unwrap_or(0) < 5 {
        return Ok(ValidationResult {
            valid: false,
            error: Some("Not a valid PDF (could not read header).".to_string()),
        });
    }
    if !header.starts_with(b"%PDF-") {
        return Ok(ValidationResult {
            valid: false,
            error: Some("Not a valid PDF file.".to_string()),
        });
    }
    Ok(ValidationResult {
        valid: true,
        error: None,
    })
}

pub fn file_name_of(path: &Path) -> String {
    path.file_name()
        .and_then(|o| o.to_str())
        .unwrap_or("")
        .to_string()
}

/// Validate, read and extract one file from disk.
pub fn extract_file(
    path: &Path,
    backend: &dyn CompletionBackend,
) -> Result<ExtractionSession, AppError> {
    let validation = validate_document_file(path)?;
    if !validation.valid {
        return Err(AppError::Invalid(
            validation
                .error
                .unwrap_or_else(|| "Invalid document.".to_string()),
        ));
    }
    let bytes = fs::read(path).map_err(|source| AppError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!(file = %path.display(), bytes = bytes.len(), "extracting statement");
    Ok(run_extraction(&bytes, &file_name_of(path), backend))
}

#[derive(Debug, Default)]
pub struct BatchExtractResult {
    pub successes: Vec<ExtractionSession>,
    pub failures: Vec<FailedExtraction>,
}

/// Extract each file in order, one request at a time. Documents that cannot be
/// validated or read are collected as failures instead of stopping the batch.
pub fn batch_extract<P: AsRef<Path>>(
    paths: &[P],
    backend: &dyn CompletionBackend,
) -> BatchExtractResult {
    let mut result = BatchExtractResult::default();
    for path in paths {
        let path = path.as_ref();
        match extract_file(path, backend) {
            Ok(session) => result.successes.push(session),
            Err(e) => {
                warn!(file = %path.display(), error = %e, "skipping document");
                result.failures.push(FailedExtraction {
                    file_path: path.display().to_string(),
                    file_name: file_name_of(path),
                    error: e.to_string(),
                });
            }
        }
    }
    result
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    pub status: &'static str,
    pub model: String,
    pub base_url: String,
}

pub fn provider_status(settings: &Settings) -> ProviderStatus {
    ProviderStatus {
        status: settings.provider_status(),
        model: settings.model.clone(),
        base_url: settings.base_url.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::models::FieldKey;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};
    use std::cell::{Cell, RefCell};

    struct ScriptedBackend {
        reply: Result<&'static str, &'static str>,
        calls: Cell<usize>,
        last_prompt: RefCell<String>,
    }

    impl ScriptedBackend {
        fn replying(reply: &'static str) -> Self {
            Self {
                reply: Ok(reply),
                calls: Cell::new(0),
                last_prompt: RefCell::new(String::new()),
            }
        }

        fn failing(message: &'static str) -> Self {
            Self {
                reply: Err(message),
                calls: Cell::new(0),
                last_prompt: RefCell::new(String::new()),
            }
        }
    }

    impl CompletionBackend for ScriptedBackend {
        fn complete(&self, prompt: &str) -> Result<RawModelOutput, ProviderError> {
            self.calls.set(self.calls.get() + 1);
            *self.last_prompt.borrow_mut() = prompt.to_string();
            match self.reply {
                Ok(text) => Ok(RawModelOutput(text.to_string())),
                Err(msg) => Err(ProviderError::Network(msg.to_string())),
            }
        }
    }

    fn one_page_pdf(lines: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let mut operations = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 11.into()]),
            Operation::new("Td", vec![60.into(), 760.into()]),
        ];
        for line in lines {
            operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
            operations.push(Operation::new("T*", vec![]));
        }
        operations.push(Operation::new("ET", vec![]));
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    const REPLY: &str = r#"Sure! ["Chase","John Doe","N/A","000123","N/A","4200","1500.50","300","4200"]"#;

    #[test]
    fn produces_record_from_backend_reply() {
        let pdf = one_page_pdf(&["Chase Bank", "John Doe", "Closing balance 1500.50"]);
        let backend = ScriptedBackend::replying(REPLY);
        let session = run_extraction(&pdf, "june.pdf", &backend);

        assert_eq!(backend.calls.get(), 1);
        assert!(backend.last_prompt.borrow().contains("--- PAGE 1 ---"));
        assert!(backend.last_prompt.borrow().contains("Chase Bank"));
        let record = session.record.as_ref().unwrap();
        assert_eq!(record.get(FieldKey::BankName), "Chase");
        assert_eq!(record.get(FieldKey::StatementBalance), "1500.50");
        assert_eq!(session.strategy, Some(ParseStrategy::BracketScan));
        assert!(session.notices.is_empty());
        assert_eq!(session.file_name, "june.pdf");
    }

    #[test]
    fn backend_failure_gives_error_notice_and_no_record() {
        let pdf = one_page_pdf(&["Some Bank"]);
        let backend = ScriptedBackend::failing("connection refused");
        let session = run_extraction(&pdf, "x.pdf", &backend);

        assert_eq!(backend.calls.get(), 1);
        assert!(session.record.is_none());
        assert!(session.raw_output.is_none());
        assert_eq!(session.notices.len(), 1);
        assert_eq!(session.notices[0].level, crate::types::NoticeLevel::Error);
        assert!(session.notices[0].message.contains("connection refused"));
    }

    #[test]
    fn blank_document_never_reaches_backend() {
        let pdf = one_page_pdf(&[]);
        let backend = ScriptedBackend::replying(REPLY);
        let session = run_extraction(&pdf, "empty.pdf", &backend);

        assert_eq!(backend.calls.get(), 0);
        assert!(session.record.is_none());
        assert!(session.notices.iter().any(|n| n.message == NO_TEXT_WARNING));
    }

    #[test]
    fn unreadable_bytes_become_notices() {
        let backend = ScriptedBackend::replying(REPLY);
        let session = run_extraction(b"not a pdf", "bad.pdf", &backend);

        assert_eq!(backend.calls.get(), 0);
        assert_eq!(session.notices.len(), 2);
        assert_eq!(session.notices[0].level, crate::types::NoticeLevel::Error);
        assert_eq!(session.notices[1].message, NO_TEXT_WARNING);
    }

    #[test]
    fn unusable_reply_yields_sentinel_with_warning() {
        let pdf = one_page_pdf(&["Bank"]);
        let backend = ScriptedBackend::replying("I cannot help with that.");
        let session = run_extraction(&pdf, "x.pdf", &backend);

        assert_eq!(session.strategy, Some(ParseStrategy::Sentinel));
        assert!(session.record.as_ref().unwrap().is_all_unknown());
        assert_eq!(session.notices.len(), 1);
    }

    #[test]
    fn validation_rules() {
        let dir = tempfile::tempdir().unwrap();

        let missing = validate_document_file(&dir.path().join("nope.pdf")).unwrap();
        assert!(!missing.valid);
        assert_eq!(missing.error.as_deref(), Some("File not found."));

        let short = dir.path().join("short.pdf");
        fs::write(&short, b"%PD").unwrap();
        assert!(!validate_document_file(&short).unwrap().valid);

        let text = dir.path().join("notes.pdf");
        fs::write(&text, b"hello world").unwrap();
        let result = validate_document_file(&text).unwrap();
        assert_eq!(result.error.as_deref(), Some("Not a valid PDF file."));

        let pdf = dir.path().join("ok.pdf");
        fs::write(&pdf, one_page_pdf(&["x"])).unwrap();
        assert!(validate_document_file(&pdf).unwrap().valid);
    }

    #[test]
    fn batch_keeps_order_and_collects_failures() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("a.pdf");
        let bogus = dir.path().join("b.pdf");
        let second = dir.path().join("c.pdf");
        fs::write(&first, one_page_pdf(&["Bank A"])).unwrap();
        fs::write(&bogus, b"plain text").unwrap();
        fs::write(&second, one_page_pdf(&["Bank C"])).unwrap();

        let backend = ScriptedBackend::replying(REPLY);
        let result = batch_extract(&[&first, &bogus, &second], &backend);

        assert_eq!(backend.calls.get(), 2);
        let names: Vec<&str> = result
            .successes
            .iter()
            .map(|s| s.file_name.as_str())
            .collect();
        assert_eq!(names, vec!["a.pdf", "c.pdf"]);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].file_name, "b.pdf");
        assert_eq!(result.failures[0].error, "Not a valid PDF file.");
    }

    #[test]
    fn status_reports_configuration() {
        let settings = Settings {
            api_key: Some("gsk".to_string()),
            ..Settings::default()
        };
        let status = provider_status(&settings);
        assert_eq!(status.status, "configured");
        assert_eq!(status.model, crate::config::DEFAULT_MODEL);
    }
}
