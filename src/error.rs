use std::path::PathBuf;
use thiserror::Error;

/// Failures while turning PDF bytes into text.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Not a valid PDF file.")]
    NotPdf,
    #[error("Could not read PDF: {0}")]
    Load(#[from] lopdf::Error),
    #[error("Could not extract text from page {page}: {source}")]
    Page {
        page: u32,
        #[source]
        source: lopdf::Error,
    },
}

/// Failures talking to the model provider. None of these yield a record.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("GROQ_API_KEY is not set. Add it to your environment or .env file.")]
    MissingApiKey,
    #[error("Could not create HTTP client: {0}")]
    Client(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("The provider rejected the API key ({0}).")]
    Unauthorized(String),
    #[error("Rate limit reached, try again later: {0}")]
    RateLimited(String),
    #[error("Request failed ({status}): {body}")]
    Status { status: u16, body: String },
    #[error("Unexpected response from provider: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0}")]
    Invalid(String),
    #[error("Excel export failed: {0}")]
    Export(String),
}

impl From<rust_xlsxwriter::XlsxError> for AppError {
    fn from(e: rust_xlsxwriter::XlsxError) -> Self {
        AppError::Export(e.to_string())
    }
}
