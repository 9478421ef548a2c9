pub mod normalizer;
pub mod pdf_text;
