//! PDF bytes to page-delimited plain text using lopdf.
//!
//! Each page is read block by block (`BT`..`ET` text objects in content-stream
//! order). When that yields nothing usable, the page falls back to lopdf's own
//! whole-page extraction, which understands font encodings.

use crate::error::ExtractionError;
use crate::types::ExtractedText;
use lopdf::content::Content;
use lopdf::{Document, Object, ObjectId};
use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// TJ adjustments (thousandths of an em) more negative than this start a new word.
const TJ_SPACE_THRESHOLD: f32 = -200.0;

fn blank_lines_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n\s*\n").expect("blank lines regex"))
}

fn horizontal_ws_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ \t]+").expect("horizontal whitespace regex"))
}

/// Collapse blank-line runs to one blank line and space/tab runs to one space.
pub fn normalize_whitespace(text: &str) -> String {
    let collapsed = blank_lines_re().replace_all(text, "\n\n");
    horizontal_ws_re().replace_all(&collapsed, " ").into_owned()
}

/// Extract normalized text for every page of the document.
pub fn extract_text(pdf_bytes: &[u8]) -> Result<ExtractedText, ExtractionError> {
    if !pdf_bytes.starts_with(b"%PDF-") {
        return Err(ExtractionError::NotPdf);
    }
    let doc = Document::load_mem(pdf_bytes)?;
    let mut extracted = ExtractedText::new();

    for (page_number, page_id) in doc.get_pages() {
        let block_text = match page_blocks(&doc, page_id) {
            Ok(blocks) => blocks.iter().map(|b| format!("{}\n", b)).collect::<String>(),
            Err(e) => {
                warn!(page = page_number, error = %e, "block extraction failed");
                String::new()
            }
        };
        let page_text = if block_text.trim().is_empty() {
            debug!(page = page_number, "falling back to whole-page extraction");
            doc.extract_text(&[page_number])
                .map_err(|source| ExtractionError::Page {
                    page: page_number,
                    source,
                })?
        } else {
            block_text
        };
        extracted.push_page(normalize_whitespace(&page_text));
    }

    debug!(
        pages = extracted.page_count(),
        chars = extracted.pages().iter().map(|p| p.text.len()).sum::<usize>(),
        "pdf text extracted"
    );
    Ok(extracted)
}

/// Text of each `BT`..`ET` object on the page. Returns no blocks when any string
/// operand looks like it needs a font encoding to be readable.
fn page_blocks(doc: &Document, page_id: ObjectId) -> Result<Vec<String>, lopdf::Error> {
    let data = doc.get_page_content(page_id)?;
    let content = Content::decode(&data)?;

    let mut blocks = Vec::new();
    let mut current: Option<String> = None;

    for op in &content.operations {
        match op.operator.as_str() {
            "BT" => current = Some(String::new()),
            "ET" => {
                if let Some(block) = current.take() {
                    let trimmed = block.trim();
                    if !trimmed.is_empty() {
                        blocks.push(trimmed.to_string());
                    }
                }
            }
            _ => {
                let Some(block) = current.as_mut() else {
                    continue;
                };
                if !apply_text_operator(block, &op.operator, &op.operands) {
                    return Ok(Vec::new());
                }
            }
        }
    }
    Ok(blocks)
}

/// Append the text produced by one operator. Returns false on undecodable strings.
fn apply_text_operator(block: &mut String, operator: &str, operands: &[Object]) -> bool {
    match operator {
        "Tj" => match operands.first() {
            Some(obj) => push_string_operand(block, obj),
            None => true,
        },
        "'" | "\"" => {
            new_line(block);
            match operands.last() {
                Some(obj) => push_string_operand(block, obj),
                None => true,
            }
        }
        "TJ" => {
            let Some(Object::Array(items)) = operands.first() else {
                return true;
            };
            for item in items {
                let adjustment = match item {
                    Object::Integer(i) => Some(*i as f32),
                    Object::Real(r) => Some(*r as f32),
                    _ => None,
                };
                match adjustment {
                    Some(adj) => {
                        if adj < TJ_SPACE_THRESHOLD && !block.ends_with(' ') {
                            block.push(' ');
                        }
                    }
                    None => {
                        if !push_string_operand(block, item) {
                            return false;
                        }
                    }
                }
            }
            true
        }
        "Td" | "TD" | "T*" | "Tm" => {
            new_line(block);
            true
        }
        _ => true,
    }
}

fn new_line(block: &mut String) {
    if !block.is_empty() && !block.ends_with('\n') {
        block.push('\n');
    }
}

fn push_string_operand(block: &mut String, obj: &Object) -> bool {
    match obj {
        Object::String(bytes, _) => match decode_pdf_string(bytes) {
            Some(text) => {
                block.push_str(&text);
                true
            }
            None => false,
        },
        _ => true,
    }
}

/// WinAnsiEncoding for 0x80..=0x9F, where it departs from Latin-1. Unassigned
/// codes map to U+FFFD.
const WIN_ANSI_HIGH: [char; 32] = [
    '\u{20AC}', '\u{FFFD}', '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{02C6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\u{FFFD}', '\u{017D}', '\u{FFFD}',
    '\u{FFFD}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{02DC}', '\u{2122}', '\u{0161}', '\u{203A}', '\u{0153}', '\u{FFFD}', '\u{017E}', '\u{0178}',
];

fn win_ansi_char(b: u8) -> char {
    match b {
        0x80..=0x9F => WIN_ANSI_HIGH[(b - 0x80) as usize],
        _ => b as char,
    }
}

/// UTF-16BE with BOM, otherwise one WinAnsi byte per char. None if control bytes
/// show up, which means the string is glyph ids for an embedded or CID font.
fn decode_pdf_string(bytes: &[u8]) -> Option<String> {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return char::decode_utf16(units).collect::<Result<String, _>>().ok();
    }
    if bytes
        .iter()
        .any(|&b| b < 0x20 && b != b'\t' && b != b'\n' && b != b'\r')
    {
        return None;
    }
    Some(bytes.iter().map(|&b| win_ansi_char(b)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::Operation;
    use lopdf::{dictionary, Stream};

    /// One-page PDF with the given content-stream operations and a Courier font as F1.
    fn pdf_with_operations(pages: Vec<Vec<Operation>>) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let mut kids = Vec::new();
        for operations in pages {
            let content = Content { operations };
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            });
            kids.push(page_id.into());
        }
        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
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

    fn text_object(lines: &[&str]) -> Vec<Operation> {
        let mut ops = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![72.into(), 720.into()]),
        ];
        for (i, line) in lines.iter().enumerate() {
            if i > 0 {
                ops.push(Operation::new("Td", vec![0.into(), (-14).into()]));
            }
            ops.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
        }
        ops.push(Operation::new("ET", vec![]));
        ops
    }

    #[test]
    fn extracts_blocks_with_page_markers() {
        let bytes = pdf_with_operations(vec![
            text_object(&["First National Bank", "Account 12345678"]),
            text_object(&["Closing balance    1500.50"]),
        ]);
        let text = extract_text(&bytes).unwrap();
        assert_eq!(text.page_count(), 2);
        assert_eq!(
            text.pages()[0].text,
            "First National Bank\nAccount 12345678\n"
        );
        assert_eq!(text.pages()[1].text, "Closing balance 1500.50\n");
        let rendered = text.render();
        assert!(rendered.starts_with("--- PAGE 1 ---\nFirst National Bank"));
        assert!(rendered.contains("--- PAGE 2 ---\nClosing balance 1500.50"));
    }

    #[test]
    fn tj_arrays_respect_word_gaps() {
        let ops = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new(
                "TJ",
                vec![Object::Array(vec![
                    Object::string_literal("Sal"),
                    Object::Integer(-20),
                    Object::string_literal("ary"),
                    Object::Integer(-450),
                    Object::string_literal("4200"),
                ])],
            ),
            Operation::new("ET", vec![]),
        ];
        let text = extract_text(&pdf_with_operations(vec![ops])).unwrap();
        assert_eq!(text.pages()[0].text, "Salary 4200\n");
    }

    #[test]
    fn page_without_text_is_blank() {
        let ops = vec![
            Operation::new("q", vec![]),
            Operation::new("Q", vec![]),
        ];
        let text = extract_text(&pdf_with_operations(vec![ops])).unwrap();
        assert_eq!(text.page_count(), 1);
        assert!(text.is_blank());
    }

    #[test]
    fn rejects_non_pdf_bytes() {
        assert!(matches!(
            extract_text(b"hello, not a pdf"),
            Err(ExtractionError::NotPdf)
        ));
    }

    #[test]
    fn rejects_truncated_pdf() {
        assert!(extract_text(b"%PDF-1.5\n%garbage").is_err());
    }

    #[test]
    fn decodes_utf16_strings() {
        let bytes = [0xFE, 0xFF, 0x00, 0x49, 0x00, 0x42, 0x00, 0x41, 0x00, 0x4E];
        assert_eq!(decode_pdf_string(&bytes).as_deref(), Some("IBAN"));
    }

    #[test]
    fn single_byte_strings_use_win_ansi() {
        let bytes = [0x80, b' ', b'1', b'0', b' ', 0x93, b'o', b'k', 0x94, 0x96, 0xE9];
        assert_eq!(
            decode_pdf_string(&bytes).as_deref(),
            Some("\u{20AC} 10 \u{201C}ok\u{201D}\u{2013}\u{E9}")
        );
        assert_eq!(win_ansi_char(0x81), '\u{FFFD}');
        assert_eq!(win_ansi_char(b'A'), 'A');
    }

    #[test]
    fn glyph_id_strings_are_undecodable() {
        assert_eq!(decode_pdf_string(&[0x00, 0x24, 0x00, 0x25]), None);
    }

    #[test]
    fn normalizes_whitespace() {
        let raw = "Bank   of\tTest\n\n\n \nBalance  10.00\n \t \nEnd";
        assert_eq!(
            normalize_whitespace(raw),
            "Bank of Test\n\nBalance 10.00\n\nEnd"
        );
    }

    #[test]
    fn whitespace_normalization_is_idempotent() {
        let samples = [
            "",
            "a  b",
            " \n \n \n x \t y \n\n\n",
            "line one\r\n\r\nline two\t\t\n",
            "--- PAGE 1 ---\nA   B\n\n\n\nC",
        ];
        for sample in samples {
            let once = normalize_whitespace(sample);
            assert_eq!(normalize_whitespace(&once), once, "sample {:?}", sample);
        }
    }
}
