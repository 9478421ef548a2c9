use crate::error::AppError;
use crate::models::{FieldKey, FieldRecord};
use rust_xlsxwriter::{Color, Format, FormatAlign, Workbook, Worksheet, XlsxError};
use std::path::{Path, PathBuf};
use tracing::info;

const SHEET_NAME: &str = "Statements";
const FILE_HEADER: &str = "File";

/// One exported row: the source file name and its record.
pub type ExportRow<'a> = (&'a str, &'a FieldRecord);

/// Remove or replace characters that can corrupt Excel's sheet XML and cause "unreadable content".
/// Drops control chars (except tab, newline, CR). Replaces & < > so raw XML is never broken.
fn sanitize_cell(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        let u = c as u32;
        if c == '\t' || c == '\n' || c == '\r' {
            out.push(c);
        } else if u < 0x20 || u == 0x7F || u == 0xFFFE || u == 0xFFFF {
            // skip
        } else {
            match c {
                '&' => out.push_str(" and "),
                '<' | '>' => out.push(' '),
                _ => out.push(c),
            }
        }
    }
    out
}

fn write_text_cell_safe(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    text: &str,
    format: &Format,
) -> Result<(), XlsxError> {
    let cleaned = sanitize_cell(text);
    worksheet
        .write_string_with_format(row, col, &cleaned, format)
        .map(|_| ())
}

/// Amounts become numeric cells when they parse; "N/A" and anything else stays text.
fn write_number_cell_safe(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    value: &str,
    number_format: &Format,
    text_format: &Format,
) -> Result<(), XlsxError> {
    match parse_amount(value) {
        Some(num) => worksheet
            .write_number_with_format(row, col, num, number_format)
            .map(|_| ()),
        None => write_text_cell_safe(worksheet, row, col, value, text_format),
    }
}

fn parse_amount(value: &str) -> Option<f64> {
    let cleaned = value.replace([',', ' '], "");
    cleaned
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
}

/// Char count × 1.2, clamped 10–50.
fn estimate_text_width(text: &str) -> f64 {
    let w = text.chars().count() as f64 * 1.2;
    w.clamp(10.0, 50.0)
}

fn headers() -> Vec<&'static str> {
    std::iter::once(FILE_HEADER)
        .chain(FieldKey::ALL.iter().map(|k| k.label()))
        .collect()
}

/// Per-column widths: widest of header and cells; amount columns fixed at 14.
fn calculate_export_column_widths(rows: &[ExportRow<'_>]) -> Vec<f64> {
    const AMOUNT_WIDTH: f64 = 14.0;
    let mut widths: Vec<f64> = headers().iter().map(|h| estimate_text_width(h)).collect();
    for (file_name, record) in rows {
        widths[0] = widths[0].max(estimate_text_width(file_name));
        for (i, key) in FieldKey::ALL.iter().enumerate() {
            let col = i + 1;
            if key.is_amount() {
                widths[col] = AMOUNT_WIDTH;
            } else {
                widths[col] = widths[col].max(estimate_text_width(record.get(*key)));
            }
        }
    }
    widths
}

/// `<dir>/Statements_<stamp>.xlsx`, or with `_2`, `_3`, ... appended if taken.
fn unique_export_path(dir: &Path, stamp: &str) -> PathBuf {
    let mut p = dir.join(format!("Statements_{}.xlsx", stamp));
    let mut counter = 2u32;
    while p.exists() {
        p = dir.join(format!("Statements_{}_{}.xlsx", stamp, counter));
        counter += 1;
    }
    p
}

fn resolve_export_path(path_override: Option<&Path>) -> Result<PathBuf, AppError> {
    if let Some(p) = path_override.filter(|p| !p.as_os_str().is_empty()) {
        let mut pb = p.to_path_buf();
        if pb.extension().and_then(|e| e.to_str()) != Some("xlsx") {
            pb.set_extension("xlsx");
        }
        return Ok(pb);
    }
    let dir = dirs::download_dir()
        .or_else(dirs::desktop_dir)
        .ok_or_else(|| AppError::Export("Could not find Downloads or Desktop folder.".to_string()))?;
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
    Ok(unique_export_path(&dir, &stamp))
}

/// Write every record to a new workbook, one row per document. Never appends.
/// Returns the saved file path.
pub fn export_records_to_new_excel(
    rows: &[ExportRow<'_>],
    path_override: Option<&Path>,
) -> Result<PathBuf, AppError> {
    let path = resolve_export_path(path_override)?;

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    let header_format = Format::new()
        .set_bold()
        .set_background_color(Color::RGB(0x2563EB))
        .set_font_color(Color::RGB(0xFFFFFF));
    let text_format = Format::new().set_text_wrap();
    let amount_format = Format::new()
        .set_num_format("#,##0.00")
        .set_align(FormatAlign::Right);

    for (col, &w) in calculate_export_column_widths(rows).iter().enumerate() {
        worksheet.set_column_width(col as u16, w)?;
    }
    for (col, header) in headers().iter().enumerate() {
        write_text_cell_safe(worksheet, 0, col as u16, header, &header_format)?;
    }

    for (row_idx, (file_name, record)) in rows.iter().enumerate() {
        let row = (row_idx + 1) as u32;
        write_text_cell_safe(worksheet, row, 0, file_name, &text_format)?;
        for (i, key) in FieldKey::ALL.iter().enumerate() {
            let col = (i + 1) as u16;
            let value = record.get(*key);
            if key.is_amount() {
                write_number_cell_safe(worksheet, row, col, value, &amount_format, &text_format)?;
            } else {
                write_text_cell_safe(worksheet, row, col, value, &text_format)?;
            }
        }
    }

    worksheet.set_freeze_panes(1, 0)?;
    workbook.save(&path)?;
    info!(path = %path.display(), rows = rows.len(), "workbook saved");
    Ok(path)
}
