//! Labeled rows for an extracted record, plus the terminal and JSON views.

use crate::commands::ExtractionSession;
use crate::models::{FieldKey, FieldRecord, FIELD_COUNT, UNKNOWN};
use crate::types::NoticeLevel;
use crossterm::style::Stylize;
use serde::Serialize;

/// Icons shown next to each label, in field order.
pub const FIELD_ICONS: [&str; FIELD_COUNT] = ["🏦", "👤", "🆔", "#️⃣", "📞", "💰", "💳", "📉", "📈"];

const EMPHASIS_KEYWORDS: [&str; 3] = ["amount", "balance", "salary"];
const DEBUG_TEXT_PREVIEW_CHARS: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldRow {
    pub icon: &'static str,
    pub label: &'static str,
    pub value: String,
    pub emphasized: bool,
}

/// Money-like labels are emphasized, unless the value is unknown.
pub fn is_emphasized(label: &str, value: &str) -> bool {
    let label = label.to_lowercase();
    value != UNKNOWN && EMPHASIS_KEYWORDS.iter().any(|k| label.contains(k))
}

pub fn field_rows(record: &FieldRecord) -> Vec<FieldRow> {
    FieldKey::ALL
        .iter()
        .zip(FIELD_ICONS.iter())
        .map(|(&key, &icon)| {
            let value = record.get(key).to_string();
            FieldRow {
                icon,
                label: key.label(),
                emphasized: is_emphasized(key.label(), &value),
                value,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    /// ANSI colors for emphasized values and notices.
    pub color: bool,
    /// Raw model output, winning strategy and a text sample.
    pub debug: bool,
}

/// Terminal panel for one session.
pub fn render_panel(session: &ExtractionSession, options: &RenderOptions) -> String {
    let mut out = String::new();
    out.push_str(&format!("📄 {}\n", session.file_name));

    for notice in &session.notices {
        let line = match notice.level {
            NoticeLevel::Warning => format!("⚠️  {}", notice.message),
            NoticeLevel::Error => format!("❌ {}", notice.message),
        };
        if options.color {
            let styled = match notice.level {
                NoticeLevel::Warning => line.yellow().to_string(),
                NoticeLevel::Error => line.red().to_string(),
            };
            out.push_str(&styled);
        } else {
            out.push_str(&line);
        }
        out.push('\n');
    }

    match &session.record {
        Some(record) => {
            out.push_str("💳 Customer Information\n");
            let rows = field_rows(record);
            let width = rows
                .iter()
                .map(|r| r.label.chars().count())
                .max()
                .unwrap_or(0);
            for row in rows {
                let value = if row.emphasized && options.color {
                    row.value.as_str().green().bold().to_string()
                } else {
                    row.value.clone()
                };
                out.push_str(&format!(
                    "  {} {:<width$} : {}\n",
                    row.icon,
                    row.label,
                    value,
                    width = width
                ));
            }
        }
        None => {
            let msg = "❌ No information extracted or error occurred.";
            if options.color {
                out.push_str(&msg.red().to_string());
            } else {
                out.push_str(msg);
            }
            out.push('\n');
        }
    }

    if options.debug {
        out.push_str(&render_debug(session));
    }
    out
}

fn render_debug(session: &ExtractionSession) -> String {
    let mut out = String::from("\n#### Debug: Raw LLM Output\n");
    match &session.raw_output {
        Some(raw) => out.push_str(raw.as_str()),
        None => out.push_str("(no model output)"),
    }
    out.push('\n');
    if let Some(strategy) = session.strategy {
        out.push_str(&format!("#### Debug: Parse strategy: {}\n", strategy.as_str()));
    }
    let text = session.text.render();
    let sample: String = text.chars().take(DEBUG_TEXT_PREVIEW_CHARS).collect();
    out.push_str(&format!(
        "#### Debug: Extracted Text Sample (first {} characters)\n{}\n",
        DEBUG_TEXT_PREVIEW_CHARS, sample
    ));
    out
}

#[derive(Debug, Serialize)]
pub struct SessionView<'a> {
    pub file: &'a str,
    pub record: Option<&'a FieldRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<&'static str>,
    pub notices: &'a [crate::types::Notice],
}

impl<'a> From<&'a ExtractionSession> for SessionView<'a> {
    fn from(session: &'a ExtractionSession) -> Self {
        Self {
            file: &session.file_name,
            record: session.record.as_ref(),
            strategy: session.strategy.map(|s| s.as_str()),
            notices: &session.notices,
        }
    }
}

/// Pretty JSON array with one entry per session.
pub fn render_json(sessions: &[ExtractionSession]) -> Result<String, serde_json::Error> {
    let views: Vec<SessionView<'_>> = sessions.iter().map(SessionView::from).collect();
    serde_json::to_string_pretty(&views)
}
