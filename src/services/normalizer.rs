//! Turns raw model text into a [`FieldRecord`], whatever the model sent back.
//!
//! Strategies run in decreasing order of structural trust and the first one
//! that produces nine values wins:
//!
//! 1. every balanced `[...]` candidate, strictly parsed as a JSON array
//! 2. every markdown code fence body, strictly parsed as a JSON array
//! 3. the first nine double-quoted literals anywhere in the text
//! 4. nine `"N/A"` values

use crate::models::{FieldRecord, FIELD_COUNT, UNKNOWN};
use regex::Regex;
use serde::Serialize;
use serde_json::value::RawValue;
use std::collections::HashSet;
use std::sync::OnceLock;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseStrategy {
    BracketScan,
    FencedBlock,
    QuotedLiterals,
    Sentinel,
}

impl ParseStrategy {
    /// Strategies that can fail, in the order they are tried.
    pub const CHAIN: [ParseStrategy; 3] = [
        ParseStrategy::BracketScan,
        ParseStrategy::FencedBlock,
        ParseStrategy::QuotedLiterals,
    ];

    pub fn apply(self, raw: &str) -> Option<FieldRecord> {
        match self {
            ParseStrategy::BracketScan => bracket_scan(raw),
            ParseStrategy::FencedBlock => fenced_block(raw),
            ParseStrategy::QuotedLiterals => quoted_literals(raw),
            ParseStrategy::Sentinel => Some(FieldRecord::unknown()),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ParseStrategy::BracketScan => "bracket_scan",
            ParseStrategy::FencedBlock => "fenced_block",
            ParseStrategy::QuotedLiterals => "quoted_literals",
            ParseStrategy::Sentinel => "sentinel",
        }
    }
}

/// Always returns a nine-field record.
pub fn normalize(raw: &str) -> FieldRecord {
    normalize_traced(raw).0
}

/// Like [`normalize`], also reporting which strategy produced the record.
pub fn normalize_traced(raw: &str) -> (FieldRecord, ParseStrategy) {
    let (record, strategy) = ParseStrategy::CHAIN
        .iter()
        .find_map(|s| s.apply(raw).map(|record| (record, *s)))
        .unwrap_or_else(|| (FieldRecord::unknown(), ParseStrategy::Sentinel));
    debug!(strategy = strategy.as_str(), "model output normalized");
    (record, strategy)
}

fn bracket_scan(raw: &str) -> Option<FieldRecord> {
    array_candidates(raw).into_iter().find_map(parse_strict)
}

fn fenced_block(raw: &str) -> Option<FieldRecord> {
    fence_re()
        .captures_iter(raw)
        .filter_map(|c| c.get(1))
        .find_map(|body| parse_strict(body.as_str().trim()))
}

fn quoted_literals(raw: &str) -> Option<FieldRecord> {
    let values: Vec<String> = quoted_re()
        .captures_iter(raw)
        .filter_map(|c| c.get(1))
        .take(FIELD_COUNT)
        .map(|m| m.as_str().to_string())
        .collect();
    FieldRecord::from_vec(values)
}

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```[A-Za-z0-9_-]*(.*?)```").expect("code fence regex"))
}

fn quoted_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""([^"]*)""#).expect("quoted literal regex"))
}

/// Maximal, non-overlapping `[...]` substrings in order of appearance.
///
/// Brackets are paired in one pass with a stack, so nesting depth is unbounded
/// and the cost stays linear. Inside an open bracket, brackets within JSON
/// string literals are ignored. A `[` that never closes encloses nothing: the
/// pairs directly inside it are candidates of their own.
fn array_candidates(raw: &str) -> Vec<&str> {
    let bytes = raw.as_bytes();
    let mut open: Vec<usize> = Vec::new();
    // (start, end, enclosing open bracket)
    let mut pairs: Vec<(usize, usize, Option<usize>)> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' if !open.is_empty() => in_string = true,
            b'[' => open.push(i),
            b']' => {
                if let Some(start) = open.pop() {
                    pairs.push((start, i, open.last().copied()));
                }
            }
            _ => {}
        }
    }

    // Whatever is left on the stack never closed.
    let unmatched: HashSet<usize> = open.into_iter().collect();
    pairs.retain(|(_, _, parent)| parent.map_or(true, |p| unmatched.contains(&p)));
    pairs.sort_unstable_by_key(|(start, _, _)| *start);
    pairs.into_iter().map(|(start, end, _)| &raw[start..=end]).collect()
}

/// Strict JSON array of exactly nine scalars. Strings are unescaped, numbers keep
/// their literal text, null becomes the sentinel. Anything else rejects the array.
fn parse_strict(candidate: &str) -> Option<FieldRecord> {
    let elements: Vec<&RawValue> = serde_json::from_str(candidate).ok()?;
    if elements.len() != FIELD_COUNT {
        return None;
    }
    let values = elements
        .into_iter()
        .map(scalar_text)
        .collect::<Option<Vec<String>>>()?;
    FieldRecord::from_vec(values)
}

fn scalar_text(element: &RawValue) -> Option<String> {
    let text = element.get().trim();
    match *text.as_bytes().first()? {
        b'"' => serde_json::from_str::<String>(text).ok(),
        b'-' | b'0'..=b'9' => Some(text.to_string()),
        b'n' if text == "null" => Some(UNKNOWN.to_string()),
        _ => None,
    }
}
