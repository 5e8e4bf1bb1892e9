// src/parser/xworks.rs

use std::sync::LazyLock;

use regex::Regex;

use super::RawLineItem;

/// "PN: <token> DESC:" pairs anywhere in the document, newlines included.
static PN_DESC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)PN:\s*([A-Za-z0-9\-_]+)\s+DESC[:\-]?\s*").unwrap());
static NEXT_PN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)PN:").unwrap());
static MFR_MARKER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bMFR:").unwrap());
static PARENTHESES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\([^)]*\)").unwrap());
static STRAY_SYMBOLS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[-~<>]").unwrap());

const MAX_DESCRIPTION_WORDS: usize = 12;

/// Truncate at the manufacturer marker, drop parenthesized asides and
/// stray punctuation, collapse whitespace, cap at twelve words.
fn clean_description(raw: &str) -> String {
    let before_mfr = match MFR_MARKER.find(raw) {
        Some(m) => &raw[..m.start()],
        None => raw,
    };
    let no_parens = PARENTHESES.replace_all(before_mfr, "");
    let no_symbols = STRAY_SYMBOLS.replace_all(&no_parens, " ");

    no_symbols
        .split_whitespace()
        .take(MAX_DESCRIPTION_WORDS)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whole-document scan of an Xworks order: every "PN: ... DESC ..."
/// capture yields one item, the description running until the next
/// "PN:" or the end of the text.
pub fn parse(text: &str) -> Vec<RawLineItem> {
    let anchors: Vec<(String, usize, usize)> = PN_DESC
        .captures_iter(text)
        .map(|cap| {
            let whole = cap.get(0).unwrap();
            (cap[1].trim().to_string(), whole.start(), whole.end())
        })
        .collect();

    let mut items = Vec::new();
    for (idx, (partnumber, _, desc_start)) in anchors.iter().enumerate() {
        let desc_end = anchors
            .get(idx + 1)
            .map(|(_, next_start, _)| *next_start)
            .unwrap_or(text.len());

        let mut segment = &text[*desc_start..desc_end];
        // A stray "PN:" without a DESC of its own still ends the segment.
        if let Some(m) = NEXT_PN.find(segment) {
            segment = &segment[..m.start()];
        }

        items.push(RawLineItem {
            partnumber: partnumber.clone(),
            raw_description: clean_description(segment),
            ncm_hint: None,
        });
    }

    items
}
