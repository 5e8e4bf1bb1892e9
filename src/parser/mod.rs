// src/parser/mod.rs

mod avnet;
mod mouser;
mod xworks;

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::template::TemplateKind;

/// One line item as it comes out of a template parser. Ephemeral: the
/// pipeline consumes these and they are never persisted as-is.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawLineItem {
    pub partnumber: String,
    pub raw_description: String,
    pub ncm_hint: Option<String>,
}

/// Parse the extracted text with the parser matching the detected layout.
/// `Unknown` falls back to the Avnet line algorithm, which degrades
/// gracefully on free text.
pub fn parse_items(kind: TemplateKind, text: &str) -> Vec<RawLineItem> {
    match kind {
        TemplateKind::Mouser => mouser::parse(text),
        TemplateKind::Xworks => xworks::parse(text),
        TemplateKind::Avnet | TemplateKind::Unknown => avnet::parse(text),
    }
}

static PN_MARKER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bPN:\s*(\S+)").unwrap());
static PN_LEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z0-9.\-]+)\s+(.*)$").unwrap());

/// Split a raw item line into (partnumber, description).
///
/// An explicit `PN:` marker anywhere in the line wins; otherwise the
/// leading `[A-Za-z0-9.\-]+` token is taken as the part number. A line
/// matching neither keeps an empty part number.
pub(crate) fn split_partnumber(line: &str) -> (String, String) {
    let line = line.trim();

    if let Some(cap) = PN_MARKER.captures(line) {
        let pn = cap[1].trim().to_string();
        let desc = PN_MARKER.replace_all(line, "").trim().to_string();
        return (pn, desc);
    }

    if let Some(cap) = PN_LEADING.captures(line) {
        return (cap[1].trim().to_string(), cap[2].trim().to_string());
    }

    (String::new(), line.to_string())
}
