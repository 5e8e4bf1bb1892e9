// src/template.rs

use std::fmt;

/// The known purchase-order layouts. Detection keys on marker tokens
/// unique to each supplier's export; anything else is `Unknown` and is
/// parsed with the most permissive parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    Avnet,
    Mouser,
    Xworks,
    Unknown,
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TemplateKind::Avnet => "avnet",
            TemplateKind::Mouser => "mouser",
            TemplateKind::Xworks => "xworks",
            TemplateKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Classify the full extracted text into a template kind.
/// Case-insensitive substring match, first marker wins.
pub fn detect(full_text: &str) -> TemplateKind {
    let lower = full_text.to_lowercase();

    if lower.contains("avnet") {
        return TemplateKind::Avnet;
    }
    if lower.contains("mouser") {
        return TemplateKind::Mouser;
    }
    if lower.contains("xworks") || lower.contains("x works") {
        return TemplateKind::Xworks;
    }
    TemplateKind::Unknown
}
