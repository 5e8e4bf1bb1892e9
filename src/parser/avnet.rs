// src/parser/avnet.rs

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::{RawLineItem, split_partnumber};

/// Anchor for an Avnet item line: two-digit line number, a product code
/// of six or more digits, a dash, then the description. The optional
/// tail (qty, date, three money columns) is matched so it can be
/// discarded with the anchor.
static ITEM_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\d{2}\s+\d{6,}\s*-\s*(.*?)(?:\s\d{3,4}\s\d{2}/\d{2}/\d{2,4}\s[\d.,]+\s[\d.,]+\s[\d.,]+)?$",
    )
    .unwrap()
});

/// Line-oriented parse of an Avnet purchase order. Only lines matching
/// the item anchor are kept; the description capture is then split into
/// part number and description.
pub fn parse(text: &str) -> Vec<RawLineItem> {
    let mut items = Vec::new();

    for line in text.lines() {
        let Some(cap) = ITEM_LINE.captures(line.trim()) else {
            continue;
        };
        let body = cap[1].trim();
        if body.is_empty() {
            continue;
        }
        debug!(line = body, "avnet item line");

        let (partnumber, raw_description) = split_partnumber(body);
        items.push(RawLineItem {
            partnumber,
            raw_description,
            ncm_hint: None,
        });
    }

    items
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_line_with_pn_marker() {
        let items = parse("01 123456 - CAP.CER.SMD 0603 33PF 50V 5% C0G PN:CL10C330JB8NNNC");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].partnumber, "CL10C330JB8NNNC");
        assert_eq!(items[0].raw_description, "CAP.CER.SMD 0603 33PF 50V 5% C0G");
        assert_eq!(items[0].ncm_hint, None);
    }

    #[test]
    fn numeric_tail_is_discarded() {
        let items = parse("02 7654321 - RES.SMD 0805 10K 1% 1000 01/02/2024 1.000,00 10,00 100,50");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].partnumber, "RES.SMD");
        assert_eq!(items[0].raw_description, "0805 10K 1%");
    }

    #[test]
    fn non_item_lines_are_skipped() {
        let text = "AVNET Electronics\nPage 1 of 2\n01 123456 - CONN HEADER PN:TSW-102\nTotal: 100,00";
        let items = parse(text);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].partnumber, "TSW-102");
        assert_eq!(items[0].raw_description, "CONN HEADER");
    }

    #[test]
    fn leading_token_used_when_marker_absent() {
        let items = parse("03 111222 - GRM188R61E106KA73 CAP 10UF 25V X5R");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].partnumber, "GRM188R61E106KA73");
        assert_eq!(items[0].raw_description, "CAP 10UF 25V X5R");
    }
}
