// src/parser/mouser.rs

use std::sync::LazyLock;

use regex::Regex;

use super::RawLineItem;

/// Start of an item block: "1 871-B32932A3224K189 700 700".
static ITEM_START: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+)\s+(\d{3}-\S+)").unwrap());
static NCM_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"NCM:(\d{8})").unwrap());
static DIST_PREFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{3}-").unwrap());
static PKG_SUFFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#.*$").unwrap());
static NUMERIC_ONLY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+$").unwrap());

/// Table header/label fragments that also contain a "/" and must never
/// be mistaken for the description line.
const HEADER_LABELS: &[&str] = &[
    "Mouser Part Number",
    "Item-Cliente",
    "Customer/MFG",
    "MFG Part No",
    "Line No.",
    "Quantity",
    "Ordered Shipped Pending",
    "Price(USD)",
    "NCM:",
    "US HTS:",
];

/// Strip the three-digit distributor prefix and any trailing packaging
/// suffix: "584-LTC3625EDE#PBF" -> "LTC3625EDE".
fn clean_partnumber(raw: &str) -> String {
    let no_suffix = PKG_SUFFIX.replace(raw, "");
    DIST_PREFIX.replace(&no_suffix, "").to_string()
}

/// Block-oriented parse of a Mouser invoice. An item starts at an
/// ITEM_START line; the block is scanned forward until the next item,
/// an `NCM:` line (which supplies the hint), or a `US HTS:` line
/// without an NCM. The first "/" line that is not a header label and
/// whose left segment is not purely numeric supplies the description.
pub fn parse(text: &str) -> Vec<RawLineItem> {
    let lines: Vec<&str> = text.lines().collect();
    let mut items = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i].trim();

        let Some(cap) = ITEM_START.captures(line) else {
            i += 1;
            continue;
        };
        let partnumber = clean_partnumber(&cap[2]);

        let mut description = String::new();
        let mut ncm_hint: Option<String> = None;

        let mut j = i + 1;
        while j < lines.len() {
            let l = lines[j].trim();

            if ITEM_START.is_match(l) {
                break;
            }

            // "BR NCM:85322590 ECCN:EAR99 COO:CN" terminates the block.
            if l.contains("NCM:") {
                if let Some(n) = NCM_CODE.captures(l) {
                    ncm_hint = Some(n[1].to_string());
                }
                j += 1;
                break;
            }

            // A US tariff line without an NCM also ends the block.
            if l.contains("US HTS:") {
                j += 1;
                break;
            }

            if description.is_empty()
                && l.contains('/')
                && !HEADER_LABELS.iter().any(|label| l.contains(label))
            {
                let parts: Vec<&str> = l.split('/').collect();
                let left = parts[0].trim();
                let right = parts[parts.len() - 1].trim();

                if !NUMERIC_ONLY.is_match(left) {
                    description = right.split_whitespace().collect::<Vec<_>>().join(" ");
                }
            }

            j += 1;
        }

        items.push(RawLineItem {
            partnumber,
            raw_description: description,
            ncm_hint,
        });
        i = j;
    }

    items
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = "\
Mouser Electronics
Line No. Mouser Part Number Quantity
1 871-B32932A3224K189 700 700
EPCOS / TDK Film Capacitor / Capacitor de filme 0.22uF
BR NCM:85322200 ECCN:EAR99 COO:HU
2 584-LTC3625EDE#PBF 10 10
Analog Devices / Regulador de carga supercap
US HTS:8542.39.00.01
3 595-TPS54331DR 50 50
12345 / 67890
Texas Instruments / Conversor buck 3A
BR NCM:85423900 ECCN:EAR99 COO:CN
";

    #[test]
    fn parses_blocks_with_ncm_hint() {
        let items = parse(FIXTURE);
        assert_eq!(items.len(), 3);

        assert_eq!(items[0].partnumber, "B32932A3224K189");
        assert_eq!(items[0].raw_description, "Capacitor de filme 0.22uF");
        assert_eq!(items[0].ncm_hint.as_deref(), Some("85322200"));

        assert_eq!(items[2].partnumber, "TPS54331DR");
        assert_eq!(items[2].raw_description, "Conversor buck 3A");
        assert_eq!(items[2].ncm_hint.as_deref(), Some("85423900"));
    }

    #[test]
    fn us_hts_terminates_without_hint() {
        let items = parse(FIXTURE);
        assert_eq!(items[1].partnumber, "LTC3625EDE");
        assert_eq!(items[1].raw_description, "Regulador de carga supercap");
        assert_eq!(items[1].ncm_hint, None);
    }

    #[test]
    fn numeric_left_segment_is_not_a_description() {
        // "12345 / 67890" sits before the real description of item 3 and
        // must be skipped because its left side is purely numeric.
        let items = parse(FIXTURE);
        assert_eq!(items[2].raw_description, "Conversor buck 3A");
    }

    #[test]
    fn clean_partnumber_strips_prefix_and_suffix() {
        assert_eq!(clean_partnumber("584-LTC3625EDE#PBF"), "LTC3625EDE");
        assert_eq!(clean_partnumber("871-B32932A3224K189"), "B32932A3224K189");
        assert_eq!(clean_partnumber("LM358"), "LM358");
    }

    #[test]
    fn header_lines_are_ignored() {
        let items = parse("Customer/MFG Part No\n1 871-ABC123 5 5\nVishay / Resistor de filme\nBR NCM:85332100 COO:CZ\n");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].raw_description, "Resistor de filme");
    }
}
