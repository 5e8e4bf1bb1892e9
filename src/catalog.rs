// src/catalog.rs

use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

/// One row of the NCM reference catalog. The code is always an 8-digit
/// zero-padded string after loading.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CatalogEntry {
    pub ncm: String,
    pub short_description: String,
    pub long_description: String,
}

/// Strip non-digits and left-pad to 8: "8532.25" -> "00853225",
/// "85322590" stays put.
pub fn normalize_ncm(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    format!("{digits:0>8}")
}

/// Load the reference catalog from a CSV file. The header is matched
/// case-insensitively and must contain `ncm`, `descricao` and
/// `descricao_longa` columns.
pub fn load_catalog(path: impl AsRef<Path>) -> Result<Vec<CatalogEntry>, Box<dyn std::error::Error>> {
    let content = fs::read_to_string(&path)?;
    let entries = parse_catalog(&content)?;
    info!(path = %path.as_ref().display(), rows = entries.len(), "NCM catalog loaded");
    Ok(entries)
}

pub fn parse_catalog(content: &str) -> Result<Vec<CatalogEntry>, Box<dyn std::error::Error>> {
    let mut lines = content.lines().filter(|l| !l.trim().is_empty());

    let header = lines.next().ok_or("catalog CSV is empty")?;
    let columns: Vec<String> = split_csv_line(header)
        .into_iter()
        .map(|c| c.trim().to_lowercase())
        .collect();

    let ncm_idx = column_index(&columns, "ncm")?;
    let short_idx = column_index(&columns, "descricao")?;
    let long_idx = column_index(&columns, "descricao_longa")?;

    let mut entries = Vec::new();
    for (lineno, line) in lines.enumerate() {
        let fields = split_csv_line(line);
        let needed = ncm_idx.max(short_idx).max(long_idx);
        if fields.len() <= needed {
            warn!(line = lineno + 2, "catalog row has too few columns, skipping");
            continue;
        }
        entries.push(CatalogEntry {
            ncm: normalize_ncm(&fields[ncm_idx]),
            short_description: fields[short_idx].trim().to_string(),
            long_description: fields[long_idx].trim().to_string(),
        });
    }

    Ok(entries)
}

fn column_index(columns: &[String], name: &str) -> Result<usize, Box<dyn std::error::Error>> {
    columns
        .iter()
        .position(|c| c == name)
        .ok_or_else(|| format!("catalog CSV is missing the '{name}' column").into())
}

/// Minimal quote-aware CSV field split. Doubled quotes inside a quoted
/// field unescape to one quote.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    current.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_zero_pads() {
        let csv = "NCM,Descricao,Descricao_Longa\n\
                   8532.25,Capacitor,\"Capacitores de dielétrico, cerâmicos\"\n\
                   85423900,Circuito integrado,Outros circuitos integrados\n";
        let entries = parse_catalog(csv).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].ncm, "00853225");
        assert_eq!(
            entries[0].long_description,
            "Capacitores de dielétrico, cerâmicos"
        );
        assert_eq!(entries[1].ncm, "85423900");
    }

    #[test]
    fn missing_column_is_an_error() {
        let err = parse_catalog("ncm,descricao\n85423900,Circuito\n").unwrap_err();
        assert!(err.to_string().contains("descricao_longa"));
    }

    #[test]
    fn short_rows_are_skipped() {
        let csv = "ncm,descricao,descricao_longa\nbroken row\n85423900,CI,Outros\n";
        let entries = parse_catalog(csv).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].ncm, "85423900");
    }

    #[test]
    fn quoted_fields_keep_commas_and_quotes() {
        let fields = split_csv_line(r#"a,"b, c","d ""e"""#);
        assert_eq!(fields, vec!["a", "b, c", r#"d "e""#]);
    }

    #[test]
    fn normalize_ncm_handles_short_and_messy_codes() {
        assert_eq!(normalize_ncm("8532.25"), "00853225");
        assert_eq!(normalize_ncm(" 85423900 "), "85423900");
        assert_eq!(normalize_ncm("12"), "00000012");
    }
}
