// src/pdf_text.rs

use std::fmt;

use lopdf::Document;
use tracing::{info, warn};

/// Why a purchase order could not be turned into text. These are input
/// errors: the pipeline never starts for such a file.
#[derive(Debug)]
pub enum PdfTextError {
    /// Empty upload.
    Empty,
    /// The bytes are not a parseable PDF.
    Parse(String),
    /// Image-only (scanned) document, or too little text to work with.
    Scanned,
}

impl fmt::Display for PdfTextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PdfTextError::Empty => write!(f, "empty file"),
            PdfTextError::Parse(e) => write!(f, "failed to parse PDF: {e}"),
            PdfTextError::Scanned => write!(f, "scanned/image-only PDF, no extractable text"),
        }
    }
}

impl std::error::Error for PdfTextError {}

/// Minimum number of non-whitespace characters expected from a real
/// text PDF. Below this the document is treated as scanned.
const MIN_TEXT_CHARS: usize = 30;

/// Extract the full text of a purchase-order PDF, rejecting empty,
/// unparseable, and scanned inputs.
pub fn read_pdf_text(pdf_bytes: &[u8]) -> Result<String, PdfTextError> {
    if pdf_bytes.is_empty() {
        return Err(PdfTextError::Empty);
    }

    let doc = Document::load_mem(pdf_bytes).map_err(|e| PdfTextError::Parse(e.to_string()))?;

    if looks_like_scanned(&doc) {
        info!("structural check: likely scanned / image-only");
        return Err(PdfTextError::Scanned);
    }

    match pdf_extract::extract_text_from_mem(pdf_bytes) {
        Ok(text) => {
            let meaningful = text.chars().filter(|c| !c.is_whitespace()).count();
            if meaningful < MIN_TEXT_CHARS {
                info!(chars = meaningful, "extracted text too short, treating as scanned");
                Err(PdfTextError::Scanned)
            } else {
                info!(chars = meaningful, "text extracted");
                Ok(text)
            }
        }
        Err(e) => {
            warn!(error = %e, "pdf-extract failed, may be scanned or corrupted");
            Err(PdfTextError::Scanned)
        }
    }
}

/// A page whose Resources carry XObject images but no Font entries is
/// almost certainly a scan. When at least 80% of pages look like that,
/// the whole document is treated as scanned.
fn looks_like_scanned(doc: &Document) -> bool {
    let pages = doc.get_pages();
    if pages.is_empty() {
        return false;
    }

    let mut image_only = 0usize;
    for object_id in pages.values() {
        let Ok(page_obj) = doc.get_object(*object_id) else {
            continue;
        };
        let Ok(page_dict) = page_obj.as_dict() else {
            continue;
        };

        let has_fonts = resource_dict_nonempty(doc, page_dict, b"Font");
        let has_images = resource_dict_nonempty(doc, page_dict, b"XObject");
        if has_images && !has_fonts {
            image_only += 1;
        }
    }

    let ratio = image_only as f64 / pages.len() as f64;
    info!(
        total_pages = pages.len(),
        image_only = image_only,
        ratio = format!("{ratio:.2}"),
        "scanned-page analysis"
    );
    ratio >= 0.8
}

fn resource_dict_nonempty(doc: &Document, page_dict: &lopdf::Dictionary, key: &[u8]) -> bool {
    page_dict
        .get(b"Resources")
        .ok()
        .and_then(|r| doc.dereference(r).ok())
        .and_then(|(_, resolved)| resolved.as_dict().ok())
        .and_then(|res| res.get(key).ok())
        .and_then(|entry| doc.dereference(entry).ok())
        .and_then(|(_, resolved)| resolved.as_dict().ok())
        .is_some_and(|d| !d.is_empty())
}
