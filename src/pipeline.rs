// src/pipeline.rs

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::item_db::ItemStore;
use crate::llm::{self, TextGenerator};
use crate::manufacturer::{ManufacturerResolver, UNKNOWN_MANUFACTURER};
use crate::parser::{self, RawLineItem};
use crate::pdf_text::{self, PdfTextError};
use crate::rag::NcmIndex;
use crate::search::SearchProvider;
use crate::template;

/// NCM value of a row whose retrieval produced no candidates.
pub const NCM_RETRIEVAL_ERROR: &str = "Erro RAG";
/// NCM value of a row that failed for any unclassified reason.
pub const NCM_GENERIC_ERROR: &str = "Erro";
/// Manufacturer shown on a generic error row.
pub const MANUFACTURER_PROCESSING_ERROR: &str = "Erro Processamento";

/// One classified line item, in input order. This is the pipeline's
/// public output unit.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ResultRow {
    pub partnumber: String,
    pub manufacturer: String,
    pub location: String,
    pub ncm: String,
    pub description: String,
    pub is_new_manufacturer: bool,
}

/// Read a purchase-order PDF and run template detection + parsing.
/// Field whitespace is stripped here; empty-partnumber items are the
/// caller's problem to drop before classification.
pub fn extract_items(pdf_bytes: &[u8]) -> Result<Vec<RawLineItem>, PdfTextError> {
    let text = pdf_text::read_pdf_text(pdf_bytes)?;
    let kind = template::detect(&text);
    info!(template = %kind, "template detected");

    let items = parser::parse_items(kind, &text)
        .into_iter()
        .map(|item| RawLineItem {
            partnumber: item.partnumber.trim().to_string(),
            raw_description: item.raw_description.trim().to_string(),
            ncm_hint: item.ncm_hint,
        })
        .collect::<Vec<_>>();

    info!(items = items.len(), "items extracted");
    Ok(items)
}

/// The document-to-classification pipeline: item cache, manufacturer
/// resolution, generative normalization, retrieval, reranking and
/// persistence, sequenced per item with a fallback chain.
pub struct Pipeline<G, S> {
    store: ItemStore,
    index: Arc<NcmIndex>,
    llm: G,
    resolver: ManufacturerResolver<S>,
    known_manufacturers: HashSet<String>,
    top_k: usize,
}

impl<G: TextGenerator, S: SearchProvider> Pipeline<G, S> {
    pub fn new(
        store: ItemStore,
        index: Arc<NcmIndex>,
        llm: G,
        resolver: ManufacturerResolver<S>,
        known_manufacturers: &[String],
        top_k: usize,
    ) -> Self {
        Self {
            store,
            index,
            llm,
            resolver,
            known_manufacturers: known_manufacturers
                .iter()
                .map(|m| m.to_lowercase())
                .collect(),
            top_k,
        }
    }

    pub fn store(&self) -> &ItemStore {
        &self.store
    }

    /// Classify a batch of extracted items, strictly in input order.
    /// A failing item becomes an error row; it never aborts the batch.
    pub async fn process_batch(&self, batch_id: i64, items: &[RawLineItem]) -> Vec<ResultRow> {
        let mut rows = Vec::with_capacity(items.len());

        for item in items {
            match self.process_item(batch_id, item).await {
                Ok(row) => rows.push(row),
                Err(e) => {
                    error!(pn = %item.partnumber, error = %e, "unexpected error processing item");
                    rows.push(ResultRow {
                        partnumber: item.partnumber.clone(),
                        manufacturer: MANUFACTURER_PROCESSING_ERROR.to_string(),
                        location: String::new(),
                        ncm: NCM_GENERIC_ERROR.to_string(),
                        description: item.raw_description.clone(),
                        is_new_manufacturer: false,
                    });
                }
            }
        }

        rows
    }

    /// One item through the state machine. Enrichment failures fall
    /// back inside this function; only storage errors escape to the
    /// generic error row in `process_batch`.
    async fn process_item(
        &self,
        batch_id: i64,
        item: &RawLineItem,
    ) -> Result<ResultRow, Box<dyn std::error::Error>> {
        let pn = item.partnumber.trim();
        let desc_raw = item.raw_description.as_str();

        // Cache hit needs both a code and a resolved manufacturer;
        // anything less is reprocessed from scratch.
        if let Some(cached) = self.store.get_item(pn)? {
            let ncm = cached.ncm.as_deref().unwrap_or("");
            if !ncm.is_empty() {
                if let Some(m) = &cached.manufacturer {
                    info!(pn = %pn, "cache hit, using stored classification");
                    self.store.link_item_to_batch(batch_id, pn)?;
                    return Ok(ResultRow {
                        partnumber: cached.partnumber.clone(),
                        manufacturer: m.name.clone(),
                        location: m.location.clone().unwrap_or_default(),
                        ncm: ncm.to_string(),
                        description: cached.description.clone().unwrap_or_default(),
                        is_new_manufacturer: false,
                    });
                }
            }
        }

        info!(pn = %pn, "cache miss, running full classification");

        // Best-effort enrichment: resolution never fails, it answers
        // with sentinels.
        let resolved = self.resolver.resolve(pn).await;
        let is_new_manufacturer = resolved.name != UNKNOWN_MANUFACTURER
            && !self
                .known_manufacturers
                .contains(&resolved.name.to_lowercase());

        let desc_norm = match llm::normalize_description(&self.llm, desc_raw).await {
            Ok(normalized) => normalized,
            Err(e) => {
                warn!(pn = %pn, error = %e, "normalization failed, using raw description");
                desc_raw.to_string()
            }
        };

        // The single hard failure point: without candidates there is
        // no code to report.
        let candidates = match self.index.find_top_k(&desc_norm, self.top_k).await {
            Ok(candidates) if !candidates.is_empty() => candidates,
            Ok(_) => {
                warn!(pn = %pn, query = %desc_norm, "retrieval produced no candidates");
                return Ok(self.retrieval_error_row(item, &resolved, is_new_manufacturer));
            }
            Err(e) => {
                warn!(pn = %pn, error = %e, "retrieval failed");
                return Ok(self.retrieval_error_row(item, &resolved, is_new_manufacturer));
            }
        };

        let ncm_final = llm::choose_best_ncm(&self.llm, &desc_norm, &candidates).await;

        let description = candidates
            .iter()
            .find(|c| c.ncm == ncm_final)
            .map(|c| {
                if c.long_description.is_empty() {
                    c.short_description.clone()
                } else {
                    c.long_description.clone()
                }
            })
            .unwrap_or_else(|| desc_norm.clone());

        // Cache write happens only now, after a fully successful
        // classification: manufacturer first, then the item, then the
        // batch link.
        let manufacturer = self
            .store
            .get_or_create_manufacturer(&resolved.name, Some(&resolved.location))?;
        if self.store.upsert_item(
            pn,
            Some(&ncm_final),
            Some(&description),
            Some(desc_raw),
            Some(manufacturer.id),
        )? {
            self.store.link_item_to_batch(batch_id, pn)?;
        }

        Ok(ResultRow {
            partnumber: pn.to_string(),
            manufacturer: resolved.name,
            location: resolved.location,
            ncm: ncm_final,
            description,
            is_new_manufacturer,
        })
    }

    fn retrieval_error_row(
        &self,
        item: &RawLineItem,
        resolved: &crate::manufacturer::ResolvedManufacturer,
        is_new_manufacturer: bool,
    ) -> ResultRow {
        ResultRow {
            partnumber: item.partnumber.trim().to_string(),
            manufacturer: resolved.name.clone(),
            location: resolved.location.clone(),
            ncm: NCM_RETRIEVAL_ERROR.to_string(),
            description: item.raw_description.clone(),
            is_new_manufacturer,
        }
    }
}
