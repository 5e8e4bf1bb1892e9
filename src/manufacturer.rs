// src/manufacturer.rs

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{info, warn};

use crate::search::SearchProvider;

pub const UNKNOWN_MANUFACTURER: &str = "Não identificado";
pub const UNKNOWN_LOCATION: &str = "Não encontrada";

/// One canonical manufacturer with its searchable alias variants.
#[derive(Debug, Clone)]
struct AliasGroup {
    canonical: String,
    aliases: Vec<String>,
}

/// Reference list of known manufacturers, loaded from a text file with
/// one entry per line: `Canonical/Alias1/Alias2`. Lines sharing the
/// same canonical segment merge into one group; group order follows
/// first appearance in the file and is the scoring tie-break.
#[derive(Debug, Clone)]
pub struct ManufacturerBook {
    groups: Vec<AliasGroup>,
}

impl ManufacturerBook {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(&path)?;
        let book = Self::from_lines(content.lines());
        info!(
            path = %path.as_ref().display(),
            manufacturers = book.groups.len(),
            "manufacturer reference list loaded"
        );
        Ok(book)
    }

    pub fn from_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> Self {
        let mut groups: Vec<AliasGroup> = Vec::new();

        for line in lines {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut segments = line.split('/').map(str::trim).filter(|s| !s.is_empty());
            let Some(canonical) = segments.next() else {
                continue;
            };
            let mut aliases: Vec<String> = vec![canonical.to_string()];
            aliases.extend(segments.map(String::from));

            match groups.iter_mut().find(|g| g.canonical == canonical) {
                Some(group) => {
                    for alias in aliases {
                        if !group.aliases.contains(&alias) {
                            group.aliases.push(alias);
                        }
                    }
                }
                None => groups.push(AliasGroup {
                    canonical: canonical.to_string(),
                    aliases,
                }),
            }
        }

        Self { groups }
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Resolution output. Both fields fall back to their sentinel values;
/// this type never carries an error.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedManufacturer {
    pub name: String,
    pub location: String,
}

impl ResolvedManufacturer {
    fn unknown() -> Self {
        Self {
            name: UNKNOWN_MANUFACTURER.to_string(),
            location: UNKNOWN_LOCATION.to_string(),
        }
    }
}

static CITY_COUNTRY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Z][A-Za-z\s-]+,\s*[A-Z][A-Za-z\s.\-]+)").unwrap());

/// Best-effort manufacturer and headquarters lookup for a part number.
/// Every failure mode of the search capability collapses to sentinel
/// values; resolution never aborts an item.
pub struct ManufacturerResolver<S> {
    book: ManufacturerBook,
    search: S,
    max_results: usize,
}

impl<S: SearchProvider> ManufacturerResolver<S> {
    pub fn new(book: ManufacturerBook, search: S, max_results: usize) -> Self {
        Self {
            book,
            search,
            max_results,
        }
    }

    pub async fn resolve(&self, partnumber: &str) -> ResolvedManufacturer {
        let partnumber = partnumber.trim();
        if partnumber.is_empty() || self.book.is_empty() {
            return ResolvedManufacturer::unknown();
        }

        let Some(name) = self.score_manufacturer(partnumber).await else {
            return ResolvedManufacturer::unknown();
        };

        let location = self
            .lookup_headquarters(&name)
            .await
            .unwrap_or_else(|| UNKNOWN_LOCATION.to_string());

        ResolvedManufacturer { name, location }
    }

    /// Search `"<pn>" manufacturer datasheet` and tally, over the
    /// combined title+snippet text, how many alias variants of each
    /// known manufacturer appear (word-boundary, case-insensitive).
    /// Highest tally wins; ties keep reference-list order.
    async fn score_manufacturer(&self, partnumber: &str) -> Option<String> {
        let query = format!("\"{partnumber}\" manufacturer datasheet");
        let hits = match self.search.search(&query, self.max_results).await {
            Ok(hits) if !hits.is_empty() => hits,
            Ok(_) => {
                info!(pn = %partnumber, "no search results for manufacturer lookup");
                return None;
            }
            Err(e) => {
                warn!(pn = %partnumber, error = %e, "manufacturer search failed");
                return None;
            }
        };

        let combined = hits
            .iter()
            .map(|h| format!("{} {}", h.title, h.snippet))
            .collect::<Vec<_>>()
            .join(" ");

        let mut best: Option<(&str, usize)> = None;
        for group in &self.book.groups {
            let mut score = 0usize;
            for alias in &group.aliases {
                let pattern = format!(r"(?i)\b{}\b", regex::escape(alias));
                let Ok(re) = Regex::new(&pattern) else {
                    continue;
                };
                if re.is_match(&combined) {
                    score += 1;
                }
            }
            if score > 0 && best.map(|(_, s)| score > s).unwrap_or(true) {
                best = Some((&group.canonical, score));
            }
        }

        best.map(|(name, score)| {
            info!(pn = %partnumber, manufacturer = name, score, "manufacturer resolved");
            name.to_string()
        })
    }

    /// Search `<manufacturer> headquarters address` and take the LAST
    /// "City, Country"-shaped match over the combined snippet text.
    async fn lookup_headquarters(&self, manufacturer: &str) -> Option<String> {
        let query = format!("{manufacturer} headquarters address");
        let hits = match self.search.search(&query, 5).await {
            Ok(hits) if !hits.is_empty() => hits,
            Ok(_) => return None,
            Err(e) => {
                warn!(manufacturer = %manufacturer, error = %e, "headquarters search failed");
                return None;
            }
        };

        let combined = hits
            .iter()
            .map(|h| h.snippet.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        CITY_COUNTRY
            .find_iter(&combined)
            .last()
            .map(|m| m.as_str().trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::{SearchError, SearchHit};
    use async_trait::async_trait;

    struct FakeSearch {
        manufacturer_page: Vec<SearchHit>,
        headquarters_page: Vec<SearchHit>,
    }

    #[async_trait]
    impl SearchProvider for FakeSearch {
        async fn search(
            &self,
            query: &str,
            _max_results: usize,
        ) -> Result<Vec<SearchHit>, SearchError> {
            if query.contains("headquarters") {
                Ok(self.headquarters_page.clone())
            } else {
                Ok(self.manufacturer_page.clone())
            }
        }
    }

    struct BrokenSearch;

    #[async_trait]
    impl SearchProvider for BrokenSearch {
        async fn search(
            &self,
            _query: &str,
            _max_results: usize,
        ) -> Result<Vec<SearchHit>, SearchError> {
            Err(SearchError::Http("dns failure".into()))
        }
    }

    fn hit(title: &str, snippet: &str) -> SearchHit {
        SearchHit {
            title: title.to_string(),
            snippet: snippet.to_string(),
        }
    }

    fn book() -> ManufacturerBook {
        ManufacturerBook::from_lines([
            "Texas Instruments/TI",
            "Samsung Electro-Mechanics/Samsung",
            "Murata/Murata Manufacturing",
        ])
    }

    #[tokio::test]
    async fn highest_alias_tally_wins() {
        let search = FakeSearch {
            manufacturer_page: vec![
                hit("CL10C330JB8NNNC datasheet", "33pF MLCC by Samsung Electro-Mechanics"),
                hit("Samsung capacitors", "Samsung Electro-Mechanics product line"),
            ],
            headquarters_page: vec![hit("About", "Headquarters: Suwon, South Korea")],
        };
        let resolver = ManufacturerResolver::new(book(), search, 10);
        let resolved = resolver.resolve("CL10C330JB8NNNC").await;
        assert_eq!(resolved.name, "Samsung Electro-Mechanics");
        assert_eq!(resolved.location, "Suwon, South Korea");
    }

    #[tokio::test]
    async fn ties_keep_reference_list_order() {
        let search = FakeSearch {
            // One alias each for Texas Instruments and Murata.
            manufacturer_page: vec![hit(
                "Cross reference",
                "Compatible with Texas Instruments and Murata parts",
            )],
            headquarters_page: vec![],
        };
        let resolver = ManufacturerResolver::new(book(), search, 10);
        let resolved = resolver.resolve("XYZ-1").await;
        assert_eq!(resolved.name, "Texas Instruments");
        assert_eq!(resolved.location, UNKNOWN_LOCATION);
    }

    #[tokio::test]
    async fn no_alias_match_yields_sentinels() {
        let search = FakeSearch {
            manufacturer_page: vec![hit("Unrelated", "nothing about electronics vendors")],
            headquarters_page: vec![],
        };
        let resolver = ManufacturerResolver::new(book(), search, 10);
        let resolved = resolver.resolve("ABC").await;
        assert_eq!(resolved.name, UNKNOWN_MANUFACTURER);
        assert_eq!(resolved.location, UNKNOWN_LOCATION);
    }

    #[tokio::test]
    async fn search_failure_yields_sentinels() {
        let resolver = ManufacturerResolver::new(book(), BrokenSearch, 10);
        let resolved = resolver.resolve("ABC").await;
        assert_eq!(resolved, ResolvedManufacturer::unknown());
    }

    #[tokio::test]
    async fn empty_partnumber_is_not_searched() {
        let resolver = ManufacturerResolver::new(book(), BrokenSearch, 10);
        let resolved = resolver.resolve("   ").await;
        assert_eq!(resolved, ResolvedManufacturer::unknown());
    }

    #[tokio::test]
    async fn last_city_country_match_is_taken() {
        let search = FakeSearch {
            manufacturer_page: vec![hit("TI part", "made by Texas Instruments")],
            headquarters_page: vec![hit(
                "Offices",
                "Sales office: Munich, Germany. Headquarters: Dallas, United States",
            )],
        };
        let resolver = ManufacturerResolver::new(book(), search, 10);
        let resolved = resolver.resolve("LM358").await;
        assert_eq!(resolved.name, "Texas Instruments");
        assert_eq!(resolved.location, "Dallas, United States");
    }

    #[test]
    fn duplicate_canonicals_merge_aliases() {
        let book = ManufacturerBook::from_lines(["Murata/Murata Manufacturing", "Murata/muRata"]);
        assert_eq!(book.groups.len(), 1);
        assert_eq!(book.groups[0].aliases.len(), 3);
    }
}
