// src/search.rs

use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use tracing::debug;

use crate::config::SearchConfig;

/// One web search result: title plus snippet text.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub title: String,
    pub snippet: String,
}

#[derive(Debug)]
pub enum SearchError {
    Http(String),
    Status(u16),
}

impl fmt::Display for SearchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchError::Http(e) => write!(f, "search request failed: {e}"),
            SearchError::Status(code) => write!(f, "search endpoint returned {code}"),
        }
    }
}

impl std::error::Error for SearchError {}

/// Web search capability: ordered title/snippet pairs for a query.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchError>;
}

static RESULT_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<a[^>]*class="result__a"[^>]*>(.*?)</a>"#).unwrap()
});
static RESULT_SNIPPET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)class="result__snippet"[^>]*>(.*?)</a>"#).unwrap()
});
static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());

fn strip_html(fragment: &str) -> String {
    let no_tags = HTML_TAG.replace_all(fragment, "");
    no_tags
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse result titles and snippets out of a DuckDuckGo-shaped HTML
/// results page.
fn parse_results(html: &str, max_results: usize) -> Vec<SearchHit> {
    let titles: Vec<String> = RESULT_TITLE
        .captures_iter(html)
        .map(|c| strip_html(&c[1]))
        .collect();
    let snippets: Vec<String> = RESULT_SNIPPET
        .captures_iter(html)
        .map(|c| strip_html(&c[1]))
        .collect();

    titles
        .into_iter()
        .enumerate()
        .take(max_results)
        .map(|(i, title)| SearchHit {
            title,
            snippet: snippets.get(i).cloned().unwrap_or_default(),
        })
        .collect()
}

/// HTML-scraping search client against a DuckDuckGo-compatible endpoint.
pub struct DuckDuckGoClient {
    client: Client,
    base_url: String,
}

impl DuckDuckGoClient {
    pub fn new(cfg: &SearchConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .user_agent("Mozilla/5.0 (X11; Linux x86_64) ncm_classify/0.1")
            .build()?;
        Ok(Self {
            client,
            base_url: cfg.base_url.trim_end_matches('?').to_string(),
        })
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoClient {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchError> {
        let url = format!("{}?q={}", self.base_url, urlencoding::encode(query));
        debug!(query = %query, "web search");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SearchError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Status(status.as_u16()));
        }

        let html = response
            .text()
            .await
            .map_err(|e| SearchError::Http(e.to_string()))?;
        Ok(parse_results(&html, max_results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
<div class="result">
  <a rel="nofollow" class="result__a" href="https://example.com/ds">CL10C330JB8NNNC Datasheet &amp; Specs</a>
  <a class="result__snippet" href="https://example.com/ds">33pF capacitor by <b>Samsung Electro-Mechanics</b>, 0603 package.</a>
</div>
<div class="result">
  <a rel="nofollow" class="result__a" href="https://example.org">Distributor page</a>
  <a class="result__snippet" href="https://example.org">Buy CL10C330JB8NNNC online.</a>
</div>
"#;

    #[test]
    fn parses_titles_and_snippets() {
        let hits = parse_results(PAGE, 10);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "CL10C330JB8NNNC Datasheet & Specs");
        assert_eq!(
            hits[0].snippet,
            "33pF capacitor by Samsung Electro-Mechanics, 0603 package."
        );
    }

    #[test]
    fn max_results_caps_the_list() {
        let hits = parse_results(PAGE, 1);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn strip_html_removes_tags_and_entities() {
        assert_eq!(strip_html("a <b>bold</b> &amp; plain"), "a bold & plain");
    }
}
