// src/llm.rs

use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Serialize;
use tracing::{info, warn};

use crate::catalog::CatalogEntry;
use crate::config::LlmConfig;

#[derive(Debug)]
pub enum GenerateError {
    Http(String),
    Status(u16, String),
    Empty,
}

impl fmt::Display for GenerateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerateError::Http(e) => write!(f, "generate request failed: {e}"),
            GenerateError::Status(code, body) => {
                write!(f, "generate API error {code}: {body}")
            }
            GenerateError::Empty => write!(f, "empty response from model"),
        }
    }
}

impl std::error::Error for GenerateError {}

/// Stateless text-generation capability. One prompt in, one completion
/// out, deterministic sampling.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String, GenerateError>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    temperature: f64,
    max_tokens: u32,
    stream: bool,
    think: bool,
}

/// Client for an Ollama-compatible `/api/generate` endpoint.
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(cfg: &LlmConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            model: cfg.model.clone(),
        })
    }
}

#[async_trait]
impl TextGenerator for OllamaClient {
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String, GenerateError> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            temperature: 0.0,
            max_tokens,
            stream: false,
            think: false,
        };

        let url = format!("{}/api/generate", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| GenerateError::Http(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GenerateError::Http(e.to_string()))?;
        if !status.is_success() {
            return Err(GenerateError::Status(status.as_u16(), body));
        }

        // The endpoint answers {"response": "..."}; fall back to the raw
        // body when that shape is absent.
        let text = match serde_json::from_str::<serde_json::Value>(&body) {
            Ok(v) => v
                .get("response")
                .and_then(|r| r.as_str())
                .map(str::to_string)
                .unwrap_or(body),
            Err(_) => body,
        };

        if text.trim().is_empty() {
            return Err(GenerateError::Empty);
        }
        Ok(text)
    }
}

/// First non-blank line of a completion, trimmed.
pub fn first_nonblank_line(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("")
        .to_string()
}

/// Ask the model to rewrite an abbreviated component description into a
/// single full line. The caller falls back to the raw description on
/// any error.
pub async fn normalize_description<G: TextGenerator + ?Sized>(
    llm: &G,
    raw_description: &str,
) -> Result<String, GenerateError> {
    let prompt = format!(
        "Normalize a descrição de um componente eletrônico em UMA linha.\n\
         - Expanda abreviações (ex: CAP->capacitor).\n\
         - Mantenha unidades (10UF, 100V, etc).\n\
         - Retorne apenas a linha normalizada.\n\n\
         Input: {raw_description}\n\nResposta:"
    );

    let raw = llm.generate(&prompt, 150).await?;
    let line = first_nonblank_line(&raw);
    if line.is_empty() {
        return Err(GenerateError::Empty);
    }
    Ok(line)
}

static NCM_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d{8})\b").unwrap());

/// Pick the best NCM among retrieval candidates. Any failure (request,
/// status, no 8-digit run in the answer) falls back to the top
/// retrieval hit; this never errors and never panics.
///
/// `candidates` must be non-empty.
pub async fn choose_best_ncm<G: TextGenerator + ?Sized>(
    llm: &G,
    item_description: &str,
    candidates: &[CatalogEntry],
) -> String {
    let mut prompt = format!(
        "Você recebe a descrição de um item e alguns candidatos NCM (cada NCM tem 8 dígitos).\n\
         RETORNE APENAS o código NCM (8 dígitos) mais adequado.\n\n\
         Item: {item_description}\n\n"
    );
    for c in candidates {
        prompt.push_str(&format!(
            "NCM: {} | Descricao: {}\n",
            c.ncm, c.long_description
        ));
    }

    match llm.generate(&prompt, 32).await {
        Ok(raw) => {
            if let Some(cap) = NCM_RUN.captures(&raw) {
                let ncm = cap[1].to_string();
                info!(ncm = %ncm, "reranker picked candidate");
                return ncm;
            }
            warn!("no 8-digit code in reranker response, using top candidate");
            candidates[0].ncm.clone()
        }
        Err(e) => {
            warn!(error = %e, "reranker failed, using top candidate");
            candidates[0].ncm.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingGenerator;

    #[async_trait]
    impl TextGenerator for FailingGenerator {
        async fn generate(&self, _prompt: &str, _max_tokens: u32) -> Result<String, GenerateError> {
            Err(GenerateError::Http("connection refused".into()))
        }
    }

    struct CannedGenerator(&'static str);

    #[async_trait]
    impl TextGenerator for CannedGenerator {
        async fn generate(&self, _prompt: &str, _max_tokens: u32) -> Result<String, GenerateError> {
            Ok(self.0.to_string())
        }
    }

    fn entry(ncm: &str, long: &str) -> CatalogEntry {
        CatalogEntry {
            ncm: ncm.to_string(),
            short_description: long.to_string(),
            long_description: long.to_string(),
        }
    }

    #[tokio::test]
    async fn rerank_falls_back_to_top_candidate() {
        let candidates = vec![entry("85322590", "capacitor"), entry("85423900", "circuito")];
        let picked = choose_best_ncm(&FailingGenerator, "capacitor", &candidates).await;
        assert_eq!(picked, "85322590");
    }

    #[tokio::test]
    async fn rerank_extracts_first_eight_digit_run() {
        let candidates = vec![entry("85322590", "capacitor"), entry("85423900", "circuito")];
        let llm = CannedGenerator("O código mais adequado é 85423900, sem dúvida.");
        let picked = choose_best_ncm(&llm, "circuito integrado", &candidates).await;
        assert_eq!(picked, "85423900");
    }

    #[tokio::test]
    async fn rerank_without_code_in_answer_uses_top_hit() {
        let candidates = vec![entry("85322590", "capacitor"), entry("85423900", "circuito")];
        let llm = CannedGenerator("não sei dizer");
        let picked = choose_best_ncm(&llm, "capacitor", &candidates).await;
        assert_eq!(picked, "85322590");
    }

    #[tokio::test]
    async fn normalization_takes_first_nonblank_line() {
        let llm = CannedGenerator("\n\n  capacitor cerâmico 33pF 50V  \nsegunda linha");
        let out = normalize_description(&llm, "CAP.CER. 33PF").await.unwrap();
        assert_eq!(out, "capacitor cerâmico 33pF 50V");
    }

    #[test]
    fn first_nonblank_line_of_blank_text_is_empty() {
        assert_eq!(first_nonblank_line("\n  \n"), "");
    }
}
