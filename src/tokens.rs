//! Token counting for budget planning and cost estimation.

use crate::error::{BookcastError, Result};
use crate::planner::TextUnit;
use crate::text::Paragraph;
use lru::LruCache;
use rayon::prelude::*;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::Duration;

const CACHE_CAPACITY: usize = 10_000;

/// Rough token count: about four characters per token, never zero for non-empty text.
pub fn estimate_tokens(text: &str) -> usize {
    let chars = text.chars().count();
    if chars == 0 {
        0
    } else {
        chars.div_ceil(4)
    }
}

#[derive(Debug, Clone)]
pub enum TokenProvider {
    /// Local character-based estimate.
    Estimate,
    /// Gemini `countTokens` endpoint. Falls back to the estimate on failure.
    Gemini {
        base_url: String,
        model: String,
        api_key: String,
    },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CountTokensResponse {
    #[serde(default)]
    total_tokens: usize,
}

pub struct TokenCounter {
    provider: TokenProvider,
    http: Option<reqwest::blocking::Client>,
    cache: Mutex<LruCache<[u8; 32], usize>>,
}

impl TokenCounter {
    pub fn new(provider: TokenProvider) -> Result<Self> {
        let http = match provider {
            TokenProvider::Estimate => None,
            TokenProvider::Gemini { .. } => Some(
                reqwest::blocking::Client::builder()
                    .timeout(Duration::from_secs(30))
                    .build()?,
            ),
        };

        Ok(Self {
            provider,
            http,
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN),
            )),
        })
    }

    pub fn estimating() -> Self {
        Self {
            provider: TokenProvider::Estimate,
            http: None,
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN),
            )),
        }
    }

    pub fn provider(&self) -> &TokenProvider {
        &self.provider
    }

    pub fn count_tokens(&self, text: &str) -> usize {
        let key: [u8; 32] = Sha256::digest(text.as_bytes()).into();
        if let Ok(mut cache) = self.cache.lock() {
            if let Some(&count) = cache.get(&key) {
                return count;
            }
        }

        let count = match &self.provider {
            TokenProvider::Estimate => estimate_tokens(text),
            TokenProvider::Gemini { .. } => match self.count_remote(text) {
                Ok(count) => count,
                Err(e) => {
                    log::warn!("countTokens failed ({}), falling back to estimate", e);
                    estimate_tokens(text)
                }
            },
        };

        if let Ok(mut cache) = self.cache.lock() {
            cache.put(key, count);
        }
        count
    }

    /// One unit per paragraph, sized in tokens. Order follows `paragraphs`.
    pub fn paragraph_units(&self, paragraphs: &[Paragraph]) -> Vec<TextUnit> {
        paragraphs
            .par_iter()
            .map(|p| {
                let text = p.text();
                let size = self.count_tokens(&text);
                TextUnit::new(p.par_id, text, size)
            })
            .collect()
    }

    fn count_remote(&self, text: &str) -> Result<usize> {
        let (
            TokenProvider::Gemini {
                base_url,
                model,
                api_key,
            },
            Some(http),
        ) = (&self.provider, &self.http)
        else {
            return Ok(estimate_tokens(text));
        };

        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": text }] }]
        });
        let response = http
            .post(format!(
                "{}/models/{}:countTokens",
                base_url.trim_end_matches('/'),
                model
            ))
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(BookcastError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: CountTokensResponse = response.json()?;
        Ok(parsed.total_tokens)
    }
}
