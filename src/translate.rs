//! Chunked book translation through a hosted LLM.

use crate::config::{ModelInfo, Provider, TranslationConfig};
use crate::error::{BookcastError, Result};
use crate::planner::{ChunkBudget, ChunkPlan, ChunkSummary};
use crate::text::Paragraph;
use crate::tokens::TokenCounter;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

pub const DEFAULT_PROMPT: &str = "You are a professional literary translator. \
Translate the following text from {source_language} to {target_language}. \
Preserve the meaning, tone and paragraph structure: keep exactly one blank line \
between paragraphs. Reply with the translation only.\n\n{text}";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub thinking_tokens: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens + self.thinking_tokens
    }

    pub fn add(&mut self, other: TokenUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.thinking_tokens += other.thinking_tokens;
    }
}

#[derive(Debug, Clone)]
pub struct Translation {
    pub text: String,
    pub usage: TokenUsage,
}

pub trait Translator {
    fn translate(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
        thinking_budget: i64,
    ) -> Result<Translation>;
}

pub fn render_prompt(template: &str, text: &str, source: &str, target: &str) -> String {
    template
        .replace("{source_language}", source)
        .replace("{target_language}", target)
        .replace("{text}", text)
}

/// The configured prompt file, or [`DEFAULT_PROMPT`].
pub fn load_prompt_template(config: &TranslationConfig) -> Result<String> {
    match &config.prompt_file {
        Some(path) => Ok(fs::read_to_string(path)?),
        None => Ok(DEFAULT_PROMPT.to_string()),
    }
}

/// Instruction text sent along with every chunk: the template with the
/// languages filled in and every line holding `{text}` removed.
pub fn prompt_overhead(template: &str, source: &str, target: &str) -> String {
    let instructions = template
        .lines()
        .filter(|line| !line.contains("{text}"))
        .collect::<Vec<_>>()
        .join("\n");
    render_prompt(instructions.trim_end(), "", source, target)
}

/// Gemini or OpenAI-compatible chat endpoint, chosen by the model's provider.
pub struct HttpTranslator {
    http: reqwest::blocking::Client,
    model: String,
    provider: Provider,
    base_url: String,
    api_key: String,
    prompt_template: String,
}

impl HttpTranslator {
    pub fn new(config: &TranslationConfig, info: &ModelInfo) -> Result<Self> {
        let api_key = resolve_api_key(info.provider, config.api_key_env.as_deref())?;
        let prompt_template = load_prompt_template(config)?;
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            model: config.model.clone(),
            provider: info.provider,
            base_url: config
                .api_base_url
                .clone()
                .unwrap_or_else(|| info.provider.default_base_url().to_string()),
            api_key,
            prompt_template,
        })
    }

    fn post(&self, url: String, body: &Value, bearer: bool) -> Result<Value> {
        let request = self.http.post(url).json(body);
        let request = if bearer {
            request.bearer_auth(&self.api_key)
        } else {
            request.header("x-goog-api-key", &self.api_key)
        };
        let response = request.send()?;

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
        Ok(response.json()?)
    }

    fn translate_gemini(&self, prompt: &str, thinking_budget: i64) -> Result<Translation> {
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": { "thinkingConfig": { "thinkingBudget": thinking_budget } }
        });
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );
        parse_gemini_response(&self.post(url, &body, false)?)
    }

    fn translate_chat(&self, prompt: &str) -> Result<Translation> {
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }]
        });
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        parse_chat_response(&self.post(url, &body, true)?)
    }
}

impl Translator for HttpTranslator {
    fn translate(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
        thinking_budget: i64,
    ) -> Result<Translation> {
        let prompt = render_prompt(&self.prompt_template, text, source_language, target_language);
        match self.provider {
            Provider::Gemini => self.translate_gemini(&prompt, thinking_budget),
            Provider::OpenAi | Provider::DeepSeek | Provider::Alibaba => {
                self.translate_chat(&prompt)
            }
        }
    }
}

pub fn resolve_api_key(provider: Provider, override_var: Option<&str>) -> Result<String> {
    let vars: Vec<&str> = match override_var {
        Some(var) => vec![var],
        None => provider.api_key_vars().to_vec(),
    };
    vars.iter()
        .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()))
        .ok_or_else(|| {
            BookcastError::invalid_config(format!(
                "no API key found, set one of: {}",
                vars.join(", ")
            ))
        })
}

fn count(value: &Value, pointer: &str) -> u64 {
    value.pointer(pointer).and_then(Value::as_u64).unwrap_or(0)
}

pub fn parse_gemini_response(value: &Value) -> Result<Translation> {
    let parts = value
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .ok_or_else(|| BookcastError::Translation("response has no candidates".to_string()))?;

    let text: String = parts
        .iter()
        .filter(|p| !p.get("thought").and_then(Value::as_bool).unwrap_or(false))
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect();
    if text.trim().is_empty() {
        return Err(BookcastError::Translation("empty translation".to_string()));
    }

    Ok(Translation {
        text: text.trim().to_string(),
        usage: TokenUsage {
            input_tokens: count(value, "/usageMetadata/promptTokenCount"),
            output_tokens: count(value, "/usageMetadata/candidatesTokenCount"),
            thinking_tokens: count(value, "/usageMetadata/thoughtsTokenCount"),
        },
    })
}

pub fn parse_chat_response(value: &Value) -> Result<Translation> {
    let text = value
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .ok_or_else(|| BookcastError::Translation("response has no choices".to_string()))?;
    if text.trim().is_empty() {
        return Err(BookcastError::Translation("empty translation".to_string()));
    }

    let thinking = count(value, "/usage/completion_tokens_details/reasoning_tokens");
    Ok(Translation {
        text: text.trim().to_string(),
        usage: TokenUsage {
            input_tokens: count(value, "/usage/prompt_tokens"),
            output_tokens: count(value, "/usage/completion_tokens").saturating_sub(thinking),
            thinking_tokens: thinking,
        },
    })
}

/// One record of the monitoring file written next to the translation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringEntry {
    pub chunk_id: String,
    pub translated_chunk: String,
    pub paragraphs_ids: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct TranslationOutcome {
    pub chunks: Vec<ChunkSummary>,
    pub translations: Vec<String>,
    /// Chunks that still failed after the retry pass.
    pub failed: Vec<String>,
    pub usage: TokenUsage,
}

impl TranslationOutcome {
    pub fn text(&self) -> String {
        self.translations.join("\n\n")
    }

    pub fn monitoring(&self) -> Vec<MonitoringEntry> {
        self.chunks
            .iter()
            .zip(&self.translations)
            .map(|(summary, translated)| MonitoringEntry {
                chunk_id: summary.chunk_id.clone(),
                translated_chunk: translated.clone(),
                paragraphs_ids: summary.paragraph_ids.clone(),
            })
            .collect()
    }

    /// Write `<stem>_translated.txt` and `<stem>_translation_monitoring.json`.
    pub fn save(&self, dir: &Path, stem: &str) -> Result<(PathBuf, PathBuf)> {
        fs::create_dir_all(dir)?;
        let text_path = dir.join(format!("{}_translated.txt", stem));
        fs::write(&text_path, self.text())?;

        let monitoring_path = dir.join(format!("{}_translation_monitoring.json", stem));
        serde_json::to_writer_pretty(File::create(&monitoring_path)?, &self.monitoring())?;

        Ok((text_path, monitoring_path))
    }
}

/// Drives a [`Translator`] over a segmented book, one planned chunk at a time.
pub struct BookTranslator<'a, T: Translator> {
    translator: &'a T,
    counter: &'a TokenCounter,
    budget: ChunkBudget,
    source_language: String,
    target_language: String,
    thinking_budget: i64,
    request_delay: Duration,
    retry_delay: Duration,
}

impl<'a, T: Translator> BookTranslator<'a, T> {
    pub fn new(
        translator: &'a T,
        counter: &'a TokenCounter,
        budget: ChunkBudget,
        config: &TranslationConfig,
    ) -> Self {
        Self {
            translator,
            counter,
            budget,
            source_language: config.source_language.clone(),
            target_language: config.target_language.clone(),
            thinking_budget: config.thinking_budget,
            request_delay: Duration::from_secs(config.request_delay_secs),
            retry_delay: Duration::from_secs(config.retry_delay_secs),
        }
    }

    fn attempt(&self, text: &str) -> Result<Translation> {
        self.translator.translate(
            text,
            &self.source_language,
            &self.target_language,
            self.thinking_budget,
        )
    }

    pub fn run(&self, paragraphs: &[Paragraph]) -> Result<TranslationOutcome> {
        let units = self.counter.paragraph_units(paragraphs);
        let estimated: usize = units.iter().map(|u| u.size).sum();
        log::info!(
            "{} paragraphs, ~{} input tokens, budget {} tokens per chunk",
            units.len(),
            estimated,
            self.budget.get()
        );

        let plan = ChunkPlan::build(units, self.budget);
        let summaries = plan.summaries();
        let chunks = plan.into_chunks();
        log::info!(
            "translating {} chunks ({} -> {})",
            chunks.len(),
            self.source_language,
            self.target_language
        );

        let progress_bar = ProgressBar::new(chunks.len() as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>4}/{len:4} {msg}")
        {
            progress_bar.set_style(style.progress_chars("█▉▊▋▌▍▎▏  "));
        }

        let mut usage = TokenUsage::default();
        let mut translations = Vec::with_capacity(chunks.len());
        let mut failed = Vec::new();

        for (i, chunk) in chunks.iter().enumerate() {
            let chunk_id = &summaries[i].chunk_id;
            progress_bar.set_message(chunk_id.clone());

            match self.attempt(&chunk.text()) {
                Ok(translation) => {
                    log::debug!("{}: {} tokens", chunk_id, translation.usage.total());
                    usage.add(translation.usage);
                    translations.push(translation.text);
                }
                Err(e) => {
                    log::warn!("{} failed: {}", chunk_id, e);
                    translations.push(format!("[TRANSLATION FAILED: {}]", e));
                    failed.push(i);
                }
            }
            progress_bar.inc(1);

            if i + 1 < chunks.len() && !self.request_delay.is_zero() {
                thread::sleep(self.request_delay);
            }
        }
        progress_bar.finish_and_clear();

        let mut still_failed = Vec::new();
        if !failed.is_empty() {
            log::warn!("{} chunk(s) failed, retrying", failed.len());
            if !self.retry_delay.is_zero() {
                thread::sleep(self.retry_delay);
            }

            for (n, &i) in failed.iter().enumerate() {
                let chunk_id = &summaries[i].chunk_id;
                match self.attempt(&chunks[i].text()) {
                    Ok(translation) => {
                        usage.add(translation.usage);
                        translations[i] = translation.text;
                        log::info!("{} recovered on retry", chunk_id);
                    }
                    Err(e) => {
                        log::warn!("{} still failing: {}", chunk_id, e);
                        still_failed.push(chunk_id.clone());
                    }
                }
                if n + 1 < failed.len() && !self.request_delay.is_zero() {
                    thread::sleep(self.request_delay);
                }
            }
        }

        log::info!(
            "token usage: input {}, output {}, thinking {}, total {}",
            usage.input_tokens,
            usage.output_tokens,
            usage.thinking_tokens,
            usage.total()
        );

        Ok(TranslationOutcome {
            chunks: summaries,
            translations,
            failed: still_failed,
            usage,
        })
    }
}
