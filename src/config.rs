use crate::error::{BookcastError, Result};
use crate::planner::ChunkBudget;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Wire format a translation model is reached through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Gemini,
    OpenAi,
    DeepSeek,
    Alibaba,
}

impl Provider {
    /// Environment variables searched for an API key, in order.
    pub fn api_key_vars(&self) -> &'static [&'static str] {
        match self {
            Provider::Gemini => &["GEMINI_API_KEY"],
            Provider::OpenAi => &["OPENAI_API_KEY"],
            Provider::DeepSeek => &["DEEPSEEK_API_KEY"],
            Provider::Alibaba => &[
                "DASHSCOPE_API_KEY",
                "ALIBABA_API_KEY",
                "ALIBABA_CLOUD_API_KEY",
            ],
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Provider::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            Provider::OpenAi => "https://api.openai.com/v1",
            Provider::DeepSeek => "https://api.deepseek.com/v1",
            Provider::Alibaba => "https://dashscope-intl.aliyuncs.com/compatible-mode/v1",
        }
    }
}

/// Limits and prices for one translation model. Prices are USD per million tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub provider: Provider,
    pub max_output_tokens: u64,
    pub output_input_token_ratio: f64,
    #[serde(default)]
    pub thinking_input_ratio: Option<f64>,
    pub input_price: f64,
    pub output_price: f64,
    #[serde(default)]
    pub thinking_price: f64,
}

impl ModelInfo {
    pub fn input_budget(&self) -> Result<ChunkBudget> {
        ChunkBudget::from_model(self.max_output_tokens, self.output_input_token_ratio)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Wav,
    Vorbis,
    Flac,
    Mp3,
}

impl AudioFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Vorbis => "ogg",
            AudioFormat::Flac => "flac",
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "wav" => Some(AudioFormat::Wav),
            "vorbis" | "ogg" => Some(AudioFormat::Vorbis),
            "flac" => Some(AudioFormat::Flac),
            "mp3" => Some(AudioFormat::Mp3),
            _ => None,
        }
    }
}

/// Working folders for every pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Folders {
    pub input_dir: PathBuf,
    pub text_dir: PathBuf,
    pub segmented_dir: PathBuf,
    pub translated_dir: PathBuf,
    pub pdf_dir: PathBuf,
    pub audio_dir: PathBuf,
    pub merged_dir: PathBuf,
    pub cache_dir: PathBuf,
}

impl Default for Folders {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("input_book"),
            text_dir: PathBuf::from("text_output"),
            segmented_dir: PathBuf::from("segmented_text"),
            translated_dir: PathBuf::from("translated_text"),
            pdf_dir: PathBuf::from("pdf_output"),
            audio_dir: PathBuf::from("audio_output"),
            merged_dir: PathBuf::from("merged_audio_output"),
            cache_dir: PathBuf::from("tts_cache"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    pub source_language: String,
    pub target_language: String,
    pub model: String,
    /// Overrides the provider's default endpoint.
    pub api_base_url: Option<String>,
    /// Overrides the provider's API key variables.
    pub api_key_env: Option<String>,
    /// Thinking token budget; -1 lets the model decide.
    pub thinking_budget: i64,
    pub request_delay_secs: u64,
    pub retry_delay_secs: u64,
    pub request_timeout_secs: u64,
    /// Optional prompt template file with `{source_language}`,
    /// `{target_language}` and `{text}` placeholders.
    pub prompt_file: Option<PathBuf>,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            source_language: "English".to_string(),
            target_language: "Italian".to_string(),
            model: "gemini-2.5-flash".to_string(),
            api_base_url: None,
            api_key_env: None,
            thinking_budget: -1,
            request_delay_secs: 10,
            retry_delay_secs: 60,
            request_timeout_secs: 300,
            prompt_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub language: String,
    pub voice_speed: f32,
    pub voice_pitch: f32,
    pub sample_rate: u32,
    /// Leading lines dropped before narration (front matter, copyright page).
    pub skip_lines: usize,
    pub chunk_chars: i64,
    pub min_chunk_chars: usize,
    pub cache_enabled: bool,
    pub preprocessing_aggressive: bool,
    pub output_format: AudioFormat,
    pub quality: f32,
    pub target_minutes: f64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            voice_speed: 1.0,
            voice_pitch: 1.0,
            sample_rate: 22050,
            skip_lines: 0,
            chunk_chars: 5000,
            min_chunk_chars: 20,
            cache_enabled: true,
            preprocessing_aggressive: true,
            output_format: AudioFormat::Wav,
            quality: 0.7,
            target_minutes: 30.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub folders: Folders,
    pub translation: TranslationConfig,
    pub speech: SpeechConfig,
    pub models: BTreeMap<String, ModelInfo>,
    pub max_workers: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            folders: Folders::default(),
            translation: TranslationConfig::default(),
            speech: SpeechConfig::default(),
            models: default_models(),
            max_workers: num_cpus::get(),
        }
    }
}

fn default_models() -> BTreeMap<String, ModelInfo> {
    let mut models = BTreeMap::new();
    models.insert(
        "gemini-2.5-flash".to_string(),
        ModelInfo {
            provider: Provider::Gemini,
            max_output_tokens: 65_536,
            output_input_token_ratio: 1.22,
            thinking_input_ratio: Some(3.6),
            input_price: 0.30,
            output_price: 2.50,
            thinking_price: 0.30,
        },
    );
    models.insert(
        "deepseek-chat".to_string(),
        ModelInfo {
            provider: Provider::DeepSeek,
            max_output_tokens: 8_192,
            output_input_token_ratio: 1.35,
            thinking_input_ratio: None,
            input_price: 0.28,
            output_price: 0.42,
            thinking_price: 0.0,
        },
    );
    models.insert(
        "gpt-4o-mini".to_string(),
        ModelInfo {
            provider: Provider::OpenAi,
            max_output_tokens: 16_384,
            output_input_token_ratio: 1.25,
            thinking_input_ratio: None,
            input_price: 0.15,
            output_price: 0.60,
            thinking_price: 0.0,
        },
    );
    models
}

impl Config {
    /// Load a JSON config file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let config: Config = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    pub fn model_info(&self, name: &str) -> Result<&ModelInfo> {
        self.models.get(name).ok_or_else(|| {
            let available = self.models.keys().cloned().collect::<Vec<_>>().join(", ");
            BookcastError::invalid_config(format!(
                "model '{}' not configured. Available models: {}",
                name, available
            ))
        })
    }

    pub fn validate(&self) -> Result<()> {
        ChunkBudget::new(self.speech.chunk_chars)?;

        if !(self.speech.target_minutes.is_finite() && self.speech.target_minutes > 0.0) {
            return Err(BookcastError::invalid_config(format!(
                "merge target must be positive, got {} minutes",
                self.speech.target_minutes
            )));
        }
        if !(0.0..=1.0).contains(&self.speech.quality) {
            return Err(BookcastError::invalid_config(format!(
                "audio quality must be within 0.0-1.0, got {}",
                self.speech.quality
            )));
        }
        if self.speech.voice_speed <= 0.0 {
            return Err(BookcastError::invalid_config("voice speed must be positive"));
        }
        if self.max_workers == 0 {
            return Err(BookcastError::invalid_config("max_workers must be at least 1"));
        }

        for (name, info) in &self.models {
            info.input_budget().map_err(|e| {
                BookcastError::invalid_config(format!("model '{}': {}", name, e))
            })?;
        }
        self.model_info(&self.translation.model)?;

        Ok(())
    }
}
