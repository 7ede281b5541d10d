//! Speech synthesis through locally installed TTS engines.

use crate::config::SpeechConfig;
use crate::error::{BookcastError, Result};
use crate::planner::{ChunkBudget, ChunkPlanner};
use crate::text::{skip_lines, TextProcessor};
use indicatif::{ProgressBar, ProgressStyle};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command as ProcessCommand, Stdio};

pub trait Synthesizer {
    /// Render `text` as a WAV file at `output`.
    fn synthesize(&self, text: &str, output: &Path) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechBackend {
    EspeakNg,
    Espeak,
    Festival,
}

impl SpeechBackend {
    const ALL: [SpeechBackend; 3] = [
        SpeechBackend::EspeakNg,
        SpeechBackend::Espeak,
        SpeechBackend::Festival,
    ];

    pub fn binary(&self) -> &'static str {
        match self {
            SpeechBackend::EspeakNg => "espeak-ng",
            SpeechBackend::Espeak => "espeak",
            SpeechBackend::Festival => "text2wave",
        }
    }
}

/// True if `program` resolves on PATH.
pub fn command_available(program: &str) -> bool {
    ProcessCommand::new("which")
        .arg(program)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

pub struct SpeechEngine {
    backend: SpeechBackend,
    language: String,
    voice_speed: f32,
    voice_pitch: f32,
    sample_rate: u32,
    cache_dir: Option<PathBuf>,
}

impl SpeechEngine {
    /// Pick the first installed backend. The cache directory is created when caching is on.
    pub fn detect(config: &SpeechConfig, cache_dir: &Path) -> Result<Self> {
        let backend = SpeechBackend::ALL
            .into_iter()
            .find(|b| command_available(b.binary()))
            .ok_or_else(|| {
                BookcastError::Synthesis(
                    "no TTS engine found, install espeak-ng, espeak or festival".to_string(),
                )
            })?;
        log::info!("using {} for speech synthesis", backend.binary());
        Self::with_backend(backend, config, cache_dir)
    }

    pub fn with_backend(
        backend: SpeechBackend,
        config: &SpeechConfig,
        cache_dir: &Path,
    ) -> Result<Self> {
        let cache_dir = if config.cache_enabled {
            fs::create_dir_all(cache_dir)?;
            Some(cache_dir.to_path_buf())
        } else {
            None
        };

        Ok(Self {
            backend,
            language: config.language.clone(),
            voice_speed: config.voice_speed,
            voice_pitch: config.voice_pitch,
            sample_rate: config.sample_rate,
            cache_dir,
        })
    }

    pub fn cache_key(&self, text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.backend.binary().as_bytes());
        hasher.update(self.language.as_bytes());
        hasher.update(text.as_bytes());
        hasher.update(self.voice_speed.to_be_bytes());
        hasher.update(self.voice_pitch.to_be_bytes());
        hasher.update(self.sample_rate.to_be_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn command(&self, wav_path: &Path) -> ProcessCommand {
        match self.backend {
            SpeechBackend::EspeakNg | SpeechBackend::Espeak => {
                let mut cmd = ProcessCommand::new(self.backend.binary());
                cmd.arg("-v")
                    .arg(&self.language)
                    .arg("-s")
                    .arg(format!("{}", (self.voice_speed * 175.0) as u32))
                    .arg("-p")
                    .arg(format!("{}", (self.voice_pitch * 50.0).min(99.0) as u32))
                    .arg("-a")
                    .arg("100")
                    .arg("--stdin")
                    .arg("-w")
                    .arg(wav_path);
                cmd
            }
            SpeechBackend::Festival => {
                let mut cmd = ProcessCommand::new("text2wave");
                cmd.arg("-F")
                    .arg(self.sample_rate.to_string())
                    .arg("-o")
                    .arg(wav_path);
                cmd
            }
        }
    }

    /// Text goes through stdin so long chunks never hit argument length limits.
    fn run(&self, text: &str, wav_path: &Path) -> Result<()> {
        let mut child = self
            .command(wav_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes())?;
        }

        let status = child.wait()?;
        let written = fs::metadata(wav_path).map(|m| m.len()).unwrap_or(0);
        if !status.success() || written == 0 {
            return Err(BookcastError::Synthesis(format!(
                "{} exited with {}",
                self.backend.binary(),
                status
            )));
        }
        Ok(())
    }
}

impl Synthesizer for SpeechEngine {
    fn synthesize(&self, text: &str, output: &Path) -> Result<()> {
        let cached = self
            .cache_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.wav", self.cache_key(text))));

        if let Some(path) = cached.as_ref().filter(|p| p.exists()) {
            log::debug!("cache hit {}", path.display());
            fs::copy(path, output)?;
            return Ok(());
        }

        // render into a temp file next to the output so a failed run leaves nothing behind
        let parent = output.parent().unwrap_or_else(|| Path::new("."));
        let temp_wav = tempfile::Builder::new()
            .suffix(".wav")
            .tempfile_in(parent)?
            .into_temp_path();
        self.run(text, &temp_wav)?;

        if let Some(path) = cached {
            fs::copy(&temp_wav, path)?;
        }
        temp_wav
            .persist(output)
            .map_err(|e| BookcastError::Io(e.error))?;
        Ok(())
    }
}

/// Narrate `text` into `chunk_{n}.wav` files under `audio_dir`, returning the
/// files written in order. A chunk whose synthesis fails is logged and skipped.
pub fn narrate<S: Synthesizer>(
    text: &str,
    config: &SpeechConfig,
    synthesizer: &S,
    audio_dir: &Path,
) -> Result<Vec<PathBuf>> {
    // the joining space is counted in each unit, hence the +1
    let max_chars = ChunkBudget::new(config.chunk_chars)?.get();
    let budget = config
        .chunk_chars
        .checked_add(1)
        .ok_or_else(|| {
            BookcastError::invalid_config(format!(
                "chunk_chars {} is too large",
                config.chunk_chars
            ))
        })
        .and_then(ChunkBudget::new)?;
    fs::create_dir_all(audio_dir)?;

    let processor = TextProcessor::new();
    let text = skip_lines(text, config.skip_lines);
    let prepared = processor
        .split_paragraphs(&text)
        .iter()
        .map(|p| {
            if config.preprocessing_aggressive {
                processor.prepare_for_speech(p)
            } else {
                processor.clean_text(p)
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    let chunks = ChunkPlanner::new(budget).plan(processor.sentence_units(&prepared, max_chars));
    log::info!("narrating {} chunks of up to {} characters", chunks.len(), config.chunk_chars);

    let progress_bar = ProgressBar::new(chunks.len() as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>7}/{len:7} {msg}")
    {
        progress_bar.set_style(style.progress_chars("█▉▊▋▌▍▎▏  "));
    }

    let mut written = Vec::new();
    for (i, chunk) in chunks.iter().enumerate() {
        progress_bar.inc(1);
        let chunk_text = chunk.join(" ");
        let length = chunk_text.trim().chars().count();
        if length < config.min_chunk_chars {
            log::info!("skipping chunk {}: too short ({} chars)", i + 1, length);
            continue;
        }

        let output_path = audio_dir.join(format!("chunk_{}.wav", i + 1));
        match synthesizer.synthesize(&chunk_text, &output_path) {
            Ok(()) => written.push(output_path),
            Err(e) => {
                let preview: String = chunk_text.chars().take(100).collect();
                log::warn!("chunk {} failed: {} (starts with: {}...)", i + 1, e, preview);
            }
        }
    }
    progress_bar.finish_and_clear();

    Ok(written)
}
