//! Merging narrated chunks into longer parts, and final encoding.

use crate::config::AudioFormat;
use crate::error::{BookcastError, Result};
use crate::tts::command_available;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use serde::Serialize;
use std::cmp::Ordering;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::iter::Peekable;
use std::path::{Path, PathBuf};
use std::process::Command as ProcessCommand;
use std::str::Chars;

/// Compare names so that `chunk_2` sorts before `chunk_10`.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut a = a.chars().peekable();
    let mut b = b.chars().peekable();

    loop {
        match (a.peek().copied(), b.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let na = take_number(&mut a);
                let nb = take_number(&mut b);
                let na_trim = na.trim_start_matches('0');
                let nb_trim = nb.trim_start_matches('0');
                let ord = na_trim
                    .len()
                    .cmp(&nb_trim.len())
                    .then_with(|| na_trim.cmp(nb_trim));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(x), Some(y)) => {
                let ord = x.to_lowercase().cmp(y.to_lowercase());
                if ord != Ordering::Equal {
                    return ord;
                }
                a.next();
                b.next();
            }
        }
    }
}

fn take_number(it: &mut Peekable<Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = it.peek().copied().filter(char::is_ascii_digit) {
        digits.push(c);
        it.next();
    }
    digits
}

/// `.wav` files directly under `dir`, in natural order.
pub fn list_wav_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_wav = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("wav"))
            .unwrap_or(false);
        if path.is_file() && is_wav {
            files.push(path);
        }
    }

    files.sort_by(|a, b| {
        let name = |p: &PathBuf| {
            p.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        };
        natural_cmp(&name(a), &name(b))
    });
    Ok(files)
}

#[derive(Debug, Clone, Serialize)]
pub struct MergedPart {
    pub path: PathBuf,
    pub minutes: f64,
    pub sources: Vec<String>,
}

struct OpenPart {
    writer: WavWriter<BufWriter<File>>,
    path: PathBuf,
    spec: WavSpec,
    frames: u64,
    sources: Vec<String>,
}

impl OpenPart {
    fn minutes(&self) -> f64 {
        self.frames as f64 / self.spec.sample_rate as f64 / 60.0
    }

    fn finish(self) -> Result<MergedPart> {
        let minutes = self.minutes();
        self.writer.finalize()?;
        log::info!(
            "saved {} ({:.2} minutes, {} chunks)",
            self.path.display(),
            minutes,
            self.sources.len()
        );
        Ok(MergedPart {
            path: self.path,
            minutes,
            sources: self.sources,
        })
    }
}

/// Decoded samples of one chunk.
enum Samples {
    Int(Vec<i32>),
    Float(Vec<f32>),
}

impl Samples {
    fn decode(reader: WavReader<BufReader<File>>) -> hound::Result<Self> {
        match reader.spec().sample_format {
            SampleFormat::Int => reader
                .into_samples::<i32>()
                .collect::<hound::Result<_>>()
                .map(Samples::Int),
            SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<hound::Result<_>>()
                .map(Samples::Float),
        }
    }

    fn len(&self) -> usize {
        match self {
            Samples::Int(values) => values.len(),
            Samples::Float(values) => values.len(),
        }
    }
}

/// Concatenates WAV chunks into parts of roughly `target_minutes` each.
pub struct AudioMerger {
    target_minutes: f64,
}

impl AudioMerger {
    pub fn new(target_minutes: f64) -> Result<Self> {
        if !(target_minutes.is_finite() && target_minutes > 0.0) {
            return Err(BookcastError::invalid_config(format!(
                "merge target must be positive, got {} minutes",
                target_minutes
            )));
        }
        Ok(Self { target_minutes })
    }

    fn write(part: &mut OpenPart, samples: &Samples) -> Result<()> {
        match samples {
            Samples::Int(values) => {
                for &sample in values {
                    part.writer.write_sample(sample)?;
                }
            }
            Samples::Float(values) => {
                for &sample in values {
                    part.writer.write_sample(sample)?;
                }
            }
        }
        Ok(())
    }

    /// Merge every chunk in `input_dir` into `merged_part_NNN.wav` files.
    /// A part is closed once it reaches the target duration; unreadable or
    /// format-mismatched chunks are skipped.
    pub fn merge(&self, input_dir: &Path, output_dir: &Path) -> Result<Vec<MergedPart>> {
        let files = list_wav_files(input_dir)?;
        if files.is_empty() {
            log::warn!("no .wav files found in {}", input_dir.display());
            return Ok(Vec::new());
        }
        fs::create_dir_all(output_dir)?;
        log::info!(
            "merging {} chunks into ~{} minute parts",
            files.len(),
            self.target_minutes
        );

        let mut parts = Vec::new();
        let mut current: Option<OpenPart> = None;

        for file in &files {
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            let reader = match WavReader::open(file) {
                Ok(reader) => reader,
                Err(e) => {
                    log::warn!("skipping {}: {}", name, e);
                    continue;
                }
            };
            let spec = reader.spec();
            // decode fully first so a truncated chunk never leaves samples in a part
            let samples = match Samples::decode(reader) {
                Ok(samples) => samples,
                Err(e) => {
                    log::warn!("skipping {}: {}", name, e);
                    continue;
                }
            };
            let frames = (samples.len() / spec.channels.max(1) as usize) as u64;

            if let Some(part) = current.as_ref().filter(|p| p.spec != spec) {
                log::warn!(
                    "skipping {}: format {:?} differs from part format {:?}",
                    name,
                    spec,
                    part.spec
                );
                continue;
            }

            if current.is_none() {
                let path = output_dir.join(format!("merged_part_{:03}.wav", parts.len() + 1));
                current = Some(OpenPart {
                    writer: WavWriter::create(&path, spec)?,
                    path,
                    spec,
                    frames: 0,
                    sources: Vec::new(),
                });
            }

            let Some(part) = current.as_mut() else {
                continue;
            };
            Self::write(part, &samples)?;
            part.frames += frames;
            part.sources.push(name);

            if part.minutes() >= self.target_minutes {
                if let Some(done) = current.take() {
                    parts.push(done.finish()?);
                }
            }
        }

        if let Some(part) = current.take() {
            parts.push(part.finish()?);
        }

        Ok(parts)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DurationEntry {
    pub file: String,
    pub minutes: f64,
    pub size_mb: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DurationReport {
    pub entries: Vec<DurationEntry>,
    pub total_minutes: f64,
}

impl DurationReport {
    pub fn average_minutes(&self) -> f64 {
        if self.entries.is_empty() {
            0.0
        } else {
            self.total_minutes / self.entries.len() as f64
        }
    }
}

/// Duration of every `merged_part_*.wav` in `dir`.
pub fn duration_report(dir: &Path) -> Result<DurationReport> {
    let mut entries = Vec::new();
    for path in list_wav_files(dir)? {
        let file = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if !file.starts_with("merged_part_") {
            continue;
        }
        let reader = match WavReader::open(&path) {
            Ok(reader) => reader,
            Err(e) => {
                log::warn!("cannot read {}: {}", file, e);
                continue;
            }
        };
        let minutes = reader.duration() as f64 / reader.spec().sample_rate as f64 / 60.0;
        let size_mb = fs::metadata(&path)?.len() as f64 / (1024.0 * 1024.0);
        entries.push(DurationEntry {
            file,
            minutes,
            size_mb,
        });
    }

    let total_minutes = entries.iter().map(|e| e.minutes).sum();
    Ok(DurationReport {
        entries,
        total_minutes,
    })
}

/// Write an M3U playlist listing `files` by name, in the given order.
pub fn write_playlist(dir: &Path, files: &[PathBuf]) -> Result<PathBuf> {
    let playlist_path = dir.join("audiobook.m3u");
    let mut playlist = BufWriter::new(File::create(&playlist_path)?);

    writeln!(playlist, "#EXTM3U")?;
    for file in files {
        if let Some(name) = file.file_name() {
            writeln!(playlist, "{}", name.to_string_lossy())?;
        }
    }
    playlist.flush()?;
    Ok(playlist_path)
}

/// Re-encodes merged WAV parts with whichever external encoder is installed.
pub struct Encoder {
    format: AudioFormat,
    quality: f32,
}

impl Encoder {
    pub fn new(format: AudioFormat, quality: f32) -> Self {
        Self { format, quality }
    }

    /// Encoders tried in order for a format: the dedicated tool, then ffmpeg.
    fn candidates(&self) -> &'static [&'static str] {
        match self.format {
            AudioFormat::Wav => &[],
            AudioFormat::Vorbis => &["oggenc", "ffmpeg"],
            AudioFormat::Flac => &["flac", "ffmpeg"],
            AudioFormat::Mp3 => &["lame", "ffmpeg"],
        }
    }

    pub fn command(&self, encoder: &str, input: &Path, output: &Path) -> ProcessCommand {
        let vorbis_q = format!("{}", (self.quality * 10.0).round() as u32);
        let mp3_v = format!("{}", (9.0 - self.quality * 9.0).round() as u32);

        let mut cmd = ProcessCommand::new(encoder);
        match (encoder, self.format) {
            ("oggenc", _) => {
                cmd.arg("-q").arg(vorbis_q).arg("-o").arg(output).arg(input);
            }
            ("flac", _) => {
                cmd.arg("--compression-level-8").arg("-f").arg("-o").arg(output).arg(input);
            }
            ("lame", _) => {
                cmd.arg("-V").arg(mp3_v).arg(input).arg(output);
            }
            (_, format) => {
                cmd.arg("-i").arg(input);
                match format {
                    AudioFormat::Vorbis => cmd.args(["-c:a", "libvorbis", "-q:a"]).arg(vorbis_q),
                    AudioFormat::Flac => cmd.args(["-c:a", "flac", "-compression_level", "8"]),
                    AudioFormat::Mp3 => cmd.args(["-c:a", "libmp3lame", "-q:a"]).arg(mp3_v),
                    AudioFormat::Wav => cmd.args(["-c:a", "pcm_s16le"]),
                };
                cmd.arg("-y").arg(output);
            }
        }
        cmd
    }

    /// Encode `input` next to itself, returning the new path. WAV is returned unchanged.
    pub fn encode(&self, input: &Path) -> Result<PathBuf> {
        if self.format == AudioFormat::Wav {
            return Ok(input.to_path_buf());
        }
        let output = input.with_extension(self.format.extension());

        let encoder = self
            .candidates()
            .iter()
            .find(|e| command_available(e))
            .ok_or_else(|| {
                BookcastError::Synthesis(format!(
                    "no {} encoder found, install one of: {}",
                    self.format.extension(),
                    self.candidates().join(", ")
                ))
            })?;

        let result = self.command(encoder, input, &output).output()?;
        if !result.status.success() {
            return Err(BookcastError::Synthesis(format!(
                "{} encoding failed with {}",
                encoder, result.status
            )));
        }
        Ok(output)
    }
}
