//! Book loading: locate the input ebook and turn it into plain paragraphs.

use crate::error::{BookcastError, Result};
use epub::doc::EpubDoc;
use html2text::from_read;
use regex::Regex;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Wide enough that html2text never wraps a paragraph.
const HTML_RENDER_WIDTH: usize = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookFormat {
    Pdf,
    Epub,
}

impl BookFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(BookFormat::Pdf),
            "epub" => Some(BookFormat::Epub),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Chapter {
    pub title: String,
    pub paragraphs: Vec<String>,
    pub order: usize,
    pub word_count: usize,
}

/// First file in `dir` (by name) whose extension matches one of `extensions`.
pub fn find_input_file(dir: &Path, extensions: &[&str]) -> Result<PathBuf> {
    let no_match = || BookcastError::NoInputFile {
        dir: dir.to_path_buf(),
        extension: extensions
            .iter()
            .map(|e| format!(".{}", e))
            .collect::<Vec<_>>()
            .join("/"),
    };

    if !dir.is_dir() {
        return Err(no_match());
    }

    let mut candidates = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| extensions.iter().any(|x| e.eq_ignore_ascii_case(x)))
            .unwrap_or(false);
        if matches {
            candidates.push(path);
        }
    }

    candidates.sort();
    candidates.into_iter().next().ok_or_else(no_match)
}

pub struct BookLoader {
    title_regex: Regex,
    paragraph_break: Regex,
    whitespace: Regex,
}

impl Default for BookLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl BookLoader {
    pub fn new() -> Self {
        Self {
            title_regex: Regex::new(r"<h[1-3][^>]*>([^<]+)</h[1-3]>")
                .expect("literal pattern is valid"),
            paragraph_break: Regex::new(r"\n\s*\n").expect("literal pattern is valid"),
            whitespace: Regex::new(r"\s+").expect("literal pattern is valid"),
        }
    }

    pub fn load(&self, path: &Path) -> Result<Vec<Chapter>> {
        match BookFormat::from_path(path) {
            Some(BookFormat::Epub) => self.extract_epub(path),
            Some(BookFormat::Pdf) => self.extract_pdf(path),
            None => Err(BookcastError::extraction(path, "unsupported book format")),
        }
    }

    /// Chapters in spine (reading) order. Empty spine items are dropped.
    pub fn extract_epub(&self, path: &Path) -> Result<Vec<Chapter>> {
        let mut doc = EpubDoc::new(path).map_err(|e| BookcastError::extraction(path, e))?;
        let mut chapters = Vec::new();

        loop {
            let order = doc.get_current_page();
            if let Some((html, _mime)) = doc.get_current_str() {
                let title = self.extract_title(&html, order);
                let plain = from_read(html.as_bytes(), HTML_RENDER_WIDTH);
                let paragraphs = self.normalise_paragraphs(&plain);

                if !paragraphs.is_empty() {
                    let word_count = paragraphs
                        .iter()
                        .map(|p| p.split_whitespace().count())
                        .sum();
                    chapters.push(Chapter {
                        title,
                        paragraphs,
                        order,
                        word_count,
                    });
                }
            }
            if !doc.go_next() {
                break;
            }
        }

        log::debug!("extracted {} chapters from {}", chapters.len(), path.display());
        Ok(chapters)
    }

    fn extract_title(&self, html: &str, order: usize) -> String {
        self.title_regex
            .captures(html)
            .and_then(|c| c.get(1))
            .map(|m| from_read(m.as_str().as_bytes(), HTML_RENDER_WIDTH).trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| format!("Chapter {}", order + 1))
    }

    /// One chapter per page.
    pub fn extract_pdf(&self, path: &Path) -> Result<Vec<Chapter>> {
        let pages = pdf_extract::extract_text_by_pages(path)
            .map_err(|e| BookcastError::extraction(path, e))?;

        let chapters: Vec<Chapter> = pages
            .iter()
            .enumerate()
            .filter_map(|(order, page)| {
                let paragraphs = self.reconstruct_paragraphs(page);
                if paragraphs.is_empty() {
                    return None;
                }
                let word_count = paragraphs
                    .iter()
                    .map(|p| p.split_whitespace().count())
                    .sum();
                Some(Chapter {
                    title: format!("Page {}", order + 1),
                    paragraphs,
                    order,
                    word_count,
                })
            })
            .collect();

        log::debug!("extracted {} pages from {}", chapters.len(), path.display());
        Ok(chapters)
    }

    fn normalise_paragraphs(&self, text: &str) -> Vec<String> {
        self.paragraph_break
            .split(text.trim())
            .map(|p| self.whitespace.replace_all(p.trim(), " ").to_string())
            .filter(|p| !p.is_empty())
            .collect()
    }

    /// PDF text rarely carries blank lines between paragraphs. When a page has
    /// none, a line that starts uppercase right after a line ending in
    /// terminal punctuation opens a new paragraph.
    pub fn reconstruct_paragraphs(&self, page: &str) -> Vec<String> {
        let page = page.trim();
        if page.is_empty() {
            return Vec::new();
        }

        let blocks = self.normalise_paragraphs(page);
        if blocks.len() > 1 {
            return blocks;
        }

        let mut paragraphs = Vec::new();
        let mut current: Vec<&str> = Vec::new();

        for line in page.lines().map(str::trim) {
            if line.is_empty() {
                if !current.is_empty() {
                    paragraphs.push(current.join(" "));
                    current.clear();
                }
                continue;
            }

            let starts_upper = line.chars().next().is_some_and(char::is_uppercase);
            let previous_closed = current
                .last()
                .is_some_and(|prev| prev.ends_with(['.', '!', '?']));

            if starts_upper && previous_closed {
                paragraphs.push(current.join(" "));
                current.clear();
            }
            current.push(line);
        }
        if !current.is_empty() {
            paragraphs.push(current.join(" "));
        }

        paragraphs
            .into_iter()
            .map(|p| self.whitespace.replace_all(p.trim(), " ").to_string())
            .filter(|p| !p.is_empty())
            .collect()
    }

    /// Write the book as `<stem>.txt` under `text_dir`, paragraphs separated by blank lines.
    pub fn convert_to_text(&self, book: &Path, text_dir: &Path) -> Result<PathBuf> {
        let chapters = self.load(book)?;
        fs::create_dir_all(text_dir)?;

        let stem = book
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "book".to_string());
        let output_path = text_dir.join(format!("{}.txt", stem));

        let mut out = BufWriter::new(fs::File::create(&output_path)?);
        for paragraph in chapters.iter().flat_map(|c| c.paragraphs.iter()) {
            out.write_all(paragraph.as_bytes())?;
            out.write_all(b"\n\n")?;
        }
        out.flush()?;

        let words: usize = chapters.iter().map(|c| c.word_count).sum();
        log::info!(
            "converted {} ({} sections, {} words) to {}",
            book.display(),
            chapters.len(),
            words,
            output_path.display()
        );
        Ok(output_path)
    }
}

/// Replace characters that are not allowed in file names.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c => c,
        })
        .collect()
}
