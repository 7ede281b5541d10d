//! Text cleanup and segmentation.
//!
//! Turns extracted book text into the paragraph/sentence structure the
//! planner consumes. The segmented form is also written to disk as JSON so a
//! translation run can be resumed or estimated without re-extracting the book.

use crate::planner::{SizeMeasure, TextUnit};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// One paragraph of the segmented book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paragraph {
    pub par_id: usize,
    pub sentences: Vec<String>,
    /// Word and punctuation count per sentence.
    pub token_counts: Vec<usize>,
}

impl Paragraph {
    pub fn text(&self) -> String {
        self.sentences.join(" ")
    }
}

pub struct TextProcessor {
    cleanup_regex: Vec<(Regex, &'static str)>,
    whitespace: Regex,
    paragraph_break: Regex,
    sentence_end: Regex,
    word_or_punct: Regex,
    hyphenation: Regex,
    sentence_spacing: Regex,
    abbreviations: Vec<(Regex, &'static str)>,
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("literal pattern is valid")
}

impl Default for TextProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl TextProcessor {
    pub fn new() -> Self {
        let cleanup_patterns = vec![
            // HTML entities left over from EPUB conversion
            (compile(r"&[a-zA-Z0-9#]+;"), " "),
            (compile(r"[\u{201C}\u{201D}\u{2018}\u{2019}`]"), "\""),
            (compile(r"[\u{2013}\u{2014}]"), "-"),
            (compile(r"\.{3,}"), "..."),
            (compile(r"[ \t]+([,.!?;:])"), "$1"),
        ];

        let abbreviations = [
            ("Mr.", "Mister"),
            ("Mrs.", "Missus"),
            ("Dr.", "Doctor"),
            ("Prof.", "Professor"),
            ("St.", "Saint"),
            ("vs.", "versus"),
            ("etc.", "etcetera"),
            ("i.e.", "that is"),
            ("e.g.", "for example"),
        ]
        .into_iter()
        .map(|(abbrev, expansion)| {
            (
                compile(&format!(r"\b{}(\s|$)", regex::escape(abbrev))),
                expansion,
            )
        })
        .collect();

        Self {
            cleanup_regex: cleanup_patterns,
            whitespace: compile(r"\s+"),
            paragraph_break: compile(r"\n[ \t]*\n"),
            sentence_end: compile(r#"[.!?]+["')\]]*\s+"#),
            word_or_punct: compile(r"\w+|[^\w\s]"),
            hyphenation: compile(r"(\w+)-[ \t]*\n[ \t]*(\w+)"),
            sentence_spacing: compile(r"([.!?])([A-Z])"),
            abbreviations,
        }
    }

    /// Collapse all whitespace runs (newlines included) and drop control characters.
    pub fn clean_text(&self, text: &str) -> String {
        let text = text.replace('\t', " ");
        let collapsed = self.whitespace.replace_all(&text, " ");
        collapsed
            .chars()
            .filter(|c| !c.is_control())
            .collect::<String>()
            .trim()
            .to_string()
    }

    /// Extra normalisation that helps speech engines read the text aloud.
    pub fn prepare_for_speech(&self, text: &str) -> String {
        let mut cleaned = self.hyphenation.replace_all(text, "$1$2").to_string();

        for (regex, replacement) in &self.cleanup_regex {
            cleaned = regex.replace_all(&cleaned, *replacement).to_string();
        }
        for (regex, expansion) in &self.abbreviations {
            cleaned = regex
                .replace_all(&cleaned, format!("{}$1", expansion).as_str())
                .to_string();
        }
        cleaned = self.sentence_spacing.replace_all(&cleaned, "$1 $2").to_string();

        self.clean_text(&cleaned)
    }

    /// Split on blank lines, normalising whitespace inside each paragraph.
    pub fn split_paragraphs(&self, text: &str) -> Vec<String> {
        let text = text.replace("\r\n", "\n");
        self.paragraph_break
            .split(&text)
            .map(|p| self.whitespace.replace_all(p.trim(), " ").to_string())
            .filter(|p| !p.is_empty())
            .collect()
    }

    /// Sentence boundaries sit after terminal punctuation that is followed by
    /// whitespace and then an uppercase letter, digit or opening quote.
    pub fn split_sentences(&self, paragraph: &str) -> Vec<String> {
        let mut sentences = Vec::new();
        let mut start = 0;

        for m in self.sentence_end.find_iter(paragraph) {
            let next = paragraph[m.end()..].chars().next();
            let starts_sentence = matches!(
                next,
                Some(c) if c.is_uppercase() || c.is_ascii_digit() || c == '"' || c == '\u{201C}'
            );
            if !starts_sentence {
                continue;
            }
            let sentence = paragraph[start..m.end()].trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            start = m.end();
        }

        let tail = paragraph[start..].trim();
        if !tail.is_empty() {
            sentences.push(tail.to_string());
        }
        sentences
    }

    pub fn count_words(&self, sentence: &str) -> usize {
        self.word_or_punct.find_iter(sentence).count()
    }

    pub fn segment(&self, text: &str) -> Vec<Paragraph> {
        self.split_paragraphs(text)
            .into_iter()
            .enumerate()
            .map(|(par_id, paragraph)| {
                let sentences = self.split_sentences(&paragraph);
                let token_counts = sentences.iter().map(|s| self.count_words(s)).collect();
                Paragraph {
                    par_id,
                    sentences,
                    token_counts,
                }
            })
            .collect()
    }

    /// Sentence-level units for speech. Each unit's size includes the joining
    /// space, so a budget of `max_chars + 1` bounds the joined chunk length by `max_chars`.
    /// A sentence longer than `max_chars` is broken into word units; only a
    /// single word longer than that can still exceed the bound.
    pub fn sentence_units(&self, text: &str, max_chars: usize) -> Vec<TextUnit> {
        self.split_paragraphs(text)
            .iter()
            .flat_map(|p| self.split_sentences(p))
            .flat_map(|sentence| {
                if SizeMeasure::Chars.measure(&sentence) <= max_chars {
                    vec![sentence]
                } else {
                    log::debug!(
                        "sentence of {} chars split into words",
                        SizeMeasure::Chars.measure(&sentence)
                    );
                    sentence.split_whitespace().map(str::to_string).collect()
                }
            })
            .enumerate()
            .map(|(id, piece)| {
                let size = SizeMeasure::Chars.measure(&piece) + 1;
                TextUnit::new(id, piece, size)
            })
            .collect()
    }
}

/// Drop the first `n` lines, but only when the text is longer than that.
pub fn skip_lines(text: &str, n: usize) -> String {
    if n == 0 {
        return text.to_string();
    }
    let lines: Vec<&str> = text.split('\n').collect();
    if lines.len() > n {
        lines[n..].join("\n")
    } else {
        text.to_string()
    }
}
