//! Plain-text to PDF rendering for translated books.

use crate::error::{BookcastError, Result};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use std::path::Path;

const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;
const MARGIN: f32 = 72.0;
/// Average Helvetica glyph width as a fraction of the font size.
const AVG_GLYPH_WIDTH: f32 = 0.52;

/// Map a char to its WinAnsiEncoding byte, `?` when it has none.
pub fn win_ansi_byte(c: char) -> u8 {
    match c {
        '\u{20}'..='\u{7e}' => c as u8,
        '\u{a0}'..='\u{ff}' => c as u32 as u8,
        '€' => 0x80,
        '‚' => 0x82,
        '„' => 0x84,
        '…' => 0x85,
        '‘' => 0x91,
        '’' => 0x92,
        '“' => 0x93,
        '”' => 0x94,
        '•' => 0x95,
        '–' => 0x96,
        '—' => 0x97,
        '\t' => b' ',
        _ => b'?',
    }
}

pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars().map(win_ansi_byte).collect()
}

/// Greedy word wrap to at most `width` chars per line. Longer words are hard-split.
pub fn wrap_line(line: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in line.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > width {
            if current_len > 0 {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let rest = word.split_off(width);
            lines.push(word.into_iter().collect());
            word = rest;
        }

        let needed = if current_len == 0 { word.len() } else { current_len + 1 + word.len() };
        if needed > width && current_len > 0 {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.extend(word.iter());
        current_len += word.len();
    }

    if current_len > 0 || lines.is_empty() {
        lines.push(current);
    }
    lines
}

pub struct PdfRenderer {
    font_size: f32,
    title_size: f32,
    leading: f32,
}

impl Default for PdfRenderer {
    fn default() -> Self {
        Self {
            font_size: 12.0,
            title_size: 24.0,
            leading: 16.0,
        }
    }
}

impl PdfRenderer {
    pub fn new(font_size: f32) -> Result<Self> {
        if !(font_size.is_finite() && font_size > 0.0) {
            return Err(BookcastError::invalid_config(format!(
                "font size must be positive, got {}",
                font_size
            )));
        }
        Ok(Self {
            font_size,
            title_size: font_size * 2.0,
            leading: font_size * 4.0 / 3.0,
        })
    }

    pub fn chars_per_line(&self) -> usize {
        ((PAGE_WIDTH - 2.0 * MARGIN) / (self.font_size * AVG_GLYPH_WIDTH)) as usize
    }

    pub fn lines_per_page(&self) -> usize {
        (((PAGE_HEIGHT - 2.0 * MARGIN) / self.leading) as usize).max(1)
    }

    /// Wrap paragraphs into page-sized groups of lines. Paragraphs are separated
    /// by a blank line that is dropped at the top of a page.
    pub fn paginate(&self, text: &str) -> Vec<Vec<String>> {
        let width = self.chars_per_line();
        let per_page = self.lines_per_page();

        let mut lines: Vec<String> = Vec::new();
        for paragraph in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
            if !lines.is_empty() {
                lines.push(String::new());
            }
            for line in paragraph.lines() {
                lines.extend(wrap_line(line, width));
            }
        }

        let mut pages: Vec<Vec<String>> = Vec::new();
        let mut page: Vec<String> = Vec::new();
        for line in lines {
            if page.is_empty() && line.is_empty() {
                continue;
            }
            page.push(line);
            if page.len() == per_page {
                pages.push(std::mem::take(&mut page));
            }
        }
        if !page.is_empty() {
            pages.push(page);
        }
        pages
    }

    fn title_operations(&self, title: &str) -> Vec<Operation> {
        let width = (title.chars().count() as f32 * self.title_size * AVG_GLYPH_WIDTH)
            .min(PAGE_WIDTH - 2.0 * MARGIN);
        let x = (PAGE_WIDTH - width) / 2.0;
        vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), self.title_size.into()]),
            Operation::new("Td", vec![x.into(), (PAGE_HEIGHT * 0.6).into()]),
            Operation::new("Tj", vec![Object::string_literal(encode_win_ansi(title))]),
            Operation::new("ET", vec![]),
        ]
    }

    fn body_operations(&self, lines: &[String]) -> Vec<Operation> {
        let mut ops = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), self.font_size.into()]),
            Operation::new("TL", vec![self.leading.into()]),
            Operation::new(
                "Td",
                vec![MARGIN.into(), (PAGE_HEIGHT - MARGIN - self.font_size).into()],
            ),
        ];
        for line in lines {
            ops.push(Operation::new("Tj", vec![Object::string_literal(encode_win_ansi(line))]));
            ops.push(Operation::new("T*", vec![]));
        }
        ops.push(Operation::new("ET", vec![]));
        ops
    }

    fn add_page(
        doc: &mut Document,
        pages_id: ObjectId,
        operations: Vec<Operation>,
    ) -> Result<ObjectId> {
        let content = Content { operations }
            .encode()
            .map_err(|e| BookcastError::Render(e.to_string()))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));
        Ok(doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        }))
    }

    /// Build the document in memory: a title page followed by the body text.
    pub fn build(&self, title: &str, text: &str) -> Result<Document> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        });

        let mut kids: Vec<Object> = Vec::new();
        let title_page = Self::add_page(&mut doc, pages_id, self.title_operations(title))?;
        kids.push(title_page.into());
        for lines in self.paginate(text) {
            let page_id = Self::add_page(&mut doc, pages_id, self.body_operations(&lines))?;
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.compress();
        Ok(doc)
    }

    pub fn render(&self, title: &str, text: &str, output: &Path) -> Result<()> {
        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut doc = self.build(title, text)?;
        doc.save(output)
            .map_err(|e| BookcastError::Render(format!("{}: {}", output.display(), e)))?;
        log::info!("PDF written to {}", output.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_win_ansi_mapping() {
        assert_eq!(
            encode_win_ansi("Città “è” – ok"),
            b"Citt\xe0 \x93\xe8\x94 \x96 ok".to_vec()
        );
        assert_eq!(encode_win_ansi("日本"), b"??".to_vec());
    }

    #[test]
    fn test_wrap_line() {
        assert_eq!(
            wrap_line("the quick brown fox jumps", 10),
            vec!["the quick", "brown fox", "jumps"]
        );
        assert_eq!(wrap_line("abcdefghijkl", 5), vec!["abcde", "fghij", "kl"]);
        assert_eq!(wrap_line("", 5), vec![""]);
    }

    #[test]
    fn test_paginate_respects_page_height() {
        let renderer = PdfRenderer::default();
        let per_page = renderer.lines_per_page();
        let text = (0..per_page * 2)
            .map(|i| format!("Paragraph {}.", i))
            .collect::<Vec<_>>()
            .join("\n\n");

        let pages = renderer.paginate(&text);
        assert!(pages.iter().all(|p| p.len() <= per_page));
        assert!(pages.iter().all(|p| !p[0].is_empty()));
        let body: usize = pages.iter().flatten().filter(|l| !l.is_empty()).count();
        assert_eq!(body, per_page * 2);
    }

    #[test]
    fn test_render_writes_loadable_pdf() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("pdf").join("book_translated.pdf");
        let renderer = PdfRenderer::default();
        let text = "Primo paragrafo del libro.\n\nSecondo paragrafo, più lungo.";

        renderer.render("Il libro", text, &output).unwrap();

        let doc = Document::load(&output).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }

    #[test]
    fn test_rejects_bad_font_size() {
        assert!(PdfRenderer::new(0.0).is_err());
        assert!(PdfRenderer::new(f32::NAN).is_err());
        assert!(PdfRenderer::new(10.0).is_ok());
    }
}
