//! Guideline file parser (PDF, Markdown, HTML, plain text)

use pulldown_cmark::{Event, Parser, TagEnd};
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::{FileType, SourceContent};

/// Text of one PDF page
#[derive(Debug, Clone)]
pub struct PageContent {
    /// 1-based page number
    pub page_number: u32,
    pub content: String,
}

/// Text extracted from a guideline file
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    /// File type
    pub file_type: FileType,
    /// Extracted text content
    pub content: String,
    /// Per-page text (PDF only); pages without text are omitted
    pub pages: Vec<PageContent>,
}

impl ParsedDocument {
    fn new(file_type: FileType, content: String) -> Self {
        Self {
            file_type,
            content,
            pages: Vec::new(),
        }
    }

    fn paged(file_type: FileType, pages: Vec<PageContent>) -> Self {
        let content = pages
            .iter()
            .map(|p| p.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        Self {
            file_type,
            content,
            pages,
        }
    }

    /// Text to chunk, with the page it came from when known
    pub fn sections(&self) -> Vec<(Option<u32>, &str)> {
        if self.pages.is_empty() {
            vec![(None, self.content.as_str())]
        } else {
            self.pages
                .iter()
                .map(|p| (Some(p.page_number), p.content.as_str()))
                .collect()
        }
    }
}

/// Multi-format guideline parser
pub struct DocumentParser;

impl DocumentParser {
    /// Parse raw file bytes; the filename extension selects the format
    pub fn parse(filename: &str, data: &[u8]) -> Result<ParsedDocument> {
        let file_type = FileType::from_path(filename);

        match file_type {
            FileType::Pdf => Self::parse_pdf(filename, data),
            FileType::Markdown => Ok(Self::parse_markdown(data)),
            FileType::Html => Self::parse_html(data),
            FileType::Txt => Ok(ParsedDocument::new(
                FileType::Txt,
                String::from_utf8_lossy(data).into_owned(),
            )),
            FileType::Unknown => Err(Error::UnsupportedFileType(filename.to_string())),
        }
    }

    /// Read and parse a file on disk. Parsing runs on the blocking pool.
    pub async fn parse_path(path: &Path) -> Result<ParsedDocument> {
        let filename = path.to_string_lossy().to_string();
        if !FileType::from_path(path).is_supported() {
            return Err(Error::UnsupportedFileType(filename));
        }

        let data = tokio::fs::read(path).await?;
        tokio::task::spawn_blocking(move || Self::parse(&filename, &data))
            .await
            .map_err(|e| Error::internal(format!("parser task failed: {}", e)))?
    }

    /// Parse any document source; inline text is treated as plain text
    pub async fn extract(content: &SourceContent) -> Result<ParsedDocument> {
        let parsed = match content {
            SourceContent::Text(text) => ParsedDocument::new(FileType::Txt, text.clone()),
            SourceContent::Path(path) => Self::parse_path(path).await?,
            SourceContent::Bytes { filename, data } => {
                let filename = filename.clone();
                let data = data.clone();
                tokio::task::spawn_blocking(move || Self::parse(&filename, &data))
                    .await
                    .map_err(|e| Error::internal(format!("parser task failed: {}", e)))??
            }
        };
        Ok(parsed)
    }

    #[cfg(feature = "pdf")]
    fn parse_pdf(filename: &str, data: &[u8]) -> Result<ParsedDocument> {
        let pages: Vec<PageContent> = Self::extract_pdf_with_timeout(filename, data)?
            .iter()
            .enumerate()
            .filter_map(|(i, raw)| {
                let content = clean_pdf_page(raw);
                (!content.is_empty()).then(|| PageContent {
                    page_number: i as u32 + 1,
                    content,
                })
            })
            .collect();

        if pages.is_empty() {
            return Err(Error::file_parse(
                filename,
                "No text content could be extracted from PDF",
            ));
        }

        Ok(ParsedDocument::paged(FileType::Pdf, pages))
    }

    #[cfg(not(feature = "pdf"))]
    fn parse_pdf(filename: &str, _data: &[u8]) -> Result<ParsedDocument> {
        Err(Error::UnsupportedFileType(format!(
            "{} (built without the `pdf` feature)",
            filename
        )))
    }

    /// pdf-extract can hang on unusual fonts; give it a bounded window and
    /// fall back to lopdf's own text extraction. Returns one string per page.
    #[cfg(feature = "pdf")]
    fn extract_pdf_with_timeout(filename: &str, data: &[u8]) -> Result<Vec<String>> {
        use std::sync::mpsc;
        use std::time::Duration;

        let data_vec = data.to_vec();
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let _ = tx.send(pdf_extract::extract_text_from_mem_by_pages(&data_vec));
        });

        match rx.recv_timeout(Duration::from_secs(60)) {
            Ok(Ok(pages)) => Ok(pages),
            Ok(Err(e)) => {
                tracing::warn!(file = filename, "pdf-extract failed: {}, trying fallback", e);
                Self::extract_pdf_text_fallback(filename, data)
            }
            Err(_) => {
                tracing::error!(file = filename, "PDF extraction timed out or crashed");
                Self::extract_pdf_text_fallback(filename, data)
            }
        }
    }

    #[cfg(feature = "pdf")]
    fn extract_pdf_text_fallback(filename: &str, data: &[u8]) -> Result<Vec<String>> {
        let doc = lopdf::Document::load_mem(data)
            .map_err(|e| Error::file_parse(filename, format!("Failed to load PDF: {}", e)))?;

        let pages: Vec<String> = doc
            .get_pages()
            .keys()
            .map(|&n| {
                doc.extract_text(&[n]).unwrap_or_else(|e| {
                    tracing::debug!(file = filename, page = n, "No text on page: {}", e);
                    String::new()
                })
            })
            .collect();

        if pages.iter().all(|p| p.trim().is_empty()) {
            return Err(Error::file_parse(
                filename,
                "PDF appears to be image-based or has no extractable text",
            ));
        }
        Ok(pages)
    }

    /// Flatten markdown to text, keeping block structure as blank lines
    fn parse_markdown(data: &[u8]) -> ParsedDocument {
        let source = String::from_utf8_lossy(data);
        let mut content = String::new();

        for event in Parser::new(&source) {
            match event {
                Event::Text(text) | Event::Code(text) => content.push_str(&text),
                Event::SoftBreak => content.push(' '),
                Event::HardBreak => content.push('\n'),
                Event::End(TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::CodeBlock) => {
                    content.push_str("\n\n")
                }
                Event::End(TagEnd::Item) => content.push('\n'),
                _ => {}
            }
        }

        ParsedDocument::new(FileType::Markdown, content.trim_end().to_string())
    }

    /// Visible body text, one block per line
    fn parse_html(data: &[u8]) -> Result<ParsedDocument> {
        let html = String::from_utf8_lossy(data);
        let document = scraper::Html::parse_document(&html);
        let body_selector = scraper::Selector::parse("body")
            .map_err(|e| Error::internal(format!("invalid selector: {:?}", e)))?;
        let skip_selector = scraper::Selector::parse("script, style, noscript")
            .map_err(|e| Error::internal(format!("invalid selector: {:?}", e)))?;

        let skipped: Vec<String> = document
            .select(&skip_selector)
            .flat_map(|el| el.text())
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        let mut content = String::new();
        if let Some(body) = document.select(&body_selector).next() {
            for text in body.text() {
                let trimmed = text.trim();
                if trimmed.is_empty() || skipped.iter().any(|s| s == trimmed) {
                    continue;
                }
                if !content.is_empty() {
                    content.push('\n');
                }
                content.push_str(trimmed);
            }
        }

        Ok(ParsedDocument::new(FileType::Html, content))
    }
}

/// Replace typographic characters pdf-extract emits with plain ASCII
#[cfg(feature = "pdf")]
fn cleanup_pdf_text(text: &str) -> String {
    text.replace(['\u{2010}', '\u{2011}', '\u{2013}'], "-")
        .replace('\u{2014}', "--")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace('\u{2022}', "* ")
        .replace('\u{2026}', "...")
        .replace('\u{00A0}', " ")
        .replace('\u{FB01}', "fi")
        .replace('\u{FB02}', "fl")
        .replace('\u{FB00}', "ff")
        .replace('\u{FB03}', "ffi")
        .replace('\u{FB04}', "ffl")
}

#[cfg(feature = "pdf")]
fn clean_pdf_page(raw: &str) -> String {
    cleanup_pdf_text(raw)
        .replace('\0', "")
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
