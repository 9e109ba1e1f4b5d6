//! Purpose: Load pension report PDFs and expose their text layer per page.
//! Exports: `PageText`, `PdfText`, `load_path`, `load_bytes`.
//! Role: The only module that talks to `lopdf`; extractors consume `PdfText`.
//! Invariants: Pages are 1-indexed and returned in document order.
//! Invariants: Encrypted documents are rejected before any extraction.

use std::path::Path;

use lopdf::Document;
use tracing::info;

use crate::core::error::{Error, ErrorKind};

/// Text layer of one page, split into non-empty lines.
#[derive(Debug, Clone)]
pub struct PageText {
    pub number: u32,
    pub lines: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PdfText {
    pub pages: Vec<PageText>,
}

pub fn load_path(path: &Path) -> Result<PdfText, Error> {
    let bytes = std::fs::read(path).map_err(|err| {
        let kind = if err.kind() == std::io::ErrorKind::NotFound {
            ErrorKind::NotFound
        } else {
            ErrorKind::Io
        };
        Error::new(kind)
            .with_message("failed to read PDF file")
            .with_path(path)
            .with_source(err)
    })?;
    load_bytes(&bytes).map_err(|err| err.with_path(path))
}

pub fn load_bytes(bytes: &[u8]) -> Result<PdfText, Error> {
    let document = Document::load_mem(bytes).map_err(|err| {
        Error::new(ErrorKind::Corrupt)
            .with_message("failed to parse PDF document")
            .with_source(err)
    })?;
    if document.is_encrypted() {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("encrypted PDFs are not supported")
            .with_hint("Remove the password from the document and retry."));
    }
    page_texts(&document)
}

fn page_texts(document: &Document) -> Result<PdfText, Error> {
    let mut pages = Vec::new();
    for number in document.get_pages().keys().copied() {
        let text = document.extract_text(&[number]).map_err(|err| {
            Error::new(ErrorKind::Corrupt)
                .with_message("failed to extract page text")
                .with_page(number)
                .with_source(err)
        })?;
        let lines = text
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect();
        pages.push(PageText { number, lines });
    }
    info!(pages = pages.len(), "loaded PDF");
    Ok(PdfText { pages })
}

impl PageText {
    /// Folded full-page text used for keyword matching.
    pub fn folded(&self) -> String {
        let joined = self.lines.join(" ");
        crate::core::lines::fold(&joined)
    }
}
