//! Multi-format text extraction.
//!
//! [`DocExtractor`] implements the core [`TextExtractor`] trait for every
//! format the service accepts: plain text and Markdown pass through,
//! HTML is stripped to its text content, PDFs go through `pdf-extract`,
//! and DOCX files are unzipped and their `w:t` runs collected.

use std::io::Read;

use docdex_core::error::{Error, Result};
use docdex_core::extract::{DocumentFormat, TextExtractor};

/// Decompressed bytes allowed from a single ZIP entry (zip-bomb guard).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Production extractor covering all supported formats.
pub struct DocExtractor;

impl TextExtractor for DocExtractor {
    fn extract(&self, bytes: &[u8], format: DocumentFormat) -> Result<String> {
        match format {
            DocumentFormat::PlainText | DocumentFormat::Markdown => {
                Ok(String::from_utf8_lossy(bytes).into_owned())
            }
            DocumentFormat::Html => extract_html(bytes),
            DocumentFormat::Pdf => extract_pdf(bytes),
            DocumentFormat::Docx => extract_docx(bytes),
        }
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String> {
    pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| Error::ExtractionFailed(format!("PDF: {e}")))
}

/// Collect text nodes, skipping `script` and `style` contents.
fn extract_html(bytes: &[u8]) -> Result<String> {
    let mut reader = quick_xml::Reader::from_reader(bytes);
    let config = reader.config_mut();
    config.trim_text(true);
    config.check_end_names = false;
    config.allow_unmatched_ends = true;

    let mut out = String::new();
    let mut skip_depth = 0usize;
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                let name = e.local_name();
                if name.as_ref() == b"script" || name.as_ref() == b"style" {
                    skip_depth += 1;
                }
            }
            Ok(quick_xml::events::Event::End(e)) => {
                let name = e.local_name();
                if (name.as_ref() == b"script" || name.as_ref() == b"style") && skip_depth > 0 {
                    skip_depth -= 1;
                }
            }
            Ok(quick_xml::events::Event::Text(t)) if skip_depth == 0 => {
                let text = t
                    .unescape()
                    .map_err(|e| Error::ExtractionFailed(format!("HTML: {e}")))?;
                let text = text.trim();
                if !text.is_empty() {
                    if !out.is_empty() {
                        out.push(' ');
                    }
                    out.push_str(text);
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(Error::ExtractionFailed(format!("HTML: {e}"))),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

fn extract_docx(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| Error::ExtractionFailed(format!("DOCX: {e}")))?;

    let mut doc_xml = Vec::new();
    let mut found = false;
    for i in 0..archive.len() {
        let entry = archive
            .by_index(i)
            .map_err(|e| Error::ExtractionFailed(format!("DOCX: {e}")))?;
        if entry.name() == "word/document.xml" {
            entry
                .take(MAX_XML_ENTRY_BYTES)
                .read_to_end(&mut doc_xml)
                .map_err(|e| Error::ExtractionFailed(format!("DOCX: {e}")))?;
            if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
                return Err(Error::ExtractionFailed(
                    "DOCX: word/document.xml exceeds size limit".to_string(),
                ));
            }
            found = true;
            break;
        }
    }
    if !found {
        return Err(Error::ExtractionFailed(
            "DOCX: word/document.xml not found".to_string(),
        ));
    }
    extract_text_runs(&doc_xml)
}

/// Gather the contents of `w:t` elements, separating runs with spaces.
fn extract_text_runs(xml: &[u8]) -> Result<String> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut out = String::new();
    let mut in_text = false;
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text = true;
                }
            }
            Ok(quick_xml::events::Event::Text(t)) if in_text => {
                let text = t
                    .unescape()
                    .map_err(|e| Error::ExtractionFailed(format!("DOCX: {e}")))?;
                if !out.is_empty() {
                    out.push(' ');
                }
                out.push_str(&text);
            }
            Ok(quick_xml::events::Event::End(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text = false;
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(Error::ExtractionFailed(format!("DOCX: {e}"))),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}
