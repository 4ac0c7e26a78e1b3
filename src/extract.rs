//! Content extraction for stored documents.
//!
//! Turns a document's raw bytes into plain UTF-8 text. Dispatch happens on a
//! [`SourceKind`] derived once from the declared MIME type (falling back to
//! the filename extension), never re-derived per call site.
//!
//! Extraction is tolerant by design: unsupported formats and corrupted PDFs
//! produce a descriptive placeholder as content rather than an error, so the
//! pipeline can still surface something useful to the caller. It never
//! panics and performs no I/O.

use crate::models::{ExtractedContent, ExtractionOutcome, SourceDocument};

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_TEXT: &str = "text/plain";
pub const MIME_MARKDOWN: &str = "text/markdown";

/// File-format tag derived from MIME type / filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Pdf,
    PlainText,
    Word,
    Image,
    Other,
}

impl SourceKind {
    /// Classify a document from its declared MIME type, falling back to the
    /// original filename's extension when the MIME type is absent or opaque.
    pub fn detect(mime_type: &str, original_name: &str) -> Self {
        match mime_type {
            MIME_PDF => return SourceKind::Pdf,
            MIME_TEXT | MIME_MARKDOWN => return SourceKind::PlainText,
            m if m.contains("word") || m.contains("officedocument") => return SourceKind::Word,
            m if m.starts_with("image/") => return SourceKind::Image,
            _ => {}
        }
        let lower = original_name.to_lowercase();
        match lower.rsplit('.').next() {
            Some("pdf") => SourceKind::Pdf,
            Some("txt" | "md") => SourceKind::PlainText,
            Some("doc" | "docx") => SourceKind::Word,
            Some("jpg" | "jpeg" | "png") => SourceKind::Image,
            _ => SourceKind::Other,
        }
    }
}

/// Extract plain text from a document's bytes.
///
/// PDF text is run through [`collapse_blank_lines`] for token efficiency;
/// plain text is decoded verbatim (lossy UTF-8). Word documents and images
/// degrade to an explanatory placeholder with outcome
/// [`ExtractionOutcome::UnsupportedFormat`]; unparseable PDFs degrade to
/// [`ExtractionOutcome::Corrupted`] with a diagnostic naming the file.
pub fn extract(doc: &SourceDocument, bytes: &[u8]) -> ExtractedContent {
    match SourceKind::detect(&doc.mime_type, &doc.original_name) {
        SourceKind::Pdf => extract_pdf(doc, bytes),
        SourceKind::PlainText => ExtractedContent::ok(String::from_utf8_lossy(bytes).into_owned()),
        SourceKind::Word => unsupported(
            "Word document content extraction not yet implemented. \
             Please convert to PDF for AI analysis.",
        ),
        SourceKind::Image => unsupported(
            "Image file detected. OCR (text extraction from images) is not yet \
             implemented. Please provide a text-based document for AI analysis.",
        ),
        SourceKind::Other => {
            let ext = doc
                .original_name
                .rsplit('.')
                .next()
                .unwrap_or("unknown")
                .to_string();
            unsupported(&format!(
                "File type {} not yet supported for content extraction. \
                 Please convert to PDF or text format for AI analysis.",
                ext
            ))
        }
    }
}

fn unsupported(message: &str) -> ExtractedContent {
    ExtractedContent {
        text: format!("[{}]", message),
        outcome: ExtractionOutcome::UnsupportedFormat,
        diagnostic: Some(message.to_string()),
    }
}

fn extract_pdf(doc: &SourceDocument, bytes: &[u8]) -> ExtractedContent {
    match pdf_extract::extract_text_from_mem(bytes) {
        Ok(text) => ExtractedContent::ok(collapse_blank_lines(&text)),
        Err(e) => {
            let diagnostic = format!(
                "PDF content extraction failed ({}). The document may be corrupted, \
                 generated by incompatible software, password protected, or using \
                 unsupported PDF features. Filename: {}, size: {} bytes, MIME type: {}",
                e, doc.original_name, doc.byte_size, doc.mime_type
            );
            ExtractedContent {
                text: format!("[{}]", diagnostic),
                outcome: ExtractionOutcome::Corrupted,
                diagnostic: Some(diagnostic),
            }
        }
    }
}

/// Collapse runs of blank (whitespace-only) lines into a single newline.
///
/// Applied to PDF extraction output only; plain-text content is kept
/// verbatim.
pub fn collapse_blank_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut first = true;
    for line in text.split('\n') {
        if line.trim().is_empty() {
            continue;
        }
        if !first {
            out.push('\n');
        }
        out.push_str(line);
        first = false;
    }
    out
}
