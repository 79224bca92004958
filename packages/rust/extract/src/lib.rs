//! Document text extraction and cleanup.
//!
//! Reads an uploaded study document (PDF, plain text, or Markdown), splits it
//! into pages, and runs a series of cleanup passes over the text so the
//! downstream parsing steps see normalized lines.

mod cleanup;

use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

use taskflow_shared::{
    DocumentFormat, DocumentMetadata, ExtractedContent, PageText, Result, TaskflowError,
};

/// Pages with fewer trimmed characters than this are flagged as scans.
const SCANNED_PAGE_THRESHOLD: usize = 10;

/// Page separator in plain-text exports of paged documents.
const FORM_FEED: char = '\u{c}';

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Map a file extension to a supported document format.
pub fn detect_format(path: &Path) -> Option<DocumentFormat> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some(DocumentFormat::Pdf),
        "txt" | "text" => Some(DocumentFormat::PlainText),
        "md" | "markdown" => Some(DocumentFormat::Markdown),
        _ => None,
    }
}

/// Extract text from the document at `path`.
///
/// 1. Detect the format from the file extension
/// 2. Read the raw bytes
/// 3. Decode (PDF text layer page by page, or UTF-8 split on form feeds)
/// 4. Run the cleanup pipeline per page and over the joined text
#[instrument(skip_all, fields(path = %path.display()))]
pub fn extract(path: &Path) -> Result<ExtractedContent> {
    let format = detect_format(path).ok_or_else(|| {
        TaskflowError::extraction(format!(
            "unsupported file type: {} (expected .pdf, .txt or .md)",
            path.display()
        ))
    })?;

    let bytes = std::fs::read(path).map_err(|e| TaskflowError::io(path, e))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    extract_from_bytes(&bytes, &file_name, format)
}

/// Extract text from an in-memory document (e.g. an upload that never touched disk).
pub fn extract_from_bytes(
    bytes: &[u8],
    file_name: &str,
    format: DocumentFormat,
) -> Result<ExtractedContent> {
    let raw_pages: Vec<String> = match format {
        DocumentFormat::Pdf => pdf_extract::extract_text_from_mem_by_pages(bytes).map_err(|e| {
            TaskflowError::extraction(format!("{file_name}: failed to read PDF text layer: {e}"))
        })?,
        DocumentFormat::PlainText | DocumentFormat::Markdown => {
            let text = String::from_utf8(bytes.to_vec()).map_err(|e| {
                TaskflowError::extraction(format!("{file_name}: not valid UTF-8: {e}"))
            })?;
            split_pages(&text).into_iter().map(str::to_string).collect()
        }
    };

    let pages: Vec<PageText> = raw_pages
        .iter()
        .enumerate()
        .map(|(i, page)| {
            let text = cleanup::run_pipeline(page);
            PageText {
                page_number: i + 1,
                is_scanned: text.trim().chars().count() < SCANNED_PAGE_THRESHOLD,
                text,
            }
        })
        .collect();

    let joined = pages
        .iter()
        .map(|p| p.text.trim_end())
        .collect::<Vec<_>>()
        .join("\n");
    let full_text = cleanup::run_pipeline(&joined);

    let scanned = pages.iter().filter(|p| p.is_scanned).count();
    debug!(
        file_name,
        pages = pages.len(),
        scanned,
        chars = full_text.len(),
        "extraction complete"
    );

    Ok(ExtractedContent {
        metadata: DocumentMetadata {
            file_name: file_name.to_string(),
            format,
            byte_len: bytes.len() as u64,
        },
        page_count: pages.len(),
        content_hash: content_hash(&full_text),
        full_text,
        pages,
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Split raw text into pages on form feeds, dropping a trailing empty page.
fn split_pages(raw: &str) -> Vec<&str> {
    let mut pages: Vec<&str> = raw.split(FORM_FEED).collect();
    if pages.len() > 1 && pages.last().is_some_and(|p| p.trim().is_empty()) {
        pages.pop();
    }
    pages
}

/// SHA-256 hex digest of the extracted text.
fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SYLLABUS: &str = "CS 301 Syllabus\n\nAssignment 1 due 2025-02-10\n\
                            Midterm exam on March 3\n\u{c}Week 2\nNormalization: organizing tables\n";

    #[test]
    fn test_detect_format() {
        assert_eq!(detect_format(Path::new("a/b.PDF")), Some(DocumentFormat::Pdf));
        assert_eq!(detect_format(Path::new("notes.md")), Some(DocumentFormat::Markdown));
        assert_eq!(detect_format(Path::new("notes.txt")), Some(DocumentFormat::PlainText));
        assert_eq!(detect_format(Path::new("notes.docx")), None);
        assert_eq!(detect_format(Path::new("README")), None);
    }

    #[test]
    fn test_extract_text_file_splits_pages() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("syllabus.txt");
        std::fs::write(&path, SYLLABUS).expect("write fixture");

        let content = extract(&path).expect("extract");
        assert_eq!(content.metadata.file_name, "syllabus.txt");
        assert_eq!(content.metadata.format, DocumentFormat::PlainText);
        assert_eq!(content.metadata.byte_len, SYLLABUS.len() as u64);
        assert_eq!(content.page_count, 2);
        assert_eq!(content.pages[1].page_number, 2);
        assert!(content.pages[1].text.starts_with("Week 2"));
        assert!(content.full_text.contains("Midterm exam on March 3\nWeek 2"));
        assert_eq!(content.content_hash.len(), 64);
    }

    #[test]
    fn test_short_pages_are_flagged_as_scanned() {
        let content = extract_from_bytes(
            "Lecture notes on relational algebra\u{c}  p.2 \u{c}".as_bytes(),
            "notes.txt",
            DocumentFormat::PlainText,
        )
        .expect("extract");

        assert_eq!(content.page_count, 2);
        assert!(!content.pages[0].is_scanned);
        assert!(content.pages[1].is_scanned);
    }

    #[test]
    fn test_same_text_same_hash() {
        let a = extract_from_bytes(b"Exam on Friday", "a.txt", DocumentFormat::PlainText)
            .expect("extract a");
        let b = extract_from_bytes(b"Exam on Friday\r\n", "b.md", DocumentFormat::Markdown)
            .expect("extract b");
        assert_eq!(a.content_hash, b.content_hash);
    }

    #[test]
    fn test_unsupported_extension_is_rejected() {
        let err = extract(Path::new("thesis.docx")).unwrap_err();
        assert!(matches!(err, TaskflowError::Extraction { .. }));
        assert!(err.to_string().contains("unsupported file type"));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = extract(&dir.path().join("missing.pdf")).unwrap_err();
        assert!(matches!(err, TaskflowError::Io { .. }));
    }

    #[test]
    fn test_invalid_utf8_is_rejected() {
        let err = extract_from_bytes(&[0xff, 0xfe, 0x00], "bad.txt", DocumentFormat::PlainText)
            .unwrap_err();
        assert!(err.to_string().contains("not valid UTF-8"));
    }

    /// Build a PDF with one Helvetica text line per entry; `None` is a blank page.
    fn pdf_with_pages(lines: &[Option<&str>]) -> Vec<u8> {
        use lopdf::content::{Content, Operation};
        use lopdf::{Document, Object, Stream, dictionary};

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids = Vec::new();
        for line in lines {
            let operations = match line {
                Some(text) => vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
                None => vec![],
            };
            let content = Content { operations }.encode().expect("encode content");
            let content_id = doc.add_object(Stream::new(dictionary! {}, content));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            });
            kids.push(Object::from(page_id));
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).expect("serialize pdf");
        bytes
    }

    #[test]
    fn test_pdf_pages_are_extracted_separately() {
        let bytes = pdf_with_pages(&[
            Some("Assignment 1 due 2026-03-15"),
            Some("Midterm exam on March 30"),
            None,
        ]);

        let content =
            extract_from_bytes(&bytes, "syllabus.pdf", DocumentFormat::Pdf).expect("extract pdf");

        assert_eq!(content.metadata.format, DocumentFormat::Pdf);
        assert_eq!(content.page_count, 3);
        let numbers: Vec<_> = content.pages.iter().map(|p| p.page_number).collect();
        assert_eq!(numbers, [1, 2, 3]);
        let scanned: Vec<_> = content.pages.iter().map(|p| p.is_scanned).collect();
        assert_eq!(scanned, [false, false, true]);

        assert!(content.pages[0].text.contains("Assignment 1 due 2026-03-15"));
        assert!(!content.pages[0].text.contains("Midterm"));
        assert!(content.pages[1].text.contains("Midterm exam on March 30"));

        // Text from adjacent pages never shares a line.
        let lines: Vec<_> = content.full_text.lines().map(str::trim).collect();
        assert!(lines.contains(&"Assignment 1 due 2026-03-15"), "{lines:?}");
        assert!(lines.contains(&"Midterm exam on March 30"), "{lines:?}");
    }

    #[test]
    fn test_garbage_pdf_is_extraction_error() {
        let err = extract_from_bytes(b"not a pdf at all", "broken.pdf", DocumentFormat::Pdf)
            .unwrap_err();
        assert!(matches!(err, TaskflowError::Extraction { .. }));
        assert!(err.to_string().contains("broken.pdf"));
    }
}
