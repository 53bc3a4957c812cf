use std::collections::HashSet;

use anyhow::Result;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use crate::diagnostics::DiagnosticSender;
use crate::packer::{self, DocumentSpec};
use crate::pptx_writer::{self, PPTX_MIME_TYPE};

/// Name used when the dataset is not partitioned
pub const DEFAULT_DOCUMENT_LABEL: &str = "photo_report";

const DOCUMENT_EXTENSION: &str = "pptx";

lazy_static! {
    static ref UNSAFE_FILE_CHARS: Regex = Regex::new(r"[^A-Za-z0-9._-]").unwrap();
}

/// A finished presentation, ready to be handed to a sink
#[derive(Debug, Clone)]
pub struct GeneratedDocument {
    pub label: String,
    pub file_name: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
    pub slide_count: usize,
    pub images_placed: usize,
}

impl GeneratedDocument {
    pub fn summary(&self) -> DocumentSummary {
        DocumentSummary {
            label: self.label.clone(),
            file_name: self.file_name.clone(),
            mime_type: self.mime_type,
            size_bytes: self.bytes.len(),
            slide_count: self.slide_count,
            images_placed: self.images_placed,
            location: None,
        }
    }
}

/// What the caller learns about a persisted document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentSummary {
    pub label: String,
    pub file_name: String,
    pub mime_type: &'static str,
    pub size_bytes: usize,
    pub slide_count: usize,
    pub images_placed: usize,
    /// Where the sink stored the file, when it stores files at all
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// Render a document spec and write it as a presentation package
pub fn assemble(
    spec: &DocumentSpec<'_>,
    file_name: String,
    template: Option<&[u8]>,
    diagnostics: Option<&DiagnosticSender>,
) -> Result<GeneratedDocument> {
    let (deck, stats) = packer::render(spec, diagnostics);
    let bytes = pptx_writer::write_presentation(&deck, template)?;

    log::debug!(
        "Assembled '{}': {} slides, {} images, {} skipped",
        spec.label,
        stats.slides,
        stats.images_placed,
        stats.images_skipped
    );

    Ok(GeneratedDocument {
        label: spec.label.clone(),
        file_name,
        mime_type: PPTX_MIME_TYPE,
        bytes,
        slide_count: stats.slides,
        images_placed: stats.images_placed,
    })
}

/// Replace anything outside `[A-Za-z0-9._-]` with `_`
pub fn sanitize_file_stem(label: &str) -> String {
    let stem = UNSAFE_FILE_CHARS.replace_all(label.trim(), "_").into_owned();
    if stem.is_empty() || stem.chars().all(|c| c == '.') {
        DEFAULT_DOCUMENT_LABEL.to_string()
    } else {
        stem
    }
}

/// Hands out unique `.pptx` file names for the labels of one run
#[derive(Debug, Default)]
pub struct FileNamer {
    taken: HashSet<String>,
}

impl FileNamer {
    pub fn new() -> Self {
        Self::default()
    }

    /// `<stem>.pptx`, or `<stem>_2.pptx`, `<stem>_3.pptx`... when already used
    pub fn file_name_for(&mut self, label: &str) -> String {
        let stem = sanitize_file_stem(label);
        let mut candidate = format!("{}.{}", stem, DOCUMENT_EXTENSION);
        let mut suffix = 2;
        while self.taken.contains(&candidate) {
            candidate = format!("{}_{}.{}", stem, suffix, DOCUMENT_EXTENSION);
            suffix += 1;
        }
        self.taken.insert(candidate.clone());
        candidate
    }
}
