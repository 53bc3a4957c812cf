use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::document::GeneratedDocument;

/// Destination for finished documents.
///
/// Each document is persisted before the next partition is rendered.
pub trait DocumentSink {
    /// Store one document, returning its location when there is one
    fn persist(&mut self, document: &GeneratedDocument) -> Result<Option<PathBuf>>;
}

/// Writes documents as files into an output directory
#[derive(Debug, Clone)]
pub struct DirectorySink {
    output_dir: PathBuf,
}

impl DirectorySink {
    /// Create the directory if needed
    pub fn new(output_dir: impl AsRef<Path>) -> Result<Self> {
        let output_dir = output_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&output_dir)
            .with_context(|| format!("Failed to create output directory: {}", output_dir.display()))?;
        Ok(Self { output_dir })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

impl DocumentSink for DirectorySink {
    fn persist(&mut self, document: &GeneratedDocument) -> Result<Option<PathBuf>> {
        let path = self.output_dir.join(&document.file_name);
        std::fs::write(&path, &document.bytes)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        log::info!("Wrote {} ({} bytes)", path.display(), document.bytes.len());
        Ok(Some(path))
    }
}

/// Keeps documents in memory, for callers that stream bytes themselves
#[derive(Debug, Default)]
pub struct MemorySink {
    pub documents: Vec<GeneratedDocument>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentSink for MemorySink {
    fn persist(&mut self, document: &GeneratedDocument) -> Result<Option<PathBuf>> {
        self.documents.push(document.clone());
        Ok(None)
    }
}
