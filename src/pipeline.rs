//! One report generation run, from a filtered dataset to persisted documents.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::config::GenerationConfig;
use crate::diagnostics::DiagnosticSender;
use crate::document::DocumentSummary;
use crate::error::{ConfigError, PartitionError, PipelineError};
use crate::fetcher;
use crate::media::{self, LoadedImage};
use crate::packer::DocumentStyle;
use crate::partitioner;
use crate::pptx_writer::TextStyle;
use crate::record::Dataset;
use crate::sink::DocumentSink;
use crate::workdir::WorkingDir;

/// Everything one request needs; created per request and dropped with it
#[derive(Debug, Clone)]
pub struct GenerationContext {
    pub config: GenerationConfig,
    pub client: reqwest::Client,
    pub diagnostics: Option<DiagnosticSender>,
    /// Parent of the scoped working directory, system temp when unset
    pub work_root: Option<PathBuf>,
}

/// Per-partition failure as reported to callers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartitionFailure {
    pub label: String,
    pub reason: String,
}

/// Result of a generation run
#[derive(Debug)]
pub struct GenerationReport {
    pub image_column: String,
    pub rows_in: usize,
    pub rows_fetched: usize,
    pub outcomes: Vec<Result<DocumentSummary, PartitionError>>,
}

impl GenerationReport {
    pub fn documents(&self) -> Vec<&DocumentSummary> {
        self.outcomes.iter().filter_map(|o| o.as_ref().ok()).collect()
    }

    pub fn failures(&self) -> Vec<PartitionFailure> {
        self.outcomes
            .iter()
            .filter_map(|o| o.as_ref().err())
            .map(|e| PartitionFailure {
                label: e.label().to_string(),
                reason: e.to_string(),
            })
            .collect()
    }
}

impl GenerationContext {
    /// Build a context with an HTTP client tuned to the config's timeout
    pub fn new(config: GenerationConfig) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(config.fetch_config().request_timeout)
            .build()
            .map_err(PipelineError::HttpClient)?;

        Ok(Self {
            config,
            client,
            diagnostics: None,
            work_root: None,
        })
    }

    pub fn with_diagnostics(mut self, sender: DiagnosticSender) -> Self {
        self.diagnostics = Some(sender);
        self
    }

    pub fn with_work_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.work_root = Some(root.into());
        self
    }

    /// Fetch images, split into partitions and persist one document each.
    ///
    /// Configuration problems and an unusable working directory abort the
    /// run. Rows whose image cannot be fetched are dropped, and a partition
    /// that fails is reported in the outcomes without stopping the others.
    pub async fn run(
        &self,
        dataset: Dataset,
        sink: &mut (dyn DocumentSink + Send),
    ) -> Result<GenerationReport, PipelineError> {
        let config = &self.config;
        config.validate()?;
        config.validate_columns(&dataset)?;

        let image_column = match &config.image_column {
            Some(column) => column.clone(),
            None => fetcher::detect_image_column(&dataset).ok_or(ConfigError::NoImageColumn)?,
        };

        let style = Arc::new(self.document_style()?);

        let mut dataset = dataset;
        if let Some(column) = &config.sort_column {
            dataset.sort_by_column(column);
        }
        let rows_in = dataset.len();
        log::info!("Generating report from {} rows, images in '{}'", rows_in, image_column);

        let work_dir = match &self.work_root {
            Some(root) => WorkingDir::create_in(root)?,
            None => WorkingDir::create()?,
        };

        let fetched = fetcher::fetch_all(
            &self.client,
            dataset.records,
            &image_column,
            work_dir.path(),
            &config.fetch_config(),
            self.diagnostics.as_ref(),
        )
        .await?;
        let rows_fetched = fetched.len();

        let partitions = partitioner::partition(
            fetched,
            config.partition_column.as_deref(),
            self.diagnostics.as_ref(),
        );
        let outcomes = partitioner::generate_documents(
            partitions,
            style,
            config.template_document.as_deref().map(Arc::<[u8]>::from),
            sink,
            self.diagnostics.as_ref(),
        )
        .await;

        if let Err(e) = work_dir.close() {
            log::warn!("Failed to remove working directory: {}", e);
        }

        Ok(GenerationReport {
            image_column,
            rows_in,
            rows_fetched,
            outcomes,
        })
    }

    fn document_style(&self) -> Result<DocumentStyle, ConfigError> {
        let config = &self.config;
        Ok(DocumentStyle {
            images_per_slide: config.images_per_slide,
            caption_columns: config.caption_columns.clone(),
            text_style: TextStyle {
                font_name: config.font_name.clone(),
                size_pt: config.font_size_pt,
                color: config.font_color_hex()?,
            },
            background: config.background_image.clone().and_then(prepare_background),
        })
    }
}

fn prepare_background(bytes: Vec<u8>) -> Option<LoadedImage> {
    match media::prepare_image(bytes) {
        Ok(image) => Some(image),
        Err(e) => {
            log::warn!("Ignoring background image: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Value;
    use crate::sink::MemorySink;

    fn dataset_without_urls() -> Dataset {
        Dataset::from_rows(
            vec!["tienda".into(), "visitas".into()],
            vec![vec![Value::Text("Norte".into()), Value::Int(3)]],
        )
    }

    #[tokio::test]
    async fn test_no_image_column_is_reported() {
        let context = GenerationContext::new(GenerationConfig::default()).unwrap();
        let mut sink = MemorySink::new();
        let result = context.run(dataset_without_urls(), &mut sink).await;
        assert!(matches!(
            result,
            Err(PipelineError::Config(ConfigError::NoImageColumn))
        ));
        assert!(sink.documents.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_config_aborts_before_fetching() {
        let mut config = GenerationConfig::default();
        config.images_per_slide = 6;
        let context = GenerationContext::new(config).unwrap();
        let mut sink = MemorySink::new();
        assert!(matches!(
            context.run(dataset_without_urls(), &mut sink).await,
            Err(PipelineError::Config(ConfigError::ImagesPerSlide(6)))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_images_still_produce_a_document() {
        let dataset = Dataset::from_rows(
            vec!["foto".into()],
            vec![vec![Value::Text("http://127.0.0.1:9/a.png".into())]],
        );
        let mut config = GenerationConfig::default();
        config.request_timeout_secs = 1;
        let work_root = tempfile::tempdir().unwrap();
        let context = GenerationContext::new(config)
            .unwrap()
            .with_work_root(work_root.path());
        let mut sink = MemorySink::new();

        let report = context.run(dataset, &mut sink).await.unwrap();
        assert_eq!(report.image_column, "foto");
        assert_eq!((report.rows_in, report.rows_fetched), (1, 0));
        assert_eq!(report.documents().len(), 1);
        assert_eq!(report.documents()[0].slide_count, 0);
        assert!(report.failures().is_empty());
        // Working directory removed after the run
        assert_eq!(std::fs::read_dir(work_root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_unreadable_background_is_ignored() {
        let mut config = GenerationConfig::default();
        config.background_image = Some(b"not an image".to_vec());
        let context = GenerationContext::new(config).unwrap();
        assert!(context.document_style().unwrap().background.is_none());
    }
}
