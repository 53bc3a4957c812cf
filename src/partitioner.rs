//! Splitting records into per-value groups and producing one document per group.

use std::sync::Arc;

use crate::diagnostics::{emit, Diagnostic, DiagnosticSender};
use crate::document::{self, DocumentSummary, FileNamer, DEFAULT_DOCUMENT_LABEL};
use crate::error::PartitionError;
use crate::packer::{self, DocumentSpec, DocumentStyle};
use crate::record::Record;
use crate::sink::DocumentSink;

/// Records sharing one value of the partition column
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    pub label: String,
    pub records: Vec<Record>,
}

/// Group records by the value of `column`.
///
/// Groups appear in the order their value is first seen and keep record order
/// inside each group. Rows whose value is null or missing belong to no group.
/// Without a column, everything goes into a single default group.
pub fn partition(
    records: Vec<Record>,
    column: Option<&str>,
    diagnostics: Option<&DiagnosticSender>,
) -> Vec<Partition> {
    let Some(column) = column else {
        return vec![Partition {
            label: DEFAULT_DOCUMENT_LABEL.to_string(),
            records,
        }];
    };

    let mut partitions: Vec<Partition> = Vec::new();

    for record in records {
        let label = match record.get(column) {
            Some(value) if !value.is_null() => value.to_string(),
            _ => {
                log::debug!("Row {} has no value for '{}', dropping it", record.index, column);
                emit(diagnostics, Diagnostic::NullPartitionValue { index: record.index });
                continue;
            }
        };

        match partitions.iter_mut().find(|p| p.label == label) {
            Some(existing) => existing.records.push(record),
            None => partitions.push(Partition {
                label,
                records: vec![record],
            }),
        }
    }

    partitions
}

/// Render and persist one document per partition, in order.
///
/// Packing and rendering run on the blocking pool; persisting stays on the
/// calling task. A failure is recorded against its partition and the remaining
/// partitions are still attempted.
pub async fn generate_documents(
    partitions: Vec<Partition>,
    style: Arc<DocumentStyle>,
    template: Option<Arc<[u8]>>,
    sink: &mut (dyn DocumentSink + Send),
    diagnostics: Option<&DiagnosticSender>,
) -> Vec<Result<DocumentSummary, PartitionError>> {
    let mut namer = FileNamer::new();
    let mut outcomes = Vec::with_capacity(partitions.len());

    for partition in partitions {
        let label = partition.label;
        let file_name = namer.file_name_for(&label);

        let assembled = {
            let style = Arc::clone(&style);
            let template = template.clone();
            let diagnostics = diagnostics.cloned();
            let label = label.clone();
            let records = partition.records;

            tokio::task::spawn_blocking(move || {
                let spec = DocumentSpec {
                    slides: packer::pack(records, style.images_per_slide),
                    label,
                    style: &style,
                };
                document::assemble(&spec, file_name, template.as_deref(), diagnostics.as_ref())
            })
            .await
            .map_err(anyhow::Error::from)
            .and_then(|result| result)
        };

        let outcome = assembled
            .map_err(|cause| PartitionError::Assembly {
                label: label.clone(),
                cause,
            })
            .and_then(|generated| {
                let location = sink.persist(&generated).map_err(|cause| PartitionError::Persist {
                    label: label.clone(),
                    cause,
                })?;
                let mut summary = generated.summary();
                summary.location = location.map(|path| path.display().to_string());
                Ok(summary)
            });

        if let Err(e) = &outcome {
            log::warn!("{}", e);
            emit(
                diagnostics,
                Diagnostic::PartitionFailed {
                    label: e.label().to_string(),
                    reason: e.to_string(),
                },
            );
        }
        outcomes.push(outcome);
    }

    outcomes
}
