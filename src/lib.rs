/// Photo Report MCP - builds PowerPoint photo reports from tabular records
/// whose rows reference images by URL

pub mod caption;
pub mod config;
pub mod dataset_loader;
pub mod diagnostics;
pub mod dimensions;
pub mod document;
pub mod error;
pub mod fetcher;
pub mod filters;
pub mod logging;
pub mod mcp_handler;
pub mod media;
pub mod packer;
pub mod partitioner;
pub mod pipeline;
pub mod pptx_template;
pub mod pptx_writer;
pub mod record;
pub mod sink;
pub mod workdir;

/// Re-export the MCP server for direct usage
pub use mcp_handler::PhotoReportServer;

/// Re-export the generation pipeline
pub use config::{FetchConfig, GenerationConfig};
pub use diagnostics::{Diagnostic, DiagnosticSender};
pub use document::{DocumentSummary, GeneratedDocument};
pub use error::{ConfigError, FetchError, LayoutError, PartitionError, PipelineError};
pub use pipeline::{GenerationContext, GenerationReport, PartitionFailure};
pub use record::{Dataset, Record, Value};
pub use sink::{DirectorySink, DocumentSink, MemorySink};

/// Re-export the building blocks
pub use caption::build as build_caption;
pub use dataset_loader::load_dataset;
pub use dimensions::scale;
pub use fetcher::{detect_image_column, fetch_all};
pub use filters::{apply_filters, describe_columns, ColumnKind, FilterSpec};
pub use packer::{pack, SlideSpec};
pub use partitioner::{generate_documents, partition, Partition};
