use std::path::Path;

use anyhow::{anyhow, Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::NaiveDate;
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::tool::Parameters;
use rmcp::model::{CallToolResult, Content, ErrorData as McpError, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo};
use rmcp::{schemars, tool, tool_handler, tool_router, ServerHandler, ServiceExt};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::GenerationConfig;
use crate::dataset_loader::load_dataset;
use crate::error::ConfigError;
use crate::fetcher::detect_image_column;
use crate::filters::{self, ColumnKind, FilterSpec};
use crate::pipeline::GenerationContext;
use crate::record::Dataset;
use crate::sink::DirectorySink;

/// Photo report generator exposed over MCP
#[derive(Clone)]
pub struct PhotoReportServer {
    tool_router: ToolRouter<Self>,
}

impl Default for PhotoReportServer {
    fn default() -> Self {
        Self::new()
    }
}

/// Input for the describe_dataset tool
#[derive(Serialize, Deserialize, Debug, schemars::JsonSchema)]
pub struct DescribeDatasetInput {
    #[schemars(description = "Path to the dataset (.xlsx, .xls, .xlsm or .json array of records)")]
    pub dataset_path: String,
}

/// One column filter chosen by the user
#[derive(Serialize, Deserialize, Debug, Clone, Default, schemars::JsonSchema)]
pub struct FilterInput {
    #[schemars(description = "Column to filter on")]
    pub column: String,
    #[schemars(description = "Accepted values for categorical or boolean columns")]
    #[serde(default)]
    pub values: Vec<String>,
    #[schemars(description = "Comma separated numbers for numeric columns, e.g. \"1, 2.5\"")]
    pub numbers: Option<String>,
    #[schemars(description = "First date to keep (YYYY-MM-DD) for date columns")]
    pub start_date: Option<String>,
    #[schemars(description = "Last date to keep (YYYY-MM-DD) for date columns")]
    pub end_date: Option<String>,
}

/// Input for the generate_photo_report tool
#[derive(Serialize, Deserialize, Debug, Default, schemars::JsonSchema)]
pub struct GenerateReportInput {
    #[schemars(description = "Path to the dataset (.xlsx, .xls, .xlsm or .json array of records)")]
    pub dataset_path: String,
    #[schemars(description = "Directory the .pptx files are written to")]
    pub output_dir: String,
    #[schemars(description = "Images per slide, 1 to 4 (default: 1)")]
    pub images_per_slide: Option<usize>,
    #[schemars(description = "Columns shown as caption lines, in this order (at most 8)")]
    pub caption_columns: Option<Vec<String>>,
    #[schemars(description = "Caption colour as hex RGB (default: 000000)")]
    pub font_color: Option<String>,
    #[schemars(description = "Caption font (default: Calibri)")]
    pub font_name: Option<String>,
    #[schemars(description = "Caption font size in points (default: 9)")]
    pub font_size_pt: Option<f64>,
    #[schemars(description = "Column to sort rows by before packing")]
    pub sort_column: Option<String>,
    #[schemars(description = "Column whose values split the report into one file each")]
    pub partition_column: Option<String>,
    #[schemars(description = "Column holding image URLs; detected automatically when omitted")]
    pub image_column: Option<String>,
    #[schemars(description = "Row filters applied before fetching images")]
    pub filters: Option<Vec<FilterInput>>,
    #[schemars(description = "Background image as a file path or base64 string")]
    pub background_image: Option<String>,
    #[schemars(description = "Template .pptx as a file path or base64 string")]
    pub template_document: Option<String>,
}

#[tool_router]
impl PhotoReportServer {
    pub fn new() -> Self {
        Self {
            tool_router: Self::tool_router(),
        }
    }

    /// Describe a dataset's columns so filters and captions can be chosen
    #[tool(description = "List the columns of a dataset with their kind (categorical, numeric, boolean, temporal), distinct options, the detected image URL column and the date range")]
    pub async fn describe_dataset(
        &self,
        Parameters(input): Parameters<DescribeDatasetInput>,
    ) -> Result<CallToolResult, McpError> {
        let dataset = match load_normalized(&input.dataset_path) {
            Ok(dataset) => dataset,
            Err(e) => return Ok(CallToolResult::error(vec![Content::text(format!("{:#}", e))])),
        };

        let description = json!({
            "rows": dataset.len(),
            "columns": filters::describe_columns(&dataset),
            "image_column": detect_image_column(&dataset),
            "date_range": filters::date_bounds(&dataset, filters::DATE_COLUMN).map(|(start, end)| json!({
                "start": start.to_string(),
                "end": end.to_string(),
            })),
        });

        Ok(CallToolResult::success(vec![Content::text(pretty(&description))]))
    }

    /// Generate one photo report per partition value
    #[tool(description = "Download the images referenced by a dataset and write them into PowerPoint photo reports with captions, optionally one file per value of a partition column")]
    pub async fn generate_photo_report(
        &self,
        Parameters(input): Parameters<GenerateReportInput>,
    ) -> Result<CallToolResult, McpError> {
        match generate(input).await {
            Ok(report) => Ok(CallToolResult::success(vec![Content::text(pretty(&report))])),
            Err(e) => {
                log::warn!("Report generation failed: {:#}", e);
                Ok(CallToolResult::error(vec![Content::text(format!("{:#}", e))]))
            }
        }
    }
}

#[tool_handler]
impl ServerHandler for PhotoReportServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::default(),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "This server builds PowerPoint photo reports from spreadsheets or JSON records that reference images by URL. Call describe_dataset first to see columns, then generate_photo_report.".to_string(),
            ),
        }
    }
}

async fn generate(input: GenerateReportInput) -> Result<serde_json::Value> {
    let dataset = load_normalized(&input.dataset_path)?;
    let specs = input
        .filters
        .as_deref()
        .map(|inputs| build_filters(&dataset, inputs))
        .transpose()?
        .unwrap_or_default();
    let dataset = filters::apply_filters(dataset, &specs)?;
    let rows_filtered = dataset.len();

    let config = build_config(&input)?;
    let context = GenerationContext::new(config)?;
    let mut sink = DirectorySink::new(&input.output_dir)?;
    let report = context.run(dataset, &mut sink).await?;

    Ok(json!({
        "image_column": report.image_column,
        "rows_after_filters": rows_filtered,
        "rows_fetched": report.rows_fetched,
        "documents": report.documents(),
        "failures": report.failures(),
    }))
}

fn load_normalized(dataset_path: &str) -> Result<Dataset> {
    let dataset = load_dataset(dataset_path)?;
    Ok(filters::normalize_date_column(dataset))
}

fn build_config(input: &GenerateReportInput) -> Result<GenerationConfig> {
    let defaults = GenerationConfig::default();
    Ok(GenerationConfig {
        font_color: input.font_color.clone().unwrap_or(defaults.font_color),
        font_name: input.font_name.clone().unwrap_or(defaults.font_name),
        font_size_pt: input.font_size_pt.unwrap_or(defaults.font_size_pt),
        images_per_slide: input.images_per_slide.unwrap_or(defaults.images_per_slide),
        caption_columns: input.caption_columns.clone().unwrap_or_default(),
        sort_column: input.sort_column.clone(),
        partition_column: input.partition_column.clone(),
        image_column: input.image_column.clone(),
        background_image: input
            .background_image
            .as_deref()
            .map(resolve_payload)
            .transpose()
            .context("Invalid background image")?,
        template_document: input
            .template_document
            .as_deref()
            .map(resolve_payload)
            .transpose()
            .context("Invalid template document")?,
        ..defaults
    })
}

/// Turn the user's filter input into specs matching each column's kind
pub fn build_filters(dataset: &Dataset, inputs: &[FilterInput]) -> Result<Vec<(String, FilterSpec)>, ConfigError> {
    inputs
        .iter()
        .map(|input| {
            if !dataset.has_column(&input.column) {
                return Err(ConfigError::UnknownColumn(input.column.clone()));
            }
            let kind = ColumnKind::infer(dataset.column_values(&input.column));
            let spec = filter_spec(dataset, kind, input)?;
            Ok((input.column.clone(), spec))
        })
        .collect()
}

fn filter_spec(dataset: &Dataset, kind: ColumnKind, input: &FilterInput) -> Result<FilterSpec, ConfigError> {
    let column = input.column.as_str();

    if input.start_date.is_some() || input.end_date.is_some() {
        if kind != ColumnKind::Temporal {
            return Err(ConfigError::UnreadableFilter {
                column: column.to_string(),
                value: input
                    .start_date
                    .iter()
                    .chain(input.end_date.iter())
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(".."),
            });
        }
        // An open end falls back to the column's own first or last date
        let bounds = filters::date_bounds(dataset, column);
        let start = match &input.start_date {
            Some(text) => parse_date(column, text)?,
            None => bounds.map(|(lo, _)| lo).unwrap_or(NaiveDate::MIN),
        };
        let end = match &input.end_date {
            Some(text) => parse_date(column, text)?,
            None => bounds.map(|(_, hi)| hi).unwrap_or(NaiveDate::MAX),
        };
        return Ok(FilterSpec::DateRange { start, end });
    }

    if let Some(numbers) = &input.numbers {
        return Ok(FilterSpec::Numbers(filters::parse_numeric_filter(column, numbers)?));
    }

    match kind {
        ColumnKind::Boolean => input
            .values
            .iter()
            .map(|value| {
                value.trim().to_lowercase().parse::<bool>().map_err(|_| ConfigError::UnreadableFilter {
                    column: column.to_string(),
                    value: value.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(FilterSpec::Booleans),
        _ => Ok(FilterSpec::OneOf(input.values.clone())),
    }
}

fn parse_date(column: &str, text: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").map_err(|_| ConfigError::UnreadableFilter {
        column: column.to_string(),
        value: text.to_string(),
    })
}

/// Read a payload given either as an existing file path or as base64,
/// with or without a `data:` URL prefix
pub fn resolve_payload(value: &str) -> Result<Vec<u8>> {
    let path = Path::new(value);
    if path.is_file() {
        return std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()));
    }

    let encoded = match value.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => value,
    };
    STANDARD
        .decode(encoded.trim())
        .map_err(|e| anyhow!("not an existing file and not valid base64: {}", e))
}

fn pretty(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Serve the MCP tools over stdio until the client disconnects
pub async fn start_server() -> Result<()> {
    let service = PhotoReportServer::new().serve(rmcp::transport::stdio()).await?;
    log::info!("Photo report MCP server started");

    let quit_reason = service.waiting().await?;
    log::info!("Server stopped: {:?}", quit_reason);

    Ok(())
}
