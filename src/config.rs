use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::record::Dataset;

/// Upper bound for images placed on one slide
pub const MAX_IMAGES_PER_SLIDE: usize = 4;

/// Upper bound for caption columns
pub const MAX_CAPTION_COLUMNS: usize = 8;

/// Configuration for the concurrent image download phase
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub concurrency_limit: usize,
    pub request_timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: 16,
            request_timeout: Duration::from_secs(5),
        }
    }
}

/// Options controlling one report generation run
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Caption text colour as `RRGGBB` (a leading `#` is accepted)
    pub font_color: String,
    pub font_name: String,
    pub font_size_pt: f64,
    pub images_per_slide: usize,
    /// Columns rendered as caption lines, in this order
    pub caption_columns: Vec<String>,
    pub sort_column: Option<String>,
    pub partition_column: Option<String>,
    /// Skip URL detection and read image URLs from this column
    pub image_column: Option<String>,
    #[serde(skip)]
    pub background_image: Option<Vec<u8>>,
    #[serde(skip)]
    pub template_document: Option<Vec<u8>>,
    pub concurrency_limit: usize,
    pub request_timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        let fetch = FetchConfig::default();
        Self {
            font_color: "000000".to_string(),
            font_name: "Calibri".to_string(),
            font_size_pt: 9.0,
            images_per_slide: 1,
            caption_columns: Vec::new(),
            sort_column: None,
            partition_column: None,
            image_column: None,
            background_image: None,
            template_document: None,
            concurrency_limit: fetch.concurrency_limit,
            request_timeout_secs: fetch.request_timeout.as_secs(),
        }
    }
}

impl GenerationConfig {
    /// Check option ranges that do not depend on the dataset
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_IMAGES_PER_SLIDE).contains(&self.images_per_slide) {
            return Err(ConfigError::ImagesPerSlide(self.images_per_slide));
        }
        if self.caption_columns.len() > MAX_CAPTION_COLUMNS {
            return Err(ConfigError::TooManyCaptionColumns(self.caption_columns.len()));
        }
        if self.concurrency_limit == 0 {
            return Err(ConfigError::ConcurrencyLimit);
        }
        normalize_hex_color(&self.font_color)?;
        Ok(())
    }

    /// Check that every referenced column exists in the dataset
    pub fn validate_columns(&self, dataset: &Dataset) -> Result<(), ConfigError> {
        let referenced = self
            .sort_column
            .iter()
            .chain(self.partition_column.iter())
            .chain(self.image_column.iter());

        for column in referenced {
            if !dataset.has_column(column) {
                return Err(ConfigError::UnknownColumn(column.clone()));
            }
        }
        Ok(())
    }

    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            concurrency_limit: self.concurrency_limit,
            request_timeout: Duration::from_secs(self.request_timeout_secs.max(1)),
        }
    }

    /// Caption colour without the leading `#`, upper-cased
    pub fn font_color_hex(&self) -> Result<String, ConfigError> {
        normalize_hex_color(&self.font_color)
    }
}

fn normalize_hex_color(color: &str) -> Result<String, ConfigError> {
    let hex = color.trim().trim_start_matches('#');
    if hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(hex.to_ascii_uppercase())
    } else {
        Err(ConfigError::FontColor(color.to_string()))
    }
}
