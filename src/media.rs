use std::io::Cursor;
use std::path::Path;

use image::{ImageFormat, ImageReader};

use crate::error::LayoutError;
use crate::pptx_writer::MediaFormat;

/// An image ready to embed, with its pixel size
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub data: Vec<u8>,
    pub format: MediaFormat,
    pub width_px: u32,
    pub height_px: u32,
}

/// Read an image file from disk and prepare it for embedding
pub fn load_image_file(path: &Path) -> Result<LoadedImage, LayoutError> {
    let data = std::fs::read(path)
        .map_err(|e| LayoutError::Unreadable(format!("{}: {}", path.display(), e)))?;
    prepare_image(data)
}

/// Measure an image and convert it to PNG unless it is already PNG, JPEG or GIF
pub fn prepare_image(data: Vec<u8>) -> Result<LoadedImage, LayoutError> {
    let reader = ImageReader::new(Cursor::new(data.as_slice()))
        .with_guessed_format()
        .map_err(|e| LayoutError::Unreadable(e.to_string()))?;

    let format = reader
        .format()
        .ok_or_else(|| LayoutError::Unreadable("unknown image format".to_string()))?;

    let embedded = match format {
        ImageFormat::Png => Some(MediaFormat::Png),
        ImageFormat::Jpeg => Some(MediaFormat::Jpeg),
        ImageFormat::Gif => Some(MediaFormat::Gif),
        _ => None,
    };

    match embedded {
        Some(media_format) => {
            let (width_px, height_px) = reader
                .into_dimensions()
                .map_err(|e| LayoutError::Unreadable(e.to_string()))?;
            Ok(LoadedImage {
                data,
                format: media_format,
                width_px,
                height_px,
            })
        }
        None => {
            let decoded = reader
                .decode()
                .map_err(|e| LayoutError::Unreadable(e.to_string()))?;
            let mut png = Cursor::new(Vec::new());
            decoded
                .write_to(&mut png, ImageFormat::Png)
                .map_err(|e| LayoutError::Unreadable(e.to_string()))?;
            log::debug!("Converted {:?} image to PNG", format);
            Ok(LoadedImage {
                data: png.into_inner(),
                format: MediaFormat::Png,
                width_px: decoded.width(),
                height_px: decoded.height(),
            })
        }
    }
}
