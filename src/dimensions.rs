//! Slide geometry and aspect-preserving image scaling.
//!
//! All lengths are in inches unless a name says otherwise.

use crate::error::LayoutError;

/// Pixel density assumed when converting image pixels to inches
pub const PIXELS_PER_INCH: f64 = 96.0;

/// English Metric Units per inch, the unit PPTX geometry is stored in
pub const EMU_PER_INCH: f64 = 914_400.0;

pub const SLIDE_WIDTH: f64 = 13.33;
pub const SLIDE_HEIGHT: f64 = 7.5;

/// Left edge of the first slot; the same margin is kept on the right
pub const LEFT_MARGIN: f64 = 0.25;

/// Gap kept between neighbouring slots
pub const HORIZONTAL_MARGIN: f64 = 0.25;

/// Top of the caption band
pub const CAPTION_TOP: f64 = 0.2;

/// Height of one caption line at the default 9pt size
pub const CAPTION_LINE_HEIGHT: f64 = 0.16;

/// Space between the caption band and the image
pub const CAPTION_GAP: f64 = 0.1;

/// Caption lines beyond this count do not grow the caption band
pub const MAX_CAPTION_LINES: usize = 6;

/// Width shared by all slots on a slide
pub fn usable_slide_width() -> f64 {
    SLIDE_WIDTH - 2.0 * LEFT_MARGIN
}

/// Width of one horizontal slot
pub fn slot_width(images_per_slide: usize) -> f64 {
    usable_slide_width() / images_per_slide.max(1) as f64
}

/// Left edge of slot `slot` (0-based)
pub fn slot_x(slot: usize, images_per_slide: usize) -> f64 {
    slot_width(images_per_slide) * slot as f64 + LEFT_MARGIN
}

/// Vertical space above the image reserved for the caption band.
///
/// Grows linearly with the line count up to `MAX_CAPTION_LINES`, then stays flat.
pub fn caption_reserved_height(caption_line_count: usize) -> f64 {
    let lines = caption_line_count.min(MAX_CAPTION_LINES) as f64;
    CAPTION_TOP + lines * CAPTION_LINE_HEIGHT + CAPTION_GAP
}

/// Height of the caption text box itself
pub fn caption_box_height(caption_line_count: usize) -> f64 {
    caption_line_count.min(MAX_CAPTION_LINES) as f64 * CAPTION_LINE_HEIGHT
}

/// Maximum image width within one slot
pub fn available_width(images_per_slide: usize) -> f64 {
    slot_width(images_per_slide) - HORIZONTAL_MARGIN
}

/// Maximum image height below a caption band of `caption_line_count` lines.
///
/// The image starts right under the band and may reach the bottom edge.
pub fn available_height(caption_line_count: usize) -> f64 {
    SLIDE_HEIGHT - caption_reserved_height(caption_line_count)
}

/// Scale a `pixel_width` x `pixel_height` image into its slot, in inches.
///
/// Both axes use the same factor so the aspect ratio is kept. Zero-sized
/// images are `Unreadable`.
pub fn scale(
    pixel_width: u32,
    pixel_height: u32,
    images_per_slide: usize,
    caption_line_count: usize,
) -> Result<(f64, f64), LayoutError> {
    if pixel_width == 0 || pixel_height == 0 {
        return Err(LayoutError::Unreadable(format!(
            "zero image dimension {}x{}",
            pixel_width, pixel_height
        )));
    }

    let width_in = pixel_width as f64 / PIXELS_PER_INCH;
    let height_in = pixel_height as f64 / PIXELS_PER_INCH;

    let ratio = f64::min(
        available_width(images_per_slide) / width_in,
        available_height(caption_line_count) / height_in,
    );

    Ok((width_in * ratio, height_in * ratio))
}

/// Convert inches to EMUs
pub fn to_emu(inches: f64) -> i64 {
    (inches * EMU_PER_INCH).round() as i64
}
