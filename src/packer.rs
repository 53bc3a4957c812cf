//! Chunking records into slides and placing images and captions on them.

use crate::caption;
use crate::diagnostics::{emit, Diagnostic, DiagnosticSender};
use crate::dimensions::{self, to_emu, SLIDE_HEIGHT, SLIDE_WIDTH};
use crate::media::{self, LoadedImage};
use crate::pptx_writer::{Deck, SlideShape, TextStyle};
use crate::record::Record;

/// Records assigned to one slide
#[derive(Debug, Clone, PartialEq)]
pub struct SlideSpec {
    /// 1-based position within the document
    pub position: usize,
    pub records: Vec<Record>,
}

/// Styling shared by every document of a run
#[derive(Debug, Clone)]
pub struct DocumentStyle {
    pub images_per_slide: usize,
    pub caption_columns: Vec<String>,
    pub text_style: TextStyle,
    /// Prepared once, drawn full-bleed behind every slide
    pub background: Option<LoadedImage>,
}

/// One output document before rendering
#[derive(Debug, Clone)]
pub struct DocumentSpec<'a> {
    pub label: String,
    pub slides: Vec<SlideSpec>,
    pub style: &'a DocumentStyle,
}

/// Counts collected while rendering a document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub slides: usize,
    pub images_placed: usize,
    pub images_skipped: usize,
}

/// Split records into consecutive groups of `images_per_slide`, keeping order.
///
/// The last group may be shorter. No records means no slides.
pub fn pack(records: Vec<Record>, images_per_slide: usize) -> Vec<SlideSpec> {
    let per_slide = images_per_slide.max(1);
    let mut slides = Vec::with_capacity(records.len().div_ceil(per_slide));
    let mut current = Vec::with_capacity(per_slide);

    for record in records {
        current.push(record);
        if current.len() == per_slide {
            slides.push(SlideSpec {
                position: slides.len() + 1,
                records: std::mem::replace(&mut current, Vec::with_capacity(per_slide)),
            });
        }
    }
    if !current.is_empty() {
        slides.push(SlideSpec {
            position: slides.len() + 1,
            records: current,
        });
    }

    slides
}

/// Render a document's slides into a deck.
///
/// Images that cannot be read leave their slot empty; the rest of the slide
/// is still drawn.
pub fn render(document: &DocumentSpec<'_>, diagnostics: Option<&DiagnosticSender>) -> (Deck, RenderStats) {
    let style = document.style;
    let per_slide = style.images_per_slide.max(1);
    let mut deck = Deck::new(to_emu(SLIDE_WIDTH), to_emu(SLIDE_HEIGHT));
    let mut stats = RenderStats::default();

    let background = style
        .background
        .as_ref()
        .map(|image| deck.add_media(image.data.clone(), image.format));

    for spec in &document.slides {
        let mut shapes = Vec::new();

        if let Some(media) = background {
            shapes.push(SlideShape::Picture {
                media,
                x: 0,
                y: 0,
                width: deck.slide_width,
                height: deck.slide_height,
                description: "background".to_string(),
            });
        }

        for (slot, record) in spec.records.iter().enumerate() {
            let lines = caption::build(record, &style.caption_columns);

            let placed = record
                .image_path()
                .ok_or_else(|| crate::error::LayoutError::Unreadable("no local image".to_string()))
                .and_then(media::load_image_file)
                .and_then(|image| {
                    dimensions::scale(image.width_px, image.height_px, per_slide, lines.len())
                        .map(|size| (image, size))
                });

            let (image, (width, height)) = match placed {
                Ok(placed) => placed,
                Err(e) => {
                    log::debug!("Skipping image of row {}: {}", record.index, e);
                    emit(
                        diagnostics,
                        Diagnostic::ImageSkipped {
                            index: record.index,
                            reason: e.to_string(),
                        },
                    );
                    stats.images_skipped += 1;
                    continue;
                }
            };

            let x = dimensions::slot_x(slot, per_slide);

            if !lines.is_empty() {
                shapes.push(SlideShape::TextBox {
                    x: to_emu(x),
                    y: to_emu(dimensions::CAPTION_TOP),
                    width: to_emu(dimensions::available_width(per_slide)),
                    height: to_emu(dimensions::caption_box_height(lines.len())),
                    paragraphs: lines.clone(),
                    style: style.text_style.clone(),
                });
            }

            let media = deck.add_media(image.data, image.format);
            shapes.push(SlideShape::Picture {
                media,
                x: to_emu(x),
                y: to_emu(dimensions::caption_reserved_height(lines.len())),
                width: to_emu(width),
                height: to_emu(height),
                description: format!("row {}", record.index),
            });
            stats.images_placed += 1;
        }

        deck.add_slide().shapes = shapes;
        stats.slides += 1;
    }

    (deck, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Value;
    use image::{DynamicImage, ImageFormat, RgbImage};
    use std::path::Path;

    fn records(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| Record::new(i, vec![("id".into(), Value::Int(i as i64))]))
            .collect()
    }

    fn style(images_per_slide: usize, caption_columns: &[&str]) -> DocumentStyle {
        DocumentStyle {
            images_per_slide,
            caption_columns: caption_columns.iter().map(|s| s.to_string()).collect(),
            text_style: TextStyle {
                font_name: "Calibri".into(),
                size_pt: 9.0,
                color: "000000".into(),
            },
            background: None,
        }
    }

    fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> std::path::PathBuf {
        let path = dir.join(name);
        DynamicImage::ImageRgb8(RgbImage::new(width, height))
            .save_with_format(&path, ImageFormat::Png)
            .unwrap();
        path
    }

    #[test]
    fn test_pack_slide_counts() {
        for per_slide in 1..=4 {
            for n in 0..=13 {
                let slides = pack(records(n), per_slide);
                assert_eq!(slides.len(), n.div_ceil(per_slide));
                assert!(slides.iter().all(|s| s.records.len() <= per_slide));
                if let Some(last) = slides.last() {
                    let expected = if n % per_slide == 0 { per_slide } else { n % per_slide };
                    assert_eq!(last.records.len(), expected);
                }
            }
        }
    }

    #[test]
    fn test_pack_keeps_order_and_positions() {
        let slides = pack(records(5), 2);
        let positions: Vec<_> = slides.iter().map(|s| s.position).collect();
        assert_eq!(positions, vec![1, 2, 3]);
        let order: Vec<_> = slides.iter().flat_map(|s| s.records.iter().map(|r| r.index)).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_render_places_captions_above_images() {
        let dir = tempfile::tempdir().unwrap();
        let mut rows = records(3);
        for (i, record) in rows.iter_mut().enumerate() {
            record.image_local_path = Some(write_png(dir.path(), &format!("img_{}.png", i), 200, 100));
        }

        let style = style(2, &["id"]);
        let document = DocumentSpec {
            label: "test".into(),
            slides: pack(rows, 2),
            style: &style,
        };
        let (deck, stats) = render(&document, None);

        assert_eq!(stats, RenderStats { slides: 2, images_placed: 3, images_skipped: 0 });
        assert_eq!(deck.slides.len(), 2);
        assert_eq!(deck.slides[0].picture_count(), 2);
        assert_eq!(deck.slides[1].picture_count(), 1);

        let mut caption_bottom = 0;
        let mut image_top = i64::MAX;
        for shape in &deck.slides[0].shapes {
            match shape {
                SlideShape::TextBox { y, height, .. } => caption_bottom = caption_bottom.max(y + height),
                SlideShape::Picture { y, .. } => image_top = image_top.min(*y),
            }
        }
        assert!(caption_bottom <= image_top);
    }

    #[test]
    fn test_unreadable_image_leaves_empty_slot() {
        let dir = tempfile::tempdir().unwrap();
        let mut rows = records(2);
        rows[0].image_local_path = Some(write_png(dir.path(), "img_0.png", 50, 50));
        let broken = dir.path().join("img_1.jpg");
        std::fs::write(&broken, b"not an image").unwrap();
        rows[1].image_local_path = Some(broken);

        let style = style(2, &["id"]);
        let document = DocumentSpec {
            label: "test".into(),
            slides: pack(rows, 2),
            style: &style,
        };
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let (deck, stats) = render(&document, Some(&tx));

        assert_eq!(stats.images_placed, 1);
        assert_eq!(stats.images_skipped, 1);
        assert_eq!(deck.slides.len(), 1);
        // One caption and one picture for the readable row only
        assert_eq!(deck.slides[0].shapes.len(), 2);
        assert!(matches!(rx.try_recv(), Ok(Diagnostic::ImageSkipped { index: 1, .. })));
    }

    #[test]
    fn test_background_drawn_first_on_every_slide() {
        let dir = tempfile::tempdir().unwrap();
        let mut rows = records(2);
        for (i, record) in rows.iter_mut().enumerate() {
            record.image_local_path = Some(write_png(dir.path(), &format!("img_{}.png", i), 10, 10));
        }
        let background = media::load_image_file(&write_png(dir.path(), "bg.png", 16, 9)).unwrap();

        let mut style = style(1, &[]);
        style.background = Some(background);
        let document = DocumentSpec {
            label: "test".into(),
            slides: pack(rows, 1),
            style: &style,
        };
        let (deck, _) = render(&document, None);

        // Background stored once, plus one media item per photo
        assert_eq!(deck.media.len(), 3);
        for slide in &deck.slides {
            assert!(matches!(
                slide.shapes.first(),
                Some(SlideShape::Picture { media: 0, x: 0, y: 0, .. })
            ));
            // No caption columns selected, so no text boxes
            assert!(slide.shapes.iter().all(|s| matches!(s, SlideShape::Picture { .. })));
        }
    }
}
