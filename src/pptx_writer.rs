//! In-memory slide deck and its serialisation to a PPTX package.

use std::collections::HashSet;
use std::fmt::Write as FmtWrite;
use std::io::{Cursor, Write};

use anyhow::{Context, Result};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::pptx_template::{
    self, PackageBase, CT_SLIDE, EMPTY_GROUP_PROPERTIES, NS_A, NS_P, NS_R, NS_RELS, REL_IMAGE, REL_SLIDE,
    REL_SLIDE_LAYOUT,
};

/// MIME type of generated documents
pub const PPTX_MIME_TYPE: &str = "application/vnd.openxmlformats-officedocument.presentationml.presentation";

/// Image encodings that are embedded without conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaFormat {
    Png,
    Jpeg,
    Gif,
}

impl MediaFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            MediaFormat::Png => "png",
            MediaFormat::Jpeg => "jpeg",
            MediaFormat::Gif => "gif",
        }
    }
}

#[derive(Debug, Clone)]
pub struct MediaItem {
    pub data: Vec<u8>,
    pub format: MediaFormat,
}

/// Caption text styling
#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub font_name: String,
    pub size_pt: f64,
    /// `RRGGBB`
    pub color: String,
}

/// A shape placed on a slide; geometry in EMUs
#[derive(Debug, Clone, PartialEq)]
pub enum SlideShape {
    Picture {
        media: usize,
        x: i64,
        y: i64,
        width: i64,
        height: i64,
        description: String,
    },
    TextBox {
        x: i64,
        y: i64,
        width: i64,
        height: i64,
        paragraphs: Vec<String>,
        style: TextStyle,
    },
}

#[derive(Debug, Clone, Default)]
pub struct DeckSlide {
    pub shapes: Vec<SlideShape>,
}

impl DeckSlide {
    pub fn picture_count(&self) -> usize {
        self.shapes
            .iter()
            .filter(|s| matches!(s, SlideShape::Picture { .. }))
            .count()
    }
}

/// A presentation ready to be written
#[derive(Debug, Clone)]
pub struct Deck {
    pub slide_width: i64,
    pub slide_height: i64,
    pub media: Vec<MediaItem>,
    pub slides: Vec<DeckSlide>,
}

impl Deck {
    pub fn new(slide_width: i64, slide_height: i64) -> Self {
        Self {
            slide_width,
            slide_height,
            media: Vec::new(),
            slides: Vec::new(),
        }
    }

    /// Store an image once and return its media index
    pub fn add_media(&mut self, data: Vec<u8>, format: MediaFormat) -> usize {
        self.media.push(MediaItem { data, format });
        self.media.len() - 1
    }

    pub fn add_slide(&mut self) -> &mut DeckSlide {
        self.slides.push(DeckSlide::default());
        let last = self.slides.len() - 1;
        &mut self.slides[last]
    }

    fn media_part(&self, index: usize) -> String {
        format!(
            "ppt/media/photo_report_{}.{}",
            index + 1,
            self.media[index].format.extension()
        )
    }
}

/// Escape XML special characters.
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Serialise `deck` as a PPTX package, optionally on top of a template
pub fn write_presentation(deck: &Deck, template: Option<&[u8]>) -> Result<Vec<u8>> {
    let base = match template {
        Some(bytes) => PackageBase::from_template(bytes)?,
        None => PackageBase::builtin(),
    };

    // Fresh relationship ids that cannot clash with the base's
    let taken = pptx_template::relationship_ids(&base.presentation_rels);
    let slide_rel_ids = fresh_ids(&taken, deck.slides.len());

    let mut slide_id_list = String::new();
    let mut presentation_rels = String::new();
    let mut overrides = String::new();

    if !deck.slides.is_empty() {
        slide_id_list.push_str("<p:sldIdLst>");
        for (i, rel_id) in slide_rel_ids.iter().enumerate() {
            write!(slide_id_list, r#"<p:sldId id="{}" r:id="{}"/>"#, 256 + i, rel_id)?;
            write!(
                presentation_rels,
                r#"<Relationship Id="{}" Type="{}" Target="slides/slide{}.xml"/>"#,
                rel_id,
                REL_SLIDE,
                i + 1
            )?;
            write!(
                overrides,
                r#"<Override PartName="/ppt/slides/slide{}.xml" ContentType="{}"/>"#,
                i + 1,
                CT_SLIDE
            )?;
        }
        slide_id_list.push_str("</p:sldIdLst>");
    }

    let content_types = pptx_template::rewrite_content_types(&base.content_types, &overrides);
    let presentation = pptx_template::rewrite_presentation(
        &base.presentation,
        &slide_id_list,
        deck.slide_width,
        deck.slide_height,
    );
    let presentation_rels = pptx_template::rewrite_presentation_rels(&base.presentation_rels, &presentation_rels);

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    put(&mut zip, pptx_template::CONTENT_TYPES_PART, content_types.as_bytes(), deflated)?;
    put(&mut zip, pptx_template::PRESENTATION_PART, presentation.as_bytes(), deflated)?;
    put(&mut zip, pptx_template::PRESENTATION_RELS_PART, presentation_rels.as_bytes(), deflated)?;

    for (name, data) in &base.parts {
        put(&mut zip, name, data, deflated)?;
    }

    let layout_target = format!("../{}", base.layout_part.trim_start_matches("ppt/"));
    for (i, slide) in deck.slides.iter().enumerate() {
        let (xml, rels) = slide_xml(deck, slide, &layout_target)?;
        put(&mut zip, &format!("ppt/slides/slide{}.xml", i + 1), xml.as_bytes(), deflated)?;
        put(
            &mut zip,
            &format!("ppt/slides/_rels/slide{}.xml.rels", i + 1),
            rels.as_bytes(),
            deflated,
        )?;
    }

    for (i, media) in deck.media.iter().enumerate() {
        put(&mut zip, &deck.media_part(i), &media.data, stored)?;
    }

    let cursor = zip.finish().context("Failed to finish presentation archive")?;
    Ok(cursor.into_inner())
}

fn put(zip: &mut ZipWriter<Cursor<Vec<u8>>>, name: &str, data: &[u8], options: SimpleFileOptions) -> Result<()> {
    zip.start_file(name, options)
        .with_context(|| format!("Failed to start part {}", name))?;
    zip.write_all(data)
        .with_context(|| format!("Failed to write part {}", name))?;
    Ok(())
}

fn fresh_ids(taken: &HashSet<String>, count: usize) -> Vec<String> {
    let mut ids = Vec::with_capacity(count);
    let mut next = 1;
    while ids.len() < count {
        let candidate = format!("rId{}", next);
        if !taken.contains(&candidate) {
            ids.push(candidate);
        }
        next += 1;
    }
    ids
}

/// Build one slide part and its relationships part
fn slide_xml(deck: &Deck, slide: &DeckSlide, layout_target: &str) -> Result<(String, String)> {
    let mut rels = String::with_capacity(512);
    rels.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    write!(rels, r#"<Relationships xmlns="{}">"#, NS_RELS)?;
    write!(
        rels,
        r#"<Relationship Id="rId1" Type="{}" Target="{}"/>"#,
        REL_SLIDE_LAYOUT, layout_target
    )?;

    // One relationship per distinct media item on this slide
    let mut media_rels: Vec<(usize, String)> = Vec::new();
    for shape in &slide.shapes {
        if let SlideShape::Picture { media, .. } = shape {
            if !media_rels.iter().any(|(m, _)| m == media) {
                let rel_id = format!("rId{}", media_rels.len() + 2);
                write!(
                    rels,
                    r#"<Relationship Id="{}" Type="{}" Target="../{}"/>"#,
                    rel_id,
                    REL_IMAGE,
                    deck.media_part(*media).trim_start_matches("ppt/")
                )?;
                media_rels.push((*media, rel_id));
            }
        }
    }
    rels.push_str("</Relationships>");

    let mut xml = String::with_capacity(2048);
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    write!(xml, r#"<p:sld xmlns:a="{}" xmlns:r="{}" xmlns:p="{}">"#, NS_A, NS_R, NS_P)?;
    xml.push_str("<p:cSld><p:spTree>");
    xml.push_str(EMPTY_GROUP_PROPERTIES);

    for (i, shape) in slide.shapes.iter().enumerate() {
        // Id 1 belongs to the shape tree itself
        let shape_id = i + 2;
        match shape {
            SlideShape::Picture {
                media,
                x,
                y,
                width,
                height,
                description,
            } => {
                let rel_id = media_rels
                    .iter()
                    .find(|(m, _)| m == media)
                    .map(|(_, id)| id.as_str())
                    .unwrap_or("rId1");
                xml.push_str("<p:pic><p:nvPicPr>");
                write!(
                    xml,
                    r#"<p:cNvPr id="{}" name="Picture {}" descr="{}"/>"#,
                    shape_id,
                    shape_id,
                    escape_xml(description)
                )?;
                xml.push_str(r#"<p:cNvPicPr><a:picLocks noChangeAspect="1"/></p:cNvPicPr><p:nvPr/></p:nvPicPr>"#);
                write!(
                    xml,
                    r#"<p:blipFill><a:blip r:embed="{}"/><a:stretch><a:fillRect/></a:stretch></p:blipFill>"#,
                    rel_id
                )?;
                write_shape_properties(&mut xml, *x, *y, *width, *height)?;
                xml.push_str("</p:pic>");
            }
            SlideShape::TextBox {
                x,
                y,
                width,
                height,
                paragraphs,
                style,
            } => {
                xml.push_str("<p:sp><p:nvSpPr>");
                write!(xml, r#"<p:cNvPr id="{}" name="Caption {}"/>"#, shape_id, shape_id)?;
                xml.push_str(r#"<p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr>"#);
                write_shape_properties(&mut xml, *x, *y, *width, *height)?;
                xml.push_str("<p:txBody>");
                xml.push_str(r#"<a:bodyPr wrap="square" lIns="0" tIns="0" rIns="0" bIns="0" rtlCol="0"><a:noAutofit/></a:bodyPr>"#);
                xml.push_str("<a:lstStyle/>");
                for paragraph in paragraphs {
                    xml.push_str("<a:p><a:r>");
                    write!(
                        xml,
                        r#"<a:rPr lang="es-ES" sz="{}" dirty="0">"#,
                        (style.size_pt * 100.0).round() as u32
                    )?;
                    write!(
                        xml,
                        r#"<a:solidFill><a:srgbClr val="{}"/></a:solidFill>"#,
                        escape_xml(&style.color)
                    )?;
                    write!(xml, r#"<a:latin typeface="{}"/>"#, escape_xml(&style.font_name))?;
                    xml.push_str("</a:rPr>");
                    write!(xml, "<a:t>{}</a:t>", escape_xml(paragraph))?;
                    xml.push_str("</a:r></a:p>");
                }
                if paragraphs.is_empty() {
                    xml.push_str("<a:p/>");
                }
                xml.push_str("</p:txBody></p:sp>");
            }
        }
    }

    xml.push_str("</p:spTree></p:cSld>");
    xml.push_str("<p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr>");
    xml.push_str("</p:sld>");

    Ok((xml, rels))
}

fn write_shape_properties(xml: &mut String, x: i64, y: i64, width: i64, height: i64) -> Result<()> {
    xml.push_str("<p:spPr><a:xfrm>");
    write!(xml, r#"<a:off x="{}" y="{}"/>"#, x, y)?;
    write!(xml, r#"<a:ext cx="{}" cy="{}"/>"#, width, height)?;
    xml.push_str("</a:xfrm>");
    xml.push_str(r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom>"#);
    xml.push_str("</p:spPr>");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use zip::ZipArchive;

    fn read_part(bytes: &[u8], name: &str) -> String {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut file = archive.by_name(name).unwrap();
        let mut text = String::new();
        file.read_to_string(&mut text).unwrap();
        text
    }

    fn style() -> TextStyle {
        TextStyle {
            font_name: "Arial".into(),
            size_pt: 9.0,
            color: "FF0000".into(),
        }
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("a<b & \"c\""), "a&lt;b &amp; &quot;c&quot;");
    }

    #[test]
    fn test_write_empty_deck() {
        let deck = Deck::new(12_192_000, 6_858_000);
        let bytes = write_presentation(&deck, None).unwrap();
        let presentation = read_part(&bytes, "ppt/presentation.xml");
        assert!(presentation.contains(r#"<p:sldSz cx="12192000" cy="6858000"/>"#));
        assert!(!presentation.contains("sldIdLst"));
    }

    #[test]
    fn test_write_slides_with_shared_media() {
        let mut deck = Deck::new(12_192_000, 6_858_000);
        let background = deck.add_media(vec![1, 2, 3], MediaFormat::Png);
        let photo = deck.add_media(vec![4, 5, 6], MediaFormat::Jpeg);
        for _ in 0..2 {
            let slide = deck.add_slide();
            slide.shapes.push(SlideShape::Picture {
                media: background,
                x: 0,
                y: 0,
                width: 12_192_000,
                height: 6_858_000,
                description: "background".into(),
            });
            slide.shapes.push(SlideShape::TextBox {
                x: 10,
                y: 10,
                width: 100,
                height: 100,
                paragraphs: vec!["tienda: Norte & Sur".into(), "zona: 1".into()],
                style: style(),
            });
            slide.shapes.push(SlideShape::Picture {
                media: photo,
                x: 10,
                y: 200,
                width: 300,
                height: 400,
                description: "row 3".into(),
            });
        }

        let bytes = write_presentation(&deck, None).unwrap();
        let mut archive = ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
        let names: Vec<String> = archive.file_names().map(|s| s.to_string()).collect();
        assert_eq!(names.iter().filter(|n| n.starts_with("ppt/media/")).count(), 2);
        assert!(archive.by_name("ppt/slides/slide2.xml").is_ok());

        let slide = read_part(&bytes, "ppt/slides/slide1.xml");
        assert!(slide.contains("tienda: Norte &amp; Sur"));
        assert!(slide.contains(r#"sz="900""#));
        assert!(slide.contains(r#"<a:srgbClr val="FF0000"/>"#));
        // Background comes first in the shape tree
        assert!(slide.find("background").unwrap() < slide.find("row 3").unwrap());

        let rels = read_part(&bytes, "ppt/slides/_rels/slide1.xml.rels");
        assert!(rels.contains("../slideLayouts/slideLayout1.xml"));
        assert!(rels.contains("../media/photo_report_1.png"));
        assert!(rels.contains("../media/photo_report_2.jpeg"));

        let content_types = read_part(&bytes, "[Content_Types].xml");
        assert!(content_types.contains("/ppt/slides/slide2.xml"));
        assert!(content_types.contains(r#"Extension="jpeg""#));

        let presentation = read_part(&bytes, "ppt/presentation.xml");
        assert_eq!(presentation.matches("<p:sldId ").count(), 2);
    }

    #[test]
    fn test_fresh_ids_skip_taken() {
        let taken: HashSet<String> = ["rId1", "rId3"].iter().map(|s| s.to_string()).collect();
        assert_eq!(fresh_ids(&taken, 3), vec!["rId2", "rId4", "rId5"]);
    }

    #[test]
    fn test_template_slides_are_replaced() {
        // Use a generated deck as the template
        let mut template_deck = Deck::new(9_144_000, 6_858_000);
        template_deck.add_slide();
        template_deck.add_slide();
        template_deck.add_slide();
        let template = write_presentation(&template_deck, None).unwrap();

        let mut deck = Deck::new(12_192_000, 6_858_000);
        deck.add_slide();
        let bytes = write_presentation(&deck, Some(&template)).unwrap();

        let mut archive = ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
        assert!(archive.by_name("ppt/slides/slide1.xml").is_ok());
        assert!(archive.by_name("ppt/slides/slide2.xml").is_err());

        let presentation = read_part(&bytes, "ppt/presentation.xml");
        assert_eq!(presentation.matches("<p:sldId ").count(), 1);
        assert!(presentation.contains(r#"cx="12192000""#));

        let rels = read_part(&bytes, "ppt/_rels/presentation.xml.rels");
        assert_eq!(rels.matches("slides/slide").count(), 1);
    }

    #[test]
    fn test_template_media_of_old_slides_is_dropped() {
        let picture = |media| SlideShape::Picture {
            media,
            x: 0,
            y: 0,
            width: 914_400,
            height: 914_400,
            description: String::new(),
        };

        let mut template_deck = Deck::new(9_144_000, 6_858_000);
        let old = template_deck.add_media(b"old".to_vec(), MediaFormat::Png);
        template_deck.add_slide().shapes.push(picture(old));
        let template = write_presentation(&template_deck, None).unwrap();

        let mut deck = Deck::new(12_192_000, 6_858_000);
        let new = deck.add_media(b"new".to_vec(), MediaFormat::Png);
        deck.add_slide().shapes.push(picture(new));
        let bytes = write_presentation(&deck, Some(&template)).unwrap();

        let mut archive = ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
        let mut file = archive.by_name("ppt/media/photo_report_1.png").unwrap();
        let mut data = Vec::new();
        file.read_to_end(&mut data).unwrap();
        assert_eq!(data, b"new");
    }
}
