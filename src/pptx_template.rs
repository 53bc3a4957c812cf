//! Base parts a generated presentation is built on.
//!
//! Either a minimal built-in package (one master, one blank layout, one theme)
//! or the parts of a caller-supplied template with its slides removed.

use std::collections::HashSet;
use std::io::{Cursor, Read};

use anyhow::{anyhow, Context, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use zip::ZipArchive;

pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
pub const PRESENTATION_PART: &str = "ppt/presentation.xml";
pub const PRESENTATION_RELS_PART: &str = "ppt/_rels/presentation.xml.rels";

pub const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
pub const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
pub const NS_P: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";
pub const NS_RELS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

pub const REL_SLIDE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide";
pub const REL_SLIDE_LAYOUT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout";
pub const REL_IMAGE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

pub const CT_SLIDE: &str = "application/vnd.openxmlformats-officedocument.presentationml.slide+xml";

/// Layout used when a template has no layout marked `blank`
const FALLBACK_LAYOUT_POSITION: usize = 6;

lazy_static::lazy_static! {
    static ref SLIDE_RELATIONSHIP: Regex = Regex::new(
        r#"<Relationship\s[^>]*?Type="http://schemas\.openxmlformats\.org/officeDocument/2006/relationships/slide"[^>]*/>"#
    ).unwrap();
    static ref SLIDE_OVERRIDE: Regex = Regex::new(
        r#"<Override\s[^>]*?PartName="/ppt/(slides|notesSlides|comments)/[^"]*"[^>]*/>"#
    ).unwrap();
    static ref SLIDE_ID_LIST: Regex = Regex::new(r"(?s)<p:sldIdLst\s*/>|<p:sldIdLst>.*?</p:sldIdLst>").unwrap();
    static ref SLIDE_SIZE: Regex = Regex::new(r"<p:sldSz\s[^>]*/>").unwrap();
    static ref SECTION_EXTENSION: Regex = Regex::new(
        r#"(?s)<p:ext uri="\{521415D9-36F7-43E2-AB2F-B90AF26B5E84\}">.*?</p:ext>"#
    ).unwrap();
    static ref LAYOUT_PART: Regex = Regex::new(r"^ppt/slideLayouts/slideLayout(\d+)\.xml$").unwrap();
}

/// Parts a presentation is assembled from, before slides are added
#[derive(Debug, Clone)]
pub struct PackageBase {
    /// Parts copied into the output unchanged
    pub parts: Vec<(String, Vec<u8>)>,
    pub content_types: String,
    pub presentation: String,
    pub presentation_rels: String,
    /// Part name of the layout every generated slide uses
    pub layout_part: String,
}

impl PackageBase {
    /// Minimal built-in package
    pub fn builtin() -> Self {
        let parts = vec![
            ("_rels/.rels".to_string(), PACKAGE_RELS.as_bytes().to_vec()),
            ("docProps/app.xml".to_string(), APP_PROPS.as_bytes().to_vec()),
            ("docProps/core.xml".to_string(), core_props_xml().into_bytes()),
            ("ppt/slideMasters/slideMaster1.xml".to_string(), slide_master_xml().into_bytes()),
            (
                "ppt/slideMasters/_rels/slideMaster1.xml.rels".to_string(),
                SLIDE_MASTER_RELS.as_bytes().to_vec(),
            ),
            ("ppt/slideLayouts/slideLayout1.xml".to_string(), blank_layout_xml().into_bytes()),
            (
                "ppt/slideLayouts/_rels/slideLayout1.xml.rels".to_string(),
                SLIDE_LAYOUT_RELS.as_bytes().to_vec(),
            ),
            ("ppt/theme/theme1.xml".to_string(), theme_xml().into_bytes()),
        ];

        Self {
            parts,
            content_types: CONTENT_TYPES.to_string(),
            presentation: presentation_xml(),
            presentation_rels: PRESENTATION_RELS.to_string(),
            layout_part: "ppt/slideLayouts/slideLayout1.xml".to_string(),
        }
    }

    /// Seed from a template document: keep masters, layouts, theme and
    /// everything else, drop its slides.
    pub fn from_template(bytes: &[u8]) -> Result<Self> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))
            .context("Failed to read template as ZIP archive")?;

        let mut parts = Vec::new();
        let mut content_types = None;
        let mut presentation = None;
        let mut presentation_rels = None;

        for i in 0..archive.len() {
            let mut file = archive
                .by_index(i)
                .with_context(|| format!("Failed to read template entry {}", i))?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            if is_slide_content(&name) {
                continue;
            }

            let mut data = Vec::new();
            file.read_to_end(&mut data)
                .with_context(|| format!("Failed to read template part {}", name))?;

            match name.as_str() {
                CONTENT_TYPES_PART => content_types = Some(into_text(&name, data)?),
                PRESENTATION_PART => presentation = Some(into_text(&name, data)?),
                PRESENTATION_RELS_PART => presentation_rels = Some(into_text(&name, data)?),
                _ => parts.push((name, data)),
            }
        }

        // Media used only by the dropped slides could clash with new media parts
        let rels: Vec<String> = parts
            .iter()
            .filter(|(name, _)| name.ends_with(".rels"))
            .map(|(_, data)| String::from_utf8_lossy(data).into_owned())
            .collect();
        parts.retain(|(name, _)| {
            !name.starts_with("ppt/media/")
                || name
                    .rsplit('/')
                    .next()
                    .is_some_and(|file| rels.iter().any(|text| text.contains(file)))
        });

        let layout_part = choose_layout(&parts)?;
        log::debug!("Template slides will use {}", layout_part);

        Ok(Self {
            parts,
            content_types: content_types.ok_or_else(|| anyhow!("Template has no {}", CONTENT_TYPES_PART))?,
            presentation: presentation.ok_or_else(|| anyhow!("Template has no {}", PRESENTATION_PART))?,
            presentation_rels: presentation_rels
                .ok_or_else(|| anyhow!("Template has no {}", PRESENTATION_RELS_PART))?,
            layout_part,
        })
    }
}

fn is_slide_content(name: &str) -> bool {
    name.starts_with("ppt/slides/") || name.starts_with("ppt/notesSlides/") || name.starts_with("ppt/comments/")
}

fn into_text(name: &str, data: Vec<u8>) -> Result<String> {
    String::from_utf8(data).with_context(|| format!("Template part {} is not UTF-8", name))
}

/// Pick the blank layout, else the seventh layout, else the first
fn choose_layout(parts: &[(String, Vec<u8>)]) -> Result<String> {
    let mut layouts: Vec<(usize, &str, &[u8])> = parts
        .iter()
        .filter_map(|(name, data)| {
            LAYOUT_PART
                .captures(name)
                .and_then(|c| c[1].parse().ok())
                .map(|n: usize| (n, name.as_str(), data.as_slice()))
        })
        .collect();
    layouts.sort_by_key(|(n, _, _)| *n);

    if let Some((_, name, _)) = layouts.iter().find(|(_, _, data)| layout_type(data).as_deref() == Some("blank")) {
        return Ok(name.to_string());
    }

    layouts
        .get(FALLBACK_LAYOUT_POSITION)
        .or_else(|| layouts.first())
        .map(|(_, name, _)| name.to_string())
        .ok_or_else(|| anyhow!("Template has no slide layouts"))
}

/// Read the `type` attribute of a layout's root element
fn layout_type(xml: &[u8]) -> Option<String> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                if e.local_name().as_ref() != b"sldLayout" {
                    return None;
                }
                return e
                    .attributes()
                    .flatten()
                    .find(|attr| attr.key.as_ref() == b"type")
                    .map(|attr| String::from_utf8_lossy(&attr.value).into_owned());
            }
            Ok(Event::Eof) => return None,
            Err(e) => {
                log::warn!("Error parsing slide layout XML: {}", e);
                return None;
            }
            _ => {}
        }
        buf.clear();
    }
}

/// Collect the `Id` attributes of a relationships part
pub fn relationship_ids(xml: &str) -> HashSet<String> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut ids = HashSet::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                if e.local_name().as_ref() == b"Relationship" {
                    if let Some(attr) = e.attributes().flatten().find(|a| a.key.as_ref() == b"Id") {
                        ids.insert(String::from_utf8_lossy(&attr.value).into_owned());
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                log::warn!("Error parsing relationships XML: {}", e);
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    ids
}

/// Drop slide relationships and append `extra` before the closing tag
pub fn rewrite_presentation_rels(rels: &str, extra: &str) -> String {
    let stripped = SLIDE_RELATIONSHIP.replace_all(rels, "");
    insert_before_last(&stripped, "</Relationships>", extra)
}

/// Replace the slide list and slide size of presentation.xml
pub fn rewrite_presentation(presentation: &str, slide_id_list: &str, width_emu: i64, height_emu: i64) -> String {
    let without_sections = SECTION_EXTENSION.replace_all(presentation, "");
    let without_slides = SLIDE_ID_LIST.replace_all(&without_sections, "");
    let size = format!(r#"<p:sldSz cx="{}" cy="{}"/>"#, width_emu, height_emu);

    // The slide list sits right before the slide size
    if SLIDE_SIZE.is_match(&without_slides) {
        let replacement = format!("{}{}", slide_id_list, size);
        SLIDE_SIZE.replace(&without_slides, regex::NoExpand(&replacement)).into_owned()
    } else {
        insert_before_first(&without_slides, "<p:notesSz", &format!("{}{}", slide_id_list, size))
    }
}

/// Drop slide overrides, make sure image defaults exist and add `overrides`
pub fn rewrite_content_types(content_types: &str, overrides: &str) -> String {
    let mut result = SLIDE_OVERRIDE.replace_all(content_types, "").into_owned();

    let lower = result.to_lowercase();
    let mut defaults = String::new();
    for (extension, content_type) in [("png", "image/png"), ("jpeg", "image/jpeg"), ("jpg", "image/jpeg"), ("gif", "image/gif")] {
        if !lower.contains(&format!("extension=\"{}\"", extension)) {
            defaults.push_str(&format!(
                r#"<Default Extension="{}" ContentType="{}"/>"#,
                extension, content_type
            ));
        }
    }

    result = insert_before_last(&result, "</Types>", &defaults);
    insert_before_last(&result, "</Types>", overrides)
}

fn insert_before_last(haystack: &str, marker: &str, insert: &str) -> String {
    match haystack.rfind(marker) {
        Some(pos) => format!("{}{}{}", &haystack[..pos], insert, &haystack[pos..]),
        None => format!("{}{}", haystack, insert),
    }
}

fn insert_before_first(haystack: &str, marker: &str, insert: &str) -> String {
    match haystack.find(marker) {
        Some(pos) => format!("{}{}{}", &haystack[..pos], insert, &haystack[pos..]),
        None => haystack.to_string(),
    }
}

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

const CONTENT_TYPES: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
    r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
    r#"<Default Extension="xml" ContentType="application/xml"/>"#,
    r#"<Override PartName="/ppt/presentation.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml"/>"#,
    r#"<Override PartName="/ppt/slideMasters/slideMaster1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slideMaster+xml"/>"#,
    r#"<Override PartName="/ppt/slideLayouts/slideLayout1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml"/>"#,
    r#"<Override PartName="/ppt/theme/theme1.xml" ContentType="application/vnd.openxmlformats-officedocument.theme+xml"/>"#,
    r#"<Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/>"#,
    r#"<Override PartName="/docProps/app.xml" ContentType="application/vnd.openxmlformats-officedocument.extended-properties+xml"/>"#,
    r#"</Types>"#
);

const PACKAGE_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="ppt/presentation.xml"/>"#,
    r#"<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/>"#,
    r#"<Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/extended-properties" Target="docProps/app.xml"/>"#,
    r#"</Relationships>"#
);

const APP_PROPS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties">"#,
    r#"<Application>photo_report_mcp</Application>"#,
    r#"</Properties>"#
);

const PRESENTATION_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster" Target="slideMasters/slideMaster1.xml"/>"#,
    r#"<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/theme" Target="theme/theme1.xml"/>"#,
    r#"</Relationships>"#
);

const SLIDE_MASTER_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout" Target="../slideLayouts/slideLayout1.xml"/>"#,
    r#"<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/theme" Target="../theme/theme1.xml"/>"#,
    r#"</Relationships>"#
);

const SLIDE_LAYOUT_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster" Target="../slideMasters/slideMaster1.xml"/>"#,
    r#"</Relationships>"#
);

/// Empty shape tree shared by master, layout and slides
pub const EMPTY_GROUP_PROPERTIES: &str = concat!(
    r#"<p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr>"#,
    r#"<p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/>"#,
    r#"<a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr>"#
);

fn presentation_xml() -> String {
    format!(
        concat!(
            r#"{}<p:presentation xmlns:a="{}" xmlns:r="{}" xmlns:p="{}" saveSubsetFonts="1">"#,
            r#"<p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst>"#,
            r#"<p:sldSz cx="9144000" cy="6858000"/><p:notesSz cx="6858000" cy="9144000"/>"#,
            r#"</p:presentation>"#
        ),
        XML_DECLARATION, NS_A, NS_R, NS_P
    )
}

fn slide_master_xml() -> String {
    format!(
        concat!(
            r#"{}<p:sldMaster xmlns:a="{}" xmlns:r="{}" xmlns:p="{}">"#,
            r#"<p:cSld><p:bg><p:bgRef idx="1001"><a:schemeClr val="bg1"/></p:bgRef></p:bg>"#,
            r#"<p:spTree>{}</p:spTree></p:cSld>"#,
            r#"<p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" "#,
            r#"accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink"/>"#,
            r#"<p:sldLayoutIdLst><p:sldLayoutId id="2147483649" r:id="rId1"/></p:sldLayoutIdLst>"#,
            r#"<p:txStyles>"#,
            r#"<p:titleStyle><a:lvl1pPr><a:defRPr sz="4400"/></a:lvl1pPr></p:titleStyle>"#,
            r#"<p:bodyStyle><a:lvl1pPr><a:defRPr sz="1800"/></a:lvl1pPr></p:bodyStyle>"#,
            r#"<p:otherStyle><a:lvl1pPr><a:defRPr sz="1800"/></a:lvl1pPr></p:otherStyle>"#,
            r#"</p:txStyles></p:sldMaster>"#
        ),
        XML_DECLARATION, NS_A, NS_R, NS_P, EMPTY_GROUP_PROPERTIES
    )
}

fn blank_layout_xml() -> String {
    format!(
        concat!(
            r#"{}<p:sldLayout xmlns:a="{}" xmlns:r="{}" xmlns:p="{}" type="blank" preserve="1">"#,
            r#"<p:cSld name="Blank"><p:spTree>{}</p:spTree></p:cSld>"#,
            r#"<p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sldLayout>"#
        ),
        XML_DECLARATION, NS_A, NS_R, NS_P, EMPTY_GROUP_PROPERTIES
    )
}

fn core_props_xml() -> String {
    let now = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
    format!(
        concat!(
            r#"{}<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" "#,
            r#"xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" "#,
            r#"xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">"#,
            r#"<dc:title>Photo report</dc:title><dc:creator>photo_report_mcp</dc:creator>"#,
            r#"<dcterms:created xsi:type="dcterms:W3CDTF">{}</dcterms:created>"#,
            r#"<dcterms:modified xsi:type="dcterms:W3CDTF">{}</dcterms:modified>"#,
            r#"</cp:coreProperties>"#
        ),
        XML_DECLARATION, now, now
    )
}

fn theme_xml() -> String {
    let colors = [
        ("dk1", r#"<a:sysClr val="windowText" lastClr="000000"/>"#),
        ("lt1", r#"<a:sysClr val="window" lastClr="FFFFFF"/>"#),
        ("dk2", r#"<a:srgbClr val="44546A"/>"#),
        ("lt2", r#"<a:srgbClr val="E7E6E6"/>"#),
        ("accent1", r#"<a:srgbClr val="4472C4"/>"#),
        ("accent2", r#"<a:srgbClr val="ED7D31"/>"#),
        ("accent3", r#"<a:srgbClr val="A5A5A5"/>"#),
        ("accent4", r#"<a:srgbClr val="FFC000"/>"#),
        ("accent5", r#"<a:srgbClr val="5B9BD5"/>"#),
        ("accent6", r#"<a:srgbClr val="70AD47"/>"#),
        ("hlink", r#"<a:srgbClr val="0563C1"/>"#),
        ("folHlink", r#"<a:srgbClr val="954F72"/>"#),
    ];
    let color_scheme: String = colors
        .iter()
        .map(|(name, color)| format!("<a:{0}>{1}</a:{0}>", name, color))
        .collect();

    let solid = r#"<a:solidFill><a:schemeClr val="phClr"/></a:solidFill>"#;
    let line = |w: u32| format!(r#"<a:ln w="{}">{}</a:ln>"#, w, solid);

    format!(
        concat!(
            r#"{}<a:theme xmlns:a="{}" name="Photo Report">"#,
            r#"<a:themeElements>"#,
            r#"<a:clrScheme name="Office">{}</a:clrScheme>"#,
            r#"<a:fontScheme name="Office">"#,
            r#"<a:majorFont><a:latin typeface="Calibri Light"/><a:ea typeface=""/><a:cs typeface=""/></a:majorFont>"#,
            r#"<a:minorFont><a:latin typeface="Calibri"/><a:ea typeface=""/><a:cs typeface=""/></a:minorFont>"#,
            r#"</a:fontScheme>"#,
            r#"<a:fmtScheme name="Office">"#,
            r#"<a:fillStyleLst>{}{}{}</a:fillStyleLst>"#,
            r#"<a:lnStyleLst>{}{}{}</a:lnStyleLst>"#,
            r#"<a:effectStyleLst><a:effectStyle><a:effectLst/></a:effectStyle>"#,
            r#"<a:effectStyle><a:effectLst/></a:effectStyle><a:effectStyle><a:effectLst/></a:effectStyle></a:effectStyleLst>"#,
            r#"<a:bgFillStyleLst>{}{}{}</a:bgFillStyleLst>"#,
            r#"</a:fmtScheme>"#,
            r#"</a:themeElements>"#,
            r#"</a:theme>"#
        ),
        XML_DECLARATION,
        NS_A,
        color_scheme,
        solid,
        solid,
        solid,
        line(6350),
        line(12700),
        line(19050),
        solid,
        solid,
        solid
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrite_presentation_rels() {
        let rels = concat!(
            r#"<Relationships xmlns="x">"#,
            r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster" Target="slideMasters/slideMaster1.xml"/>"#,
            r#"<Relationship Id="rId7" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide1.xml"/>"#,
            r#"</Relationships>"#
        );
        let rewritten = rewrite_presentation_rels(rels, "<Relationship Id=\"rId9\"/>");
        assert!(rewritten.contains("slideMaster1.xml"));
        assert!(!rewritten.contains("slides/slide1.xml"));
        assert!(rewritten.ends_with("<Relationship Id=\"rId9\"/></Relationships>"));
    }

    #[test]
    fn test_relationship_ids() {
        let ids = relationship_ids(PRESENTATION_RELS);
        assert_eq!(ids.len(), 2);
        assert!(ids.contains("rId1"));
        assert!(ids.contains("rId2"));
    }

    #[test]
    fn test_rewrite_presentation_replaces_slides_and_size() {
        let original = concat!(
            r#"<p:presentation><p:sldMasterIdLst/>"#,
            r#"<p:sldIdLst><p:sldId id="256" r:id="rId7"/></p:sldIdLst>"#,
            r#"<p:sldSz cx="9144000" cy="6858000" type="screen4x3"/><p:notesSz cx="1" cy="1"/>"#,
            r#"<p:extLst><p:ext uri="{521415D9-36F7-43E2-AB2F-B90AF26B5E84}"><p14:sectionLst/></p:ext></p:extLst>"#,
            r#"</p:presentation>"#
        );
        let rewritten = rewrite_presentation(original, "<p:sldIdLst>NEW</p:sldIdLst>", 12192000, 6858000);
        assert!(!rewritten.contains("rId7"));
        assert!(!rewritten.contains("sectionLst"));
        assert!(rewritten.contains(r#"<p:sldIdLst>NEW</p:sldIdLst><p:sldSz cx="12192000" cy="6858000"/><p:notesSz"#));
    }

    #[test]
    fn test_rewrite_content_types() {
        let original = concat!(
            r#"<Types><Default Extension="png" ContentType="image/png"/>"#,
            r#"<Override PartName="/ppt/slides/slide1.xml" ContentType="x"/>"#,
            r#"<Override PartName="/ppt/presentation.xml" ContentType="y"/></Types>"#
        );
        let rewritten = rewrite_content_types(original, "<Override PartName=\"/ppt/slides/slide1.xml\" ContentType=\"new\"/>");
        assert!(!rewritten.contains("ContentType=\"x\""));
        assert!(rewritten.contains("ContentType=\"new\""));
        assert_eq!(rewritten.matches("Extension=\"png\"").count(), 1);
        assert!(rewritten.contains("Extension=\"jpeg\""));
        assert!(rewritten.contains("/ppt/presentation.xml"));
    }

    #[test]
    fn test_choose_layout_prefers_blank() {
        let layout = |kind: &str| format!(r#"<p:sldLayout xmlns:p="p" type="{}"/>"#, kind).into_bytes();
        let parts = vec![
            ("ppt/slideLayouts/slideLayout1.xml".to_string(), layout("title")),
            ("ppt/slideLayouts/slideLayout2.xml".to_string(), layout("blank")),
            ("ppt/theme/theme1.xml".to_string(), Vec::new()),
        ];
        assert_eq!(choose_layout(&parts).unwrap(), "ppt/slideLayouts/slideLayout2.xml");
    }

    #[test]
    fn test_choose_layout_falls_back_to_seventh() {
        let parts: Vec<_> = (1..=11)
            .map(|n| {
                (
                    format!("ppt/slideLayouts/slideLayout{}.xml", n),
                    br#"<p:sldLayout type="obj"/>"#.to_vec(),
                )
            })
            .collect();
        assert_eq!(choose_layout(&parts).unwrap(), "ppt/slideLayouts/slideLayout7.xml");
        assert!(choose_layout(&[]).is_err());
    }

    #[test]
    fn test_builtin_layout_is_blank() {
        let base = PackageBase::builtin();
        assert_eq!(choose_layout(&base.parts).unwrap(), base.layout_part);
    }
}
