//! PDF writing: page canvas, Helvetica metrics, and the full-document layout.
//!
//! Layout code works in millimetres from the top-left corner;
//! [`PageCanvas`] converts to PDF user space (points, origin bottom-left)
//! when it emits operators.
//!
//! Text goes through [`place_line`]: sanitise, encode, and on failure retry
//! with [`ascii_only`]. A line that still cannot be encoded is dropped with
//! a warning; it never fails the export.

use super::sanitize::{ascii_only, sanitize_for_pdf};
use super::{PdfImage, PdfVariant, ResolvedImages};
use crate::document::{Document, DocumentKind, GeneratedSection};
use crate::error::PitchforgeError;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Object, ObjectId, Stream, StringFormat};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

/// Points per millimetre.
const MM: f32 = 72.0 / 25.4;

// ── Page geometry ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    pub const A4_PORTRAIT: PageSize = PageSize { width: 210.0, height: 297.0 };
    pub const A4_LANDSCAPE: PageSize = PageSize { width: 297.0, height: 210.0 };

    pub fn for_kind(kind: DocumentKind) -> Self {
        match kind {
            DocumentKind::PitchDeck => Self::A4_LANDSCAPE,
            DocumentKind::BusinessPlan => Self::A4_PORTRAIT,
        }
    }
}

const MARGIN: f32 = 20.0;
const IMAGE_BOX_W: f32 = 80.0;
const IMAGE_BOX_H: f32 = 60.0;
/// Horizontal room the image column takes from the body text.
const IMAGE_GUTTER: f32 = 90.0;

// ── Fonts ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Font {
    Regular,
    Bold,
    Italic,
}

impl Font {
    const ALL: [Font; 3] = [Font::Regular, Font::Bold, Font::Italic];

    fn resource(self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
            Font::Italic => "F3",
        }
    }

    fn base_font(self) -> &'static str {
        match self {
            Font::Regular => "Helvetica",
            Font::Bold => "Helvetica-Bold",
            Font::Italic => "Helvetica-Oblique",
        }
    }

    fn widths(self) -> &'static [u16; 95] {
        match self {
            Font::Bold => &HELVETICA_BOLD_WIDTHS,
            // Oblique shares the upright metrics.
            Font::Regular | Font::Italic => &HELVETICA_WIDTHS,
        }
    }
}

/// Glyph widths (1/1000 em) for ASCII 32..=126, from the Helvetica AFM.
#[rustfmt::skip]
static HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
static HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

/// Rendered width of `text` in millimetres.
pub(crate) fn text_width_mm(text: &str, font: Font, size: f32) -> f32 {
    let widths = font.widths();
    let units: u32 = text
        .bytes()
        .map(|b| match b {
            32..=126 => u32::from(widths[usize::from(b - 32)]),
            _ => 556,
        })
        .sum();
    units as f32 * size / 1000.0 / MM
}

/// Greedy word wrap to `max_width` millimetres. Words wider than a whole
/// line are broken between characters.
pub(crate) fn wrap_text(text: &str, font: Font, size: f32, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    for raw in text.split('\n') {
        let mut line = String::new();
        for word in raw.split_whitespace() {
            let candidate = if line.is_empty() {
                word.to_string()
            } else {
                format!("{line} {word}")
            };
            if text_width_mm(&candidate, font, size) <= max_width {
                line = candidate;
                continue;
            }
            if !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }
            for c in word.chars() {
                line.push(c);
                if line.chars().count() > 1 && text_width_mm(&line, font, size) > max_width {
                    line.pop();
                    lines.push(std::mem::take(&mut line));
                    line.push(c);
                }
            }
        }
        if !line.is_empty() {
            lines.push(line);
        }
    }
    lines
}

/// Encode a single line for a Helvetica/WinAnsi text operator.
///
/// Only printable ASCII is accepted; run [`sanitize_for_pdf`] first.
pub fn encode_pdf_text(text: &str) -> Result<Vec<u8>, PitchforgeError> {
    text.chars()
        .map(|ch| {
            if (' '..='~').contains(&ch) {
                Ok(ch as u8)
            } else {
                Err(PitchforgeError::TextEncoding { ch })
            }
        })
        .collect()
}

/// Sanitise and encode one line, falling back to ASCII-only. `None` means
/// the line is dropped.
fn place_line(text: &str) -> Option<String> {
    let clean = sanitize_for_pdf(text).replace('\n', " ");
    match encode_pdf_text(&clean) {
        Ok(_) => Some(clean),
        Err(err) => {
            debug!("Sanitised text rejected ({err}); retrying ASCII-only");
            let fallback = ascii_only(text);
            match encode_pdf_text(&fallback) {
                Ok(_) => Some(fallback),
                Err(err) => {
                    warn!("Dropping unplaceable line: {err}");
                    None
                }
            }
        }
    }
}

/// `"food_beverage"` → `"Food Beverage"`.
pub(crate) fn title_case(wire_name: &str) -> String {
    wire_name
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Display date stamped on title pages and footers.
pub(crate) fn generated_date(doc: &Document) -> String {
    doc.completed_at
        .unwrap_or(doc.created_at)
        .format("%B %-d, %Y")
        .to_string()
}

// ── Canvas ───────────────────────────────────────────────────────────────

/// One page worth of drawing operators.
pub(crate) struct PageCanvas {
    size: PageSize,
    ops: Vec<Operation>,
}

impl PageCanvas {
    pub fn new(size: PageSize) -> Self {
        Self { size, ops: Vec::new() }
    }

    /// Left-aligned text with its baseline at `y`.
    pub fn text(&mut self, x: f32, y: f32, text: &str, font: Font, size: f32) {
        if let Some(line) = place_line(text) {
            self.emit_text(x, y, line, font, size);
        }
    }

    pub fn text_centered(&mut self, center_x: f32, y: f32, text: &str, font: Font, size: f32) {
        if let Some(line) = place_line(text) {
            let x = center_x - text_width_mm(&line, font, size) / 2.0;
            self.emit_text(x, y, line, font, size);
        }
    }

    pub fn text_right(&mut self, right_x: f32, y: f32, text: &str, font: Font, size: f32) {
        if let Some(line) = place_line(text) {
            let x = right_x - text_width_mm(&line, font, size);
            self.emit_text(x, y, line, font, size);
        }
    }

    fn emit_text(&mut self, x: f32, y: f32, line: String, font: Font, size: f32) {
        if line.is_empty() {
            return;
        }
        let baseline = (self.size.height - y) * MM;
        self.ops.push(Operation::new("BT", vec![]));
        self.ops.push(Operation::new(
            "Tf",
            vec![Object::Name(font.resource().as_bytes().to_vec()), Object::Real(size)],
        ));
        self.ops.push(Operation::new("Td", vec![Object::Real(x * MM), Object::Real(baseline)]));
        self.ops.push(Operation::new(
            "Tj",
            vec![Object::String(line.into_bytes(), StringFormat::Literal)],
        ));
        self.ops.push(Operation::new("ET", vec![]));
    }

    /// Horizontal rule from `x1` to `x2` at `y`.
    pub fn rule(&mut self, x1: f32, x2: f32, y: f32, line_width: f32) {
        let py = (self.size.height - y) * MM;
        self.ops.push(Operation::new("w", vec![Object::Real(line_width * MM)]));
        self.ops.push(Operation::new("m", vec![Object::Real(x1 * MM), Object::Real(py)]));
        self.ops.push(Operation::new("l", vec![Object::Real(x2 * MM), Object::Real(py)]));
        self.ops.push(Operation::new("S", vec![]));
    }

    /// Draw a registered image XObject with its top-left corner at (`x`, `y`).
    pub fn image(&mut self, name: &str, x: f32, y: f32, w: f32, h: f32) {
        let bottom = (self.size.height - y - h) * MM;
        self.ops.push(Operation::new("q", vec![]));
        self.ops.push(Operation::new(
            "cm",
            vec![
                Object::Real(w * MM),
                Object::Real(0.0),
                Object::Real(0.0),
                Object::Real(h * MM),
                Object::Real(x * MM),
                Object::Real(bottom),
            ],
        ));
        self.ops.push(Operation::new("Do", vec![Object::Name(name.as_bytes().to_vec())]));
        self.ops.push(Operation::new("Q", vec![]));
    }
}

// ── Writer ───────────────────────────────────────────────────────────────

/// Accumulates pages and images into a `lopdf` document.
pub(crate) struct PdfWriter {
    doc: lopdf::Document,
    pages_id: ObjectId,
    resources_id: ObjectId,
    page_ids: Vec<ObjectId>,
    xobjects: Dictionary,
    image_count: usize,
}

impl PdfWriter {
    pub fn new() -> Self {
        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let resources_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            resources_id,
            page_ids: Vec::new(),
            xobjects: Dictionary::new(),
            image_count: 0,
        }
    }

    /// Register a JPEG image; returns the resource name to draw it with.
    pub fn add_image(&mut self, image: &PdfImage) -> String {
        let stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => Object::Integer(i64::from(image.width)),
                "Height" => Object::Integer(i64::from(image.height)),
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => Object::Integer(8),
                "Filter" => "DCTDecode",
            },
            image.jpeg.clone(),
        );
        let id = self.doc.add_object(stream);
        self.image_count += 1;
        let name = format!("Im{}", self.image_count);
        self.xobjects.set(name.clone(), id);
        name
    }

    pub fn add_page(&mut self, canvas: PageCanvas) -> Result<(), PitchforgeError> {
        let PageSize { width, height } = canvas.size;
        let content = Content { operations: canvas.ops };
        let encoded = content
            .encode()
            .map_err(|e| PitchforgeError::PdfAssembly(format!("content stream: {e}")))?;
        let content_id = self.doc.add_object(Stream::new(dictionary! {}, encoded));
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(width * MM),
                Object::Real(height * MM),
            ],
            "Contents" => content_id,
            "Resources" => self.resources_id,
        });
        self.page_ids.push(page_id);
        Ok(())
    }

    /// Write fonts, resources, page tree, catalog and info, then serialise.
    pub fn finish(mut self, title: &str) -> Result<Vec<u8>, PitchforgeError> {
        let mut fonts = Dictionary::new();
        for font in Font::ALL {
            let id = self.doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => font.base_font(),
                "Encoding" => "WinAnsiEncoding",
            });
            fonts.set(font.resource(), id);
        }
        self.doc.objects.insert(
            self.resources_id,
            Object::Dictionary(dictionary! {
                "Font" => fonts,
                "XObject" => self.xobjects,
            }),
        );

        let kids: Vec<Object> = self.page_ids.iter().map(|id| Object::Reference(*id)).collect();
        let count = kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => Object::Integer(count),
            }),
        );

        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        let info_id = self.doc.add_object(dictionary! {
            "Title" => Object::string_literal(ascii_only(&sanitize_for_pdf(title))),
            "Producer" => Object::string_literal(concat!("pitchforge ", env!("CARGO_PKG_VERSION"))),
        });
        self.doc.trailer.set("Root", catalog_id);
        self.doc.trailer.set("Info", info_id);

        let mut buf = Vec::new();
        self.doc
            .save_to(&mut buf)
            .map_err(|e| PitchforgeError::PdfAssembly(format!("serialise: {e}")))?;
        debug!("PDF assembled: {} pages, {} bytes", count, buf.len());
        Ok(buf)
    }
}

// ── Content blocks ───────────────────────────────────────────────────────

/// Body content split into layout units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Block {
    Bullet(String),
    Numbered { marker: String, text: String },
    Paragraph(String),
    /// Space between source paragraphs.
    Gap,
}

static RE_BULLET_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-*+]\s+(.+)$").unwrap());
static RE_NUMBERED_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{1,3}[.)])\s+(.+)$").unwrap());

/// Split section content into bullets, numbered items and prose paragraphs.
///
/// Consecutive prose lines within a paragraph are joined with spaces; list
/// lines stay one item each.
pub(crate) fn format_content(content: &str) -> Vec<Block> {
    let clean = sanitize_for_pdf(content);
    let mut blocks = Vec::new();

    for para in clean.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        if !blocks.is_empty() {
            blocks.push(Block::Gap);
        }
        let mut prose: Vec<&str> = Vec::new();
        for line in para.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if let Some(caps) = RE_BULLET_LINE.captures(line) {
                flush_prose(&mut prose, &mut blocks);
                blocks.push(Block::Bullet(caps[1].to_string()));
            } else if let Some(caps) = RE_NUMBERED_LINE.captures(line) {
                flush_prose(&mut prose, &mut blocks);
                blocks.push(Block::Numbered {
                    marker: caps[1].to_string(),
                    text: caps[2].to_string(),
                });
            } else {
                prose.push(line);
            }
        }
        flush_prose(&mut prose, &mut blocks);
    }
    blocks
}

fn flush_prose(prose: &mut Vec<&str>, blocks: &mut Vec<Block>) {
    if !prose.is_empty() {
        blocks.push(Block::Paragraph(prose.join(" ")));
        prose.clear();
    }
}

// ── Full-document layout ─────────────────────────────────────────────────

/// Title page followed by one or more pages per section.
pub(crate) fn render_document(
    doc: &Document,
    images: &ResolvedImages,
    variant: PdfVariant,
) -> Result<Vec<u8>, PitchforgeError> {
    let size = PageSize::for_kind(doc.kind);
    let mut writer = PdfWriter::new();

    writer.add_page(title_page(doc, size))?;

    for (index, section) in doc.sections.iter().enumerate() {
        let image = images.get(index).map(|img| (writer.add_image(img), img.aspect()));
        let mut flow = SectionFlow::new(&mut writer, size, section, doc.total_sections);
        flow.render(section, image, variant)?;
        flow.finish()?;
    }

    writer.finish(&doc.title)
}

fn title_page(doc: &Document, size: PageSize) -> PageCanvas {
    let mut page = PageCanvas::new(size);
    let cx = size.width / 2.0;
    let cy = size.height / 2.0;
    let content_width = size.width - 2.0 * MARGIN;

    page.text_centered(cx, cy - 40.0, &doc.company_name, Font::Bold, 32.0);
    for (i, line) in wrap_text(&sanitize_for_pdf(&doc.title), Font::Regular, 24.0, content_width)
        .iter()
        .take(2)
        .enumerate()
    {
        page.text_centered(cx, cy - 20.0 + i as f32 * 10.0, line, Font::Regular, 24.0);
    }

    let mut info = vec![
        format!("Industry: {}", title_case(doc.industry.as_str())),
        format!("Funding Stage: {}", title_case(doc.funding_stage.as_str())),
    ];
    if !doc.target_funding.trim().is_empty() {
        info.push(format!("Target Funding: {}", doc.target_funding));
    }
    let subtitle_y = cy + 10.0;
    for (i, line) in info.iter().enumerate() {
        page.text_centered(cx, subtitle_y + i as f32 * 8.0, line, Font::Regular, 14.0);
    }
    page.text_centered(
        cx,
        subtitle_y + 32.0,
        &format!("Generated: {}", generated_date(doc)),
        Font::Regular,
        12.0,
    );
    page
}

/// Cursor over the pages of one section; breaks pages as text overflows.
struct SectionFlow<'w> {
    writer: &'w mut PdfWriter,
    page: PageCanvas,
    size: PageSize,
    title: String,
    y: f32,
    /// Bottom edge of the image box while still on the first page.
    image_bottom: Option<f32>,
}

impl<'w> SectionFlow<'w> {
    fn new(writer: &'w mut PdfWriter, size: PageSize, section: &GeneratedSection, total: usize) -> Self {
        let mut page = PageCanvas::new(size);
        page.text_right(
            size.width - MARGIN,
            MARGIN + 5.0,
            &format!("{} / {}", section.section_number, total),
            Font::Regular,
            10.0,
        );
        Self {
            writer,
            page,
            size,
            title: section.title.clone(),
            y: MARGIN,
            image_bottom: None,
        }
    }

    fn content_width(&self) -> f32 {
        self.size.width - 2.0 * MARGIN
    }

    fn body_limit(&self) -> f32 {
        self.size.height - MARGIN - 10.0
    }

    /// Text width available at the current cursor.
    fn max_width(&self) -> f32 {
        match self.image_bottom {
            Some(bottom) if self.y < bottom + 2.0 => self.content_width() - IMAGE_GUTTER,
            _ => self.content_width(),
        }
    }

    /// Start a continuation page when the cursor would pass `limit`.
    fn ensure_room(&mut self, needed: f32, limit: f32) -> Result<(), PitchforgeError> {
        if self.y + needed <= limit {
            return Ok(());
        }
        let next = PageCanvas::new(self.size);
        self.writer.add_page(std::mem::replace(&mut self.page, next))?;
        self.page.text(
            MARGIN,
            MARGIN + 5.0,
            &format!("{} (continued)", self.title),
            Font::Italic,
            10.0,
        );
        self.y = MARGIN + 15.0;
        self.image_bottom = None;
        Ok(())
    }

    fn render(
        &mut self,
        section: &GeneratedSection,
        image: Option<(String, f32)>,
        variant: PdfVariant,
    ) -> Result<(), PitchforgeError> {
        // Heading
        let title_lines = wrap_text(&sanitize_for_pdf(&section.title), Font::Bold, 20.0, self.content_width());
        for (i, line) in title_lines.iter().enumerate() {
            self.page.text(MARGIN, self.y + 10.0 + i as f32 * 8.0, line, Font::Bold, 20.0);
        }
        self.y += title_lines.len() as f32 * 8.0 + 15.0;

        self.page.text(MARGIN, self.y, &section.section_kind.subtitle(), Font::Italic, 12.0);
        self.y += 12.0;

        // Image box
        if let Some((name, aspect)) = image {
            let (w, h) = fit_box(aspect, IMAGE_BOX_W, IMAGE_BOX_H);
            let box_x = self.size.width - MARGIN - IMAGE_BOX_W;
            let x = box_x + (IMAGE_BOX_W - w) / 2.0;
            let top = self.y + (IMAGE_BOX_H - h) / 2.0;
            self.page.image(&name, x, top, w, h);
            self.image_bottom = Some(self.y + IMAGE_BOX_H);
        }

        self.body(&section.content)?;
        self.key_points(&section.key_points)?;

        if variant == PdfVariant::Speaker {
            if let Some(notes) = section.speaker_notes.as_deref().filter(|n| !n.trim().is_empty()) {
                self.speaker_notes(notes)?;
            }
        }
        Ok(())
    }

    fn body(&mut self, content: &str) -> Result<(), PitchforgeError> {
        let limit = self.body_limit();
        for block in format_content(content) {
            match block {
                Block::Gap => self.y += 6.0,
                Block::Bullet(text) => {
                    let lines = wrap_text(&text, Font::Regular, 12.0, self.max_width() - 15.0);
                    for (i, line) in lines.iter().enumerate() {
                        self.ensure_room(0.0, limit)?;
                        if i == 0 {
                            self.page.text(MARGIN + 5.0, self.y, "-", Font::Regular, 12.0);
                        }
                        self.page.text(MARGIN + 12.0, self.y, line, Font::Regular, 12.0);
                        self.y += 5.0;
                    }
                    self.y += 3.0;
                }
                Block::Numbered { marker, text } => {
                    let indent = 12.0 + marker.len() as f32 * 3.0;
                    let lines = wrap_text(&text, Font::Regular, 12.0, self.max_width() - 20.0);
                    for (i, line) in lines.iter().enumerate() {
                        self.ensure_room(0.0, limit)?;
                        if i == 0 {
                            self.page.text(MARGIN + 5.0, self.y, &marker, Font::Regular, 12.0);
                        }
                        self.page.text(MARGIN + indent, self.y, line, Font::Regular, 12.0);
                        self.y += 5.0;
                    }
                    self.y += 3.0;
                }
                Block::Paragraph(text) => {
                    for line in wrap_text(&text, Font::Regular, 12.0, self.max_width()) {
                        self.ensure_room(0.0, limit)?;
                        self.page.text(MARGIN, self.y, &line, Font::Regular, 12.0);
                        self.y += 5.0;
                    }
                    self.y += 4.0;
                }
            }
        }
        Ok(())
    }

    fn key_points(&mut self, points: &[String]) -> Result<(), PitchforgeError> {
        if points.is_empty() {
            return Ok(());
        }
        let limit = self.body_limit();
        self.y += 10.0;
        self.ensure_room(12.0, limit)?;
        self.page.text(MARGIN, self.y, "Key Points", Font::Bold, 14.0);
        self.y += 8.0;

        for point in points {
            let lines = wrap_text(&sanitize_for_pdf(point), Font::Regular, 11.0, self.max_width() - 15.0);
            for (i, line) in lines.iter().enumerate() {
                self.ensure_room(0.0, limit)?;
                if i == 0 {
                    self.page.text(MARGIN + 5.0, self.y, "-", Font::Regular, 11.0);
                }
                self.page.text(MARGIN + 12.0, self.y, line, Font::Regular, 11.0);
                self.y += 4.5;
            }
            self.y += 2.0;
        }
        Ok(())
    }

    /// Notes sit in a fixed footer band on the section's last page.
    fn speaker_notes(&mut self, notes: &str) -> Result<(), PitchforgeError> {
        let band_top = self.size.height - MARGIN - 20.0;
        self.ensure_room(0.0, band_top - 5.0)?;

        self.page.text(MARGIN, band_top, "Speaker Notes:", Font::Italic, 9.0);
        let lines = wrap_text(&sanitize_for_pdf(notes), Font::Regular, 9.0, self.content_width());
        for (i, line) in lines.iter().take(3).enumerate() {
            let text = if i == 2 && lines.len() > 3 {
                format!("{line}...")
            } else {
                line.clone()
            };
            self.page.text(MARGIN, band_top + 5.0 + i as f32 * 4.0, &text, Font::Regular, 9.0);
        }
        self.y = self.size.height;
        Ok(())
    }

    fn finish(self) -> Result<(), PitchforgeError> {
        self.writer.add_page(self.page)
    }
}

/// Largest `w × h` with the given aspect ratio (width / height) inside the box.
fn fit_box(aspect: f32, box_w: f32, box_h: f32) -> (f32, f32) {
    if !aspect.is_finite() || aspect <= 0.0 {
        return (box_w, box_h);
    }
    if aspect >= box_w / box_h {
        (box_w, box_w / aspect)
    } else {
        (box_h * aspect, box_h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::tests::{sample_request, section};
    use crate::document::SectionKind;
    use chrono::Utc;

    fn deck(sections: Vec<GeneratedSection>) -> Document {
        Document::assemble(&sample_request(), sections, Utc::now(), Utc::now())
    }

    fn page_count(bytes: &[u8]) -> usize {
        lopdf::Document::load_mem(bytes).expect("valid pdf").get_pages().len()
    }

    #[test]
    fn encode_rejects_non_ascii() {
        assert_eq!(encode_pdf_text("Plain (text)").unwrap(), b"Plain (text)".to_vec());
        assert!(matches!(
            encode_pdf_text("caf\u{e9}"),
            Err(PitchforgeError::TextEncoding { ch: '\u{e9}' })
        ));
        assert!(encode_pdf_text("a\nb").is_err());
    }

    #[test]
    fn place_line_always_yields_ascii() {
        assert_eq!(place_line("\u{201C}Hi\u{201D} 🚀").as_deref(), Some("\"Hi\""));
        assert_eq!(place_line("two\nlines").as_deref(), Some("two lines"));
    }

    #[test]
    fn wrap_respects_width() {
        let text = "The quick brown fox jumps over the lazy dog ".repeat(10);
        let lines = wrap_text(&text, Font::Regular, 12.0, 60.0);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(text_width_mm(line, Font::Regular, 12.0) <= 60.0, "too wide: {line}");
        }
    }

    #[test]
    fn wrap_breaks_overlong_word() {
        let word = "x".repeat(200);
        let lines = wrap_text(&word, Font::Bold, 12.0, 30.0);
        assert!(lines.len() > 1);
        assert_eq!(lines.concat(), word);
    }

    #[test]
    fn bold_is_wider_than_regular() {
        let s = "Market Opportunity";
        assert!(text_width_mm(s, Font::Bold, 12.0) > text_width_mm(s, Font::Regular, 12.0));
    }

    #[test]
    fn format_content_splits_lists_and_prose() {
        let blocks = format_content("Intro line one\nline two\n\n\u{2022} First\n\u{2022} Second\n\n1. Step one\n2) Step two");
        assert_eq!(
            blocks,
            vec![
                Block::Paragraph("Intro line one line two".into()),
                Block::Gap,
                Block::Bullet("First".into()),
                Block::Bullet("Second".into()),
                Block::Gap,
                Block::Numbered { marker: "1.".into(), text: "Step one".into() },
                Block::Numbered { marker: "2)".into(), text: "Step two".into() },
            ]
        );
    }

    #[test]
    fn title_case_wire_names() {
        assert_eq!(title_case("food_beverage"), "Food Beverage");
        assert_eq!(title_case("seed"), "Seed");
    }

    #[test]
    fn fit_box_keeps_aspect() {
        assert_eq!(fit_box(2.0, 80.0, 60.0), (80.0, 40.0));
        assert_eq!(fit_box(1.0, 80.0, 60.0), (60.0, 60.0));
        assert_eq!(fit_box(f32::NAN, 80.0, 60.0), (80.0, 60.0));
    }

    #[test]
    fn one_page_per_short_section_plus_title() {
        let doc = deck(vec![
            section(1, SectionKind::Title, "Hello"),
            section(2, SectionKind::Problem, "- a\n- b"),
        ]);
        let bytes = render_document(&doc, &ResolvedImages::default(), PdfVariant::Investor).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));
        assert_eq!(page_count(&bytes), 3);
    }

    #[test]
    fn long_section_breaks_pages() {
        let long = "A sentence that keeps going for a while to fill the page. ".repeat(120);
        let doc = deck(vec![section(1, SectionKind::Market, &long)]);
        let bytes = render_document(&doc, &ResolvedImages::default(), PdfVariant::Investor).unwrap();
        assert!(page_count(&bytes) > 2);
    }

    #[test]
    fn hostile_text_does_not_fail() {
        let mut s = section(1, SectionKind::Team, "مرحبا 🚀🔥 \u{0000}\u{0007} ∑∫ 中文 &#x1F680;");
        s.title = "🚀".into();
        s.key_points = vec!["\u{202E}reversed".into(), "".into()];
        s.speaker_notes = Some("Notes ✓ with ✗ marks".into());
        let doc = deck(vec![s]);
        let bytes = render_document(&doc, &ResolvedImages::default(), PdfVariant::Speaker).unwrap();
        assert_eq!(page_count(&bytes), 2);
    }
}
