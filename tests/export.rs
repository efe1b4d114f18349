//! Export integration tests: PDF layout survives hostile text, images are
//! embedded or skipped, and text export is lossless.

use async_trait::async_trait;
use chrono::Utc;
use pitchforge::export::sanitize::is_pdf_safe;
use pitchforge::export::{default_file_name, resolve_images, write_output, PdfImage};
use pitchforge::pipeline::proxy::{EncodedImage, ImageFetcher};
use pitchforge::{
    export_pdf, export_text, render_pdf, sanitize_for_pdf, Document, DocumentKind, DocumentRequest,
    GeneratedSection, PdfVariant, ProxyError, ResolvedImages, SectionKind,
};
use proptest::prelude::*;
use std::collections::HashMap;
use std::io::Cursor;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn section(n: usize, kind: SectionKind, content: &str) -> GeneratedSection {
    GeneratedSection {
        section_number: n,
        title: format!("Section {n}"),
        content: content.to_string(),
        section_kind: kind,
        key_points: vec![],
        speaker_notes: None,
        image_url: None,
        image_prompt: None,
        is_generated: true,
        generated_at: Utc::now(),
    }
}

fn doc_with(kind: DocumentKind, sections: Vec<GeneratedSection>) -> Document {
    let request = DocumentRequest {
        kind,
        company_name: "Zürich Café™".into(),
        prompt: "Coffee for robots".into(),
        target_funding: "€1.5M".into(),
        team_size: 3,
        ..Default::default()
    };
    Document::assemble(&request, sections, Utc::now(), Utc::now())
}

fn page_count(bytes: &[u8]) -> usize {
    lopdf::Document::load_mem(bytes).unwrap().get_pages().len()
}

fn png_bytes() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(32, 16, image::Rgb([200, 40, 40]));
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut out, image::ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

/// Serves canned responses keyed by URL; anything else is a 404.
struct StaticFetcher(HashMap<String, EncodedImage>);

#[async_trait]
impl ImageFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<EncodedImage, ProxyError> {
        self.0.get(url).cloned().ok_or(ProxyError {
            status: Some(404),
            expired: true,
            detail: "HTTP 404".into(),
        })
    }
}

const HOSTILE: &str = "**Revenue** grew 40% — “fast” & <b>bold</b> &amp; &#8226; bullets\n\
    • ✅ 🚀 emoji everywhere\n\
    ## Heading\n\
    Ünïcödé ĀăĄ ñ ß ø æ œ ǅ Ω 中文 العربية\n\
    [link](https://example.com) `code` __under__ *it*\n\
    \u{0000}\u{0007}\u{200B}\u{FEFF} control chars\n\
    1. first\n2) second\n- dash\n\n\n\n\nend";

// ── PDF ──────────────────────────────────────────────────────────────────────

#[test]
fn hostile_text_renders_in_every_variant() {
    let mut s = section(1, SectionKind::Problem, HOSTILE);
    s.title = "Probl\u{e8}me — “quoted” 🚀".into();
    s.key_points = vec!["✓ Key • point".into(), "£ 100 × 3".into()];
    s.speaker_notes = Some(HOSTILE.to_string());
    let doc = doc_with(DocumentKind::PitchDeck, vec![s, section(2, SectionKind::Team, HOSTILE)]);

    for variant in [PdfVariant::Speaker, PdfVariant::Investor, PdfVariant::Summary] {
        let bytes = render_pdf(&doc, &ResolvedImages::default(), variant).unwrap();
        assert!(bytes.starts_with(b"%PDF"), "{variant:?}");
        assert!(page_count(&bytes) >= 1);
    }
}

#[test]
fn long_sections_flow_onto_more_pages() {
    let long = "Sustained demand from regional logistics operators. ".repeat(400);
    let doc = doc_with(
        DocumentKind::BusinessPlan,
        vec![
            section(1, SectionKind::ExecutiveSummary, "Short."),
            section(2, SectionKind::CompanyDescription, &long),
        ],
    );
    let bytes = render_pdf(&doc, &ResolvedImages::default(), PdfVariant::Investor).unwrap();
    // Title page, one short section, and at least two for the long one.
    assert!(page_count(&bytes) >= 4, "got {}", page_count(&bytes));
}

#[tokio::test]
async fn images_are_embedded_and_expired_ones_skipped() {
    let mut a = section(1, SectionKind::Title, "Hello");
    a.image_url = Some("https://img/ok.png".into());
    let mut b = section(2, SectionKind::Problem, "World");
    b.image_url = Some("https://img/gone.png".into());
    let mut c = section(3, SectionKind::Solution, "Broken");
    c.image_url = Some("https://img/garbage".into());
    let doc = doc_with(DocumentKind::PitchDeck, vec![a, b, c]);

    let fetcher = StaticFetcher(HashMap::from([
        (
            "https://img/ok.png".to_string(),
            EncodedImage {
                content_type: "image/png".into(),
                bytes: png_bytes(),
            },
        ),
        (
            "https://img/garbage".to_string(),
            EncodedImage {
                content_type: "image/png".into(),
                bytes: b"not an image".to_vec(),
            },
        ),
    ]));

    let resolved = resolve_images(&doc, &fetcher).await;
    assert_eq!(resolved.len(), 1);
    let image: &PdfImage = resolved.get(0).unwrap();
    assert_eq!((image.width, image.height), (32, 16));

    let bytes = export_pdf(&doc, PdfVariant::Investor, &fetcher).await.unwrap();
    let parsed = lopdf::Document::load_mem(&bytes).unwrap();
    let has_image = parsed.objects.values().any(|obj| {
        obj.as_stream()
            .ok()
            .and_then(|s| s.dict.get(b"Subtype").ok())
            .and_then(|v| v.as_name().ok())
            == Some(b"Image".as_slice())
    });
    assert!(has_image);
}

#[tokio::test]
async fn summary_never_fetches_images() {
    struct Exploding;
    #[async_trait]
    impl ImageFetcher for Exploding {
        async fn fetch(&self, _url: &str) -> Result<EncodedImage, ProxyError> {
            panic!("summary export must not fetch images");
        }
    }

    let mut s = section(1, SectionKind::Problem, "Text");
    s.image_url = Some("https://img/x.png".into());
    let doc = doc_with(DocumentKind::PitchDeck, vec![s]);
    let bytes = export_pdf(&doc, PdfVariant::Summary, &Exploding).await.unwrap();
    assert_eq!(page_count(&bytes), 1);
}

#[tokio::test]
async fn write_output_creates_parent_dirs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out/nested/deck.txt");
    write_output(&path, b"hello").await.unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), b"hello");
}

#[test]
fn file_names_are_slugged() {
    let doc = doc_with(DocumentKind::PitchDeck, vec![]);
    assert_eq!(default_file_name(&doc, None), "z-rich-caf-pitch-deck.txt");
    assert_eq!(
        default_file_name(&doc, Some(PdfVariant::Summary)),
        "z-rich-caf-executive-summary.pdf"
    );
}

// ── Text ─────────────────────────────────────────────────────────────────────

#[test]
fn text_export_keeps_every_character() {
    let doc = doc_with(
        DocumentKind::PitchDeck,
        vec![
            section(1, SectionKind::Title, HOSTILE),
            section(2, SectionKind::Problem, "Plain"),
        ],
    );
    let text = export_text(&doc);
    assert!(text.contains(HOSTILE));
    assert!(text.starts_with("Section 1\n\n"));
    assert!(text.ends_with("Section 2\n\nPlain"));
}

#[test]
fn empty_document_exports_empty_text() {
    assert_eq!(export_text(&doc_with(DocumentKind::BusinessPlan, vec![])), "");
}

// ── Sanitiser ────────────────────────────────────────────────────────────────

#[test]
fn hostile_text_sanitises_to_placeable_ascii() {
    let clean = sanitize_for_pdf(HOSTILE);
    assert!(is_pdf_safe(&clean), "{clean:?}");
    assert!(clean.contains("Revenue grew 40% - \"fast\" & <b>bold</b> & - bullets"));
    assert!(clean.contains("Unicode AaA n ss o ae"));
    assert!(!clean.contains("**"));
    assert!(!clean.contains("\n\n\n"));
}

proptest! {
    #[test]
    fn any_section_text_renders(content in "\\PC{0,400}", title in "\\PC{0,60}") {
        let mut s = section(1, SectionKind::Market, &content);
        s.title = title;
        s.speaker_notes = Some(content.clone());
        let doc = doc_with(DocumentKind::PitchDeck, vec![s]);
        let bytes = render_pdf(&doc, &ResolvedImages::default(), PdfVariant::Speaker).unwrap();
        prop_assert!(bytes.starts_with(b"%PDF"));
    }
}
