//! Export: plain text and PDF (speaker deck, investor deck, one-page summary).
//!
//! PDF export runs in two steps. [`resolve_images`] fetches every attached
//! image through an [`ImageFetcher`] (async, failures skip the image); then
//! [`render_pdf`] lays the document out as a pure function of the document,
//! the resolved images and the variant.

pub mod embed;
pub(crate) mod pdf;
pub mod sanitize;
pub(crate) mod summary;
pub mod text;

pub use embed::PdfImage;
pub use pdf::encode_pdf_text;
pub use sanitize::{ascii_only, sanitize_for_pdf};
pub use text::export_text;

use crate::document::Document;
use crate::error::PitchforgeError;
use crate::pipeline::proxy::ImageFetcher;
use crate::store::write_atomic;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

/// Which PDF to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PdfVariant {
    /// Full deck with speaker notes under each section.
    Speaker,
    /// Full deck without notes.
    #[default]
    Investor,
    /// One-page executive summary.
    Summary,
}

/// Images keyed by 0-based section index.
#[derive(Debug, Clone, Default)]
pub struct ResolvedImages {
    images: HashMap<usize, PdfImage>,
}

impl ResolvedImages {
    pub fn insert(&mut self, section_index: usize, image: PdfImage) {
        self.images.insert(section_index, image);
    }

    pub fn get(&self, section_index: usize) -> Option<&PdfImage> {
        self.images.get(&section_index)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

/// Fetch and decode every attached image. Failures are logged and skipped.
pub async fn resolve_images(doc: &Document, fetcher: &dyn ImageFetcher) -> ResolvedImages {
    let mut resolved = ResolvedImages::default();
    for (index, section) in doc.sections.iter().enumerate() {
        let Some(url) = section.image_url.as_deref() else {
            continue;
        };
        let encoded = match fetcher.fetch(url).await {
            Ok(encoded) => encoded,
            Err(e) if e.expired => {
                warn!("Section {}: image has expired, rendering without it", index + 1);
                continue;
            }
            Err(e) => {
                warn!("Section {}: image fetch failed: {e}", index + 1);
                continue;
            }
        };
        match PdfImage::from_encoded(&encoded) {
            Ok(image) => resolved.insert(index, image),
            Err(e) => warn!("Section {}: image could not be decoded: {e}", index + 1),
        }
    }
    resolved
}

/// Lay out a PDF from already-resolved images.
pub fn render_pdf(
    doc: &Document,
    images: &ResolvedImages,
    variant: PdfVariant,
) -> Result<Vec<u8>, PitchforgeError> {
    match variant {
        PdfVariant::Summary => summary::render_summary(doc),
        PdfVariant::Speaker | PdfVariant::Investor => pdf::render_document(doc, images, variant),
    }
}

/// Export `doc` as PDF bytes.
///
/// The summary variant carries no images, so nothing is fetched for it.
pub async fn export_pdf(
    doc: &Document,
    variant: PdfVariant,
    fetcher: &dyn ImageFetcher,
) -> Result<Vec<u8>, PitchforgeError> {
    let images = match variant {
        PdfVariant::Summary => ResolvedImages::default(),
        _ => resolve_images(doc, fetcher).await,
    };
    let bytes = render_pdf(doc, &images, variant)?;
    info!(
        "Exported '{}' as {:?} PDF: {} bytes, {} images",
        doc.title,
        variant,
        bytes.len(),
        images.len()
    );
    Ok(bytes)
}

/// Write export bytes to `path` atomically (temp file + rename).
pub async fn write_output(path: impl AsRef<Path>, bytes: &[u8]) -> Result<(), PitchforgeError> {
    let path = path.as_ref();
    write_atomic(path, bytes)
        .await
        .map_err(|source| PitchforgeError::OutputWriteFailed {
            path: path.to_path_buf(),
            source,
        })
}

/// Suggested file name: company name slug plus variant.
pub fn default_file_name(doc: &Document, variant: Option<PdfVariant>) -> String {
    let slug: String = doc
        .company_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    let slug = if slug.is_empty() { "document".to_string() } else { slug };
    let kind = match doc.kind {
        crate::document::DocumentKind::PitchDeck => "pitch-deck",
        crate::document::DocumentKind::BusinessPlan => "business-plan",
    };
    match variant {
        None => format!("{slug}-{kind}.txt"),
        Some(PdfVariant::Speaker) => format!("{slug}-{kind}-speaker.pdf"),
        Some(PdfVariant::Investor) => format!("{slug}-{kind}-investor.pdf"),
        Some(PdfVariant::Summary) => format!("{slug}-executive-summary.pdf"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::tests::{sample_request, section};
    use crate::document::SectionKind;
    use crate::error::ProxyError;
    use crate::pipeline::proxy::EncodedImage;
    use async_trait::async_trait;
    use chrono::Utc;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    struct StaticFetcher;

    #[async_trait]
    impl ImageFetcher for StaticFetcher {
        async fn fetch(&self, url: &str) -> Result<EncodedImage, ProxyError> {
            match url {
                "ok" => {
                    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 6, Rgb([200, 10, 10])));
                    let mut bytes = Vec::new();
                    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png).unwrap();
                    Ok(EncodedImage { content_type: "image/png".into(), bytes })
                }
                "garbage" => Ok(EncodedImage {
                    content_type: "image/png".into(),
                    bytes: vec![1, 2, 3],
                }),
                _ => Err(ProxyError::from_status(404)),
            }
        }
    }

    fn doc_with_images(urls: &[&str]) -> Document {
        let sections = urls
            .iter()
            .enumerate()
            .map(|(i, url)| {
                let mut s = section(i + 1, SectionKind::Problem, "Body");
                s.image_url = Some(url.to_string());
                s
            })
            .collect();
        Document::assemble(&sample_request(), sections, Utc::now(), Utc::now())
    }

    #[tokio::test]
    async fn failed_images_are_skipped() {
        let doc = doc_with_images(&["ok", "gone", "garbage"]);
        let images = resolve_images(&doc, &StaticFetcher).await;
        assert_eq!(images.len(), 1);
        assert!(images.get(0).is_some());
        assert!(images.get(1).is_none());
        assert!(images.get(2).is_none());
    }

    #[tokio::test]
    async fn pdf_with_image_embeds_xobject() {
        let doc = doc_with_images(&["ok"]);
        let bytes = export_pdf(&doc, PdfVariant::Investor, &StaticFetcher).await.unwrap();
        let haystack = String::from_utf8_lossy(&bytes);
        assert!(haystack.contains("/DCTDecode"));
    }

    #[tokio::test]
    async fn summary_skips_image_fetching() {
        let doc = doc_with_images(&["ok"]);
        let bytes = export_pdf(&doc, PdfVariant::Summary, &StaticFetcher).await.unwrap();
        assert!(!String::from_utf8_lossy(&bytes).contains("/DCTDecode"));
    }

    #[test]
    fn file_names_are_slugged() {
        let doc = Document::assemble(&sample_request(), vec![], Utc::now(), Utc::now());
        assert_eq!(default_file_name(&doc, Some(PdfVariant::Speaker)), "acme-pitch-deck-speaker.pdf");
        assert_eq!(default_file_name(&doc, None), "acme-pitch-deck.txt");
        assert_eq!(default_file_name(&doc, Some(PdfVariant::Summary)), "acme-executive-summary.pdf");
    }
}
