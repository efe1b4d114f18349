//! One-page executive summary.
//!
//! A4 portrait, 15 mm margins: header block, two columns of boxes, an
//! optional full-width team box, footer. Every box holds at most
//! [`BOX_MAX_LINES`] lines; longer excerpts end in `...`.

use super::pdf::{generated_date, title_case, wrap_text, Font, PageCanvas, PageSize, PdfWriter};
use super::sanitize::sanitize_for_pdf;
use crate::document::{Document, GeneratedSection, SectionKind};
use crate::error::PitchforgeError;

const MARGIN: f32 = 15.0;
const COLUMN_GAP: f32 = 10.0;
const BOX_MAX_LINES: usize = 8;
const BOX_LINE_STEP: f32 = 4.0;
const EXCERPT_MAX_CHARS: usize = 200;
const EMPTY_BOX_TEXT: &str = "Details available in full document";

/// A summary box and the section kinds that feed it, from either document kind.
struct SummaryBox {
    heading: &'static str,
    kinds: &'static [SectionKind],
}

const LEFT_COLUMN: [SummaryBox; 3] = [
    SummaryBox {
        heading: "PROBLEM & SOLUTION",
        kinds: &[
            SectionKind::Problem,
            SectionKind::Solution,
            SectionKind::ExecutiveSummary,
            SectionKind::ProductsServices,
        ],
    },
    SummaryBox {
        heading: "MARKET OPPORTUNITY",
        kinds: &[SectionKind::Market, SectionKind::MarketAnalysis],
    },
    SummaryBox {
        heading: "BUSINESS MODEL",
        kinds: &[SectionKind::BusinessModel, SectionKind::MarketingSales],
    },
];

const RIGHT_COLUMN: [SummaryBox; 3] = [
    SummaryBox {
        heading: "TRACTION & METRICS",
        kinds: &[
            SectionKind::Traction,
            SectionKind::Financials,
            SectionKind::FinancialProjections,
        ],
    },
    SummaryBox {
        heading: "COMPETITIVE ADVANTAGE",
        kinds: &[SectionKind::Competition, SectionKind::CompanyDescription],
    },
    SummaryBox {
        heading: "FUNDING & USE OF FUNDS",
        kinds: &[SectionKind::Funding, SectionKind::FundingRequest],
    },
];

const TEAM_BOX: SummaryBox = SummaryBox {
    heading: "KEY TEAM MEMBERS",
    kinds: &[SectionKind::Team, SectionKind::OrganizationManagement],
};

/// Render the one-page summary.
pub(crate) fn render_summary(doc: &Document) -> Result<Vec<u8>, PitchforgeError> {
    let size = PageSize::A4_PORTRAIT;
    let mut page = PageCanvas::new(size);
    let content_width = size.width - 2.0 * MARGIN;

    // Header
    let mut y = MARGIN + 10.0;
    page.text(MARGIN, y, &doc.company_name, Font::Bold, 24.0);
    y += 9.0;
    page.text(MARGIN, y, &doc.title, Font::Italic, 14.0);
    y += 9.0;

    let mut info = vec![
        title_case(doc.industry.as_str()),
        title_case(doc.funding_stage.as_str()),
    ];
    if !doc.target_funding.trim().is_empty() {
        info.push(format!("Seeking {}", doc.target_funding));
    }
    page.text(MARGIN, y, &info.join(" - "), Font::Regular, 10.0);
    y += 5.0;
    page.rule(MARGIN, size.width - MARGIN, y, 0.5);
    y += 9.0;

    // Columns
    let column_width = (content_width - COLUMN_GAP) / 2.0;
    let right_x = size.width / 2.0 + COLUMN_GAP / 2.0;

    let mut left_y = y;
    for summary_box in &LEFT_COLUMN {
        left_y = draw_box(&mut page, doc, summary_box, MARGIN, left_y, column_width);
    }
    let mut right_y = y;
    for summary_box in &RIGHT_COLUMN {
        right_y = draw_box(&mut page, doc, summary_box, right_x, right_y, column_width);
    }
    y = left_y.max(right_y);

    if y < size.height - 60.0 {
        page.rule(MARGIN, size.width - MARGIN, y, 0.5);
        y += 8.0;
        draw_box(&mut page, doc, &TEAM_BOX, MARGIN, y, content_width);
    }

    page.text_centered(
        size.width / 2.0,
        size.height - 20.0,
        &format!("Generated: {} | {}", generated_date(doc), doc.title),
        Font::Regular,
        9.0,
    );

    let mut writer = PdfWriter::new();
    writer.add_page(page)?;
    writer.finish(&format!("{} - Executive Summary", doc.title))
}

/// Draw one box; returns the cursor below it.
fn draw_box(page: &mut PageCanvas, doc: &Document, summary_box: &SummaryBox, x: f32, y: f32, width: f32) -> f32 {
    page.text(x, y, summary_box.heading, Font::Bold, 11.0);
    let mut y = y + 6.0;

    let text = doc
        .sections
        .iter()
        .filter(|s| summary_box.kinds.contains(&s.section_kind))
        .map(section_excerpt)
        .filter(|e| !e.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if text.is_empty() {
        page.text(x, y, EMPTY_BOX_TEXT, Font::Italic, 9.0);
        return y + BOX_LINE_STEP + 8.0;
    }

    let lines = wrap_text(&text, Font::Regular, 9.0, width);
    let overflow = lines.len() > BOX_MAX_LINES;
    for (i, line) in lines.iter().take(BOX_MAX_LINES).enumerate() {
        if overflow && i == BOX_MAX_LINES - 1 {
            page.text(x, y, &format!("{line}..."), Font::Regular, 9.0);
        } else {
            page.text(x, y, line, Font::Regular, 9.0);
        }
        y += BOX_LINE_STEP;
    }
    y + 8.0
}

/// First three key points, or else the first paragraph cut to 200 characters.
pub(crate) fn section_excerpt(section: &GeneratedSection) -> String {
    let points: Vec<String> = section
        .key_points
        .iter()
        .map(String::as_str)
        .map(sanitize_for_pdf)
        .map(|p| p.trim_end_matches('.').to_string())
        .filter(|p| !p.is_empty())
        .take(3)
        .collect();
    if !points.is_empty() {
        return format!("{}.", points.join(". "));
    }

    let clean = sanitize_for_pdf(&section.content);
    let first = clean.split("\n\n").next().unwrap_or_default().replace('\n', " ");
    if first.chars().count() > EXCERPT_MAX_CHARS {
        let cut: String = first.chars().take(EXCERPT_MAX_CHARS).collect();
        format!("{}...", cut.trim_end())
    } else {
        first
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::tests::{sample_request, section};
    use chrono::Utc;

    #[test]
    fn excerpt_prefers_key_points() {
        let mut s = section(2, SectionKind::Problem, "Body text.");
        s.key_points = vec!["One.".into(), "Two".into(), "Three".into(), "Four".into()];
        assert_eq!(section_excerpt(&s), "One. Two. Three.");
    }

    #[test]
    fn excerpt_truncates_first_paragraph() {
        let long = "word ".repeat(100);
        let s = section(2, SectionKind::Market, &format!("{long}\n\nSecond paragraph"));
        let excerpt = section_excerpt(&s);
        assert!(excerpt.ends_with("..."));
        assert!(excerpt.chars().count() <= EXCERPT_MAX_CHARS + 3);
        assert!(!excerpt.contains("Second"));
    }

    #[test]
    fn excerpt_short_paragraph_untouched() {
        let s = section(2, SectionKind::Market, "Short.\nStill first.\n\nSecond");
        assert_eq!(section_excerpt(&s), "Short. Still first.");
    }

    #[test]
    fn summary_is_one_page() {
        let sections = vec![
            section(1, SectionKind::Title, "Intro"),
            section(2, SectionKind::Problem, &"Pain ".repeat(400)),
            section(8, SectionKind::Team, "Founders"),
        ];
        let doc = Document::assemble(&sample_request(), sections, Utc::now(), Utc::now());
        let bytes = render_summary(&doc).unwrap();
        let parsed = lopdf::Document::load_mem(&bytes).unwrap();
        assert_eq!(parsed.get_pages().len(), 1);
    }

    #[test]
    fn empty_document_still_renders() {
        let doc = Document::assemble(&sample_request(), vec![], Utc::now(), Utc::now());
        assert!(render_summary(&doc).unwrap().starts_with(b"%PDF"));
    }
}
