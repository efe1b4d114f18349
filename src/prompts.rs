//! Prompts for section text and section images.
//!
//! Every prompt the crate sends lives here so prompt changes never touch the
//! retry or parsing code, and tests can inspect prompts without a model.
//!
//! Prompt construction is pure: the same inputs always produce the same text.

use crate::document::{DocumentKind, DocumentRequest, GeneratedSection, SectionKind};
use crate::templates::GenerationTemplate;

/// System message for pitch deck slides.
pub const PITCH_DECK_SYSTEM_PROMPT: &str = "You are an experienced startup advisor who writes investor pitch decks. \
Respond ONLY with a single JSON object matching the requested format. \
Write slide content in plain, professional prose with simple bullet points. \
Do NOT include markdown formatting, emojis, conversational phrases, or questions to the user.";

/// System message for business plan sections.
pub const BUSINESS_PLAN_SYSTEM_PROMPT: &str = "You are a professional business plan writer. \
Generate ONLY the section content in a clean, professional format suitable for direct export to PDF. \
Do NOT include: conversation phrases, markdown formatting, emojis, section headers, transitions, or questions to the user. \
Write in formal business language with clear paragraphs and bullet points where appropriate. \
Wrap the result in the requested JSON object.";

/// Characters of extracted document text embedded in a prompt.
pub const EXTRACTED_TEXT_LIMIT: usize = 3000;

/// Shared style suffix appended to every image prompt.
pub const IMAGE_STYLE_SUFFIX: &str = " Style: Minimalist, flat design, professional, white background, single primary color, clean lines, no clutter, business appropriate.";

const JSON_CONTRACT: &str = r#"Return your response in the following JSON format:
{
  "title": "Specific section title",
  "content": "Main content with clear structure and bullet points",
  "keyPoints": ["Key point 1", "Key point 2", "Key point 3"],
  "speakerNotes": "Additional notes for the presenter"
}"#;

/// The system message for a document kind.
pub fn system_prompt(kind: DocumentKind) -> &'static str {
    match kind {
        DocumentKind::PitchDeck => PITCH_DECK_SYSTEM_PROMPT,
        DocumentKind::BusinessPlan => BUSINESS_PLAN_SYSTEM_PROMPT,
    }
}

/// Characters of each previous section quoted for continuity.
pub fn excerpt_len(kind: DocumentKind) -> usize {
    match kind {
        DocumentKind::PitchDeck => 100,
        DocumentKind::BusinessPlan => 200,
    }
}

/// First `max_chars` characters of `s`, never splitting a code point.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &s[..byte_idx],
        None => s,
    }
}

/// Build the user prompt for one section.
pub fn build_section_prompt(
    template: &GenerationTemplate,
    request: &DocumentRequest,
    previous_sections: &[GeneratedSection],
    extracted: Option<&str>,
) -> String {
    let kind = request.kind;
    let unit = kind.unit_name();
    let mut prompt = String::with_capacity(2048);

    prompt.push_str(&format!(
        "Write the \"{}\" {} of a {} for a {} startup seeking {} funding.\n\n",
        template.title,
        unit,
        kind.label().to_lowercase(),
        request.industry,
        request.funding_stage,
    ));

    // ── Company context ──
    prompt.push_str("COMPANY CONTEXT:\n");
    prompt.push_str(&format!("- Company Name: {}\n", request.company_name));
    prompt.push_str(&format!(
        "- Industry: {} ({})\n",
        request.industry,
        request.industry.context()
    ));
    prompt.push_str(&format!(
        "- Funding Stage: {} ({})\n",
        request.funding_stage,
        request.funding_stage.context()
    ));
    prompt.push_str(&format!("- Target Funding: {}\n", request.target_funding));
    prompt.push_str(&format!("- Team Size: {}\n", request.team_size));
    prompt.push_str(&format!(
        "- Market Size: {}\n",
        request.market_size_or_default()
    ));
    prompt.push_str(&format!(
        "- Existing Traction: {}\n",
        non_empty(&request.existing_traction).unwrap_or("Early stage")
    ));
    prompt.push_str(&format!(
        "- Competitive Advantage: {}\n",
        non_empty(&request.competitive_advantage).unwrap_or("To be defined")
    ));
    prompt.push_str(&format!(
        "- Business Model: {}\n",
        non_empty(&request.business_model).unwrap_or("To be defined")
    ));
    prompt.push_str(&format!("\nBUSINESS DESCRIPTION:\n{}\n", request.prompt.trim()));

    // ── Section requirements ──
    prompt.push_str(&format!("\n{} REQUIREMENTS:\n", unit.to_uppercase()));
    prompt.push_str(&format!("- Type: {}\n", template.section_kind));
    prompt.push_str(&format!("- Title: {}\n", template.title));
    prompt.push_str(&format!("- Purpose: {}\n", template.instruction_text));
    prompt.push_str("- Address these key areas:\n");
    for q in template.guiding_questions {
        prompt.push_str(&format!("  • {q}\n"));
    }

    prompt.push_str(
        "\nGUIDELINES:\n\
         - Plain, professional business prose ready for direct PDF export\n\
         - Use simple bullet points for key information\n\
         - Include specific, relevant details based on the company context\n\
         - Ensure the content flows logically from previous sections\n\
         - No markdown, emojis, or conversational elements\n",
    );

    // ── Extracted document text ──
    if let Some(text) = extracted.map(str::trim).filter(|t| !t.is_empty()) {
        let clipped = truncate_chars(text, EXTRACTED_TEXT_LIMIT);
        let ellipsis = if clipped.len() < text.len() { "..." } else { "" };
        prompt.push_str(&format!(
            "\nEXTRACTED CONTENT FROM COMPANY DOCUMENTS:\n{clipped}{ellipsis}\n\n\
             Use this information to make the {unit} more accurate and specific to the company.\n"
        ));
    }

    // ── Previous sections ──
    if !previous_sections.is_empty() {
        let limit = excerpt_len(kind);
        prompt.push_str(&format!("\nPrevious {unit}s for context:\n"));
        for s in previous_sections {
            prompt.push_str(&format!(
                "{}: {}...\n",
                s.title,
                truncate_chars(&s.content, limit)
            ));
        }
    }

    prompt.push('\n');
    prompt.push_str(JSON_CONTRACT);
    prompt.push_str(&format!(
        "\n\nGenerate the {} {} now:",
        template.section_kind, unit
    ));
    prompt
}

fn non_empty(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Image prompt for a section kind: kind-specific base plus the style suffix.
pub fn image_prompt(kind: SectionKind, company_name: &str) -> String {
    let base = match kind {
        SectionKind::Title => format!(
            "Simple, minimal logo design for {company_name}. Clean typography, single focal element, white background, minimal color palette."
        ),
        SectionKind::Problem => "Minimal icon representing a business challenge. Single concept illustration, clean lines, simple geometric shapes, white background, one primary color.".to_string(),
        SectionKind::Solution => "Clean, simple diagram showing a solution concept. Minimal geometric shapes, clear visual hierarchy, white background, modern flat design.".to_string(),
        SectionKind::Market | SectionKind::MarketAnalysis => "Simple chart or graph visualization. Minimal data representation, clean lines, single color accent, white background, easy to read.".to_string(),
        SectionKind::BusinessModel => "Minimalist flowchart with simple boxes and arrows. Clean geometric shapes, single accent color, white background, clear visual flow.".to_string(),
        SectionKind::Traction => "Simple upward trending chart or graph. Minimal design, clean lines, single color, white background, clear growth visualization.".to_string(),
        SectionKind::Competition => "Clean comparison chart or positioning diagram. Simple geometric elements, minimal color palette, white background, clear differentiation.".to_string(),
        SectionKind::Team | SectionKind::OrganizationManagement => "Simple silhouette figures or minimal avatar illustrations. Clean, professional icons, single color, white background, no complex details.".to_string(),
        SectionKind::Financials | SectionKind::FinancialProjections => "Clean financial chart with minimal elements. Simple bar or line chart, single accent color, white background, easy to read labels.".to_string(),
        SectionKind::Funding | SectionKind::FundingRequest => "Minimal investment icon or simple growth arrow. Clean geometric design, single accent color, white background, clear concept visualization.".to_string(),
        _ => "Simple, minimal business illustration with clean design.".to_string(),
    };
    format!("{base}{IMAGE_STYLE_SUFFIX}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::tests::{sample_request, section};
    use crate::templates::{BUSINESS_PLAN_TEMPLATES, PITCH_DECK_TEMPLATES};

    #[test]
    fn prompt_contains_company_context() {
        let req = sample_request();
        let p = build_section_prompt(&PITCH_DECK_TEMPLATES[1], &req, &[], None);
        assert!(p.contains("Company Name: Acme"));
        assert!(p.contains("Medical devices, health tech"));
        assert!(p.contains("Early stage with initial traction"));
        assert!(p.contains("refurbished lab equipment"));
        assert!(p.contains("How big is this problem?"));
        assert!(p.contains("\"keyPoints\""));
        assert!(p.contains("Market Size: To be determined"));
        assert!(!p.contains("EXTRACTED CONTENT"));
    }

    #[test]
    fn prompt_is_deterministic() {
        let req = sample_request();
        let prev = vec![section(1, SectionKind::Title, "Acme sells lab gear")];
        let a = build_section_prompt(&PITCH_DECK_TEMPLATES[1], &req, &prev, Some("deck"));
        let b = build_section_prompt(&PITCH_DECK_TEMPLATES[1], &req, &prev, Some("deck"));
        assert_eq!(a, b);
    }

    #[test]
    fn extracted_text_is_capped() {
        let req = sample_request();
        let long = "x".repeat(5000);
        let p = build_section_prompt(&PITCH_DECK_TEMPLATES[0], &req, &[], Some(&long));
        assert!(p.contains(&format!("{}...", "x".repeat(3000))));
        assert!(!p.contains(&"x".repeat(3001)));

        let short = build_section_prompt(&PITCH_DECK_TEMPLATES[0], &req, &[], Some("short doc"));
        assert!(short.contains("short doc\n"));
        assert!(!short.contains("short doc..."));
    }

    #[test]
    fn previous_excerpts_respect_kind_limit() {
        let mut req = sample_request();
        let body = "é".repeat(300);
        let prev = vec![section(1, SectionKind::Title, &body)];

        let deck = build_section_prompt(&PITCH_DECK_TEMPLATES[1], &req, &prev, None);
        assert!(deck.contains(&format!("Section 1: {}...", "é".repeat(100))));
        assert!(!deck.contains(&"é".repeat(101)));

        req.kind = DocumentKind::BusinessPlan;
        let plan = build_section_prompt(&BUSINESS_PLAN_TEMPLATES[1], &req, &prev, None);
        assert!(plan.contains(&format!("Section 1: {}...", "é".repeat(200))));
        assert!(!plan.contains(&"é".repeat(201)));
    }

    #[test]
    fn truncate_chars_handles_multibyte() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn image_prompt_has_style_suffix() {
        let p = image_prompt(SectionKind::Title, "Acme");
        assert!(p.starts_with("Simple, minimal logo design for Acme."));
        assert!(p.ends_with("business appropriate."));
        let generic = image_prompt(SectionKind::Appendix, "Acme");
        assert!(generic.starts_with("Simple, minimal business illustration"));
    }

    #[test]
    fn system_prompts_differ_by_kind() {
        assert!(system_prompt(DocumentKind::BusinessPlan).starts_with("You are a professional business plan writer"));
        assert!(system_prompt(DocumentKind::PitchDeck).contains("JSON"));
    }
}
