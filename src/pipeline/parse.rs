//! Model replies → sections, with deterministic fallbacks.
//!
//! Models are asked for a single JSON object but regularly wrap it in prose
//! or emit draft objects before the final one. [`last_json_object`] finds
//! the object that ends last in the reply (the outermost one when objects
//! nest), and [`parse_or_fallback`] is the only place a reply becomes a
//! [`GeneratedSection`].

use crate::config::KeyPointRules;
use crate::document::{GeneratedSection, SectionKind};
use crate::error::SectionError;
use crate::generate::SectionOutcome;
use crate::templates::GenerationTemplate;
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::warn;

/// Key points attached to every fallback section.
pub const GENERIC_KEY_POINTS: [&str; 3] = [
    "This slide needs to be customized",
    "Add specific details about your company",
    "Include relevant data and metrics",
];

static RE_LIST_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[•\-*]|\d+\.)\s+").unwrap());

/// Find the last well-formed JSON object in free text.
///
/// Every `{` is tried as a start position; among the objects that parse,
/// the one ending furthest right wins, and among those the outermost.
pub fn last_json_object(text: &str) -> Option<Map<String, Value>> {
    let mut best: Option<(usize, usize, Map<String, Value>)> = None;

    for (start, _) in text.match_indices('{') {
        let rest = &text[start..];
        let mut stream = serde_json::Deserializer::from_str(rest).into_iter::<Value>();
        let Some(Ok(Value::Object(map))) = stream.next() else {
            continue;
        };
        let end = start + stream.byte_offset();
        let better = match &best {
            None => true,
            Some((best_start, best_end, _)) => {
                end > *best_end || (end == *best_end && start < *best_start)
            }
        };
        if better {
            best = Some((start, end, map));
        }
    }

    best.map(|(_, _, map)| map)
}

/// Parse a model reply into a section, or explain why it cannot be used.
pub fn parse_section_reply(
    raw: &str,
    template: &GenerationTemplate,
    rules: &KeyPointRules,
) -> Result<GeneratedSection, SectionError> {
    let section = template.order;
    let obj = last_json_object(raw).ok_or_else(|| SectionError::MalformedResponse {
        section,
        detail: "no JSON object found in reply".into(),
    })?;

    let content = match obj.get("content") {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    };
    if content.is_empty() {
        return Err(SectionError::MissingField {
            section,
            field: "content".into(),
        });
    }

    let title = string_field(&obj, "title").unwrap_or_else(|| template.title.to_string());

    let model_points: Vec<String> = match obj.get("keyPoints") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        _ => Vec::new(),
    };
    let key_points = if model_points.is_empty() {
        extract_key_points(&content, rules)
    } else {
        model_points.into_iter().take(rules.max_points).collect()
    };

    Ok(GeneratedSection {
        section_number: template.order,
        title,
        content,
        section_kind: template.section_kind,
        key_points,
        speaker_notes: string_field(&obj, "speakerNotes"),
        image_url: None,
        image_prompt: None,
        is_generated: true,
        generated_at: Utc::now(),
    })
}

fn string_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Parse a reply, substituting the template's fallback section on failure.
pub fn parse_or_fallback(
    raw: &str,
    template: &GenerationTemplate,
    rules: &KeyPointRules,
) -> (GeneratedSection, SectionOutcome) {
    match parse_section_reply(raw, template, rules) {
        Ok(section) => (section, SectionOutcome::Generated),
        Err(e) => {
            warn!("{}; using fallback content", e);
            (fallback_section(template), SectionOutcome::Fallback(e))
        }
    }
}

/// Derive key points from prose.
///
/// List lines (`•`, `-`, `*`, `1.`) win. Without any, the first sentence of
/// each of the leading paragraphs is used when it is long enough.
pub fn extract_key_points(content: &str, rules: &KeyPointRules) -> Vec<String> {
    let bullets: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|l| RE_LIST_LINE.is_match(l))
        .map(|l| RE_LIST_LINE.replace(l, "").trim().to_string())
        .filter(|l| !l.is_empty())
        .take(rules.max_points)
        .collect();
    if !bullets.is_empty() {
        return bullets;
    }

    content
        .split("\n\n")
        .take(rules.max_paragraphs)
        .filter_map(|para| {
            let first = para.trim().split('.').next().unwrap_or("").trim();
            (first.chars().count() > rules.min_sentence_chars).then(|| format!("{first}."))
        })
        .take(rules.max_points)
        .collect()
}

/// Placeholder section for a template, used when the model cannot fill it.
pub fn fallback_section(template: &GenerationTemplate) -> GeneratedSection {
    GeneratedSection {
        section_number: template.order,
        title: template.title.to_string(),
        content: fallback_content(template.section_kind).to_string(),
        section_kind: template.section_kind,
        key_points: GENERIC_KEY_POINTS.iter().map(|s| s.to_string()).collect(),
        speaker_notes: None,
        image_url: None,
        image_prompt: None,
        is_generated: true,
        generated_at: Utc::now(),
    }
}

/// Static placeholder text per section kind.
pub fn fallback_content(kind: SectionKind) -> &'static str {
    match kind {
        SectionKind::Title => "Company Name\nTagline: Brief description of value proposition\nIndustry: [Your Industry]",
        SectionKind::Problem => "• Large market problem affecting [target customers]\n• Current solutions are inadequate because [reasons]\n• This creates [specific pain points]",
        SectionKind::Solution => "• Our innovative approach: [solution description]\n• Key benefits: [benefit 1], [benefit 2], [benefit 3]\n• Competitive advantages: [advantages]",
        SectionKind::Market => "• Target market: [customer segments]\n• Market size: $X billion TAM\n• Growing at X% annually",
        SectionKind::BusinessModel => "• Revenue model: [subscription/transaction/other]\n• Pricing strategy: [pricing approach]\n• Revenue streams: [stream 1], [stream 2]",
        SectionKind::Traction => "• Early customers: [number/examples]\n• Key metrics: [growth numbers]\n• Partnerships: [strategic relationships]",
        SectionKind::Competition => "• Direct competitors: [competitor analysis]\n• Competitive advantage: [differentiators]\n• Market positioning: [unique position]",
        SectionKind::Team => "• Founder(s): [names and backgrounds]\n• Key team members: [relevant experience]\n• Advisory board: [advisors if any]",
        SectionKind::Financials => "• Revenue projections: [3-5 year forecast]\n• Key metrics: [unit economics]\n• Path to profitability: [timeline]",
        SectionKind::Funding => "• Funding ask: [amount requested]\n• Use of funds: [allocation breakdown]\n• Milestones: [expected achievements]",
        SectionKind::ExecutiveSummary => "• Business opportunity: [market need and timing]\n• Value proposition: [what makes the offering unique]\n• Funding sought: [amount and intended outcome]",
        SectionKind::CompanyDescription => "• Company overview: [what the company does]\n• Mission and vision: [guiding purpose]\n• Legal structure: [entity type and ownership]",
        SectionKind::MarketAnalysis => "• Target market: [customer segments]\n• Market size and trends: [size, growth rate]\n• Main competitors: [competitor overview]",
        SectionKind::OrganizationManagement => "• Organizational structure: [reporting lines]\n• Management team: [names and experience]\n• Key roles: [responsibilities]",
        SectionKind::ProductsServices => "• Offerings: [products and services]\n• Features and benefits: [key differentiators]\n• Development roadmap: [upcoming milestones]",
        SectionKind::MarketingSales => "• Marketing channels: [channel mix]\n• Sales strategy: [sales approach]\n• Success metrics: [acquisition and retention targets]",
        SectionKind::FundingRequest => "• Funding required: [amount requested]\n• Use of funds: [allocation breakdown]\n• Future funding: [expected later rounds]",
        SectionKind::FinancialProjections => "• Revenue projections: [3-5 year forecast]\n• Main expenses: [cost structure]\n• Break-even point: [timeline and margins]",
        SectionKind::Appendix => "• Supporting documents: [list of attachments]\n• Additional data: [market research, metrics]\n• Legal documents: [licenses, patents, contracts]",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::PITCH_DECK_TEMPLATES;

    fn rules() -> KeyPointRules {
        KeyPointRules::default()
    }

    #[test]
    fn clean_json_is_parsed() {
        let raw = r#"{"title":"The Pain","content":"Labs overpay.","keyPoints":["a","b"],"speakerNotes":"Pause here."}"#;
        let (s, outcome) = parse_or_fallback(raw, &PITCH_DECK_TEMPLATES[1], &rules());
        assert!(!outcome.is_fallback());
        assert_eq!(s.title, "The Pain");
        assert_eq!(s.content, "Labs overpay.");
        assert_eq!(s.key_points, vec!["a", "b"]);
        assert_eq!(s.speaker_notes.as_deref(), Some("Pause here."));
        assert_eq!(s.section_number, 2);
        assert_eq!(s.section_kind, SectionKind::Problem);
    }

    #[test]
    fn json_after_prose_is_found() {
        let raw = "Sure! Here is your slide:\n```json\n{\"content\": \"Body {with braces}\"}\n```\nHope it helps.";
        let s = parse_section_reply(raw, &PITCH_DECK_TEMPLATES[0], &rules()).unwrap();
        assert_eq!(s.content, "Body {with braces}");
        assert_eq!(s.title, "Company Introduction");
    }

    #[test]
    fn last_of_multiple_objects_wins() {
        let raw = r#"Draft: {"content":"first"} Final: {"content":"second","meta":{"v":1}}"#;
        let obj = last_json_object(raw).unwrap();
        assert_eq!(obj["content"], "second");
        assert!(obj.contains_key("meta"));
    }

    #[test]
    fn trailing_broken_object_is_ignored() {
        let raw = r#"{"content":"good"} and then {"content": "trunc"#;
        let obj = last_json_object(raw).unwrap();
        assert_eq!(obj["content"], "good");
    }

    #[test]
    fn no_json_falls_back() {
        let (s, outcome) = parse_or_fallback("I cannot help with that.", &PITCH_DECK_TEMPLATES[1], &rules());
        assert!(matches!(
            outcome,
            SectionOutcome::Fallback(SectionError::MalformedResponse { section: 2, .. })
        ));
        assert_eq!(s.content, fallback_content(SectionKind::Problem));
        assert_eq!(s.key_points, GENERIC_KEY_POINTS);
        assert!(s.is_generated);
    }

    #[test]
    fn empty_content_is_missing_field() {
        let err = parse_section_reply(r#"{"title":"x","content":"  "}"#, &PITCH_DECK_TEMPLATES[3], &rules())
            .unwrap_err();
        assert_eq!(
            err,
            SectionError::MissingField {
                section: 4,
                field: "content".into()
            }
        );
    }

    #[test]
    fn key_points_from_bullets() {
        let content = "Intro line\n• Alpha point\n- Beta point\n* Gamma point\nOutro";
        assert_eq!(
            extract_key_points(content, &rules()),
            vec!["Alpha point", "Beta point", "Gamma point"]
        );
    }

    #[test]
    fn key_points_capped_at_five() {
        let content = (1..=8).map(|i| format!("{i}. Point number {i}")).collect::<Vec<_>>().join("\n");
        let points = extract_key_points(&content, &rules());
        assert_eq!(points.len(), 5);
        assert_eq!(points[0], "Point number 1");
    }

    #[test]
    fn key_points_from_paragraphs() {
        let content = "Our platform connects hospitals with vetted refurbishers. More detail.\n\nShort one.\n\nRevenue comes from a twelve percent take rate. Etc.";
        assert_eq!(
            extract_key_points(content, &rules()),
            vec![
                "Our platform connects hospitals with vetted refurbishers.",
                "Revenue comes from a twelve percent take rate."
            ]
        );
    }

    #[test]
    fn model_key_points_are_capped() {
        let raw = r#"{"content":"x","keyPoints":["1","2","3","4","5","6","7"]}"#;
        let s = parse_section_reply(raw, &PITCH_DECK_TEMPLATES[0], &rules()).unwrap();
        assert_eq!(s.key_points.len(), 5);
    }

    #[test]
    fn every_kind_has_fallback_text() {
        for t in crate::templates::BUSINESS_PLAN_TEMPLATES.iter() {
            assert!(fallback_section(t).content.starts_with('•'));
        }
    }
}
