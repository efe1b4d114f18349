//! Document model: requests, generated sections, and assembled documents.
//!
//! A [`Document`] is only ever created by a complete pipeline run, so every
//! slot in `sections` is filled (with model output or fallback content).
//! After creation it changes in three narrow ways: the view cursor moves,
//! images are attached, completion metadata is stamped.

use crate::error::PitchforgeError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ── Kinds ────────────────────────────────────────────────────────────────

/// The two document shapes the pipeline can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    #[default]
    PitchDeck,
    BusinessPlan,
}

impl DocumentKind {
    /// Human label used in document titles.
    pub fn label(self) -> &'static str {
        match self {
            DocumentKind::PitchDeck => "Pitch Deck",
            DocumentKind::BusinessPlan => "Business Plan",
        }
    }

    /// What one unit of content is called for this kind.
    pub fn unit_name(self) -> &'static str {
        match self {
            DocumentKind::PitchDeck => "slide",
            DocumentKind::BusinessPlan => "section",
        }
    }

    /// Placeholder stored when the request has no market size.
    pub fn default_market_size(self) -> &'static str {
        match self {
            DocumentKind::PitchDeck => "To be determined",
            DocumentKind::BusinessPlan => "Not specified",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Semantic kind of one section or slide.
///
/// The first ten belong to pitch decks, the last nine to business plans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    // Pitch deck
    Title,
    Problem,
    Solution,
    Market,
    BusinessModel,
    Traction,
    Competition,
    Team,
    Financials,
    Funding,
    // Business plan
    ExecutiveSummary,
    CompanyDescription,
    MarketAnalysis,
    OrganizationManagement,
    ProductsServices,
    MarketingSales,
    FundingRequest,
    FinancialProjections,
    Appendix,
}

impl SectionKind {
    /// Wire name, e.g. `business_model`.
    pub fn as_str(self) -> &'static str {
        match self {
            SectionKind::Title => "title",
            SectionKind::Problem => "problem",
            SectionKind::Solution => "solution",
            SectionKind::Market => "market",
            SectionKind::BusinessModel => "business_model",
            SectionKind::Traction => "traction",
            SectionKind::Competition => "competition",
            SectionKind::Team => "team",
            SectionKind::Financials => "financials",
            SectionKind::Funding => "funding",
            SectionKind::ExecutiveSummary => "executive_summary",
            SectionKind::CompanyDescription => "company_description",
            SectionKind::MarketAnalysis => "market_analysis",
            SectionKind::OrganizationManagement => "organization_management",
            SectionKind::ProductsServices => "products_services",
            SectionKind::MarketingSales => "marketing_sales",
            SectionKind::FundingRequest => "funding_request",
            SectionKind::FinancialProjections => "financial_projections",
            SectionKind::Appendix => "appendix",
        }
    }

    /// Lower-case, space-separated form used as a page subtitle.
    pub fn subtitle(self) -> String {
        self.as_str().replace('_', " ")
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Industry of the company being pitched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Industry {
    #[default]
    Technology,
    Healthcare,
    Fintech,
    Ecommerce,
    Education,
    Sustainability,
    Entertainment,
    FoodBeverage,
    RealEstate,
    Transportation,
}

impl Industry {
    pub fn as_str(self) -> &'static str {
        match self {
            Industry::Technology => "technology",
            Industry::Healthcare => "healthcare",
            Industry::Fintech => "fintech",
            Industry::Ecommerce => "ecommerce",
            Industry::Education => "education",
            Industry::Sustainability => "sustainability",
            Industry::Entertainment => "entertainment",
            Industry::FoodBeverage => "food_beverage",
            Industry::RealEstate => "real_estate",
            Industry::Transportation => "transportation",
        }
    }

    /// One-line description embedded in prompts.
    pub fn context(self) -> &'static str {
        match self {
            Industry::Technology => "Software, hardware, or tech-enabled solutions",
            Industry::Healthcare => "Medical devices, health tech, biotech, or wellness",
            Industry::Fintech => "Financial technology, payments, or banking solutions",
            Industry::Ecommerce => "Online retail, marketplace, or e-commerce platform",
            Industry::Education => "EdTech, online learning, or educational services",
            Industry::Sustainability => "Clean tech, renewable energy, or environmental solutions",
            Industry::Entertainment => "Media, gaming, content, or entertainment platforms",
            Industry::FoodBeverage => "Food tech, restaurant tech, or beverage innovation",
            Industry::RealEstate => "PropTech, real estate services, or property management",
            Industry::Transportation => "Mobility, logistics, or transportation technology",
        }
    }
}

impl fmt::Display for Industry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Funding round the company is raising.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FundingStage {
    PreSeed,
    #[default]
    Seed,
    SeriesA,
    SeriesB,
    SeriesC,
    Growth,
}

impl FundingStage {
    pub fn as_str(self) -> &'static str {
        match self {
            FundingStage::PreSeed => "pre_seed",
            FundingStage::Seed => "seed",
            FundingStage::SeriesA => "series_a",
            FundingStage::SeriesB => "series_b",
            FundingStage::SeriesC => "series_c",
            FundingStage::Growth => "growth",
        }
    }

    /// One-line description embedded in prompts.
    pub fn context(self) -> &'static str {
        match self {
            FundingStage::PreSeed => "Very early stage, proving concept",
            FundingStage::Seed => "Early stage with initial traction",
            FundingStage::SeriesA => "Growth stage with proven model",
            FundingStage::SeriesB => "Scaling stage with strong metrics",
            FundingStage::SeriesC => "Late stage preparing for exit",
            FundingStage::Growth => "Mature company scaling rapidly",
        }
    }
}

impl fmt::Display for FundingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Request ──────────────────────────────────────────────────────────────

/// Everything the user supplies to start a generation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRequest {
    pub kind: DocumentKind,
    /// Free-text description of the business.
    pub prompt: String,
    pub company_name: String,
    pub industry: Industry,
    pub funding_stage: FundingStage,
    pub target_funding: String,
    pub team_size: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub existing_traction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub competitive_advantage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_model: Option<String>,
}

impl DocumentRequest {
    /// Document title derived from the company name and kind.
    pub fn document_title(&self) -> String {
        format!("{} {}", self.company_name, self.kind.label())
    }

    /// Market size, or the kind's placeholder when absent.
    pub fn market_size_or_default(&self) -> &str {
        self.market_size
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| self.kind.default_market_size())
    }
}

/// Output of the external document-text extraction collaborator.
///
/// Only `content` is consumed by the prompt builder.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedDocument {
    pub content: String,
    #[serde(default)]
    pub original_length: usize,
    #[serde(default)]
    pub truncated: bool,
    #[serde(default)]
    pub extraction_status: String,
}

// ── Sections and documents ───────────────────────────────────────────────

/// One generated unit of content (a slide or a business-plan section).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedSection {
    /// 1-indexed position, equal to the template's `order`.
    pub section_number: usize,
    pub title: String,
    pub content: String,
    pub section_kind: SectionKind,
    pub key_points: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_prompt: Option<String>,
    /// "Slot filled", not "model succeeded": fallback sections are `true` too.
    pub is_generated: bool,
    pub generated_at: DateTime<Utc>,
}

/// An assembled pitch deck or business plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub kind: DocumentKind,
    pub title: String,
    pub company_name: String,
    pub industry: Industry,
    pub funding_stage: FundingStage,
    pub target_funding: String,
    pub team_size: u32,
    pub market_size: String,
    pub source_prompt: String,
    pub sections: Vec<GeneratedSection>,
    pub total_sections: usize,
    pub current_section_index: usize,
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Document {
    /// Assemble a completed document from fully resolved sections.
    pub fn assemble(
        request: &DocumentRequest,
        sections: Vec<GeneratedSection>,
        created_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    ) -> Self {
        let total_sections = sections.len();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind: request.kind,
            title: request.document_title(),
            company_name: request.company_name.clone(),
            industry: request.industry,
            funding_stage: request.funding_stage,
            target_funding: request.target_funding.clone(),
            team_size: request.team_size,
            market_size: request.market_size_or_default().to_string(),
            source_prompt: request.prompt.clone(),
            sections,
            total_sections,
            current_section_index: 0,
            is_completed: true,
            created_at,
            completed_at: Some(completed_at),
        }
    }

    /// `true` when every slot is filled.
    pub fn is_consistent(&self) -> bool {
        self.sections.len() == self.total_sections
    }

    /// Move the view cursor, clamped to `[0, total_sections - 1]`.
    pub fn set_current_index(&mut self, index: usize) {
        self.current_section_index = index.min(self.total_sections.saturating_sub(1));
    }

    pub fn next_section(&mut self) {
        self.set_current_index(self.current_section_index + 1);
    }

    pub fn previous_section(&mut self) {
        self.set_current_index(self.current_section_index.saturating_sub(1));
    }

    /// The section under the view cursor.
    pub fn current_section(&self) -> Option<&GeneratedSection> {
        self.sections.get(self.current_section_index)
    }

    /// Attach an image to the section at `index` (0-based).
    pub fn attach_image(
        &mut self,
        index: usize,
        url: impl Into<String>,
        prompt: Option<String>,
    ) -> Result<(), PitchforgeError> {
        let total = self.sections.len();
        let section = self
            .sections
            .get_mut(index)
            .ok_or(PitchforgeError::InvalidSectionIndex { index, total })?;
        section.image_url = Some(url.into());
        section.image_prompt = prompt;
        Ok(())
    }

    pub fn mark_completed(&mut self, at: DateTime<Utc>) {
        self.is_completed = true;
        self.completed_at = Some(at);
    }

    /// Number of sections carrying an image.
    pub fn image_count(&self) -> usize {
        self.sections.iter().filter(|s| s.image_url.is_some()).count()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn section(n: usize, kind: SectionKind, content: &str) -> GeneratedSection {
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

    pub(crate) fn sample_request() -> DocumentRequest {
        DocumentRequest {
            kind: DocumentKind::PitchDeck,
            prompt: "A marketplace for refurbished lab equipment".into(),
            company_name: "Acme".into(),
            industry: Industry::Healthcare,
            funding_stage: FundingStage::Seed,
            target_funding: "$2M".into(),
            team_size: 4,
            ..Default::default()
        }
    }

    fn sample_document(n: usize) -> Document {
        let sections = (1..=n)
            .map(|i| section(i, SectionKind::Problem, "body"))
            .collect();
        Document::assemble(&sample_request(), sections, Utc::now(), Utc::now())
    }

    #[test]
    fn assemble_sets_metadata() {
        let doc = sample_document(3);
        assert_eq!(doc.title, "Acme Pitch Deck");
        assert_eq!(doc.total_sections, 3);
        assert_eq!(doc.market_size, "To be determined");
        assert!(doc.is_completed);
        assert!(doc.completed_at.is_some());
        assert!(doc.is_consistent());
    }

    #[test]
    fn business_plan_market_placeholder() {
        let mut req = sample_request();
        req.kind = DocumentKind::BusinessPlan;
        assert_eq!(req.document_title(), "Acme Business Plan");
        assert_eq!(req.market_size_or_default(), "Not specified");
        req.market_size = Some("$4B".into());
        assert_eq!(req.market_size_or_default(), "$4B");
    }

    #[test]
    fn cursor_is_clamped() {
        let mut doc = sample_document(10);
        doc.set_current_index(42);
        assert_eq!(doc.current_section_index, 9);
        doc.next_section();
        assert_eq!(doc.current_section_index, 9);
        doc.set_current_index(0);
        doc.previous_section();
        assert_eq!(doc.current_section_index, 0);
        doc.next_section();
        assert_eq!(doc.current_section().map(|s| s.section_number), Some(2));
    }

    #[test]
    fn attach_image_rejects_bad_index() {
        let mut doc = sample_document(2);
        doc.attach_image(1, "https://img/1.png", Some("p".into()))
            .expect("index 1 exists");
        assert_eq!(doc.image_count(), 1);
        let err = doc.attach_image(5, "x", None).unwrap_err();
        assert!(matches!(
            err,
            PitchforgeError::InvalidSectionIndex { index: 5, total: 2 }
        ));
    }

    #[test]
    fn section_kind_wire_names() {
        let json = serde_json::to_string(&SectionKind::BusinessModel).unwrap();
        assert_eq!(json, "\"business_model\"");
        assert_eq!(SectionKind::MarketingSales.subtitle(), "marketing sales");
    }

    #[test]
    fn document_serialises_camel_case() {
        let doc = sample_document(1);
        let json = serde_json::to_value(&doc).unwrap();
        assert!(json.get("totalSections").is_some());
        assert!(json.get("currentSectionIndex").is_some());
        assert!(json["sections"][0].get("isGenerated").is_some());
        assert!(json["sections"][0].get("imageUrl").is_none());
    }
}
