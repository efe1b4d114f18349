//! Static section templates for each document kind.
//!
//! The tables define both generation order and display order. A table is
//! valid only when its `order` fields run 1, 2, 3, … with no gaps; the
//! pipeline checks this with [`validate_templates`] before making any calls.

use crate::document::{DocumentKind, SectionKind};
use crate::error::PitchforgeError;
use serde::Serialize;

/// Blueprint for one section: what to ask the model and where it goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationTemplate {
    pub section_kind: SectionKind,
    pub title: &'static str,
    pub instruction_text: &'static str,
    pub guiding_questions: &'static [&'static str],
    /// 1-indexed position in the document.
    pub order: usize,
}

const fn template(
    section_kind: SectionKind,
    title: &'static str,
    instruction_text: &'static str,
    guiding_questions: &'static [&'static str],
    order: usize,
) -> GenerationTemplate {
    GenerationTemplate {
        section_kind,
        title,
        instruction_text,
        guiding_questions,
        order,
    }
}

/// Ten slides of an investor pitch deck.
pub static PITCH_DECK_TEMPLATES: [GenerationTemplate; 10] = [
    template(
        SectionKind::Title,
        "Company Introduction",
        "Create a compelling title slide that introduces the company name, tagline, and core value proposition.",
        &[
            "What is the company name?",
            "What is the main value proposition?",
            "What industry does this company operate in?",
        ],
        1,
    ),
    template(
        SectionKind::Problem,
        "Problem Statement",
        "Identify and articulate the specific problem this startup solves. Make it relatable and urgent.",
        &[
            "What pain point does this solve?",
            "How big is this problem?",
            "Who experiences this problem?",
        ],
        2,
    ),
    template(
        SectionKind::Solution,
        "Our Solution",
        "Present the innovative solution that addresses the identified problem. Focus on uniqueness and effectiveness.",
        &[
            "How does your solution work?",
            "What makes it unique?",
            "Why is this the best approach?",
        ],
        3,
    ),
    template(
        SectionKind::Market,
        "Market Opportunity",
        "Define the target market, market size, and growth potential. Include TAM, SAM, and SOM if relevant.",
        &[
            "Who is your target customer?",
            "How big is the market?",
            "What is the growth potential?",
        ],
        4,
    ),
    template(
        SectionKind::BusinessModel,
        "Business Model",
        "Explain how the company makes money, pricing strategy, and revenue streams.",
        &[
            "How do you make money?",
            "What is your pricing strategy?",
            "What are your revenue streams?",
        ],
        5,
    ),
    template(
        SectionKind::Traction,
        "Traction & Validation",
        "Showcase early traction, customer validation, partnerships, or significant milestones achieved.",
        &[
            "What traction have you achieved?",
            "Who are your early customers?",
            "What validates your approach?",
        ],
        6,
    ),
    template(
        SectionKind::Competition,
        "Competitive Landscape",
        "Analyze the competitive landscape and clearly articulate your competitive advantages.",
        &[
            "Who are your competitors?",
            "What is your competitive advantage?",
            "How do you differentiate?",
        ],
        7,
    ),
    template(
        SectionKind::Team,
        "Our Team",
        "Introduce the founding team, their relevant experience, and why they are uniquely positioned to execute.",
        &[
            "Who are the founders?",
            "What relevant experience do they have?",
            "Why is this the right team?",
        ],
        8,
    ),
    template(
        SectionKind::Financials,
        "Financial Projections",
        "Present realistic financial projections, key metrics, and path to profitability.",
        &[
            "What are your revenue projections?",
            "What are key unit economics?",
            "When will you be profitable?",
        ],
        9,
    ),
    template(
        SectionKind::Funding,
        "Funding Ask",
        "Clearly state the funding amount requested, use of funds, and expected outcomes.",
        &[
            "How much funding do you need?",
            "How will you use the funds?",
            "What milestones will you achieve?",
        ],
        10,
    ),
];

/// Nine sections of a traditional business plan.
pub static BUSINESS_PLAN_TEMPLATES: [GenerationTemplate; 9] = [
    template(
        SectionKind::ExecutiveSummary,
        "Executive Summary",
        "Create a compelling executive summary that provides an overview of the business, its mission, and key success factors.",
        &[
            "What is the business opportunity?",
            "What is your unique value proposition?",
            "What are your key financial projections?",
            "What funding are you seeking?",
        ],
        1,
    ),
    template(
        SectionKind::CompanyDescription,
        "Company Description",
        "Provide a detailed description of the company, its history, ownership structure, and legal status.",
        &[
            "What does your company do?",
            "What industry are you in?",
            "What makes your company unique?",
            "What is your company's mission and vision?",
        ],
        2,
    ),
    template(
        SectionKind::MarketAnalysis,
        "Market Analysis",
        "Analyze the target market, industry trends, customer segments, and competitive landscape.",
        &[
            "Who is your target market?",
            "What is the size of your market?",
            "What are the industry trends?",
            "Who are your main competitors?",
        ],
        3,
    ),
    template(
        SectionKind::OrganizationManagement,
        "Organization & Management",
        "Describe the organizational structure, management team, and key personnel.",
        &[
            "What is your organizational structure?",
            "Who are the key team members?",
            "What experience does your team bring?",
            "What are the key roles and responsibilities?",
        ],
        4,
    ),
    template(
        SectionKind::ProductsServices,
        "Products & Services",
        "Detail the products or services offered, their features, benefits, and development stage.",
        &[
            "What products or services do you offer?",
            "What are the key features and benefits?",
            "What is your development roadmap?",
            "How do you price your offerings?",
        ],
        5,
    ),
    template(
        SectionKind::MarketingSales,
        "Marketing & Sales Strategy",
        "Outline the marketing strategy, sales approach, and customer acquisition plans.",
        &[
            "How will you reach your customers?",
            "What is your sales strategy?",
            "What are your marketing channels?",
            "How will you measure success?",
        ],
        6,
    ),
    template(
        SectionKind::FundingRequest,
        "Funding Request",
        "Specify the funding requirements, how funds will be used, and future funding needs.",
        &[
            "How much funding do you need?",
            "How will you use the funding?",
            "What is your repayment plan?",
            "What future funding might be needed?",
        ],
        7,
    ),
    template(
        SectionKind::FinancialProjections,
        "Financial Projections",
        "Present financial forecasts, including income statements, cash flow, and break-even analysis.",
        &[
            "What are your revenue projections?",
            "What are your main expenses?",
            "When will you break even?",
            "What are your profit margins?",
        ],
        8,
    ),
    template(
        SectionKind::Appendix,
        "Appendix",
        "Include supporting documents, additional data, and supplementary information.",
        &[
            "What supporting documents are needed?",
            "What additional data supports your plan?",
            "What technical specifications are relevant?",
            "What legal documents are important?",
        ],
        9,
    ),
];

/// The ordered template table for a document kind.
pub fn templates_for(kind: DocumentKind) -> &'static [GenerationTemplate] {
    match kind {
        DocumentKind::PitchDeck => &PITCH_DECK_TEMPLATES,
        DocumentKind::BusinessPlan => &BUSINESS_PLAN_TEMPLATES,
    }
}

/// Reject empty tables and tables whose `order` is not exactly 1..=len.
pub fn validate_templates(templates: &[GenerationTemplate]) -> Result<(), PitchforgeError> {
    if templates.is_empty() {
        return Err(PitchforgeError::InvalidTemplates("table is empty".into()));
    }
    for (i, t) in templates.iter().enumerate() {
        if t.order != i + 1 {
            return Err(PitchforgeError::InvalidTemplates(format!(
                "'{}' at position {} has order {}, expected {}",
                t.title,
                i + 1,
                t.order,
                i + 1
            )));
        }
    }
    Ok(())
}
