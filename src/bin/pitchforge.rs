//! CLI binary for pitchforge.
//!
//! A thin shim over the library crate: maps flags to `GenerationConfig` /
//! `ImageConfig`, drives the pipelines, and keeps documents in a local
//! JSON store.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pitchforge::export::{default_file_name, write_output};
use pitchforge::pipeline::images::HttpImageClient;
use pitchforge::pipeline::proxy::HttpImageFetcher;
use pitchforge::store::DEFAULT_STORE_FILE;
use pitchforge::{
    export_pdf, export_text, generate, generate_section_image, Document, DocumentKind, DocumentRequest,
    DocumentStore, ExtractedDocument, FundingStage, GenerationConfig, GenerationProgressCallback, ImageConfig,
    ImagePassReport, Industry, Investor, InvestorStatus, PdfVariant, ProgressCallback, SectionOutcome,
};
use chrono::Utc;
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar plus one log line per section.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Unit shown in the bar ("slides" or "sections").
    unit: &'static str,
    start_times: Mutex<HashMap<usize, Instant>>,
    fallbacks: AtomicUsize,
}

impl CliProgressCallback {
    fn new(kind: DocumentKind) -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Resolving provider…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            unit: match kind {
                DocumentKind::PitchDeck => "slides",
                DocumentKind::BusinessPlan => "sections",
            },
            start_times: Mutex::new(HashMap::new()),
            fallbacks: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize, prefix: &'static str) {
        let template = format!(
            "{{spinner:.cyan}} {{prefix:.bold}}  [{{bar:42.green/238}}] {{pos:>3}}/{{len}} {}  ⏱ {{elapsed_precise}}",
            self.unit
        );
        let progress_style = ProgressStyle::with_template(&template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS);
        self.bar.reset();
        self.bar.set_length(total as u64);
        self.bar.enable_steady_tick(Duration::from_millis(80));
        self.bar.set_style(progress_style);
        self.bar.set_prefix(prefix);
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, section: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&section))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl GenerationProgressCallback for CliProgressCallback {
    fn on_generation_start(&self, total_sections: usize) {
        self.activate_bar(total_sections, "Generating");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Generating {total_sections} {}…", self.unit))
        ));
    }

    fn on_section_start(&self, section_number: usize, _total: usize, title: &str) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(section_number, Instant::now());
        }
        self.bar.set_message(title.to_string());
    }

    fn on_section_complete(&self, completed: usize, total: usize, outcome: &SectionOutcome) {
        let elapsed = self.elapsed_secs(completed);
        match outcome {
            SectionOutcome::Generated => self.bar.println(format!(
                "  {} {:>3}/{:<3}  {}",
                green("✓"),
                completed,
                total,
                dim(&format!("{elapsed:.1}s")),
            )),
            SectionOutcome::Fallback(err) => {
                self.fallbacks.fetch_add(1, Ordering::SeqCst);
                let msg = truncate_message(&err.to_string(), 80);
                self.bar.println(format!(
                    "  {} {:>3}/{:<3}  {}  {}",
                    yellow("↺"),
                    completed,
                    total,
                    yellow(&format!("fallback: {msg}")),
                    dim(&format!("{elapsed:.1}s")),
                ));
            }
        }
        self.bar.inc(1);
    }

    fn on_generation_complete(&self, total_sections: usize, fallback_count: usize) {
        self.bar.finish_and_clear();
        if fallback_count == 0 {
            eprintln!(
                "{} {} {} generated",
                green("✔"),
                bold(&total_sections.to_string()),
                self.unit
            );
        } else {
            eprintln!(
                "{} {}/{} {} generated  ({} with fallback content)",
                if fallback_count == total_sections { red("✘") } else { cyan("⚠") },
                bold(&(total_sections - fallback_count).to_string()),
                total_sections,
                self.unit,
                yellow(&fallback_count.to_string()),
            );
        }
    }

    fn on_image_complete(&self, section_number: usize, total_sections: usize, success: bool) {
        if self.bar.is_finished() || self.bar.length() != Some(total_sections as u64) {
            self.activate_bar(total_sections, "Illustrating");
        }
        let mark = if success { green("✓") } else { red("✗") };
        self.bar.println(format!("  {mark} image {section_number:>3}/{total_sections:<3}"));
        self.bar.set_position(section_number as u64);
        if section_number == total_sections {
            self.bar.finish_and_clear();
        }
    }

    fn on_image_skipped(&self, skipped: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} image generation stopped after repeated failures; {} skipped",
            yellow("⚠"),
            skipped
        );
    }
}

fn truncate_message(msg: &str, max_chars: usize) -> String {
    if msg.chars().count() > max_chars {
        let cut: String = msg.chars().take(max_chars - 1).collect();
        format!("{cut}\u{2026}")
    } else {
        msg.to_string()
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Generate a pitch deck
  pitchforge generate --company Acme --prompt "A marketplace for refurbished lab equipment" \
      --industry healthcare --stage seed --target-funding '$2M' --team-size 4

  # Generate a business plan with context from an extracted document, plus images
  pitchforge generate --kind plan --company Acme --prompt "..." --context-file notes.txt --images

  # Browse stored documents
  pitchforge list
  pitchforge show 3f2a9c1e --all
  pitchforge goto 3f2a9c1e 4

  # Illustrate a document, or regenerate one section's image
  pitchforge images 3f2a9c1e
  pitchforge image 3f2a9c1e 5

  # Track who the deck was pitched to
  pitchforge investors add 3f2a9c1e "Dana Reyes" --firm "Northwind Ventures"
  pitchforge investors update 7c01 --status interested --notes "Partner meeting next week"
  pitchforge investors list --deck 3f2a9c1e

  # Export
  pitchforge export 3f2a9c1e --format pdf --variant speaker -o acme-speaker.pdf
  pitchforge export 3f2a9c1e --format pdf --variant summary
  pitchforge export 3f2a9c1e --format text -o -

ENVIRONMENT VARIABLES:
  AIML_API_KEY             Key for the OpenAI-compatible gateway (text and images)
  OPENAI_API_KEY           Use OpenAI through edgequake-llm
  ANTHROPIC_API_KEY        Picked up by provider auto-detection
  PITCHFORGE_LLM_PROVIDER  Provider name (with PITCHFORGE_MODEL)
  PITCHFORGE_MODEL         Model ID
  PITCHFORGE_STORE         Path of the document store file
  RUST_LOG                 Override log filtering

Document ids may be abbreviated to any unique prefix.
"#;

/// Generate pitch decks and business plans with LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "pitchforge",
    version,
    about = "Generate pitch decks and business plans with LLMs, then export them to PDF or text",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Document store file.
    #[arg(long, global = true, env = "PITCHFORGE_STORE", default_value = DEFAULT_STORE_FILE)]
    store: PathBuf,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PITCHFORGE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PITCHFORGE_QUIET")]
    quiet: bool,

    /// Disable progress bars.
    #[arg(long, global = true, env = "PITCHFORGE_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a new document and save it to the store.
    Generate(GenerateArgs),
    /// List stored documents, newest first.
    List {
        #[arg(long)]
        json: bool,
    },
    /// Show a document (the current section, or all of them).
    Show {
        id: String,
        #[arg(long)]
        all: bool,
        #[arg(long)]
        json: bool,
    },
    /// Move a document's current-section cursor (1-based, clamped).
    Goto {
        id: String,
        #[arg(value_parser = clap::value_parser!(u64).range(1..))]
        section: u64,
    },
    /// Generate images for every section of a document.
    Images {
        id: String,
        #[command(flatten)]
        image: ImageArgs,
    },
    /// Generate (or replace) the image of one section (1-based).
    Image {
        id: String,
        #[arg(value_parser = clap::value_parser!(u64).range(1..))]
        section: u64,
        #[command(flatten)]
        image: ImageArgs,
    },
    /// Export a document as text or PDF.
    Export {
        id: String,
        #[arg(long, value_enum, default_value = "pdf")]
        format: FormatArg,
        #[arg(long, value_enum, default_value = "investor")]
        variant: VariantArg,
        /// Output path; `-` writes text to stdout. Defaults to a name derived from the company.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Timeout for fetching each image, in seconds.
        #[arg(long, default_value_t = 60)]
        fetch_timeout: u64,
    },
    /// Delete a document, and the investors it was pitched to.
    Delete { id: String },
    /// Track the investors a document was pitched to.
    Investors {
        #[command(subcommand)]
        action: InvestorCommand,
    },
}

#[derive(Subcommand, Debug)]
enum InvestorCommand {
    /// List investors, newest first.
    List {
        /// Only investors pitched this document.
        #[arg(long)]
        deck: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Record that a document was pitched to an investor.
    Add {
        /// Document that was pitched.
        deck: String,
        name: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        firm: Option<String>,
        #[arg(long, value_enum, default_value = "pitched")]
        status: StatusArg,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Change an investor's details or status.
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        firm: Option<String>,
        #[arg(long, value_enum)]
        status: Option<StatusArg>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Remove an investor.
    Remove { id: String },
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// What to produce.
    #[arg(long, value_enum, default_value = "deck")]
    kind: KindArg,

    /// Company name.
    #[arg(long)]
    company: String,

    /// Free-text description of the business.
    #[arg(long)]
    prompt: String,

    #[arg(long, value_enum, default_value = "technology")]
    industry: IndustryArg,

    #[arg(long, value_enum, default_value = "seed")]
    stage: StageArg,

    /// Amount being raised, e.g. "$2M".
    #[arg(long, default_value = "")]
    target_funding: String,

    #[arg(long, default_value_t = 1)]
    team_size: u32,

    #[arg(long)]
    market_size: Option<String>,

    /// Existing traction (customers, revenue, pilots).
    #[arg(long)]
    traction: Option<String>,

    /// Competitive advantage.
    #[arg(long)]
    advantage: Option<String>,

    #[arg(long)]
    business_model: Option<String>,

    /// Text (or an extraction JSON object) used as extra context.
    #[arg(long)]
    context_file: Option<PathBuf>,

    /// Run the image pass after generation.
    #[arg(long)]
    images: bool,

    /// Print the generation output as JSON.
    #[arg(long)]
    json: bool,

    /// LLM model ID.
    #[arg(long, env = "PITCHFORGE_MODEL")]
    model: Option<String>,

    /// edgequake-llm provider name: openai, anthropic, gemini, ollama, …
    #[arg(long, env = "PITCHFORGE_PROVIDER")]
    provider: Option<String>,

    /// Base URL of the OpenAI-compatible gateway.
    #[arg(long, env = "PITCHFORGE_API_BASE")]
    api_base: Option<String>,

    /// Gateway API key (otherwise AIML_API_KEY).
    #[arg(long, env = "PITCHFORGE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, default_value_t = 0.7)]
    temperature: f32,

    /// Max completion tokens per section (default depends on kind).
    #[arg(long)]
    max_tokens: Option<usize>,

    /// Retries per section on failure.
    #[arg(long, default_value_t = 1)]
    max_retries: u32,

    /// Pause between sections in milliseconds (default depends on kind).
    #[arg(long)]
    section_delay_ms: Option<u64>,

    #[command(flatten)]
    image: ImageArgs,
}

#[derive(Args, Debug, Clone)]
struct ImageArgs {
    /// Image model.
    #[arg(long, env = "PITCHFORGE_IMAGE_MODEL", default_value = "dall-e-3")]
    image_model: String,

    /// Base URL of the image API.
    #[arg(long, env = "PITCHFORGE_IMAGE_API_BASE")]
    image_api_base: Option<String>,

    /// Image API key (otherwise AIML_API_KEY).
    #[arg(long, env = "PITCHFORGE_IMAGE_API_KEY", hide_env_values = true)]
    image_api_key: Option<String>,

    /// Pause between image calls in milliseconds.
    #[arg(long, default_value_t = 1000)]
    image_delay_ms: u64,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum KindArg {
    Deck,
    Plan,
}

impl From<KindArg> for DocumentKind {
    fn from(v: KindArg) -> Self {
        match v {
            KindArg::Deck => DocumentKind::PitchDeck,
            KindArg::Plan => DocumentKind::BusinessPlan,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum IndustryArg {
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

impl From<IndustryArg> for Industry {
    fn from(v: IndustryArg) -> Self {
        match v {
            IndustryArg::Technology => Industry::Technology,
            IndustryArg::Healthcare => Industry::Healthcare,
            IndustryArg::Fintech => Industry::Fintech,
            IndustryArg::Ecommerce => Industry::Ecommerce,
            IndustryArg::Education => Industry::Education,
            IndustryArg::Sustainability => Industry::Sustainability,
            IndustryArg::Entertainment => Industry::Entertainment,
            IndustryArg::FoodBeverage => Industry::FoodBeverage,
            IndustryArg::RealEstate => Industry::RealEstate,
            IndustryArg::Transportation => Industry::Transportation,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum StageArg {
    PreSeed,
    Seed,
    SeriesA,
    SeriesB,
    SeriesC,
    Growth,
}

impl From<StageArg> for FundingStage {
    fn from(v: StageArg) -> Self {
        match v {
            StageArg::PreSeed => FundingStage::PreSeed,
            StageArg::Seed => FundingStage::Seed,
            StageArg::SeriesA => FundingStage::SeriesA,
            StageArg::SeriesB => FundingStage::SeriesB,
            StageArg::SeriesC => FundingStage::SeriesC,
            StageArg::Growth => FundingStage::Growth,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum StatusArg {
    Pitched,
    FollowedUp,
    Interested,
    NotInterested,
}

impl From<StatusArg> for InvestorStatus {
    fn from(v: StatusArg) -> Self {
        match v {
            StatusArg::Pitched => InvestorStatus::Pitched,
            StatusArg::FollowedUp => InvestorStatus::FollowedUp,
            StatusArg::Interested => InvestorStatus::Interested,
            StatusArg::NotInterested => InvestorStatus::NotInterested,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum FormatArg {
    Text,
    Pdf,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum VariantArg {
    Speaker,
    Investor,
    Summary,
}

impl From<VariantArg> for PdfVariant {
    fn from(v: VariantArg) -> Self {
        match v {
            VariantArg::Speaker => PdfVariant::Speaker,
            VariantArg::Investor => PdfVariant::Investor,
            VariantArg::Summary => PdfVariant::Summary,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar is the feedback while it is active, so library INFO
    // logs are suppressed then.
    let json_output = matches!(
        cli.command,
        Command::Generate(GenerateArgs { json: true, .. })
            | Command::List { json: true }
            | Command::Show { json: true, .. }
            | Command::Investors {
                action: InvestorCommand::List { json: true, .. }
            }
    );
    let show_progress = !cli.quiet && !cli.no_progress && !json_output;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    let store = DocumentStore::open(&cli.store);

    match cli.command {
        Command::Generate(ref args) => run_generate(&cli, &store, args, show_progress).await,
        Command::List { json } => run_list(&store, json).await,
        Command::Show { ref id, all, json } => run_show(&store, id, all, json).await,
        Command::Goto { ref id, section } => {
            let doc = store
                .set_current_index(id, (section - 1) as usize)
                .await
                .context("Failed to move cursor")?;
            if !cli.quiet {
                print_current(&doc);
            }
            Ok(())
        }
        Command::Images { ref id, ref image } => {
            let mut doc = store.get(id).await.context("Failed to load document")?;
            let progress = show_progress.then(|| CliProgressCallback::new(doc.kind) as ProgressCallback);
            let config = image_config(image, progress);
            let client = HttpImageClient::from_config(&config)?;
            let report = store
                .illustrate(&mut doc, &client, &config)
                .await
                .context("Failed to save document")?;
            print_image_report(&report, doc.sections.len(), cli.quiet);
            Ok(())
        }
        Command::Image { ref id, section, ref image } => {
            let doc = store.get(id).await.context("Failed to load document")?;
            let config = image_config(image, None);
            let client = HttpImageClient::from_config(&config)?;
            let index = (section - 1) as usize;
            let generated = generate_section_image(&doc, index, &client, &config)
                .await
                .context("Image generation failed")?;
            store
                .attach_image(&doc.id, generated.section_index, &generated.url, Some(generated.prompt))
                .await
                .context("Failed to save image")?;
            if !cli.quiet {
                eprintln!("{} image attached to section {}", green("✔"), index + 1);
                println!("{}", generated.url);
            }
            Ok(())
        }
        Command::Export {
            ref id,
            format,
            variant,
            ref output,
            fetch_timeout,
        } => run_export(&store, id, format, variant.into(), output.as_deref(), fetch_timeout, cli.quiet).await,
        Command::Delete { ref id } => {
            let removed = store.delete(id).await.context("Failed to delete document")?;
            if !cli.quiet {
                eprintln!("{} deleted {} ({})", green("✔"), short_id(&removed.id), removed.title);
            }
            Ok(())
        }
        Command::Investors { ref action } => run_investors(&store, action, cli.quiet).await,
    }
}

async fn run_generate(cli: &Cli, store: &DocumentStore, args: &GenerateArgs, show_progress: bool) -> Result<()> {
    let kind: DocumentKind = args.kind.into();
    let request = DocumentRequest {
        kind,
        prompt: args.prompt.clone(),
        company_name: args.company.clone(),
        industry: args.industry.into(),
        funding_stage: args.stage.into(),
        target_funding: args.target_funding.clone(),
        team_size: args.team_size,
        market_size: args.market_size.clone(),
        existing_traction: args.traction.clone(),
        competitive_advantage: args.advantage.clone(),
        business_model: args.business_model.clone(),
    };

    let extracted = match args.context_file {
        Some(ref path) => Some(read_context(path).await?),
        None => None,
    };

    let progress: Option<ProgressCallback> =
        show_progress.then(|| CliProgressCallback::new(kind) as Arc<dyn GenerationProgressCallback>);
    let config = build_config(args, progress.clone())?;

    let mut output = generate(&request, extracted.as_deref(), &config)
        .await
        .context("Generation failed")?;

    if args.images {
        let config = image_config(&args.image, progress);
        let report = store
            .save_with_images(&mut output.document, &config)
            .await
            .context("Failed to save document")?;
        match report {
            Some(report) => print_image_report(&report, output.document.sections.len(), cli.quiet),
            None if !cli.quiet => eprintln!(
                "{} image pass skipped: no image API key (set AIML_API_KEY or pass --image-api-key), \
                 run `pitchforge images {}` later",
                yellow("⚠"),
                short_id(&output.document.id)
            ),
            None => {}
        }
    } else {
        store.save(&output.document).await.context("Failed to save document")?;
    }

    if args.json {
        let json = serde_json::json!({
            "document": output.document,
            "outcomes": output.outcomes,
            "stats": output.stats,
        });
        println!("{}", serde_json::to_string_pretty(&json).context("Failed to serialise output")?);
    } else if !cli.quiet {
        let stats = &output.stats;
        eprintln!(
            "{}  {}  {}/{} generated  {}ms  →  {}",
            if stats.fallback_sections == 0 { green("✔") } else { cyan("⚠") },
            bold(&output.document.title),
            stats.generated_sections,
            stats.total_sections,
            stats.total_duration_ms,
            bold(&short_id(&output.document.id)),
        );
        eprintln!(
            "   {} tokens in  /  {} tokens out  /  {} retries",
            dim(&stats.total_prompt_tokens.to_string()),
            dim(&stats.total_completion_tokens.to_string()),
            dim(&stats.total_retries.to_string()),
        );
        println!("{}", output.document.id);
    }
    Ok(())
}

/// A context file may hold raw text or an extraction result object.
async fn read_context(path: &Path) -> Result<String> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read context file {}", path.display()))?;
    Ok(match serde_json::from_str::<ExtractedDocument>(&raw) {
        Ok(extracted) if !extracted.content.is_empty() => extracted.content,
        _ => raw,
    })
}

/// Map CLI args to `GenerationConfig`.
fn build_config(args: &GenerateArgs, progress: Option<ProgressCallback>) -> Result<GenerationConfig> {
    let mut builder = GenerationConfig::builder()
        .temperature(args.temperature)
        .max_retries(args.max_retries);

    if let Some(ref model) = args.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = args.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref base) = args.api_base {
        builder = builder.api_base(base.clone());
    }
    if let Some(ref key) = args.api_key {
        builder = builder.api_key(key.clone());
    }
    if let Some(n) = args.max_tokens {
        builder = builder.max_tokens(n);
    }
    if let Some(ms) = args.section_delay_ms {
        builder = builder.section_delay_ms(ms);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn image_config(args: &ImageArgs, progress: Option<ProgressCallback>) -> ImageConfig {
    let defaults = ImageConfig::default();
    ImageConfig {
        api_base: args.image_api_base.clone().unwrap_or_else(|| defaults.api_base.clone()),
        api_key: args.image_api_key.clone(),
        model: args.image_model.clone(),
        image_delay_ms: args.image_delay_ms,
        progress_callback: progress,
        ..defaults
    }
}

fn print_image_report(report: &ImagePassReport, total: usize, quiet: bool) {
    if quiet {
        return;
    }
    eprintln!(
        "{} {}/{} images  ({} failed{})",
        if report.failed == 0 { green("✔") } else { cyan("⚠") },
        report.succeeded,
        total,
        report.failed,
        if report.skipped > 0 {
            format!(", {} skipped", report.skipped)
        } else {
            String::new()
        },
    );
}

async fn run_list(store: &DocumentStore, json: bool) -> Result<()> {
    let docs = store.list().await.context("Failed to read store")?;
    if json {
        println!("{}", serde_json::to_string_pretty(&docs).context("Failed to serialise documents")?);
        return Ok(());
    }
    if docs.is_empty() {
        eprintln!("{}", dim("No documents yet. Run `pitchforge generate` to create one."));
        return Ok(());
    }
    for doc in &docs {
        println!(
            "{}  {:<13}  {:<40}  {:>2} {}s  {:>2} images  {}",
            cyan(&short_id(&doc.id)),
            doc.kind.label(),
            truncate_message(&doc.title, 40),
            doc.total_sections,
            doc.kind.unit_name(),
            doc.image_count(),
            dim(&doc.created_at.format("%Y-%m-%d %H:%M").to_string()),
        );
    }
    Ok(())
}

async fn run_show(store: &DocumentStore, id: &str, all: bool, json: bool) -> Result<()> {
    let doc = store.get(id).await.context("Failed to load document")?;
    if json {
        println!("{}", serde_json::to_string_pretty(&doc).context("Failed to serialise document")?);
        return Ok(());
    }

    println!("{}", bold(&doc.title));
    println!("Id:             {}", doc.id);
    println!("Industry:       {}", doc.industry);
    println!("Funding stage:  {}", doc.funding_stage);
    println!("Target funding: {}", doc.target_funding);
    println!("Team size:      {}", doc.team_size);
    println!("Market size:    {}", doc.market_size);
    println!("Created:        {}", doc.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!();

    if all {
        for section in &doc.sections {
            print_section(section, doc.total_sections);
        }
    } else {
        print_current(&doc);
    }
    Ok(())
}

fn print_current(doc: &Document) {
    match doc.current_section() {
        Some(section) => print_section(section, doc.total_sections),
        None => eprintln!("{}", dim("Document has no sections.")),
    }
}

fn print_section(section: &pitchforge::GeneratedSection, total: usize) {
    println!(
        "{} {}",
        cyan(&format!("[{}/{}]", section.section_number, total)),
        bold(&section.title)
    );
    println!("{}", dim(&section.section_kind.subtitle()));
    println!();
    println!("{}", section.content);
    if !section.key_points.is_empty() {
        println!();
        for point in &section.key_points {
            println!("  • {point}");
        }
    }
    if let Some(ref notes) = section.speaker_notes {
        println!();
        println!("{} {}", dim("Notes:"), dim(notes));
    }
    if let Some(ref url) = section.image_url {
        println!("{} {}", dim("Image:"), dim(url));
    }
    println!();
}

async fn run_export(
    store: &DocumentStore,
    id: &str,
    format: FormatArg,
    variant: PdfVariant,
    output: Option<&Path>,
    fetch_timeout: u64,
    quiet: bool,
) -> Result<()> {
    let doc = store.get(id).await.context("Failed to load document")?;

    let (bytes, default_name) = match format {
        FormatArg::Text => (export_text(&doc).into_bytes(), default_file_name(&doc, None)),
        FormatArg::Pdf => {
            let fetcher = HttpImageFetcher::new(fetch_timeout).context("Failed to build HTTP client")?;
            let bytes = export_pdf(&doc, variant, &fetcher).await.context("PDF export failed")?;
            (bytes, default_file_name(&doc, Some(variant)))
        }
    };

    match output {
        Some(path) if path == Path::new("-") => {
            if format == FormatArg::Pdf {
                anyhow::bail!("Refusing to write PDF bytes to stdout; pass -o <file>");
            }
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle.write_all(&bytes).context("Failed to write to stdout")?;
            if !bytes.ends_with(b"\n") {
                handle.write_all(b"\n").ok();
            }
        }
        _ => {
            let path = output.map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from(default_name));
            write_output(&path, &bytes).await?;
            if !quiet {
                eprintln!(
                    "{}  {} bytes  →  {}",
                    green("✔"),
                    bytes.len(),
                    bold(&path.display().to_string())
                );
            }
        }
    }
    Ok(())
}

async fn run_investors(store: &DocumentStore, action: &InvestorCommand, quiet: bool) -> Result<()> {
    let investors = store.investors();
    match action {
        InvestorCommand::List { deck, json } => {
            let deck_id = match deck {
                Some(deck) => Some(store.get(deck).await.context("Failed to load document")?.id),
                None => None,
            };
            let listed = investors
                .list(deck_id.as_deref())
                .await
                .context("Failed to read investors")?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&listed).context("Failed to serialise investors")?);
                return Ok(());
            }
            if listed.is_empty() {
                eprintln!("{}", dim("No investors yet. Run `pitchforge investors add <deck> <name>`."));
                return Ok(());
            }
            let titles: HashMap<String, String> = store
                .list()
                .await
                .context("Failed to read store")?
                .into_iter()
                .map(|d| (d.id, d.title))
                .collect();
            for inv in &listed {
                let deck_title = titles
                    .get(&inv.pitched_deck_id)
                    .map(String::as_str)
                    .unwrap_or("(deleted document)");
                println!(
                    "{}  {:<24}  {:<24}  {}  {}",
                    cyan(&short_id(&inv.id)),
                    truncate_message(&inv.name, 24),
                    truncate_message(inv.firm.as_deref().unwrap_or("-"), 24),
                    status_colour(inv.status),
                    dim(&truncate_message(deck_title, 40)),
                );
            }
        }
        InvestorCommand::Add {
            deck,
            name,
            email,
            firm,
            status,
            notes,
        } => {
            let doc = store.get(deck).await.context("Failed to load document")?;
            let mut inv = Investor::new(name.clone(), doc.id, Utc::now());
            inv.email = email.clone();
            inv.firm = firm.clone();
            inv.status = (*status).into();
            inv.notes = notes.clone();
            let saved = investors.upsert(&inv).await.context("Failed to save investor")?;
            if !quiet {
                eprintln!("{} added {} ({})", green("✔"), saved.name, saved.status);
            }
            println!("{}", saved.id);
        }
        InvestorCommand::Update {
            id,
            name,
            email,
            firm,
            status,
            notes,
        } => {
            let mut inv = investors.get(id).await.context("Failed to load investor")?;
            if let Some(name) = name {
                inv.name = name.clone();
            }
            if email.is_some() {
                inv.email = email.clone();
            }
            if firm.is_some() {
                inv.firm = firm.clone();
            }
            if let Some(status) = status {
                inv.status = (*status).into();
            }
            if notes.is_some() {
                inv.notes = notes.clone();
            }
            let saved = investors.upsert(&inv).await.context("Failed to save investor")?;
            if !quiet {
                eprintln!("{} {} is now {}", green("✔"), saved.name, status_colour(saved.status));
            }
        }
        InvestorCommand::Remove { id } => {
            let removed = investors.delete(id).await.context("Failed to delete investor")?;
            if !quiet {
                eprintln!("{} removed {} ({})", green("✔"), short_id(&removed.id), removed.name);
            }
        }
    }
    Ok(())
}

fn status_colour(status: InvestorStatus) -> String {
    let label = format!("{:<14}", status.label());
    match status {
        InvestorStatus::Pitched => label,
        InvestorStatus::FollowedUp => yellow(&label),
        InvestorStatus::Interested => green(&label),
        InvestorStatus::NotInterested => red(&label),
    }
}

fn short_id(id: &str) -> String {
    id.chars().take(8).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_numbers_start_at_one() {
        assert!(Cli::try_parse_from(["pitchforge", "image", "abc", "0"]).is_err());
        assert!(Cli::try_parse_from(["pitchforge", "goto", "abc", "0"]).is_err());

        let cli = Cli::try_parse_from(["pitchforge", "image", "abc", "1"]).unwrap();
        assert!(matches!(cli.command, Command::Image { section: 1, .. }));
    }

    #[test]
    fn investor_status_values_parse() {
        let cli = Cli::try_parse_from([
            "pitchforge",
            "investors",
            "update",
            "7c01",
            "--status",
            "not-interested",
        ])
        .unwrap();
        match cli.command {
            Command::Investors {
                action: InvestorCommand::Update { status, .. },
            } => assert_eq!(status.map(InvestorStatus::from), Some(InvestorStatus::NotInterested)),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn investors_add_defaults_to_pitched() {
        let cli = Cli::try_parse_from(["pitchforge", "investors", "add", "3f2a", "Dana Reyes"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Investors {
                action: InvestorCommand::Add {
                    status: StatusArg::Pitched,
                    ..
                }
            }
        ));
    }
}
