//! CLI binary for claim-intake.
//!
//! Runs the extraction pipeline once against a live vision provider, so crop
//! windows and prompts can be checked on real scans without the wizard.

use anyhow::{Context, Result};
use clap::Parser;
use claim_intake::{
    ExtractionPipeline, ExtractionProgressCallback, IntakeConfig, Party, ProgressCallback, RawFile,
    SlotRole,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner showing which crop strategy is being tried.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("Reading");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_extraction_start(&self, role: SlotRole, planned_attempts: u32) {
        self.bar.set_message(format!("{role}: {planned_attempts} attempt(s) planned"));
    }

    fn on_attempt_start(&self, _role: SlotRole, attempt: u32, total: u32, strategy: &str) {
        self.bar.set_prefix(format!("Attempt {attempt}/{total}"));
        self.bar.set_message(strategy.to_string());
    }

    fn on_attempt_failed(&self, _role: SlotRole, attempt: u32, reason: &str) {
        self.bar.println(format!("  {} attempt {attempt}  {}", red("✗"), dim(reason)));
    }

    fn on_extraction_complete(&self, role: SlotRole, succeeded: bool, attempts: u32) {
        let mark = if succeeded { green("✔") } else { red("✗") };
        self.bar
            .finish_with_message(format!("{mark} {role} after {attempts} attempt(s)"));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Read a driver's license photo
  claim-ocr cnh.jpg --kind license

  # A third party's registration scanned to PDF, with a different model
  claim-ocr crlv.pdf --kind registration --party third-party --model gpt-4.1

  # Allow up to five attempts on a PDF
  claim-ocr crlv.pdf --kind registration --max-attempts 5

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_PROVIDER      Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Directory containing libpdfium
"#;

/// Read structured fields from a claim document using a Vision LLM.
#[derive(Parser, Debug)]
#[command(
    name = "claim-ocr",
    version,
    about = "Read structured fields from a claim document using a Vision LLM",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Photo (JPEG, PNG, WebP, HEIC) or PDF of the document.
    input: PathBuf,

    /// Document kind.
    #[arg(long, value_enum)]
    kind: KindArg,

    /// Whose document this is.
    #[arg(long, value_enum, default_value = "owner")]
    party: PartyArg,

    /// LLM model ID (e.g. gpt-4.1-mini, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Attempts for a license or registration PDF (1–5).
    #[arg(long, default_value_t = 3,
          value_parser = clap::value_parser!(u32).range(1..=5))]
    max_attempts: u32,

    /// Longest edge of a rendered PDF page, in pixels.
    #[arg(long, default_value_t = 1600)]
    max_pixels: u32,

    /// PDF user password for encrypted scans.
    #[arg(long, env = "CLAIM_OCR_PASSWORD")]
    password: Option<String>,

    /// Directory containing libpdfium.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Per OCR call timeout in seconds.
    #[arg(long, default_value_t = 60)]
    api_timeout: u64,

    /// Disable the spinner.
    #[arg(long)]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors and the JSON result.
    #[arg(short, long)]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum KindArg {
    License,
    Registration,
    PoliceReport,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum PartyArg {
    Owner,
    ThirdParty,
}

impl Cli {
    fn role(&self) -> SlotRole {
        let party = match self.party {
            PartyArg::Owner => Party::Owner,
            PartyArg::ThirdParty => Party::ThirdParty,
        };
        match self.kind {
            KindArg::License => SlotRole::license(party),
            KindArg::Registration => SlotRole::registration(party),
            KindArg::PoliceReport => SlotRole::police_report(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress)?;
    let pipeline = ExtractionPipeline::from_config(config).context("Failed to set up the OCR provider")?;

    let raw = RawFile::from_path(&cli.input)
        .await
        .with_context(|| format!("Failed to read {}", cli.input.display()))?;
    let file = claim_intake::CapturedFile::from_raw(raw).context("Unsupported input")?;

    let result = pipeline.extract(&file, cli.role()).await;
    println!(
        "{}",
        serde_json::to_string_pretty(&result).context("Failed to serialise result")?
    );

    if !result.succeeded {
        std::process::exit(2);
    }
    Ok(())
}

/// Map CLI args to `IntakeConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<IntakeConfig> {
    let mut builder = IntakeConfig::builder()
        .max_pdf_attempts(cli.max_attempts)
        .max_rendered_pixels(cli.max_pixels)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password.clone());
    }
    if let Some(ref dir) = cli.pdfium_lib {
        builder = builder.pdfium_library_path(dir.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
