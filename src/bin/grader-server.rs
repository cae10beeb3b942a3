//! HTTP server binary for assignment-grader.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `GraderConfig`, builds the service and serves the router.

use anyhow::{Context, Result};
use assignment_grader::{router, AppState, AssignmentService, ExtractionStrategy, GraderConfig, RasterizerKind};
use clap::Parser;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Default strategy: convert PDF pages to images, OCR each page, grade
  export OPENAI_API_KEY=sk-...
  export GOOGLE_VISION_API_KEY=...
  export CONVERTAPI_SECRET=...
  grader-server --bind 0.0.0.0:3000

  # Render pages locally instead of calling the conversion service
  grader-server --rasterizer pdfium --pdfium-lib-path /opt/pdfium/lib/libpdfium.so

  # Let a vision LLM read the pages (no OCR key needed)
  grader-server --strategy vision-model --provider gemini --model gemini-2.0-flash

  # Typed PDFs only: read the embedded text layer
  grader-server --strategy text-layer

  # Surface unparseable model replies as 502 instead of a placeholder analysis
  grader-server --no-fallback

STRATEGIES:
  text-layer        PDFs only, embedded text
  vision-model      PDFs and images, vision LLM transcription, one call per page
  image-ocr         images only, cloud vision OCR
  converted-pages   PDFs and images, page images + cloud vision OCR (default)

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  GOOGLE_VISION_API_KEY   Cloud vision OCR key (image-ocr, converted-pages)
  CONVERTAPI_SECRET       Conversion service secret (converted-pages + service)
  RUST_LOG                Log filter, overrides --verbose
"#;

/// Grade handwritten assignments with OCR and an LLM, behind a chat UI.
#[derive(Parser, Debug)]
#[command(
    name = "grader-server",
    version,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Address to listen on.
    #[arg(long, env = "GRADER_BIND", default_value = "127.0.0.1:3000")]
    bind: SocketAddr,

    /// Text extraction strategy.
    #[arg(long, env = "GRADER_STRATEGY", value_enum, default_value = "converted-pages")]
    strategy: StrategyArg,

    /// How PDFs become page images for converted-pages.
    #[arg(long, env = "GRADER_RASTERIZER", value_enum, default_value = "service")]
    rasterizer: RasterizerArg,

    /// LLM model ID used for grading (and vision-model OCR).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "GRADER_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Max LLM output tokens per call.
    #[arg(long, env = "GRADER_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Retries on LLM failure.
    #[arg(long, env = "GRADER_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "GRADER_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Per-call OCR / conversion timeout in seconds.
    #[arg(long, env = "GRADER_OCR_TIMEOUT", default_value_t = 60)]
    ocr_timeout: u64,

    /// Cloud vision OCR API key.
    #[arg(long, env = "GOOGLE_VISION_API_KEY", hide_env_values = true)]
    vision_api_key: Option<String>,

    /// Cloud vision annotate endpoint.
    #[arg(long, env = "GRADER_VISION_ENDPOINT")]
    vision_endpoint: Option<String>,

    /// PDF-to-image conversion service secret.
    #[arg(long, env = "CONVERTAPI_SECRET", hide_env_values = true)]
    conversion_secret: Option<String>,

    /// PDF-to-image conversion endpoint.
    #[arg(long, env = "GRADER_CONVERSION_ENDPOINT")]
    conversion_endpoint: Option<String>,

    /// Path to libpdfium; the system library is used when unset.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib_path: Option<PathBuf>,

    /// Longest edge of locally rendered pages, in pixels.
    #[arg(long, env = "GRADER_MAX_RENDERED_PIXELS", default_value_t = 2000)]
    max_rendered_pixels: u32,

    /// Maximum upload size in bytes.
    #[arg(long, env = "GRADER_MAX_UPLOAD_BYTES", default_value_t = 20 * 1024 * 1024)]
    max_upload_bytes: usize,

    /// Return 502 for unparseable model replies instead of a placeholder analysis.
    #[arg(long, env = "GRADER_NO_FALLBACK")]
    no_fallback: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "GRADER_VERBOSE")]
    verbose: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum StrategyArg {
    TextLayer,
    VisionModel,
    ImageOcr,
    ConvertedPages,
}

impl From<StrategyArg> for ExtractionStrategy {
    fn from(v: StrategyArg) -> Self {
        match v {
            StrategyArg::TextLayer => ExtractionStrategy::TextLayer,
            StrategyArg::VisionModel => ExtractionStrategy::VisionModel,
            StrategyArg::ImageOcr => ExtractionStrategy::ImageOcr,
            StrategyArg::ConvertedPages => ExtractionStrategy::ConvertedPages,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum RasterizerArg {
    Service,
    Pdfium,
}

impl From<RasterizerArg> for RasterizerKind {
    fn from(v: RasterizerArg) -> Self {
        match v {
            RasterizerArg::Service => RasterizerKind::Service,
            RasterizerArg::Pdfium => RasterizerKind::Pdfium,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config + service ───────────────────────────────────────────
    let config = build_config(&cli)?;
    info!("{:?}", config);

    let service = AssignmentService::from_config(&config)
        .context("Failed to initialise the grading service")?;
    let app = router(AppState::new(service, config.max_upload_bytes));

    // ── Serve ────────────────────────────────────────────────────────────
    let listener = TcpListener::bind(cli.bind)
        .await
        .with_context(|| format!("Failed to bind {}", cli.bind))?;
    info!("Listening on http://{}", cli.bind);
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

fn build_config(cli: &Cli) -> Result<GraderConfig> {
    let mut builder = GraderConfig::builder()
        .strategy(cli.strategy.into())
        .rasterizer(cli.rasterizer.into())
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout)
        .ocr_timeout_secs(cli.ocr_timeout)
        .max_rendered_pixels(cli.max_rendered_pixels)
        .max_upload_bytes(cli.max_upload_bytes)
        .fallback_on_parse_failure(!cli.no_fallback);

    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref key) = cli.vision_api_key {
        builder = builder.vision_api_key(key);
    }
    if let Some(ref url) = cli.vision_endpoint {
        builder = builder.vision_endpoint(url);
    }
    if let Some(ref secret) = cli.conversion_secret {
        builder = builder.conversion_secret(secret);
    }
    if let Some(ref url) = cli.conversion_endpoint {
        builder = builder.conversion_endpoint(url);
    }
    if let Some(ref path) = cli.pdfium_lib_path {
        builder = builder.pdfium_lib_path(path);
    }

    builder.build().context("Invalid configuration")
}
