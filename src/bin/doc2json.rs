//! CLI binary for edgequake-doc2json.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExtractionConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_doc2json::batch::{self, BatchMode, DEFAULT_SUMMARY_FILE};
use edgequake_doc2json::extract::write_json;
use edgequake_doc2json::output::Report;
use edgequake_doc2json::pipeline::llm::run_predictor;
use edgequake_doc2json::prompts::{connectivity_probe, PROBE_TEXT};
use edgequake_doc2json::signature::{Inputs, Predictor};
use edgequake_doc2json::{
    extract, extract_page_by_page, extract_with_comparison, inspect, ExtractionConfig,
    ExtractionMethod, ExtractionProgressCallback, PageSelection, ProgressCallback, ProviderConfig,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::HashMap;
use std::io;
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

/// What the bar counts.
#[derive(Clone, Copy, PartialEq, Eq)]
enum ProgressUnit {
    /// One model call for the whole document: spinner only.
    Document,
    /// Page-by-page: one tick per page.
    Pages,
    /// Folder run: one tick per document.
    Documents,
}

struct CliProgressCallback {
    bar: ProgressBar,
    unit: ProgressUnit,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new(unit: ProgressUnit) -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening document…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            unit,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize, noun: &str, prefix: &str) {
        let template = format!(
            "{{spinner:.cyan}} {{prefix:.bold}}  \
             [{{bar:42.green/238}}] {{pos:>3}}/{{len}} {noun}  \
             ⏱ {{elapsed_precise}}  ETA {{eta_precise}}"
        );
        let progress_style = ProgressStyle::with_template(&template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix(prefix.to_string());
        self.bar.reset_eta();
    }

    fn elapsed(&self, page_num: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&page_num))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

fn truncate(msg: &str, max: usize) -> String {
    if msg.chars().count() > max {
        let head: String = msg.chars().take(max - 1).collect();
        format!("{head}\u{2026}")
    } else {
        msg.to_string()
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_document_start(&self, path: &Path) {
        if self.unit != ProgressUnit::Documents {
            self.bar.set_message(format!("Loading {}", path.display()));
        }
    }

    fn on_pages_ready(&self, total_pages: usize) {
        match self.unit {
            ProgressUnit::Pages => {
                self.activate_bar(total_pages, "pages", "Extracting");
                self.bar.println(format!(
                    "{} {}",
                    cyan("◆"),
                    bold(&format!("Extracting {total_pages} pages one by one…"))
                ));
            }
            ProgressUnit::Document => {
                self.bar.set_prefix("Extracting");
                self.bar
                    .set_message(format!("{total_pages} page(s) prepared, waiting for the model…"));
            }
            ProgressUnit::Documents => {}
        }
    }

    fn on_page_start(&self, page_num: usize, _total_pages: usize) {
        if self.unit != ProgressUnit::Pages {
            return;
        }
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(page_num, Instant::now());
        }
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total_pages: usize) {
        if self.unit != ProgressUnit::Pages {
            return;
        }
        let secs = self.elapsed(page_num);
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            green("✓"),
            page_num,
            total_pages,
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        if self.unit != ProgressUnit::Pages {
            return;
        }
        let secs = self.elapsed(page_num);
        self.errors.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total_pages,
            red(&truncate(error, 80)),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_document_complete(&self, _path: &Path) {
        if self.unit == ProgressUnit::Documents {
            return;
        }
        self.bar.finish_and_clear();
        let failed = self.errors.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!("{} Extraction complete", green("✔"));
        } else {
            eprintln!(
                "{} Extraction complete  ({} page(s) failed)",
                cyan("⚠"),
                red(&failed.to_string())
            );
        }
    }

    fn on_document_error(&self, path: &Path, error: &str) {
        if self.unit == ProgressUnit::Documents {
            return;
        }
        self.bar.finish_and_clear();
        eprintln!("{} {}  {}", red("✘"), path.display(), red(&truncate(error, 120)));
    }

    fn on_batch_start(&self, total_documents: usize) {
        self.activate_bar(total_documents, "documents", "Batch");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Processing {total_documents} documents…"))
        ));
    }

    fn on_batch_document(&self, index: usize, _total_documents: usize, path: &Path) {
        self.bar.set_position(index.saturating_sub(1) as u64);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.bar.set_message(name);
    }

    fn on_batch_complete(&self, total_documents: usize, success_count: usize) {
        let failed = total_documents.saturating_sub(success_count);
        self.bar.finish_and_clear();
        if failed == 0 {
            eprintln!(
                "{} {} documents processed successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} documents processed  ({} failed)",
                if failed == total_documents {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_documents,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract one document (stdout); `extract` is the default command
  doc2json invoice.pdf
  doc2json extract invoice.pdf

  # Write the JSON envelope to a file
  doc2json extract scan.png -o scan.json

  # One model call per page, merged afterwards
  doc2json extract --page-by-page lab_report.pdf

  # Run both methods and compare field coverage
  doc2json extract --compare lab_report.pdf -o comparison.json

  # Use Azure OpenAI instead of OpenAI
  doc2json invoice.pdf --azure

  # Process every document under ./data (standard + page-by-page for PDFs)
  doc2json batch data

  # Quick batch: standard extraction only
  doc2json batch --quick data

  # Document metadata (no API key needed)
  doc2json inspect report.pdf

  # Show which credentials would be used
  doc2json config --auto

  # Probe Azure deployments
  doc2json --azure check --deployment gpt-4o --deployment gpt-4o-mini

SUPPORTED INPUTS:
  .pdf .jpg .jpeg .png .bmp .tiff .tif  (local paths or HTTP/HTTPS URLs)

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY                 OpenAI API key (default provider)
  AZURE_OPENAI_API_KEY           Azure OpenAI key          ┐
  AZURE_OPENAI_ENDPOINT          Azure resource endpoint   │ all four are
  AZURE_OPENAI_DEPLOYMENT_NAME   Deployment to call        │ required with
  AZURE_OPENAI_API_VERSION       API version               ┘ --azure
  PDFIUM_LIB_PATH                Path to libpdfium (file or directory)

  A .env file in the working directory is loaded first.
"#;

/// Extract structured JSON from PDFs and images using Vision LLMs.
///
/// `doc2json <INPUT>` is shorthand for `doc2json extract <INPUT>`.
#[derive(Parser, Debug)]
#[command(
    name = "doc2json",
    version,
    about = "Extract structured JSON from PDFs and images using Vision LLMs",
    long_about = "Turn PDF documents and images (local files or URLs) into structured JSON \
using a vision-capable LLM on OpenAI or Azure OpenAI. Pages are rendered to images and sent \
together with the document text; the model answers with one JSON object.",
    arg_required_else_help = true,
    args_conflicts_with_subcommands = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Local file path or HTTP/HTTPS URL to extract.
    input: Option<String>,

    #[command(flatten)]
    flags: ExtractFlags,

    #[command(flatten)]
    globals: GlobalOpts,
}

impl Cli {
    /// Split into global options and the command to run; a bare input
    /// becomes `extract`.
    fn into_parts(self) -> Result<(GlobalOpts, Command)> {
        let command = match (self.command, self.input) {
            (Some(command), _) => command,
            (None, Some(input)) => Command::Extract(ExtractArgs {
                input,
                flags: self.flags,
            }),
            (None, None) => anyhow::bail!("No input given. Run `doc2json --help` for usage."),
        };
        Ok((self.globals, command))
    }
}

/// Options accepted before or after any subcommand.
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Use Azure OpenAI (requires all four AZURE_OPENAI_* variables).
    #[arg(long, global = true, visible_alias = "use-azure", env = "DOC2JSON_AZURE")]
    azure: bool,

    /// OpenAI model ID (ignored with --azure; the deployment decides).
    #[arg(long, global = true, env = "DOC2JSON_MODEL")]
    model: Option<String>,

    /// Disable the progress bar.
    #[arg(long, global = true, env = "DOC2JSON_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "DOC2JSON_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and results.
    #[arg(short, long, global = true, env = "DOC2JSON_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract structured data from one document.
    Extract(ExtractArgs),

    /// Extract every supported document in a folder.
    Batch {
        /// Folder to scan recursively.
        #[arg(default_value = "data")]
        folder: PathBuf,

        /// Standard extraction only, saved as `{stem}_extracted.json`.
        #[arg(long)]
        quick: bool,

        /// Where to write the batch summary.
        #[arg(long, env = "DOC2JSON_SUMMARY")]
        summary: Option<PathBuf>,

        #[command(flatten)]
        opts: ExtractOpts,
    },

    /// Print document metadata without calling the model.
    Inspect {
        /// Local file path or HTTP/HTTPS URL.
        input: String,

        /// Print metadata as JSON.
        #[arg(long)]
        json: bool,

        /// PDF user password for encrypted documents.
        #[arg(long, env = "DOC2JSON_PASSWORD")]
        password: Option<String>,

        /// URL download timeout in seconds.
        #[arg(long, default_value_t = 120, env = "DOC2JSON_DOWNLOAD_TIMEOUT")]
        download_timeout: u64,
    },

    /// Print the provider configuration that would be used.
    Config {
        /// Pick Azure when all four Azure variables are set, else OpenAI.
        #[arg(long)]
        auto: bool,
    },

    /// Send a short probe through the configured provider.
    Check {
        /// Azure deployment name to try (repeatable).
        #[arg(long = "deployment")]
        deployments: Vec<String>,
    },
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// Local file path or HTTP/HTTPS URL.
    input: String,

    #[command(flatten)]
    flags: ExtractFlags,
}

/// Single-document flags, valid with or without the `extract` keyword.
#[derive(Args, Debug)]
struct ExtractFlags {
    /// One model call per page, merged afterwards.
    #[arg(long, conflicts_with = "compare")]
    page_by_page: bool,

    /// Run standard and page-by-page extraction and compare them.
    #[arg(long)]
    compare: bool,

    /// Write JSON to this file instead of stdout.
    #[arg(short, long, env = "DOC2JSON_OUTPUT")]
    output: Option<PathBuf>,

    #[command(flatten)]
    opts: ExtractOpts,
}

/// Options shared by `extract` and `batch`.
#[derive(Args, Debug)]
struct ExtractOpts {
    /// Rendering DPI (72-400).
    #[arg(long, env = "DOC2JSON_DPI", default_value_t = 150,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// Page selection: all, 5, 3-15, or 1,3,5,7.
    #[arg(long, env = "DOC2JSON_PAGES", default_value = "all")]
    pages: String,

    /// Standard extraction method.
    #[arg(long, env = "DOC2JSON_METHOD", value_enum, default_value = "auto")]
    method: MethodArg,

    /// Document type hint (e.g. invoice, lab_report). `auto` detects it.
    #[arg(long, env = "DOC2JSON_DOCUMENT_TYPE", default_value = "auto")]
    document_type: String,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "DOC2JSON_PASSWORD")]
    password: Option<String>,

    /// Max LLM output tokens per call.
    #[arg(long, env = "DOC2JSON_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// LLM temperature (0.0-2.0).
    #[arg(long, env = "DOC2JSON_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Retries per LLM call on failure.
    #[arg(long, env = "DOC2JSON_MAX_RETRIES", default_value_t = 0)]
    max_retries: u32,

    /// Page images sent with a whole-document extraction.
    #[arg(long, env = "DOC2JSON_MAX_IMAGES", default_value_t = 1)]
    max_images: usize,

    /// Send rendered PDF pages as-is, without thresholding.
    #[arg(long, env = "DOC2JSON_NO_ENHANCE")]
    no_enhance: bool,

    /// Also save each prepared page image here as page_N.png.
    #[arg(long, env = "DOC2JSON_PAGE_IMAGES")]
    page_images: Option<PathBuf>,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "DOC2JSON_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Per-call LLM timeout in seconds (0 disables it).
    #[arg(long, env = "DOC2JSON_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum MethodArg {
    Auto,
    Natural,
    ChainOfThought,
}

impl From<MethodArg> for ExtractionMethod {
    fn from(v: MethodArg) -> Self {
        match v {
            MethodArg::Auto => ExtractionMethod::Auto,
            MethodArg::Natural => ExtractionMethod::Natural,
            MethodArg::ChainOfThought => ExtractionMethod::ChainOfThought,
        }
    }
}

#[tokio::main]
async fn main() {
    let (globals, command) = match Cli::parse().into_parts() {
        Ok(parts) => parts,
        Err(e) => {
            eprintln!("{} {:#}", red("✘"), e);
            std::process::exit(2);
        }
    };

    // ── Logging setup ────────────────────────────────────────────────────
    // INFO-level library logs are suppressed while the progress bar is up.
    let show_progress = !globals.quiet && !globals.no_progress && !globals.verbose;
    let filter = if globals.verbose {
        "debug"
    } else if globals.quiet || (show_progress && uses_progress(&command)) {
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

    if let Err(e) = run(&globals, command, show_progress).await {
        eprintln!("{} {:#}", red("✘"), e);
        std::process::exit(1);
    }
}

fn uses_progress(command: &Command) -> bool {
    matches!(command, Command::Extract(_) | Command::Batch { .. })
}

async fn run(globals: &GlobalOpts, command: Command, show_progress: bool) -> Result<()> {
    match command {
        Command::Inspect {
            input,
            json,
            password,
            download_timeout,
        } => run_inspect(&input, json, password, download_timeout).await,
        Command::Config { auto } => {
            let provider = select_provider(globals, auto)?;
            println!("{}", provider.info());
            Ok(())
        }
        Command::Check { deployments } => {
            let provider = select_provider(globals, false)?;
            run_check(&provider, &deployments, globals.quiet).await
        }
        Command::Extract(ExtractArgs { input, flags }) => {
            // Credentials first: a bad configuration exits before any download.
            let provider = select_provider(globals, false)?;
            let unit = if flags.page_by_page || flags.compare {
                ProgressUnit::Pages
            } else {
                ProgressUnit::Document
            };
            let progress = show_progress.then(|| CliProgressCallback::new(unit) as ProgressCallback);
            let config = build_config(&flags.opts, provider, progress)?;

            let doc_type = config.document_type.clone();
            let (json, success) = if flags.compare {
                let out = extract_with_comparison(&input, &config)
                    .await
                    .context("Comparison failed")?;
                (serde_json::to_value(&out)?, true)
            } else if flags.page_by_page {
                envelope(Report::from_result(
                    extract_page_by_page(&input, &config).await,
                    &input,
                    doc_type,
                ))?
            } else {
                envelope(Report::from_result(extract(&input, &config).await, &input, doc_type))?
            };

            emit(&json, flags.output.as_deref()).await?;
            if !success {
                anyhow::bail!("Extraction failed for {input}");
            }
            Ok(())
        }
        Command::Batch {
            folder,
            quick,
            summary,
            opts,
        } => {
            let provider = select_provider(globals, false)?;
            let progress = show_progress
                .then(|| CliProgressCallback::new(ProgressUnit::Documents) as ProgressCallback);
            let config = build_config(&opts, provider, progress)?;
            let mode = if quick { BatchMode::Quick } else { BatchMode::Full };

            let result = batch::run_batch(&folder, mode, &config)
                .await
                .context("Batch processing failed")?;

            if !result.success {
                eprintln!(
                    "{} {} in {}",
                    cyan("⚠"),
                    result.message.as_deref().unwrap_or("Nothing processed"),
                    folder.display()
                );
                return Ok(());
            }

            let summary_path = match (summary, mode) {
                (Some(p), _) => Some(p),
                (None, BatchMode::Full) => Some(PathBuf::from(DEFAULT_SUMMARY_FILE)),
                (None, BatchMode::Quick) => None,
            };
            if let Some(ref path) = summary_path {
                result
                    .write_summary(path)
                    .await
                    .with_context(|| format!("Failed to write summary to {}", path.display()))?;
            }

            if !globals.quiet {
                eprintln!(
                    "{}  {}/{} documents  ({})",
                    if result.failed == 0 {
                        green("✔")
                    } else {
                        cyan("⚠")
                    },
                    result.processed_successfully,
                    result.total_documents,
                    result.success_rate,
                );
                for outcome in result.results.iter().filter(|r| !r.success) {
                    eprintln!(
                        "   {} {}  {}",
                        red("✗"),
                        outcome.file,
                        dim(outcome.error.as_deref().unwrap_or(""))
                    );
                }
                if let Some(ref path) = summary_path {
                    eprintln!("   summary  →  {}", bold(&path.display().to_string()));
                }
            }
            Ok(())
        }
    }
}

/// Serialise a report and tell whether it was a success.
fn envelope<T: Serialize>(report: Report<T>) -> Result<(serde_json::Value, bool)> {
    let success = report.is_success();
    Ok((serde_json::to_value(&report).context("Failed to serialise output")?, success))
}

async fn emit(json: &serde_json::Value, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            write_json(path, json)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("{}  →  {}", green("✔"), bold(&path.display().to_string()));
        }
        None => {
            println!(
                "{}",
                serde_json::to_string_pretty(json).context("Failed to serialise output")?
            );
        }
    }
    Ok(())
}

/// Resolve credentials from the environment, honouring `--azure`.
fn select_provider(globals: &GlobalOpts, auto: bool) -> Result<ProviderConfig> {
    let provider = if auto {
        ProviderConfig::auto_from_env()
    } else {
        ProviderConfig::from_env(globals.azure)
    }
    .context("Provider configuration error")?;

    Ok(match globals.model {
        Some(ref m) => provider.with_model(m.clone()),
        None => provider,
    })
}

/// Map CLI args to `ExtractionConfig`.
fn build_config(
    opts: &ExtractOpts,
    provider: ProviderConfig,
    progress: Option<ProgressCallback>,
) -> Result<ExtractionConfig> {
    let pages = PageSelection::parse(&opts.pages).context("Invalid --pages")?;

    let mut builder = ExtractionConfig::builder()
        .dpi(opts.dpi)
        .provider_config(provider)
        .method(opts.method.into())
        .document_type(opts.document_type.clone())
        .pages(pages)
        .max_tokens(opts.max_tokens)
        .temperature(opts.temperature)
        .max_retries(opts.max_retries)
        .max_document_images(opts.max_images)
        .enhance_images(!opts.no_enhance)
        .download_timeout_secs(opts.download_timeout)
        .api_timeout_secs(opts.api_timeout);

    if let Some(ref pwd) = opts.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(ref dir) = opts.page_images {
        builder = builder.page_image_dir(dir.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

async fn run_inspect(
    input: &str,
    json: bool,
    password: Option<String>,
    download_timeout: u64,
) -> Result<()> {
    let mut builder = ExtractionConfig::builder().download_timeout_secs(download_timeout);
    if let Some(pwd) = password {
        builder = builder.password(pwd);
    }
    let config = builder.build().context("Invalid configuration")?;
    let meta = inspect(input, &config)
        .await
        .context("Failed to inspect document")?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&meta).context("Failed to serialize metadata")?
        );
        return Ok(());
    }

    println!("File:         {}", meta.file_path);
    if let Some(ref kind) = meta.document_type {
        println!("Type:         {}", kind);
    }
    println!("Pages:        {}", meta.page_count);
    println!("Size:         {} bytes", meta.file_size_bytes);
    let optional = [
        ("Title", &meta.title),
        ("Author", &meta.author),
        ("Subject", &meta.subject),
        ("Creator", &meta.creator),
        ("Producer", &meta.producer),
        ("Created", &meta.creation_date),
        ("PDF Version", &meta.pdf_version),
        ("Format", &meta.image_format),
        ("Colour", &meta.color_type),
    ];
    for (label, value) in optional {
        if let Some(v) = value {
            println!("{:<14}{}", format!("{label}:"), v);
        }
    }
    if let (Some(w), Some(h)) = (meta.width, meta.height) {
        println!("Dimensions:   {w}x{h}");
    }
    Ok(())
}

/// Run the connectivity probe once per candidate provider.
async fn run_check(provider: &ProviderConfig, deployments: &[String], quiet: bool) -> Result<()> {
    if !quiet {
        eprintln!("{}", provider.info());
    }

    let candidates: Vec<ProviderConfig> = match provider {
        ProviderConfig::Azure {
            api_key,
            endpoint,
            api_version,
            ..
        } if !deployments.is_empty() => deployments
            .iter()
            .map(|d| ProviderConfig::Azure {
                api_key: api_key.clone(),
                endpoint: endpoint.clone(),
                deployment: d.clone(),
                api_version: api_version.clone(),
            })
            .collect(),
        _ => {
            if !deployments.is_empty() {
                eprintln!("{} --deployment only applies with --azure; ignoring", cyan("⚠"));
            }
            vec![provider.clone()]
        }
    };

    let config = ExtractionConfig::default();
    let predictor = Predictor::predict(connectivity_probe());
    let inputs = Inputs::new().text("text", PROBE_TEXT);
    let mut working = Vec::new();

    for candidate in &candidates {
        let name = candidate.model_name().to_string();
        let outcome = match candidate.build() {
            Ok(llm) => run_predictor(&llm, &predictor, &inputs, &config, &name)
                .await
                .map_err(anyhow::Error::from),
            Err(e) => Err(e.into()),
        };
        match outcome {
            Ok(prediction) => {
                println!(
                    "  {} {:<24} sentiment: {}",
                    green("✓"),
                    name,
                    prediction.get("sentiment").unwrap_or("-")
                );
                working.push(name);
            }
            Err(e) => println!("  {} {:<24} {}", red("✗"), name, red(&truncate(&format!("{e}"), 100))),
        }
    }

    if working.is_empty() {
        anyhow::bail!("No working deployment found");
    }
    if candidates.len() > 1 && !quiet {
        eprintln!("{} Working: {}", green("✔"), working.join(", "));
    }
    Ok(())
}
