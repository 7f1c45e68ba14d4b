//! CLI binary for pdf-reorder.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ReorderConfig`, runs the orchestrator over extracted page texts, and
//! prints the decided order.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf_reorder::{
    load_pages, write_metadata, BusinessRules, ConfidenceMode, DiagnosticReport, Orchestrator,
    ProgressCallback, ReorderConfig, ReorderMetadata, ReorderProgressCallback, StrategyKind,
};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner plus one log line per strategy. Safe for `--parallel`, where
/// strategies finish out of priority order.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl ReorderProgressCallback for CliProgressCallback {
    fn on_reorder_start(&self, page_count: usize, strategy_count: usize) {
        self.bar.set_prefix("Reordering");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!(
                "Ordering {page_count} pages with {strategy_count} strategies…"
            ))
        ));
    }

    fn on_strategy_skipped(&self, strategy: &str) {
        self.bar
            .println(format!("  {} {:<20} {}", dim("–"), strategy, dim("not applicable")));
    }

    fn on_strategy_start(&self, strategy: &str) {
        self.bar.set_message(strategy.to_string());
    }

    fn on_strategy_complete(&self, strategy: &str, confidence: f64) {
        let mark = if confidence > 0.0 { green("✓") } else { red("✗") };
        self.bar.println(format!(
            "  {} {:<20} {}",
            mark,
            strategy,
            dim(&format!("confidence {confidence:.2}"))
        ));
    }

    fn on_reorder_complete(&self, method: Option<&str>, confidence: f64) {
        self.bar.finish_and_clear();
        match method {
            Some(m) => eprintln!(
                "{} {} wins  {}",
                green("✔"),
                bold(m),
                dim(&format!("mean confidence {confidence:.2}"))
            ),
            None => eprintln!("{} no usable signal, original order kept", cyan("⚠")),
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Pages as form-feed separated text (pdftotext output)
  pdftotext shuffled.pdf - | pdf-reorder -

  # Pages as a JSON array of strings
  pdf-reorder pages.json

  # Offline: no LLM, lexical similarity only
  pdf-reorder --disable llm --lexical-embeddings pages.txt

  # Custom start/end rules and a diagnostic report
  pdf-reorder --rules invoice-rules.json --report pages.json

  # Write the metadata JSON consumed by the PDF rebuild step
  pdf-reorder pages.json -o order.json

STRATEGIES (priority order, earlier wins ties):
  page_number          "Page X of Y", "Page: X", "- X -", bare numbers
  business_logic       scored cover/signature patterns (--rules)
  structural           Article / Section / Schedule / Exhibit / Appendix / Annex
  semantic_similarity  embedding nearest-neighbour walk
  date_sequence        earliest date per page
  llm_reasoning        one LLM call with page excerpts

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (default provider)
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (gemini, openai, anthropic, ollama)
  EDGEQUAKE_MODEL         Override model ID
  RUST_LOG                Log filter, e.g. pdf_reorder=debug
"#;

/// Decide the page order of a shuffled PDF from its extracted page texts.
#[derive(Parser, Debug)]
#[command(
    name = "pdf-reorder",
    version,
    about = "Decide the page order of a shuffled PDF from its extracted page texts",
    long_about = "Runs page-number, business-rule, structural, semantic, date and LLM ordering \
strategies over extracted page texts and prints the most confident valid order.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Page texts: a JSON array of strings or form-feed separated text; `-` reads stdin.
    pages: String,

    /// Write order metadata JSON to this file.
    #[arg(short, long, env = "PDF_REORDER_OUTPUT")]
    output: Option<PathBuf>,

    /// LLM model ID (e.g. gemini-2.5-flash, gpt-4.1-mini).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: gemini, openai, anthropic, ollama.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// JSON file with business-logic start/end patterns.
    #[arg(long, env = "PDF_REORDER_RULES")]
    rules: Option<PathBuf>,

    /// Strategies to skip (comma separated, e.g. llm,semantic).
    #[arg(long, value_delimiter = ',')]
    disable: Vec<StrategyKind>,

    /// Run strategies concurrently.
    #[arg(long, env = "PDF_REORDER_PARALLEL")]
    parallel: bool,

    /// Report per-transition confidences when the winner provides them.
    #[arg(long)]
    per_transition: bool,

    /// Use model-free lexical embeddings when no embedding model is available.
    #[arg(long)]
    lexical_embeddings: bool,

    /// Per-strategy timeout in seconds.
    #[arg(long, env = "PDF_REORDER_STRATEGY_TIMEOUT", default_value_t = 120)]
    strategy_timeout: u64,

    /// LLM call timeout in seconds.
    #[arg(long, env = "PDF_REORDER_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Characters of each page sent to the LLM.
    #[arg(long, default_value_t = 500)]
    excerpt_chars: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, default_value_t = 0.0)]
    temperature: f32,

    /// Max LLM output tokens.
    #[arg(long, default_value_t = 1024)]
    max_tokens: usize,

    /// Print the full result (all strategy outcomes) as JSON.
    #[arg(long)]
    json: bool,

    /// Print a diagnostic report of the decided order.
    #[arg(long)]
    report: bool,

    /// Disable progress spinner.
    #[arg(long, env = "PDF_REORDER_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs while the spinner is active.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    // ── Load pages ───────────────────────────────────────────────────────
    let pages = load_pages(&cli.pages).context("Failed to load page texts")?;

    // ── Build config + orchestrator ──────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ReorderProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb).await?;
    let orchestrator = Orchestrator::from_config(&config).context("Failed to initialise strategies")?;

    // ── Run ──────────────────────────────────────────────────────────────
    let result = orchestrator.reorder(&pages).await;
    let original_filename = (cli.pages != "-").then(|| cli.pages.clone());
    let metadata = ReorderMetadata::from_ordering(&result, original_filename);
    let report = cli.report.then(|| DiagnosticReport::analyze(&result, &pages));

    if cli.json {
        let body = serde_json::json!({
            "metadata": metadata,
            "outcomes": result.outcomes,
            "report": report,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&body).context("Failed to serialise result")?
        );
    } else {
        println!("{}", format_order(&result.final_order));
        if !cli.quiet {
            for (pos, (idx, conf)) in result
                .final_order
                .iter()
                .zip(&result.confidences)
                .enumerate()
            {
                println!("{:>4}  page {:>4}  {:.2}", pos, idx, conf);
            }
        }
        if let Some(ref r) = report {
            eprintln!();
            eprint!("{r}");
        }
    }

    if let Some(ref path) = cli.output {
        write_metadata(path, &metadata)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        if !cli.quiet {
            eprintln!("{}  metadata  →  {}", green("✔"), bold(&path.display().to_string()));
        }
    }

    Ok(())
}

/// Map CLI args to `ReorderConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ReorderConfig> {
    let mut builder = ReorderConfig::builder()
        .strategy_timeout_secs(cli.strategy_timeout)
        .api_timeout_secs(cli.api_timeout)
        .excerpt_chars(cli.excerpt_chars)
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .parallel(cli.parallel)
        .lexical_fallback(cli.lexical_embeddings);

    if cli.per_transition {
        builder = builder.confidence_mode(ConfidenceMode::PerTransition);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref path) = cli.rules {
        let json = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read rules from {:?}", path))?;
        let rules = BusinessRules::from_json(&json)
            .with_context(|| format!("Invalid rules in {:?}", path))?;
        builder = builder.business_rules(rules);
    }
    for kind in &cli.disable {
        builder = builder.disable(*kind);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn format_order(order: &[usize]) -> String {
    let items: Vec<String> = order.iter().map(|i| i.to_string()).collect();
    format!("[{}]", items.join(", "))
}
