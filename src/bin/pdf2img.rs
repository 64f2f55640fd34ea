//! CLI binary for edgequake-pdf2img.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionRequest` and prints results.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_pdf2img::output::format_file_size;
use edgequake_pdf2img::{
    optimize_pdf, split_pdf, CancelToken, ConversionProgressCallback, ConversionRequest,
    ConversionResult, Converter, OptimizeConfig, PoolConfig, ProgressCallback, SplitRequest,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::info;
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

/// Live progress bar plus one log line per page.
///
/// The bar counts first-pass pages only; retried pages are logged but do not
/// advance it a second time.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    retrying: AtomicBool,
}

impl CliProgressCallback {
    /// Spinner until `on_conversion_start` reports the page count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            retrying: AtomicBool::new(false),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Rendering");
        self.bar.reset_eta();
    }

    fn elapsed(&self, page: usize) -> String {
        let ms = self
            .start_times
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&page)
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);
        dim(&format!("{:.1}s", ms as f64 / 1000.0))
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Rendering {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, page: usize, _total_pages: usize) {
        self.start_times
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(page, Instant::now());
        self.bar.set_message(format!("page {page}"));
    }

    fn on_page_complete(&self, page: usize, _total_pages: usize, path: &Path) {
        let retrying = self.retrying.load(Ordering::SeqCst);
        let file = path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.bar.println(format!(
            "  {} Page {:>4}  {:<16}  {}",
            if retrying { yellow("↻") } else { green("✓") },
            page,
            dim(&file),
            self.elapsed(page),
        ));
        if !retrying {
            self.bar.inc(1);
        }
    }

    fn on_page_error(&self, page: usize, _total_pages: usize, error: &str) {
        let retrying = self.retrying.load(Ordering::SeqCst);

        // Truncate very long error messages to keep output tidy.
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Page {:>4}  {}  {}",
            red("✗"),
            page,
            red(&msg),
            self.elapsed(page),
        ));
        if !retrying {
            self.bar.inc(1);
        }
    }

    fn on_retry_start(&self, pages: &[usize], dpi: f32) {
        self.retrying.store(true, Ordering::SeqCst);
        self.bar.set_prefix("Retrying");
        self.bar.println(format!(
            "{} {}",
            yellow("↻"),
            bold(&format!("Retrying {} page(s) at {dpi} DPI…", pages.len()))
        ));
    }

    fn on_conversion_complete(&self, _total_pages: usize, _success_count: usize) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Every page as PNG at 150 DPI into ./pages
  pdf2img -i document.pdf -o pages

  # Pages 3-10 as JPEG at 300 DPI with a custom prefix
  pdf2img -i scan.pdf -o out -f jpg -d 300 --start 3 --end 10 --prefix scan_

  # Large or fragile document: retry engine faults, refresh pdfium often
  pdf2img -i big.pdf -o out --retry --refresh-every 20

  # Page count, size and dimensions
  pdf2img info document.pdf

  # Extract pages 5-12 into a new PDF
  pdf2img split -i book.pdf -o chapter.pdf --start 5 --end 12

  # Rewrite a PDF more compactly
  pdf2img optimize -i bloated.pdf -o smaller.pdf

OUTPUT NAMING:
  {prefix}{page, 4 digits}.{format}   e.g. page_0001.png, page_0042.jpg

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH   Path to libpdfium (file or directory); default is ./ then system
  RUST_LOG          Override log filtering (e.g. edgequake_pdf2img=debug)
  PDF2IMG_*         Fallback for every option, e.g. PDF2IMG_DPI=300
"#;

/// Render PDF pages to PNG or JPEG images.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2img",
    version,
    about = "Render PDF pages to PNG or JPEG images",
    long_about = "Render PDF pages to PNG or JPEG images with pdfium. Pages that hit an \
engine fault can be retried once at reduced DPI, and engine instances are replaced \
periodically so long documents do not degrade.",
    args_conflicts_with_subcommands = true,
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    convert: ConvertArgs,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDF2IMG_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDF2IMG_QUIET")]
    quiet: bool,
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// Input PDF file.
    #[arg(short, long, env = "PDF2IMG_INPUT")]
    input: Option<PathBuf>,

    /// Output directory (created if missing).
    #[arg(short, long, env = "PDF2IMG_OUTPUT", default_value = ".")]
    output: PathBuf,

    /// Output format: png, jpg or jpeg.
    #[arg(short, long, env = "PDF2IMG_FORMAT", default_value = "png")]
    format: String,

    /// Rendering DPI; 0 or less means 150.
    #[arg(short, long, env = "PDF2IMG_DPI", default_value_t = 150.0, allow_negative_numbers = true)]
    dpi: f32,

    /// First page, 1-indexed (0 = first page).
    #[arg(long, env = "PDF2IMG_START", default_value_t = 0)]
    start: usize,

    /// Last page, inclusive (0 = last page).
    #[arg(long, env = "PDF2IMG_END", default_value_t = 0)]
    end: usize,

    /// Filename prefix.
    #[arg(long, env = "PDF2IMG_PREFIX", default_value = "page_")]
    prefix: String,

    /// Retry pages that hit an engine fault once at reduced DPI.
    #[arg(long, env = "PDF2IMG_RETRY")]
    retry: bool,

    /// Maximum live pdfium instances.
    #[arg(long, env = "PDF2IMG_POOL_SIZE", default_value_t = 2)]
    pool_size: usize,

    /// Replace the pdfium instance every N pages (0 disables).
    #[arg(long, env = "PDF2IMG_REFRESH_EVERY", default_value_t = 50)]
    refresh_every: usize,

    /// Print the result as JSON on stdout.
    #[arg(long, env = "PDF2IMG_JSON")]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, env = "PDF2IMG_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show page count, file size and first-page dimensions.
    Info {
        /// PDF file to inspect.
        file: PathBuf,

        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Extract a page range into a new PDF.
    Split {
        /// Input PDF file.
        #[arg(short, long)]
        input: PathBuf,

        /// Output PDF file.
        #[arg(short, long)]
        output: PathBuf,

        /// First page, 1-indexed (0 = first page).
        #[arg(long, default_value_t = 0)]
        start: usize,

        /// Last page, inclusive (0 = last page).
        #[arg(long, default_value_t = 0)]
        end: usize,
    },

    /// Rewrite a PDF more compactly (lossless).
    Optimize {
        /// Input PDF file.
        #[arg(short, long)]
        input: PathBuf,

        /// Output PDF file; may equal the input.
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar gives all the feedback that matters, so INFO-level
    // library logs are muted while it is shown.
    let show_progress = cli.command.is_none()
        && !cli.quiet
        && !cli.convert.no_progress
        && !cli.convert.json;
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

    let quiet = cli.quiet;
    let outcome = match cli.command {
        Some(Command::Info { file, json }) => run_info(&file, json).await,
        Some(Command::Split {
            input,
            output,
            start,
            end,
        }) => run_split(input, output, start, end, quiet).await,
        Some(Command::Optimize { input, output }) => run_optimize(input, output, quiet).await,
        None => run_convert(cli.convert, show_progress, cli.verbose, quiet).await,
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", red("Error:"), e);
            ExitCode::FAILURE
        }
    }
}

async fn run_convert(
    args: ConvertArgs,
    show_progress: bool,
    verbose: bool,
    quiet: bool,
) -> Result<()> {
    let Some(input) = args.input.clone() else {
        bail!("missing input file; pass -i <FILE> (see --help)");
    };

    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };

    // Ctrl-C stops before the next page and still reports what was written.
    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    let mut builder = ConversionRequest::builder(input, &args.output)
        .format(args.format.as_str())
        .dpi(args.dpi)
        .pages(args.start, args.end)
        .prefix(args.prefix.as_str())
        .retry_failed(args.retry)
        .pool_size(args.pool_size)
        .refresh_every(args.refresh_every)
        .cancel_token(cancel);
    if let Some(cb) = progress_cb {
        builder = builder.progress_callback(cb);
    }
    let request = builder.build().context("Invalid configuration")?;

    info!(
        "Starting conversion: {} → {} ({}, {} DPI)",
        request.input.display(),
        request.output_dir.display(),
        request.format,
        request.dpi
    );

    let converter = Converter::with_pdfium(request.pool_config());
    let result = converter
        .convert_async(request)
        .await
        .context("Conversion failed")?;
    converter.shutdown();

    if args.json {
        let json = serde_json::to_string_pretty(&result).context("Failed to serialise result")?;
        println!("{json}");
    } else if !quiet {
        print_result(&result, verbose, args.retry);
    }
    Ok(())
}

fn print_result(result: &ConversionResult, verbose: bool, retried: bool) {
    if result.cancelled {
        println!("\n{} Conversion Cancelled", yellow("■"));
    } else if result.failed == 0 {
        println!("\n{} Conversion Complete", green("✓"));
    } else {
        println!("\n{} Conversion Complete", yellow("⚠"));
    }
    println!("Total pages: {}", result.total_pages);
    println!("Successful: {}", result.successful);
    println!("Failed: {}", result.failed);

    if verbose && !result.output_files.is_empty() {
        println!("\nOutput files:");
        for file in &result.output_files {
            println!("  - {}", file.display());
        }
    }

    if !result.retried_pages.is_empty() {
        println!("\n{} Recovered at reduced DPI:", cyan("↻"));
        for retried in &result.retried_pages {
            println!("  - Page {} ({} DPI)", retried.page, retried.dpi);
        }
    }

    if !result.warning_pages.is_empty() {
        println!(
            "\n{} Pages with engine faults (may need manual inspection):",
            yellow("⚠")
        );
        for page in &result.warning_pages {
            println!("  - Page {page}");
        }
    }

    if !result.errors.is_empty() {
        println!("\n{}", red("Errors:"));
        for message in result.error_messages() {
            println!("  - {message}");
        }
        if !retried {
            println!(
                "\n{}",
                dim("Tip: some pages failed. Run again with --retry to re-render them at reduced DPI.")
            );
        }
    }
}

async fn run_info(file: &Path, json: bool) -> Result<()> {
    let converter = Converter::with_pdfium(PoolConfig::default().max_instances(1));
    let info = converter
        .inspect_async(file.to_path_buf())
        .await
        .context("Failed to get PDF info")?;
    converter.shutdown();

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&info).context("Failed to serialise info")?
        );
        return Ok(());
    }

    println!("\n{}", bold("PDF Information"));
    println!("===============");
    println!("File:   {}", info.file.display());
    println!("Pages:  {}", info.pages);
    println!("Size:   {}", info.file_size_human);
    if let Some(width) = info.width_pt {
        println!("Width:  {width:.2} pt");
    }
    if let Some(height) = info.height_pt {
        println!("Height: {height:.2} pt");
    }
    Ok(())
}

async fn run_split(
    input: PathBuf,
    output: PathBuf,
    start: usize,
    end: usize,
    quiet: bool,
) -> Result<()> {
    let request = SplitRequest {
        input,
        output,
        start_page: start,
        end_page: end,
    };
    let result = tokio::task::spawn_blocking(move || split_pdf(&request))
        .await
        .context("Split task panicked")?
        .context("Split failed")?;

    if !quiet {
        println!("\n{} Split Complete", green("✓"));
        println!("Total pages in PDF: {}", result.total_pages);
        println!("Extracted pages: {}", result.extracted_pages);
        println!("Output saved to: {}", result.output_path.display());
    }
    Ok(())
}

async fn run_optimize(input: PathBuf, output: PathBuf, quiet: bool) -> Result<()> {
    let target = output.clone();
    let result = tokio::task::spawn_blocking(move || {
        optimize_pdf(&input, &output, &OptimizeConfig::default())
    })
    .await
    .context("Optimize task panicked")?
    .context("Optimize failed")?;

    if !quiet {
        println!("\n{} Optimize Complete", green("✓"));
        println!(
            "Size: {} → {} ({:.1}% saved)",
            format_file_size(result.original_size),
            format_file_size(result.optimized_size),
            result.saved_percent()
        );
        println!("Output saved to: {}", target.display());
    }
    Ok(())
}
