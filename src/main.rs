use anyhow::{bail, Context, Result};
use ariadne::config::{CHANNEL_CAPACITY, SUMMARY_FILE};
use ariadne::extract::ExtractConfig;
use ariadne::index::DuplicatePolicy;
use ariadne::resolve::{streams_present, ResolveConfig};
use ariadne::stats::{ExtractionStats, ResolutionStats, RunSummary};
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "ariadne")]
#[command(about = "Extract the article link graph from Wikipedia dumps")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream a dump into the pages, raw redirects and raw links files
    Extract(ExtractArgs),
    /// Resolve redirects and links into nodes.csv and edges.csv
    Resolve(ResolveArgs),
    /// Extract, then resolve
    Run(RunArgs),
}

#[derive(Args)]
struct ExtractArgs {
    /// Path to the Wikipedia dump file (.xml.bz2 or .xml)
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory for generated files
    #[arg(short, long)]
    output: PathBuf,

    /// Maximum number of pages buffered between the reader and the processor
    #[arg(long, default_value_t = CHANNEL_CAPACITY)]
    channel_capacity: usize,

    /// Limit number of pages to process (for testing)
    #[arg(long)]
    limit: Option<u64>,

    /// Clear existing outputs before starting
    #[arg(long)]
    clean: bool,
}

#[derive(Args)]
struct ResolveArgs {
    /// Directory containing the extracted streams
    #[arg(short, long)]
    output: PathBuf,

    /// Fail on duplicate page titles or ids instead of keeping the last one
    #[arg(long)]
    strict: bool,

    /// Resolve links by exact title or redirect only, without case-insensitive matching
    #[arg(long)]
    exact_links: bool,
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    extract: ExtractArgs,

    /// Fail on duplicate page titles or ids instead of keeping the last one
    #[arg(long)]
    strict: bool,

    /// Resolve links by exact title or redirect only, without case-insensitive matching
    #[arg(long)]
    exact_links: bool,
}

impl ResolveArgs {
    fn config(&self) -> ResolveConfig {
        ResolveConfig {
            output_dir: self.output.clone(),
            policy: if self.strict {
                DuplicatePolicy::Strict
            } else {
                DuplicatePolicy::Lenient
            },
            exact_links: self.exact_links,
        }
    }
}

fn extract(args: &ExtractArgs) -> Result<ExtractionStats> {
    if args.clean && args.output.exists() {
        info!("Cleaning output directory: {:?}", args.output);
        fs::remove_dir_all(&args.output)
            .with_context(|| format!("Failed to clean output directory: {:?}", args.output))?;
    }

    fs::create_dir_all(&args.output)
        .with_context(|| format!("Failed to create output directory: {:?}", args.output))?;

    let config = ExtractConfig {
        channel_capacity: args.channel_capacity,
        limit: args.limit,
        ..ExtractConfig::new(&args.input, &args.output)
    };

    let start = Instant::now();
    let stats = ariadne::extract::run_extraction(&config)?;
    let duration = start.elapsed();
    info!(duration_secs = duration.as_secs_f64(), "Extraction pass complete");

    println!();
    println!("=== Extraction ===");
    println!("Time:               {:.2}s", duration.as_secs_f64());
    println!("Pages seen:         {}", stats.pages_seen());
    println!("Articles:           {}", stats.articles());
    println!("Redirects:          {}", stats.redirects());
    println!("Links:              {}", stats.links());
    println!("Other namespaces:   {}", stats.pages_discarded());
    println!("Malformed pages:    {}", stats.pages_malformed());
    println!(
        "Broken redirects:   {}",
        stats.redirects_missing_target() + stats.redirects_missing_text()
    );

    Ok(stats)
}

fn resolve(config: &ResolveConfig) -> Result<ResolutionStats> {
    if !streams_present(&config.output_dir) {
        bail!(
            "No extracted streams in {:?}; run `ariadne extract` first",
            config.output_dir
        );
    }

    let start = Instant::now();
    let stats = ariadne::resolve::run_resolution(config)?;
    let duration = start.elapsed();
    info!(duration_secs = duration.as_secs_f64(), "Resolution pass complete");

    println!();
    println!("=== Resolution ===");
    println!("Time:               {:.2}s", duration.as_secs_f64());
    println!("Pages indexed:      {}", stats.pages_indexed());
    println!("Duplicate titles:   {}", stats.duplicate_titles());
    println!("Case collisions:    {}", stats.case_collisions());
    println!("Redirects resolved: {}", stats.redirects_resolved());
    println!(
        "Redirects skipped:  {} ({:.3}%)",
        stats.redirects_skipped(),
        stats.redirect_skip_ratio()
    );
    println!("Edges:              {}", stats.links_resolved());
    println!("  via redirect:     {}", stats.links_via_redirect());
    println!(
        "Unresolved links:   {} ({:.3}%)",
        stats.links_unresolved(),
        stats.link_unresolved_ratio()
    );

    Ok(stats)
}

fn write_summary(dir: &Path, summary: &RunSummary) -> Result<()> {
    let path = dir.join(SUMMARY_FILE);
    let json = serde_json::to_string_pretty(summary)?;
    fs::write(&path, json).with_context(|| format!("Failed to write summary: {:?}", path))?;
    info!(path = ?path, "Summary written");
    Ok(())
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Extract(args) => {
            let stats = extract(&args)?;
            let summary = RunSummary {
                extraction: Some(stats.snapshot()),
                resolution: None,
            };
            write_summary(&args.output, &summary)
        }
        Commands::Resolve(args) => {
            let stats = resolve(&args.config())?;
            let summary = RunSummary {
                extraction: None,
                resolution: Some(stats.snapshot()),
            };
            write_summary(&args.output, &summary)
        }
        Commands::Run(args) => {
            let extraction = extract(&args.extract)?;
            let config = ResolveArgs {
                output: args.extract.output.clone(),
                strict: args.strict,
                exact_links: args.exact_links,
            }
            .config();
            let resolution = resolve(&config)?;
            let summary = RunSummary {
                extraction: Some(extraction.snapshot()),
                resolution: Some(resolution.snapshot()),
            };
            write_summary(&args.extract.output, &summary)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return ExitCode::FAILURE;
    }

    match run(cli.command) {
        Ok(()) => {
            info!("Completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Error: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
