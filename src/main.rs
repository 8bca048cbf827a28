use chrono::Local;
use clap::{Parser, Subcommand};
use lynx_catalog_scraper::browser::{BrowserManager, BrowserScraper};
use lynx_catalog_scraper::cancel::CancelToken;
use lynx_catalog_scraper::catalog::LynxCatalog;
use lynx_catalog_scraper::config::Config;
use lynx_catalog_scraper::discovery::{DiscoveryCrawler, DiscoveryOptions, YearRange};
use lynx_catalog_scraper::extraction::{BrowserLeafSource, ExtractionWorker};
use lynx_catalog_scraper::models::{Phase, ResumeCursor};
use lynx_catalog_scraper::page::Page;
use lynx_catalog_scraper::resume;
use lynx_catalog_scraper::sink::{CsvSink, IndexReader};
use log::info;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "lynx_catalog_scraper")]
#[command(about = "Crawl the Lynx parts catalog into a diagram index and part records")]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk the catalog tree and write one index row per diagram
    Discover {
        /// Index file; defaults to a timestamped file in the output directory
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Continue an existing index given with --out
        #[arg(long, requires = "out")]
        resume: bool,

        #[arg(long)]
        year_min: Option<i32>,

        #[arg(long)]
        year_max: Option<i32>,

        /// Stop after this many seconds, between two nodes
        #[arg(long)]
        max_duration_secs: Option<u64>,
    },

    /// Load the part list of every indexed diagram
    Extract {
        /// Catalog index written by `discover`
        #[arg(short, long)]
        index: PathBuf,

        /// Part record file; defaults to a timestamped file in the output directory
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// First index row to extract, counting the header as row 1
        #[arg(long, conflicts_with = "resume")]
        start_row: Option<u64>,

        /// Continue after the last leaf found in the file given with --out
        #[arg(long, requires = "out")]
        resume: bool,

        /// Stop after this many seconds, between two leaves
        #[arg(long)]
        max_duration_secs: Option<u64>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Discover {
            out,
            resume,
            year_min,
            year_max,
            max_duration_secs,
        } => {
            let out = out.unwrap_or_else(|| timestamped(&config, "index"));
            let years = config.year_range().overridden(year_min, year_max);
            discover(&config, &out, resume, years, cancel_token(max_duration_secs))
        }
        Commands::Extract {
            index,
            out,
            start_row,
            resume,
            max_duration_secs,
        } => {
            let out = out.unwrap_or_else(|| timestamped(&config, "parts"));
            let cursor = match (start_row, resume) {
                (Some(row), _) => resume::explicit_cursor(Phase::Extraction, row),
                (None, true) => resume::extraction_cursor(&index, &out)?,
                (None, false) => ResumeCursor::start(Phase::Extraction),
            };
            extract(&config, &index, &out, cursor, cancel_token(max_duration_secs))
        }
    }
}

fn timestamped(config: &Config, kind: &str) -> PathBuf {
    let stamp = Local::now().format("%Y%m%d%H%M%S");
    Path::new(&config.output.dir).join(format!("16_Lynx_{}_{}.csv", kind, stamp))
}

fn cancel_token(max_duration_secs: Option<u64>) -> CancelToken {
    let cancel = CancelToken::new();
    if let Some(secs) = max_duration_secs {
        cancel.cancel_after(Duration::from_secs(secs));
    }
    cancel
}

fn open_page(config: &Config) -> Result<(BrowserManager, BrowserScraper), Box<dyn std::error::Error>> {
    let manager = BrowserManager::new(config.browser_config())?;
    let page = BrowserScraper::new(manager.new_tab()?);
    Ok((manager, page))
}

fn discover(
    config: &Config,
    out: &Path,
    resume: bool,
    years: YearRange,
    cancel: CancelToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut options = DiscoveryOptions::new(&config.site.brand_key, &config.site.brand_label);
    options.years = years;
    if resume {
        options.resume_after = resume::discovery_resume_row(out)?;
    }

    let (_manager, page) = open_page(config)?;
    let landing = config.site.base_url.trim_end_matches('#');
    info!("Opening {}", landing);
    page.navigate(landing)?;

    let mut catalog = LynxCatalog::new(page, config.retry_policy(), config.catalog_timings());
    let mut sink = CsvSink::append(out)?;

    let stats = DiscoveryCrawler::new(&mut catalog, &mut sink, options)
        .with_cancel(cancel)
        .run()?;

    info!(
        "Catalog index: {} ({} rows written this run)",
        out.display(),
        stats.index_rows_written
    );
    Ok(())
}

fn extract(
    config: &Config,
    index: &Path,
    out: &Path,
    mut cursor: ResumeCursor,
    cancel: CancelToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let entries = IndexReader::new(index).entries()?;

    let (_manager, page) = open_page(config)?;
    let timings = config.catalog_timings();
    let mut source = BrowserLeafSource::new(page, &config.site.base_url, config.retry_policy())
        .with_wait(timings.wait, timings.poll)
        .with_settle(timings.settle);
    let mut sink = CsvSink::append(out)?;

    let result = ExtractionWorker::new(&mut source, &mut sink)
        .with_cancel(cancel)
        .run(entries, &mut cursor);
    info!(
        "Part records: {}; next run can continue with --start-row {}",
        out.display(),
        cursor.row_offset
    );
    let stats = result?;

    if stats.cancelled {
        info!("Stopped early at index row {}", cursor.row_offset);
    }
    Ok(())
}
