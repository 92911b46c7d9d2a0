use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use comfy_table::{presets, Attribute, Cell, ContentArrangement, Table};
use migtrack::{
    config::{load_config_from_path, Config, CONFIG_FILE_PATH},
    decoder::MetadataFetcher,
    discovery::{DexScreenerClient, PoolDiscovery},
    importer::{ImportOptions, ImportOutcome, MigrationImporter},
    ledger::{HttpLedgerClient, LedgerRpc},
    logger::{self, LogTag, LoggerConfig},
    ohlcv::{GeckoTerminalClient, OhlcvPipeline},
    scheduler::RequestScheduler,
    storage::{SqliteStore, SyncStore},
    sync::{SyncOptions, SyncOrchestrator, SyncReport},
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "migtrack")]
#[command(about = "Burn, pool and candle ingestion for token migration dashboards", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = CONFIG_FILE_PATH)]
    config: PathBuf,

    /// Enable debug output for tags (comma separated, or `all`)
    #[arg(long, global = true, value_delimiter = ',')]
    debug: Vec<String>,

    #[arg(long, global = true)]
    verbose: bool,

    /// Errors only
    #[arg(long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Mirror log output into this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan burns and refresh pools and candles for every active project
    Sync {
        #[arg(long)]
        dry_run: bool,

        /// Page ceiling per burn source
        #[arg(long)]
        max_pages: Option<u32>,

        /// Ignore history before this point (unix seconds or RFC3339)
        #[arg(long, value_parser = parse_since)]
        since: Option<i64>,
    },
    /// Create a project from a migration claim URL or id
    Import {
        url_or_id: String,

        #[arg(long)]
        dry_run: bool,

        /// Also track burns of the new token's mint
        #[arg(long)]
        track_burns: bool,
    },
    /// Show upstream limits and stored scan cursors
    Status,
}

fn parse_since(value: &str) -> std::result::Result<i64, String> {
    if let Ok(ts) = value.parse::<i64>() {
        return Ok(ts);
    }
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.timestamp())
        .map_err(|e| format!("expected unix seconds or RFC3339 ({})", e))
}

/// Shared upstream clients and the record store for one process
struct Services {
    scheduler: Arc<RequestScheduler>,
    ledger: Arc<dyn LedgerRpc>,
    store: Arc<dyn SyncStore>,
    discovery: Arc<PoolDiscovery>,
}

fn build_services(config: &Config) -> Result<Services> {
    let scheduler = Arc::new(RequestScheduler::new(config.apis.clone()));
    let ledger: Arc<dyn LedgerRpc> = Arc::new(HttpLedgerClient::new(&config.rpc, Arc::clone(&scheduler))?);
    let store: Arc<dyn SyncStore> = Arc::new(
        SqliteStore::open(&config.database.path)
            .with_context(|| format!("opening database {}", config.database.path))?,
    );
    let market = Arc::new(DexScreenerClient::new(&config.discovery, Arc::clone(&scheduler))?);
    let discovery = Arc::new(PoolDiscovery::new(market, &config.discovery));

    Ok(Services {
        scheduler,
        ledger,
        store,
        discovery,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let mut log_config = LoggerConfig::from_flags(&cli.debug, cli.verbose, cli.quiet);
    log_config.file_path = cli.log_file.clone();
    logger::init(log_config);

    let config = load_config_from_path(&cli.config)?;

    let result = match cli.command {
        Command::Sync {
            dry_run,
            max_pages,
            since,
        } => {
            run_sync(
                &config,
                SyncOptions {
                    dry_run,
                    max_pages,
                    since_timestamp: since,
                },
            )
            .await
        }
        Command::Import {
            url_or_id,
            dry_run,
            track_burns,
        } => run_import(&config, &url_or_id, ImportOptions { dry_run, track_burns }).await,
        Command::Status => run_status(&config),
    };

    if let Err(e) = &result {
        logger::error(LogTag::System, &format!("{:#}", e));
    }
    logger::flush();
    result
}

async fn run_sync(config: &Config, options: SyncOptions) -> Result<()> {
    let services = build_services(config)?;

    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
        logger::warning(LogTag::System, "Interrupt received, stopping after the current page");
    })
    .context("installing Ctrl-C handler")?;

    let mut orchestrator = SyncOrchestrator::new(config, Arc::clone(&services.ledger), Arc::clone(&services.store))
        .with_discovery(Arc::clone(&services.discovery))
        .with_cancel_flag(cancel);
    if config.ohlcv.enabled {
        let candles = Arc::new(GeckoTerminalClient::new(&config.ohlcv, Arc::clone(&services.scheduler)));
        orchestrator = orchestrator.with_ohlcv(OhlcvPipeline::new(candles, &config.ohlcv)?);
    }

    let report = orchestrator.run_sync(options).await?;
    print_report(&report);
    Ok(())
}

async fn run_import(config: &Config, url_or_id: &str, options: ImportOptions) -> Result<()> {
    let services = build_services(config)?;
    let metadata = Arc::new(MetadataFetcher::new(
        Arc::clone(&services.scheduler),
        Duration::from_secs(config.metadata.offchain_timeout_secs),
    ));
    let importer = MigrationImporter::new(
        config,
        services.ledger,
        services.discovery,
        metadata,
        services.store,
    )?;

    let outcome = importer.import_with_options(url_or_id, options).await?;
    print_import(&outcome);
    Ok(())
}

fn run_status(config: &Config) -> Result<()> {
    let services = build_services(config)?;

    let mut limits = new_table(&["API", "Req/min", "Min interval", "Retries", "Backoff", "Queue"]);
    for status in services.scheduler.all_status() {
        let api = config.apis.limits_for(&status.api);
        limits.add_row(vec![
            Cell::new(&status.api),
            Cell::new(format!("{}/{}", status.requests_in_last_minute, status.max_requests)),
            Cell::new(format!("{} ms", status.min_interval_ms)),
            Cell::new(api.max_retries),
            Cell::new(format!("{} ms", api.initial_backoff_ms)),
            Cell::new(status.queue_length),
        ]);
    }
    println!("{}", "Upstream limits".bold());
    println!("{}", limits);

    let projects = services.store.list_active_projects()?;
    println!("\n{} active projects", projects.len().to_string().bold());

    let mut cursors = new_table(&["Source", "Watermark", "Resume before", "Updated"]);
    for cursor in services.store.list_cursors()? {
        let updated = chrono::DateTime::from_timestamp(cursor.updated_at, 0)
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        cursors.add_row(vec![
            Cell::new(&cursor.source_key),
            Cell::new(
                cursor
                    .watermark
                    .as_ref()
                    .map(|w| short(&w.signature))
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::new(cursor.resume_before.as_deref().map(short).unwrap_or_else(|| "-".to_string())),
            Cell::new(updated),
        ]);
    }
    println!("\n{}", "Scan cursors".bold());
    println!("{}", cursors);
    Ok(())
}

fn new_table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(
        header
            .iter()
            .map(|h| Cell::new(h).add_attribute(Attribute::Bold))
            .collect::<Vec<_>>(),
    );
    table
}

fn short(value: &str) -> String {
    if value.chars().count() > 16 {
        format!("{}...", value.chars().take(16).collect::<String>())
    } else {
        value.to_string()
    }
}

fn print_report(report: &SyncReport) {
    let mut table = new_table(&["Project", "Scanned", "Found", "Inserted", "Skipped", "Errors"]);
    for stats in &report.projects {
        let errors = if stats.errors.is_empty() {
            Cell::new(0)
        } else {
            Cell::new(stats.errors.len()).fg(comfy_table::Color::Red)
        };
        table.add_row(vec![
            Cell::new(&stats.project),
            Cell::new(stats.scanned),
            Cell::new(stats.found),
            Cell::new(stats.inserted),
            Cell::new(stats.skipped),
            errors,
        ]);
    }
    println!("{}", table);

    let title = if report.dry_run { "Dry run" } else { "Sync" };
    println!(
        "{}: {} added, {} skipped, {} errors{}",
        title.bold(),
        report.added.to_string().green(),
        report.skipped,
        report.errors.len(),
        if report.interrupted {
            " (interrupted, will resume)".yellow().to_string()
        } else {
            String::new()
        }
    );
    for error in &report.errors {
        println!("  {} {}", "-".red(), error);
    }
}

fn print_import(outcome: &ImportOutcome) {
    let header = if outcome.dry_run {
        "Dry run, nothing written".yellow()
    } else {
        "Imported".green()
    };
    println!("{}", header.bold());

    let project_id = outcome
        .project
        .as_ref()
        .map(|p| p.id.to_string())
        .unwrap_or_else(|| "-".to_string());
    println!(
        "  Project   {} ({}) id={}",
        outcome.planned_project.name, outcome.planned_project.slug, project_id
    );
    println!("  Migration {} [{}]", outcome.migration.label, outcome.status.as_str());
    println!("  Migrated so far: {:.2}", outcome.migration.total_migrated);
    println!(
        "  Window    {} -> {}  rate {}",
        outcome.account.start_timestamp, outcome.account.end_timestamp, outcome.account.exchange_rate
    );
    for pool in &outcome.pools {
        println!(
            "  Pool #{}   {} {} on {} (${:.0} liquidity)",
            pool.order_index, pool.token_symbol, pool.pool_address, pool.dex_type, pool.liquidity_usd
        );
    }
    if let Some(source) = &outcome.burn_source {
        println!("  Burns     tracking {} ({})", source.address, source.kind.as_str());
    }
}
