use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::DateTime;
use clap::{ArgAction, Args, Parser, Subcommand};
use color_eyre::eyre::{eyre, Context, Result};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

use bridge_abi::contract::ClassifyPolicy;
use bridge_abi::ContractCache;
use bridge_data::provider::{ContractProvider, StaticProvider};
use bridge_data::scanner::EtherscanClient;
use bridge_data::store::TraceStore;
use bridge_data::types::{Chain, TraceRecord};
use bridge_engine::registry::ChainContext;
use bridge_engine::report::ExportFormat;
use bridge_engine::{BridgesConfig, LinkOptions, Registry};

#[derive(Debug, Clone)]
struct AppContext {
    data_dir: PathBuf,
}

#[derive(Parser, Debug)]
#[command(name = "bridge-audit")]
#[command(about = "Cross-chain bridge transfer correlation toolkit")]
#[command(version)]
struct Cli {
    #[arg(long, short = 'v', action = ArgAction::Count, global = true)]
    verbose: u8,

    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    /// Directory holding one SQLite trace archive per chain.
    #[arg(long, global = true, default_value = "data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load trace fixture files into the per-chain archives.
    Ingest(IngestArgs),
    /// Correlate source transactions with their destination legs.
    Link(LinkArgs),
    /// Inspect a verified contract: ABI surface and token classification.
    Contract(ContractArgs),
    /// Show per-chain archive coverage.
    Status,
}

#[derive(Args, Debug)]
struct IngestArgs {
    /// Fixture files; each holds trace records and block index entries.
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

#[derive(Args, Debug)]
struct LinkArgs {
    /// Bridge topology config (JSON).
    #[arg(long)]
    config: PathBuf,

    /// Source transaction hashes to link.
    hashes: Vec<String>,

    /// File with one source hash per line, instead of positional hashes.
    #[arg(long)]
    file: Option<PathBuf>,

    /// Destination blocks scanned after the timestamp-matched block.
    #[arg(long, default_value_t = 100)]
    block_range: u64,

    /// Cap on candidate transactions per destination scan.
    #[arg(long, default_value_t = 100)]
    max_results: u32,

    /// Output format: table (default) or csv.
    #[arg(long, default_value = "table")]
    output: String,

    /// Directory of `{address}.json` verified-source files; when set, no
    /// explorer API is contacted.
    #[arg(long)]
    abi_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ContractArgs {
    /// Chain name: eth, bsc, polygon, or fantom.
    #[arg(long)]
    chain: String,

    /// Contract address.
    address: String,

    #[arg(long)]
    abi_dir: Option<PathBuf>,
}

/// Trace fixture file: records plus `chain name -> [[block, timestamp]]`
/// index entries.
#[derive(Debug, serde::Deserialize)]
struct TraceFixture {
    #[serde(default)]
    traces: Vec<TraceRecord>,
    #[serde(default)]
    blocks: BTreeMap<String, Vec<(u64, u64)>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet)?;

    let ctx = AppContext {
        data_dir: cli.data_dir,
    };

    match cli.command {
        Commands::Ingest(args) => handle_ingest(&ctx, args).await,
        Commands::Link(args) => handle_link(&ctx, args).await,
        Commands::Contract(args) => handle_contract(&ctx, args).await,
        Commands::Status => handle_status(&ctx).await,
    }
}

fn init_tracing(verbose: u8, quiet: bool) -> Result<()> {
    let level = if quiet {
        Level::WARN
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.as_str()))
        .wrap_err("failed to initialize tracing filter")?;

    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

fn open_store(ctx: &AppContext, chain: Chain) -> Result<Arc<TraceStore>> {
    std::fs::create_dir_all(&ctx.data_dir)
        .wrap_err_with(|| format!("failed to create {}", ctx.data_dir.display()))?;
    let path = ctx.data_dir.join(format!("{chain}.sqlite"));
    let path = path
        .to_str()
        .ok_or_else(|| eyre!("non-UTF-8 data dir path"))?;
    let store = TraceStore::new(path).wrap_err_with(|| format!("failed to open {path}"))?;
    Ok(Arc::new(store))
}

fn provider_for(chain: Chain, abi_dir: Option<&Path>) -> Result<Arc<dyn ContractProvider>> {
    if let Some(dir) = abi_dir {
        let provider = StaticProvider::from_dir(dir)
            .wrap_err_with(|| format!("failed to load ABI dir {}", dir.display()))?;
        return Ok(Arc::new(provider));
    }
    let env_var = match chain {
        Chain::Eth => "ETHERSCAN_API_KEY",
        Chain::Bsc => "BSCSCAN_API_KEY",
        Chain::Polygon => "POLYGONSCAN_API_KEY",
        Chain::Fantom => "FTMSCAN_API_KEY",
    };
    let api_key = std::env::var(env_var)
        .map_err(|_| eyre!("{env_var} is required without --abi-dir"))?;
    Ok(Arc::new(EtherscanClient::for_chain(
        chain,
        api_key,
        Duration::from_secs(30),
    )))
}

fn chain_contexts(ctx: &AppContext, abi_dir: Option<&Path>) -> Result<Vec<ChainContext>> {
    Chain::ALL
        .into_iter()
        .map(|chain| {
            let store = open_store(ctx, chain)?;
            let provider = provider_for(chain, abi_dir)?;
            Ok(ChainContext {
                chain,
                store,
                cache: Arc::new(ContractCache::new(provider)),
            })
        })
        .collect()
}

async fn handle_ingest(ctx: &AppContext, args: IngestArgs) -> Result<()> {
    let mut trace_total = 0usize;
    let mut block_total = 0usize;

    for path in &args.files {
        let text = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read {}", path.display()))?;
        let fixture: TraceFixture = serde_json::from_str(&text)
            .wrap_err_with(|| format!("invalid fixture {}", path.display()))?;

        // Records route to their own chain's archive.
        for chain in Chain::ALL {
            let records: Vec<TraceRecord> = fixture
                .traces
                .iter()
                .filter(|r| r.chain == chain)
                .cloned()
                .collect();
            if records.is_empty() && !fixture.blocks.contains_key(chain.name()) {
                continue;
            }
            let store = open_store(ctx, chain)?;
            trace_total += store
                .insert_traces(&records)
                .wrap_err("failed to insert trace records")?;
            if let Some(blocks) = fixture.blocks.get(chain.name()) {
                block_total += store
                    .insert_blocks(chain, blocks)
                    .wrap_err("failed to insert block index entries")?;
            }
        }
    }

    info!(
        files = args.files.len(),
        traces = trace_total,
        blocks = block_total,
        "ingest completed"
    );
    Ok(())
}

async fn handle_link(ctx: &AppContext, args: LinkArgs) -> Result<()> {
    let mut hashes = args.hashes.clone();
    if let Some(path) = &args.file {
        let text = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read {}", path.display()))?;
        hashes.extend(
            text.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string),
        );
    }
    if hashes.is_empty() {
        return Err(eyre!("no source hashes given; pass them positionally or via --file"));
    }

    let format = parse_format(&args.output)?;
    let config_text = std::fs::read_to_string(&args.config)
        .wrap_err_with(|| format!("failed to read {}", args.config.display()))?;
    let config = BridgesConfig::from_json(&config_text)?;

    let contexts = chain_contexts(ctx, args.abi_dir.as_deref())?;
    let options = LinkOptions {
        block_range: args.block_range,
        max_results: args.max_results,
        match_token: false,
    };
    let mut registry =
        Registry::build(&config, contexts, options, ClassifyPolicy::default()).await?;

    let pb = ProgressBar::new(hashes.len() as u64);
    pb.set_style(
        ProgressStyle::with_template("{bar:40.green} {pos}/{len} {msg}")
            .wrap_err("failed to create progress style")?,
    );
    for hash in &hashes {
        pb.set_message(hash.clone());
        registry.link_all(std::slice::from_ref(hash)).await?;
        pb.inc(1);
    }
    pb.finish_with_message("linking completed");

    println!("{}", registry.export(format));

    info!(
        linked = registry.linked_count(),
        total = hashes.len(),
        "link command finished"
    );
    Ok(())
}

async fn handle_contract(_ctx: &AppContext, args: ContractArgs) -> Result<()> {
    let chain: Chain = args.chain.parse()?;
    let address: alloy::primitives::Address = args
        .address
        .parse()
        .map_err(|_| eyre!("bad address {}", args.address))?;

    let provider = provider_for(chain, args.abi_dir.as_deref())?;
    let cache = ContractCache::new(provider);
    let contract = cache
        .get_contract(address)
        .await?
        .ok_or_else(|| eyre!("{address:#x} is not a verified contract on {chain}"))?;

    let standard = contract.classify(ClassifyPolicy::default());
    println!("{contract}");
    match standard.as_str() {
        "" => println!("standard: none recognized"),
        s => println!("standard: {s}"),
    }
    Ok(())
}

async fn handle_status(ctx: &AppContext) -> Result<()> {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(["chain", "traces", "indexed blocks", "first block", "last block"]);

    for chain in Chain::ALL {
        let store = open_store(ctx, chain)?;
        let traces = store.count_traces(chain)?;
        let index = store.block_index(chain)?;
        let span = |entry: Option<&(u64, u64)>| {
            entry
                .map(|(block, ts)| {
                    let when = DateTime::from_timestamp(*ts as i64, 0)
                        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_else(|| "?".to_string());
                    format!("{block} ({when})")
                })
                .unwrap_or_else(|| "-".to_string())
        };
        table.add_row([
            chain.name().to_string(),
            traces.to_string(),
            index.len().to_string(),
            span(index.first()),
            span(index.last()),
        ]);
    }

    println!("{table}");
    Ok(())
}

fn parse_format(output: &str) -> Result<ExportFormat> {
    match output {
        "table" => Ok(ExportFormat::Table),
        "csv" => Ok(ExportFormat::Csv),
        other => Err(eyre!("unknown output format `{other}`, expected table or csv")),
    }
}
