use anyhow::{bail, Result};
use std::env;
use std::path::PathBuf;

use stock_sync::config::LedgerBackend;
use stock_sync::{load_config, logging, Config, Pipeline, SqliteLedgerStore, CONFIG_ENV, DEFAULT_CONFIG_PATH};

const USAGE: &str = "\
Usage:
  stock-sync run [--config PATH] [--dry-run]
  stock-sync check-config [--config PATH]
  stock-sync import-ledger --from CSV [--config PATH]

The config path defaults to $STOCK_SYNC_CONFIG, then ./stock-sync.toml";

#[derive(Debug, PartialEq)]
enum Command {
    Run { dry_run: bool },
    CheckConfig,
    ImportLedger { from: PathBuf },
}

#[derive(Debug, PartialEq)]
struct Cli {
    command: Command,
    config: Option<PathBuf>,
}

fn parse_args(args: &[String]) -> Result<Cli> {
    let Some(name) = args.first() else {
        bail!("missing command\n\n{}", USAGE);
    };

    let mut config = None;
    let mut dry_run = false;
    let mut from = None;

    let mut rest = args[1..].iter();
    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "--config" | "-c" => match rest.next() {
                Some(path) => config = Some(PathBuf::from(path)),
                None => bail!("--config needs a path"),
            },
            "--from" => match rest.next() {
                Some(path) => from = Some(PathBuf::from(path)),
                None => bail!("--from needs a path"),
            },
            "--dry-run" => dry_run = true,
            other => bail!("unknown argument: {}\n\n{}", other, USAGE),
        }
    }

    let command = match name.as_str() {
        "run" => Command::Run { dry_run },
        "check-config" => Command::CheckConfig,
        "import-ledger" => match from {
            Some(from) => Command::ImportLedger { from },
            None => bail!("import-ledger needs --from CSV"),
        },
        other => bail!("unknown command: {}\n\n{}", other, USAGE),
    };

    Ok(Cli { command, config })
}

/// `--config`, then the environment, then the default file name
fn config_path(cli: &Cli) -> PathBuf {
    cli.config
        .clone()
        .or_else(|| env::var(CONFIG_ENV).ok().filter(|p| !p.trim().is_empty()).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("{}", USAGE);
        return Ok(());
    }

    let cli = parse_args(&args)?;
    let path = config_path(&cli);
    let config = load_config(&path)?;
    logging::initialize(&config.logging)?;
    tracing::info!(version = stock_sync::VERSION, config = %path.display(), "stock-sync starting");

    match cli.command {
        Command::Run { dry_run } => run(config, dry_run).await,
        Command::CheckConfig => check_config(&config),
        Command::ImportLedger { from } => import_ledger(&config, &from),
    }
}

async fn run(config: Config, dry_run: bool) -> Result<()> {
    let pipeline = Pipeline::from_config(config)?;
    match pipeline.run(dry_run).await {
        Ok(summary) => {
            println!("\n✅ {}", summary.summary());
            for failure in &summary.mirror_failures {
                println!("⚠️  mirror not written: {}", failure);
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "run aborted, ledger not written");
            Err(e)
        }
    }
}

fn check_config(config: &Config) -> Result<()> {
    let enabled = config.enabled_sources();
    println!("✅ Configuration is valid");
    println!("   window: {} days", config.run.window_days);
    println!(
        "   sources: {} configured, {} enabled",
        config.sources.len(),
        enabled.len()
    );
    for source in &enabled {
        println!("     - {} ({})", source.name, source.spec.kind().name());
    }
    println!(
        "   ledger: {:?} at {} ({} mirrors)",
        config.ledger.backend,
        config.ledger.path.display(),
        config.ledger.mirrors.len()
    );
    println!("   brand reports: {}", config.brand_reports.len());
    Ok(())
}

fn import_ledger(config: &Config, from: &std::path::Path) -> Result<()> {
    if config.ledger.backend != LedgerBackend::Sqlite {
        bail!("import-ledger needs ledger.backend = \"sqlite\"");
    }
    let store = SqliteLedgerStore::new(&config.ledger.path, config.ledger.mirrors.clone());
    let rows = store.import_csv(from)?;
    println!("✅ Imported {} stock rows into {}", rows, config.ledger.path.display());
    Ok(())
}
