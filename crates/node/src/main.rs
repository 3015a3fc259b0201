//! finalize-node - replay, preview and query finalized blocks
//!
//! # Quick Start
//!
//! ```bash
//! # Create a database and install the credits program
//! finalize-node new-db
//! finalize-node bootstrap
//!
//! # Finalize a JSON array of confirmed blocks
//! finalize-node replay blocks.json
//!
//! # Preview a finalize scope against the latest state
//! finalize-node preview token.aleo mint '["aleo1...", "5"]'
//!
//! # Read a mapping value, now or as of a height or time
//! finalize-node mapping token.aleo balances aleo1... --height 12
//! finalize-node mapping token.aleo balances aleo1... --time 1700000000
//!
//! # List a mapping's entries, 20 at a time
//! finalize-node mapping token.aleo balances --list --count 20
//! ```
//!
//! # Commands
//!
//! - **new-db**: Create a new database
//! - **upgrade-db**: Upgrade the database schema
//! - **bootstrap**: Install the builtin credits program and its mappings
//! - **replay**: Finalize and commit blocks from a JSON file
//! - **preview**: Report the mapping updates a finalize scope would make
//! - **mapping**: List mappings, count or page through keys, or read a value
//! - **sample-config**: Print a sample configuration
//!
//! # Configuration
//!
//! Configuration is read from a TOML file (`--config <FILE>`), falling back
//! to defaults, and then overridden by `FINALIZE_*` environment variables.
//! See `finalize-node sample-config`.

mod logging;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};

use finalize_common::{Config, LogFormat, LogLevel};
use finalize_db::Database;
use finalize_ledger::query::{self, ReadAt};
use finalize_ledger::{builtin, Block, BlockFinalizer, FinalizeStore, FinalizerConfig, ProgramCache};
use finalize_vm::{Identifier, Interpreter, ProgramId};

use logging::LogConfig;

/// Block finalization node
#[derive(Parser)]
#[command(name = "finalize-node")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log output format (overrides config)
    #[arg(long, global = true)]
    log_format: Option<CliLogFormat>,

    #[command(subcommand)]
    command: Commands,
}

/// Log output format for CLI
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum CliLogFormat {
    Text,
    Json,
}

impl From<CliLogFormat> for LogFormat {
    fn from(fmt: CliLogFormat) -> Self {
        match fmt {
            CliLogFormat::Text => LogFormat::Text,
            CliLogFormat::Json => LogFormat::Json,
        }
    }
}

/// Arguments of the mapping command
#[derive(clap::Args, Debug)]
struct MappingArgs {
    /// Program id, e.g. token.aleo
    program: String,

    /// Mapping name
    mapping: Option<String>,

    /// Key, as a literal or struct JSON
    #[arg(requires = "mapping", conflicts_with = "list")]
    key: Option<String>,

    /// Read the value as of the end of this block
    #[arg(long, requires = "key", conflicts_with = "time")]
    height: Option<u32>,

    /// Read the value as of the last block at or before this Unix time
    #[arg(long, requires = "key")]
    time: Option<i64>,

    /// List the mapping's entries a page at a time
    #[arg(long, requires = "mapping")]
    list: bool,

    /// Entries per page (at most 100)
    #[arg(long, requires = "list")]
    count: Option<u32>,

    /// Cursor returned by the previous page
    #[arg(long, requires = "list")]
    cursor: Option<u64>,
}

impl MappingArgs {
    fn read_at(&self) -> ReadAt {
        match (self.height, self.time) {
            (Some(height), _) => ReadAt::Height(height),
            (None, Some(time)) => ReadAt::Time(time),
            (None, None) => ReadAt::Latest,
        }
    }
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Create a new database
    NewDb {
        /// Path to the database file (overrides config)
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,

        /// Force creation even if database exists
        #[arg(long)]
        force: bool,
    },

    /// Upgrade database schema
    UpgradeDb,

    /// Install the builtin credits program and its mappings
    Bootstrap,

    /// Finalize blocks from a JSON file holding an array of blocks
    ///
    /// Blocks at or below the latest finalized height are skipped.
    Replay {
        #[arg(value_name = "BLOCKS")]
        path: PathBuf,
    },

    /// Preview the mapping updates of a finalize scope
    Preview {
        /// Program id, e.g. token.aleo
        program: String,

        /// Function name
        function: String,

        /// Finalize inputs as a JSON array
        #[arg(default_value = "[]")]
        inputs: String,
    },

    /// List a program's mappings, count or page through a mapping's keys,
    /// or read a value
    Mapping(MappingArgs),

    /// Print sample configuration
    SampleConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config(&cli)?;
    init_logging(&cli, &config)?;
    if let Some(path) = &cli.config {
        info!(path = ?path, "Loaded configuration from file");
    }

    match cli.command {
        Commands::NewDb { path, force } => cmd_new_db(config, path, force).await,
        Commands::UpgradeDb => cmd_upgrade_db(config).await,
        Commands::Bootstrap => cmd_bootstrap(config).await,
        Commands::Replay { path } => cmd_replay(config, &path).await,
        Commands::Preview {
            program,
            function,
            inputs,
        } => cmd_preview(config, &program, &function, &inputs).await,
        Commands::Mapping(args) => cmd_mapping(config, &args).await,
        Commands::SampleConfig => cmd_sample_config(),
    }
}

/// Load the configuration file, or defaults, and apply environment overrides.
fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => Config::default(),
    };
    Ok(config.with_env_overrides())
}

/// Initialize the logging subsystem. Command-line flags override the config.
fn init_logging(cli: &Cli, config: &Config) -> anyhow::Result<()> {
    let mut log_config = LogConfig::from(&config.logging);
    if cli.verbose {
        log_config = log_config.with_level(LogLevel::Debug);
    }
    if let Some(format) = cli.log_format {
        log_config = log_config.with_format(format.into());
    }
    logging::init(&log_config)
}

fn open_db(config: &Config) -> anyhow::Result<Database> {
    let path = &config.database.path;
    Database::open_with_pool_size(path, config.database.pool_size)
        .with_context(|| format!("failed to open database at {}", path.display()))
}

async fn install_builtin(db: &Database) -> anyhow::Result<()> {
    let credits = builtin::credits_program()?;
    builtin::init_builtin_program(db, &credits).await?;
    Ok(())
}

/// New database command handler.
async fn cmd_new_db(mut config: Config, path: Option<PathBuf>, force: bool) -> anyhow::Result<()> {
    if let Some(p) = path {
        config.database.path = p;
    }
    let db_path = &config.database.path;

    if db_path.exists() {
        if force {
            warn!(path = ?db_path, "Removing existing database");
            std::fs::remove_file(db_path)?;
        } else {
            anyhow::bail!(
                "Database already exists at {:?}. Use --force to overwrite.",
                db_path
            );
        }
    }

    info!(path = ?db_path, "Creating new database");
    let db = open_db(&config)?;
    if config.finalize.bootstrap_builtin {
        install_builtin(&db).await?;
    }

    println!("Database created successfully at: {}", db_path.display());
    Ok(())
}

/// Upgrade database command handler.
async fn cmd_upgrade_db(config: Config) -> anyhow::Result<()> {
    info!(path = ?config.database.path, "Upgrading database schema");
    let db = open_db(&config)?;
    db.upgrade()?;
    println!("Database schema is at version {}", db.schema_version()?);
    Ok(())
}

/// Bootstrap command handler.
async fn cmd_bootstrap(config: Config) -> anyhow::Result<()> {
    let db = open_db(&config)?;
    install_builtin(&db).await?;
    println!("Builtin programs installed");
    Ok(())
}

/// Replay command handler.
async fn cmd_replay(config: Config, path: &Path) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let blocks: Vec<Block> = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse blocks from {}", path.display()))?;

    let db = open_db(&config)?;
    if config.finalize.bootstrap_builtin {
        install_builtin(&db).await?;
    }
    let latest = db.latest_block().await?.map(|block| block.height);
    info!(blocks = blocks.len(), latest = ?latest, "Replaying blocks");

    let mut finalizer = BlockFinalizer::with_executor(
        db,
        Interpreter::new(),
        FinalizerConfig::from(&config.finalize),
    );
    let mut finalized = 0usize;
    let mut rejected = 0usize;
    for block in &blocks {
        if latest.is_some_and(|height| block.height <= height) {
            debug!(height = block.height, "Skipping finalized block");
            continue;
        }
        let reasons = finalizer
            .finalize_block(block)
            .await
            .with_context(|| format!("failed to finalize block {}", block.height))?;
        for (confirmed, reason) in block.transactions.iter().zip(&reasons) {
            if let Some(reason) = reason {
                println!(
                    "block {} transaction {} rejected: {}",
                    block.height,
                    confirmed.transaction().id(),
                    reason
                );
                rejected += 1;
            }
        }
        finalized += 1;
    }

    println!(
        "Finalized {} blocks, {} rejected transactions",
        finalized, rejected
    );
    Ok(())
}

/// Preview command handler.
async fn cmd_preview(
    config: Config,
    program: &str,
    function: &str,
    inputs: &str,
) -> anyhow::Result<()> {
    let inputs: serde_json::Value =
        serde_json::from_str(inputs).context("inputs must be a JSON array")?;
    let program_id = ProgramId::new(program)?;
    let function = Identifier::new(function)?;

    let db = open_db(&config)?;
    let finalizer = BlockFinalizer::with_executor(
        db,
        Interpreter::new(),
        FinalizerConfig::from(&config.finalize),
    );
    let updates = finalizer.preview(&program_id, &function, &inputs).await?;
    println!("{}", serde_json::to_string_pretty(&updates)?);
    Ok(())
}

/// Mapping command handler.
async fn cmd_mapping(config: Config, args: &MappingArgs) -> anyhow::Result<()> {
    let db = open_db(&config)?;
    let programs = ProgramCache::new();
    let program_id = ProgramId::new(args.program.as_str())?;

    let Some(mapping) = args.mapping.as_deref() else {
        for name in query::mapping_names(&db, &programs, &program_id).await? {
            println!("{}", name);
        }
        return Ok(());
    };
    let mapping = Identifier::new(mapping)?;

    if args.list {
        let page =
            query::mapping_values(&db, &programs, &program_id, &mapping, args.count, args.cursor)
                .await?;
        println!("{}", serde_json::to_string_pretty(&page)?);
        return Ok(());
    }

    match args.key.as_deref() {
        None => {
            let count = query::mapping_key_count(&db, &programs, &program_id, &mapping).await?;
            println!("{}", count);
        }
        Some(key) => {
            let value =
                query::mapping_value(&db, &programs, &program_id, &mapping, key, args.read_at())
                    .await?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
    }
    Ok(())
}

/// Sample config command handler.
fn cmd_sample_config() -> anyhow::Result<()> {
    println!("{}", Config::sample_toml()?);
    Ok(())
}
