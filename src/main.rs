use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tandem::config::{Config, ConfigError};
use tandem::{Connection, DbCommands, Document, Query, QueryOptions};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tandem")]
#[command(about = "Query replica-pair document database servers with automatic master failover")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "Tandem Team")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a query against the configured server or pair
    Query {
        /// Path to configuration file
        #[arg(short, long, default_value = "config/dev.toml")]
        config: PathBuf,
        /// Namespace, <database>.<collection>
        #[arg(long)]
        ns: String,
        /// Filter document as JSON
        #[arg(long, default_value = "{}")]
        filter: String,
        /// Sort order document as JSON
        #[arg(long)]
        sort: Option<String>,
        /// Projection document as JSON
        #[arg(long)]
        fields: Option<String>,
        /// Maximum number of documents to print, 0 for all
        #[arg(long, default_value_t = 0)]
        limit: usize,
        /// Number of matching documents to skip
        #[arg(long, default_value_t = 0)]
        skip: i32,
        /// Batch size hint sent to the server
        #[arg(long, default_value_t = 0)]
        batch_size: i32,
        /// Allow reading from a non-master replica
        #[arg(long)]
        slave_ok: bool,
    },
    /// Ask every configured server whether it is master
    Ismaster {
        /// Path to configuration file
        #[arg(short, long, default_value = "config/dev.toml")]
        config: PathBuf,
    },
    /// Generate example configuration files
    Config {
        /// Configuration mode (single or pair)
        #[arg(short, long)]
        mode: String,
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Validate configuration file
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show version information
    Version,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Query {
            config,
            ns,
            filter,
            sort,
            fields,
            limit,
            skip,
            batch_size,
            slave_ok,
        } => {
            let request = QueryArgs {
                ns,
                filter,
                sort,
                fields,
                limit,
                skip,
                batch_size,
                slave_ok,
            };
            run_query(config, request)?;
        }
        Commands::Ismaster { config } => {
            run_ismaster(config)?;
        }
        Commands::Config { mode, output } => {
            generate_config(mode, output)?;
        }
        Commands::Validate { config } => {
            validate_config(config)?;
        }
        Commands::Version => {
            show_version();
        }
    }

    Ok(())
}

struct QueryArgs {
    ns: String,
    filter: String,
    sort: Option<String>,
    fields: Option<String>,
    limit: usize,
    skip: i32,
    batch_size: i32,
    slave_ok: bool,
}

fn load_config(config_path: &PathBuf) -> anyhow::Result<Config> {
    let config = Config::load_from_file(config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    init_logging(&config)?;
    info!("Configuration loaded from: {:?}", config_path);
    Ok(config)
}

fn parse_document(label: &str, json: &str) -> anyhow::Result<Document> {
    let value: serde_json::Value =
        serde_json::from_str(json).with_context(|| format!("Invalid {} JSON", label))?;
    Document::try_from(value).with_context(|| format!("{} must be a JSON object", label))
}

fn run_query(config_path: PathBuf, args: QueryArgs) -> anyhow::Result<()> {
    let config = load_config(&config_path)?;

    let mut query = Query::new(parse_document("filter", &args.filter)?);
    if let Some(sort) = &args.sort {
        query = query.sort(parse_document("sort", sort)?);
    }
    let fields = args
        .fields
        .as_deref()
        .map(|f| parse_document("fields", f))
        .transpose()?;
    let options = if args.slave_ok {
        QueryOptions::SLAVE_OK
    } else {
        QueryOptions::NONE
    };

    let mut client = tandem::open(&config)?;
    let mut cursor = client.query(
        &args.ns,
        &query,
        args.batch_size,
        args.skip,
        fields.as_ref(),
        options,
    )?;

    let mut printed = 0;
    while cursor.more() && (args.limit == 0 || printed < args.limit) {
        match cursor.try_next()? {
            Some(doc) => {
                if let Some(err) = doc.error_message() {
                    bail!("query on {} failed: {}", args.ns, err);
                }
                println!("{}", doc)
            }
            None => break,
        }
        printed += 1;
    }
    info!(
        "{} documents from {} (database {})",
        printed,
        cursor.namespace(),
        tandem::utils::database_of(cursor.namespace())
    );
    Ok(())
}

fn run_ismaster(config_path: PathBuf) -> anyhow::Result<()> {
    let config = load_config(&config_path)?;

    let mut masters = 0;
    for host in &config.servers.hosts {
        let mut conn = Connection::new(config.connection_options());
        let status = match conn.connect(host) {
            Ok(()) => conn.probe_master(),
            Err(e) => tandem::MasterStatus::Unreachable {
                reason: e.to_string(),
            },
        };
        if status.is_master() {
            masters += 1;
        }
        println!("{}: {}", host, status);
    }

    if masters == 0 {
        bail!("no master among {} host(s)", config.servers.hosts.len());
    }
    Ok(())
}

fn generate_config(mode: String, output: PathBuf) -> anyhow::Result<()> {
    println!("Generating {} configuration file: {:?}", mode, output);

    Config::create_example_config(&output, &mode).context("Failed to generate config")?;

    println!("Configuration file generated successfully!");
    println!("Edit the file to match your environment and run:");
    println!("  tandem query --config {:?} --ns <db>.<collection>", output);

    Ok(())
}

fn validate_config(config_path: PathBuf) -> anyhow::Result<()> {
    println!("Validating configuration file: {:?}", config_path);

    match Config::load_from_file(&config_path) {
        Ok(config) => {
            println!("✓ Configuration file is valid");
            println!(
                "  Mode: {}",
                if config.is_pair() { "replica pair" } else { "single server" }
            );
            for (i, host) in config.servers.hosts.iter().enumerate() {
                println!("    {}: {}", i + 1, host);
            }
            println!("  Auto reconnect: {}", config.connection.auto_reconnect);
        }
        Err(e) => {
            eprintln!("✗ Configuration file validation failed:");
            match &e {
                ConfigError::IoError(msg) => eprintln!("  File error: {}", msg),
                ConfigError::ParseError(msg) => eprintln!("  Parse error: {}", msg),
                ConfigError::ValidationError(msg) => eprintln!("  Validation error: {}", msg),
                ConfigError::SerializeError(msg) => eprintln!("  Serialization error: {}", msg),
            }
            return Err(e.into());
        }
    }

    Ok(())
}

fn show_version() {
    println!("tandem v{}", env!("CARGO_PKG_VERSION"));
    println!("Query replica-pair document database servers with automatic master failover");
    println!();
    println!("Target: {}", std::env::consts::ARCH);
    println!();
    println!("Features:");
    println!("  • Batched, resumable and tailable cursors");
    println!("  • Replica-pair master discovery and failover");
    println!("  • TCP and unix domain socket transports");
    println!("  • Rate-limited automatic reconnects");
}

fn init_logging(config: &Config) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let result = match config.logging.format.as_str() {
        "json" => builder.json().try_init(),
        _ => builder.try_init(),
    };
    result.map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Logging initialized at level: {}", config.logging.level);
    Ok(())
}
