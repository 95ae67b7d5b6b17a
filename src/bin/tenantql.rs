use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tenantql::config::Config;
use tenantql::core::db::{Filter, Value, ALL_COLUMNS};
use tenantql::core::Result;
use tenantql::tenant::Provisioner;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Tenant database provisioning and ad-hoc querying
#[derive(Parser, Debug)]
#[command(name = "tenantql", version, about)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = "TENANTQL_CONFIG")]
    config: Option<PathBuf>,

    /// Cluster directory, overrides the configuration
    #[arg(short, long, env = "TENANTQL_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the control database and registry table
    Init,
    /// Create a database for a new tenant account
    Provision { display_name: String },
    /// List registered tenant accounts
    Accounts,
    /// List all databases in the cluster
    Databases,
    /// Drop a database
    Drop { database: String },
    /// List the tables of a database
    Tables { database: String },
    /// Show column metadata of a table
    Columns { database: String, table: String },
    /// Run a SELECT built from tables, columns and an optional filter
    Find {
        database: String,
        #[arg(short, long = "table", required = true)]
        tables: Vec<String>,
        #[arg(short, long = "column")]
        columns: Vec<String>,
        /// Predicate with ?1, ?2, ... placeholders
        #[arg(short = 'w', long = "where")]
        predicate: Option<String>,
        /// Text values bound to the predicate placeholders, in order
        #[arg(short, long = "param")]
        params: Vec<String>,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();

    let config = match Config::load_or_default(args.config.as_deref()) {
        Ok(mut config) => {
            if let Some(dir) = &args.data_dir {
                config.data_dir = dir.clone();
            }
            config
        }
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    // Initialize the logging system using tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Starting tenantql with data dir {:?}", config.data_dir);

    match run(args.command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command, config: &Config) -> Result<()> {
    let mut provisioner = Provisioner::from_config(config)?;

    match command {
        Command::Init => {
            provisioner.init_control_database()?;
            print_json(&provisioner.control_database())
        }
        Command::Provision { display_name } => print_json(&provisioner.provision(&display_name)?),
        Command::Accounts => print_json(&provisioner.list_accounts()?),
        Command::Databases => print_json(&provisioner.cluster().list_databases()?),
        Command::Drop { database } => {
            provisioner.remove_database(&database)?;
            print_json(&database)
        }
        Command::Tables { database } => print_json(&provisioner.list_tables(&database)?),
        Command::Columns { database, table } => {
            let session = provisioner.cluster().connect(&database)?;
            print_json(&session.list_columns(&table)?)
        }
        Command::Find {
            database,
            tables,
            columns,
            predicate,
            params,
        } => {
            let session = provisioner.cluster().connect(&database)?;
            let columns = if columns.is_empty() {
                vec![ALL_COLUMNS.to_string()]
            } else {
                columns
            };
            let filter = predicate.map(|p| Filter::new(p, params.into_iter().map(Value::from)));
            print_json(&session.find(&tables, &columns, filter)?)
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
