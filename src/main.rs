use clap::{Parser, Subcommand};
use sheet_crud::cli;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sheet-crud")]
#[command(about = "Keyed CRUD over spreadsheet tables")]
#[command(long_about = "Sheet CRUD - use workbook tables as keyed record stores

Row 1 of each table holds header labels, rows 2.. hold records, and one
column holds a unique key per record. Tables are declared in a YAML config.

COMMANDS:
  init     - Create the workbook, its sheets and header rows
  keygen   - Print fresh record keys
  create   - Append a record
  read     - Print a table (stops at the first blank row)
  tail     - Print the last N records
  get      - Look up a record by key
  exists   - Check whether a key exists
  update   - Change fields of a record
  delete   - Delete every record with a key
  search   - Case-insensitive substring search

EXAMPLES:
  sheet-crud init
  sheet-crud create customers --auto-key --set NAME=Acme
  sheet-crud tail invoices -n 5
  sheet-crud update customers 6f1c... --set CITY=Seoul

Logging goes to stderr and is controlled by RUST_LOG.")]
#[command(version)]
struct Cli {
    /// Path to the workbook config (YAML)
    #[arg(
        short,
        long,
        global = true,
        env = "SHEET_CRUD_CONFIG",
        default_value = "sheet-crud.yaml"
    )]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the workbook with configured sheets and header rows
    Init,

    /// Print fresh record keys
    Keygen {
        /// How many keys to print
        #[arg(short = 'n', long, default_value = "1")]
        count: usize,
    },

    #[command(long_about = "Append a record to a table.

Values are given either positionally with --values (written in column
order) or as FIELD=VALUE pairs with --set (written in the order given).
Blank inputs become empty cells, true/false become booleans and numeric
text becomes a number.

EXAMPLES:
  sheet-crud create people --values k1 Ada Lovelace
  sheet-crud create customers --auto-key --set NAME=Acme --set CITY=Busan")]
    /// Append a record
    Create {
        /// Table alias from the config
        table: String,

        /// Cell values in column order
        #[arg(long, num_args = 1..)]
        values: Vec<String>,

        /// FIELD=VALUE pairs
        #[arg(short, long = "set")]
        sets: Vec<String>,

        /// Generate a key and write it first
        #[arg(short, long)]
        auto_key: bool,
    },

    /// Print a table's records
    Read {
        /// Table alias from the config
        table: String,

        /// Include the header row
        #[arg(long)]
        header: bool,

        /// Print rows as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the last N records
    Tail {
        /// Table alias from the config
        table: String,

        /// Number of records
        #[arg(short, default_value = "10")]
        n: String,

        /// Print rows as JSON
        #[arg(long)]
        json: bool,
    },

    /// Look up a record by key
    Get {
        /// Table alias from the config
        table: String,

        /// Record key
        key: String,

        /// Print the lookup result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check whether a key exists (exit code 1 when it does not)
    Exists {
        /// Table alias from the config
        table: String,

        /// Record key
        key: String,
    },

    /// Change fields of the record with a key
    Update {
        /// Table alias from the config
        table: String,

        /// Record key
        key: String,

        /// FIELD=VALUE pairs
        #[arg(short, long = "set", required = true)]
        sets: Vec<String>,
    },

    /// Delete every record with a key
    Delete {
        /// Table alias from the config
        table: String,

        /// Record key
        key: String,
    },

    /// Find records containing text (case-insensitive)
    Search {
        /// Table alias from the config
        table: String,

        /// Text to look for
        text: String,

        /// Skip this many leading columns
        #[arg(long, default_value = "0")]
        from_column: usize,

        /// Print rows as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "sheet_crud=warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config;

    match cli.command {
        Commands::Init => cli::init(&config)?,

        Commands::Keygen { count } => cli::keygen(count)?,

        Commands::Create {
            table,
            values,
            sets,
            auto_key,
        } => cli::create(&config, &table, values, sets, auto_key)?,

        Commands::Read {
            table,
            header,
            json,
        } => cli::read(&config, &table, header, json)?,

        Commands::Tail { table, n, json } => cli::tail(&config, &table, &n, json)?,

        Commands::Get { table, key, json } => cli::get(&config, &table, &key, json)?,

        Commands::Exists { table, key } => {
            if !cli::exists(&config, &table, &key)? {
                std::process::exit(1);
            }
        }

        Commands::Update { table, key, sets } => cli::update(&config, &table, &key, sets)?,

        Commands::Delete { table, key } => cli::delete(&config, &table, &key)?,

        Commands::Search {
            table,
            text,
            from_column,
            json,
        } => cli::search(&config, &table, &text, from_column, json)?,
    }

    Ok(())
}
