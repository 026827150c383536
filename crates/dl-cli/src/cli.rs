use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "dl",
    about = "Data Ledger — record contract over a transactional key-value ledger",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Write-ahead log to open (overrides the config file)
    #[arg(long, global = true)]
    pub ledger: Option<PathBuf>,

    /// Config file (defaults to ./dl.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Seed the two bootstrap records
    Init,
    /// Create a new record
    Create(RecordArgs),
    /// Show a record
    Read(IdArgs),
    /// Replace an existing record
    Update(RecordArgs),
    /// Delete a record
    Delete(IdArgs),
    /// Check whether a record exists
    Exists(IdArgs),
    /// List every record
    List,
    /// Call a contract function by name with raw string arguments
    Invoke(InvokeArgs),
    /// Collapse the write-ahead log into a single snapshot record
    Compact,
}

#[derive(Args)]
pub struct RecordArgs {
    pub id: String,
    pub task_id: i64,
    pub company_code: i64,
    pub letter_num: String,
    pub predict_value: String,
    pub predict_divation: String,
    pub f_value: String,
}

#[derive(Args)]
pub struct IdArgs {
    pub id: String,
}

#[derive(Args)]
pub struct InvokeArgs {
    pub function: String,
    #[arg(allow_hyphen_values = true)]
    pub args: Vec<String>,
}
