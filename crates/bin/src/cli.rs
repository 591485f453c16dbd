//! CLI argument definitions for the docmap binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::output::OutputFormat;

/// Output format flag
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Format {
    /// Aligned, human-readable text
    Human,
    /// One JSON document per command
    Json,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Human => OutputFormat::Human,
            Format::Json => OutputFormat::Json,
        }
    }
}

/// Inspect and edit documents stored inside a JSON record file
#[derive(Parser, Debug)]
#[command(name = "docmap")]
#[command(about = "docmap: typed documents over JSON attributes of a record")]
#[command(version)]
pub struct Cli {
    /// Output format
    #[arg(long, value_enum, default_value = "human", global = true)]
    pub format: Format,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print a document
    Show(ShowArgs),
    /// Merge attributes into a document and save
    Set(SetArgs),
    /// Validate a document and its loaded children
    Check(CheckArgs),
}

/// Where the document lives and how to interpret it
#[derive(clap::Args, Debug)]
pub struct TargetArgs {
    /// Record file. Created on first save if missing.
    #[arg(short, long, env = "DOCMAP_FILE")]
    pub file: PathBuf,

    /// Registry configuration declaring document types
    #[arg(short, long, env = "DOCMAP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Document type to load the attribute as
    #[arg(short = 't', long = "type", default_value = "document")]
    pub doc_type: String,

    /// Record attribute holding the document
    #[arg(short, long)]
    pub attribute: String,

    /// Key inside the attribute, for documents stored one level down
    #[arg(short, long)]
    pub key: Option<String>,
}

/// Arguments for the show command
#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Only print this attribute of the document
    #[arg(long)]
    pub get: Option<String>,
}

/// Arguments for the set command
#[derive(clap::Args, Debug)]
pub struct SetArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Assignments as PATH=VALUE. A dotted PATH reaches into nested
    /// documents. VALUE is parsed as JSON, falling back to a plain string.
    #[arg(value_name = "PATH=VALUE", required = true)]
    pub assignments: Vec<String>,
}

/// Arguments for the check command
#[derive(clap::Args, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub target: TargetArgs,
}
