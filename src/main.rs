//! Trace DB Studio CLI
//!
//! Inspect, query, and visualize trace event databases loaded from JSON
//! trace documents.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use env_logger::Env;
use std::path::PathBuf;

use tracedb_studio::commands::{
    execute_dump, execute_flamegraph, execute_info, execute_query, DumpArgs, FlamegraphArgs,
    InfoArgs, QueryArgs,
};
use tracedb_studio::query::QueryDumpFormat;

/// Trace DB Studio - trace inspection and profiling
#[derive(Parser, Debug)]
#[command(name = "tracedb")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Summarize a trace document
    Info {
        /// Path to the trace document
        input: PathBuf,
    },

    /// Run a filter query and dump the matches
    Query {
        /// Path to the trace document
        input: PathBuf,

        /// Filter expression, e.g. "render(frames > 2)"
        expression: String,

        /// Zone to query (defaults to the first zone)
        #[arg(long)]
        zone: Option<String>,

        /// Dump format
        #[arg(long, value_enum, default_value_t = DumpFormatArg::Csv)]
        format: DumpFormatArg,

        /// Write the dump to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print every visible event of every zone
    Dump {
        /// Path to the trace document
        input: PathBuf,
    },

    /// Render an own-time flamegraph SVG
    Flamegraph {
        /// Path to the trace document
        input: PathBuf,

        /// Output path for the SVG
        #[arg(short, long, default_value = "flamegraph.svg")]
        output: PathBuf,

        /// Flamegraph title (defaults to the input file name)
        #[arg(long)]
        title: Option<String>,

        /// Flamegraph width in pixels
        #[arg(long, default_value = "1200")]
        width: usize,
    },
}

/// Dump format names accepted on the command line
#[derive(Debug, Clone, Copy, ValueEnum)]
enum DumpFormatArg {
    Csv,
    Json,
}

impl From<DumpFormatArg> for QueryDumpFormat {
    fn from(value: DumpFormatArg) -> Self {
        match value {
            DumpFormatArg::Csv => QueryDumpFormat::Csv,
            DumpFormatArg::Json => QueryDumpFormat::Json,
        }
    }
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    // Execute command
    match cli.command {
        Commands::Info { input } => {
            execute_info(InfoArgs { input })?;
        }

        Commands::Query {
            input,
            expression,
            zone,
            format,
            output,
        } => {
            execute_query(QueryArgs {
                input,
                expression,
                zone,
                format: format.into(),
                output,
            })?;
        }

        Commands::Dump { input } => {
            execute_dump(DumpArgs { input })?;
        }

        Commands::Flamegraph {
            input,
            output,
            title,
            width,
        } => {
            execute_flamegraph(FlamegraphArgs {
                input,
                output,
                title,
                width,
            })?;
        }
    }

    Ok(())
}
