//! cputrace CLI - create, inspect, verify and dump CPU history trace files.

mod commands;
mod observability;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use cputrace_core::Codec;
use cputrace_core::trace_io::DEFAULT_ROW_GROUP_SIZE;
use observability::{TracingConfig, init_tracing};
use std::path::PathBuf;

/// cputrace - per-instruction CPU history traces.
#[derive(Parser)]
#[command(name = "cputrace")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a synthetic CPU run and save it as a trace
    Synthesize {
        /// Number of instructions to record
        #[arg(short, long, default_value = "1000000")]
        rows: u32,

        /// Output trace file
        #[arg(short, long)]
        out: PathBuf,

        /// Rows per trace block
        #[arg(short, long, default_value_t = DEFAULT_ROW_GROUP_SIZE)]
        group_size: u32,

        /// Generator seed (random if omitted)
        #[arg(short, long)]
        seed: Option<u64>,

        /// Block codec
        #[arg(short, long, value_enum, default_value = "sparse")]
        codec: CodecArg,
    },

    /// Show a trace file's manifest and storage layout
    Inspect {
        /// Trace file
        file: PathBuf,

        /// List every block
        #[arg(short, long)]
        blocks: bool,
    },

    /// Decode a whole trace and report whether it is intact
    Verify {
        /// Trace file
        file: PathBuf,
    },

    /// Print decoded rows
    Dump {
        /// Trace file
        file: PathBuf,

        /// First row to print
        #[arg(short, long, default_value = "0")]
        start: u32,

        /// Number of rows to print
        #[arg(short = 'n', long, default_value = "32")]
        count: u32,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CodecArg {
    /// Zero-suppressed rows
    Sparse,
    /// Raw rows
    Null,
}

impl From<CodecArg> for Codec {
    fn from(arg: CodecArg) -> Self {
        match arg {
            CodecArg::Sparse => Codec::Sparse,
            CodecArg::Null => Codec::Null,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&TracingConfig::from_env().with_verbosity(cli.verbose))?;

    match cli.command {
        Commands::Synthesize {
            rows,
            out,
            group_size,
            seed,
            codec,
        } => {
            let options = commands::synthesize::SynthesizeOptions {
                rows,
                group_size,
                seed,
                codec: codec.into(),
            };
            commands::synthesize::run(&out, &options)
        }
        Commands::Inspect { file, blocks } => commands::inspect::run(&file, blocks),
        Commands::Verify { file } => commands::verify::run(&file),
        Commands::Dump { file, start, count } => commands::dump::run(&file, start, count),
    }
}
