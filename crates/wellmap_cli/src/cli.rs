//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use clap_verbosity_flag::{InfoLevel, Verbosity};

#[derive(Parser)]
#[command(
    name = "wellmap",
    version,
    about = "Convert PCR tabular data to tube well maps",
    long_about = "Convert PCR result tables to 8x12 tube well maps.\n\n\
                  Each discovered workbook is copied to <stem>_wellmap.xlsx (or\n\
                  into out.dir) with a map sheet holding highlighted controls,\n\
                  the run date and time, selected table columns and an optional\n\
                  companion image. Source workbooks are never modified."
)]
pub struct Cli {
    /// YAML file specifying the conversion (default: <exe dir>/yaml/trial.yaml, else ./trial.yaml).
    #[arg(short = 'y', long = "yml", value_name = "PATH")]
    pub yml: Option<PathBuf>,

    /// Print the parsed YAML before converting.
    #[arg(long = "echo")]
    pub echo: bool,

    /// Project every table and print the plates without writing workbooks.
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Number of files converted in parallel (overrides `out.workers`).
    #[arg(long = "workers", value_name = "N", value_parser = clap::value_parser!(u16).range(1..))]
    pub workers: Option<u16>,

    /// Adjust log verbosity (-v for debug, -vv for trace, -q for warnings only).
    #[command(flatten)]
    pub verbosity: Verbosity<InfoLevel>,

    /// Log output format.
    #[arg(long = "log-format", value_enum, default_value = "pretty")]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
