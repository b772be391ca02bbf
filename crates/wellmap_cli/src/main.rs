//! `wellmap`: PCR table to tube well map converter.

use std::io::{self, IsTerminal};

use anyhow::Context;
use clap::Parser;
use tracing::info;
use wellmap_cli::config::{derive_config_echo, derive_default_config_path, load_config};
use wellmap_cli::logging::{LogConfig, LogFormat, init_logging};
use wellmap_cli::pipeline::run_conversion;
use wellmap_cli::preview::build_plate_table;
use wellmap_io_fs::discover_tables;

mod cli;

use crate::cli::{Cli, LogFormatArg};

const N_BORDER_WIDTH: usize = 59;

fn main() {
    let cli = Cli::parse();
    let log_config = log_config_from_cli(&cli);
    if let Err(error) = init_logging(&log_config) {
        eprintln!("error: failed to initialize logging: {error}");
        std::process::exit(1);
    }
    let exit_code = match run(&cli) {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(err) => {
            eprintln!("error: {err:#}");
            1
        }
    };
    std::process::exit(exit_code);
}

/// Returns whether every file converted.
fn run(cli: &Cli) -> anyhow::Result<bool> {
    let path_yml = match &cli.yml {
        Some(path) => path.clone(),
        None => {
            let path_exe = std::env::current_exe().ok();
            derive_default_config_path(path_exe.as_deref().and_then(|path| path.parent()))
        }
    };
    let config = load_config(&path_yml)?;
    if cli.echo {
        println!("{}", derive_config_echo(&path_yml, &config)?);
    }
    let mut plan = config
        .resolve()
        .with_context(|| format!("invalid configuration in {}", path_yml.display()))?;
    if let Some(n_workers) = cli.workers {
        plan.n_workers = Some(usize::from(n_workers));
    }

    let c_border = "-".repeat(N_BORDER_WIDTH);
    println!("Running wellmap...");
    println!("{c_border}");

    let report_discover = discover_tables(&plan.dir_input, &plan.entries, &plan.discover_options())
    .context("file discovery failed")?;
    info!("{report_discover}");

    let (report, l_outcomes) = run_conversion(
        &report_discover.files,
        &plan,
        cli.dry_run,
        report_discover.cnt_skipped,
    );

    if cli.dry_run {
        for outcome in &l_outcomes {
            println!("[{}]", outcome.path_src.display());
            println!(
                "{}",
                build_plate_table(&outcome.grid, &plan.rules, &plan.options_map.title)
            );
        }
    }
    for path_out in &report.files_out {
        println!("[{}] completed.", path_out.display());
    }

    println!("{c_border}");
    println!("{}", report.format_with_failures("[CONVERT]"));
    Ok(!report.has_failures())
}

/// Build logging configuration from CLI flags.
fn log_config_from_cli(cli: &Cli) -> LogConfig {
    LogConfig {
        level_filter: cli.verbosity.tracing_level_filter(),
        use_env_filter: !cli.verbosity.is_present(),
        format: match cli.log_format {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Compact => LogFormat::Compact,
            LogFormatArg::Json => LogFormat::Json,
        },
        log_file: cli.log_file.clone(),
        with_ansi: cli.log_file.is_none() && io::stderr().is_terminal(),
        ..LogConfig::default()
    }
}
