// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Command-line interface parsing and argument validation.

use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};
use log::LevelFilter;

use crate::rewriter::{
    BackendKind, BitMode, ConfigError, RewriteError, RewriteMode, RewriterConfig,
};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const LONG_ABOUT: &str =
    "Rewrites Plan 9 (Go) assembly so that instructions written in comments become
QUAD/LONG/WORD/BYTE literals holding their machine-code encoding.

A line whose literal column is blank up to the comment column is a placeholder:
the comment text is handed to an external assembler (yasm, then GNU as) and the
resulting bytes are written in front of the comment. Lines that already carry
literals are re-encoded and refreshed. Everything else is left byte-for-byte.

Files are rewritten in place unless --check or --stdout is given. Without input
files the source is read from stdin and written to stdout.";

#[derive(Parser, Debug)]
#[command(
    name = "plan9enc",
    version = VERSION,
    about = "Encode instruction comments in Plan 9 assembly into literal bytes",
    long_about = LONG_ABOUT
)]
pub struct Cli {
    #[arg(
        value_name = "FILE",
        long_help = "Assembly source files to rewrite. Reads stdin and writes stdout when omitted."
    )]
    pub inputs: Vec<PathBuf>,
    #[arg(
        short = 'c',
        long = "config",
        value_name = "FILE",
        long_help = "Read rewriter settings from a TOML file. Command-line options override file values."
    )]
    pub config_file: Option<PathBuf>,
    #[arg(
        long = "check",
        action = ArgAction::SetTrue,
        conflicts_with = "stdout",
        long_help = "Do not write anything; exit with status 1 if any input would change."
    )]
    pub check: bool,
    #[arg(
        long = "stdout",
        action = ArgAction::SetTrue,
        long_help = "Print rewritten sources to stdout instead of replacing the input files."
    )]
    pub stdout: bool,
    #[arg(
        long = "pack",
        action = ArgAction::SetTrue,
        long_help = "Pack runs of consecutive instructions into a shared token stream with fewer tokens."
    )]
    pub pack: bool,
    #[arg(
        long = "no-batch",
        action = ArgAction::SetTrue,
        long_help = "Invoke the encoder once per instruction instead of once per file."
    )]
    pub no_batch: bool,
    #[arg(
        long = "comment-column",
        value_name = "N",
        long_help = "Column at which comments start on rewritten lines. Defaults to 65."
    )]
    pub comment_column: Option<usize>,
    #[arg(
        long = "line-budget",
        value_name = "N",
        long_help = "Maximum width of the literal part of one line before tokens wrap onto continuation lines. Defaults to 80."
    )]
    pub line_budget: Option<usize>,
    #[arg(
        long = "bits",
        value_name = "16|32|64",
        long_help = "Operand mode the encoder assembles in. Defaults to 64."
    )]
    pub bits: Option<u64>,
    #[arg(
        long = "timeout-ms",
        value_name = "MS",
        long_help = "Kill an encoder process that runs longer than MS milliseconds."
    )]
    pub timeout_ms: Option<u64>,
    #[arg(
        long = "backend",
        value_name = "NAME",
        action = ArgAction::Append,
        long_help = "Encoder backend to try (yasm, gas or arm64), repeatable. Order sets precedence. Defaults to yasm then gas. arm64 runs GNU as for armv8-a and cannot be combined with the x86 backends."
    )]
    pub backends: Vec<String>,
    #[arg(
        long = "gas-path",
        value_name = "PROGRAM",
        long_help = "GNU assembler executable. Defaults to 'as'."
    )]
    pub gas_path: Option<String>,
    #[arg(
        long = "yasm-path",
        value_name = "PROGRAM",
        long_help = "YASM executable. Defaults to 'yasm'."
    )]
    pub yasm_path: Option<String>,
    #[arg(
        long = "format",
        value_enum,
        default_value_t = OutputFormat::Text,
        long_help = "Select diagnostic output format. text is default; json writes one JSON object per line."
    )]
    pub format: OutputFormat,
    #[arg(
        short = 'q',
        long = "quiet",
        action = ArgAction::SetTrue,
        conflicts_with = "verbose",
        long_help = "Only report warnings and errors."
    )]
    pub quiet: bool,
    #[arg(
        short = 'v',
        long = "verbose",
        action = ArgAction::Count,
        long_help = "Increase log detail: -v for debug, -vv for trace."
    )]
    pub verbose: u8,
    #[arg(
        short = 'E',
        long = "error",
        value_name = "FILE",
        long_help = "Write diagnostics to FILE instead of stderr."
    )]
    pub error_file: Option<PathBuf>,
    #[arg(
        long = "error-append",
        action = ArgAction::SetTrue,
        requires = "error_file",
        long_help = "Append diagnostics to --error FILE instead of truncating it."
    )]
    pub error_append: bool,
    #[arg(
        long = "no-error",
        action = ArgAction::SetTrue,
        conflicts_with_all = ["error_file", "error_append"],
        long_help = "Disable all diagnostic output routing."
    )]
    pub no_error: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticsSinkConfig {
    Stderr,
    File { path: PathBuf, append: bool },
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Validated CLI configuration.
#[derive(Debug)]
pub struct CliConfig {
    pub input_paths: Vec<PathBuf>,
    pub rewriter: RewriterConfig,
    pub mode: RewriteMode,
    pub output_format: OutputFormat,
    pub diagnostics_sink: DiagnosticsSinkConfig,
    pub log_level: LevelFilter,
}

impl CliConfig {
    pub fn reads_stdin(&self) -> bool {
        self.input_paths.is_empty()
    }
}

pub fn validate_cli(cli: &Cli) -> Result<CliConfig, RewriteError> {
    let mut rewriter = match &cli.config_file {
        Some(path) => RewriterConfig::load_from_path(path)?,
        None => RewriterConfig::default(),
    };

    if let Some(column) = cli.comment_column {
        rewriter.comment_column = column;
    }
    if let Some(budget) = cli.line_budget {
        rewriter.line_budget = budget;
    }
    if let Some(bits) = cli.bits {
        rewriter.bits = BitMode::from_bits(bits)
            .ok_or_else(|| ConfigError::new(format!("--bits must be 16, 32 or 64, got {bits}")))?;
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        rewriter.timeout_ms = timeout_ms;
    }
    if !cli.backends.is_empty() {
        rewriter.backends = cli
            .backends
            .iter()
            .map(|name| {
                BackendKind::parse(name).ok_or_else(|| {
                    ConfigError::new(format!(
                        "unknown backend '{name}' (expected {})",
                        BackendKind::NAMES
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
    }
    if let Some(path) = &cli.gas_path {
        rewriter.gas_path = path.clone();
    }
    if let Some(path) = &cli.yasm_path {
        rewriter.yasm_path = path.clone();
    }
    if cli.pack {
        rewriter.pack = true;
    }
    if cli.no_batch {
        rewriter.batch = false;
    }
    rewriter.validate()?;

    let mode = if cli.check {
        RewriteMode::Check
    } else if cli.stdout || cli.inputs.is_empty() {
        RewriteMode::Stdout
    } else {
        RewriteMode::Write
    };

    let log_level = if cli.quiet {
        LevelFilter::Warn
    } else {
        match cli.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Ok(CliConfig {
        input_paths: cli.inputs.clone(),
        rewriter,
        mode,
        output_format: cli.format,
        diagnostics_sink: if cli.no_error {
            DiagnosticsSinkConfig::Disabled
        } else if let Some(path) = &cli.error_file {
            DiagnosticsSinkConfig::File {
                path: path.clone(),
                append: cli.error_append,
            }
        } else {
            DiagnosticsSinkConfig::Stderr
        },
        log_level,
    })
}
