// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// CLI entrypoint for plan9enc.

use std::fs::OpenOptions;
use std::io::{self, Read, Write};
use std::sync::Mutex;

use clap::Parser;
use log::{info, warn, Level, LevelFilter, Log, Metadata, Record};
use serde_json::json;

use plan9enc::cli::{validate_cli, Cli, CliConfig, DiagnosticsSinkConfig, OutputFormat};
use plan9enc::rewriter::{RewriteEngine, RewriteError, RewriteMode};

struct DiagnosticsSink {
    writer: Option<Box<dyn Write + Send>>,
}

impl DiagnosticsSink {
    fn from_config(config: &DiagnosticsSinkConfig) -> io::Result<Self> {
        match config {
            DiagnosticsSinkConfig::Disabled => Ok(Self { writer: None }),
            DiagnosticsSinkConfig::Stderr => Ok(Self {
                writer: Some(Box::new(io::stderr())),
            }),
            DiagnosticsSinkConfig::File { path, append } => {
                let mut opts = OpenOptions::new();
                opts.create(true).write(true);
                if *append {
                    opts.append(true);
                } else {
                    opts.truncate(true);
                }
                let file = opts.open(path)?;
                Ok(Self {
                    writer: Some(Box::new(file)),
                })
            }
        }
    }

    fn emit_line(&mut self, line: &str) {
        if let Some(writer) = &mut self.writer {
            let _ = writeln!(writer, "{line}");
        }
    }

    fn flush(&mut self) {
        if let Some(writer) = &mut self.writer {
            let _ = writer.flush();
        }
    }
}

/// `log` backend writing every record through the diagnostics sink.
struct SinkLogger {
    sink: Mutex<DiagnosticsSink>,
    format: OutputFormat,
    level: LevelFilter,
}

impl SinkLogger {
    fn emit_line(&self, line: &str) {
        if let Ok(mut sink) = self.sink.lock() {
            sink.emit_line(line);
        }
    }

    fn emit_error(&self, err: &RewriteError) {
        self.emit_line(&format_error_line(err, self.format));
    }
}

impl Log for SinkLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let message = record.args().to_string();
        self.emit_line(&format_log_line(
            record.level(),
            record.target(),
            &message,
            self.format,
        ));
    }

    fn flush(&self) {
        if let Ok(mut sink) = self.sink.lock() {
            sink.flush();
        }
    }
}

fn level_to_str(level: Level) -> &'static str {
    match level {
        Level::Error => "error",
        Level::Warn => "warning",
        Level::Info => "info",
        Level::Debug => "debug",
        Level::Trace => "trace",
    }
}

fn format_log_line(level: Level, target: &str, message: &str, format: OutputFormat) -> String {
    if format == OutputFormat::Json {
        json!({
            "code": null,
            "severity": level_to_str(level),
            "message": message,
            "file": null,
            "line": null,
            "target": target,
        })
        .to_string()
    } else {
        format!("{}: {message}", level_to_str(level))
    }
}

fn format_error_line(err: &RewriteError, format: OutputFormat) -> String {
    if format == OutputFormat::Json {
        let file = match err {
            RewriteError::Io { path, .. } => Some(path.display().to_string()),
            _ => None,
        };
        json!({
            "code": err.code(),
            "severity": "error",
            "message": err.to_string(),
            "file": file,
            "line": err.line_number(),
            "target": "plan9enc",
        })
        .to_string()
    } else {
        format!("error: {err}")
    }
}

/// Runs the rewrite and returns whether any input would change.
fn run(config: &CliConfig) -> Result<bool, RewriteError> {
    let engine = RewriteEngine::new(config.rewriter.clone());

    if config.reads_stdin() {
        let mut source = String::new();
        io::stdin()
            .read_to_string(&mut source)
            .map_err(|err| RewriteError::io("read", "<stdin>", err))?;
        let output = engine.rewrite_source_with_diagnostics(&source)?;
        let changed = output.rendered != source;
        if config.mode != RewriteMode::Check {
            write_stdout(&output.rendered)?;
        }
        return Ok(changed);
    }

    let report = engine.run_paths_with_report(&config.input_paths, config.mode)?;
    for file in &report.files {
        if let Some(rendered) = &file.rendered {
            write_stdout(rendered)?;
        }
        if config.mode == RewriteMode::Check && file.changed {
            warn!("{} would be rewritten", file.path.display());
        }
    }
    let summary = report.summary;
    info!(
        "{} file(s) seen, {} changed, {} instruction(s) encoded, {} warning(s) in {} file(s)",
        summary.files_seen,
        summary.files_changed,
        summary.instructions_encoded,
        summary.warnings,
        summary.files_with_warnings
    );
    Ok(summary.files_changed > 0)
}

fn write_stdout(text: &str) -> Result<(), RewriteError> {
    let mut stdout = io::stdout().lock();
    stdout
        .write_all(text.as_bytes())
        .and_then(|()| stdout.flush())
        .map_err(|err| RewriteError::io("write", "<stdout>", err))
}

fn main() {
    let cli = Cli::parse();
    let cli_config = match validate_cli(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };

    let sink = match DiagnosticsSink::from_config(&cli_config.diagnostics_sink) {
        Ok(sink) => sink,
        Err(err) => {
            eprintln!("Failed to open diagnostics sink: {err}");
            std::process::exit(1);
        }
    };
    let logger: &'static SinkLogger = Box::leak(Box::new(SinkLogger {
        sink: Mutex::new(sink),
        format: cli_config.output_format,
        level: cli_config.log_level,
    }));
    if log::set_logger(logger).is_ok() {
        log::set_max_level(cli_config.log_level);
    }

    let status = match run(&cli_config) {
        Ok(changed) if changed && cli_config.mode == RewriteMode::Check => 1,
        Ok(_) => 0,
        Err(err) => {
            logger.emit_error(&err);
            1
        }
    };
    logger.flush();
    std::process::exit(status);
}

#[cfg(test)]
mod tests {
    use super::*;
    use plan9enc::rewriter::ConfigError;

    #[test]
    fn format_error_line_json_has_expected_keys_with_nulls() {
        let err = RewriteError::Encode {
            backend: "YASM".to_string(),
            line_number: 7,
            instruction: "VPADDQ XMM0, XMM1".to_string(),
            diagnostic: "invalid combination of opcode and operands".to_string(),
        };
        let line = format_error_line(&err, OutputFormat::Json);
        let value: serde_json::Value = serde_json::from_str(&line).expect("valid json");
        assert_eq!(value["code"], "encode-error");
        assert_eq!(value["severity"], "error");
        assert_eq!(value["line"], 7);
        assert!(value["file"].is_null());
        assert!(value["message"]
            .as_str()
            .is_some_and(|message| message.starts_with("YASM error (line 7 for 'VPADDQ XMM0, XMM1')")));
    }

    #[test]
    fn format_error_line_text_is_prefixed() {
        let err = RewriteError::Config(ConfigError::new("line_budget must be >= 28"));
        let line = format_error_line(&err, OutputFormat::Text);
        assert!(line.starts_with("error: "), "{line}");
        assert!(line.contains("line_budget must be >= 28"), "{line}");
    }

    #[test]
    fn format_log_line_json_carries_severity_and_target() {
        let line = format_log_line(
            Level::Warn,
            "plan9enc::rewriter",
            "line 3: looks like a placeholder",
            OutputFormat::Json,
        );
        let value: serde_json::Value = serde_json::from_str(&line).expect("valid json");
        assert_eq!(value["severity"], "warning");
        assert_eq!(value["target"], "plan9enc::rewriter");
        assert_eq!(value["message"], "line 3: looks like a placeholder");
        assert!(value["code"].is_null());
    }

    #[test]
    fn format_log_line_text_uses_level_prefix() {
        assert_eq!(
            format_log_line(Level::Info, "plan9enc", "Processing file a.s", OutputFormat::Text),
            "info: Processing file a.s"
        );
    }
}
