use std::path::{Path, PathBuf};

use clap::builder::styling::AnsiColor;
use clap::builder::{PossibleValue, Styles};
use clap::Parser;
use colored::Colorize;
use serde::Serialize;

use clashgen::convert::{convert_file, ConversionReport, ConvertError};
use clashgen::dispatch::{BatchReport, ParseOutcome};
use clashgen::initialize_logging;
use clashgen::template::{default_template, RoutingTemplate};

fn get_styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::Yellow.on_default())
        .usage(AnsiColor::Green.on_default())
        .literal(AnsiColor::BrightGreen.on_default())
        .placeholder(AnsiColor::Cyan.on_default())
}

/// Convert a list of ss/vless/trojan/hysteria2 share links into a Clash config.
#[derive(Parser, Debug, Clone)]
#[command(version, styles = get_styles())]
struct Cli {
    /// Text file with one share link per line.
    input: PathBuf,

    /// Where to write the generated YAML config.
    #[arg(short, long, default_value = "config.yaml")]
    output: PathBuf,

    /// Routing template (rule providers, rules, groups) replacing the built-in one.
    #[arg(long)]
    template: Option<PathBuf>,

    /// Print a JSON report instead of status lines.
    #[arg(long)]
    json: bool,

    /// Log level for diagnostics on stderr.
    #[arg(
        long = "log",
        default_value = "warn",
        value_parser([
            PossibleValue::new("off"),
            PossibleValue::new("error"),
            PossibleValue::new("warn"),
            PossibleValue::new("info"),
            PossibleValue::new("debug"),
            PossibleValue::new("trace"),
        ])
    )]
    log_level: String,
}

#[derive(Serialize)]
struct ConvertResponse {
    ok: bool,
    input: String,
    output: String,
    message: String,
    succeeded: usize,
    total: usize,
    failures: Vec<FailureEntry>,
}

#[derive(Serialize)]
struct FailureEntry {
    line: usize,
    url: String,
    error: String,
}

fn main() {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            print_error(&format!("{:#}", err));
            std::process::exit(1);
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<bool> {
    let log_level = match cli.log_level.as_str() {
        "error" => log::LevelFilter::Error,
        "warn" => log::LevelFilter::Warn,
        "info" => log::LevelFilter::Info,
        "debug" => log::LevelFilter::Debug,
        "trace" => log::LevelFilter::Trace,
        _ => log::LevelFilter::Off,
    };
    initialize_logging(log_level)?;

    let template = match cli.template.as_deref() {
        Some(path) => RoutingTemplate::from_file(path)?,
        None => default_template()?.clone(),
    };

    match convert_file(&cli.input, &cli.output, &template) {
        Ok(report) => {
            if cli.json {
                print_json(&response(cli, &report));
            } else {
                print_report(&report);
            }
            Ok(report.success)
        }
        Err(err) => {
            if cli.json {
                let batch = match &err {
                    ConvertError::NoValidProxies(batch) => batch.clone(),
                    _ => BatchReport::default(),
                };
                print_json(&failure_response(cli, err.to_string(), &batch));
            } else {
                if let ConvertError::NoValidProxies(batch) = &err {
                    print_failures(batch);
                }
                print_error(&err.to_string());
            }
            Ok(false)
        }
    }
}

fn print_report(report: &ConversionReport) {
    print_failures(&report.batch);
    if report.success {
        print_success(&report.message);
    } else {
        print_error(&report.message);
    }
}

fn print_failures(batch: &BatchReport) {
    for outcome in batch.failures() {
        eprintln!("  {}", outcome.message().yellow());
    }
}

fn print_success(message: &str) {
    println!("{}", format!("✓ {}", message).green());
}

fn print_error(message: &str) {
    eprintln!("{}", format!("✗ {}", message).red());
}

fn response(cli: &Cli, report: &ConversionReport) -> ConvertResponse {
    ConvertResponse {
        ok: report.success,
        input: display(&cli.input),
        output: display(&report.output),
        message: report.message.clone(),
        succeeded: report.succeeded(),
        total: report.total(),
        failures: failure_entries(&report.batch),
    }
}

fn failure_response(cli: &Cli, message: String, batch: &BatchReport) -> ConvertResponse {
    ConvertResponse {
        ok: false,
        input: display(&cli.input),
        output: display(&cli.output),
        message,
        succeeded: batch.succeeded(),
        total: batch.total(),
        failures: failure_entries(batch),
    }
}

fn failure_entries(batch: &BatchReport) -> Vec<FailureEntry> {
    batch
        .failures()
        .filter_map(|outcome: &ParseOutcome| {
            let err = outcome.result.as_ref().err()?;
            Some(FailureEntry {
                line: outcome.line_no,
                url: outcome.line.clone(),
                error: err.to_string(),
            })
        })
        .collect()
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

fn print_json(payload: &ConvertResponse) {
    let json = serde_json::to_string(payload).unwrap_or_else(|_| "{}".to_string());
    println!("{}", json);
}
