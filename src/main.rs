//! Purpose: `semanas` CLI entry point and command dispatch.
//! Role: Binary crate root; parses args, runs commands, emits JSON on stdout.
//! Invariants: `serve` exposes the HTTP parser; `extract` runs the same core offline.
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `core::error::to_exit_code`.
use std::io::{self, IsTerminal, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum, ValueHint, error::ErrorKind as ClapErrorKind};
use serde_json::json;

mod serve;

use semanas::core::error::{Error, ErrorKind, to_exit_code};
use semanas::core::payments;
use semanas::core::report::{self, ParseReport};

const DEFAULT_BIND: &str = "0.0.0.0:8000";
const DEFAULT_MAX_BODY_BYTES: u64 = 25 * 1024 * 1024;

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, Error> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(err.to_string().trim_end().to_string())
                    .with_hint("Run with --help for usage."));
            }
        },
    };

    match cli.command {
        Command::Serve(args) => run_serve(args),
        Command::Extract(args) => run_extract(args),
    }
}

#[derive(Parser)]
#[command(
    name = "semanas",
    version,
    about = "Extract weeks, summary, and payment tables from pension history PDFs",
    after_help = r#"EXAMPLES
  $ semanas serve
  $ semanas serve --bind 127.0.0.1:8000 --cors-origin https://app.example.com
  $ semanas extract historia.pdf --pretty
  $ semanas extract historia.pdf --format csv --output historia"#,
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(
        about = "Serve the PDF parser over HTTP",
        long_about = r#"Serve the parser as an HTTP/JSON endpoint.

POST a pension report as multipart/form-data (`file` part) to /parse-pension-pdf
and receive the extracted tables as JSON. GET /health reports liveness."#,
        after_help = r#"EXAMPLES
  $ semanas serve
  $ semanas serve --bind 0.0.0.0:8000 --max-body-bytes 52428800
  $ semanas serve --cors-origin https://app.example.com --cors-origin https://staging.example.com

NOTES
  - With no --cors-origin flags, any origin is allowed
  - Uploads larger than --max-body-bytes are rejected"#
    )]
    Serve(ServeArgs),
    #[command(
        arg_required_else_help = true,
        about = "Extract tables from a PDF on disk",
        long_about = r#"Run the extraction pipeline against a local file and print or write the result.

The JSON output matches the HTTP endpoint exactly. CSV output writes one file
per table next to the given base path."#,
        after_help = r#"EXAMPLES
  $ semanas extract historia.pdf
  $ semanas extract historia.pdf --pretty --missing-periods
  $ semanas extract historia.pdf --output historia.json
  $ semanas extract historia.pdf --format csv --output historia

NOTES
  - `--format csv` requires --output BASE and writes BASE_weeks.csv,
    BASE_payments.csv, and BASE_summary.csv
  - `--missing-periods` appends the payment-gap report (JSON only)"#
    )]
    Extract(ExtractArgs),
}

#[derive(Args)]
struct ServeArgs {
    #[arg(long, default_value = DEFAULT_BIND, help = "Bind address")]
    bind: String,
    #[arg(
        long,
        default_value_t = DEFAULT_MAX_BODY_BYTES,
        help = "Max upload size in bytes"
    )]
    max_body_bytes: u64,
    #[arg(
        long = "cors-origin",
        value_name = "ORIGIN",
        help = "Allow browser requests from this origin (repeatable; default: any)"
    )]
    cors_origin: Vec<String>,
}

#[derive(Args)]
struct ExtractArgs {
    #[arg(help = "Path to the pension report PDF", value_hint = ValueHint::FilePath)]
    file: PathBuf,
    #[arg(long, default_value = "json", value_enum, help = "Output format: json|csv")]
    format: ExtractFormat,
    #[arg(long, help = "Pretty-print JSON output")]
    pretty: bool,
    #[arg(
        long,
        value_name = "PATH",
        help = "Write output here instead of stdout (CSV: base path)",
        value_hint = ValueHint::FilePath
    )]
    output: Option<PathBuf>,
    #[arg(
        long = "missing-periods",
        help = "Include missing payment periods in JSON output"
    )]
    missing_periods: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum ExtractFormat {
    Json,
    Csv,
}

fn run_serve(args: ServeArgs) -> Result<RunOutcome, Error> {
    let bind: SocketAddr = args.bind.parse().map_err(|_| {
        Error::new(ErrorKind::Usage)
            .with_message(format!("invalid bind address: {}", args.bind))
            .with_hint("Use host:port, like 0.0.0.0:8000.")
    })?;
    let config = serve::ServeConfig {
        bind,
        max_body_bytes: args.max_body_bytes,
        cors_allowed_origins: args.cors_origin,
    };
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to start async runtime")
                .with_source(err)
        })?;
    runtime.block_on(serve::serve(config))?;
    Ok(RunOutcome::ok())
}

fn run_extract(args: ExtractArgs) -> Result<RunOutcome, Error> {
    let report = report::extract_path(&args.file)?;
    match args.format {
        ExtractFormat::Json => {
            let text = render_json(&report, args.pretty, args.missing_periods)?;
            match args.output {
                Some(path) => write_output_file(&path, text.as_bytes())?,
                None => {
                    let mut stdout = io::stdout().lock();
                    stdout.write_all(text.as_bytes()).map_err(|err| {
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write output")
                            .with_source(err)
                    })?;
                }
            }
        }
        ExtractFormat::Csv => {
            if args.missing_periods {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message("--missing-periods is only available with --format json"));
            }
            let Some(base) = args.output else {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message("--format csv requires --output BASE")
                    .with_hint("Tables are written as BASE_weeks.csv and friends."));
            };
            write_csv_tables(&base, &report)?;
        }
    }
    Ok(RunOutcome::ok())
}

fn render_json(report: &ParseReport, pretty: bool, missing: bool) -> Result<String, Error> {
    let mut value = serde_json::to_value(report).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to encode report")
            .with_source(err)
    })?;
    if missing {
        let gaps = payments::missing_periods(&report.payments_data)
            .map(|gaps| serde_json::to_value(&gaps))
            .transpose()
            .map_err(|err| {
                Error::new(ErrorKind::Internal)
                    .with_message("failed to encode missing periods")
                    .with_source(err)
            })?
            .unwrap_or(serde_json::Value::Null);
        if let Some(map) = value.as_object_mut() {
            map.insert("missing_periods".to_string(), gaps);
        }
    }
    let mut text = if pretty {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to encode report")
            .with_source(err)
    })?;
    text.push('\n');
    Ok(text)
}

fn write_output_file(path: &Path, bytes: &[u8]) -> Result<(), Error> {
    std::fs::write(path, bytes).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to write output file")
            .with_path(path)
            .with_source(err)
    })
}

fn write_csv_tables(base: &Path, report: &ParseReport) -> Result<(), Error> {
    let stem = base.to_string_lossy();
    write_csv_records(
        &PathBuf::from(format!("{stem}_weeks.csv")),
        &report.weeks_data,
    )?;
    write_csv_records(
        &PathBuf::from(format!("{stem}_payments.csv")),
        &report.payments_data,
    )?;
    write_csv_records(
        &PathBuf::from(format!("{stem}_summary.csv")),
        std::slice::from_ref(&report.summary_values),
    )?;
    Ok(())
}

fn write_csv_records<T: serde::Serialize>(path: &Path, records: &[T]) -> Result<(), Error> {
    let mut writer = csv::Writer::from_path(path).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to create CSV file")
            .with_path(path)
            .with_source(err)
    })?;
    for record in records {
        writer.serialize(record).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to write CSV row")
                .with_path(path)
                .with_source(err)
        })?;
    }
    writer.flush().map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to flush CSV file")
            .with_path(path)
            .with_source(err)
    })
}

fn emit_error(err: &Error) {
    let stderr = io::stderr();
    if stderr.is_terminal() {
        eprintln!("error: {err}");
        if let Some(hint) = err.hint() {
            eprintln!("hint: {hint}");
        }
        return;
    }
    let envelope = json!({
        "error": {
            "kind": format!("{:?}", err.kind()),
            "message": err.message().unwrap_or("error"),
            "hint": err.hint(),
            "path": err.path().map(|path| path.display().to_string()),
            "page": err.page(),
        }
    });
    eprintln!("{envelope}");
}
