//! Purpose: `tabcat` CLI entry point.
//! Role: Binary crate root; parses flags, reads one table, prints it.
//! Invariants: The table rendering is the only thing written to stdout.
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
use std::io::{self, BufWriter, IsTerminal, Write};
use std::path::PathBuf;

use clap::{CommandFactory, Parser, ValueEnum, ValueHint, error::ErrorKind as ClapErrorKind};
use clap_complete::aot::Shell;
use serde_json::{Map, Value, json};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use tabcat::api::{
    DisplayOptions, Error, ErrorKind, ReadOptions, Store, read_table, render, to_exit_code,
};

fn main() {
    let exit_code = match run() {
        Ok(code) => code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<i32, (Error, ColorMode)> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
                })?;
                return Ok(0);
            }
            _ => {
                let message = clap_error_summary(&err);
                let hint = clap_error_hint(&err);
                return Err((
                    Error::new(ErrorKind::Usage)
                        .with_message(message)
                        .with_hint(hint),
                    ColorMode::Auto,
                ));
            }
        },
    };

    init_tracing();
    let color_mode = cli.color;

    run_command(cli)
        .map_err(add_corrupt_hint)
        .map_err(add_io_hint)
        .map_err(|err| (err, color_mode))
}

fn run_command(cli: Cli) -> Result<i32, Error> {
    if let Some(shell) = cli.completions {
        let mut cmd = Cli::command();
        clap_complete::aot::generate(shell, &mut cmd, "tabcat", &mut io::stdout());
        return Ok(0);
    }

    let (Some(path), Some(key)) = (cli.read_path_or_buf, cli.key) else {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("--read-path-or-buf and --key are required")
            .with_hint("Try `tabcat --help`."));
    };

    let store = Store::open(&path)?;
    let options = ReadOptions {
        columns: cli.read_columns,
        start: cli.start,
        stop: cli.stop,
        ..ReadOptions::default()
    };
    let table = read_table(&store, Some(&key), &options)?;
    debug!(
        rows = table.num_rows(),
        columns = table.num_columns(),
        "table loaded"
    );

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    render(&table, &DisplayOptions::default(), &mut out)?;
    out.flush().map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to flush stdout")
            .with_source(err)
    })?;
    Ok(0)
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

#[derive(Parser)]
#[command(
    name = "tabcat",
    version,
    about = "Print tables from table archives to the terminal",
    help_template = r#"{about-with-newline}
{before-help}USAGE
  {usage}

OPTIONS
{options}

{after-help}
"#,
    long_about = None,
    before_help = r#"A table archive is a tar file of Parquet tables (a bare Parquet file
also works). Keys are member paths with the `.parquet` suffix stripped.
"#,
    after_help = r#"EXAMPLES
  $ tabcat -r results.tar -k trades
  $ tabcat -r results.tar -k trades --start 10 --stop 20
  $ tabcat -r results.tar -k runs/2024 --read-columns price qty
  $ tabcat -r metrics.parquet -k metrics

LEARN MORE
  $ tabcat --help"#
)]
struct Cli {
    #[arg(
        short = 'r',
        long = "read-path-or-buf",
        value_hint = ValueHint::FilePath,
        required_unless_present = "completions",
        help = "Path to the table archive"
    )]
    read_path_or_buf: Option<PathBuf>,
    #[arg(
        short = 'k',
        long,
        required_unless_present = "completions",
        help = "Key naming the table inside the archive"
    )]
    key: Option<String>,
    #[arg(long, help = "First row index to include")]
    start: Option<u64>,
    #[arg(long, help = "Row index to stop before")]
    stop: Option<u64>,
    #[arg(
        long = "read-columns",
        num_args = 1..,
        value_name = "COLUMN",
        help = "Columns to read, in the order to print them"
    )]
    read_columns: Option<Vec<String>>,
    #[arg(
        long,
        default_value = "auto",
        value_enum,
        help = "Colorize stderr diagnostics: auto|always|never"
    )]
    color: ColorMode,
    #[arg(
        long,
        value_enum,
        value_name = "SHELL",
        help = "Emit shell completions and exit"
    )]
    completions: Option<Shell>,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

fn add_io_hint(err: Error) -> Error {
    if err.hint().is_some() {
        return err;
    }
    match err.kind() {
        ErrorKind::Permission => {
            err.with_hint("Permission denied. Check that the store is readable.")
        }
        ErrorKind::Io => err.with_hint("I/O error. Check the path and filesystem."),
        _ => err,
    }
}

fn add_corrupt_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Corrupt || err.hint().is_some() {
        return err;
    }
    err.with_hint(
        "Store appears corrupt or is not a table archive. Expected a tar of Parquet tables or a bare Parquet file.",
    )
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", error_text(err, color_mode.use_color(is_tty)));
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::NotFound => "not found".to_string(),
        ErrorKind::Permission => "permission denied".to_string(),
        ErrorKind::Corrupt => "corrupt store".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
        ErrorKind::Unsupported => "not implemented".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = std::error::Error::source(err);
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }
    if let Some(key) = err.key() {
        inner.insert("key".to_string(), json!(key));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error, use_color: bool) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "{} {}",
        colorize_label("error:", use_color, AnsiColor::Red),
        error_message(err)
    ));

    if let Some(hint) = err.hint() {
        lines.push(format!(
            "{} {hint}",
            colorize_label("hint:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(path) = err.path() {
        lines.push(format!(
            "{} {}",
            colorize_label("path:", use_color, AnsiColor::Yellow),
            path.display()
        ));
    }
    if let Some(key) = err.key() {
        lines.push(format!(
            "{} {key}",
            colorize_label("key:", use_color, AnsiColor::Yellow)
        ));
    }

    let causes = error_causes(err);
    if let Some(cause) = causes.first() {
        lines.push(format!(
            "{} {cause}",
            colorize_label("caused by:", use_color, AnsiColor::Yellow)
        ));
    }

    lines.join("\n")
}

#[derive(Copy, Clone, Debug)]
enum AnsiColor {
    Red,
    Yellow,
}

fn colorize_label(label: &str, enabled: bool, color: AnsiColor) -> String {
    if !enabled {
        return label.to_string();
    }
    let code = match color {
        AnsiColor::Red => "31",
        AnsiColor::Yellow => "33",
    };
    format!("\u{1b}[{code}m{label}\u{1b}[0m")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}

fn clap_error_hint(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let usage = rendered
        .lines()
        .find_map(|line| line.trim().strip_prefix("Usage: "))
        .map(str::trim);
    match usage {
        Some(usage) => format!("Usage: {usage}. Try `tabcat --help`."),
        None => "Try `tabcat --help`.".to_string(),
    }
}
