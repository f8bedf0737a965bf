use clap::{Parser, ValueEnum};
use log::{LevelFilter, debug, info};
use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use strfmt::record::flatten_json;
use strfmt::{Result, SelectorMode, StrfmtError, expand_indexed, expand_named, parse_placeholders};

/// Template source used when neither TEMPLATE nor --template-file is given
const TEMPLATE_ENV: &str = "STRFMT_TEMPLATE";

const LONG_HELP: &str = r#"
Placeholders:
  {0} {1} ...          - Positional values, given with -a/--arg
  {Name}               - Named values, given with -s/--set or --json
  {0,8}  {0,-8}        - Pad to a column width (right / left aligned)
  {0:2006-01-02}       - Re-render a "Mon, 02 Jan 2006 15:04:05 -0700" timestamp
  {{ and }}            - Literal braces

Template sources, first match wins:
  TEMPLATE, --template-file, then the STRFMT_TEMPLATE environment variable

Examples:
  # Positional values
  strfmt "Today is a {0} day" -a wonderful
  # Named values
  strfmt "{user,-12}|{role}" -s user=ada -s role=admin
  # Fields of a JSON document (nested objects are merged one level deep)
  strfmt "{title} by {name}" --json book.json
  # Template from a file, output to a file
  strfmt --template-file greeting.txt -a Ada -o greeting.out
  # List the placeholders of a template
  strfmt "{0} and {1,-4}" --list
  # Output as JSON for scripting
  strfmt "{Name}" --mode key --list=json
  # Validate syntax only
  strfmt "{0" --check

Time layouts:
  2006 06 01 1 Jan January 02 2 _2 Mon Monday 15 03 3 04 4 05 5 PM pm
  -0700 -07:00 Z07:00 MST .000 .999
"#;

/// Brace-placeholder string interpolation.
///
/// Copyright 2025 0x484558 @ aleph0 s.r.o.
/// Licensed under the EUPL v1.2.
#[derive(Parser, Debug)]
#[command(
    name = "strfmt",
    version,
    about = "Brace-placeholder string interpolation.",
    after_long_help = LONG_HELP
)]
struct Cli {
    /// Template text [env: STRFMT_TEMPLATE]
    #[arg(value_name = "TEMPLATE")]
    template: Option<String>,

    /// Read the template from a file. Use '-' for stdin.
    #[arg(long, short = 't', value_name = "FILE", conflicts_with = "template")]
    template_file: Option<PathBuf>,

    /// Positional value for {0}, {1}, ... (repeatable)
    #[arg(short = 'a', long = "arg", value_name = "VALUE", action = clap::ArgAction::Append, conflicts_with_all = ["set", "json"])]
    args: Vec<String>,

    /// Named value (repeatable). Overrides fields read with --json.
    #[arg(short = 's', long = "set", value_name = "KEY=VALUE", action = clap::ArgAction::Append)]
    set: Vec<String>,

    /// JSON document whose fields become named values. Use '-' for stdin.
    #[arg(long, value_name = "FILE")]
    json: Option<PathBuf>,

    /// Selector mode, inferred from the values given when omitted
    #[arg(short, long, value_enum)]
    mode: Option<Mode>,

    /// Output file (defaults to stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// List placeholders in the template (optionally with format: plain, json)
    #[arg(long, value_name = "FORMAT", num_args = 0..=1, default_missing_value = "plain", conflicts_with = "check")]
    list: Option<ListFormat>,

    /// Only validate the template syntax
    #[arg(long)]
    check: bool,

    /// Increase verbosity (can be used multiple times)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
enum Mode {
    /// {0}, {1}, ...
    Index,
    /// {Name}, ...
    Key,
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
enum ListFormat {
    /// One placeholder per line
    Plain,
    /// JSON output for scripting
    Json,
}

fn main() {
    let cli = Cli::parse();

    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => LevelFilter::Error,
        (false, 0) => LevelFilter::Warn,
        (false, 1) => LevelFilter::Info,
        (false, 2) => LevelFilter::Debug,
        (false, _) => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_target(false)
        .parse_default_env()
        .init();

    if let Err(e) = run(&cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let template = read_template(cli, std::env::var(TEMPLATE_ENV).ok())?;
    let mode = selector_mode(cli)?;

    if cli.check {
        let placeholders = parse_placeholders(&template, mode)?;
        info!("template is valid ({} placeholders)", placeholders.len());
        return Ok(());
    }

    if let Some(format) = cli.list {
        return list_placeholders(&template, mode, format);
    }

    let expanded = match mode {
        SelectorMode::Index => expand_indexed(&template, cli.args.as_slice())?,
        SelectorMode::Key => expand_named(&template, &named_values(cli)?)?,
    };
    write_output(cli.output.as_deref(), &expanded)
}

/// Picks the selector mode from `--mode` or from the kind of values given.
/// An explicit mode must agree with the values.
fn selector_mode(cli: &Cli) -> Result<SelectorMode> {
    let named = !cli.set.is_empty() || cli.json.is_some();
    match (cli.mode, named) {
        (Some(Mode::Index), true) => Err(StrfmtError::ModeMismatch {
            mode: "index",
            values: "--set/--json",
        }),
        (Some(Mode::Key), false) if !cli.args.is_empty() => Err(StrfmtError::ModeMismatch {
            mode: "key",
            values: "--arg",
        }),
        (Some(Mode::Index), false) | (None, false) => Ok(SelectorMode::Index),
        (Some(Mode::Key), _) | (None, true) => Ok(SelectorMode::Key),
    }
}

/// Template from the command line, then `--template-file`, then `env_template`
fn read_template(cli: &Cli, env_template: Option<String>) -> Result<String> {
    if let Some(template) = &cli.template {
        return Ok(template.clone());
    }
    if let Some(path) = &cli.template_file {
        info!("Reading template from {}", display_source(path));
        return read_source(path);
    }
    env_template.ok_or(StrfmtError::MissingTemplate)
}

/// Reads a file, or stdin for `-`
fn read_source(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        std::fs::read_to_string(path).map_err(Into::into)
    }
}

fn display_source(path: &Path) -> String {
    if path == Path::new("-") {
        "stdin".to_string()
    } else {
        path.display().to_string()
    }
}

/// Splits a `KEY=VALUE` binding at the first `=`
fn parse_binding(binding: &str) -> Result<(String, String)> {
    match binding.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(StrfmtError::InvalidBinding {
            binding: binding.to_string(),
        }),
    }
}

fn named_values(cli: &Cli) -> Result<HashMap<String, String>> {
    let mut values = HashMap::new();
    if let Some(path) = &cli.json {
        info!("Reading values from {}", display_source(path));
        let document: serde_json::Value = serde_json::from_str(&read_source(path)?)?;
        values = flatten_json(&document);
        debug!("{} values flattened from JSON", values.len());
    }
    for binding in &cli.set {
        let (key, value) = parse_binding(binding)?;
        values.insert(key, value);
    }
    Ok(values)
}

fn list_placeholders(template: &str, mode: SelectorMode, format: ListFormat) -> Result<()> {
    debug!("Listing template placeholders...");
    let placeholders = parse_placeholders(template, mode)?;

    match format {
        ListFormat::Plain => {
            for placeholder in &placeholders {
                println!("{}", &template[placeholder.span.clone()]);
            }
        }
        ListFormat::Json => {
            let json = serde_json::to_string_pretty(&placeholders)?;
            println!("{json}");
        }
    }
    Ok(())
}

fn write_output(output: Option<&Path>, text: &str) -> Result<()> {
    if let Some(output_path) = output {
        info!("Writing output to {}", output_path.display());
        std::fs::write(output_path, text)?;
    } else {
        print!("{text}");
        io::stdout().flush()?;
    }
    Ok(())
}
