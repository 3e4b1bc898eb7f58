//! httsleep CLI
//!
//! Polls a URL until the response matches, then prints the body.
//!
//! Usage:
//!   httsleep <url> [--status CODE] [--jsonpath EXPR=VALUE]... [OPTIONS]
//!   httsleep --config poll.yaml
//!
//! Exit codes: 0 success, 1 alarm, 2 retries exhausted, 3 error, 130 interrupted.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use httsleep::request::parse_header_line;
use httsleep::{Auth, Outcome, PollConfig, PollError, TransportErrorKind};
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

const EXIT_ALARM: u8 = 1;
const EXIT_RETRIES_EXHAUSTED: u8 = 2;
const EXIT_ERROR: u8 = 3;
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// Poll an HTTP endpoint until a condition is met
#[derive(Parser, Debug)]
#[command(name = "httsleep")]
#[command(
    author,
    version,
    about = "Poll an HTTP endpoint until a success condition is met or an alarm fires"
)]
struct Args {
    /// URL to poll (overrides `url` from --config)
    url: Option<String>,

    /// YAML or JSON poll configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HTTP method
    #[arg(short = 'X', long)]
    method: Option<String>,

    /// Request header, `Name: value` (repeatable)
    #[arg(short = 'H', long = "header", value_name = "HEADER")]
    headers: Vec<String>,

    /// Basic auth credentials, `user[:password]`
    #[arg(short, long)]
    user: Option<String>,

    /// Bearer token
    #[arg(long, conflicts_with = "user")]
    bearer: Option<String>,

    /// Request body
    #[arg(short, long)]
    data: Option<String>,

    /// Succeed on this status code
    #[arg(long)]
    status: Option<String>,

    /// Succeed when the body equals this text
    #[arg(long)]
    text: Option<String>,

    /// Succeed when the body equals this JSON document
    #[arg(long)]
    json: Option<String>,

    /// Succeed when a JSONPath query yields a value, `EXPR=VALUE` (repeatable)
    #[arg(long, value_name = "EXPR=VALUE")]
    jsonpath: Vec<String>,

    /// Fail on this status code
    #[arg(long)]
    alarm_status: Option<String>,

    /// Fail when the body equals this text
    #[arg(long)]
    alarm_text: Option<String>,

    /// Fail when the body equals this JSON document
    #[arg(long)]
    alarm_json: Option<String>,

    /// Fail when a JSONPath query yields a value, `EXPR=VALUE` (repeatable)
    #[arg(long, value_name = "EXPR=VALUE")]
    alarm_jsonpath: Vec<String>,

    /// Seconds between attempts
    #[arg(short, long)]
    interval: Option<u64>,

    /// Retries after the first attempt
    #[arg(short = 'r', long)]
    max_retries: Option<u32>,

    /// Retry forever
    #[arg(long, conflicts_with = "max_retries")]
    unlimited: bool,

    /// Transport error kinds to retry through, e.g. `connect,timeout`
    #[arg(long, value_delimiter = ',')]
    ignore: Vec<TransportErrorKind>,

    /// Skip TLS certificate verification
    #[arg(short = 'k', long)]
    insecure: bool,

    /// Request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Don't print the response body
    #[arg(short, long)]
    quiet: bool,

    /// Show progress notices (same as --log-level info)
    #[arg(short, long)]
    verbose: bool,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "error")]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(&args);

    match run(&args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(EXIT_ERROR)
        }
    }
}

fn init_tracing(args: &Args) {
    let level = if args.verbose {
        "info"
    } else {
        args.log_level.as_str()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    match args.log_format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Text => subscriber.init(),
    }
}

async fn run(args: &Args) -> Result<ExitCode> {
    let config = load_config(args)?;

    let token = CancellationToken::new();
    let poller = config.builder()?.cancel_token(token.clone()).build()?;

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });

    match poller.outcome().await? {
        Outcome::Success(response) => {
            if !args.quiet {
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(response.bytes())?;
                if !response.bytes().ends_with(b"\n") {
                    stdout.write_all(b"\n")?;
                }
                stdout.flush()?;
            }
            Ok(ExitCode::SUCCESS)
        }
        Outcome::AlarmTriggered(alarm) => {
            eprintln!("{alarm}");
            if !args.quiet {
                eprintln!("{}", alarm.response.text());
            }
            Ok(ExitCode::from(EXIT_ALARM))
        }
        Outcome::RetriesExhausted { attempts } => {
            eprintln!("{}", PollError::RetriesExhausted { attempts });
            Ok(ExitCode::from(EXIT_RETRIES_EXHAUSTED))
        }
        Outcome::Cancelled => {
            eprintln!("{}", PollError::Cancelled);
            Ok(ExitCode::from(EXIT_INTERRUPTED))
        }
    }
}

/// Merge the config file (if any) with the command-line flags. Flags win.
fn load_config(args: &Args) -> Result<PollConfig> {
    let mut config = match &args.config {
        Some(path) => PollConfig::from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => PollConfig::default(),
    };

    if let Some(url) = &args.url {
        config.url = Some(url.clone());
    }
    if config.url.is_none() {
        bail!("No URL given; pass one as an argument or set `url` in the config file");
    }
    if let Some(method) = &args.method {
        config.method = Some(method.clone());
    }
    for line in &args.headers {
        let (name, value) = parse_header_line(line)?;
        config.headers.insert(name, value);
    }
    if let Some(user) = &args.user {
        config.auth = Some(Auth::parse_basic(user));
    }
    if let Some(token) = &args.bearer {
        config.auth = Some(Auth::bearer(token));
    }
    if let Some(data) = &args.data {
        config.body = Some(data.clone());
    }

    if let Some(until) = criterion_from_flags(
        args.status.as_deref(),
        args.text.as_deref(),
        args.json.as_deref(),
        &args.jsonpath,
    )? {
        config.until = until;
    }
    if let Some(alarm) = criterion_from_flags(
        args.alarm_status.as_deref(),
        args.alarm_text.as_deref(),
        args.alarm_json.as_deref(),
        &args.alarm_jsonpath,
    )? {
        config.alarms = match config.alarms.take() {
            Value::Null => alarm,
            Value::Array(mut alarms) => {
                alarms.push(alarm);
                Value::Array(alarms)
            }
            existing => json!([existing, alarm]),
        };
    }

    if let Some(interval) = args.interval {
        config.polling_interval = Some(interval);
    }
    if args.unlimited {
        config.max_retries = None;
    } else if let Some(max_retries) = args.max_retries {
        config.max_retries = Some(max_retries);
    }
    config.ignore_exceptions.extend(args.ignore.iter().copied());
    if args.insecure {
        config.verify = Some(false);
    }
    if let Some(timeout) = args.timeout {
        config.timeout = Some(timeout);
    }

    config.validate_conditions()?;
    Ok(config)
}

/// Raw criterion object from one group of flags, `None` if none were given.
fn criterion_from_flags(
    status: Option<&str>,
    text: Option<&str>,
    json: Option<&str>,
    jsonpath: &[String],
) -> Result<Option<Value>> {
    let mut criterion = Map::new();
    if let Some(status) = status {
        criterion.insert("status_code".into(), Value::String(status.to_string()));
    }
    if let Some(text) = text {
        criterion.insert("text".into(), Value::String(text.to_string()));
    }
    if let Some(raw) = json {
        let document: Value = serde_json::from_str(raw)
            .with_context(|| format!("Invalid JSON document '{raw}'"))?;
        criterion.insert("json".into(), document);
    }
    if !jsonpath.is_empty() {
        let checks = jsonpath
            .iter()
            .map(|arg| parse_jsonpath_arg(arg))
            .collect::<Result<Vec<_>>>()?;
        criterion.insert("jsonpath".into(), Value::Array(checks));
    }
    Ok((!criterion.is_empty()).then_some(Value::Object(criterion)))
}

/// `EXPR=VALUE`; VALUE is read as JSON, falling back to a plain string.
fn parse_jsonpath_arg(arg: &str) -> Result<Value> {
    let Some((expression, raw)) = arg.rsplit_once('=') else {
        bail!("Expected EXPR=VALUE, got '{arg}'");
    };
    if expression.trim().is_empty() {
        bail!("Missing JSONPath expression in '{arg}'");
    }
    let value =
        serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok(json!({ "expression": expression.trim(), "value": value }))
}
