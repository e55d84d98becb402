use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::{Args, Parser, Subcommand};
use records::{EventRecord, RequestType};
use serde::Serialize;
use tracestore::config::{DEFAULT_DATA_DIR, DEFAULT_FETCH_LIMIT, DEFAULT_MAX_TRACE_BYTES, DEFAULT_SECRET_FILE};
use tracestore::{
    ConfigError, FixedUsage, QueryResult, RequestSample, SecretSource, StoreConfig, StoreError, TraceContext,
};

const DEFAULT_WINDOW_SECS: f64 = 86_400.0;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("trace store: {0}")]
    Store(#[from] StoreError),
    #[error("invalid window: from {from} is after to {to}")]
    InvalidWindow { from: f64, to: f64 },
    #[error("--{name} must be a finite number of seconds, got {value}")]
    NonFiniteTime { name: &'static str, value: f64 },
    #[error("refusing to delete {0}; pass --yes to confirm")]
    ConfirmationRequired(PathBuf),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("health check failed: HTTP {0}")]
    HealthCheck(u16),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "loadgraph-cli", about = "Inspect and maintain a loadgraph trace log")]
struct Cli {
    #[arg(long, env = "LOADGRAPH_DATA_DIR", default_value = DEFAULT_DATA_DIR)]
    data_dir: PathBuf,

    #[arg(long, env = "LOADGRAPH_SECRET", hide_env_values = true)]
    secret: Option<String>,

    #[arg(long, env = "LOADGRAPH_SECRET_FILE", default_value = DEFAULT_SECRET_FILE)]
    secret_file: PathBuf,

    #[arg(long, env = "LOADGRAPH_MAX_TRACE_BYTES", default_value_t = DEFAULT_MAX_TRACE_BYTES)]
    max_trace_bytes: u64,

    #[arg(long, env = "LOADGRAPH_FETCH_LIMIT", default_value_t = DEFAULT_FETCH_LIMIT)]
    fetch_limit: usize,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn store_config(&self) -> StoreConfig {
        let secret = match &self.secret {
            Some(secret) if !secret.trim().is_empty() => SecretSource::Inline(secret.clone()),
            _ => SecretSource::File(self.secret_file.clone()),
        };
        StoreConfig {
            data_dir: self.data_dir.clone(),
            secret,
            max_trace_bytes: self.max_trace_bytes,
            fetch_limit: self.fetch_limit,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the data directory, marker files and empty log.
    Init,
    /// Delete the data directory and everything in it.
    Teardown {
        #[arg(long, default_value_t = false)]
        yes: bool,
    },
    /// Append one record by hand.
    Record(RecordArgs),
    /// Print the records in a window.
    Query {
        #[command(flatten)]
        window: WindowArgs,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Print the packed timeline payload for a window as JSON.
    Timeline {
        #[command(flatten)]
        window: WindowArgs,
        #[arg(long, default_value_t = false, help = "Single-line JSON")]
        compact: bool,
    },
    /// Trim the log if it exceeds its maximum size.
    Rotate {
        #[arg(long, help = "Override the configured maximum size")]
        max_bytes: Option<u64>,
    },
    /// Show the log path and size.
    Status,
    /// Check that a running host service answers its health probe.
    Ping {
        #[arg(long, env = "LOADGRAPH_BASE_URL", default_value = "http://127.0.0.1:3000")]
        base_url: String,
    },
}

#[derive(Args, Debug)]
struct WindowArgs {
    #[arg(long, help = "Window start, Unix seconds (default: 24h before --to)")]
    from: Option<f64>,
    #[arg(long, help = "Window end, Unix seconds (default: now)")]
    to: Option<f64>,
}

impl WindowArgs {
    fn resolve(&self, now: f64) -> Result<(f64, f64), CliError> {
        let to = self.to.unwrap_or(now);
        let from = self.from.unwrap_or(to - DEFAULT_WINDOW_SECS);
        finite("from", from)?;
        finite("to", to)?;
        if from > to {
            return Err(CliError::InvalidWindow { from, to });
        }
        Ok((from, to))
    }
}

#[derive(Args, Debug)]
struct RecordArgs {
    #[arg(long)]
    session: String,
    #[arg(long, help = "Start time, Unix seconds (default: now)")]
    start: Option<f64>,
    #[arg(long, help = "End time, Unix seconds (default: start)")]
    end: Option<f64>,
    #[arg(long = "type", value_parser = parse_request_type, default_value = "page")]
    request_type: RequestType,
    #[arg(long, default_value = "/")]
    path: String,
    #[arg(long, default_value_t = false)]
    error: bool,
    #[arg(long, default_value_t = 0)]
    memory_mb: u64,
    #[arg(long, default_value_t = 0)]
    queries: u64,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    if let Command::Ping { base_url } = &cli.command {
        return run_ping(base_url).await;
    }

    let ctx = TraceContext::open(cli.store_config())?;
    match cli.command {
        Command::Init => {
            ctx.store().initialize()?;
            println!("{}", ctx.store().path().display());
            Ok(())
        }
        Command::Teardown { yes } => run_teardown(&ctx, yes),
        Command::Record(args) => run_record(&ctx, args),
        Command::Query { window, json } => run_query(&ctx, &window, json),
        Command::Timeline { window, compact } => run_timeline(&ctx, &window, compact),
        Command::Rotate { max_bytes } => {
            let outcome = match max_bytes {
                Some(max) => ctx.store().rotate(max)?,
                None => ctx.rotate_if_needed()?,
            };
            print_json(&outcome)
        }
        Command::Status => print_json(&ctx.store().status()?),
        Command::Ping { .. } => Ok(()),
    }
}

fn run_teardown(ctx: &TraceContext, yes: bool) -> Result<(), CliError> {
    if !yes {
        return Err(CliError::ConfirmationRequired(ctx.store().dir().to_path_buf()));
    }
    ctx.store().teardown()?;
    eprintln!("removed {}", ctx.store().dir().display());
    Ok(())
}

fn run_record(ctx: &TraceContext, args: RecordArgs) -> Result<(), CliError> {
    let start_time = finite("start", args.start.unwrap_or_else(now_secs))?;
    let end_time = finite("end", args.end.unwrap_or(start_time))?;
    let sample = RequestSample {
        session: args.session,
        start_time,
        end_time,
        request_type: args.request_type,
        path: args.path,
        had_fatal_error: args.error,
    };
    let usage = FixedUsage { peak_memory_mb: args.memory_mb, db_query_count: args.queries };
    let record = ctx.store().record(sample, &usage)?;
    print_json(&record)
}

fn run_query(ctx: &TraceContext, window: &WindowArgs, json: bool) -> Result<(), CliError> {
    let (from, to) = window.resolve(now_secs())?;
    let result = ctx.query_window(from, to)?;
    if json {
        return print_json(&result);
    }
    for record in &result.records {
        println!("{}", format_record(record));
    }
    report_truncation(&result);
    Ok(())
}

fn run_timeline(ctx: &TraceContext, window: &WindowArgs, compact: bool) -> Result<(), CliError> {
    let (from, to) = window.resolve(now_secs())?;
    let result = ctx.query_window(from, to)?;
    report_truncation(&result);
    let payload = timeline::build_timeline(&result.records, to, result.truncated);
    if compact {
        println!("{}", timeline::to_json(&payload)?);
        return Ok(());
    }
    print_json(&payload)
}

async fn run_ping(base_url: &str) -> Result<(), CliError> {
    let url = format!("{}/healthz", base_url.trim_end_matches('/'));
    let response = reqwest::get(url).await?;
    let status = response.status();
    if !status.is_success() {
        return Err(CliError::HealthCheck(status.as_u16()));
    }
    println!("ok");
    Ok(())
}

fn report_truncation(result: &QueryResult) {
    if result.truncated {
        eprintln!("warning: fetch limit reached after {} records; narrow the window", result.records.len());
    }
}

fn format_record(record: &EventRecord) -> String {
    format!(
        "{start:.3}\t{duration:>8.3}s\t{kind:<6}\t{mem:>4}MB\t{db:>4}q\t{session}\t{path}{error}",
        start = record.start_time,
        duration = record.duration(),
        kind = record.request_type.name(),
        mem = record.peak_memory_mb,
        db = record.db_query_count,
        session = record.session,
        path = record.path,
        error = if record.had_fatal_error { "\t[error]" } else { "" },
    )
}

fn parse_request_type(raw: &str) -> Result<RequestType, String> {
    RequestType::ALL
        .into_iter()
        .find(|kind| kind.name().eq_ignore_ascii_case(raw.trim()))
        .ok_or_else(|| {
            let names = RequestType::ALL.map(RequestType::name).join(", ");
            format!("unknown request type `{raw}` (expected one of: {names})")
        })
}

fn finite(name: &'static str, value: f64) -> Result<f64, CliError> {
    if value.is_finite() { Ok(value) } else { Err(CliError::NonFiniteTime { name, value }) }
}

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0.0, |d| d.as_secs_f64())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
