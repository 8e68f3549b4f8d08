mod dates;
mod fetch;
mod parser;
mod settings;

use std::io::Write;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Local;
use clap::error::ErrorKind;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info, warn};

use fetch::{FetchError, ScheduleClient};
use parser::extract::Extractor;
use parser::record::ProgrammeRecord;
use settings::Settings;

const EXIT_USAGE: u8 = 1;
const EXIT_BAD_NUMBER: u8 = 2;
const EXIT_NETWORK: u8 = 3;
const EXIT_NOT_FETCHED: u8 = 4;

/// Get the BBC schedule, with PIDs and dates, for today and optional extra
/// days. A PID seen on several days is listed once, at its earliest date.
/// Output is oldest first.
#[derive(Parser, Debug)]
#[command(name = "getpids", version)]
struct Cli {
    /// Station, e.g. bbcone, bbctwo, radio4, 6music
    station: String,
    /// Region or service variant (yorkshire, hd, fm, lw); '' for none
    region: String,
    /// Number of days before today to include
    #[arg(default_value_t = 0)]
    extra_days: u32,
    /// Print records as JSON lines
    #[arg(long)]
    json: bool,
    /// Seconds to wait between page fetches
    #[arg(long, value_name = "SECS")]
    delay: Option<u64>,
    /// Schedule site root
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(usage_exit_code(e.kind()));
        }
    };

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let t0 = Instant::now();

    if looks_numeric(&cli.region) {
        warn!("{}: doesn't look like a region", cli.region);
    }

    let mut settings = Settings::load()?;
    if let Some(delay) = cli.delay {
        settings.delay_secs = delay;
    }
    if let Some(base_url) = cli.base_url {
        settings.base_url = base_url;
    }
    let client = ScheduleClient::new(&settings)?;

    let plan = dates::plan(Local::now().date_naive(), cli.extra_days);
    let mut extractor = Extractor::new();
    let pb = progress_bar(plan.len())?;

    for (i, date) in plan.iter().enumerate() {
        let is_last = i + 1 == plan.len();
        let label = dates::label(*date);
        pb.set_message(label.clone());

        match client.fetch(&cli.station, &cli.region, &label).await {
            Ok(markup) => {
                let records = parser::extract_document(&mut extractor, &label, &markup);
                pb.suspend(|| print_records(&records, cli.json))?;
            }
            Err(e) => {
                if let Some(code) = on_fetch_error(&e, is_last) {
                    pb.finish_and_clear();
                    error!(status = ?e.status(), "{}", e);
                    return Ok(ExitCode::from(code));
                }
                pb.suspend(|| warn!(status = ?e.status(), "{} (continuing without it)", e));
            }
        }
        pb.inc(1);

        if !is_last {
            tokio::time::sleep(settings.delay()).await;
        }
    }

    pb.finish_and_clear();
    info!(
        pages = plan.len(),
        programmes = extractor.seen_count(),
        "Done in {}",
        format_duration(t0.elapsed())
    );
    Ok(ExitCode::SUCCESS)
}

fn print_records(records: &[ProgrammeRecord], json: bool) -> Result<()> {
    let mut out = std::io::stdout().lock();
    for r in records {
        if json {
            serde_json::to_writer(&mut out, r)?;
            writeln!(out)?;
        } else {
            writeln!(out, "{}", r)?;
        }
    }
    out.flush()?;
    Ok(())
}

fn progress_bar(len: usize) -> Result<ProgressBar> {
    if len < 2 {
        return Ok(ProgressBar::hidden());
    }
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:30} {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );
    Ok(pb)
}

/// A region made only of digits is almost certainly a misplaced day count.
fn looks_numeric(region: &str) -> bool {
    !region.is_empty() && region.chars().all(|c| c.is_ascii_digit())
}

fn usage_exit_code(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
        ErrorKind::InvalidValue | ErrorKind::ValueValidation => EXIT_BAD_NUMBER,
        _ => EXIT_USAGE,
    }
}

/// A failed page is skipped unless it is the last one planned, which ends the
/// run with the returned exit code.
fn on_fetch_error(err: &FetchError, is_last: bool) -> Option<u8> {
    if !is_last {
        return None;
    }
    Some(match err {
        FetchError::Network { .. } => EXIT_NETWORK,
        FetchError::Status { .. } => EXIT_NOT_FETCHED,
    })
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else {
        format!("{}m {}s", secs / 60, secs % 60)
    }
}
