mod cli;
mod config;
mod csv_out;
mod errors;
mod extract;
mod fetch;
mod heuristics;
mod json_out;
mod model;
mod pipeline;

use crate::cli::OutputFormat;
use crate::errors::AppError;
use crate::model::StationSnapshot;
use chrono::{FixedOffset, Utc};
use chrono_tz::Tz;
use env_logger::Env;
use log::{info, warn};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

fn setup_logging(level: &str) {
    let env = Env::default().filter_or("RUST_LOG", match level {
        "essential" => "info",
        "debug" => "debug",
        "trace" => "trace",
        "warn" => "warn",
        "error" => "error",
        _ => "info",
    });
    env_logger::Builder::from_env(env).init();
}

fn compute_tz_offset(args_tz: &Option<String>) -> Option<FixedOffset> {
    if let Some(tzname) = args_tz.as_ref() {
        match tzname.parse::<Tz>() {
            Ok(tz) => {
                let now_utc = Utc::now();
                let now_tz = now_utc.with_timezone(&tz);
                let seconds = (now_tz.naive_local() - now_tz.naive_utc()).num_seconds();
                FixedOffset::east_opt(seconds as i32)
            }
            Err(_) => {
                warn!("Timezone parse failed; falling back to UTC");
                None
            }
        }
    } else {
        None
    }
}

fn open_out(out: Option<&Path>) -> Result<Box<dyn Write>, AppError> {
    match out {
        Some(p) => {
            let f = File::create(p)
                .map_err(|e| AppError::IO(format!("open out '{}': {}", p.display(), e)))?;
            Ok(Box::new(BufWriter::new(f)))
        }
        None => Ok(Box::new(io::stdout().lock())),
    }
}

fn emit(snaps: &[StationSnapshot], format: OutputFormat, out: Option<&Path>) -> Result<(), AppError> {
    let records = pipeline::flatten(snaps);
    pipeline::log_status_distribution(&records);

    let w = open_out(out)?;
    match format {
        OutputFormat::Json => json_out::write_json(w, &records),
        OutputFormat::Snapshot => json_out::write_json(w, snaps),
        OutputFormat::Csv => csv_out::write_csv(&records, w),
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), AppError> {
    let args = cli::parse_cli();
    setup_logging(&args.log_level);

    let format: OutputFormat = args.format.parse()?;
    let cfg = cli::resolve_config(&args)?;
    let tz_offset = compute_tz_offset(&args.tz);
    info!("Starting: {} enabled stations", cfg.enabled().count());

    if !args.watch {
        let snaps = pipeline::run_all(&cfg, tz_offset).await?;
        emit(&snaps, format, args.out.as_deref())?;
        info!("Done.");
        return Ok(());
    }

    let mut ticker = tokio::time::interval(cfg.refresh_interval());
    let mut tracker = pipeline::ChangeTracker::default();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let snaps = pipeline::run_all(&cfg, tz_offset).await?;
                for snap in &snaps {
                    if let Some(changes) = tracker.observe(snap) {
                        pipeline::log_changes(&snap.id, &changes);
                    }
                }
                emit(&snaps, format, args.out.as_deref())?;
            }
            _ = &mut ctrl_c => {
                info!("Interrupted; stopping.");
                break;
            }
        }
    }
    Ok(())
}
