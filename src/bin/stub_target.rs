//! Scriptable stand-in for the gatekeeper and health-monitor services.
//!
//! Speaks the same stdin/stdout protocol as the real targets, with knobs for
//! the failure modes the harness has to survive.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin, Stdout};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Mode {
    Gatekeeper,
    Monitor,
}

#[derive(Parser, Debug)]
#[command(name = "stub_target")]
#[command(about = "Stub gatekeeper / health monitor for harness testing", long_about = None)]
struct Args {
    #[arg(long, value_enum, default_value = "gatekeeper")]
    mode: Mode,

    /// Print a startup banner after the handshake
    #[arg(long)]
    banner: bool,

    /// Deny exactly the N-th request (1-based), regardless of quota
    #[arg(long)]
    deny_at: Option<u64>,

    /// Unrelated lines printed before every answer
    #[arg(long, default_value = "0")]
    noise_lines: usize,

    /// Read commands but never answer
    #[arg(long)]
    silent: bool,

    /// Exit after answering N requests
    #[arg(long)]
    exit_after: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the protocol, so diagnostics go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let args = Args::parse();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    match args.mode {
        Mode::Gatekeeper => run_gatekeeper(&args, &mut lines, &mut stdout).await,
        Mode::Monitor => run_monitor(&mut lines, &mut stdout).await,
    }
}

async fn read_param(lines: &mut Lines<BufReader<Stdin>>, name: &str) -> Result<String> {
    let line = lines
        .next_line()
        .await?
        .with_context(|| format!("stdin closed before {}", name))?;
    Ok(line.trim().to_string())
}

async fn emit(stdout: &mut Stdout, line: &str) -> Result<()> {
    stdout.write_all(line.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    Ok(())
}

async fn run_gatekeeper(
    args: &Args,
    lines: &mut Lines<BufReader<Stdin>>,
    stdout: &mut Stdout,
) -> Result<()> {
    let max_requests: u64 = read_param(lines, "max requests").await?.parse()?;
    let window = Duration::from_secs(read_param(lines, "time window").await?.parse()?);
    tracing::info!("gatekeeper stub: {} requests per {:?}", max_requests, window);

    if args.banner {
        emit(
            stdout,
            &format!(
                "Gatekeeper ready: {} requests per {}s",
                max_requests,
                window.as_secs()
            ),
        )
        .await?;
        stdout.flush().await?;
    }

    let mut windows: HashMap<String, (Instant, u64)> = HashMap::new();
    let mut served = 0u64;

    while let Some(line) = lines.next_line().await? {
        let Some(user) = line.trim().strip_prefix("check ") else {
            emit(stdout, &format!("Unknown command: {}", line.trim())).await?;
            stdout.flush().await?;
            continue;
        };
        if args.silent {
            continue;
        }

        served += 1;
        let entry = windows
            .entry(user.to_string())
            .or_insert_with(|| (Instant::now(), 0));
        if entry.0.elapsed() >= window {
            *entry = (Instant::now(), 0);
        }
        entry.1 += 1;
        let allowed = entry.1 <= max_requests && args.deny_at != Some(served);

        for step in 0..args.noise_lines {
            emit(stdout, &format!("[debug] evaluating {} step {}", user, step)).await?;
        }
        if allowed {
            emit(stdout, &format!("Request allowed for {}", user)).await?;
        } else {
            emit(stdout, &format!("Rate limit exceeded for {}", user)).await?;
        }
        stdout.flush().await?;

        if args.exit_after == Some(served) {
            tracing::info!("exiting after {} requests", served);
            break;
        }
    }

    Ok(())
}

async fn run_monitor(lines: &mut Lines<BufReader<Stdin>>, stdout: &mut Stdout) -> Result<()> {
    let threshold: f64 = read_param(lines, "threshold").await?.parse()?;
    let log_file = PathBuf::from(read_param(lines, "log file").await?);
    let interval_secs: u64 = read_param(lines, "poll interval").await?.parse()?;
    let key = std::env::var("MONITOR_KEY").context("MONITOR_KEY not set")?;

    let mut log = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(&log_file)
        .with_context(|| format!("cannot open {}", log_file.display()))?;
    writeln!(log, "monitor started (key length {})", key.len())?;

    emit(
        stdout,
        &format!(
            "Monitoring started (threshold {}, every {}s)",
            threshold, interval_secs
        ),
    )
    .await?;
    stdout.flush().await?;

    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    ticker.tick().await;
    let mut polls = 0u64;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                polls += 1;
                emit(stdout, &format!("poll {}: system healthy", polls)).await?;
                stdout.flush().await?;
            }
            line = lines.next_line() => {
                if line?.is_none() {
                    break;
                }
            }
        }
    }

    Ok(())
}
