mod capture;
mod export;
mod session;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use session::SessionLog;

/// wstap — live traffic logger for a WebSocket service port
#[derive(Parser)]
#[command(name = "wstap", version, about)]
struct Cli {
    /// Interface to capture on (default: first available device)
    #[arg(short, long)]
    interface: Option<String>,

    /// Service port to monitor
    #[arg(short, long, default_value_t = 3001)]
    port: u16,

    /// Custom BPF filter (default: "tcp port <port> or udp port <port>")
    #[arg(long)]
    filter: Option<String>,

    /// JSON export path
    #[arg(long, default_value = "packets.json")]
    json: PathBuf,

    /// CSV export path
    #[arg(long, default_value = "packets.csv")]
    csv: PathBuf,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| level.into()))
        .init();

    let device = match cli.interface {
        Some(name) => name,
        None => pcap::Device::lookup()
            .context("Failed to look up a capture device")?
            .context("No capture device available")?
            .name,
    };

    let filter = cli
        .filter
        .unwrap_or_else(|| format!("tcp port {0} or udp port {0}", cli.port));

    println!("Starting packet capture on TCP/UDP port {}...", cli.port);

    let cap = capture::open_capture(&device, &filter)?;

    // Ctrl-C flips the flag; both loops check it between iterations
    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))
            .context("Failed to install Ctrl-C handler")?;
    }

    let (tx, rx) = mpsc::channel();

    let capture_running = Arc::clone(&running);
    let capture_handle = thread::Builder::new()
        .name("capture".into())
        .spawn(move || {
            if let Err(e) = capture::capture_loop(cap, tx, capture_running) {
                tracing::error!("capture thread error: {e}");
            }
        })
        .context("Failed to spawn capture thread")?;

    // All session appends happen here, on the main thread
    let mut session = SessionLog::new();
    session::logger_loop(rx, &mut session, cli.port, Arc::clone(&running));

    running.store(false, Ordering::SeqCst);
    let _ = capture_handle.join();

    println!("\nCapture stopped. Exporting logs...");

    export::export_json(&session, &cli.json)
        .with_context(|| format!("Failed to write {}", cli.json.display()))?;
    export::export_csv(&session, &cli.csv)
        .with_context(|| format!("Failed to write {}", cli.csv.display()))?;

    println!(
        "Exported {} records to {} and {}",
        session.len(),
        cli.json.display(),
        cli.csv.display()
    );

    Ok(())
}
