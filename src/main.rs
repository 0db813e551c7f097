//! echo-probe: A TCP echo server soak tester
//!
//! Repeatedly sends a 32-bit probe to an echo server and verifies that the
//! expected block of echoed records comes back intact.
//!
//! Features:
//! - Record reassembly across arbitrarily chunked reads
//! - Per-record integrity check against the current probe
//! - Stall detection with soft and hard receive thresholds
//! - Periodic and running-average throughput reporting
//! - Configuration via CLI arguments or TOML file

mod config;
mod fault;
mod protocols;
mod runtime;

use config::Config;
use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::info;
use tracing_subscriber::EnvFilter;

const PROG_NAME: &str = env!("CARGO_PKG_NAME");

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    println!("{PROG_NAME}:  Version {}", env!("CARGO_PKG_VERSION"));
    println!(
        "\n{PROG_NAME}: TCP Server IP {}, Port {}",
        config.server, config.port
    );
    info!(
        server = %config.server,
        port = config.port,
        block_count = config.block_count,
        block_bytes = config.expected_block_bytes(),
        hard_timeout_ms = config.hard_timeout.as_millis() as u64,
        "Starting echo-probe"
    );

    let cancel = Arc::new(AtomicBool::new(false));
    spawn_exit_watcher(Arc::clone(&cancel))?;

    let summary = runtime::run(&config, cancel, |sample| {
        println!("{sample}");
        info!(
            phase_ms = sample.phase_ms,
            rate = ?sample.current_rate(),
            average = ?sample.average_rate(),
            "Throughput sample"
        );
    });

    println!("{PROG_NAME}: {}", summary.fault);
    info!(
        passes = summary.passes,
        last_probe = summary.last_probe,
        total_bytes = summary.total_bytes,
        total_elapsed_ms = summary.total_elapsed_ms,
        "Program exit"
    );
    println!("{PROG_NAME}: Program exit");

    if summary.fault.is_user_cancel() {
        Ok(())
    } else {
        Err(summary.fault.into())
    }
}

/// Watch stdin for an exit key and raise `flag` when one arrives.
fn spawn_exit_watcher(flag: Arc<AtomicBool>) -> io::Result<()> {
    thread::Builder::new()
        .name("exit-watcher".to_string())
        .spawn(move || {
            for byte in io::stdin().lock().bytes() {
                match byte {
                    Ok(b) if runtime::is_exit_key(b) => {
                        flag.store(true, Ordering::Relaxed);
                        break;
                    }
                    Ok(_) => {}
                    Err(_) => break,
                }
            }
        })?;
    Ok(())
}
