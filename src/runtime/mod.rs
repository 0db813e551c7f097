//! Streaming receive, validation and timing engine.
//!
//! - `Session`: the connected non-blocking stream
//! - `Reassembler`: records from arbitrarily chunked reads
//! - `TimeoutMonitor`: soft and hard stall thresholds per phase
//! - `ThroughputAccumulator`: phase and cumulative rates
//! - `Driver`: the send probe / receive block / report loop

pub mod cancel;
pub mod driver;
pub mod reassembler;
pub mod session;
pub mod throughput;
pub mod timeout;

pub use cancel::{is_exit_key, CancelSignal};
pub use driver::{Driver, DriverSettings};
pub use session::Session;
pub use throughput::ThroughputSample;

use crate::config::Config;
use crate::fault::Fault;
use tracing::{info, warn};

/// Result of one complete run.
#[derive(Debug)]
pub struct RunSummary {
    /// Why the run stopped.
    pub fault: Fault,
    /// Phases completed without a fault.
    pub passes: u64,
    /// Last probe value sent, or the seed if none was sent.
    pub last_probe: u32,
    pub total_bytes: u64,
    /// Receive time summed over completed phases.
    pub total_elapsed_ms: u64,
}

/// Connect to the configured echo server and run the test loop until a
/// fault stops it.
///
/// Each throughput sample is handed to `report` as it is produced. A
/// failed connect ends the run immediately; it is never retried.
pub fn run<C, F>(config: &Config, cancel: C, report: F) -> RunSummary
where
    C: CancelSignal,
    F: FnMut(&ThroughputSample),
{
    let session = match Session::connect(
        &config.server,
        config.port,
        config.expected_block_bytes(),
        config.connect_timeout,
    ) {
        Ok(session) => session,
        Err(e) => {
            warn!(server = %config.server, port = config.port, error = %e, "Connect failed");
            return RunSummary {
                fault: e.into(),
                passes: 0,
                last_probe: config.initial_seed,
                total_bytes: 0,
                total_elapsed_ms: 0,
            };
        }
    };

    info!(
        peer = %session.peer_addr(),
        local = ?session.local_addr().ok(),
        recv_buffer = ?session.recv_buffer_size(),
        "Session established"
    );

    let outcome = Driver::new(session, cancel, DriverSettings::from_config(config)).run(report);
    outcome.transport.close();

    info!(
        passes = outcome.passes,
        total_bytes = outcome.throughput.total_bytes(),
        last_rate = ?outcome.throughput.current_rate_bytes_per_sec(),
        average = ?outcome.throughput.average_rate_bytes_per_sec(),
        "Run finished"
    );

    RunSummary {
        fault: outcome.fault,
        passes: outcome.passes,
        last_probe: outcome.last_probe,
        total_bytes: outcome.throughput.total_bytes(),
        total_elapsed_ms: outcome.throughput.total_ms(),
    }
}
