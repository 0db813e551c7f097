//! Test loop driver.
//!
//! One cycle sends the next probe, receives and validates the echoed
//! block, then records throughput:
//!
//! ```text
//! Connected -> { SendProbe -> ReceivePhase -> Report }* -> Terminated
//! ```
//!
//! There is no successful exit. The loop runs until a fault stops it,
//! which includes the user asking it to stop. `Driver::run` consumes the
//! driver, so the terminated state is the returned `DriverOutcome`.

use crate::config::Config;
use crate::fault::Fault;
use crate::protocols::echo::{self, RECORD_LEN};
use crate::runtime::cancel::CancelSignal;
use crate::runtime::reassembler::Reassembler;
use crate::runtime::session::{Received, Transport};
use crate::runtime::throughput::{ThroughputAccumulator, ThroughputSample};
use crate::runtime::timeout::{TimeoutConfig, TimeoutMonitor, TimeoutStatus};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Parameters of the test loop.
#[derive(Debug, Clone)]
pub struct DriverSettings {
    /// Bytes echoed back per probe.
    pub expected_bytes: usize,
    /// Upper bound on bytes requested per receive.
    pub read_chunk: usize,
    pub timeouts: TimeoutConfig,
    /// Longest pause after a receive that would block.
    pub poll_interval: Duration,
    /// Emit a throughput sample every N phases.
    pub report_interval: u64,
    /// The first probe sent is `initial_seed + 1`.
    pub initial_seed: u32,
}

impl DriverSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            expected_bytes: config.expected_block_bytes(),
            read_chunk: config.read_chunk,
            timeouts: TimeoutConfig {
                soft: config.soft_timeout,
                hard: config.hard_timeout,
            },
            poll_interval: config.poll_interval,
            report_interval: config.report_interval,
            initial_seed: config.initial_seed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Connected,
    SendProbe,
    ReceivePhase,
    Report,
}

/// A receive phase that got the whole expected block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PhaseOutcome {
    bytes: usize,
    elapsed: Duration,
}

/// What is left when the driver stops.
pub struct DriverOutcome<T> {
    pub fault: Fault,
    /// The transport, returned for teardown.
    pub transport: T,
    /// Phases completed without a fault.
    pub passes: u64,
    /// Last probe value sent.
    pub last_probe: u32,
    pub throughput: ThroughputAccumulator,
}

/// Owns the transport for the life of a run.
pub struct Driver<T, C> {
    transport: T,
    cancel: C,
    settings: DriverSettings,
    state: DriverState,
    probe: u32,
    pass: u64,
    reassembler: Reassembler,
    monitor: TimeoutMonitor,
    throughput: ThroughputAccumulator,
    recv_buf: Vec<u8>,
}

impl<T: Transport, C: CancelSignal> Driver<T, C> {
    pub fn new(transport: T, cancel: C, settings: DriverSettings) -> Self {
        let recv_buf = vec![0u8; settings.read_chunk.max(RECORD_LEN)];
        let monitor = TimeoutMonitor::new(settings.timeouts);
        Self {
            transport,
            cancel,
            probe: settings.initial_seed,
            settings,
            state: DriverState::Connected,
            pass: 0,
            reassembler: Reassembler::new(),
            monitor,
            throughput: ThroughputAccumulator::new(),
            recv_buf,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Run cycles until a fault, handing each throughput sample to `report`.
    pub fn run<F>(mut self, mut report: F) -> DriverOutcome<T>
    where
        F: FnMut(&ThroughputSample),
    {
        let fault = loop {
            match self.cycle() {
                Ok(Some(sample)) => report(&sample),
                Ok(None) => {}
                Err(fault) => break fault,
            }
        };
        debug!(
            passes = self.pass,
            probe = self.probe,
            state = ?self.state,
            fault = %fault,
            "Test loop terminated"
        );

        DriverOutcome {
            fault,
            transport: self.transport,
            passes: self.pass,
            last_probe: self.probe,
            throughput: self.throughput,
        }
    }

    fn cycle(&mut self) -> Result<Option<ThroughputSample>, Fault> {
        self.send_probe()?;
        let outcome = self.receive_phase()?;
        Ok(self.report(outcome))
    }

    fn send_probe(&mut self) -> Result<(), Fault> {
        self.state = DriverState::SendProbe;
        self.probe = self.probe.wrapping_add(1);
        self.transport.send_probe(echo::encode_probe(self.probe))
    }

    /// Receive exactly one expected block, validating records as they complete.
    fn receive_phase(&mut self) -> Result<PhaseOutcome, Fault> {
        self.state = DriverState::ReceivePhase;
        self.reassembler.reset();

        let expected = self.settings.expected_bytes;
        let probe = self.probe;
        let started = Instant::now();
        self.monitor.start(started);
        let mut total_in = 0usize;

        while total_in < expected {
            match self.monitor.check_elapsed(Instant::now()) {
                TimeoutStatus::Continue => {}
                TimeoutStatus::SoftWarning(elapsed) => {
                    debug!(
                        probe,
                        received = total_in,
                        expected,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Receive phase is slow"
                    );
                }
                TimeoutStatus::HardAbort(elapsed) => {
                    debug!(
                        probe,
                        received = total_in,
                        expected,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Receive phase stalled"
                    );
                    return Err(Fault::Timeout {
                        limit: self.settings.timeouts.hard,
                    });
                }
            }

            // Never read past this phase's block
            let want = (expected - total_in).min(self.recv_buf.len());
            match self.transport.receive(&mut self.recv_buf[..want])? {
                Received::WouldBlock => {
                    self.transport.wait_readable(self.settings.poll_interval)?;
                }
                Received::Data(n) => {
                    total_in += n;
                    self.reassembler.feed(&self.recv_buf[..n], |record, position| {
                        echo::check(record, probe, position)
                    })?;
                }
            }

            if self.cancel.is_cancelled() {
                return Err(Fault::UserCancel);
            }
        }

        debug_assert_eq!(self.reassembler.carry_len(), expected % RECORD_LEN);
        Ok(PhaseOutcome {
            bytes: total_in,
            elapsed: started.elapsed(),
        })
    }

    fn report(&mut self, outcome: PhaseOutcome) -> Option<ThroughputSample> {
        self.state = DriverState::Report;
        let elapsed_ms = u64::try_from(outcome.elapsed.as_millis()).unwrap_or(u64::MAX);
        self.throughput.record_phase(outcome.bytes as u64, elapsed_ms);
        trace!(pass = self.pass, probe = self.probe, elapsed_ms, "Phase complete");

        let sample = self
            .throughput
            .sample_for(self.pass, self.settings.report_interval);
        self.pass += 1;
        sample
    }
}
