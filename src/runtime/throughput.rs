//! Per-phase and cumulative receive throughput.

use std::fmt;

/// Phase and run totals at the time a sample is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThroughputSample {
    pub phase_bytes: u64,
    pub phase_ms: u64,
    pub total_bytes: u64,
    pub total_ms: u64,
}

impl ThroughputSample {
    /// Rate of the sampled phase in bytes/sec.
    pub fn current_rate(&self) -> Option<u64> {
        rate(self.phase_bytes, self.phase_ms)
    }

    /// Rate over the whole run in bytes/sec.
    pub fn average_rate(&self) -> Option<u64> {
        rate(self.total_bytes, self.total_ms)
    }
}

impl fmt::Display for ThroughputSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [ms], Rx rate: {} bytes/sec, Average: {} bytes/sec",
            self.phase_ms,
            self.current_rate().unwrap_or(0),
            self.average_rate().unwrap_or(0)
        )
    }
}

/// Accumulates received bytes and receive time across phases.
///
/// Phase fields are replaced by every `record_phase`; totals persist for
/// the life of the accumulator.
#[derive(Debug, Default, Clone)]
pub struct ThroughputAccumulator {
    phase_bytes: u64,
    phase_ms: u64,
    total_bytes: u64,
    total_ms: u64,
}

impl ThroughputAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed phase.
    pub fn record_phase(&mut self, bytes: u64, duration_ms: u64) {
        self.phase_bytes = bytes;
        self.phase_ms = duration_ms;
        self.total_bytes = self.total_bytes.saturating_add(bytes);
        self.total_ms = self.total_ms.saturating_add(duration_ms);
    }

    /// Rate of the last phase, `None` if it took no measurable time.
    pub fn current_rate_bytes_per_sec(&self) -> Option<u64> {
        rate(self.phase_bytes, self.phase_ms)
    }

    /// Rate over all recorded phases, `None` before any measurable time.
    pub fn average_rate_bytes_per_sec(&self) -> Option<u64> {
        rate(self.total_bytes, self.total_ms)
    }

    /// Sample to display after the phase with zero-based index `pass`.
    ///
    /// Only every `interval`-th phase is sampled, and never a phase with
    /// zero duration.
    pub fn sample_for(&self, pass: u64, interval: u64) -> Option<ThroughputSample> {
        if interval == 0 || pass % interval != interval - 1 || self.phase_ms == 0 {
            return None;
        }
        Some(self.snapshot())
    }

    pub fn snapshot(&self) -> ThroughputSample {
        ThroughputSample {
            phase_bytes: self.phase_bytes,
            phase_ms: self.phase_ms,
            total_bytes: self.total_bytes,
            total_ms: self.total_ms,
        }
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn total_ms(&self) -> u64 {
        self.total_ms
    }
}

/// Bytes per second, with 128-bit intermediate so large totals cannot wrap.
fn rate(bytes: u64, ms: u64) -> Option<u64> {
    if ms == 0 {
        return None;
    }
    let per_sec = u128::from(bytes) * 1000 / u128::from(ms);
    Some(u64::try_from(per_sec).unwrap_or(u64::MAX))
}
