//! Echo pattern record decoding and validation.

use crate::fault::Fault;

/// Width of one record on the wire.
pub const RECORD_LEN: usize = 4;

/// One fixed-width unit of the echoed stream, decoded from network byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record(pub u32);

impl Record {
    /// Decode a record from its wire bytes.
    pub fn from_wire(bytes: [u8; RECORD_LEN]) -> Self {
        Record(u32::from_be_bytes(bytes))
    }
}

/// Encode a probe value for sending.
pub fn encode_probe(probe: u32) -> [u8; RECORD_LEN] {
    probe.to_be_bytes()
}

/// Check a record against the probe of the current phase.
///
/// `position` is the byte offset within the phase at which the record
/// began; it is only used to describe a mismatch.
pub fn check(record: Record, expected: u32, position: usize) -> Result<(), Fault> {
    if record.0 == expected {
        Ok(())
    } else {
        Err(Fault::Integrity {
            position,
            actual: record.0,
            expected,
        })
    }
}
