//! Echo pattern protocol.
//!
//! The wire content is not a framed protocol: the client sends one probe,
//! a 32-bit value in network byte order, and the echo server returns that
//! same four-byte record `block_count` times.
//!
//! ```text
//! Client:  [probe]
//! Server:  [probe][probe][probe] ... (block_count records)
//! ```
//!
//! TCP may deliver the echoed records in chunks of any length, so record
//! boundaries are recovered by `runtime::reassembler` and each record is
//! checked here against the probe of the current phase.

pub mod parser;

pub use parser::{check, encode_probe, Record, RECORD_LEN};
