//! Terminal faults of a test run.
//!
//! Every run ends with exactly one `Fault`; its `Display` is the status
//! line shown to the user.

use std::io;
use std::net::SocketAddrV4;
use std::time::Duration;

/// Failure to establish the session.
#[derive(Debug, thiserror::Error)]
pub enum ConnectFault {
    #[error("Invalid IP address, {0}")]
    BadAddress(String),

    #[error("Socket open failed: {0}")]
    OpenFailed(#[source] io::Error),

    #[error("Connection refused from {0}")]
    Refused(SocketAddrV4),

    #[error("Time out at connect({0}) call")]
    TimedOut(SocketAddrV4),

    #[error("Setting non-blocking mode failed: {0}")]
    NonBlocking(#[source] io::Error),

    #[error("Socket connect failed: {0}")]
    Other(#[source] io::Error),
}

/// Why a run stopped.
#[derive(Debug, thiserror::Error)]
pub enum Fault {
    #[error(transparent)]
    Connect(#[from] ConnectFault),

    #[error("send() failed: {0}")]
    Send(#[source] io::Error),

    #[error("send() returns {sent}, expected {expected}")]
    ShortSend { sent: usize, expected: usize },

    #[error("Receive error {0}")]
    Receive(#[source] io::Error),

    #[error("Connection lost")]
    ConnectionLost,

    /// An echoed record differed from the probe.
    ///
    /// `position` is the byte offset within the phase where the record began.
    #[error("Unexpected data at idx {position}: was 0x{actual:08X}, sb {expected:08X}")]
    Integrity {
        position: usize,
        actual: u32,
        expected: u32,
    },

    #[error("Receive timeout after {}", limit_text(.limit))]
    Timeout { limit: Duration },

    #[error("User exit command")]
    UserCancel,
}

/// Whole seconds when exact, otherwise milliseconds.
fn limit_text(limit: &Duration) -> String {
    if limit.subsec_nanos() == 0 {
        format!("{} sec", limit.as_secs())
    } else {
        format!("{} ms", limit.as_millis())
    }
}

impl Fault {
    /// True when the run was stopped on request rather than by a failure.
    pub fn is_user_cancel(&self) -> bool {
        matches!(self, Fault::UserCancel)
    }
}
