//! Cooperative cancellation, polled once per receive iteration.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Source of an external "stop now" request.
pub trait CancelSignal {
    fn is_cancelled(&mut self) -> bool;
}

/// Never requests cancellation.
#[cfg(test)]
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverCancel;

#[cfg(test)]
impl CancelSignal for NeverCancel {
    fn is_cancelled(&mut self) -> bool {
        false
    }
}

impl CancelSignal for Arc<AtomicBool> {
    fn is_cancelled(&mut self) -> bool {
        self.load(Ordering::Relaxed)
    }
}

impl CancelSignal for &AtomicBool {
    fn is_cancelled(&mut self) -> bool {
        self.load(Ordering::Relaxed)
    }
}

/// Adapts a closure into a cancellation source.
#[cfg(test)]
pub struct CancelFn<F>(pub F);

#[cfg(test)]
impl<F: FnMut() -> bool> CancelSignal for CancelFn<F> {
    fn is_cancelled(&mut self) -> bool {
        (self.0)()
    }
}

/// Keys that stop a running test when typed on the console.
pub fn is_exit_key(byte: u8) -> bool {
    const ESCAPE: u8 = 0x1b;
    matches!(byte, b'x' | b'X' | ESCAPE)
}
