//! Protocol implementations.
//!
//! - `echo`: the fixed-width probe pattern returned by an echo server

pub mod echo;
