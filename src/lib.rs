//! IR remote-control input monitor.
//!
//! Turns raw infrared (address, code) pairs into normalized input events
//! (press, hold-tier, repeat, release) for an input-manager sink, and
//! supports a learning mode that maps unknown codes to application input
//! ids at runtime.
//!
//! The hardware decoder, the event consumer and non-volatile storage are
//! external collaborators; they connect through channels and the
//! [`monitor::MonitorHandle`] API.

pub mod config;
pub mod decoder;
pub mod lookup;
pub mod monitor;
