//! Error definitions for the monitor core.

use thiserror::Error;

/// Reasons a learning-mode request is refused up front
///
/// Distinct from [`crate::lookup::LearnError`], which covers the code
/// actually captured during a session; refusal happens before a session
/// starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LearnRefusal {
    #[error("learning mode already in progress")]
    AlreadyLearning,

    #[error("learnt code table is full ({0} codes)")]
    TableFull(usize),

    #[error("input id {0} is outside the 0-15 range")]
    InvalidInputId(u8),
}

/// Errors surfaced through the monitor handle
#[derive(Debug, Error)]
pub enum MonitorError {
    /// The engine refused to enter learning mode
    #[error("Learning refused: {0}")]
    LearningRefused(#[from] LearnRefusal),

    /// Command or reply channel to the engine task broke down
    #[error("Channel error: {0}")]
    ChannelError(String),

    /// The engine task panicked or could not be joined
    #[error("Thread error: {0}")]
    ThreadError(String),
}
