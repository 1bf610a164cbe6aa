//! IR button-event core: state machine, learning mode, engine, and handle.
//!
//! Raw (address, code) pairs flow in from the decoder adapter, the lookup
//! table resolves them to input ids, and the session state machine turns
//! them into normalized press / hold-tier / repeat / release events for the
//! input-manager sink. Learning mode captures one unmapped code per session
//! and appends it to the learnt lookup table.

pub mod engine;
pub mod error;
pub mod handle;
pub mod session;

pub use engine::{MonitorEngine, MonitorState};
pub use error::{LearnRefusal, MonitorError};
pub use handle::{MonitorCommand, MonitorHandle};
pub use session::{Effect, RemoteSession};

use std::fmt;

/// Hold-duration tiers in strictly increasing order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HoldTier {
    Short,
    Long,
    VLong,
    VVLong,
}

impl fmt::Display for HoldTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HoldTier::Short => write!(f, "SHORT"),
            HoldTier::Long => write!(f, "LONG"),
            HoldTier::VLong => write!(f, "VLONG"),
            HoldTier::VVLong => write!(f, "VVLONG"),
        }
    }
}

/// Identifies which timer fired or is being armed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Hold-tier escalation timers, named after the tier they leave
    Short,
    Long,
    VLong,
    VVLong,

    /// Periodic REPEAT emission while a button is held
    Repeat,

    /// Inactivity deadline modeling the physical release
    Release,

    /// Learning-mode failsafe timeout
    LearnTimeout,

    /// Learning-mode periodic reminder
    LearnReminder,
}

/// All timers tied to the currently held button.
pub(crate) const BUTTON_TIMERS: [TimerKind; 6] = [
    TimerKind::Short,
    TimerKind::Long,
    TimerKind::VLong,
    TimerKind::VVLong,
    TimerKind::Repeat,
    TimerKind::Release,
];

/// Normalized input events delivered to the input-manager sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// A resolved button went down
    Press { input_id: u8 },

    /// The held button crossed into a longer hold tier
    HoldTierChanged { input_id: u8, tier: HoldTier },

    /// Periodic auto-repeat while the button stays held
    Repeat { input_id: u8 },

    /// The held button was released (inactivity deadline or implicit)
    Release { input_id: u8 },

    /// Learning mode captured and stored a new mapping
    LearnSuccess {
        input_id: u8,
        address: u16,
        code: u8,
    },

    /// Learning mode received a code that is already mapped
    LearnDuplicate,

    /// Learning mode received a code but the learnt table is full
    LearnTableFull,

    /// Learning mode expired without receiving a code
    LearnTimedOut,

    /// Reminder that learning mode is still active (feedback cue)
    LearnReminderTick,
}
