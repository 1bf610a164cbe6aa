//! Pure button/learning state machine.
//!
//! The session consumes explicit messages (a decoded code, a timer fire)
//! and returns effects (emit an event, arm or disarm a timer) without
//! touching a clock or a channel. The async engine owns the real timers;
//! tests drive the session with scripted fires.
//!
//! # Stale timers
//!
//! Every armed timer carries a sequence number. A fire is only honored if
//! its sequence matches the one currently recorded for that timer kind, so
//! a timer that outlives the state that armed it is dropped instead of
//! corrupting the session.

use crate::config::{IrProtocol, LookupEntry, RemoteConfig, MAX_INPUT_ID};
use crate::lookup::{LearnError, LookupTable};
use crate::monitor::error::LearnRefusal;
use crate::monitor::{HoldTier, InputEvent, TimerKind, BUTTON_TIMERS};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Side effect requested by a session transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Deliver an event to the input-manager sink
    Emit(InputEvent),

    /// Arm a single-shot timer; `seq` must come back with the fire
    Arm {
        kind: TimerKind,
        after: Duration,
        seq: u32,
    },

    /// Cancel the timer of this kind, if still pending
    Disarm(TimerKind),
}

#[derive(Debug, Clone, Copy)]
struct HeldButton {
    input_id: u8,
    address: u16,
    tier: HoldTier,
}

/// Single remote-control session state
///
/// One instance per monitor; mutated only by the engine task that owns it.
#[derive(Debug)]
pub struct RemoteSession {
    config: Arc<RemoteConfig>,
    lookup: LookupTable,
    held: Option<HeldButton>,
    learn_target: Option<u8>,
    armed: HashMap<TimerKind, u32>,
    next_seq: u32,
}

impl RemoteSession {
    pub fn new(config: Arc<RemoteConfig>) -> Self {
        Self {
            lookup: LookupTable::new(config.clone()),
            config,
            held: None,
            learn_target: None,
            armed: HashMap::new(),
            next_seq: 0,
        }
    }

    pub fn is_learning(&self) -> bool {
        self.learn_target.is_some()
    }

    pub fn held_input_id(&self) -> Option<u8> {
        self.held.map(|h| h.input_id)
    }

    /// True iff a learning session could start right now
    pub fn can_learn_new_code(&self) -> bool {
        !self.is_learning() && self.lookup.learnt_count() < self.config.max_learning_codes
    }

    /// Snapshot of the learnt table for the persistence collaborator
    pub fn learnt_codes(&self) -> Vec<LookupEntry> {
        self.lookup.learnt_entries().to_vec()
    }

    /// Processes one decoded (address, code) pair from the decoder
    pub fn handle_code(&mut self, address: u16, code: u8, protocol: IrProtocol) -> Vec<Effect> {
        if protocol != self.config.protocol {
            debug!(
                "Discarding {} code {:#04x}: monitor is configured for {}",
                protocol, code, self.config.protocol
            );
            return Vec::new();
        }

        if self.is_learning() {
            return self.capture_code(address, code);
        }

        match self.lookup.resolve(address, code) {
            Some(input_id) => self.handle_resolved(input_id, address),
            None => {
                debug!(
                    "Discarding unresolved code {:#04x} from address {:#06x}",
                    code, address
                );
                Vec::new()
            }
        }
    }

    /// Processes a timer fire; stale sequences are dropped
    pub fn handle_timer(&mut self, kind: TimerKind, seq: u32) -> Vec<Effect> {
        if self.armed.get(&kind).copied() != Some(seq) {
            debug!("Ignoring stale {:?} timer fire (seq {})", kind, seq);
            return Vec::new();
        }
        self.armed.remove(&kind);

        let mut effects = Vec::new();
        let timers = self.config.timers.clone();
        match kind {
            TimerKind::Short => self.escalate(
                HoldTier::Long,
                Some((TimerKind::Long, timers.long_ms)),
                &mut effects,
            ),
            TimerKind::Long => self.escalate(
                HoldTier::VLong,
                Some((TimerKind::VLong, timers.vlong_ms)),
                &mut effects,
            ),
            TimerKind::VLong => self.escalate(HoldTier::VVLong, None, &mut effects),
            // VVLONG is the terminal tier; nothing arms this timer, so a
            // fire can only be stale and is already filtered above.
            TimerKind::VVLong => {}
            TimerKind::Repeat => {
                if let Some(held) = self.held {
                    effects.push(Effect::Emit(InputEvent::Repeat {
                        input_id: held.input_id,
                    }));
                    effects.push(self.arm(TimerKind::Repeat, timers.repeat_ms));
                }
            }
            TimerKind::Release => self.release_current(&mut effects),
            TimerKind::LearnTimeout => {
                if self.learn_target.take().is_some() {
                    info!("Learning mode timed out without receiving a code");
                    self.disarm(TimerKind::LearnReminder, &mut effects);
                    effects.push(Effect::Emit(InputEvent::LearnTimedOut));
                }
            }
            TimerKind::LearnReminder => {
                if self.is_learning() {
                    debug!("Learning mode still active, emitting reminder tick");
                    effects.push(Effect::Emit(InputEvent::LearnReminderTick));
                    effects.push(self.arm(
                        TimerKind::LearnReminder,
                        self.config.learning_mode_reminder_ms,
                    ));
                }
            }
        }
        effects
    }

    /// Enters learning mode for the given target input id
    pub fn start_learning(&mut self, target_input_id: u8) -> Result<Vec<Effect>, LearnRefusal> {
        if target_input_id > MAX_INPUT_ID {
            return Err(LearnRefusal::InvalidInputId(target_input_id));
        }
        if self.is_learning() {
            return Err(LearnRefusal::AlreadyLearning);
        }
        if self.lookup.learnt_count() >= self.config.max_learning_codes {
            return Err(LearnRefusal::TableFull(self.config.max_learning_codes));
        }

        info!(
            "Entering learning mode for input id {} (timeout {}ms)",
            target_input_id, self.config.learning_mode_timeout_ms
        );
        self.learn_target = Some(target_input_id);

        let effects = vec![
            self.arm(TimerKind::LearnTimeout, self.config.learning_mode_timeout_ms),
            self.arm(
                TimerKind::LearnReminder,
                self.config.learning_mode_reminder_ms,
            ),
        ];
        Ok(effects)
    }

    /// Leaves learning mode; idempotent, no event
    pub fn stop_learning(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.learn_target.take().is_some() {
            info!("Stopping learning mode");
            self.disarm(TimerKind::LearnTimeout, &mut effects);
            self.disarm(TimerKind::LearnReminder, &mut effects);
        }
        effects
    }

    /// Clears the learnt table, stopping learning mode first if active
    ///
    /// A held button keeps its already-resolved input id until release.
    pub fn clear_learnt_codes(&mut self) -> Vec<Effect> {
        let effects = self.stop_learning();
        self.lookup.clear_learnt();
        effects
    }

    fn handle_resolved(&mut self, input_id: u8, address: u16) -> Vec<Effect> {
        let mut effects = Vec::new();
        match self.held {
            // Keep-alive for the held button: refresh the release deadline.
            Some(held) if held.input_id == input_id => {
                debug!("Keep-alive for input id {}", input_id);
                effects.push(self.arm(TimerKind::Release, self.config.timers.release_ms));
            }
            // A different button while one is held: the remote can only
            // hold one, so treat it as release-then-press.
            Some(held) => {
                info!(
                    "Input id {} arrived while {} held, forcing implicit release",
                    input_id, held.input_id
                );
                self.release_current(&mut effects);
                self.press(input_id, address, &mut effects);
            }
            None => self.press(input_id, address, &mut effects),
        }
        effects
    }

    fn press(&mut self, input_id: u8, address: u16, effects: &mut Vec<Effect>) {
        info!(
            "Button press: input id {} from address {:#06x}",
            input_id, address
        );
        self.held = Some(HeldButton {
            input_id,
            address,
            tier: HoldTier::Short,
        });
        effects.push(Effect::Emit(InputEvent::Press { input_id }));

        let timers = self.config.timers.clone();
        effects.push(self.arm(TimerKind::Short, timers.short_ms));
        effects.push(self.arm(TimerKind::Repeat, timers.repeat_ms));
        effects.push(self.arm(TimerKind::Release, timers.release_ms));
    }

    fn escalate(
        &mut self,
        tier: HoldTier,
        next: Option<(TimerKind, u64)>,
        effects: &mut Vec<Effect>,
    ) {
        let input_id = match self.held.as_mut() {
            Some(held) => {
                held.tier = tier;
                held.input_id
            }
            None => {
                warn!("Tier timer fired with no button held, ignoring");
                return;
            }
        };

        info!("Input id {} escalated to {} hold tier", input_id, tier);
        effects.push(Effect::Emit(InputEvent::HoldTierChanged { input_id, tier }));
        if let Some((kind, after_ms)) = next {
            effects.push(self.arm(kind, after_ms));
        }
    }

    fn release_current(&mut self, effects: &mut Vec<Effect>) {
        if let Some(held) = self.held.take() {
            info!(
                "Button release: input id {} from address {:#06x} after {} tier",
                held.input_id, held.address, held.tier
            );
            for kind in BUTTON_TIMERS {
                self.disarm(kind, effects);
            }
            effects.push(Effect::Emit(InputEvent::Release {
                input_id: held.input_id,
            }));
        }
    }

    /// Learning mode captures exactly one code, then exits whatever the
    /// outcome. A code that already resolves counts as a duplicate.
    fn capture_code(&mut self, address: u16, code: u8) -> Vec<Effect> {
        let Some(target) = self.learn_target.take() else {
            return Vec::new();
        };

        let mut effects = Vec::new();
        self.disarm(TimerKind::LearnTimeout, &mut effects);
        self.disarm(TimerKind::LearnReminder, &mut effects);

        match self.lookup.learn(address, code, target) {
            Ok(()) => {
                effects.push(Effect::Emit(InputEvent::LearnSuccess {
                    input_id: target,
                    address,
                    code,
                }));
            }
            Err(LearnError::DuplicateCode) => {
                warn!(
                    "Refusing to learn code {:#04x} from {:#06x}: already mapped",
                    code, address
                );
                effects.push(Effect::Emit(InputEvent::LearnDuplicate));
            }
            Err(LearnError::TableFull) => {
                warn!(
                    "Refusing to learn code {:#04x} from {:#06x}: table full",
                    code, address
                );
                effects.push(Effect::Emit(InputEvent::LearnTableFull));
            }
        }
        effects
    }

    fn arm(&mut self, kind: TimerKind, after_ms: u64) -> Effect {
        self.next_seq = self.next_seq.wrapping_add(1);
        let seq = self.next_seq;
        self.armed.insert(kind, seq);
        Effect::Arm {
            kind,
            after: Duration::from_millis(after_ms),
            seq,
        }
    }

    fn disarm(&mut self, kind: TimerKind, effects: &mut Vec<Effect>) {
        if self.armed.remove(&kind).is_some() {
            effects.push(Effect::Disarm(kind));
        }
    }
}
