//! Async engine driving the session state machine with real timers.
//!
//! Runs in its own tokio task with a statum lifecycle for compile-time
//! state safety.
//!
//! # State Machine
//!
//! ```text
//! Initializing ──► Active ──► Deactivating ──► Deactivated
//!                    │             ▲
//!                    └─────────────┘
//!                      (shutdown)
//! ```
//!
//! # Architecture
//!
//! ```text
//! RawCodeEvent ──►┐
//! TimerFired  ──►├── [RemoteSession] ──► effects ──► InputEvent sink
//! Command     ──►┘         │                            + timer tasks
//!                    (pure transitions)
//! ```
//!
//! Every effect the session requests is applied here: event emission maps
//! to the sink channel, arming maps to a spawned sleep task that routes the
//! fire back into the loop, disarming aborts the pending task. The session
//! additionally rejects stale fires by sequence number, so an aborted task
//! that already fired cannot act on an exited state.

use crate::config::RemoteConfig;
use crate::decoder::RawCodeEvent;
use crate::monitor::handle::MonitorCommand;
use crate::monitor::session::{Effect, RemoteSession};
use crate::monitor::{InputEvent, TimerKind};
use statum::{machine, state, transition};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Timer fire routed back into the engine loop
#[derive(Debug, Clone, Copy)]
pub struct TimerFired {
    pub kind: TimerKind,
    pub seq: u32,
}

/// States for the monitor engine lifecycle using statum
#[state]
#[derive(Debug, Clone)]
pub enum MonitorState {
    Initializing, // Setting up session and channels
    Active,       // Processing codes, timers and commands
    Deactivating, // Shutting down gracefully
    Deactivated,  // Fully stopped, ready for cleanup
}

/// Monitor engine with compile-time state safety via statum
#[machine]
pub struct MonitorEngine<MonitorState> {
    code_receiver: mpsc::Receiver<RawCodeEvent>,
    command_receiver: mpsc::Receiver<MonitorCommand>,
    event_sender: mpsc::Sender<InputEvent>,
    timer_sender: mpsc::Sender<TimerFired>,
    timer_receiver: mpsc::Receiver<TimerFired>,
    session: RemoteSession,
    timer_tasks: HashMap<TimerKind, JoinHandle<()>>,
}

impl MonitorEngine<Initializing> {
    pub fn create(
        config: Arc<RemoteConfig>,
        code_receiver: mpsc::Receiver<RawCodeEvent>,
        command_receiver: mpsc::Receiver<MonitorCommand>,
        event_sender: mpsc::Sender<InputEvent>,
    ) -> Self {
        info!(
            "Initializing IR input monitor: protocol={}, {} static entries, pio={}",
            config.protocol,
            config.static_lookup_table.len(),
            config.ir_pio
        );

        let (timer_sender, timer_receiver) = mpsc::channel(64);
        Self::builder()
            .code_receiver(code_receiver)
            .command_receiver(command_receiver)
            .event_sender(event_sender)
            .timer_sender(timer_sender)
            .timer_receiver(timer_receiver)
            .session(RemoteSession::new(config))
            .timer_tasks(HashMap::new())
            .build()
    }
}

#[transition]
impl MonitorEngine<Initializing> {
    pub fn activate(self) -> MonitorEngine<Active> {
        info!("Activating IR input monitor engine");
        self.transition()
    }
}

#[transition]
impl MonitorEngine<Active> {
    /// Main event loop with graceful shutdown support
    ///
    /// Processes decoded codes, timer fires and handle commands in arrival
    /// order until the shutdown signal is received or the decoder channel
    /// closes.
    pub async fn run_until_shutdown(
        mut self,
        mut shutdown_rx: oneshot::Receiver<()>,
    ) -> MonitorEngine<Deactivating> {
        info!("IR input monitor entering event loop");

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    info!("Shutdown signal received");
                    break;
                }

                maybe_code = self.code_receiver.recv() => match maybe_code {
                    Some(raw) => {
                        debug!(
                            "Raw code {:#04x} from {:#06x} received at {}",
                            raw.code,
                            raw.address,
                            raw.timestamp.format("%H:%M:%S%.3f")
                        );
                        let effects = self.session.handle_code(raw.address, raw.code, raw.protocol);
                        self.apply(effects).await;
                    }
                    None => {
                        warn!("Decoder channel closed, shutting down monitor");
                        break;
                    }
                },

                Some(fired) = self.timer_receiver.recv() => {
                    let effects = self.session.handle_timer(fired.kind, fired.seq);
                    self.apply(effects).await;
                }

                maybe_command = self.command_receiver.recv() => match maybe_command {
                    Some(command) => self.handle_command(command).await,
                    None => {
                        info!("All monitor handles dropped, shutting down");
                        break;
                    }
                },
            }
        }

        info!("Transitioning monitor engine to Deactivating state");
        self.transition()
    }
}

impl MonitorEngine<Active> {
    async fn handle_command(&mut self, command: MonitorCommand) {
        match command {
            MonitorCommand::StartLearning {
                target_input_id,
                reply,
            } => match self.session.start_learning(target_input_id) {
                Ok(effects) => {
                    self.apply(effects).await;
                    let _ = reply.send(Ok(()));
                }
                Err(refusal) => {
                    warn!("Refusing learning mode request: {}", refusal);
                    let _ = reply.send(Err(refusal));
                }
            },
            MonitorCommand::StopLearning => {
                let effects = self.session.stop_learning();
                self.apply(effects).await;
            }
            MonitorCommand::ClearLearntCodes => {
                let effects = self.session.clear_learnt_codes();
                self.apply(effects).await;
            }
            MonitorCommand::LearntCodes { reply } => {
                let _ = reply.send(self.session.learnt_codes());
            }
        }
    }

    async fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Emit(event) => self.emit(event).await,
                Effect::Arm { kind, after, seq } => self.arm_timer(kind, after, seq),
                Effect::Disarm(kind) => self.disarm_timer(kind),
            }
        }
    }

    /// Delivers one event to the input-manager sink, preserving order
    async fn emit(&self, event: InputEvent) {
        info!("Emitting input event: {:?}", event);
        if let Err(e) = self.event_sender.send(event).await {
            error!("Failed to deliver input event: {}", e);
        }
    }

    fn arm_timer(&mut self, kind: TimerKind, after: Duration, seq: u32) {
        debug!("Arming {:?} timer for {:?} (seq {})", kind, after, seq);

        // Re-arming replaces the pending task for this kind.
        if let Some(task) = self.timer_tasks.remove(&kind) {
            task.abort();
        }

        let sender = self.timer_sender.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if sender.send(TimerFired { kind, seq }).await.is_err() {
                debug!("Monitor engine gone, dropping {:?} timer fire", kind);
            }
        });
        self.timer_tasks.insert(kind, task);
    }

    fn disarm_timer(&mut self, kind: TimerKind) {
        if let Some(task) = self.timer_tasks.remove(&kind) {
            debug!("Disarming {:?} timer", kind);
            task.abort();
        }
    }
}

#[transition]
impl MonitorEngine<Deactivating> {
    /// Aborts pending timers and transitions to Deactivated state
    pub fn shutdown(mut self) -> MonitorEngine<Deactivated> {
        info!("Shutting down IR input monitor engine");
        for (kind, task) in self.timer_tasks.drain() {
            debug!("Aborting pending {:?} timer task", kind);
            task.abort();
        }
        info!("Monitor engine shut down successfully");
        self.transition()
    }
}
