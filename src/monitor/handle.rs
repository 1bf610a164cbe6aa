//! Monitor Handle - public API of the IR input monitor
//!
//! Spawns the engine in a tokio task and exposes the learning-mode contract
//! plus lifecycle management. Raw codes arrive through the decoder channel
//! given at spawn time; normalized input events leave through the provided
//! sink channel.

use crate::config::{LookupEntry, RemoteConfig};
use crate::decoder::RawCodeEvent;
use crate::monitor::engine::MonitorEngine;
use crate::monitor::error::{LearnRefusal, MonitorError};
use crate::monitor::InputEvent;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Requests the handle sends to the engine task
pub enum MonitorCommand {
    /// Enter learning mode for a target input id
    StartLearning {
        target_input_id: u8,
        reply: oneshot::Sender<Result<(), LearnRefusal>>,
    },

    /// Leave learning mode (idempotent)
    StopLearning,

    /// Drop all learnt codes, stopping learning mode first if active
    ClearLearntCodes,

    /// Snapshot the learnt table for persistence
    LearntCodes {
        reply: oneshot::Sender<Vec<LookupEntry>>,
    },
}

/// Handle for managing the monitor engine in a tokio task
///
/// Dropping the handle shuts the engine down; call [`shutdown`] for a
/// graceful stop that waits for the task to finish.
///
/// [`shutdown`]: MonitorHandle::shutdown
pub struct MonitorHandle {
    command_sender: mpsc::Sender<MonitorCommand>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task_handle: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    /// Spawns the monitor engine as a tokio task
    ///
    /// # Arguments
    ///
    /// * `config` - Shared, already-validated remote configuration
    /// * `code_receiver` - Raw decoded codes from the decoder adapter
    /// * `event_sender` - Sink channel for normalized input events
    pub fn spawn(
        config: Arc<RemoteConfig>,
        code_receiver: mpsc::Receiver<RawCodeEvent>,
        event_sender: mpsc::Sender<InputEvent>,
    ) -> Self {
        info!("Spawning IR input monitor");

        let (command_sender, command_receiver) = mpsc::channel(16);
        let engine =
            MonitorEngine::create(config, code_receiver, command_receiver, event_sender).activate();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task_handle = tokio::spawn(async move {
            let deactivating = engine.run_until_shutdown(shutdown_rx).await;
            let _ = deactivating.shutdown();
        });

        info!("IR input monitor spawned successfully");
        Self {
            command_sender,
            shutdown_tx: Some(shutdown_tx),
            task_handle: Some(task_handle),
        }
    }

    /// Requests learning mode for `target_input_id`
    ///
    /// Refused when a learning session is already active, the learnt table
    /// is full, or the id is outside the 0-15 range.
    pub async fn start_learning(&self, target_input_id: u8) -> Result<(), MonitorError> {
        let (reply, reply_rx) = oneshot::channel();
        self.send(MonitorCommand::StartLearning {
            target_input_id,
            reply,
        })
        .await?;

        match reply_rx.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(refusal)) => Err(MonitorError::LearningRefused(refusal)),
            Err(e) => Err(MonitorError::ChannelError(e.to_string())),
        }
    }

    /// Leaves learning mode; safe to call at any time
    pub async fn stop_learning(&self) -> Result<(), MonitorError> {
        self.send(MonitorCommand::StopLearning).await
    }

    /// Clears all learnt codes (stops learning mode first if active)
    pub async fn clear_learnt_codes(&self) -> Result<(), MonitorError> {
        self.send(MonitorCommand::ClearLearntCodes).await
    }

    /// Returns the in-memory learnt table for an external persistence
    /// collaborator to serialize
    pub async fn learnt_codes(&self) -> Result<Vec<LookupEntry>, MonitorError> {
        let (reply, reply_rx) = oneshot::channel();
        self.send(MonitorCommand::LearntCodes { reply }).await?;
        reply_rx
            .await
            .map_err(|e| MonitorError::ChannelError(e.to_string()))
    }

    /// Gracefully shuts down the engine and waits for task completion
    pub async fn shutdown(&mut self) -> Result<(), MonitorError> {
        debug!("Sending shutdown signal to monitor engine");

        if let Some(tx) = self.shutdown_tx.take() {
            if tx.send(()).is_err() {
                warn!("Monitor engine task already terminated");
            }
        }

        if let Some(handle) = self.task_handle.take() {
            match handle.await {
                Ok(()) => {
                    debug!("Monitor engine task completed");
                    Ok(())
                }
                Err(e) => Err(MonitorError::ThreadError(format!(
                    "Monitor engine task panicked: {}",
                    e
                ))),
            }
        } else {
            debug!("Monitor engine already shut down");
            Ok(())
        }
    }

    async fn send(&self, command: MonitorCommand) -> Result<(), MonitorError> {
        self.command_sender
            .send(command)
            .await
            .map_err(|e| MonitorError::ChannelError(e.to_string()))
    }
}
