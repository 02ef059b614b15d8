//! Background polling loop.
//!
//! Drives periodic synchronization: every interval the poller invokes the
//! supplied sync function, and a [`PollerHandle`] can trigger an immediate
//! sync, pause polling (while disconnected), or stop the loop. The poller
//! does not know about the engine; callers pass a closure that locks it.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Poller configuration.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Interval between automatic syncs.
    pub interval: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
        }
    }
}

impl PollerConfig {
    /// Creates a config with the given interval.
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

/// Commands that can be sent to the poller.
#[derive(Debug, Clone)]
pub enum PollerCommand {
    /// Trigger an immediate sync.
    SyncNow,
    /// Stop automatic syncs (e.g. after a disconnect).
    Pause,
    /// Resume automatic syncs.
    Resume,
    /// Stop the poller.
    Stop,
}

/// The background poller.
pub struct Poller {
    config: PollerConfig,
    command_tx: mpsc::Sender<PollerCommand>,
    command_rx: Option<mpsc::Receiver<PollerCommand>>,
}

impl Poller {
    /// Creates a poller with the given configuration.
    pub fn new(config: PollerConfig) -> Self {
        let (command_tx, command_rx) = mpsc::channel(16);
        Self {
            config,
            command_tx,
            command_rx: Some(command_rx),
        }
    }

    /// Returns a handle for sending commands to the poller.
    pub fn handle(&self) -> PollerHandle {
        PollerHandle {
            command_tx: self.command_tx.clone(),
        }
    }

    /// Runs the polling loop with the given sync function until stopped.
    ///
    /// The function is invoked once per interval (and on `SyncNow`); it
    /// should return `Ok(())` on success or an error message on failure.
    pub async fn run<F, Fut>(mut self, sync_fn: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<(), String>> + Send,
    {
        let mut command_rx = self.command_rx.take().expect("run called twice");
        let mut paused = false;

        info!(
            interval_secs = self.config.interval.as_secs(),
            "poller started"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.config.interval) => {
                    if paused {
                        debug!("poller paused, skipping sync");
                        continue;
                    }
                    Self::do_sync(&sync_fn).await;
                }
                cmd = command_rx.recv() => {
                    match cmd {
                        Some(PollerCommand::SyncNow) => {
                            debug!("received SyncNow command");
                            Self::do_sync(&sync_fn).await;
                        }
                        Some(PollerCommand::Pause) => {
                            info!("poller paused");
                            paused = true;
                        }
                        Some(PollerCommand::Resume) => {
                            info!("poller resumed");
                            paused = false;
                        }
                        Some(PollerCommand::Stop) | None => {
                            info!("poller stopping");
                            break;
                        }
                    }
                }
            }
        }
    }

    async fn do_sync<F, Fut>(sync_fn: &F)
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<(), String>>,
    {
        debug!("starting sync");
        match sync_fn().await {
            Ok(()) => debug!("sync completed"),
            Err(e) => warn!(error = %e, "sync failed"),
        }
    }
}

/// Handle for sending commands to a running poller.
#[derive(Clone, Debug)]
pub struct PollerHandle {
    command_tx: mpsc::Sender<PollerCommand>,
}

impl PollerHandle {
    /// Triggers an immediate sync.
    pub async fn sync_now(&self) -> Result<(), mpsc::error::SendError<PollerCommand>> {
        self.command_tx.send(PollerCommand::SyncNow).await
    }

    /// Pauses automatic syncs.
    pub async fn pause(&self) -> Result<(), mpsc::error::SendError<PollerCommand>> {
        self.command_tx.send(PollerCommand::Pause).await
    }

    /// Resumes automatic syncs.
    pub async fn resume(&self) -> Result<(), mpsc::error::SendError<PollerCommand>> {
        self.command_tx.send(PollerCommand::Resume).await
    }

    /// Stops the poller.
    pub async fn stop(&self) -> Result<(), mpsc::error::SendError<PollerCommand>> {
        self.command_tx.send(PollerCommand::Stop).await
    }
}
