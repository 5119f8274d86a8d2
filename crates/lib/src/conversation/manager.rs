//! Manager: owns one runner per channel and a shared entry point.

use crate::channels::{Channel, ChannelError};
use crate::conversation::handler::BoxedHandler;
use crate::conversation::runner::{AgentRunner, EntryPoint};
use futures_util::future::join_all;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error("no agents registered")]
    NoAgents,
    #[error("channel {channel} failed to start: {source}")]
    Start {
        channel: String,
        #[source]
        source: ChannelError,
    },
}

/// Runs every registered channel until all of their inbound streams end.
pub struct Manager {
    runners: Vec<AgentRunner>,
    entry_point: EntryPoint,
    stop_requested: AtomicBool,
}

/// Stops every runner when dropped, so `run` cannot leave channels polling.
struct StopOnDrop<'a>(&'a Manager);

impl Drop for StopOnDrop<'_> {
    fn drop(&mut self) {
        self.0.stop();
    }
}

impl Manager {
    pub fn new<F>(entry_point: F) -> Self
    where
        F: Fn() -> BoxedHandler + Send + Sync + 'static,
    {
        Self {
            runners: Vec::new(),
            entry_point: Arc::new(entry_point),
            stop_requested: AtomicBool::new(false),
        }
    }

    /// Register a channel. Channel ids should be unique so chat identities stay unique.
    pub fn add_agent(&mut self, channel: Arc<dyn Channel>) {
        if self.runners.iter().any(|r| r.channel_id() == channel.id()) {
            log::warn!("manager: channel id {} registered twice", channel.id());
        }
        self.runners.push(AgentRunner::new(channel));
    }

    pub fn agent_count(&self) -> usize {
        self.runners.len()
    }

    /// Start every runner and wait for all of them to finish.
    ///
    /// Fails at once with [`ManagerError::NoAgents`] when nothing is registered,
    /// or with [`ManagerError::Start`] when a channel cannot start. Every runner
    /// is stopped on the way out, whichever way that is.
    pub async fn run(&self) -> Result<(), ManagerError> {
        if self.runners.is_empty() {
            return Err(ManagerError::NoAgents);
        }
        let _guard = StopOnDrop(self);

        let mut loops = Vec::with_capacity(self.runners.len());
        for runner in &self.runners {
            if self.stop_requested.load(Ordering::SeqCst) {
                break;
            }
            match runner.start(self.entry_point.clone()).await {
                Ok(handle) => loops.push(handle),
                // A channel stopped mid-start reports an error; that is a shutdown, not a failure.
                Err(e) if self.stop_requested.load(Ordering::SeqCst) => {
                    log::info!("manager: {} start abandoned on stop: {}", runner.channel_id(), e);
                    break;
                }
                Err(source) => {
                    return Err(ManagerError::Start {
                        channel: runner.channel_id().to_string(),
                        source,
                    })
                }
            }
        }
        log::info!("manager: {} runner(s) started", loops.len());

        for res in join_all(loops).await {
            if let Err(e) = res {
                log::error!("manager: dispatch loop panicked: {}", e);
            }
        }
        log::info!("manager: all runners stopped");
        Ok(())
    }

    /// Stop every runner. Safe to call more than once, while `run` is still
    /// starting channels, and while it is waiting. Channels are not restartable,
    /// so a stopped manager's `run` returns without starting anything.
    pub fn stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
        for runner in &self.runners {
            runner.stop();
        }
    }
}
