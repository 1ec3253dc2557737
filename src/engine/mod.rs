pub mod expiry_manager;
pub mod processor;

pub use expiry_manager::ExpiryManager;
pub use processor::CommandProcessor;

use log::info;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::core::command::{CommandError, RuleCommand};
use crate::core::config::EngineConfig;
use crate::core::expiry::ExpiryQueue;
use crate::firewall::{FirewallError, RuleMutator, RuleStore};

/// Handle for pushing rule commands into the engine. Cloneable; the engine's
/// sole ingestion point. Fire-and-forget: errors surface only through logs.
#[derive(Clone)]
pub struct CommandSender(mpsc::UnboundedSender<RuleCommand>);

impl CommandSender {
    pub fn submit(&self, command: RuleCommand) -> Result<(), CommandError> {
        self.0.send(command).map_err(|_| CommandError::EngineStopped)
    }
}

/// The running rule-lifecycle engine: a command processor and an expiry
/// manager joined by the command and expiry queues.
pub struct Engine {
    sender: CommandSender,
    processor: JoinHandle<()>,
    expiry_manager: JoinHandle<()>,
}

impl Engine {
    /// Seed the rule mirror from `backend` and spawn both workers. Must be
    /// called from within a tokio runtime. Fails if the live firewall state
    /// cannot be enumerated.
    pub fn start<B>(backend: Arc<B>, config: &EngineConfig) -> Result<Self, FirewallError>
    where
        B: RuleStore + RuleMutator + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let expiry_queue = Arc::new(ExpiryQueue::new());

        let mut processor = CommandProcessor::new(
            backend,
            rx,
            Arc::clone(&expiry_queue),
            config.default_lease.clone(),
        );
        processor.seed()?;

        let expiry_manager = ExpiryManager::new(
            tx.clone(),
            expiry_queue,
            Duration::from_secs(config.poll_interval_secs),
        );

        let processor = tokio::spawn(processor.run());
        let expiry_manager = tokio::spawn(expiry_manager.run());
        info!(
            "Engine started (default lease: {}s, poll interval: {}s)",
            config.default_lease, config.poll_interval_secs
        );

        Ok(Self {
            sender: CommandSender(tx),
            processor,
            expiry_manager,
        })
    }

    /// Command ingestion handle for the embedding process
    pub fn handle(&self) -> CommandSender {
        self.sender.clone()
    }

    /// Wait on both workers; they run for the life of the process
    pub async fn join(self) {
        // Keep the sender alive while joining so the processor's queue
        // never closes underneath the expiry manager
        let _sender = self.sender;
        let _ = tokio::join!(self.processor, self.expiry_manager);
    }
}
