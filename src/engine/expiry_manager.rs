use log::debug;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::Instant;

use crate::core::command::RuleCommand;
use crate::core::expiry::ExpiryQueue;

/// Converts elapsed leases into delete commands. Sole consumer of the expiry
/// queue; never touches the firewall or the rule mirror itself, it only
/// feeds deletions back into the command queue.
pub struct ExpiryManager {
    commands: UnboundedSender<RuleCommand>,
    expiry_queue: Arc<ExpiryQueue>,
    poll_interval: Duration,
}

impl ExpiryManager {
    pub fn new(
        commands: UnboundedSender<RuleCommand>,
        expiry_queue: Arc<ExpiryQueue>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            commands,
            expiry_queue,
            poll_interval,
        }
    }

    /// Poll the expiry queue until the command queue's consumer goes away
    pub async fn run(self) {
        loop {
            tokio::time::sleep(self.poll_interval).await;

            // Move every expired entry from the expiry queue to the command
            // queue. peek/pop need not be atomic as a pair: this is the only
            // consumer, so the earliest entry can only grow staler in between.
            loop {
                match self.expiry_queue.peek_deadline() {
                    Some(deadline) if deadline <= Instant::now() => {}
                    _ => break,
                }
                let Some(entry) = self.expiry_queue.pop() else {
                    break;
                };

                debug!("Lease elapsed for {:?}", entry.rule.attributes);
                let delete = RuleCommand::delete(entry.rule.attributes);
                if self.commands.send(delete).is_err() {
                    debug!("Command queue closed, expiry manager exiting");
                    return;
                }
            }
        }
    }
}
