use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::Instant;

use crate::core::command::{Operation, RuleCommand, RuleIdentity};
use crate::core::expiry::ExpiryQueue;
use crate::firewall::{FirewallError, RuleMutator, RuleStore};

/// Serializes all rule mutations: consumes the command queue, keeps the rule
/// mirror consistent with the firewall, and registers leased inserts on the
/// expiry queue. Sole writer of the mirror and sole producer of the expiry
/// queue.
pub struct CommandProcessor<B> {
    backend: Arc<B>,
    commands: UnboundedReceiver<RuleCommand>,
    expiry_queue: Arc<ExpiryQueue>,
    mirror: HashSet<RuleIdentity>,
    default_lease: String,
    seeded: bool,
}

impl<B: RuleStore + RuleMutator> CommandProcessor<B> {
    pub fn new(
        backend: Arc<B>,
        commands: UnboundedReceiver<RuleCommand>,
        expiry_queue: Arc<ExpiryQueue>,
        default_lease: String,
    ) -> Self {
        Self {
            backend,
            commands,
            expiry_queue,
            mirror: HashSet::new(),
            default_lease,
            seeded: false,
        }
    }

    /// Seed the rule mirror from the live firewall state. Must run before
    /// any command is consumed.
    pub fn seed(&mut self) -> Result<(), FirewallError> {
        let mut rules = self.backend.load_current_rules()?;
        for rule in &mut rules {
            self.backend.canonicalize(rule);
        }
        self.mirror = rules.iter().map(RuleCommand::identity).collect();
        self.seeded = true;
        info!("Seeded rule mirror with {} rules", self.mirror.len());
        Ok(())
    }

    /// Number of rule identities currently tracked in the mirror
    pub fn tracked_rules(&self) -> usize {
        self.mirror.len()
    }

    pub fn is_tracked(&self, identity: &RuleIdentity) -> bool {
        self.mirror.contains(identity)
    }

    /// Consume the command queue until every sender is dropped
    pub async fn run(mut self) {
        if !self.seeded {
            if let Err(e) = self.seed() {
                error!("Failed to seed rule mirror, processor exiting: {}", e);
                return;
            }
        }

        while let Some(command) = self.commands.recv().await {
            self.process(command);
        }
        debug!("Command queue closed, processor exiting");
    }

    /// Handle one dequeued command. Never panics or returns an error: every
    /// per-command failure is logged and leaves the mirror unchanged, so the
    /// worker survives to take the next item.
    pub fn process(&mut self, mut command: RuleCommand) {
        debug!(
            "Got new item from the command queue: {} {:?}",
            command.operation, command.attributes
        );
        self.backend.canonicalize(&mut command);
        let identity = command.identity();

        match command.operation {
            Operation::Insert => {
                let lease = match command.lease(&self.default_lease) {
                    Ok(lease) => lease,
                    Err(e) => {
                        error!("{}. Command ignored: {:?}", e, command.attributes);
                        return;
                    }
                };

                // A lease large enough to overflow the clock can never be
                // honored; treat it like any other invalid lease value
                let deadline = if lease > 0 {
                    match Instant::now().checked_add(Duration::from_secs(lease)) {
                        Some(deadline) => Some(deadline),
                        None => {
                            error!(
                                "Lease of {}s is beyond the clock's range. Command ignored: {:?}",
                                lease, command.attributes
                            );
                            return;
                        }
                    }
                } else {
                    None
                };

                if self.mirror.contains(&identity) {
                    warn!(
                        "Trying to insert existing rule: {:?}. Command ignored.",
                        command.attributes
                    );
                    return;
                }

                if let Err(e) = self.backend.apply(Operation::Insert, &command) {
                    error!("Insert failed for {:?}: {}", command.attributes, e);
                    return;
                }

                // Only genuinely new inserts get a lease; expire = 0 means
                // a permanent rule that never enters the expiry queue
                if let Some(deadline) = deadline {
                    debug!(
                        "Scheduling expiry in {}s for {:?}",
                        lease, command.attributes
                    );
                    self.expiry_queue.push(deadline, command.clone());
                }
                self.mirror.insert(identity);
            }
            Operation::Delete => {
                if !self.mirror.contains(&identity) {
                    warn!(
                        "Trying to delete not existing rule: {:?}. Command ignored.",
                        command.attributes
                    );
                    return;
                }

                if let Err(e) = self.backend.apply(Operation::Delete, &command) {
                    error!("Delete failed for {:?}: {}", command.attributes, e);
                    return;
                }
                self.mirror.remove(&identity);
            }
            Operation::List => {
                // Resynchronize the mirror from the live firewall; on failure
                // the previous mirror stays in effect
                match self.backend.load_current_rules() {
                    Ok(mut rules) => {
                        for rule in &mut rules {
                            self.backend.canonicalize(rule);
                        }
                        self.mirror = rules.iter().map(RuleCommand::identity).collect();
                        info!("Resynchronized rule mirror: {} rules", self.mirror.len());
                    }
                    Err(e) => error!("Rule mirror resync failed: {}", e),
                }
            }
        }
    }
}
