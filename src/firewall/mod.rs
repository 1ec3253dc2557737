pub mod error;
pub mod iptables;

pub use error::FirewallError;
pub use iptables::IptablesBackend;

use crate::core::command::{Operation, RuleCommand};

/// Enumerates the live firewall state. Called once at startup to seed the
/// rule mirror, and again on a List command to resynchronize it.
pub trait RuleStore: Send + Sync {
    fn load_current_rules(&self) -> Result<Vec<RuleCommand>, FirewallError>;
}

/// Applies a single rule mutation to the real firewall. Failure must be
/// distinguishable from success so the caller can leave its mirror untouched.
pub trait RuleMutator: Send + Sync {
    fn apply(&self, operation: Operation, rule: &RuleCommand) -> Result<(), FirewallError>;

    /// Fill backend-specific defaults into the rule's attribute map so that
    /// commands omitting a defaulted attribute produce the same identity as
    /// the rules the backend lists back from the firewall. Called before any
    /// identity is computed from the command.
    fn canonicalize(&self, _rule: &mut RuleCommand) {}
}
