use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use leasewall::core::command::{Operation, RuleCommand};
use leasewall::firewall::{FirewallError, RuleMutator, RuleStore};

pub fn attrs(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// In-memory stand-in for the iptables backend: records every mutation and
/// serves a configurable rule set to `load_current_rules`. Supports failure
/// injection for the next apply call.
#[derive(Default)]
pub struct MemoryBackend {
    rules: Mutex<Vec<RuleCommand>>,
    applied: Mutex<Vec<(Operation, HashMap<String, String>)>>,
    fail_next_apply: AtomicBool,
    default_target: Option<String>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(rules: Vec<RuleCommand>) -> Self {
        Self {
            rules: Mutex::new(rules),
            ..Self::default()
        }
    }

    /// Canonicalize commands with this jump target when they carry none,
    /// mimicking the iptables backend's DROP default
    pub fn default_target(mut self, target: &str) -> Self {
        self.default_target = Some(target.to_string());
        self
    }

    /// Replace what `load_current_rules` reports, as if the live firewall
    /// changed underneath the daemon
    pub fn set_rules(&self, rules: Vec<RuleCommand>) {
        *self.rules.lock().unwrap() = rules;
    }

    /// Make the next apply call report failure
    pub fn fail_next_apply(&self) {
        self.fail_next_apply.store(true, Ordering::SeqCst);
    }

    /// Every mutation applied so far, in call order
    pub fn applied(&self) -> Vec<(Operation, HashMap<String, String>)> {
        self.applied.lock().unwrap().clone()
    }

    pub fn apply_count(&self) -> usize {
        self.applied.lock().unwrap().len()
    }
}

impl RuleStore for MemoryBackend {
    fn load_current_rules(&self) -> Result<Vec<RuleCommand>, FirewallError> {
        Ok(self.rules.lock().unwrap().clone())
    }
}

impl RuleMutator for MemoryBackend {
    fn apply(&self, operation: Operation, rule: &RuleCommand) -> Result<(), FirewallError> {
        if self.fail_next_apply.swap(false, Ordering::SeqCst) {
            return Err(FirewallError::IPTablesError(
                "injected apply failure".to_string(),
            ));
        }
        self.applied
            .lock()
            .unwrap()
            .push((operation, rule.attributes.clone()));
        Ok(())
    }

    fn canonicalize(&self, rule: &mut RuleCommand) {
        if let Some(target) = &self.default_target {
            rule.attributes
                .entry("target".to_string())
                .or_insert_with(|| target.clone());
        }
    }
}
