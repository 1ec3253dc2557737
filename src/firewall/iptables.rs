use iptables::IPTables;
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::Arc;

use crate::core::command::{Operation, RuleCommand};
use crate::core::config::IptablesConfig;
use crate::firewall::error::FirewallError;
use crate::firewall::{RuleMutator, RuleStore};

/// Production backend applying rule commands through the iptables binary.
///
/// Attribute vocabulary: `chain` (input/output/forward), `ip` (source
/// address for input/forward, destination for output), `iface` (interface),
/// `target` (jump target, DROP when absent).
#[derive(Clone)]
pub struct IptablesBackend {
    ipt: Arc<IPTables>,
    table: String,
    chains: Vec<String>,
}

impl IptablesBackend {
    pub fn new(config: &IptablesConfig) -> Result<Self, FirewallError> {
        let ipt = iptables::new(config.use_ipv6)
            .map_err(|e| FirewallError::IPTablesError(e.to_string()))?;

        Ok(Self {
            ipt: Arc::new(ipt),
            table: config.table.clone(),
            chains: config.chains.clone(),
        })
    }

    /// Make implicit backend defaults explicit. Listed rules always carry a
    /// jump target, so a command relying on the DROP default must get the
    /// same identity as the listed form of the rule it describes.
    fn fill_defaults(attributes: &mut HashMap<String, String>) {
        attributes
            .entry("target".to_string())
            .or_insert_with(|| "DROP".to_string());
    }

    /// Render a rule's attribute map into (chain, rule spec)
    fn rule_spec(rule: &RuleCommand) -> Result<(String, String), FirewallError> {
        let chain = rule
            .attributes
            .get("chain")
            .ok_or_else(|| FirewallError::RuleError("Missing chain attribute".to_string()))?;

        let (chain, iface_flag, ip_flag) = match chain.as_str() {
            "input" => ("INPUT", "-i", "-s"),
            "output" => ("OUTPUT", "-o", "-d"),
            "forward" => ("FORWARD", "-i", "-s"),
            other => {
                return Err(FirewallError::RuleError(format!(
                    "Unknown chain attribute: {:?}",
                    other
                )))
            }
        };

        let mut parts = Vec::new();
        if let Some(iface) = rule.attributes.get("iface") {
            parts.push(format!("{} {}", iface_flag, iface));
        }
        if let Some(ip) = rule.attributes.get("ip") {
            parts.push(format!("{} {}", ip_flag, ip));
        }
        let target = rule
            .attributes
            .get("target")
            .map(String::as_str)
            .unwrap_or("DROP");
        parts.push(format!("-j {}", target));

        Ok((chain.to_string(), parts.join(" ")))
    }

    /// Parse one `iptables -S`-style line back into an attribute map.
    /// Returns None for policy/chain lines and for rules using matchers this
    /// backend does not manage.
    fn parse_rule_line(line: &str) -> Option<HashMap<String, String>> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.first() != Some(&"-A") || tokens.len() < 2 {
            return None;
        }

        let mut attributes = HashMap::new();
        attributes.insert("chain".to_string(), tokens[1].to_lowercase());

        let mut i = 2;
        while i + 1 < tokens.len() {
            let (flag, value) = (tokens[i], tokens[i + 1]);
            match flag {
                "-s" | "-d" => {
                    let ip = value
                        .strip_suffix("/32")
                        .or_else(|| value.strip_suffix("/128"))
                        .unwrap_or(value);
                    attributes.insert("ip".to_string(), ip.to_string());
                }
                "-i" | "-o" => {
                    attributes.insert("iface".to_string(), value.to_string());
                }
                "-j" => {
                    attributes.insert("target".to_string(), value.to_string());
                }
                other => {
                    // e.g. -m/-p match extensions: not managed by this daemon
                    debug!("Skipping rule with unmanaged matcher {}: {}", other, line);
                    return None;
                }
            }
            i += 2;
        }

        Some(attributes)
    }
}

impl RuleStore for IptablesBackend {
    fn load_current_rules(&self) -> Result<Vec<RuleCommand>, FirewallError> {
        let mut rules = Vec::new();

        for chain in &self.chains {
            let lines = self
                .ipt
                .list(&self.table, chain)
                .map_err(|e| FirewallError::LoadError(format!("List {}: {}", chain, e)))?;

            for line in &lines {
                match Self::parse_rule_line(line) {
                    Some(attributes) => rules.push(RuleCommand::insert(attributes, None)),
                    None => debug!("Not mirroring {} line: {}", chain, line),
                }
            }
        }

        debug!(
            "Loaded {} rules from table {} chains {:?}",
            rules.len(),
            self.table,
            self.chains
        );
        Ok(rules)
    }
}

impl RuleMutator for IptablesBackend {
    fn apply(&self, operation: Operation, rule: &RuleCommand) -> Result<(), FirewallError> {
        let (chain, spec) = Self::rule_spec(rule)?;

        match operation {
            Operation::Insert => {
                debug!("iptables -t {} -I {} 1 {}", self.table, chain, spec);
                self.ipt
                    .insert(&self.table, &chain, &spec, 1)
                    .map_err(|e| FirewallError::IPTablesError(format!("Insert {}: {}", spec, e)))
            }
            Operation::Delete => {
                debug!("iptables -t {} -D {} {}", self.table, chain, spec);
                self.ipt
                    .delete(&self.table, &chain, &spec)
                    .map_err(|e| FirewallError::IPTablesError(format!("Delete {}: {}", spec, e)))
            }
            Operation::List => {
                warn!("List is not a firewall mutation, ignoring");
                Ok(())
            }
        }
    }

    fn canonicalize(&self, rule: &mut RuleCommand) {
        Self::fill_defaults(&mut rule.attributes);
    }
}
