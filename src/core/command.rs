use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Rule operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Insert,
    Delete,
    List,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Insert => write!(f, "insert"),
            Operation::Delete => write!(f, "delete"),
            Operation::List => write!(f, "list"),
        }
    }
}

/// A rule-change request flowing through the command queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleCommand {
    /// The requested operation
    pub operation: Operation,

    /// Opaque attribute map fully describing one firewall rule
    /// (e.g. chain, ip, iface, target)
    pub attributes: HashMap<String, String>,

    /// Lease duration in seconds, as a non-negative integer string.
    /// Absent or "0" means the rule is permanent. Only meaningful on Insert.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_seconds: Option<String>,
}

impl RuleCommand {
    /// Create an insert command
    pub fn insert(attributes: HashMap<String, String>, lease_seconds: Option<&str>) -> Self {
        Self {
            operation: Operation::Insert,
            attributes,
            lease_seconds: lease_seconds.map(str::to_string),
        }
    }

    /// Create a delete command for the same attributes
    pub fn delete(attributes: HashMap<String, String>) -> Self {
        Self {
            operation: Operation::Delete,
            attributes,
            lease_seconds: None,
        }
    }

    /// Compute this command's order-independent identity
    pub fn identity(&self) -> RuleIdentity {
        RuleIdentity::of(&self.attributes)
    }

    /// Effective lease in seconds, falling back to the configured default
    /// when the command carries none. Rejects anything that is not a
    /// non-negative integer string.
    pub fn lease(&self, default_lease: &str) -> Result<u64, CommandError> {
        let raw = self.lease_seconds.as_deref().unwrap_or(default_lease);
        raw.parse::<u64>()
            .map_err(|_| CommandError::InvalidLease(raw.to_string()))
    }
}

/// Canonical, hashable identity of a rule's attribute map. Two commands with
/// equal attribute content produce equal identities regardless of map order.
/// Used only for set membership in the rule mirror.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleIdentity(String);

impl RuleIdentity {
    pub fn of(attributes: &HashMap<String, String>) -> Self {
        let mut pairs: Vec<(&String, &String)> = attributes.iter().collect();
        pairs.sort();

        // Unit/record separators keep "a=bc" and "ab=c" style collisions out
        let canonical = pairs
            .iter()
            .map(|(k, v)| format!("{}\u{1f}{}", k, v))
            .collect::<Vec<_>>()
            .join("\u{1e}");
        RuleIdentity(canonical)
    }
}

#[derive(Debug)]
pub enum CommandError {
    /// Lease value is not a valid non-negative integer string
    InvalidLease(String),
    /// The engine workers are no longer running
    EngineStopped,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::InvalidLease(v) => write!(f, "Invalid lease value: {:?}", v),
            CommandError::EngineStopped => write!(f, "Engine is not running"),
        }
    }
}

impl std::error::Error for CommandError {}
