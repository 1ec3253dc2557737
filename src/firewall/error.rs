use std::fmt;

#[derive(Debug)]
pub enum FirewallError {
    /// The underlying iptables invocation failed
    IPTablesError(String),
    /// A rule's attribute map cannot be rendered as a firewall rule
    RuleError(String),
    /// Enumerating the live firewall state failed
    LoadError(String),
}

impl fmt::Display for FirewallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FirewallError::IPTablesError(e) => write!(f, "IPTables error: {}", e),
            FirewallError::RuleError(e) => write!(f, "Rule error: {}", e),
            FirewallError::LoadError(e) => write!(f, "Load error: {}", e),
        }
    }
}

impl std::error::Error for FirewallError {}

impl From<String> for FirewallError {
    fn from(e: String) -> Self {
        FirewallError::IPTablesError(e)
    }
}
