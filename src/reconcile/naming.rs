//! Names of the resources this tool owns
//!
//! Current names are what a run creates. Legacy patterns match resources left
//! behind by earlier generations of the tool so they are cleaned up too.

/// Base name of generated block lists
pub const BLOCK_LIST_BASE: &str = "Gateway Sync Block List";

/// Base name of generated allow lists
pub const ALLOW_LIST_BASE: &str = "Gateway Sync Allow List";

/// Name of the DNS rule
pub const DNS_RULE_NAME: &str = "Gateway Sync Filter Lists";

/// Name of the SNI rule
pub const SNI_RULE_NAME: &str = "Gateway Sync Filter Lists - SNI Based Filtering";

/// Name of chunk `index` (0-based) of a list series
pub fn chunk_name(base: &str, index: usize) -> String {
    format!("{} - Chunk {}", base, index + 1)
}

/// Patterns selecting the rules and lists removed during cleanup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamePatterns {
    /// A rule matches when its name contains any of these
    pub rule_contains: Vec<String>,
    /// A list matches when its name contains any of these
    pub list_contains: Vec<String>,
    /// A list matches when its name starts with any of these
    pub list_prefixes: Vec<String>,
}

impl Default for NamePatterns {
    fn default() -> Self {
        Self {
            rule_contains: vec![
                "CGPS Filter Lists".to_string(),
                "Go-CFGW Filter Lists".to_string(),
                DNS_RULE_NAME.to_string(),
            ],
            list_contains: vec!["CGPS".to_string()],
            list_prefixes: vec![
                "Go-CFGW Block List".to_string(),
                "Go-CFGW Allow List".to_string(),
                BLOCK_LIST_BASE.to_string(),
                ALLOW_LIST_BASE.to_string(),
            ],
        }
    }
}

impl NamePatterns {
    /// Whether a rule with this name is owned by the tool
    pub fn matches_rule(&self, name: &str) -> bool {
        self.rule_contains.iter().any(|p| name.contains(p.as_str()))
    }

    /// Whether a list with this name is owned by the tool
    pub fn matches_list(&self, name: &str) -> bool {
        self.list_contains.iter().any(|p| name.contains(p.as_str()))
            || self.list_prefixes.iter().any(|p| name.starts_with(p.as_str()))
    }
}
