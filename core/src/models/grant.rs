//! Purchase grants for gated datasets

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Wallets that purchased access to one gated dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGrant {
    /// Dataset the grant belongs to
    pub dataset_id: String,

    /// Purchaser wallet addresses
    pub purchasers: BTreeSet<String>,
}

impl AccessGrant {
    /// Create an empty grant
    pub fn new(dataset_id: impl Into<String>) -> Self {
        AccessGrant {
            dataset_id: dataset_id.into(),
            purchasers: BTreeSet::new(),
        }
    }

    /// Add a purchaser; returns false if already present
    pub fn add(&mut self, purchaser: &str) -> bool {
        self.purchasers.insert(purchaser.to_string())
    }

    /// Whether `address` purchased access
    pub fn contains(&self, address: &str) -> bool {
        self.purchasers.contains(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_is_idempotent() {
        let mut grant = AccessGrant::new("dataset_1");
        assert!(grant.add("0xB"));
        assert!(!grant.add("0xB"));
        assert_eq!(grant.purchasers.len(), 1);
        assert!(grant.contains("0xB"));
        assert!(!grant.contains("0xC"));
    }
}
