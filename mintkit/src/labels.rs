//! Off-chain names and symbols for mints.
//!
//! Mint creation only writes decimals and authorities on-chain, so the
//! name/symbol entered in the create flow live here instead.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use tracing::debug;

use crate::error::Result;
use crate::types::{TokenHolding, TokenLabel};

/// Labels keyed by mint address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelBook {
    labels: BTreeMap<String, TokenLabel>,
}

impl LabelBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON file; a missing file yields an empty book.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        let book: LabelBook = serde_json::from_str(&raw)?;
        debug!(path = %path.display(), count = book.len(), "labels loaded");
        Ok(book)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(path, raw)?;
        debug!(path = %path.display(), count = self.len(), "labels saved");
        Ok(())
    }

    pub fn insert(&mut self, mint: &Pubkey, label: TokenLabel) {
        self.labels.insert(mint.to_string(), label);
    }

    pub fn get(&self, mint: &Pubkey) -> Option<&TokenLabel> {
        self.labels.get(&mint.to_string())
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Attach known labels to `holdings` in place.
    pub fn apply(&self, holdings: &mut [TokenHolding]) {
        for holding in holdings {
            holding.label = self.get(&holding.mint).cloned();
        }
    }
}
