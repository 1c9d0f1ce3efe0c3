//! Machine quirks
//!
//! Some flash devices report a wrong size through the block layer. The
//! settings file can override the block count per device path.

use std::collections::BTreeMap;

use crate::config::QuirkSettings;
use crate::scan::BlockQuirks;

#[derive(Debug, Clone, Default)]
pub struct ConfiguredQuirks {
    block_overrides: BTreeMap<String, u64>,
}

impl ConfiguredQuirks {
    pub fn new(settings: &QuirkSettings) -> Self {
        Self {
            block_overrides: settings.block_overrides.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.block_overrides.is_empty()
    }
}

impl BlockQuirks for ConfiguredQuirks {
    fn block_override(&self, device: &str) -> Option<u64> {
        self.block_overrides.get(device).copied()
    }
}
