//! Boot catalog
//!
//! Entries discovered during one scan pass. The index an entry receives on
//! commit stays valid for the whole cycle and is what the menu uses to refer
//! back to it (see [`crate::action::BOOT_BASE`]).

use std::path::PathBuf;
use std::sync::Arc;

use crate::error::ScanError;

/// Kind of block device a boot entry lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceClass {
    /// Hard disks and USB storage
    Storage,
    /// SD/MMC cards
    Mmc,
    /// Raw flash (MTD block devices)
    Mtd,
    Unknown,
}

impl DeviceClass {
    /// Priority given to entries whose prober didn't report one
    pub const fn default_priority(self) -> i32 {
        match self {
            DeviceClass::Mmc => 3,
            DeviceClass::Storage => 2,
            DeviceClass::Mtd => 1,
            DeviceClass::Unknown => 0,
        }
    }
}

/// Decoded icon data, opaque to everything except the renderer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconHandle(Arc<Vec<u8>>);

impl IconHandle {
    pub fn new(data: Vec<u8>) -> Self {
        Self(Arc::new(data))
    }

    pub fn data(&self) -> &[u8] {
        &self.0
    }
}

/// A block device handed out by the device enumerator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub device: String,
    pub fstype: String,
    pub class: DeviceClass,
    /// Capacity in 1 KiB blocks
    pub blocks: u64,
}

/// What the boot-info prober found on a mounted filesystem
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootInfo {
    pub kernel: String,
    pub initrd: Option<String>,
    /// Overrides the filesystem type reported by the enumerator
    pub fstype: Option<String>,
    pub cmdline: Option<String>,
    pub label: Option<String>,
    pub icon: Option<PathBuf>,
    pub priority: Option<i32>,
}

/// One bootable kernel plus everything needed to launch it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootItem {
    pub device: String,
    pub fstype: Option<String>,
    pub kernel: String,
    pub initrd: Option<String>,
    pub cmdline: Option<String>,
    pub label: Option<String>,
    pub icon: Option<IconHandle>,
    pub class: DeviceClass,
    pub priority: i32,
    pub blocks: u64,
}

impl BootItem {
    /// Combine device metadata with probe results
    pub fn from_probe(dev: &DeviceInfo, info: BootInfo) -> Self {
        let fstype = info
            .fstype
            .or_else(|| Some(dev.fstype.clone()))
            .filter(|s| !s.is_empty());

        Self {
            device: dev.device.clone(),
            fstype,
            kernel: info.kernel,
            initrd: non_empty(info.initrd),
            cmdline: non_empty(info.cmdline),
            label: non_empty(info.label),
            icon: None,
            class: dev.class,
            priority: info.priority.unwrap_or_else(|| dev.class.default_priority()),
            blocks: dev.blocks,
        }
    }

    /// Text shown in the menu
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.kernel)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

/// Boot entries of one scan cycle, in commit order
#[derive(Debug, Default)]
pub struct BootCatalog {
    items: Vec<BootItem>,
}

impl BootCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty catalog with room for `capacity` entries
    pub fn with_capacity(capacity: usize) -> Result<Self, ScanError> {
        let mut items = Vec::new();
        items
            .try_reserve(capacity)
            .map_err(|_| ScanError::Allocation)?;
        Ok(Self { items })
    }

    /// Append an entry and return its catalog index
    pub fn commit(&mut self, item: BootItem) -> Result<usize, ScanError> {
        self.items.try_reserve(1).map_err(|_| ScanError::Allocation)?;
        self.items.push(item);
        Ok(self.items.len() - 1)
    }

    pub fn get(&self, index: usize) -> Option<&BootItem> {
        self.items.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut BootItem> {
        self.items.get_mut(index)
    }

    pub fn items(&self) -> &[BootItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Take an entry out of the catalog, consuming it
    pub fn into_item(mut self, index: usize) -> Option<BootItem> {
        if index < self.items.len() {
            Some(self.items.swap_remove(index))
        } else {
            None
        }
    }
}
