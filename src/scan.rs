//! Device scan
//!
//! Walks the devices offered by a [`DeviceEnumerator`], mounts each one at the
//! boot mount point, asks the [`BootProber`] for a kernel and commits what it
//! finds into a fresh [`BootCatalog`]. A bad device is logged and skipped;
//! only a failure to start the enumerator or to allocate the catalog aborts
//! the scan.

use std::path::{Path, PathBuf};

use crate::catalog::{BootCatalog, BootInfo, BootItem, DeviceInfo, IconHandle};
use crate::error::{ProbeError, ScanError};
use crate::logger::DebugLog;
use crate::mount::Mounter;

/// Initial catalog capacity
const CATALOG_CAPACITY: usize = 4;

/// Source of candidate block devices
pub trait DeviceEnumerator {
    /// Start a new pass over the devices
    fn open(&mut self) -> Result<(), ScanError>;

    /// Next candidate, `Ok(None)` at the end. An error only skips one entry.
    fn next_device(&mut self) -> Result<Option<DeviceInfo>, ScanError>;
}

/// Looks for a kernel on a mounted filesystem
pub trait BootProber {
    fn probe(&self, mount_point: &Path) -> Result<BootInfo, ProbeError>;
}

pub trait IconDecoder {
    fn decode(&self, path: &Path) -> Result<IconHandle, ProbeError>;
}

/// Machine-specific corrections applied after commit
pub trait BlockQuirks {
    /// Replacement block count for `device`, if any
    fn block_override(&self, device: &str) -> Option<u64>;
}

pub struct Scanner {
    enumerator: Box<dyn DeviceEnumerator>,
    prober: Box<dyn BootProber>,
    mounter: Box<dyn Mounter>,
    mount_point: PathBuf,
    icons: Option<Box<dyn IconDecoder>>,
    quirks: Option<Box<dyn BlockQuirks>>,
}

impl Scanner {
    pub fn new(
        enumerator: Box<dyn DeviceEnumerator>,
        prober: Box<dyn BootProber>,
        mounter: Box<dyn Mounter>,
        mount_point: impl Into<PathBuf>,
    ) -> Self {
        Self {
            enumerator,
            prober,
            mounter,
            mount_point: mount_point.into(),
            icons: None,
            quirks: None,
        }
    }

    /// Decode custom icons reported by the prober
    pub fn with_icon_decoder(mut self, icons: Box<dyn IconDecoder>) -> Self {
        self.icons = Some(icons);
        self
    }

    pub fn with_quirks(mut self, quirks: Box<dyn BlockQuirks>) -> Self {
        self.quirks = Some(quirks);
        self
    }

    pub fn mount_point(&self) -> &Path {
        &self.mount_point
    }

    /// Scan all devices and build a new catalog
    pub fn scan(&mut self, log: &mut DebugLog) -> Result<BootCatalog, ScanError> {
        let mut catalog = BootCatalog::with_capacity(CATALOG_CAPACITY)?;

        if let Err(e) = self.enumerator.open() {
            log.error(format_args!("Can't initiate device scan: {}", e));
            return Err(e);
        }

        loop {
            let dev = match self.enumerator.next_device() {
                Ok(Some(dev)) => dev,
                Ok(None) => break,
                Err(e) => {
                    log.warn(format_args!("+ skipping device: {}", e));
                    continue;
                }
            };

            log.info(format_args!("Checking {} ({})", dev.device, dev.fstype));
            let Some((info, icon)) = self.inspect(&dev, log) else {
                continue;
            };

            let index = catalog.commit(BootItem::from_probe(&dev, info))?;
            let Some(item) = catalog.get_mut(index) else {
                continue;
            };

            if let Some(icon) = icon {
                item.icon = Some(icon);
                log.info(format_args!("+ icon added for {} [#{}]", dev.device, index));
            }

            if let Some(blocks) = self.quirks.as_ref().and_then(|q| q.block_override(&dev.device)) {
                log.info(format_args!(
                    "+ size of {} will be changed from {} to {}",
                    dev.device, item.blocks, blocks
                ));
                item.blocks = blocks;
            }

            log.info(format_args!("+ found {} [#{}]", item.kernel, index));
        }

        Ok(catalog)
    }

    /// Mount, probe, unmount. `None` means the device is skipped.
    fn inspect(&self, dev: &DeviceInfo, log: &mut DebugLog) -> Option<(BootInfo, Option<IconHandle>)> {
        let fstype = Some(dev.fstype.as_str()).filter(|s| !s.is_empty());
        if let Err(e) = self.mounter.mount(&dev.device, &self.mount_point, fstype, true) {
            log.warn(format_args!("+ can't mount device: {}", e));
            return None;
        }

        // Nothing may return early between mount and umount
        let probed = self.probe_mounted(log);

        if let Err(e) = self.mounter.umount(&self.mount_point) {
            log.warn(format_args!("+ can't umount device: {}", e));
            return None;
        }

        probed
    }

    fn probe_mounted(&self, log: &mut DebugLog) -> Option<(BootInfo, Option<IconHandle>)> {
        let info = match self.prober.probe(&self.mount_point) {
            Ok(info) => info,
            Err(e) => {
                log.info(format_args!("+ {}", e));
                return None;
            }
        };

        let icon = match (&info.icon, &self.icons) {
            (Some(path), Some(decoder)) => match decoder.decode(path) {
                Ok(icon) => Some(icon),
                Err(e) => {
                    log.warn(format_args!("+ {}", e));
                    return None;
                }
            },
            _ => None,
        };

        Some((info, icon))
    }
}
