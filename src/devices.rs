//! Block device enumeration
//!
//! Candidates come from `/proc/partitions`. Whole disks that carry
//! partitions are skipped, as are ram and loop devices. The filesystem type
//! is read from the superblock so the device can be mounted without
//! guessing.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use crate::catalog::{DeviceClass, DeviceInfo};
use crate::error::ScanError;
use crate::scan::DeviceEnumerator;

pub const PROC_PARTITIONS: &str = "/proc/partitions";
pub const DEV_DIR: &str = "/dev";

// ext2/3/4 superblock lives at byte 1024
const EXT_MAGIC_OFFSET: usize = 1024 + 56;
const EXT_COMPAT_OFFSET: usize = 1024 + 92;
const EXT_INCOMPAT_OFFSET: usize = 1024 + 96;
const EXT_MAGIC: u16 = 0xEF53;
const EXT_COMPAT_HAS_JOURNAL: u32 = 0x0004;
const EXT_INCOMPAT_EXTENTS: u32 = 0x0040;
const EXT_INCOMPAT_64BIT: u32 = 0x0080;
const JFFS2_MAGIC: u16 = 0x1985;
const SUPERBLOCK_SIZE: usize = 2048;

/// One line of `/proc/partitions`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub name: String,
    pub blocks: u64,
}

/// Parse `/proc/partitions`, skipping the header and malformed lines
pub fn parse_partitions(text: &str) -> Vec<Partition> {
    text.lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() != 4 {
                return None;
            }
            let blocks = fields[2].parse().ok()?;
            Some(Partition {
                name: fields[3].to_string(),
                blocks,
            })
        })
        .collect()
}

/// Drop ram/loop devices and whole disks that have partitions
pub fn boot_candidates(partitions: Vec<Partition>) -> Vec<Partition> {
    let names: Vec<String> = partitions.iter().map(|p| p.name.clone()).collect();
    partitions
        .into_iter()
        .filter(|p| !p.name.starts_with("ram") && !p.name.starts_with("loop"))
        .filter(|p| !names.iter().any(|other| is_partition_of(other, &p.name)))
        .collect()
}

/// `sda1` is a partition of `sda`, `mmcblk0p1` of `mmcblk0`
fn is_partition_of(name: &str, disk: &str) -> bool {
    let Some(rest) = name.strip_prefix(disk) else {
        return false;
    };
    let rest = if disk.ends_with(|c: char| c.is_ascii_digit()) {
        match rest.strip_prefix('p') {
            Some(rest) => rest,
            None => return false,
        }
    } else {
        rest
    };
    !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit())
}

pub fn device_class(name: &str) -> DeviceClass {
    if name.starts_with("mmcblk") {
        DeviceClass::Mmc
    } else if name.starts_with("mtdblock") {
        DeviceClass::Mtd
    } else if name.starts_with("sd") || name.starts_with("hd") {
        DeviceClass::Storage
    } else {
        DeviceClass::Unknown
    }
}

fn le16(buf: &[u8], offset: usize) -> Option<u16> {
    let bytes = buf.get(offset..offset + 2)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

fn le32(buf: &[u8], offset: usize) -> Option<u32> {
    let bytes = buf.get(offset..offset + 4)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Filesystem type from the first bytes of a device
pub fn detect_fstype(buf: &[u8]) -> Option<&'static str> {
    if le16(buf, EXT_MAGIC_OFFSET) == Some(EXT_MAGIC) {
        let compat = le32(buf, EXT_COMPAT_OFFSET).unwrap_or(0);
        let incompat = le32(buf, EXT_INCOMPAT_OFFSET).unwrap_or(0);
        return Some(if incompat & (EXT_INCOMPAT_EXTENTS | EXT_INCOMPAT_64BIT) != 0 {
            "ext4"
        } else if compat & EXT_COMPAT_HAS_JOURNAL != 0 {
            "ext3"
        } else {
            "ext2"
        });
    }

    if buf.get(510..512) == Some(&[0x55, 0xAA][..]) {
        let fat16 = buf.get(54..57) == Some(&b"FAT"[..]);
        let fat32 = buf.get(82..85) == Some(&b"FAT"[..]);
        if fat16 || fat32 {
            return Some("vfat");
        }
    }

    if le16(buf, 0) == Some(JFFS2_MAGIC) {
        return Some("jffs2");
    }

    None
}

fn read_superblock(path: &Path) -> io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(SUPERBLOCK_SIZE);
    File::open(path)?
        .take(SUPERBLOCK_SIZE as u64)
        .read_to_end(&mut buf)?;
    Ok(buf)
}

/// [`DeviceEnumerator`] over `/proc/partitions`
pub struct ProcPartitions {
    partitions_path: PathBuf,
    dev_dir: PathBuf,
    queue: VecDeque<Partition>,
}

impl ProcPartitions {
    pub fn new() -> Self {
        Self::with_paths(PROC_PARTITIONS, DEV_DIR)
    }

    pub fn with_paths(partitions_path: impl Into<PathBuf>, dev_dir: impl Into<PathBuf>) -> Self {
        Self {
            partitions_path: partitions_path.into(),
            dev_dir: dev_dir.into(),
            queue: VecDeque::new(),
        }
    }
}

impl Default for ProcPartitions {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceEnumerator for ProcPartitions {
    fn open(&mut self) -> Result<(), ScanError> {
        let text = std::fs::read_to_string(&self.partitions_path)
            .map_err(|e| ScanError::EnumeratorStart(format!("{:?}: {}", self.partitions_path, e)))?;
        self.queue = boot_candidates(parse_partitions(&text)).into();
        Ok(())
    }

    fn next_device(&mut self) -> Result<Option<DeviceInfo>, ScanError> {
        let Some(partition) = self.queue.pop_front() else {
            return Ok(None);
        };

        let path = self.dev_dir.join(&partition.name);
        let superblock = read_superblock(&path)
            .map_err(|e| ScanError::Device(format!("{}: {}", path.display(), e)))?;
        let fstype = detect_fstype(&superblock)
            .ok_or_else(|| ScanError::Device(format!("{}: unknown filesystem", path.display())))?;

        Ok(Some(DeviceInfo {
            device: path.to_string_lossy().into_owned(),
            fstype: fstype.to_string(),
            class: device_class(&partition.name),
            blocks: partition.blocks,
        }))
    }
}
