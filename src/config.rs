//! Configuration
//!
//! Two sources: the optional settings file (TOML) describing this machine,
//! and the host kernel command line, which carries tags that must be handed
//! on to the next kernel.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/kexecboot.toml";
pub const KEXEC_PATH: &str = "/usr/sbin/kexec";
/// Privileged tool used by `--dry-run`
pub const DRY_RUN_KEXEC_PATH: &str = "/bin/echo";
pub const MOUNT_POINT: &str = "/mnt";
pub const PRINTK_PATH: &str = "/proc/sys/kernel/printk";
pub const NET_PROBE_PATH: &str = "/proc/sys/net";
pub const PROC_CMDLINE: &str = "/proc/cmdline";

// ============================================================================
// Settings file
// ============================================================================

/// Machine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// kexec binary
    pub kexec_path: String,
    /// Where boot devices are mounted while probing and loading
    pub mount_point: PathBuf,
    /// Boot the first entry after this many seconds without input
    pub timeout_secs: Option<u64>,
    /// Wait before scanning, for slow SD/CF cards
    pub delay_secs: Option<u64>,
    pub printk_path: PathBuf,
    pub net_probe_path: PathBuf,
    /// Kernel images searched on each device, relative to the mount point
    pub kernel_paths: Vec<String>,
    /// Initrd names looked up next to the kernel
    pub initrd_names: Vec<String>,
    /// Keep at most this many rows in the debug log
    pub log_rows: usize,
    pub icons: IconPaths,
    pub quirks: QuirkSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            kexec_path: KEXEC_PATH.to_string(),
            mount_point: PathBuf::from(MOUNT_POINT),
            timeout_secs: None,
            delay_secs: None,
            printk_path: PathBuf::from(PRINTK_PATH),
            net_probe_path: PathBuf::from(NET_PROBE_PATH),
            kernel_paths: vec![
                "boot/zImage".to_string(),
                "zImage".to_string(),
                "boot/uImage".to_string(),
                "uImage".to_string(),
            ],
            initrd_names: vec!["initrd".to_string(), "initrd.gz".to_string()],
            log_rows: 256,
            icons: IconPaths::default(),
            quirks: QuirkSettings::default(),
        }
    }
}

/// Default icon files, loaded once at startup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IconPaths {
    pub storage: Option<PathBuf>,
    pub mmc: Option<PathBuf>,
    pub memory: Option<PathBuf>,
    pub system: Option<PathBuf>,
    pub back: Option<PathBuf>,
    pub rescan: Option<PathBuf>,
    pub debug: Option<PathBuf>,
    pub reboot: Option<PathBuf>,
    pub shutdown: Option<PathBuf>,
    pub exit: Option<PathBuf>,
}

/// Machine-specific corrections
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuirkSettings {
    /// Device path to real size in 1 KiB blocks
    pub block_overrides: BTreeMap<String, u64>,
}

impl Settings {
    /// Parse settings from TOML text
    pub fn from_toml(path: &Path, text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Load settings; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_toml(path, &text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Absolute kernel search paths under the mount point
    pub fn kernel_search_paths(&self) -> Vec<PathBuf> {
        self.kernel_paths
            .iter()
            .map(|p| self.mount_point.join(p.trim_start_matches('/')))
            .collect()
    }
}

// ============================================================================
// Host kernel command line
// ============================================================================

/// Values taken from the running kernel's command line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostContext {
    /// `mtdparts=`, passed on so the new kernel sees the same flash layout
    pub mtdparts: Option<String>,
    /// `fbcon=`, passed on to keep the console rotation
    pub fbcon: Option<String>,
    /// `kexecboot_tty=`, terminal used for the menu
    pub tty: Option<String>,
    /// `loglevel=`/`log=`
    pub log_level: Option<log::LevelFilter>,
}

impl HostContext {
    pub fn parse(cmdline: &str) -> Self {
        let mut ctx = HostContext {
            log_level: crate::logger::parse_level_directive(cmdline),
            ..Default::default()
        };

        for token in cmdline.split_whitespace() {
            let Some((key, value)) = token.split_once('=') else {
                continue;
            };
            let value = Some(value.to_string()).filter(|v| !v.is_empty());
            match key {
                "mtdparts" => ctx.mtdparts = value,
                "fbcon" => ctx.fbcon = value,
                "kexecboot_tty" => ctx.tty = value,
                _ => {}
            }
        }

        ctx
    }

    /// Read `/proc/cmdline`; an unreadable file gives an empty context
    pub fn from_proc() -> Self {
        match std::fs::read_to_string(PROC_CMDLINE) {
            Ok(cmdline) => Self::parse(&cmdline),
            Err(e) => {
                log::warn!("Can't read {}: {}", PROC_CMDLINE, e);
                Self::default()
            }
        }
    }
}
