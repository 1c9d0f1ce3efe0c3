//! Default boot-info prober and icon loader
//!
//! The prober looks for a kernel image at a list of well-known paths under
//! the mount point, trying a machine-specific `boot/zImage-<hardware>` first.

use std::path::{Path, PathBuf};

use crate::catalog::{BootInfo, IconHandle};
use crate::config::Settings;
use crate::error::ProbeError;
use crate::scan::{BootProber, IconDecoder};

pub const CPUINFO_PATH: &str = "/proc/cpuinfo";

/// Machine-specific kernel name from `/proc/cpuinfo` contents
///
/// `Hardware : SHARP Spitz` becomes `boot/zImage-sharp_spitz`.
pub fn machine_kernel_name(cpuinfo: &str) -> Option<String> {
    let line = cpuinfo.lines().find(|l| l.contains("Hardware"))?;
    let (_, hw) = line.split_once(':')?;
    let hw = hw.trim();
    if hw.is_empty() {
        return None;
    }

    let hw: String = hw
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c.to_ascii_lowercase() })
        .collect();
    Some(format!("boot/zImage-{}", hw))
}

/// Probes for kernels at fixed paths
#[derive(Debug, Clone)]
pub struct KernelProber {
    kernel_paths: Vec<String>,
    initrd_names: Vec<String>,
}

impl KernelProber {
    pub fn new(kernel_paths: Vec<String>, initrd_names: Vec<String>) -> Self {
        Self {
            kernel_paths,
            initrd_names,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.kernel_paths.clone(), settings.initrd_names.clone())
    }

    /// Search `name` before the configured paths
    pub fn with_machine_kernel(mut self, name: Option<String>) -> Self {
        if let Some(name) = name {
            self.kernel_paths.insert(0, name);
        }
        self
    }

    /// Read `/proc/cpuinfo` and prepend the machine-specific kernel, if any
    pub fn detect_machine_kernel(self) -> Self {
        match std::fs::read_to_string(CPUINFO_PATH) {
            Ok(cpuinfo) => {
                let name = machine_kernel_name(&cpuinfo);
                if name.is_none() {
                    log::debug!("Can't find 'Hardware' line in cpuinfo");
                }
                self.with_machine_kernel(name)
            }
            Err(e) => {
                log::warn!("{}: {}", CPUINFO_PATH, e);
                self
            }
        }
    }

    fn find_initrd(&self, kernel: &Path) -> Option<PathBuf> {
        let dir = kernel.parent()?;
        self.initrd_names
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
    }
}

impl BootProber for KernelProber {
    fn probe(&self, mount_point: &Path) -> Result<BootInfo, ProbeError> {
        let kernel = self
            .kernel_paths
            .iter()
            .map(|p| mount_point.join(p.trim_start_matches('/')))
            .find(|path| path.is_file())
            .ok_or_else(|| ProbeError::NotFound(mount_point.to_path_buf()))?;

        let initrd = self.find_initrd(&kernel);
        Ok(BootInfo {
            kernel: kernel.to_string_lossy().into_owned(),
            initrd: initrd.map(|p| p.to_string_lossy().into_owned()),
            ..Default::default()
        })
    }
}

/// Loads icon files as raw bytes for the renderer
#[derive(Debug, Default, Clone, Copy)]
pub struct FileIconLoader;

impl IconDecoder for FileIconLoader {
    fn decode(&self, path: &Path) -> Result<IconHandle, ProbeError> {
        let data = std::fs::read(path).map_err(|e| ProbeError::Icon(path.to_path_buf(), e.to_string()))?;
        if data.is_empty() {
            return Err(ProbeError::Icon(path.to_path_buf(), "empty file".to_string()));
        }
        Ok(IconHandle::new(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn prober() -> KernelProber {
        let settings = Settings::default();
        KernelProber::from_settings(&settings)
    }

    #[test]
    fn test_machine_kernel_name() {
        let cpuinfo = "Processor\t: XScale-PXA270 rev 7 (v5l)\nBogoMIPS\t: 415.33\nHardware\t: SHARP Spitz\nRevision\t: 0000\n";
        assert_eq!(machine_kernel_name(cpuinfo).as_deref(), Some("boot/zImage-sharp_spitz"));
        assert_eq!(machine_kernel_name("processor : 0\n"), None);
    }

    #[test]
    fn test_probe_follows_search_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("boot")).unwrap();
        fs::write(dir.path().join("zImage"), b"kernel").unwrap();
        fs::write(dir.path().join("boot/uImage"), b"kernel").unwrap();

        let info = prober().probe(dir.path()).unwrap();
        assert_eq!(info.kernel, dir.path().join("zImage").to_string_lossy());
        assert_eq!(info.initrd, None);
    }

    #[test]
    fn test_probe_machine_kernel_first() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("boot")).unwrap();
        fs::write(dir.path().join("boot/zImage"), b"kernel").unwrap();
        fs::write(dir.path().join("boot/zImage-sharp_spitz"), b"kernel").unwrap();
        fs::write(dir.path().join("boot/initrd.gz"), b"initrd").unwrap();

        let prober = prober().with_machine_kernel(Some("boot/zImage-sharp_spitz".to_string()));
        let info = prober.probe(dir.path()).unwrap();
        assert!(info.kernel.ends_with("boot/zImage-sharp_spitz"));
        let initrd = dir.path().join("boot/initrd.gz").to_string_lossy().into_owned();
        assert_eq!(info.initrd, Some(initrd));
    }

    #[test]
    fn test_probe_without_kernel() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("zImage")).unwrap();
        assert!(matches!(prober().probe(dir.path()), Err(ProbeError::NotFound(_))));
    }

    #[test]
    fn test_icon_loader() {
        let dir = tempfile::tempdir().unwrap();
        let icon = dir.path().join("icon.xpm");
        fs::write(&icon, b"/* XPM */").unwrap();
        assert_eq!(FileIconLoader.decode(&icon).unwrap().data(), b"/* XPM */");

        fs::write(&icon, b"").unwrap();
        assert!(FileIconLoader.decode(&icon).is_err());
        assert!(FileIconLoader.decode(&dir.path().join("missing.xpm")).is_err());
    }
}
