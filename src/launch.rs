//! Kernel launch
//!
//! Two-phase hand-over through kexec: `kexec -l` stages the chosen kernel
//! while its device is mounted, then `kexec -e` replaces this process and the
//! running kernel. Every failure here is fatal to the caller.

use std::convert::Infallible;
use std::io;
use std::path::{Path, PathBuf};

use crate::catalog::BootItem;
use crate::config::HostContext;
use crate::error::LaunchError;
use crate::logger::DebugLog;
use crate::mount::Mounter;
use crate::process::Spawner;

const ROOT: &str = "root=";
const ROOTFSTYPE: &str = " rootfstype=";
const ROOTWAIT: &str = " rootwait";
// Tags passed from the host kernel command line to the new kernel
const MTDPARTS: &str = " mtdparts=";
const FBCON: &str = " fbcon=";

/// Kernel command line for `item`
pub fn build_cmdline(item: &BootItem, host: &HostContext) -> String {
    let fstype = item.fstype.as_deref();
    let mtdparts = host.mtdparts.as_deref();
    let fbcon = host.fbcon.as_deref();
    let extra = item.cmdline.as_deref();

    let len = ROOT.len()
        + item.device.len()
        + fstype.map_or(0, |s| ROOTFSTYPE.len() + s.len())
        + ROOTWAIT.len()
        + mtdparts.map_or(0, |s| MTDPARTS.len() + s.len())
        + fbcon.map_or(0, |s| FBCON.len() + s.len())
        + extra.map_or(0, |s| 1 + s.len());

    let mut cmdline = String::with_capacity(len);
    cmdline.push_str(ROOT);
    cmdline.push_str(&item.device);
    if let Some(fstype) = fstype {
        cmdline.push_str(ROOTFSTYPE);
        cmdline.push_str(fstype);
    }
    cmdline.push_str(ROOTWAIT);
    if let Some(mtdparts) = mtdparts {
        cmdline.push_str(MTDPARTS);
        cmdline.push_str(mtdparts);
    }
    if let Some(fbcon) = fbcon {
        cmdline.push_str(FBCON);
        cmdline.push_str(fbcon);
    }
    if let Some(extra) = extra {
        cmdline.push(' ');
        cmdline.push_str(extra);
    }

    debug_assert_eq!(cmdline.len(), len);
    cmdline
}

/// `true` when the kernel has no networking support (`path` doesn't exist)
pub fn network_absent(path: &Path) -> io::Result<bool> {
    match std::fs::metadata(path) {
        Ok(_) => Ok(false),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(true),
        Err(e) => Err(e),
    }
}

pub struct Launcher {
    kexec_path: String,
    mount_point: PathBuf,
    net_probe_path: PathBuf,
    mounter: Box<dyn Mounter>,
    spawner: Box<dyn Spawner>,
}

impl Launcher {
    pub fn new(
        kexec_path: impl Into<String>,
        mount_point: impl Into<PathBuf>,
        net_probe_path: impl Into<PathBuf>,
        mounter: Box<dyn Mounter>,
        spawner: Box<dyn Spawner>,
    ) -> Self {
        Self {
            kexec_path: kexec_path.into(),
            mount_point: mount_point.into(),
            net_probe_path: net_probe_path.into(),
            mounter,
            spawner,
        }
    }

    /// `kexec -l --command-line=... [--initrd=...] <kernel>`
    pub fn load_argv(&self, item: &BootItem, host: &HostContext) -> Vec<String> {
        let mut argv = Vec::with_capacity(5);
        argv.push(self.kexec_path.clone());
        argv.push("-l".to_string());
        argv.push(format!("--command-line={}", build_cmdline(item, host)));
        if let Some(initrd) = &item.initrd {
            argv.push(format!("--initrd={}", initrd));
        }
        argv.push(item.kernel.clone());
        argv
    }

    /// `kexec -e [-x]`; `-x` keeps kexec from taking interfaces down
    pub fn exec_argv(&self, no_network: bool) -> Vec<String> {
        let mut argv = vec![self.kexec_path.clone(), "-e".to_string()];
        if no_network {
            argv.push("-x".to_string());
        }
        argv
    }

    /// Load and boot `item`. Never returns on success.
    pub fn launch(&self, item: &BootItem, host: &HostContext, log: &mut DebugLog) -> Result<Infallible, LaunchError> {
        let load_argv = self.load_argv(item, host);
        log.debug(format_args!("load_argv: {}", load_argv.join(", ")));

        self.mounter
            .mount(&item.device, &self.mount_point, item.fstype.as_deref(), true)
            .map_err(|source| LaunchError::Mount {
                device: item.device.clone(),
                source,
            })?;

        let loaded = self.spawner.run(&self.kexec_path, &load_argv, &[]);

        if let Err(e) = self.mounter.umount(&self.mount_point) {
            log.warn(format_args!("Can't umount boot device: {}", e));
        }

        match loaded {
            Ok(status) if status.success() => {}
            Ok(status) => return Err(LaunchError::Load(status.to_string())),
            Err(e) => return Err(LaunchError::Load(e.to_string())),
        }

        let no_network = match network_absent(&self.net_probe_path) {
            Ok(absent) => absent,
            Err(e) => {
                log.warn(format_args!("Can't stat {:?}: {}", self.net_probe_path, e));
                false
            }
        };
        if no_network {
            log.info(format_args!("No network is detected, disabling ifdown()"));
        }

        let exec_argv = self.exec_argv(no_network);
        log.debug(format_args!("exec_argv: {}", exec_argv.join(", ")));

        Err(LaunchError::Exec(self.spawner.replace(&self.kexec_path, &exec_argv, &[])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DeviceClass;
    use crate::error::ProcessError;
    use crate::mount::mock::{MountCall, RecordingMounter};
    use crate::process::ExitStatus;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn item() -> BootItem {
        BootItem {
            device: "/dev/sda1".to_string(),
            fstype: Some("ext3".to_string()),
            kernel: "/mnt/boot/zImage".to_string(),
            initrd: None,
            cmdline: Some("quiet".to_string()),
            label: None,
            icon: None,
            class: DeviceClass::Storage,
            priority: 2,
            blocks: 4096,
        }
    }

    fn host() -> HostContext {
        HostContext {
            mtdparts: Some("foo".to_string()),
            fbcon: Some("bar".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_cmdline_full() {
        assert_eq!(
            build_cmdline(&item(), &host()),
            "root=/dev/sda1 rootfstype=ext3 rootwait mtdparts=foo fbcon=bar quiet"
        );
    }

    #[test]
    fn test_cmdline_minimal() {
        let mut item = item();
        item.fstype = None;
        item.cmdline = None;
        assert_eq!(build_cmdline(&item, &HostContext::default()), "root=/dev/sda1 rootwait");
    }

    #[test]
    fn test_cmdline_partial_host_tags() {
        let host = HostContext {
            fbcon: Some("rotate:1".to_string()),
            ..Default::default()
        };
        assert_eq!(
            build_cmdline(&item(), &host),
            "root=/dev/sda1 rootfstype=ext3 rootwait fbcon=rotate:1 quiet"
        );
    }

    #[derive(Default)]
    struct RecordingSpawner {
        status: Option<ExitStatus>,
        runs: Rc<RefCell<Vec<Vec<String>>>>,
        replaced: Rc<RefCell<Option<Vec<String>>>>,
    }

    impl Spawner for RecordingSpawner {
        fn run(&self, _path: &str, argv: &[String], envp: &[String]) -> Result<ExitStatus, ProcessError> {
            assert!(envp.is_empty());
            self.runs.borrow_mut().push(argv.to_vec());
            self.status
                .ok_or_else(|| ProcessError::Spawn(io::Error::from_raw_os_error(libc::EAGAIN)))
        }

        fn replace(&self, _path: &str, argv: &[String], _envp: &[String]) -> ProcessError {
            *self.replaced.borrow_mut() = Some(argv.to_vec());
            ProcessError::Exec(io::Error::from_raw_os_error(libc::ENOEXEC))
        }
    }

    struct SharedMounter(Rc<RecordingMounter>);

    impl Mounter for SharedMounter {
        fn mount(&self, source: &str, target: &Path, fstype: Option<&str>, read_only: bool) -> io::Result<()> {
            self.0.mount(source, target, fstype, read_only)
        }

        fn umount(&self, target: &Path) -> io::Result<()> {
            self.0.umount(target)
        }
    }

    fn launcher(
        spawner: RecordingSpawner,
        mounter: Rc<RecordingMounter>,
        net_probe: &Path,
    ) -> Launcher {
        Launcher::new(
            "/usr/sbin/kexec",
            "/mnt",
            net_probe,
            Box::new(SharedMounter(mounter)),
            Box::new(spawner),
        )
    }

    #[test]
    fn test_load_argv_with_initrd() {
        let mut item = item();
        item.initrd = Some("/mnt/boot/initrd.gz".to_string());
        let dir = tempfile::tempdir().unwrap();
        let launcher = launcher(RecordingSpawner::default(), Rc::default(), dir.path());

        assert_eq!(
            launcher.load_argv(&item, &host()),
            vec![
                "/usr/sbin/kexec",
                "-l",
                "--command-line=root=/dev/sda1 rootfstype=ext3 rootwait mtdparts=foo fbcon=bar quiet",
                "--initrd=/mnt/boot/initrd.gz",
                "/mnt/boot/zImage",
            ]
        );
    }

    #[test]
    fn test_launch_sequence_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let spawner = RecordingSpawner {
            status: Some(ExitStatus::Exited(0)),
            ..Default::default()
        };
        let runs = spawner.runs.clone();
        let replaced = spawner.replaced.clone();
        let mounter = Rc::new(RecordingMounter::default());
        let launcher = launcher(spawner, mounter.clone(), &dir.path().join("net"));

        let err = launcher.launch(&item(), &host(), &mut DebugLog::new()).unwrap_err();

        assert!(matches!(err, LaunchError::Exec(_)));
        assert_eq!(runs.borrow().len(), 1);
        assert_eq!(runs.borrow()[0].len(), 4);
        assert_eq!(
            replaced.borrow().clone().unwrap(),
            vec!["/usr/sbin/kexec", "-e", "-x"]
        );
        assert_eq!(
            *mounter.calls.borrow(),
            vec![MountCall::Mount("/dev/sda1".to_string()), MountCall::Umount]
        );
    }

    #[test]
    fn test_launch_with_network_keeps_ifdown() {
        let dir = tempfile::tempdir().unwrap();
        let spawner = RecordingSpawner {
            status: Some(ExitStatus::Exited(0)),
            ..Default::default()
        };
        let replaced = spawner.replaced.clone();
        let launcher = launcher(spawner, Rc::default(), dir.path());

        launcher.launch(&item(), &host(), &mut DebugLog::new()).unwrap_err();
        assert_eq!(replaced.borrow().clone().unwrap(), vec!["/usr/sbin/kexec", "-e"]);
    }

    #[test]
    fn test_mount_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let spawner = RecordingSpawner::default();
        let runs = spawner.runs.clone();
        let mounter = Rc::new(RecordingMounter::failing(&["/dev/sda1"]));
        let launcher = launcher(spawner, mounter.clone(), dir.path());

        let err = launcher.launch(&item(), &host(), &mut DebugLog::new()).unwrap_err();
        assert!(matches!(err, LaunchError::Mount { .. }));
        assert!(runs.borrow().is_empty());
        assert!(mounter.balanced());
    }

    #[test]
    fn test_load_failure_unmounts() {
        let dir = tempfile::tempdir().unwrap();
        for status in [Some(ExitStatus::Exited(1)), None] {
            let spawner = RecordingSpawner {
                status,
                ..Default::default()
            };
            let replaced = spawner.replaced.clone();
            let mounter = Rc::new(RecordingMounter::default());
            let launcher = launcher(spawner, mounter.clone(), dir.path());

            let err = launcher.launch(&item(), &host(), &mut DebugLog::new()).unwrap_err();
            assert!(matches!(err, LaunchError::Load(_)));
            assert!(replaced.borrow().is_none());
            assert_eq!(mounter.mounts(), 1);
            assert!(mounter.balanced());
        }
    }

    #[test]
    fn test_network_probe() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!network_absent(dir.path()).unwrap());
        assert!(network_absent(&dir.path().join("missing")).unwrap());
    }
}
