//! Filesystem mounting
//!
//! Boot devices are always mounted read-only at a single, process-wide mount
//! point. Callers must pair every successful [`Mounter::mount`] with a
//! [`Mounter::umount`].

use std::ffi::CString;
use std::io;
use std::path::Path;
use std::ptr;

/// mount(2)/umount(2) seam
pub trait Mounter {
    fn mount(&self, source: &str, target: &Path, fstype: Option<&str>, read_only: bool) -> io::Result<()>;

    fn umount(&self, target: &Path) -> io::Result<()>;
}

/// [`Mounter`] backed by real system calls
#[derive(Debug, Default, Clone, Copy)]
pub struct SysMounter;

impl Mounter for SysMounter {
    fn mount(&self, source: &str, target: &Path, fstype: Option<&str>, read_only: bool) -> io::Result<()> {
        let c_source = to_cstring(source)?;
        let c_target = path_cstring(target)?;
        let c_fstype = fstype.map(to_cstring).transpose()?;
        let flags = if read_only { libc::MS_RDONLY } else { 0 };

        let ret = unsafe {
            libc::mount(
                c_source.as_ptr(),
                c_target.as_ptr(),
                c_fstype.as_ref().map_or(ptr::null(), |s| s.as_ptr()),
                flags,
                ptr::null(),
            )
        };
        if ret == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn umount(&self, target: &Path) -> io::Result<()> {
        let c_target = path_cstring(target)?;
        if unsafe { libc::umount(c_target.as_ptr()) } == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

fn to_cstring(s: &str) -> io::Result<CString> {
    CString::new(s).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
}

fn path_cstring(path: &Path) -> io::Result<CString> {
    use std::os::unix::ffi::OsStrExt;
    CString::new(path.as_os_str().as_bytes()).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashSet;

    /// Mount call recorded by [`RecordingMounter`]
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum MountCall {
        Mount(String),
        Umount,
    }

    /// Records calls; mounting devices listed in `failing` returns an error
    #[derive(Default)]
    pub struct RecordingMounter {
        pub failing: HashSet<String>,
        pub fail_umount: bool,
        pub calls: RefCell<Vec<MountCall>>,
        mounted: RefCell<bool>,
    }

    impl RecordingMounter {
        pub fn failing(devices: &[&str]) -> Self {
            Self {
                failing: devices.iter().map(|d| d.to_string()).collect(),
                ..Default::default()
            }
        }

        /// True when every successful mount was followed by an umount
        pub fn balanced(&self) -> bool {
            !*self.mounted.borrow()
        }

        pub fn mounts(&self) -> usize {
            self.calls
                .borrow()
                .iter()
                .filter(|c| matches!(c, MountCall::Mount(_)))
                .count()
        }
    }

    impl Mounter for RecordingMounter {
        fn mount(&self, source: &str, _target: &Path, _fstype: Option<&str>, read_only: bool) -> io::Result<()> {
            assert!(read_only, "boot devices must be mounted read-only");
            assert!(!*self.mounted.borrow(), "mount point is already in use");
            if self.failing.contains(source) {
                return Err(io::Error::from_raw_os_error(libc::EINVAL));
            }
            self.calls.borrow_mut().push(MountCall::Mount(source.to_string()));
            *self.mounted.borrow_mut() = true;
            Ok(())
        }

        fn umount(&self, _target: &Path) -> io::Result<()> {
            self.calls.borrow_mut().push(MountCall::Umount);
            *self.mounted.borrow_mut() = false;
            if self.fail_umount {
                return Err(io::Error::from_raw_os_error(libc::EBUSY));
            }
            Ok(())
        }
    }
}
