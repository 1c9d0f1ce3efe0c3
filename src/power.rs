//! Reboot and power-off

use std::io;

/// Kernel power transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerAction {
    Restart,
    PowerOff,
}

impl PowerAction {
    /// Message shown while the transition is requested
    pub fn message(self) -> &'static str {
        match self {
            PowerAction::Restart => "Rebooting...",
            PowerAction::PowerOff => "Shutting down...",
        }
    }
}

pub trait PowerControl {
    /// Flush filesystem buffers
    fn sync(&self);

    /// Ask the kernel to restart or power off. Returns only on failure.
    fn reboot(&self, action: PowerAction) -> io::Result<()>;
}

/// [`PowerControl`] backed by `sync(2)` and `reboot(2)`
#[derive(Debug, Default, Clone, Copy)]
pub struct SysPower;

impl PowerControl for SysPower {
    fn sync(&self) {
        unsafe { libc::sync() };
    }

    fn reboot(&self, action: PowerAction) -> io::Result<()> {
        let cmd = match action {
            PowerAction::Restart => libc::RB_AUTOBOOT,
            PowerAction::PowerOff => libc::RB_POWER_OFF,
        };
        if unsafe { libc::reboot(cmd) } == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

/// Host-debug stand-in: logs instead of touching the machine
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunPower;

impl PowerControl for DryRunPower {
    fn sync(&self) {}

    fn reboot(&self, action: PowerAction) -> io::Result<()> {
        log::info!("dry run: {:?} requested", action);
        Err(io::Error::new(io::ErrorKind::Unsupported, "dry run"))
    }
}
