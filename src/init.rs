/// Init-process duties
///
/// When started as PID 1 nothing has set up the system yet: procfs must be
/// mounted before devices can be enumerated, and the console log level is
/// lowered so kernel messages don't draw over the menu.
use std::io;
use std::path::Path;

use crate::error::InitError;
use crate::logger::DebugLog;
use crate::mount::Mounter;

/// Init process PID (always 1 in Unix-like systems)
pub const INIT_PID: u32 = 1;

pub const PROC_MOUNT_POINT: &str = "/proc";

/// console, default message, minimum console and default console levels
pub const PRINTK_LEVELS: &str = "0 4 1 7\n";

/// Returns `true` when running as init. Failing to mount procfs is fatal.
pub fn detect_init(pid: u32, mounter: &dyn Mounter, printk_path: &Path, log: &mut DebugLog) -> Result<bool, InitError> {
    if pid != INIT_PID {
        return Ok(false);
    }

    log.info(format_args!("I'm the init-process!"));

    mounter
        .mount("proc", Path::new(PROC_MOUNT_POINT), Some("proc"), false)
        .map_err(InitError::ProcMount)?;

    // CONFIG_PRINTK may be disabled
    if let Err(e) = set_console_loglevel(printk_path) {
        log.warn(format_args!("{}: {}", printk_path.display(), e));
    }

    Ok(true)
}

fn set_console_loglevel(printk_path: &Path) -> io::Result<()> {
    std::fs::write(printk_path, PRINTK_LEVELS)
}
