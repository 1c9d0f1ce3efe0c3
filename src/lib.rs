//! kexecboot
//!
//! Userspace boot orchestrator: finds bootable kernels on the attached block
//! devices, presents them in a menu and hands over to the chosen one through
//! kexec. Can run as an ordinary program or as PID 1.

pub mod action;
pub mod catalog;
pub mod config;
pub mod console;
pub mod devices;
pub mod error;
pub mod init;
pub mod launch;
pub mod logger;
pub mod menu;
pub mod mount;
pub mod populate;
pub mod power;
pub mod probe;
pub mod process;
pub mod quirks;
pub mod scan;
pub mod ui;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use action::{Action, BOOT_BASE};
pub use catalog::{BootCatalog, BootInfo, BootItem, DeviceClass, DeviceInfo, IconHandle};
pub use config::{HostContext, Settings};
pub use error::{ConfigError, InitError, LaunchError, ProbeError, ProcessError, ScanError, UiError};
pub use logger::DebugLog;
pub use menu::{Menu, MenuItem};
pub use ui::{Session, Step, UiContext};
