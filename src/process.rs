//! Fork, exec and wait
//!
//! Every privileged tool is started through [`fexecw`]. SIGCHLD is blocked and
//! SIGINT/SIGQUIT are ignored in the parent before `fork()`; the child puts
//! the saved dispositions and mask back before `execve()`.
//!
//! Signal dispositions are process-wide: [`fexecw`] assumes a single-threaded
//! caller.

use std::ffi::CString;
use std::io;
use std::mem;
use std::ptr;

use libc::c_char;

use crate::error::ProcessError;

/// Exit status used by the child when `execve()` fails
pub const EXEC_FAILED_STATUS: i32 = 127;

/// How a child process terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Exited(i32),
    Signaled(i32),
}

impl ExitStatus {
    pub fn success(self) -> bool {
        self == ExitStatus::Exited(0)
    }

    fn from_raw(status: libc::c_int) -> Self {
        if libc::WIFEXITED(status) {
            ExitStatus::Exited(libc::WEXITSTATUS(status))
        } else if libc::WIFSIGNALED(status) {
            ExitStatus::Signaled(libc::WTERMSIG(status))
        } else {
            ExitStatus::Exited(status)
        }
    }
}

impl std::fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitStatus::Exited(code) => write!(f, "exit status {}", code),
            ExitStatus::Signaled(sig) => write!(f, "killed by signal {}", sig),
        }
    }
}

/// Process creation as seen by the kernel launcher
pub trait Spawner {
    /// Run a program to completion
    fn run(&self, path: &str, argv: &[String], envp: &[String]) -> Result<ExitStatus, ProcessError>;

    /// Replace the current process image. Returns only on failure.
    fn replace(&self, path: &str, argv: &[String], envp: &[String]) -> ProcessError;
}

/// [`Spawner`] backed by real system calls
#[derive(Debug, Default, Clone, Copy)]
pub struct SysSpawner;

impl Spawner for SysSpawner {
    fn run(&self, path: &str, argv: &[String], envp: &[String]) -> Result<ExitStatus, ProcessError> {
        fexecw(path, argv, envp)
    }

    fn replace(&self, path: &str, argv: &[String], envp: &[String]) -> ProcessError {
        execve(path, argv, envp)
    }
}

// ============================================================================
// C argument vectors
// ============================================================================

/// NULL-terminated `char *[]` with owned storage
struct CArgv {
    _owned: Vec<CString>,
    ptrs: Vec<*const c_char>,
}

impl CArgv {
    fn new(items: &[String]) -> Result<Self, ProcessError> {
        let owned = items
            .iter()
            .map(|s| cstring(s))
            .collect::<Result<Vec<_>, _>>()?;
        let mut ptrs: Vec<*const c_char> = owned.iter().map(|s| s.as_ptr()).collect();
        ptrs.push(ptr::null());
        Ok(Self { _owned: owned, ptrs })
    }

    fn as_ptr(&self) -> *const *const c_char {
        self.ptrs.as_ptr()
    }
}

fn cstring(s: &str) -> Result<CString, ProcessError> {
    CString::new(s).map_err(|_| ProcessError::InvalidArgument(s.to_string()))
}

// ============================================================================
// Signal state
// ============================================================================

/// Signal state saved before `fork()`; restored on drop
struct SignalGuard {
    old_int: libc::sigaction,
    old_quit: libc::sigaction,
    old_mask: libc::sigset_t,
}

impl SignalGuard {
    /// Ignore SIGINT/SIGQUIT and block SIGCHLD
    fn block() -> Self {
        unsafe {
            let mut ignore: libc::sigaction = mem::zeroed();
            ignore.sa_sigaction = libc::SIG_IGN;
            libc::sigemptyset(&mut ignore.sa_mask);
            ignore.sa_flags = 0;

            let mut guard = SignalGuard {
                old_int: mem::zeroed(),
                old_quit: mem::zeroed(),
                old_mask: mem::zeroed(),
            };
            libc::sigaction(libc::SIGINT, &ignore, &mut guard.old_int);
            libc::sigaction(libc::SIGQUIT, &ignore, &mut guard.old_quit);

            let mut masked: libc::sigset_t = mem::zeroed();
            libc::sigemptyset(&mut masked);
            libc::sigaddset(&mut masked, libc::SIGCHLD);
            libc::sigprocmask(libc::SIG_BLOCK, &masked, &mut guard.old_mask);

            guard
        }
    }

    /// Put back the saved state. Async-signal-safe, usable in the child.
    fn restore(&self) {
        unsafe {
            libc::sigaction(libc::SIGINT, &self.old_int, ptr::null_mut());
            libc::sigaction(libc::SIGQUIT, &self.old_quit, ptr::null_mut());
            libc::sigprocmask(libc::SIG_SETMASK, &self.old_mask, ptr::null_mut());
        }
    }
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        self.restore();
    }
}

// ============================================================================
// fork + execve + waitpid
// ============================================================================

/// Run `path` with `argv` and `envp` and wait for it to finish
pub fn fexecw(path: &str, argv: &[String], envp: &[String]) -> Result<ExitStatus, ProcessError> {
    // Everything the child touches is allocated before fork()
    let c_path = cstring(path)?;
    let c_argv = CArgv::new(argv)?;
    let c_envp = CArgv::new(envp)?;

    let guard = SignalGuard::block();

    let pid = unsafe { libc::fork() };
    if pid < 0 {
        return Err(ProcessError::Spawn(io::Error::last_os_error()));
    }

    if pid == 0 {
        guard.restore();
        unsafe {
            libc::execve(c_path.as_ptr(), c_argv.as_ptr(), c_envp.as_ptr());
            libc::_exit(EXEC_FAILED_STATUS);
        }
    }

    let mut status: libc::c_int = 0;
    loop {
        let ret = unsafe { libc::waitpid(pid, &mut status, 0) };
        if ret == pid {
            break;
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(ProcessError::Wait(err));
        }
    }

    drop(guard);
    Ok(ExitStatus::from_raw(status))
}

/// Replace the current process image. Returns only on failure.
pub fn execve(path: &str, argv: &[String], envp: &[String]) -> ProcessError {
    let c_path = match cstring(path) {
        Ok(p) => p,
        Err(e) => return e,
    };
    let c_argv = match CArgv::new(argv) {
        Ok(a) => a,
        Err(e) => return e,
    };
    let c_envp = match CArgv::new(envp) {
        Ok(e) => e,
        Err(e) => return e,
    };

    unsafe {
        libc::execve(c_path.as_ptr(), c_argv.as_ptr(), c_envp.as_ptr());
    }
    ProcessError::Exec(io::Error::last_os_error())
}
