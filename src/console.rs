//! Text console front end
//!
//! [`Renderer`] draws the menu, the debug log and short messages;
//! [`InputSource`] turns key presses into [`Action`]s. The default
//! implementations drive an ANSI terminal.

use std::fmt::Write as _;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::io::{AsRawFd, RawFd};
use std::time::Duration;

use crate::action::Action;
use crate::logger::DebugLog;
use crate::menu::Menu;

pub mod ansi {
    pub const CURSOR_HOME: &str = "\x1b[H";
    pub const CLEAR_SCREEN: &str = "\x1b[2J";
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";
    pub const REVERSE: &str = "\x1b[7m";
}

pub trait Renderer {
    fn show_menu(&mut self, menu: &Menu);
    fn show_text(&mut self, log: &DebugLog);
    fn show_message(&mut self, message: &str);
}

pub trait InputSource {
    /// Block until the next action. `Timeout` when the configured timeout
    /// elapses without input, `Error` when the input can't be read.
    fn next_action(&mut self) -> Action;
}

// ============================================================================
// Renderer
// ============================================================================

/// Rows available for log lines when the terminal size is unknown
const DEFAULT_TEXT_ROWS: usize = 20;

/// [`Renderer`] writing ANSI text to a terminal
pub struct TextRenderer<W: Write> {
    out: W,
    text_rows: usize,
    buffer: String,
}

impl TextRenderer<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> TextRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            text_rows: DEFAULT_TEXT_ROWS,
            buffer: String::with_capacity(4096),
        }
    }

    pub fn with_text_rows(mut self, rows: usize) -> Self {
        self.text_rows = rows.max(1);
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn begin(&mut self) {
        self.buffer.clear();
        self.buffer.push_str(ansi::CLEAR_SCREEN);
        self.buffer.push_str(ansi::CURSOR_HOME);
    }

    fn flush(&mut self) {
        let result = self
            .out
            .write_all(self.buffer.as_bytes())
            .and_then(|_| self.out.flush());
        if let Err(e) = result {
            log::warn!("Can't draw: {}", e);
        }
        self.buffer.clear();
    }
}

impl<W: Write> Renderer for TextRenderer<W> {
    fn show_menu(&mut self, menu: &Menu) {
        self.begin();
        let _ = write!(
            self.buffer,
            "{}kexecboot {}{}\r\n\r\n",
            ansi::BOLD,
            env!("CARGO_PKG_VERSION"),
            ansi::RESET
        );

        let level = menu.current_level();
        for (i, item) in level.items().iter().enumerate() {
            if i == level.current() {
                let _ = write!(self.buffer, "{}> {}{}", ansi::REVERSE, item.label, ansi::RESET);
            } else {
                let _ = write!(self.buffer, "  {}", item.label);
            }
            if let Some(description) = &item.description {
                let _ = write!(self.buffer, "  {}{}{}", ansi::DIM, description, ansi::RESET);
            }
            self.buffer.push_str("\r\n");
        }
        self.flush();
    }

    fn show_text(&mut self, log: &DebugLog) {
        self.begin();
        for row in log.rows().iter().skip(log.current_line()).take(self.text_rows) {
            self.buffer.push_str(row);
            self.buffer.push_str("\r\n");
        }
        self.flush();
    }

    fn show_message(&mut self, message: &str) {
        self.begin();
        for line in message.lines() {
            self.buffer.push_str(line);
            self.buffer.push_str("\r\n");
        }
        self.flush();
    }
}

// ============================================================================
// Terminal
// ============================================================================

/// Terminal the menu runs on: the configured tty, or stdin
pub struct Tty {
    file: Option<File>,
}

impl Tty {
    pub fn open(path: Option<&str>) -> io::Result<Self> {
        let file = match path {
            Some(path) => Some(OpenOptions::new().read(true).write(true).open(path)?),
            None => None,
        };
        Ok(Self { file })
    }

    pub fn fd(&self) -> RawFd {
        match &self.file {
            Some(file) => file.as_raw_fd(),
            None => libc::STDIN_FILENO,
        }
    }
}

/// Echo and canonical mode off while alive
pub struct TerminalGuard {
    fd: RawFd,
    saved: libc::termios,
}

impl TerminalGuard {
    pub fn disable_echo(fd: RawFd) -> io::Result<Self> {
        let mut termios: libc::termios = unsafe { std::mem::zeroed() };
        if unsafe { libc::tcgetattr(fd, &mut termios) } != 0 {
            return Err(io::Error::last_os_error());
        }

        let saved = termios;
        termios.c_lflag &= !(libc::ECHO | libc::ICANON);
        termios.c_cc[libc::VMIN] = 1;
        termios.c_cc[libc::VTIME] = 0;

        if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &termios) } != 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(Self { fd, saved })
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if unsafe { libc::tcsetattr(self.fd, libc::TCSANOW, &self.saved) } != 0 {
            log::warn!("Can't restore terminal: {}", io::Error::last_os_error());
        }
    }
}

// ============================================================================
// Keyboard input
// ============================================================================

/// Map one read from the terminal to an action
pub fn decode_key(bytes: &[u8]) -> Action {
    match bytes {
        b"\x1b[A" | b"\x1bOA" | b"k" | b"w" => Action::Up,
        b"\x1b[B" | b"\x1bOB" | b"j" | b"s" => Action::Down,
        b"\r" | b"\n" | b" " | b"\x1b[C" | b"\x1bOC" => Action::Select,
        b"q" => Action::Exit,
        _ => Action::None,
    }
}

/// [`InputSource`] reading keys from a terminal
///
/// The timeout only runs until the first key press.
pub struct KeyInput {
    fd: RawFd,
    timeout: Option<Duration>,
}

impl KeyInput {
    pub fn new(fd: RawFd, timeout: Option<Duration>) -> Self {
        Self { fd, timeout }
    }

    fn wait(&self) -> io::Result<bool> {
        let timeout_ms = match self.timeout {
            Some(t) => i32::try_from(t.as_millis()).unwrap_or(i32::MAX),
            None => -1,
        };
        let mut pfd = libc::pollfd {
            fd: self.fd,
            events: libc::POLLIN,
            revents: 0,
        };

        loop {
            match unsafe { libc::poll(&mut pfd, 1, timeout_ms) } {
                -1 => {
                    let err = io::Error::last_os_error();
                    if err.kind() == io::ErrorKind::Interrupted {
                        continue;
                    }
                    return Err(err);
                }
                0 => return Ok(false),
                _ => return Ok(true),
            }
        }
    }

    fn read_key(&self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let n = unsafe { libc::read(self.fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
            if n >= 0 {
                return Ok(n as usize);
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }
}

impl InputSource for KeyInput {
    fn next_action(&mut self) -> Action {
        let mut buf = [0u8; 8];
        loop {
            match self.wait() {
                Ok(true) => {}
                Ok(false) => {
                    self.timeout = None;
                    return Action::Timeout;
                }
                Err(e) => {
                    log::error!("Can't wait for input: {}", e);
                    return Action::Error;
                }
            }

            let n = match self.read_key(&mut buf) {
                Ok(0) => {
                    log::error!("Input closed");
                    return Action::Error;
                }
                Ok(n) => n,
                Err(e) => {
                    log::error!("Can't read input: {}", e);
                    return Action::Error;
                }
            };

            self.timeout = None;
            match decode_key(&buf[..n]) {
                Action::None => continue,
                action => return action,
            }
        }
    }
}
