//! Debug log sink
//!
//! Every message goes to the `log` facade (stderr through `env_logger`) and is
//! kept as a row in [`DebugLog`] so the text view can page through it.

use core::fmt;
use std::collections::VecDeque;
use std::time::Instant;

use log::Level;

/// Timestamped rows with a line cursor for the text view
pub struct DebugLog {
    started: Instant,
    rows: VecDeque<String>,
    current_line: usize,
    max_rows: Option<usize>,
}

impl DebugLog {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            rows: VecDeque::new(),
            current_line: 0,
            max_rows: None,
        }
    }

    /// Keep at most `max_rows` rows, dropping the oldest ones
    pub fn with_capacity_limit(max_rows: usize) -> Self {
        Self {
            max_rows: Some(max_rows.max(1)),
            ..Self::new()
        }
    }

    pub fn log(&mut self, level: Level, args: fmt::Arguments<'_>) {
        log::log!(level, "{}", args);

        let elapsed = self.started.elapsed();
        let row = format!(
            "[{timestamp}] [{level}] {message}",
            timestamp = TimestampDisplay {
                microseconds: elapsed.as_micros() as u64,
            },
            level = LevelDisplay(level),
            message = args,
        );

        if let Some(max) = self.max_rows {
            if self.rows.len() >= max {
                self.rows.pop_front();
                self.current_line = self.current_line.saturating_sub(1);
            }
        }
        self.rows.push_back(row);
    }

    pub fn info(&mut self, args: fmt::Arguments<'_>) {
        self.log(Level::Info, args);
    }

    pub fn warn(&mut self, args: fmt::Arguments<'_>) {
        self.log(Level::Warn, args);
    }

    pub fn error(&mut self, args: fmt::Arguments<'_>) {
        self.log(Level::Error, args);
    }

    pub fn debug(&mut self, args: fmt::Arguments<'_>) {
        self.log(Level::Debug, args);
    }

    pub fn rows(&self) -> &VecDeque<String> {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of the first row shown by the text view
    pub fn current_line(&self) -> usize {
        self.current_line
    }

    /// Move the cursor one line up; stops at the first line
    pub fn line_up(&mut self) {
        self.current_line = self.current_line.saturating_sub(1);
    }

    /// Move the cursor one line down; stops at the last line
    pub fn line_down(&mut self) {
        if self.current_line + 1 < self.rows.len() {
            self.current_line += 1;
        }
    }
}

impl Default for DebugLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse `log=`/`loglevel=` from a kernel command line
pub fn parse_level_directive(cmdline: &str) -> Option<log::LevelFilter> {
    for token in cmdline.split_whitespace() {
        if let Some((key, value)) = token.split_once('=') {
            if key.eq_ignore_ascii_case("log") || key.eq_ignore_ascii_case("loglevel") {
                if let Some(level) = level_from_str(value) {
                    return Some(level);
                }
            }
        }
    }
    None
}

fn level_from_str(value: &str) -> Option<log::LevelFilter> {
    // Numeric values follow the kernel console levels
    if let Ok(n) = value.parse::<u8>() {
        return Some(match n {
            0..=3 => log::LevelFilter::Error,
            4 => log::LevelFilter::Warn,
            5 | 6 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        });
    }
    if value.eq_ignore_ascii_case("off") {
        Some(log::LevelFilter::Off)
    } else if value.eq_ignore_ascii_case("error") {
        Some(log::LevelFilter::Error)
    } else if value.eq_ignore_ascii_case("warn") || value.eq_ignore_ascii_case("warning") {
        Some(log::LevelFilter::Warn)
    } else if value.eq_ignore_ascii_case("info") {
        Some(log::LevelFilter::Info)
    } else if value.eq_ignore_ascii_case("debug") {
        Some(log::LevelFilter::Debug)
    } else if value.eq_ignore_ascii_case("trace") {
        Some(log::LevelFilter::Trace)
    } else {
        None
    }
}

struct TimestampDisplay {
    microseconds: u64,
}

impl fmt::Display for TimestampDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let seconds = self.microseconds / 1_000_000;
        let micros = self.microseconds % 1_000_000;
        write!(f, "{:>5}.{:06}", seconds, micros)
    }
}

struct LevelDisplay(Level);

impl fmt::Display for LevelDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<5}", self.0.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_are_formatted() {
        let mut log = DebugLog::new();
        log.info(format_args!("kexecboot starting"));
        log.warn(format_args!("+ can't mount device: {}", "EINVAL"));

        assert_eq!(log.len(), 2);
        assert!(log.rows()[0].ends_with("[INFO ] kexecboot starting"));
        assert!(log.rows()[1].contains("[WARN ] + can't mount device: EINVAL"));
    }

    #[test]
    fn test_cursor_is_clamped() {
        let mut log = DebugLog::new();
        log.line_up();
        log.line_down();
        assert_eq!(log.current_line(), 0);

        for i in 0..3 {
            log.info(format_args!("line {}", i));
        }
        for _ in 0..10 {
            log.line_down();
        }
        assert_eq!(log.current_line(), 2);
        for _ in 0..10 {
            log.line_up();
        }
        assert_eq!(log.current_line(), 0);
    }

    #[test]
    fn test_capacity_limit_drops_oldest() {
        let mut log = DebugLog::with_capacity_limit(2);
        log.info(format_args!("a"));
        log.info(format_args!("b"));
        log.line_down();
        log.info(format_args!("c"));

        assert_eq!(log.len(), 2);
        assert!(log.rows()[0].ends_with(" b"));
        assert_eq!(log.current_line(), 0);

        for i in 0..10 {
            log.info(format_args!("row {}", i));
        }
        assert_eq!(log.len(), 2);
        assert!(log.rows()[0].ends_with(" row 8"));
        assert!(log.rows()[1].ends_with(" row 9"));
    }

    #[test]
    fn test_parse_level_directive() {
        assert_eq!(
            parse_level_directive("console=ttyS0 loglevel=debug quiet"),
            Some(log::LevelFilter::Debug)
        );
        assert_eq!(parse_level_directive("log=3"), Some(log::LevelFilter::Error));
        assert_eq!(parse_level_directive("root=/dev/sda1 rootwait"), None);
    }
}
