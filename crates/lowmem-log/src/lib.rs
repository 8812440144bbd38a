//! A minimal, zero-dependency logging crate for the `lowmem` heap.
//!
//! Every line goes to stderr: the heap sits underneath an embedded
//! interpreter, and stdout belongs to whatever the interpreter prints.
//! Besides the usual leveled macros the crate provides [`fatal!`], the single
//! termination path for configuration errors that cannot be recovered from
//! (heap allocation at startup, out-of-range pointer compression).
//!
//! # Example
//!
//! ```
//! use lowmem_log::{debug, info, warn, Level};
//!
//! lowmem_log::set_level(Level::Debug);
//!
//! let pools = 23;
//! info!("Initialized heap with {} pools", pools);
//! debug!("Free list heads: {:?}", [0u32, 80, 200]);
//! warn!("Pool 16 is close to exhaustion");
//! ```

use std::fmt::Arguments;
use std::io::Write;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU8, Ordering};

/// Name of the environment variable read by [`init_from_env`].
pub const LOG_ENV: &str = "LOWMEM_LOG";

/// Log levels, ordered from most severe (`Error`) to least severe (`Trace`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    /// Failures that break an operation.
    Error = 0,
    /// Suspicious situations (leaked strings, exhausted pools).
    Warn = 1,
    /// Startup summaries and heap dumps.
    Info = 2,
    /// Allocator decisions.
    Debug = 3,
    /// Per-call tracing of external string lookups.
    Trace = 4,
}

impl Level {
    const fn color_code(self) -> &'static str {
        match self {
            Level::Error => "\x1b[31m",
            Level::Warn => "\x1b[33m",
            Level::Info => "\x1b[32m",
            Level::Debug => "\x1b[36m",
            Level::Trace => "\x1b[35m",
        }
    }

    /// Returns the upper-case name of this level.
    pub const fn as_str(self) -> &'static str {
        match self {
            Level::Error => "ERROR",
            Level::Warn => "WARN",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        }
    }

    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Level::Error,
            1 => Level::Warn,
            2 => Level::Info,
            3 => Level::Debug,
            _ => Level::Trace,
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Level {
    type Err = String;

    /// Parses a level name, ignoring case.
    ///
    /// ```
    /// use lowmem_log::Level;
    ///
    /// assert_eq!("trace".parse::<Level>(), Ok(Level::Trace));
    /// assert!("loud".parse::<Level>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ERROR" => Ok(Level::Error),
            "WARN" | "WARNING" => Ok(Level::Warn),
            "INFO" => Ok(Level::Info),
            "DEBUG" => Ok(Level::Debug),
            "TRACE" => Ok(Level::Trace),
            _ => Err(format!("Invalid log level: {s}")),
        }
    }
}

/// The process-wide logger. Only the level filter is mutable.
pub struct Logger {
    level: AtomicU8,
}

impl Logger {
    const fn new(level: Level) -> Self {
        Logger {
            level: AtomicU8::new(level as u8),
        }
    }

    /// Sets the minimum level that gets written.
    pub fn set_level(&self, level: Level) {
        self.level.store(level as u8, Ordering::SeqCst);
    }

    /// Returns the current minimum level.
    pub fn level(&self) -> Level {
        Level::from_u8(self.level.load(Ordering::Relaxed))
    }

    /// Returns true if a message at `level` passes the filter.
    pub fn enabled(&self, level: Level) -> bool {
        level as u8 <= self.level.load(Ordering::Relaxed)
    }
}

static LOGGER: OnceLock<Logger> = OnceLock::new();

/// Returns the global logger, creating it at `Level::Info` on first use.
pub fn get_logger() -> &'static Logger {
    LOGGER.get_or_init(|| Logger::new(Level::Info))
}

/// Sets the minimum level of the global logger.
pub fn set_level(level: Level) {
    get_logger().set_level(level);
}

/// Sets the minimum level from a level name.
///
/// ```
/// lowmem_log::set_level_from_str("debug").unwrap();
/// assert!(lowmem_log::set_level_from_str("chatty").is_err());
/// ```
pub fn set_level_from_str(s: &str) -> Result<(), String> {
    set_level(s.parse()?);
    Ok(())
}

/// Applies `LOWMEM_LOG` to the global logger.
///
/// An unset variable leaves the level untouched; an unparsable value is an
/// error so typos in operator tuning sessions do not go unnoticed.
pub fn init_from_env() -> Result<Option<Level>, String> {
    match std::env::var(LOG_ENV) {
        Ok(value) => {
            let level: Level = value.parse()?;
            set_level(level);
            Ok(Some(level))
        }
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => {
            Err(format!("{LOG_ENV} is not valid unicode"))
        }
    }
}

fn write_line(level: Level, target: &str, args: Arguments) {
    const RESET: &str = "\x1b[0m";

    let color = level.color_code();
    let mut stderr = std::io::stderr().lock();
    // A broken stderr must never take the allocator down with it.
    let _ = writeln!(stderr, "{color}[{level}]{RESET} {target}: {args}");
}

#[doc(hidden)]
pub fn __log_with_target(level: Level, target: &str, args: Arguments) {
    if get_logger().enabled(level) {
        write_line(level, target, args);
    }
}

#[doc(hidden)]
pub fn __fatal(target: &str, args: Arguments) -> ! {
    write_line(Level::Error, target, args);
    let _ = std::io::stderr().flush();
    std::process::abort()
}

/// Renders bytes for a log line.
///
/// Printable ASCII is kept, anything else (and the quote and backslash
/// characters) becomes `\xNN`. With `until_nul` the output stops at the first
/// NUL byte, which is how external strings are printed when only their start
/// pointer is known.
///
/// ```
/// use lowmem_log::escape_bytes;
///
/// assert_eq!(escape_bytes(b"\xffThread", false), "\"\\xffThread\"");
/// assert_eq!(escape_bytes(b"abc\0def", true), "\"abc\"");
/// ```
pub fn escape_bytes(bytes: &[u8], until_nul: bool) -> String {
    let mut out = String::with_capacity(bytes.len() + 2);
    out.push('"');
    for &b in bytes {
        if until_nul && b == 0 {
            break;
        }
        if b < 0x20 || b >= 0x7e || matches!(b, b'"' | b'\'' | b'\\') {
            out.push_str(&format!("\\x{b:02x}"));
        } else {
            out.push(b as char);
        }
    }
    out.push('"');
    out
}

/// Logs at an explicit level, tagging the line with the caller's module path.
#[macro_export]
macro_rules! log {
    (level: $level:expr, $($arg:tt)*) => {
        {
            if $crate::get_logger().enabled($level) {
                $crate::__log_with_target(
                    $level,
                    module_path!(),
                    format_args!($($arg)*)
                );
            }
        }
    };
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::log!(level: $crate::Level::Error, $($arg)*)
    };
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::log!(level: $crate::Level::Warn, $($arg)*)
    };
}

#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::log!(level: $crate::Level::Info, $($arg)*)
    };
}

#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::log!(level: $crate::Level::Debug, $($arg)*)
    };
}

#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => {
        $crate::log!(level: $crate::Level::Trace, $($arg)*)
    };
}

/// Writes an error line regardless of the level filter and aborts.
///
/// Reserved for static configuration errors where continuing would corrupt
/// the addressing scheme.
#[macro_export]
macro_rules! fatal {
    ($($arg:tt)*) => {
        $crate::__fatal(module_path!(), format_args!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(Level::Error < Level::Warn);
        assert!(Level::Warn < Level::Info);
        assert!(Level::Info < Level::Debug);
        assert!(Level::Debug < Level::Trace);
    }

    #[test]
    fn test_level_parsing() {
        assert_eq!("error".parse(), Ok(Level::Error));
        assert_eq!("Warning".parse(), Ok(Level::Warn));
        assert_eq!(" info ".parse(), Ok(Level::Info));
        assert_eq!("DEBUG".parse(), Ok(Level::Debug));
        assert_eq!("trace".parse(), Ok(Level::Trace));
        assert!("verbose".parse::<Level>().is_err());
    }

    #[test]
    fn test_level_display_round_trips() {
        for level in [Level::Error, Level::Warn, Level::Info, Level::Debug, Level::Trace] {
            assert_eq!(level.to_string().parse(), Ok(level));
        }
    }

    #[test]
    fn test_logger_level_filtering() {
        let logger = Logger::new(Level::Warn);

        assert!(logger.enabled(Level::Error));
        assert!(logger.enabled(Level::Warn));
        assert!(!logger.enabled(Level::Info));

        logger.set_level(Level::Trace);
        assert!(logger.enabled(Level::Trace));
        assert_eq!(logger.level(), Level::Trace);
    }

    #[test]
    fn test_escape_printable() {
        assert_eq!(escape_bytes(b"Logger", false), "\"Logger\"");
    }

    #[test]
    fn test_escape_special_bytes() {
        assert_eq!(escape_bytes(b"\n\t", false), "\"\\x0a\\x09\"");
        assert_eq!(escape_bytes(b"a\"b", false), "\"a\\x22b\"");
        assert_eq!(escape_bytes(b"~", false), "\"\\x7e\"");
        assert_eq!(escape_bytes(b"\\", false), "\"\\x5c\"");
    }

    #[test]
    fn test_escape_until_nul() {
        assert_eq!(escape_bytes(b"\0abc", true), "\"\"");
        assert_eq!(escape_bytes(b"\0abc", false), "\"\\x00abc\"");
    }

    #[test]
    fn test_macros_do_not_panic() {
        set_level(Level::Trace);
        error!("error {}", 1);
        warn!("warn {}", 2);
        info!("info {}", 3);
        debug!("debug {}", 4);
        trace!("trace {}", 5);
        set_level(Level::Info);
    }
}
