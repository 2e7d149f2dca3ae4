//! A `log` backend that prints records to the console, coloured by level.
//!
//! Lines look like `[WLOCK][ INFO][render] TRY_ACQUIRE: false (expect: false)`,
//! where the bracketed context is the name of the thread that logged.
//! Whether escape codes are emitted is an injected [`DiagnosticStyle`], never
//! sniffed from the terminal.

use core::fmt;
use std::{env, thread};

use log::{self, Level, LevelFilter, Log, Metadata, Record};
use spin::Once;
use strum_macros::{Display, EnumString};

use super::console::{color_print, print, Color};

/// How log lines are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum DiagnosticStyle {
    /// ANSI colour per level
    #[default]
    Colored,
    /// No escape codes
    Plain,
}

static STYLE: Once<DiagnosticStyle> = Once::new();

/// # Initialization
/// Installs the console logger and sets the level from the `LOG` variable,
/// read at run time first and at compile time otherwise:
/// - "ERROR" -> `LevelFilter::Error`
/// - "WARN" -> `LevelFilter::Warn`
/// - "INFO" -> `LevelFilter::Info`
/// - "DEBUG" -> `LevelFilter::Debug`
/// - "TRACE" -> `LevelFilter::Trace`
/// - Any other value -> `LevelFilter::Off`
///
/// The first call wins; later calls return the `log` crate's error and leave
/// the installed logger and style untouched.
pub fn init(style: DiagnosticStyle) -> Result<(), log::SetLoggerError> {
    static LOGGER: ConsoleLogger = ConsoleLogger;
    log::set_logger(&LOGGER)?;
    STYLE.call_once(|| style);
    log::set_max_level(level_from_env());
    Ok(())
}

/// [`init`] for test binaries, where every test races to install the logger.
pub fn init_for_tests() {
    let _ = init(DiagnosticStyle::Colored);
}

fn level_from_env() -> LevelFilter {
    let level = env::var("LOG").ok();
    match level.as_deref().or(option_env!("LOG")) {
        Some("ERROR") => LevelFilter::Error,
        Some("WARN") => LevelFilter::Warn,
        Some("INFO") => LevelFilter::Info,
        Some("DEBUG") => LevelFilter::Debug,
        Some("TRACE") => LevelFilter::Trace,
        _ => LevelFilter::Off,
    }
}

struct ConsoleLogger;

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let current = thread::current();
        let context = current.name().unwrap_or("-");
        let style = STYLE.get().copied().unwrap_or_default();
        let emit = |args: fmt::Arguments| match style {
            DiagnosticStyle::Colored => color_print(level_to_color(record.level()), args),
            DiagnosticStyle::Plain => print(args),
        };
        emit(format_args!(
            "[WLOCK][{:>5}][{}] {}\n",
            record.level(),
            context,
            record.args()
        ));
    }

    fn flush(&self) {}
}

/// Converts a log level to the corresponding ANSI color.
fn level_to_color(level: Level) -> Color {
    match level {
        Level::Error => Color::Red,
        Level::Warn => Color::BrightYellow,
        Level::Info => Color::Blue,
        Level::Debug => Color::Green,
        Level::Trace => Color::BrightBlack,
    }
}
