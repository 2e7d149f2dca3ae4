//! Console output for diagnostics.
//!
//! Everything goes through `std`'s `print!`, so output produced inside a
//! test is captured by the test harness like any other.

use core::fmt;

/// Foreground colours the logger and test banners use, as SGR codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Color {
    Red = 31,
    Green = 32,
    Blue = 34,
    BrightBlack = 90,
    BrightYellow = 93,
}

/// Writes `args` to stdout unchanged.
pub fn print(args: fmt::Arguments) {
    std::print!("{}", args);
}

/// Writes `args` between the escape sequences for `color` and a reset.
///
/// One `print!` per call, so a line from the render thread is never split
/// by one from the control thread.
pub fn color_print(color: Color, args: fmt::Arguments) {
    std::print!("\x1B[{}m{}\x1B[0m", color as u8, args);
}

/// `print!` in `$color`. Takes the same format arguments as `print!`.
///
/// ```
/// use wlock::io::console::Color;
///
/// wlock::color_print!(Color::Red, "FAIL");
/// ```
#[macro_export]
macro_rules! color_print {
    ($color:expr, $($arg:tt)+) => {
        $crate::io::console::color_print($color, format_args!($($arg)+))
    };
}

/// `println!` in `$color`; the newline is written inside the colour reset.
#[macro_export]
macro_rules! color_println {
    ($color:expr, $($arg:tt)+) => {
        $crate::io::console::color_print($color, format_args!("{}\n", format_args!($($arg)+)))
    };
}
