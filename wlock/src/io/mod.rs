//! Diagnostic sink: a coloured console and the `log` backend writing to it.

pub mod console;
pub mod logging;

pub use logging::DiagnosticStyle;
