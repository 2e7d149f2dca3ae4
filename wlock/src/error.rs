//! Errors surfaced by the lock protocol.
//!
//! Nothing here crosses a context boundary: each context inspects its own
//! results and decides whether to keep running.

use core::fmt;

use strum_macros::Display;

use crate::phase::{ContextCaps, Phase};

/// Lock operation a phase performs, named in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum LockOp {
    TryAcquire,
    BusySpinWaitAcquire,
}

/// A lock operation returned something other than what its phase expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolViolation {
    pub phase: Phase,
    pub op: LockOp,
    pub expected: bool,
    pub actual: bool,
}

impl fmt::Display for ProtocolViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} returned {} (expected {})",
            self.phase, self.op, self.actual, self.expected
        )
    }
}

/// Failures of a coordinator or control-loop turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorError {
    /// A phase's lock operation disagreed with its expectation.
    /// The coordinator stops advancing after this.
    Protocol(ProtocolViolation),

    /// The phase cell holds a value outside the phase sequence.
    CorruptPhase(u32),

    /// The lock cell holds something other than FREE or HELD.
    CorruptLock(u32),

    /// The turn was driven from a context with the wrong capabilities.
    /// - `expected`: flags the driver requires
    /// - `actual`: flags the context declared
    WrongContext {
        expected: ContextCaps,
        actual: ContextCaps,
    },

    /// An earlier turn already failed; the phase it stopped at, `None`
    /// when the phase cell itself was unreadable.
    Halted(Option<Phase>),

    /// The bootstrap could not take the lock on a freshly initialised cell.
    BootstrapLockFailed,

    /// A phase was asked to move backwards or to stay put.
    /// - `from`: current phase
    /// - `to`: requested phase
    NonMonotonic { from: Phase, to: Phase },
}

impl fmt::Display for CoordinatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Protocol(violation) => write!(f, "protocol violation: {}", violation),
            Self::CorruptPhase(raw) => write!(f, "phase cell corrupted: {:#x}", raw),
            Self::CorruptLock(raw) => write!(f, "lock cell corrupted: {:#x}", raw),
            Self::WrongContext { expected, actual } => {
                write!(f, "wrong context: expected {:?}, got {:?}", expected, actual)
            }
            Self::Halted(Some(phase)) => write!(f, "halted at {}", phase),
            Self::Halted(None) => write!(f, "halted on a corrupt phase cell"),
            Self::BootstrapLockFailed => write!(f, "bootstrap failed to take a free lock"),
            Self::NonMonotonic { from, to } => {
                write!(f, "phase cannot move from {} to {}", from, to)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for CoordinatorError {}

/// Offset resolution failures in a shared region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionError {
    /// Offset is not a multiple of the word size.
    /// - `offset`: byte offset requested
    /// - `alignment`: required alignment
    Misaligned { offset: usize, alignment: usize },

    /// Offset does not leave room for a whole word.
    /// - `offset`: byte offset requested
    /// - `size`: region size in bytes
    OutOfRange { offset: usize, size: usize },

    /// Lock and phase were mapped onto the same word.
    Overlapping(usize),
}

impl fmt::Display for RegionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Misaligned { offset, alignment } => {
                write!(f, "offset {:#x} is not {}-byte aligned", offset, alignment)
            }
            Self::OutOfRange { offset, size } => {
                write!(f, "offset {:#x} is outside a {}-byte region", offset, size)
            }
            Self::Overlapping(offset) => write!(f, "both cells mapped at {:#x}", offset),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for RegionError {}
