//! The shared test protocol.
//!
//! Contexts agree on one phase word next to the lock word. Whoever observes
//! a phase on its turn performs that phase's lock operation, checks the
//! result and stores the next phase. The sequence only ever moves forward:
//!
//! ```text
//! LOADING -> NOT_STARTED -> TRY_ACQUIRE -> WAIT_ACQUIRE_FAIL
//!         -> WAIT_ACQUIRE -> RELEASE -> DONE
//! ```

use core::sync::atomic::{AtomicU32, Ordering};

use alloc::vec::Vec;
use bitflags::bitflags;
use strum_macros::{Display, EnumCount, EnumIter, FromRepr};

use crate::error::CoordinatorError;
use crate::sync::spin::WordMutex;

mod control;
mod coordinator;
mod test;

pub use control::ControlLoop;
pub use coordinator::{bootstrap, Coordinator, CoordinatorConfig, TurnOutcome};

/// One step of the protocol, in order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
    Display, EnumCount, EnumIter, FromRepr,
)]
#[repr(u32)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    /// The render context has not come up yet
    Loading = 0,
    /// Render context is up, waiting for the control context to start
    NotStarted = 1,
    /// Lock held by control, render must fail to take it
    TryAcquire = 2,
    /// Still held, render's bounded spin must time out
    WaitAcquireFail = 3,
    /// Control releases while render spins; render must get it
    WaitAcquire = 4,
    /// Render releases and re-takes the lock
    Release = 5,
    /// Finished
    Done = 6,
}

impl Phase {
    /// Validate a raw cell value.
    pub fn decode(raw: u32) -> Result<Self, CoordinatorError> {
        Self::from_repr(raw).ok_or(CoordinatorError::CorruptPhase(raw))
    }

    /// The phase that follows this one, `None` for [`Phase::Done`].
    pub fn next(self) -> Option<Self> {
        Self::from_repr(self as u32 + 1)
    }
}

bitflags! {
    /// What kind of execution context is driving a turn.
    pub struct ContextCaps: u8 {
        /// Real-time render callback
        const RENDER = 1 << 0;
        /// Main control flow (timer driven)
        const CONTROL = 1 << 1;
        /// May park on a blocking atomic wait
        const CAN_WAIT = 1 << 2;
    }
}

/// Phases in the order they were stored during one run.
pub type PhaseTrace = WordMutex<Vec<Phase>>;

/// View over the shared phase word.
#[derive(Clone, Copy)]
pub struct PhaseCell<'a> {
    cell: &'a AtomicU32,
    trace: Option<&'a PhaseTrace>,
}

impl<'a> PhaseCell<'a> {
    pub const fn new(cell: &'a AtomicU32) -> Self {
        Self { cell, trace: None }
    }

    /// Record every store into `trace`.
    pub const fn traced(cell: &'a AtomicU32, trace: &'a PhaseTrace) -> Self {
        Self {
            cell,
            trace: Some(trace),
        }
    }

    /// Set the starting phase. Only the two bootstrap phases are accepted.
    ///
    /// Whichever context starts first claims the zeroed cell; a later start
    /// finds the cell already past LOADING and leaves it alone. Returns
    /// whether this call claimed the cell.
    pub fn init(&self, phase: Phase) -> Result<bool, CoordinatorError> {
        if !matches!(phase, Phase::Loading | Phase::NotStarted) {
            return Err(CoordinatorError::NonMonotonic {
                from: Phase::Loading,
                to: phase,
            });
        }

        // Trace held across the CAS so no advance is recorded ahead of it.
        let mut trace = self.trace.map(|trace| trace.lock());
        match self.cell.compare_exchange(
            Phase::Loading as u32,
            phase as u32,
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(_) => {
                if let Some(trace) = trace.as_mut() {
                    trace.push(phase);
                }
                Ok(true)
            }
            Err(raw) => {
                let current = Phase::decode(raw)?;
                log::debug!("phase already at {}, keeping it over {}", current, phase);
                Ok(false)
            }
        }
    }

    /// Read and validate the current phase.
    pub fn load(&self) -> Result<Phase, CoordinatorError> {
        Phase::decode(self.cell.load(Ordering::SeqCst))
    }

    /// Move from `from` to the later phase `to`.
    ///
    /// `from` is what the caller observed at the start of its turn; the
    /// store is unconditional because only one context owns each phase.
    pub fn advance(&self, from: Phase, to: Phase) -> Result<(), CoordinatorError> {
        if to <= from {
            return Err(CoordinatorError::NonMonotonic { from, to });
        }
        log::debug!("phase {} -> {}", from, to);
        self.store(to);
        Ok(())
    }

    fn store(&self, phase: Phase) {
        // Record first: once the store lands another context may act on it
        // and record its own advance.
        if let Some(trace) = self.trace {
            trace.lock().push(phase);
        }
        self.cell.store(phase as u32, Ordering::SeqCst);
    }
}
