use crate::error::CoordinatorError;
use crate::region::Cells;
use crate::sync::spin::WordLock;
use crate::timer::Clock;

use super::{ContextCaps, Phase, PhaseCell, PhaseTrace, TurnOutcome};

/// The control-context half of the protocol, ticked by a timer.
///
/// It starts the run once the render side reports in, releases the lock
/// while the render side spins in WAIT_ACQUIRE, and times the whole run.
pub struct ControlLoop<'a, C: Clock> {
    lock: WordLock<'a>,
    phase: PhaseCell<'a>,
    clock: C,
    caps: ContextCaps,
    start_ms: f64,
    released: bool,
    elapsed_ms: Option<f64>,
}

impl<'a, C: Clock> ControlLoop<'a, C> {
    /// `start_ms` is what [`bootstrap`](super::bootstrap) returned.
    pub fn new(cells: Cells<'a>, trace: Option<&'a PhaseTrace>, clock: C, start_ms: f64) -> Self {
        let phase = match trace {
            Some(trace) => PhaseCell::traced(cells.phase, trace),
            None => PhaseCell::new(cells.phase),
        };
        Self {
            lock: WordLock::new(cells.lock),
            phase,
            clock,
            caps: ContextCaps::CONTROL,
            start_ms,
            released: false,
            elapsed_ms: None,
        }
    }

    /// Declare the capabilities of the driving context.
    pub fn with_caps(mut self, caps: ContextCaps) -> Self {
        self.caps = caps;
        self
    }

    pub fn turn(&mut self) -> Result<TurnOutcome, CoordinatorError> {
        // A main thread may not park either.
        if !self.caps.contains(ContextCaps::CONTROL)
            || self.caps.intersects(ContextCaps::RENDER | ContextCaps::CAN_WAIT)
        {
            return Err(CoordinatorError::WrongContext {
                expected: ContextCaps::CONTROL,
                actual: self.caps,
            });
        }

        let phase = self.phase.load()?;
        match phase {
            Phase::Loading => log::debug!("{}: still loading", phase),
            Phase::NotStarted => {
                log::info!("{}: starting test", phase);
                self.phase.advance(phase, Phase::TryAcquire)?;
            }
            Phase::TryAcquire | Phase::WaitAcquireFail | Phase::Release => {
                log::trace!("{}: control has nothing to do", phase);
            }
            Phase::WaitAcquire => {
                if self.released {
                    log::debug!("{}: already released", phase);
                } else {
                    self.lock.state()?;
                    log::info!("{}: control releasing lock", phase);
                    self.lock.release();
                    self.released = true;
                }
            }
            Phase::Done => {
                let elapsed = self.clock.now_ms() - self.start_ms;
                log::info!("{}: {:.0}ms", phase, elapsed);
                self.elapsed_ms = Some(elapsed);
                return Ok(TurnOutcome::Finished);
            }
        }
        Ok(TurnOutcome::Continue)
    }

    /// Whether the WAIT_ACQUIRE release has happened.
    pub fn has_released(&self) -> bool {
        self.released
    }

    /// Run time from bootstrap to the turn that saw DONE.
    pub fn elapsed_ms(&self) -> Option<f64> {
        self.elapsed_ms
    }
}
