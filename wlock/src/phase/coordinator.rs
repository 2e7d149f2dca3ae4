use alloc::vec::Vec;

use crate::config::{ACQUIRE_WAIT_MS, FAIL_WAIT_MS};
use crate::error::{CoordinatorError, LockOp, ProtocolViolation};
use crate::region::Cells;
use crate::sync::spin::{LockState, WordLock};
use crate::timer::Clock;

use super::{ContextCaps, Phase, PhaseCell, PhaseTrace};

/// Whether the driving callback should be invoked again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    Continue,
    Finished,
}

/// Everything a render-side coordinator needs, resolved up front.
#[derive(Clone, Copy)]
pub struct CoordinatorConfig<'a> {
    pub cells: Cells<'a>,
    /// Capabilities of the context that will call [`Coordinator::turn`]
    pub caps: ContextCaps,
    /// Budget that must expire while the lock stays held
    pub fail_wait_ms: f64,
    /// Budget inside which the lock must come free
    pub acquire_wait_ms: f64,
    pub trace: Option<&'a PhaseTrace>,
}

impl<'a> CoordinatorConfig<'a> {
    pub fn new(cells: Cells<'a>) -> Self {
        Self {
            cells,
            caps: ContextCaps::RENDER,
            fail_wait_ms: FAIL_WAIT_MS,
            acquire_wait_ms: ACQUIRE_WAIT_MS,
            trace: None,
        }
    }
}

/// Prepare the cells from the control context, before any turn.
///
/// Leaves the lock held by the caller (TRY_ACQUIRE relies on that) and the
/// phase at LOADING, unless a render context already announced itself with
/// NOT_STARTED. Returns the start time on `clock`.
pub fn bootstrap<C: Clock + ?Sized>(
    cells: Cells<'_>,
    trace: Option<&PhaseTrace>,
    clock: &C,
) -> Result<f64, CoordinatorError> {
    let lock = WordLock::new(cells.lock);
    lock.init();
    if !lock.busy_spin_wait_acquire_with(clock, 0.0) {
        return Err(CoordinatorError::BootstrapLockFailed);
    }
    let phase = match trace {
        Some(trace) => PhaseCell::traced(cells.phase, trace),
        None => PhaseCell::new(cells.phase),
    };
    phase.init(Phase::Loading)?;
    Ok(clock.now_ms())
}

/// The render-context state machine.
///
/// Each call to [`turn`](Self::turn) reads the phase, runs that phase's lock
/// operation, checks it and advances. A failed check halts the machine,
/// except a timed-out WAIT_ACQUIRE, which is recorded and then stepped past
/// so the render callback keeps running.
pub struct Coordinator<'a, C: Clock> {
    lock: WordLock<'a>,
    phase: PhaseCell<'a>,
    clock: C,
    caps: ContextCaps,
    fail_wait_ms: f64,
    acquire_wait_ms: f64,
    halted: bool,
    /// Phase the failing turn read, `None` if the cell itself was corrupt
    halted_at: Option<Phase>,
    violations: Vec<ProtocolViolation>,
    last_acquire_wait_ms: Option<f64>,
}

impl<'a, C: Clock> Coordinator<'a, C> {
    pub fn new(config: CoordinatorConfig<'a>, clock: C) -> Self {
        let phase = match config.trace {
            Some(trace) => PhaseCell::traced(config.cells.phase, trace),
            None => PhaseCell::new(config.cells.phase),
        };
        Self {
            lock: WordLock::new(config.cells.lock),
            phase,
            clock,
            caps: config.caps,
            fail_wait_ms: config.fail_wait_ms,
            acquire_wait_ms: config.acquire_wait_ms,
            halted: false,
            halted_at: None,
            violations: Vec::new(),
            last_acquire_wait_ms: None,
        }
    }

    /// Run one turn.
    pub fn turn(&mut self) -> Result<TurnOutcome, CoordinatorError> {
        self.check_context()?;
        if self.halted {
            return Err(CoordinatorError::Halted(self.halted_at));
        }

        let phase = match self.phase.load() {
            Ok(phase) => phase,
            Err(err) => return Err(self.halt(None, err)),
        };
        let result = match phase {
            Phase::Loading => self.phase.advance(phase, Phase::NotStarted),
            Phase::NotStarted => {
                log::debug!("{}: waiting for control to start", phase);
                Ok(())
            }
            Phase::TryAcquire => self.try_acquire(),
            Phase::WaitAcquireFail => self.wait_acquire_fail(),
            Phase::WaitAcquire => self.wait_acquire(),
            Phase::Release => self.release(),
            Phase::Done => {
                log::info!("{} in render context", phase);
                return Ok(TurnOutcome::Finished);
            }
        };

        match result {
            Ok(()) => Ok(TurnOutcome::Continue),
            Err(err) => Err(self.halt(Some(phase), err)),
        }
    }

    /// Violations surfaced so far, fatal or not.
    pub fn violations(&self) -> &[ProtocolViolation] {
        &self.violations
    }

    /// How long the last WAIT_ACQUIRE spin took.
    pub fn last_acquire_wait_ms(&self) -> Option<f64> {
        self.last_acquire_wait_ms
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Latch the failure; no later turn touches the cells again.
    fn halt(&mut self, at: Option<Phase>, err: CoordinatorError) -> CoordinatorError {
        log::error!("render context stopping: {}", err);
        self.halted = true;
        self.halted_at = at;
        err
    }

    fn check_context(&self) -> Result<(), CoordinatorError> {
        if self.caps.contains(ContextCaps::RENDER) && !self.caps.contains(ContextCaps::CAN_WAIT) {
            Ok(())
        } else {
            Err(CoordinatorError::WrongContext {
                expected: ContextCaps::RENDER,
                actual: self.caps,
            })
        }
    }

    fn try_acquire(&mut self) -> Result<(), CoordinatorError> {
        self.lock.state()?;
        let acquired = self.lock.try_acquire();
        log::info!("{}: {} (expect: false)", Phase::TryAcquire, acquired);
        self.expect(Phase::TryAcquire, LockOp::TryAcquire, false, acquired)?;
        self.phase.advance(Phase::TryAcquire, Phase::WaitAcquireFail)
    }

    /*
     * Runs straight into WAIT_ACQUIRE in the same turn so control gets to
     * release while this context is already spinning; otherwise the release
     * could land between two turns and never be seen mid-wait.
     */
    fn wait_acquire_fail(&mut self) -> Result<(), CoordinatorError> {
        self.lock.state()?;
        log::info!("{}: spin for {}ms", Phase::WaitAcquireFail, self.fail_wait_ms);
        let acquired = self
            .lock
            .busy_spin_wait_acquire_with(&self.clock, self.fail_wait_ms);
        log::info!("{}: {} (expect: false)", Phase::WaitAcquireFail, acquired);
        self.expect(
            Phase::WaitAcquireFail,
            LockOp::BusySpinWaitAcquire,
            false,
            acquired,
        )?;
        self.phase.advance(Phase::WaitAcquireFail, Phase::WaitAcquire)?;
        self.wait_acquire()
    }

    fn wait_acquire(&mut self) -> Result<(), CoordinatorError> {
        self.lock.state()?;
        log::info!("{}: start spinning", Phase::WaitAcquire);
        let start = self.clock.now_ms();
        let acquired = self
            .lock
            .busy_spin_wait_acquire_with(&self.clock, self.acquire_wait_ms);
        let waited = self.clock.now_ms() - start;
        self.last_acquire_wait_ms = Some(waited);
        log::info!(
            "{}: {} after {:.1}ms (expect: true)",
            Phase::WaitAcquire,
            acquired,
            waited
        );
        if let Err(err) = self.expect(
            Phase::WaitAcquire,
            LockOp::BusySpinWaitAcquire,
            true,
            acquired,
        ) {
            // Reported, not fatal: keep the render callback alive.
            log::error!("{}: {}, continuing", Phase::WaitAcquire, err);
        }
        self.phase.advance(Phase::WaitAcquire, Phase::Release)
    }

    fn release(&mut self) -> Result<(), CoordinatorError> {
        self.lock.state()?;
        log::info!("{}: unlocking", Phase::Release);
        self.lock.release();
        let acquired = self.lock.try_acquire();
        log::info!("{}: {} (expect: true)", Phase::Release, acquired);
        self.expect(Phase::Release, LockOp::TryAcquire, true, acquired)?;
        self.phase.advance(Phase::Release, Phase::Done)
    }

    fn expect(
        &mut self,
        phase: Phase,
        op: LockOp,
        expected: bool,
        actual: bool,
    ) -> Result<(), CoordinatorError> {
        if expected == actual {
            return Ok(());
        }
        let violation = ProtocolViolation {
            phase,
            op,
            expected,
            actual,
        };
        self.violations.push(violation);
        Err(CoordinatorError::Protocol(violation))
    }
}

impl<'a, C: Clock> core::fmt::Debug for Coordinator<'a, C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let lock = match self.lock.state() {
            Ok(LockState::Free) => "FREE",
            Ok(LockState::Held) => "HELD",
            Err(_) => "<corrupt>",
        };
        f.debug_struct("Coordinator")
            .field("phase", &self.phase.load().ok())
            .field("lock", &lock)
            .field("halted", &self.halted)
            .field("halted_at", &self.halted_at)
            .field("violations", &self.violations.len())
            .finish()
    }
}
