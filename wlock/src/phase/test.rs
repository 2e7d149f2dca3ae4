#![cfg(test)]

use core::cell::Cell;
use core::sync::atomic::Ordering;

use strum::{EnumCount, IntoEnumIterator};
use wlock_macros::context_test;

use super::{
    bootstrap, ContextCaps, ControlLoop, Coordinator, CoordinatorConfig, Phase, PhaseCell,
    PhaseTrace, TurnOutcome,
};
use crate::error::{CoordinatorError, LockOp, ProtocolViolation};
use crate::region::{CellOffsets, Cells, SharedRegion};
use crate::sync::spin::{LockState, WordLock};

/// A clock that moves `step_ms` forward on every read.
fn stepping(step_ms: f64) -> impl Fn() -> f64 {
    let now = Cell::new(0.0);
    move || {
        now.set(now.get() + step_ms);
        now.get()
    }
}

fn cells(region: &SharedRegion<4>) -> Cells<'_> {
    region.resolve(CellOffsets::default()).unwrap()
}

fn set_phase(cells: Cells<'_>, phase: Phase) {
    cells.phase.store(phase as u32, Ordering::SeqCst);
}

#[context_test]
fn phases_are_totally_ordered() {
    let phases: Vec<_> = Phase::iter().collect();
    assert_eq!(phases.len(), Phase::COUNT);
    assert!(phases.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(phases.first(), Some(&Phase::Loading));
    assert_eq!(Phase::Release.next(), Some(Phase::Done));
    assert_eq!(Phase::Done.next(), None);
    assert_eq!(Phase::WaitAcquireFail.to_string(), "WAIT_ACQUIRE_FAIL");
}

#[context_test]
fn decode_rejects_out_of_range_values() {
    assert_eq!(Phase::decode(4), Ok(Phase::WaitAcquire));
    assert_eq!(Phase::decode(7), Err(CoordinatorError::CorruptPhase(7)));
}

#[context_test]
fn phase_cell_only_moves_forward() {
    let region = SharedRegion::<4>::new();
    let cells = cells(&region);
    let phase = PhaseCell::new(cells.phase);

    assert!(phase.init(Phase::TryAcquire).is_err());
    assert_eq!(phase.init(Phase::NotStarted), Ok(true));
    assert_eq!(phase.load(), Ok(Phase::NotStarted));
    assert_eq!(
        phase.advance(Phase::NotStarted, Phase::Loading),
        Err(CoordinatorError::NonMonotonic {
            from: Phase::NotStarted,
            to: Phase::Loading,
        })
    );
    assert!(phase.advance(Phase::NotStarted, Phase::NotStarted).is_err());
    phase.advance(Phase::NotStarted, Phase::TryAcquire).unwrap();
    assert_eq!(phase.load(), Ok(Phase::TryAcquire));
}

#[context_test]
fn bootstrap_leaves_lock_held_and_phase_loading() {
    let region = SharedRegion::<4>::new();
    let cells = cells(&region);
    cells.lock.store(LockState::Held as u32, Ordering::SeqCst);

    bootstrap(cells, None, &stepping(1.0)).unwrap();
    assert_eq!(WordLock::new(cells.lock).state(), Ok(LockState::Held));
    assert_eq!(PhaseCell::new(cells.phase).load(), Ok(Phase::Loading));
}

#[context_test]
fn render_first_start_survives_control_bootstrap() {
    let region = SharedRegion::<4>::new();
    let cells = cells(&region);
    let trace = PhaseTrace::new(Vec::new());

    assert_eq!(
        PhaseCell::traced(cells.phase, &trace).init(Phase::NotStarted),
        Ok(true)
    );
    bootstrap(cells, Some(&trace), &stepping(1.0)).unwrap();

    let phase = PhaseCell::traced(cells.phase, &trace);
    assert_eq!(phase.load(), Ok(Phase::NotStarted));
    assert_eq!(phase.init(Phase::Loading), Ok(false));
    assert_eq!(phase.init(Phase::NotStarted), Ok(false));
    assert_eq!(*trace.lock(), [Phase::NotStarted]);
    assert_eq!(WordLock::new(cells.lock).state(), Ok(LockState::Held));

    // The run goes on from NOT_STARTED without revisiting anything.
    let mut control = ControlLoop::new(cells, Some(&trace), stepping(1.0), 0.0);
    control.turn().unwrap();
    assert_eq!(*trace.lock(), [Phase::NotStarted, Phase::TryAcquire]);
}

#[context_test]
fn init_refuses_a_corrupt_cell() {
    let region = SharedRegion::<4>::new();
    let cells = cells(&region);
    cells.phase.store(99, Ordering::SeqCst);
    assert_eq!(
        PhaseCell::new(cells.phase).init(Phase::NotStarted),
        Err(CoordinatorError::CorruptPhase(99))
    );
    assert_eq!(cells.phase.load(Ordering::SeqCst), 99);
}

#[context_test]
fn full_protocol_in_one_thread() {
    let region = SharedRegion::<4>::new();
    let cells = cells(&region);
    let trace = PhaseTrace::new(Vec::new());

    // Stands in for the control context releasing while render spins.
    let ticks = Cell::new(0u32);
    let released = Cell::new(false);
    let clock = || {
        ticks.set(ticks.get() + 1);
        if !released.get() && cells.phase.load(Ordering::SeqCst) == Phase::WaitAcquire as u32 {
            WordLock::new(cells.lock).release();
            released.set(true);
        }
        f64::from(ticks.get())
    };

    let start = bootstrap(cells, Some(&trace), &clock).unwrap();
    let mut config = CoordinatorConfig::new(cells);
    config.trace = Some(&trace);
    let mut render = Coordinator::new(config, &clock);
    let mut control = ControlLoop::new(cells, Some(&trace), &clock, start);

    assert_eq!(render.turn(), Ok(TurnOutcome::Continue)); // LOADING
    assert_eq!(control.turn(), Ok(TurnOutcome::Continue)); // NOT_STARTED
    assert_eq!(render.turn(), Ok(TurnOutcome::Continue)); // TRY_ACQUIRE
    assert_eq!(render.turn(), Ok(TurnOutcome::Continue)); // WAIT_ACQUIRE_FAIL + WAIT_ACQUIRE
    assert!(released.get());
    assert_eq!(render.turn(), Ok(TurnOutcome::Continue)); // RELEASE
    assert_eq!(render.turn(), Ok(TurnOutcome::Finished));
    assert_eq!(control.turn(), Ok(TurnOutcome::Finished));

    assert!(render.violations().is_empty());
    assert!(control.elapsed_ms().unwrap() >= 100.0);
    assert!(trace.lock().iter().copied().eq(Phase::iter()));
    assert_eq!(WordLock::new(cells.lock).state(), Ok(LockState::Held));
}

#[context_test]
fn not_started_waits_for_control() {
    let region = SharedRegion::<4>::new();
    let cells = cells(&region);
    bootstrap(cells, None, &stepping(1.0)).unwrap();
    let mut render = Coordinator::new(CoordinatorConfig::new(cells), stepping(1.0));

    render.turn().unwrap();
    for _ in 0..3 {
        assert_eq!(render.turn(), Ok(TurnOutcome::Continue));
        assert_eq!(PhaseCell::new(cells.phase).load(), Ok(Phase::NotStarted));
    }
}

#[context_test]
fn unexpected_try_acquire_halts_the_coordinator() {
    let region = SharedRegion::<4>::new();
    let cells = cells(&region);
    WordLock::new(cells.lock).init();
    set_phase(cells, Phase::TryAcquire);
    let mut render = Coordinator::new(CoordinatorConfig::new(cells), stepping(1.0));

    let violation = ProtocolViolation {
        phase: Phase::TryAcquire,
        op: LockOp::TryAcquire,
        expected: false,
        actual: true,
    };
    assert_eq!(render.turn(), Err(CoordinatorError::Protocol(violation)));
    assert!(render.is_halted());
    assert_eq!(
        render.turn(),
        Err(CoordinatorError::Halted(Some(Phase::TryAcquire)))
    );
    assert_eq!(PhaseCell::new(cells.phase).load(), Ok(Phase::TryAcquire));
    assert_eq!(render.violations(), &[violation]);
}

#[context_test]
fn acquiring_during_wait_acquire_fail_is_fatal() {
    let region = SharedRegion::<4>::new();
    let cells = cells(&region);
    WordLock::new(cells.lock).init();
    set_phase(cells, Phase::WaitAcquireFail);
    let mut render = Coordinator::new(CoordinatorConfig::new(cells), stepping(1.0));

    assert!(matches!(
        render.turn(),
        Err(CoordinatorError::Protocol(ProtocolViolation {
            phase: Phase::WaitAcquireFail,
            op: LockOp::BusySpinWaitAcquire,
            ..
        }))
    ));
    assert_eq!(PhaseCell::new(cells.phase).load(), Ok(Phase::WaitAcquireFail));
}

#[context_test]
fn wait_acquire_timeout_is_reported_and_stepped_past() {
    let region = SharedRegion::<4>::new();
    let cells = cells(&region);
    let lock = WordLock::new(cells.lock);
    lock.init();
    assert!(lock.try_acquire());
    set_phase(cells, Phase::WaitAcquire);

    let mut config = CoordinatorConfig::new(cells);
    config.acquire_wait_ms = 50.0;
    let mut render = Coordinator::new(config, stepping(10.0));

    assert_eq!(render.turn(), Ok(TurnOutcome::Continue));
    assert!(!render.is_halted());
    assert_eq!(render.violations().len(), 1);
    assert!(render.last_acquire_wait_ms().unwrap() >= 50.0);
    assert_eq!(PhaseCell::new(cells.phase).load(), Ok(Phase::Release));

    // RELEASE still runs and succeeds.
    assert_eq!(render.turn(), Ok(TurnOutcome::Continue));
    assert_eq!(PhaseCell::new(cells.phase).load(), Ok(Phase::Done));
}

#[context_test]
fn corrupt_cells_are_fatal() {
    let region = SharedRegion::<4>::new();
    let cells = cells(&region);

    cells.phase.store(42, Ordering::SeqCst);
    let mut render = Coordinator::new(CoordinatorConfig::new(cells), stepping(1.0));
    assert_eq!(render.turn(), Err(CoordinatorError::CorruptPhase(42)));
    assert!(render.is_halted());
    // A cell that reads valid again does not revive the machine.
    set_phase(cells, Phase::TryAcquire);
    assert_eq!(render.turn(), Err(CoordinatorError::Halted(None)));
    assert_eq!(PhaseCell::new(cells.phase).load(), Ok(Phase::TryAcquire));

    cells.lock.store(9, Ordering::SeqCst);
    let mut render = Coordinator::new(CoordinatorConfig::new(cells), stepping(1.0));
    assert_eq!(render.turn(), Err(CoordinatorError::CorruptLock(9)));
    assert_eq!(
        render.turn(),
        Err(CoordinatorError::Halted(Some(Phase::TryAcquire)))
    );
    assert_eq!(cells.lock.load(Ordering::SeqCst), 9);
}

#[context_test]
fn drivers_check_their_context() {
    let region = SharedRegion::<4>::new();
    let cells = cells(&region);
    bootstrap(cells, None, &stepping(1.0)).unwrap();

    let mut config = CoordinatorConfig::new(cells);
    config.caps = ContextCaps::RENDER | ContextCaps::CAN_WAIT;
    let mut render = Coordinator::new(config, stepping(1.0));
    assert!(matches!(render.turn(), Err(CoordinatorError::WrongContext { .. })));

    let mut control =
        ControlLoop::new(cells, None, stepping(1.0), 0.0).with_caps(ContextCaps::RENDER);
    assert_eq!(
        control.turn(),
        Err(CoordinatorError::WrongContext {
            expected: ContextCaps::CONTROL,
            actual: ContextCaps::RENDER,
        })
    );

    let waiting = ContextCaps::CONTROL | ContextCaps::CAN_WAIT;
    let mut control = ControlLoop::new(cells, None, stepping(1.0), 0.0).with_caps(waiting);
    assert_eq!(
        control.turn(),
        Err(CoordinatorError::WrongContext {
            expected: ContextCaps::CONTROL,
            actual: waiting,
        })
    );
    assert_eq!(PhaseCell::new(cells.phase).load(), Ok(Phase::Loading));
}

#[context_test]
fn control_releases_only_once() {
    let region = SharedRegion::<4>::new();
    let cells = cells(&region);
    let start = bootstrap(cells, None, &stepping(1.0)).unwrap();
    set_phase(cells, Phase::WaitAcquire);
    let lock = WordLock::new(cells.lock);
    let mut control = ControlLoop::new(cells, None, stepping(1.0), start);

    control.turn().unwrap();
    assert!(control.has_released());
    assert_eq!(lock.state(), Ok(LockState::Free));

    assert!(lock.try_acquire());
    control.turn().unwrap();
    assert_eq!(lock.state(), Ok(LockState::Held));
}
