use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use strum::IntoEnumIterator;
use wlock::phase::{Coordinator, CoordinatorConfig, PhaseTrace, TurnOutcome};
use wlock::scenario::{run_scenario, ScenarioConfig, ScenarioError};
use wlock::timer::MonotonicClock;
use wlock::{CellOffsets, LockState, Phase, PhaseCell, RegionError, SharedRegion, WordLock};
use wlock_macros::context_test;

#[context_test]
fn render_and_control_threads_finish_the_protocol() {
    let config = ScenarioConfig::default();
    let report = run_scenario(&config).unwrap();

    assert_eq!(report.trace, Phase::iter().collect::<Vec<_>>());
    assert!(report.elapsed_ms >= config.fail_wait_ms);
    let waited = report.acquire_wait_ms.unwrap();
    assert!(waited < config.acquire_wait_ms, "waited {}ms", waited);
    assert!(report.render_turns >= 5);
    assert!(report.control_turns >= 2);
}

#[context_test]
fn scenario_runs_at_non_default_offsets() {
    let config = ScenarioConfig {
        offsets: CellOffsets {
            lock: 512,
            phase: 12,
        },
        fail_wait_ms: 20.0,
        ..ScenarioConfig::default()
    };
    let report = run_scenario(&config).unwrap();
    assert!(report.elapsed_ms >= 20.0);
}

#[context_test]
fn scenario_rejects_overlapping_cells() {
    let config = ScenarioConfig {
        offsets: CellOffsets { lock: 8, phase: 8 },
        ..ScenarioConfig::default()
    };
    let result = run_scenario(&config);
    assert!(
        matches!(
            result,
            Err(ScenarioError::Region(RegionError::Overlapping(8)))
        ),
        "{:?}",
        result
    );
}

#[context_test]
fn external_release_ends_the_wait_acquire_spin() {
    let region: SharedRegion = SharedRegion::new();
    let cells = region.resolve(CellOffsets::default()).unwrap();
    let trace = PhaseTrace::new(Vec::new());

    let lock = WordLock::new(cells.lock);
    lock.init();
    assert!(lock.try_acquire());
    PhaseCell::traced(cells.phase, &trace)
        .init(Phase::NotStarted)
        .unwrap();
    PhaseCell::traced(cells.phase, &trace)
        .advance(Phase::NotStarted, Phase::TryAcquire)
        .unwrap();

    let mut config = CoordinatorConfig::new(cells);
    config.trace = Some(&trace);
    let mut render = Coordinator::new(config, MonotonicClock);

    thread::scope(|s| {
        s.spawn(|| {
            while cells.phase.load(Ordering::SeqCst) != Phase::WaitAcquire as u32 {
                std::hint::spin_loop();
            }
            thread::sleep(Duration::from_millis(50));
            WordLock::new(cells.lock).release();
        });

        assert_eq!(render.turn(), Ok(TurnOutcome::Continue)); // TRY_ACQUIRE
        assert_eq!(render.turn(), Ok(TurnOutcome::Continue)); // WAIT_ACQUIRE_FAIL, WAIT_ACQUIRE
    });

    let waited = render.last_acquire_wait_ms().unwrap();
    assert!((45.0..1000.0).contains(&waited), "waited {}ms", waited);

    assert_eq!(render.turn(), Ok(TurnOutcome::Continue)); // RELEASE
    assert_eq!(render.turn(), Ok(TurnOutcome::Finished));
    assert!(render.violations().is_empty());
    assert_eq!(lock.state(), Ok(LockState::Held));
    assert_eq!(
        *trace.lock(),
        [
            Phase::NotStarted,
            Phase::TryAcquire,
            Phase::WaitAcquireFail,
            Phase::WaitAcquire,
            Phase::Release,
            Phase::Done,
        ]
    );
}
