//! Runs the phase protocol across two real threads.
//!
//! The calling thread plays the control context: it bootstraps the region,
//! hands the render thread its cell offsets over a channel and then ticks
//! the [`ControlLoop`] on a fixed period. The render thread ticks a
//! [`Coordinator`] once per audio quantum, the way a render callback would
//! be invoked.

use core::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use alloc::vec::Vec;
use strum::IntoEnumIterator;

use crate::config::{
    ACQUIRE_WAIT_MS, CONTROL_TICK_MS, FAIL_WAIT_MS, RENDER_QUANTUM_FRAMES, SAMPLE_RATE,
    SCENARIO_TIMEOUT_MS,
};
use crate::error::{CoordinatorError, ProtocolViolation, RegionError};
use crate::phase::{
    bootstrap, ContextCaps, ControlLoop, Coordinator, CoordinatorConfig, Phase, PhaseTrace,
    TurnOutcome,
};
use crate::region::{BootstrapMessage, CellOffsets, SharedRegion};
use crate::timer::{Clock, MonotonicClock};

/// Knobs for one run.
#[derive(Debug, Clone, Copy)]
pub struct ScenarioConfig {
    pub offsets: CellOffsets,
    pub fail_wait_ms: f64,
    pub acquire_wait_ms: f64,
    /// Period of the control loop
    pub control_tick: Duration,
    /// Time between two render callbacks
    pub render_quantum: Duration,
    /// Give up if DONE is not reached by then
    pub timeout: Duration,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            offsets: CellOffsets::default(),
            fail_wait_ms: FAIL_WAIT_MS,
            acquire_wait_ms: ACQUIRE_WAIT_MS,
            control_tick: Duration::from_millis(CONTROL_TICK_MS),
            render_quantum: Duration::from_micros(RENDER_QUANTUM_FRAMES * 1_000_000 / SAMPLE_RATE),
            timeout: Duration::from_millis(SCENARIO_TIMEOUT_MS),
        }
    }
}

/// What a successful run observed.
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    /// Every phase stored, in order
    pub trace: Vec<Phase>,
    /// Bootstrap to DONE, as seen by the control context
    pub elapsed_ms: f64,
    /// Duration of the render context's WAIT_ACQUIRE spin
    pub acquire_wait_ms: Option<f64>,
    pub render_turns: u64,
    pub control_turns: u64,
}

#[derive(Debug)]
pub enum ScenarioError {
    Region(RegionError),
    /// A context's turn failed.
    /// - `context`: which side
    /// - `error`: what its driver reported
    Context {
        context: &'static str,
        error: CoordinatorError,
    },
    /// The bootstrap channel closed before delivery.
    BootstrapLost,
    Spawn(io::Error),
    ContextPanicked(&'static str),
    /// DONE was not reached in time; the phase the run was stuck at.
    TimedOut(Phase),
    /// Phases were stored out of order, repeated or skipped.
    TraceMismatch(Vec<Phase>),
    /// The run ended faster than the WAIT_ACQUIRE_FAIL spin allows.
    FinishedTooEarly { elapsed_ms: f64, min_ms: f64 },
    /// Non-fatal violations the render context recorded on the way.
    Violations(Vec<ProtocolViolation>),
}

impl fmt::Display for ScenarioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Region(err) => write!(f, "region: {}", err),
            Self::Context { context, error } => write!(f, "{} context: {}", context, error),
            Self::BootstrapLost => write!(f, "bootstrap channel closed"),
            Self::Spawn(err) => write!(f, "cannot spawn context: {}", err),
            Self::ContextPanicked(context) => write!(f, "{} context panicked", context),
            Self::TimedOut(phase) => write!(f, "timed out at {}", phase),
            Self::TraceMismatch(trace) => write!(f, "unexpected phase trace {:?}", trace),
            Self::FinishedTooEarly { elapsed_ms, min_ms } => {
                write!(f, "finished after {:.1}ms, expected > {}ms", elapsed_ms, min_ms)
            }
            Self::Violations(violations) => {
                write!(f, "{} violation(s)", violations.len())?;
                for violation in violations {
                    write!(f, "; {}", violation)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ScenarioError {}

impl From<RegionError> for ScenarioError {
    fn from(err: RegionError) -> Self {
        Self::Region(err)
    }
}

impl From<io::Error> for ScenarioError {
    fn from(err: io::Error) -> Self {
        Self::Spawn(err)
    }
}

struct RenderSummary {
    violations: Vec<ProtocolViolation>,
    acquire_wait_ms: Option<f64>,
    turns: u64,
}

/// Run the full protocol once.
pub fn run_scenario(config: &ScenarioConfig) -> Result<ScenarioReport, ScenarioError> {
    let region: Arc<SharedRegion> = Arc::new(SharedRegion::new());
    let trace = Arc::new(PhaseTrace::new(Vec::new()));
    let stop = Arc::new(AtomicBool::new(false));
    let clock = MonotonicClock;

    let cells = region.resolve(config.offsets)?;
    let start_ms = bootstrap(cells, Some(&*trace), &clock).map_err(|error| {
        ScenarioError::Context {
            context: "control",
            error,
        }
    })?;
    log::info!("bootstrap done, lock held by control");

    let (tx, rx) = mpsc::channel();
    let render = thread::Builder::new().name("render".into()).spawn({
        let region = Arc::clone(&region);
        let trace = Arc::clone(&trace);
        let stop = Arc::clone(&stop);
        let config = *config;
        move || {
            let result = render_context(&region, &trace, &stop, rx, &config);
            if result.is_err() {
                stop.store(true, Ordering::SeqCst);
            }
            result
        }
    })?;
    let delivered = tx.send(BootstrapMessage {
        offsets: config.offsets,
    });

    let control = match delivered {
        Ok(()) => control_context(&region, &trace, &stop, config, start_ms),
        Err(_) => Err(ScenarioError::BootstrapLost),
    };
    if control.is_err() {
        stop.store(true, Ordering::SeqCst);
    }
    let render = render
        .join()
        .map_err(|_| ScenarioError::ContextPanicked("render"))?;

    // Whichever side failed first set `stop`, which the other reports as a
    // timeout; surface the real failure.
    let (summary, (elapsed_ms, control_turns)) = match (render, control) {
        (Ok(summary), Ok(control)) => (summary, control),
        (_, Err(err @ ScenarioError::Context { .. })) => return Err(err),
        (Err(err), _) | (Ok(_), Err(err)) => return Err(err),
    };

    let trace = trace.lock().clone();
    if !trace.iter().copied().eq(Phase::iter()) {
        return Err(ScenarioError::TraceMismatch(trace));
    }
    if !summary.violations.is_empty() {
        return Err(ScenarioError::Violations(summary.violations));
    }
    if elapsed_ms < config.fail_wait_ms {
        return Err(ScenarioError::FinishedTooEarly {
            elapsed_ms,
            min_ms: config.fail_wait_ms,
        });
    }

    Ok(ScenarioReport {
        trace,
        elapsed_ms,
        acquire_wait_ms: summary.acquire_wait_ms,
        render_turns: summary.turns,
        control_turns,
    })
}

fn render_context(
    region: &SharedRegion,
    trace: &PhaseTrace,
    stop: &AtomicBool,
    bootstrap: Receiver<BootstrapMessage>,
    config: &ScenarioConfig,
) -> Result<RenderSummary, ScenarioError> {
    let message = bootstrap.recv().map_err(|_| ScenarioError::BootstrapLost)?;
    let cells = region.resolve(message.offsets)?;

    let mut coordinator_config = CoordinatorConfig::new(cells);
    coordinator_config.caps = ContextCaps::RENDER;
    coordinator_config.fail_wait_ms = config.fail_wait_ms;
    coordinator_config.acquire_wait_ms = config.acquire_wait_ms;
    coordinator_config.trace = Some(trace);
    let mut coordinator = Coordinator::new(coordinator_config, MonotonicClock);

    let mut turns = 0;
    loop {
        if stop.load(Ordering::SeqCst) {
            let phase = Phase::decode(cells.phase.load(Ordering::SeqCst)).unwrap_or(Phase::Loading);
            return Err(ScenarioError::TimedOut(phase));
        }
        turns += 1;
        let outcome = coordinator.turn().map_err(|error| ScenarioError::Context {
            context: "render",
            error,
        })?;
        if outcome == TurnOutcome::Finished {
            break;
        }
        thread::sleep(config.render_quantum);
    }

    Ok(RenderSummary {
        violations: coordinator.violations().to_vec(),
        acquire_wait_ms: coordinator.last_acquire_wait_ms(),
        turns,
    })
}

fn control_context(
    region: &SharedRegion,
    trace: &PhaseTrace,
    stop: &AtomicBool,
    config: &ScenarioConfig,
    start_ms: f64,
) -> Result<(f64, u64), ScenarioError> {
    let cells = region.resolve(config.offsets)?;
    let clock = MonotonicClock;
    let mut control = ControlLoop::new(cells, Some(trace), clock, start_ms);
    let deadline = start_ms + config.timeout.as_secs_f64() * 1000.0;

    let mut turns = 0;
    loop {
        turns += 1;
        let outcome = control.turn().map_err(|error| ScenarioError::Context {
            context: "control",
            error,
        })?;
        if outcome == TurnOutcome::Finished {
            break;
        }
        if stop.load(Ordering::SeqCst) || clock.now_ms() > deadline {
            let phase = Phase::decode(cells.phase.load(Ordering::SeqCst)).unwrap_or(Phase::Loading);
            return Err(ScenarioError::TimedOut(phase));
        }
        thread::sleep(config.control_tick);
    }

    Ok((control.elapsed_ms().unwrap_or_default(), turns))
}
