//! wlock: a spinlock over one shared memory word, and the cross-context
//! protocol that proves it works.
//!
//! Built for execution contexts that share memory but not a call stack, at
//! least one of which may never block (a real-time audio render callback).
//! Everything is atomic load / compare-and-swap / store on `u32` cells.
//!
//! # Architectural Overview
//! ```text
//! +---------------------------------------------+
//! |  scenario: render thread + control loop     |
//! +---------------------------------------------+
//! |  phase: Coordinator, ControlLoop, PhaseCell |
//! +---------------------------------------------+
//! |  sync::spin: WordLock, WordMutex            |
//! +---------------------------------------------+
//! |  region: SharedRegion, CellOffsets          |
//! +---------------------------------------------+
//! ```
//!
//! # Features
//! - `std` (default): monotonic clock, wake notification through
//!   `atomic-wait`, blocking acquire, console logger, the threaded scenario.
//!   Without it the lock, phase machine and region still build on `core` +
//!   `alloc`; callers bring their own [`timer::Clock`] and `log` backend.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;
// Lets `#[context_test]` expansions name this crate from inside it.
extern crate self as wlock;

pub mod config;
pub mod error;
pub mod phase;
pub mod region;
pub mod sync;
pub mod timer;

#[cfg(feature = "std")]
pub mod io;
#[cfg(feature = "std")]
pub mod scenario;

pub use error::{CoordinatorError, LockOp, ProtocolViolation, RegionError};
pub use phase::{Phase, PhaseCell};
pub use region::{BootstrapMessage, CellOffsets, Cells, SharedRegion};
pub use sync::spin::{LockState, WordLock, WordMutex};
