//! # Spin Locks Module
//!
//! Locks that never park the caller, for contexts that are not allowed to
//! block (a real-time render callback, a browser-style main thread).
//!
//! ## Implementations
//! - [`WordLock`] - spinlock over one shared `u32` cell, as a view
//!     - `try_acquire()`, `busy_spin_wait_acquire()`, `release()`
//!     - `blocking_acquire()` for the contexts that *can* wait
//! - [`WordMutex`] - the same protocol wrapped by `lock_api`, owning its data
//!
//! ## Usage Guidelines
//! ```rust
//! use core::sync::atomic::AtomicU32;
//! use wlock::sync::spin::{WordLock, WordMutex};
//!
//! // Shared cell, mapped by every context
//! let cell = AtomicU32::new(0);
//! let lock = WordLock::new(&cell);
//! lock.init();
//! assert!(lock.busy_spin_wait_acquire(0.0));
//! lock.release();
//!
//! // Local data
//! let counter = WordMutex::new(0u32);
//! *counter.lock() += 1;
//! ```
//!
//! ## Safety
//! - `release()` does not check who holds the lock. Callers own that
//!   discipline.
//! - Not reentrant: a holder that acquires again spins until its budget runs out.

mod mutex;
mod word;

pub use mutex::{RawWordLock, WordMutex, WordMutexGuard};
pub use word::{LockState, WordLock};
