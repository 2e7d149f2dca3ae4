use core::hint;
use core::sync::atomic::{AtomicU32, Ordering};

use strum_macros::{Display, FromRepr};

use crate::error::CoordinatorError;
use crate::timer::Clock;

/// Values a lock word may legally hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, FromRepr)]
#[repr(u32)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum LockState {
    Free = 0,
    Held = 1,
}

/// A spinlock living in one shared `u32`.
///
/// This is a view, not an owner: every context builds its own `WordLock`
/// over the same cell after resolving the bootstrap offsets.
///
/// # Memory ordering
/// Every access is `SeqCst` so the cell behaves the same as the host's
/// shared-memory atomics. The phase cell is a separate word; nothing orders
/// it against this one except the protocol itself.
///
/// # Example
/// ```
/// use core::sync::atomic::AtomicU32;
/// use wlock::sync::spin::WordLock;
///
/// let cell = AtomicU32::new(0);
/// let lock = WordLock::new(&cell);
/// lock.init();
/// assert!(lock.try_acquire());
/// assert!(!lock.try_acquire());
/// lock.release();
/// ```
#[derive(Debug, Clone, Copy)]
pub struct WordLock<'a> {
    cell: &'a AtomicU32,
}

impl<'a> WordLock<'a> {
    pub const fn new(cell: &'a AtomicU32) -> Self {
        Self { cell }
    }

    /// The underlying cell.
    pub fn cell(&self) -> &'a AtomicU32 {
        self.cell
    }

    /// Force the cell to FREE.
    pub fn init(&self) {
        init(self.cell);
    }

    /// One CAS from FREE to HELD. Never waits.
    #[inline]
    pub fn try_acquire(&self) -> bool {
        try_acquire(self.cell)
    }

    /// Spin on [`try_acquire`](Self::try_acquire) until it succeeds or
    /// `max_wait_ms` have passed on `clock`.
    ///
    /// # Behavior
    /// - Always attempts once, whatever the budget (zero and negative included)
    /// - Re-reads the clock after every failed attempt and keeps going while
    ///   `now < start + max_wait_ms`
    /// - Never sleeps or yields: callers may be forbidden from descheduling
    pub fn busy_spin_wait_acquire_with<C>(&self, clock: &C, max_wait_ms: f64) -> bool
    where
        C: Clock + ?Sized,
    {
        if self.try_acquire() {
            return true;
        }
        let mut now = clock.now_ms();
        let deadline = now + max_wait_ms;
        while now < deadline {
            if self.try_acquire() {
                return true;
            }
            hint::spin_loop();
            now = clock.now_ms();
        }
        false
    }

    /// [`busy_spin_wait_acquire_with`](Self::busy_spin_wait_acquire_with) on
    /// the process monotonic clock.
    #[cfg(feature = "std")]
    pub fn busy_spin_wait_acquire(&self, max_wait_ms: f64) -> bool {
        self.busy_spin_wait_acquire_with(&crate::timer::MonotonicClock, max_wait_ms)
    }

    /// Store FREE and wake anyone parked on the cell.
    ///
    /// There is no holder check: any context may release, held or not.
    #[inline]
    pub fn release(&self) {
        release(self.cell);
    }

    /// Read and validate the cell.
    pub fn state(&self) -> Result<LockState, CoordinatorError> {
        let raw = self.cell.load(Ordering::SeqCst);
        LockState::from_repr(raw).ok_or(CoordinatorError::CorruptLock(raw))
    }

    /// Racy snapshot, for diagnostics only.
    pub fn is_locked(&self) -> bool {
        self.cell.load(Ordering::Relaxed) != LockState::Free as u32
    }

    /// Take the lock, parking on the cell between attempts.
    ///
    /// Only for contexts that are allowed to block; this is what
    /// [`release`](Self::release)'s wake is for. A render context must use the
    /// busy-wait instead.
    #[cfg(feature = "std")]
    pub fn blocking_acquire(&self) {
        while !self.try_acquire() {
            atomic_wait::wait(self.cell, LockState::Held as u32);
        }
    }
}

#[inline]
pub(super) fn init(cell: &AtomicU32) {
    cell.store(LockState::Free as u32, Ordering::SeqCst);
}

#[inline]
pub(super) fn try_acquire(cell: &AtomicU32) -> bool {
    match cell.compare_exchange(
        LockState::Free as u32,
        LockState::Held as u32,
        Ordering::SeqCst,
        Ordering::SeqCst,
    ) {
        Ok(_) => true,
        Err(observed) => {
            debug_assert_eq!(observed, LockState::Held as u32, "lock cell corrupted");
            false
        }
    }
}

#[inline]
pub(super) fn release(cell: &AtomicU32) {
    cell.store(LockState::Free as u32, Ordering::SeqCst);
    notify(cell);
}

/// Wake notification addressed at the lock cell.
#[inline]
fn notify(cell: &AtomicU32) {
    #[cfg(feature = "std")]
    atomic_wait::wake_all(cell);
    #[cfg(not(feature = "std"))]
    let _ = cell;
}
