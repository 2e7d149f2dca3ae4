use core::hint;
use core::sync::atomic::AtomicU32;

use lock_api::{GuardSend, RawMutex};

use super::word::{self, WordLock};

/// A data-carrying mutex built on the shared-word protocol.
///
/// The word lives inline instead of in a shared region, which is what
/// in-process state (a trace, a counter) wants. Locking spins, so it is as
/// safe in a context that cannot block as the bare [`WordLock`].
///
/// # Example
/// ```
/// use wlock::sync::spin::WordMutex;
///
/// let lock = WordMutex::new(0);
/// *lock.lock() = 42;
/// assert_eq!(*lock.lock(), 42);
/// ```
pub type WordMutex<T> = lock_api::Mutex<RawWordLock, T>;

/// Guard returned by [`WordMutex::lock`].
pub type WordMutexGuard<'a, T> = lock_api::MutexGuard<'a, RawWordLock, T>;

/// Raw lock state for [`WordMutex`].
pub struct RawWordLock {
    cell: AtomicU32,
}

impl RawWordLock {
    /// View of the inline word through the shared-cell API.
    pub fn as_word_lock(&self) -> WordLock<'_> {
        WordLock::new(&self.cell)
    }
}

unsafe impl RawMutex for RawWordLock {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: RawWordLock = RawWordLock {
        cell: AtomicU32::new(0),
    };

    type GuardMarker = GuardSend;

    fn lock(&self) {
        while !word::try_acquire(&self.cell) {
            hint::spin_loop();
        }
    }

    fn try_lock(&self) -> bool {
        word::try_acquire(&self.cell)
    }

    unsafe fn unlock(&self) {
        word::release(&self.cell);
    }

    fn is_locked(&self) -> bool {
        self.as_word_lock().is_locked()
    }
}
