//! Monotonic time for the bounded busy-wait.
//!
//! The lock never sleeps, so the only thing it needs from the platform is a
//! clock it can poll. Anything implementing [`Clock`] works, including plain
//! closures returning milliseconds, which is how tests script time.

/// A monotonic millisecond time source with sub-millisecond resolution.
///
/// The absolute value is meaningless; only differences between two reads
/// taken by the same clock are compared.
pub trait Clock {
    fn now_ms(&self) -> f64;
}

impl<F> Clock for F
where
    F: Fn() -> f64,
{
    #[inline]
    fn now_ms(&self) -> f64 {
        self()
    }
}

#[cfg(feature = "std")]
mod monotonic {
    use std::time::Instant;

    use lazy_static::lazy_static;

    use super::Clock;

    lazy_static! {
        /// Shared origin so readings taken on different threads are comparable.
        static ref ORIGIN: Instant = Instant::now();
    }

    /// Milliseconds elapsed since the process-wide origin.
    ///
    /// Backed by [`Instant`], so it never goes backwards and keeps
    /// nanosecond resolution in the fractional part.
    pub fn get_time_ms() -> f64 {
        ORIGIN.elapsed().as_secs_f64() * 1000.0
    }

    /// [`Clock`] reading [`get_time_ms`].
    #[derive(Debug, Clone, Copy, Default)]
    pub struct MonotonicClock;

    impl Clock for MonotonicClock {
        #[inline]
        fn now_ms(&self) -> f64 {
            get_time_ms()
        }
    }
}

#[cfg(feature = "std")]
pub use monotonic::{get_time_ms, MonotonicClock};
