//! Monotonic time source.
//!
//! Suspension itself goes through `embedded-hal-async`'s `DelayNs`; this
//! trait only answers "what time is it", in milliseconds since an arbitrary
//! epoch. Deadlines inside the crate are absolute `u64` millisecond values.

/// Millisecond monotonic clock.
pub trait Monotonic {
    fn now_ms(&self) -> u64;
}

impl<T: Monotonic + ?Sized> Monotonic for &T {
    fn now_ms(&self) -> u64 {
        T::now_ms(self)
    }
}

/// [`Monotonic`] backed by the embassy time driver.
#[cfg(feature = "embassy")]
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbassyTime;

#[cfg(feature = "embassy")]
impl Monotonic for EmbassyTime {
    fn now_ms(&self) -> u64 {
        embassy_time::Instant::now().as_millis()
    }
}
