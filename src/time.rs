// Defines a trait for timestamps fed to the control loop and provides several implementations
// Copyright © 2025 Hs293Go
//
// Permission is hereby granted, free of charge, to any person obtaining
// a copy of this software and associated documentation files (the "Software"),
// to deal in the Software without restriction, including without limitation
// the rights to use, copy, modify, merge, publish, distribute, sublicense,
// and/or sell copies of the Software, and to permit persons to whom the
// Software is furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included
// in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES
// OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT.
// IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM,
// DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT,
// TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE
// OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

use core::ops::Add;
use core::time::Duration;

use core::any::Any;
use core::fmt::Debug;

/// A trait for time-like objects that can be used to measure elapsed time.
///
/// The control loop compares the elapsed time between two samples against the maximum interval.
/// Unlike `std::time::Instant::duration_since`, the elapsed time is **signed**: a sample that
/// arrives with a timestamp earlier than its predecessor must be reported as a negative interval
/// so the loop can reject it instead of saturating to zero.
pub trait InstantLike:
    Sized
    + Add<Duration, Output = Self>
    + Clone
    + Copy
    + Debug
    + PartialEq<Self>
    + Send
    + Sync
    + Unpin
    + Any
{
    /// Returns the signed number of seconds elapsed from `earlier` to this instant
    #[must_use]
    fn secs_since(&self, earlier: Self) -> f64;
}

/// Signed difference of two unsigned tick counts, scaled to seconds
fn signed_ticks_to_secs(now: u64, earlier: u64, ticks_per_sec: f64) -> f64 {
    if now >= earlier {
        (now - earlier) as f64 / ticks_per_sec
    } else {
        -((earlier - now) as f64 / ticks_per_sec)
    }
}

/// A wrapper around an unsigned 64-bit integer representing milliseconds.
/// You would wrap the millisecond tick counter of your scheduler in this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Millis(pub u64);

impl InstantLike for Millis {
    fn secs_since(&self, earlier: Self) -> f64 {
        signed_ticks_to_secs(self.0, earlier.0, 1e3)
    }
}

impl Add<Duration> for Millis {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        Millis(self.0 + rhs.as_millis() as u64)
    }
}

/// A wrapper around an unsigned 64-bit integer representing microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Micros(pub u64);

impl InstantLike for Micros {
    fn secs_since(&self, earlier: Self) -> f64 {
        signed_ticks_to_secs(self.0, earlier.0, 1e6)
    }
}

impl Add<Duration> for Micros {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        Micros(self.0 + rhs.as_micros() as u64)
    }
}

/// Seconds since an arbitrary epoch
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct TimeF64(pub f64);

impl InstantLike for TimeF64 {
    fn secs_since(&self, earlier: Self) -> f64 {
        self.0 - earlier.0
    }
}

impl Add<Duration> for TimeF64 {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        TimeF64(self.0 + rhs.as_secs_f64())
    }
}

impl TimeF64 {
    /// Constructs a new TimeF64 from raw seconds.
    pub fn from_secs(secs: f64) -> Self {
        TimeF64(secs)
    }

    /// Returns the underlying seconds.
    pub fn as_secs_f64(&self) -> f64 {
        self.0
    }
}

/// A convenient wrapper around `std::time::Instant` satisfying the `InstantLike` trait.
#[cfg(feature = "std")]
mod std_instant {

    use super::{Add, Duration, InstantLike};

    /// Wall-clock-free monotonic timestamp backed by `std::time::Instant`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
    pub struct StdInstant(pub std::time::Instant);

    impl StdInstant {
        /// Captures the current instant
        pub fn now() -> Self {
            StdInstant(std::time::Instant::now())
        }
    }

    impl InstantLike for StdInstant {
        fn secs_since(&self, earlier: Self) -> f64 {
            match self.0.checked_duration_since(earlier.0) {
                Some(elapsed) => elapsed.as_secs_f64(),
                None => -earlier.0.duration_since(self.0).as_secs_f64(),
            }
        }
    }

    impl Add<Duration> for StdInstant {
        type Output = Self;

        fn add(self, rhs: Duration) -> Self::Output {
            StdInstant(self.0 + rhs)
        }
    }

    /// Tests that StdInstant reports the same elapsed time as the underlying Instant, and a
    /// negative interval when the arguments are swapped.
    #[cfg(test)]
    #[test]
    fn test_std_instant_wrapper() {
        let start = StdInstant::now();
        let end = start + core::time::Duration::from_millis(250);
        assert_eq!(end.secs_since(start), end.0.duration_since(start.0).as_secs_f64());
        assert_eq!(start.secs_since(end), -0.25);
    }
}

#[cfg(feature = "std")]
pub use std_instant::StdInstant;
