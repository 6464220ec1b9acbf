//! Simulation time
//!
//! Every tick is one nanosecond. The symbol periods of all the 802.15.4 PHYs we simulate
//! (16 us for 2.4 GHz O-QPSK, 25 us for 915 MHz BPSK, 50 us for 868 MHz BPSK, ...) are whole
//! numbers of nanoseconds, so converting a symbol count into time is exact.
//!
//! All conversions between symbols and time go through [`Duration::from_symbols`] and
//! [`Duration::as_symbols`].

use core::{
    fmt::Display,
    ops::{Add, AddAssign, Mul, Sub, SubAssign},
};

pub const TICKS_PER_SECOND: u64 = 1_000_000_000;
pub const TICKS_PER_MILLI: u64 = TICKS_PER_SECOND / 1000;
pub const TICKS_PER_MICRO: u64 = TICKS_PER_MILLI / 1000;

/// An instant on the simulation timeline.
///
/// Wraps after ~584 years
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Instant {
    ticks: u64,
}

impl Instant {
    pub const ZERO: Self = Self::from_ticks(0);

    pub const fn from_ticks(ticks: u64) -> Self {
        Self { ticks }
    }

    pub const fn from_seconds(seconds: u64) -> Self {
        Self::from_ticks(seconds * TICKS_PER_SECOND)
    }

    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    #[must_use]
    pub const fn checked_duration_since(&self, other: Self) -> Option<Duration> {
        let negative = other.ticks > self.ticks;
        let diff = self.ticks.abs_diff(other.ticks);

        if diff > i64::MAX as u64 {
            return None;
        }

        Some(Duration {
            ticks: diff as i64 * if negative { -1 } else { 1 },
        })
    }

    /// The (possibly negative) duration from `other` to `self`
    #[must_use]
    pub fn duration_since(&self, other: Self) -> Duration {
        unwrap!(self.checked_duration_since(other))
    }

    #[must_use]
    pub fn duration_since_epoch(&self) -> Duration {
        self.duration_since(Instant::ZERO)
    }

    #[must_use]
    pub const fn checked_add_duration(self, duration: Duration) -> Option<Self> {
        match self.ticks.checked_add_signed(duration.ticks) {
            Some(ticks) => Some(Self { ticks }),
            None => None,
        }
    }

    #[must_use]
    pub const fn checked_sub_duration(self, duration: Duration) -> Option<Self> {
        match self.ticks.checked_add_signed(-duration.ticks) {
            Some(ticks) => Some(Self { ticks }),
            None => None,
        }
    }

    /// Subtract the duration, stopping at the start of the timeline
    #[must_use]
    pub const fn saturating_sub_duration(self, duration: Duration) -> Self {
        match self.checked_sub_duration(duration) {
            Some(instant) => instant,
            None => Self::ZERO,
        }
    }
}

impl Display for Instant {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "@{}", self.duration_since_epoch())
    }
}

#[cfg(feature = "defmt-03")]
impl defmt::Format for Instant {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "@{}", self.duration_since_epoch())
    }
}

impl Add<Duration> for Instant {
    type Output = Instant;

    fn add(self, rhs: Duration) -> Self::Output {
        unwrap!(self.checked_add_duration(rhs))
    }
}

impl AddAssign<Duration> for Instant {
    fn add_assign(&mut self, rhs: Duration) {
        *self = *self + rhs;
    }
}

impl Sub<Duration> for Instant {
    type Output = Instant;

    fn sub(self, rhs: Duration) -> Self::Output {
        unwrap!(self.checked_sub_duration(rhs))
    }
}

impl Sub<Instant> for Instant {
    type Output = Duration;

    fn sub(self, rhs: Instant) -> Self::Output {
        self.duration_since(rhs)
    }
}

impl SubAssign<Duration> for Instant {
    fn sub_assign(&mut self, rhs: Duration) {
        *self = *self - rhs;
    }
}

/// A span of simulation time. Can be negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Duration {
    ticks: i64,
}

impl Display for Duration {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let neg = self.ticks < 0;
        let value = self.abs();

        let s = value.secs();
        let us = (value - Self::from_seconds(s)).micros();

        if neg {
            write!(f, "-{s}.{us:06} secs")
        } else {
            write!(f, "{s}.{us:06} secs")
        }
    }
}

#[cfg(feature = "defmt-03")]
impl defmt::Format for Duration {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{=i64} us", self.micros())
    }
}

impl Duration {
    pub const ZERO: Self = Self::from_ticks(0);

    pub const fn from_ticks(ticks: i64) -> Self {
        Self { ticks }
    }

    pub const fn from_seconds(seconds: i64) -> Self {
        Self::from_ticks(seconds * TICKS_PER_SECOND as i64)
    }

    pub const fn from_millis(millis: i64) -> Self {
        Self::from_ticks(millis * TICKS_PER_MILLI as i64)
    }

    pub const fn from_micros(micros: i64) -> Self {
        Self::from_ticks(micros * TICKS_PER_MICRO as i64)
    }

    /// The time it takes to send `symbols` symbols with the given symbol period
    pub fn from_symbols(symbols: u64, symbol_period: Duration) -> Self {
        symbol_period * unwrap!(i64::try_from(symbols))
    }

    pub const fn ticks(&self) -> i64 {
        self.ticks
    }

    /// The amount of *full* symbol periods in this duration.
    /// Always rounds down, negative durations hold zero symbols.
    pub fn as_symbols(&self, symbol_period: Duration) -> u64 {
        debug_assert!(symbol_period.ticks > 0);

        if self.ticks <= 0 {
            return 0;
        }

        (self.ticks / symbol_period.ticks) as u64
    }

    /// The amount of *full* seconds in this duration.
    /// Always rounds down.
    pub const fn secs(&self) -> i64 {
        if self.ticks().is_negative() {
            -(self.ticks().unsigned_abs().div_ceil(TICKS_PER_SECOND) as i64)
        } else {
            self.ticks() / TICKS_PER_SECOND as i64
        }
    }

    /// The amount of *full* milliseconds in this duration.
    /// Always rounds down.
    pub const fn millis(&self) -> i64 {
        if self.ticks().is_negative() {
            -(self.ticks().unsigned_abs().div_ceil(TICKS_PER_MILLI) as i64)
        } else {
            self.ticks() / TICKS_PER_MILLI as i64
        }
    }

    /// The amount of *full* microseconds in this duration.
    /// Always rounds down.
    pub const fn micros(&self) -> i64 {
        if self.ticks().is_negative() {
            -(self.ticks().unsigned_abs().div_ceil(TICKS_PER_MICRO) as i64)
        } else {
            self.ticks() / TICKS_PER_MICRO as i64
        }
    }

    #[must_use]
    pub const fn checked_add(self, duration: Duration) -> Option<Self> {
        match self.ticks.checked_add(duration.ticks) {
            Some(ticks) => Some(Self { ticks }),
            None => None,
        }
    }

    #[must_use]
    pub const fn checked_sub(self, duration: Duration) -> Option<Self> {
        match self.ticks.checked_sub(duration.ticks) {
            Some(ticks) => Some(Self { ticks }),
            None => None,
        }
    }

    #[must_use]
    pub const fn abs(self) -> Self {
        Self {
            ticks: self.ticks.abs(),
        }
    }

    pub const fn is_negative(&self) -> bool {
        self.ticks < 0
    }

    /// Clamp negative durations to zero
    #[must_use]
    pub const fn max_zero(self) -> Self {
        if self.ticks < 0 {
            Self::ZERO
        } else {
            self
        }
    }

    #[cfg(feature = "std")]
    pub fn into_std(self) -> std::time::Duration {
        self.into()
    }
}

impl Add for Duration {
    type Output = Duration;

    fn add(self, rhs: Duration) -> Self::Output {
        unwrap!(self.checked_add(rhs))
    }
}

impl AddAssign for Duration {
    fn add_assign(&mut self, rhs: Duration) {
        *self = *self + rhs;
    }
}

impl Sub for Duration {
    type Output = Duration;

    fn sub(self, rhs: Duration) -> Self::Output {
        unwrap!(self.checked_sub(rhs))
    }
}

impl SubAssign for Duration {
    fn sub_assign(&mut self, rhs: Duration) {
        *self = *self - rhs;
    }
}

impl Mul<i64> for Duration {
    type Output = Duration;

    fn mul(self, rhs: i64) -> Self::Output {
        Self {
            ticks: unwrap!(self.ticks.checked_mul(rhs)),
        }
    }
}

impl Mul<Duration> for i64 {
    type Output = Duration;

    fn mul(self, rhs: Duration) -> Self::Output {
        rhs * self
    }
}

#[cfg(feature = "std")]
impl From<Duration> for std::time::Duration {
    fn from(value: Duration) -> Self {
        std::time::Duration::from_nanos(value.ticks().max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SYMBOL: Duration = Duration::from_micros(16);

    #[test]
    fn duration_since() {
        assert_eq!(
            Instant::from_ticks(0).duration_since(Instant::from_ticks(5)),
            Duration::from_ticks(-5)
        );
        assert_eq!(
            Instant::from_ticks(10) - Instant::from_ticks(5),
            Duration::from_ticks(5)
        );
    }

    #[test]
    fn add_sub() {
        assert_eq!(
            Instant::from_ticks(10) + Duration::from_ticks(-5),
            Instant::from_ticks(5)
        );
        assert_eq!(
            Instant::from_ticks(0) - Duration::from_ticks(-5),
            Instant::from_ticks(5)
        );
        assert_eq!(
            Instant::from_ticks(3).saturating_sub_duration(Duration::from_ticks(5)),
            Instant::ZERO
        );
        assert_eq!(
            Duration::from_ticks(10) - Duration::from_ticks(15),
            Duration::from_ticks(-5)
        );
    }

    #[test]
    fn symbols() {
        assert_eq!(Duration::from_symbols(20, SYMBOL), Duration::from_micros(320));
        assert_eq!(Duration::from_micros(320).as_symbols(SYMBOL), 20);
        // Partial symbols don't count
        assert_eq!(Duration::from_micros(335).as_symbols(SYMBOL), 20);
        assert_eq!(Duration::from_micros(-335).as_symbols(SYMBOL), 0);
    }

    #[test]
    fn display() {
        extern crate std;
        use std::string::ToString;

        assert_eq!(Duration::from_micros(1_500_016).to_string(), "1.500016 secs");
        assert_eq!(Duration::from_millis(-250).to_string(), "-0.250000 secs");
    }
}
