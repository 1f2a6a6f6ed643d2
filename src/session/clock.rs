//! Elapsed session time with one-second resolution, capped at 24 hours

use std::fmt;

/// (hours, minutes, seconds) with `s, m < 60` and `h <= 24`.
///
/// 24:00:00 is the only value with `h == 24`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ElapsedTime {
    hours: u8,
    minutes: u8,
    seconds: u8,
}

impl ElapsedTime {
    pub const ZERO: Self = Self {
        hours: 0,
        minutes: 0,
        seconds: 0,
    };

    /// Saturation point
    pub const MAX: Self = Self {
        hours: 24,
        minutes: 0,
        seconds: 0,
    };

    pub fn new(hours: u8, minutes: u8, seconds: u8) -> Option<Self> {
        let t = Self {
            hours,
            minutes,
            seconds,
        };
        (minutes < 60 && seconds < 60 && t <= Self::MAX).then_some(t)
    }

    pub fn hours(self) -> u8 {
        self.hours
    }

    pub fn minutes(self) -> u8 {
        self.minutes
    }

    pub fn seconds(self) -> u8 {
        self.seconds
    }

    pub fn as_secs(self) -> u32 {
        self.hours as u32 * 3600 + self.minutes as u32 * 60 + self.seconds as u32
    }

    /// One second later, with carry. Stays at `MAX`.
    fn advance(self) -> Self {
        if self >= Self::MAX {
            return Self::MAX;
        }

        let mut next = self;
        next.seconds += 1;
        if next.seconds == 60 {
            next.seconds = 0;
            next.minutes += 1;
        }
        if next.minutes == 60 {
            next.minutes = 0;
            next.hours += 1;
        }
        next
    }
}

/// `HH : MM : SS`
impl fmt::Display for ElapsedTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02} : {:02} : {:02}",
            self.hours, self.minutes, self.seconds
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClockState {
    #[default]
    Stopped,
    Ticking,
}

/// Counter advanced by an external 1000ms tick source.
///
/// Ticks only count while `Ticking`. Reaching 24:00:00 stops the clock but
/// keeps the value; only `reset` clears it.
#[derive(Debug, Clone, Default)]
pub struct SessionClock {
    elapsed: ElapsedTime,
    state: ClockState,
}

impl SessionClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        self.state = ClockState::Ticking;
    }

    /// Pause without clearing
    pub fn stop(&mut self) {
        self.state = ClockState::Stopped;
    }

    pub fn reset(&mut self) {
        self.elapsed = ElapsedTime::ZERO;
        self.state = ClockState::Stopped;
    }

    /// Apply one tick. Returns whether the counter moved.
    pub fn tick(&mut self) -> bool {
        if self.state != ClockState::Ticking {
            return false;
        }

        self.elapsed = self.elapsed.advance();
        if self.elapsed == ElapsedTime::MAX {
            self.state = ClockState::Stopped;
        }
        true
    }

    pub fn elapsed(&self) -> ElapsedTime {
        self.elapsed
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn is_ticking(&self) -> bool {
        self.state == ClockState::Ticking
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ticking_at(h: u8, m: u8, s: u8) -> SessionClock {
        SessionClock {
            elapsed: ElapsedTime::new(h, m, s).unwrap(),
            state: ClockState::Ticking,
        }
    }

    #[test]
    fn display_is_padded_with_spaced_colons() {
        assert_eq!(ElapsedTime::ZERO.to_string(), "00 : 00 : 00");
        assert_eq!(ElapsedTime::new(1, 2, 9).unwrap().to_string(), "01 : 02 : 09");
        assert_eq!(ElapsedTime::MAX.to_string(), "24 : 00 : 00");
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(ElapsedTime::new(0, 60, 0).is_none());
        assert!(ElapsedTime::new(0, 0, 60).is_none());
        assert!(ElapsedTime::new(24, 0, 1).is_none());
        assert!(ElapsedTime::new(25, 0, 0).is_none());
    }

    #[test]
    fn stopped_clock_ignores_ticks() {
        let mut clock = SessionClock::new();
        assert!(!clock.tick());
        assert_eq!(clock.elapsed(), ElapsedTime::ZERO);
    }

    #[test]
    fn counts_seconds_once_started() {
        let mut clock = SessionClock::new();
        clock.start();
        for _ in 0..3 {
            clock.tick();
        }
        assert_eq!(clock.elapsed().to_string(), "00 : 00 : 03");
    }

    #[test]
    fn saturates_at_twenty_four_hours() {
        let mut clock = ticking_at(23, 59, 59);
        assert!(clock.tick());
        assert_eq!(clock.elapsed(), ElapsedTime::MAX);
        assert_eq!(clock.state(), ClockState::Stopped);

        for _ in 0..10 {
            assert!(!clock.tick());
        }
        assert_eq!(clock.elapsed(), ElapsedTime::MAX);
    }

    #[test]
    fn restart_after_saturation_stays_put() {
        let mut clock = ticking_at(23, 59, 59);
        clock.tick();
        clock.start();
        clock.tick();
        assert_eq!(clock.elapsed(), ElapsedTime::MAX);
        assert!(!clock.is_ticking());
    }

    #[test]
    fn stop_keeps_value_reset_clears() {
        let mut clock = ticking_at(0, 5, 0);
        clock.stop();
        assert_eq!(clock.elapsed().as_secs(), 300);

        clock.start();
        clock.reset();
        assert_eq!(clock.elapsed(), ElapsedTime::ZERO);
        assert_eq!(clock.state(), ClockState::Stopped);
    }

    proptest! {
        #[test]
        fn minute_carry(h in 0u8..24, m in 0u8..60, s in 0u8..60) {
            let mut clock = ticking_at(h, m, s);
            for _ in 0..(60 - s) {
                clock.tick();
            }

            let expected = if m == 59 {
                ElapsedTime::new(h + 1, 0, 0).unwrap()
            } else {
                ElapsedTime::new(h, m + 1, 0).unwrap()
            };
            prop_assert_eq!(clock.elapsed(), expected);
        }

        #[test]
        fn reset_from_any_state(h in 0u8..24, m in 0u8..60, s in 0u8..60, ticking in any::<bool>()) {
            let mut clock = ticking_at(h, m, s);
            if !ticking {
                clock.stop();
            }
            clock.reset();
            prop_assert_eq!(clock.elapsed(), ElapsedTime::ZERO);
            prop_assert_eq!(clock.state(), ClockState::Stopped);
        }

        #[test]
        fn ticks_are_monotonic(h in 0u8..24, m in 0u8..60, s in 0u8..60, n in 1u32..200) {
            let mut clock = ticking_at(h, m, s);
            let start = clock.elapsed().as_secs();
            for _ in 0..n {
                clock.tick();
            }
            let expected = (start + n).min(ElapsedTime::MAX.as_secs());
            prop_assert_eq!(clock.elapsed().as_secs(), expected);
        }
    }
}
