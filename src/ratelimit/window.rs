//! Cooldown window arithmetic shared by the local guard and the server limiter.

use chrono::{DateTime, Duration, Utc};

use crate::error::{Result, SitevoteError};

/// Window used when the caller does not ask for one.
pub const DEFAULT_WINDOW_MINUTES: u32 = 5;

/// Minimum time between two accepted votes for the same identity and item.
///
/// The window slides: it is measured from the last accepted vote, not from a
/// fixed boundary. A vote is blocked while `elapsed < window` and allowed once
/// `elapsed >= window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CooldownWindow {
    minutes: u32,
}

impl CooldownWindow {
    /// Create a window of `minutes` minutes. Zero is rejected.
    pub fn from_minutes(minutes: u32) -> Result<Self> {
        if minutes == 0 {
            return Err(SitevoteError::InvalidArgument(
                "window_minutes must be positive".to_string(),
            ));
        }
        Ok(Self { minutes })
    }

    /// Length of the window in minutes.
    pub fn minutes(&self) -> u32 {
        self.minutes
    }

    /// Length of the window as a duration.
    pub fn duration(&self) -> Duration {
        Duration::minutes(i64::from(self.minutes))
    }

    /// Whether a vote accepted at `last_vote` still blocks a vote at `now`.
    ///
    /// A `last_vote` in the future (clock skew) blocks.
    pub fn blocks(&self, last_vote: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(last_vote) < self.duration()
    }

    /// Time left until a vote accepted at `last_vote` stops blocking.
    pub fn remaining(&self, last_vote: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
        let remaining = self.duration() - now.signed_duration_since(last_vote);
        remaining.max(Duration::zero())
    }
}

impl Default for CooldownWindow {
    fn default() -> Self {
        Self {
            minutes: DEFAULT_WINDOW_MINUTES,
        }
    }
}

impl std::fmt::Display for CooldownWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}m", self.minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_zero_window_rejected() {
        assert!(matches!(
            CooldownWindow::from_minutes(0),
            Err(SitevoteError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_default_window_is_five_minutes() {
        let window = CooldownWindow::default();
        assert_eq!(window.minutes(), 5);
        assert_eq!(window.duration(), Duration::minutes(5));
    }

    #[test]
    fn test_window_edge_is_inclusive_exclusive() {
        let window = CooldownWindow::from_minutes(5).unwrap();
        let last = t0();

        assert!(window.blocks(last, last));
        assert!(window.blocks(last, last + Duration::minutes(5) - Duration::milliseconds(1)));
        assert!(!window.blocks(last, last + Duration::minutes(5)));
        assert!(!window.blocks(last, last + Duration::minutes(6)));
    }

    #[test]
    fn test_future_vote_blocks() {
        let window = CooldownWindow::from_minutes(1).unwrap();
        assert!(window.blocks(t0() + Duration::hours(1), t0()));
    }

    #[test]
    fn test_remaining() {
        let window = CooldownWindow::from_minutes(5).unwrap();
        let last = t0();

        assert_eq!(window.remaining(last, last + Duration::seconds(60)), Duration::minutes(4));
        assert_eq!(window.remaining(last, last + Duration::minutes(10)), Duration::zero());
    }
}
