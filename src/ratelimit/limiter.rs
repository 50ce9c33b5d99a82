//! Core vote limiter implementation.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, trace};

use super::key::VoteKey;
use super::window::CooldownWindow;
use crate::clock::{Clock, SystemClock};
use crate::directory::Directory;
use crate::error::{Result, SitevoteError};

/// Largest window a caller may request unless configured otherwise (one day).
pub const DEFAULT_MAX_WINDOW_MINUTES: u32 = 24 * 60;

/// Outcome of the vote procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteStatus {
    /// The vote was recorded; `votes` is the item's count after the increment.
    Ok { votes: u64 },
    /// A vote from the same fingerprint was accepted within the window.
    RateLimited,
}

impl VoteStatus {
    /// Wire literal for this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteStatus::Ok { .. } => "ok",
            VoteStatus::RateLimited => "rate_limited",
        }
    }

    /// Parse the wire literal returned by the remote procedure.
    pub fn from_wire(status: &str, votes: u64) -> Result<Self> {
        match status {
            "ok" => Ok(VoteStatus::Ok { votes }),
            "rate_limited" => Ok(VoteStatus::RateLimited),
            other => Err(SitevoteError::UnexpectedResponse(format!(
                "unknown vote status {:?}",
                other
            ))),
        }
    }
}

/// The authoritative vote limiter.
///
/// Each `(ip_hash, item)` pair maps to the instant of its last accepted vote.
/// The check, the record update and the counter increment all happen while the
/// map entry for that pair is exclusively locked, so concurrent callers with
/// the same key are serialized and at most one of them is accepted per window.
pub struct VoteLimiter {
    /// Last accepted vote per fingerprint and item
    records: DashMap<VoteKey, DateTime<Utc>>,
    /// Sites and their vote counters
    directory: Arc<Directory>,
    clock: Arc<dyn Clock>,
    /// Upper bound on caller-supplied windows
    max_window: CooldownWindow,
}

impl VoteLimiter {
    /// Create a limiter over `directory` using the system clock.
    pub fn new(directory: Arc<Directory>) -> Self {
        Self::with_clock(directory, Arc::new(SystemClock))
    }

    /// Create a limiter with an explicit clock.
    pub fn with_clock(directory: Arc<Directory>, clock: Arc<dyn Clock>) -> Self {
        Self {
            records: DashMap::new(),
            directory,
            clock,
            max_window: CooldownWindow::from_minutes(DEFAULT_MAX_WINDOW_MINUTES)
                .unwrap_or_default(),
        }
    }

    /// Cap the windows callers may request.
    pub fn with_max_window(mut self, max_window: CooldownWindow) -> Self {
        self.max_window = max_window;
        self
    }

    /// Record a vote unless this fingerprint voted for `item` within the window.
    ///
    /// Returns `RateLimited` without touching any state when blocked. Unknown
    /// items and malformed arguments are errors and leave no record behind.
    pub fn vote_if_allowed(
        &self,
        ip_hash: &str,
        item: &str,
        window_minutes: u32,
    ) -> Result<VoteStatus> {
        let window = CooldownWindow::from_minutes(window_minutes)?;
        if window > self.max_window {
            return Err(SitevoteError::InvalidArgument(format!(
                "window_minutes must be at most {}",
                self.max_window.minutes()
            )));
        }

        let key = VoteKey::new(ip_hash, item)?;
        if !self.directory.contains(item) {
            return Err(SitevoteError::ItemNotFound(item.to_string()));
        }

        let now = self.clock.now();

        trace!(key = %key, window = %window, "Checking vote");

        match self.records.entry(key) {
            Entry::Occupied(mut entry) => {
                let last_vote = *entry.get();
                if window.blocks(last_vote, now) {
                    debug!(
                        key = %entry.key(),
                        remaining_secs = window.remaining(last_vote, now).num_seconds(),
                        "Vote rate limited"
                    );
                    return Ok(VoteStatus::RateLimited);
                }

                let votes = self.directory.increment_votes(item)?;
                entry.insert(now);
                debug!(key = %entry.key(), votes, "Vote accepted");
                Ok(VoteStatus::Ok { votes })
            }
            Entry::Vacant(entry) => {
                let votes = self.directory.increment_votes(item)?;
                debug!(key = %entry.key(), votes, "First vote accepted");
                entry.insert(now);
                Ok(VoteStatus::Ok { votes })
            }
        }
    }

    /// Instant of the last accepted vote for a pair, if any.
    pub fn last_vote(&self, ip_hash: &str, item: &str) -> Option<DateTime<Utc>> {
        let key = VoteKey::new(ip_hash, item).ok()?;
        self.records.get(&key).map(|r| *r.value())
    }

    /// Drop records whose last vote is at least `retention` old.
    ///
    /// Returns the number of records removed.
    pub fn prune_expired(&self, retention: Duration) -> usize {
        let now = self.clock.now();
        let before = self.records.len();
        self.records
            .retain(|_, last_vote| now.signed_duration_since(*last_vote) < retention);
        let removed = before.saturating_sub(self.records.len());
        if removed > 0 {
            debug!(removed, "Pruned expired vote records");
        }
        removed
    }

    /// Number of stored vote records.
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// The directory whose counters this limiter mutates.
    pub fn directory(&self) -> &Arc<Directory> {
        &self.directory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::directory::Site;
    use chrono::TimeZone;

    const HASH_A: &str = "d32013383e58be54a27f1f5df61022f55a2d5421221ef3e896ead64dbdb0398f";
    const HASH_B: &str = "1936e564e19d7bbd0cae1b03bf2abecaff1defa7962bac08dc5b1dd183972a10";

    fn create_test_limiter() -> (VoteLimiter, ManualClock) {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        let directory = Directory::from_sites(vec![
            Site::new("42", "Example", "https://example.com").approved(),
            Site::new("43", "Other", "https://other.example").approved(),
        ])
        .unwrap();
        let limiter = VoteLimiter::with_clock(Arc::new(directory), Arc::new(clock.clone()));
        (limiter, clock)
    }

    #[test]
    fn test_first_vote_accepted() {
        let (limiter, _) = create_test_limiter();

        let status = limiter.vote_if_allowed(HASH_A, "42", 5).unwrap();

        assert_eq!(status, VoteStatus::Ok { votes: 1 });
        assert_eq!(limiter.directory().votes("42"), Some(1));
        assert_eq!(limiter.record_count(), 1);
    }

    #[test]
    fn test_repeat_within_window_is_rate_limited() {
        let (limiter, clock) = create_test_limiter();

        limiter.vote_if_allowed(HASH_A, "42", 5).unwrap();
        clock.advance(Duration::minutes(4));

        let status = limiter.vote_if_allowed(HASH_A, "42", 5).unwrap();
        assert_eq!(status, VoteStatus::RateLimited);
        assert_eq!(limiter.directory().votes("42"), Some(1));
    }

    #[test]
    fn test_window_edge() {
        let (limiter, clock) = create_test_limiter();

        limiter.vote_if_allowed(HASH_A, "42", 5).unwrap();

        clock.advance(Duration::minutes(5) - Duration::milliseconds(1));
        assert_eq!(
            limiter.vote_if_allowed(HASH_A, "42", 5).unwrap(),
            VoteStatus::RateLimited
        );

        clock.advance(Duration::milliseconds(1));
        assert_eq!(
            limiter.vote_if_allowed(HASH_A, "42", 5).unwrap(),
            VoteStatus::Ok { votes: 2 }
        );
    }

    #[test]
    fn test_window_slides_from_last_accepted_vote() {
        // A fixed window would reopen at the 5 minute boundary regardless of
        // rejected attempts; a sliding one is anchored on the accepted vote.
        let (limiter, clock) = create_test_limiter();

        limiter.vote_if_allowed(HASH_A, "42", 5).unwrap();
        clock.advance(Duration::minutes(3));
        assert_eq!(
            limiter.vote_if_allowed(HASH_A, "42", 5).unwrap(),
            VoteStatus::RateLimited
        );

        // Rejected attempts do not push the window forward.
        clock.advance(Duration::minutes(2));
        assert_eq!(
            limiter.vote_if_allowed(HASH_A, "42", 5).unwrap(),
            VoteStatus::Ok { votes: 2 }
        );

        // The new window starts at the second accepted vote.
        clock.advance(Duration::minutes(4));
        assert_eq!(
            limiter.vote_if_allowed(HASH_A, "42", 5).unwrap(),
            VoteStatus::RateLimited
        );
    }

    #[test]
    fn test_different_fingerprints_and_items_are_independent() {
        let (limiter, _) = create_test_limiter();

        assert_eq!(
            limiter.vote_if_allowed(HASH_A, "42", 5).unwrap(),
            VoteStatus::Ok { votes: 1 }
        );
        assert_eq!(
            limiter.vote_if_allowed(HASH_B, "42", 5).unwrap(),
            VoteStatus::Ok { votes: 2 }
        );
        assert_eq!(
            limiter.vote_if_allowed(HASH_A, "43", 5).unwrap(),
            VoteStatus::Ok { votes: 1 }
        );
        assert_eq!(limiter.record_count(), 3);
    }

    #[test]
    fn test_unknown_item_leaves_no_record() {
        let (limiter, _) = create_test_limiter();

        let result = limiter.vote_if_allowed(HASH_A, "missing", 5);

        assert!(matches!(result, Err(SitevoteError::ItemNotFound(_))));
        assert_eq!(limiter.record_count(), 0);
    }

    #[test]
    fn test_invalid_arguments_rejected() {
        let (limiter, _) = create_test_limiter();

        assert!(matches!(
            limiter.vote_if_allowed(HASH_A, "42", 0),
            Err(SitevoteError::InvalidArgument(_))
        ));
        assert!(matches!(
            limiter.vote_if_allowed("198.51.100.7", "42", 5),
            Err(SitevoteError::InvalidArgument(_))
        ));
        assert!(matches!(
            limiter.vote_if_allowed(HASH_A, "", 5),
            Err(SitevoteError::InvalidArgument(_))
        ));
        assert_eq!(limiter.directory().votes("42"), None);
    }

    #[test]
    fn test_window_above_max_rejected() {
        let (limiter, _) = create_test_limiter();
        let limiter = limiter.with_max_window(CooldownWindow::from_minutes(60).unwrap());

        assert!(limiter.vote_if_allowed(HASH_A, "42", 60).is_ok());
        assert!(matches!(
            limiter.vote_if_allowed(HASH_A, "43", 61),
            Err(SitevoteError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_concurrent_votes_accept_exactly_one() {
        let (limiter, _) = create_test_limiter();

        let accepted = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..16)
                .map(|_| scope.spawn(|| limiter.vote_if_allowed(HASH_A, "42", 5).unwrap()))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|status| matches!(status, VoteStatus::Ok { .. }))
                .count()
        });

        assert_eq!(accepted, 1);
        assert_eq!(limiter.directory().votes("42"), Some(1));
    }

    #[test]
    fn test_prune_expired() {
        let (limiter, clock) = create_test_limiter();

        limiter.vote_if_allowed(HASH_A, "42", 5).unwrap();
        clock.advance(Duration::minutes(30));
        limiter.vote_if_allowed(HASH_B, "42", 5).unwrap();
        clock.advance(Duration::minutes(30));

        assert_eq!(limiter.prune_expired(Duration::hours(1)), 1);
        assert!(limiter.last_vote(HASH_A, "42").is_none());
        assert!(limiter.last_vote(HASH_B, "42").is_some());
    }

    #[test]
    fn test_status_wire_literals() {
        assert_eq!(VoteStatus::Ok { votes: 3 }.as_str(), "ok");
        assert_eq!(VoteStatus::RateLimited.as_str(), "rate_limited");
        assert_eq!(
            VoteStatus::from_wire("ok", 3).unwrap(),
            VoteStatus::Ok { votes: 3 }
        );
        assert_eq!(
            VoteStatus::from_wire("rate_limited", 0).unwrap(),
            VoteStatus::RateLimited
        );
        assert!(matches!(
            VoteStatus::from_wire("maybe", 0),
            Err(SitevoteError::UnexpectedResponse(_))
        ));
    }
}
