//! Local cooldown guard.

use std::sync::Arc;

use tracing::{debug, warn};

use super::storage::{LocalStore, LocalVoteRecord};
use crate::clock::Clock;
use crate::error::Result;
use crate::ratelimit::CooldownWindow;

/// Decision of the local guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    /// No fresh local record; go ahead and ask the server.
    Allowed,
    /// This client voted for the item within the window.
    LocalCooldown,
}

/// Rejects repeat votes from this client without a network round-trip.
///
/// The guard is only an optimization. The server limiter stays authoritative,
/// which is why an unreadable store lets the vote through instead of
/// blocking it.
pub struct CooldownGuard {
    store: Arc<dyn LocalStore>,
    clock: Arc<dyn Clock>,
}

impl CooldownGuard {
    pub fn new(store: Arc<dyn LocalStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Check whether a vote for `item` may be attempted. Never writes.
    pub fn check(&self, item: &str, window: CooldownWindow) -> GuardDecision {
        let record = match LocalVoteRecord::load(self.store.as_ref(), item) {
            Ok(record) => record,
            Err(e) => {
                warn!(item, error = %e, "Local vote store unreadable, deferring to server");
                None
            }
        };

        match record {
            Some(record) if window.blocks(record.last_vote, self.clock.now()) => {
                debug!(item, last_vote = %record.last_vote, "Local cooldown active");
                GuardDecision::LocalCooldown
            }
            _ => GuardDecision::Allowed,
        }
    }

    /// Remember that a vote for `item` was accepted now.
    pub fn record(&self, item: &str) -> Result<()> {
        let record = LocalVoteRecord {
            last_vote: self.clock.now(),
        };
        record.save(self.store.as_ref(), item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::storage::MemoryStore;
    use crate::clock::ManualClock;
    use crate::error::SitevoteError;
    use chrono::{Duration, TimeZone, Utc};

    /// A store that fails every call, like disabled browser storage.
    struct UnavailableStore;

    impl LocalStore for UnavailableStore {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(SitevoteError::Storage("storage disabled".to_string()))
        }

        fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(SitevoteError::Storage("storage disabled".to_string()))
        }
    }

    fn setup() -> (CooldownGuard, Arc<MemoryStore>, ManualClock) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
        let store = Arc::new(MemoryStore::new());
        let guard = CooldownGuard::new(store.clone(), Arc::new(clock.clone()));
        (guard, store, clock)
    }

    #[test]
    fn test_empty_store_allows() {
        let (guard, store, _) = setup();

        assert_eq!(guard.check("42", CooldownWindow::default()), GuardDecision::Allowed);
        // The allowed path is a pure read.
        assert_eq!(store.get("voted-42").unwrap(), None);
    }

    #[test]
    fn test_fresh_record_blocks() {
        let (guard, _, clock) = setup();

        guard.record("42").unwrap();
        clock.advance(Duration::seconds(60));

        assert_eq!(
            guard.check("42", CooldownWindow::default()),
            GuardDecision::LocalCooldown
        );
        assert_eq!(guard.check("43", CooldownWindow::default()), GuardDecision::Allowed);
    }

    #[test]
    fn test_record_expires_at_window_edge() {
        let (guard, _, clock) = setup();
        let window = CooldownWindow::from_minutes(5).unwrap();

        guard.record("42").unwrap();

        clock.advance(Duration::minutes(5) - Duration::milliseconds(1));
        assert_eq!(guard.check("42", window), GuardDecision::LocalCooldown);

        clock.advance(Duration::milliseconds(1));
        assert_eq!(guard.check("42", window), GuardDecision::Allowed);
    }

    #[test]
    fn test_unavailable_store_fails_open() {
        // Deliberate policy: an unreadable store must not block voting.
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
        let guard = CooldownGuard::new(Arc::new(UnavailableStore), Arc::new(clock));

        assert_eq!(guard.check("42", CooldownWindow::default()), GuardDecision::Allowed);
        assert!(guard.record("42").is_err());
    }
}
