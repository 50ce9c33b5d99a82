//! Vote backend trait for abstracting the in-process and remote procedure.

use async_trait::async_trait;

use super::limiter::{VoteLimiter, VoteStatus};
use crate::error::Result;

/// Anything that can run the atomic `vote_if_allowed` procedure.
///
/// The client orchestration only talks to this trait, so it works the same
/// against the gRPC service and against a limiter embedded in the process.
#[async_trait]
pub trait VoteBackend: Send + Sync {
    /// Record a vote for `item` from `ip_hash` unless one was accepted within
    /// the last `window_minutes`.
    async fn vote_if_allowed(
        &self,
        ip_hash: &str,
        item: &str,
        window_minutes: u32,
    ) -> Result<VoteStatus>;
}

#[async_trait]
impl VoteBackend for VoteLimiter {
    async fn vote_if_allowed(
        &self,
        ip_hash: &str,
        item: &str,
        window_minutes: u32,
    ) -> Result<VoteStatus> {
        VoteLimiter::vote_if_allowed(self, ip_hash, item, window_minutes)
    }
}
