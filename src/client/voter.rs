//! End-to-end vote orchestration.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use super::fingerprint::Fingerprinter;
use super::guard::{CooldownGuard, GuardDecision};
use crate::error::SitevoteError;
use crate::ratelimit::{CooldownWindow, VoteBackend, VoteStatus};

/// Why a vote attempt failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VoteError {
    /// IP lookup or the remote call failed in transit; worth retrying.
    #[error("network error: {0}")]
    Network(String),

    /// The server answered outside its contract.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// The server refused the request, e.g. an unknown item.
    #[error("vote rejected: {0}")]
    Rejected(String),
}

impl From<SitevoteError> for VoteError {
    fn from(err: SitevoteError) -> Self {
        match err {
            SitevoteError::Network(msg) => VoteError::Network(msg),
            SitevoteError::Grpc(e) => VoteError::Network(e.to_string()),
            SitevoteError::UnexpectedResponse(msg) => VoteError::UnexpectedResponse(msg),
            SitevoteError::Status(status) => VoteError::Rejected(status.message().to_string()),
            other => VoteError::Rejected(other.to_string()),
        }
    }
}

/// Outcome of [`Voter::vote`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteResult {
    /// Vote recorded; `votes` is the confirmed count.
    Ok { votes: u64 },
    /// This client already voted within the window; no request was sent.
    LocalCooldown,
    /// The server saw a recent vote from the same fingerprint.
    RateLimited,
    Error(VoteError),
}

impl VoteResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, VoteResult::Ok { .. })
    }

    /// Both cooldown outcomes get the same "already voted" treatment.
    pub fn already_voted(&self) -> bool {
        matches!(self, VoteResult::LocalCooldown | VoteResult::RateLimited)
    }

    /// Message to show the user.
    pub fn message(&self) -> String {
        match self {
            VoteResult::Ok { votes: 1 } => "Vote counted. This site now has 1 vote.".to_string(),
            VoteResult::Ok { votes } => format!("Vote counted. This site now has {} votes.", votes),
            VoteResult::LocalCooldown | VoteResult::RateLimited => {
                "You already voted for this site. Try again later.".to_string()
            }
            VoteResult::Error(_) => "Voting failed. Please try again.".to_string(),
        }
    }
}

/// Runs a vote attempt: local guard, fingerprint, remote procedure.
///
/// Every failure ends up in the returned [`VoteResult`]; nothing is thrown
/// past the caller.
pub struct Voter {
    guard: CooldownGuard,
    fingerprinter: Fingerprinter,
    backend: Arc<dyn VoteBackend>,
}

impl Voter {
    pub fn new(
        guard: CooldownGuard,
        fingerprinter: Fingerprinter,
        backend: Arc<dyn VoteBackend>,
    ) -> Self {
        Self {
            guard,
            fingerprinter,
            backend,
        }
    }

    /// Vote for `item`, at most once per `window` from this client and
    /// fingerprint.
    pub async fn vote(&self, item: &str, window: CooldownWindow) -> VoteResult {
        if item.is_empty() {
            return VoteResult::Error(VoteError::Rejected("item is required".to_string()));
        }

        if self.guard.check(item, window) == GuardDecision::LocalCooldown {
            return VoteResult::LocalCooldown;
        }

        let fingerprint = match self.fingerprinter.fingerprint().await {
            Ok(fingerprint) => fingerprint,
            Err(e) => {
                warn!(item, error = %e, "Could not fingerprint caller");
                return VoteResult::Error(e.into());
            }
        };

        let status = self
            .backend
            .vote_if_allowed(fingerprint.as_str(), item, window.minutes())
            .await;

        match status {
            Ok(VoteStatus::Ok { votes }) => {
                if let Err(e) = self.guard.record(item) {
                    warn!(item, error = %e, "Vote accepted but local record not saved");
                }
                info!(item, votes, "Vote accepted");
                VoteResult::Ok { votes }
            }
            Ok(VoteStatus::RateLimited) => {
                debug!(item, "Vote rate limited by server");
                VoteResult::RateLimited
            }
            Err(e) => {
                warn!(item, error = %e, "Vote procedure failed");
                VoteResult::Error(e.into())
            }
        }
    }
}
