//! Client side of voting: the local cooldown guard, fingerprinting and the
//! orchestration that ties them to the remote vote procedure.

mod fingerprint;
mod guard;
mod storage;
mod voter;

pub use fingerprint::{
    fingerprint_of, truncate_ip, Fingerprinter, IpFingerprint, IpResolver, IpifyResolver,
    MockIpResolver, DEFAULT_IP_LOOKUP_URL,
};
pub use guard::{CooldownGuard, GuardDecision};
pub use storage::{FileStore, LocalStore, LocalVoteRecord, MemoryStore};
pub use voter::{VoteError, VoteResult, Voter};
