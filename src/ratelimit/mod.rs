//! Server-side vote rate limiting and record state.

mod backend;
mod key;
mod limiter;
mod window;

pub use backend::VoteBackend;
pub use key::VoteKey;
pub use limiter::{VoteLimiter, VoteStatus, DEFAULT_MAX_WINDOW_MINUTES};
pub use window::{CooldownWindow, DEFAULT_WINDOW_MINUTES};
