//! Sitevote - abuse-resistant voting for a community site directory
//!
//! Votes need no accounts. A client first consults a local cooldown record,
//! then sends a SHA-256 fingerprint of its truncated public IP to a server
//! procedure that atomically checks the fingerprint's last vote for the item
//! and, if the cooldown window has passed, records the vote and increments
//! the item's counter.

pub mod client;
pub mod clock;
pub mod config;
pub mod directory;
pub mod error;
pub mod grpc;
pub mod ratelimit;
