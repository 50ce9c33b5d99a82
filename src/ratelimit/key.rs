//! Compound key for server-side vote records.

use crate::error::{Result, SitevoteError};

/// Length of a hex-encoded SHA-256 digest.
const IP_HASH_LEN: usize = 64;

/// Identifies one `(fingerprint, item)` pair in the vote record table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VoteKey {
    /// Lowercase hex fingerprint of the voter's truncated IP
    pub ip_hash: String,
    /// The voted-for item
    pub item: String,
}

impl VoteKey {
    /// Build a key, rejecting anything that is not a hex digest or an empty item.
    ///
    /// Only fingerprints are accepted so a raw address can never end up in the
    /// record table.
    pub fn new(ip_hash: &str, item: &str) -> Result<Self> {
        if item.is_empty() {
            return Err(SitevoteError::InvalidArgument("item is required".to_string()));
        }

        let is_digest = ip_hash.len() == IP_HASH_LEN
            && ip_hash
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !is_digest {
            return Err(SitevoteError::InvalidArgument(
                "ip_hash must be a lowercase hex SHA-256 digest".to_string(),
            ));
        }

        Ok(Self {
            ip_hash: ip_hash.to_string(),
            item: item.to_string(),
        })
    }
}

impl std::fmt::Display for VoteKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The first 12 hex chars are enough to correlate log lines.
        write!(f, "{}:{}", &self.ip_hash[..12], self.item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "d32013383e58be54a27f1f5df61022f55a2d5421221ef3e896ead64dbdb0398f";

    #[test]
    fn test_vote_key_creation() {
        let key = VoteKey::new(HASH, "42").unwrap();
        assert_eq!(key.ip_hash, HASH);
        assert_eq!(key.item, "42");
        assert_eq!(key.to_string(), "d32013383e58:42");
    }

    #[test]
    fn test_raw_ip_rejected() {
        assert!(VoteKey::new("203.0.113.42", "42").is_err());
    }

    #[test]
    fn test_uppercase_hash_rejected() {
        assert!(VoteKey::new(&HASH.to_uppercase(), "42").is_err());
    }

    #[test]
    fn test_empty_item_rejected() {
        assert!(VoteKey::new(HASH, "").is_err());
    }

    #[test]
    fn test_vote_key_equality() {
        assert_eq!(VoteKey::new(HASH, "42").unwrap(), VoteKey::new(HASH, "42").unwrap());
        assert_ne!(VoteKey::new(HASH, "42").unwrap(), VoteKey::new(HASH, "43").unwrap());
    }
}
