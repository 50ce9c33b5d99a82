//! The site directory: entries, their vote counters and the approved listing.
//!
//! Sites are seeded from a YAML catalog. Submission and moderation happen
//! elsewhere; this module only needs to know which sites exist, which are
//! approved and how many votes each has.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, SitevoteError};

/// A directory entry that can receive votes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    /// Opaque identifier
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: String,
    /// Whether moderation has approved the site for listing
    #[serde(default)]
    pub approved: bool,
    /// Vote count; absent until the first accepted vote
    #[serde(default)]
    pub votes: Option<u64>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Site {
    /// Create an unapproved site with no votes.
    pub fn new(id: &str, name: &str, url: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            url: url.to_string(),
            description: String::new(),
            image: String::new(),
            approved: false,
            votes: None,
            created_at: Utc::now(),
        }
    }

    /// Mark the site as approved.
    pub fn approved(mut self) -> Self {
        self.approved = true;
        self
    }

    /// Set the vote count.
    pub fn with_votes(mut self, votes: u64) -> Self {
        self.votes = Some(votes);
        self
    }

    /// Set the creation time.
    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}

/// Catalog file layout.
#[derive(Debug, Default, Deserialize)]
struct Catalog {
    #[serde(default)]
    sites: Vec<Site>,
}

/// Thread-safe collection of sites keyed by id.
#[derive(Debug, Default)]
pub struct Directory {
    sites: RwLock<HashMap<String, Site>>,
}

impl Directory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a directory from a list of sites. Empty or duplicate ids are rejected.
    pub fn from_sites(sites: impl IntoIterator<Item = Site>) -> Result<Self> {
        let mut map = HashMap::new();
        for site in sites {
            if site.id.is_empty() {
                return Err(SitevoteError::Config("site id must not be empty".to_string()));
            }
            if map.contains_key(&site.id) {
                return Err(SitevoteError::Config(format!("duplicate site id {}", site.id)));
            }
            map.insert(site.id.clone(), site);
        }

        Ok(Self {
            sites: RwLock::new(map),
        })
    }

    /// Load a catalog from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let catalog: Catalog = serde_yaml::from_str(yaml)
            .map_err(|e| SitevoteError::Config(format!("Failed to parse site catalog: {}", e)))?;
        Self::from_sites(catalog.sites)
    }

    /// Load a catalog from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading site catalog");

        let contents = std::fs::read_to_string(path)?;
        let directory = Self::from_yaml(&contents)?;
        info!(sites = directory.len(), "Site catalog loaded");
        Ok(directory)
    }

    /// Insert or replace a site, returning the previous entry.
    pub fn insert(&self, site: Site) -> Option<Site> {
        self.sites.write().insert(site.id.clone(), site)
    }

    /// Get a copy of a site.
    pub fn get(&self, id: &str) -> Option<Site> {
        self.sites.read().get(id).cloned()
    }

    /// Whether a site with this id exists.
    pub fn contains(&self, id: &str) -> bool {
        self.sites.read().contains_key(id)
    }

    /// Current vote count for a site. `None` if unknown or never voted.
    pub fn votes(&self, id: &str) -> Option<u64> {
        self.sites.read().get(id).and_then(|s| s.votes)
    }

    /// Number of sites.
    pub fn len(&self) -> usize {
        self.sites.read().len()
    }

    /// Whether the directory has no sites.
    pub fn is_empty(&self) -> bool {
        self.sites.read().is_empty()
    }

    /// Approved sites ordered by votes descending.
    ///
    /// Sites without a count sort after every counted site; ties go to the
    /// older site.
    pub fn list_approved(&self) -> Vec<Site> {
        let mut sites: Vec<Site> = self
            .sites
            .read()
            .values()
            .filter(|s| s.approved)
            .cloned()
            .collect();

        sites.sort_by(|a, b| {
            by_votes_desc(a.votes, b.votes)
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        sites
    }

    /// Add one vote to a site and return the new count.
    ///
    /// Only the vote limiter calls this, from inside its per-key critical section.
    pub(crate) fn increment_votes(&self, id: &str) -> Result<u64> {
        let mut sites = self.sites.write();
        let site = sites
            .get_mut(id)
            .ok_or_else(|| SitevoteError::ItemNotFound(id.to_string()))?;

        let votes = site.votes.unwrap_or(0).saturating_add(1);
        site.votes = Some(votes);
        Ok(votes)
    }
}

fn by_votes_desc(a: Option<u64>, b: Option<u64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_catalog() {
        let yaml = r#"
sites:
  - id: "42"
    name: Example
    url: https://example.com
    description: An example site
    approved: true
    votes: 7
    created_at: 2024-01-01T00:00:00Z
  - id: "43"
    name: Pending
    url: https://pending.example
"#;
        let directory = Directory::from_yaml(yaml).unwrap();
        assert_eq!(directory.len(), 2);

        let site = directory.get("42").unwrap();
        assert!(site.approved);
        assert_eq!(site.votes, Some(7));
        assert_eq!(site.created_at, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());

        let pending = directory.get("43").unwrap();
        assert!(!pending.approved);
        assert_eq!(pending.votes, None);
    }

    #[test]
    fn test_shipped_catalog_loads() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/sites.yaml");
        let directory = Directory::from_file(path).unwrap();

        let ids: Vec<String> = directory.list_approved().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let result = Directory::from_sites(vec![
            Site::new("1", "A", "https://a.example"),
            Site::new("1", "B", "https://b.example"),
        ]);
        assert!(matches!(result, Err(SitevoteError::Config(_))));
    }

    #[test]
    fn test_empty_id_rejected() {
        let result = Directory::from_sites(vec![Site::new("", "A", "https://a.example")]);
        assert!(result.is_err());
    }

    #[test]
    fn test_list_approved_ordering() {
        let t = |day| Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap();
        let directory = Directory::from_sites(vec![
            Site::new("a", "A", "https://a.example").approved().created_at(t(1)),
            Site::new("b", "B", "https://b.example").approved().with_votes(3).created_at(t(2)),
            Site::new("c", "C", "https://c.example").approved().with_votes(10).created_at(t(3)),
            Site::new("d", "D", "https://d.example").with_votes(100).created_at(t(4)),
            Site::new("e", "E", "https://e.example").approved().with_votes(3).created_at(t(1)),
            Site::new("f", "F", "https://f.example").approved().with_votes(0).created_at(t(5)),
        ])
        .unwrap();

        let ids: Vec<String> = directory.list_approved().into_iter().map(|s| s.id).collect();

        // "d" is unapproved; "a" has no count and sorts after the zero count.
        assert_eq!(ids, vec!["c", "e", "b", "f", "a"]);
    }

    #[test]
    fn test_increment_votes() {
        let directory = Directory::new();
        directory.insert(Site::new("42", "Example", "https://example.com"));

        assert_eq!(directory.votes("42"), None);
        assert_eq!(directory.increment_votes("42").unwrap(), 1);
        assert_eq!(directory.increment_votes("42").unwrap(), 2);
        assert_eq!(directory.votes("42"), Some(2));
        assert!(matches!(
            directory.increment_votes("missing"),
            Err(SitevoteError::ItemNotFound(_))
        ));
    }
}
