use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Tracked repositories
// ---------------------------------------------------------------------------

/// A repository the user chose to follow on the board.
///
/// Identity is the lowercase `(owner, name)` pair; the stored casing is kept
/// for display only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedRepository {
    pub owner: String,
    pub name: String,
    #[serde(default)]
    pub full_name: String,
}

impl TrackedRepository {
    pub fn new(owner: &str, name: &str) -> Self {
        Self {
            owner: owner.to_owned(),
            name: name.to_owned(),
            full_name: format!("{owner}/{name}"),
        }
    }

    /// Case-insensitive identity check against an `(owner, name)` pair.
    pub fn matches(&self, owner: &str, name: &str) -> bool {
        self.owner.eq_ignore_ascii_case(owner) && self.name.eq_ignore_ascii_case(name)
    }

    /// Lowercase `owner/name`, used as a map key.
    pub fn key(&self) -> String {
        format!("{}/{}", self.owner, self.name).to_lowercase()
    }

    /// Parse `"owner/name"` into a `TrackedRepository`.
    pub fn from_full_name(s: &str) -> Option<Self> {
        let (owner, name) = s.trim().split_once('/')?;
        let (owner, name) = (owner.trim(), name.trim());
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return None;
        }
        Some(Self::new(owner, name))
    }
}

// ---------------------------------------------------------------------------
// Search results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Owner {
    pub login: String,
    #[serde(default)]
    pub avatar_url: String,
    #[serde(default)]
    pub html_url: String,
}

/// One entry of the authenticated user's repository listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositorySummary {
    #[serde(default)]
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub full_name: String,
    pub owner: Owner,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub forks_count: u64,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default, deserialize_with = "lenient_date::deserialize")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub private: bool,
}

/// Deserialize an optional RFC 3339 timestamp, mapping empty or unparseable
/// strings to `None` instead of failing the whole payload.
pub(crate) mod lenient_date {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: Option<String> = Option::deserialize(deserializer)?;
        Ok(s.as_deref().and_then(parse))
    }

    pub fn parse(s: &str) -> Option<DateTime<Utc>> {
        if s.is_empty() {
            return None;
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(dt.with_timezone(&Utc));
        }
        // Naive ISO timestamps (no offset) are treated as UTC.
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_full_name_splits_owner_and_name() {
        let repo = TrackedRepository::from_full_name("octocat/Hello-World").unwrap();
        assert_eq!(repo.owner, "octocat");
        assert_eq!(repo.name, "Hello-World");
        assert_eq!(repo.full_name, "octocat/Hello-World");
    }

    #[test]
    fn from_full_name_rejects_malformed_input() {
        assert!(TrackedRepository::from_full_name("octocat").is_none());
        assert!(TrackedRepository::from_full_name("/repo").is_none());
        assert!(TrackedRepository::from_full_name("owner/").is_none());
        assert!(TrackedRepository::from_full_name("a/b/c").is_none());
    }

    #[test]
    fn matches_is_case_insensitive() {
        let repo = TrackedRepository::new("OctoCat", "Hello-World");
        assert!(repo.matches("octocat", "hello-world"));
        assert!(!repo.matches("octocat", "hello"));
        assert_eq!(repo.key(), "octocat/hello-world");
    }

    #[test]
    fn lenient_date_accepts_naive_and_offset_forms() {
        assert!(lenient_date::parse("2025-05-26T18:30:00Z").is_some());
        assert!(lenient_date::parse("2025-05-26T18:30:00+00:00").is_some());
        assert!(lenient_date::parse("2025-05-26T18:30:00").is_some());
        assert!(lenient_date::parse("").is_none());
        assert!(lenient_date::parse("yesterday").is_none());
    }
}
