use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

// Grouping key used when a record carries no category at all
pub const UNKNOWN_CATEGORY: &str = "unknown";

/// Opaque category identifier. Grouping uses the exact stored string; an
/// absent category groups under [`UNKNOWN_CATEGORY`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(Option<String>);

impl CategoryId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(Some(name.into()))
    }

    pub fn unknown() -> Self {
        Self(None)
    }

    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn key(&self) -> &str {
        self.0.as_deref().unwrap_or(UNKNOWN_CATEGORY)
    }

    // True when the record has no usable category (absent or empty)
    pub fn is_missing(&self) -> bool {
        self.0.as_deref().is_none_or(str::is_empty)
    }
}

impl From<&str> for CategoryId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub category: CategoryId,
    #[serde(default, deserialize_with = "lenient_count")]
    pub votes: u64,
    #[serde(default)]
    pub badge: Option<u32>,
    #[serde(default, deserialize_with = "lenient_percentage")]
    pub percentage: u8,
    // Older records carried a `quote` instead of a title; read it, never write it back
    #[serde(default, rename = "quote", skip_serializing)]
    pub legacy_quote: Option<String>,
}

impl Candidate {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        image: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        let name = name.into();
        Self {
            id: id.into(),
            title: Some(name.clone()),
            name,
            image: image.into(),
            category: CategoryId::new(category),
            votes: 0,
            badge: None,
            percentage: 0,
            legacy_quote: None,
        }
    }

    pub fn with_votes(mut self, votes: u64) -> Self {
        self.votes = votes;
        self
    }

    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(&self.name)
    }
}

/// Body of an administrative create.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewCandidate {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub category: String,
    // Signed; the service rejects anything outside 0..=MAX_VOTES
    #[serde(default)]
    pub votes: i64,
    #[serde(default)]
    pub badge: Option<u32>,
}

/// Merge-patch for an existing candidate. `badge: Some(None)` clears the badge.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CandidatePatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub votes: Option<i64>,
    #[serde(default, deserialize_with = "explicit_null")]
    pub badge: Option<Option<u32>>,
}

impl CandidatePatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Range checks on `votes` are the caller's job; see `validation::checked_votes`.
    pub fn apply_to(&self, candidate: &mut Candidate) {
        if let Some(name) = &self.name {
            candidate.name = name.clone();
        }
        if let Some(title) = &self.title {
            candidate.title = Some(title.clone());
        }
        if let Some(image) = &self.image {
            candidate.image = image.clone();
        }
        if let Some(category) = &self.category {
            candidate.category = CategoryId::new(category.as_str());
        }
        if let Some(votes) = self.votes {
            candidate.votes = u64::try_from(votes).unwrap_or(0);
        }
        if let Some(badge) = self.badge {
            candidate.badge = badge;
        }
    }
}

// Ledger entry written for every accepted vote submission
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRecord {
    pub id: String,
    pub candidate_id: String,
    pub vote_count: u64,
    pub phone_number: String,
    pub payment_method: Option<String>,
    pub provider: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl VoteRecord {
    pub fn new(
        candidate_id: String,
        vote_count: u64,
        phone_number: String,
        payment_method: Option<String>,
        provider: Option<String>,
    ) -> Self {
        Self {
            id: format!("vote_{}", Uuid::new_v4().simple()),
            candidate_id,
            vote_count,
            phone_number,
            payment_method,
            provider,
            status: "completed".to_string(),
            created_at: Utc::now(),
        }
    }
}

// Anything that is not a non-negative JSON number counts as zero votes
fn count_from_value(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.is_finite() && *f > 0.0)
                    .map(|f| f as u64)
            })
            .unwrap_or(0),
        _ => 0,
    }
}

fn lenient_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(count_from_value(&value))
}

fn lenient_percentage<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(count_from_value(&value).min(100) as u8)
}

fn explicit_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
