use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::{fmt, str::FromStr};

/// How urgent a to-do is. Ordered `Low < Normal < High`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Low,
    Normal,
    High,
}

impl Priority {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
        }
    }

    /// Single-character marker used when a row is rendered as plain text.
    #[must_use]
    pub const fn marker(self) -> char {
        match self {
            Self::Low => '-',
            Self::Normal => '=',
            Self::High => '!',
        }
    }
}

/// Field a list can be ordered by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    /// Creation time; the store's natural order.
    #[default]
    Created,
    Priority,
    /// Display name, using the store's collation.
    Name,
}

impl SortKey {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Priority => "priority",
            Self::Name => "name",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    #[serde(rename = "asc", alias = "ascending")]
    Ascending,
    #[serde(rename = "desc", alias = "descending")]
    Descending,
}

impl Direction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ascending => "asc",
            Self::Descending => "desc",
        }
    }

    /// Apply this direction to an ascending comparison result.
    #[must_use]
    pub const fn apply(self, ordering: std::cmp::Ordering) -> std::cmp::Ordering {
        match self {
            Self::Ascending => ordering,
            Self::Descending => ordering.reverse(),
        }
    }
}

/// Ordering requested from a store query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuerySort {
    pub key: SortKey,
    pub direction: Direction,
}

impl QuerySort {
    #[must_use]
    pub const fn new(key: SortKey, direction: Direction) -> Self {
        Self { key, direction }
    }
}

/// A record the list reconciler can track.
///
/// Identity is the only thing the reconciler compares on; two values with the
/// same `id` are the same item, whatever their other fields say.
pub trait Record: Clone + Send + 'static {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn priority(&self) -> Priority;
    fn created_at(&self) -> DateTime<FixedOffset>;
    fn completed_at(&self) -> Option<DateTime<FixedOffset>>;

    /// Copy of `self` with the completion timestamp replaced.
    #[must_use]
    fn with_completed_at(&self, completed_at: Option<DateTime<FixedOffset>>) -> Self;

    fn is_completed(&self) -> bool {
        self.completed_at().is_some()
    }
}

/// A to-do entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub priority: Priority,
    pub created_at: DateTime<FixedOffset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<FixedOffset>>,
}

impl Todo {
    /// Build a new, active to-do with a freshly generated id.
    #[must_use]
    pub fn new(name: &str, priority: Priority, created_at: DateTime<FixedOffset>) -> Self {
        Self {
            id: generate_id(name, &created_at),
            name: name.to_string(),
            priority,
            created_at,
            completed_at: None,
        }
    }

    /// Build a to-do with a caller-chosen id.
    #[must_use]
    pub fn with_id(
        id: impl Into<String>,
        name: &str,
        priority: Priority,
        created_at: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.to_string(),
            priority,
            created_at,
            completed_at: None,
        }
    }

    /// Copy with a new name and priority. Editing always clears completion.
    #[must_use]
    pub fn edited(&self, name: &str, priority: Priority) -> Self {
        Self {
            id: self.id.clone(),
            name: name.to_string(),
            priority,
            created_at: self.created_at,
            completed_at: None,
        }
    }
}

impl Record for Todo {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> Priority {
        self.priority
    }

    fn created_at(&self) -> DateTime<FixedOffset> {
        self.created_at
    }

    fn completed_at(&self) -> Option<DateTime<FixedOffset>> {
        self.completed_at
    }

    fn with_completed_at(&self, completed_at: Option<DateTime<FixedOffset>>) -> Self {
        Self {
            completed_at,
            ..self.clone()
        }
    }
}

static ID_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Generate a short `td-` prefixed id.
///
/// The hash input mixes the name, the creation instant, the process id and a
/// per-process sequence number, so two items created in the same instant with
/// the same name still get distinct ids.
#[must_use]
pub fn generate_id(name: &str, created_at: &DateTime<FixedOffset>) -> String {
    let seq = ID_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let mut hasher = blake3::Hasher::new();
    hasher.update(name.as_bytes());
    hasher.update(
        &created_at
            .timestamp_nanos_opt()
            .unwrap_or_else(|| created_at.timestamp())
            .to_le_bytes(),
    );
    hasher.update(&std::process::id().to_le_bytes());
    hasher.update(&seq.to_le_bytes());
    let hex = hasher.finalize().to_hex();
    format!("td-{}", &hex.as_str()[..10])
}

/// Error returned when parsing an enum value from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub expected: &'static str,
    pub got: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: '{}'", self.expected, self.got)
    }
}

impl std::error::Error for ParseEnumError {}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn normalize(input: &str) -> String {
    input.trim().to_ascii_lowercase()
}

impl FromStr for Priority {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize(s);
        match normalized.as_str() {
            "low" => Ok(Self::Low),
            "normal" | "medium" | "med" => Ok(Self::Normal),
            "high" => Ok(Self::High),
            _ => Err(ParseEnumError {
                expected: "priority",
                got: s.to_string(),
            }),
        }
    }
}

impl FromStr for SortKey {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize(s);
        match normalized.as_str() {
            "created" | "date" => Ok(Self::Created),
            "priority" => Ok(Self::Priority),
            "name" => Ok(Self::Name),
            _ => Err(ParseEnumError {
                expected: "sort key",
                got: s.to_string(),
            }),
        }
    }
}

impl FromStr for Direction {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize(s);
        match normalized.as_str() {
            "asc" | "ascending" => Ok(Self::Ascending),
            "desc" | "descending" => Ok(Self::Descending),
            _ => Err(ParseEnumError {
                expected: "direction",
                got: s.to_string(),
            }),
        }
    }
}
