//! Per-item carriers: action, status, changed keys, violations, outcomes.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Classification of what the pipeline should do to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Create,
    Update,
    Destroy,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Update => "update",
            Action::Destroy => "destroy",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "create" => Some(Action::Create),
            "update" => Some(Action::Update),
            "destroy" => Some(Action::Destroy),
            _ => None,
        }
    }
}

/// Item lifecycle state. `queued` and `processing` are transient; the rest
/// are terminal and emit outcomes plus replay packs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Queued,
    Processing,
    Rejected,
    Noop,
    Created,
    Updated,
    Destroyed,
}

impl ItemStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ItemStatus::Queued | ItemStatus::Processing)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ItemStatus::Queued => "queued",
            ItemStatus::Processing => "processing",
            ItemStatus::Rejected => "rejected",
            ItemStatus::Noop => "noop",
            ItemStatus::Created => "created",
            ItemStatus::Updated => "updated",
            ItemStatus::Destroyed => "destroyed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(ItemStatus::Queued),
            "processing" => Some(ItemStatus::Processing),
            "rejected" => Some(ItemStatus::Rejected),
            "noop" => Some(ItemStatus::Noop),
            "created" => Some(ItemStatus::Created),
            "updated" => Some(ItemStatus::Updated),
            "destroyed" => Some(ItemStatus::Destroyed),
            _ => None,
        }
    }
}

/// The sentinel entry used on the wire for [`ChangedKeys::All`].
pub const CHANGED_KEYS_ALL: &str = "all";

/// The set of fields that differ between the incoming payload and the
/// existing record. Creates use the `All` sentinel; destroys use the empty
/// key set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub enum ChangedKeys {
    All,
    Keys(BTreeSet<String>),
}

impl ChangedKeys {
    pub fn empty() -> Self {
        ChangedKeys::Keys(BTreeSet::new())
    }

    pub fn from_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ChangedKeys::Keys(keys.into_iter().map(Into::into).collect())
    }

    /// `All` contains every key.
    pub fn contains(&self, key: &str) -> bool {
        match self {
            ChangedKeys::All => true,
            ChangedKeys::Keys(keys) => keys.contains(key),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ChangedKeys::All => false,
            ChangedKeys::Keys(keys) => keys.is_empty(),
        }
    }

    /// Adds `keys`; a no-op on `All`, which already covers everything.
    pub fn extend<I, S>(&mut self, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let ChangedKeys::Keys(set) = self {
            set.extend(keys.into_iter().map(Into::into));
        }
    }
}

impl From<Vec<String>> for ChangedKeys {
    fn from(keys: Vec<String>) -> Self {
        if keys.len() == 1 && keys[0] == CHANGED_KEYS_ALL {
            ChangedKeys::All
        } else {
            ChangedKeys::Keys(keys.into_iter().collect())
        }
    }
}

impl From<ChangedKeys> for Vec<String> {
    fn from(value: ChangedKeys) -> Self {
        match value {
            ChangedKeys::All => vec![CHANGED_KEYS_ALL.to_string()],
            ChangedKeys::Keys(keys) => keys.into_iter().collect(),
        }
    }
}

/// Validation and processing failures keyed by field (or by a structured
/// key such as `rule_error.<name>` or `persistence`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Violations(BTreeMap<String, Vec<String>>);

impl Violations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn merge(&mut self, other: Violations) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }
}

/// The per-item record returned to the pipeline caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub external_id: String,
    pub status: ItemStatus,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fired_rules: Vec<String>,

    #[serde(default, skip_serializing_if = "Violations::is_empty")]
    pub violations: Violations,
}

/// Batch-level counters over terminal statuses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub created: u64,
    pub updated: u64,
    pub destroyed: u64,
    pub noop: u64,
    pub rejected: u64,
}

impl BatchSummary {
    pub fn record(&mut self, status: ItemStatus) {
        match status {
            ItemStatus::Created => self.created += 1,
            ItemStatus::Updated => self.updated += 1,
            ItemStatus::Destroyed => self.destroyed += 1,
            ItemStatus::Noop => self.noop += 1,
            ItemStatus::Rejected => self.rejected += 1,
            ItemStatus::Queued | ItemStatus::Processing => {}
        }
    }

    pub fn total(&self) -> u64 {
        self.created + self.updated + self.destroyed + self.noop + self.rejected
    }
}
