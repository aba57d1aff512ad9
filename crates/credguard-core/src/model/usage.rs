use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Which counter a use event increments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConsumerDimension {
    /// A job, pipeline, or other item, keyed by its full path.
    Item(String),
    /// An execution node, keyed by its name.
    Node(String),
}

impl ConsumerDimension {
    pub fn key(&self) -> &str {
        match self {
            ConsumerDimension::Item(k) | ConsumerDimension::Node(k) => k,
        }
    }

    /// Label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ConsumerDimension::Item(_) => "item",
            ConsumerDimension::Node(_) => "node",
        }
    }
}

/// Full usage store contents: credential id -> record.
pub type UsageSnapshot = BTreeMap<String, UsageRecord>;

/// Usage counters for one credential.
///
/// `total_count` is derived: it is recomputed after every mutation and on
/// deserialization, so a persisted total is never trusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "UsageRecordWire")]
pub struct UsageRecord {
    credential_id: String,
    item_usage: BTreeMap<String, u64>,
    node_usage: BTreeMap<String, u64>,
    total_count: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageRecordWire {
    credential_id: String,
    #[serde(default)]
    item_usage: BTreeMap<String, u64>,
    #[serde(default)]
    node_usage: BTreeMap<String, u64>,
    // accepted for compatibility, recomputed below
    #[serde(default)]
    #[allow(dead_code)]
    total_count: Option<u64>,
}

impl From<UsageRecordWire> for UsageRecord {
    fn from(w: UsageRecordWire) -> Self {
        let mut rec = UsageRecord {
            credential_id: w.credential_id,
            item_usage: w.item_usage,
            node_usage: w.node_usage,
            total_count: 0,
        };
        rec.recompute_total();
        rec
    }
}

impl UsageRecord {
    /// Zero record for a credential that has not been used yet.
    pub fn new(credential_id: impl Into<String>) -> Self {
        Self {
            credential_id: credential_id.into(),
            item_usage: BTreeMap::new(),
            node_usage: BTreeMap::new(),
            total_count: 0,
        }
    }

    /// Add one use along the given dimension.
    pub fn increment(&mut self, dimension: &ConsumerDimension) {
        let map = match dimension {
            ConsumerDimension::Item(_) => &mut self.item_usage,
            ConsumerDimension::Node(_) => &mut self.node_usage,
        };
        let slot = map.entry(dimension.key().to_string()).or_insert(0);
        *slot = slot.saturating_add(1);
        self.recompute_total();
    }

    pub fn credential_id(&self) -> &str {
        &self.credential_id
    }

    pub fn item_usage(&self) -> &BTreeMap<String, u64> {
        &self.item_usage
    }

    pub fn node_usage(&self) -> &BTreeMap<String, u64> {
        &self.node_usage
    }

    pub fn item_count(&self, item: &str) -> u64 {
        self.item_usage.get(item).copied().unwrap_or(0)
    }

    pub fn node_count(&self, node: &str) -> u64 {
        self.node_usage.get(node).copied().unwrap_or(0)
    }

    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    fn recompute_total(&mut self) {
        self.total_count = self
            .item_usage
            .values()
            .chain(self.node_usage.values())
            .fold(0u64, |acc, v| acc.saturating_add(*v));
    }
}
