//! Named strategies.
//!
//! Names resolve the way config and `Expect::*_named` refer to them:
//! - serializers: "text", "json", "base64"
//! - comparators: "text", "json"
//! - reporter sets: "text" (PlainTextReporter), "none" (no reporters)
//! Custom strategies can be registered under new names (or replace built-ins).
//!
//! Every strategy call gets a `StrategyContext` with the key and the test's headers.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::comparator::{JsonComparator, PlainTextComparator, SnapshotComparator};
use crate::error::{SnapResult, SnapshotError};
use crate::reporter::{PlainTextReporter, SnapshotReporter};
use crate::serializer::{Base64Serializer, JsonSerializer, SnapshotSerializer, ToStringSerializer};

/// What every strategy gets to see besides the text itself: the snapshot key and
/// the headers set through `Expect::header`.
#[derive(Debug, Clone, Default)]
pub struct StrategyContext {
    pub key: String,
    pub headers: BTreeMap<String, String>,
}

impl StrategyContext {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            headers: BTreeMap::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(|s| s.as_str())
    }
}

#[derive(Clone)]
pub struct StrategyRegistry {
    serializers: HashMap<String, Arc<dyn SnapshotSerializer>>,
    comparators: HashMap<String, Arc<dyn SnapshotComparator>>,
    reporters: HashMap<String, Vec<Arc<dyn SnapshotReporter>>>,
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        let mut r = Self::empty();
        r.register_serializer("text", Arc::new(ToStringSerializer));
        r.register_serializer("json", Arc::new(JsonSerializer));
        r.register_serializer("base64", Arc::new(Base64Serializer));
        r.register_comparator("text", Arc::new(PlainTextComparator));
        r.register_comparator("json", Arc::new(JsonComparator));
        r.register_reporters("text", vec![Arc::new(PlainTextReporter)]);
        r.register_reporters("none", Vec::new());
        r
    }
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s: Vec<_> = self.serializers.keys().collect();
        let mut c: Vec<_> = self.comparators.keys().collect();
        let mut r: Vec<_> = self.reporters.keys().collect();
        s.sort();
        c.sort();
        r.sort();
        f.debug_struct("StrategyRegistry")
            .field("serializers", &s)
            .field("comparators", &c)
            .field("reporters", &r)
            .finish()
    }
}

impl StrategyRegistry {
    /// Registry without built-ins.
    pub fn empty() -> Self {
        Self {
            serializers: HashMap::new(),
            comparators: HashMap::new(),
            reporters: HashMap::new(),
        }
    }

    pub fn register_serializer(&mut self, name: &str, s: Arc<dyn SnapshotSerializer>) {
        self.serializers.insert(name.to_string(), s);
    }

    pub fn register_comparator(&mut self, name: &str, c: Arc<dyn SnapshotComparator>) {
        self.comparators.insert(name.to_string(), c);
    }

    pub fn register_reporters(&mut self, name: &str, r: Vec<Arc<dyn SnapshotReporter>>) {
        self.reporters.insert(name.to_string(), r);
    }

    pub fn serializer(&self, name: &str) -> SnapResult<Arc<dyn SnapshotSerializer>> {
        self.serializers
            .get(name)
            .cloned()
            .ok_or_else(|| SnapshotError::UnknownStrategy {
                kind: "serializer",
                name: name.to_string(),
            })
    }

    pub fn comparator(&self, name: &str) -> SnapResult<Arc<dyn SnapshotComparator>> {
        self.comparators
            .get(name)
            .cloned()
            .ok_or_else(|| SnapshotError::UnknownStrategy {
                kind: "comparator",
                name: name.to_string(),
            })
    }

    pub fn reporters(&self, name: &str) -> SnapResult<Vec<Arc<dyn SnapshotReporter>>> {
        self.reporters
            .get(name)
            .cloned()
            .ok_or_else(|| SnapshotError::UnknownStrategy {
                kind: "reporters",
                name: name.to_string(),
            })
    }
}
