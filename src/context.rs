//! Expect: per-invocation snapshot context.
//!
//! Built by `SnapshotRun::new_context`, configured builder-style, consumed by one of the
//! `to_match_snapshot*` calls:
//!
//! ```no_run
//! # fn demo(run: &QuiverSnap::SnapshotRun) -> Result<(), QuiverSnap::SnapshotError> {
//! run.new_context(QuiverSnap::test_id!())?
//!     .scenario("empty input")
//!     .header("locale", "en")
//!     .to_match_snapshot(&vec![1, 2, 3])?;
//! # Ok(()) }
//! ```
//!
//! Order of a match: resolve key and strategies -> load file -> claim key (ambiguous/duplicate
//! fail here, before any comparison) -> capture value -> serialize -> engine -> record ->
//! report/raise.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::{info, warn};
use serde::Serialize;
use serde_json::Value;

use crate::comparator::SnapshotComparator;
use crate::engine::{MatchRequest, Outcome, RunRecord};
use crate::error::{SnapResult, SnapshotError};
use crate::key::{SnapshotKey, TestId};
use crate::reporter::SnapshotReporter;
use crate::run::RunShared;
use crate::serializer::{SnapshotSerializer, FORMAT_TEXT};
use crate::strategy::StrategyContext;

pub struct Expect {
    run: Arc<RunShared>,
    test: TestId,
    scenario: Option<String>,
    serializer: Option<Arc<dyn SnapshotSerializer>>,
    comparator: Option<Arc<dyn SnapshotComparator>>,
    reporters: Option<Vec<Arc<dyn SnapshotReporter>>>,
    headers: BTreeMap<String, String>,
}

/// Value as handed to the engine: either captured through serde, or raw text.
enum Captured {
    Value(Result<Value, String>),
    Text(String),
}

impl Expect {
    pub(crate) fn new(run: Arc<RunShared>, test: TestId) -> Self {
        Self {
            run,
            test,
            scenario: None,
            serializer: None,
            comparator: None,
            reporters: None,
            headers: BTreeMap::new(),
        }
    }

    pub fn test_id(&self) -> &TestId {
        &self.test
    }

    /// Disambiguate several snapshots taken by the same test (parameterized tests).
    pub fn scenario(mut self, scenario: impl Into<String>) -> Self {
        self.scenario = Some(scenario.into());
        self
    }

    pub fn serializer(mut self, s: Arc<dyn SnapshotSerializer>) -> Self {
        self.serializer = Some(s);
        self
    }

    pub fn serializer_named(mut self, name: &str) -> SnapResult<Self> {
        self.serializer = Some(self.run.registry.serializer(name)?);
        Ok(self)
    }

    pub fn comparator(mut self, c: Arc<dyn SnapshotComparator>) -> Self {
        self.comparator = Some(c);
        self
    }

    pub fn comparator_named(mut self, name: &str) -> SnapResult<Self> {
        self.comparator = Some(self.run.registry.comparator(name)?);
        Ok(self)
    }

    /// Replace the configured reporters for this snapshot.
    pub fn reporters(mut self, r: Vec<Arc<dyn SnapshotReporter>>) -> Self {
        self.reporters = Some(r);
        self
    }

    pub fn reporters_named(mut self, name: &str) -> SnapResult<Self> {
        self.reporters = Some(self.run.registry.reporters(name)?);
        Ok(self)
    }

    /// Extra key/value handed to the serializer, the comparator and the reporters.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn to_match_snapshot<T: Serialize + ?Sized>(self, value: &T) -> SnapResult<RunRecord> {
        let captured = serde_json::to_value(value).map_err(|e| e.to_string());
        self.check(Captured::Value(captured))
    }

    /// Snapshot several values together, as one JSON array.
    pub fn to_match_snapshot_all<I, T>(self, values: I) -> SnapResult<RunRecord>
    where
        I: IntoIterator<Item = T>,
        T: Serialize,
    {
        let captured = values
            .into_iter()
            .map(|v| serde_json::to_value(v).map_err(|e| e.to_string()))
            .collect::<Result<Vec<Value>, String>>()
            .map(Value::Array);
        self.check(Captured::Value(captured))
    }

    /// Snapshot `text` as-is; no serializer involved.
    pub fn to_match_snapshot_text(self, text: &str) -> SnapResult<RunRecord> {
        self.check(Captured::Text(text.to_string()))
    }

    fn check(self, captured: Captured) -> SnapResult<RunRecord> {
        let run = &self.run;
        let key = SnapshotKey::resolve(&self.test, self.scenario.as_deref())?;

        // Strategy lookup first: a bad name must not burn the key's claim.
        let comparator = match &self.comparator {
            Some(c) => c.clone(),
            None => run.registry.comparator(&run.config.comparator)?,
        };
        let reporters = match &self.reporters {
            Some(r) => r.clone(),
            None => run.registry.reporters(&run.config.reporters)?,
        };
        let serializer = match (&captured, &self.serializer) {
            (Captured::Text(_), _) => None,
            (Captured::Value(_), Some(s)) => Some(s.clone()),
            (Captured::Value(_), None) => Some(run.registry.serializer(&run.config.serializer)?),
        };

        let path = run.config.file_path_for(&self.test);
        let file = run.load_file(&path)?;
        file.claim(&key)?;

        let ctx = StrategyContext {
            key: key.to_string(),
            headers: self.headers,
        };
        let (serialized, format) = match (captured, serializer) {
            (Captured::Value(v), Some(serializer)) => {
                let out = v.and_then(|v| {
                    serializer
                        .serialize(&v, &ctx)
                        .map_err(|e| format!("{:#}", e))
                });
                (out, serializer.output_format().to_string())
            }
            (Captured::Value(v), None) => (v.map(|v| v.to_string()), FORMAT_TEXT.to_string()),
            (Captured::Text(t), _) => (Ok(t), FORMAT_TEXT.to_string()),
        };

        let record = run.engine.check(MatchRequest {
            file: &file,
            ctx: &ctx,
            serialized,
            comparator: comparator.as_ref(),
        });
        run.push_record(record.clone());

        match record.outcome {
            Outcome::Match => Ok(record),
            Outcome::New if record.ci_rejected => Err(SnapshotError::MissingInCi {
                key: record.key.clone(),
            }),
            Outcome::New => {
                info!("new snapshot {} written to {}", record.key, record.path.display());
                Ok(record)
            }
            Outcome::Mismatch if record.updated => {
                info!("snapshot {} updated in {}", record.key, record.path.display());
                Ok(record)
            }
            Outcome::Mismatch => {
                let previous = record.previous.clone().unwrap_or_default();
                let current = record.current.clone().unwrap_or_default();
                for r in reporters.iter().filter(|r| r.supports_format(&format)) {
                    if let Err(e) = r.report_in(&ctx, &previous, &current) {
                        warn!("reporter failed for {}: {:#}", record.key, e);
                    }
                }
                Err(SnapshotError::Mismatch {
                    key: record.key,
                    previous,
                    current,
                })
            }
            Outcome::FailedIo => Err(SnapshotError::Serialization {
                key: record.key.clone(),
                reason: record.failure.clone().unwrap_or_default(),
            }),
        }
    }
}
