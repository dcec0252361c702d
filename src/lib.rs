#![allow(non_snake_case)]

// Ядро: ключи, формат файла, хранилище, движок сравнения
pub mod key;
pub mod codec;
pub mod store;
pub mod engine;

// Контекст теста и агрегатор прогона
pub mod context;
pub mod run;

// Подключаемые стратегии
pub mod serializer;
pub mod comparator;
pub mod reporter;
pub mod strategy;

// Окружение: ошибки, конфиг, счётчики, CLI
pub mod error;
pub mod config;
pub mod metrics;
pub mod cli;

// Удобные реэкспорты
pub use config::{SnapshotConfig, SnapshotConfigBuilder};
pub use context::Expect;
pub use engine::{MatchEngine, MatchRequest, Outcome, RunRecord};
pub use error::{RunError, SnapResult, SnapshotError};
pub use key::{SnapshotKey, TestId};
pub use run::{OrphanReport, RunSummary, SnapshotRun};
pub use store::{FlushOutcome, SnapshotFile, SnapshotStore};

pub use comparator::{JsonComparator, PlainTextComparator, SnapshotComparator};
pub use reporter::{CollectingReporter, PlainTextReporter, SnapshotReporter};
pub use serializer::{Base64Serializer, JsonSerializer, SnapshotSerializer, ToStringSerializer};
pub use strategy::{StrategyContext, StrategyRegistry};
