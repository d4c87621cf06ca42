// Ratio Desk - Core Library
// Financial ratio pipeline + conversational metric lookup.
// Exposes all modules for use in CLI, API server, and tests

pub mod config;
pub mod dataset;
pub mod db;
pub mod dialogue;
pub mod error;
pub mod format;
pub mod normalizer;
pub mod pipeline;
pub mod ratios;
pub mod recognizer;
pub mod table;
pub mod trends;
pub mod vocabulary;

// Re-export commonly used types
pub use config::AppConfig;
pub use dataset::{Dataset, FieldValue, FinancialRecord};
pub use db::{
    compute_idempotency_hash, export_csv, get_events_for_entity, insert_event, insert_records,
    load_csv, setup_database, verify_count, Event,
};
pub use dialogue::{DialogueEngine, DialogueState, Reply, SlotStatus};
pub use error::{PipelineError, PipelineResult};
pub use format::{format_value, NOT_AVAILABLE};
pub use normalizer::{DatasetNormalizer, NormalizationReport};
pub use pipeline::{run_pipeline, PipelineOutput};
pub use ratios::{safe_divide, Ratio, RatioEngine, RatioReport};
pub use recognizer::{EntityRecognizer, LabeledSpan, PhraseRecognizer, SpanKind};
pub use table::{RawField, RawTable, COMPANY_COLUMN, YEAR_COLUMN};
pub use trends::{trend_series, value_bounds, TrendPoint, TrendSeries};
pub use vocabulary::MetricVocabulary;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
