//! Core pipeline algorithms
//!
//! The variant-generation and result-aggregation logic:
//! - `section`: heading-tolerant section location
//! - `transform`: remove-section and inject-attack transforms
//! - `validate`: three-way success/skip/failure acceptance rules
//! - `corpus`: document and variant records, JSONL I/O
//! - `dataset`: policy-driven family building over a sampled corpus
//! - `aggregate`: baseline joins, deltas, decision transitions, anomalies
//! - `stats`: descriptive statistics helpers

pub mod aggregate;
pub mod corpus;
pub mod dataset;
pub mod section;
pub mod stats;
pub mod transform;
pub mod validate;

pub use aggregate::{aggregate, classify_delta, Anomaly, DeltaClass, KindSummary, Summary};
pub use corpus::{load_corpus, load_variants, save_variants, CorpusError, Document, Variant};
pub use dataset::{
    build, BuildConfig, BuildError, BuildReport, CompletenessPolicy, KindStats, VariantFamily,
};
pub use section::{locate, SectionKind, SectionSpan};
pub use transform::{
    apply, attack_kinds, default_kinds, AttackKind, TransformError, TransformKind,
    TransformOutcome,
};
pub use validate::{validate, VariantStatus, MIN_VARIANT_CHARS};
