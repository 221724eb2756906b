//! Ablator - Paper Ablation and Prompt-Injection Experiment Pipeline
//!
//! Orchestrates an experiment pipeline around an external LLM paper
//! reviewer: derive ablated and adversarial variants of academic papers,
//! submit each to a scoring oracle, and aggregate the returned ratings and
//! decisions against each paper's unmodified baseline.
//!
//! - **Variant generation**: locate sections under messy heading styles,
//!   remove them or inject attack prompts, and classify every attempt as
//!   success, skip (section absent) or failure (degenerate output).
//! - **Dataset building**: seeded sampling with a strict
//!   discard-and-resample policy or a lenient keep-what-worked policy.
//! - **Evaluation**: sequential oracle batches over an append-only,
//!   crash-resumable JSONL log.
//! - **Aggregation**: per-kind deltas versus baseline, decision-transition
//!   distributions, and anomaly rates (scores that rose after ablation,
//!   rejects flipped to accepts by injections).
//!
//! # Quick Start
//!
//! ```rust
//! use ablator::core::{apply, SectionKind, TransformKind};
//!
//! let paper = "ABSTRACT\nWe study things.\n\n1. INTRODUCTION\nAt length.";
//! let out = apply(paper, &TransformKind::Remove(SectionKind::Abstract)).unwrap();
//! assert!(out.matched);
//! assert!(!out.text.contains("ABSTRACT"));
//! ```

pub mod core;
pub mod eval;
pub mod events;
pub mod oracle;

// Re-export commonly used items at crate root
pub use core::{aggregate, build, BuildConfig, CompletenessPolicy, Summary, TransformKind};
pub use eval::{evaluate_all, EvalConfig, EvalReport, EvaluationRecord, ResultLog};
pub use events::{EventBus, LoggingObserver, PipelineEvent};
pub use oracle::{HttpReviewOracle, MockOracle, OracleError, Review, ReviewOracle};
