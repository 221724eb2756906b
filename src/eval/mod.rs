//! Batch Evaluation Driver
//!
//! Feeds variants to the scoring oracle one at a time, persisting each
//! result to the append-only log before moving on. A single variant's oracle
//! failure is counted and logged but never aborts the batch; only a log
//! write failure is fatal, because continuing past it would silently lose
//! results.
//!
//! Resume works by snapshotting the log's `(document, kind)` set once at
//! startup and skipping those variants.

pub mod log;

pub use log::{load_records, EvaluationRecord, LogError, ResultLog};

use crate::core::corpus::Variant;
use crate::events::{EventBus, PipelineEvent};
use crate::oracle::{call_with_retry, OracleError, RetryConfig, ReviewOracle};
use chrono::Utc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Configuration for one evaluation batch.
#[derive(Debug, Clone)]
pub struct EvalConfig {
    /// Hard per-call timeout; a timed-out call counts as an oracle failure.
    pub call_timeout: Duration,
    /// Retry policy for transient oracle errors.
    pub retry: RetryConfig,
    /// Variants with less text than this are skipped and counted, not sent
    /// to the oracle.
    pub min_text_chars: usize,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(300),
            retry: RetryConfig::default(),
            min_text_chars: 100,
        }
    }
}

/// Outcome of an evaluation batch.
#[derive(Debug, Clone, Default)]
pub struct EvalReport {
    /// Variants handed to the batch (resumed ones included).
    pub total: usize,
    /// Newly evaluated and logged this run.
    pub succeeded: usize,
    /// Skipped because the log already contained them.
    pub resumed: usize,
    /// Skipped because their text was too short.
    pub skipped_short: usize,
    /// Ids of variants whose oracle call failed after retries.
    pub failed: Vec<String>,
}

impl EvalReport {
    /// "N/M succeeded" over the variants actually attempted this run.
    pub fn summary_line(&self) -> String {
        let attempted = self.total - self.resumed;
        format!(
            "{}/{} succeeded ({} resumed, {} skipped short, {} failed)",
            self.succeeded,
            attempted,
            self.resumed,
            self.skipped_short,
            self.failed.len()
        )
    }
}

/// Evaluate every variant against the oracle, appending each result to
/// `log` immediately.
///
/// Returns `Err` only when the log itself cannot be written - per-variant
/// oracle failures are reported in the [`EvalReport`].
pub async fn evaluate_all(
    variants: &[Variant],
    oracle: &dyn ReviewOracle,
    result_log: &mut ResultLog,
    config: &EvalConfig,
    bus: Option<&EventBus>,
) -> Result<EvalReport, LogError> {
    // Consistent snapshot of what is already done, taken once.
    let completed = result_log.completed_keys()?;

    let mut report = EvalReport {
        total: variants.len(),
        ..EvalReport::default()
    };

    info!(
        total = variants.len(),
        already_logged = completed.len(),
        model = oracle.model_name(),
        "starting evaluation batch"
    );

    for (index, variant) in variants.iter().enumerate() {
        let key = (
            variant.document_id.clone(),
            variant.transform_kind.to_string(),
        );
        if completed.contains(&key) {
            report.resumed += 1;
            debug!(id = %variant.id, "already evaluated, skipping");
            continue;
        }

        if variant.text.trim().len() < config.min_text_chars {
            report.skipped_short += 1;
            warn!(id = %variant.id, length = variant.text.len(), "text too short, skipping");
            continue;
        }

        debug!(
            index = index + 1,
            total = variants.len(),
            id = %variant.id,
            "evaluating variant"
        );

        match score_one(&variant.text, oracle, config).await {
            Ok(review) => {
                let record = EvaluationRecord {
                    document_id: variant.document_id.clone(),
                    title: variant.original_title.clone(),
                    transform_kind: variant.transform_kind,
                    text_length: variant.text.len(),
                    timestamp: Utc::now(),
                    evaluation: review,
                };
                // Persist before touching the next variant.
                result_log.append(&record)?;
                if let Some(bus) = bus {
                    bus.emit(PipelineEvent::evaluation_completed(
                        &record.document_id,
                        &key.1,
                        record.evaluation.avg_rating,
                        &record.evaluation.paper_decision,
                    ));
                }
                report.succeeded += 1;
            }
            Err(e) => {
                warn!(id = %variant.id, error = %e, "oracle call failed, continuing batch");
                if let Some(bus) = bus {
                    bus.emit(PipelineEvent::evaluation_failed(
                        &variant.document_id,
                        &key.1,
                        &e.to_string(),
                    ));
                }
                report.failed.push(variant.id.clone());
            }
        }
    }

    info!("evaluation batch finished: {}", report.summary_line());
    Ok(report)
}

/// One oracle call under the batch's timeout and retry policy. The timeout
/// wraps each attempt, so a hung call is indistinguishable from a reported
/// timeout.
async fn score_one(
    text: &str,
    oracle: &dyn ReviewOracle,
    config: &EvalConfig,
) -> Result<crate::oracle::Review, OracleError> {
    call_with_retry(
        || async {
            match tokio::time::timeout(config.call_timeout, oracle.review(text)).await {
                Ok(result) => result,
                Err(_) => Err(OracleError::Timeout),
            }
        },
        &config.retry,
    )
    .await
}
