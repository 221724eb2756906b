//! Result Aggregator
//!
//! Replays an evaluation log into a run summary: every non-baseline record
//! is joined to its document's `original` record, deltas and decision
//! transitions are computed per transform kind, and anomalies - outcomes
//! contrary to the expected direction of the transform - are collected.
//!
//! A record whose baseline is missing is excluded from delta aggregates and
//! counted, never silently dropped. Ratings are compared after rounding to
//! one decimal (the input precision); "unchanged" is exact equality on that
//! grid, not a tolerance band.

use crate::core::stats;
use crate::eval::EvaluationRecord;
use crate::oracle::Review;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Direction of a rating change relative to its baseline, on the rounded
/// one-decimal grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeltaClass {
    Raised,
    Lowered,
    Unchanged,
}

/// Classify `rating` against `baseline` after rounding both to one decimal.
pub fn classify_delta(baseline: f64, rating: f64) -> DeltaClass {
    let baseline_grid = (baseline * 10.0).round() as i64;
    let rating_grid = (rating * 10.0).round() as i64;
    match rating_grid.cmp(&baseline_grid) {
        std::cmp::Ordering::Greater => DeltaClass::Raised,
        std::cmp::Ordering::Less => DeltaClass::Lowered,
        std::cmp::Ordering::Equal => DeltaClass::Unchanged,
    }
}

/// Descriptive statistics over a set of ratings.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RatingStats {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub q25: f64,
    pub q75: f64,
}

impl RatingStats {
    fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        Self {
            count: values.len(),
            mean: stats::mean(values),
            median: stats::median(values),
            std: stats::stdev(values),
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            q25: stats::quantile(values, 0.25),
            q75: stats::quantile(values, 0.75),
        }
    }
}

/// Mean aspect sub-scores.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AspectMeans {
    pub originality: f64,
    pub quality: f64,
    pub clarity: f64,
    pub significance: f64,
}

/// Per-transform-kind summary.
#[derive(Debug, Clone, Default, Serialize)]
pub struct KindSummary {
    /// Records of this kind.
    pub count: usize,
    /// Rating statistics over all records of this kind.
    pub rating_mean: f64,
    pub rating_median: f64,
    pub rating_std: f64,
    /// Fraction of records with an accept-like decision.
    pub accept_rate: f64,
    /// Decision distribution over all records of this kind.
    pub decision_dist: BTreeMap<String, usize>,
    /// Mean aspect sub-scores.
    pub aspects: AspectMeans,
    /// Records joined to a baseline (delta aggregates cover only these).
    pub delta_count: usize,
    /// Records excluded because their document has no `original` record.
    pub baseline_missing: usize,
    /// Delta statistics (variant rating minus baseline rating).
    pub delta_mean: f64,
    pub delta_median: f64,
    pub delta_std: f64,
    /// Fraction of joined records whose rating rose - the anomaly rate for
    /// removal kinds, the attack-success rate for injection kinds.
    pub raised_rate: f64,
    pub lowered_rate: f64,
    pub unchanged_rate: f64,
    /// Decision-transition counts, keyed `"<baseline>-><variant>"`,
    /// over joined records.
    pub transition_counts: BTreeMap<String, usize>,
    /// Transition distribution normalized over joined records; sums to 1
    /// when any record joined.
    pub transition_rates: BTreeMap<String, f64>,
    /// Fraction of joined records flipping a reject-like baseline to an
    /// accept-like decision - the key attack/ablation-success metric.
    pub reject_to_accept_rate: f64,
}

/// Per-document view: baseline rating plus the delta of each evaluated kind.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    pub document_id: String,
    pub title: String,
    /// Missing when the log has no `original` record for this document.
    pub baseline_rating: Option<f64>,
    /// Raw floating-point deltas per non-original kind.
    pub deltas: BTreeMap<String, f64>,
}

/// One outcome contrary to the expected direction of its transform kind.
#[derive(Debug, Clone, Serialize)]
pub struct Anomaly {
    pub document_id: String,
    pub kind: String,
    pub baseline_rating: f64,
    pub rating: f64,
    pub delta: f64,
    pub baseline_decision: String,
    pub decision: String,
}

/// Whole-run summary, serialized as a single JSON object.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    /// Total records replayed.
    pub total: usize,
    /// Record count per transform kind.
    pub kind_distribution: BTreeMap<String, usize>,
    /// Decision count over every record.
    pub decision_distribution: BTreeMap<String, usize>,
    /// Rating statistics over every record.
    pub rating: RatingStats,
    /// Per-kind summaries.
    pub by_kind: BTreeMap<String, KindSummary>,
    /// Per-document baseline/delta view.
    pub per_document: Vec<DocumentSummary>,
    /// Outcomes contrary to the transform's expected direction.
    pub anomalies: Vec<Anomaly>,
    /// Records excluded from delta aggregates for lack of a baseline.
    pub baseline_missing: usize,
}

fn aspect_means(reviews: &[&Review]) -> AspectMeans {
    let pick = |f: fn(&Review) -> f64| -> f64 {
        stats::mean(&reviews.iter().map(|r| f(r)).collect::<Vec<_>>())
    };
    AspectMeans {
        originality: pick(|r| r.originality),
        quality: pick(|r| r.quality),
        clarity: pick(|r| r.clarity),
        significance: pick(|r| r.significance),
    }
}

/// Aggregate an evaluation log into a [`Summary`].
///
/// When a document carries several `original` records (overlapping runs in
/// one log), the latest one wins as the baseline.
pub fn aggregate(records: &[EvaluationRecord]) -> Summary {
    // Baseline join map: document -> original-variant record.
    let mut baselines: HashMap<&str, &EvaluationRecord> = HashMap::new();
    for record in records {
        if record.transform_kind.is_original() {
            baselines.insert(record.document_id.as_str(), record);
        }
    }

    let mut kind_distribution: BTreeMap<String, usize> = BTreeMap::new();
    let mut decision_distribution: BTreeMap<String, usize> = BTreeMap::new();
    let mut by_kind_records: BTreeMap<String, Vec<&EvaluationRecord>> = BTreeMap::new();
    let mut per_document: BTreeMap<&str, DocumentSummary> = BTreeMap::new();
    let mut anomalies = Vec::new();
    let mut baseline_missing_total = 0usize;

    for record in records {
        let kind = record.transform_kind.to_string();
        *kind_distribution.entry(kind.clone()).or_insert(0) += 1;
        *decision_distribution
            .entry(record.evaluation.paper_decision.clone())
            .or_insert(0) += 1;
        by_kind_records.entry(kind).or_default().push(record);

        per_document
            .entry(record.document_id.as_str())
            .or_insert_with(|| DocumentSummary {
                document_id: record.document_id.clone(),
                title: record.title.clone(),
                baseline_rating: baselines
                    .get(record.document_id.as_str())
                    .map(|b| b.evaluation.avg_rating),
                deltas: BTreeMap::new(),
            });
    }

    let mut by_kind = BTreeMap::new();
    for (kind_name, kind_records) in &by_kind_records {
        let ratings: Vec<f64> = kind_records
            .iter()
            .map(|r| r.evaluation.avg_rating)
            .collect();
        let reviews: Vec<&Review> = kind_records.iter().map(|r| &r.evaluation).collect();

        let mut summary = KindSummary {
            count: kind_records.len(),
            rating_mean: stats::mean(&ratings),
            rating_median: stats::median(&ratings),
            rating_std: stats::stdev(&ratings),
            accept_rate: reviews.iter().filter(|r| r.is_accept()).count() as f64
                / kind_records.len() as f64,
            aspects: aspect_means(&reviews),
            ..KindSummary::default()
        };
        for record in kind_records {
            *summary
                .decision_dist
                .entry(record.evaluation.paper_decision.clone())
                .or_insert(0) += 1;
        }

        let is_original = kind_records
            .first()
            .map(|r| r.transform_kind.is_original())
            .unwrap_or(false);
        if is_original {
            // The baseline is its own reference point; no delta aggregates.
            by_kind.insert(kind_name.clone(), summary);
            continue;
        }

        let mut deltas = Vec::new();
        let mut raised = 0usize;
        let mut lowered = 0usize;
        let mut unchanged = 0usize;
        let mut reject_to_accept = 0usize;

        for record in kind_records {
            let baseline = match baselines.get(record.document_id.as_str()) {
                Some(baseline) => *baseline,
                None => {
                    summary.baseline_missing += 1;
                    baseline_missing_total += 1;
                    continue;
                }
            };

            let base_rating = baseline.evaluation.avg_rating;
            let rating = record.evaluation.avg_rating;
            let delta = rating - base_rating;
            deltas.push(delta);

            if let Some(doc) = per_document.get_mut(record.document_id.as_str()) {
                doc.deltas.insert(kind_name.clone(), delta);
            }

            let class = classify_delta(base_rating, rating);
            match class {
                DeltaClass::Raised => raised += 1,
                DeltaClass::Lowered => lowered += 1,
                DeltaClass::Unchanged => unchanged += 1,
            }

            let transition = format!(
                "{}->{}",
                baseline.evaluation.paper_decision, record.evaluation.paper_decision
            );
            *summary.transition_counts.entry(transition).or_insert(0) += 1;

            let flipped =
                baseline.evaluation.is_reject() && record.evaluation.is_accept();
            if flipped {
                reject_to_accept += 1;
            }

            if class == DeltaClass::Raised || flipped {
                anomalies.push(Anomaly {
                    document_id: record.document_id.clone(),
                    kind: kind_name.clone(),
                    baseline_rating: base_rating,
                    rating,
                    delta,
                    baseline_decision: baseline.evaluation.paper_decision.clone(),
                    decision: record.evaluation.paper_decision.clone(),
                });
            }
        }

        summary.delta_count = deltas.len();
        summary.delta_mean = stats::mean(&deltas);
        summary.delta_median = stats::median(&deltas);
        summary.delta_std = stats::stdev(&deltas);
        if !deltas.is_empty() {
            let n = deltas.len() as f64;
            summary.raised_rate = raised as f64 / n;
            summary.lowered_rate = lowered as f64 / n;
            summary.unchanged_rate = unchanged as f64 / n;
            summary.reject_to_accept_rate = reject_to_accept as f64 / n;
            summary.transition_rates = summary
                .transition_counts
                .iter()
                .map(|(k, count)| (k.clone(), *count as f64 / n))
                .collect();
        }

        by_kind.insert(kind_name.clone(), summary);
    }

    let all_ratings: Vec<f64> = records.iter().map(|r| r.evaluation.avg_rating).collect();

    Summary {
        total: records.len(),
        kind_distribution,
        decision_distribution,
        rating: RatingStats::from_values(&all_ratings),
        by_kind,
        per_document: per_document.into_values().collect(),
        anomalies,
        baseline_missing: baseline_missing_total,
    }
}
