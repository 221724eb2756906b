//! Dataset Builder
//!
//! Drives the transformer and validator over a corpus to produce, for each
//! sampled document, a family of variants. Under the strict policy a single
//! failing transform discards the whole family and a replacement document is
//! drawn from the remaining pool - rejection sampling over a finite pool,
//! implemented with an explicit remove-on-use pool and a bounded retry
//! counter so termination stays visible.
//!
//! Document selection is seeded and reproducible: the same corpus, seed,
//! target and policy always pick the same documents.

use crate::core::corpus::{Document, Variant};
use crate::core::transform::{self, TransformKind};
use crate::core::validate::{self, VariantStatus};
use crate::events::{EventBus, PipelineEvent};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use tracing::{debug, info, warn};

/// Family completeness policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletenessPolicy {
    /// Any failure discards the document's whole family and a replacement is
    /// drawn. With `require_full_coverage`, a skip (absent section) also
    /// discards - the switch is explicit, never implied.
    Strict { require_full_coverage: bool },
    /// Keep whatever succeeded; never resample.
    Lenient,
}

impl CompletenessPolicy {
    fn is_strict(&self) -> bool {
        matches!(self, CompletenessPolicy::Strict { .. })
    }
}

/// Configuration for one dataset build.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Transform kinds to apply to every sampled document.
    pub kinds: Vec<TransformKind>,
    /// Number of documents to retain.
    pub target_size: usize,
    /// Seed for reproducible document selection.
    pub seed: u64,
    /// Completeness policy.
    pub policy: CompletenessPolicy,
    /// Maximum replacement draws before giving up (strict mode).
    pub max_retries: usize,
}

impl BuildConfig {
    /// Config with the default ablation kind set, strict policy without
    /// full-coverage, and the standard retry budget.
    pub fn new(target_size: usize, seed: u64) -> Self {
        Self {
            kinds: transform::default_kinds(),
            target_size,
            seed,
            policy: CompletenessPolicy::Strict {
                require_full_coverage: false,
            },
            max_retries: 100,
        }
    }

    /// Replace the transform-kind set.
    pub fn with_kinds(mut self, kinds: Vec<TransformKind>) -> Self {
        self.kinds = kinds;
        self
    }

    /// Replace the completeness policy.
    pub fn with_policy(mut self, policy: CompletenessPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replace the retry budget.
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// All variants derived from one document in one run.
#[derive(Debug, Clone, Serialize)]
pub struct VariantFamily {
    /// Key of the owning document.
    pub document_id: String,
    /// Title of the owning document.
    pub title: String,
    /// The retained variants, in kind order.
    pub variants: Vec<Variant>,
}

/// Per-kind outcome counters across a build run.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct KindStats {
    pub success: usize,
    pub skip: usize,
    pub failure: usize,
}

impl KindStats {
    fn record(&mut self, status: VariantStatus) {
        match status {
            VariantStatus::Success => self.success += 1,
            VariantStatus::Skip => self.skip += 1,
            VariantStatus::Failure => self.failure += 1,
        }
    }

    /// Fraction of attempts that succeeded.
    pub fn success_rate(&self) -> f64 {
        let total = self.success + self.skip + self.failure;
        if total == 0 {
            return 0.0;
        }
        self.success as f64 / total as f64
    }
}

/// Result of a dataset build.
#[derive(Debug, Serialize)]
pub struct BuildReport {
    /// Retained families, one per kept document.
    pub families: Vec<VariantFamily>,
    /// Per-kind attempt counters across every processed document,
    /// discarded ones included.
    pub kind_stats: BTreeMap<String, KindStats>,
    /// Documents discarded under the strict policy.
    pub discarded: usize,
    /// Replacement documents drawn from the pool.
    pub resampled: usize,
}

impl BuildReport {
    /// Flatten retained families into a single variant list, build order
    /// preserved.
    pub fn into_variants(self) -> Vec<Variant> {
        self.families
            .into_iter()
            .flat_map(|family| family.variants)
            .collect()
    }
}

/// Fatal build errors. Per-document trouble is handled by discard/resample;
/// only resource exhaustion surfaces here.
#[derive(Debug)]
pub enum BuildError {
    /// The corpus had no documents at all.
    EmptyCorpus,
    /// Retry budget or pool was exhausted before reaching the target.
    TargetUnreachable { target: usize, built: usize },
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::EmptyCorpus => f.write_str("corpus contains no documents"),
            BuildError::TargetUnreachable { target, built } => write!(
                f,
                "could not reach target of {} documents: built {} (short by {})",
                target,
                built,
                target - built
            ),
        }
    }
}

impl std::error::Error for BuildError {}

/// Outcome of building one family.
enum FamilyOutcome {
    Kept(VariantFamily),
    Discarded,
}

/// Build variant families over `corpus` according to `config`.
///
/// Under strict policy, failing to reach `target_size` within the retry
/// budget (or draining the pool) is a hard error naming the shortfall.
/// Under lenient policy the build returns whatever it produced.
pub fn build(
    corpus: &[Document],
    config: &BuildConfig,
    bus: Option<&EventBus>,
) -> Result<BuildReport, BuildError> {
    if corpus.is_empty() {
        return Err(BuildError::EmptyCorpus);
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let target = config.target_size.min(corpus.len()).max(1);

    // Seeded shuffle fixes both the initial sample and, together with the
    // replacement draws below, the full selection order.
    let mut indices: Vec<usize> = (0..corpus.len()).collect();
    indices.shuffle(&mut rng);
    let mut queue: VecDeque<usize> = indices.drain(..target).collect();
    let mut pool: Vec<usize> = indices;

    let mut kind_stats: BTreeMap<String, KindStats> = config
        .kinds
        .iter()
        .map(|kind| (kind.to_string(), KindStats::default()))
        .collect();
    let mut families = Vec::with_capacity(target);
    let mut discarded = 0usize;
    let mut resampled = 0usize;

    info!(
        target_size = target,
        kinds = config.kinds.len(),
        seed = config.seed,
        strict = config.policy.is_strict(),
        "building variant dataset"
    );

    while families.len() < target {
        let index = match queue.pop_front() {
            Some(index) => index,
            None => {
                if !config.policy.is_strict() {
                    // Lenient builds never resample.
                    break;
                }
                if pool.is_empty() {
                    warn!(
                        built = families.len(),
                        target_size = target,
                        "candidate pool exhausted before target"
                    );
                    break;
                }
                if resampled >= config.max_retries {
                    warn!(
                        built = families.len(),
                        target_size = target,
                        retries = resampled,
                        "retry budget exhausted before target"
                    );
                    break;
                }
                resampled += 1;
                let drawn = pool.swap_remove(rng.gen_range(0..pool.len()));
                if let Some(bus) = bus {
                    bus.emit(PipelineEvent::document_resampled(&corpus[drawn].key()));
                }
                drawn
            }
        };

        let document = &corpus[index];
        match build_family(document, config, &mut kind_stats, bus) {
            FamilyOutcome::Kept(family) => {
                debug!(
                    document = %family.document_id,
                    variants = family.variants.len(),
                    "family retained"
                );
                families.push(family);
            }
            FamilyOutcome::Discarded => {
                discarded += 1;
            }
        }
    }

    if config.policy.is_strict() && families.len() < target {
        return Err(BuildError::TargetUnreachable {
            target,
            built: families.len(),
        });
    }

    info!(
        families = families.len(),
        discarded, resampled, "dataset build finished"
    );

    Ok(BuildReport {
        families,
        kind_stats,
        discarded,
        resampled,
    })
}

fn build_family(
    document: &Document,
    config: &BuildConfig,
    kind_stats: &mut BTreeMap<String, KindStats>,
    bus: Option<&EventBus>,
) -> FamilyOutcome {
    let document_id = document.key();
    let mut variants = Vec::with_capacity(config.kinds.len());

    for kind in &config.kinds {
        let outcome = transform::apply(&document.text, kind);
        let status = validate::validate(&document.text, kind, outcome.as_ref());

        if let Some(stats) = kind_stats.get_mut(&kind.to_string()) {
            stats.record(status);
        }
        if let Some(bus) = bus {
            bus.emit(PipelineEvent::variant_attempted(
                &document_id,
                &kind.to_string(),
                status,
            ));
        }

        match status {
            VariantStatus::Success => {
                // Status is Success, so the outcome is present by rule order.
                if let Ok(outcome) = outcome {
                    let mut variant =
                        Variant::new(document, *kind, outcome.text, outcome.matched);
                    variant.status = status;
                    variants.push(variant);
                }
            }
            VariantStatus::Skip => {
                debug!(document = %document_id, kind = %kind, "section absent, variant skipped");
                match config.policy {
                    CompletenessPolicy::Strict {
                        require_full_coverage: true,
                    } => {
                        info!(
                            document = %document_id,
                            kind = %kind,
                            "full coverage required, discarding family"
                        );
                        return FamilyOutcome::Discarded;
                    }
                    _ => continue,
                }
            }
            VariantStatus::Failure => {
                warn!(document = %document_id, kind = %kind, "variant failed validation");
                match config.policy {
                    CompletenessPolicy::Strict { .. } => {
                        info!(document = %document_id, kind = %kind, "strict policy, discarding family");
                        return FamilyOutcome::Discarded;
                    }
                    CompletenessPolicy::Lenient => continue,
                }
            }
        }
    }

    // Every retained family carries its baseline.
    let has_original = variants
        .iter()
        .any(|variant| variant.transform_kind.is_original());
    if !has_original {
        warn!(document = %document_id, "family lacks original variant, discarding");
        return FamilyOutcome::Discarded;
    }

    FamilyOutcome::Kept(VariantFamily {
        document_id,
        title: document.title.clone(),
        variants,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::section::SectionKind;

    const FULL_PAPER: &str = "ABSTRACT\n\
        We study things at considerable length, enough to stay well clear of the validator.\n\
        \n\
        1. INTRODUCTION\n\
        Things have long been studied by many people in many places over many years.\n\
        \n\
        2. METHODS\n\
        We apply the usual method with the usual care and the usual instruments.\n\
        \n\
        3. EXPERIMENTS\n\
        We ran all of the experiments twice and averaged the results carefully.\n\
        \n\
        5. CONCLUSION\n\
        Things remain interesting and further study is clearly warranted here.";

    const NO_METHODS_PAPER: &str = "ABSTRACT\n\
        We study things at considerable length, enough to stay well clear of the validator.\n\
        \n\
        1. INTRODUCTION\n\
        Things have long been studied by many people in many places over many years.\n\
        \n\
        3. EXPERIMENTS\n\
        We ran all of the experiments twice and averaged the results carefully.\n\
        \n\
        5. CONCLUSION\n\
        Things remain interesting and further study is clearly warranted here.";

    fn doc(id: &str, text: &str) -> Document {
        Document {
            id: Some(id.to_string()),
            title: format!("Paper {}", id),
            text: text.to_string(),
            source: None,
            rates: None,
            decision: None,
        }
    }

    fn full_corpus(n: usize) -> Vec<Document> {
        (0..n).map(|i| doc(&format!("p{}", i), FULL_PAPER)).collect()
    }

    #[test]
    fn test_strict_full_coverage_families_complete() {
        let corpus = full_corpus(5);
        let config = BuildConfig::new(3, 7).with_policy(CompletenessPolicy::Strict {
            require_full_coverage: true,
        });
        let report = build(&corpus, &config, None).unwrap();

        assert_eq!(report.families.len(), 3);
        for family in &report.families {
            assert_eq!(family.variants.len(), config.kinds.len());
            for variant in &family.variants {
                assert_eq!(variant.status, VariantStatus::Success);
            }
        }
    }

    #[test]
    fn test_strict_tolerates_skip_without_full_coverage() {
        let corpus = vec![doc("p0", NO_METHODS_PAPER)];
        let config = BuildConfig::new(1, 1);
        let report = build(&corpus, &config, None).unwrap();

        assert_eq!(report.families.len(), 1);
        let family = &report.families[0];
        // remove_methods skipped, all other kinds present.
        assert_eq!(family.variants.len(), config.kinds.len() - 1);
        assert!(!family
            .variants
            .iter()
            .any(|v| v.transform_kind == TransformKind::Remove(SectionKind::Methods)));
        assert_eq!(report.kind_stats["remove_methods"].skip, 1);
    }

    #[test]
    fn test_strict_full_coverage_resamples_on_skip() {
        let mut corpus = vec![doc("gap", NO_METHODS_PAPER)];
        corpus.extend(full_corpus(6));
        let config = BuildConfig::new(6, 99).with_policy(CompletenessPolicy::Strict {
            require_full_coverage: true,
        });
        let report = build(&corpus, &config, None).unwrap();

        assert_eq!(report.families.len(), 6);
        assert!(report
            .families
            .iter()
            .all(|family| family.document_id != "gap"));
    }

    #[test]
    fn test_strict_discards_on_empty_text() {
        let mut corpus = vec![doc("empty", "")];
        corpus.extend(full_corpus(4));
        let config = BuildConfig::new(4, 3);
        let report = build(&corpus, &config, None).unwrap();

        assert_eq!(report.families.len(), 4);
        assert!(report
            .families
            .iter()
            .all(|family| family.document_id != "empty"));
    }

    #[test]
    fn test_strict_target_unreachable_reports_shortfall() {
        // Every document fails (empty text), so the target is unreachable.
        let corpus: Vec<Document> = (0..3).map(|i| doc(&format!("p{}", i), "")).collect();
        let config = BuildConfig::new(3, 5);
        let err = build(&corpus, &config, None).unwrap_err();

        match err {
            BuildError::TargetUnreachable { target, built } => {
                assert_eq!(target, 3);
                assert_eq!(built, 0);
            }
            other => panic!("expected TargetUnreachable, got {:?}", other),
        }
    }

    #[test]
    fn test_retry_budget_bounds_resampling() {
        let mut corpus: Vec<Document> = (0..50).map(|i| doc(&format!("bad{}", i), "")).collect();
        corpus.push(doc("good", FULL_PAPER));
        let config = BuildConfig::new(2, 11).with_max_retries(3);

        let err = build(&corpus, &config, None).unwrap_err();
        assert!(matches!(err, BuildError::TargetUnreachable { .. }));
    }

    #[test]
    fn test_lenient_keeps_partial_families_and_never_resamples() {
        let corpus = vec![doc("p0", NO_METHODS_PAPER), doc("p1", FULL_PAPER)];
        let config = BuildConfig::new(2, 21).with_policy(CompletenessPolicy::Lenient);
        let report = build(&corpus, &config, None).unwrap();

        assert_eq!(report.families.len(), 2);
        assert_eq!(report.resampled, 0);
        for family in &report.families {
            assert!(family
                .variants
                .iter()
                .any(|v| v.transform_kind.is_original()));
        }
    }

    #[test]
    fn test_lenient_drops_family_without_original() {
        let corpus = vec![doc("empty", ""), doc("p1", FULL_PAPER)];
        let config = BuildConfig::new(2, 8).with_policy(CompletenessPolicy::Lenient);
        let report = build(&corpus, &config, None).unwrap();

        assert_eq!(report.families.len(), 1);
        assert_eq!(report.families[0].document_id, "p1");
        assert_eq!(report.discarded, 1);
    }

    #[test]
    fn test_selection_is_deterministic() {
        let corpus = full_corpus(20);
        let config = BuildConfig::new(5, 42);

        let first = build(&corpus, &config, None).unwrap();
        let second = build(&corpus, &config, None).unwrap();

        let ids = |report: &BuildReport| -> Vec<String> {
            report
                .families
                .iter()
                .map(|f| f.document_id.clone())
                .collect()
        };
        assert_eq!(ids(&first), ids(&second));
    }

    #[test]
    fn test_different_seeds_differ() {
        let corpus = full_corpus(20);
        let a = build(&corpus, &BuildConfig::new(5, 1), None).unwrap();
        let b = build(&corpus, &BuildConfig::new(5, 2), None).unwrap();

        let ids = |report: &BuildReport| -> Vec<String> {
            report
                .families
                .iter()
                .map(|f| f.document_id.clone())
                .collect()
        };
        // 20 choose 5 orderings make a collision vanishingly unlikely.
        assert_ne!(ids(&a), ids(&b));
    }

    #[test]
    fn test_kind_stats_counts_attempts() {
        let corpus = vec![doc("p0", FULL_PAPER), doc("p1", NO_METHODS_PAPER)];
        let config = BuildConfig::new(2, 4).with_policy(CompletenessPolicy::Lenient);
        let report = build(&corpus, &config, None).unwrap();

        let methods = &report.kind_stats["remove_methods"];
        assert_eq!(methods.success, 1);
        assert_eq!(methods.skip, 1);
        assert!((methods.success_rate() - 0.5).abs() < f64::EPSILON);
        assert_eq!(report.kind_stats["original"].success, 2);
    }

    #[test]
    fn test_empty_corpus_is_error() {
        let config = BuildConfig::new(1, 0);
        assert!(matches!(
            build(&[], &config, None),
            Err(BuildError::EmptyCorpus)
        ));
    }
}
