//! End-to-end pipeline tests
//!
//! Exercises the full chain - corpus → variant dataset → batch evaluation →
//! aggregation - with a mock oracle and temporary files.

use ablator::core::{
    aggregate, apply, build, load_variants, save_variants, BuildConfig, CompletenessPolicy,
    Document, SectionKind, TransformKind, VariantStatus,
};
use ablator::eval::{evaluate_all, load_records, EvalConfig, ResultLog};
use ablator::oracle::{MockOracle, OracleError, Review, RetryConfig};
use std::time::Duration;

const PAPER: &str = "ABSTRACT\n\
    We present a thorough study of a subject of considerable ongoing interest.\n\
    The abstract summarizes our approach and our principal findings in brief.\n\
    \n\
    1. INTRODUCTION\n\
    The subject has a long history of careful study by numerous researchers.\n\
    This paper extends that line of work in several directions at once.\n\
    \n\
    2. METHODS\n\
    We apply the standard method, instrumented for detailed measurement.\n\
    \n\
    3. EXPERIMENTS\n\
    We ran every experiment three times and report averaged numbers.\n\
    \n\
    5. CONCLUSION\n\
    The subject remains interesting and future work directions abound.";

fn doc(id: &str) -> Document {
    Document {
        id: Some(id.to_string()),
        title: format!("Paper {}", id),
        text: PAPER.to_string(),
        source: None,
        rates: None,
        decision: None,
    }
}

fn quick_eval_config() -> EvalConfig {
    EvalConfig {
        call_timeout: Duration::from_secs(5),
        retry: RetryConfig::none(),
        min_text_chars: 50,
    }
}

// ============================================================================
// Scenario 1: section removal against realistic headings
// ============================================================================

#[test]
fn remove_abstract_removes_only_the_abstract() {
    let out = apply(PAPER, &TransformKind::Remove(SectionKind::Abstract)).unwrap();
    assert!(out.matched);
    assert!(!out.text.contains("ABSTRACT"));
    assert!(!out.text.contains("principal findings"));
    // Everything from the introduction onward survives.
    assert!(out.text.contains("1. INTRODUCTION"));
    assert!(out.text.contains("long history of careful study"));
    assert!(out.text.contains("5. CONCLUSION"));
}

#[test]
fn removal_never_shrinks_other_sections() {
    for kind in [
        TransformKind::Remove(SectionKind::Introduction),
        TransformKind::Remove(SectionKind::Methods),
        TransformKind::Remove(SectionKind::Experiments),
        TransformKind::Remove(SectionKind::Conclusion),
    ] {
        let out = apply(PAPER, &kind).unwrap();
        assert!(out.matched, "{} should match", kind);
        assert!(out.text.contains("ABSTRACT"), "{} ate the abstract", kind);
    }
}

// ============================================================================
// Dataset build + persistence
// ============================================================================

#[test]
fn build_then_save_then_load_preserves_families() {
    let corpus: Vec<Document> = (0..4).map(|i| doc(&format!("p{}", i))).collect();
    let config = BuildConfig::new(4, 7).with_policy(CompletenessPolicy::Strict {
        require_full_coverage: true,
    });
    let report = build(&corpus, &config, None).unwrap();
    assert_eq!(report.families.len(), 4);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("variants.jsonl");
    let variants = report.into_variants();
    save_variants(&path, &variants).unwrap();

    let loaded = load_variants(&path).unwrap();
    assert_eq!(loaded.len(), variants.len());
    assert!(loaded
        .iter()
        .all(|v| v.status == VariantStatus::Success));
    // 6 kinds per document under full coverage.
    assert_eq!(loaded.len(), 4 * 6);
}

// ============================================================================
// Scenario 4: oracle failure mid-batch, then resume
// ============================================================================

#[tokio::test]
async fn failed_oracle_call_is_retried_on_resume_only() {
    let corpus: Vec<Document> = (0..2).map(|i| doc(&format!("p{}", i))).collect();
    let config = BuildConfig::new(2, 3);
    let variants = build(&corpus, &config, None).unwrap().into_variants();
    let total = variants.len();
    assert_eq!(total, 12); // 2 documents x 6 kinds, every section present

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("eval.jsonl");

    // First run: variant #7 (0-indexed 6) times out, everything else scores.
    {
        let mut script: Vec<Result<Review, OracleError>> = (0..total)
            .map(|_| Ok(Review::with_rating(5.0, "Reject")))
            .collect();
        script[6] = Err(OracleError::Timeout);
        let oracle = MockOracle::scripted(script);

        let mut log = ResultLog::open(&path).unwrap();
        let report = evaluate_all(&variants, &oracle, &mut log, &quick_eval_config(), None)
            .await
            .unwrap();

        assert_eq!(report.succeeded, total - 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(load_records(&path).unwrap().len(), total - 1);
    }

    // Second run: only the failed variant is re-sent to the oracle.
    {
        let oracle = MockOracle::scripted(vec![Ok(Review::with_rating(4.0, "Reject"))]);
        let mut log = ResultLog::open(&path).unwrap();
        let report = evaluate_all(&variants, &oracle, &mut log, &quick_eval_config(), None)
            .await
            .unwrap();

        assert_eq!(report.resumed, total - 1);
        assert_eq!(report.succeeded, 1);
        assert!(report.failed.is_empty());
        assert_eq!(oracle.remaining(), 0);
    }

    assert_eq!(load_records(&path).unwrap().len(), total);
}

// ============================================================================
// Scenarios 2 + 3: delta classification and decision transitions
// ============================================================================

#[tokio::test]
async fn equal_ratings_classify_as_unchanged_not_anomalous() {
    let corpus = vec![doc("p1")];
    let config = BuildConfig::new(1, 1)
        .with_kinds(vec![
            TransformKind::Original,
            TransformKind::Remove(SectionKind::Abstract),
        ]);
    let variants = build(&corpus, &config, None).unwrap().into_variants();

    // Baseline 4.5, variant 4.5.
    let oracle = MockOracle::constant(Review::with_rating(4.5, "Reject"));
    let dir = tempfile::tempdir().unwrap();
    let mut log = ResultLog::open(&dir.path().join("eval.jsonl")).unwrap();
    evaluate_all(&variants, &oracle, &mut log, &quick_eval_config(), None)
        .await
        .unwrap();

    let summary = aggregate(&log.load().unwrap());
    let kind = &summary.by_kind["remove_abstract"];
    assert_eq!(kind.delta_count, 1);
    assert!((kind.delta_mean - 0.0).abs() < f64::EPSILON);
    assert!((kind.unchanged_rate - 1.0).abs() < f64::EPSILON);
    assert!(summary.anomalies.is_empty());
}

#[tokio::test]
async fn reject_to_accept_flip_is_the_key_attack_metric() {
    let corpus = vec![doc("p1")];
    let inject = TransformKind::Inject {
        attack: ablator::core::AttackKind::Direct,
        position: SectionKind::Abstract,
    };
    let config = BuildConfig::new(1, 1).with_kinds(vec![TransformKind::Original, inject]);
    let variants = build(&corpus, &config, None).unwrap().into_variants();
    assert_eq!(variants.len(), 2);

    // Baseline rejected at 4.0; injected variant accepted at 6.5.
    let oracle = MockOracle::scripted(vec![
        Ok(Review::with_rating(4.0, "Reject")),
        Ok(Review::with_rating(6.5, "Accept")),
    ]);
    let dir = tempfile::tempdir().unwrap();
    let mut log = ResultLog::open(&dir.path().join("eval.jsonl")).unwrap();
    evaluate_all(&variants, &oracle, &mut log, &quick_eval_config(), None)
        .await
        .unwrap();

    let summary = aggregate(&log.load().unwrap());
    let kind = &summary.by_kind["inject_direct@abstract"];
    assert_eq!(kind.transition_counts["Reject->Accept"], 1);
    assert!((kind.reject_to_accept_rate - 1.0).abs() < f64::EPSILON);
    assert_eq!(summary.anomalies.len(), 1);
    assert_eq!(summary.anomalies[0].kind, "inject_direct@abstract");
}

// ============================================================================
// Full chain
// ============================================================================

#[tokio::test]
async fn full_pipeline_produces_consistent_summary() {
    let corpus: Vec<Document> = (0..3).map(|i| doc(&format!("p{}", i))).collect();
    let config = BuildConfig::new(3, 42);
    let variants = build(&corpus, &config, None).unwrap().into_variants();

    let oracle = MockOracle::constant(Review::with_rating(5.5, "Reject"));
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("eval.jsonl");
    let mut log = ResultLog::open(&path).unwrap();
    let report = evaluate_all(&variants, &oracle, &mut log, &quick_eval_config(), None)
        .await
        .unwrap();
    assert_eq!(report.succeeded, variants.len());

    let summary = aggregate(&load_records(&path).unwrap());
    assert_eq!(summary.total, variants.len());
    assert_eq!(summary.baseline_missing, 0);
    assert_eq!(summary.kind_distribution["original"], 3);

    // Constant oracle means every delta is zero everywhere.
    for (name, kind) in &summary.by_kind {
        if name != "original" {
            assert!((kind.delta_mean - 0.0).abs() < f64::EPSILON, "{}", name);
            assert!((kind.unchanged_rate - 1.0).abs() < f64::EPSILON, "{}", name);
        }
    }
    assert!(summary.anomalies.is_empty());
}
