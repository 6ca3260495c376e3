//! Streaming-aggregate and summary-reducer tests.

use cachefx_core::stats::{Running, Summary, SummaryField, Z_99};

/// Known five-element reduction.
#[test]
fn summary_of_odd_batch() {
    let summary = Summary::of(&[3.0, 1.0, 4.0, 5.0, 2.0]);
    assert_eq!(summary.min, 1.0);
    assert_eq!(summary.max, 5.0);
    assert_eq!(summary.mean, 3.0);
    assert_eq!(summary.variance, 2.0);
    assert_eq!(summary.median, 3.0);
}

/// Even-length batches take the lower middle as the median.
#[test]
fn summary_of_even_batch() {
    let summary = Summary::of(&[4.0, 1.0, 3.0, 2.0]);
    assert_eq!(summary.median, 2.0);
}

/// Empty input reduces to zeroes instead of NaNs.
#[test]
fn summary_of_empty_batch() {
    let summary = Summary::of(&[]);
    assert_eq!(summary.mean, 0.0);
    assert_eq!(summary.median, 0.0);
}

/// Field selection matches the stored values.
#[test]
fn summary_field_selection() {
    let summary = Summary::of(&[1.0, 2.0, 3.0]);
    assert_eq!(summary.field(SummaryField::Min), 1.0);
    assert_eq!(summary.field(SummaryField::Max), 3.0);
    assert_eq!(summary.field(SummaryField::Mean), 2.0);
    assert_eq!(summary.field(SummaryField::Median), 2.0);
}

/// Streaming mean and population variance.
#[test]
fn running_mean_and_variance() {
    let mut running = Running::new();
    for v in [1.0, 2.0, 3.0] {
        running.push(v);
    }
    assert_eq!(running.count(), 3);
    assert_eq!(running.mean(), 2.0);
    assert!((running.variance() - 2.0 / 3.0).abs() < 1e-12);
}

/// The variance estimate can never go negative, even for constant input
/// where floating-point cancellation bites.
#[test]
fn running_variance_is_non_negative() {
    let mut running = Running::new();
    for _ in 0..10_000 {
        running.push(0.1);
        assert!(running.variance() >= 0.0);
    }
}

/// Constant samples collapse the confidence interval to zero width.
#[test]
fn running_ci_for_constant_samples() {
    let mut running = Running::new();
    for _ in 0..100 {
        running.push(7.0);
    }
    assert_eq!(running.ci_half_width(Z_99), 0.0);
}

/// An empty accumulator has an unbounded interval.
#[test]
fn running_ci_for_empty_accumulator() {
    let running = Running::new();
    assert!(running.ci_half_width(Z_99).is_infinite());
}
