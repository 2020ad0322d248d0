use crate::cbi::{PredicateInfo, Report};
use crate::predicate::Predicate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Suspiciousness scores for one predicate, per the classic CBI ranking:
/// `failure` is how often the predicate was true among failing runs,
/// `context` how often its site was reached in failing runs at all, and
/// `increase` the lift of the former over the latter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankedPredicate {
    pub predicate: Predicate,
    pub failure: f64,
    pub context: f64,
    pub increase: f64,
}

pub fn scores(info: &PredicateInfo) -> RankedPredicate {
    let failure = ratio(
        info.num_true_in_failure,
        info.num_true_in_success + info.num_true_in_failure,
    );
    let context = ratio(
        info.num_observed_in_failure,
        info.num_observed_in_success + info.num_observed_in_failure,
    );
    RankedPredicate {
        predicate: info.predicate,
        failure,
        context,
        increase: failure - context,
    }
}

/// Rank by decreasing `increase`, then decreasing `failure`, then
/// predicate key, so equal-score ties order deterministically.
pub fn rank(report: &Report) -> Vec<RankedPredicate> {
    let mut ranked: Vec<RankedPredicate> = report.predicates.iter().map(scores).collect();
    ranked.sort_by(|a, b| {
        b.increase
            .partial_cmp(&a.increase)
            .unwrap_or(Ordering::Equal)
            .then(b.failure.partial_cmp(&a.failure).unwrap_or(Ordering::Equal))
            .then(a.predicate.cmp(&b.predicate))
    });
    ranked
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}
