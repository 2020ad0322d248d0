use crate::predicate::{Observation, ObservationStatus, Predicate, RunLog};
use crate::types::RunLabel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// Per-predicate counters aggregated across all runs.
///
/// `num_true_*` counts raw observations where the predicate's polarity
/// fired; `num_observed_*` counts runs in which the predicate's site was
/// observed at all, and is the denominator downstream ranking divides by.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PredicateInfo {
    pub predicate: Predicate,
    pub num_true_in_success: u64,
    pub num_true_in_failure: u64,
    pub num_observed_in_success: u64,
    pub num_observed_in_failure: u64,
}

impl PredicateInfo {
    pub fn new(predicate: Predicate) -> PredicateInfo {
        PredicateInfo {
            predicate,
            num_true_in_success: 0,
            num_true_in_failure: 0,
            num_observed_in_success: 0,
            num_observed_in_failure: 0,
        }
    }
}

/// CBI report: one entry per predicate in the observed universe
/// (complements included), in predicate-key order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Report {
    pub predicates: Vec<PredicateInfo>,
}

/// The queried predicate was never observed, in either polarity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupError {
    pub predicate: Predicate,
}

impl Display for LookupError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "predicate never observed: {}", self.predicate)
    }
}

impl std::error::Error for LookupError {}

impl Report {
    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Resolve a predicate by exact (line, column, polarity) match first,
    /// falling back to the first entry at the same (line, column).
    ///
    /// The fallback is best-effort convenience for callers holding a
    /// placeholder polarity; prefer exact keys. A full miss means the
    /// caller queried a predicate that was never observed.
    pub fn info(&self, predicate: &Predicate) -> Result<&PredicateInfo, LookupError> {
        if let Some(info) = self
            .predicates
            .iter()
            .find(|info| info.predicate == *predicate)
        {
            return Ok(info);
        }
        self.predicates
            .iter()
            .find(|info| info.predicate.site() == predicate.site())
            .ok_or(LookupError {
                predicate: *predicate,
            })
    }
}

/// Fold one run into per-predicate observation statuses.
///
/// Observing a polarity as true simultaneously observes its complement as
/// false, so both identities enter the map. Predicates absent from the map
/// were `ObservationStatus::Never` observed in this run.
pub fn observe_run(log: &[Observation]) -> BTreeMap<Predicate, ObservationStatus> {
    let mut statuses = BTreeMap::new();
    for observation in log {
        let fired = observation.fired();
        merge_status(&mut statuses, fired, ObservationStatus::OnlyTrue);
        merge_status(&mut statuses, fired.complement(), ObservationStatus::OnlyFalse);
    }
    statuses
}

fn merge_status(
    statuses: &mut BTreeMap<Predicate, ObservationStatus>,
    predicate: Predicate,
    status: ObservationStatus,
) {
    let entry = statuses.entry(predicate).or_insert(ObservationStatus::Never);
    *entry = entry.merge(status);
}

/// Compute the CBI report from labeled run logs.
pub fn score(success_logs: &[RunLog], failure_logs: &[RunLog]) -> Report {
    let mut infos = universe(success_logs.iter().chain(failure_logs.iter()));
    for log in success_logs {
        aggregate(&mut infos, log, RunLabel::Success);
    }
    for log in failure_logs {
        aggregate(&mut infos, log, RunLabel::Failure);
    }
    Report {
        predicates: infos.into_values().collect(),
    }
}

/// Every predicate observed anywhere across all runs, and the complement
/// of each, seeded with zero counters before aggregation begins.
fn universe<'a>(logs: impl Iterator<Item = &'a RunLog>) -> BTreeMap<Predicate, PredicateInfo> {
    let mut infos = BTreeMap::new();
    for log in logs {
        for observation in log {
            let fired = observation.fired();
            for predicate in [fired, fired.complement()] {
                infos
                    .entry(predicate)
                    .or_insert_with(|| PredicateInfo::new(predicate));
            }
        }
    }
    infos
}

fn aggregate(infos: &mut BTreeMap<Predicate, PredicateInfo>, log: &RunLog, label: RunLabel) {
    for observation in log {
        let info = infos
            .get_mut(&observation.fired())
            .expect("universe seeds every fired predicate");
        match label {
            RunLabel::Success => info.num_true_in_success += 1,
            RunLabel::Failure => info.num_true_in_failure += 1,
        }
    }

    for (predicate, _status) in observe_run(log) {
        let info = infos
            .get_mut(&predicate)
            .expect("universe seeds every observed predicate");
        match label {
            RunLabel::Success => info.num_observed_in_success += 1,
            RunLabel::Failure => info.num_observed_in_failure += 1,
        }
    }
}
