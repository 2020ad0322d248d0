pub mod cbi;
pub mod minimize;
pub mod minimize_ddmin;
pub mod oracle;
pub mod predicate;
pub mod rank;
pub mod types;

pub use cbi::{observe_run, score, LookupError, PredicateInfo, Report};
pub use minimize::{Minimizer, Reduction};
pub use minimize_ddmin::DdminMinimizer;
pub use oracle::Oracle;
pub use predicate::{Observation, ObservationStatus, Polarity, Predicate, RunLog, Scheme};
pub use rank::{rank, scores, RankedPredicate};
pub use types::{MinimizeStats, RunLabel};
