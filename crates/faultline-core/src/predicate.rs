use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Instrumented construct a log record came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Scheme {
    Branch,
    Return,
}

/// Predicate polarity. Each scheme contributes a complementary pair:
/// branch taken / not taken, and nonzero / zero return value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    BranchTrue,
    BranchFalse,
    ReturnTrue,
    ReturnFalse,
}

impl Polarity {
    /// The polarity witnessed as true by an observation of `value` at a
    /// site of the given scheme.
    pub fn fired(scheme: Scheme, value: bool) -> Polarity {
        match (scheme, value) {
            (Scheme::Branch, true) => Polarity::BranchTrue,
            (Scheme::Branch, false) => Polarity::BranchFalse,
            (Scheme::Return, true) => Polarity::ReturnTrue,
            (Scheme::Return, false) => Polarity::ReturnFalse,
        }
    }

    pub fn complement(self) -> Polarity {
        match self {
            Polarity::BranchTrue => Polarity::BranchFalse,
            Polarity::BranchFalse => Polarity::BranchTrue,
            Polarity::ReturnTrue => Polarity::ReturnFalse,
            Polarity::ReturnFalse => Polarity::ReturnTrue,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Polarity::BranchTrue => "branch_true",
            Polarity::BranchFalse => "branch_false",
            Polarity::ReturnTrue => "return_true",
            Polarity::ReturnFalse => "return_false",
        }
    }
}

/// An instrumented decision point: source location plus polarity. Two
/// predicates at the same site with opposite polarity are complementary.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Predicate {
    pub line: u32,
    pub column: u32,
    pub polarity: Polarity,
}

impl Predicate {
    pub fn new(line: u32, column: u32, polarity: Polarity) -> Predicate {
        Predicate {
            line,
            column,
            polarity,
        }
    }

    /// The opposite polarity at the same site. A pure derivation, never a
    /// mutated copy of an observed record.
    pub fn complement(self) -> Predicate {
        Predicate {
            polarity: self.polarity.complement(),
            ..self
        }
    }

    pub fn site(&self) -> (u32, u32) {
        (self.line, self.column)
    }
}

impl Display for Predicate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{} {}", self.line, self.column, self.polarity.as_str())
    }
}

/// One raw record from an instrumentation log.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Observation {
    #[serde(rename = "kind")]
    pub scheme: Scheme,
    pub line: u32,
    pub column: u32,
    pub value: bool,
}

impl Observation {
    /// The predicate this observation witnesses as true.
    pub fn fired(&self) -> Predicate {
        Predicate::new(
            self.line,
            self.column,
            Polarity::fired(self.scheme, self.value),
        )
    }
}

/// The ordered observations of one execution. The success/failure label is
/// carried by which collection a log is supplied in.
pub type RunLog = Vec<Observation>;

/// Which outcomes a predicate's site exhibited within a single run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ObservationStatus {
    Never,
    OnlyTrue,
    OnlyFalse,
    Both,
}

impl ObservationStatus {
    /// Commutative fold of two summaries of the same run. `Never` is the
    /// identity and `Both` is absorbing.
    pub fn merge(self, other: ObservationStatus) -> ObservationStatus {
        use ObservationStatus::{Both, Never, OnlyFalse, OnlyTrue};
        match (self, other) {
            (Never, status) | (status, Never) => status,
            (Both, _) | (_, Both) => Both,
            (OnlyTrue, OnlyTrue) => OnlyTrue,
            (OnlyFalse, OnlyFalse) => OnlyFalse,
            (OnlyTrue, OnlyFalse) | (OnlyFalse, OnlyTrue) => Both,
        }
    }
}
