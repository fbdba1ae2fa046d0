//! Dependency satisfaction and checking
//!
//! [`TransactionSet::satisfy`](crate::TransactionSet::satisfy) decides a
//! single dependency; [`TransactionSet::check`](crate::TransactionSet::check)
//! runs it over every staged package and collects problems.

mod cache;
mod check;
mod satisfy;
mod solver;

pub use cache::{JsonResultCache, MemoryResultCache, ResultCache};
pub use solver::{AvailableSolver, DependencySolver, SolveOutcome};

use std::fmt;

use crate::probe::Note;

/// Outcome of checking one dependency or dependency set.
///
/// Ordered by severity so the worst of several results is their maximum.
/// Resolution errors are carried as `Err` and never appear here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DepStatus {
    Satisfied = 0,
    Unsatisfied = 1,
}

impl DepStatus {
    pub fn from_bool(satisfied: bool) -> Self {
        if satisfied {
            DepStatus::Satisfied
        } else {
            DepStatus::Unsatisfied
        }
    }

    /// Value stored in the result cache.
    pub fn code(&self) -> i32 {
        *self as i32
    }
}

/// Which side of the transaction a dependency belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepContext {
    /// A package being installed; enables the solver callback
    Added,
    /// An installed package, checked against an erasure
    Installed,
    /// Dependencies attached to the transaction itself
    Transaction,
}

/// A satisfier verdict with the note explaining where it came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub status: DepStatus,
    pub note: Note,
}

impl Resolution {
    pub fn is_satisfied(&self) -> bool {
        self.status == DepStatus::Satisfied
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = if self.is_satisfied() { "YES" } else { "NO" };
        if self.note == Note::None {
            write!(f, "{}", verdict)
        } else {
            write!(f, "{} {}", self.note, verdict)
        }
    }
}
