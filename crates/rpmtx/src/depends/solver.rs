//! Suggestion callback for unsatisfied requirements

use crate::package::{Dependency, Header};
use crate::ts::TransactionSet;

/// What a solver did about an unsatisfied requirement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveOutcome {
    /// Treat the requirement as satisfied
    Satisfied,
    /// A candidate was added to the transaction; resolve again
    AddedCandidate,
    Unresolved,
}

/// Caller supplied hook consulted when a requirement of a package being
/// added cannot be satisfied.
///
/// The solver may add elements to the transaction. The satisfier rebuilds
/// the added index and retries after [`SolveOutcome::AddedCandidate`], up to
/// the configured number of retries.
pub trait DependencySolver {
    fn solve(&mut self, ts: &mut TransactionSet, dep: &Dependency) -> SolveOutcome;
}

impl<F> DependencySolver for F
where
    F: FnMut(&mut TransactionSet, &Dependency) -> SolveOutcome,
{
    fn solve(&mut self, ts: &mut TransactionSet, dep: &Dependency) -> SolveOutcome {
        self(ts, dep)
    }
}

/// Solver that installs the first package from the available pool that
/// satisfies the requirement.
#[derive(Debug, Clone, Default)]
pub struct AvailableSolver {
    added: Vec<String>,
}

impl AvailableSolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// NEVRAs added so far
    pub fn added(&self) -> &[String] {
        &self.added
    }
}

impl DependencySolver for AvailableSolver {
    fn solve(&mut self, ts: &mut TransactionSet, dep: &Dependency) -> SolveOutcome {
        let nopromote = ts.config().nopromote;
        let name = dep.bare_name();
        let candidate: Option<Header> = ts
            .available()
            .iter()
            .find(|h| {
                (name.starts_with('/') && h.owns_file(name))
                    || h.all_provides().iter().any(|p| p.name == name && dep.range_overlaps(p, nopromote))
            })
            .map(|h| (**h).clone());

        let header = match candidate {
            Some(h) => h,
            None => return SolveOutcome::Unresolved,
        };
        let nevra = header.nevra();
        if self.added.contains(&nevra) {
            return SolveOutcome::Unresolved;
        }

        match ts.add_install_element(header, None, true, &[]) {
            Ok(status) if status.key().is_some() => {
                log::info!("Adding {} for {}", nevra, dep);
                self.added.push(nevra);
                SolveOutcome::AddedCandidate
            }
            Ok(_) => SolveOutcome::Unresolved,
            Err(e) => {
                log::warn!("Failed to add {}: {}", nevra, e);
                SolveOutcome::Unresolved
            }
        }
    }
}
