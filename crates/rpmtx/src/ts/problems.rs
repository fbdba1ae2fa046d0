use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProblemKind {
    /// A Requires (or parent directory, or symlink target) is unsatisfied
    Requires,
    /// A Conflicts matches something present
    Conflicts,
}

impl ProblemKind {
    pub fn description(&self) -> &'static str {
        match self {
            ProblemKind::Requires => "requires",
            ProblemKind::Conflicts => "conflicts",
        }
    }
}

impl fmt::Display for ProblemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// One dependency problem found by a check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    pub kind: ProblemKind,
    /// NEVRA of the package owning the dependency
    pub package: String,
    /// Dependency as `name [op evr]`
    pub dependency: String,
    /// NEVRAs of available packages that would satisfy a requirement
    pub suggestions: Vec<String>,
    /// The problem comes from an installed package rather than one being added
    pub installed: bool,
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let installed = if self.installed { "(installed) " } else { "" };
        match self.kind {
            ProblemKind::Requires => write!(f, "{} is needed by {}{}", self.dependency, installed, self.package),
            ProblemKind::Conflicts => write!(f, "{} conflicts with {}{}", self.dependency, installed, self.package),
        }
    }
}

/// Problems collected by [`TransactionSet::check`](crate::TransactionSet::check).
#[derive(Debug, Clone, Default)]
pub struct ProblemSet {
    problems: Vec<Problem>,
}

impl ProblemSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, problem: Problem) {
        self.problems.push(problem);
    }

    pub fn len(&self) -> usize {
        self.problems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Problem> {
        self.problems.iter()
    }

    pub fn of_kind(&self, kind: ProblemKind) -> impl Iterator<Item = &Problem> {
        self.problems.iter().filter(move |p| p.kind == kind)
    }

    pub fn clear(&mut self) {
        self.problems.clear();
    }
}

impl<'a> IntoIterator for &'a ProblemSet {
    type Item = &'a Problem;
    type IntoIter = std::slice::Iter<'a, Problem>;

    fn into_iter(self) -> Self::IntoIter {
        self.problems.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_problem_display() {
        let p = Problem {
            kind: ProblemKind::Requires,
            package: "foo-1.0-1.x86_64".to_string(),
            dependency: "bar >= 2".to_string(),
            suggestions: vec![],
            installed: false,
        };
        assert_eq!(p.to_string(), "bar >= 2 is needed by foo-1.0-1.x86_64");

        let p = Problem {
            kind: ProblemKind::Conflicts,
            installed: true,
            ..p
        };
        assert_eq!(p.to_string(), "bar >= 2 conflicts with (installed) foo-1.0-1.x86_64");
    }

    #[test]
    fn test_problem_set() {
        let mut set = ProblemSet::new();
        assert!(set.is_empty());
        set.push(Problem {
            kind: ProblemKind::Conflicts,
            package: "a".to_string(),
            dependency: "b".to_string(),
            suggestions: vec![],
            installed: false,
        });
        assert_eq!(set.len(), 1);
        assert_eq!(set.of_kind(ProblemKind::Requires).count(), 0);
        set.clear();
        assert!(set.is_empty());
    }
}
