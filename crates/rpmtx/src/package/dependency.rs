//! Dependency descriptors

use lazy_static::lazy_static;
use regex::Regex;
use rpmtx_evr::{ranges_overlap, Sense};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::namespace::Namespace;
use crate::error::{ResolutionError, Result};

lazy_static! {
    static ref DEPENDENCY_RE: Regex =
        Regex::new(r"^\s*(!?[^\s<>=!]+)\s*(?:(<=|=<|==|>=|=>|<>|!=|<|>|=)\s*(\S+))?\s*$").unwrap();
}

/// Which header tag a dependency was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DepTag {
    Name,
    Provides,
    Requires,
    Conflicts,
    Obsoletes,
    Dirnames,
    Linktos,
}

impl DepTag {
    pub fn type_name(&self) -> &'static str {
        match self {
            DepTag::Name => "Name",
            DepTag::Provides => "Provides",
            DepTag::Requires => "Requires",
            DepTag::Conflicts => "Conflicts",
            DepTag::Obsoletes => "Obsoletes",
            DepTag::Dirnames => "Dirnames",
            DepTag::Linktos => "Filelinktos",
        }
    }

    /// Single character prefix used in display strings.
    pub fn prefix(&self) -> char {
        self.type_name().chars().next().unwrap_or('?')
    }
}

impl fmt::Display for DepTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// A single named, versioned and flagged capability statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dependency {
    pub tag: DepTag,
    pub name: String,
    pub evr: String,
    pub flags: Sense,
    /// Multilib color bits, 0 when uncolored
    pub color: u32,
}

impl Dependency {
    pub fn new(tag: DepTag, name: impl Into<String>, flags: Sense, evr: impl Into<String>) -> Self {
        Self {
            tag,
            name: name.into(),
            evr: evr.into(),
            flags,
            color: 0,
        }
    }

    /// Unversioned dependency.
    pub fn named(tag: DepTag, name: impl Into<String>) -> Self {
        Self::new(tag, name, Sense::ANY, "")
    }

    /// Parse `name [op evr]`.
    pub fn parse(tag: DepTag, input: &str) -> Result<Self> {
        let caps = DEPENDENCY_RE.captures(input).ok_or_else(|| ResolutionError::InvalidDependency {
            input: input.to_string(),
            reason: "expected \"name [op version]\"".to_string(),
        })?;

        let name = caps.get(1).map_or("", |m| m.as_str());
        let (flags, evr) = match (caps.get(2), caps.get(3)) {
            (Some(op), Some(evr)) => (Sense::from_operator(op.as_str())?, evr.as_str()),
            _ => (Sense::ANY, ""),
        };

        Ok(Self::new(tag, name, flags, evr))
    }

    /// Add context bits (script phase, missing-ok, ...) to the flags.
    pub fn with_flags(mut self, flags: Sense) -> Self {
        self.flags |= flags;
        self
    }

    pub fn with_color(mut self, color: u32) -> Self {
        self.color = color;
        self
    }

    /// Same name, range and flags under a different tag.
    pub fn retag(&self, tag: DepTag) -> Self {
        Self { tag, ..self.clone() }
    }

    pub fn namespace(&self) -> Namespace {
        Namespace::classify(&self.name)
    }

    /// A leading `!` inverts the verdict.
    pub fn is_negated(&self) -> bool {
        self.name.starts_with('!')
    }

    /// Name without the negation marker.
    pub fn bare_name(&self) -> &str {
        self.name.strip_prefix('!').unwrap_or(&self.name)
    }

    /// Argument between the parentheses of a probe namespace, or the bare
    /// name for everything else.
    pub fn probe_arg(&self) -> &str {
        let name = self.bare_name();
        if !self.namespace().is_probe() {
            return name;
        }
        match (name.find('('), name.rfind(')')) {
            (Some(open), Some(close)) if close > open => &name[open + 1..close],
            _ => name,
        }
    }

    pub fn is_versioned(&self) -> bool {
        self.flags.is_versioned()
    }

    /// `name [op evr]`
    pub fn nevr(&self) -> String {
        let mut s = self.name.clone();
        if self.flags.is_versioned() {
            s.push(' ');
            s.push_str(self.flags.operator());
        }
        if !self.evr.is_empty() {
            s.push(' ');
            s.push_str(&self.evr);
        }
        s
    }

    /// Canonical display string, e.g. `R foo >= 1.0`. Used as the result
    /// cache key.
    pub fn display(&self) -> String {
        format!("{} {}", self.tag.prefix(), self.nevr())
    }

    /// Same name and overlapping ranges.
    pub fn overlaps(&self, other: &Dependency, nopromote: bool) -> bool {
        self.name == other.name && self.range_overlaps(other, nopromote)
    }

    /// Range overlap ignoring names.
    pub fn range_overlaps(&self, other: &Dependency, nopromote: bool) -> bool {
        ranges_overlap(&self.evr, self.flags, &other.evr, other.flags, nopromote)
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.nevr())
    }
}

/// Name-sorted set of provides, searched by name then range overlap.
#[derive(Debug, Clone, Default)]
pub struct DependencySet {
    entries: Vec<Dependency>,
}

impl DependencySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert keeping name order; exact duplicates are dropped.
    pub fn merge(&mut self, dep: Dependency) {
        let start = self.entries.partition_point(|d| d.name < dep.name);
        let end = start + self.entries[start..].iter().take_while(|d| d.name == dep.name).count();
        if self.entries[start..end]
            .iter()
            .any(|d| d.evr == dep.evr && d.flags.range() == dep.flags.range())
        {
            return;
        }
        self.entries.insert(end, dep);
    }

    /// Index of the first entry with the same name whose range overlaps `dep`.
    pub fn search(&self, dep: &Dependency, nopromote: bool) -> Option<usize> {
        let start = self.entries.partition_point(|d| d.name.as_str() < dep.bare_name());
        self.entries[start..]
            .iter()
            .take_while(|d| d.name == dep.bare_name())
            .position(|d| dep.range_overlaps(d, nopromote))
            .map(|i| start + i)
    }

    pub fn contains(&self, dep: &Dependency, nopromote: bool) -> bool {
        self.search(dep, nopromote).is_some()
    }

    pub fn get(&self, index: usize) -> Option<&Dependency> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Dependency> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<Dependency> for DependencySet {
    fn from_iter<I: IntoIterator<Item = Dependency>>(iter: I) -> Self {
        let mut set = DependencySet::new();
        for dep in iter {
            set.merge(dep);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let dep = Dependency::parse(DepTag::Requires, "foo >= 1.0-2").unwrap();
        assert_eq!(dep.name, "foo");
        assert_eq!(dep.flags, Sense::GE);
        assert_eq!(dep.evr, "1.0-2");

        let dep = Dependency::parse(DepTag::Provides, "libbar.so()(64bit)").unwrap();
        assert_eq!(dep.name, "libbar.so()(64bit)");
        assert!(!dep.is_versioned());

        let dep = Dependency::parse(DepTag::Requires, "bar<2").unwrap();
        assert_eq!(dep.flags, Sense::LESS);
        assert_eq!(dep.evr, "2");

        assert!(Dependency::parse(DepTag::Requires, "").is_err());
        assert!(Dependency::parse(DepTag::Requires, "foo >= ").is_err());
    }

    #[test]
    fn test_display() {
        let dep = Dependency::parse(DepTag::Requires, "foo >= 1.0").unwrap();
        assert_eq!(dep.display(), "R foo >= 1.0");
        assert_eq!(Dependency::named(DepTag::Conflicts, "bar").display(), "C bar");
        assert_eq!(Dependency::named(DepTag::Linktos, "/lib/x").display(), "F /lib/x");
        assert_eq!(dep.to_string(), "foo >= 1.0");
    }

    #[test]
    fn test_probe_arg_and_negation() {
        let dep = Dependency::named(DepTag::Requires, "!user(nobody)");
        assert!(dep.is_negated());
        assert_eq!(dep.bare_name(), "user(nobody)");
        assert_eq!(dep.probe_arg(), "nobody");
        assert_eq!(Dependency::named(DepTag::Requires, "perl(Foo)").probe_arg(), "perl(Foo)");
        assert_eq!(Dependency::named(DepTag::Requires, "diskspace(/usr/lib)").probe_arg(), "/usr/lib");
    }

    #[test]
    fn test_overlaps() {
        let req = Dependency::parse(DepTag::Requires, "foo >= 1.0").unwrap();
        let prov = Dependency::parse(DepTag::Provides, "foo = 1.2-1").unwrap();
        assert!(req.overlaps(&prov, true));
        let other = Dependency::parse(DepTag::Provides, "bar = 1.2-1").unwrap();
        assert!(!req.overlaps(&other, true));
    }

    #[test]
    fn test_set_search() {
        let set: DependencySet = [
            "rpmlib(VersionedDependencies) <= 3.0.3-1",
            "cpuinfo(sse2)",
            "rpmlib(CompressedFileNames) <= 3.0.4-1",
            "cpuinfo(sse2)",
        ]
        .iter()
        .map(|s| Dependency::parse(DepTag::Provides, s).unwrap())
        .collect();

        assert_eq!(set.len(), 3);
        assert_eq!(set.get(0).unwrap().name, "cpuinfo(sse2)");

        let want = Dependency::parse(DepTag::Requires, "rpmlib(CompressedFileNames) <= 3.0.4-1").unwrap();
        assert!(set.contains(&want, true));
        let too_new = Dependency::parse(DepTag::Requires, "rpmlib(CompressedFileNames) >= 4.0").unwrap();
        assert!(!set.contains(&too_new, true));
        assert!(!set.contains(&Dependency::named(DepTag::Requires, "cpuinfo(avx)"), true));
    }
}
