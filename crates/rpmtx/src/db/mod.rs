//! Installed package database access
//!
//! The resolver never reads a database format directly. It asks a
//! [`HeaderStore`] for headers matching a tag/value pair and walks the
//! results with a [`MatchIterator`], which can skip rows already scheduled
//! for erasure.

mod memory;

pub use memory::MemoryStore;

use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::package::Header;

/// Row offset of an installed header. Offsets start at 1.
pub type DbOffset = u32;

/// Index used for a database lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchTag {
    Name,
    ProvideName,
    RequireName,
    ConflictName,
    Basenames,
    SourceRpm,
}

impl MatchTag {
    pub fn description(&self) -> &'static str {
        match self {
            MatchTag::Name => "Name",
            MatchTag::ProvideName => "Providename",
            MatchTag::RequireName => "Requirename",
            MatchTag::ConflictName => "Conflictname",
            MatchTag::Basenames => "Basenames",
            MatchTag::SourceRpm => "Sourcerpm",
        }
    }
}

impl fmt::Display for MatchTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// One installed header found by a lookup
#[derive(Debug, Clone)]
pub struct DbMatch {
    pub offset: DbOffset,
    pub header: Arc<Header>,
}

/// Read access to the installed package database
pub trait HeaderStore {
    fn is_open(&self) -> bool {
        true
    }

    /// Headers whose `tag` index contains `key`, in offset order.
    fn find(&self, tag: MatchTag, key: &str) -> Result<Vec<DbMatch>>;

    /// Every installed header, in offset order.
    fn all(&self) -> Result<Vec<DbMatch>>;

    /// Re-run installed file verification for one header.
    fn verify(&self, _found: &DbMatch) -> Result<bool> {
        Ok(true)
    }
}

/// Iterator over lookup results with offset pruning
#[derive(Debug, Clone, Default)]
pub struct MatchIterator {
    matches: Vec<DbMatch>,
    pos: usize,
}

impl MatchIterator {
    pub fn new(matches: Vec<DbMatch>) -> Self {
        Self { matches, pos: 0 }
    }

    /// Run a lookup, yielding nothing when the store is closed.
    pub fn lookup(store: &dyn HeaderStore, tag: MatchTag, key: &str) -> Result<Self> {
        if !store.is_open() {
            return Ok(Self::default());
        }
        Ok(Self::new(store.find(tag, key)?))
    }

    /// Drop rows whose offset is in `exclude`, which must be sorted.
    pub fn prune(mut self, exclude: &[DbOffset]) -> Self {
        if !exclude.is_empty() {
            self.matches.retain(|m| exclude.binary_search(&m.offset).is_err());
        }
        self
    }

    pub fn remaining(&self) -> usize {
        self.matches.len() - self.pos
    }
}

impl Iterator for MatchIterator {
    type Item = DbMatch;

    fn next(&mut self) -> Option<DbMatch> {
        let m = self.matches.get(self.pos).cloned()?;
        self.pos += 1;
        Some(m)
    }
}
