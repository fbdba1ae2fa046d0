use std::collections::HashSet;
use std::sync::Arc;

use super::{DbMatch, DbOffset, HeaderStore, MatchTag};
use crate::error::Result;
use crate::package::Header;

/// Vector-backed header store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    headers: Vec<Arc<Header>>,
    failing_verify: HashSet<DbOffset>,
    closed: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that reports itself as not open.
    pub fn closed() -> Self {
        Self {
            closed: true,
            ..Self::default()
        }
    }

    /// Add a header, returning its offset.
    pub fn insert(&mut self, header: Header) -> DbOffset {
        self.headers.push(Arc::new(header));
        self.headers.len() as DbOffset
    }

    pub fn get(&self, offset: DbOffset) -> Option<Arc<Header>> {
        let idx = (offset as usize).checked_sub(1)?;
        self.headers.get(idx).cloned()
    }

    /// Make `verify` fail for the header at `offset`.
    pub fn fail_verify(&mut self, offset: DbOffset) {
        self.failing_verify.insert(offset);
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    fn matches(header: &Header, tag: MatchTag, key: &str) -> bool {
        match tag {
            MatchTag::Name => header.name == key,
            MatchTag::ProvideName => header.all_provides().iter().any(|p| p.name == key),
            MatchTag::RequireName => header.requires.iter().any(|r| r.name == key),
            MatchTag::ConflictName => header.conflicts.iter().any(|c| c.name == key),
            MatchTag::Basenames => header.owns_file(key),
            MatchTag::SourceRpm => header.sourcerpm.as_deref() == Some(key),
        }
    }
}

impl HeaderStore for MemoryStore {
    fn is_open(&self) -> bool {
        !self.closed
    }

    fn find(&self, tag: MatchTag, key: &str) -> Result<Vec<DbMatch>> {
        Ok(self
            .headers
            .iter()
            .enumerate()
            .filter(|(_, h)| Self::matches(h, tag, key))
            .map(|(i, h)| DbMatch {
                offset: (i + 1) as DbOffset,
                header: Arc::clone(h),
            })
            .collect())
    }

    fn all(&self) -> Result<Vec<DbMatch>> {
        Ok(self
            .headers
            .iter()
            .enumerate()
            .map(|(i, h)| DbMatch {
                offset: (i + 1) as DbOffset,
                header: Arc::clone(h),
            })
            .collect())
    }

    fn verify(&self, found: &DbMatch) -> Result<bool> {
        Ok(!self.failing_verify.contains(&found.offset))
    }
}
