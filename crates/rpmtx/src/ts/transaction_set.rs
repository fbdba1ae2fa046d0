use std::sync::Arc;

use super::element::{ElementRef, TransactionElement};
use super::flags::CheckFlags;
use super::index::ProviderIndex;
use super::problems::ProblemSet;
use crate::config::{MacroContext, ResolverConfig};
use crate::db::{DbOffset, HeaderStore, MatchIterator, MatchTag};
use crate::depends::{DependencySolver, ResultCache};
use crate::error::Result;
use crate::order::RelationEdge;
use crate::package::{Dependency, Header};
use crate::probe::ProbeContext;

/// The pending install and erase operations plus all resolver state.
///
/// Elements keep presentation order until [`order`](TransactionSet::order)
/// rewrites them into execution order.
pub struct TransactionSet {
    pub(crate) config: ResolverConfig,
    pub(crate) flags: CheckFlags,
    pub(crate) elements: Vec<TransactionElement>,
    pub(crate) added: ProviderIndex,
    pub(crate) erased: ProviderIndex,
    /// Sorted, deduplicated rows already scheduled for erasure
    pub(crate) removed_offsets: Vec<DbOffset>,
    pub(crate) next_added: usize,
    pub(crate) next_removed: usize,
    pub(crate) problems: ProblemSet,
    pub(crate) store: Option<Box<dyn HeaderStore>>,
    pub(crate) cache: Option<Box<dyn ResultCache>>,
    pub(crate) macros: Box<dyn MacroContext>,
    pub(crate) probes: ProbeContext,
    pub(crate) solver: Option<Box<dyn DependencySolver>>,
    pub(crate) available: Vec<Arc<Header>>,
    pub(crate) transaction_deps: Vec<Dependency>,
    pub(crate) relations: Vec<RelationEdge>,
    pub(crate) unordered_successors: Option<usize>,
}

impl TransactionSet {
    /// Create an empty transaction. Unknown `dep-flags` are ignored with a
    /// warning.
    pub fn new(config: ResolverConfig) -> Self {
        let flags = config.check_flags().unwrap_or_else(|e| {
            log::warn!("{}", e);
            CheckFlags::empty()
        });
        let macros: Box<dyn MacroContext> = Box::new(config.macro_table());
        Self {
            config,
            flags,
            elements: Vec::new(),
            added: ProviderIndex::new(),
            erased: ProviderIndex::new(),
            removed_offsets: Vec::new(),
            next_added: 0,
            next_removed: 0,
            problems: ProblemSet::new(),
            store: None,
            cache: None,
            macros,
            probes: ProbeContext::new(),
            solver: None,
            available: Vec::new(),
            transaction_deps: Vec::new(),
            relations: Vec::new(),
            unordered_successors: None,
        }
    }

    pub fn with_store<S: HeaderStore + 'static>(mut self, store: S) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    pub fn with_cache<C: ResultCache + 'static>(mut self, cache: C) -> Self {
        self.cache = Some(Box::new(cache));
        self
    }

    pub fn with_solver<S: DependencySolver + 'static>(mut self, solver: S) -> Self {
        self.solver = Some(Box::new(solver));
        self
    }

    pub fn with_macros<M: MacroContext + 'static>(mut self, macros: M) -> Self {
        self.macros = Box::new(macros);
        self
    }

    pub fn with_probe_context(mut self, probes: ProbeContext) -> Self {
        self.probes = probes;
        self
    }

    pub fn with_flags(mut self, flags: CheckFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn flags(&self) -> CheckFlags {
        self.flags
    }

    pub fn set_flags(&mut self, flags: CheckFlags) {
        self.flags = flags;
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn elements(&self) -> &[TransactionElement] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn problems(&self) -> &ProblemSet {
        &self.problems
    }

    pub fn store(&self) -> Option<&dyn HeaderStore> {
        self.store.as_deref()
    }

    pub fn probe_context_mut(&mut self) -> &mut ProbeContext {
        &mut self.probes
    }

    pub fn element(&self, key: ElementRef) -> Option<&TransactionElement> {
        self.elements.iter().find(|e| e.key == key)
    }

    pub(crate) fn element_mut(&mut self, key: ElementRef) -> Option<&mut TransactionElement> {
        self.elements.iter_mut().find(|e| e.key == key)
    }

    /// Position of an element in the current element order.
    pub fn position(&self, key: ElementRef) -> Option<usize> {
        self.elements.iter().position(|e| e.key == key)
    }

    /// Whether the installed row is already scheduled for erasure.
    pub fn is_removed(&self, offset: DbOffset) -> bool {
        self.removed_offsets.binary_search(&offset).is_ok()
    }

    pub fn removed_offsets(&self) -> &[DbOffset] {
        &self.removed_offsets
    }

    /// Packages offered as suggestions for unsatisfied requirements.
    pub fn set_available(&mut self, headers: Vec<Header>) {
        self.available = headers.into_iter().map(Arc::new).collect();
    }

    pub fn available(&self) -> &[Arc<Header>] {
        &self.available
    }

    /// Attach a Requires or Conflicts to the transaction itself.
    pub fn add_dependency(&mut self, dep: Dependency) {
        self.transaction_deps.push(dep);
    }

    /// Drop all elements, indexes and problems so the set can be reused.
    pub fn empty(&mut self) {
        self.elements.clear();
        self.added.clear();
        self.erased.clear();
        self.removed_offsets.clear();
        self.next_added = 0;
        self.next_removed = 0;
        self.problems.clear();
        self.transaction_deps.clear();
        self.relations.clear();
        self.unordered_successors = None;
    }

    /// Database lookup; yields nothing without an open store.
    pub(crate) fn init_iterator(&self, tag: MatchTag, key: &str) -> Result<MatchIterator> {
        match self.store.as_deref() {
            Some(store) => MatchIterator::lookup(store, tag, key),
            None => Ok(MatchIterator::default()),
        }
    }

    /// Available packages that would satisfy `dep`.
    pub(crate) fn suggestions_for(&self, dep: &Dependency) -> Vec<String> {
        let nopromote = self.config.nopromote;
        self.available
            .iter()
            .filter(|h| {
                let name = dep.bare_name();
                if name.starts_with('/') && h.owns_file(name) {
                    return true;
                }
                h.all_provides().iter().any(|p| p.name == name && dep.range_overlaps(p, nopromote))
            })
            .map(|h| h.nevra())
            .collect()
    }
}
