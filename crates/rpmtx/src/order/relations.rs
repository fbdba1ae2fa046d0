//! Relation graph between transaction elements

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use rpmtx_evr::Sense;

use crate::error::{ResolutionError, Result};
use crate::package::{DepTag, Dependency, Header};
use crate::ts::{ElementRef, TransactionSet};

/// Index of an edge in the relation arena
pub type EdgeIndex = usize;

/// "`predecessor` must run before `successor`", recorded because of
/// `dependency`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationEdge {
    pub predecessor: ElementRef,
    pub successor: ElementRef,
    pub dependency: Dependency,
    /// Recorded from a requirement the scriptlets need at run time
    pub prereq: bool,
    /// Cleared when the edge is removed to break a loop
    pub live: bool,
}

impl RelationEdge {
    /// `Requires(pre): foo >= 1.0`
    pub fn label(&self) -> String {
        format!("{} {}", self.dependency.flags.requires_label(), self.dependency.nevr())
    }
}

impl fmt::Display for RelationEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} ({})", self.predecessor, self.successor, self.label())
    }
}

/// Which side of the transaction a requirement is matched against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationMode {
    /// Against packages being installed; the provider runs first
    AsInstalled,
    /// Against packages being erased; the requirer is erased first
    AsErased,
}

impl RelationMode {
    fn for_element(key: ElementRef) -> Self {
        if key.is_added() {
            RelationMode::AsInstalled
        } else {
            RelationMode::AsErased
        }
    }

    fn is_prereq(&self, flags: Sense) -> bool {
        let phase = match self {
            RelationMode::AsInstalled => flags.install_prereq(),
            RelationMode::AsErased => flags.erase_prereq(),
        };
        !phase.is_empty() || flags.is_legacy_prereq()
    }
}

/// Per-element sorter bookkeeping
#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub key: ElementRef,
    pub color: u32,
    pub successors: Vec<EdgeIndex>,
    /// Unreleased predecessors
    pub count: usize,
    pub npreds: usize,
    /// Successor count, or the presentation weight in installer mode
    pub qcnt: usize,
    pub depth: usize,
    pub tree: Option<usize>,
    pub breadth: usize,
    pub parent: Option<usize>,
    pub degree: usize,
    /// Non-zero while queued; loop detection reuses it as a visit mark
    pub queued: usize,
    pub done: bool,
    pub chain: Option<usize>,
}

impl Node {
    fn new(key: ElementRef, color: u32) -> Self {
        Self {
            key,
            color,
            successors: Vec::new(),
            count: 0,
            npreds: 0,
            qcnt: 0,
            depth: 0,
            tree: None,
            breadth: 0,
            parent: None,
            degree: 0,
            queued: 0,
            done: false,
            chain: None,
        }
    }
}

/// Nodes in presentation order plus the edge arena.
#[derive(Debug, Clone, Default)]
pub(crate) struct RelationGraph {
    pub nodes: Vec<Node>,
    pub edges: Vec<RelationEdge>,
    /// (predecessor slot, successor slot) per edge
    pub links: Vec<(usize, usize)>,
    slots: HashMap<ElementRef, usize>,
}

impl RelationGraph {
    pub fn slot(&self, key: ElementRef) -> Option<usize> {
        self.slots.get(&key).copied()
    }

    /// Live edge from `pred` to `succ`
    pub fn find_edge(&self, pred: usize, succ: usize) -> Option<EdgeIndex> {
        self.nodes[pred]
            .successors
            .iter()
            .copied()
            .find(|&e| self.edges[e].live && self.links[e].1 == succ)
    }

    fn push_edge(&mut self, pred: usize, succ: usize, dependency: Dependency, prereq: bool) -> EdgeIndex {
        let index = self.edges.len();
        self.edges.push(RelationEdge {
            predecessor: self.nodes[pred].key,
            successor: self.nodes[succ].key,
            dependency,
            prereq,
            live: true,
        });
        self.links.push((pred, succ));
        self.nodes[pred].successors.push(index);
        self.nodes[pred].qcnt += 1;
        self.nodes[succ].count += 1;
        if self.nodes[succ].depth <= self.nodes[pred].depth {
            self.nodes[succ].depth = self.nodes[pred].depth + 1;
        }
        index
    }

    /// Mark the dead edge and detach it from both endpoints.
    pub fn zap(&mut self, edge: EdgeIndex) {
        let (pred, succ) = self.links[edge];
        self.edges[edge].live = false;
        self.nodes[pred].successors.retain(|&e| e != edge);
        self.nodes[succ].count = self.nodes[succ].count.saturating_sub(1);
        self.nodes[succ].npreds = self.nodes[succ].npreds.saturating_sub(1);
    }
}

impl TransactionSet {
    /// Record the precedence relations implied by every element's
    /// requirements, parent directories and symlink targets.
    pub(crate) fn relation_graph(&mut self) -> Result<RelationGraph> {
        let mut graph = RelationGraph::default();
        for (slot, element) in self.elements.iter().enumerate() {
            graph.nodes.push(Node::new(element.key, element.color()));
            graph.slots.insert(element.key, slot);
        }

        let n = self.elements.len();
        let depth_limit = self.config.dirname_depth_limit;
        for p in 0..n {
            let key = self.elements[p].key;
            let header = Arc::clone(&self.elements[p].header);
            let mode = RelationMode::for_element(key);
            let mut selected = vec![false; n];
            selected[p] = true;

            // Scriptlet prerequisites first so a pair linked both ways keeps
            // the prereq flag.
            for dep in header.requires.iter().filter(|d| mode.is_prereq(d.flags)) {
                self.add_relation(&mut graph, p, &mut selected, dep, mode)?;
            }
            for dep in header.requires.iter().filter(|d| !mode.is_prereq(d.flags)) {
                self.add_relation(&mut graph, p, &mut selected, dep, mode)?;
            }

            // An erasure runs after the install that replaces it.
            if !key.is_added() {
                let replacements: Vec<Arc<Header>> = self.elements[p]
                    .flink
                    .iter()
                    .filter(|link| link.target.is_added())
                    .filter_map(|link| self.element(link.target).map(|e| Arc::clone(&e.header)))
                    .collect();
                for replacement in replacements {
                    let dep = replacement.self_provide().retag(DepTag::Requires);
                    self.add_relation(&mut graph, p, &mut selected, &dep, RelationMode::AsInstalled)?;
                }
            }

            for dep in header.dirname_deps(depth_limit) {
                self.add_relation(&mut graph, p, &mut selected, &dep, mode)?;
            }
            for dep in header.linkto_deps() {
                self.add_relation(&mut graph, p, &mut selected, &dep, mode)?;
            }
        }

        log::debug!(
            "Recorded {} relations between {} elements",
            graph.edges.len(),
            graph.nodes.len()
        );
        Ok(graph)
    }

    /// Record one relation for requirer `p`. At most one edge is kept per
    /// requirer and provider pair; `selected` tracks the providers already
    /// linked.
    fn add_relation(
        &mut self,
        graph: &mut RelationGraph,
        p: usize,
        selected: &mut [bool],
        dep: &Dependency,
        mode: RelationMode,
    ) -> Result<()> {
        if dep.namespace().is_virtual() {
            return Ok(());
        }
        if self.config.disable_shell_interpreter_deps && dep.name == "/bin/sh" && dep.flags.contains(Sense::INTERP) {
            return Ok(());
        }

        let name = dep.bare_name();
        if name.starts_with('/') && self.elements[p].header.owns_file(name) {
            return Ok(());
        }

        let index = match mode {
            RelationMode::AsInstalled => &self.added,
            RelationMode::AsErased => &self.erased,
        };
        let q_key = match index.satisfies(dep, self.config.nopromote) {
            Some(key) => key,
            None => return Ok(()),
        };
        let q = graph.slot(q_key).ok_or(ResolutionError::UnknownElement(q_key))?;

        let level = self.flags.loop_log_level();
        if self
            .probes
            .whiteout(&self.config.dependency_whiteout, level)
            .ignores(&self.elements[p].header.name, &self.elements[q].header.name)
        {
            log::log!(
                level,
                "Ignoring {} on {} ({})",
                self.elements[p].nevra(),
                self.elements[q].nevra(),
                dep.nevr()
            );
            return Ok(());
        }

        if selected[q] {
            return Ok(());
        }
        selected[q] = true;

        let (pred, succ) = match mode {
            RelationMode::AsInstalled => (q, p),
            RelationMode::AsErased => (p, q),
        };
        let edge = graph.push_edge(pred, succ, dep.clone(), mode.is_prereq(dep.flags));
        log::trace!("relation {}", graph.edges[edge]);
        Ok(())
    }
}
