//! Cycle tolerant topological sort

use std::collections::VecDeque;

use super::relations::{EdgeIndex, RelationEdge, RelationGraph};
use crate::error::Result;
use crate::ts::{CheckFlags, OrderInfo, TransactionSet};

/// Depths beyond this share breadth 0
const MAX_PEER_DEPTH: usize = 128;

impl TransactionSet {
    /// Rewrite the elements into an execution order in which every live
    /// relation has its predecessor first.
    ///
    /// Dependency loops are broken by removing one relation per loop and
    /// sorting again, at most `max_rescans` times.
    ///
    /// # Returns
    /// * `Ok(0)` - Every element was ordered and the elements were rewritten
    /// * `Ok(n)` - `n` elements could not be ordered; presentation order is kept
    /// * `Err(e)` - A relation referred to an element that is not in the set
    pub fn order(&mut self) -> Result<usize> {
        let anaconda = self.flags.contains(CheckFlags::ANACONDA);
        let prefcolor = self.config.prefer_color;
        self.unordered_successors = None;
        self.relations.clear();

        self.added.make_index();
        self.erased.make_index();

        log::debug!("========== recording tsort relations");
        let mut graph = match self.relation_graph() {
            Ok(graph) => graph,
            Err(e) => {
                self.probes.release_whiteout();
                return Err(e);
            }
        };
        let n = graph.nodes.len();

        let mut treex = 0;
        for node in graph.nodes.iter_mut() {
            node.npreds = node.count;
            if node.count == 0 {
                treex += 1;
                node.tree = Some(treex);
                node.breadth = treex;
            } else {
                node.tree = None;
            }
        }

        log::debug!("========== tsorting packages (order, #predecessors, #succesors, tree, Ldepth, Rbreadth)");

        let mut ordering: Vec<usize> = Vec::with_capacity(n);
        let mut peer = [0usize; MAX_PEER_DEPTH];
        let mut relinked = false;
        let mut rescans = self.config.max_rescans;

        loop {
            let mut queue: VecDeque<usize> = VecDeque::new();
            for slot in 0..n {
                if anaconda {
                    graph.nodes[slot].qcnt = n - slot;
                }
                if graph.nodes[slot].done || graph.nodes[slot].count != 0 {
                    continue;
                }
                graph.nodes[slot].queued = ordering.len() + 1;
                add_q(&graph, &mut queue, slot, prefcolor);
            }

            while let Some(q) = queue.pop_front() {
                let node = &mut graph.nodes[q];
                node.queued = 0;
                node.breadth = match peer.get_mut(node.depth) {
                    Some(count) => {
                        let breadth = *count;
                        *count += 1;
                        breadth
                    }
                    None => 0,
                };
                node.degree = 0;
                node.done = true;
                log::debug!(
                    "{:5}{:5}{:5}{:5}{:5}{:5} {:width$}{}{}",
                    ordering.len(),
                    node.npreds,
                    node.qcnt,
                    node.tree.map_or(-1, |t| t as i64),
                    node.depth,
                    node.breadth,
                    "",
                    node.key.kind().marker(),
                    self.elements[q].nevra(),
                    width = 2 * node.depth
                );
                ordering.push(q);

                let tree = node.tree;
                let depth = node.depth;
                let successors = std::mem::take(&mut node.successors);
                for edge in successors {
                    let p = graph.links[edge].1;
                    let succ = &mut graph.nodes[p];
                    succ.count = succ.count.saturating_sub(1);
                    if succ.count != 0 {
                        continue;
                    }
                    succ.tree = tree;
                    succ.depth = depth + 1;
                    succ.parent = Some(q);
                    succ.queued = ordering.len() + 1;
                    graph.nodes[q].degree += 1;
                    add_q(&graph, &mut queue, p, prefcolor);
                }

                // Once only successors of ordered elements remain, keep them
                // in presentation order.
                if !relinked && !queue.is_empty() && n - ordering.len() == queue.len() {
                    log::debug!("========== successors only ({} elements)", queue.len());
                    self.unordered_successors = Some(ordering.len());
                    queue.make_contiguous().sort_unstable();
                    relinked = true;
                }
            }

            let remaining = n - ordering.len();
            if remaining == 0 {
                self.finish_order(&graph, Some(ordering.as_slice()));
                return Ok(0);
            }

            let nzaps = self.break_loops(&mut graph);
            if nzaps > 0 && rescans > 0 {
                rescans -= 1;
                log::debug!("========== continuing tsort ...");
                continue;
            }

            log::error!("order failed, {} elements remain", remaining);
            self.finish_order(&graph, None);
            return Ok(remaining);
        }
    }

    /// Copy the sorter bookkeeping onto the elements and, when an order was
    /// found, rewrite the element list into it.
    fn finish_order(&mut self, graph: &RelationGraph, ordering: Option<&[usize]>) {
        for (slot, node) in graph.nodes.iter().enumerate() {
            self.elements[slot].order = OrderInfo {
                npreds: node.npreds,
                depth: node.depth,
                tree: node.tree,
                breadth: node.breadth,
                parent: node.parent.map(|s| graph.nodes[s].key),
                degree: node.degree,
            };
        }
        self.relations = graph.edges.clone();

        if let Some(ordering) = ordering {
            let mut slots: Vec<Option<_>> = std::mem::take(&mut self.elements).into_iter().map(Some).collect();
            self.elements = ordering.iter().filter_map(|&slot| slots[slot].take()).collect();
        }
        self.probes.release_whiteout();
    }

    /// Find the dependency loops among the unordered elements and remove one
    /// relation from each. Returns the number of relations removed.
    fn break_loops(&self, graph: &mut RelationGraph) -> usize {
        for node in graph.nodes.iter_mut() {
            node.chain = None;
            node.queued = 0;
        }

        for q in 0..graph.nodes.len() {
            if !graph.nodes[q].successors.is_empty() {
                mark_loop(graph, q);
            }
        }

        let mut nzaps = 0;
        for r in 0..graph.nodes.len() {
            // Walk the predecessor chain until a node repeats.
            let mut cursor = graph.nodes[r].chain;
            while let Some(s) = cursor {
                if graph.nodes[s].queued != 0 {
                    break;
                }
                graph.nodes[s].queued = 1;
                cursor = graph.nodes[s].chain;
            }

            // The repeated node starts a loop; unchain it while collecting
            // the relations that form it.
            let mut members: Vec<(usize, Option<EdgeIndex>)> = Vec::new();
            while let Some(p) = cursor {
                let pred = match graph.nodes[p].chain.take() {
                    Some(pred) => pred,
                    None => break,
                };
                members.push((p, graph.find_edge(pred, p)));
                cursor = Some(pred);
            }

            if !members.is_empty() {
                log::warn!("LOOP:");
                for (p, edge) in &members {
                    let label = edge.map_or_else(|| "not found!?!".to_string(), |e| graph.edges[e].label());
                    log::warn!("    {:<40} {}", self.elements[*p].nevra(), label);
                }

                if let Some(edge) = select_zap(graph, &members) {
                    let succ = graph.links[edge].1;
                    log::warn!(
                        "removing {} \"{}\" from tsort relations.",
                        self.elements[succ].nevra(),
                        graph.edges[edge].label()
                    );
                    graph.zap(edge);
                    nzaps += 1;
                }
            }

            // Clear the chain leading into the loop.
            let mut p = r;
            while let Some(q) = graph.nodes[p].chain.take() {
                graph.nodes[p].queued = 0;
                p = q;
            }
        }
        nzaps
    }

    /// First element that could not be placed by predecessor count alone,
    /// from the last [`order`](TransactionSet::order).
    pub fn unordered_successors(&self) -> Option<usize> {
        self.unordered_successors
    }

    /// Relations recorded by the last [`order`](TransactionSet::order),
    /// including the ones removed to break loops.
    pub fn relations(&self) -> &[RelationEdge] {
        &self.relations
    }
}

/// One relation per loop: the first co-requisite in walk order, else the
/// first relation found.
fn select_zap(graph: &RelationGraph, members: &[(usize, Option<EdgeIndex>)]) -> Option<EdgeIndex> {
    let edges: Vec<EdgeIndex> = members.iter().filter_map(|(_, e)| *e).collect();
    edges
        .iter()
        .copied()
        .find(|&e| !graph.edges[e].prereq)
        .or_else(|| edges.first().copied())
}

/// Insert `slot` into the ready queue, ahead of the first entry it
/// outranks.
fn add_q(graph: &RelationGraph, queue: &mut VecDeque<usize>, slot: usize, prefcolor: u32) {
    let p = &graph.nodes[slot];
    let position = queue.iter().position(|&q| {
        let q = &graph.nodes[q];
        if p.color != prefcolor && p.color != q.color {
            return false;
        }
        // Erasures never jump ahead of installs.
        if !p.key.is_added() && q.key.is_added() {
            return false;
        }
        if p.queued > q.queued {
            return false;
        }
        q.qcnt <= p.qcnt
    });
    match position {
        Some(i) => queue.insert(i, slot),
        None => queue.push_back(slot),
    }
}

/// Record for every node reachable from `root` the node it was reached
/// from. `root` itself is not expanded.
fn mark_loop(graph: &mut RelationGraph, root: usize) {
    let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
    while let Some(top) = stack.last_mut() {
        let (q, next) = *top;
        let edge = match graph.nodes[q].successors.get(next) {
            Some(&edge) => edge,
            None => {
                stack.pop();
                continue;
            }
        };
        top.1 += 1;

        let p = graph.links[edge].1;
        if graph.nodes[p].chain.is_some() {
            continue;
        }
        graph.nodes[p].chain = Some(q);
        if p != root && !graph.nodes[p].successors.is_empty() {
            stack.push((p, 0));
        }
    }
}
