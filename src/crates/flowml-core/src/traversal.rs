//! Cycle-detecting traversal over the apply-output relation
//!
//! A [`Traversal`] is a cursor into the graph: the current node plus the set
//! of its predecessors on the walk so far. Stepping downstream yields new
//! traversals and fails with [`FlowError::CyclicGraph`] the moment a step
//! would revisit a predecessor. On top of the raw step primitives the module
//! provides the three walks the path layer is built from: terminal
//! resolution ([`Traversal::tail`]), exhaustive visitation
//! ([`Traversal::each`]) and structural copy ([`Traversal::copy`]).
//!
//! Iteration order everywhere is subscription insertion order, which is what
//! makes compilation deterministic.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::error::{FlowError, Result};
use crate::graph::{Flow, NodeId, Subscription};

/// A walk position: current node and the predecessors that led to it.
#[derive(Debug, Clone)]
pub struct Traversal {
    current: NodeId,
    predecessors: HashSet<NodeId>,
}

impl Traversal {
    /// Start a walk at the given node.
    pub fn new(current: NodeId) -> Self {
        let mut predecessors = HashSet::new();
        predecessors.insert(current);
        Self { current, predecessors }
    }

    /// The node this traversal stands on.
    pub fn current(&self) -> NodeId {
        self.current
    }

    fn child(&self, node: NodeId) -> Self {
        let mut predecessors = self.predecessors.clone();
        predecessors.insert(node);
        Self { current: node, predecessors }
    }

    /// Traversals for each distinct direct subscriber of the current node.
    ///
    /// `extra` splices in a future that is logically attached to the current
    /// node (its resolved source) but no longer physically subscribed; `mask`
    /// filters candidates. Fails with [`FlowError::CyclicGraph`] when a
    /// candidate is already among the predecessors.
    pub fn directs(
        &self,
        flow: &Flow,
        extra: Option<NodeId>,
        mask: Option<&dyn Fn(&Flow, NodeId) -> bool>,
    ) -> Result<Vec<Traversal>> {
        let spliced = extra.filter(|&e| {
            flow.node(e)
                .future_source()
                .is_some_and(|source| source.node() == self.current)
        });
        let node = flow.node(self.current);
        let candidates = node
            .outputs()
            .flat_map(|(_, subs)| subs.iter().map(|s| s.node))
            .chain(spliced);

        let mut seen: Vec<NodeId> = Vec::new();
        let mut steps = Vec::new();
        for candidate in candidates {
            if seen.contains(&candidate) {
                continue;
            }
            if let Some(mask) = mask {
                if !mask(flow, candidate) {
                    continue;
                }
            }
            if self.predecessors.contains(&candidate) {
                return Err(FlowError::CyclicGraph { node: candidate });
            }
            seen.push(candidate);
            steps.push(self.child(candidate));
        }
        Ok(steps)
    }

    /// [`Traversal::directs`] masked to mappers: trained workers are skipped.
    pub fn mappers(&self, flow: &Flow, extra: Option<NodeId>) -> Result<Vec<Traversal>> {
        self.directs(flow, extra, Some(&|flow: &Flow, node: NodeId| !flow.node(node).trained()))
    }

    /// Follow mapper subscriptions down to the terminal of the flow.
    ///
    /// With `expected` given, the walk stops there and fails with
    /// [`FlowError::AmbiguousTail`] when it is unreachable. Without it, the
    /// unique terminal is returned; distinct terminals (deduplicated by node,
    /// so reconverging diamonds count once) make the tail ambiguous.
    pub fn tail(&self, flow: &Flow, expected: Option<NodeId>) -> Result<Traversal> {
        let mut endings = self.endings(flow, expected)?;
        if let Some(expected) = expected {
            endings
                .into_iter()
                .find(|t| t.current == expected)
                .ok_or(FlowError::AmbiguousTail { node: self.current })
        } else if endings.len() > 1 {
            Err(FlowError::AmbiguousTail { node: self.current })
        } else {
            Ok(endings.pop().expect("a walk without children ends at its origin"))
        }
    }

    fn endings(&self, flow: &Flow, expected: Option<NodeId>) -> Result<Vec<Traversal>> {
        if expected == Some(self.current) {
            return Ok(vec![self.clone()]);
        }
        let children = self.mappers(flow, expected)?;
        if children.is_empty() {
            return Ok(vec![self.clone()]);
        }
        let mut endings: Vec<Traversal> = Vec::new();
        for child in children {
            for ending in child.endings(flow, expected)? {
                if !endings.iter().any(|t| t.current == ending.current) {
                    endings.push(ending);
                }
            }
        }
        Ok(endings)
    }

    /// Visit every distinct node reachable from here exactly once.
    ///
    /// The walk follows all subscriptions (training sinks hanging off
    /// interior nodes included); at `tail` it descends only into trained
    /// subscribers, so the visitor reaches the training sinks at the path
    /// frontier and nothing beyond them.
    pub fn each(&self, flow: &Flow, tail: NodeId, visit: &mut dyn FnMut(NodeId)) -> Result<()> {
        fn walk(
            flow: &Flow,
            traversal: &Traversal,
            tail: NodeId,
            seen: &mut HashSet<NodeId>,
            visit: &mut dyn FnMut(NodeId),
        ) -> Result<()> {
            visit(traversal.current);
            seen.insert(traversal.current);
            let at_tail = traversal.current == tail;
            let children = {
                let seen = &*seen;
                traversal.directs(
                    flow,
                    Some(tail),
                    Some(&|flow: &Flow, node: NodeId| {
                        !seen.contains(&node) && (!at_tail || flow.node(node).trained())
                    }),
                )?
            };
            for child in children {
                if seen.contains(&child.current) {
                    continue;
                }
                walk(flow, &child, tail, seen, visit)?;
            }
            Ok(())
        }

        let mut seen = HashSet::new();
        walk(flow, &Traversal::new(self.current), tail, &mut seen, visit)
    }

    /// Structurally copy the main branch bounded by `tail`.
    ///
    /// The two phases are explicit: first the union of all mapper routes from
    /// here that arrive at `tail` is enumerated, then every node in it is
    /// replicated (fresh identity, fresh fork group) and every Apply edge
    /// with both endpoints enumerated is re-installed between the replicas.
    /// Edges into trained sinks are not copied. Returns the original-to-copy
    /// mapping; fails with [`FlowError::AmbiguousTail`] when `tail` is not
    /// reachable.
    pub fn copy(&self, flow: &mut Flow, tail: NodeId) -> Result<BTreeMap<NodeId, NodeId>> {
        fn routes(
            flow: &Flow,
            traversal: &Traversal,
            tail: NodeId,
            onpath: &mut BTreeSet<NodeId>,
        ) -> Result<()> {
            if traversal.current == tail {
                onpath.extend(traversal.predecessors.iter().copied());
                return Ok(());
            }
            for child in traversal.mappers(flow, Some(tail))? {
                routes(flow, &child, tail, onpath)?;
            }
            Ok(())
        }

        let mut onpath = BTreeSet::new();
        routes(flow, self, tail, &mut onpath)?;
        if !onpath.contains(&self.current) || !onpath.contains(&tail) {
            return Err(FlowError::AmbiguousTail { node: self.current });
        }

        let mut copies = BTreeMap::new();
        for &node in &onpath {
            copies.insert(node, flow.replicate(node));
        }
        for &node in &onpath {
            let edges: Vec<(usize, Subscription)> = flow
                .node(node)
                .outputs()
                .flat_map(|(index, subs)| subs.iter().map(move |s| (index, *s)))
                .filter(|(_, s)| s.port.is_apply() && onpath.contains(&s.node))
                .collect();
            for (index, subscription) in edges {
                let publisher = flow.output(copies[&node], index);
                flow.subscribe(publisher, copies[&subscription.node], subscription.port)?;
            }
        }
        Ok(copies)
    }
}
