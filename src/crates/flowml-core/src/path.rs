//! Paths: head/tail-anchored acyclic sub-graphs
//!
//! A [`Path`] names an acyclic sub-graph by its two anchors: a `head` with at
//! most one apply input and a `tail` with at most one apply output, where the
//! tail is resolved by [`Traversal::tail`] at construction time. Mappers lie
//! on the trunk between the anchors; trained sinks may branch off but are
//! never traversed through.
//!
//! Every path is discriminated on construction:
//!
//! - **Channel** - the tail publishes apply data onward; the path can be
//!   extended and republished freely.
//! - **Closure** - every subscription leaving the tail lands in a Train or
//!   Label port, so the data flow dead-ends into training sinks. Closures
//!   cannot be extended, and their [`Path::publisher`] only admits further
//!   Train/Label subscribers.
//!
//! The [`Visitor`] protocol rides on paths: [`Path::accept`] drives the
//! exhaustive traversal and finishes with the path itself, visiting each node
//! exactly once in deterministic order.

use crate::error::{FlowError, Result};
use crate::graph::{Flow, NodeId, Port, Publishable};
use crate::traversal::Traversal;

/// Discriminant of a [`Path`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    /// The tail passes apply data through.
    Channel,
    /// The tail publishes exclusively into training sinks.
    Closure,
}

/// An acyclic sub-graph anchored at a head and a tail node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    head: NodeId,
    tail: NodeId,
    kind: PathKind,
}

/// Client of the path traversal: runners, renderers, consistency checks.
///
/// [`Path::accept`] calls [`Visitor::visit_node`] exactly once per reachable
/// node (insertion order of subscriptions) and [`Visitor::visit_path`] last.
pub trait Visitor {
    /// One node of the traversed path.
    fn visit_node(&mut self, _flow: &Flow, _node: NodeId) {}

    /// The traversed path, after all of its nodes.
    fn visit_path(&mut self, _flow: &Flow, _path: &Path) {}
}

impl Path {
    /// Anchor a path at `head`, resolving the tail by traversal.
    ///
    /// With `tail` given, the walk must reach that node; without it, the
    /// sub-graph must have a unique terminal mapper. Fails with
    /// [`FlowError::BadHead`]/[`FlowError::BadTail`] on arity violations,
    /// [`FlowError::AmbiguousTail`] and [`FlowError::CyclicGraph`] from the
    /// traversal.
    pub fn new(flow: &Flow, head: NodeId, tail: Option<NodeId>) -> Result<Self> {
        if flow.node(head).szin() > 1 {
            return Err(FlowError::BadHead { node: head });
        }
        let tail = Traversal::new(head).tail(flow, tail)?.current();
        if flow.node(tail).szout() > 1 {
            return Err(FlowError::BadTail { node: tail });
        }
        let closed = flow
            .node(tail)
            .outputs()
            .any(|(_, subs)| subs.iter().any(|s| s.port.is_training()));
        Ok(Self {
            head,
            tail,
            kind: if closed { PathKind::Closure } else { PathKind::Channel },
        })
    }

    /// The entry anchor.
    pub fn head(&self) -> NodeId {
        self.head
    }

    /// The exit anchor.
    pub fn tail(&self) -> NodeId {
        self.tail
    }

    /// Channel or Closure.
    pub fn kind(&self) -> PathKind {
        self.kind
    }

    /// True for data-passing paths.
    pub fn is_channel(&self) -> bool {
        self.kind == PathKind::Channel
    }

    /// True for paths closed into training sinks.
    pub fn is_closure(&self) -> bool {
        self.kind == PathKind::Closure
    }

    /// Extend this path.
    ///
    /// On a channel: with `right` given, its head is subscribed to our tail
    /// and the result spans from our head to `right`'s tail (or the explicit
    /// `tail`); without, the path is retraced from the current tail to its
    /// natural terminal (or the explicit `tail`). On a closure the only legal
    /// call is the no-op (`right` absent, `tail` absent or the current tail);
    /// anything else fails with [`FlowError::ClosurePathExtension`].
    pub fn extend(&self, flow: &mut Flow, right: Option<&Path>, tail: Option<NodeId>) -> Result<Path> {
        match self.kind {
            PathKind::Closure => {
                if right.is_none() && tail.map_or(true, |t| t == self.tail) {
                    Path::new(flow, self.head, Some(self.tail))
                } else {
                    Err(FlowError::ClosurePathExtension { node: self.tail })
                }
            }
            PathKind::Channel => {
                let tail = match (right, tail) {
                    (Some(right), explicit) => {
                        flow.subscribe(self.publisher(flow), right.head, Port::Apply(0))?;
                        explicit.unwrap_or(right.tail)
                    }
                    (None, Some(explicit)) => explicit,
                    (None, None) => Traversal::new(self.tail).tail(flow, None)?.current(),
                };
                Path::new(flow, self.head, Some(tail))
            }
        }
    }

    /// Subscribe the head's single apply input to the given publisher.
    pub fn subscribe(&self, flow: &mut Flow, publisher: Publishable) -> Result<()> {
        flow.subscribe(publisher, self.head, Port::Apply(0))
    }

    /// The publishable handle of the tail's single apply output.
    ///
    /// For closures the handle is restricted: it forwards Train/Label
    /// subscriptions and rejects Apply targets with
    /// [`FlowError::ClosurePublishing`].
    ///
    /// # Panics
    ///
    /// Panics when the tail has no apply output at all (`szout == 0`).
    pub fn publisher(&self, flow: &Flow) -> Publishable {
        let publisher = flow.output(self.tail, 0);
        match self.kind {
            PathKind::Channel => publisher,
            PathKind::Closure => publisher.restricted(),
        }
    }

    /// Structurally copy the main branch of this path.
    ///
    /// Replicas are fresh nodes in fresh fork groups with the same Apply-edge
    /// topology; trained sinks branching off the trunk stay behind.
    pub fn copy(&self, flow: &mut Flow) -> Result<Path> {
        let copies = Traversal::new(self.head).copy(flow, self.tail)?;
        Path::new(flow, copies[&self.head], Some(copies[&self.tail]))
    }

    /// Drive a visitor over this path: every node once, the path last.
    pub fn accept<V: Visitor + ?Sized>(&self, flow: &Flow, visitor: &mut V) -> Result<()> {
        Traversal::new(self.head).each(flow, self.tail, &mut |node| visitor.visit_node(flow, node))?;
        visitor.visit_path(flow, self);
        Ok(())
    }
}
