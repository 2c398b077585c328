//! Core graph data model: ports, subscriptions, nodes and fork groups
//!
//! This module defines the bottom layers of the flow graph compiler. A
//! compilation session is a [`Flow`] arena owning every node and fork group
//! created while operators compose; everything else in the crate manipulates
//! the arena through `Copy` handles ([`NodeId`], [`GroupId`], [`Publishable`]).
//!
//! # Graph Structure
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                         Flow                             │
//! │                                                          │
//! │   ┌────────┐  Apply(0)   ┌────────┐  Apply(0) ┌───────┐  │
//! │   │ Future │────────────▶│ Worker │──────────▶│Worker │  │
//! │   └────────┘             └────────┘           └───────┘  │
//! │        │                      │                          │
//! │        │ Train                │ fork group               │
//! │        ▼                      ▼                          │
//! │   ┌────────┐             ┌────────┐                      │
//! │   │ Worker │◀─ Label ─   │ Worker │ (trained sink)       │
//! │   └────────┘             └────────┘                      │
//! │                                                          │
//! │   groups: every worker belongs to exactly one            │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Nodes
//!
//! A node is either a **Worker** (bound to an immutable actor [`Spec`]) or a
//! **Future** (a transparent 1-in/1-out placeholder used while composing).
//! Workers belong to *fork groups*: the equivalence class of all forks of one
//! logical actor. At most one member of a group may become *trained*.
//!
//! # Trained workers
//!
//! A worker becomes trained the moment a subscription lands on its `Train` or
//! `Label` port: it is then the subject of training, a sink. Trained workers
//! publish nothing, cannot be forked, and are skipped by mapper traversals.
//! The marking is monotonic for the lifetime of the session.
//!
//! # Mutation
//!
//! Installing a subscription ([`Flow::subscribe`], plus the [`Flow::train`]
//! convenience) is the single mutation the graph supports. Every check runs
//! before any edge is installed, so a failed call leaves the arena untouched.
//!
//! # Examples
//!
//! ```rust
//! use flowml_core::graph::{Flow, Port};
//! use flowml_core::task::{Params, Spec};
//! use std::sync::Arc;
//!
//! let spec = Arc::new(Spec::new("noop", false, Params::new(), Arc::new(|_| {
//!     unimplemented!("never built during composition")
//! })));
//!
//! let mut flow = Flow::new();
//! let source = flow.future();
//! let worker = flow.worker(spec, 1, 1);
//!
//! let tap = flow.output(source, 0);
//! flow.subscribe(tap, worker, Port::Apply(0)).unwrap();
//! assert_eq!(flow.node(source).subscriptions(0).len(), 1);
//! ```

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::error::{FlowError, Result};
use crate::task::Spec;

/// Stable node identity within one [`Flow`] session.
///
/// Identities are dense and allocated in creation order, which is what makes
/// node enumeration deterministic. They are only meaningful for the session
/// that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Position of the node in its session's creation order.
    pub fn index(&self) -> usize {
        self.0
    }

    #[cfg(test)]
    pub(crate) fn testing(index: usize) -> Self {
        Self(index)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fork group identity within one [`Flow`] session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct GroupId(pub(crate) usize);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A typed slot on a node.
///
/// `Apply(i)` slots carry data on both the input and the output side; `Train`
/// and `Label` are the paired input slots feeding an actor's training method.
/// On any one node the inputs hold either Apply ports only or the
/// Train/Label pair, never a mixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Port {
    /// Data slot at the given index.
    Apply(usize),
    /// Training feature input.
    Train,
    /// Training target input.
    Label,
}

impl Port {
    /// True for `Apply` slots.
    pub fn is_apply(&self) -> bool {
        matches!(self, Port::Apply(_))
    }

    /// True for the `Train`/`Label` pair.
    pub fn is_training(&self) -> bool {
        matches!(self, Port::Train | Port::Label)
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Port::Apply(index) => write!(f, "apply({index})"),
            Port::Train => write!(f, "train"),
            Port::Label => write!(f, "label"),
        }
    }
}

/// A directed edge target: the subscriber node and the input port it occupies.
///
/// Subscriptions are immutable once installed and live on the publisher side,
/// indexed by output port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription {
    /// The subscriber.
    pub node: NodeId,
    /// The occupied input port.
    pub port: Port,
}

/// A publishable reference: one output slot of one node.
///
/// Obtained from [`Flow::output`]. References taken from a dissolved future
/// forward transparently to the future's resolved source. The restricted
/// variant produced by closure paths only admits Train/Label subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Publishable {
    node: NodeId,
    index: usize,
    train_only: bool,
}

impl Publishable {
    /// The publishing node.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// The output index on the publishing node.
    pub fn index(&self) -> usize {
        self.index
    }

    /// True when only Train/Label subscriptions are admitted.
    pub fn is_train_only(&self) -> bool {
        self.train_only
    }

    /// Restrict this reference to training subscribers.
    pub(crate) fn restricted(self) -> Self {
        Self { train_only: true, ..self }
    }
}

#[derive(Debug)]
enum NodeKind {
    Worker {
        spec: Arc<Spec>,
        group: GroupId,
        trained: bool,
    },
    Future {
        source: Option<Publishable>,
    },
}

/// An atomic graph vertex.
///
/// Read access only; all mutation goes through [`Flow`].
#[derive(Debug)]
pub struct Node {
    szin: usize,
    szout: usize,
    input: Vec<Port>,
    output: Vec<Vec<Subscription>>,
    kind: NodeKind,
}

impl Node {
    /// Number of apply input slots.
    pub fn szin(&self) -> usize {
        self.szin
    }

    /// Number of apply output slots.
    pub fn szout(&self) -> usize {
        self.szout
    }

    /// True for worker nodes.
    pub fn is_worker(&self) -> bool {
        matches!(self.kind, NodeKind::Worker { .. })
    }

    /// True for future placeholder nodes.
    pub fn is_future(&self) -> bool {
        matches!(self.kind, NodeKind::Future { .. })
    }

    /// The actor spec of a worker, `None` for futures.
    pub fn spec(&self) -> Option<&Arc<Spec>> {
        match &self.kind {
            NodeKind::Worker { spec, .. } => Some(spec),
            NodeKind::Future { .. } => None,
        }
    }

    /// The fork group of a worker, `None` for futures.
    pub fn group(&self) -> Option<GroupId> {
        match &self.kind {
            NodeKind::Worker { group, .. } => Some(*group),
            NodeKind::Future { .. } => None,
        }
    }

    /// Whether this worker is the subject of training.
    pub fn trained(&self) -> bool {
        matches!(self.kind, NodeKind::Worker { trained: true, .. })
    }

    /// Whether this worker's spec acquires state through training.
    pub fn stateful(&self) -> bool {
        self.spec().is_some_and(|spec| spec.stateful())
    }

    /// The upstream source a dissolved future forwards to.
    pub fn future_source(&self) -> Option<Publishable> {
        match &self.kind {
            NodeKind::Future { source } => *source,
            NodeKind::Worker { .. } => None,
        }
    }

    /// Occupied input ports in subscription order.
    pub fn input_ports(&self) -> &[Port] {
        &self.input
    }

    /// Subscriptions of one output slot in installation order.
    pub fn subscriptions(&self, index: usize) -> &[Subscription] {
        &self.output[index]
    }

    /// All output slots with their subscriptions, in index order.
    pub fn outputs(&self) -> impl Iterator<Item = (usize, &[Subscription])> + '_ {
        self.output.iter().enumerate().map(|(index, subs)| (index, subs.as_slice()))
    }
}

#[derive(Debug, Default)]
struct Group {
    members: Vec<NodeId>,
    trainer: Option<NodeId>,
}

/// Arena owning every node and fork group of one compilation session.
///
/// Operators allocate workers and futures here while composing; the terminal
/// lowering moves the arena into the compiled
/// [`Pipeline`](crate::pipeline::Pipeline), after which no mutable reference
/// to it can exist.
#[derive(Debug)]
pub struct Flow {
    uid: Uuid,
    nodes: Vec<Node>,
    groups: Vec<Group>,
}

impl Flow {
    /// Open a fresh compilation session.
    pub fn new() -> Self {
        Self {
            uid: Uuid::new_v4(),
            nodes: Vec::new(),
            groups: Vec::new(),
        }
    }

    /// Session identity, used for log correlation and rendered titles.
    pub fn uid(&self) -> Uuid {
        self.uid
    }

    /// Number of nodes allocated so far (dissolved futures included).
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when no node has been allocated yet.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All node identities in creation order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }

    /// Read access to a node.
    ///
    /// # Panics
    ///
    /// Panics when the identity comes from a different session.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Members of a fork group in creation order.
    pub fn group_members(&self, group: GroupId) -> &[NodeId] {
        &self.groups[group.0].members
    }

    /// The trained member of a fork group, if any.
    pub fn group_trainer(&self, group: GroupId) -> Option<NodeId> {
        self.groups[group.0].trainer
    }

    /// Allocate a worker bound to the given spec, opening a new fork group.
    pub fn worker(&mut self, spec: Arc<Spec>, szin: usize, szout: usize) -> NodeId {
        let id = NodeId(self.nodes.len());
        let group = GroupId(self.groups.len());
        self.groups.push(Group {
            members: vec![id],
            trainer: None,
        });
        tracing::trace!(node = %id, group = %group, actor = spec.name(), "worker allocated");
        self.nodes.push(Node {
            szin,
            szout,
            input: Vec::new(),
            output: vec![Vec::new(); szout],
            kind: NodeKind::Worker {
                spec,
                group,
                trained: false,
            },
        });
        id
    }

    /// Allocate a future placeholder (`szin = szout = 1`).
    pub fn future(&mut self) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            szin: 1,
            szout: 1,
            input: Vec::new(),
            output: vec![Vec::new()],
            kind: NodeKind::Future { source: None },
        });
        id
    }

    /// Fork a node: a fresh copy with the same spec and arities, empty
    /// subscriptions, joined to the same fork group.
    ///
    /// Forking a future yields a fresh future. Fails with
    /// [`FlowError::ForkTrained`] on a trained worker.
    pub fn fork(&mut self, node: NodeId) -> Result<NodeId> {
        let source = self.node(node);
        if source.is_future() {
            return Ok(self.future());
        }
        if source.trained() {
            return Err(FlowError::ForkTrained { node });
        }
        let spec = source.spec().cloned().expect("workers carry a spec");
        let group = source.group().expect("workers belong to a fork group");
        let (szin, szout) = (source.szin, source.szout);
        let id = NodeId(self.nodes.len());
        self.groups[group.0].members.push(id);
        self.nodes.push(Node {
            szin,
            szout,
            input: Vec::new(),
            output: vec![Vec::new(); szout],
            kind: NodeKind::Worker {
                spec,
                group,
                trained: false,
            },
        });
        Ok(id)
    }

    /// Fresh copy of a node in a fresh fork group, used by structural path
    /// copies that must stay independently trainable.
    pub(crate) fn replicate(&mut self, node: NodeId) -> NodeId {
        let source = self.node(node);
        match source.spec().cloned() {
            Some(spec) => {
                let (szin, szout) = (source.szin, source.szout);
                self.worker(spec, szin, szout)
            }
            None => self.future(),
        }
    }

    /// A publishable reference to one output slot, following dissolved
    /// futures to their resolved source.
    ///
    /// # Panics
    ///
    /// Panics when `index` is out of the node's output range.
    pub fn output(&self, node: NodeId, index: usize) -> Publishable {
        assert!(
            index < self.node(node).szout,
            "output {index} out of range for node {node}"
        );
        self.resolve(Publishable {
            node,
            index,
            train_only: false,
        })
    }

    pub(crate) fn resolve(&self, mut publisher: Publishable) -> Publishable {
        while let Some(source) = self.node(publisher.node).future_source() {
            publisher = Publishable {
                node: source.node,
                index: source.index,
                train_only: publisher.train_only || source.train_only,
            };
        }
        publisher
    }

    /// Install a subscription: `publisher -> (node, port)`.
    ///
    /// This is the single graph mutation. Checks run in order before any edge
    /// is installed:
    ///
    /// 1. [`FlowError::SelfLoop`] when both ends are the same node;
    /// 2. [`FlowError::ClosurePublishing`] when a restricted publisher feeds
    ///    an Apply port;
    /// 3. [`FlowError::AlreadyBound`] when the input port is occupied;
    /// 4. [`FlowError::PortCollision`] when Apply would mix with Train/Label
    ///    on the subscriber;
    /// 5. [`FlowError::TrainedPublisher`] when the publisher is trained;
    /// 6. [`FlowError::MultipleTrainers`] when a Train/Label port would
    ///    create a second trainer in the subscriber's fork group.
    ///
    /// A Train/Label edge marks the subscriber trained. Subscribing the apply
    /// input of a future resolves it: the subscriptions held on the future
    /// move onto the upstream publisher and the future dissolves out of the
    /// graph.
    ///
    /// # Panics
    ///
    /// Panics when the port index exceeds the subscriber's input arity or a
    /// training port targets a future.
    pub fn subscribe(&mut self, publisher: Publishable, node: NodeId, port: Port) -> Result<()> {
        let publisher = self.resolve(publisher);
        self.check_edge(publisher, node, port)?;
        if self.node(node).is_future() && port.is_apply() {
            return self.resolve_future(node, publisher);
        }
        self.install(publisher, node, port);
        if port.is_training() {
            self.mark_trained(node);
        }
        Ok(())
    }

    /// Wire the Train and Label inputs of a worker in one call.
    ///
    /// Both edges are validated before either is installed, so a failure
    /// leaves the worker untouched.
    pub fn train(&mut self, node: NodeId, features: Publishable, labels: Publishable) -> Result<()> {
        let features = self.resolve(features);
        let labels = self.resolve(labels);
        self.check_edge(features, node, Port::Train)?;
        self.check_edge(labels, node, Port::Label)?;
        self.install(features, node, Port::Train);
        self.install(labels, node, Port::Label);
        self.mark_trained(node);
        Ok(())
    }

    fn check_edge(&self, publisher: Publishable, node: NodeId, port: Port) -> Result<()> {
        let target = self.node(node);
        match port {
            Port::Apply(index) => assert!(
                index < target.szin,
                "input {index} out of range for node {node}"
            ),
            Port::Train | Port::Label => {
                assert!(target.is_worker(), "training ports exist on workers only")
            }
        }
        if publisher.node == node {
            return Err(FlowError::SelfLoop { node });
        }
        if publisher.train_only && port.is_apply() {
            return Err(FlowError::ClosurePublishing { node: publisher.node });
        }
        if target.input.contains(&port) {
            return Err(FlowError::AlreadyBound { node, port });
        }
        let mixing = if port.is_apply() {
            target.input.iter().any(Port::is_training)
        } else {
            target.input.iter().any(Port::is_apply)
        };
        if mixing {
            return Err(FlowError::PortCollision { node });
        }
        if self.node(publisher.node).trained() {
            return Err(FlowError::TrainedPublisher { node: publisher.node });
        }
        if port.is_training() && !target.trained() {
            if let Some(group) = target.group() {
                if self.groups[group.0].trainer.is_some() {
                    return Err(FlowError::MultipleTrainers { group });
                }
            }
        }
        Ok(())
    }

    fn install(&mut self, publisher: Publishable, node: NodeId, port: Port) {
        self.nodes[node.0].input.push(port);
        self.nodes[publisher.node.0].output[publisher.index].push(Subscription { node, port });
        tracing::trace!(
            publisher = %publisher.node,
            index = publisher.index,
            subscriber = %node,
            port = %port,
            "subscription installed"
        );
    }

    fn mark_trained(&mut self, node: NodeId) {
        let group = match &mut self.nodes[node.0].kind {
            NodeKind::Worker { trained, group, .. } => {
                if *trained {
                    return;
                }
                *trained = true;
                *group
            }
            NodeKind::Future { .. } => unreachable!("training ports exist on workers only"),
        };
        self.groups[group.0].trainer = Some(node);
        tracing::debug!(node = %node, group = %group, "worker marked trained");
    }

    fn resolve_future(&mut self, future: NodeId, publisher: Publishable) -> Result<()> {
        let held = self.nodes[future.0].output[0].clone();
        for subscription in &held {
            if subscription.node == publisher.node {
                return Err(FlowError::SelfLoop { node: publisher.node });
            }
        }
        self.nodes[future.0].input.push(Port::Apply(0));
        match &mut self.nodes[future.0].kind {
            NodeKind::Future { source } => *source = Some(publisher),
            NodeKind::Worker { .. } => unreachable!("resolution applies to futures only"),
        }
        self.nodes[future.0].output[0].clear();
        self.nodes[publisher.node.0].output[publisher.index].extend(held.iter().copied());
        tracing::debug!(
            future = %future,
            publisher = %publisher.node,
            moved = held.len(),
            "future resolved and dissolved"
        );
        Ok(())
    }
}

impl Default for Flow {
    fn default() -> Self {
        Self::new()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::spec;
    use super::*;

    #[test]
    fn test_subscribe_records_edge() {
        let mut flow = Flow::new();
        let publisher = flow.worker(spec("source", true), 1, 1);
        let subscriber = flow.worker(spec("sink", true), 1, 1);

        flow.subscribe(flow.output(publisher, 0), subscriber, Port::Apply(0)).unwrap();

        assert_eq!(
            flow.node(publisher).subscriptions(0),
            &[Subscription { node: subscriber, port: Port::Apply(0) }]
        );
        assert_eq!(flow.node(subscriber).input_ports(), &[Port::Apply(0)]);
    }

    #[test]
    fn test_self_subscription_rejected() {
        let mut flow = Flow::new();
        let node = flow.worker(spec("loop", true), 1, 1);
        let result = flow.subscribe(flow.output(node, 0), node, Port::Apply(0));
        assert_eq!(result, Err(FlowError::SelfLoop { node }));
    }

    #[test]
    fn test_duplicate_subscription_rejected() {
        let mut flow = Flow::new();
        let first = flow.worker(spec("first", true), 1, 1);
        let second = flow.worker(spec("second", true), 1, 1);
        let sink = flow.worker(spec("sink", true), 1, 1);

        flow.subscribe(flow.output(first, 0), sink, Port::Apply(0)).unwrap();
        let result = flow.subscribe(flow.output(second, 0), sink, Port::Apply(0));
        assert_eq!(result, Err(FlowError::AlreadyBound { node: sink, port: Port::Apply(0) }));
    }

    #[test]
    fn test_apply_train_collision_rejected() {
        let mut flow = Flow::new();
        let publisher = flow.worker(spec("publisher", true), 1, 2);
        let sink = flow.worker(spec("sink", true), 1, 1);

        flow.subscribe(flow.output(publisher, 0), sink, Port::Train).unwrap();
        let result = flow.subscribe(flow.output(publisher, 1), sink, Port::Apply(0));
        assert_eq!(result, Err(FlowError::PortCollision { node: sink }));
    }

    #[test]
    fn test_trained_node_cannot_publish() {
        let mut flow = Flow::new();
        let publisher = flow.worker(spec("publisher", true), 1, 1);
        let trained = flow.worker(spec("trained", true), 1, 1);
        let downstream = flow.worker(spec("downstream", true), 1, 1);

        flow.subscribe(flow.output(publisher, 0), trained, Port::Train).unwrap();
        assert!(flow.node(trained).trained());

        let result = flow.subscribe(flow.output(trained, 0), downstream, Port::Apply(0));
        assert_eq!(result, Err(FlowError::TrainedPublisher { node: trained }));
        let result = flow.subscribe(flow.output(trained, 0), downstream, Port::Train);
        assert_eq!(result, Err(FlowError::TrainedPublisher { node: trained }));
    }

    #[test]
    fn test_train_wires_both_ports() {
        let mut flow = Flow::new();
        let tap = flow.worker(spec("tap", true), 1, 2);
        let learner = flow.worker(spec("learner", true), 1, 1);

        flow.train(learner, flow.output(tap, 0), flow.output(tap, 1)).unwrap();

        assert_eq!(
            flow.node(tap).subscriptions(0),
            &[Subscription { node: learner, port: Port::Train }]
        );
        assert_eq!(
            flow.node(tap).subscriptions(1),
            &[Subscription { node: learner, port: Port::Label }]
        );
        assert!(flow.node(learner).trained());
        assert_eq!(flow.group_trainer(flow.node(learner).group().unwrap()), Some(learner));
    }

    #[test]
    fn test_fork_group_admits_single_trainer() {
        let mut flow = Flow::new();
        let tap = flow.worker(spec("tap", true), 1, 2);
        let learner = flow.worker(spec("learner", true), 1, 1);
        let fork = flow.fork(learner).unwrap();
        let group = flow.node(learner).group().unwrap();
        assert_eq!(flow.group_members(group), &[learner, fork]);

        flow.train(learner, flow.output(tap, 0), flow.output(tap, 1)).unwrap();
        let result = flow.train(fork, flow.output(tap, 0), flow.output(tap, 1));
        assert_eq!(result, Err(FlowError::MultipleTrainers { group }));
    }

    #[test]
    fn test_fork_of_trained_worker_rejected() {
        let mut flow = Flow::new();
        let tap = flow.worker(spec("tap", true), 1, 2);
        let learner = flow.worker(spec("learner", true), 1, 1);
        flow.train(learner, flow.output(tap, 0), flow.output(tap, 1)).unwrap();
        assert_eq!(flow.fork(learner), Err(FlowError::ForkTrained { node: learner }));
    }

    #[test]
    fn test_failed_train_installs_nothing() {
        let mut flow = Flow::new();
        let tap = flow.worker(spec("tap", true), 1, 2);
        let learner = flow.worker(spec("learner", true), 1, 1);
        let trained = flow.worker(spec("trained", true), 1, 1);
        flow.subscribe(flow.output(tap, 0), trained, Port::Train).unwrap();

        // Label publisher is trained, so the whole call must fail.
        let result = flow.train(learner, flow.output(tap, 0), flow.output(trained, 0));
        assert_eq!(result, Err(FlowError::TrainedPublisher { node: trained }));
        assert!(!flow.node(learner).trained());
        assert!(flow.node(learner).input_ports().is_empty());
    }

    #[test]
    fn test_future_republishes_on_resolution() {
        let mut flow = Flow::new();
        let future = flow.future();
        let upstream = flow.worker(spec("upstream", true), 1, 1);
        let learner = flow.worker(spec("learner", true), 1, 1);
        let mapper = flow.worker(spec("mapper", false), 1, 1);

        flow.subscribe(flow.output(future, 0), learner, Port::Train).unwrap();
        flow.subscribe(flow.output(future, 0), mapper, Port::Apply(0)).unwrap();
        assert!(flow.node(learner).trained());

        flow.subscribe(flow.output(upstream, 0), future, Port::Apply(0)).unwrap();

        assert_eq!(
            flow.node(upstream).subscriptions(0),
            &[
                Subscription { node: learner, port: Port::Train },
                Subscription { node: mapper, port: Port::Apply(0) },
            ]
        );
        assert!(flow.node(future).subscriptions(0).is_empty());
        assert_eq!(flow.node(future).future_source().map(|p| p.node()), Some(upstream));
    }

    #[test]
    fn test_dissolved_future_forwards_publishing() {
        let mut flow = Flow::new();
        let future = flow.future();
        let upstream = flow.worker(spec("upstream", true), 1, 1);
        let downstream = flow.worker(spec("downstream", true), 1, 1);

        flow.subscribe(flow.output(upstream, 0), future, Port::Apply(0)).unwrap();
        flow.subscribe(flow.output(future, 0), downstream, Port::Apply(0)).unwrap();

        assert_eq!(
            flow.node(upstream).subscriptions(0),
            &[Subscription { node: downstream, port: Port::Apply(0) }]
        );
    }

    #[test]
    fn test_future_resolution_from_trained_source_rejected() {
        let mut flow = Flow::new();
        let future = flow.future();
        let trained = flow.worker(spec("trained", true), 1, 1);

        flow.subscribe(flow.output(future, 0), trained, Port::Train).unwrap();
        let result = flow.subscribe(flow.output(trained, 0), future, Port::Apply(0));
        assert_eq!(result, Err(FlowError::TrainedPublisher { node: trained }));
    }

    #[test]
    fn test_fork_preserves_spec_and_group() {
        let mut flow = Flow::new();
        let worker = flow.worker(spec("learner", true), 2, 3);
        let fork = flow.fork(worker).unwrap();

        assert_eq!(flow.node(fork).szin(), 2);
        assert_eq!(flow.node(fork).szout(), 3);
        assert_eq!(flow.node(fork).spec(), flow.node(worker).spec());
        assert_eq!(flow.node(fork).group(), flow.node(worker).group());
        assert!(!flow.node(fork).trained());
        assert!(flow.node(fork).input_ports().is_empty());
    }
}
