//! Terminal lowering: from a composed trunk to the frozen graph pair
//!
//! [`Pipeline::compile`] runs an operator expression against a fresh trunk
//! and lowers the result into the two parallel graphs a runner consumes: the
//! **apply graph** (a Channel publishing data) and the **train graph** (the
//! union of the train and label flows, closed at the trained-worker sinks).
//!
//! Lowering validates before it freezes:
//!
//! - the apply flow must still pass data through
//!   ([`FlowError::ClosurePublishing`] at its tail otherwise);
//! - the train flow must close into training sinks
//!   ([`FlowError::MissingTrainer`] at its tail otherwise);
//! - no placeholder may survive other than the entry heads the runner feeds
//!   ([`FlowError::UnresolvedFuture`]);
//! - Train inputs come paired with Label inputs
//!   ([`FlowError::PortCollision`]);
//! - every fork group of a stateful spec holds exactly one trained member
//!   ([`FlowError::MissingTrainer`] / [`FlowError::MultipleTrainers`]);
//! - the walks themselves surface [`FlowError::CyclicGraph`].
//!
//! The returned [`Pipeline`] owns the arena, so no mutable access to the
//! graph can exist after lowering; runners get deterministic node
//! enumeration, per-node inspection and per-output subscription lists, plus
//! a JSON snapshot for tooling.

use std::collections::BTreeSet;

use serde_json::{json, Value};
use uuid::Uuid;

use crate::compose::Operator;
use crate::error::{FlowError, Result};
use crate::graph::{Flow, GroupId, Node, NodeId};
use crate::path::{Path, Visitor};
use crate::trunk::Trunk;

/// A compiled pipeline: the frozen apply/train graph pair over one arena.
#[derive(Debug)]
pub struct Pipeline {
    flow: Flow,
    apply: Path,
    train: Path,
    label: Path,
    apply_nodes: Vec<NodeId>,
    train_nodes: Vec<NodeId>,
}

impl Pipeline {
    /// Compose the expression against a fresh trunk and lower the result.
    pub fn compile<O: Operator + ?Sized>(expression: &O) -> Result<Pipeline> {
        let mut flow = Flow::new();
        let trunk = Trunk::new(&mut flow)?;
        let trunk = expression.compose(&mut flow, trunk)?;
        Self::lower(flow, trunk)
    }

    /// Validate a composed trunk and freeze it into the graph pair.
    pub fn lower(mut flow: Flow, trunk: Trunk) -> Result<Pipeline> {
        tracing::debug!(session = %flow.uid(), nodes = flow.len(), "lowering composed trunk");

        let apply = trunk.apply.extend(&mut flow, None, None)?;
        if apply.is_closure() {
            return Err(FlowError::ClosurePublishing { node: apply.tail() });
        }
        let train = trunk.train.extend(&mut flow, None, None)?;
        if train.is_channel() {
            return Err(FlowError::MissingTrainer { node: train.tail() });
        }
        let label = trunk.label.extend(&mut flow, None, None)?;

        let heads = [apply.head(), train.head(), label.head()];

        let mut validator = Validator::new(heads);
        apply.accept(&flow, &mut validator)?;
        let apply_nodes = validator.take_nodes()?;

        train.accept(&flow, &mut validator)?;
        label.accept(&flow, &mut validator)?;
        let train_nodes = validator.take_nodes()?;

        validator.finish(&flow)?;

        tracing::debug!(
            session = %flow.uid(),
            apply = apply_nodes.len(),
            train = train_nodes.len(),
            "pipeline frozen"
        );
        Ok(Pipeline {
            flow,
            apply,
            train,
            label,
            apply_nodes,
            train_nodes,
        })
    }

    /// Session identity of the underlying arena.
    pub fn uid(&self) -> Uuid {
        self.flow.uid()
    }

    /// Read access to the frozen arena.
    pub fn flow(&self) -> &Flow {
        &self.flow
    }

    /// The apply graph's path.
    pub fn apply(&self) -> &Path {
        &self.apply
    }

    /// The train graph's feature path.
    pub fn train(&self) -> &Path {
        &self.train
    }

    /// The train graph's label path.
    pub fn label(&self) -> &Path {
        &self.label
    }

    /// Nodes of the apply graph in deterministic traversal order.
    pub fn apply_nodes(&self) -> &[NodeId] {
        &self.apply_nodes
    }

    /// Nodes of the train graph (train and label flows united) in
    /// deterministic traversal order.
    pub fn train_nodes(&self) -> &[NodeId] {
        &self.train_nodes
    }

    /// Inspect one node of the frozen pair.
    pub fn node(&self, id: NodeId) -> &Node {
        self.flow.node(id)
    }

    /// JSON snapshot of both graphs for tooling and diffing.
    pub fn describe(&self) -> Value {
        json!({
            "session": self.flow.uid().to_string(),
            "apply": graph_json(&self.flow, &self.apply_nodes),
            "train": graph_json(&self.flow, &self.train_nodes),
        })
    }
}

fn graph_json(flow: &Flow, nodes: &[NodeId]) -> Value {
    let members: BTreeSet<NodeId> = nodes.iter().copied().collect();
    let described: Vec<Value> = nodes
        .iter()
        .map(|&id| {
            let node = flow.node(id);
            json!({
                "id": id.index(),
                "kind": if node.is_worker() { "worker" } else { "future" },
                "actor": node.spec().map(|spec| spec.name().to_string()),
                "szin": node.szin(),
                "szout": node.szout(),
                "trained": node.trained(),
                "group": node.group().map(|g| g.0),
            })
        })
        .collect();
    let mut edges = Vec::new();
    for &id in nodes {
        for (index, subs) in flow.node(id).outputs() {
            for sub in subs.iter().filter(|s| members.contains(&s.node)) {
                edges.push(json!({
                    "source": id.index(),
                    "index": index,
                    "target": sub.node.index(),
                    "port": sub.port.to_string(),
                }));
            }
        }
    }
    json!({ "nodes": described, "edges": edges })
}

/// Lowering-time consistency walk over the frozen paths.
struct Validator {
    heads: [NodeId; 3],
    nodes: Vec<NodeId>,
    visited: BTreeSet<NodeId>,
    groups: Vec<GroupId>,
    error: Option<FlowError>,
}

impl Validator {
    fn new(heads: [NodeId; 3]) -> Self {
        Self {
            heads,
            nodes: Vec::new(),
            visited: BTreeSet::new(),
            groups: Vec::new(),
            error: None,
        }
    }

    /// Nodes collected since the last call, with the first walk error.
    fn take_nodes(&mut self) -> Result<Vec<NodeId>> {
        if let Some(error) = self.error.take() {
            return Err(error);
        }
        Ok(std::mem::take(&mut self.nodes))
    }

    fn finish(self, flow: &Flow) -> Result<()> {
        if let Some(error) = self.error {
            return Err(error);
        }
        // An unresolved future feeding any node of the frozen pair would
        // leave that input starved at execution time.
        for id in flow.node_ids() {
            let node = flow.node(id);
            let unresolved = node.is_future() && node.future_source().is_none();
            if unresolved
                && !self.heads.contains(&id)
                && node.subscriptions(0).iter().any(|s| self.visited.contains(&s.node))
            {
                return Err(FlowError::UnresolvedFuture { node: id });
            }
        }
        for group in self.groups {
            let members = flow.group_members(group);
            let trained = members.iter().filter(|&&m| flow.node(m).trained()).count();
            if trained > 1 {
                return Err(FlowError::MultipleTrainers { group });
            }
            let stateful = flow.node(members[0]).stateful();
            if stateful && flow.group_trainer(group).is_none() {
                return Err(FlowError::MissingTrainer { node: members[0] });
            }
        }
        Ok(())
    }
}

impl Visitor for Validator {
    fn visit_node(&mut self, flow: &Flow, node: NodeId) {
        if !self.nodes.contains(&node) {
            self.nodes.push(node);
        }
        self.visited.insert(node);
        if self.error.is_some() {
            return;
        }
        let data = flow.node(node);
        if data.is_future() {
            if !self.heads.contains(&node) && data.future_source().is_none() {
                self.error = Some(FlowError::UnresolvedFuture { node });
            }
            return;
        }
        let train = data.input_ports().contains(&crate::graph::Port::Train);
        let label = data.input_ports().contains(&crate::graph::Port::Label);
        if train != label {
            self.error = Some(FlowError::PortCollision { node });
            return;
        }
        if let Some(group) = data.group() {
            if !self.groups.contains(&group) {
                self.groups.push(group);
            }
        }
    }
}
