//! Error types for flow graph construction and lowering
//!
//! Every failure the compiler can produce is a variant of [`FlowError`]. All of
//! them are fatal to the compilation in progress: nothing is retried or
//! downgraded, and because every mutation validates up front, a failed
//! operation leaves the graph exactly as it was. Runners never see these
//! errors; a [`Pipeline`](crate::pipeline::Pipeline) only exists once lowering
//! has fully validated both graphs.
//!
//! # Error Categories
//!
//! ```text
//! FlowError
//! ├── SelfLoop / AlreadyBound / PortCollision / TrainedPublisher
//! │                      - subscription-time wiring violations
//! ├── ForkTrained        - fork requested on a trained worker
//! ├── BadHead / BadTail / AmbiguousTail / CyclicGraph
//! │                      - path construction and traversal failures
//! ├── ClosurePathExtension / ClosurePublishing
//! │                      - closed-path discipline violations
//! ├── UnresolvedFuture / MissingTrainer / MultipleTrainers
//! │                      - lowering-time validation failures
//! └── Task               - actor specification layer failures
//! ```
//!
//! # Examples
//!
//! ```rust
//! use flowml_core::graph::{Flow, Port};
//! use flowml_core::error::FlowError;
//!
//! let mut flow = Flow::new();
//! let future = flow.future();
//! let output = flow.output(future, 0);
//!
//! // A node may not feed itself.
//! match flow.subscribe(output, future, Port::Apply(0)) {
//!     Err(FlowError::SelfLoop { node }) => assert_eq!(node, future),
//!     other => panic!("unexpected: {other:?}"),
//! }
//! ```

use thiserror::Error;

use crate::graph::{GroupId, NodeId, Port};
use crate::task::TaskError;

/// Convenience result type using [`FlowError`].
pub type Result<T> = std::result::Result<T, FlowError>;

/// All failures surfaced by the flow graph compiler.
///
/// Variants carry the offending node (or fork group) so callers can point back
/// at the operator that emitted the bad wiring. Node identities are only
/// meaningful within the [`Flow`](crate::graph::Flow) that reported the error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    /// A node was subscribed to its own output.
    #[error("self subscription on node {node}")]
    SelfLoop {
        /// The node on both ends of the rejected edge.
        node: NodeId,
    },

    /// A second subscription targeted an occupied input port.
    ///
    /// Every input port admits at most one incoming subscription; this is the
    /// single-publisher invariant of the graph.
    #[error("input port {port} of node {node} is already bound")]
    AlreadyBound {
        /// The subscriber whose port is occupied.
        node: NodeId,
        /// The occupied port.
        port: Port,
    },

    /// Apply and Train/Label inputs were mixed on one node.
    ///
    /// A node is either used in application (Apply inputs only) or as a
    /// training sink (the Train/Label pair), never both.
    #[error("apply and train flows collide on node {node}")]
    PortCollision {
        /// The subscriber with conflicting inputs.
        node: NodeId,
    },

    /// A trained node was used as a publisher.
    ///
    /// A trained worker is a sink: its output feeds nothing, neither apply
    /// consumers nor further training sinks.
    #[error("trained node {node} cannot publish")]
    TrainedPublisher {
        /// The trained publisher.
        node: NodeId,
    },

    /// `fork` was requested on a worker that is already trained.
    #[error("cannot fork trained worker {node}")]
    ForkTrained {
        /// The trained fork source.
        node: NodeId,
    },

    /// A path head exposed more than one apply input.
    #[error("path head {node} must have at most one apply input")]
    BadHead {
        /// The rejected head.
        node: NodeId,
    },

    /// A path tail exposed more than one apply output.
    #[error("path tail {node} must have at most one apply output")]
    BadTail {
        /// The rejected tail.
        node: NodeId,
    },

    /// Traversal found multiple terminal mappers and no disambiguator, or the
    /// expected tail was not reachable.
    #[error("ambiguous path tail below node {node}")]
    AmbiguousTail {
        /// The node the traversal started from.
        node: NodeId,
    },

    /// Traversal stepped onto one of its own predecessors.
    #[error("cyclic flow near node {node}")]
    CyclicGraph {
        /// The node closing the cycle.
        node: NodeId,
    },

    /// `extend` was called on a closure path with anything but the no-op
    /// arguments.
    #[error("closure path ending at node {node} cannot be extended")]
    ClosurePathExtension {
        /// The closure tail.
        node: NodeId,
    },

    /// A closure publisher was asked to feed an Apply port.
    ///
    /// Data dead-ends into training sinks at a closure tail; only Train and
    /// Label subscriptions may still be wired through it.
    #[error("closure path ending at node {node} cannot publish apply data")]
    ClosurePublishing {
        /// The closure tail.
        node: NodeId,
    },

    /// A placeholder node survived into lowering.
    ///
    /// Futures exist only during composition; apart from the entry heads of
    /// the lowered paths, every one of them must have been resolved away.
    #[error("unresolved future {node} survived into lowering")]
    UnresolvedFuture {
        /// The surviving future.
        node: NodeId,
    },

    /// A fork group of a stateful spec has no trained member, or the train
    /// flow never closes into training sinks.
    #[error("no trainer for node {node} in the lowered flow")]
    MissingTrainer {
        /// A member of the trainer-less group (or the open train tail).
        node: NodeId,
    },

    /// A subscription would create a second trained member in a fork group.
    #[error("fork group {group} already has a trained member")]
    MultipleTrainers {
        /// The group whose trainer slot is taken.
        group: GroupId,
    },

    /// Failure raised by the actor specification layer.
    #[error(transparent)]
    Task(#[from] TaskError),
}

impl FlowError {
    /// True for the wiring errors reported by `subscribe` before any edge is
    /// installed.
    pub fn is_wiring(&self) -> bool {
        matches!(
            self,
            Self::SelfLoop { .. }
                | Self::AlreadyBound { .. }
                | Self::PortCollision { .. }
                | Self::TrainedPublisher { .. }
                | Self::ClosurePublishing { .. }
                | Self::MultipleTrainers { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{NodeId, Port};

    #[test]
    fn test_error_messages_carry_context() {
        let err = FlowError::AlreadyBound {
            node: NodeId::testing(7),
            port: Port::Apply(2),
        };
        assert_eq!(err.to_string(), "input port apply(2) of node 7 is already bound");
    }

    #[test]
    fn test_wiring_classification() {
        assert!(FlowError::SelfLoop { node: NodeId::testing(0) }.is_wiring());
        assert!(!FlowError::CyclicGraph { node: NodeId::testing(0) }.is_wiring());
    }
}
