//! # flowml-core - Dataflow Graph Compiler for ML Pipelines
//!
//! **The compilation core of flowml**: a layer that takes a user-composed
//! expression of pipeline operators (chained with `>>`) and lowers it into a
//! directed acyclic graph of workers connected through typed ports, split
//! into two parallel sub-graphs - one training the stateful workers, one
//! applying them.
//!
//! ## Overview
//!
//! The crate is layered bottom-up:
//!
//! - **Ports & subscriptions** ([`graph`]) - typed connection points and
//!   directed edges; a single validated `subscribe` primitive mutates the
//!   graph
//! - **Nodes** ([`graph`]) - workers bound to opaque actor specs, and future
//!   placeholders that dissolve during composition
//! - **Fork groups** ([`graph`]) - coherence classes of forked copies of one
//!   logical worker, with at most one trained member
//! - **Traversal** ([`traversal`]) - cycle-detecting walks, terminal
//!   resolution, exhaustive visitation and structural copy
//! - **Paths** ([`path`]) - head/tail-anchored sub-graphs, discriminated as
//!   data-passing *Channels* or training-closed *Closures*
//! - **Trunks & operators** ([`trunk`], [`compose`]) - the path triple
//!   threaded through composition, and the `compose` contract
//! - **Lowering** ([`pipeline`]) - validation and freezing into the
//!   apply/train graph pair a runner consumes
//!
//! Actor specifications live in [`task`]; diagram rendering in
//! [`visualization`].
//!
//! ## Compilation Flow
//!
//! ```text
//!  operator expression          trunk threading              frozen pair
//!  ───────────────────    ──────────────────────────    ──────────────────
//!  A >> B >> C            A.compose -> B.compose -> …   ┌─ apply graph ──┐
//!                         each stage wires fresh        │ Future→a→b→c   │
//!                         workers against the           └────────────────┘
//!                         (apply, train, label)         ┌─ train graph ──┐
//!                         publishers of its left        │ taps → trained │
//!                         trunk                         │ worker sinks   │
//!                                                       └────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use flowml_core::{Flow, Operator, Path, Pipeline, Result, Trunk};
//! use flowml_core::task::{Params, Spec};
//! use std::sync::Arc;
//!
//! /// A terminal estimator stage: one apply worker, one trained fork.
//! struct Estimator(Arc<Spec>);
//!
//! impl Operator for Estimator {
//!     fn compose(&self, flow: &mut Flow, left: Trunk) -> Result<Trunk> {
//!         let apply = flow.worker(self.0.clone(), 1, 1);
//!         let trainer = flow.fork(apply)?;
//!         let features = left.train.publisher(flow);
//!         let labels = left.label.publisher(flow);
//!         flow.train(trainer, features, labels)?;
//!         let path = Path::new(flow, apply, None)?;
//!         left.extend(flow, Some(path), None, None)
//!     }
//! }
//!
//! # fn spec() -> Arc<Spec> {
//! #     Arc::new(Spec::new("model", true, Params::new(), Arc::new(|_| unimplemented!())))
//! # }
//! let pipeline = Pipeline::compile(&Estimator(spec()))?;
//! assert!(pipeline.apply().is_channel());
//! assert!(pipeline.train().is_closure());
//! # Ok::<(), flowml_core::FlowError>(())
//! ```
//!
//! ## Guarantees
//!
//! - **Determinism**: the same expression lowers to structurally identical
//!   graphs - same nodes in the same order, same edge insertion order.
//! - **No partial construction**: every subscription validates before any
//!   edge is installed; a failed compose leaves nothing observable.
//! - **Frozen output**: the compiled [`Pipeline`] owns its arena, so the
//!   graphs a runner receives cannot be mutated afterwards.
//!
//! ## See Also
//!
//! - `flowml-prebuilt` - the built-in operator families (Mapper, Consumer,
//!   Labeler, Stack)

pub mod compose;
pub mod error;
pub mod graph;
pub mod path;
pub mod pipeline;
pub mod task;
pub mod traversal;
pub mod trunk;
pub mod visualization;

// Re-export main types
pub use compose::{Chain, Composable, Operator};
pub use error::{FlowError, Result};
pub use graph::{Flow, GroupId, Node, NodeId, Port, Publishable, Subscription};
pub use path::{Path, PathKind, Visitor};
pub use pipeline::Pipeline;
pub use task::{Actor, ActorFactory, MethodTable, Params, Spec, TaskError, Wrapped};
pub use traversal::Traversal;
pub use trunk::Trunk;
pub use visualization::{visualize, VisualizationFormat, VisualizationOptions};
