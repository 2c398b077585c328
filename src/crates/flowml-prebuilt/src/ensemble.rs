//! Stacked ensembling operator
//!
//! [`Stack`] wires a set of base estimators in parallel between the apply
//! flow and an aggregation node, and fans the train flow out into
//! fold-parallel trained instances of each base:
//!
//! ```text
//!   apply:  … ──▶ base₁ ──▶ ┌──────┐
//!           … ──▶ base₂ ──▶ │ agg  │ ──▶ …
//!                           └──────┘
//!   train:  tap ──(train)──▶ base₁·fold₀*  base₁·fold₁*
//!               ──(train)──▶ base₂·fold₀*  base₂·fold₁*
//!   (* = trained sink; fold₀ shares its base's fork group)
//! ```
//!
//! Fold 0 of every base is a fork of the apply-side worker, so the state it
//! acquires in training is the state the apply graph runs with. Further
//! folds are fresh single-member fork groups: independently trained
//! instances whose role is confined to the train graph. The train flow
//! closes into the fold sinks (a Closure); the apply flow stays a Channel
//! ending at the aggregator.
//!
//! The aggregator spec is typically stateless (an averaging combiner). A
//! stateful aggregator gets a trained fork of its own, the same way a
//! consumer would.

use std::sync::Arc;

use flowml_core::{Flow, Operator, Port, Result, Spec, Trunk};

/// Fold-parallel stacking of base estimators under an aggregation node.
#[derive(Debug, Clone)]
pub struct Stack {
    bases: Vec<Arc<Spec>>,
    folds: usize,
    aggregator: Arc<Spec>,
}

impl Stack {
    /// Stack the given bases over `folds` training folds, combining their
    /// apply outputs through the aggregator spec.
    ///
    /// # Panics
    ///
    /// Panics when `bases` is empty or `folds` is zero.
    pub fn new(bases: Vec<Arc<Spec>>, folds: usize, aggregator: Arc<Spec>) -> Self {
        assert!(!bases.is_empty(), "stacking requires at least one base");
        assert!(folds >= 1, "stacking requires at least one fold");
        Self {
            bases,
            folds,
            aggregator,
        }
    }
}

impl Operator for Stack {
    fn compose(&self, flow: &mut Flow, left: Trunk) -> Result<Trunk> {
        let features = left.train.publisher(flow);
        let labels = left.label.publisher(flow);
        let source = left.apply.publisher(flow);

        let merger = flow.worker(self.aggregator.clone(), self.bases.len(), 1);
        for (slot, base) in self.bases.iter().enumerate() {
            let apply = flow.worker(base.clone(), 1, 1);
            flow.subscribe(source, apply, Port::Apply(0))?;
            flow.subscribe(flow.output(apply, 0), merger, Port::Apply(slot))?;
            for fold in 0..self.folds {
                let learner = if fold == 0 {
                    flow.fork(apply)?
                } else {
                    flow.worker(base.clone(), 1, 1)
                };
                flow.train(learner, features, labels)?;
            }
        }
        if self.aggregator.stateful() {
            let trainer = flow.fork(merger)?;
            flow.train(trainer, features, labels)?;
        }
        tracing::debug!(
            bases = self.bases.len(),
            folds = self.folds,
            aggregator = self.aggregator.name(),
            "stacking ensemble wired"
        );

        Ok(Trunk::from_paths(
            left.apply.extend(flow, None, Some(merger))?,
            left.train.extend(flow, None, None)?,
            left.label.extend(flow, None, None)?,
        ))
    }
}
