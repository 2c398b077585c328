//! Single-actor operator families: Mapper, Consumer, Labeler
//!
//! These operators wrap one actor spec each and differ only in how they wire
//! its forks into the trunk:
//!
//! - [`Mapper`] transforms both the apply and the train flow; a stateful
//!   mapper additionally emits a trained sink so all forks share one state
//! - [`Consumer`] is the terminal estimator: it extends the apply flow and
//!   trains a fork, leaving the train flow closed
//! - [`Labeler`] splits the label signal off the train flow through an
//!   extractor actor
//!
//! ```text
//!             Mapper(f)                       Consumer(g)
//!   apply:  … ──▶ f₁ ──▶ …          apply:  … ──▶ g₁
//!   train:  … ──▶ f₂ ──▶ …          train:  … ──(train)──▶ g₂*
//!            └──(train)──▶ f₃*      label:  … ──(label)──▶ g₂*
//!   (f₁ f₂ f₃ share one fork group, * = trained sink)
//! ```

use std::sync::Arc;

use flowml_core::task::TaskError;
use flowml_core::{Flow, Operator, Path, Result, Spec, Trunk};

/// Stateless or stateful single-actor transformer.
///
/// `compose` forks the worker for each flow it participates in: one fork on
/// the apply path, one on the train path (so downstream stages see
/// transformed training data), and for stateful specs a third, trained from
/// the incoming train and label publishers. All forks share the spec's fork
/// group, so the state acquired in training drives the apply fork too.
#[derive(Debug, Clone)]
pub struct Mapper {
    spec: Arc<Spec>,
}

impl Mapper {
    /// Mapper over the given actor spec.
    pub fn new(spec: Arc<Spec>) -> Self {
        Self { spec }
    }
}

impl Operator for Mapper {
    fn compose(&self, flow: &mut Flow, left: Trunk) -> Result<Trunk> {
        let apply = flow.worker(self.spec.clone(), 1, 1);
        let train = flow.fork(apply)?;
        if self.spec.stateful() {
            let trainer = flow.fork(apply)?;
            let features = left.train.publisher(flow);
            let labels = left.label.publisher(flow);
            flow.train(trainer, features, labels)?;
        }
        let apply = Path::new(flow, apply, None)?;
        let train = Path::new(flow, train, None)?;
        left.extend(flow, Some(apply), Some(train), None)
    }
}

/// Terminal estimator.
///
/// Extends the apply flow with a fresh worker and trains a fork of it from
/// the incoming train and label publishers. The train flow is left where it
/// was and closes into the trained sink. Requires a stateful spec; composing
/// a stateless one fails with [`TaskError::NotTrainable`].
#[derive(Debug, Clone)]
pub struct Consumer {
    spec: Arc<Spec>,
}

impl Consumer {
    /// Consumer over the given actor spec.
    pub fn new(spec: Arc<Spec>) -> Self {
        Self { spec }
    }
}

impl Operator for Consumer {
    fn compose(&self, flow: &mut Flow, left: Trunk) -> Result<Trunk> {
        if !self.spec.stateful() {
            return Err(TaskError::NotTrainable.into());
        }
        let apply = flow.worker(self.spec.clone(), 1, 1);
        let trainer = flow.fork(apply)?;
        let features = left.train.publisher(flow);
        let labels = left.label.publisher(flow);
        flow.train(trainer, features, labels)?;
        let path = Path::new(flow, apply, None)?;
        left.extend(flow, Some(path), None, None)
    }
}

/// Label extraction operator.
///
/// The label flow carries the same upstream signal as the train flow until a
/// labeler differentiates them: the extractor worker is appended to the
/// label path, so later stages receive their training targets from its
/// output while the feature flow continues unchanged.
#[derive(Debug, Clone)]
pub struct Labeler {
    spec: Arc<Spec>,
}

impl Labeler {
    /// Labeler over the given extractor spec.
    pub fn new(spec: Arc<Spec>) -> Self {
        Self { spec }
    }
}

impl Operator for Labeler {
    fn compose(&self, flow: &mut Flow, left: Trunk) -> Result<Trunk> {
        let extractor = flow.worker(self.spec.clone(), 1, 1);
        let path = Path::new(flow, extractor, None)?;
        let label = left.label.extend(flow, Some(&path), None)?;
        Ok(left.replace(None, None, Some(label)))
    }
}
