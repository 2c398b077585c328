//! Trunks: the path triple threaded through operator composition
//!
//! A [`Trunk`] bundles the three data flows a pipeline stage exposes: the
//! apply-time path, the train-time feature path and the train-time label
//! path. Operators receive the left trunk, wire fresh nodes against its
//! publishers, and hand back a new trunk; the triple is what makes the two
//! parallel graphs (train and apply) fall out of a single composition pass.
//!
//! A fresh trunk is three unresolved futures, one per flow, which later
//! dissolve into whatever the runner feeds the compiled graphs.

use crate::error::Result;
use crate::graph::Flow;
use crate::path::Path;

/// The three paths of one compositional unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trunk {
    /// Apply-time data path.
    pub apply: Path,
    /// Train-time feature path.
    pub train: Path,
    /// Train-time label path.
    pub label: Path,
}

impl Trunk {
    /// A fresh trunk of three future placeholders.
    pub fn new(flow: &mut Flow) -> Result<Self> {
        let apply = flow.future();
        let train = flow.future();
        let label = flow.future();
        Ok(Self {
            apply: Path::new(flow, apply, None)?,
            train: Path::new(flow, train, None)?,
            label: Path::new(flow, label, None)?,
        })
    }

    /// Assemble a trunk from explicit paths.
    pub fn from_paths(apply: Path, train: Path, label: Path) -> Self {
        Self { apply, train, label }
    }

    /// Extend each constituent path with the given continuation, retracing
    /// the ones left out.
    ///
    /// Retracing a closure is the documented no-op, so trunks whose train or
    /// label flow has already closed pass through unchanged.
    pub fn extend(
        &self,
        flow: &mut Flow,
        apply: Option<Path>,
        train: Option<Path>,
        label: Option<Path>,
    ) -> Result<Trunk> {
        Ok(Trunk {
            apply: self.apply.extend(flow, apply.as_ref(), None)?,
            train: self.train.extend(flow, train.as_ref(), None)?,
            label: self.label.extend(flow, label.as_ref(), None)?,
        })
    }

    /// Replace the named paths wholesale, keeping the rest.
    pub fn replace(&self, apply: Option<Path>, train: Option<Path>, label: Option<Path>) -> Trunk {
        Trunk {
            apply: apply.unwrap_or_else(|| self.apply.clone()),
            train: train.unwrap_or_else(|| self.train.clone()),
            label: label.unwrap_or_else(|| self.label.clone()),
        }
    }

    /// Structurally copy all three paths.
    pub fn copy(&self, flow: &mut Flow) -> Result<Trunk> {
        Ok(Trunk {
            apply: self.apply.copy(flow)?,
            train: self.train.copy(flow)?,
            label: self.label.copy(flow)?,
        })
    }
}
