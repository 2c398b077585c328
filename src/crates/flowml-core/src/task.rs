//! Actor abstraction - the computational units behind graph workers
//!
//! The graph compiler never executes anything; it only wires *specifications*
//! of computational units into a dataflow topology. This module defines those
//! units and their specifications:
//!
//! - [`Actor`] - a stateful or stateless transformer with `train`/`apply`
//!   methods, a hyper-parameter round-trip and an opaque binary state blob
//! - [`Spec`] - an actor identity plus bound hyper-parameters, hashable by
//!   value; the only thing the graph core ever holds
//! - [`Wrapped`] / [`MethodTable`] - an adapter presenting third-party types
//!   (a `fit`/`transform` pair, say) under the actor interface through a
//!   per-type role table, with no runtime reflection
//!
//! # Statefulness
//!
//! An actor is *stateful* when it implements [`Actor::train`]. Stateful actors
//! acquire internal state during training and round-trip it through
//! [`Actor::get_state`]/[`Actor::set_state`] as a binary blob (the provided
//! adapters use `bincode`). Stateless actors keep the defaults: training
//! fails with [`TaskError::NotTrainable`] and the state blob is absent.
//!
//! # Examples
//!
//! Wrapping a foreign estimator type:
//!
//! ```rust
//! use flowml_core::task::{MethodTable, Params, TaskError, Wrapped};
//! use serde::{Deserialize, Serialize};
//! use serde_json::{json, Value};
//!
//! #[derive(Default, Serialize, Deserialize)]
//! struct Scaler {
//!     mean: f64,
//! }
//!
//! impl Scaler {
//!     fn fit(&mut self, features: &Value) -> Result<(), TaskError> {
//!         let values = features.as_array().ok_or_else(|| TaskError::apply("scaler", "expected array"))?;
//!         let sum: f64 = values.iter().filter_map(Value::as_f64).sum();
//!         self.mean = sum / values.len().max(1) as f64;
//!         Ok(())
//!     }
//!
//!     fn transform(&self, features: &Value) -> Value {
//!         json!(features
//!             .as_array()
//!             .map(|vs| vs.iter().filter_map(Value::as_f64).map(|v| v - self.mean).collect::<Vec<_>>())
//!             .unwrap_or_default())
//!     }
//! }
//!
//! static SCALER_TABLE: MethodTable<Scaler> = MethodTable {
//!     train: Some(|scaler, features, _labels| scaler.fit(&features)),
//!     apply: |scaler, mut inputs| Ok(scaler.transform(&inputs.remove(0))),
//!     get_params: |_| Params::new(),
//!     set_params: |_, _| Ok(()),
//! };
//!
//! let spec = Wrapped::spec("scaler", Params::new(), &SCALER_TABLE, |_| Ok(Scaler::default()));
//! assert!(spec.stateful());
//! ```

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Hyper-parameter map bound to an actor specification.
pub type Params = serde_json::Map<String, Value>;

/// Factory producing boxed actors from bound hyper-parameters.
pub type ActorFactory = Arc<dyn Fn(&Params) -> Result<Box<dyn Actor>, TaskError> + Send + Sync>;

/// Failures raised by actors and their specifications.
#[derive(Error, Debug)]
pub enum TaskError {
    /// `train` was called on a stateless actor.
    #[error("actor is not trainable")]
    NotTrainable,

    /// A hyper-parameter was rejected.
    #[error("invalid hyper-parameter '{name}': {reason}")]
    Params {
        /// Name of the rejected parameter.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// An actor failed while applying or training.
    #[error("actor '{actor}' failed: {reason}")]
    Apply {
        /// Actor identity.
        actor: String,
        /// Failure description.
        reason: String,
    },

    /// The binary state blob could not be encoded or decoded.
    #[error("actor state codec failure: {0}")]
    State(#[from] bincode::Error),
}

impl TaskError {
    /// Shorthand for an actor-level failure with context.
    pub fn apply(actor: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Apply {
            actor: actor.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a rejected hyper-parameter.
    pub fn params(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Params {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

impl PartialEq for TaskError {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}

impl Eq for TaskError {}

impl Clone for TaskError {
    fn clone(&self) -> Self {
        match self {
            Self::NotTrainable => Self::NotTrainable,
            Self::Params { name, reason } => Self::params(name.clone(), reason.clone()),
            Self::Apply { actor, reason } => Self::apply(actor.clone(), reason.clone()),
            Self::State(err) => Self::apply("state codec", err.to_string()),
        }
    }
}

/// A computational unit wired into the flow graph by a worker node.
///
/// Runners instantiate actors from their [`Spec`] handles and drive them with
/// the payload rows flowing through the compiled graph. The compiler itself
/// only cares about the spec identity and statefulness.
pub trait Actor: Send {
    /// Pass the inputs through the transformation (one value per apply input
    /// port, in port order).
    fn apply(&mut self, inputs: Vec<Value>) -> Result<Value, TaskError>;

    /// Train the actor on the given features and labels.
    ///
    /// The default marks the actor stateless.
    fn train(&mut self, _features: Value, _labels: Value) -> Result<(), TaskError> {
        Err(TaskError::NotTrainable)
    }

    /// Whether the actor acquires state through training.
    fn stateful(&self) -> bool {
        false
    }

    /// Current hyper-parameters.
    fn get_params(&self) -> Params {
        Params::new()
    }

    /// Replace hyper-parameters.
    fn set_params(&mut self, _params: Params) -> Result<(), TaskError> {
        Ok(())
    }

    /// Internal state as an opaque binary blob, `None` for stateless actors.
    fn get_state(&self) -> Result<Option<Vec<u8>>, TaskError> {
        Ok(None)
    }

    /// Restore internal state from a blob produced by [`Actor::get_state`].
    fn set_state(&mut self, _state: &[u8]) -> Result<(), TaskError> {
        Ok(())
    }
}

/// An actor identity with bound hyper-parameters.
///
/// Specs are the opaque handles carried by worker nodes. Two specs compare
/// equal (and hash alike) when their name and hyper-parameters match; the
/// factory is excluded from identity.
///
/// # Examples
///
/// ```rust
/// use flowml_core::task::{Actor, Params, Spec, TaskError};
/// use serde_json::Value;
/// use std::sync::Arc;
///
/// struct Echo;
///
/// impl Actor for Echo {
///     fn apply(&mut self, mut inputs: Vec<Value>) -> Result<Value, TaskError> {
///         Ok(inputs.remove(0))
///     }
/// }
///
/// let spec = Spec::new("echo", false, Params::new(), Arc::new(|_| Ok(Box::new(Echo))));
/// assert!(!spec.stateful());
/// assert!(spec.build().is_ok());
/// ```
#[derive(Clone)]
pub struct Spec {
    name: String,
    params: Params,
    stateful: bool,
    factory: ActorFactory,
}

impl Spec {
    /// Bind an actor factory under a name with its hyper-parameters.
    pub fn new(name: impl Into<String>, stateful: bool, params: Params, factory: ActorFactory) -> Self {
        Self {
            name: name.into(),
            params,
            stateful,
            factory,
        }
    }

    /// Actor identity.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bound hyper-parameters.
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Whether workers carrying this spec need a trainer in the lowered flow.
    pub fn stateful(&self) -> bool {
        self.stateful
    }

    /// Instantiate the actor with the bound hyper-parameters.
    pub fn build(&self) -> Result<Box<dyn Actor>, TaskError> {
        (self.factory)(&self.params)
    }
}

impl fmt::Debug for Spec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Spec")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("stateful", &self.stateful)
            .field("factory", &"<function>")
            .finish()
    }
}

impl PartialEq for Spec {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.params == other.params
    }
}

impl Eq for Spec {}

impl Hash for Spec {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        let params = serde_json::to_string(&self.params).expect("hyper-parameters are JSON values");
        params.hash(state);
    }
}

/// Role bindings presenting a third-party type's inherent methods as actor
/// methods.
///
/// One static table per wrapped type enumerates how each actor role maps onto
/// the type: `train` is optional (absence makes the wrapped actor stateless),
/// the rest are mandatory. [`Wrapped`] dispatches through the table.
pub struct MethodTable<T> {
    /// Training role, e.g. a `fit` method. `None` for stateless types.
    pub train: Option<fn(&mut T, Value, Value) -> Result<(), TaskError>>,
    /// Application role, e.g. a `transform` or `predict` method.
    pub apply: fn(&mut T, Vec<Value>) -> Result<Value, TaskError>,
    /// Hyper-parameter read-out.
    pub get_params: fn(&T) -> Params,
    /// Hyper-parameter update.
    pub set_params: fn(&mut T, Params) -> Result<(), TaskError>,
}

/// Adapter running a third-party type behind the [`Actor`] interface.
///
/// The wrapped value is serialized wholesale as the actor state blob, so the
/// type must be `Serialize + DeserializeOwned`.
pub struct Wrapped<T: 'static> {
    inner: T,
    table: &'static MethodTable<T>,
}

impl<T> Wrapped<T> {
    /// Wrap a value with its role table.
    pub fn new(inner: T, table: &'static MethodTable<T>) -> Self {
        Self { inner, table }
    }

    /// The wrapped value.
    pub fn inner(&self) -> &T {
        &self.inner
    }
}

impl<T> Wrapped<T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    /// Build a [`Spec`] whose factory constructs the wrapped actor.
    ///
    /// Statefulness derives from the presence of the `train` binding in the
    /// table.
    pub fn spec(
        name: impl Into<String>,
        params: Params,
        table: &'static MethodTable<T>,
        build: fn(&Params) -> Result<T, TaskError>,
    ) -> Spec {
        let stateful = table.train.is_some();
        Spec::new(
            name,
            stateful,
            params,
            Arc::new(move |params| Ok(Box::new(Wrapped::new(build(params)?, table)) as Box<dyn Actor>)),
        )
    }
}

impl<T> Actor for Wrapped<T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    fn apply(&mut self, inputs: Vec<Value>) -> Result<Value, TaskError> {
        (self.table.apply)(&mut self.inner, inputs)
    }

    fn train(&mut self, features: Value, labels: Value) -> Result<(), TaskError> {
        let train = self.table.train.ok_or(TaskError::NotTrainable)?;
        train(&mut self.inner, features, labels)
    }

    fn stateful(&self) -> bool {
        self.table.train.is_some()
    }

    fn get_params(&self) -> Params {
        (self.table.get_params)(&self.inner)
    }

    fn set_params(&mut self, params: Params) -> Result<(), TaskError> {
        (self.table.set_params)(&mut self.inner, params)
    }

    fn get_state(&self) -> Result<Option<Vec<u8>>, TaskError> {
        if !self.stateful() {
            return Ok(None);
        }
        Ok(Some(bincode::serialize(&self.inner)?))
    }

    fn set_state(&mut self, state: &[u8]) -> Result<(), TaskError> {
        self.inner = bincode::deserialize(state)?;
        Ok(())
    }
}
