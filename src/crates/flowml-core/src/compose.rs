//! Operator composition: `left >> right` over trunks
//!
//! An [`Operator`] is anything that, given the left trunk, emits fresh graph
//! fragments and returns a new trunk. Binary composition is pure function
//! composition over that contract: `(a >> b).compose(flow, trunk)` is
//! `b.compose(flow, a.compose(flow, trunk))`.
//!
//! The same operator value may appear several times in one expression; each
//! `compose` call allocates fresh nodes, so reuse multiplies structure
//! instead of aliasing it. Cycle detection therefore lives in the graph
//! traversal, not in the operator expression.
//!
//! # Examples
//!
//! ```rust,ignore
//! let expression = Composable::new(Labeler::new(labels))
//!     >> Mapper::new(imputer)
//!     >> Consumer::new(model);
//! let pipeline = Pipeline::compile(&expression)?;
//! ```

use std::ops::Shr;

use crate::error::Result;
use crate::graph::Flow;
use crate::trunk::Trunk;

/// A composable pipeline stage.
pub trait Operator {
    /// Emit this operator's fragment against the left trunk and return the
    /// extended trunk.
    ///
    /// Implementations allocate fresh nodes on every call.
    fn compose(&self, flow: &mut Flow, left: Trunk) -> Result<Trunk>;
}

/// Sequential composition of two operators.
#[derive(Debug)]
pub struct Chain<L, R> {
    left: L,
    right: R,
}

impl<L: Operator, R: Operator> Chain<L, R> {
    /// Compose `left` before `right`.
    pub fn new(left: L, right: R) -> Self {
        Self { left, right }
    }
}

impl<L: Operator, R: Operator> Operator for Chain<L, R> {
    fn compose(&self, flow: &mut Flow, left: Trunk) -> Result<Trunk> {
        let middle = self.left.compose(flow, left)?;
        self.right.compose(flow, middle)
    }
}

/// A boxed operator expression supporting the `>>` composition notation.
///
/// Wrap the leftmost stage once; every further stage chains on with plain
/// `>>`:
///
/// ```rust
/// use flowml_core::compose::{Composable, Operator};
/// use flowml_core::error::Result;
/// use flowml_core::graph::Flow;
/// use flowml_core::trunk::Trunk;
///
/// struct Nop;
///
/// impl Operator for Nop {
///     fn compose(&self, _flow: &mut Flow, left: Trunk) -> Result<Trunk> {
///         Ok(left)
///     }
/// }
///
/// let expression = Composable::new(Nop) >> Nop >> Nop;
/// let mut flow = Flow::new();
/// let trunk = Trunk::new(&mut flow).unwrap();
/// assert!(expression.compose(&mut flow, trunk).is_ok());
/// ```
pub struct Composable(Box<dyn Operator>);

impl Composable {
    /// Box an operator into a composable expression.
    pub fn new(operator: impl Operator + 'static) -> Self {
        Self(Box::new(operator))
    }
}

impl Operator for Composable {
    fn compose(&self, flow: &mut Flow, left: Trunk) -> Result<Trunk> {
        self.0.compose(flow, left)
    }
}

impl<R: Operator + 'static> Shr<R> for Composable {
    type Output = Composable;

    fn shr(self, right: R) -> Composable {
        Composable::new(Chain::new(self, right))
    }
}
