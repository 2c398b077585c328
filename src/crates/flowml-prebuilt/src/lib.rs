//! # flowml-prebuilt - Built-in Operator Families
//!
//! **Ready-to-compose pipeline stages** over the `flowml-core` compiler:
//!
//! - **[`Mapper`](simple::Mapper)** - stateless or stateful single-actor
//!   transformer, forked across the apply and train flows
//! - **[`Consumer`](simple::Consumer)** - terminal estimator with a trained
//!   fork
//! - **[`Labeler`](simple::Labeler)** - splits the training targets off the
//!   label flow through an extractor actor
//! - **[`Stack`](ensemble::Stack)** - fold-parallel stacked ensembling under
//!   an aggregation node
//!
//! Use these when a pipeline stage is one actor wired in a standard shape;
//! drop down to `flowml_core::Operator` when it is not.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use flowml_core::{Composable, Pipeline};
//! use flowml_prebuilt::{Consumer, Labeler, Mapper, Stack};
//!
//! let expression = Composable::new(Labeler::new(label_extractor))
//!     >> Mapper::new(imputer)
//!     >> Stack::new(vec![gradient, forest], 2, mean)
//!     >> Consumer::new(regression);
//!
//! let pipeline = Pipeline::compile(&expression)?;
//! let options = flowml_core::VisualizationOptions::dot();
//! println!("{}", flowml_core::visualize(&pipeline, &options));
//! ```

pub mod ensemble;
pub mod simple;

pub use ensemble::Stack;
pub use simple::{Consumer, Labeler, Mapper};
