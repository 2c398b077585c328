//! Integration tests for composition and lowering
//!
//! These tests drive the full compile path - operator expressions, trunk
//! threading, lowering validation and the frozen runner surface - through
//! locally defined operator stages.

use std::sync::Arc;

use flowml_core::task::{Params, Spec, TaskError};
use flowml_core::{Chain, Composable, Flow, Operator, Path, Pipeline, Port, Result, Trunk};
use proptest::prelude::*;

fn spec(name: &str, stateful: bool) -> Arc<Spec> {
    Arc::new(Spec::new(
        name,
        stateful,
        Params::new(),
        Arc::new(|_| Err(TaskError::NotTrainable)),
    ))
}

/// Stateful single-actor transformer stage: apply fork, train-side fork and a
/// trained sink sharing one fork group.
struct Transform(Arc<Spec>);

impl Transform {
    fn new(name: &str) -> Self {
        Self(spec(name, true))
    }
}

impl Operator for Transform {
    fn compose(&self, flow: &mut Flow, left: Trunk) -> Result<Trunk> {
        let apply = flow.worker(self.0.clone(), 1, 1);
        let train = flow.fork(apply)?;
        let trainer = flow.fork(apply)?;
        let features = left.train.publisher(flow);
        let labels = left.label.publisher(flow);
        flow.train(trainer, features, labels)?;
        let apply = Path::new(flow, apply, None)?;
        let train = Path::new(flow, train, None)?;
        left.extend(flow, Some(apply), Some(train), None)
    }
}

/// Stateless passthrough stage touching only the data flows.
struct Passthrough(Arc<Spec>);

impl Passthrough {
    fn new(name: &str) -> Self {
        Self(spec(name, false))
    }
}

impl Operator for Passthrough {
    fn compose(&self, flow: &mut Flow, left: Trunk) -> Result<Trunk> {
        let apply = flow.worker(self.0.clone(), 1, 1);
        let train = flow.fork(apply)?;
        let apply = Path::new(flow, apply, None)?;
        let train = Path::new(flow, train, None)?;
        left.extend(flow, Some(apply), Some(train), None)
    }
}

/// Terminal estimator stage.
struct Estimate(Arc<Spec>);

impl Estimate {
    fn new(name: &str) -> Self {
        Self(spec(name, true))
    }
}

impl Operator for Estimate {
    fn compose(&self, flow: &mut Flow, left: Trunk) -> Result<Trunk> {
        let apply = flow.worker(self.0.clone(), 1, 1);
        let trainer = flow.fork(apply)?;
        let features = left.train.publisher(flow);
        let labels = left.label.publisher(flow);
        flow.train(trainer, features, labels)?;
        let path = Path::new(flow, apply, None)?;
        left.extend(flow, Some(path), None, None)
    }
}

/// Shape signature of a compiled pipeline, session identity stripped.
fn shape(pipeline: &Pipeline) -> serde_json::Value {
    let mut snapshot = pipeline.describe();
    snapshot.as_object_mut().unwrap().remove("session");
    snapshot
}

#[test]
fn test_transform_then_estimate_builds_parallel_graphs() {
    let expression = Composable::new(Transform::new("imputer")) >> Estimate::new("model");
    let pipeline = Pipeline::compile(&expression).unwrap();

    // Apply graph: entry future, imputer fork, model fork.
    assert_eq!(pipeline.apply_nodes().len(), 3);
    for &node in pipeline.apply_nodes() {
        assert!(!pipeline.node(node).trained());
    }

    // Train graph: feature and label taps, the train-side imputer fork and
    // the two trained sinks.
    assert_eq!(pipeline.train_nodes().len(), 5);
    let trained: Vec<_> = pipeline
        .train_nodes()
        .iter()
        .filter(|&&node| pipeline.node(node).trained())
        .collect();
    assert_eq!(trained.len(), 2);

    // Both variants of the transformer share one fork group; the estimator
    // keeps its own.
    let groups: std::collections::BTreeSet<_> = pipeline
        .apply_nodes()
        .iter()
        .chain(pipeline.train_nodes())
        .filter_map(|&node| pipeline.node(node).group())
        .collect();
    assert_eq!(groups.len(), 2);
    for &group in &groups {
        assert!(pipeline.flow().group_trainer(group).is_some());
    }
}

#[test]
fn test_downstream_stage_trains_on_transformed_features() {
    let expression = Composable::new(Transform::new("imputer")) >> Estimate::new("model");
    let pipeline = Pipeline::compile(&expression).unwrap();

    // The estimator's Train input must come from the imputer's train-side
    // fork, not from the raw feature tap.
    let estimator_trainer = *pipeline
        .train_nodes()
        .iter()
        .find(|&&node| {
            pipeline.node(node).trained()
                && pipeline.node(node).spec().map(|s| s.name()) == Some("model")
        })
        .unwrap();
    let feeder = pipeline
        .train_nodes()
        .iter()
        .find(|&&node| {
            pipeline
                .node(node)
                .subscriptions(0)
                .iter()
                .any(|s| s.node == estimator_trainer && s.port == Port::Train)
        })
        .copied()
        .unwrap();
    assert_eq!(pipeline.node(feeder).spec().map(|s| s.name()), Some("imputer"));
    assert!(!pipeline.node(feeder).trained());
}

#[test]
fn test_composition_is_associative_in_shape() {
    let flat = Composable::new(Passthrough::new("a"))
        >> Passthrough::new("b")
        >> Estimate::new("c");
    let nested = Composable::new(Chain::new(
        Passthrough::new("a"),
        Chain::new(Passthrough::new("b"), Estimate::new("c")),
    ));

    let left = Pipeline::compile(&flat).unwrap();
    let right = Pipeline::compile(&nested).unwrap();
    assert_eq!(shape(&left), shape(&right));
}

#[test]
fn test_compilation_is_deterministic() {
    let expression = Composable::new(Transform::new("imputer"))
        >> Passthrough::new("scale")
        >> Estimate::new("model");
    let first = Pipeline::compile(&expression).unwrap();
    let second = Pipeline::compile(&expression).unwrap();
    assert_eq!(shape(&first), shape(&second));
    assert_eq!(first.apply_nodes(), second.apply_nodes());
    assert_eq!(first.train_nodes(), second.train_nodes());
}

#[test]
fn test_single_publisher_per_input_port() {
    let expression = Composable::new(Transform::new("imputer"))
        >> Passthrough::new("scale")
        >> Estimate::new("model");
    let pipeline = Pipeline::compile(&expression).unwrap();

    let flow = pipeline.flow();
    let mut incoming: std::collections::HashMap<(flowml_core::NodeId, Port), usize> =
        std::collections::HashMap::new();
    for id in flow.node_ids() {
        for (_, subs) in flow.node(id).outputs() {
            for sub in subs {
                *incoming.entry((sub.node, sub.port)).or_default() += 1;
            }
        }
    }
    assert!(incoming.values().all(|&count| count == 1));
}

#[test]
fn test_train_inputs_come_paired() {
    let expression = Composable::new(Transform::new("imputer")) >> Estimate::new("model");
    let pipeline = Pipeline::compile(&expression).unwrap();
    for &node in pipeline.train_nodes() {
        let data = pipeline.node(node);
        assert_eq!(
            data.input_ports().contains(&Port::Train),
            data.input_ports().contains(&Port::Label),
        );
    }
}

proptest! {
    #[test]
    fn prop_chains_compile_with_linear_apply_graphs(mappers in 0usize..6) {
        let mut expression = Composable::new(Passthrough::new("stage"));
        for _ in 0..mappers {
            expression = expression >> Passthrough::new("stage");
        }
        let expression = expression >> Estimate::new("model");

        let pipeline = Pipeline::compile(&expression).unwrap();
        // Entry future, one fork per passthrough, the estimator fork.
        prop_assert_eq!(pipeline.apply_nodes().len(), mappers + 3);
        // Every apply node except the tail publishes to exactly one successor.
        for &node in &pipeline.apply_nodes()[..pipeline.apply_nodes().len() - 1] {
            prop_assert_eq!(pipeline.node(node).subscriptions(0).len(), 1);
        }
    }
}
