//! End-to-end pipeline scenarios over the built-in operator families
//!
//! The actors here are real wrapped implementations, so these tests cover
//! the whole surface a project touches: spec construction, operator
//! composition, lowering, the frozen runner views and actor round trips.

use std::collections::BTreeSet;
use std::sync::Arc;

use flowml_core::task::{MethodTable, Params, TaskError, Wrapped};
use flowml_core::{Composable, FlowError, NodeId, Pipeline, Port, Spec};
use flowml_prebuilt::{Consumer, Labeler, Mapper, Stack};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

fn numbers(value: &Value) -> Vec<f64> {
    value
        .as_array()
        .map(|vs| vs.iter().filter_map(Value::as_f64).collect())
        .unwrap_or_default()
}

#[derive(Default, Serialize, Deserialize)]
struct Imputer {
    fill: f64,
}

static IMPUTER: MethodTable<Imputer> = MethodTable {
    train: Some(|actor, features, _labels| {
        let values = numbers(&features);
        actor.fill = values.iter().sum::<f64>() / values.len().max(1) as f64;
        Ok(())
    }),
    apply: |actor, mut inputs| {
        let filled: Vec<f64> = inputs
            .remove(0)
            .as_array()
            .map(|vs| vs.iter().map(|v| v.as_f64().unwrap_or(actor.fill)).collect())
            .unwrap_or_default();
        Ok(json!(filled))
    },
    get_params: |_| Params::new(),
    set_params: |_, _| Ok(()),
};

#[derive(Default, Serialize, Deserialize)]
struct Threshold {
    cut: f64,
}

static THRESHOLD: MethodTable<Threshold> = MethodTable {
    train: Some(|actor, _features, labels| {
        let values = numbers(&labels);
        actor.cut = values.iter().sum::<f64>() / values.len().max(1) as f64;
        Ok(())
    }),
    apply: |actor, mut inputs| {
        let flags: Vec<f64> = numbers(&inputs.remove(0))
            .into_iter()
            .map(|v| if v >= actor.cut { 1.0 } else { 0.0 })
            .collect();
        Ok(json!(flags))
    },
    get_params: |_| Params::new(),
    set_params: |_, _| Ok(()),
};

#[derive(Default, Serialize, Deserialize)]
struct ColumnPicker {
    column: String,
}

static COLUMN_PICKER: MethodTable<ColumnPicker> = MethodTable {
    train: None,
    apply: |actor, mut inputs| {
        let picked: Vec<Value> = inputs
            .remove(0)
            .as_array()
            .map(|rows| rows.iter().map(|row| row[&actor.column].clone()).collect())
            .unwrap_or_default();
        Ok(json!(picked))
    },
    get_params: |actor| {
        let mut params = Params::new();
        params.insert("column".into(), json!(actor.column));
        params
    },
    set_params: |actor, params| {
        if let Some(column) = params.get("column").and_then(Value::as_str) {
            actor.column = column.to_string();
        }
        Ok(())
    },
};

#[derive(Default, Serialize, Deserialize)]
struct Mean;

static MEAN: MethodTable<Mean> = MethodTable {
    train: None,
    apply: |_, inputs| {
        let columns: Vec<Vec<f64>> = inputs.iter().map(numbers).collect();
        let rows = columns.iter().map(Vec::len).max().unwrap_or(0);
        let averaged: Vec<f64> = (0..rows)
            .map(|row| {
                let values: Vec<f64> = columns.iter().filter_map(|c| c.get(row).copied()).collect();
                values.iter().sum::<f64>() / values.len().max(1) as f64
            })
            .collect();
        Ok(json!(averaged))
    },
    get_params: |_| Params::new(),
    set_params: |_, _| Ok(()),
};

fn imputer() -> Arc<Spec> {
    Arc::new(Wrapped::spec("imputer", Params::new(), &IMPUTER, |_| Ok(Imputer::default())))
}

fn model(name: &str) -> Arc<Spec> {
    Arc::new(Wrapped::spec(name, Params::new(), &THRESHOLD, |_| Ok(Threshold::default())))
}

fn label_picker(column: &str) -> Arc<Spec> {
    let mut params = Params::new();
    params.insert("column".into(), json!(column));
    Arc::new(Wrapped::spec("labels", params, &COLUMN_PICKER, |params| {
        let column = params
            .get("column")
            .and_then(Value::as_str)
            .ok_or_else(|| TaskError::params("column", "missing"))?;
        Ok(ColumnPicker { column: column.to_string() })
    }))
}

fn mean() -> Arc<Spec> {
    Arc::new(Wrapped::spec("mean", Params::new(), &MEAN, |_| Ok(Mean)))
}

fn name_of(pipeline: &Pipeline, node: NodeId) -> Option<&str> {
    pipeline.node(node).spec().map(|spec| spec.name())
}

#[test]
fn test_labeled_transform_and_estimate_pipeline() {
    let expression = Composable::new(Labeler::new(label_picker("y")))
        >> Mapper::new(imputer())
        >> Consumer::new(model("model"));
    let pipeline = Pipeline::compile(&expression).unwrap();

    // Apply graph: entry future feeding the imputer fork feeding the model
    // fork, nothing trained.
    let apply: Vec<_> = pipeline.apply_nodes().iter().map(|&n| name_of(&pipeline, n)).collect();
    assert_eq!(apply, vec![None, Some("imputer"), Some("model")]);
    assert!(pipeline.apply_nodes().iter().all(|&n| !pipeline.node(n).trained()));

    // Train graph: both taps, the label extractor, the train-side imputer
    // fork and the two trained sinks.
    assert_eq!(pipeline.train_nodes().len(), 6);
    let trained: Vec<_> = pipeline
        .train_nodes()
        .iter()
        .filter(|&&n| pipeline.node(n).trained())
        .map(|&n| name_of(&pipeline, n).unwrap())
        .collect();
    assert_eq!(trained, vec!["imputer", "model"]);

    // The model trains on imputed features and extracted labels.
    let model_sink = *pipeline
        .train_nodes()
        .iter()
        .find(|&&n| pipeline.node(n).trained() && name_of(&pipeline, n) == Some("model"))
        .unwrap();
    let mut feeders = Vec::new();
    for &node in pipeline.train_nodes() {
        for (_, subs) in pipeline.node(node).outputs() {
            for sub in subs.iter().filter(|s| s.node == model_sink) {
                feeders.push((name_of(&pipeline, node), sub.port));
            }
        }
    }
    assert!(feeders.contains(&(Some("imputer"), Port::Train)));
    assert!(feeders.contains(&(Some("labels"), Port::Label)));
}

#[test]
fn test_stacked_ensemble_pipeline_structure() {
    let expression = Composable::new(Stack::new(
        vec![model("gradient"), model("forest")],
        2,
        mean(),
    )) >> Consumer::new(model("blender"));
    let pipeline = Pipeline::compile(&expression).unwrap();

    // Apply graph: entry, two base forks, the aggregator, the blender fork,
    // enumerated depth-first from the entry.
    let apply: Vec<_> = pipeline.apply_nodes().iter().map(|&n| name_of(&pipeline, n)).collect();
    assert_eq!(
        apply,
        vec![None, Some("gradient"), Some("mean"), Some("blender"), Some("forest")]
    );
    assert_eq!(pipeline.apply_nodes().len(), 5);

    // Train graph: both taps, four trained fold workers, the trained blender.
    assert_eq!(pipeline.train_nodes().len(), 7);
    let trained: Vec<_> = pipeline
        .train_nodes()
        .iter()
        .filter(|&&n| pipeline.node(n).trained())
        .map(|&n| name_of(&pipeline, n).unwrap())
        .collect();
    assert_eq!(trained, vec!["gradient", "gradient", "forest", "forest", "blender"]);

    // Fork groups with more than one member: the two bases and the blender.
    let groups: BTreeSet<_> = pipeline
        .apply_nodes()
        .iter()
        .chain(pipeline.train_nodes())
        .filter_map(|&n| pipeline.node(n).group())
        .collect();
    let shared: Vec<_> = groups
        .iter()
        .filter(|&&g| pipeline.flow().group_members(g).len() > 1)
        .collect();
    assert_eq!(shared.len(), 3);

    // Every stateful group holds exactly one trained member; the stateless
    // aggregator holds none.
    for &group in &groups {
        let members = pipeline.flow().group_members(group);
        let trained = members.iter().filter(|&&m| pipeline.node(m).trained()).count();
        if pipeline.node(members[0]).stateful() {
            assert_eq!(trained, 1);
        } else {
            assert_eq!(trained, 0);
        }
    }
}

#[test]
fn test_mapper_after_consumer_fails_to_compile() {
    let expression = Composable::new(Consumer::new(model("model"))) >> Mapper::new(imputer());
    let result = Pipeline::compile(&expression);
    assert!(matches!(result.unwrap_err(), FlowError::ClosurePathExtension { .. }));
}

#[test]
fn test_compilation_shape_is_reproducible() {
    let expression = Composable::new(Labeler::new(label_picker("y")))
        >> Mapper::new(imputer())
        >> Stack::new(vec![model("gradient"), model("forest")], 3, mean())
        >> Consumer::new(model("blender"));

    let strip = |pipeline: &Pipeline| {
        let mut snapshot = pipeline.describe();
        snapshot.as_object_mut().unwrap().remove("session");
        snapshot
    };
    let first = Pipeline::compile(&expression).unwrap();
    let second = Pipeline::compile(&expression).unwrap();
    assert_eq!(strip(&first), strip(&second));
}

#[test]
fn test_runner_builds_and_drives_actors_from_specs() {
    let expression = Composable::new(Labeler::new(label_picker("y")))
        >> Mapper::new(imputer())
        >> Consumer::new(model("model"));
    let pipeline = Pipeline::compile(&expression).unwrap();

    // A runner resolves specs from the frozen graph and round-trips trained
    // state between the trainer and its apply-side fork group peer.
    let imputer_sink = *pipeline
        .train_nodes()
        .iter()
        .find(|&&n| pipeline.node(n).trained() && name_of(&pipeline, n) == Some("imputer"))
        .unwrap();
    let mut trainer = pipeline.node(imputer_sink).spec().unwrap().build().unwrap();
    trainer.train(json!([2.0, 4.0]), Value::Null).unwrap();
    let state = trainer.get_state().unwrap().unwrap();

    let group = pipeline.node(imputer_sink).group().unwrap();
    let peer = pipeline.flow().group_members(group)[0];
    let mut applier = pipeline.node(peer).spec().unwrap().build().unwrap();
    applier.set_state(&state).unwrap();
    let out = applier.apply(vec![json!([1.0, null])]).unwrap();
    assert_eq!(out, json!([1.0, 3.0]));
}
