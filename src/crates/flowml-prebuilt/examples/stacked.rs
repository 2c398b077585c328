//! Stacked-ensemble pipeline demo: compose, compile and render as DOT.
//!
//! Run with `cargo run --example stacked`, then render the output with
//! `dot -Tpng pipeline.gv -o pipeline.png`.

use std::sync::Arc;

use anyhow::Result;
use flowml_core::task::{MethodTable, Params, Spec, TaskError, Wrapped};
use flowml_core::{visualize, Composable, Pipeline, VisualizationOptions};
use flowml_prebuilt::{Consumer, Labeler, Mapper, Stack};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

fn numbers(value: &Value) -> Vec<f64> {
    value
        .as_array()
        .map(|vs| vs.iter().filter_map(Value::as_f64).collect())
        .unwrap_or_default()
}

/// Custom label-extraction logic.
#[derive(Default, Serialize, Deserialize)]
struct LabelExtractor {
    column: String,
}

static LABEL_EXTRACTOR: MethodTable<LabelExtractor> = MethodTable {
    train: None,
    apply: |actor, mut inputs| {
        let labels: Vec<Value> = inputs
            .remove(0)
            .as_array()
            .map(|rows| rows.iter().map(|row| row[&actor.column].clone()).collect())
            .unwrap_or_default();
        Ok(json!(labels))
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

/// Custom missing-value imputation logic: fill with the training mean.
#[derive(Default, Serialize, Deserialize)]
struct MeanImputer {
    fill: f64,
}

static MEAN_IMPUTER: MethodTable<MeanImputer> = MethodTable {
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

/// Stand-in gradient estimator: learns a decision threshold from the labels.
#[derive(Default, Serialize, Deserialize)]
struct ThresholdModel {
    cut: f64,
}

static THRESHOLD_MODEL: MethodTable<ThresholdModel> = MethodTable {
    train: Some(|actor, _features, labels| {
        let values = numbers(&labels);
        actor.cut = values.iter().sum::<f64>() / values.len().max(1) as f64;
        Ok(())
    }),
    apply: |actor, mut inputs| {
        let scores: Vec<f64> = numbers(&inputs.remove(0))
            .into_iter()
            .map(|v| if v >= actor.cut { 1.0 } else { 0.0 })
            .collect();
        Ok(json!(scores))
    },
    get_params: |_| Params::new(),
    set_params: |_, _| Ok(()),
};

/// Element-wise averaging of the base predictions.
#[derive(Default, Serialize, Deserialize)]
struct Average;

static AVERAGE: MethodTable<Average> = MethodTable {
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

fn labels(column: &str) -> Arc<Spec> {
    let mut params = Params::new();
    params.insert("column".into(), json!(column));
    Arc::new(Wrapped::spec("labels", params, &LABEL_EXTRACTOR, |params| {
        let column = params
            .get("column")
            .and_then(Value::as_str)
            .ok_or_else(|| TaskError::params("column", "missing"))?;
        Ok(LabelExtractor { column: column.to_string() })
    }))
}

fn estimator(name: &str) -> Arc<Spec> {
    Arc::new(Wrapped::spec(name, Params::new(), &THRESHOLD_MODEL, |_| {
        Ok(ThresholdModel::default())
    }))
}

fn main() -> Result<()> {
    let expression = Composable::new(Labeler::new(labels("survived")))
        >> Mapper::new(Arc::new(Wrapped::spec("imputer", Params::new(), &MEAN_IMPUTER, |_| {
            Ok(MeanImputer::default())
        })))
        >> Stack::new(
            vec![estimator("gradient"), estimator("forest")],
            2,
            Arc::new(Wrapped::spec("mean", Params::new(), &AVERAGE, |_| Ok(Average))),
        )
        >> Consumer::new(estimator("regression"));

    let pipeline = Pipeline::compile(&expression)?;
    println!(
        "{}",
        visualize(&pipeline, &VisualizationOptions::dot().with_title("Stacked pipeline"))
    );
    Ok(())
}
