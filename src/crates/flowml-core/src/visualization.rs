//! Pipeline rendering in DOT and Mermaid formats
//!
//! Renderers are ordinary [`Visitor`] clients of the path traversal: they
//! collect the nodes of the apply and train graphs in deterministic order and
//! emit text diagrams. DOT output renders with graphviz
//! (`dot -Tpng pipeline.dot -o pipeline.png`); Mermaid output embeds in
//! markdown.
//!
//! # Examples
//!
//! ```rust,ignore
//! let pipeline = Pipeline::compile(&expression)?;
//! let dot = visualize(&pipeline, &VisualizationOptions::dot().with_title("Pipeline"));
//! std::fs::write("pipeline.dot", dot)?;
//! ```

use std::fmt::Write as _;

use crate::graph::{Flow, NodeId, Port};
use crate::path::{Path, Visitor};
use crate::pipeline::Pipeline;

/// Output format selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisualizationFormat {
    /// Graphviz DOT text.
    Dot,
    /// Mermaid flowchart text.
    Mermaid,
}

/// Rendering options.
#[derive(Debug, Clone)]
pub struct VisualizationOptions {
    format: VisualizationFormat,
    title: Option<String>,
    details: bool,
}

impl VisualizationOptions {
    /// DOT output with defaults.
    pub fn dot() -> Self {
        Self {
            format: VisualizationFormat::Dot,
            title: None,
            details: false,
        }
    }

    /// Mermaid output with defaults.
    pub fn mermaid() -> Self {
        Self {
            format: VisualizationFormat::Mermaid,
            title: None,
            details: false,
        }
    }

    /// Set the diagram title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Include arities and fork groups in node labels.
    pub fn with_details(mut self, details: bool) -> Self {
        self.details = details;
        self
    }
}

/// Visitor collecting the nodes of one graph in traversal order.
#[derive(Default)]
struct Collector {
    nodes: Vec<NodeId>,
}

impl Visitor for Collector {
    fn visit_node(&mut self, _flow: &Flow, node: NodeId) {
        if !self.nodes.contains(&node) {
            self.nodes.push(node);
        }
    }
}

fn collect(flow: &Flow, paths: &[&Path]) -> Vec<NodeId> {
    let mut collector = Collector::default();
    for path in paths {
        // The pipeline already validated these walks; re-walking them over
        // the frozen arena cannot fail.
        path.accept(flow, &mut collector)
            .expect("frozen pipeline graphs are walkable");
    }
    collector.nodes
}

fn node_label(flow: &Flow, node: NodeId, details: bool) -> String {
    let data = flow.node(node);
    let mut label = match data.spec() {
        Some(spec) => spec.name().to_string(),
        None => "input".to_string(),
    };
    if data.trained() {
        label.push_str(" (trained)");
    }
    if details {
        if let Some(group) = data.group() {
            let _ = write!(label, " [{}->{} g{}]", data.szin(), data.szout(), group);
        }
    }
    label
}

fn edges(flow: &Flow, nodes: &[NodeId]) -> Vec<(NodeId, NodeId, Port)> {
    let mut found = Vec::new();
    for &node in nodes {
        for (_, subs) in flow.node(node).outputs() {
            for sub in subs.iter().filter(|s| nodes.contains(&s.node)) {
                found.push((node, sub.node, sub.port));
            }
        }
    }
    found
}

/// Render both graphs of a compiled pipeline.
pub fn visualize(pipeline: &Pipeline, options: &VisualizationOptions) -> String {
    let flow = pipeline.flow();
    let apply = collect(flow, &[pipeline.apply()]);
    let train = collect(flow, &[pipeline.train(), pipeline.label()]);
    match options.format {
        VisualizationFormat::Dot => render_dot(flow, &apply, &train, options),
        VisualizationFormat::Mermaid => render_mermaid(flow, &apply, &train, options),
    }
}

fn render_dot(flow: &Flow, apply: &[NodeId], train: &[NodeId], options: &VisualizationOptions) -> String {
    let mut out = String::from("digraph pipeline {\n");
    if let Some(title) = &options.title {
        let _ = writeln!(out, "    label=\"{title}\";");
    }
    out.push_str("    rankdir=LR;\n    node [shape=box];\n");
    for (name, nodes) in [("apply", apply), ("train", train)] {
        let _ = writeln!(out, "    subgraph cluster_{name} {{");
        let _ = writeln!(out, "        label=\"{name}\";");
        for &node in nodes {
            let shape = if flow.node(node).is_future() { ", shape=circle" } else { "" };
            let _ = writeln!(
                out,
                "        n{} [label=\"{}\"{shape}];",
                node.index(),
                node_label(flow, node, options.details)
            );
        }
        for (source, target, port) in edges(flow, nodes) {
            let attr = match port {
                Port::Apply(_) => String::new(),
                Port::Train | Port::Label => format!(" [label=\"{port}\", style=dashed]"),
            };
            let _ = writeln!(out, "        n{} -> n{}{attr};", source.index(), target.index());
        }
        out.push_str("    }\n");
    }
    out.push_str("}\n");
    out
}

fn render_mermaid(flow: &Flow, apply: &[NodeId], train: &[NodeId], options: &VisualizationOptions) -> String {
    let mut out = String::new();
    if let Some(title) = &options.title {
        let _ = writeln!(out, "---\ntitle: {title}\n---");
    }
    out.push_str("graph TD\n");
    for (name, nodes) in [("apply", apply), ("train", train)] {
        let _ = writeln!(out, "    subgraph {name}");
        for &node in nodes {
            let _ = writeln!(
                out,
                "        n{}[\"{}\"]",
                node.index(),
                node_label(flow, node, options.details)
            );
        }
        for (source, target, port) in edges(flow, nodes) {
            let arrow = match port {
                Port::Apply(_) => "-->".to_string(),
                Port::Train | Port::Label => format!("-. {port} .->"),
            };
            let _ = writeln!(out, "        n{} {arrow} n{}", source.index(), target.index());
        }
        out.push_str("    end\n");
    }
    out
}
