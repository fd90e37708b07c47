use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt::{self, Write};

use serde::Serialize;
use serde_json::json;

use crate::errors::CoreError;
use crate::graph::{BindingGraph, ComponentId, Edge, EdgeSource, EdgeTarget, NodeId, NodeKind};

/// Binding graph visualization formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisualizationFormat {
    /// Graphviz DOT format
    Dot,
    /// Mermaid diagram format
    Mermaid,
    /// ASCII art tree
    Ascii,
    /// JSON representation
    Json,
}

impl std::str::FromStr for VisualizationFormat {
    type Err = CoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "dot" | "graphviz" => Ok(Self::Dot),
            "mermaid" => Ok(Self::Mermaid),
            "ascii" | "tree" => Ok(Self::Ascii),
            "json" => Ok(Self::Json),
            other => Err(CoreError::configuration(format!(
                "unknown visualization format '{}'",
                other
            ))),
        }
    }
}

/// Visualization style configuration
#[derive(Debug, Clone)]
pub struct VisualizationStyle {
    /// Show binding scopes
    pub show_scopes: bool,
    /// Label edges with their request strategy
    pub show_strategies: bool,
    /// Colour nodes by owning component
    pub color_by_component: bool,
    /// Show only nodes whose key contains one of these strings
    pub filter_types: Option<Vec<String>>,
    /// Maximum depth of the ASCII tree
    pub max_depth: Option<usize>,
    /// Include graph statistics
    pub include_stats: bool,
}

impl Default for VisualizationStyle {
    fn default() -> Self {
        Self {
            show_scopes: true,
            show_strategies: false,
            color_by_component: true,
            filter_types: None,
            max_depth: None,
            include_stats: false,
        }
    }
}

const PALETTE: [&str; 6] = [
    "lightblue",
    "lightgreen",
    "lightyellow",
    "lightpink",
    "lightcyan",
    "lavender",
];

/// Renders a resolved binding graph
pub struct GraphVisualizer<'a> {
    graph: &'a BindingGraph,
}

impl<'a> GraphVisualizer<'a> {
    /// Create a new visualizer over a graph
    pub fn new(graph: &'a BindingGraph) -> Self {
        Self { graph }
    }

    /// Generate visualization in specified format
    pub fn visualize(
        &self,
        format: VisualizationFormat,
        style: &VisualizationStyle,
    ) -> Result<String, CoreError> {
        let mut output = String::new();
        let written = match format {
            VisualizationFormat::Dot => self.write_dot(&mut output, style),
            VisualizationFormat::Mermaid => self.write_mermaid(&mut output, style),
            VisualizationFormat::Ascii => self.write_ascii(&mut output, style),
            VisualizationFormat::Json => return self.generate_json(style),
        };
        written.map_err(|_| CoreError::invariant("formatting into a string failed"))?;
        Ok(output)
    }

    fn included(&self, node: NodeId, style: &VisualizationStyle) -> bool {
        let Some(filter) = &style.filter_types else {
            return true;
        };
        match self.graph.node(node) {
            Ok(node) => {
                let label = node.label();
                filter.iter().any(|f| label.contains(f.as_str()))
            }
            Err(_) => false,
        }
    }

    fn node_label(&self, node: NodeId, style: &VisualizationStyle) -> String {
        let Ok(node) = self.graph.node(node) else {
            return node.to_string();
        };
        let mut label = node.label();
        if let Some(binding) = node.binding() {
            if style.show_scopes {
                if let Some(scope) = &binding.scope {
                    label = format!("{} {}", scope, label);
                }
            }
        }
        label
    }

    fn edge_label(&self, edge: &Edge, style: &VisualizationStyle) -> Option<String> {
        let mut parts = Vec::new();
        if edge.request.kind != crate::model::RequestKind::Instance {
            parts.push(edge.request.kind.to_string());
        }
        if style.show_strategies {
            if let Some(strategy) = &edge.strategy {
                parts.push(strategy.to_string());
            }
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" / "))
        }
    }

    fn write_dot(&self, dot: &mut String, style: &VisualizationStyle) -> fmt::Result {
        writeln!(dot, "digraph BindingGraph {{")?;
        writeln!(dot, "    rankdir=LR;")?;
        writeln!(dot, "    node [shape=rectangle];")?;
        writeln!(dot)?;

        // One cluster per component with its entry points and owned nodes
        for (component_id, component) in self.graph.components() {
            writeln!(dot, "    subgraph cluster_{} {{", component_id)?;
            writeln!(dot, "        label=\"{}\";", escape(&component.name))?;
            for edge_id in &component.entry_points {
                if let Ok(edge) = self.graph.edge(*edge_id) {
                    if let EdgeSource::EntryPoint { method, .. } = &edge.source {
                        writeln!(
                            dot,
                            "        \"{}_{}\" [shape=ellipse, label=\"{}()\"];",
                            component_id,
                            escape(method),
                            escape(method)
                        )?;
                    }
                }
            }
            for node_id in self.graph.owned_nodes(component_id) {
                if !self.included(node_id, style) {
                    continue;
                }
                let mut attrs = vec![format!("label=\"{}\"", escape(&self.node_label(node_id, style)))];
                let missing = self.graph.node(node_id).map(|n| n.is_missing()).unwrap_or(false);
                if missing {
                    attrs.push("color=red".to_string());
                    attrs.push("style=dashed".to_string());
                } else if style.color_by_component {
                    attrs.push(format!("fillcolor={}", PALETTE[component_id.index() % PALETTE.len()]));
                    attrs.push("style=filled".to_string());
                }
                writeln!(dot, "        \"{}\" [{}];", node_id, attrs.join(", "))?;
            }
            writeln!(dot, "    }}")?;
        }

        writeln!(dot)?;

        for (_, edge) in self.graph.edges() {
            let from = match &edge.source {
                EdgeSource::Binding(node) => {
                    if !self.included(*node, style) {
                        continue;
                    }
                    node.to_string()
                }
                EdgeSource::EntryPoint { component, method } => format!("{}_{}", component, escape(method)),
            };
            let to = match edge.target {
                EdgeTarget::Node(node) => {
                    if !self.included(node, style) {
                        continue;
                    }
                    node.to_string()
                }
                EdgeTarget::Conflict(conflict) => {
                    writeln!(dot, "    \"{}\" [shape=octagon, color=red, label=\"duplicate\"];", conflict)?;
                    conflict.to_string()
                }
            };

            let mut attrs = Vec::new();
            if let Some(label) = self.edge_label(edge, style) {
                attrs.push(format!("label=\"{}\"", escape(&label)));
            }
            if edge.deferred {
                attrs.push("style=dashed".to_string());
            }
            if attrs.is_empty() {
                writeln!(dot, "    \"{}\" -> \"{}\";", from, to)?;
            } else {
                writeln!(dot, "    \"{}\" -> \"{}\" [{}];", from, to, attrs.join(", "))?;
            }
        }

        writeln!(dot, "}}")
    }

    fn write_mermaid(&self, mermaid: &mut String, style: &VisualizationStyle) -> fmt::Result {
        writeln!(mermaid, "graph TD")?;

        for (component_id, component) in self.graph.components() {
            writeln!(mermaid, "    subgraph {}[\"{}\"]", component_id, component.name)?;
            for edge_id in &component.entry_points {
                if let Ok(edge) = self.graph.edge(*edge_id) {
                    if let EdgeSource::EntryPoint { method, .. } = &edge.source {
                        writeln!(mermaid, "        {}_{}([\"{}()\"])", component_id, sanitize_id(method), method)?;
                    }
                }
            }
            for node_id in self.graph.owned_nodes(component_id) {
                if !self.included(node_id, style) {
                    continue;
                }
                let label = self.node_label(node_id, style).replace('"', "'");
                let missing = self.graph.node(node_id).map(|n| n.is_missing()).unwrap_or(false);
                if missing {
                    writeln!(mermaid, "        {}[\"{}\"]:::missing", node_id, label)?;
                } else {
                    writeln!(mermaid, "        {}[\"{}\"]", node_id, label)?;
                }
            }
            writeln!(mermaid, "    end")?;
        }

        writeln!(mermaid)?;

        for (_, edge) in self.graph.edges() {
            let from = match &edge.source {
                EdgeSource::Binding(node) if self.included(*node, style) => node.to_string(),
                EdgeSource::Binding(_) => continue,
                EdgeSource::EntryPoint { component, method } => format!("{}_{}", component, sanitize_id(method)),
            };
            let to = match edge.target {
                EdgeTarget::Node(node) if self.included(node, style) => node.to_string(),
                EdgeTarget::Node(_) => continue,
                EdgeTarget::Conflict(conflict) => {
                    writeln!(mermaid, "    {}{{{{\"duplicate\"}}}}:::missing", conflict)?;
                    conflict.to_string()
                }
            };
            let arrow = if edge.deferred { "-.->" } else { "-->" };
            match self.edge_label(edge, style) {
                Some(label) => writeln!(mermaid, "    {} {}|{}| {}", from, arrow, label, to)?,
                None => writeln!(mermaid, "    {} {} {}", from, arrow, to)?,
            }
        }

        writeln!(mermaid)?;
        writeln!(mermaid, "    classDef missing stroke:#f00,stroke-dasharray:4")
    }

    fn write_ascii(&self, ascii: &mut String, style: &VisualizationStyle) -> fmt::Result {
        writeln!(ascii, "Binding Graph")?;
        writeln!(ascii, "=============")?;

        for (component_id, component) in self.graph.components() {
            writeln!(ascii)?;
            writeln!(ascii, "{}", self.graph.component_path(component_id))?;
            for edge_id in &component.entry_points {
                let Ok(edge) = self.graph.edge(*edge_id) else { continue };
                let EdgeSource::EntryPoint { method, .. } = &edge.source else { continue };
                writeln!(ascii, "├── {}()", method)?;
                let mut visited = HashSet::new();
                self.write_ascii_tree(ascii, edge, style, 1, "│   ", &mut visited)?;
            }
        }

        if style.include_stats {
            writeln!(ascii)?;
            writeln!(ascii, "Statistics:")?;
            writeln!(ascii, "-----------")?;
            writeln!(ascii, "Components: {}", self.graph.component_count())?;
            writeln!(ascii, "Bindings: {}", self.graph.node_count())?;
            writeln!(ascii, "Requests: {}", self.graph.edge_count())?;

            let mut kinds: BTreeMap<&str, usize> = BTreeMap::new();
            for (_, node) in self.graph.nodes() {
                let kind = match &node.kind {
                    NodeKind::Binding(binding) => binding.kind.as_str(),
                    NodeKind::Missing { .. } => "missing",
                };
                *kinds.entry(kind).or_insert(0) += 1;
            }
            for (kind, count) in kinds {
                writeln!(ascii, "{}: {}", kind, count)?;
            }
        }

        Ok(())
    }

    fn write_ascii_tree(
        &self,
        output: &mut String,
        edge: &Edge,
        style: &VisualizationStyle,
        depth: usize,
        prefix: &str,
        visited: &mut HashSet<NodeId>,
    ) -> fmt::Result {
        if let Some(max_depth) = style.max_depth {
            if depth > max_depth {
                return Ok(());
            }
        }

        let suffix = self
            .edge_label(edge, style)
            .map(|label| format!(" [{}]", label))
            .unwrap_or_default();

        let node = match edge.target {
            EdgeTarget::Node(node) => node,
            EdgeTarget::Conflict(_) => {
                return writeln!(output, "{}└── {} (duplicate){}", prefix, edge.request.key, suffix);
            }
        };

        if !visited.insert(node) {
            return writeln!(output, "{}└── {} (cycle){}", prefix, self.node_label(node, style), suffix);
        }
        writeln!(output, "{}└── {}{}", prefix, self.node_label(node, style), suffix)?;

        if let Ok(dependencies) = self.graph.dependency_edges(node) {
            let child_prefix = format!("{}    ", prefix);
            for edge_id in dependencies {
                if let Ok(child) = self.graph.edge(*edge_id) {
                    self.write_ascii_tree(output, child, style, depth + 1, &child_prefix, visited)?;
                }
            }
        }

        visited.remove(&node);
        Ok(())
    }

    /// Generate JSON representation
    fn generate_json(&self, style: &VisualizationStyle) -> Result<String, CoreError> {
        let mut components = Vec::new();
        for (id, component) in self.graph.components() {
            components.push(json!({
                "id": id,
                "name": component.name,
                "scope": component.scope.as_ref().map(|s| s.to_string()),
                "parent": component.parent,
                "modules": component.modules,
                "production": component.production,
            }));
        }

        let mut nodes = Vec::new();
        let mut kept = BTreeSet::new();
        for (id, node) in self.graph.nodes() {
            if !self.included(id, style) {
                continue;
            }
            kept.insert(id);
            let (kind, declaration) = match &node.kind {
                NodeKind::Binding(binding) => (
                    binding.kind.as_str(),
                    binding.element.as_ref().map(|e| e.to_string()),
                ),
                NodeKind::Missing { .. } => ("missing", None),
            };
            nodes.push(json!({
                "id": id,
                "key": node.key().to_string(),
                "kind": kind,
                "declaration": declaration,
                "scope": node.binding().and_then(|b| b.scope.as_ref()).map(|s| s.to_string()),
                "owner": node.owner,
                "needs_caching": node.needs_caching,
            }));
        }

        let mut edges = Vec::new();
        for (id, edge) in self.graph.edges() {
            if let Some(source) = edge.source_node() {
                if !kept.contains(&source) {
                    continue;
                }
            }
            if let Some(target) = edge.target_node() {
                if !kept.contains(&target) {
                    continue;
                }
            }
            edges.push(json!({
                "id": id,
                "from": self.graph.describe_source(&edge.source),
                "source": edge.source,
                "target": edge.target,
                "request": edge.request.kind,
                "deferred": edge.deferred,
                "cycle_breaking": edge.cycle_breaking,
                "strategy": edge.strategy.as_ref().map(|s| s.to_string()),
            }));
        }

        let mut document = json!({
            "components": components,
            "nodes": nodes,
            "edges": edges,
        });
        if style.include_stats {
            document["stats"] = json!({
                "components": self.graph.component_count(),
                "nodes": self.graph.node_count(),
                "edges": self.graph.edge_count(),
            });
        }

        Ok(serde_json::to_string_pretty(&document)?)
    }
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Sanitize ID for use in Mermaid diagrams
fn sanitize_id(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// A cross-reference fact for source indexers
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(tag = "fact", rename_all = "snake_case")]
pub enum CrossReference {
    /// A request site is satisfied by a binding declaration
    SatisfiedBy { request: String, declaration: String },
    /// A component installs a module
    InstallsModule { component: String, module: String },
    /// A component has a child component
    ChildComponent { parent: String, child: String },
}

/// Index facts for every resolved request, installed module and child
///
/// Requests that resolve to synthetic bindings, such as multibound
/// collections, are reported against the declarations behind them.
pub fn cross_references(graph: &BindingGraph) -> Result<Vec<CrossReference>, CoreError> {
    let mut facts = BTreeSet::new();

    for (_, edge) in graph.edges() {
        let Some(target) = edge.target_node() else { continue };
        let request = match &edge.request.element {
            Some(element) => element.clone(),
            None => graph.describe_source(&edge.source),
        };
        let mut visited = HashSet::new();
        for declaration in declarations_behind(graph, target, &mut visited)? {
            facts.insert(CrossReference::SatisfiedBy {
                request: request.clone(),
                declaration,
            });
        }
    }

    for (_, component) in graph.components() {
        for module in &component.modules {
            facts.insert(CrossReference::InstallsModule {
                component: component.name.clone(),
                module: module.clone(),
            });
        }
        for child in &component.children {
            facts.insert(CrossReference::ChildComponent {
                parent: component.name.clone(),
                child: graph.component(*child)?.name.clone(),
            });
        }
    }

    Ok(facts.into_iter().collect())
}

fn declarations_behind(
    graph: &BindingGraph,
    node: NodeId,
    visited: &mut HashSet<NodeId>,
) -> Result<Vec<String>, CoreError> {
    if !visited.insert(node) {
        return Ok(Vec::new());
    }
    let Some(binding) = graph.node(node)?.binding() else {
        return Ok(Vec::new());
    };
    if let Some(element) = &binding.element {
        return Ok(vec![element.to_string()]);
    }

    let mut declarations = Vec::new();
    for edge_id in graph.dependency_edges(node)? {
        if let Some(target) = graph.edge(*edge_id)?.target_node() {
            declarations.extend(declarations_behind(graph, target, visited)?);
        }
    }
    Ok(declarations)
}

/// Index facts for a component subtree only
pub fn component_cross_references(
    graph: &BindingGraph,
    component: ComponentId,
) -> Result<Vec<CrossReference>, CoreError> {
    let name = graph.component(component)?.name.clone();
    Ok(cross_references(graph)?
        .into_iter()
        .filter(|fact| match fact {
            CrossReference::InstallsModule { component, .. } => component == &name,
            CrossReference::ChildComponent { parent, .. } => parent == &name,
            CrossReference::SatisfiedBy { .. } => true,
        })
        .collect())
}
