//! The resolved binding graph
//!
//! Nodes, edges and components live in flat arenas addressed by typed
//! indices. Edges reference nodes by handle only, so cycles in the graph
//! never become cycles in ownership and a finished graph can be shared
//! read-only across threads.

mod queries;

use std::fmt;

use serde::Serialize;

use crate::errors::CoreError;
use crate::model::{Binding, BindingKey, DependencyRequest, Scope};
use crate::strategy::RequestStrategy;

pub use queries::ComponentSubgraph;

macro_rules! arena_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }

            pub(crate) fn from_index(index: usize) -> Self {
                Self(index as u32)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

arena_id!(NodeId, "n");
arena_id!(EdgeId, "e");
arena_id!(ComponentId, "c");
arena_id!(ConflictId, "x");

/// What a node stands for
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum NodeKind {
    Binding(Binding),
    /// A key nothing could be found for
    Missing { key: BindingKey },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    #[serde(flatten)]
    pub kind: NodeKind,
    pub owner: ComponentId,
    /// Outgoing edges, in the binding's dependency order
    pub dependencies: Vec<EdgeId>,
    /// Set by the strategy classifier
    pub needs_caching: bool,
}

impl Node {
    pub fn binding(&self) -> Option<&Binding> {
        match &self.kind {
            NodeKind::Binding(binding) => Some(binding),
            NodeKind::Missing { .. } => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self.kind, NodeKind::Missing { .. })
    }

    /// The binding key this node was resolved for
    pub fn key(&self) -> BindingKey {
        match &self.kind {
            NodeKind::Binding(binding) => match binding.kind {
                crate::model::BindingKind::MembersInjection => {
                    BindingKey::MembersInjection(binding.key.clone())
                }
                _ => BindingKey::Provision(binding.key.clone()),
            },
            NodeKind::Missing { key } => key.clone(),
        }
    }

    pub fn label(&self) -> String {
        match &self.kind {
            NodeKind::Binding(binding) => binding.key.to_string(),
            NodeKind::Missing { key } => format!("missing {}", key),
        }
    }
}

/// Where a dependency request comes from
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeSource {
    Binding(NodeId),
    EntryPoint {
        component: ComponentId,
        method: String,
    },
}

/// What a dependency request resolved to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeTarget {
    Node(NodeId),
    /// Several candidates competed; no node was created
    Conflict(ConflictId),
}

/// A resolved dependency request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub source: EdgeSource,
    /// Component whose view the request was resolved in
    pub component: ComponentId,
    pub request: DependencyRequest,
    pub target: EdgeTarget,
    /// The request does not need its target during construction
    pub deferred: bool,
    /// A deferred edge on a cycle
    pub cycle_breaking: bool,
    /// Set by the strategy classifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<RequestStrategy>,
}

impl Edge {
    pub fn target_node(&self) -> Option<NodeId> {
        match self.target {
            EdgeTarget::Node(node) => Some(node),
            EdgeTarget::Conflict(_) => None,
        }
    }

    pub fn source_node(&self) -> Option<NodeId> {
        match self.source {
            EdgeSource::Binding(node) => Some(node),
            EdgeSource::EntryPoint { .. } => None,
        }
    }

    pub fn is_entry_point(&self) -> bool {
        matches!(self.source, EdgeSource::EntryPoint { .. })
    }
}

/// Several bindings competing for one key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    pub key: BindingKey,
    pub component: ComponentId,
    pub candidates: Vec<Binding>,
}

/// One component in the resolved tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentGraph {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<ComponentId>,
    pub children: Vec<ComponentId>,
    pub entry_points: Vec<EdgeId>,
    /// Modules installed here and not already installed by an ancestor
    pub modules: Vec<String>,
    pub production: bool,
}

impl ComponentGraph {
    /// Create an empty component node
    pub fn new(name: impl Into<String>, scope: Option<Scope>, parent: Option<ComponentId>) -> Self {
        Self {
            name: name.into(),
            scope,
            parent,
            children: Vec::new(),
            entry_points: Vec::new(),
            modules: Vec::new(),
            production: false,
        }
    }
}

/// The resolved dependency graph of one root component and its descendants
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BindingGraph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    components: Vec<ComponentGraph>,
    conflicts: Vec<Conflict>,
}

impl BindingGraph {
    /// Create an empty graph
    pub(crate) fn new() -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            components: Vec::new(),
            conflicts: Vec::new(),
        }
    }

    pub(crate) fn add_component(&mut self, component: ComponentGraph) -> ComponentId {
        let id = ComponentId::from_index(self.components.len());
        if let Some(parent) = component.parent {
            if let Some(parent) = self.components.get_mut(parent.index()) {
                parent.children.push(id);
            }
        }
        self.components.push(component);
        id
    }

    pub(crate) fn add_node(&mut self, kind: NodeKind, owner: ComponentId) -> NodeId {
        let id = NodeId::from_index(self.nodes.len());
        self.nodes.push(Node {
            kind,
            owner,
            dependencies: Vec::new(),
            needs_caching: false,
        });
        id
    }

    pub(crate) fn add_conflict(&mut self, conflict: Conflict) -> ConflictId {
        let id = ConflictId::from_index(self.conflicts.len());
        self.conflicts.push(conflict);
        id
    }

    /// Add an edge and link it from its source
    pub(crate) fn add_edge(
        &mut self,
        source: EdgeSource,
        component: ComponentId,
        request: DependencyRequest,
        target: EdgeTarget,
    ) -> Result<EdgeId, CoreError> {
        let id = EdgeId::from_index(self.edges.len());
        match &source {
            EdgeSource::Binding(node) => self.node_mut(*node)?.dependencies.push(id),
            EdgeSource::EntryPoint { component, .. } => {
                self.component_mut(*component)?.entry_points.push(id)
            }
        }
        let deferred = request.kind.is_deferred();
        self.edges.push(Edge {
            source,
            component,
            request,
            target,
            deferred,
            cycle_breaking: false,
            strategy: None,
        });
        Ok(id)
    }

    pub fn node(&self, id: NodeId) -> Result<&Node, CoreError> {
        self.nodes
            .get(id.index())
            .ok_or_else(|| CoreError::invariant(format!("node {} is not in the graph", id)))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, CoreError> {
        self.nodes
            .get_mut(id.index())
            .ok_or_else(|| CoreError::invariant(format!("node {} is not in the graph", id)))
    }

    pub fn edge(&self, id: EdgeId) -> Result<&Edge, CoreError> {
        self.edges
            .get(id.index())
            .ok_or_else(|| CoreError::invariant(format!("edge {} is not in the graph", id)))
    }

    pub(crate) fn edge_mut(&mut self, id: EdgeId) -> Result<&mut Edge, CoreError> {
        self.edges
            .get_mut(id.index())
            .ok_or_else(|| CoreError::invariant(format!("edge {} is not in the graph", id)))
    }

    pub fn component(&self, id: ComponentId) -> Result<&ComponentGraph, CoreError> {
        self.components
            .get(id.index())
            .ok_or_else(|| CoreError::invariant(format!("component {} is not in the graph", id)))
    }

    pub(crate) fn component_mut(&mut self, id: ComponentId) -> Result<&mut ComponentGraph, CoreError> {
        self.components
            .get_mut(id.index())
            .ok_or_else(|| CoreError::invariant(format!("component {} is not in the graph", id)))
    }

    pub fn conflict(&self, id: ConflictId) -> Result<&Conflict, CoreError> {
        self.conflicts
            .get(id.index())
            .ok_or_else(|| CoreError::invariant(format!("conflict {} is not in the graph", id)))
    }

    /// The root component; always the first one added
    pub fn root(&self) -> ComponentId {
        ComponentId(0)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (NodeId::from_index(i), node))
    }

    pub fn edges(&self) -> impl Iterator<Item = (EdgeId, &Edge)> {
        self.edges
            .iter()
            .enumerate()
            .map(|(i, edge)| (EdgeId::from_index(i), edge))
    }

    pub fn components(&self) -> impl Iterator<Item = (ComponentId, &ComponentGraph)> {
        self.components
            .iter()
            .enumerate()
            .map(|(i, component)| (ComponentId::from_index(i), component))
    }

    pub fn conflicts(&self) -> impl Iterator<Item = (ConflictId, &Conflict)> {
        self.conflicts
            .iter()
            .enumerate()
            .map(|(i, conflict)| (ConflictId::from_index(i), conflict))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Find a component by name
    pub fn component_named(&self, name: &str) -> Option<ComponentId> {
        self.components()
            .find(|(_, component)| component.name == name)
            .map(|(id, _)| id)
    }

    /// Whether `ancestor` is `component` or one of its ancestors
    pub fn is_ancestor_or_self(&self, ancestor: ComponentId, component: ComponentId) -> bool {
        let mut current = Some(component);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.components.get(id.index()).and_then(|c| c.parent);
        }
        false
    }

    /// Path of component names from the root down to `component`
    pub fn component_path(&self, component: ComponentId) -> String {
        let mut names = Vec::new();
        let mut current = Some(component);
        while let Some(id) = current {
            match self.components.get(id.index()) {
                Some(c) => {
                    names.push(c.name.as_str());
                    current = c.parent;
                }
                None => break,
            }
        }
        names.reverse();
        names.join(" → ")
    }

    /// Human readable name of an edge's requesting site
    pub fn describe_source(&self, source: &EdgeSource) -> String {
        match source {
            EdgeSource::Binding(node) => self
                .nodes
                .get(node.index())
                .and_then(|n| n.binding())
                .map(|b| b.describe())
                .unwrap_or_else(|| node.to_string()),
            EdgeSource::EntryPoint { component, method } => {
                let name = self
                    .components
                    .get(component.index())
                    .map(|c| c.name.as_str())
                    .unwrap_or("?");
                format!("{}.{}()", name, method)
            }
        }
    }

    pub(crate) fn edges_mut(&mut self) -> impl Iterator<Item = &mut Edge> {
        self.edges.iter_mut()
    }

    pub(crate) fn nodes_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.nodes.iter_mut()
    }
}
