use std::collections::{BTreeSet, HashMap, VecDeque};

use serde::Serialize;

use crate::errors::CoreError;
use crate::graph::{BindingGraph, ComponentId, EdgeId, EdgeSource, NodeId};

/// The component-local view of a graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentSubgraph {
    pub component: ComponentId,
    pub entry_points: Vec<EdgeId>,
    /// Nodes owned by the component
    pub nodes: Vec<NodeId>,
    /// Edges requested from the component's entry points or owned nodes
    pub edges: Vec<EdgeId>,
    pub children: Vec<ComponentId>,
}

impl BindingGraph {
    /// Edges leaving the component's entry points
    pub fn entry_point_edges(&self, component: ComponentId) -> Result<&[EdgeId], CoreError> {
        Ok(&self.component(component)?.entry_points)
    }

    /// Edges leaving a node
    pub fn dependency_edges(&self, node: NodeId) -> Result<&[EdgeId], CoreError> {
        Ok(&self.node(node)?.dependencies)
    }

    /// Edges that resolved to `node`
    pub fn dependent_edges(&self, node: NodeId) -> Vec<EdgeId> {
        self.edges()
            .filter(|(_, edge)| edge.target_node() == Some(node))
            .map(|(id, _)| id)
            .collect()
    }

    /// Nodes owned by a component, in creation order
    pub fn owned_nodes(&self, component: ComponentId) -> Vec<NodeId> {
        self.nodes()
            .filter(|(_, node)| node.owner == component)
            .map(|(id, _)| id)
            .collect()
    }

    /// The component-local view of the graph
    pub fn subgraph(&self, component: ComponentId) -> Result<ComponentSubgraph, CoreError> {
        let descriptor = self.component(component)?;
        let nodes = self.owned_nodes(component);

        let mut edges = descriptor.entry_points.clone();
        for node in &nodes {
            edges.extend(self.dependency_edges(*node)?);
        }

        Ok(ComponentSubgraph {
            component,
            entry_points: descriptor.entry_points.clone(),
            nodes,
            edges,
            children: descriptor.children.clone(),
        })
    }

    /// Every node reachable from a component's entry points, by id
    pub fn reachable_from(&self, component: ComponentId) -> Result<Vec<NodeId>, CoreError> {
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::new();

        for edge in self.entry_point_edges(component)? {
            if let Some(target) = self.edge(*edge)?.target_node() {
                queue.push_back(target);
            }
        }

        while let Some(node) = queue.pop_front() {
            if !seen.insert(node) {
                continue;
            }
            for edge in self.dependency_edges(node)? {
                if let Some(target) = self.edge(*edge)?.target_node() {
                    queue.push_back(target);
                }
            }
        }

        Ok(seen.into_iter().collect())
    }

    /// Construction order of a component's owned nodes
    ///
    /// Dependencies come before their dependents. Deferred edges and edges
    /// to nodes owned elsewhere impose no order. Fails when the immediate
    /// edges between owned nodes form a cycle.
    pub fn initialization_order(&self, component: ComponentId) -> Result<Vec<NodeId>, CoreError> {
        let owned = self.owned_nodes(component);
        let mut in_degree: HashMap<NodeId, usize> = owned.iter().map(|n| (*n, 0)).collect();
        let mut dependents: HashMap<NodeId, Vec<NodeId>> = HashMap::new();

        // Count immediate dependencies on other owned nodes
        for node in &owned {
            for edge_id in self.dependency_edges(*node)? {
                let edge = self.edge(*edge_id)?;
                if edge.deferred {
                    continue;
                }
                let Some(target) = edge.target_node() else { continue };
                if !in_degree.contains_key(&target) {
                    continue;
                }
                if let Some(degree) = in_degree.get_mut(node) {
                    *degree += 1;
                }
                dependents.entry(target).or_default().push(*node);
            }
        }

        let mut queue: VecDeque<NodeId> = owned
            .iter()
            .filter(|n| in_degree.get(n) == Some(&0))
            .copied()
            .collect();
        let mut result = Vec::with_capacity(owned.len());

        while let Some(node) = queue.pop_front() {
            result.push(node);
            if let Some(waiting) = dependents.get(&node) {
                for dependent in waiting {
                    if let Some(degree) = in_degree.get_mut(dependent) {
                        *degree -= 1;
                        if *degree == 0 {
                            queue.push_back(*dependent);
                        }
                    }
                }
            }
        }

        if result.len() != owned.len() {
            let component = self.component(component)?;
            return Err(CoreError::validation(format!(
                "component '{}' has an immediate dependency cycle and no initialization order",
                component.name
            )));
        }

        Ok(result)
    }

    /// The request sites that resolved to `node`, described for diagnostics
    pub fn request_sites(&self, node: NodeId) -> Vec<String> {
        let mut sites: Vec<String> = self
            .edges()
            .filter(|(_, edge)| edge.target_node() == Some(node))
            .map(|(_, edge)| self.describe_source(&edge.source))
            .collect();
        sites.dedup();
        sites
    }

    /// Number of distinct request sites that resolved to each node
    pub fn fan_in(&self) -> Vec<usize> {
        let mut sources: Vec<BTreeSet<&EdgeSource>> = vec![BTreeSet::new(); self.node_count()];
        for (_, edge) in self.edges() {
            if let Some(target) = edge.target_node() {
                if let Some(set) = sources.get_mut(target.index()) {
                    set.insert(&edge.source);
                }
            }
        }
        sources.into_iter().map(|s| s.len()).collect()
    }
}
