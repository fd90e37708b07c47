//! Graph validation
//!
//! Walks a resolved graph and collects every problem that would stop it
//! from being realized. Checks never stop at the first problem.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::context::ResolutionContext;
use crate::errors::CoreError;
use crate::graph::{BindingGraph, ComponentId, EdgeSource, NodeId};
use crate::model::BindingKind;

/// A user-facing problem with the declarations
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Error)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum Finding {
    #[error("{key} cannot be provided without a binding in {component} (requested by {})", .requested_by.join(", "))]
    MissingBinding {
        key: String,
        component: String,
        requested_by: Vec<String>,
    },

    #[error("{key} is bound multiple times in {component}: {}", .declarations.join("; "))]
    DuplicateBinding {
        key: String,
        component: String,
        declarations: Vec<String>,
    },

    #[error("Dependency cycle in {component}: {}", .cycle.join(" → "))]
    UnbreakableCycle { component: String, cycle: Vec<String> },

    #[error("{binding} is scoped {scope} but {component} has {}", .component_scope.as_deref().unwrap_or("no scope"))]
    IllegalScopeReference {
        binding: String,
        scope: String,
        component: String,
        component_scope: Option<String>,
    },

    #[error("{requested_by} in {component} depends on {binding} owned by {owner}, which is not an ancestor")]
    CrossComponentReference {
        requested_by: String,
        component: String,
        binding: String,
        owner: String,
    },

    #[error("{key} has duplicate map key '{map_key}': {}", .declarations.join("; "))]
    DuplicateMapKey {
        key: String,
        map_key: String,
        declarations: Vec<String>,
    },
}

/// Category of a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum FindingCategory {
    MissingBinding,
    DuplicateBinding,
    UnbreakableCycle,
    IllegalScopeReference,
    CrossComponentReference,
    DuplicateMapKey,
}

impl fmt::Display for FindingCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl Finding {
    pub fn category(&self) -> FindingCategory {
        match self {
            Finding::MissingBinding { .. } => FindingCategory::MissingBinding,
            Finding::DuplicateBinding { .. } => FindingCategory::DuplicateBinding,
            Finding::UnbreakableCycle { .. } => FindingCategory::UnbreakableCycle,
            Finding::IllegalScopeReference { .. } => FindingCategory::IllegalScopeReference,
            Finding::CrossComponentReference { .. } => FindingCategory::CrossComponentReference,
            Finding::DuplicateMapKey { .. } => FindingCategory::DuplicateMapKey,
        }
    }

    /// Identity used when the same problem is raised from several components
    fn dedupe_key(&self) -> String {
        match self {
            Finding::MissingBinding { key, .. } => format!("missing:{}", key),
            Finding::DuplicateBinding { key, declarations, .. } => {
                format!("duplicate:{}:{}", key, declarations.join(";"))
            }
            Finding::UnbreakableCycle { cycle, .. } => format!("cycle:{}", cycle.join(">")),
            other => format!("{:?}", other),
        }
    }
}

/// Collapse findings raised for the same problem from several components
///
/// Request sites of collapsed missing bindings are merged into the first one.
fn dedupe(findings: Vec<Finding>) -> Vec<Finding> {
    let mut kept: Vec<Finding> = Vec::with_capacity(findings.len());
    let mut positions: HashMap<String, usize> = HashMap::new();

    for finding in findings {
        let key = finding.dedupe_key();
        match positions.get(&key).and_then(|&position| kept.get_mut(position)) {
            Some(Finding::MissingBinding { requested_by, .. }) => {
                if let Finding::MissingBinding { requested_by: sites, .. } = finding {
                    for site in sites {
                        if !requested_by.contains(&site) {
                            requested_by.push(site);
                        }
                    }
                }
            }
            Some(_) => {}
            None => {
                positions.insert(key, kept.len());
                kept.push(finding);
            }
        }
    }
    kept
}

/// Validates a resolved graph
pub struct Validator<'a> {
    graph: &'a BindingGraph,
    context: &'a ResolutionContext,
}

impl<'a> Validator<'a> {
    /// Create a new validator over a resolved graph
    pub fn new(graph: &'a BindingGraph, context: &'a ResolutionContext) -> Self {
        Self { graph, context }
    }

    /// Run every check and return the findings in a stable order
    pub fn validate(&self) -> Result<Vec<Finding>, CoreError> {
        let mut findings = Vec::new();

        findings.extend(self.missing_bindings()?);
        findings.extend(self.duplicate_bindings()?);
        findings.extend(self.unbreakable_cycles()?);
        findings.extend(self.scope_references()?);
        findings.extend(self.cross_component_references()?);
        findings.extend(self.duplicate_map_keys()?);

        if self.context.config.dedupe_findings {
            findings = dedupe(findings);
        }

        info!(findings = findings.len(), "validation finished");
        for finding in &findings {
            debug!(category = %finding.category(), "{}", finding);
        }

        Ok(findings)
    }

    fn component_name(&self, id: ComponentId) -> Result<String, CoreError> {
        Ok(self.graph.component(id)?.name.clone())
    }

    fn missing_bindings(&self) -> Result<Vec<Finding>, CoreError> {
        let mut findings = Vec::new();
        for (id, node) in self.graph.nodes() {
            if let crate::graph::NodeKind::Missing { key } = &node.kind {
                findings.push(Finding::MissingBinding {
                    key: key.to_string(),
                    component: self.component_name(node.owner)?,
                    requested_by: self.graph.request_sites(id),
                });
            }
        }
        Ok(findings)
    }

    fn duplicate_bindings(&self) -> Result<Vec<Finding>, CoreError> {
        let mut findings = Vec::new();
        for (_, conflict) in self.graph.conflicts() {
            findings.push(Finding::DuplicateBinding {
                key: conflict.key.to_string(),
                component: self.component_name(conflict.component)?,
                declarations: conflict.candidates.iter().map(|b| b.describe()).collect(),
            });
        }
        Ok(findings)
    }

    fn unbreakable_cycles(&self) -> Result<Vec<Finding>, CoreError> {
        let successors = successors(self.graph, false)?;
        let mut findings = Vec::new();

        for scc in strongly_connected(&successors)? {
            if !is_cyclic(&scc, &successors) {
                continue;
            }
            let start = scc.iter().copied().min().unwrap_or_default();
            let path = cycle_through(start, &scc, &successors);
            let mut cycle = Vec::with_capacity(path.len());
            for index in path {
                cycle.push(self.graph.node(NodeId::from_index(index))?.label());
            }
            let owner = self.graph.node(NodeId::from_index(start))?.owner;
            findings.push(Finding::UnbreakableCycle {
                component: self.component_name(owner)?,
                cycle,
            });
        }

        Ok(findings)
    }

    fn scope_references(&self) -> Result<Vec<Finding>, CoreError> {
        let mut findings = Vec::new();
        for (_, node) in self.graph.nodes() {
            let Some(binding) = node.binding() else { continue };
            let Some(scope) = &binding.scope else { continue };
            let component = self.graph.component(node.owner)?;
            let matches = component
                .scope
                .as_ref()
                .map(|own| self.context.same_scope(own, scope))
                .unwrap_or(false);
            if !matches {
                findings.push(Finding::IllegalScopeReference {
                    binding: binding.describe(),
                    scope: scope.to_string(),
                    component: component.name.clone(),
                    component_scope: component.scope.as_ref().map(|s| s.to_string()),
                });
            }
        }
        Ok(findings)
    }

    fn cross_component_references(&self) -> Result<Vec<Finding>, CoreError> {
        let mut findings = Vec::new();
        for (_, edge) in self.graph.edges() {
            let Some(target) = edge.target_node() else { continue };
            let target = self.graph.node(target)?;
            let from = match &edge.source {
                EdgeSource::Binding(node) => self.graph.node(*node)?.owner,
                EdgeSource::EntryPoint { component, .. } => *component,
            };
            if self.graph.is_ancestor_or_self(target.owner, from) {
                continue;
            }
            findings.push(Finding::CrossComponentReference {
                requested_by: self.graph.describe_source(&edge.source),
                component: self.component_name(from)?,
                binding: target.label(),
                owner: self.component_name(target.owner)?,
            });
        }
        Ok(findings)
    }

    fn duplicate_map_keys(&self) -> Result<Vec<Finding>, CoreError> {
        let mut findings = Vec::new();
        for (_, node) in self.graph.nodes() {
            let Some(binding) = node.binding() else { continue };
            if binding.kind != BindingKind::MultiboundMap {
                continue;
            }

            let mut by_map_key: BTreeMap<&str, Vec<String>> = BTreeMap::new();
            for edge_id in &node.dependencies {
                let Some(target) = self.graph.edge(*edge_id)?.target_node() else { continue };
                let Some(entry) = self.graph.node(target)?.binding() else { continue };
                if let BindingKind::MapEntry { map_key } = &entry.kind {
                    by_map_key.entry(map_key.as_str()).or_default().push(entry.describe());
                }
            }

            for (map_key, declarations) in by_map_key {
                if declarations.len() > 1 {
                    findings.push(Finding::DuplicateMapKey {
                        key: binding.key.to_string(),
                        map_key: map_key.to_string(),
                        declarations,
                    });
                }
            }
        }
        Ok(findings)
    }
}

/// Mark deferred edges that lie on a cycle
///
/// Clears the mark on every other edge, so repeated runs agree.
pub fn mark_cycle_breaking(graph: &mut BindingGraph) -> Result<usize, CoreError> {
    let successors = successors(graph, true)?;
    let mut membership = vec![None; graph.node_count()];
    for (index, scc) in strongly_connected(&successors)?.into_iter().enumerate() {
        if is_cyclic(&scc, &successors) {
            for node in scc {
                membership[node] = Some(index);
            }
        }
    }

    let mut marked = 0;
    for edge in graph.edges_mut() {
        let source = edge
            .source_node()
            .and_then(|n| membership.get(n.index()).copied().flatten());
        let target = edge
            .target_node()
            .and_then(|n| membership.get(n.index()).copied().flatten());
        edge.cycle_breaking = edge.deferred && source.is_some() && source == target;
        if edge.cycle_breaking {
            marked += 1;
        }
    }

    Ok(marked)
}

/// Adjacency lists by node index, optionally skipping deferred edges
fn successors(graph: &BindingGraph, include_deferred: bool) -> Result<Vec<Vec<usize>>, CoreError> {
    let mut successors = vec![Vec::new(); graph.node_count()];
    for (id, node) in graph.nodes() {
        for edge_id in &node.dependencies {
            let edge = graph.edge(*edge_id)?;
            if edge.deferred && !include_deferred {
                continue;
            }
            if let Some(target) = edge.target_node() {
                successors[id.index()].push(target.index());
            }
        }
    }
    Ok(successors)
}

/// Tarjan's strongly connected components, without recursion
fn strongly_connected(successors: &[Vec<usize>]) -> Result<Vec<Vec<usize>>, CoreError> {
    let count = successors.len();
    let mut index: Vec<Option<usize>> = vec![None; count];
    let mut lowlink = vec![0; count];
    let mut on_stack = vec![false; count];
    let mut stack = Vec::new();
    let mut next = 0;
    let mut components = Vec::new();

    for start in 0..count {
        if index[start].is_some() {
            continue;
        }
        index[start] = Some(next);
        lowlink[start] = next;
        next += 1;
        stack.push(start);
        on_stack[start] = true;
        let mut work = vec![(start, 0usize)];

        while let Some(&(v, position)) = work.last() {
            if let Some(&w) = successors[v].get(position) {
                if let Some(frame) = work.last_mut() {
                    frame.1 += 1;
                }
                match index[w] {
                    None => {
                        index[w] = Some(next);
                        lowlink[w] = next;
                        next += 1;
                        stack.push(w);
                        on_stack[w] = true;
                        work.push((w, 0));
                    }
                    Some(w_index) if on_stack[w] => {
                        lowlink[v] = lowlink[v].min(w_index);
                    }
                    Some(_) => {}
                }
                continue;
            }

            work.pop();
            if let Some(&(parent, _)) = work.last() {
                lowlink[parent] = lowlink[parent].min(lowlink[v]);
            }
            if index[v] == Some(lowlink[v]) {
                let mut component = Vec::new();
                loop {
                    let w = stack
                        .pop()
                        .ok_or_else(|| CoreError::invariant("tarjan stack exhausted before its root"))?;
                    on_stack[w] = false;
                    component.push(w);
                    if w == v {
                        break;
                    }
                }
                components.push(component);
            }
        }
    }

    Ok(components)
}

fn is_cyclic(scc: &[usize], successors: &[Vec<usize>]) -> bool {
    match scc {
        [single] => successors[*single].contains(single),
        _ => scc.len() > 1,
    }
}

/// A shortest cycle through `start` inside one strongly connected component
///
/// The returned path begins and ends with `start`.
fn cycle_through(start: usize, scc: &[usize], successors: &[Vec<usize>]) -> Vec<usize> {
    if successors[start].contains(&start) {
        return vec![start, start];
    }

    let members: HashSet<usize> = scc.iter().copied().collect();
    let mut parent: HashMap<usize, usize> = HashMap::new();
    let mut queue = VecDeque::from([start]);

    while let Some(v) = queue.pop_front() {
        for &w in &successors[v] {
            if w == start {
                let mut path = vec![v];
                let mut current = v;
                while let Some(&p) = parent.get(&current) {
                    path.push(p);
                    current = p;
                }
                path.reverse();
                path.push(start);
                return path;
            }
            if members.contains(&w) && !parent.contains_key(&w) && w != start {
                parent.insert(w, v);
                queue.push_back(w);
            }
        }
    }

    vec![start]
}
