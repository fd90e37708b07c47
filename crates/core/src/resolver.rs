//! Graph resolution
//!
//! Starting from a root component's entry points, resolves every request to
//! exactly one binding, a missing-binding node or a conflict, then resolves
//! each adopted binding's own dependencies in the context of the component
//! that owns it. Child components are entered after their parent's
//! worklist drains, so they always see the parent's resolved prefix.
//!
//! Every (component, key) pair is resolved at most once, which bounds the
//! work and makes dependency cycles show up as graph cycles instead of
//! recursion.

use std::collections::{HashMap, VecDeque};

use tracing::{debug, info};

use crate::context::ResolutionContext;
use crate::errors::CoreError;
use crate::graph::{
    BindingGraph, ComponentGraph, ComponentId, Conflict, EdgeSource, EdgeTarget, NodeId, NodeKind,
};
use crate::index::{BindingIndex, Candidate};
use crate::model::{
    Binding, BindingKey, BindingKind, ComponentDescriptor, DependencyRequest, Key,
    MultibindingKind, OptionalDeclaration,
};

/// Resolves one root component tree into a [`BindingGraph`]
///
/// A resolver owns its index and memo tables and is consumed by
/// [`resolve`](Resolver::resolve), so no cache outlives its run.
pub struct Resolver<'a> {
    context: &'a ResolutionContext,
    index: BindingIndex,
    graph: BindingGraph,
    frames: Vec<HashMap<BindingKey, EdgeTarget>>,
    descriptors: Vec<ComponentDescriptor>,
    entered: HashMap<(ComponentId, String), ComponentId>,
    pending_components: VecDeque<ComponentId>,
    worklist: VecDeque<NodeId>,
}

impl<'a> Resolver<'a> {
    /// Create a resolver for one run
    pub fn new(context: &'a ResolutionContext) -> Self {
        Self {
            context,
            index: BindingIndex::new(context.oracle.clone()),
            graph: BindingGraph::new(),
            frames: Vec::new(),
            descriptors: Vec::new(),
            entered: HashMap::new(),
            pending_components: VecDeque::new(),
            worklist: VecDeque::new(),
        }
    }

    /// Resolve the component tree rooted at `root`
    pub fn resolve(mut self, root: &ComponentDescriptor) -> Result<BindingGraph, CoreError> {
        self.enter_component(root.clone(), None)?;

        loop {
            while let Some(node) = self.worklist.pop_front() {
                self.resolve_dependencies(node)?;
            }
            match self.pending_components.pop_front() {
                Some(component) => self.seed_entry_points(component)?,
                None => break,
            }
        }

        info!(
            nodes = self.graph.node_count(),
            edges = self.graph.edge_count(),
            components = self.graph.component_count(),
            "resolution finished"
        );
        Ok(self.graph)
    }

    fn enter_component(
        &mut self,
        descriptor: ComponentDescriptor,
        parent: Option<ComponentId>,
    ) -> Result<ComponentId, CoreError> {
        let mut component = ComponentGraph::new(descriptor.name.clone(), descriptor.scope.clone(), parent);
        component.production = descriptor.production;
        let id = self.graph.add_component(component);

        let modules = self.index.add_component(id, parent, &descriptor)?;
        self.graph.component_mut(id)?.modules = modules;
        self.frames.push(HashMap::new());

        debug!(component = %descriptor.name, id = %id, "entered component");

        if let Some(parent) = parent {
            self.entered.insert((parent, descriptor.name.clone()), id);
        }
        let children = descriptor.children.clone();
        self.descriptors.push(descriptor);
        self.pending_components.push_back(id);

        // Factory-method children are always part of the graph
        for child in children {
            self.enter_child(id, child)?;
        }

        Ok(id)
    }

    fn enter_child(&mut self, parent: ComponentId, descriptor: ComponentDescriptor) -> Result<ComponentId, CoreError> {
        match self.entered.get(&(parent, descriptor.name.clone())) {
            Some(id) => Ok(*id),
            None => self.enter_component(descriptor, Some(parent)),
        }
    }

    fn seed_entry_points(&mut self, component: ComponentId) -> Result<(), CoreError> {
        let entry_points = self
            .descriptors
            .get(component.index())
            .map(|descriptor| descriptor.entry_points.clone())
            .ok_or_else(|| CoreError::invariant(format!("component {} has no descriptor", component)))?;

        for entry_point in entry_points {
            let target = self.resolve_request(component, &entry_point.request)?;
            self.graph.add_edge(
                EdgeSource::EntryPoint {
                    component,
                    method: entry_point.method,
                },
                component,
                entry_point.request,
                target,
            )?;
        }
        Ok(())
    }

    fn resolve_dependencies(&mut self, node: NodeId) -> Result<(), CoreError> {
        let (owner, dependencies) = {
            let node = self.graph.node(node)?;
            match node.binding() {
                Some(binding) => (node.owner, binding.dependencies.clone()),
                None => return Ok(()),
            }
        };

        for request in dependencies {
            let target = self.resolve_request(owner, &request)?;
            self.graph.add_edge(EdgeSource::Binding(node), owner, request, target)?;
        }
        Ok(())
    }

    fn frame(&self, component: ComponentId) -> Result<&HashMap<BindingKey, EdgeTarget>, CoreError> {
        self.frames
            .get(component.index())
            .ok_or_else(|| CoreError::invariant(format!("component {} has no resolution frame", component)))
    }

    fn remember(&mut self, component: ComponentId, key: BindingKey, target: EdgeTarget) -> Result<(), CoreError> {
        self.frames
            .get_mut(component.index())
            .ok_or_else(|| CoreError::invariant(format!("component {} has no resolution frame", component)))?
            .insert(key, target);
        Ok(())
    }

    /// Resolve a request as seen from `component`
    fn resolve_request(&mut self, component: ComponentId, request: &DependencyRequest) -> Result<EdgeTarget, CoreError> {
        let key = request.binding_key();
        if let Some(target) = self.frame(component)?.get(&key).copied() {
            return Ok(target);
        }

        // Reuse the nearest ancestor's resolution unless something in
        // between declares the key itself
        if !self.index.declares_locally(component, &key)? {
            for ancestor in self.index.ancestry(component).into_iter().skip(1) {
                if let Some(target) = self.frame(ancestor)?.get(&key).copied() {
                    self.remember(component, key, target)?;
                    return Ok(target);
                }
                if self.index.declares_locally(ancestor, &key)? {
                    break;
                }
            }
        }

        let target = self.resolve_key(component, &key)?;
        self.remember(component, key, target)?;
        Ok(target)
    }

    fn resolve_key(&mut self, component: ComponentId, key: &BindingKey) -> Result<EdgeTarget, CoreError> {
        match key {
            BindingKey::Provision(key) => self.resolve_provision(component, key),
            BindingKey::MembersInjection(inner) => {
                let mut explicit = self.index.candidates_for(component, key)?;
                if explicit.len() > 1 {
                    return self.conflict(component, key.clone(), explicit);
                }
                if let Some(candidate) = explicit.pop() {
                    return self.adopt(component, candidate);
                }
                match self.index.members_injection_binding(inner) {
                    Some(binding) => self.adopt(component, Candidate { binding, level: None }),
                    None => self.missing(component, key.clone()),
                }
            }
        }
    }

    fn resolve_provision(&mut self, component: ComponentId, key: &Key) -> Result<EdgeTarget, CoreError> {
        let binding_key = BindingKey::Provision(key.clone());

        if key.is_contribution() {
            return match self.index.contribution(component, key)? {
                Some(candidate) => self.adopt(component, candidate),
                None => self.missing(component, binding_key),
            };
        }

        let mut explicit = self.index.candidates_for(component, &binding_key)?;

        if let Some(kind) = self.index.multibinding_kind(component, key)? {
            let contributions = self.index.contributions_for(component, key)?;
            if !explicit.is_empty() {
                explicit.extend(contributions);
                return self.conflict(component, binding_key, explicit);
            }
            return self.synthesize_multibinding(component, key, kind, contributions);
        }

        if let Some(underlying) = key.optional_value() {
            if let Some(declaration) = self.index.optional_declaration(component, &underlying)?.cloned() {
                let optional = self.optional_binding(component, key, underlying, declaration)?;
                if !explicit.is_empty() {
                    explicit.push(optional);
                    return self.conflict(component, binding_key, explicit);
                }
                return self.adopt(component, optional);
            }
        }

        match explicit.len() {
            0 => match self.index.implicit_binding(key) {
                Some(binding) => self.adopt(component, Candidate { binding, level: None }),
                None => self.missing(component, binding_key),
            },
            1 => match explicit.pop() {
                Some(candidate) => self.adopt(component, candidate),
                None => Err(CoreError::invariant("single candidate vanished")),
            },
            _ => self.conflict(component, binding_key, explicit),
        }
    }

    fn synthesize_multibinding(
        &mut self,
        component: ComponentId,
        key: &Key,
        kind: MultibindingKind,
        contributions: Vec<Candidate>,
    ) -> Result<EdgeTarget, CoreError> {
        let collection = match kind {
            MultibindingKind::Set => BindingKind::MultiboundSet,
            MultibindingKind::Map => BindingKind::MultiboundMap,
        };
        let mut binding = Binding::new(key.clone(), collection);
        for contribution in &contributions {
            binding = binding.with_dependency(DependencyRequest::instance(contribution.binding.key.clone()));
        }

        debug!(key = %key, contributions = contributions.len(), "synthesized multibinding");
        self.adopt(component, Candidate { binding, level: None })
    }

    fn optional_binding(
        &mut self,
        component: ComponentId,
        key: &Key,
        underlying: Key,
        declaration: OptionalDeclaration,
    ) -> Result<Candidate, CoreError> {
        let mut binding = if self.index.is_bound(component, &underlying)? {
            Binding::new(key.clone(), BindingKind::OptionalPresent).depends_on(underlying)
        } else {
            Binding::new(key.clone(), BindingKind::OptionalAbsent)
        };
        binding.element = declaration.element;
        Ok(Candidate { binding, level: None })
    }

    /// The component that owns a binding requested from `component`
    fn owner_for(&self, component: ComponentId, candidate: &Candidate) -> Result<ComponentId, CoreError> {
        let binding = &candidate.binding;
        match binding.kind {
            BindingKind::Component
            | BindingKind::ComponentDependency
            | BindingKind::ComponentProvision
            | BindingKind::BoundInstance
            | BindingKind::SubcomponentCreator { .. } => {
                return candidate.level.ok_or_else(|| {
                    CoreError::invariant(format!("{} has no declaring component", binding.describe()))
                });
            }
            _ => {}
        }

        let Some(scope) = &binding.scope else {
            return Ok(component);
        };

        // Nearest matching scope, but never above the declaring component
        for level in self.index.ancestry(component) {
            if let Some(own) = self.index.scope(level)? {
                if self.context.same_scope(own, scope) {
                    return Ok(level);
                }
            }
            if Some(level) == candidate.level {
                break;
            }
        }

        // No match: stays with the requester and is reported by validation
        Ok(component)
    }

    fn adopt(&mut self, component: ComponentId, candidate: Candidate) -> Result<EdgeTarget, CoreError> {
        let key = match candidate.binding.kind {
            BindingKind::MembersInjection => BindingKey::MembersInjection(candidate.binding.key.clone()),
            _ => BindingKey::Provision(candidate.binding.key.clone()),
        };
        let owner = self.owner_for(component, &candidate)?;

        if owner != component {
            if let Some(target) = self.frame(owner)?.get(&key).copied() {
                self.remember(component, key, target)?;
                return Ok(target);
            }
        }

        let creates = match &candidate.binding.kind {
            BindingKind::SubcomponentCreator { component } => Some(component.clone()),
            _ => None,
        };

        let node = self.graph.add_node(NodeKind::Binding(candidate.binding), owner);
        let target = EdgeTarget::Node(node);
        self.remember(owner, key.clone(), target)?;
        self.remember(component, key, target)?;
        self.worklist.push_back(node);

        if let Some(name) = creates {
            self.activate_subcomponent(owner, &name)?;
        }

        Ok(target)
    }

    fn activate_subcomponent(&mut self, owner: ComponentId, name: &str) -> Result<(), CoreError> {
        let descriptor = self
            .index
            .subcomponent(owner, name)?
            .cloned()
            .ok_or_else(|| CoreError::invariant(format!("subcomponent '{}' is not declared by {}", name, owner)))?;

        debug!(subcomponent = %name, parent = %owner, "activated module-declared subcomponent");
        self.enter_child(owner, descriptor)?;
        Ok(())
    }

    fn missing(&mut self, component: ComponentId, key: BindingKey) -> Result<EdgeTarget, CoreError> {
        let node = self.graph.add_node(NodeKind::Missing { key: key.clone() }, component);
        let target = EdgeTarget::Node(node);
        self.remember(component, key, target)?;
        Ok(target)
    }

    fn conflict(
        &mut self,
        component: ComponentId,
        key: BindingKey,
        candidates: Vec<Candidate>,
    ) -> Result<EdgeTarget, CoreError> {
        let conflict = self.graph.add_conflict(Conflict {
            key: key.clone(),
            component,
            candidates: candidates.into_iter().map(|c| c.binding).collect(),
        });
        let target = EdgeTarget::Conflict(conflict);
        self.remember(component, key, target)?;
        Ok(target)
    }
}
