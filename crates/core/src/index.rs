//! Binding index
//!
//! One level per component, each holding the declarations that component
//! adds on top of its ancestors. Lookups walk from a component up to the
//! root. Implicit constructor bindings are synthesized on first request and
//! memoized for the lifetime of the index, which is one resolution run.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use crate::context::TypeOracle;
use crate::errors::CoreError;
use crate::graph::ComponentId;
use crate::model::binding::declaration_order;
use crate::model::{
    Binding, BindingElement, BindingKey, BindingKind, ComponentDescriptor, ContributionId, Key,
    MultibindingKind, OptionalDeclaration, Scope,
};

/// A binding together with the component whose declarations produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub binding: Binding,
    /// `None` for implicit constructor bindings
    pub level: Option<ComponentId>,
}

#[derive(Debug, Default)]
struct Level {
    parent: Option<ComponentId>,
    scope: Option<Scope>,
    modules: Vec<String>,
    explicit: IndexMap<BindingKey, Vec<Binding>>,
    component_bindings: IndexMap<Key, Vec<Binding>>,
    contributions: IndexMap<Key, Vec<Binding>>,
    multibindings: IndexMap<Key, MultibindingKind>,
    optionals: IndexMap<Key, OptionalDeclaration>,
    subcomponents: IndexMap<String, ComponentDescriptor>,
}

/// Key to candidate bindings lookup for a tree of components
pub struct BindingIndex {
    oracle: Arc<dyn TypeOracle>,
    levels: Vec<Level>,
    implicit: HashMap<Key, Option<Binding>>,
    members: HashMap<Key, Option<Binding>>,
}

impl BindingIndex {
    /// Create an empty index
    pub fn new(oracle: Arc<dyn TypeOracle>) -> Self {
        Self {
            oracle,
            levels: Vec::new(),
            implicit: HashMap::new(),
            members: HashMap::new(),
        }
    }

    /// Index the declarations a component adds to its parent's
    ///
    /// Modules already installed by an ancestor are skipped. Returns the
    /// names of the modules this level installs.
    pub fn add_component(
        &mut self,
        id: ComponentId,
        parent: Option<ComponentId>,
        descriptor: &ComponentDescriptor,
    ) -> Result<Vec<String>, CoreError> {
        if id.index() != self.levels.len() {
            return Err(CoreError::invariant(format!(
                "component {} indexed out of order (expected c{})",
                id,
                self.levels.len()
            )));
        }

        let inherited: HashSet<&str> = match parent {
            Some(parent) => self
                .ancestry(parent)
                .into_iter()
                .filter_map(|level| self.levels.get(level.index()))
                .flat_map(|level| level.modules.iter().map(String::as_str))
                .collect(),
            None => HashSet::new(),
        };

        let mut level = Level {
            parent,
            scope: descriptor.scope.clone(),
            ..Level::default()
        };

        for module in descriptor.installed_modules() {
            if inherited.contains(module.name.as_str()) {
                continue;
            }
            level.modules.push(module.name.clone());

            for binding in &module.bindings {
                let mut binding = binding.clone();
                if binding.contributing_module.is_none() {
                    binding.contributing_module = Some(module.name.clone());
                }
                if binding.kind.is_contribution() {
                    level.contributions.entry(binding.key.clone()).or_default().push(binding);
                } else {
                    let key = match binding.kind {
                        BindingKind::MembersInjection => BindingKey::MembersInjection(binding.key.clone()),
                        _ => BindingKey::Provision(binding.key.clone()),
                    };
                    level.explicit.entry(key).or_default().push(binding);
                }
            }

            for declaration in &module.multibinding_declarations {
                level
                    .multibindings
                    .entry(declaration.key.clone())
                    .or_insert(declaration.kind);
            }

            for declaration in &module.optional_declarations {
                level
                    .optionals
                    .entry(declaration.key.clone())
                    .or_insert_with(|| declaration.clone());
            }

            for subcomponent in &module.subcomponents {
                let key = subcomponent.creator_key();
                let creator = Binding::new(
                    key.clone(),
                    BindingKind::SubcomponentCreator {
                        component: subcomponent.name.clone(),
                    },
                )
                .with_element(BindingElement::new(module.name.clone(), subcomponent.name.clone()))
                .with_contributing_module(module.name.clone());
                level.component_bindings.entry(key).or_default().push(creator);
                level
                    .subcomponents
                    .entry(subcomponent.name.clone())
                    .or_insert_with(|| subcomponent.clone());
            }
        }

        Self::index_component_bindings(&mut level, descriptor);

        let modules = level.modules.clone();
        self.levels.push(level);
        Ok(modules)
    }

    fn index_component_bindings(level: &mut Level, descriptor: &ComponentDescriptor) {
        let component = Binding::new(descriptor.component_key(), BindingKind::Component)
            .with_element(BindingElement::new(descriptor.name.clone(), "<component>"));
        level
            .component_bindings
            .entry(component.key.clone())
            .or_default()
            .push(component);

        for dependency in &descriptor.dependencies {
            let dependency_key = Key::new(dependency.ty.clone());
            let instance = Binding::new(dependency_key.clone(), BindingKind::ComponentDependency)
                .with_element(BindingElement::new(descriptor.name.clone(), dependency.ty.to_string()));
            level
                .component_bindings
                .entry(dependency_key.clone())
                .or_default()
                .push(instance);

            for provision in &dependency.provisions {
                let binding = Binding::new(provision.key.clone(), BindingKind::ComponentProvision)
                    .depends_on(dependency_key.clone())
                    .with_element(BindingElement::new(dependency.ty.to_string(), provision.method.clone()));
                level
                    .component_bindings
                    .entry(provision.key.clone())
                    .or_default()
                    .push(binding);
            }
        }

        for bound in &descriptor.bound_instances {
            let binding = Binding::new(bound.key.clone(), BindingKind::BoundInstance)
                .with_element(BindingElement::new(descriptor.name.clone(), bound.parameter.clone()));
            level
                .component_bindings
                .entry(bound.key.clone())
                .or_default()
                .push(binding);
        }
    }

    fn level(&self, id: ComponentId) -> Result<&Level, CoreError> {
        self.levels
            .get(id.index())
            .ok_or_else(|| CoreError::invariant(format!("component {} has no index level", id)))
    }

    /// `id` followed by its ancestors, nearest first
    pub fn ancestry(&self, id: ComponentId) -> Vec<ComponentId> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(level_id) = current {
            chain.push(level_id);
            current = self.levels.get(level_id.index()).and_then(|level| level.parent);
        }
        chain
    }

    pub fn scope(&self, id: ComponentId) -> Result<Option<&Scope>, CoreError> {
        Ok(self.level(id)?.scope.as_ref())
    }

    /// Explicit candidates for a key
    ///
    /// Local module bindings come first, then inherited ones nearest first,
    /// then component-level bindings in the same order. Implicit bindings
    /// are looked up separately through [`implicit_binding`](Self::implicit_binding).
    pub fn candidates_for(&self, id: ComponentId, key: &BindingKey) -> Result<Vec<Candidate>, CoreError> {
        let ancestry = self.ancestry(id);
        let mut candidates = Vec::new();

        for level_id in &ancestry {
            if let Some(bindings) = self.level(*level_id)?.explicit.get(key) {
                candidates.extend(bindings.iter().map(|binding| Candidate {
                    binding: binding.clone(),
                    level: Some(*level_id),
                }));
            }
        }

        if let BindingKey::Provision(key) = key {
            for level_id in &ancestry {
                if let Some(bindings) = self.level(*level_id)?.component_bindings.get(key) {
                    candidates.extend(bindings.iter().map(|binding| Candidate {
                        binding: binding.clone(),
                        level: Some(*level_id),
                    }));
                }
            }
        }

        Ok(candidates)
    }

    /// Every contribution to a multibound key visible from `id`
    ///
    /// Deduplicated by declaration identity, ordered by declaration, and
    /// rekeyed to per-contribution keys.
    pub fn contributions_for(&self, id: ComponentId, key: &Key) -> Result<Vec<Candidate>, CoreError> {
        let mut seen = HashSet::new();
        let mut contributions = Vec::new();

        for level_id in self.ancestry(id) {
            if let Some(bindings) = self.level(level_id)?.contributions.get(key) {
                for binding in bindings {
                    if seen.insert(binding.identity()) {
                        contributions.push((binding, level_id));
                    }
                }
            }
        }

        contributions.sort_by(|(a, _), (b, _)| declaration_order(a, b));

        Ok(contributions
            .into_iter()
            .map(|(binding, level_id)| {
                let mut binding = binding.clone();
                binding.key = binding.key.for_contribution(contribution_id(&binding));
                Candidate {
                    binding,
                    level: Some(level_id),
                }
            })
            .collect())
    }

    /// The contribution behind one per-contribution key
    pub fn contribution(&self, id: ComponentId, key: &Key) -> Result<Option<Candidate>, CoreError> {
        let contributions = self.contributions_for(id, &key.without_contribution())?;
        Ok(contributions.into_iter().find(|candidate| &candidate.binding.key == key))
    }

    /// Set or map, if the key is multibound as seen from `id`
    pub fn multibinding_kind(&self, id: ComponentId, key: &Key) -> Result<Option<MultibindingKind>, CoreError> {
        for level_id in self.ancestry(id) {
            if let Some(kind) = self.level(level_id)?.multibindings.get(key) {
                return Ok(Some(*kind));
            }
        }
        for level_id in self.ancestry(id) {
            if let Some(first) = self.level(level_id)?.contributions.get(key).and_then(|b| b.first()) {
                return Ok(Some(match first.kind {
                    BindingKind::MapEntry { .. } => MultibindingKind::Map,
                    _ => MultibindingKind::Set,
                }));
            }
        }
        Ok(None)
    }

    /// The optional declaration for an underlying key, nearest first
    pub fn optional_declaration(&self, id: ComponentId, underlying: &Key) -> Result<Option<&OptionalDeclaration>, CoreError> {
        for level_id in self.ancestry(id) {
            if let Some(declaration) = self.level(level_id)?.optionals.get(underlying) {
                return Ok(Some(declaration));
            }
        }
        Ok(None)
    }

    /// Whether anything can satisfy `key` as seen from `id`
    pub fn is_bound(&mut self, id: ComponentId, key: &Key) -> Result<bool, CoreError> {
        let binding_key = BindingKey::Provision(key.clone());
        if !self.candidates_for(id, &binding_key)?.is_empty()
            || self.multibinding_kind(id, key)?.is_some()
        {
            return Ok(true);
        }
        if let Some(underlying) = key.optional_value() {
            if self.optional_declaration(id, &underlying)?.is_some() {
                return Ok(true);
            }
        }
        Ok(self.implicit_binding(key).is_some())
    }

    /// Whether `id` itself, not an ancestor, declares anything for `key`
    ///
    /// A component that declares nothing locally for a key can reuse its
    /// ancestors' resolution of it.
    pub fn declares_locally(&self, id: ComponentId, key: &BindingKey) -> Result<bool, CoreError> {
        let level = self.level(id)?;
        if level.explicit.contains_key(key) {
            return Ok(true);
        }
        let BindingKey::Provision(key) = key else {
            return Ok(false);
        };

        if key.is_contribution() {
            let local = level
                .contributions
                .get(&key.without_contribution())
                .map(|bindings| {
                    bindings
                        .iter()
                        .any(|b| &key.without_contribution().for_contribution(contribution_id(b)) == key)
                })
                .unwrap_or(false);
            return Ok(local);
        }

        if level.component_bindings.contains_key(key)
            || level.contributions.contains_key(key)
            || level.multibindings.contains_key(key)
        {
            return Ok(true);
        }

        match key.optional_value() {
            Some(underlying) => Ok(level.optionals.contains_key(&underlying)
                || self.declares_locally(id, &BindingKey::Provision(underlying))?),
            None => Ok(false),
        }
    }

    /// The implicit constructor binding for a key, memoized
    pub fn implicit_binding(&mut self, key: &Key) -> Option<Binding> {
        if key.qualifier.is_some() || key.is_contribution() {
            return None;
        }
        if let Some(memo) = self.implicit.get(key) {
            return memo.clone();
        }

        let binding = self.oracle.inject_constructor(&key.ty).map(|constructor| {
            debug!(key = %key, "synthesized implicit constructor binding");
            let mut binding = Binding::new(key.clone(), BindingKind::Injection);
            binding.dependencies = constructor.dependencies;
            binding.scope = constructor.scope;
            binding.element = constructor.element;
            binding
        });
        self.implicit.insert(key.clone(), binding.clone());
        binding
    }

    /// The members-injection binding for a key, memoized
    pub fn members_injection_binding(&mut self, key: &Key) -> Option<Binding> {
        if let Some(memo) = self.members.get(key) {
            return memo.clone();
        }

        let binding = self.oracle.members_injector(&key.ty).map(|members| {
            let mut binding = Binding::new(key.clone(), BindingKind::MembersInjection)
                .with_element(BindingElement::new(key.ty.to_string(), "<members>"));
            binding.dependencies = members;
            binding
        });
        self.members.insert(key.clone(), binding.clone());
        binding
    }

    /// The descriptor of a subcomponent declared by a module at `level`
    pub fn subcomponent(&self, level: ComponentId, name: &str) -> Result<Option<&ComponentDescriptor>, CoreError> {
        Ok(self.level(level)?.subcomponents.get(name))
    }
}

/// Identity of a contribution inside its multibound key
pub fn contribution_id(binding: &Binding) -> ContributionId {
    let module = binding
        .contributing_module
        .clone()
        .or_else(|| binding.element.as_ref().map(|e| e.enclosing_type.clone()))
        .unwrap_or_default();
    let element = match (&binding.element, &binding.kind) {
        (Some(element), _) => match &element.signature {
            Some(signature) => format!("{}{}", element.name, signature),
            None => element.name.clone(),
        },
        (None, BindingKind::MapEntry { map_key }) => map_key.clone(),
        (None, kind) => kind.to_string(),
    };
    ContributionId { module, element }
}
