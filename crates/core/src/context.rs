//! Explicit resolution context
//!
//! Everything the resolver needs from its environment is handed to it in a
//! [`ResolutionContext`] built once up front and never mutated afterwards.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::ResolverConfig;
use crate::model::{BindingElement, DependencyRequest, Scope, TypeName};

/// A constructor that qualifies for implicit injection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectConstructor {
    #[serde(default)]
    pub dependencies: Vec<DependencyRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element: Option<BindingElement>,
}

impl InjectConstructor {
    /// Create a constructor with no dependencies
    pub fn new() -> Self {
        Self {
            dependencies: Vec::new(),
            scope: None,
            element: None,
        }
    }

    /// Add a constructor parameter
    pub fn with_dependency(mut self, request: DependencyRequest) -> Self {
        self.dependencies.push(request);
        self
    }

    /// Set the scope declared on the type
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }
}

impl Default for InjectConstructor {
    fn default() -> Self {
        Self::new()
    }
}

/// Answers type-level questions the declarations alone cannot
pub trait TypeOracle: Send + Sync {
    /// The injectable constructor of `ty`, if it has one
    fn inject_constructor(&self, ty: &TypeName) -> Option<InjectConstructor>;

    /// The injectable members of `ty`, if it can be members-injected
    fn members_injector(&self, ty: &TypeName) -> Option<Vec<DependencyRequest>>;
}

/// Decides whether two scope annotations mean the same thing
///
/// Only scopes go through this predicate. Qualifiers are compared with the
/// structural `Eq`/`Hash` of [`Key`](crate::model::Key), so two qualifiers
/// match exactly when their names and argument values are equal.
pub trait ScopeEquivalence: Send + Sync {
    fn same_scope(&self, a: &Scope, b: &Scope) -> bool;
}

/// Scopes are equal when names and argument values are equal
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralEquivalence;

impl ScopeEquivalence for StructuralEquivalence {
    fn same_scope(&self, a: &Scope, b: &Scope) -> bool {
        a == b
    }
}

/// Per-type facts recorded by declaration extraction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeFacts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inject_constructor: Option<InjectConstructor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members: Option<Vec<DependencyRequest>>,
}

/// A type oracle backed by a table of extracted type facts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeclaredTypes {
    types: BTreeMap<String, TypeFacts>,
}

impl DeclaredTypes {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an injectable constructor for a type
    pub fn with_constructor(mut self, ty: &TypeName, constructor: InjectConstructor) -> Self {
        self.types.entry(ty.to_string()).or_default().inject_constructor = Some(constructor);
        self
    }

    /// Record the injectable members of a type
    pub fn with_members(mut self, ty: &TypeName, members: Vec<DependencyRequest>) -> Self {
        self.types.entry(ty.to_string()).or_default().members = Some(members);
        self
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl TypeOracle for DeclaredTypes {
    fn inject_constructor(&self, ty: &TypeName) -> Option<InjectConstructor> {
        let facts = self.types.get(&ty.to_string())?;
        let mut constructor = facts.inject_constructor.clone()?;
        if constructor.element.is_none() {
            constructor.element = Some(BindingElement::new(ty.to_string(), "<init>"));
        }
        Some(constructor)
    }

    fn members_injector(&self, ty: &TypeName) -> Option<Vec<DependencyRequest>> {
        let facts = self.types.get(&ty.to_string())?;
        match (&facts.members, &facts.inject_constructor) {
            (Some(members), _) => Some(members.clone()),
            (None, Some(_)) => Some(Vec::new()),
            (None, None) => None,
        }
    }
}

/// Everything a resolution run reads from its environment
#[derive(Clone)]
pub struct ResolutionContext {
    pub oracle: Arc<dyn TypeOracle>,
    pub equivalence: Arc<dyn ScopeEquivalence>,
    pub config: ResolverConfig,
}

impl ResolutionContext {
    /// Create a context with structural scope equality and default config
    pub fn new(oracle: Arc<dyn TypeOracle>) -> Self {
        Self {
            oracle,
            equivalence: Arc::new(StructuralEquivalence),
            config: ResolverConfig::default(),
        }
    }

    /// Create a context over a declared type table
    pub fn with_types(types: DeclaredTypes) -> Self {
        Self::new(Arc::new(types))
    }

    /// Replace the scope equivalence predicate
    pub fn with_equivalence(mut self, equivalence: Arc<dyn ScopeEquivalence>) -> Self {
        self.equivalence = equivalence;
        self
    }

    /// Replace the resolver configuration
    pub fn with_config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn same_scope(&self, a: &Scope, b: &Scope) -> bool {
        self.equivalence.same_scope(a, b)
    }
}

impl Default for ResolutionContext {
    fn default() -> Self {
        Self::with_types(DeclaredTypes::new())
    }
}

impl std::fmt::Debug for ResolutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
