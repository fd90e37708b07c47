use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::model::binding::{Binding, BindingElement};
use crate::model::component::ComponentDescriptor;
use crate::model::key::Key;

/// Kind of collection a multibinding declaration announces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultibindingKind {
    Set,
    Map,
}

/// Declares that a multibound key may legally have zero contributions
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MultibindingDeclaration {
    pub key: Key,
    pub kind: MultibindingKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element: Option<BindingElement>,
}

impl MultibindingDeclaration {
    /// Create a set declaration
    pub fn set(key: Key) -> Self {
        Self {
            key,
            kind: MultibindingKind::Set,
            element: None,
        }
    }

    /// Create a map declaration
    pub fn map(key: Key) -> Self {
        Self {
            key,
            kind: MultibindingKind::Map,
            element: None,
        }
    }
}

/// Declares that `Optional<key>` is bindable whether or not `key` is
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OptionalDeclaration {
    /// The underlying key, not the `Optional<T>` wrapper
    pub key: Key,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element: Option<BindingElement>,
}

impl OptionalDeclaration {
    /// Create an optional declaration for the underlying key
    pub fn new(key: Key) -> Self {
        Self { key, element: None }
    }
}

/// A named set of binding declarations, plus the modules it includes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    pub name: String,
    #[serde(default)]
    pub bindings: Vec<Binding>,
    #[serde(default)]
    pub multibinding_declarations: Vec<MultibindingDeclaration>,
    #[serde(default)]
    pub optional_declarations: Vec<OptionalDeclaration>,
    /// Subcomponents made available by this module through their creators
    #[serde(default)]
    pub subcomponents: Vec<ComponentDescriptor>,
    #[serde(default)]
    pub includes: Vec<ModuleDescriptor>,
}

impl ModuleDescriptor {
    /// Create a new empty module
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bindings: Vec::new(),
            multibinding_declarations: Vec::new(),
            optional_declarations: Vec::new(),
            subcomponents: Vec::new(),
            includes: Vec::new(),
        }
    }

    /// Add a binding declaration
    pub fn with_binding(mut self, binding: Binding) -> Self {
        self.bindings.push(binding);
        self
    }

    /// Add a multibinding declaration
    pub fn with_multibinding(mut self, declaration: MultibindingDeclaration) -> Self {
        self.multibinding_declarations.push(declaration);
        self
    }

    /// Add an optional binding declaration
    pub fn with_optional(mut self, declaration: OptionalDeclaration) -> Self {
        self.optional_declarations.push(declaration);
        self
    }

    /// Declare a subcomponent installed through this module
    pub fn with_subcomponent(mut self, subcomponent: ComponentDescriptor) -> Self {
        self.subcomponents.push(subcomponent);
        self
    }

    /// Include another module
    pub fn with_include(mut self, module: ModuleDescriptor) -> Self {
        self.includes.push(module);
        self
    }

    /// This module and every module it includes, transitively
    ///
    /// Each module name appears once, in depth-first preorder.
    pub fn transitive_closure(&self) -> Vec<&ModuleDescriptor> {
        let mut seen = HashSet::new();
        let mut result = Vec::new();
        let mut stack = vec![self];

        while let Some(module) = stack.pop() {
            if !seen.insert(module.name.as_str()) {
                continue;
            }
            result.push(module);
            for include in module.includes.iter().rev() {
                stack.push(include);
            }
        }

        result
    }
}
