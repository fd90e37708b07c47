use serde::{Deserialize, Serialize};

use crate::model::key::{Key, Scope, TypeName};
use crate::model::module::ModuleDescriptor;
use crate::model::request::DependencyRequest;

/// A public method on a component that exposes a dependency request
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryPoint {
    pub method: String,
    pub request: DependencyRequest,
}

impl EntryPoint {
    /// Create a new entry point
    pub fn new(method: impl Into<String>, request: DependencyRequest) -> Self {
        Self {
            method: method.into(),
            request,
        }
    }
}

/// A provision method exposed by a component dependency
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProvisionMethod {
    pub method: String,
    pub key: Key,
}

/// An external type whose provision methods become bindings
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentDependency {
    #[serde(rename = "type")]
    pub ty: TypeName,
    #[serde(default)]
    pub provisions: Vec<ProvisionMethod>,
}

impl ComponentDependency {
    /// Create a component dependency with no provision methods
    pub fn new(ty: TypeName) -> Self {
        Self {
            ty,
            provisions: Vec::new(),
        }
    }

    /// Add a provision method
    pub fn with_provision(mut self, method: impl Into<String>, key: Key) -> Self {
        self.provisions.push(ProvisionMethod {
            method: method.into(),
            key,
        });
        self
    }
}

/// An instance passed to the component creator
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundInstance {
    pub key: Key,
    /// Creator parameter or setter the instance arrives through
    pub parameter: String,
}

/// A component or subcomponent declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,
    #[serde(default)]
    pub entry_points: Vec<EntryPoint>,
    #[serde(default)]
    pub modules: Vec<ModuleDescriptor>,
    #[serde(default)]
    pub dependencies: Vec<ComponentDependency>,
    #[serde(default)]
    pub bound_instances: Vec<BoundInstance>,
    /// Children declared through factory methods; always part of the graph
    #[serde(default)]
    pub children: Vec<ComponentDescriptor>,
    /// Creator type, used as the key of the creator binding when this is
    /// a module-declared subcomponent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<TypeName>,
    /// Whether the component produces values asynchronously
    #[serde(default)]
    pub production: bool,
}

impl ComponentDescriptor {
    /// Create a new component with no declarations
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scope: None,
            entry_points: Vec::new(),
            modules: Vec::new(),
            dependencies: Vec::new(),
            bound_instances: Vec::new(),
            children: Vec::new(),
            creator: None,
            production: false,
        }
    }

    /// Set the component scope
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Add an entry point
    pub fn with_entry_point(mut self, method: impl Into<String>, request: DependencyRequest) -> Self {
        self.entry_points.push(EntryPoint::new(method, request));
        self
    }

    /// Install a module
    pub fn with_module(mut self, module: ModuleDescriptor) -> Self {
        self.modules.push(module);
        self
    }

    /// Add a component dependency
    pub fn with_dependency(mut self, dependency: ComponentDependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    /// Bind an instance through the creator
    pub fn with_bound_instance(mut self, key: Key, parameter: impl Into<String>) -> Self {
        self.bound_instances.push(BoundInstance {
            key,
            parameter: parameter.into(),
        });
        self
    }

    /// Add a factory-method child
    pub fn with_child(mut self, child: ComponentDescriptor) -> Self {
        self.children.push(child);
        self
    }

    /// Set the creator type
    pub fn with_creator(mut self, creator: TypeName) -> Self {
        self.creator = Some(creator);
        self
    }

    /// Mark this component as a production component
    pub fn production(mut self) -> Self {
        self.production = true;
        self
    }

    /// Key of the binding that hands out this component's creator
    pub fn creator_key(&self) -> Key {
        match &self.creator {
            Some(creator) => Key::new(creator.clone()),
            None => Key::of(format!("{}.Builder", self.name)),
        }
    }

    /// Key of the component instance binding
    pub fn component_key(&self) -> Key {
        Key::of(self.name.clone())
    }

    /// Every module installed here, transitively, deduplicated by name
    pub fn installed_modules(&self) -> Vec<&ModuleDescriptor> {
        let mut seen = std::collections::HashSet::new();
        let mut result = Vec::new();
        for module in &self.modules {
            for installed in module.transitive_closure() {
                if seen.insert(installed.name.as_str()) {
                    result.push(installed);
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creator_key_defaults_to_builder() {
        let child = ComponentDescriptor::new("RequestComponent");
        assert_eq!(child.creator_key(), Key::of("RequestComponent.Builder"));

        let child = child.with_creator(TypeName::simple("RequestComponent.Factory"));
        assert_eq!(child.creator_key(), Key::of("RequestComponent.Factory"));
    }

    #[test]
    fn test_installed_modules_across_roots() {
        let common = ModuleDescriptor::new("CommonModule");
        let component = ComponentDescriptor::new("AppComponent")
            .with_module(ModuleDescriptor::new("AModule").with_include(common.clone()))
            .with_module(ModuleDescriptor::new("BModule").with_include(common));

        let names: Vec<&str> = component
            .installed_modules()
            .into_iter()
            .map(|m| m.name.as_str())
            .collect();
        assert_eq!(names, vec!["AModule", "CommonModule", "BModule"]);
    }
}
