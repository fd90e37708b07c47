use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::key::{Key, Scope};
use crate::model::request::{DependencyRequest, RequestKind};

/// The declaration element a binding originates from
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BindingElement {
    /// Type that encloses the declaring element
    pub enclosing_type: String,
    /// Simple name of the declaring element
    pub name: String,
    /// Rendered signature, used to order same-named overloads
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl BindingElement {
    /// Create a binding element
    pub fn new(enclosing_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            enclosing_type: enclosing_type.into(),
            name: name.into(),
            signature: None,
        }
    }

    /// Set the element signature
    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }
}

impl fmt::Display for BindingElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.enclosing_type, self.name)?;
        if let Some(signature) = &self.signature {
            write!(f, "{}", signature)?;
        }
        Ok(())
    }
}

/// Every way a value can be produced for a key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BindingKind {
    /// Constructor injection on the key's type
    Injection,
    /// A module provider method
    Provision,
    /// An alias for its single dependency
    Delegate,
    /// One element contributed to a multibound set
    SetElement,
    /// One entry contributed to a multibound map
    MapEntry { map_key: String },
    /// Synthetic set assembled from every visible element contribution
    MultiboundSet,
    /// Synthetic map assembled from every visible entry contribution
    MultiboundMap,
    /// Creator of a module-declared subcomponent
    SubcomponentCreator { component: String },
    /// The component instance itself
    Component,
    /// An instance of a component dependency
    ComponentDependency,
    /// A provision method exposed by a component dependency
    ComponentProvision,
    /// An instance bound on the component creator
    BoundInstance,
    /// An optional binding whose underlying key is bound
    OptionalPresent,
    /// An optional binding whose underlying key is unbound
    OptionalAbsent,
    /// Injection of members into an existing instance
    MembersInjection,
}

impl BindingKind {
    /// Whether this binding contributes to a multibound collection
    pub fn is_contribution(&self) -> bool {
        matches!(self, BindingKind::SetElement | BindingKind::MapEntry { .. })
    }

    /// Whether this binding is a synthesized multibound collection
    pub fn is_multibound_collection(&self) -> bool {
        matches!(self, BindingKind::MultiboundSet | BindingKind::MultiboundMap)
    }

    /// Whether the component already holds the instance in a field
    pub fn is_component_held(&self) -> bool {
        matches!(
            self,
            BindingKind::Component | BindingKind::ComponentDependency | BindingKind::BoundInstance
        )
    }

    /// Get the binding kind name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            BindingKind::Injection => "injection",
            BindingKind::Provision => "provision",
            BindingKind::Delegate => "delegate",
            BindingKind::SetElement => "set_element",
            BindingKind::MapEntry { .. } => "map_entry",
            BindingKind::MultiboundSet => "multibound_set",
            BindingKind::MultiboundMap => "multibound_map",
            BindingKind::SubcomponentCreator { .. } => "subcomponent_creator",
            BindingKind::Component => "component",
            BindingKind::ComponentDependency => "component_dependency",
            BindingKind::ComponentProvision => "component_provision",
            BindingKind::BoundInstance => "bound_instance",
            BindingKind::OptionalPresent => "optional_present",
            BindingKind::OptionalAbsent => "optional_absent",
            BindingKind::MembersInjection => "members_injection",
        }
    }
}

impl fmt::Display for BindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One way to produce a value for a key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Binding {
    pub key: Key,
    #[serde(flatten)]
    pub kind: BindingKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<DependencyRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,
    /// Absent for synthetic bindings such as merged collections
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element: Option<BindingElement>,
    /// The installed module that contributed this binding
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contributing_module: Option<String>,
}

impl Binding {
    /// Create a binding of the given kind
    pub fn new(key: Key, kind: BindingKind) -> Self {
        Self {
            key,
            kind,
            dependencies: Vec::new(),
            scope: None,
            element: None,
            contributing_module: None,
        }
    }

    /// A module provider method binding
    pub fn provision(key: Key, element: BindingElement) -> Self {
        Self::new(key, BindingKind::Provision).with_element(element)
    }

    /// A constructor injection binding
    pub fn injection(key: Key, element: BindingElement) -> Self {
        Self::new(key, BindingKind::Injection).with_element(element)
    }

    /// An alias binding from `key` to `target`
    pub fn delegate(key: Key, target: Key, element: BindingElement) -> Self {
        Self::new(key, BindingKind::Delegate)
            .with_element(element)
            .with_dependency(DependencyRequest::instance(target))
    }

    /// A set element contribution to the multibound `key`
    pub fn set_element(key: Key, element: BindingElement) -> Self {
        Self::new(key, BindingKind::SetElement).with_element(element)
    }

    /// A map entry contribution to the multibound `key`
    pub fn map_entry(key: Key, map_key: impl Into<String>, element: BindingElement) -> Self {
        Self::new(
            key,
            BindingKind::MapEntry {
                map_key: map_key.into(),
            },
        )
        .with_element(element)
    }

    /// Add a dependency
    pub fn with_dependency(mut self, request: DependencyRequest) -> Self {
        self.dependencies.push(request);
        self
    }

    /// Add an instance dependency on `key`
    pub fn depends_on(self, key: Key) -> Self {
        self.with_dependency(DependencyRequest::new(key, RequestKind::Instance))
    }

    /// Set the binding scope
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Set the declaring element
    pub fn with_element(mut self, element: BindingElement) -> Self {
        self.element = Some(element);
        self
    }

    /// Set the contributing module
    pub fn with_contributing_module(mut self, module: impl Into<String>) -> Self {
        self.contributing_module = Some(module.into());
        self
    }

    pub fn is_scoped(&self) -> bool {
        self.scope.is_some()
    }

    /// Whether the binding was synthesized rather than declared
    pub fn is_synthetic(&self) -> bool {
        self.element.is_none()
    }

    /// Identity used to deduplicate bindings reached through different paths
    ///
    /// The contributing module is part of it, so element-less declarations
    /// from different modules stay distinct.
    pub fn identity(&self) -> (&Key, &BindingKind, Option<&str>, Option<&BindingElement>) {
        (
            &self.key,
            &self.kind,
            self.contributing_module.as_deref(),
            self.element.as_ref(),
        )
    }

    /// Human readable declaration, e.g. `[provision] Foo AppModule.foo`
    pub fn describe(&self) -> String {
        match &self.element {
            Some(element) => format!("[{}] {} {}", self.kind, self.key, element),
            None => format!("[{}] {} (synthetic)", self.kind, self.key),
        }
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe())
    }
}

/// Stable declaration order
///
/// Compares contributing module (or enclosing type) name, then element
/// name, then element signature. Declarations without elements sort last.
pub fn declaration_order(a: &Binding, b: &Binding) -> Ordering {
    fn owner(binding: &Binding) -> Option<&str> {
        binding
            .contributing_module
            .as_deref()
            .or_else(|| binding.element.as_ref().map(|e| e.enclosing_type.as_str()))
    }

    empties_last(owner(a), owner(b), |x, y| x.cmp(y))
        .then_with(|| {
            empties_last(a.element.as_ref(), b.element.as_ref(), |x, y| {
                x.name.cmp(&y.name).then_with(|| x.signature.cmp(&y.signature))
            })
        })
        .then_with(|| a.key.cmp(&b.key))
}

fn empties_last<T>(a: Option<T>, b: Option<T>, cmp: impl Fn(&T, &T) -> Ordering) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => cmp(&a, &b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::key::TypeName;

    fn element(owner: &str, name: &str) -> BindingElement {
        BindingElement::new(owner, name)
    }

    #[test]
    fn test_binding_builders() {
        let binding = Binding::provision(Key::of("Repository"), element("DataModule", "repository"))
            .depends_on(Key::of("Database"))
            .with_scope(Scope::named("Singleton"));

        assert_eq!(binding.kind, BindingKind::Provision);
        assert_eq!(binding.dependencies.len(), 1);
        assert!(binding.is_scoped());
        assert!(!binding.is_synthetic());
    }

    #[test]
    fn test_delegate_depends_on_target() {
        let binding = Binding::delegate(
            Key::of("Storage"),
            Key::of("DiskStorage"),
            element("StorageModule", "bindStorage"),
        );
        assert_eq!(binding.dependencies[0].key, Key::of("DiskStorage"));
        assert_eq!(binding.dependencies[0].kind, RequestKind::Instance);
    }

    #[test]
    fn test_declaration_order_prefers_module_then_name() {
        let set = Key::new(TypeName::set_of(TypeName::simple("Plugin")));
        let b = Binding::set_element(set.clone(), element("ZetaModule", "a"))
            .with_contributing_module("BetaModule");
        let a = Binding::set_element(set.clone(), element("AlphaModule", "z"));
        let c = Binding::set_element(set.clone(), element("BetaModule", "c"))
            .with_contributing_module("BetaModule");
        let synthetic = Binding::new(set, BindingKind::MultiboundSet);

        let mut bindings = vec![synthetic.clone(), c.clone(), b.clone(), a.clone()];
        bindings.sort_by(declaration_order);

        assert_eq!(bindings, vec![a, b, c, synthetic]);
    }

    #[test]
    fn test_identity_ignores_dependencies() {
        let first = Binding::provision(Key::of("Clock"), element("TimeModule", "clock"));
        let second = first.clone().depends_on(Key::of("Zone"));
        assert_eq!(first.identity(), second.identity());
    }

    #[test]
    fn test_identity_separates_contributing_modules() {
        let set = Key::new(TypeName::set_of(TypeName::simple("Plugin")));
        let from_a = Binding::new(set.clone(), BindingKind::SetElement).with_contributing_module("AModule");
        let from_b = Binding::new(set, BindingKind::SetElement).with_contributing_module("BModule");
        assert_ne!(from_a.identity(), from_b.identity());
        assert_eq!(from_a.identity(), from_a.clone().identity());
    }

    #[test]
    fn test_binding_kind_deserializes_tagged() {
        let binding: Binding = serde_json::from_str(
            r#"{
                "key": {"type": {"name": "Map", "args": [{"name": "String"}, {"name": "Handler"}]}},
                "kind": "map_entry",
                "map_key": "login",
                "element": {"enclosing_type": "RoutesModule", "name": "login"}
            }"#,
        )
        .unwrap();

        assert_eq!(
            binding.kind,
            BindingKind::MapEntry {
                map_key: "login".to_string()
            }
        );
        assert_eq!(binding.key.ty.to_string(), "Map<String, Handler>");
    }
}
