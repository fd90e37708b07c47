use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A structural type reference such as `Foo` or `Map<String, Handler>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeName {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<TypeName>,
}

impl TypeName {
    /// Create a non-generic type name
    pub fn simple(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// Create a parameterized type name
    pub fn generic(name: impl Into<String>, args: Vec<TypeName>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// `Set<element>`
    pub fn set_of(element: TypeName) -> Self {
        Self::generic("Set", vec![element])
    }

    /// `Map<key, value>`
    pub fn map_of(key: TypeName, value: TypeName) -> Self {
        Self::generic("Map", vec![key, value])
    }

    /// `Optional<value>`
    pub fn optional_of(value: TypeName) -> Self {
        Self::generic("Optional", vec![value])
    }

    /// The wrapped type when this is `Optional<T>`
    pub fn optional_value(&self) -> Option<&TypeName> {
        if self.name == "Optional" && self.args.len() == 1 {
            self.args.first()
        } else {
            None
        }
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.args.is_empty() {
            write!(f, "<")?;
            for (i, arg) in self.args.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", arg)?;
            }
            write!(f, ">")?;
        }
        Ok(())
    }
}

/// An annotation-like marker with argument values
///
/// Equality is structural: two annotations with the same name and the same
/// argument values are equal even when they were extracted separately.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Annotation {
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub values: BTreeMap<String, String>,
}

impl Annotation {
    /// Create an annotation without arguments
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: BTreeMap::new(),
        }
    }

    /// Add an argument value
    pub fn with_value(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.name)?;
        if !self.values.is_empty() {
            let args: Vec<String> = self
                .values
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect();
            write!(f, "({})", args.join(", "))?;
        }
        Ok(())
    }
}

pub type Qualifier = Annotation;

/// Lifetime annotation constraining a binding to one instance per owning component
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scope(pub Annotation);

impl Scope {
    /// Create a scope from its annotation name
    pub fn named(name: impl Into<String>) -> Self {
        Self(Annotation::new(name))
    }

    /// Get the scope annotation
    pub fn annotation(&self) -> &Annotation {
        &self.0
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of one multibinding contribution
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContributionId {
    pub module: String,
    pub element: String,
}

/// What can be requested: a type plus an optional qualifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Key {
    #[serde(rename = "type")]
    pub ty: TypeName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<Qualifier>,
    /// Set only on the keys of individual multibinding contributions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contribution: Option<ContributionId>,
}

impl Key {
    /// Create an unqualified key
    pub fn new(ty: TypeName) -> Self {
        Self {
            ty,
            qualifier: None,
            contribution: None,
        }
    }

    /// Create an unqualified key for a simple type name
    pub fn of(name: impl Into<String>) -> Self {
        Self::new(TypeName::simple(name))
    }

    /// Create a qualified key
    pub fn qualified(ty: TypeName, qualifier: Qualifier) -> Self {
        Self {
            ty,
            qualifier: Some(qualifier),
            contribution: None,
        }
    }

    /// Return this key with a qualifier
    pub fn with_qualifier(mut self, qualifier: Qualifier) -> Self {
        self.qualifier = Some(qualifier);
        self
    }

    /// The key of one contribution to this multibound key
    pub fn for_contribution(&self, contribution: ContributionId) -> Self {
        Self {
            ty: self.ty.clone(),
            qualifier: self.qualifier.clone(),
            contribution: Some(contribution),
        }
    }

    /// The multibound key a contribution key belongs to
    pub fn without_contribution(&self) -> Self {
        Self {
            ty: self.ty.clone(),
            qualifier: self.qualifier.clone(),
            contribution: None,
        }
    }

    /// `Optional<T>` with the same qualifier
    pub fn optional_of(&self) -> Self {
        Self {
            ty: TypeName::optional_of(self.ty.clone()),
            qualifier: self.qualifier.clone(),
            contribution: None,
        }
    }

    /// The key wrapped by this `Optional<T>` key
    pub fn optional_value(&self) -> Option<Self> {
        self.ty.optional_value().map(|value| Self {
            ty: value.clone(),
            qualifier: self.qualifier.clone(),
            contribution: None,
        })
    }

    pub fn is_contribution(&self) -> bool {
        self.contribution.is_some()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(qualifier) = &self.qualifier {
            write!(f, "{} ", qualifier)?;
        }
        write!(f, "{}", self.ty)?;
        if let Some(contribution) = &self.contribution {
            write!(f, " [{}#{}]", contribution.module, contribution.element)?;
        }
        Ok(())
    }
}

/// The binding space a request resolves in
///
/// Members-injection requests resolve against their own bindings; every
/// other request kind resolves against the provision binding of its key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BindingKey {
    Provision(Key),
    MembersInjection(Key),
}

impl BindingKey {
    pub fn key(&self) -> &Key {
        match self {
            BindingKey::Provision(key) | BindingKey::MembersInjection(key) => key,
        }
    }
}

impl fmt::Display for BindingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingKey::Provision(key) => write!(f, "{}", key),
            BindingKey::MembersInjection(key) => write!(f, "members of {}", key),
        }
    }
}
