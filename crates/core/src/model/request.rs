use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::key::{BindingKey, Key};

/// How a consumer accesses a dependency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    /// The value itself, needed at construction time
    Instance,
    /// A memoizing handle that produces the value on first use
    Lazy,
    /// A handle that produces the value on every call
    Provider,
    /// A provider of memoizing handles
    ProviderOfLazy,
    /// A deferred asynchronous producer
    Producer,
    /// The value or the failure of an asynchronous producer
    Produced,
    /// A future of the value
    Future,
    /// Injection of members into an existing instance
    MembersInjection,
}

impl RequestKind {
    /// Whether the dependency is not needed until after construction
    ///
    /// Deferred requests break dependency cycles.
    pub fn is_deferred(&self) -> bool {
        matches!(
            self,
            RequestKind::Lazy | RequestKind::Provider | RequestKind::ProviderOfLazy | RequestKind::Producer
        )
    }

    /// Get the request kind name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Instance => "instance",
            RequestKind::Lazy => "lazy",
            RequestKind::Provider => "provider",
            RequestKind::ProviderOfLazy => "provider_of_lazy",
            RequestKind::Producer => "producer",
            RequestKind::Produced => "produced",
            RequestKind::Future => "future",
            RequestKind::MembersInjection => "members_injection",
        }
    }
}

impl Default for RequestKind {
    fn default() -> Self {
        RequestKind::Instance
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A reference from a consumer to a key, tagged with its access pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyRequest {
    pub key: Key,
    #[serde(default)]
    pub kind: RequestKind,
    /// The declaring element of the request (parameter, field or method)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element: Option<String>,
}

impl DependencyRequest {
    /// Create a request of the given kind
    pub fn new(key: Key, kind: RequestKind) -> Self {
        Self {
            key,
            kind,
            element: None,
        }
    }

    /// Create an instance request
    pub fn instance(key: Key) -> Self {
        Self::new(key, RequestKind::Instance)
    }

    /// Create a lazy request
    pub fn lazy(key: Key) -> Self {
        Self::new(key, RequestKind::Lazy)
    }

    /// Create a provider request
    pub fn provider(key: Key) -> Self {
        Self::new(key, RequestKind::Provider)
    }

    /// Set the requesting element
    pub fn with_element(mut self, element: impl Into<String>) -> Self {
        self.element = Some(element.into());
        self
    }

    /// The binding this request resolves against
    pub fn binding_key(&self) -> BindingKey {
        match self.kind {
            RequestKind::MembersInjection => BindingKey::MembersInjection(self.key.clone()),
            _ => BindingKey::Provision(self.key.clone()),
        }
    }
}

impl fmt::Display for DependencyRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            RequestKind::Instance => write!(f, "{}", self.key),
            kind => write!(f, "{}({})", kind, self.key),
        }
    }
}
