//! Request strategy classification
//!
//! Decides, for every resolved edge, how the dependency is obtained at the
//! point of use. The decision is a pure function of the request kind, the
//! target binding and its fan-in; [`annotate`] applies it to a whole graph
//! and may be run any number of times.

use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::config::ResolverConfig;
use crate::errors::CoreError;
use crate::graph::{BindingGraph, EdgeSource};
use crate::model::{Binding, BindingKind, RequestKind};

/// How a dependency is obtained at its point of use
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "strategy", content = "of", rename_all = "snake_case")]
pub enum RequestStrategy {
    /// A construction expression at the use site
    Inline,
    /// Construct once, keep in a field, return the cached value thereafter
    MemoizedField,
    /// The component already holds the instance in a field
    ComponentField,
    /// A provider stored in a field
    ProviderField,
    /// A provider expression switching on an id, created at the use site
    SwitchingProvider,
    /// Reuse the representation of the delegate's target
    Alias,
    /// Call a members-injection method on an existing instance
    MembersInjectionMethod,
    /// A memoizing wrapper around a provider
    Lazy(Box<RequestStrategy>),
    /// A provider handing out lazy wrappers
    ProviderOfLazy(Box<RequestStrategy>),
    /// An already-completed future of the instance
    ImmediateFuture(Box<RequestStrategy>),
    /// A producer backed by a provider
    Producer(Box<RequestStrategy>),
    /// A successful produced value wrapping the instance
    Produced(Box<RequestStrategy>),
    /// A dedicated field on the component exposing a production entry point
    EntryPointView(Box<RequestStrategy>),
    /// A self-referential accessor that is filled in after construction
    DelegateAccessor(Box<RequestStrategy>),
}

impl RequestStrategy {
    /// Whether the strategy needs a field on the component
    pub fn requires_field(&self) -> bool {
        match self {
            RequestStrategy::MemoizedField
            | RequestStrategy::ComponentField
            | RequestStrategy::ProviderField
            | RequestStrategy::EntryPointView(_)
            | RequestStrategy::DelegateAccessor(_) => true,
            RequestStrategy::Inline
            | RequestStrategy::SwitchingProvider
            | RequestStrategy::Alias
            | RequestStrategy::MembersInjectionMethod => false,
            RequestStrategy::Lazy(inner)
            | RequestStrategy::ProviderOfLazy(inner)
            | RequestStrategy::ImmediateFuture(inner)
            | RequestStrategy::Producer(inner)
            | RequestStrategy::Produced(inner) => inner.requires_field(),
        }
    }

    /// The innermost strategy, without wrappers
    pub fn base(&self) -> &RequestStrategy {
        match self {
            RequestStrategy::Lazy(inner)
            | RequestStrategy::ProviderOfLazy(inner)
            | RequestStrategy::ImmediateFuture(inner)
            | RequestStrategy::Producer(inner)
            | RequestStrategy::Produced(inner)
            | RequestStrategy::EntryPointView(inner)
            | RequestStrategy::DelegateAccessor(inner) => inner.base(),
            other => other,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RequestStrategy::Inline => "inline",
            RequestStrategy::MemoizedField => "memoized_field",
            RequestStrategy::ComponentField => "component_field",
            RequestStrategy::ProviderField => "provider_field",
            RequestStrategy::SwitchingProvider => "switching_provider",
            RequestStrategy::Alias => "alias",
            RequestStrategy::MembersInjectionMethod => "members_injection_method",
            RequestStrategy::Lazy(_) => "lazy",
            RequestStrategy::ProviderOfLazy(_) => "provider_of_lazy",
            RequestStrategy::ImmediateFuture(_) => "immediate_future",
            RequestStrategy::Producer(_) => "producer",
            RequestStrategy::Produced(_) => "produced",
            RequestStrategy::EntryPointView(_) => "entry_point_view",
            RequestStrategy::DelegateAccessor(_) => "delegate_accessor",
        }
    }
}

impl fmt::Display for RequestStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestStrategy::Lazy(inner)
            | RequestStrategy::ProviderOfLazy(inner)
            | RequestStrategy::ImmediateFuture(inner)
            | RequestStrategy::Producer(inner)
            | RequestStrategy::Produced(inner)
            | RequestStrategy::EntryPointView(inner)
            | RequestStrategy::DelegateAccessor(inner) => write!(f, "{}({})", self.name(), inner),
            _ => write!(f, "{}", self.name()),
        }
    }
}

/// Where a request is made from, beyond its kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestSite {
    /// The request is an entry point of a production component
    pub production_entry_point: bool,
    /// The request is a deferred edge closing a cycle
    pub cycle_breaking: bool,
}

/// The result of classifying one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub strategy: RequestStrategy,
    pub needs_caching: bool,
}

/// Whether a binding must be constructed once and cached
pub fn needs_caching(binding: &Binding, fan_in: usize, config: &ResolverConfig) -> bool {
    match binding.kind {
        BindingKind::Component
        | BindingKind::ComponentDependency
        | BindingKind::BoundInstance
        | BindingKind::OptionalAbsent
        | BindingKind::SubcomponentCreator { .. }
        | BindingKind::MembersInjection => false,
        BindingKind::MultiboundSet | BindingKind::MultiboundMap => binding.is_scoped(),
        _ => binding.is_scoped() || fan_in >= config.fan_in_threshold,
    }
}

fn instance_strategy(binding: &Binding, cached: bool) -> RequestStrategy {
    if binding.kind.is_component_held() {
        RequestStrategy::ComponentField
    } else if binding.kind == BindingKind::Delegate && !cached {
        RequestStrategy::Alias
    } else if cached {
        RequestStrategy::MemoizedField
    } else {
        RequestStrategy::Inline
    }
}

fn provider_strategy(binding: &Binding, cached: bool, config: &ResolverConfig) -> RequestStrategy {
    if binding.kind == BindingKind::Delegate && !cached {
        RequestStrategy::Alias
    } else if cached || !config.fast_init {
        RequestStrategy::ProviderField
    } else {
        RequestStrategy::SwitchingProvider
    }
}

/// Classify one request against its target binding
pub fn classify(
    request: RequestKind,
    binding: &Binding,
    fan_in: usize,
    site: RequestSite,
    config: &ResolverConfig,
) -> Classification {
    let cached = needs_caching(binding, fan_in, config);

    let mut strategy = match request {
        RequestKind::Instance => instance_strategy(binding, cached),
        RequestKind::Provider => provider_strategy(binding, cached, config),
        RequestKind::Lazy => RequestStrategy::Lazy(Box::new(provider_strategy(binding, cached, config))),
        RequestKind::ProviderOfLazy => {
            RequestStrategy::ProviderOfLazy(Box::new(provider_strategy(binding, cached, config)))
        }
        RequestKind::Future => RequestStrategy::ImmediateFuture(Box::new(instance_strategy(binding, cached))),
        RequestKind::Producer => RequestStrategy::Producer(Box::new(provider_strategy(binding, cached, config))),
        RequestKind::Produced => RequestStrategy::Produced(Box::new(instance_strategy(binding, cached))),
        RequestKind::MembersInjection => RequestStrategy::MembersInjectionMethod,
    };

    if site.production_entry_point && matches!(request, RequestKind::Future | RequestKind::Producer) {
        strategy = RequestStrategy::EntryPointView(Box::new(strategy));
    }
    if site.cycle_breaking && request.is_deferred() {
        strategy = RequestStrategy::DelegateAccessor(Box::new(strategy));
    }

    Classification {
        strategy,
        needs_caching: cached,
    }
}

/// Assign a strategy to every edge with a target node
///
/// Also records which nodes need caching. Edges to conflicts keep no
/// strategy. Repeated runs produce the same annotations.
pub fn annotate(graph: &mut BindingGraph, config: &ResolverConfig) -> Result<(), CoreError> {
    let fan_in = graph.fan_in();
    let mut updates = Vec::with_capacity(graph.edge_count());

    for (edge_id, edge) in graph.edges() {
        let Some(target) = edge.target_node() else {
            updates.push((edge_id, None));
            continue;
        };
        let node = graph.node(target)?;
        let Some(binding) = node.binding() else {
            updates.push((edge_id, None));
            continue;
        };
        let production_entry_point = match &edge.source {
            EdgeSource::EntryPoint { component, .. } => graph.component(*component)?.production,
            EdgeSource::Binding(_) => false,
        };
        let site = RequestSite {
            production_entry_point,
            cycle_breaking: edge.cycle_breaking,
        };
        let fan_in = fan_in.get(target.index()).copied().unwrap_or(0);
        let classification = classify(edge.request.kind, binding, fan_in, site, config);
        updates.push((edge_id, Some(classification.strategy)));
    }

    for (edge_id, strategy) in updates {
        graph.edge_mut(edge_id)?.strategy = strategy;
    }

    let mut cached = 0;
    for (index, node) in graph.nodes_mut().enumerate() {
        let fan_in = fan_in.get(index).copied().unwrap_or(0);
        node.needs_caching = match node.binding() {
            Some(binding) => needs_caching(binding, fan_in, config),
            None => false,
        };
        if node.needs_caching {
            cached += 1;
        }
    }

    debug!(cached_nodes = cached, "classified request strategies");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BindingElement, Key, Scope};

    fn provision() -> Binding {
        Binding::provision(Key::of("Service"), BindingElement::new("ServiceModule", "service"))
    }

    fn classify_default(request: RequestKind, binding: &Binding, fan_in: usize) -> Classification {
        classify(request, binding, fan_in, RequestSite::default(), &ResolverConfig::default())
    }

    #[test]
    fn test_single_instance_request_is_inline() {
        let result = classify_default(RequestKind::Instance, &provision(), 1);
        assert_eq!(result.strategy, RequestStrategy::Inline);
        assert!(!result.needs_caching);
    }

    #[test]
    fn test_scoped_or_shared_binding_is_memoized() {
        let scoped = provision().with_scope(Scope::named("Singleton"));
        assert_eq!(
            classify_default(RequestKind::Instance, &scoped, 1).strategy,
            RequestStrategy::MemoizedField
        );

        let shared = classify_default(RequestKind::Instance, &provision(), 2);
        assert_eq!(shared.strategy, RequestStrategy::MemoizedField);
        assert!(shared.needs_caching);
    }

    #[test]
    fn test_lazy_wraps_provider_regardless_of_scope() {
        let unscoped = classify_default(RequestKind::Lazy, &provision(), 1);
        assert_eq!(
            unscoped.strategy,
            RequestStrategy::Lazy(Box::new(RequestStrategy::ProviderField))
        );

        let fast = classify(
            RequestKind::Lazy,
            &provision(),
            1,
            RequestSite::default(),
            &ResolverConfig::new().with_fast_init(true),
        );
        assert_eq!(
            fast.strategy,
            RequestStrategy::Lazy(Box::new(RequestStrategy::SwitchingProvider))
        );
    }

    #[test]
    fn test_composed_strategies() {
        assert_eq!(
            classify_default(RequestKind::ProviderOfLazy, &provision(), 1).strategy.to_string(),
            "provider_of_lazy(provider_field)"
        );
        assert_eq!(
            classify_default(RequestKind::Future, &provision(), 1).strategy.to_string(),
            "immediate_future(inline)"
        );
    }

    #[test]
    fn test_multibound_collection_ignores_fan_in() {
        let set = Binding::new(Key::of("Set<Plugin>"), BindingKind::MultiboundSet);
        let result = classify_default(RequestKind::Instance, &set, 5);
        assert_eq!(result.strategy, RequestStrategy::Inline);
        assert!(!result.needs_caching);

        let scoped = set.with_scope(Scope::named("Singleton"));
        assert!(classify_default(RequestKind::Instance, &scoped, 1).needs_caching);
    }

    #[test]
    fn test_component_held_instances_use_existing_field() {
        let bound = Binding::new(Key::of("Config"), BindingKind::BoundInstance);
        let result = classify_default(RequestKind::Instance, &bound, 3);
        assert_eq!(result.strategy, RequestStrategy::ComponentField);
        assert!(!result.needs_caching);
    }

    #[test]
    fn test_uncached_delegate_is_alias() {
        let delegate = Binding::delegate(
            Key::of("Storage"),
            Key::of("DiskStorage"),
            BindingElement::new("StorageModule", "bind"),
        );
        assert_eq!(
            classify_default(RequestKind::Instance, &delegate, 1).strategy,
            RequestStrategy::Alias
        );
        assert_eq!(
            classify_default(RequestKind::Instance, &delegate, 2).strategy,
            RequestStrategy::MemoizedField
        );
    }

    #[test]
    fn test_site_wrappers() {
        let site = RequestSite {
            production_entry_point: true,
            cycle_breaking: false,
        };
        let result = classify(RequestKind::Producer, &provision(), 1, site, &ResolverConfig::default());
        assert_eq!(result.strategy.to_string(), "entry_point_view(producer(provider_field))");

        let site = RequestSite {
            production_entry_point: false,
            cycle_breaking: true,
        };
        let result = classify(RequestKind::Provider, &provision(), 1, site, &ResolverConfig::default());
        assert_eq!(result.strategy.to_string(), "delegate_accessor(provider_field)");
        assert!(result.strategy.requires_field());
        assert_eq!(result.strategy.base(), &RequestStrategy::ProviderField);
    }
}
