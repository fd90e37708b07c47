//! End-to-end properties of resolution
//!
//! Each test drives `resolve` through the public API only.

use wiregraph_core::graph::{EdgeTarget, NodeKind};
use wiregraph_core::model::{BindingKey, ModuleDescriptor};
use wiregraph_core::{
    resolve, Binding, BindingElement, BindingKind, ComponentDescriptor, DependencyRequest, Finding,
    FindingCategory, Key, RequestStrategy, ResolutionContext, Scope, TypeName,
};

fn element(module: &str, name: &str) -> BindingElement {
    BindingElement::new(module, name)
}

fn plugins() -> Key {
    Key::new(TypeName::set_of(TypeName::simple("Plugin")))
}

/// A0 -> A1 -> ... -> An, all provided by one module
fn chain(length: usize) -> ComponentDescriptor {
    let mut module = ModuleDescriptor::new("ChainModule");
    for i in 0..=length {
        let mut binding = Binding::provision(Key::of(format!("A{}", i)), element("ChainModule", &format!("a{}", i)));
        if i < length {
            binding = binding.depends_on(Key::of(format!("A{}", i + 1)));
        }
        module = module.with_binding(binding);
    }
    ComponentDescriptor::new("ChainComponent")
        .with_module(module)
        .with_entry_point("head", DependencyRequest::instance(Key::of("A0")))
}

#[test]
fn test_chain_of_length_n_has_n_plus_one_nodes() {
    for length in [0, 1, 5, 40] {
        let resolved = resolve(&chain(length), &ResolutionContext::default()).unwrap();
        let graph = &resolved.graph;

        assert!(resolved.findings.is_empty(), "findings: {:?}", resolved.findings);
        assert_eq!(graph.reachable_from(graph.root()).unwrap().len(), length + 1);
        assert_eq!(graph.node_count(), length + 1);
    }
}

#[test]
fn test_two_modules_binding_same_key_is_one_duplicate() {
    let root = ComponentDescriptor::new("AppComponent")
        .with_module(
            ModuleDescriptor::new("HttpModule")
                .with_binding(Binding::provision(Key::of("Client"), element("HttpModule", "client"))),
        )
        .with_module(
            ModuleDescriptor::new("GrpcModule")
                .with_binding(Binding::provision(Key::of("Client"), element("GrpcModule", "client"))),
        )
        .with_entry_point("client", DependencyRequest::instance(Key::of("Client")))
        .with_entry_point("clientProvider", DependencyRequest::provider(Key::of("Client")));

    let resolved = resolve(&root, &ResolutionContext::default()).unwrap();

    assert_eq!(resolved.findings.len(), 1);
    match &resolved.findings[0] {
        Finding::DuplicateBinding { key, declarations, .. } => {
            assert_eq!(key, "Client");
            assert_eq!(declarations.len(), 2);
            assert!(declarations.iter().any(|d| d.contains("HttpModule.client")));
            assert!(declarations.iter().any(|d| d.contains("GrpcModule.client")));
        }
        other => panic!("unexpected finding {:?}", other),
    }

    let client = BindingKey::Provision(Key::of("Client"));
    assert!(resolved.graph.nodes().all(|(_, node)| node.key() != client));
}

fn multibinding_tree(with_child: bool) -> ComponentDescriptor {
    let parent_module = ModuleDescriptor::new("CorePluginModule")
        .with_binding(Binding::set_element(plugins(), element("CorePluginModule", "auth")))
        .with_binding(Binding::set_element(plugins(), element("CorePluginModule", "audit")));
    let child_module = ModuleDescriptor::new("AdminPluginModule")
        .with_binding(Binding::set_element(plugins(), element("AdminPluginModule", "console")));

    let mut root = ComponentDescriptor::new("AppComponent")
        .with_module(parent_module)
        .with_entry_point("plugins", DependencyRequest::instance(plugins()));
    if with_child {
        root = root.with_child(
            ComponentDescriptor::new("AdminComponent")
                .with_module(child_module)
                .with_entry_point("plugins", DependencyRequest::instance(plugins())),
        );
    }
    root
}

fn contribution_names(resolved: &wiregraph_core::ResolvedGraph, component: &str) -> Vec<String> {
    let graph = &resolved.graph;
    let component = graph.component_named(component).unwrap();
    let entry = graph.entry_point_edges(component).unwrap()[0];
    let set = graph.edge(entry).unwrap().target_node().unwrap();
    let set_node = graph.node(set).unwrap();
    assert_eq!(set_node.binding().unwrap().kind, BindingKind::MultiboundSet);

    set_node
        .dependencies
        .iter()
        .map(|edge| {
            let target = graph.edge(*edge).unwrap().target_node().unwrap();
            graph.node(target).unwrap().binding().unwrap().element.as_ref().unwrap().to_string()
        })
        .collect()
}

#[test]
fn test_multibinding_accumulates_across_components() {
    let context = ResolutionContext::default();

    let resolved = resolve(&multibinding_tree(true), &context).unwrap();
    assert!(resolved.findings.is_empty(), "findings: {:?}", resolved.findings);
    assert_eq!(
        contribution_names(&resolved, "AdminComponent"),
        vec!["AdminPluginModule.console", "CorePluginModule.audit", "CorePluginModule.auth"]
    );
    assert_eq!(
        contribution_names(&resolved, "AppComponent"),
        vec!["CorePluginModule.audit", "CorePluginModule.auth"]
    );

    let again = resolve(&multibinding_tree(true), &context).unwrap();
    assert_eq!(
        contribution_names(&again, "AdminComponent"),
        contribution_names(&resolved, "AdminComponent")
    );

    let parent_only = resolve(&multibinding_tree(false), &context).unwrap();
    assert_eq!(contribution_names(&parent_only, "AppComponent").len(), 2);
}

fn cycle(lazy_back_edge: bool) -> ComponentDescriptor {
    let back = if lazy_back_edge {
        DependencyRequest::lazy(Key::of("Engine"))
    } else {
        DependencyRequest::instance(Key::of("Engine"))
    };
    let module = ModuleDescriptor::new("CarModule")
        .with_binding(Binding::provision(Key::of("Engine"), element("CarModule", "engine")).depends_on(Key::of("Gearbox")))
        .with_binding(Binding::provision(Key::of("Gearbox"), element("CarModule", "gearbox")).with_dependency(back));
    ComponentDescriptor::new("CarComponent")
        .with_module(module)
        .with_entry_point("engine", DependencyRequest::instance(Key::of("Engine")))
}

#[test]
fn test_instance_cycle_is_unbreakable() {
    let resolved = resolve(&cycle(false), &ResolutionContext::default()).unwrap();

    assert_eq!(resolved.findings.len(), 1);
    match &resolved.findings[0] {
        Finding::UnbreakableCycle { component, cycle } => {
            assert_eq!(component, "CarComponent");
            assert_eq!(cycle, &vec!["Engine".to_string(), "Gearbox".to_string(), "Engine".to_string()]);
        }
        other => panic!("unexpected finding {:?}", other),
    }
}

#[test]
fn test_lazy_edge_breaks_cycle() {
    let resolved = resolve(&cycle(true), &ResolutionContext::default()).unwrap();
    assert!(resolved.findings.is_empty(), "findings: {:?}", resolved.findings);

    let graph = &resolved.graph;
    let lazy_edges: Vec<_> = graph
        .edges()
        .filter(|(_, edge)| edge.request.kind == wiregraph_core::RequestKind::Lazy)
        .map(|(_, edge)| edge)
        .collect();
    assert_eq!(lazy_edges.len(), 1);
    assert!(lazy_edges[0].deferred);
    assert!(lazy_edges[0].cycle_breaking);
    assert!(matches!(
        lazy_edges[0].strategy,
        Some(RequestStrategy::DelegateAccessor(_))
    ));

    let immediate_on_cycle = graph
        .edges()
        .filter(|(_, edge)| !edge.deferred && edge.cycle_breaking)
        .count();
    assert_eq!(immediate_on_cycle, 0);
}

#[test]
fn test_binding_with_foreign_scope_is_illegal() {
    let root = ComponentDescriptor::new("AppComponent")
        .with_scope(Scope::named("Singleton"))
        .with_module(
            ModuleDescriptor::new("RequestModule").with_binding(
                Binding::provision(Key::of("RequestContext"), element("RequestModule", "context"))
                    .with_scope(Scope::named("RequestScoped")),
            ),
        )
        .with_entry_point("context", DependencyRequest::instance(Key::of("RequestContext")));

    let resolved = resolve(&root, &ResolutionContext::default()).unwrap();
    let illegal: Vec<&Finding> = resolved
        .findings
        .iter()
        .filter(|f| f.category() == FindingCategory::IllegalScopeReference)
        .collect();

    assert_eq!(illegal.len(), 1);
    match illegal[0] {
        Finding::IllegalScopeReference { binding, scope, component, component_scope } => {
            assert!(binding.contains("RequestContext"));
            assert_eq!(scope, "@RequestScoped");
            assert_eq!(component, "AppComponent");
            assert_eq!(component_scope.as_deref(), Some("@Singleton"));
        }
        other => panic!("unexpected finding {:?}", other),
    }
}

#[test]
fn test_resolution_is_idempotent() {
    let mut root = multibinding_tree(true);
    root = root
        .with_entry_point("missing", DependencyRequest::instance(Key::of("Nowhere")))
        .with_module(
            ModuleDescriptor::new("CycleModule")
                .with_binding(Binding::provision(Key::of("Ping"), element("CycleModule", "ping")).depends_on(Key::of("Pong")))
                .with_binding(Binding::provision(Key::of("Pong"), element("CycleModule", "pong")).depends_on(Key::of("Ping"))),
        )
        .with_entry_point("ping", DependencyRequest::instance(Key::of("Ping")));

    let context = ResolutionContext::default();
    let first = resolve(&root, &context).unwrap();
    let second = resolve(&root, &context).unwrap();

    assert_eq!(first, second);
    assert_eq!(first.findings.len(), 2);
    assert_eq!(first.findings[0].category(), FindingCategory::MissingBinding);
    assert_eq!(first.findings[1].category(), FindingCategory::UnbreakableCycle);
}

#[test]
fn test_conflict_edges_have_no_node_or_strategy() {
    let root = ComponentDescriptor::new("AppComponent")
        .with_module(
            ModuleDescriptor::new("A").with_binding(Binding::provision(Key::of("Foo"), element("A", "foo"))),
        )
        .with_module(
            ModuleDescriptor::new("B").with_binding(Binding::provision(Key::of("Foo"), element("B", "foo"))),
        )
        .with_entry_point("foo", DependencyRequest::instance(Key::of("Foo")));

    let resolved = resolve(&root, &ResolutionContext::default()).unwrap();
    let (_, edge) = resolved.graph.edges().next().unwrap();
    assert!(matches!(edge.target, EdgeTarget::Conflict(_)));
    assert!(edge.strategy.is_none());
    assert!(resolved
        .graph
        .nodes()
        .all(|(_, node)| !matches!(node.kind, NodeKind::Missing { .. })));
}
