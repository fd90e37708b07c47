//! Integration tests for subcomponents, optional and members-injection
//! bindings, map multibindings and strategy selection

use wiregraph_core::context::InjectConstructor;
use wiregraph_core::model::{ComponentDependency, MultibindingDeclaration, OptionalDeclaration};
use wiregraph_core::visualization::cross_references;
use wiregraph_core::{
    resolve, resolve_all, Binding, BindingElement, BindingKind, ComponentDescriptor, CrossReference,
    DeclaredTypes, DependencyRequest, Finding, FindingCategory, Key, ModuleDescriptor, RequestKind,
    RequestStrategy, ResolutionContext, ResolverConfig, Scope, TypeName,
};

fn element(module: &str, name: &str) -> BindingElement {
    BindingElement::new(module, name)
}

fn entry_binding<'a>(resolved: &'a wiregraph_core::ResolvedGraph, component: &str, index: usize) -> &'a Binding {
    let graph = &resolved.graph;
    let component = graph.component_named(component).unwrap();
    let edge = graph.entry_point_edges(component).unwrap()[index];
    let node = graph.edge(edge).unwrap().target_node().unwrap();
    graph.node(node).unwrap().binding().unwrap()
}

fn entry_strategy(resolved: &wiregraph_core::ResolvedGraph, component: &str, index: usize) -> RequestStrategy {
    let graph = &resolved.graph;
    let component = graph.component_named(component).unwrap();
    let edge = graph.entry_point_edges(component).unwrap()[index];
    graph.edge(edge).unwrap().strategy.clone().unwrap()
}

#[test]
fn test_unused_module_subcomponent_is_pruned() {
    let session = ComponentDescriptor::new("SessionComponent")
        .with_creator(TypeName::simple("SessionComponent.Factory"))
        .with_entry_point("token", DependencyRequest::instance(Key::of("Token")));
    let module = ModuleDescriptor::new("SessionModule").with_subcomponent(session.clone());

    let pruned = resolve(
        &ComponentDescriptor::new("AppComponent").with_module(module.clone()),
        &ResolutionContext::default(),
    )
    .unwrap();
    assert_eq!(pruned.graph.component_count(), 1);
    assert!(pruned.findings.is_empty());

    let used = resolve(
        &ComponentDescriptor::new("AppComponent")
            .with_module(module)
            .with_entry_point("sessions", DependencyRequest::instance(session.creator_key())),
        &ResolutionContext::default(),
    )
    .unwrap();
    assert_eq!(used.graph.component_count(), 2);
    assert_eq!(
        entry_binding(&used, "AppComponent", 0).kind,
        BindingKind::SubcomponentCreator {
            component: "SessionComponent".to_string()
        }
    );
    // The subcomponent's own unresolved request surfaces once it is built
    assert_eq!(used.findings.len(), 1);
    assert_eq!(used.findings[0].category(), FindingCategory::MissingBinding);

    let facts = cross_references(&used.graph).unwrap();
    assert!(facts.contains(&CrossReference::ChildComponent {
        parent: "AppComponent".to_string(),
        child: "SessionComponent".to_string(),
    }));
}

#[test]
fn test_optional_binding_present_in_child_absent_in_parent() {
    let logger = Key::of("Logger");
    let root = ComponentDescriptor::new("AppComponent")
        .with_module(ModuleDescriptor::new("OptionalModule").with_optional(OptionalDeclaration::new(logger.clone())))
        .with_entry_point("logger", DependencyRequest::instance(logger.optional_of()))
        .with_child(
            ComponentDescriptor::new("DebugComponent")
                .with_module(
                    ModuleDescriptor::new("DebugModule")
                        .with_binding(Binding::provision(logger.clone(), element("DebugModule", "logger"))),
                )
                .with_entry_point("logger", DependencyRequest::instance(logger.optional_of())),
        );

    let resolved = resolve(&root, &ResolutionContext::default()).unwrap();
    assert!(resolved.findings.is_empty(), "findings: {:?}", resolved.findings);

    assert_eq!(entry_binding(&resolved, "AppComponent", 0).kind, BindingKind::OptionalAbsent);
    let present = entry_binding(&resolved, "DebugComponent", 0);
    assert_eq!(present.kind, BindingKind::OptionalPresent);
    assert_eq!(present.dependencies[0].key, logger);
}

#[test]
fn test_members_injection_uses_type_facts() {
    let activity = TypeName::simple("MainActivity");
    let types = DeclaredTypes::new()
        .with_members(&activity, vec![DependencyRequest::instance(Key::of("Presenter"))])
        .with_constructor(&TypeName::simple("Presenter"), InjectConstructor::new());
    let root = ComponentDescriptor::new("ActivityComponent").with_entry_point(
        "inject",
        DependencyRequest::new(Key::new(activity), RequestKind::MembersInjection),
    );

    let resolved = resolve(&root, &ResolutionContext::with_types(types)).unwrap();
    assert!(resolved.findings.is_empty(), "findings: {:?}", resolved.findings);

    let binding = entry_binding(&resolved, "ActivityComponent", 0);
    assert_eq!(binding.kind, BindingKind::MembersInjection);
    assert_eq!(entry_strategy(&resolved, "ActivityComponent", 0), RequestStrategy::MembersInjectionMethod);
    assert_eq!(resolved.graph.node_count(), 2);
}

#[test]
fn test_duplicate_map_keys_are_reported() {
    let handlers = Key::new(TypeName::map_of(TypeName::simple("String"), TypeName::simple("Handler")));
    let root = ComponentDescriptor::new("RouterComponent")
        .with_module(
            ModuleDescriptor::new("AuthRoutes")
                .with_binding(Binding::map_entry(handlers.clone(), "login", element("AuthRoutes", "login"))),
        )
        .with_module(
            ModuleDescriptor::new("LegacyRoutes")
                .with_binding(Binding::map_entry(handlers.clone(), "login", element("LegacyRoutes", "oldLogin")))
                .with_binding(Binding::map_entry(handlers.clone(), "logout", element("LegacyRoutes", "logout"))),
        )
        .with_entry_point("handlers", DependencyRequest::instance(handlers));

    let resolved = resolve(&root, &ResolutionContext::default()).unwrap();
    assert_eq!(resolved.findings.len(), 1);
    match &resolved.findings[0] {
        Finding::DuplicateMapKey { map_key, declarations, .. } => {
            assert_eq!(map_key, "login");
            assert_eq!(declarations.len(), 2);
        }
        other => panic!("unexpected finding {:?}", other),
    }
}

#[test]
fn test_declared_empty_multibinding_resolves() {
    let interceptors = Key::new(TypeName::set_of(TypeName::simple("Interceptor")));
    let root = ComponentDescriptor::new("AppComponent")
        .with_module(ModuleDescriptor::new("NetModule").with_multibinding(MultibindingDeclaration::set(interceptors.clone())))
        .with_entry_point("interceptors", DependencyRequest::instance(interceptors));

    let resolved = resolve(&root, &ResolutionContext::default()).unwrap();
    assert!(resolved.is_valid());
    let binding = entry_binding(&resolved, "AppComponent", 0);
    assert_eq!(binding.kind, BindingKind::MultiboundSet);
    assert!(binding.dependencies.is_empty());
}

#[test]
fn test_set_aggregates_elementless_contributions_from_each_module() {
    let plugins = Key::new(TypeName::set_of(TypeName::simple("Plugin")));
    let root = ComponentDescriptor::new("AppComponent")
        .with_module(ModuleDescriptor::new("AModule").with_binding(Binding::new(plugins.clone(), BindingKind::SetElement)))
        .with_module(ModuleDescriptor::new("BModule").with_binding(Binding::new(plugins.clone(), BindingKind::SetElement)))
        .with_entry_point("plugins", DependencyRequest::instance(plugins));

    let resolved = resolve(&root, &ResolutionContext::default()).unwrap();
    assert!(resolved.is_valid());
    let binding = entry_binding(&resolved, "AppComponent", 0);
    assert_eq!(binding.kind, BindingKind::MultiboundSet);
    assert_eq!(binding.dependencies.len(), 2);
}

#[test]
fn test_explicit_binding_beside_contributions_is_duplicate() {
    let plugins = Key::new(TypeName::set_of(TypeName::simple("Plugin")));
    let root = ComponentDescriptor::new("AppComponent")
        .with_module(
            ModuleDescriptor::new("PluginModule")
                .with_binding(Binding::set_element(plugins.clone(), element("PluginModule", "one")))
                .with_binding(Binding::provision(plugins.clone(), element("PluginModule", "all"))),
        )
        .with_entry_point("plugins", DependencyRequest::instance(plugins));

    let resolved = resolve(&root, &ResolutionContext::default()).unwrap();
    assert_eq!(resolved.findings.len(), 1);
    assert_eq!(resolved.findings[0].category(), FindingCategory::DuplicateBinding);
}

#[test]
fn test_parent_and_child_binding_same_key_conflict() {
    let root = ComponentDescriptor::new("AppComponent")
        .with_module(
            ModuleDescriptor::new("AppModule")
                .with_binding(Binding::provision(Key::of("Clock"), element("AppModule", "clock"))),
        )
        .with_child(
            ComponentDescriptor::new("TestComponent")
                .with_module(
                    ModuleDescriptor::new("FakeClockModule")
                        .with_binding(Binding::provision(Key::of("Clock"), element("FakeClockModule", "clock"))),
                )
                .with_entry_point("clock", DependencyRequest::instance(Key::of("Clock"))),
        );

    let resolved = resolve(&root, &ResolutionContext::default()).unwrap();
    assert_eq!(resolved.findings.len(), 1);
    match &resolved.findings[0] {
        Finding::DuplicateBinding { component, declarations, .. } => {
            assert_eq!(component, "TestComponent");
            assert!(declarations[0].contains("FakeClockModule.clock"));
            assert!(declarations[1].contains("AppModule.clock"));
        }
        other => panic!("unexpected finding {:?}", other),
    }
}

#[test]
fn test_component_dependencies_and_bound_instances() {
    let root = ComponentDescriptor::new("AppComponent")
        .with_dependency(ComponentDependency::new(TypeName::simple("DatabaseComponent")).with_provision("connection", Key::of("Connection")))
        .with_bound_instance(Key::of("Settings"), "settings")
        .with_entry_point("connection", DependencyRequest::instance(Key::of("Connection")))
        .with_entry_point("settings", DependencyRequest::instance(Key::of("Settings")))
        .with_entry_point("self", DependencyRequest::instance(Key::of("AppComponent")));

    let resolved = resolve(&root, &ResolutionContext::default()).unwrap();
    assert!(resolved.findings.is_empty(), "findings: {:?}", resolved.findings);

    let connection = entry_binding(&resolved, "AppComponent", 0);
    assert_eq!(connection.kind, BindingKind::ComponentProvision);
    assert_eq!(connection.dependencies[0].key, Key::of("DatabaseComponent"));

    assert_eq!(entry_strategy(&resolved, "AppComponent", 1), RequestStrategy::ComponentField);
    assert_eq!(entry_binding(&resolved, "AppComponent", 2).kind, BindingKind::Component);
}

#[test]
fn test_delegate_without_caching_is_alias() {
    let types = DeclaredTypes::new().with_constructor(&TypeName::simple("DiskStorage"), InjectConstructor::new());
    let root = ComponentDescriptor::new("AppComponent")
        .with_module(ModuleDescriptor::new("StorageModule").with_binding(Binding::delegate(
            Key::of("Storage"),
            Key::of("DiskStorage"),
            element("StorageModule", "bindStorage"),
        )))
        .with_entry_point("storage", DependencyRequest::instance(Key::of("Storage")));

    let resolved = resolve(&root, &ResolutionContext::with_types(types)).unwrap();
    assert!(resolved.is_valid());
    assert_eq!(entry_strategy(&resolved, "AppComponent", 0), RequestStrategy::Alias);
}

#[test]
fn test_production_entry_points_get_views() {
    let root = ComponentDescriptor::new("PipelineComponent")
        .production()
        .with_module(
            ModuleDescriptor::new("PipelineModule")
                .with_binding(Binding::provision(Key::of("Report"), element("PipelineModule", "report"))),
        )
        .with_entry_point("report", DependencyRequest::new(Key::of("Report"), RequestKind::Future))
        .with_entry_point("reportNow", DependencyRequest::instance(Key::of("Report")));

    let resolved = resolve(&root, &ResolutionContext::default()).unwrap();
    assert_eq!(
        entry_strategy(&resolved, "PipelineComponent", 0),
        RequestStrategy::EntryPointView(Box::new(RequestStrategy::ImmediateFuture(Box::new(
            RequestStrategy::MemoizedField
        ))))
    );
    assert_eq!(entry_strategy(&resolved, "PipelineComponent", 1), RequestStrategy::MemoizedField);
}

#[test]
fn test_scoped_binding_cached_in_matching_ancestor() {
    let singleton = Scope::named("Singleton");
    let root = ComponentDescriptor::new("AppComponent")
        .with_scope(singleton.clone())
        .with_module(
            ModuleDescriptor::new("NetworkModule").with_binding(
                Binding::provision(Key::of("HttpClient"), element("NetworkModule", "client")).with_scope(singleton),
            ),
        )
        .with_child(
            ComponentDescriptor::new("ScreenComponent")
                .with_entry_point("client", DependencyRequest::instance(Key::of("HttpClient"))),
        );

    let resolved = resolve(&root, &ResolutionContext::default()).unwrap();
    assert!(resolved.is_valid());
    let (_, node) = resolved.graph.nodes().next().unwrap();
    assert_eq!(node.owner, resolved.graph.root());
    assert!(node.needs_caching);
    assert_eq!(entry_strategy(&resolved, "ScreenComponent", 0), RequestStrategy::MemoizedField);
}

#[test]
fn test_finding_dedupe_follows_config() {
    let missing = DependencyRequest::instance(Key::of("Analytics"));
    let root = ComponentDescriptor::new("AppComponent")
        .with_child(ComponentDescriptor::new("HomeComponent").with_entry_point("analytics", missing.clone()))
        .with_child(ComponentDescriptor::new("SettingsComponent").with_entry_point("analytics", missing));

    let deduped = resolve(&root, &ResolutionContext::default()).unwrap();
    assert_eq!(deduped.findings.len(), 1);
    match &deduped.findings[0] {
        Finding::MissingBinding { requested_by, .. } => assert_eq!(
            requested_by,
            &vec![
                "HomeComponent.analytics()".to_string(),
                "SettingsComponent.analytics()".to_string(),
            ]
        ),
        other => panic!("unexpected finding {:?}", other),
    }

    let context = ResolutionContext::default().with_config(ResolverConfig::new().with_dedupe_findings(false));
    let all = resolve(&root, &context).unwrap();
    assert_eq!(all.findings.len(), 2);
}

#[test]
fn test_fast_init_switches_provider_strategy() {
    let root = ComponentDescriptor::new("AppComponent")
        .with_module(
            ModuleDescriptor::new("AppModule")
                .with_binding(Binding::provision(Key::of("Clock"), element("AppModule", "clock"))),
        )
        .with_entry_point("clock", DependencyRequest::provider(Key::of("Clock")));

    let default = resolve(&root, &ResolutionContext::default()).unwrap();
    assert_eq!(entry_strategy(&default, "AppComponent", 0), RequestStrategy::ProviderField);

    let fast = ResolutionContext::default().with_config(ResolverConfig::new().with_fast_init(true));
    let resolved = resolve(&root, &fast).unwrap();
    assert_eq!(entry_strategy(&resolved, "AppComponent", 0), RequestStrategy::SwitchingProvider);
}

#[test]
fn test_resolve_all_matches_sequential_resolution() {
    let context = ResolutionContext::default();
    let roots: Vec<ComponentDescriptor> = (0..6)
        .map(|i| {
            ComponentDescriptor::new(format!("Root{}", i))
                .with_module(
                    ModuleDescriptor::new(format!("Module{}", i))
                        .with_binding(Binding::provision(Key::of("Value"), element(&format!("Module{}", i), "value"))),
                )
                .with_entry_point("value", DependencyRequest::instance(Key::of("Value")))
        })
        .collect();

    let parallel: Vec<_> = resolve_all(&roots, &context).into_iter().map(|r| r.unwrap()).collect();
    let sequential: Vec<_> = roots.iter().map(|root| resolve(root, &context).unwrap()).collect();
    assert_eq!(parallel, sequential);
}
