//! Resolution benchmarks
//!
//! Measures resolution, validation and strategy selection over graphs of
//! growing size and shape so regressions in the worklist or the cycle
//! search show up early.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use wiregraph_core::{
    resolve, resolve_all, Binding, BindingElement, ComponentDescriptor, DependencyRequest, Key,
    ModuleDescriptor, ResolutionContext, TypeName,
};

/// A linear chain: Service0 -> Service1 -> ... -> Service(n-1)
fn chain_component(size: usize) -> ComponentDescriptor {
    let mut module = ModuleDescriptor::new("ChainModule");
    for i in 0..size {
        let mut binding = Binding::provision(
            Key::of(format!("Service{}", i)),
            BindingElement::new("ChainModule", format!("service{}", i)),
        );
        if i + 1 < size {
            binding = binding.depends_on(Key::of(format!("Service{}", i + 1)));
        }
        module = module.with_binding(binding);
    }

    ComponentDescriptor::new("ChainComponent")
        .with_module(module)
        .with_entry_point("head", DependencyRequest::instance(Key::of("Service0")))
}

/// One shared binding consumed by every other binding and a set of all of them
fn fan_out_component(size: usize) -> ComponentDescriptor {
    let plugins = Key::new(TypeName::set_of(TypeName::simple("Plugin")));
    let mut module = ModuleDescriptor::new("FanOutModule").with_binding(Binding::provision(
        Key::of("Registry"),
        BindingElement::new("FanOutModule", "registry"),
    ));
    for i in 0..size {
        module = module.with_binding(
            Binding::set_element(plugins.clone(), BindingElement::new("FanOutModule", format!("plugin{}", i)))
                .depends_on(Key::of("Registry")),
        );
    }

    ComponentDescriptor::new("FanOutComponent")
        .with_module(module)
        .with_entry_point("plugins", DependencyRequest::instance(plugins))
}

/// A root with `size` children that all request the same parent binding
fn wide_tree_component(size: usize) -> ComponentDescriptor {
    let mut root = ComponentDescriptor::new("RootComponent").with_module(
        ModuleDescriptor::new("RootModule")
            .with_binding(Binding::provision(Key::of("Config"), BindingElement::new("RootModule", "config"))),
    );
    for i in 0..size {
        root = root.with_child(
            ComponentDescriptor::new(format!("Child{}", i))
                .with_entry_point("config", DependencyRequest::instance(Key::of("Config"))),
        );
    }
    root
}

fn benchmark_resolution_shapes(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolution");
    let context = ResolutionContext::default();

    for size in [10, 100, 500, 1000].iter() {
        let chain = chain_component(*size);
        group.bench_with_input(BenchmarkId::new("linear_chain", size), &chain, |b, root| {
            b.iter(|| black_box(resolve(root, &context).unwrap()));
        });

        let fan_out = fan_out_component(*size);
        group.bench_with_input(BenchmarkId::new("fan_out", size), &fan_out, |b, root| {
            b.iter(|| black_box(resolve(root, &context).unwrap()));
        });

        let tree = wide_tree_component(*size);
        group.bench_with_input(BenchmarkId::new("wide_tree", size), &tree, |b, root| {
            b.iter(|| black_box(resolve(root, &context).unwrap()));
        });
    }

    group.finish();
}

fn benchmark_parallel_roots(c: &mut Criterion) {
    let mut group = c.benchmark_group("parallel_roots");
    let context = ResolutionContext::default();
    let roots: Vec<ComponentDescriptor> = (0..16).map(|_| chain_component(200)).collect();

    group.bench_function("sequential", |b| {
        b.iter(|| {
            for root in &roots {
                black_box(resolve(root, &context).unwrap());
            }
        });
    });

    group.bench_function("resolve_all", |b| {
        b.iter(|| black_box(resolve_all(&roots, &context)));
    });

    group.finish();
}

criterion_group!(benches, benchmark_resolution_shapes, benchmark_parallel_roots);
criterion_main!(benches);
