//! Compile-time dependency graph resolution
//!
//! Turns a root component descriptor and the modules it installs into a
//! closed, validated binding graph with an access strategy on every edge.
//!
//! ```text
//! model → index → resolver → validation → strategy → emission
//! ```

pub mod config;
pub mod context;
pub mod emission;
pub mod errors;
pub mod graph;
pub mod index;
pub mod model;
pub mod resolver;
pub mod strategy;
pub mod validation;
pub mod visualization;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info_span};
use uuid::Uuid;

pub use config::{ConfigError, ConfigSource, ConfigTrait, ResolverConfig};
pub use context::{DeclaredTypes, InjectConstructor, ResolutionContext, ScopeEquivalence, TypeOracle};
pub use emission::EmissionStage;
pub use errors::CoreError;
pub use graph::{BindingGraph, ComponentId, EdgeId, NodeId};
pub use model::{
    Binding, BindingElement, BindingKind, ComponentDescriptor, DependencyRequest, Key,
    ModuleDescriptor, RequestKind, Scope, TypeName,
};
pub use resolver::Resolver;
pub use strategy::RequestStrategy;
pub use validation::{Finding, FindingCategory, Validator};
pub use visualization::{CrossReference, GraphVisualizer, VisualizationFormat, VisualizationStyle};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// A resolved graph and everything validation found wrong with it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedGraph {
    pub graph: BindingGraph,
    pub findings: Vec<Finding>,
}

impl ResolvedGraph {
    pub fn is_valid(&self) -> bool {
        self.findings.is_empty()
    }

    /// Name of the root component
    pub fn component_name(&self) -> String {
        self.graph
            .component(self.graph.root())
            .map(|c| c.name.clone())
            .unwrap_or_default()
    }
}

/// Resolve, validate and classify one root component
///
/// Problems with the declarations come back as findings. An `Err` means
/// the configuration is unusable or the resolver hit an internal defect.
pub fn resolve(root: &ComponentDescriptor, context: &ResolutionContext) -> Result<ResolvedGraph, CoreError> {
    context.config.validate()?;

    let run_id = Uuid::new_v4();
    let span = info_span!("resolve", component = %root.name, run_id = %run_id);
    let _guard = span.enter();

    let mut graph = Resolver::new(context).resolve(root)?;
    let cycle_breaking = validation::mark_cycle_breaking(&mut graph)?;
    debug!(edges = cycle_breaking, "marked cycle-breaking edges");

    let findings = Validator::new(&graph, context).validate()?;
    strategy::annotate(&mut graph, &context.config)?;

    Ok(ResolvedGraph { graph, findings })
}

/// Resolve independent root components in parallel
///
/// Every root gets its own resolver and caches. Results come back in the
/// order of `roots`.
pub fn resolve_all(
    roots: &[ComponentDescriptor],
    context: &ResolutionContext,
) -> Vec<Result<ResolvedGraph, CoreError>> {
    roots.par_iter().map(|root| resolve(root, context)).collect()
}
