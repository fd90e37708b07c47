pub mod check;
pub mod graph;
pub mod resolve;

use std::path::Path;

use anyhow::{Context, Result};
use wiregraph_core::{resolve_all, ConfigTrait, ResolutionContext, ResolvedGraph, ResolverConfig};

use crate::document::DeclarationSet;

/// Load a document and resolve the selected roots
///
/// Resolver configuration comes from the `WIREGRAPH_*` environment.
pub fn load_and_resolve(path: &Path, component: Option<&str>) -> Result<Vec<ResolvedGraph>> {
    let set = DeclarationSet::load(path)?;
    let roots = set.roots(component)?;
    let config = ResolverConfig::from_env().context("invalid resolver configuration")?;
    let context = ResolutionContext::with_types(set.types).with_config(config);

    resolve_all(&roots, &context)
        .into_iter()
        .zip(&roots)
        .map(|(result, root)| result.with_context(|| format!("failed to resolve {}", root.name)))
        .collect()
}

/// Total number of findings across resolved roots
pub fn finding_count(resolved: &[ResolvedGraph]) -> usize {
    resolved.iter().map(|r| r.findings.len()).sum()
}
