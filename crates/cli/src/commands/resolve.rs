use std::fmt::Write as _;
use std::path::Path;

use anyhow::{bail, Result};
use serde_json::json;
use wiregraph_core::ResolvedGraph;

use super::{finding_count, load_and_resolve};

/// Resolve every root and print a per-component summary
///
/// Returns the number of findings.
pub fn run(path: &Path, component: Option<&str>, format: &str) -> Result<usize> {
    let resolved = load_and_resolve(path, component)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&json_report(&resolved))?),
        "text" => print!("{}", text_report(&resolved)?),
        other => bail!("unknown output format '{}', expected text or json", other),
    }

    Ok(finding_count(&resolved))
}

pub fn json_report(resolved: &[ResolvedGraph]) -> serde_json::Value {
    let components: Vec<_> = resolved
        .iter()
        .map(|r| {
            json!({
                "component": r.component_name(),
                "valid": r.is_valid(),
                "nodes": r.graph.node_count(),
                "edges": r.graph.edge_count(),
                "components": r.graph.component_count(),
                "findings": r.findings,
            })
        })
        .collect();

    json!({
        "version": wiregraph_core::VERSION,
        "components": components,
        "findings": finding_count(resolved),
    })
}

pub fn text_report(resolved: &[ResolvedGraph]) -> Result<String> {
    let mut out = String::new();
    for r in resolved {
        let status = if r.is_valid() { "✅" } else { "❌" };
        writeln!(
            out,
            "{} {}: {} nodes, {} edges, {} components",
            status,
            r.component_name(),
            r.graph.node_count(),
            r.graph.edge_count(),
            r.graph.component_count()
        )?;

        for (id, component) in r.graph.components() {
            let entry_points = r.graph.entry_point_edges(id)?;
            writeln!(out, "   {} ({} entry points)", r.graph.component_path(id), entry_points.len())?;
            for edge_id in entry_points {
                let edge = r.graph.edge(*edge_id)?;
                let strategy = edge
                    .strategy
                    .as_ref()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "unresolved".to_string());
                writeln!(out, "     {} -> {} [{}]", r.graph.describe_source(&edge.source), edge.request.key, strategy)?;
            }
            if component.production {
                writeln!(out, "     (production)")?;
            }
        }

        for finding in &r.findings {
            writeln!(out, "   error: {}", finding)?;
        }
    }
    Ok(out)
}
