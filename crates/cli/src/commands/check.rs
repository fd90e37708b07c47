use std::path::Path;

use anyhow::Result;

use super::{finding_count, load_and_resolve};

/// Validate every root and print only the findings
///
/// Returns the number of findings.
pub fn run(path: &Path, component: Option<&str>) -> Result<usize> {
    let resolved = load_and_resolve(path, component)?;

    for graph in &resolved {
        for finding in &graph.findings {
            println!("error: [{}] {}", graph.component_name(), finding);
        }
    }

    let count = finding_count(&resolved);
    if count == 0 {
        println!("✅ {} component(s) resolved without findings", resolved.len());
    } else {
        println!("❌ {} finding(s) in {} component(s)", count, resolved.len());
    }
    Ok(count)
}
