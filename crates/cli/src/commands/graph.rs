use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use wiregraph_core::{GraphVisualizer, VisualizationFormat, VisualizationStyle};

use super::{finding_count, load_and_resolve};

/// Rendering options taken from the command line
#[derive(Debug, Clone, Default)]
pub struct GraphOptions {
    pub component: Option<String>,
    pub show_strategies: bool,
    pub filter: Vec<String>,
    pub max_depth: Option<usize>,
    pub stats: bool,
    pub output: Option<std::path::PathBuf>,
}

impl GraphOptions {
    pub fn style(&self) -> VisualizationStyle {
        VisualizationStyle {
            show_strategies: self.show_strategies,
            filter_types: (!self.filter.is_empty()).then(|| self.filter.clone()),
            max_depth: self.max_depth,
            include_stats: self.stats,
            ..VisualizationStyle::default()
        }
    }
}

/// Render every resolved root in the requested format
///
/// Graphs with findings are still rendered. Returns the number of findings.
pub fn run(path: &Path, format: &str, options: &GraphOptions) -> Result<usize> {
    let format: VisualizationFormat = format.parse()?;
    let resolved = load_and_resolve(path, options.component.as_deref())?;
    let style = options.style();

    let mut rendered = Vec::with_capacity(resolved.len());
    for graph in &resolved {
        rendered.push(GraphVisualizer::new(&graph.graph).visualize(format, &style)?);
    }
    let output = rendered.join("\n");

    match &options.output {
        Some(file) => {
            fs::write(file, &output).with_context(|| format!("failed to write {}", file.display()))?;
            eprintln!("📝 Wrote {} graph(s) to {}", rendered.len(), file.display());
        }
        None => println!("{}", output),
    }

    Ok(finding_count(&resolved))
}
