//! Declaration documents
//!
//! A document holds the records an extraction pass produced: the root
//! components with everything they install, plus the facts known about
//! injectable types. JSON and YAML are both accepted.

use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use wiregraph_core::{ComponentDescriptor, DeclaredTypes};

/// Serialization format of a declaration document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
}

impl DocumentFormat {
    /// Pick the format from a file extension, defaulting to YAML
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => DocumentFormat::Json,
            _ => DocumentFormat::Yaml,
        }
    }
}

/// Everything needed to resolve a set of root components
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclarationSet {
    #[serde(default)]
    pub types: DeclaredTypes,
    #[serde(default)]
    pub components: Vec<ComponentDescriptor>,
}

impl DeclarationSet {
    /// Parse a document in the given format
    pub fn parse(content: &str, format: DocumentFormat) -> Result<Self> {
        let set: DeclarationSet = match format {
            DocumentFormat::Json => serde_json::from_str(content).context("invalid JSON declaration document")?,
            DocumentFormat::Yaml => serde_yaml::from_str(content).context("invalid YAML declaration document")?,
        };
        if set.components.is_empty() {
            bail!("declaration document lists no components");
        }
        Ok(set)
    }

    /// Read and parse a document from disk
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let set = Self::parse(&content, DocumentFormat::from_path(path))
            .with_context(|| format!("failed to load {}", path.display()))?;

        tracing::debug!(
            path = %path.display(),
            components = set.components.len(),
            types = set.types.len(),
            "loaded declaration document"
        );
        Ok(set)
    }

    /// The root components to resolve, all of them or the one named
    pub fn roots(&self, component: Option<&str>) -> Result<Vec<ComponentDescriptor>> {
        match component {
            None => Ok(self.components.clone()),
            Some(name) => self
                .components
                .iter()
                .find(|c| c.name == name)
                .cloned()
                .map(|c| vec![c])
                .ok_or_else(|| {
                    let known: Vec<&str> = self.components.iter().map(|c| c.name.as_str()).collect();
                    anyhow!("component '{}' not found (known: {})", name, known.join(", "))
                }),
        }
    }
}
