//! Hand-off to an external emission stage
//!
//! A graph is only handed to an emitter when validation found nothing.

use tracing::{info, warn};

use crate::errors::CoreError;
use crate::graph::BindingGraph;
use crate::ResolvedGraph;

/// Renders a validated binding graph into some target output
pub trait EmissionStage {
    type Output;

    /// Emit a graph that passed validation
    fn emit(&mut self, graph: &BindingGraph) -> Result<Self::Output, CoreError>;
}

impl ResolvedGraph {
    /// Hand the graph to `stage` if it has no findings
    ///
    /// Returns [`CoreError::Validation`] without calling the stage when
    /// any finding was reported.
    pub fn emit_with<E: EmissionStage>(&self, stage: &mut E) -> Result<E::Output, CoreError> {
        let component = self.component_name();
        if !self.findings.is_empty() {
            warn!(
                component = %component,
                findings = self.findings.len(),
                "emission refused"
            );
            return Err(CoreError::validation(format!(
                "{} has {} finding(s); emission refused",
                component,
                self.findings.len()
            )));
        }

        info!(component = %component, "emitting graph");
        stage.emit(&self.graph)
    }
}
