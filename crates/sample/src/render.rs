//! Boundary to the external measurement engine.

use serde::{Deserialize, Serialize};

use crate::types::{Probe, RawSample};

/// Scene instances and models the renderer must ignore while measuring.
///
/// Sampling a model usually hides everything else so neighbours do not leak
/// into its fingerprint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionMask {
    pub disabled_instances: Vec<u32>,
    pub disabled_models: Vec<u32>,
}

impl ExclusionMask {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_disabled_model(mut self, model: u32) -> Self {
        self.disabled_models.push(model);
        self
    }

    pub fn with_disabled_instance(mut self, instance: u32) -> Self {
        self.disabled_instances.push(instance);
        self
    }

    pub fn is_model_disabled(&self, model: u32) -> bool {
        self.disabled_models.contains(&model)
    }

    pub fn is_instance_disabled(&self, instance: u32) -> bool {
        self.disabled_instances.contains(&instance)
    }
}

/// Produces one [`RawSample`] per probe.
///
/// Implementations live outside this workspace (a ray tracer in production,
/// synthetic functions in tests).
pub trait Renderer {
    fn measure(&self, probes: &[Probe], mask: &ExclusionMask) -> Vec<RawSample>;
}
