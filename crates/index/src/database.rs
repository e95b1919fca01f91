use std::sync::Arc;
use std::time::Instant;

use sample::{
    compress, validate_probes, CubeGeometry, ExclusionMask, Probe, ProbeGeometry, RawSample,
    Renderer, Transform,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::idmap::{IdMap, LocalId, SceneId};
use crate::model::{SampledInstance, SampledModel};
use crate::stats::ColorStats;
use crate::{IndexConfig, IndexError};

/// Everything a database persists; geometry and config are supplied on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct DatabaseState {
    pub(crate) samples_per_probe: u16,
    pub(crate) color_bins: u8,
    pub(crate) direction_count: u32,
    pub(crate) orientation_count: u32,
    pub(crate) ids: IdMap,
    pub(crate) models: Vec<SampledModel>,
    pub(crate) global: ColorStats,
}

/// Per-model fingerprints keyed by compact local id.
///
/// Lifecycle: instances are queued with [`Self::add_instance_probes`] and only
/// become visible to queries after [`Self::compile`] / [`Self::compile_all`].
/// A query reads the last compiled snapshot; queued instances are ignored.
pub struct FingerprintDatabase {
    cfg: IndexConfig,
    geometry: Arc<dyn ProbeGeometry>,
    pub(crate) state: DatabaseState,
}

impl std::fmt::Debug for FingerprintDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FingerprintDatabase")
            .field("cfg", &self.cfg)
            .field("models", &self.state.models.len())
            .field("directions", &self.geometry.directions().len())
            .finish()
    }
}

impl FingerprintDatabase {
    /// Empty database over the cube probe geometry.
    pub fn new(cfg: IndexConfig) -> Result<Self, IndexError> {
        Self::with_geometry(cfg, Arc::new(CubeGeometry::new()))
    }

    pub fn with_geometry(
        cfg: IndexConfig,
        geometry: Arc<dyn ProbeGeometry>,
    ) -> Result<Self, IndexError> {
        cfg.validate()?;
        let state = DatabaseState {
            samples_per_probe: cfg.sample.samples_per_probe,
            color_bins: cfg.color_bins,
            direction_count: geometry.directions().len() as u32,
            orientation_count: geometry.orientation_count() as u32,
            ids: IdMap::new(),
            models: Vec::new(),
            global: ColorStats::new(cfg.color_bins),
        };
        Ok(Self {
            cfg,
            geometry,
            state,
        })
    }

    pub(crate) fn from_state(
        cfg: IndexConfig,
        geometry: Arc<dyn ProbeGeometry>,
        state: DatabaseState,
    ) -> Result<Self, IndexError> {
        cfg.validate()?;
        if state.samples_per_probe != cfg.sample.samples_per_probe
            || state.color_bins != cfg.color_bins
        {
            return Err(IndexError::InvalidArgument(format!(
                "cache built with samples_per_probe={} color_bins={}, configured {} / {}",
                state.samples_per_probe,
                state.color_bins,
                cfg.sample.samples_per_probe,
                cfg.color_bins
            )));
        }
        if state.direction_count as usize != geometry.directions().len()
            || state.orientation_count as usize != geometry.orientation_count()
        {
            return Err(IndexError::InvalidArgument(format!(
                "cache built for {} directions / {} orientations",
                state.direction_count, state.orientation_count
            )));
        }
        if state.models.len() != state.ids.len() {
            return Err(IndexError::Decode(format!(
                "{} models but {} ids",
                state.models.len(),
                state.ids.len()
            )));
        }
        state.global.validate(state.color_bins)?;
        for model in &state.models {
            model.stats().validate(state.color_bins)?;
        }
        Ok(Self {
            cfg,
            geometry,
            state,
        })
    }

    pub fn config(&self) -> &IndexConfig {
        &self.cfg
    }

    pub fn geometry(&self) -> &dyn ProbeGeometry {
        self.geometry.as_ref()
    }

    pub fn samples_per_probe(&self) -> u16 {
        self.state.samples_per_probe
    }

    /// Register scene ids (and optional names) ahead of sampling so local ids
    /// follow the caller's order.
    pub fn reserve_ids<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (SceneId, Option<String>)>,
    {
        for (scene, name) in entries {
            let local = self.state.ids.reserve(scene, name);
            self.ensure_model(local);
        }
    }

    /// Compress a measured batch and queue it on `scene`'s model.
    ///
    /// Probe positions are in the model's local frame; `transform` records
    /// where the instance sat in the scene when it was measured.
    pub fn add_instance_probes(
        &mut self,
        scene: SceneId,
        transform: Transform,
        resolution: f32,
        probes: &[Probe],
        raw: &[RawSample],
    ) -> Result<LocalId, IndexError> {
        let result = self.queue_instance(scene, transform, resolution, probes, raw);
        if let Err(err) = &result {
            warn!(error = %err, scene, probes = probes.len(), raw = raw.len(), "instance_rejected");
        }
        result
    }

    fn queue_instance(
        &mut self,
        scene: SceneId,
        transform: Transform,
        resolution: f32,
        probes: &[Probe],
        raw: &[RawSample],
    ) -> Result<LocalId, IndexError> {
        validate_probes(probes, self.geometry.as_ref())?;
        let samples = compress(probes.len(), raw, &self.cfg.sample)?;
        let instance = SampledInstance {
            transform,
            resolution,
            probes: probes.to_vec(),
            samples,
        };
        // A new scene id is only registered once its first instance is accepted.
        if let Some(local) = self.state.ids.local(scene) {
            self.ensure_model(local);
            self.state.models[local as usize].enqueue(instance)?;
            return Ok(local);
        }
        let mut model = SampledModel::new(self.state.samples_per_probe, self.state.color_bins);
        model.enqueue(instance)?;
        let local = self.state.ids.resolve_or_insert(scene);
        self.ensure_model(local);
        self.state.models[local as usize] = model;
        Ok(local)
    }

    /// Generate the probe grid for `extent`, measure it through `renderer`
    /// at the instance's placement and queue the result.
    pub fn sample_instance(
        &mut self,
        scene: SceneId,
        transform: Transform,
        extent: [u32; 3],
        resolution: f32,
        renderer: &dyn Renderer,
        mask: &ExclusionMask,
    ) -> Result<LocalId, IndexError> {
        let probes = self.geometry.probes(extent, resolution)?;
        let placed: Vec<Probe> = probes
            .iter()
            .map(|p| Probe::new(transform.apply(p.position), p.direction))
            .collect();
        let raw = renderer.measure(&placed, mask);
        self.add_instance_probes(scene, transform, resolution, &probes, &raw)
    }

    fn ensure_model(&mut self, local: LocalId) {
        let needed = local as usize + 1;
        while self.state.models.len() < needed {
            self.state
                .models
                .push(SampledModel::new(self.state.samples_per_probe, self.state.color_bins));
        }
    }

    /// Merge `scene`'s queued instances. Compiling an empty queue is a no-op.
    pub fn compile(&mut self, scene: SceneId) -> Result<bool, IndexError> {
        let local = self
            .state
            .ids
            .local(scene)
            .ok_or(IndexError::UnknownModel(scene))?;
        let start = Instant::now();
        let changed = self.state.models[local as usize].compile(self.geometry.as_ref())?;
        if changed {
            self.refresh_global()?;
            info!(
                scene,
                local,
                samples = self.state.models[local as usize].index().len(),
                elapsed_micros = start.elapsed().as_micros(),
                "compile_success"
            );
        }
        Ok(changed)
    }

    /// Merge every model's queue; returns how many models changed.
    pub fn compile_all(&mut self) -> Result<usize, IndexError> {
        let start = Instant::now();
        let mut changed = 0;
        for model in &mut self.state.models {
            if model.compile(self.geometry.as_ref())? {
                changed += 1;
            }
        }
        if changed > 0 {
            self.refresh_global()?;
        }
        info!(
            models = self.state.models.len(),
            changed,
            elapsed_micros = start.elapsed().as_micros(),
            "compile_all_success"
        );
        Ok(changed)
    }

    fn refresh_global(&mut self) -> Result<(), IndexError> {
        let mut global = ColorStats::new(self.state.color_bins);
        for model in &self.state.models {
            global.add(model.stats())?;
        }
        for model in &mut self.state.models {
            model.refresh_message_length(&global);
        }
        debug!(
            total = global.total(),
            entropy = global.entropy(),
            "global_stats_refreshed"
        );
        self.state.global = global;
        Ok(())
    }

    /// True iff the model's merged index is empty (unknown ids count as empty).
    pub fn is_empty(&self, scene: SceneId) -> bool {
        self.model_by_scene(scene).is_none_or(SampledModel::is_empty)
    }

    /// Drop one model's merged and queued data, keeping its id.
    pub fn clear(&mut self, scene: SceneId) -> Result<(), IndexError> {
        let local = self
            .state
            .ids
            .local(scene)
            .ok_or(IndexError::UnknownModel(scene))?;
        self.state.models[local as usize].clear();
        self.refresh_global()
    }

    pub fn clear_all(&mut self) {
        for model in &mut self.state.models {
            model.clear();
        }
        self.state.global = ColorStats::new(self.state.color_bins);
    }

    pub fn model(&self, local: LocalId) -> Option<&SampledModel> {
        self.state.models.get(local as usize)
    }

    pub fn model_by_scene(&self, scene: SceneId) -> Option<&SampledModel> {
        self.state.ids.local(scene).and_then(|l| self.model(l))
    }

    pub fn models(&self) -> &[SampledModel] {
        &self.state.models
    }

    pub fn local_id(&self, scene: SceneId) -> Option<LocalId> {
        self.state.ids.local(scene)
    }

    pub fn scene_id(&self, local: LocalId) -> Option<SceneId> {
        self.state.ids.scene(local)
    }

    pub fn name(&self, local: LocalId) -> Option<&str> {
        self.state.ids.name(local)
    }

    pub fn ids(&self) -> &IdMap {
        &self.state.ids
    }

    /// Sum of every compiled model's color histogram.
    pub fn global_stats(&self) -> &ColorStats {
        &self.state.global
    }
}
