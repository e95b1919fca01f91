//! Shared fixtures for the probefp integration tests.

#![allow(dead_code)]

use probefp::{
    ExclusionMask, FingerprintDatabase, IndexConfig, LabColor, Probe, ProbeGeometry, RawSample,
    Renderer, SampleConfig, Transform,
};

pub const RAYS: u16 = 8;
pub const EXTENT: [u32; 3] = [3, 2, 2];
pub const RESOLUTION: f32 = 0.5;

pub const RED: LabColor = LabColor { l: 50, a: 60, b: 40 };
pub const BLUE: LabColor = LabColor { l: 30, a: 10, b: -60 };

pub const MUG: u32 = 10;
pub const BOWL: u32 = 20;

/// One object in the synthetic scene, owned by a model id.
pub struct Object {
    pub model: u32,
    pub center: [f32; 3],
    pub color: LabColor,
}

/// Every probe reports the nearest enabled object.
pub struct ShelfRenderer {
    pub objects: Vec<Object>,
}

impl ShelfRenderer {
    pub fn shelf() -> Self {
        Self {
            objects: vec![
                Object {
                    model: MUG,
                    center: [0.2, 0.1, 0.0],
                    color: RED,
                },
                Object {
                    model: BOWL,
                    center: [0.2, 0.1, 0.0],
                    color: BLUE,
                },
            ],
        }
    }
}

impl Renderer for ShelfRenderer {
    fn measure(&self, probes: &[Probe], mask: &ExclusionMask) -> Vec<RawSample> {
        probes
            .iter()
            .map(|probe| {
                let nearest = self
                    .objects
                    .iter()
                    .filter(|o| !mask.is_model_disabled(o.model))
                    .map(|o| (euclid(probe.position, o.center), o.color))
                    .min_by(|a, b| a.0.total_cmp(&b.0));
                match nearest {
                    Some((dist, color)) => {
                        let occlusion =
                            (dist.floor() as u32 + probe.direction as u32) % (RAYS as u32 + 1);
                        let distance = (dist * 100.0).round() / 100.0;
                        RawSample::new(occlusion as u16, distance, color)
                    }
                    None => RawSample::new(0, 0.0, LabColor::new(0, 0, 0)),
                }
            })
            .collect()
    }
}

fn euclid(a: [f32; 3], b: [f32; 3]) -> f32 {
    let d: f32 = (0..3).map(|i| (a[i] - b[i]) * (a[i] - b[i])).sum();
    d.sqrt()
}

pub fn index_config() -> IndexConfig {
    IndexConfig::default().with_sample(SampleConfig::default().with_samples_per_probe(RAYS))
}

/// Mug and bowl, each sampled with the other hidden.
pub fn shelf_database() -> FingerprintDatabase {
    let renderer = ShelfRenderer::shelf();
    let mut db = FingerprintDatabase::new(index_config()).expect("database");
    db.reserve_ids([(MUG, Some("mug".to_string())), (BOWL, Some("bowl".to_string()))]);
    for (scene, hidden) in [(MUG, BOWL), (BOWL, MUG)] {
        db.sample_instance(
            scene,
            Transform::identity(),
            EXTENT,
            RESOLUTION,
            &renderer,
            &ExclusionMask::new().with_disabled_model(hidden),
        )
        .expect("sample instance");
    }
    db.compile_all().expect("compile");
    db
}

/// Probe grid and measurements of the shelf with only `visible` shown.
pub fn measure_query(db: &FingerprintDatabase, visible: u32) -> (Vec<Probe>, Vec<RawSample>) {
    let probes = db
        .geometry()
        .probes(EXTENT, RESOLUTION)
        .expect("probe grid");
    let mut mask = ExclusionMask::new();
    for object in &ShelfRenderer::shelf().objects {
        if object.model != visible {
            mask = mask.with_disabled_model(object.model);
        }
    }
    let raw = ShelfRenderer::shelf().measure(&probes, &mask);
    (probes, raw)
}
