//! Synthetic fingerprint databases for the probefp benchmarks.
//!
//! Everything is generated from a fixed-seed LCG so runs are comparable.

#![allow(dead_code)]

use probefp::{
    FingerprintDatabase, IndexConfig, LabColor, Probe, RawSample, SampleConfig, Transform,
};

pub const RAYS: u16 = 16;

/// Colors per model are drawn from a small palette so buckets repeat.
const PALETTE: [LabColor; 6] = [
    LabColor { l: 20, a: 0, b: 0 },
    LabColor { l: 50, a: 60, b: 40 },
    LabColor { l: 30, a: 10, b: -60 },
    LabColor { l: 70, a: -40, b: 30 },
    LabColor { l: 90, a: 0, b: 10 },
    LabColor { l: 40, a: 30, b: 30 },
];

pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed)
    }

    pub fn next_u32(&mut self) -> u32 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 33) as u32
    }

    pub fn below(&mut self, n: u32) -> u32 {
        self.next_u32() % n
    }
}

pub fn index_config() -> IndexConfig {
    IndexConfig::default().with_sample(SampleConfig::default().with_samples_per_probe(RAYS))
}

/// `cells^3` grid positions with every direction, measured `per_probe` times.
pub fn measured_volume(
    rng: &mut Lcg,
    cells: u32,
    per_probe: usize,
) -> (Vec<Probe>, Vec<RawSample>) {
    let mut probes = Vec::new();
    for z in 0..cells {
        for y in 0..cells {
            for x in 0..cells {
                for direction in 0..26u8 {
                    probes.push(Probe::new([x as f32, y as f32, z as f32], direction));
                }
            }
        }
    }
    let raw = probes
        .iter()
        .flat_map(|_| {
            let color = PALETTE[rng.below(PALETTE.len() as u32) as usize];
            let distance = rng.below(64) as f32 * 0.25;
            let occlusion = rng.below(RAYS as u32 + 1) as u16;
            (0..per_probe).map(move |_| RawSample::new(occlusion, distance, color))
        })
        .collect::<Vec<_>>();
    (probes, raw)
}

/// Database of `models` compiled models plus the volume of model 0 as query.
pub fn database_with_query(
    models: u32,
    cells: u32,
) -> (FingerprintDatabase, Vec<Probe>, Vec<RawSample>) {
    let mut rng = Lcg::new(0x5eed);
    let mut db = FingerprintDatabase::new(index_config()).expect("bench database");
    let mut query = None;
    for scene in 0..models {
        let (probes, raw) = measured_volume(&mut rng, cells, 2);
        db.add_instance_probes(scene, Transform::identity(), 1.0, &probes, &raw)
            .expect("bench instance");
        if query.is_none() {
            query = Some((probes, raw));
        }
    }
    db.compile_all().expect("bench compile");
    let (probes, raw) = query.unwrap_or_default();
    (db, probes, raw)
}
