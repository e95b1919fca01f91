//! Tolerance-window overlap scan between two bucketed indices.

use index::BucketedIndex;
use sample::CompressedSample;

use crate::types::{MatchError, Tolerance};

/// Receives every `(database, query)` sample pair that passes all tolerances.
///
/// Implementations are owned by one task; nothing here is shared across threads.
pub trait Accumulator {
    fn on_match(
        &mut self,
        db_index: usize,
        query_index: usize,
        db_sample: &CompressedSample,
        query_sample: &CompressedSample,
    );
}

impl<F> Accumulator for F
where
    F: FnMut(usize, usize, &CompressedSample, &CompressedSample),
{
    fn on_match(
        &mut self,
        db_index: usize,
        query_index: usize,
        db_sample: &CompressedSample,
        query_sample: &CompressedSample,
    ) {
        self(db_index, query_index, db_sample, query_sample)
    }
}

/// Report every sample pair within `tolerance` to `acc`.
///
/// For each database occlusion level `L` in `0..=samples_per_probe`, the query
/// levels `[L - occlusion, L + occlusion]` are searched. Within one level the
/// query is distance-sorted, so the distance window is located by binary
/// search and only the color check runs per candidate pair.
pub fn scan<A>(
    db: &BucketedIndex,
    query: &BucketedIndex,
    tolerance: &Tolerance,
    acc: &mut A,
) -> Result<(), MatchError>
where
    A: Accumulator + ?Sized,
{
    if db.samples_per_probe() != query.samples_per_probe() {
        return Err(MatchError::LevelMismatch {
            query: query.samples_per_probe(),
            database: db.samples_per_probe(),
        });
    }
    let max = db.samples_per_probe();
    let db_samples = db.as_slice();
    let query_samples = query.as_slice();

    for level in 0..=max {
        let db_range = db.occlusion_range(level);
        if db_range.is_empty() {
            continue;
        }
        let lo = level.saturating_sub(tolerance.occlusion);
        let hi = level.saturating_add(tolerance.occlusion).min(max);
        if query.occlusion_span(lo, hi).is_empty() {
            continue;
        }

        for db_index in db_range {
            let d = &db_samples[db_index];
            for query_level in lo..=hi {
                let range = query.occlusion_range(query_level);
                let window = &query_samples[range.clone()];
                let first = window.partition_point(|q| d.distance - q.distance > tolerance.distance);
                for (offset, q) in window[first..].iter().enumerate() {
                    if q.distance - d.distance > tolerance.distance {
                        break;
                    }
                    if d.color.distance(&q.color) > tolerance.color {
                        continue;
                    }
                    acc.on_match(db_index, range.start + first + offset, d, q);
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use index::SortedIndex;
    use sample::{LabColor, RawSample};

    fn sample(occlusion: u16, distance: f32, l: i8) -> CompressedSample {
        CompressedSample::from_raw(RawSample::new(occlusion, distance, LabColor::new(l, 0, 0)), 1, 0)
    }

    fn bucketed(samples: Vec<CompressedSample>) -> BucketedIndex {
        BucketedIndex::new(SortedIndex::from_samples(samples), 4)
    }

    fn pairs(db: &BucketedIndex, query: &BucketedIndex, tolerance: Tolerance) -> Vec<(usize, usize)> {
        let mut out = Vec::new();
        scan(db, query, &tolerance, &mut |i: usize, j: usize, _: &CompressedSample, _: &CompressedSample| {
            out.push((i, j))
        })
        .unwrap();
        out
    }

    /// Reference cross product with the same inclusive predicates.
    fn brute_force(db: &BucketedIndex, query: &BucketedIndex, t: Tolerance) -> Vec<(usize, usize)> {
        let mut out = Vec::new();
        for (i, d) in db.as_slice().iter().enumerate() {
            for (j, q) in query.as_slice().iter().enumerate() {
                let occ = (d.occlusion as i32 - q.occlusion as i32).unsigned_abs() <= t.occlusion as u32;
                if occ
                    && (d.distance - q.distance).abs() <= t.distance
                    && d.color.distance(&q.color) <= t.color
                {
                    out.push((i, j));
                }
            }
        }
        out.sort_unstable();
        out
    }

    #[test]
    fn zero_tolerance_pairs_only_identical_samples() {
        let db = bucketed(vec![sample(0, 1.0, 0), sample(1, 2.0, 0), sample(1, 3.0, 5)]);
        let query = bucketed(vec![sample(1, 2.0, 0), sample(1, 3.0, 6), sample(2, 1.0, 0)]);
        assert_eq!(pairs(&db, &query, Tolerance::exact()), vec![(1, 0)]);
    }

    #[test]
    fn distance_window_is_inclusive() {
        let db = bucketed(vec![sample(2, 10.0, 0)]);
        let query = bucketed(vec![sample(2, 9.0, 0), sample(2, 11.0, 0), sample(2, 11.5, 0)]);
        let matched = pairs(&db, &query, Tolerance::exact().with_distance(1.0));
        assert_eq!(matched, vec![(0, 0), (0, 1)]);
    }

    #[test]
    fn occlusion_window_spans_neighboring_levels() {
        let db = bucketed(vec![sample(2, 1.0, 0)]);
        let query = bucketed(vec![
            sample(0, 1.0, 0),
            sample(1, 1.0, 0),
            sample(3, 1.0, 0),
            sample(4, 1.0, 0),
        ]);
        assert_eq!(pairs(&db, &query, Tolerance::exact().with_occlusion(1)).len(), 2);
        assert_eq!(pairs(&db, &query, Tolerance::exact().with_occlusion(2)).len(), 4);
    }

    #[test]
    fn matches_brute_force_reference() {
        let db = bucketed(
            (0..60)
                .map(|i| sample((i % 5) as u16, (i % 13) as f32 * 0.5, (i % 7) as i8 * 3))
                .collect(),
        );
        let query = bucketed(
            (0..45)
                .map(|i| sample((i % 4) as u16, (i % 11) as f32 * 0.5, (i % 5) as i8 * 4))
                .collect(),
        );
        for t in [
            Tolerance::exact(),
            Tolerance::new(1, 0.5, 3.0),
            Tolerance::new(0, 2.0, 0.0),
            Tolerance::new(4, 10.0, 50.0),
        ] {
            let mut got = pairs(&db, &query, t);
            got.sort_unstable();
            assert_eq!(got, brute_force(&db, &query, t), "tolerance {t:?}");
        }
    }

    #[test]
    fn mismatched_levels_rejected() {
        let db = bucketed(vec![sample(0, 1.0, 0)]);
        let query = BucketedIndex::new(SortedIndex::from_samples(vec![sample(0, 1.0, 0)]), 8);
        let err = scan(&db, &query, &Tolerance::exact(), &mut |_: usize, _: usize, _: &CompressedSample, _: &CompressedSample| {})
            .expect_err("levels differ");
        assert!(matches!(err, MatchError::LevelMismatch { query: 8, database: 4 }));
    }
}
