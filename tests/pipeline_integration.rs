mod common;

use common::{BOWL, MUG, RAYS, RESOLUTION, index_config, measure_query, shelf_database};
use probefp::{
    FingerprintDatabase, MatchConfig, Query, QueryKind, QueryRecording, Tolerance, rank_results,
    replay,
};

#[test]
fn sampled_models_are_compiled_and_named() {
    let db = shelf_database();
    assert_eq!(db.models().len(), 2);
    assert_eq!(db.name(0), Some("mug"));
    assert_eq!(db.local_id(BOWL), Some(1));
    assert!(!db.is_empty(MUG));
    assert!(!db.is_empty(BOWL));

    let mug = db.model_by_scene(MUG).expect("mug model");
    assert_eq!(mug.resolution(), Some(RESOLUTION));
    assert_eq!(mug.total_weight(), mug.probes().len() as u64);
    assert_eq!(db.global_stats().total(), 2 * mug.total_weight());
}

#[test]
fn plain_query_finds_only_the_visible_object() {
    let db = shelf_database();
    let (probes, raw) = measure_query(&db, MUG);

    let mut query = Query::new(&db, MatchConfig::new(QueryKind::Plain), probes, &raw)
        .expect("query builds");
    query.execute().expect("query executes");
    let mut hits = query.results();
    rank_results(&mut hits);

    assert_eq!(hits.len(), 1, "the bowl has no color in common: {hits:?}");
    assert_eq!(hits[0].model_id, MUG);
    assert_eq!(hits[0].score, 1.0);
    assert_eq!(
        hits[0].num_matches,
        db.model_by_scene(MUG).expect("mug").total_weight()
    );
}

#[test]
fn color_tolerance_admits_the_other_object() {
    let db = shelf_database();
    let (probes, raw) = measure_query(&db, BOWL);
    let config =
        MatchConfig::new(QueryKind::Plain).with_tolerance(Tolerance::exact().with_color(200.0));

    let mut query = Query::new(&db, config, probes, &raw).expect("query builds");
    query.execute().expect("query executes");
    let mut hits = query.into_detailed_results();
    rank_results(&mut hits);

    let ids: Vec<u32> = hits.iter().map(|h| h.model_id).collect();
    assert_eq!(ids, vec![MUG, BOWL]);
    assert!(hits.iter().all(|h| h.score == 1.0));
}

#[test]
fn full_query_recovers_the_identity_placement() {
    let db = shelf_database();
    let (probes, raw) = measure_query(&db, MUG);

    for kind in [QueryKind::Full, QueryKind::ImportanceFull] {
        let mut query =
            Query::new(&db, MatchConfig::new(kind), probes.clone(), &raw).expect("query builds");
        query.execute().expect("query executes");
        let hits = query.detailed_results();
        assert_eq!(hits.len(), 1, "{kind}");

        let hit = &hits[0];
        assert_eq!(hit.model_id, MUG);
        assert!((hit.score - 1.0).abs() < 1e-4, "{kind}: {}", hit.score);
        assert_eq!(hit.orientation_scores.len(), db.geometry().orientation_count());
        let placement = hit.placement.expect("full queries place the model");
        let best = hit
            .orientation_scores
            .iter()
            .copied()
            .fold(f32::MIN, f32::max);
        assert_eq!(hit.orientation_scores[placement.orientation], best);
        assert!((hit.orientation_scores[0] - 1.0).abs() < 1e-4);
    }
}

#[test]
fn saved_database_replays_recorded_query() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("shelf.pfdb");
    let recording_path = dir.path().join("query.pfqr");

    let db = shelf_database();
    db.save(&db_path).expect("save database");

    let (probes, raw) = measure_query(&db, MUG);
    let recording = QueryRecording::new(RAYS, RESOLUTION, probes.clone(), raw.clone());
    recording.save(&recording_path, 3).expect("save recording");

    let loaded = FingerprintDatabase::load(index_config(), &db_path).expect("load database");
    assert_eq!(loaded.models(), db.models());
    let replayed = QueryRecording::load(&recording_path).expect("load recording");
    assert_eq!(replayed, recording);

    let config = MatchConfig::new(QueryKind::Importance).with_max_results(1);
    let from_disk = replay(&loaded, config.clone(), &replayed).expect("replay");

    let mut direct = Query::new(&db, config, probes, &raw).expect("query builds");
    direct.execute().expect("query executes");
    assert_eq!(from_disk, direct.into_detailed_results());
    assert_eq!(from_disk[0].model_id, MUG);
}

#[test]
fn empty_cache_path_starts_an_empty_database() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = FingerprintDatabase::load_or_empty(index_config(), dir.path().join("missing.pfdb"))
        .expect("missing cache is not an error");
    assert!(db.models().is_empty());

    let (probes, raw) = measure_query(&db, MUG);
    let recording = QueryRecording::new(RAYS, RESOLUTION, probes, raw);
    let hits = replay(&db, MatchConfig::default(), &recording).expect("replay");
    assert!(hits.is_empty());
}
