mod common;

use common::{MUG, measure_query, shelf_database};
use probefp::{MatchConfig, Query, QueryKind, Tolerance, rank_results};

#[test]
fn rebuilt_databases_serialize_identically() {
    let a = shelf_database().to_bytes().expect("encode a");
    let b = shelf_database().to_bytes().expect("encode b");
    assert_eq!(a, b);
}

#[test]
fn thread_bound_does_not_change_results() {
    let db = shelf_database();
    let (probes, raw) = measure_query(&db, MUG);
    let tolerance = Tolerance::new(1, 0.25, 200.0);

    for kind in [
        QueryKind::Plain,
        QueryKind::Importance,
        QueryKind::Full,
        QueryKind::ImportanceFull,
    ] {
        let run = |threads: Option<usize>| {
            let mut config = MatchConfig::new(kind).with_tolerance(tolerance);
            config.threads = threads;
            let mut query = Query::new(&db, config, probes.clone(), &raw).expect("query builds");
            query.execute().expect("query executes");
            let mut hits = query.into_detailed_results();
            rank_results(&mut hits);
            hits
        };
        let global = run(None);
        assert_eq!(global, run(Some(1)), "{kind}");
        assert_eq!(global, run(Some(3)), "{kind}");
    }
}

#[test]
fn concurrent_queries_share_one_database() {
    let db = shelf_database();
    let (probes, raw) = measure_query(&db, MUG);

    let results: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let (db, probes, raw) = (&db, probes.clone(), &raw);
                scope.spawn(move || {
                    let mut query = Query::new(db, MatchConfig::new(QueryKind::Full), probes, raw)
                        .expect("query builds");
                    query.execute().expect("query executes");
                    query.results()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("query thread"))
            .collect()
    });

    for (i, hits) in results.iter().enumerate().skip(1) {
        assert_eq!(&results[0], hits, "thread {i} diverged");
    }
}
