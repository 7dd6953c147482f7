//! End-to-end scenarios across the index, navigator and cartographer.

use carto::{Engine, EngineConfig, IndexBackend, IndexConfig, IngestRecord, Metadata};
use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;
use std::f32::consts::PI;
use tempfile::tempdir;

fn config(dim: usize) -> EngineConfig {
    EngineConfig {
        index: IndexConfig::new(dim),
        ..Default::default()
    }
}

fn titled(title: &str) -> Metadata {
    let mut m = Metadata::new();
    m.insert("title".into(), title.into());
    m
}

#[test]
fn nearest_neighbors_of_three_papers() {
    let engine = Engine::in_memory(config(4)).unwrap();
    engine.add("p1", &[1.0, 0.0, 0.0, 0.0], titled("One")).unwrap();
    engine.add("p2", &[0.9, 0.1, 0.0, 0.0], titled("Two")).unwrap();
    engine.add("p3", &[0.0, 0.0, 1.0, 0.0], titled("Three")).unwrap();

    let hits = engine.search(&[1.0, 0.0, 0.0, 0.0], 2).unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].external_id, "p1");
    assert!(hits[0].distance.abs() < 1e-6);
    assert_eq!(hits[0].metadata, titled("One"));
    assert_eq!(hits[1].external_id, "p2");
    assert!(hits[1].distance > 0.0);
}

#[test]
fn every_added_paper_is_its_own_nearest_neighbor() {
    let engine = Engine::in_memory(config(8)).unwrap();
    let mut rng = StdRng::seed_from_u64(11);
    let records: Vec<IngestRecord> = (0..200)
        .map(|i| {
            let v: Vec<f32> = (0..8).map(|_| rng.random_range(-1.0..1.0)).collect();
            IngestRecord::new(format!("paper-{i}"), v).with_metadata("rank", i)
        })
        .collect();
    let report = engine.add_batch(records.clone());
    assert_eq!(report.inserted, 200);

    for record in &records {
        let hits = engine.search(&record.vector, 1).unwrap();
        assert_eq!(hits[0].external_id, record.id);
        assert!(hits[0].distance < 1e-5);
        assert_eq!(hits[0].metadata, record.metadata);
    }
}

#[test]
fn index_survives_restart_and_upserts() {
    let dir = tempdir().unwrap();
    let mut cfg = config(3);
    cfg.index = cfg.index.with_data_dir(dir.path());

    {
        let engine = Engine::open(cfg.clone()).unwrap();
        engine.add("a", &[1.0, 0.0, 0.0], titled("A")).unwrap();
        engine.add("b", &[0.0, 1.0, 0.0], titled("B")).unwrap();
        engine.shutdown().unwrap();
    }

    {
        let engine = Engine::open(cfg.clone()).unwrap();
        assert_eq!(engine.size(), 2);
        let outcome = engine.add("a", &[0.0, 0.0, 1.0], titled("A2")).unwrap();
        assert_eq!(outcome.key(), 0);
        // No shutdown: the snapshot on disk is now stale.
    }

    let engine = Engine::open(cfg).unwrap();
    assert_eq!(engine.size(), 2);
    let hits = engine.search(&[0.0, 0.0, 1.0], 1).unwrap();
    assert_eq!(hits[0].external_id, "a");
    assert_eq!(hits[0].metadata, titled("A2"));
}

#[test]
fn flat_and_hnsw_agree_on_small_corpus() {
    let hnsw = Engine::in_memory(config(2)).unwrap();
    let mut flat_cfg = config(2);
    flat_cfg.index = flat_cfg.index.with_backend(IndexBackend::Flat);
    let flat = Engine::in_memory(flat_cfg).unwrap();

    for k in 0..40 {
        let t = k as f32 * 0.05;
        let id = format!("p{k}");
        hnsw.add(&id, &[t.cos(), t.sin()], Metadata::new()).unwrap();
        flat.add(&id, &[t.cos(), t.sin()], Metadata::new()).unwrap();
    }

    let q = [0.3f32.cos(), 0.3f32.sin()];
    let ids = |engine: &Engine| {
        let mut ids: Vec<String> = engine
            .search(&q, 5)
            .unwrap()
            .into_iter()
            .map(|h| h.external_id)
            .collect();
        ids.sort();
        ids
    };
    assert_eq!(ids(&hnsw), ids(&flat));
    assert_eq!(hnsw.search(&q, 1).unwrap()[0].external_id, "p6");
}

#[test]
fn ring_corpus_has_a_void_and_a_central_gap() {
    let engine = Engine::in_memory(config(2)).unwrap();
    for k in 0..20 {
        let t = 2.0 * PI * k as f32 / 20.0;
        engine
            .add(&format!("ring-{k}"), &[t.cos(), t.sin()], Metadata::new())
            .unwrap();
    }

    let points = engine.points::<&str>(None).unwrap();
    let voids = engine.detect_voids(&points).unwrap();
    assert!(!voids.is_empty());
    assert!(voids.iter().all(|v| v.dimension == 1 && v.persistence() > 0.1));

    let mut rng = StdRng::seed_from_u64(2024);
    let gap = engine.find_gap(&points, Some(2000), &mut rng).unwrap().unwrap();
    assert!(gap.clearance > 0.7, "{gap:?}");
}

#[test]
fn bridges_between_two_topics() {
    let engine = Engine::in_memory(config(3)).unwrap();
    let papers: [(&str, [f32; 3]); 6] = [
        ("ml-1", [1.0, 0.0, 0.0]),
        ("ml-2", [0.95, 0.3, 0.0]),
        ("bridge", [0.7, 0.7, 0.1]),
        ("bio-1", [0.0, 1.0, 0.0]),
        ("bio-2", [0.3, 0.95, 0.0]),
        ("unrelated", [0.0, 0.0, 1.0]),
    ];
    for (id, v) in papers {
        engine.add(id, &v, Metadata::new()).unwrap();
    }

    let bridges = engine
        .find_bridge_papers(
            &["ml-1", "ml-2", "unknown"],
            &["bio-1", "bio-2", "bridge", "unrelated"],
            Some(2),
        )
        .unwrap();
    assert_eq!(bridges.len(), 2);
    assert_eq!(bridges[0].external_id, "bridge");
    assert!(bridges[0].centrality_score > 0.0);
}
