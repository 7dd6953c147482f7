//! Handler functions for the engine commands.
//!
//! Each handler prints a human-readable report to stdout and returns the
//! underlying data. Long numeric work (voids, gaps) runs on the blocking
//! pool under a deadline; see [`run_blocking`].

use carto::{
    BridgePaper, Engine, GapCandidate, GraphStats, IndexStats, IngestError, IngestRecord,
    IngestReport, SearchHit, TopologicalFeature,
};
use carto_core::{Error, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::Path;
use std::time::{Duration, Instant};

// ============================================================================
// Option types
// ============================================================================

/// Options for gap sampling.
#[derive(Debug, Clone, Default)]
pub struct GapOptions {
    /// Restrict sampling to these papers.
    pub ids: Option<Vec<String>>,
    /// Candidate points to draw.
    pub samples: Option<usize>,
    /// RNG seed; fresh OS entropy when absent.
    pub seed: Option<u64>,
    /// Neighboring papers to list.
    pub limit: usize,
}

// ============================================================================
// Blocking work
// ============================================================================

/// Run `work` on the blocking pool, optionally under a deadline.
///
/// A missed deadline surfaces as [`Error::Timeout`], which is retryable.
/// The computation itself is not interrupted.
pub async fn run_blocking<T, F>(operation: &str, timeout: Option<Duration>, work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let task = tokio::task::spawn_blocking(work);
    let joined = match timeout {
        Some(limit) => tokio::time::timeout(limit, task).await.map_err(|_| {
            tracing::warn!("{operation} exceeded {}s", limit.as_secs());
            Error::timeout(operation, limit.as_secs())
        })?,
        None => task.await,
    };
    joined.map_err(|e| Error::operation(format!("{operation} task failed: {e}")))?
}

// ============================================================================
// Ingest
// ============================================================================

/// Parse a JSON Lines file of papers.
///
/// Blank lines are skipped. Malformed lines become usage errors keyed by
/// line number so one bad record does not sink the batch.
pub fn read_ingest_file(path: &Path) -> Result<(Vec<IngestRecord>, Vec<IngestError>)> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::io_with_path(e, path))?;
    let mut records = Vec::new();
    let mut malformed = Vec::new();

    for (n, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<IngestRecord>(line) {
            Ok(record) => records.push(record),
            Err(e) => {
                log::error!("Skipping {}:{}: {e}", path.display(), n + 1);
                malformed.push(IngestError {
                    external_id: format!("line {}", n + 1),
                    message: e.to_string(),
                    usage_error: true,
                });
            }
        }
    }
    Ok((records, malformed))
}

/// Add every record in a JSONL file.
pub fn handle_ingest(engine: &Engine, path: &Path) -> Result<IngestReport> {
    let started = Instant::now();
    let (records, malformed) = read_ingest_file(path)?;
    let mut report = engine.add_batch(records);
    report.failed.extend(malformed);
    report.duration_ms = started.elapsed().as_millis() as u64;

    println!("Ingested {}:", path.display());
    println!("  Inserted: {}", report.inserted);
    println!("  Replaced: {}", report.replaced);
    println!("  Failed:   {}", report.failed.len());
    for failure in &report.failed {
        println!("    {}: {}", failure.external_id, failure.message);
    }
    println!("  Time:     {}ms", report.duration_ms);
    Ok(report)
}

// ============================================================================
// Search and navigation
// ============================================================================

/// Search by seed paper or raw vector.
pub fn handle_search(
    engine: &Engine,
    id: Option<&str>,
    vector: Option<&[f32]>,
    limit: usize,
) -> Result<Vec<SearchHit>> {
    let hits = match (id, vector) {
        (Some(id), None) => engine.search_by_id(id, limit)?,
        (None, Some(vector)) => engine.search(vector, limit)?,
        _ => return Err(Error::invalid_input("give exactly one of --id or --vector")),
    };
    print_hits(&hits);
    Ok(hits)
}

/// Papers near the centroid of the seeds.
pub fn handle_explore(engine: &Engine, ids: &[String], limit: usize) -> Result<Vec<SearchHit>> {
    let hits = engine.explore_interest(ids, limit)?;
    if hits.is_empty() {
        println!("No papers found near {} seed(s)", ids.len());
    }
    print_hits(&hits);
    Ok(hits)
}

/// Centroid of the given papers.
pub fn handle_centroid(engine: &Engine, ids: &[String]) -> Result<Option<Vec<f32>>> {
    let centroid = engine.centroid_of(ids, None)?;
    match &centroid {
        Some(v) => println!("{}", serde_json::to_string(v)?),
        None => println!("None of the {} papers are indexed", ids.len()),
    }
    Ok(centroid)
}

/// Bridge papers between two clusters.
pub fn handle_bridges(
    engine: &Engine,
    a: &[String],
    b: &[String],
    top_k: Option<usize>,
) -> Result<Vec<BridgePaper>> {
    let bridges = engine.find_bridge_papers(a, b, top_k)?;
    if bridges.is_empty() {
        println!("No bridge papers: the clusters share no similarity edges");
    }
    for (rank, bridge) in bridges.iter().enumerate() {
        println!(
            "{:>3}. {}  centrality={:.4}  degree={}",
            rank + 1,
            bridge.external_id,
            bridge.centrality_score,
            bridge.degree
        );
    }
    Ok(bridges)
}

// ============================================================================
// Cartography
// ============================================================================

/// Voids in the corpus or a subset of it.
pub async fn handle_voids(
    engine: Engine,
    ids: Option<Vec<String>>,
    timeout: Duration,
) -> Result<Vec<TopologicalFeature>> {
    let voids = run_blocking("void detection", Some(timeout), move || {
        let points = engine.points(ids.as_deref())?;
        log::info!("Computing persistence over {} papers", points.len());
        engine.detect_voids(&points)
    })
    .await?;

    if voids.is_empty() {
        println!("No significant voids");
    }
    for void in &voids {
        println!(
            "H{}  birth={:.4}  death={:.4}  persistence={:.4}",
            void.dimension,
            void.birth,
            void.death,
            void.persistence()
        );
    }
    Ok(voids)
}

/// The emptiest sampled point and the papers bordering it.
pub async fn handle_gaps(
    engine: Engine,
    options: GapOptions,
    timeout: Duration,
) -> Result<Option<(GapCandidate, Vec<SearchHit>)>> {
    let found = run_blocking("gap sampling", Some(timeout), move || {
        let mut rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        engine.explore_gap(options.ids.as_deref(), options.samples, options.limit, &mut rng)
    })
    .await?;

    match &found {
        Some((gap, neighbors)) => {
            println!("Gap clearance: {:.4}", gap.clearance);
            println!("Coordinates:   {}", serde_json::to_string(&gap.coordinates)?);
            println!("Bordering papers:");
            print_hits(neighbors);
        }
        None => println!("Not enough papers to sample a gap"),
    }
    Ok(found)
}

// ============================================================================
// Stats
// ============================================================================

/// Index counters, plus graph statistics when ids are given.
pub fn handle_stats(
    engine: &Engine,
    ids: Option<&[String]>,
) -> Result<(IndexStats, Option<GraphStats>)> {
    let stats = engine.stats()?;
    println!("Index:");
    println!("  Papers:     {}", stats.records);
    println!("  Indexed:    {}", stats.indexed);
    println!("  Dimension:  {}", stats.dimension);
    println!("  Backend:    {} ({})", stats.backend, stats.metric);
    println!("  Generation: {}", stats.generation);
    println!("  Snapshot:   {}", if stats.snapshot_fresh { "fresh" } else { "stale" });
    if let Some(dir) = &stats.data_dir {
        println!("  Location:   {dir}");
    }

    let graph = match ids {
        Some(ids) => {
            let graph = engine.graph_stats(ids)?;
            println!("Similarity graph (threshold {}):", graph.threshold);
            println!("  Papers:      {}", graph.node_count);
            println!("  Edges:       {}", graph.edge_count);
            println!("  Isolated:    {}", graph.isolated_count);
            println!("  Components:  {}", graph.component_count);
            println!("  Avg degree:  {:.2}", graph.avg_degree);
            println!("  Density:     {:.4}", graph.density);
            if let Some(id) = &graph.most_connected {
                println!("  Hub:         {id} ({} edges)", graph.max_degree);
            }
            Some(graph)
        }
        None => None,
    };
    Ok((stats, graph))
}

// ============================================================================
// Output helpers
// ============================================================================

fn print_hits(hits: &[SearchHit]) {
    for (rank, hit) in hits.iter().enumerate() {
        match hit.metadata.get("title").and_then(|t| t.as_str()) {
            Some(title) => println!(
                "{:>3}. {}  distance={:.4}  {title}",
                rank + 1,
                hit.external_id,
                hit.distance
            ),
            None => println!("{:>3}. {}  distance={:.4}", rank + 1, hit.external_id, hit.distance),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use carto::{EngineConfig, IndexConfig, Metadata};

    fn engine() -> Engine {
        let engine = Engine::in_memory(EngineConfig {
            index: IndexConfig::new(2),
            ..Default::default()
        })
        .unwrap();
        for k in 0..12 {
            let t = std::f32::consts::PI * 2.0 * k as f32 / 12.0;
            engine
                .add(&format!("p{k}"), &[t.cos(), t.sin()], Metadata::new())
                .unwrap();
        }
        engine
    }

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    // ------------------------------------------------------------------------
    // Ingest
    // ------------------------------------------------------------------------

    #[test]
    fn test_read_ingest_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("papers.jsonl");
        std::fs::write(
            &path,
            concat!(
                "{\"id\": \"a\", \"vector\": [1.0, 0.0], \"metadata\": {\"title\": \"A\"}}\n",
                "\n",
                "{\"external_id\": \"b\", \"vector\": [0.0, 1.0]}\n",
                "not json\n",
            ),
        )
        .unwrap();

        let (records, malformed) = read_ingest_file(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].id, "b");
        assert_eq!(malformed.len(), 1);
        assert_eq!(malformed[0].external_id, "line 4");
        assert!(malformed[0].usage_error);
    }

    #[test]
    fn test_read_ingest_file_missing() {
        let err = read_ingest_file(Path::new("/nonexistent/papers.jsonl")).unwrap_err();
        assert!(err.is_storage_error());
    }

    #[test]
    fn test_handle_ingest_counts_failures() {
        let engine = Engine::in_memory(EngineConfig {
            index: IndexConfig::new(2),
            ..Default::default()
        })
        .unwrap();
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("papers.jsonl");
        std::fs::write(
            &path,
            concat!(
                "{\"id\": \"a\", \"vector\": [1.0, 0.0]}\n",
                "{\"id\": \"a\", \"vector\": [0.5, 0.5]}\n",
                "{\"id\": \"c\", \"vector\": [1.0, 0.0, 0.0]}\n",
                "{broken\n",
            ),
        )
        .unwrap();

        let report = handle_ingest(&engine, &path).unwrap();
        assert_eq!(report.inserted, 1);
        assert_eq!(report.replaced, 1);
        assert_eq!(report.failed.len(), 2);
        assert_eq!(engine.size(), 1);
    }

    // ------------------------------------------------------------------------
    // Search and navigation
    // ------------------------------------------------------------------------

    #[test]
    fn test_handle_search() {
        let engine = engine();
        let by_id = handle_search(&engine, Some("p0"), None, 2).unwrap();
        assert_eq!(by_id.len(), 2);
        assert!(by_id.iter().all(|h| h.external_id != "p0"));

        let by_vector = handle_search(&engine, None, Some(&[1.0, 0.0][..]), 1).unwrap();
        assert_eq!(by_vector[0].external_id, "p0");

        assert!(handle_search(&engine, None, None, 1).is_err());
        assert!(handle_search(&engine, Some("ghost"), None, 1).is_err());
    }

    #[test]
    fn test_handle_centroid_and_explore() {
        let engine = engine();
        let centroid = handle_centroid(&engine, &ids(&["p0", "ghost"])).unwrap().unwrap();
        assert!((centroid[0] - 1.0).abs() < 1e-6);

        assert!(handle_centroid(&engine, &ids(&["ghost"])).unwrap().is_none());

        let hits = handle_explore(&engine, &ids(&["p0"]), 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.external_id != "p0"));
    }

    #[test]
    fn test_handle_bridges_without_edges() {
        let engine = engine();
        // Neighbors on a 12-point circle have cosine 0.866; p0 and p6 are opposite.
        let bridges = handle_bridges(&engine, &ids(&["p0"]), &ids(&["p6"]), None).unwrap();
        assert!(bridges.is_empty());

        let bridges = handle_bridges(&engine, &ids(&["p0"]), &ids(&["p1", "p2"]), Some(1)).unwrap();
        assert_eq!(bridges.len(), 1);
        assert_eq!(bridges[0].external_id, "p1");
    }

    // ------------------------------------------------------------------------
    // Cartography
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_handle_voids_on_ring() {
        let voids = handle_voids(engine(), None, Duration::from_secs(30))
            .await
            .unwrap();
        assert!(!voids.is_empty());

        let subset = handle_voids(engine(), Some(ids(&["p0", "p1"])), Duration::from_secs(30))
            .await
            .unwrap();
        assert!(subset.is_empty());
    }

    #[tokio::test]
    async fn test_handle_gaps_is_reproducible() {
        let options = GapOptions {
            samples: Some(300),
            seed: Some(17),
            limit: 3,
            ..Default::default()
        };
        let (a, near_a) = handle_gaps(engine(), options.clone(), Duration::from_secs(30))
            .await
            .unwrap()
            .unwrap();
        let (b, _) = handle_gaps(engine(), options, Duration::from_secs(30))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(near_a.len(), 3);
    }

    #[tokio::test]
    async fn test_run_blocking_timeout_is_retryable() {
        let err = run_blocking("sleepy", Some(Duration::from_millis(10)), || {
            std::thread::sleep(Duration::from_millis(200));
            Ok(())
        })
        .await
        .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_run_blocking_passes_errors_through() {
        let err = run_blocking::<(), _>("failing", None, || Err(Error::not_found("p9")))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    // ------------------------------------------------------------------------
    // Stats
    // ------------------------------------------------------------------------

    #[test]
    fn test_handle_stats() {
        let engine = engine();
        let (stats, graph) = handle_stats(&engine, None).unwrap();
        assert_eq!(stats.records, 12);
        assert!(graph.is_none());

        let (_, graph) = handle_stats(&engine, Some(ids(&["p0", "p1", "p6"]).as_slice())).unwrap();
        let graph = graph.unwrap();
        assert_eq!(graph.node_count, 3);
        assert_eq!(graph.edge_count, 1);
    }
}
