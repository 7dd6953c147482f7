//! Vietoris-Rips persistent homology in dimensions 0 and 1.
//!
//! The filtration adds an edge between two points when the scale reaches
//! their Euclidean distance, and a triangle when it reaches the longest of
//! its three edges.
//!
//! - H0 comes from a union-find pass over the sorted edges: an edge that
//!   merges two components kills a class born at 0; an edge that does not
//!   creates a cycle.
//! - H1 comes from reducing the triangle boundary matrix over Z/2. Each
//!   column that keeps a pivot pairs that cycle-creating edge (birth) with
//!   the triangle (death). Cycle edges left unpaired are infinite bars,
//!   which only happens when the filtration is truncated by `max_radius`.
//!
//! Triangles are enumerated one edge at a time rather than materialized,
//! so memory grows with the number of edges. Time still grows with the
//! number of triangles, cubic in the number of points; truncate with
//! `max_radius` for large clouds.

use carto_core::Result;
use carto_core::math::{check_finite, common_dimension};
use petgraph::unionfind::UnionFind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A `(birth, death, dimension)` triple of a persistence diagram.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TopologicalFeature {
    /// Scale at which the feature appears.
    pub birth: f64,
    /// Scale at which the feature disappears; infinite if it never does.
    #[serde(with = "infinite_as_null")]
    pub death: f64,
    /// Homology dimension: 0 for components, 1 for loops.
    pub dimension: usize,
}

impl TopologicalFeature {
    /// `death - birth`; infinite for features that never die.
    pub fn persistence(&self) -> f64 {
        self.death - self.birth
    }

    /// Whether the feature dies within the filtration.
    pub fn is_finite(&self) -> bool {
        self.death.is_finite()
    }
}

/// All features of a point cloud, sorted by dimension, birth, then death.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistenceDiagram {
    /// Number of points the diagram was computed from.
    pub point_count: usize,
    /// The features.
    pub features: Vec<TopologicalFeature>,
}

impl PersistenceDiagram {
    /// Features of one homology dimension.
    pub fn dimension(&self, dimension: usize) -> impl Iterator<Item = &TopologicalFeature> {
        self.features
            .iter()
            .filter(move |f| f.dimension == dimension)
    }

    /// Finite features of `dimension` whose persistence exceeds `threshold`.
    pub fn significant(&self, dimension: usize, threshold: f64) -> Vec<TopologicalFeature> {
        self.dimension(dimension)
            .filter(|f| f.is_finite() && f.persistence() > threshold)
            .copied()
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
struct Edge {
    i: usize,
    j: usize,
    length: f64,
}

fn euclidean(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = *x as f64 - *y as f64;
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

/// Symmetric difference of two columns sorted in descending order.
fn add_columns(a: &[usize], b: &[usize]) -> Vec<usize> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut x, mut y) = (0, 0);
    while x < a.len() && y < b.len() {
        match a[x].cmp(&b[y]) {
            std::cmp::Ordering::Greater => {
                out.push(a[x]);
                x += 1;
            }
            std::cmp::Ordering::Less => {
                out.push(b[y]);
                y += 1;
            }
            std::cmp::Ordering::Equal => {
                x += 1;
                y += 1;
            }
        }
    }
    out.extend_from_slice(&a[x..]);
    out.extend_from_slice(&b[y..]);
    out
}

/// Fill `out` with the triangles whose longest edge is `e`, in filtration
/// order.
///
/// Each triangle is its three edge indices in descending order. Edge
/// indices follow length order, so sorting these triples sorts the
/// triangles by appearance.
fn triangles_closed_by(
    e: usize,
    edges: &[Edge],
    edge_at: &HashMap<(usize, usize), usize>,
    n: usize,
    out: &mut Vec<[usize; 3]>,
) {
    out.clear();
    let Edge { i, j, .. } = edges[e];
    let index = |a: usize, b: usize| edge_at.get(&(a.min(b), a.max(b))).copied();
    for k in 0..n {
        if k == i || k == j {
            continue;
        }
        if let (Some(ik), Some(jk)) = (index(i, k), index(j, k))
            && ik < e
            && jk < e
        {
            out.push([e, ik.max(jk), ik.min(jk)]);
        }
    }
    out.sort_unstable();
}

/// Persistence diagram of the Rips filtration of `points`, up to H1.
///
/// `max_radius` drops edges longer than the given scale.
pub fn rips_persistence<V: AsRef<[f32]>>(
    points: &[V],
    max_radius: Option<f64>,
) -> Result<PersistenceDiagram> {
    common_dimension(points)?;
    for p in points {
        check_finite(p.as_ref())?;
    }
    let n = points.len();
    let mut features = Vec::new();

    // Edges, in filtration order.
    let mut edges = Vec::new();
    for i in 0..n {
        for j in (i + 1)..n {
            let length = euclidean(points[i].as_ref(), points[j].as_ref());
            if max_radius.is_none_or(|r| length <= r) {
                edges.push(Edge { i, j, length });
            }
        }
    }
    edges.sort_by(|a, b| {
        a.length
            .total_cmp(&b.length)
            .then_with(|| a.i.cmp(&b.i))
            .then_with(|| a.j.cmp(&b.j))
    });

    // H0.
    let mut components = UnionFind::<usize>::new(n);
    let mut creates_cycle = vec![false; edges.len()];
    let mut merges = 0;
    for (e, edge) in edges.iter().enumerate() {
        if components.union(edge.i, edge.j) {
            merges += 1;
            features.push(TopologicalFeature {
                birth: 0.0,
                death: edge.length,
                dimension: 0,
            });
        } else {
            creates_cycle[e] = true;
        }
    }
    for _ in 0..(n - merges) {
        features.push(TopologicalFeature {
            birth: 0.0,
            death: f64::INFINITY,
            dimension: 0,
        });
    }

    // H1. Triangles are generated per edge, grouped by their longest
    // edge, so only one edge's cofacets are held at a time.
    let mut edge_at = HashMap::with_capacity(edges.len());
    for (e, edge) in edges.iter().enumerate() {
        edge_at.insert((edge.i, edge.j), e);
    }
    let mut open_cycles = creates_cycle.iter().filter(|c| **c).count();
    let mut reduced: HashMap<usize, Vec<usize>> = HashMap::new();
    let mut cofacets = Vec::new();
    let mut triangles = 0usize;
    for e in 0..edges.len() {
        if open_cycles == 0 {
            break;
        }
        triangles_closed_by(e, &edges, &edge_at, n, &mut cofacets);
        triangles += cofacets.len();

        for t in &cofacets {
            let mut column = t.to_vec();
            while let Some(&low) = column.first() {
                match reduced.get(&low) {
                    Some(other) => column = add_columns(&column, other),
                    None => break,
                }
            }
            if let Some(&low) = column.first() {
                let birth = edges[low].length;
                let death = edges[e].length;
                if death > birth {
                    features.push(TopologicalFeature {
                        birth,
                        death,
                        dimension: 1,
                    });
                }
                reduced.insert(low, column);
                open_cycles -= 1;
                if open_cycles == 0 {
                    break;
                }
            }
        }
    }
    for (e, edge) in edges.iter().enumerate() {
        if creates_cycle[e] && !reduced.contains_key(&e) {
            features.push(TopologicalFeature {
                birth: edge.length,
                death: f64::INFINITY,
                dimension: 1,
            });
        }
    }

    features.sort_by(|a, b| {
        a.dimension
            .cmp(&b.dimension)
            .then_with(|| a.birth.total_cmp(&b.birth))
            .then_with(|| a.death.total_cmp(&b.death))
    });

    log::debug!(
        "Rips persistence over {n} points: {} edges, {triangles} triangles, {} features",
        edges.len(),
        features.len()
    );

    Ok(PersistenceDiagram {
        point_count: n,
        features,
    })
}

/// Serialize infinite deaths as `null` and read `null` back as infinity.
mod infinite_as_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::INFINITY))
    }
}

// ============================================================================
// Tests
// ============================================================================
