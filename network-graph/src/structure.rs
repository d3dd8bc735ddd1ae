//! Size, degree, connectivity and clustering statistics.

use crate::builder::InteractionGraph;
use petgraph::algo::dijkstra;
use petgraph::graph::NodeIndex;
use petgraph::unionfind::UnionFind;
use petgraph::visit::EdgeRef;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Components larger than this get a sampled path length estimate.
pub const EXACT_PATH_LENGTH_LIMIT: usize = 1000;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GraphSummary {
    pub nodes: usize,
    pub edges: usize,
    pub total_weight: u64,
    pub density: f64,
    pub average_degree: f64,
    pub median_degree: f64,
    pub max_degree: usize,
    pub average_in_degree: f64,
    pub average_out_degree: f64,
}

impl GraphSummary {
    pub fn compute(graph: &InteractionGraph) -> Self {
        let nodes = graph.node_count();
        let edges = graph.edge_count();
        if nodes == 0 {
            return Self::default();
        }

        let mut degrees: Vec<f64> = graph
            .graph()
            .node_indices()
            .map(|index| graph.node_degree(index) as f64)
            .collect();
        degrees.sort_by(|a, b| a.total_cmp(b));

        let density = if nodes > 1 {
            edges as f64 / (nodes as f64 * (nodes as f64 - 1.0))
        } else {
            0.0
        };

        Self {
            nodes,
            edges,
            total_weight: graph.total_weight(),
            density,
            average_degree: mean(&degrees),
            median_degree: percentile(&degrees, 50.0),
            max_degree: degrees.last().copied().unwrap_or(0.0) as usize,
            // Every edge adds one to some in-degree and one to some out-degree.
            average_in_degree: edges as f64 / nodes as f64,
            average_out_degree: edges as f64 / nodes as f64,
        }
    }
}

pub fn degree_distribution(graph: &InteractionGraph) -> BTreeMap<usize, usize> {
    let mut histogram = BTreeMap::new();
    for index in graph.graph().node_indices() {
        *histogram.entry(graph.node_degree(index)).or_insert(0) += 1;
    }
    histogram
}

/// Five-number summary.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Distribution {
    pub min: f64,
    pub p25: f64,
    pub median: f64,
    pub p75: f64,
    pub max: f64,
}

impl Distribution {
    pub fn from_values(values: &[f64]) -> Self {
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        Self {
            min: sorted.first().copied().unwrap_or(0.0),
            p25: percentile(&sorted, 25.0),
            median: percentile(&sorted, 50.0),
            p75: percentile(&sorted, 75.0),
            max: sorted.last().copied().unwrap_or(0.0),
        }
    }
}

/// Percentile of sorted values with linear interpolation between ranks.
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = (q / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            let fraction = rank - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
        }
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentStats {
    pub count: usize,
    /// Component sizes, largest first.
    pub sizes: Vec<usize>,
    pub largest: usize,
    pub largest_share: f64,
    pub distribution: Distribution,
    /// Members of the largest component, sorted.
    pub largest_members: Vec<String>,
}

/// Weakly connected components.
pub fn weak_components(graph: &InteractionGraph) -> ComponentStats {
    let g = graph.graph();
    let n = g.node_count();
    if n == 0 {
        return ComponentStats::default();
    }

    let mut sets = UnionFind::<usize>::new(n);
    for edge in g.edge_references() {
        sets.union(edge.source().index(), edge.target().index());
    }

    let mut members: BTreeMap<usize, Vec<NodeIndex>> = BTreeMap::new();
    for index in g.node_indices() {
        members
            .entry(sets.find(index.index()))
            .or_default()
            .push(index);
    }

    let mut components: Vec<Vec<NodeIndex>> = members.into_values().collect();
    // Largest first; equal sizes keep the order of their first node.
    components.sort_by(|a, b| b.len().cmp(&a.len()).then(a[0].cmp(&b[0])));

    let sizes: Vec<usize> = components.iter().map(Vec::len).collect();
    let size_values: Vec<f64> = sizes.iter().map(|&s| s as f64).collect();
    let mut largest_members: Vec<String> = components[0]
        .iter()
        .map(|&index| graph.user(index).to_string())
        .collect();
    largest_members.sort_unstable();

    ComponentStats {
        count: components.len(),
        largest: sizes[0],
        largest_share: sizes[0] as f64 / n as f64,
        distribution: Distribution::from_values(&size_values),
        sizes,
        largest_members,
    }
}

/// Average clustering on the undirected simple projection.
pub fn average_clustering(graph: &InteractionGraph) -> f64 {
    let g = graph.graph();
    let n = g.node_count();
    if n == 0 {
        return 0.0;
    }

    let mut neighbors: Vec<HashSet<usize>> = vec![HashSet::new(); n];
    for edge in g.edge_references() {
        let (a, b) = (edge.source().index(), edge.target().index());
        if a != b {
            neighbors[a].insert(b);
            neighbors[b].insert(a);
        }
    }

    let total: f64 = (0..n)
        .map(|v| {
            let k = neighbors[v].len();
            if k < 2 {
                return 0.0;
            }
            let linked: Vec<usize> = neighbors[v].iter().copied().collect();
            let mut triangles = 0usize;
            for (i, &a) in linked.iter().enumerate() {
                for &b in &linked[i + 1..] {
                    if neighbors[a].contains(&b) {
                        triangles += 1;
                    }
                }
            }
            2.0 * triangles as f64 / (k as f64 * (k as f64 - 1.0))
        })
        .sum();

    total / n as f64
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathLength {
    /// Mean over reachable ordered pairs; `None` when there is no such pair.
    pub value: Option<f64>,
    pub estimated: bool,
    pub sources: usize,
}

/// Mean shortest-path length inside the largest weak component, treated as
/// undirected. Large components are estimated from `sample` seeded sources.
pub fn average_path_length(graph: &InteractionGraph, sample: usize, seed: u64) -> PathLength {
    let components = weak_components(graph);
    let component = graph.subgraph(components.largest_members.iter().map(String::as_str));
    let undirected = component.to_undirected_weights();

    let mut sources: Vec<NodeIndex> = undirected.node_indices().collect();
    let estimated = sources.len() > EXACT_PATH_LENGTH_LIMIT && sample < sources.len();
    if estimated {
        let mut rng = fastrand::Rng::with_seed(seed);
        rng.shuffle(&mut sources);
        sources.truncate(sample.max(1));
    }

    let mut total = 0usize;
    let mut pairs = 0usize;
    for &source in &sources {
        let distances = dijkstra(&undirected, source, None, |_| 1usize);
        for (&target, &distance) in &distances {
            if target != source {
                total += distance;
                pairs += 1;
            }
        }
    }

    debug!(
        "Path lengths over {} sources ({} pairs, estimated: {})",
        sources.len(),
        pairs,
        estimated
    );

    PathLength {
        value: (pairs > 0).then(|| total as f64 / pairs as f64),
        estimated,
        sources: sources.len(),
    }
}
