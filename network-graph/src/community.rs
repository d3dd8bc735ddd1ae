//! Louvain community detection on the undirected, weighted projection.

use crate::builder::InteractionGraph;
use petgraph::visit::EdgeRef;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

const MIN_GAIN: f64 = 1e-12;

/// Community assignment of every user. Community ids are dense and ordered
/// by decreasing size, so id 0 is the largest community.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partition {
    labels: BTreeMap<String, usize>,
    sizes: Vec<usize>,
    modularity: f64,
}

impl Partition {
    pub fn community_of(&self, user: &str) -> Option<usize> {
        self.labels.get(user).copied()
    }

    pub fn community_count(&self) -> usize {
        self.sizes.len()
    }

    /// Sizes indexed by community id.
    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    pub fn modularity(&self) -> f64 {
        self.modularity
    }

    /// `(user, community)` in user-name order.
    pub fn labels(&self) -> impl Iterator<Item = (&str, usize)> + '_ {
        self.labels.iter().map(|(user, &id)| (user.as_str(), id))
    }

    /// Members of `community`, sorted.
    pub fn members(&self, community: usize) -> Vec<&str> {
        self.labels
            .iter()
            .filter(|(_, &id)| id == community)
            .map(|(user, _)| user.as_str())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// One aggregation level: symmetric adjacency without self-loops, plus the
/// self-loop weight of every node.
#[derive(Clone)]
struct Level {
    adjacency: Vec<Vec<(usize, f64)>>,
    self_loops: Vec<f64>,
}

impl Level {
    fn from_graph(graph: &InteractionGraph) -> Self {
        let undirected = graph.to_undirected_weights();
        let n = undirected.node_count();
        let mut adjacency = vec![Vec::new(); n];
        let mut self_loops = vec![0.0; n];
        for edge in undirected.edge_references() {
            let (a, b) = (edge.source().index(), edge.target().index());
            let weight = *edge.weight();
            if a == b {
                self_loops[a] += weight;
            } else {
                adjacency[a].push((b, weight));
                adjacency[b].push((a, weight));
            }
        }
        Self {
            adjacency,
            self_loops,
        }
    }

    fn len(&self) -> usize {
        self.adjacency.len()
    }

    fn degree(&self, node: usize) -> f64 {
        self.adjacency[node].iter().map(|(_, w)| w).sum::<f64>() + 2.0 * self.self_loops[node]
    }

    /// Twice the total edge weight.
    fn double_weight(&self) -> f64 {
        (0..self.len()).map(|node| self.degree(node)).sum()
    }

    /// Collapse each community into a single node.
    fn aggregate(&self, communities: &[usize], count: usize) -> Self {
        let mut between: Vec<HashMap<usize, f64>> = vec![HashMap::new(); count];
        let mut self_loops = vec![0.0; count];

        for node in 0..self.len() {
            let c = communities[node];
            self_loops[c] += self.self_loops[node];
            for &(neighbor, weight) in &self.adjacency[node] {
                let d = communities[neighbor];
                if c == d {
                    // Each internal edge is seen from both ends.
                    self_loops[c] += weight / 2.0;
                } else {
                    *between[c].entry(d).or_insert(0.0) += weight;
                }
            }
        }

        let adjacency = between
            .into_iter()
            .map(|links| {
                let mut links: Vec<(usize, f64)> = links.into_iter().collect();
                links.sort_by_key(|&(neighbor, _)| neighbor);
                links
            })
            .collect();

        Self {
            adjacency,
            self_loops,
        }
    }

    fn modularity(&self, communities: &[usize]) -> f64 {
        let m2 = self.double_weight();
        if m2 == 0.0 {
            return 0.0;
        }

        let mut internal: BTreeMap<usize, f64> = BTreeMap::new();
        let mut total: BTreeMap<usize, f64> = BTreeMap::new();
        for node in 0..self.len() {
            let c = communities[node];
            *total.entry(c).or_insert(0.0) += self.degree(node);
            let mut inside = self.self_loops[node];
            for &(neighbor, weight) in &self.adjacency[node] {
                if communities[neighbor] == c {
                    inside += weight / 2.0;
                }
            }
            *internal.entry(c).or_insert(0.0) += inside;
        }

        total
            .iter()
            .map(|(c, &tot)| {
                let inside = internal.get(c).copied().unwrap_or(0.0);
                2.0 * inside / m2 - (tot / m2).powi(2)
            })
            .sum()
    }

    /// Local moving phase. Returns the community of each node and whether any
    /// node changed community.
    fn one_level(&self) -> (Vec<usize>, bool) {
        let n = self.len();
        let m2 = self.double_weight();
        let mut community: Vec<usize> = (0..n).collect();
        if m2 == 0.0 {
            return (community, false);
        }

        let degrees: Vec<f64> = (0..n).map(|node| self.degree(node)).collect();
        let mut total = degrees.clone();
        let mut improved = false;

        loop {
            let mut moved = false;
            for node in 0..n {
                let current = community[node];
                let k = degrees[node];

                let mut links: BTreeMap<usize, f64> = BTreeMap::new();
                for &(neighbor, weight) in &self.adjacency[node] {
                    *links.entry(community[neighbor]).or_insert(0.0) += weight;
                }

                total[current] -= k;
                let gain = |c: usize, w: f64| w - total[c] * k / m2;

                let mut best = current;
                let mut best_gain = gain(current, links.get(&current).copied().unwrap_or(0.0));
                for (&c, &w) in &links {
                    let candidate = gain(c, w);
                    if candidate > best_gain + MIN_GAIN {
                        best = c;
                        best_gain = candidate;
                    }
                }

                total[best] += k;
                if best != current {
                    community[node] = best;
                    moved = true;
                    improved = true;
                }
            }
            if !moved {
                break;
            }
        }

        (community, improved)
    }
}

/// Renumber labels densely in order of first appearance.
fn compact(labels: &[usize]) -> (Vec<usize>, usize) {
    let mut mapping: HashMap<usize, usize> = HashMap::new();
    let compacted = labels
        .iter()
        .map(|label| {
            let next = mapping.len();
            *mapping.entry(*label).or_insert(next)
        })
        .collect();
    (compacted, mapping.len())
}

/// Louvain modularity optimisation with resolution 1.0. Nodes are visited in
/// insertion order, so a fixed graph always yields the same partition.
pub fn louvain(graph: &InteractionGraph) -> Partition {
    if graph.is_empty() {
        return Partition::default();
    }

    let base = Level::from_graph(graph);
    let mut membership: Vec<usize> = (0..base.len()).collect();

    let mut level = base.clone();
    let mut levels = 0;
    loop {
        let (communities, improved) = level.one_level();
        if !improved {
            break;
        }
        let (communities, count) = compact(&communities);
        for label in membership.iter_mut() {
            *label = communities[*label];
        }
        level = level.aggregate(&communities, count);
        levels += 1;
    }

    let modularity = base.modularity(&membership);

    // Order communities by size, then by their smallest member name.
    let mut groups: BTreeMap<usize, Vec<&str>> = BTreeMap::new();
    for index in graph.graph().node_indices() {
        groups
            .entry(membership[index.index()])
            .or_default()
            .push(graph.user(index));
    }
    let mut ordered: Vec<Vec<&str>> = groups
        .into_values()
        .map(|mut members| {
            members.sort_unstable();
            members
        })
        .collect();
    ordered.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a[0].cmp(b[0])));

    let mut labels = BTreeMap::new();
    let mut sizes = Vec::with_capacity(ordered.len());
    for (id, members) in ordered.iter().enumerate() {
        sizes.push(members.len());
        for user in members {
            labels.insert(user.to_string(), id);
        }
    }

    debug!(
        "Louvain: {} communities over {} levels, modularity {:.4}",
        sizes.len(),
        levels,
        modularity
    );

    Partition {
        labels,
        sizes,
        modularity,
    }
}
