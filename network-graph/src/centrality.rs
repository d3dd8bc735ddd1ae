use crate::builder::InteractionGraph;
use infonet_core::{AnalysisConfig, GraphError};
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{BTreeMap, VecDeque};
use tracing::debug;

/// A score per user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeScores {
    scores: BTreeMap<String, f64>,
}

impl NodeScores {
    fn from_indexed(graph: &InteractionGraph, values: &[f64]) -> Self {
        let scores = graph
            .graph()
            .node_indices()
            .map(|index| (graph.user(index).to_string(), values[index.index()]))
            .collect();
        Self { scores }
    }

    /// Score of `user`, 0.0 when the user is not in the graph.
    pub fn get(&self, user: &str) -> f64 {
        self.scores.get(user).copied().unwrap_or(0.0)
    }

    pub fn contains(&self, user: &str) -> bool {
        self.scores.contains_key(user)
    }

    /// Highest `n` scores; equal scores are ordered by user name.
    pub fn top(&self, n: usize) -> Vec<(&str, f64)> {
        let mut ranked: Vec<(&str, f64)> = self
            .scores
            .iter()
            .map(|(user, &score)| (user.as_str(), score))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(n);
        ranked
    }

    pub fn max(&self) -> f64 {
        self.scores.values().copied().fold(0.0, f64::max)
    }

    pub fn mean(&self) -> f64 {
        if self.scores.is_empty() {
            0.0
        } else {
            self.scores.values().sum::<f64>() / self.scores.len() as f64
        }
    }

    pub fn sum(&self) -> f64 {
        self.scores.values().sum()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Scores in user-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.scores.iter().map(|(user, &score)| (user.as_str(), score))
    }
}

/// Unweighted in+out degree divided by `n - 1`.
pub fn degree_centrality(graph: &InteractionGraph) -> NodeScores {
    let n = graph.node_count();
    let values: Vec<f64> = graph
        .graph()
        .node_indices()
        .map(|index| {
            if n <= 1 {
                1.0
            } else {
                graph.node_degree(index) as f64 / (n - 1) as f64
            }
        })
        .collect();
    NodeScores::from_indexed(graph, &values)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageRankConfig {
    pub damping: f64,
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for PageRankConfig {
    fn default() -> Self {
        Self {
            damping: 0.85,
            max_iterations: 100,
            tolerance: 1e-6,
        }
    }
}

impl PageRankConfig {
    pub fn from_analysis(config: &AnalysisConfig) -> Self {
        Self {
            damping: config.pagerank_damping,
            max_iterations: config.pagerank_max_iter,
            ..Self::default()
        }
    }
}

/// Weighted PageRank by power iteration. Dangling users spread their mass
/// uniformly. Converged when the L1 change drops below `n * tolerance`.
pub fn pagerank(graph: &InteractionGraph, config: &PageRankConfig) -> Result<NodeScores, GraphError> {
    let g = graph.graph();
    let n = g.node_count();
    if n == 0 {
        return Ok(NodeScores::default());
    }

    let out_weight: Vec<f64> = g
        .node_indices()
        .map(|index| {
            g.edges_directed(index, Direction::Outgoing)
                .map(|edge| *edge.weight() as f64)
                .sum()
        })
        .collect();
    let dangling: Vec<usize> = (0..n).filter(|&i| out_weight[i] == 0.0).collect();

    let uniform = 1.0 / n as f64;
    let alpha = config.damping;
    let mut x = vec![uniform; n];

    for iteration in 0..config.max_iterations {
        let last = std::mem::replace(&mut x, vec![0.0; n]);

        let dangling_sum: f64 = alpha * dangling.iter().map(|&i| last[i]).sum::<f64>();
        for edge in g.edge_references() {
            let (u, v) = (edge.source().index(), edge.target().index());
            x[v] += alpha * last[u] * (*edge.weight() as f64 / out_weight[u]);
        }
        for value in x.iter_mut() {
            *value += dangling_sum * uniform + (1.0 - alpha) * uniform;
        }

        let err: f64 = x.iter().zip(&last).map(|(a, b)| (a - b).abs()).sum();
        if err < n as f64 * config.tolerance {
            debug!("PageRank converged after {} iterations", iteration + 1);
            return Ok(NodeScores::from_indexed(graph, &x));
        }
    }

    Err(GraphError::ConvergenceFailed {
        algorithm: "pagerank",
        iterations: config.max_iterations,
    })
}

/// Brandes betweenness over directed, unweighted shortest paths, normalized
/// by `1/((n-1)(n-2))`. When `samples` is non-zero and below `n`, that many
/// seeded pivot sources are used and the result is scaled by `n/k`.
pub fn betweenness_centrality(graph: &InteractionGraph, samples: usize, seed: u64) -> NodeScores {
    let g = graph.graph();
    let n = g.node_count();
    if n == 0 {
        return NodeScores::default();
    }

    let mut sources: Vec<NodeIndex> = g.node_indices().collect();
    let sampled = samples > 0 && samples < n;
    if sampled {
        let mut rng = fastrand::Rng::with_seed(seed);
        rng.shuffle(&mut sources);
        sources.truncate(samples);
    }

    let successors: Vec<Vec<usize>> = g
        .node_indices()
        .map(|index| g.neighbors_directed(index, Direction::Outgoing).map(|i| i.index()).collect())
        .collect();

    let mut centrality = vec![0.0; n];
    let mut stack = Vec::with_capacity(n);
    let mut queue = VecDeque::with_capacity(n);
    let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut sigma = vec![0.0f64; n];
    let mut distance = vec![-1i64; n];
    let mut delta = vec![0.0f64; n];

    for source in &sources {
        let s = source.index();
        stack.clear();
        for i in 0..n {
            predecessors[i].clear();
            sigma[i] = 0.0;
            distance[i] = -1;
            delta[i] = 0.0;
        }
        sigma[s] = 1.0;
        distance[s] = 0;
        queue.push_back(s);

        while let Some(v) = queue.pop_front() {
            stack.push(v);
            for &w in &successors[v] {
                if distance[w] < 0 {
                    distance[w] = distance[v] + 1;
                    queue.push_back(w);
                }
                if distance[w] == distance[v] + 1 {
                    sigma[w] += sigma[v];
                    predecessors[w].push(v);
                }
            }
        }

        while let Some(w) = stack.pop() {
            for &v in &predecessors[w] {
                delta[v] += sigma[v] / sigma[w] * (1.0 + delta[w]);
            }
            if w != s {
                centrality[w] += delta[w];
            }
        }
    }

    if n > 2 {
        let mut scale = 1.0 / ((n - 1) as f64 * (n - 2) as f64);
        if sampled {
            scale *= n as f64 / sources.len() as f64;
        }
        for value in centrality.iter_mut() {
            *value *= scale;
        }
    }

    NodeScores::from_indexed(graph, &centrality)
}

/// Eigenvector centrality over in-edges by power iteration on `A + I`,
/// L2-normalized each step.
pub fn eigenvector_centrality(
    graph: &InteractionGraph,
    max_iterations: usize,
    tolerance: f64,
) -> Result<NodeScores, GraphError> {
    let g = graph.graph();
    let n = g.node_count();
    if n == 0 {
        return Err(GraphError::EmptyGraph);
    }

    let mut x = vec![1.0 / n as f64; n];
    for iteration in 0..max_iterations {
        let last = x.clone();
        for edge in g.edge_references() {
            x[edge.target().index()] += last[edge.source().index()];
        }

        let norm = x.iter().map(|v| v * v).sum::<f64>().sqrt();
        let norm = if norm == 0.0 { 1.0 } else { norm };
        for value in x.iter_mut() {
            *value /= norm;
        }

        let err: f64 = x.iter().zip(&last).map(|(a, b)| (a - b).abs()).sum();
        if err < n as f64 * tolerance {
            debug!("Eigenvector centrality converged after {} iterations", iteration + 1);
            return Ok(NodeScores::from_indexed(graph, &x));
        }
    }

    Err(GraphError::ConvergenceFailed {
        algorithm: "eigenvector centrality",
        iterations: max_iterations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(edges: &[(&str, &str, u32)]) -> InteractionGraph {
        let mut graph = InteractionGraph::new();
        for (a, b, w) in edges {
            graph.add_interaction(a, b, *w);
        }
        graph
    }

    #[test]
    fn test_pagerank_sums_to_one() {
        let g = graph(&[("a", "b", 3), ("b", "c", 1), ("c", "a", 1), ("d", "a", 2), ("a", "c", 1)]);
        let scores = pagerank(&g, &PageRankConfig::default()).unwrap();

        assert_eq!(scores.len(), 4);
        assert!((scores.sum() - 1.0).abs() < 1e-9);
        assert!(scores.get("d") < scores.get("a"));
    }

    #[test]
    fn test_pagerank_of_cycle_is_uniform() {
        let g = graph(&[("a", "b", 1), ("b", "c", 1), ("c", "a", 1)]);
        let scores = pagerank(&g, &PageRankConfig::default()).unwrap();
        for (_, score) in scores.iter() {
            assert!((score - 1.0 / 3.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_pagerank_favours_sink_of_chain() {
        let g = graph(&[("a", "b", 1), ("b", "c", 1)]);
        let scores = pagerank(&g, &PageRankConfig::default()).unwrap();
        assert_eq!(scores.top(1)[0].0, "c");
    }

    #[test]
    fn test_pagerank_of_empty_graph() {
        let scores = pagerank(&InteractionGraph::new(), &PageRankConfig::default()).unwrap();
        assert!(scores.is_empty());
    }

    #[test]
    fn test_middle_of_path_has_maximal_betweenness() {
        let g = graph(&[("a", "b", 1), ("b", "c", 1), ("c", "d", 1)]);
        let scores = betweenness_centrality(&g, 0, 42);

        let top = scores.top(2);
        assert!(["b", "c"].contains(&top[0].0));
        // b lies on a->c and a->d: 2 / (3 * 2)
        assert!((scores.get("b") - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(scores.get("a"), 0.0);
        assert_eq!(scores.get("d"), 0.0);
    }

    #[test]
    fn test_betweenness_with_more_samples_than_nodes_is_exact() {
        let g = graph(&[("a", "b", 1), ("b", "c", 1)]);
        let exact = betweenness_centrality(&g, 0, 1);
        let sampled = betweenness_centrality(&g, 500, 1);
        assert_eq!(exact, sampled);
        assert!((exact.get("b") - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_sampled_betweenness_is_seeded() {
        let edges: Vec<(String, String)> = (0..30)
            .map(|i| (format!("u{}", i), format!("u{}", (i + 1) % 30)))
            .collect();
        let mut g = InteractionGraph::new();
        for (a, b) in &edges {
            g.add_interaction(a, b, 1);
        }
        assert_eq!(betweenness_centrality(&g, 10, 7), betweenness_centrality(&g, 10, 7));
    }

    #[test]
    fn test_degree_centrality() {
        let g = graph(&[("a", "hub", 1), ("b", "hub", 1), ("c", "hub", 1)]);
        let scores = degree_centrality(&g);
        assert!((scores.get("hub") - 1.0).abs() < 1e-12);
        assert!((scores.get("a") - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_eigenvector_centrality() {
        let g = graph(&[("a", "b", 1), ("b", "c", 1), ("c", "a", 1), ("d", "a", 1)]);
        let scores = eigenvector_centrality(&g, 100, 1e-6).unwrap();
        assert_eq!(scores.top(1)[0].0, "a");
        assert!(scores.get("d") < 1e-3);
    }

    #[test]
    fn test_eigenvector_failures_are_errors() {
        assert_eq!(
            eigenvector_centrality(&InteractionGraph::new(), 100, 1e-6),
            Err(GraphError::EmptyGraph)
        );

        let g = graph(&[("a", "b", 1), ("b", "c", 1), ("c", "a", 1), ("d", "a", 1)]);
        assert!(matches!(
            eigenvector_centrality(&g, 1, 1e-6),
            Err(GraphError::ConvergenceFailed { iterations: 1, .. })
        ));
    }

    #[test]
    fn test_top_breaks_ties_by_name() {
        let g = graph(&[("b", "a", 1), ("c", "d", 1)]);
        let scores = degree_centrality(&g);
        let names: Vec<&str> = scores.top(4).into_iter().map(|(u, _)| u).collect();
        assert_eq!(names, vec!["a", "b", "c", "d"]);
    }
}
