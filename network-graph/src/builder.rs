use infonet_core::{resolve_reply_edges, EdgeResolution, Record};
use petgraph::graph::{DiGraph, NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

/// Counters from one graph build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub records: usize,
    pub interactions: usize,
    pub self_replies: usize,
    pub unresolved: usize,
}

/// Directed user-to-user reply graph. Edge weights count interactions.
#[derive(Debug, Clone, Default)]
pub struct InteractionGraph {
    graph: DiGraph<String, u32>,
    index: HashMap<String, NodeIndex>,
    subreddit_interactions: BTreeMap<String, usize>,
    stats: BuildStats,
}

impl InteractionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: &[Record]) -> Self {
        GraphBuilder::new().add_records(records).build()
    }

    /// Union of two graphs; weights of shared edges are summed.
    pub fn combined(a: &InteractionGraph, b: &InteractionGraph) -> Self {
        let mut combined = InteractionGraph::new();
        for source in [a, b] {
            for user in source.graph.node_weights() {
                combined.add_user(user);
            }
            for (from, to, weight) in source.edges() {
                combined.add_interaction(from, to, weight);
            }
            for (subreddit, count) in &source.subreddit_interactions {
                *combined
                    .subreddit_interactions
                    .entry(subreddit.clone())
                    .or_insert(0) += count;
            }
            combined.stats.records += source.stats.records;
            combined.stats.self_replies += source.stats.self_replies;
            combined.stats.unresolved += source.stats.unresolved;
        }
        combined
    }

    /// Insert a user node if it is not present yet.
    pub fn add_user(&mut self, user: &str) -> NodeIndex {
        if let Some(&index) = self.index.get(user) {
            return index;
        }
        let index = self.graph.add_node(user.to_string());
        self.index.insert(user.to_string(), index);
        index
    }

    pub fn add_interaction(&mut self, from: &str, to: &str, weight: u32) {
        let a = self.add_user(from);
        let b = self.add_user(to);
        match self.graph.find_edge(a, b) {
            Some(edge) => self.graph[edge] += weight,
            None => {
                self.graph.add_edge(a, b, weight);
            }
        }
        self.stats.interactions += weight as usize;
    }

    pub fn graph(&self) -> &DiGraph<String, u32> {
        &self.graph
    }

    pub fn stats(&self) -> BuildStats {
        self.stats
    }

    /// Interactions per subreddit, counted once per reply.
    pub fn subreddit_interactions(&self) -> &BTreeMap<String, usize> {
        &self.subreddit_interactions
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Sum of all edge weights.
    pub fn total_weight(&self) -> u64 {
        self.graph.edge_weights().map(|&w| w as u64).sum()
    }

    pub fn edge_weight(&self, from: &str, to: &str) -> Option<u32> {
        let a = *self.index.get(from)?;
        let b = *self.index.get(to)?;
        self.graph.find_edge(a, b).map(|edge| self.graph[edge])
    }

    pub fn contains_user(&self, user: &str) -> bool {
        self.index.contains_key(user)
    }

    pub fn node_index(&self, user: &str) -> Option<NodeIndex> {
        self.index.get(user).copied()
    }

    pub fn user(&self, index: NodeIndex) -> &str {
        &self.graph[index]
    }

    /// All users, sorted.
    pub fn users(&self) -> Vec<&str> {
        let mut users: Vec<&str> = self.graph.node_weights().map(String::as_str).collect();
        users.sort_unstable();
        users
    }

    pub fn in_degree(&self, user: &str) -> usize {
        self.degree_in(user, Direction::Incoming)
    }

    pub fn out_degree(&self, user: &str) -> usize {
        self.degree_in(user, Direction::Outgoing)
    }

    /// In-degree plus out-degree, unweighted.
    pub fn degree(&self, user: &str) -> usize {
        self.in_degree(user) + self.out_degree(user)
    }

    fn degree_in(&self, user: &str, direction: Direction) -> usize {
        self.index
            .get(user)
            .map_or(0, |&index| self.graph.edges_directed(index, direction).count())
    }

    pub fn node_degree(&self, index: NodeIndex) -> usize {
        self.graph.edges_directed(index, Direction::Incoming).count()
            + self.graph.edges_directed(index, Direction::Outgoing).count()
    }

    /// `(source, target, weight)` in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str, u32)> + '_ {
        self.graph.edge_references().map(move |edge| {
            (
                self.graph[edge.source()].as_str(),
                self.graph[edge.target()].as_str(),
                *edge.weight(),
            )
        })
    }

    /// Induced subgraph over `users`; unknown names are ignored.
    pub fn subgraph<'a, I>(&self, users: I) -> InteractionGraph
    where
        I: IntoIterator<Item = &'a str>,
    {
        let keep: HashSet<NodeIndex> = users
            .into_iter()
            .filter_map(|user| self.node_index(user))
            .collect();

        let mut sub = InteractionGraph::new();
        for index in self.graph.node_indices().filter(|i| keep.contains(i)) {
            sub.add_user(&self.graph[index]);
        }
        for edge in self.graph.edge_references() {
            if keep.contains(&edge.source()) && keep.contains(&edge.target()) {
                sub.add_interaction(
                    &self.graph[edge.source()],
                    &self.graph[edge.target()],
                    *edge.weight(),
                );
            }
        }
        sub
    }

    /// Undirected projection with the same node indices; reciprocal edges are
    /// merged and their weights summed.
    pub fn to_undirected_weights(&self) -> UnGraph<(), f64> {
        let mut undirected = UnGraph::with_capacity(self.graph.node_count(), self.graph.edge_count());
        for _ in self.graph.node_indices() {
            undirected.add_node(());
        }
        for edge in self.graph.edge_references() {
            let (a, b) = (edge.source(), edge.target());
            let weight = *edge.weight() as f64;
            match undirected.find_edge(a, b) {
                Some(existing) => undirected[existing] += weight,
                None => {
                    undirected.add_edge(a, b, weight);
                }
            }
        }
        undirected
    }
}

/// Accumulates records and turns them into an [`InteractionGraph`].
#[derive(Debug, Default)]
pub struct GraphBuilder {
    records: Vec<Record>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_records(mut self, records: &[Record]) -> Self {
        self.records.extend_from_slice(records);
        self
    }

    pub fn build(self) -> InteractionGraph {
        let resolution = build_edge_list(&self.records);

        // Users enter the graph only as edge endpoints.
        let mut graph = InteractionGraph::new();
        for edge in &resolution.edges {
            graph.add_interaction(&edge.source, &edge.target, 1);
            *graph
                .subreddit_interactions
                .entry(edge.subreddit.clone())
                .or_insert(0) += 1;
        }

        graph.stats.records = self.records.len();
        graph.stats.self_replies = resolution.self_replies;
        graph.stats.unresolved = resolution.unresolved;

        debug!(
            "Built graph: {} nodes, {} edges from {} records ({} self replies, {} unresolved)",
            graph.node_count(),
            graph.edge_count(),
            self.records.len(),
            resolution.self_replies,
            resolution.unresolved
        );
        graph
    }
}

/// Reply edges for `records`, one row per resolved comment.
pub fn build_edge_list(records: &[Record]) -> EdgeResolution {
    resolve_reply_edges(records)
}
