pub mod builder;
pub mod centrality;
pub mod community;
pub mod crossposting;
pub mod report;
pub mod structure;

pub use builder::{build_edge_list, BuildStats, GraphBuilder, InteractionGraph};
pub use centrality::{
    betweenness_centrality, degree_centrality, eigenvector_centrality, pagerank, NodeScores,
    PageRankConfig,
};
pub use community::{louvain, Partition};
pub use crossposting::{
    profile_crossposters, subreddit_record_counts, CrossPosterProfile, CrossPosterSet,
    OverlapSummary, SubredditPair, SubredditParticipation,
};
pub use report::{render_report, ResultWriter};
pub use structure::{
    average_clustering, average_path_length, degree_distribution, percentile, weak_components,
    ComponentStats, Distribution, GraphSummary, PathLength,
};

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use infonet_core::{AnalysisConfig, Category, GraphError, Record};
use tracing::{info, warn};

const EIGENVECTOR_MAX_ITERATIONS: usize = 100;
const EIGENVECTOR_TOLERANCE: f64 = 1e-6;

/// Every metric computed for one group's network.
#[derive(Debug, Clone)]
pub struct GroupAnalysis {
    pub category: Category,
    pub graph: InteractionGraph,
    pub summary: GraphSummary,
    pub components: ComponentStats,
    pub clustering: f64,
    pub path_length: PathLength,
    pub degree: NodeScores,
    /// Unweighted total degree to number of users with it.
    pub degree_distribution: BTreeMap<usize, usize>,
    pub pagerank: NodeScores,
    pub betweenness: NodeScores,
    /// `None` when the power iteration did not converge.
    pub eigenvector: Option<NodeScores>,
    pub partition: Partition,
    /// Records per subreddit for the whole group.
    pub subreddit_records: Vec<(String, usize)>,
}

impl GroupAnalysis {
    pub fn run(
        category: Category,
        records: &[Record],
        config: &AnalysisConfig,
    ) -> Result<Self, GraphError> {
        let graph = InteractionGraph::from_records(records);
        info!(
            "{} network: {} nodes, {} edges",
            category.label(),
            graph.node_count(),
            graph.edge_count()
        );
        Self::from_graph(category, graph, records, config)
    }

    pub fn from_graph(
        category: Category,
        graph: InteractionGraph,
        records: &[Record],
        config: &AnalysisConfig,
    ) -> Result<Self, GraphError> {
        let summary = GraphSummary::compute(&graph);
        let components = weak_components(&graph);
        let clustering = average_clustering(&graph);
        let path_length = average_path_length(&graph, config.path_length_sample, config.seed);

        info!("Calculating centrality for the {} network", category.label());
        let degree = degree_centrality(&graph);
        let degree_distribution = degree_distribution(&graph);
        let pagerank = pagerank(&graph, &PageRankConfig::from_analysis(config))?;
        let betweenness = betweenness_centrality(&graph, config.betweenness_samples, config.seed);
        let eigenvector = if graph.is_empty() {
            None
        } else {
            match eigenvector_centrality(&graph, EIGENVECTOR_MAX_ITERATIONS, EIGENVECTOR_TOLERANCE) {
                Ok(scores) => Some(scores),
                Err(e) => {
                    warn!("{} network eigenvector centrality: {}", category.label(), e);
                    None
                }
            }
        };

        let partition = louvain(&graph);
        info!(
            "{} communities: {} (modularity {:.4})",
            category.label(),
            partition.community_count(),
            partition.modularity()
        );

        Ok(Self {
            category,
            summary,
            components,
            clustering,
            path_length,
            degree,
            degree_distribution,
            pagerank,
            betweenness,
            eigenvector,
            partition,
            subreddit_records: subreddit_record_counts(records),
            graph,
        })
    }
}

/// Overlap between the two group networks.
#[derive(Debug, Clone)]
pub struct CrossPostingAnalysis {
    pub crossposters: CrossPosterSet,
    pub overlap: OverlapSummary,
    /// Ordered by total PageRank, highest first.
    pub profiles: Vec<CrossPosterProfile>,
    pub participation: SubredditParticipation,
}

impl CrossPostingAnalysis {
    pub fn run(
        misinformation: &GroupAnalysis,
        factual: &GroupAnalysis,
        misinformation_records: &[Record],
        factual_records: &[Record],
    ) -> Self {
        let crossposters = CrossPosterSet::between(&misinformation.graph, &factual.graph);
        let overlap = OverlapSummary::compute(&misinformation.graph, &factual.graph, &crossposters);
        info!(
            "Found {} users in both networks ({:.2}% of all users)",
            overlap.crossposters,
            overlap.share * 100.0
        );

        let profiles = profile_crossposters(
            &crossposters,
            (&misinformation.graph, &misinformation.pagerank),
            (&factual.graph, &factual.pagerank),
        );
        let participation =
            SubredditParticipation::compute(&crossposters, misinformation_records, factual_records);

        Self {
            crossposters,
            overlap,
            profiles,
            participation,
        }
    }
}

/// The full comparison: both groups, their union and the overlap.
#[derive(Debug, Clone)]
pub struct NetworkAnalysis {
    pub misinformation: GroupAnalysis,
    pub factual: GroupAnalysis,
    pub combined: InteractionGraph,
    pub combined_summary: GraphSummary,
    pub combined_pagerank: NodeScores,
    pub combined_partition: Partition,
    pub crossposting: CrossPostingAnalysis,
    pub generated_at: DateTime<Utc>,
}

impl NetworkAnalysis {
    pub fn run(
        misinformation_records: &[Record],
        factual_records: &[Record],
        config: &AnalysisConfig,
    ) -> Result<Self, GraphError> {
        let misinformation =
            GroupAnalysis::run(Category::Misinformation, misinformation_records, config)?;
        let factual = GroupAnalysis::run(Category::Factual, factual_records, config)?;

        let combined = InteractionGraph::combined(&misinformation.graph, &factual.graph);
        let combined_summary = GraphSummary::compute(&combined);
        let combined_pagerank = pagerank(&combined, &PageRankConfig::from_analysis(config))?;
        let combined_partition = louvain(&combined);
        info!(
            "Combined network: {} nodes, {} edges",
            combined.node_count(),
            combined.edge_count()
        );

        let crossposting = CrossPostingAnalysis::run(
            &misinformation,
            &factual,
            misinformation_records,
            factual_records,
        );

        Ok(Self {
            misinformation,
            factual,
            combined,
            combined_summary,
            combined_pagerank,
            combined_partition,
            crossposting,
            generated_at: Utc::now(),
        })
    }

    pub fn group(&self, category: Category) -> &GroupAnalysis {
        match category {
            Category::Misinformation => &self.misinformation,
            Category::Factual => &self.factual,
        }
    }
}
