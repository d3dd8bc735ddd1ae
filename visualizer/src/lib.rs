pub mod charts;
pub mod dot;
pub mod layout;
pub mod network;
pub mod style;

pub use dot::export_dot;

use charts::{Axes, ScatterPoint};
use infonet_core::{Category, CoreError, RenderError, VisualizationConfig};
use network::{CombinedLayers, Membership};
use network_graph::{GroupAnalysis, NetworkAnalysis};
use plotters::coord::Shift;
use plotters::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use style::{FACTUAL, MISINFORMATION};
use tracing::{info, warn};

const TOP_COMMUNITIES: usize = 10;
const TOP_CROSSPOSTERS: usize = 10;
const TOP_PAIR_SUBREDDITS: usize = 5;
const HISTOGRAM_BINS: usize = 30;
const LAYOUT_SEED: u64 = 42;

pub const DOT_FILE: &str = "combined_network.dot";

/// Renders every figure of a finished analysis into one directory.
pub struct Visualizer {
    config: VisualizationConfig,
    output_dir: PathBuf,
}

type Figure = fn(&Visualizer, &NetworkAnalysis, &Path) -> Result<(), RenderError>;

impl Visualizer {
    pub fn new(config: VisualizationConfig, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Draw all figures. A figure with nothing to show is skipped with a
    /// warning; any other failure aborts.
    pub fn render_all(&self, analysis: &NetworkAnalysis) -> Result<Vec<PathBuf>, CoreError> {
        std::fs::create_dir_all(&self.output_dir)?;

        let figures: [(&str, Figure); 8] = [
            ("network_comparison.png", Self::network_comparison),
            ("combined_network.png", Self::combined_network),
            ("community_sizes.png", Self::community_sizes),
            ("community_size_distribution.png", Self::community_size_distribution),
            ("subreddit_participation.png", Self::subreddit_participation),
            ("crossposter_influence.png", Self::crossposter_influence),
            ("top_crossposters_influence.png", Self::top_crossposters_influence),
            ("subreddit_pair_heatmap.png", Self::subreddit_pair_heatmap),
        ];

        let mut written = Vec::new();
        for (file, draw) in figures {
            let path = self.output_dir.join(file);
            match draw(self, analysis, &path) {
                Ok(()) => {
                    info!("Saved {}", path.display());
                    written.push(path);
                }
                Err(RenderError::EmptyInput { figure }) => {
                    warn!("Skipping {}: nothing to draw for {}", file, figure);
                }
                Err(e) => return Err(e.into()),
            }
        }

        let dot_path = self.output_dir.join(DOT_FILE);
        let dot = export_dot(
            &analysis.combined,
            &analysis.combined_partition,
            &analysis.crossposting.crossposters,
        );
        std::fs::write(&dot_path, dot)?;
        info!("Saved {}", dot_path.display());
        written.push(dot_path);

        Ok(written)
    }

    fn root<'p>(&self, path: &'p Path) -> Result<DrawingArea<BitMapBackend<'p>, Shift>, RenderError> {
        let root = BitMapBackend::new(path, (self.config.width, self.config.height)).into_drawing_area();
        root.fill(&WHITE).map_err(encoding(path))?;
        Ok(root)
    }

    fn network_comparison(&self, analysis: &NetworkAnalysis, path: &Path) -> Result<(), RenderError> {
        if analysis.misinformation.graph.is_empty() && analysis.factual.graph.is_empty() {
            return Err(empty("network comparison"));
        }
        let root = self.root(path)?;
        let panels = root.split_evenly((1, 2));
        for (group, panel) in [&analysis.misinformation, &analysis.factual].into_iter().zip(&panels) {
            let sample = network::largest_component_sample(&group.graph, self.config.max_nodes);
            let title = format!(
                "{} Network{}",
                heading(group.category),
                network::sample_note(sample.node_count(), group.graph.node_count())
            );
            network::draw_group(
                panel,
                &title,
                &sample,
                group_color(group.category),
                self.config.layout_iterations,
                LAYOUT_SEED,
            )
            .map_err(encoding(path))?;
        }
        root.present().map_err(encoding(path))
    }

    fn combined_network(&self, analysis: &NetworkAnalysis, path: &Path) -> Result<(), RenderError> {
        if analysis.combined.is_empty() {
            return Err(empty("combined network"));
        }
        let sample = network::combined_sample(
            &analysis.combined,
            &analysis.crossposting.crossposters,
            &analysis.combined_pagerank,
            self.config.max_nodes,
        );
        let title = format!(
            "Combined COVID-19 Information Network{}",
            network::sample_note(sample.node_count(), analysis.combined.node_count())
        );
        let layers = CombinedLayers {
            misinformation: &analysis.misinformation.graph,
            factual: &analysis.factual.graph,
            partition: &analysis.combined_partition,
            pagerank: &analysis.combined_pagerank,
        };

        let root = self.root(path)?;
        network::draw_combined(
            &root,
            &title,
            &sample,
            &layers,
            self.config.layout_iterations,
            LAYOUT_SEED,
        )
        .map_err(encoding(path))?;
        root.present().map_err(encoding(path))
    }

    fn community_sizes(&self, analysis: &NetworkAnalysis, path: &Path) -> Result<(), RenderError> {
        let groups = [&analysis.misinformation, &analysis.factual];
        if groups.iter().all(|g| g.partition.is_empty()) {
            return Err(empty("community sizes"));
        }
        let root = self.root(path)?;
        for (group, panel) in groups.into_iter().zip(&root.split_evenly((2, 1))) {
            let (labels, sizes) = top_communities(group);
            let title = format!("Top {} {} Communities by Size", TOP_COMMUNITIES, heading(group.category));
            charts::log_bars(panel, &title, "Users", &labels, &sizes, group_color(group.category))
                .map_err(encoding(path))?;
        }
        root.present().map_err(encoding(path))
    }

    fn community_size_distribution(
        &self,
        analysis: &NetworkAnalysis,
        path: &Path,
    ) -> Result<(), RenderError> {
        let groups = [&analysis.misinformation, &analysis.factual];
        if groups.iter().all(|g| g.partition.is_empty()) {
            return Err(empty("community size distribution"));
        }
        let root = self.root(path)?;
        for (group, panel) in groups.into_iter().zip(&root.split_evenly((1, 2))) {
            let sizes: Vec<f64> = group.partition.sizes().iter().map(|&s| s as f64).collect();
            let bins = charts::histogram(&sizes, HISTOGRAM_BINS);
            let title = format!("{} Community Size Distribution", heading(group.category));
            charts::log_histogram(panel, &title, "Community Size", &bins, group_color(group.category))
                .map_err(encoding(path))?;
        }
        root.present().map_err(encoding(path))
    }

    fn subreddit_participation(
        &self,
        analysis: &NetworkAnalysis,
        path: &Path,
    ) -> Result<(), RenderError> {
        let groups = [&analysis.misinformation, &analysis.factual];
        if groups.iter().all(|g| g.subreddit_records.is_empty()) {
            return Err(empty("subreddit participation"));
        }
        let root = self.root(path)?;
        for (group, panel) in groups.into_iter().zip(&root.split_evenly((2, 1))) {
            let (labels, values): (Vec<String>, Vec<f64>) = group
                .subreddit_records
                .iter()
                .map(|(subreddit, count)| (subreddit.clone(), *count as f64))
                .unzip();
            let title = format!("Participation in {} Subreddits", heading(group.category));
            charts::count_bars(panel, &title, &labels, &values, group_color(group.category))
                .map_err(encoding(path))?;
        }
        root.present().map_err(encoding(path))
    }

    fn crossposter_influence(
        &self,
        analysis: &NetworkAnalysis,
        path: &Path,
    ) -> Result<(), RenderError> {
        let profiles = &analysis.crossposting.profiles;
        if profiles.is_empty() {
            return Err(empty("cross-poster influence"));
        }
        let max_degree = profiles.iter().map(|p| p.total_degree).max().unwrap_or(1).max(1);
        // Profiles arrive ordered by total PageRank.
        let points: Vec<ScatterPoint> = profiles
            .iter()
            .enumerate()
            .map(|(rank, p)| ScatterPoint {
                x: p.misinformation_pagerank,
                y: p.factual_pagerank,
                radius: (3.0 + 12.0 * p.total_degree as f64 / max_degree as f64).round() as i32,
                shade: p.misinformation_share(),
                label: (rank < TOP_CROSSPOSTERS).then(|| p.user.clone()),
            })
            .collect();
        let axes = Axes {
            title: "Cross-Posting Users: Influence in Both Networks",
            x_desc: "Influence in Misinformation Network (PageRank)",
            y_desc: "Influence in Factual Network (PageRank)",
            scale_desc: "Proportion of Influence in Misinformation Network",
        };

        let root = self.root(path)?;
        charts::scatter(&root, &axes, &points).map_err(encoding(path))?;
        root.present().map_err(encoding(path))
    }

    fn top_crossposters_influence(
        &self,
        analysis: &NetworkAnalysis,
        path: &Path,
    ) -> Result<(), RenderError> {
        let top = &analysis.crossposting.profiles[..analysis.crossposting.profiles.len().min(TOP_CROSSPOSTERS)];
        if top.is_empty() {
            return Err(empty("top cross-posters"));
        }
        let labels: Vec<String> = top.iter().map(|p| p.user.clone()).collect();
        let stacks: Vec<(f64, f64)> = top
            .iter()
            .map(|p| (p.misinformation_pagerank, p.factual_pagerank))
            .collect();

        let root = self.root(path)?;
        charts::stacked_bars(
            &root,
            &format!("Top {} Cross-Posting Users by Total Influence", TOP_CROSSPOSTERS),
            &labels,
            &stacks,
            [("Misinformation", MISINFORMATION), ("Factual", FACTUAL)],
        )
        .map_err(encoding(path))?;
        root.present().map_err(encoding(path))
    }

    fn subreddit_pair_heatmap(
        &self,
        analysis: &NetworkAnalysis,
        path: &Path,
    ) -> Result<(), RenderError> {
        let participation = &analysis.crossposting.participation;
        if participation.pairs.is_empty() {
            return Err(empty("subreddit pairs"));
        }
        let top = |counts: &[(String, usize)]| -> Vec<String> {
            counts.iter().take(TOP_PAIR_SUBREDDITS).map(|(s, _)| s.clone()).collect()
        };
        let rows = top(&participation.misinformation);
        let columns = top(&participation.factual);
        let matrix = pair_matrix(
            rows.iter().map(String::as_str),
            columns.iter().map(String::as_str),
            participation
                .pairs
                .iter()
                .map(|p| ((p.misinformation_subreddit.as_str(), p.factual_subreddit.as_str()), p.count))
                .collect(),
        );
        let axes = Axes {
            title: "Cross-Posting Between Top Subreddits",
            x_desc: "Factual Subreddits",
            y_desc: "Misinformation Subreddits",
            scale_desc: "Cross-posters",
        };

        let root = self.root(path)?;
        charts::heatmap(&root, &axes, &rows, &columns, &matrix).map_err(encoding(path))?;
        root.present().map_err(encoding(path))
    }
}

/// Rows follow `rows`, columns follow `columns`; missing pairs are zero.
pub fn pair_matrix<'a>(
    rows: impl Iterator<Item = &'a str>,
    columns: impl Iterator<Item = &'a str>,
    counts: BTreeMap<(&'a str, &'a str), usize>,
) -> Vec<Vec<f64>> {
    let columns: Vec<&str> = columns.collect();
    rows.map(|row| {
        columns
            .iter()
            .map(|&column| counts.get(&(row, column)).copied().unwrap_or(0) as f64)
            .collect()
    })
    .collect()
}

/// Labels and sizes of the largest communities; ids are ordered by size.
fn top_communities(group: &GroupAnalysis) -> (Vec<String>, Vec<f64>) {
    group
        .partition
        .sizes()
        .iter()
        .take(TOP_COMMUNITIES)
        .enumerate()
        .map(|(id, &size)| (format!("C{}", id), size as f64))
        .unzip()
}

fn heading(category: Category) -> &'static str {
    match category {
        Category::Misinformation => "Misinformation",
        Category::Factual => "Factual",
    }
}

fn group_color(category: Category) -> RGBColor {
    Membership::from(category).color()
}

impl From<Category> for Membership {
    fn from(category: Category) -> Self {
        match category {
            Category::Misinformation => Membership::Misinformation,
            Category::Factual => Membership::Factual,
        }
    }
}

fn empty(figure: &str) -> RenderError {
    RenderError::EmptyInput {
        figure: figure.to_string(),
    }
}

fn encoding<E>(path: &Path) -> impl FnOnce(DrawingAreaErrorKind<E>) -> RenderError + '_
where
    E: std::error::Error + Send + Sync,
{
    move |e| RenderError::EncodingFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_matrix_orders_and_fills() {
        let mut counts = BTreeMap::new();
        counts.insert(("conspiracy", "science"), 3);
        counts.insert(("NoNewNormal", "Coronavirus"), 1);

        let matrix = pair_matrix(
            ["conspiracy", "NoNewNormal"].into_iter(),
            ["science", "Coronavirus"].into_iter(),
            counts,
        );
        assert_eq!(matrix, vec![vec![3.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_group_colors_follow_membership() {
        assert_eq!(group_color(Category::Misinformation), MISINFORMATION);
        assert_eq!(group_color(Category::Factual), FACTUAL);
    }
}
