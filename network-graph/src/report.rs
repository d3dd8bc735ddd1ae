//! Result tables and the plain-text metrics report.

use crate::centrality::NodeScores;
use crate::structure::ComponentStats;
use crate::{GroupAnalysis, NetworkAnalysis};
use infonet_core::{AnalysisConfig, Category, CoreError, StorageError};
use std::fmt::{self, Write as _};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const REPORT_FILE: &str = "network_metrics_report.txt";

/// Writes analysis outputs under the results directory.
#[derive(Debug, Clone)]
pub struct ResultWriter {
    dir: PathBuf,
}

impl ResultWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    /// Every result table plus the text report.
    pub fn write_all(
        &self,
        analysis: &NetworkAnalysis,
        config: &AnalysisConfig,
    ) -> Result<Vec<PathBuf>, CoreError> {
        fs::create_dir_all(&self.dir)?;
        let mut written = vec![
            self.write_metrics_comparison(analysis)?,
            self.write_ranking(
                "top_influential_users.csv",
                "PageRank",
                &analysis.misinformation.pagerank,
                &analysis.factual.pagerank,
                config.top_n,
            )?,
            self.write_ranking(
                "top_bridge_users.csv",
                "Betweenness",
                &analysis.misinformation.betweenness,
                &analysis.factual.betweenness,
                config.top_n,
            )?,
        ];

        let empty = NodeScores::default();
        written.push(self.write_ranking(
            "top_eigenvector_users.csv",
            "Eigenvector",
            analysis.misinformation.eigenvector.as_ref().unwrap_or(&empty),
            analysis.factual.eigenvector.as_ref().unwrap_or(&empty),
            config.top_n,
        )?);

        for category in Category::ALL {
            let group = analysis.group(category);
            let (labels, sizes) = self.write_communities(group)?;
            written.push(labels);
            written.push(sizes);
            written.push(self.write_degree_distribution(group)?);
        }

        written.extend(self.write_crossposters(analysis, config.top_crossposters)?);
        written.push(self.write_report(analysis, config.top_n)?);

        info!("Wrote {} result files to {}", written.len(), self.dir.display());
        Ok(written)
    }

    pub fn write_metrics_comparison(&self, analysis: &NetworkAnalysis) -> Result<PathBuf, CoreError> {
        let path = self.path("network_metrics_comparison.csv");
        let mut writer = csv_writer(&path)?;
        writer
            .write_record(["Metric", "Misinformation", "Factual"])
            .map_err(StorageError::from)?;

        let rows = metric_rows(&analysis.misinformation)
            .into_iter()
            .zip(metric_rows(&analysis.factual));
        for ((metric, misinformation), (_, factual)) in rows {
            writer
                .write_record([metric, misinformation.as_str(), factual.as_str()])
                .map_err(StorageError::from)?;
        }
        writer.flush()?;
        debug!("Wrote {}", path.display());
        Ok(path)
    }

    /// Side-by-side top-`n` ranking of both groups for one score.
    pub fn write_ranking(
        &self,
        file: &str,
        score: &str,
        misinformation: &NodeScores,
        factual: &NodeScores,
        n: usize,
    ) -> Result<PathBuf, CoreError> {
        let path = self.path(file);
        let mut writer = csv_writer(&path)?;
        writer
            .write_record([
                "Rank".to_string(),
                "Misinfo_User".to_string(),
                format!("Misinfo_{}", score),
                "Factual_User".to_string(),
                format!("Factual_{}", score),
            ])
            .map_err(StorageError::from)?;

        let m_top = misinformation.top(n);
        let f_top = factual.top(n);
        for rank in 0..m_top.len().max(f_top.len()) {
            let (m_user, m_score) = cell(m_top.get(rank));
            let (f_user, f_score) = cell(f_top.get(rank));
            writer
                .write_record([(rank + 1).to_string(), m_user, m_score, f_user, f_score])
                .map_err(StorageError::from)?;
        }
        writer.flush()?;
        debug!("Wrote {}", path.display());
        Ok(path)
    }

    /// `{category}_communities.csv` and `{category}_community_sizes.csv`.
    pub fn write_communities(&self, group: &GroupAnalysis) -> Result<(PathBuf, PathBuf), CoreError> {
        let labels_path = self.path(&format!("{}_communities.csv", group.category));
        let mut writer = csv_writer(&labels_path)?;
        writer
            .write_record(["User", "Community_ID"])
            .map_err(StorageError::from)?;
        for (user, community) in group.partition.labels() {
            writer
                .write_record([user, community.to_string().as_str()])
                .map_err(StorageError::from)?;
        }
        writer.flush()?;

        let sizes_path = self.path(&format!("{}_community_sizes.csv", group.category));
        let mut writer = csv_writer(&sizes_path)?;
        writer
            .write_record(["Community_ID", "Size"])
            .map_err(StorageError::from)?;
        for (community, size) in group.partition.sizes().iter().enumerate() {
            writer
                .write_record([community.to_string(), size.to_string()])
                .map_err(StorageError::from)?;
        }
        writer.flush()?;

        debug!(
            "Wrote {} communities for the {} network",
            group.partition.community_count(),
            group.category
        );
        Ok((labels_path, sizes_path))
    }

    /// `{category}_degree_distribution.csv`, one row per observed degree.
    pub fn write_degree_distribution(&self, group: &GroupAnalysis) -> Result<PathBuf, CoreError> {
        let path = self.path(&format!("{}_degree_distribution.csv", group.category));
        let mut writer = csv_writer(&path)?;
        writer
            .write_record(["Degree", "Users"])
            .map_err(StorageError::from)?;
        for (degree, users) in &group.degree_distribution {
            writer
                .write_record([degree.to_string(), users.to_string()])
                .map_err(StorageError::from)?;
        }
        writer.flush()?;
        debug!("Wrote {}", path.display());
        Ok(path)
    }

    /// Cross-poster profiles, the top cross-posters and subreddit pairs. The
    /// pair table is only written when a pair exists.
    pub fn write_crossposters(
        &self,
        analysis: &NetworkAnalysis,
        top: usize,
    ) -> Result<Vec<PathBuf>, CoreError> {
        let crossposting = &analysis.crossposting;
        let mut written = Vec::new();

        if crossposting.profiles.is_empty() {
            info!("No cross-posting users found; skipping cross-poster tables");
            return Ok(written);
        }

        let all = self.path("crossposters_analysis.csv");
        write_rows(&all, &crossposting.profiles)?;
        written.push(all);

        let top_path = self.path("top_crossposters.csv");
        let limit = top.min(crossposting.profiles.len());
        write_rows(&top_path, &crossposting.profiles[..limit])?;
        written.push(top_path);

        if !crossposting.participation.pairs.is_empty() {
            let pairs = self.path("subreddit_pairs.csv");
            write_rows(&pairs, &crossposting.participation.pairs)?;
            written.push(pairs);
        }

        Ok(written)
    }

    pub fn write_report(&self, analysis: &NetworkAnalysis, top_n: usize) -> Result<PathBuf, CoreError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path(REPORT_FILE);
        fs::write(&path, render_report(analysis, top_n))?;
        info!("Network metrics report saved to {}", path.display());
        Ok(path)
    }
}

fn metric_rows(group: &GroupAnalysis) -> Vec<(&'static str, String)> {
    let path_length = group
        .path_length
        .value
        .map(|v| format!("{:.6}", v))
        .unwrap_or_default();
    let path_note = match group.path_length.value {
        None => "Could not compute".to_string(),
        Some(_) if group.path_length.estimated => {
            format!("Estimated from sample of {} nodes", group.path_length.sources)
        }
        Some(_) => String::new(),
    };

    vec![
        ("nodes", group.summary.nodes.to_string()),
        ("edges", group.summary.edges.to_string()),
        ("density", format!("{:.6}", group.summary.density)),
        ("avg_degree", format!("{:.6}", group.summary.average_degree)),
        ("max_pagerank", format!("{:.6}", group.pagerank.max())),
        ("max_betweenness", format!("{:.6}", group.betweenness.max())),
        ("clustering_coefficient", format!("{:.6}", group.clustering)),
        ("largest_component_size", group.components.largest.to_string()),
        (
            "largest_component_percentage",
            format!("{:.6}", group.components.largest_share),
        ),
        ("avg_path_length", path_length),
        ("avg_path_length_note", path_note),
        ("communities", group.partition.community_count().to_string()),
        ("modularity", format!("{:.6}", group.partition.modularity())),
    ]
}

fn cell(entry: Option<&(&str, f64)>) -> (String, String) {
    match entry {
        Some((user, score)) => (user.to_string(), format!("{:.6}", score)),
        None => (String::new(), String::new()),
    }
}

fn csv_writer(path: &Path) -> Result<csv::Writer<fs::File>, CoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(csv::Writer::from_path(path).map_err(StorageError::from)?)
}

fn write_rows<T: serde::Serialize>(path: &Path, rows: &[T]) -> Result<(), CoreError> {
    let mut writer = csv_writer(path)?;
    for row in rows {
        writer.serialize(row).map_err(StorageError::from)?;
    }
    writer.flush()?;
    debug!("Wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}

/// Human-readable summary of an analysis run.
pub fn render_report(analysis: &NetworkAnalysis, top_n: usize) -> String {
    let mut out = String::new();
    // Formatting into a String cannot fail.
    let _ = write_text(&mut out, analysis, top_n);
    out
}

fn write_text(out: &mut String, analysis: &NetworkAnalysis, top_n: usize) -> fmt::Result {
    let groups = [&analysis.misinformation, &analysis.factual];

    writeln!(out, "=====================================================")?;
    writeln!(out, "COVID-19 MISINFORMATION NETWORK ANALYSIS - METRICS REPORT")?;
    writeln!(out, "=====================================================\n")?;
    writeln!(
        out,
        "Report generated on: {}\n",
        analysis.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    )?;

    section(out, "1. BASIC NETWORK STATISTICS")?;
    for group in groups {
        let s = &group.summary;
        writeln!(out, "{} Network:", group.category.label())?;
        writeln!(out, "  - Nodes: {}", s.nodes)?;
        writeln!(out, "  - Edges: {}", s.edges)?;
        writeln!(out, "  - Total interactions: {}", s.total_weight)?;
        writeln!(out, "  - Density: {:.6}", s.density)?;
        writeln!(out, "  - Average Degree: {:.2}", s.average_degree)?;
        writeln!(out, "  - Median Degree: {:.2}", s.median_degree)?;
        writeln!(out, "  - Max Degree: {}", s.max_degree)?;
        writeln!(out, "  - Average In-Degree: {:.2}", s.average_in_degree)?;
        writeln!(out, "  - Average Out-Degree: {:.2}\n", s.average_out_degree)?;
    }
    let c = &analysis.combined_summary;
    writeln!(out, "Combined Network:")?;
    writeln!(out, "  - Nodes: {}", c.nodes)?;
    writeln!(out, "  - Edges: {}", c.edges)?;
    writeln!(out, "  - Density: {:.6}\n", c.density)?;

    section(out, "2. CENTRALIZATION METRICS")?;
    score_block(out, "PageRank", groups.map(|g| (g.category, Some(&g.pagerank))), top_n)?;
    score_block(
        out,
        "Betweenness",
        groups.map(|g| (g.category, Some(&g.betweenness))),
        top_n,
    )?;
    score_block(
        out,
        "Eigenvector",
        groups.map(|g| (g.category, g.eigenvector.as_ref())),
        top_n,
    )?;

    section(out, "3. CONNECTED COMPONENTS")?;
    for group in groups {
        components_block(out, group.category, &group.components)?;
    }

    section(out, "4. CLUSTERING AND COMMUNITIES")?;
    for group in groups {
        let p = &group.partition;
        writeln!(out, "{} Network:", group.category.label())?;
        writeln!(out, "  - Average clustering coefficient: {:.6}", group.clustering)?;
        writeln!(out, "  - Louvain communities: {}", p.community_count())?;
        writeln!(out, "  - Modularity: {:.6}", p.modularity())?;
        let largest: Vec<String> = p.sizes().iter().take(5).map(|s| s.to_string()).collect();
        writeln!(out, "  - Largest community sizes: {}\n", largest.join(", "))?;
    }

    section(out, "5. PATH LENGTH ANALYSIS")?;
    for group in groups {
        let label = group.category.label();
        match group.path_length.value {
            Some(value) if group.path_length.estimated => {
                writeln!(
                    out,
                    "{} Network (sampled {} nodes): {:.4}",
                    label, group.path_length.sources, value
                )?;
            }
            Some(value) => {
                writeln!(out, "{} Network: {:.4}", label, value)?;
            }
            None => {
                writeln!(
                    out,
                    "Could not compute average path length for the {} network: no connected pairs",
                    group.category
                )?;
            }
        }
    }
    out.push('\n');

    section(out, "6. CROSS-POSTING ANALYSIS")?;
    let crossposting = &analysis.crossposting;
    let combined_nodes = analysis.combined.node_count();
    let share = if combined_nodes == 0 {
        0.0
    } else {
        crossposting.overlap.crossposters as f64 / combined_nodes as f64
    };
    writeln!(out, "Number of cross-posting users: {}", crossposting.overlap.crossposters)?;
    writeln!(out, "Percentage of all users: {:.2}%\n", share * 100.0)?;
    writeln!(out, "Top {} cross-posters by combined influence (PageRank):", top_n)?;
    for (rank, profile) in crossposting.profiles.iter().take(top_n).enumerate() {
        writeln!(out, "  {}. {}:", rank + 1, profile.user)?;
        writeln!(
            out,
            "     - Misinformation PageRank: {:.6}",
            profile.misinformation_pagerank
        )?;
        writeln!(out, "     - Factual PageRank: {:.6}", profile.factual_pagerank)?;
        writeln!(out, "     - Total PageRank: {:.6}", profile.total_pagerank)?;
        writeln!(
            out,
            "     - Proportion of influence in misinformation network: {:.2}%\n",
            profile.misinformation_share() * 100.0
        )?;
    }
    if crossposting.profiles.is_empty() {
        out.push('\n');
    }

    section(out, "7. SUBREDDIT PARTICIPATION ANALYSIS")?;
    for group in groups {
        writeln!(out, "{} Subreddits Participation:", group.category.label())?;
        let mut interactions: Vec<(&String, &usize)> =
            group.graph.subreddit_interactions().iter().collect();
        interactions.sort_by(|a, b| b.1.cmp(a.1));
        for (subreddit, count) in interactions {
            writeln!(out, "  - r/{}: {} interactions", subreddit, count)?;
        }
        out.push('\n');
    }
    Ok(())
}

fn section(out: &mut String, title: &str) -> fmt::Result {
    writeln!(out, "{}", title)?;
    writeln!(out, "{}\n", "-".repeat(title.len()))
}

fn score_block(
    out: &mut String,
    name: &str,
    groups: [(Category, Option<&NodeScores>); 2],
    top_n: usize,
) -> fmt::Result {
    writeln!(out, "{} Statistics:", name)?;
    for (category, scores) in groups {
        writeln!(out, "  {} Network:", category.label())?;
        let Some(scores) = scores else {
            writeln!(out, "    - Could not compute {} (did not converge)", name)?;
            continue;
        };
        writeln!(out, "    - Max {}: {:.6}", name, scores.max())?;
        writeln!(out, "    - Average {}: {:.6}", name, scores.mean())?;
        writeln!(out, "    - Top {} Users by {}:", top_n, name)?;
        for (rank, (user, score)) in scores.top(top_n).into_iter().enumerate() {
            writeln!(out, "      {}. {}: {:.6}", rank + 1, user, score)?;
        }
    }
    out.push('\n');
    Ok(())
}

fn components_block(out: &mut String, category: Category, stats: &ComponentStats) -> fmt::Result {
    let d = &stats.distribution;
    writeln!(out, "{} Network:", category.label())?;
    writeln!(out, "  - Number of weakly connected components: {}", stats.count)?;
    writeln!(out, "  - Size of largest component: {}", stats.largest)?;
    writeln!(
        out,
        "  - Percentage of nodes in largest component: {:.2}%",
        stats.largest_share * 100.0
    )?;
    writeln!(out, "  - Component size distribution:")?;
    writeln!(out, "    * Min: {}", d.min)?;
    writeln!(out, "    * 25th percentile: {:.1}", d.p25)?;
    writeln!(out, "    * Median: {:.1}", d.median)?;
    writeln!(out, "    * 75th percentile: {:.1}", d.p75)?;
    writeln!(out, "    * Max: {}\n", d.max)
}
