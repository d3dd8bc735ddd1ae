use chrono::{TimeZone, Utc};
use infonet_core::{AnalysisConfig, Category, Record, RecordKind, VisualizationConfig};
use network_graph::NetworkAnalysis;
use tempfile::TempDir;
use visualizer::{Visualizer, DOT_FILE};

fn record(id: &str, author: &str, parent: Option<&str>, subreddit: &str, category: Category) -> Record {
    Record {
        id: id.to_string(),
        kind: if parent.is_some() {
            RecordKind::Comment
        } else {
            RecordKind::Submission
        },
        author: author.to_string(),
        created_utc: Utc.timestamp_opt(1_610_000_000, 0).unwrap(),
        parent_id: parent.map(str::to_string),
        parent_author: None,
        submission_id: "p".to_string(),
        subreddit: subreddit.to_string(),
        category,
        title: None,
        body: String::new(),
        score: 1,
        permalink: String::new(),
        depth: u32::from(parent.is_some()),
    }
}

fn small_config() -> VisualizationConfig {
    VisualizationConfig {
        enabled: true,
        max_nodes: 50,
        width: 320,
        height: 240,
        layout_iterations: 20,
    }
}

fn analysis() -> NetworkAnalysis {
    let m = Category::Misinformation;
    let f = Category::Factual;
    let misinformation = vec![
        record("p1", "alice", None, "conspiracy", m),
        record("c1", "bob", Some("t3_p1"), "conspiracy", m),
        record("c2", "carol", Some("t1_c1"), "conspiracy", m),
        record("c3", "alice", Some("t1_c2"), "NoNewNormal", m),
    ];
    let factual = vec![
        record("q1", "bob", None, "science", f),
        record("d1", "erin", Some("t3_q1"), "science", f),
        record("d2", "alice", Some("t1_d1"), "Coronavirus", f),
    ];
    NetworkAnalysis::run(&misinformation, &factual, &AnalysisConfig::default()).unwrap()
}

#[test]
fn test_render_all_writes_every_figure() {
    let dir = TempDir::new().unwrap();
    let visualizer = Visualizer::new(small_config(), dir.path());
    let written = visualizer.render_all(&analysis()).unwrap();

    for file in [
        "network_comparison.png",
        "combined_network.png",
        "community_sizes.png",
        "community_size_distribution.png",
        "subreddit_participation.png",
        "crossposter_influence.png",
        "top_crossposters_influence.png",
        "subreddit_pair_heatmap.png",
        DOT_FILE,
    ] {
        let path = dir.path().join(file);
        assert!(written.contains(&path), "{} not written", file);
        assert!(std::fs::metadata(&path).unwrap().len() > 0, "{} is empty", file);
        if file.ends_with(".png") {
            assert_eq!(image::image_dimensions(&path).unwrap(), (320, 240), "{}", file);
        }
    }

    let dot = std::fs::read_to_string(dir.path().join(DOT_FILE)).unwrap();
    assert!(dot.contains("label = \"alice\""));
}

#[test]
fn test_empty_analysis_skips_figures() {
    let dir = TempDir::new().unwrap();
    let empty = NetworkAnalysis::run(&[], &[], &AnalysisConfig::default()).unwrap();
    let written = Visualizer::new(small_config(), dir.path())
        .render_all(&empty)
        .unwrap();

    assert_eq!(written, vec![dir.path().join(DOT_FILE)]);
    assert!(!dir.path().join("network_comparison.png").exists());
}

#[test]
fn test_one_sided_analysis_draws_group_figures() {
    let dir = TempDir::new().unwrap();
    let m = Category::Misinformation;
    let misinformation = vec![
        record("p1", "alice", None, "conspiracy", m),
        record("c1", "bob", Some("t3_p1"), "conspiracy", m),
    ];
    let analysis = NetworkAnalysis::run(&misinformation, &[], &AnalysisConfig::default()).unwrap();
    let written = Visualizer::new(small_config(), dir.path())
        .render_all(&analysis)
        .unwrap();

    for file in ["network_comparison.png", "community_sizes.png", "subreddit_participation.png"] {
        assert!(written.contains(&dir.path().join(file)), "{} not written", file);
    }
    assert!(!dir.path().join("crossposter_influence.png").exists());
    assert!(!dir.path().join("subreddit_pair_heatmap.png").exists());
}
