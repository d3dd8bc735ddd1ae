//! Graphviz export of the combined network.

use network_graph::{CrossPosterSet, InteractionGraph, Partition};
use petgraph::dot::{Config, Dot};

const GOLDEN_ANGLE: f64 = 137.507_764;

/// HSV triple understood by Graphviz, with a distinct hue per community.
pub fn community_hsv(community: usize) -> String {
    let hue = (community as f64 * GOLDEN_ANGLE) % 360.0;
    format!("{:.3} 0.550 0.950", hue / 360.0)
}

fn quoted(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

/// DOT source with user labels, community fill colours and edge weights.
/// Cross-posters get a heavier outline.
pub fn export_dot(
    graph: &InteractionGraph,
    partition: &Partition,
    crossposters: &CrossPosterSet,
) -> String {
    let inner = graph.graph();
    let node_attrs = |_, (_, user): (_, &String)| {
            let fill = partition
                .community_of(user)
                .map(community_hsv)
                .unwrap_or_else(|| "0.000 0.000 0.850".to_string());
            let pen = if crossposters.contains(user) { 3.0 } else { 1.0 };
            format!(
                "label = {} style = filled fillcolor = \"{}\" penwidth = {:.1}",
                quoted(user),
                fill,
                pen
            )
        };
    let dot = Dot::with_attr_getters(
        inner,
        &[Config::NodeNoLabel, Config::EdgeNoLabel],
        &|_, edge| format!("label = \"{}\"", edge.weight()),
        &node_attrs,
    );
    format!("{}", dot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use network_graph::louvain;

    #[test]
    fn test_dot_carries_labels_and_weights() {
        let mut graph = InteractionGraph::new();
        graph.add_interaction("alice", "bob", 3);
        graph.add_interaction("bob", "carol", 1);
        let partition = louvain(&graph);
        let other = {
            let mut g = InteractionGraph::new();
            g.add_interaction("bob", "zed", 1);
            g
        };
        let crossposters = CrossPosterSet::between(&graph, &other);

        let dot = export_dot(&graph, &partition, &crossposters);
        assert!(dot.starts_with("digraph"));
        assert!(dot.contains("label = \"alice\""));
        assert!(dot.contains("label = \"3\""));
        assert!(dot.contains("penwidth = 3.0"));
        assert_eq!(dot.matches("penwidth = 1.0").count(), 2);
    }

    #[test]
    fn test_community_hues_differ() {
        assert_ne!(community_hsv(0), community_hsv(1));
        assert!(community_hsv(0).starts_with("0.000"));
    }

    #[test]
    fn test_quoting() {
        assert_eq!(quoted("a\"b"), "\"a\\\"b\"");
    }
}
