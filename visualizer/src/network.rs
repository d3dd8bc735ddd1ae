//! Node-link drawings of the interaction networks.

use crate::charts::DrawResult;
use crate::layout::{spring_layout, Positions};
use crate::style::{
    community_color, CROSSPOSTER, EDGE, FACTUAL, FONT, LABEL_SIZE, MISINFORMATION, TITLE_SIZE,
};
use network_graph::{weak_components, CrossPosterSet, InteractionGraph, NodeScores, Partition};
use plotters::coord::types::RangedCoordf64;
use plotters::coord::Shift;
use plotters::prelude::*;
use petgraph::visit::EdgeRef;

const TOP_LABELS: usize = 10;

/// Largest weak component, capped at `cap` users in name order.
pub fn largest_component_sample(graph: &InteractionGraph, cap: usize) -> InteractionGraph {
    let components = weak_components(graph);
    graph.subgraph(components.largest_members.iter().take(cap).map(String::as_str))
}

/// Largest weak component of the combined network. Above `cap` users the
/// cross-posters are kept first and the rest filled by PageRank.
pub fn combined_sample(
    combined: &InteractionGraph,
    crossposters: &CrossPosterSet,
    pagerank: &NodeScores,
    cap: usize,
) -> InteractionGraph {
    let members = weak_components(combined).largest_members;
    if members.len() <= cap {
        return combined.subgraph(members.iter().map(String::as_str));
    }

    let (mut keep, mut others): (Vec<&str>, Vec<&str>) = members
        .iter()
        .map(String::as_str)
        .partition(|user| crossposters.contains(user));
    keep.truncate(cap);
    others.sort_by(|a, b| {
        pagerank
            .get(b)
            .total_cmp(&pagerank.get(a))
            .then_with(|| a.cmp(b))
    });
    let remaining = cap - keep.len();
    keep.extend(others.into_iter().take(remaining));
    combined.subgraph(keep)
}

/// Node radius in pixels for an unweighted degree.
pub fn node_radius(degree: usize, max_radius: f64) -> i32 {
    (1.5 + (degree as f64).sqrt() * 1.2).min(max_radius).round() as i32
}

/// Title suffix naming how much of the network is drawn.
pub fn sample_note(shown: usize, total: usize) -> String {
    if shown < total {
        format!(" (largest component, {} of {} users)", shown, total)
    } else {
        String::new()
    }
}

/// Which networks a user appears in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    Misinformation,
    Factual,
    Both,
}

impl Membership {
    pub fn of(user: &str, misinformation: &InteractionGraph, factual: &InteractionGraph) -> Self {
        match (misinformation.contains_user(user), factual.contains_user(user)) {
            (true, true) => Membership::Both,
            (true, false) => Membership::Misinformation,
            _ => Membership::Factual,
        }
    }

    pub fn color(self) -> RGBColor {
        match self {
            Membership::Misinformation => MISINFORMATION,
            Membership::Factual => FACTUAL,
            Membership::Both => CROSSPOSTER,
        }
    }

    fn legend(self) -> &'static str {
        match self {
            Membership::Misinformation => "Misinformation user",
            Membership::Factual => "Factual information user",
            Membership::Both => "Cross-poster",
        }
    }

    const ALL: [Membership; 3] = [Membership::Misinformation, Membership::Factual, Membership::Both];
}

/// Users `graph` ranks highest by `scores`, best first.
pub fn top_users<'a>(graph: &'a InteractionGraph, scores: &NodeScores, n: usize) -> Vec<&'a str> {
    let mut users = graph.users();
    users.sort_by(|a, b| scores.get(b).total_cmp(&scores.get(a)).then_with(|| a.cmp(b)));
    users.truncate(n);
    users
}

fn edge_segments(graph: &InteractionGraph, positions: &Positions) -> Vec<[(f64, f64); 2]> {
    graph
        .graph()
        .edge_references()
        .map(|edge| [positions[edge.source().index()], positions[edge.target().index()]])
        .collect()
}

fn node_link_chart<'a, DB: DrawingBackend>(
    area: &'a DrawingArea<DB, Shift>,
    title: &str,
) -> Result<
    ChartContext<'a, DB, Cartesian2d<RangedCoordf64, RangedCoordf64>>,
    DrawingAreaErrorKind<DB::ErrorType>,
> {
    ChartBuilder::on(area)
        .caption(title, (FONT, TITLE_SIZE))
        .margin(20)
        .build_cartesian_2d(-0.03..1.03, -0.03..1.03)
}

/// One group network in a single colour.
pub fn draw_group<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    title: &str,
    sample: &InteractionGraph,
    color: RGBColor,
    iterations: usize,
    seed: u64,
) -> DrawResult<DB> {
    let mut chart = node_link_chart(area, title)?;
    let positions = spring_layout(sample, iterations, seed);

    let edge_style = EDGE.mix(0.3).stroke_width(1);
    chart.draw_series(
        edge_segments(sample, &positions)
            .into_iter()
            .map(|segment| PathElement::new(segment.to_vec(), edge_style)),
    )?;

    let node_style = color.mix(0.75).filled();
    chart.draw_series(sample.graph().node_indices().map(|index| {
        let degree = sample.degree(sample.user(index));
        Circle::new(positions[index.index()], node_radius(degree, 10.0), node_style)
    }))?;
    Ok(())
}

pub struct CombinedLayers<'a> {
    pub misinformation: &'a InteractionGraph,
    pub factual: &'a InteractionGraph,
    pub partition: &'a Partition,
    pub pagerank: &'a NodeScores,
}

/// Combined network coloured by group membership over a faint halo in the
/// community colour, with the top users by PageRank labelled.
pub fn draw_combined<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    title: &str,
    sample: &InteractionGraph,
    layers: &CombinedLayers<'_>,
    iterations: usize,
    seed: u64,
) -> DrawResult<DB> {
    let mut chart = node_link_chart(area, title)?;
    let positions = spring_layout(sample, iterations, seed);
    let position_of = |user: &str| {
        sample
            .node_index(user)
            .map(|index| positions[index.index()])
            .unwrap_or((0.5, 0.5))
    };

    chart.draw_series(sample.graph().node_indices().filter_map(|index| {
        let community = layers.partition.community_of(sample.user(index))?;
        Some(Circle::new(
            positions[index.index()],
            9,
            community_color(community).mix(0.15).filled(),
        ))
    }))?;

    let edge_style = EDGE.mix(0.3).stroke_width(1);
    chart
        .draw_series(
            edge_segments(sample, &positions)
                .into_iter()
                .map(|segment| PathElement::new(segment.to_vec(), edge_style)),
        )?
        .label("Reply interaction")
        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], EDGE.stroke_width(1)));

    for membership in Membership::ALL {
        let color = membership.color();
        let max_radius = if membership == Membership::Both { 14.0 } else { 9.0 };
        let users: Vec<&str> = sample
            .users()
            .into_iter()
            .filter(|user| Membership::of(user, layers.misinformation, layers.factual) == membership)
            .collect();
        chart
            .draw_series(users.into_iter().map(|user| {
                Circle::new(
                    position_of(user),
                    node_radius(sample.degree(user), max_radius),
                    color.mix(0.8).filled(),
                )
            }))?
            .label(membership.legend())
            .legend(move |(x, y)| Circle::new((x + 10, y), 5, color.filled()));
    }

    let text = TextStyle::from((FONT, LABEL_SIZE).into_font());
    chart.draw_series(top_users(sample, layers.pagerank, TOP_LABELS).into_iter().map(|user| {
        EmptyElement::at(position_of(user)) + Text::new(user.to_string(), (6, -6), text.clone())
    }))?;

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .position(SeriesLabelPosition::LowerRight)
        .draw()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use network_graph::{pagerank, PageRankConfig};

    fn graph(edges: &[(&str, &str)]) -> InteractionGraph {
        let mut graph = InteractionGraph::new();
        for (a, b) in edges {
            graph.add_interaction(a, b, 1);
        }
        graph
    }

    #[test]
    fn test_largest_component_sample_is_capped() {
        let g = graph(&[("a", "b"), ("b", "c"), ("c", "d"), ("x", "y")]);
        let sample = largest_component_sample(&g, 3);
        assert_eq!(sample.users(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_combined_sample_keeps_crossposters_first() {
        let misinformation = graph(&[("hub", "m1"), ("m2", "hub"), ("m3", "hub"), ("z", "m1")]);
        let factual = graph(&[("z", "f1")]);
        let combined = InteractionGraph::combined(&misinformation, &factual);
        let crossposters = CrossPosterSet::between(&misinformation, &factual);
        let scores = pagerank(&combined, &PageRankConfig::default()).unwrap();

        let sample = combined_sample(&combined, &crossposters, &scores, 2);
        assert_eq!(sample.node_count(), 2);
        assert!(sample.contains_user("z"));
    }

    #[test]
    fn test_membership() {
        let misinformation = graph(&[("a", "both")]);
        let factual = graph(&[("both", "b")]);
        assert_eq!(Membership::of("both", &misinformation, &factual), Membership::Both);
        assert_eq!(Membership::of("a", &misinformation, &factual), Membership::Misinformation);
        assert_eq!(Membership::of("b", &misinformation, &factual).color(), FACTUAL);
    }

    #[test]
    fn test_top_users_by_pagerank() {
        let g = graph(&[("a", "hub"), ("b", "hub"), ("c", "hub"), ("d", "a")]);
        let scores = pagerank(&g, &PageRankConfig::default()).unwrap();
        let top = top_users(&g, &scores, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0], "hub");
    }

    #[test]
    fn test_sample_note() {
        assert_eq!(sample_note(10, 10), "");
        assert_eq!(sample_note(3, 10), " (largest component, 3 of 10 users)");
    }
}
