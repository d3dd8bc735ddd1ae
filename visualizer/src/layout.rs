use network_graph::InteractionGraph;
use petgraph::visit::EdgeRef;

/// Node positions in `[0, 1]²`, indexed like the graph's nodes.
pub type Positions = Vec<(f64, f64)>;

/// Seeded Fruchterman-Reingold spring layout over the undirected structure
/// of `graph`.
pub fn spring_layout(graph: &InteractionGraph, iterations: usize, seed: u64) -> Positions {
    let n = graph.node_count();
    let edges: Vec<(usize, usize)> = graph
        .graph()
        .edge_references()
        .map(|edge| (edge.source().index(), edge.target().index()))
        .collect();
    fruchterman_reingold(n, &edges, iterations, seed)
}

pub fn fruchterman_reingold(
    n: usize,
    edges: &[(usize, usize)],
    iterations: usize,
    seed: u64,
) -> Positions {
    match n {
        0 => return Vec::new(),
        1 => return vec![(0.5, 0.5)],
        _ => {}
    }

    let mut rng = fastrand::Rng::with_seed(seed);
    let mut pos: Positions = (0..n).map(|_| (rng.f64(), rng.f64())).collect();

    let k = (1.0 / n as f64).sqrt();
    let mut temperature = 0.1;
    let cooling = temperature / (iterations as f64 + 1.0);
    let mut displacement = vec![(0.0f64, 0.0f64); n];

    for _ in 0..iterations {
        displacement.iter_mut().for_each(|d| *d = (0.0, 0.0));

        for i in 0..n {
            for j in (i + 1)..n {
                let (dx, dy) = (pos[i].0 - pos[j].0, pos[i].1 - pos[j].1);
                let distance = (dx * dx + dy * dy).sqrt().max(0.01);
                let force = k * k / distance;
                let (fx, fy) = (dx / distance * force, dy / distance * force);
                displacement[i].0 += fx;
                displacement[i].1 += fy;
                displacement[j].0 -= fx;
                displacement[j].1 -= fy;
            }
        }

        for &(a, b) in edges {
            if a == b {
                continue;
            }
            let (dx, dy) = (pos[a].0 - pos[b].0, pos[a].1 - pos[b].1);
            let distance = (dx * dx + dy * dy).sqrt().max(0.01);
            let force = distance * distance / k;
            let (fx, fy) = (dx / distance * force, dy / distance * force);
            displacement[a].0 -= fx;
            displacement[a].1 -= fy;
            displacement[b].0 += fx;
            displacement[b].1 += fy;
        }

        for (p, d) in pos.iter_mut().zip(&displacement) {
            let length = (d.0 * d.0 + d.1 * d.1).sqrt();
            if length > 0.0 {
                let step = length.min(temperature);
                p.0 += d.0 / length * step;
                p.1 += d.1 / length * step;
            }
        }
        temperature -= cooling;
    }

    rescale(&mut pos);
    pos
}

/// Stretch positions to fill `[0, 1]²` while keeping the aspect ratio.
fn rescale(pos: &mut Positions) {
    let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
    let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for &(x, y) in pos.iter() {
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }

    let span = (max_x - min_x).max(max_y - min_y);
    if span <= f64::EPSILON {
        pos.iter_mut().for_each(|p| *p = (0.5, 0.5));
        return;
    }
    let (offset_x, offset_y) = (
        (1.0 - (max_x - min_x) / span) / 2.0,
        (1.0 - (max_y - min_y) / span) / 2.0,
    );
    for p in pos.iter_mut() {
        p.0 = (p.0 - min_x) / span + offset_x;
        p.1 = (p.1 - min_y) / span + offset_y;
    }
}
