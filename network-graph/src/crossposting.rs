use crate::builder::InteractionGraph;
use crate::centrality::NodeScores;
use infonet_core::{is_known_author, Record};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Users present in both networks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrossPosterSet {
    users: BTreeSet<String>,
}

impl CrossPosterSet {
    pub fn between(a: &InteractionGraph, b: &InteractionGraph) -> Self {
        let (small, large) = if a.node_count() <= b.node_count() {
            (a, b)
        } else {
            (b, a)
        };
        let users = small
            .graph()
            .node_weights()
            .filter(|user| large.contains_user(user))
            .cloned()
            .collect();
        Self { users }
    }

    pub fn contains(&self, user: &str) -> bool {
        self.users.contains(user)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Users in name order.
    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.users.iter().map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OverlapSummary {
    pub crossposters: usize,
    pub misinformation_users: usize,
    pub factual_users: usize,
    pub union: usize,
    /// Cross-posters as a fraction of the union of both user sets.
    pub share: f64,
}

impl OverlapSummary {
    pub fn compute(
        misinformation: &InteractionGraph,
        factual: &InteractionGraph,
        crossposters: &CrossPosterSet,
    ) -> Self {
        let union = misinformation.node_count() + factual.node_count() - crossposters.len();
        Self {
            crossposters: crossposters.len(),
            misinformation_users: misinformation.node_count(),
            factual_users: factual.node_count(),
            union,
            share: if union == 0 {
                0.0
            } else {
                crossposters.len() as f64 / union as f64
            },
        }
    }
}

/// Influence of one cross-poster in each network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossPosterProfile {
    pub user: String,
    #[serde(rename = "misinfo_pagerank")]
    pub misinformation_pagerank: f64,
    pub factual_pagerank: f64,
    #[serde(rename = "misinfo_degree")]
    pub misinformation_degree: usize,
    pub factual_degree: usize,
    pub total_pagerank: f64,
    pub total_degree: usize,
}

impl CrossPosterProfile {
    /// Fraction of the combined PageRank held in the misinformation network.
    pub fn misinformation_share(&self) -> f64 {
        if self.total_pagerank > 0.0 {
            self.misinformation_pagerank / self.total_pagerank
        } else {
            0.0
        }
    }
}

/// Profiles ordered by total PageRank, highest first.
pub fn profile_crossposters(
    crossposters: &CrossPosterSet,
    misinformation: (&InteractionGraph, &NodeScores),
    factual: (&InteractionGraph, &NodeScores),
) -> Vec<CrossPosterProfile> {
    let (misinformation_graph, misinformation_pagerank) = misinformation;
    let (factual_graph, factual_pagerank) = factual;

    let mut profiles: Vec<CrossPosterProfile> = crossposters
        .iter()
        .map(|user| {
            let m_pr = misinformation_pagerank.get(user);
            let f_pr = factual_pagerank.get(user);
            let m_deg = misinformation_graph.degree(user);
            let f_deg = factual_graph.degree(user);
            CrossPosterProfile {
                user: user.to_string(),
                misinformation_pagerank: m_pr,
                factual_pagerank: f_pr,
                misinformation_degree: m_deg,
                factual_degree: f_deg,
                total_pagerank: m_pr + f_pr,
                total_degree: m_deg + f_deg,
            }
        })
        .collect();

    profiles.sort_by(|a, b| {
        b.total_pagerank
            .total_cmp(&a.total_pagerank)
            .then_with(|| a.user.cmp(&b.user))
    });
    profiles
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubredditPair {
    #[serde(rename = "misinfo_subreddit")]
    pub misinformation_subreddit: String,
    pub factual_subreddit: String,
    pub count: usize,
}

/// Where cross-posters are active.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubredditParticipation {
    /// Cross-poster records per misinformation subreddit, most active first.
    pub misinformation: Vec<(String, usize)>,
    /// Cross-poster records per factual subreddit, most active first.
    pub factual: Vec<(String, usize)>,
    /// One count per cross-poster for every (misinformation, factual)
    /// subreddit combination they appear in, most common first.
    pub pairs: Vec<SubredditPair>,
}

impl SubredditParticipation {
    pub fn compute(
        crossposters: &CrossPosterSet,
        misinformation_records: &[Record],
        factual_records: &[Record],
    ) -> Self {
        let (misinformation, m_by_user) = participation(crossposters, misinformation_records);
        let (factual, f_by_user) = participation(crossposters, factual_records);

        let mut pair_counts: HashMap<(&str, &str), usize> = HashMap::new();
        for (user, m_subs) in &m_by_user {
            let Some(f_subs) = f_by_user.get(user) else {
                continue;
            };
            for m in m_subs {
                for f in f_subs {
                    *pair_counts.entry((*m, *f)).or_insert(0) += 1;
                }
            }
        }

        let mut pairs: Vec<SubredditPair> = pair_counts
            .into_iter()
            .map(|((m, f), count)| SubredditPair {
                misinformation_subreddit: m.to_string(),
                factual_subreddit: f.to_string(),
                count,
            })
            .collect();
        pairs.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.misinformation_subreddit.cmp(&b.misinformation_subreddit))
                .then_with(|| a.factual_subreddit.cmp(&b.factual_subreddit))
        });

        Self {
            misinformation,
            factual,
            pairs,
        }
    }

    pub fn pair_count(&self, misinformation: &str, factual: &str) -> usize {
        self.pairs
            .iter()
            .find(|p| p.misinformation_subreddit == misinformation && p.factual_subreddit == factual)
            .map_or(0, |p| p.count)
    }
}

type ByUser<'a> = BTreeMap<&'a str, BTreeSet<&'a str>>;

fn participation<'a>(
    crossposters: &CrossPosterSet,
    records: &'a [Record],
) -> (Vec<(String, usize)>, ByUser<'a>) {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    let mut by_user: ByUser<'a> = BTreeMap::new();

    for record in records
        .iter()
        .filter(|r| is_known_author(&r.author) && crossposters.contains(&r.author))
    {
        *counts.entry(&record.subreddit).or_insert(0) += 1;
        by_user
            .entry(&record.author)
            .or_default()
            .insert(&record.subreddit);
    }

    (ranked_counts(counts), by_user)
}

/// Record counts per subreddit, most active first, for every record.
pub fn subreddit_record_counts(records: &[Record]) -> Vec<(String, usize)> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for record in records {
        *counts.entry(&record.subreddit).or_insert(0) += 1;
    }
    ranked_counts(counts)
}

fn ranked_counts(counts: BTreeMap<&str, usize>) -> Vec<(String, usize)> {
    let mut ranked: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(subreddit, count)| (subreddit.to_string(), count))
        .collect();
    // Stable sort keeps equal counts in name order.
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked
}
