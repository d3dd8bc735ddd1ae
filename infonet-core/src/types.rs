use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Placeholder Reddit shows for removed accounts.
pub const DELETED_AUTHOR: &str = "[deleted]";

/// The subreddit group a record was collected for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Misinformation,
    Factual,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::Misinformation, Category::Factual];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Misinformation => "misinformation",
            Category::Factual => "factual",
        }
    }

    /// Capitalised name used in report headings and table columns.
    pub fn label(&self) -> &'static str {
        match self {
            Category::Misinformation => "Misinformation",
            Category::Factual => "Factual",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "misinformation" | "misinfo" => Ok(Category::Misinformation),
            "factual" => Ok(Category::Factual),
            other => Err(format!("unknown category '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Submission,
    Comment,
}

/// A single collected submission or comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub kind: RecordKind,
    pub author: String,
    pub created_utc: DateTime<Utc>,
    /// Reddit fullname of the parent (`t3_` submission, `t1_` comment).
    pub parent_id: Option<String>,
    pub parent_author: Option<String>,
    pub submission_id: String,
    pub subreddit: String,
    pub category: Category,
    pub title: Option<String>,
    pub body: String,
    pub score: i64,
    pub permalink: String,
    pub depth: u32,
}

impl Record {
    /// Reddit fullname of this record, as it appears in a child's `parent_id`.
    pub fn fullname(&self) -> String {
        match self.kind {
            RecordKind::Submission => format!("t3_{}", self.id),
            RecordKind::Comment => format!("t1_{}", self.id),
        }
    }

    /// Title and body joined, for keyword matching.
    pub fn text(&self) -> String {
        match &self.title {
            Some(title) => format!("{} {}", title, self.body),
            None => self.body.clone(),
        }
    }
}

/// Returns true for author names that identify a real account.
pub fn is_known_author(author: &str) -> bool {
    let author = author.trim();
    !author.is_empty() && author != DELETED_AUTHOR && author != "None"
}

/// One resolved reply: `source` answered content written by `target`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionEdge {
    pub source: String,
    pub target: String,
    pub comment_id: String,
    pub parent_id: String,
    pub subreddit: String,
    pub category: Category,
    pub created_utc: DateTime<Utc>,
}

/// Outcome of resolving reply edges over a record set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeResolution {
    pub edges: Vec<InteractionEdge>,
    pub self_replies: usize,
    pub unresolved: usize,
}

/// Resolve every comment to an edge towards the author it replied to.
///
/// The parent author recorded at collection time wins; otherwise the parent
/// fullname is looked up among `records`. Self replies and replies to unknown
/// or deleted authors produce no edge. Edges keep the input order.
pub fn resolve_reply_edges(records: &[Record]) -> EdgeResolution {
    let authors_by_fullname: HashMap<String, &str> = records
        .iter()
        .map(|r| (r.fullname(), r.author.as_str()))
        .collect();

    let mut resolution = EdgeResolution::default();

    for record in records.iter().filter(|r| r.kind == RecordKind::Comment) {
        if !is_known_author(&record.author) {
            resolution.unresolved += 1;
            continue;
        }
        let Some(parent_id) = record.parent_id.as_deref() else {
            resolution.unresolved += 1;
            continue;
        };

        let parent_author = record
            .parent_author
            .as_deref()
            .or_else(|| authors_by_fullname.get(parent_id).copied())
            .filter(|author| is_known_author(author));

        match parent_author {
            None => resolution.unresolved += 1,
            Some(target) if target == record.author => resolution.self_replies += 1,
            Some(target) => resolution.edges.push(InteractionEdge {
                source: record.author.clone(),
                target: target.to_string(),
                comment_id: record.id.clone(),
                parent_id: parent_id.to_string(),
                subreddit: record.subreddit.clone(),
                category: record.category,
                created_utc: record.created_utc,
            }),
        }
    }

    resolution
}
