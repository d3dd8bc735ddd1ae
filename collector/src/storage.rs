//! Flat-file layout of collected data under the data directory.

use crate::summary::CollectionSummary;
use infonet_core::{
    is_known_author, Category, CoreError, InteractionEdge, Record, StorageError,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Serialize, Deserialize)]
struct UserRow {
    username: String,
}

#[derive(Debug, Clone)]
pub struct DataStore {
    root: PathBuf,
}

impl DataStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn subreddit_path(&self, category: Category, subreddit: &str) -> PathBuf {
        self.root
            .join(category.as_str())
            .join(format!("{}.csv", subreddit))
    }

    pub fn content_path(&self, category: Category) -> PathBuf {
        self.root.join(format!("all_content_{}.csv", category))
    }

    pub fn users_path(&self, category: Category) -> PathBuf {
        self.root.join(format!("users_{}.csv", category))
    }

    pub fn edges_path(&self, category: Category) -> PathBuf {
        self.root.join(format!("network_edges_{}.csv", category))
    }

    pub fn summary_path(&self, category: Category) -> PathBuf {
        self.root
            .join(format!("collection_summary_{}.json", category))
    }

    pub fn write_subreddit(
        &self,
        category: Category,
        subreddit: &str,
        records: &[Record],
    ) -> Result<PathBuf, CoreError> {
        let path = self.subreddit_path(category, subreddit);
        write_records(&path, records)?;
        Ok(path)
    }

    pub fn write_group(&self, category: Category, records: &[Record]) -> Result<PathBuf, CoreError> {
        let path = self.content_path(category);
        write_records(&path, records)?;
        info!("Saved {} records to {}", records.len(), path.display());
        Ok(path)
    }

    pub fn load_group(&self, category: Category) -> Result<Vec<Record>, CoreError> {
        read_records(&self.content_path(category))
    }

    pub fn write_users(&self, category: Category, users: &BTreeSet<String>) -> Result<PathBuf, CoreError> {
        let path = self.users_path(category);
        let mut writer = csv_writer(&path)?;
        for username in users {
            writer
                .serialize(UserRow {
                    username: username.clone(),
                })
                .map_err(StorageError::from)?;
        }
        writer.flush()?;
        info!("Saved {} unique users to {}", users.len(), path.display());
        Ok(path)
    }

    pub fn load_users(&self, category: Category) -> Result<BTreeSet<String>, CoreError> {
        let path = self.users_path(category);
        let mut reader = csv_reader(&path)?;
        let mut users = BTreeSet::new();
        for row in reader.deserialize::<UserRow>() {
            users.insert(row.map_err(StorageError::from)?.username);
        }
        Ok(users)
    }

    pub fn write_edges(&self, category: Category, edges: &[InteractionEdge]) -> Result<PathBuf, CoreError> {
        let path = self.edges_path(category);
        let mut writer = csv_writer(&path)?;
        for edge in edges {
            writer.serialize(edge).map_err(StorageError::from)?;
        }
        writer.flush()?;
        info!("Saved {} network edges to {}", edges.len(), path.display());
        Ok(path)
    }

    pub fn load_edges(&self, category: Category) -> Result<Vec<InteractionEdge>, CoreError> {
        let path = self.edges_path(category);
        let mut reader = csv_reader(&path)?;
        let mut edges = Vec::new();
        for row in reader.deserialize::<InteractionEdge>() {
            edges.push(row.map_err(StorageError::from)?);
        }
        Ok(edges)
    }

    pub fn write_summary(&self, summary: &CollectionSummary) -> Result<PathBuf, CoreError> {
        let path = self.summary_path(summary.category);
        ensure_parent(&path)?;
        fs::write(&path, serde_json::to_string_pretty(summary)?)?;
        debug!("Wrote collection summary to {}", path.display());
        Ok(path)
    }

    pub fn load_summary(&self, category: Category) -> Result<CollectionSummary, CoreError> {
        let path = self.summary_path(category);
        let content = fs::read_to_string(&path).map_err(|e| missing_or_io(&path, e))?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Write records as CSV with a header row, creating parent directories.
pub fn write_records(path: &Path, records: &[Record]) -> Result<(), CoreError> {
    let mut writer = csv_writer(path)?;
    for record in records {
        writer.serialize(record).map_err(StorageError::from)?;
    }
    writer.flush()?;
    debug!("Wrote {} records to {}", records.len(), path.display());
    Ok(())
}

/// Read records back; rows without an author or subreddit are rejected.
pub fn read_records(path: &Path) -> Result<Vec<Record>, CoreError> {
    let mut reader = csv_reader(path)?;
    let mut records = Vec::new();

    for (index, row) in reader.deserialize::<Record>().enumerate() {
        let record = row.map_err(|e| StorageError::MalformedRecord {
            path: path.display().to_string(),
            reason: format!("row {}: {}", index + 1, e),
        })?;

        if record.author.trim().is_empty() || record.subreddit.trim().is_empty() {
            return Err(StorageError::MalformedRecord {
                path: path.display().to_string(),
                reason: format!("row {}: record {} has an empty author or subreddit", index + 1, record.id),
            }
            .into());
        }
        records.push(record);
    }

    debug!("Read {} records from {}", records.len(), path.display());
    Ok(records)
}

/// Unique real authors across `records`.
pub fn unique_users(records: &[Record]) -> BTreeSet<String> {
    records
        .iter()
        .filter(|r| is_known_author(&r.author))
        .map(|r| r.author.clone())
        .collect()
}

fn ensure_parent(path: &Path) -> Result<(), CoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn csv_writer(path: &Path) -> Result<csv::Writer<fs::File>, CoreError> {
    ensure_parent(path)?;
    Ok(csv::Writer::from_path(path).map_err(StorageError::from)?)
}

fn csv_reader(path: &Path) -> Result<csv::Reader<fs::File>, CoreError> {
    let file = fs::File::open(path).map_err(|e| missing_or_io(path, e))?;
    Ok(csv::Reader::from_reader(file))
}

fn missing_or_io(path: &Path, error: std::io::Error) -> CoreError {
    if error.kind() == std::io::ErrorKind::NotFound {
        StorageError::FileNotFound {
            path: path.display().to_string(),
        }
        .into()
    } else {
        error.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use infonet_core::RecordKind;
    use tempfile::TempDir;

    fn record(id: &str, kind: RecordKind, author: &str, parent: Option<(&str, &str)>) -> Record {
        Record {
            id: id.to_string(),
            kind,
            author: author.to_string(),
            created_utc: Utc.timestamp_opt(1_640_995_200, 0).unwrap(),
            parent_id: parent.map(|(id, _)| id.to_string()),
            parent_author: parent.map(|(_, author)| author.to_string()),
            submission_id: "p1".to_string(),
            subreddit: "DebateVaccines".to_string(),
            category: Category::Misinformation,
            title: (kind == RecordKind::Submission).then(|| "Mandates, again".to_string()),
            body: "line one\nline two, with \"quotes\"".to_string(),
            score: -3,
            permalink: format!("/r/DebateVaccines/comments/p1/_/{}/", id),
            depth: 0,
        }
    }

    #[test]
    fn test_layout_paths() {
        let store = DataStore::new("reddit_data");
        assert_eq!(
            store.subreddit_path(Category::Factual, "science"),
            PathBuf::from("reddit_data/factual/science.csv")
        );
        assert_eq!(
            store.content_path(Category::Misinformation),
            PathBuf::from("reddit_data/all_content_misinformation.csv")
        );
        assert_eq!(
            store.edges_path(Category::Factual),
            PathBuf::from("reddit_data/network_edges_factual.csv")
        );
    }

    #[test]
    fn test_records_survive_csv() {
        let dir = TempDir::new().unwrap();
        let store = DataStore::new(dir.path());
        let records = vec![
            record("p1", RecordKind::Submission, "alice", None),
            record("c1", RecordKind::Comment, "bob", Some(("t3_p1", "alice"))),
        ];

        store.write_group(Category::Misinformation, &records).unwrap();
        let loaded = store.load_group(Category::Misinformation).unwrap();

        assert_eq!(loaded, records);
        assert_eq!(loaded[0].parent_id, None);
        assert_eq!(loaded[1].title, None);
    }

    #[test]
    fn test_missing_group_file() {
        let dir = TempDir::new().unwrap();
        let store = DataStore::new(dir.path());

        let result = store.load_group(Category::Factual);
        assert!(matches!(
            result,
            Err(CoreError::Storage(StorageError::FileNotFound { .. }))
        ));
    }

    #[test]
    fn test_empty_author_is_malformed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.csv");
        write_records(&path, &[record("p1", RecordKind::Submission, "", None)]).unwrap();

        assert!(matches!(
            read_records(&path),
            Err(CoreError::Storage(StorageError::MalformedRecord { .. }))
        ));
    }

    #[test]
    fn test_users_and_edges_files() {
        let dir = TempDir::new().unwrap();
        let store = DataStore::new(dir.path());
        let records = vec![
            record("p1", RecordKind::Submission, "alice", None),
            record("c1", RecordKind::Comment, "bob", Some(("t3_p1", "alice"))),
            record("c2", RecordKind::Comment, "bob", Some(("t1_c1", "bob"))),
        ];

        let users = unique_users(&records);
        store.write_users(Category::Misinformation, &users).unwrap();
        assert_eq!(store.load_users(Category::Misinformation).unwrap(), users);

        let edges = infonet_core::resolve_reply_edges(&records).edges;
        store.write_edges(Category::Misinformation, &edges).unwrap();
        let loaded = store.load_edges(Category::Misinformation).unwrap();
        assert_eq!(loaded, edges);
        assert_eq!(loaded.len(), 1);
    }
}
