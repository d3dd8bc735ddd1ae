pub mod filter;
pub mod storage;
pub mod summary;

pub use filter::{DateWindow, KeywordFilter};
pub use storage::{read_records, unique_users, write_records, DataStore};
pub use summary::{CollectionSummary, SkippedSubreddit, SubredditSummary};

use chrono::Utc;
use infonet_core::{
    is_known_author, resolve_reply_edges, AppConfig, Category, CollectionConfig, CoreError,
    ErrorExt, ErrorRecovery, ErrorReporter, GroupConfig, Record, DELETED_AUTHOR,
};
use reddit_client::{RedditClient, SearchQuery, MAX_PAGE_SIZE};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Records gathered for one category, before persistence.
#[derive(Debug, Clone, Default)]
pub struct GroupCollection {
    pub records: Vec<Record>,
    pub subreddits: Vec<SubredditSummary>,
    pub skipped: Vec<SkippedSubreddit>,
}

struct SubredditHarvest {
    records: Vec<Record>,
    summary: SubredditSummary,
}

pub struct Collector {
    client: RedditClient,
    settings: CollectionConfig,
    query: SearchQuery,
    window: DateWindow,
    keywords: KeywordFilter,
    store: DataStore,
    reporter: ErrorReporter,
}

impl Collector {
    pub fn new(client: RedditClient, config: &AppConfig) -> Self {
        let settings = config.collection.clone();
        let query = SearchQuery {
            query: settings.query.clone(),
            sort: settings.sort.clone(),
            time_filter: settings.time_filter.clone(),
            limit: settings.limit,
        };

        Self {
            client,
            window: DateWindow::from_config(&settings),
            keywords: KeywordFilter::new(&settings.keywords),
            store: DataStore::new(settings.data_dir.clone()),
            reporter: ErrorReporter::new(),
            query,
            settings,
        }
    }

    pub fn store(&self) -> &DataStore {
        &self.store
    }

    /// Collect every subreddit of `group`. Failed subreddits are recorded in
    /// `skipped`; only errors that would fail every subreddit are returned.
    pub async fn collect_group(&self, group: &GroupConfig) -> Result<GroupCollection, CoreError> {
        let mut collection = GroupCollection::default();
        let pause = Duration::from_millis(self.settings.pause_between_subreddits_ms);

        for (index, subreddit) in group.subreddits.iter().enumerate() {
            if index > 0 && !pause.is_zero() {
                sleep(pause).await;
            }

            info!("Collecting from r/{} ({})", subreddit, group.category);
            match self.collect_subreddit(subreddit, group.category).await {
                Ok(harvest) => {
                    let path = self
                        .store
                        .write_subreddit(group.category, subreddit, &harvest.records)?;
                    info!(
                        "Collected {} submissions and {} comments from r/{} into {}",
                        harvest.summary.submissions,
                        harvest.summary.comments,
                        subreddit,
                        path.display()
                    );
                    collection.records.extend(harvest.records);
                    collection.subreddits.push(harvest.summary);
                }
                Err(e) => {
                    let max_attempts = self.settings.max_attempts;
                    if ErrorRecovery::for_collection(&e, max_attempts, max_attempts).is_abort() {
                        self.reporter
                            .report_error(&format!("Aborting collection at r/{}", subreddit), &e);
                        return Err(e);
                    }
                    self.reporter
                        .report_warning(&format!("Skipping r/{}", subreddit), &e);
                    collection.skipped.push(SkippedSubreddit {
                        subreddit: subreddit.clone(),
                        error_code: e.error_code(),
                        message: e.to_string(),
                    });
                }
            }
        }

        Ok(collection)
    }

    async fn collect_subreddit(
        &self,
        subreddit: &str,
        category: Category,
    ) -> Result<SubredditHarvest, CoreError> {
        let mut records = Vec::new();
        let mut summary = SubredditSummary {
            subreddit: subreddit.to_string(),
            submissions: 0,
            comments: 0,
            filtered_out: 0,
            comment_fetch_failures: 0,
        };

        let mut seen: u32 = 0;
        let mut after: Option<String> = None;

        while seen < self.query.limit {
            let page_size = (self.query.limit - seen).min(MAX_PAGE_SIZE);
            let listing = self
                .client
                .search_subreddit(subreddit, &self.query, page_size, after.as_deref())
                .await?;
            let next = listing.data.after.clone();
            let posts = listing.into_items();

            if posts.is_empty() {
                break;
            }

            for post in posts.into_iter().take((self.query.limit - seen) as usize) {
                seen += 1;
                let mut submission = post.to_record(category);
                if !is_known_author(&submission.author) {
                    submission.author = DELETED_AUTHOR.to_string();
                }

                if !self.window.contains(submission.created_utc)
                    || !self.keywords.matches_record(&submission)
                {
                    debug!("Dropping {} from r/{} (outside filters)", submission.id, subreddit);
                    summary.filtered_out += 1;
                    continue;
                }

                match self.client.fetch_comment_tree(&submission.id).await {
                    Ok(comments) => {
                        summary.comments += comments.len();
                        records.push(submission);
                        records.extend(comments.into_iter().map(|c| c.into_record(category)));
                    }
                    Err(e) => {
                        let max_attempts = self.settings.max_attempts;
                        if ErrorRecovery::for_collection(&e, max_attempts, max_attempts).is_abort() {
                            return Err(e);
                        }
                        warn!(
                            "Could not fetch comments for {} in r/{}: {}",
                            submission.id, subreddit, e
                        );
                        summary.comment_fetch_failures += 1;
                        records.push(submission);
                    }
                }
                summary.submissions += 1;
            }

            match next {
                Some(cursor) => after = Some(cursor),
                None => break,
            }
        }

        Ok(SubredditHarvest { records, summary })
    }

    /// Collect one group and write every output file for it.
    pub async fn run(&self, group: &GroupConfig) -> Result<CollectionSummary, CoreError> {
        let started_at = Utc::now();
        let run_id = Uuid::new_v4();
        info!(
            "Starting collection run {} for {} subreddits",
            run_id, group.category
        );

        let collection = self.collect_group(group).await?;
        let category = group.category;

        self.store.write_group(category, &collection.records)?;

        let users = unique_users(&collection.records);
        self.store.write_users(category, &users)?;

        let resolution = resolve_reply_edges(&collection.records);
        self.store.write_edges(category, &resolution.edges)?;

        let summary = CollectionSummary {
            run_id,
            category,
            started_at,
            finished_at: Utc::now(),
            subreddits: collection.subreddits,
            skipped: collection.skipped,
            total_records: collection.records.len(),
            unique_users: users.len(),
            edges: resolution.edges.len(),
            self_replies: resolution.self_replies,
            unresolved_replies: resolution.unresolved,
            api: self.client.get_metrics().await,
            retries: self.client.get_retry_metrics().await,
            rate_limit: self.client.get_rate_limit_status().await,
        };
        self.store.write_summary(&summary)?;

        info!("{}", summary.log_line());
        info!("API usage: {}", summary.api.summary_line());
        info!("{}", summary.throttle_line());
        Ok(summary)
    }
}
