use chrono::{DateTime, Utc};
use infonet_core::{CollectionConfig, Record};

/// Half-open `[start, end)` window on submission creation time.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DateWindow {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateWindow {
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    pub fn from_config(config: &CollectionConfig) -> Self {
        let (start, end) = config.window();
        Self { start, end }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start.map_or(true, |start| at >= start) && self.end.map_or(true, |end| at < end)
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

/// Case-insensitive substring match against a keyword list. An empty list
/// accepts everything.
#[derive(Debug, Clone, Default)]
pub struct KeywordFilter {
    keywords: Vec<String>,
}

impl KeywordFilter {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self { keywords }
    }

    pub fn is_active(&self) -> bool {
        !self.keywords.is_empty()
    }

    pub fn matches(&self, text: &str) -> bool {
        if self.keywords.is_empty() {
            return true;
        }
        let text = text.to_lowercase();
        self.keywords.iter().any(|k| text.contains(k.as_str()))
    }

    pub fn matches_record(&self, record: &Record) -> bool {
        self.matches(&record.text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    #[test]
    fn test_window_is_half_open() {
        let config = CollectionConfig {
            start_date: NaiveDate::from_ymd_opt(2021, 1, 1),
            end_date: NaiveDate::from_ymd_opt(2022, 1, 1),
            ..CollectionConfig::default()
        };
        let window = DateWindow::from_config(&config);

        assert!(window.contains(Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap()));
        assert!(window.contains(Utc.with_ymd_and_hms(2021, 12, 31, 23, 59, 59).unwrap()));
        assert!(!window.contains(Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap()));
        assert!(!window.contains(Utc.with_ymd_and_hms(2020, 12, 31, 12, 0, 0).unwrap()));
    }

    #[test]
    fn test_unbounded_window_accepts_everything() {
        let window = DateWindow::default();
        assert!(window.is_unbounded());
        assert!(window.contains(Utc.timestamp_opt(0, 0).unwrap()));
    }

    #[test]
    fn test_keyword_matching() {
        let filter = KeywordFilter::new(CollectionConfig::covid_keywords());
        assert!(filter.is_active());
        assert!(filter.matches("New MODERNA booster data"));
        assert!(!filter.matches("Weekly gardening thread"));

        let empty = KeywordFilter::new(Vec::<String>::new());
        assert!(!empty.is_active());
        assert!(empty.matches("anything at all"));
    }
}
