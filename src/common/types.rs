use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Event category; results are grouped by it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Music,
    Theatre,
    Culture,
}

impl Category {
    pub fn all() -> [Category; 3] {
        [Category::Music, Category::Theatre, Category::Culture]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Music => "music",
            Category::Theatre => "theatre",
            Category::Culture => "culture",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single listing produced by a scraper unit. The core only counts these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub title: String,
    pub artist: Option<String>,
    pub venue: String,
    pub date: NaiveDateTime,
    pub url: String,
    pub source: String,
    pub category: Category,
    pub price: Option<String>,
}

/// Core trait that all site-specific scrapers must implement.
///
/// Units reach the network only through the fetch gateway they were built with.
#[async_trait::async_trait]
pub trait ScraperUnit: Send + Sync {
    /// Qualified identifier, e.g. `scrapers.music.jfr`
    fn name(&self) -> &str;

    /// Category the produced events are filed under
    fn category(&self) -> Category;

    /// Fetch and parse all current events for this source
    async fn scrape(&self) -> anyhow::Result<Vec<Event>>;
}
