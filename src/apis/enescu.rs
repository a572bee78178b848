use anyhow::{Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};

use crate::apis::base::{absolute_url, datetime, element_text, selector};
use crate::common::constants::{ENESCU_BASE_URL, ENESCU_QUALIFIED, ENESCU_URL};
use crate::common::types::{Category, Event, ScraperUnit};
use crate::gateway::{ClickSpec, FetchGateway, FetchMode};

const LOAD_MORE_SELECTOR: &str = "button.inftabs-more";
const MAX_LOAD_MORE_CLICKS: u32 = 20;
const DEFAULT_VENUE: &str = "Festivalul George Enescu";

static TIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,2}):(\d{2})").expect("Invalid Enescu time regex"));
static LEADING_SYMBOLS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\w]+").expect("Invalid Enescu venue regex"));

/// George Enescu festival concerts. The list is paged behind a "load more" button.
pub struct EnescuScraper {
    gateway: Arc<FetchGateway>,
    url: String,
    timeout: Duration,
}

impl EnescuScraper {
    pub fn new(gateway: Arc<FetchGateway>, timeout: Duration) -> Self {
        Self {
            gateway,
            url: ENESCU_URL.to_string(),
            timeout,
        }
    }
}

fn romanian_month(name: &str) -> Option<u32> {
    let month = match name.to_lowercase().as_str() {
        "ianuarie" => 1,
        "februarie" => 2,
        "martie" => 3,
        "aprilie" => 4,
        "mai" => 5,
        "iunie" => 6,
        "iulie" => 7,
        "august" => 8,
        "septembrie" => 9,
        "octombrie" => 10,
        "noiembrie" => 11,
        "decembrie" => 12,
        _ => return None,
    };
    Some(month)
}

fn child_text(element: &ElementRef, css: &str) -> Result<Option<String>> {
    let sel = selector(css)?;
    Ok(element.select(&sel).next().map(|e| element_text(&e)))
}

/// Date from the `.concert-details` block; time defaults to 19:00.
fn parse_date(details: &ElementRef) -> Result<Option<chrono::NaiveDateTime>> {
    let (Some(day), Some(month), Some(year)) = (
        child_text(details, ".concert-day")?,
        child_text(details, ".concert-month")?,
        child_text(details, ".concert-year")?,
    ) else {
        return Ok(None);
    };

    let (Ok(day), Some(month), Ok(year)) = (
        day.parse::<u32>(),
        romanian_month(&month),
        year.parse::<i32>(),
    )
    else {
        return Ok(None);
    };

    let (mut hour, mut minute) = (19, 0);
    if let Some(caps) = child_text(details, ".concert-hour")?
        .as_deref()
        .and_then(|h| TIME_RE.captures(h))
    {
        hour = caps[1].parse().unwrap_or(hour);
        minute = caps[2].parse().unwrap_or(minute);
    }

    Ok(datetime(year, month, day, hour, minute))
}

fn parse_venue(details: &ElementRef) -> Result<String> {
    let venue = child_text(details, ".concert-location")?
        .map(|text| LEADING_SYMBOLS_RE.replace(&text, "").into_owned())
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| DEFAULT_VENUE.to_string());
    Ok(venue)
}

pub fn parse_events(html: &str) -> Result<Vec<Event>> {
    let document = Html::parse_document(html);
    let item_sel = selector(r#".item[itemprop="blogPost"]"#)?;
    let details_sel = selector(".concert-details")?;
    let preview_sel = selector(".concert-preview")?;
    let title_sel = selector("h2 a")?;

    let mut seen = HashSet::new();
    let mut events = Vec::new();
    for item in document.select(&item_sel) {
        let (Some(details), Some(preview)) = (
            item.select(&details_sel).next(),
            item.select(&preview_sel).next(),
        ) else {
            continue;
        };
        let Some(title_link) = preview.select(&title_sel).next() else {
            continue;
        };
        let Some(date) = parse_date(&details)? else {
            continue;
        };

        let title = element_text(&title_link);
        if !seen.insert((title.clone(), date)) {
            continue;
        }
        events.push(Event {
            url: absolute_url(ENESCU_BASE_URL, title_link.value().attr("href").unwrap_or("")),
            venue: parse_venue(&details)?,
            title,
            artist: None,
            date,
            source: "Festivalul Enescu".to_string(),
            category: Category::Music,
            price: None,
        });
    }

    events.sort_by_key(|e| e.date);
    Ok(events)
}

#[async_trait]
impl ScraperUnit for EnescuScraper {
    fn name(&self) -> &str {
        ENESCU_QUALIFIED
    }

    fn category(&self) -> Category {
        Category::Music
    }

    #[instrument(skip(self))]
    async fn scrape(&self) -> Result<Vec<Event>> {
        let click = ClickSpec {
            selector: LOAD_MORE_SELECTOR.to_string(),
            max_clicks: MAX_LOAD_MORE_CLICKS,
        };
        let html = self
            .gateway
            .fetch_page(&self.url, FetchMode::Rendered, self.timeout, Some(click), None)
            .await
            .context("Failed to fetch Festivalul Enescu events")?;
        let events = parse_events(&html)?;
        info!("Parsed {} events from Festivalul Enescu", events.len());
        Ok(events)
    }
}
