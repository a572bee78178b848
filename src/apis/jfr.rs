use anyhow::{Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::apis::base::{absolute_url, datetime, element_text, english_month, selector};
use crate::common::constants::{JFR_BASE_URL, JFR_QUALIFIED, JFR_URL};
use crate::common::types::{Category, Event, ScraperUnit};
use crate::gateway::{FetchGateway, FetchMode};

const CITY: &str = "București";

static DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{1,2})\s+(\w+)\s+(\d{4})\s*(\d{1,2}):(\d{2})").expect("Invalid JFR date regex")
});
static VENUE_SUFFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s*-\s*la\s+Jazz\s+Fan\s+Rising.*").expect("Invalid JFR suffix regex")
});
static CAPS_ARTIST_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Z\s&]+(?:\([^)]+\))?)").expect("Invalid JFR artist regex"));

/// Jazz Fan Rising concerts listed on Eventbook. Plain server-rendered HTML.
pub struct JfrScraper {
    gateway: Arc<FetchGateway>,
    url: String,
    timeout: Duration,
}

impl JfrScraper {
    pub fn new(gateway: Arc<FetchGateway>, timeout: Duration) -> Self {
        Self {
            gateway,
            url: JFR_URL.to_string(),
            timeout,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

/// Parse dates like `22 Jan 2026  19:00`, also with the time glued to the year.
pub fn parse_date(text: &str) -> Option<chrono::NaiveDateTime> {
    let caps = DATE_RE.captures(text)?;
    let day: u32 = caps[1].parse().ok()?;
    let month = english_month(&caps[2])?;
    let year: i32 = caps[3].parse().ok()?;
    let hour: u32 = caps[4].parse().ok()?;
    let minute: u32 = caps[5].parse().ok()?;
    datetime(year, month, day, hour, minute)
}

pub fn extract_artist(title: &str) -> String {
    let clean = VENUE_SUFFIX_RE.replace(title, "");
    for sep in [" - ", " – ", ": ", " la "] {
        if let Some((artist, _)) = clean.split_once(sep) {
            return artist.trim().to_string();
        }
    }
    if let Some(m) = CAPS_ARTIST_RE.captures(&clean).and_then(|c| c.get(1)) {
        let artist = m.as_str().trim();
        if !artist.is_empty() {
            return artist.to_string();
        }
    }
    clean.trim().to_string()
}

pub fn parse_events(html: &str) -> Result<Vec<Event>> {
    let document = Html::parse_document(html);
    let card_sel = selector(".shadow.border.mb-4")?;
    let city_sel = selector(r#"a[href*="/city/"]"#)?;
    let title_sel = selector("a.event-title")?;
    let venue_sel = selector(r#"a[href*="/hall/"]"#)?;
    let date_sel = selector("h5.m-0")?;
    let date_fallback_sel = selector("h4")?;

    let mut events = Vec::new();
    for card in document.select(&card_sel) {
        let city = card.select(&city_sel).next().map(|c| element_text(&c));
        if city.as_deref() != Some(CITY) {
            continue;
        }

        let Some(title_link) = card.select(&title_sel).next() else {
            continue;
        };
        let title = element_text(&title_link);
        let url = absolute_url(JFR_BASE_URL, title_link.value().attr("href").unwrap_or(""));

        let venue = card
            .select(&venue_sel)
            .next()
            .map(|v| element_text(&v))
            .unwrap_or_else(|| "Unknown".to_string());

        let date_text = card
            .select(&date_sel)
            .next()
            .or_else(|| card.select(&date_fallback_sel).next())
            .map(|d| element_text(&d))
            .unwrap_or_default();
        let Some(date) = parse_date(&date_text) else {
            debug!("Skipping '{}': unparseable date '{}'", title, date_text);
            continue;
        };

        events.push(Event {
            artist: Some(extract_artist(&title)),
            title,
            venue,
            date,
            url,
            source: "jfr".to_string(),
            category: Category::Music,
            price: None,
        });
    }
    Ok(events)
}

#[async_trait]
impl ScraperUnit for JfrScraper {
    fn name(&self) -> &str {
        JFR_QUALIFIED
    }

    fn category(&self) -> Category {
        Category::Music
    }

    #[instrument(skip(self))]
    async fn scrape(&self) -> Result<Vec<Event>> {
        let html = self
            .gateway
            .fetch_page(&self.url, FetchMode::Static, self.timeout, None, None)
            .await
            .context("Failed to fetch Jazz Fan Rising program")?;
        let events = parse_events(&html)?;
        info!("Parsed {} events from Jazz Fan Rising", events.len());
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"
        <html><body>
          <div class="shadow border mb-4">
            <a class="event-title" href="/event/ahmad-jamal-tribute">AHMAD JAMAL TRIBUTE - la Jazz Fan Rising</a>
            <a href="/city/bucuresti">București</a>
            <a href="/hall/control-club">Control Club</a>
            <h5 class="m-0">22 Jan 202619:00</h5>
          </div>
          <div class="shadow border mb-4">
            <a class="event-title" href="/event/cluj-show">Trio X: Live</a>
            <a href="/city/cluj">Cluj-Napoca</a>
            <h5 class="m-0">23 Jan 2026 20:00</h5>
          </div>
          <div class="shadow border mb-4">
            <a class="event-title" href="https://eventbook.ro/event/no-date">No Date</a>
            <a href="/city/bucuresti">București</a>
          </div>
        </body></html>
    "#;

    #[test]
    fn test_parse_date_formats() {
        let dt = parse_date("22 Jan 2026  19:00").unwrap();
        assert_eq!(dt.to_string(), "2026-01-22 19:00:00");
        assert_eq!(parse_date("22 Jan 202619:00"), Some(dt));
        assert!(parse_date("sometime soon").is_none());
    }

    #[test]
    fn test_extract_artist() {
        assert_eq!(extract_artist("Trio X: Live"), "Trio X");
        assert_eq!(
            extract_artist("AHMAD JAMAL TRIBUTE - la Jazz Fan Rising"),
            "AHMAD JAMAL TRIBUTE"
        );
    }

    #[test]
    fn test_parse_events_keeps_only_bucharest_with_dates() {
        let events = parse_events(FIXTURE).unwrap();

        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.venue, "Control Club");
        assert_eq!(event.url, "https://eventbook.ro/event/ahmad-jamal-tribute");
        assert_eq!(event.artist.as_deref(), Some("AHMAD JAMAL TRIBUTE"));
        assert_eq!(event.category, Category::Music);
    }
}
