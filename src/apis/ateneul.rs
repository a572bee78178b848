use anyhow::{Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};

use crate::apis::base::{absolute_url, datetime, element_text, english_month, joined_text, selector};
use crate::common::constants::{ATENEUL_BASE_URL, ATENEUL_QUALIFIED, ATENEUL_URL};
use crate::common::types::{Category, Event, ScraperUnit};
use crate::gateway::{FetchGateway, FetchMode, ScrollSpec};

const EVENT_LINK_SELECTOR: &str = r#"a[href*="/hub/event/"]"#;
const MAX_SCROLLS: u32 = 50;

static DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\w+)\s+(\d{1,2}),\s*(\d{4}),\s*(\d{1,2}):(\d{2})")
        .expect("Invalid Ateneul date regex")
});
static PRICE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:From\s+)?(\d+)\s*lei").expect("Invalid Ateneul price regex"));

/// Romanian Athenaeum listings on the Oveit hub, loaded by infinite scroll.
pub struct AteneulScraper {
    gateway: Arc<FetchGateway>,
    url: String,
    timeout: Duration,
}

impl AteneulScraper {
    pub fn new(gateway: Arc<FetchGateway>, timeout: Duration) -> Self {
        Self {
            gateway,
            url: ATENEUL_URL.to_string(),
            timeout,
        }
    }
}

/// Dates like `Jan 21, 2026, 19:00 - 21:00`
pub fn parse_date(text: &str) -> Option<chrono::NaiveDateTime> {
    let caps = DATE_RE.captures(text)?;
    // Only exact three-letter abbreviations, as the hub prints them
    if caps[1].len() != 3 {
        return None;
    }
    let month = english_month(&caps[1])?;
    let day: u32 = caps[2].parse().ok()?;
    let year: i32 = caps[3].parse().ok()?;
    let hour: u32 = caps[4].parse().ok()?;
    let minute: u32 = caps[5].parse().ok()?;
    datetime(year, month, day, hour, minute)
}

pub fn parse_price(text: &str) -> Option<String> {
    let caps = PRICE_RE.captures(text)?;
    let amount = &caps[1];
    if text.contains("From") || text.contains("from") {
        Some(format!("de la {amount} lei"))
    } else {
        Some(format!("{amount} lei"))
    }
}

pub fn parse_venue(text: &str) -> &'static str {
    let lower = text.to_lowercase();
    if lower.contains("sala mare") {
        "Ateneul Român - Sala Mare"
    } else if lower.contains("sala mica") {
        "Ateneul Român - Sala Mică"
    } else {
        "Ateneul Român"
    }
}

/// Nearest `div` ancestors of a link, innermost first
fn div_ancestors<'a>(link: &ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    link.ancestors()
        .filter_map(ElementRef::wrap)
        .filter(|e| e.value().name() == "div")
}

pub fn parse_events(html: &str) -> Result<Vec<Event>> {
    let document = Html::parse_document(html);
    let link_sel = selector(EVENT_LINK_SELECTOR)?;

    let mut seen_urls = HashSet::new();
    let mut events = Vec::new();
    for link in document.select(&link_sel) {
        let url = absolute_url(ATENEUL_BASE_URL, link.value().attr("href").unwrap_or(""));
        if seen_urls.contains(&url) {
            continue;
        }

        let title = element_text(&link);
        if title.is_empty() || title == "Buy now" {
            continue;
        }

        let mut divs = div_ancestors(&link);
        if divs.next().is_none() {
            continue;
        }
        let text = divs
            .next()
            .map(|grandparent| joined_text(&grandparent, " | "))
            .unwrap_or_default();

        let Some(date) = parse_date(&text) else {
            continue;
        };

        seen_urls.insert(url.clone());
        events.push(Event {
            title,
            artist: None,
            venue: parse_venue(&text).to_string(),
            date,
            url,
            source: "Ateneul Român".to_string(),
            category: Category::Music,
            price: parse_price(&text),
        });
    }

    events.sort_by_key(|e| e.date);
    Ok(events)
}

#[async_trait]
impl ScraperUnit for AteneulScraper {
    fn name(&self) -> &str {
        ATENEUL_QUALIFIED
    }

    fn category(&self) -> Category {
        Category::Music
    }

    #[instrument(skip(self))]
    async fn scrape(&self) -> Result<Vec<Event>> {
        let scroll = ScrollSpec {
            max_scrolls: MAX_SCROLLS,
            convergence_selector: Some(EVENT_LINK_SELECTOR.to_string()),
        };
        let html = self
            .gateway
            .fetch_page(&self.url, FetchMode::Rendered, self.timeout, None, Some(scroll))
            .await
            .context("Failed to fetch Ateneul Român events")?;
        let events = parse_events(&html)?;
        info!("Parsed {} events from Ateneul Român", events.len());
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"
        <html><body>
          <div class="card">
            <div class="body">
              <a href="/hub/event/recital-xyz">Recital de pian</a>
            </div>
            <span>Feb 3, 2026, 19:00 - 21:00</span>
            <span>Ateneul Roman / sala mica</span>
            <span>60 lei</span>
          </div>
          <div class="card">
            <div class="body">
              <a href="/hub/event/gala">Gala Simfonica</a>
              <a href="/hub/event/gala">Buy now</a>
            </div>
            <span>Jan 21, 2026, 19:00</span>
            <span>Ateneul Roman / sala mare</span>
            <span>From 80 lei</span>
          </div>
          <div class="card">
            <div class="body"><a href="/hub/event/undated">Undated</a></div>
            <span>TBA</span>
          </div>
        </body></html>
    "#;

    #[test]
    fn test_parse_events() {
        let events = parse_events(FIXTURE).unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].title, "Gala Simfonica");
        assert_eq!(events[0].venue, "Ateneul Român - Sala Mare");
        assert_eq!(events[0].price.as_deref(), Some("de la 80 lei"));
        assert_eq!(events[0].url, "https://oveit.com/hub/event/gala");
        assert_eq!(events[1].venue, "Ateneul Român - Sala Mică");
        assert_eq!(events[1].price.as_deref(), Some("60 lei"));
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("Jan 21, 2026, 19:00 - 21:00").map(|d| d.to_string()),
            Some("2026-01-21 19:00:00".to_string())
        );
        assert!(parse_date("January 21, 2026, 19:00").is_none());
    }
}
