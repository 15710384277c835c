use chrono_tz::Tz;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::calendar::CalendarDate;
use crate::config::Config;
use crate::error::Result;
use crate::fetch::{normalize_feed_url, Fetch};
use crate::ics::{self, FeedEvent};

/// Event titles per day, in feed order, at most `cap` per day.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventsByDate {
    days: BTreeMap<CalendarDate, Vec<String>>,
}

impl EventsByDate {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_events<I: IntoIterator<Item = FeedEvent>>(events: I, cap: usize) -> Self {
        let mut days: BTreeMap<CalendarDate, Vec<String>> = BTreeMap::new();

        for event in events {
            let entries = days.entry(event.date).or_default();
            if entries.len() < cap {
                entries.push(event.summary);
            }
        }

        days.retain(|_, entries| !entries.is_empty());
        EventsByDate { days }
    }

    pub fn on(&self, date: &CalendarDate) -> &[String] {
        self.days.get(date).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }
}

pub struct EventResolver {
    feed_url: Option<String>,
    max_per_day: usize,
    timeout: Duration,
    tz: Tz,
}

impl EventResolver {
    pub fn from_config(config: &Config) -> Self {
        EventResolver {
            feed_url: config.events.feed_url.clone(),
            max_per_day: config.events.max_per_day,
            timeout: config.events_timeout(),
            tz: config.timezone,
        }
    }

    /// Downloads and groups the configured feed. Any failure degrades to no
    /// events at all.
    pub fn resolve(&self, fetch: &dyn Fetch) -> EventsByDate {
        let url = match self.feed_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => normalize_feed_url(url),
            _ => {
                log::info!("No event feed configured");
                return EventsByDate::empty();
            }
        };

        match self.fetch_events(fetch, &url) {
            Ok(events) => {
                log::debug!("Loaded events for {} days", events.len());
                events
            }
            Err(err) => {
                log::warn!("Events unavailable: {}", err);
                EventsByDate::empty()
            }
        }
    }

    fn fetch_events(&self, fetch: &dyn Fetch, url: &str) -> Result<EventsByDate> {
        let body = fetch.get(url, &[], self.timeout)?;
        let events = ics::parse_feed(&body, &self.tz)?;

        Ok(EventsByDate::from_events(events, self.max_per_day))
    }
}
