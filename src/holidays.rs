use chrono_tz::Tz;
use std::collections::BTreeSet;
use std::time::Duration;

use crate::calendar::{CalendarDate, MonthView};
use crate::config::Config;
use crate::error::Result;
use crate::fetch::{normalize_feed_url, Fetch};
use crate::ics;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HolidaySet(BTreeSet<CalendarDate>);

impl HolidaySet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn contains(&self, date: &CalendarDate) -> bool {
        self.0.contains(date)
    }

    pub fn extend(&mut self, other: HolidaySet) {
        self.0.extend(other.0);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::iter::FromIterator<CalendarDate> for HolidaySet {
    fn from_iter<I: IntoIterator<Item = CalendarDate>>(iter: I) -> Self {
        HolidaySet(iter.into_iter().collect())
    }
}

/// Something that knows the public holidays of given years.
pub trait HolidaySource {
    fn holidays(&self, years: &[i32]) -> Result<HolidaySet>;
}

/// Fixed list of dates from the config file.
pub struct ConfiguredHolidays {
    dates: Vec<CalendarDate>,
}

impl ConfiguredHolidays {
    pub fn new(dates: Vec<CalendarDate>) -> Self {
        ConfiguredHolidays { dates }
    }
}

impl HolidaySource for ConfiguredHolidays {
    fn holidays(&self, years: &[i32]) -> Result<HolidaySet> {
        Ok(self
            .dates
            .iter()
            .filter(|date| years.contains(&date.year()))
            .cloned()
            .collect())
    }
}

/// Public holiday ICS feed; every event start counts as a holiday. The feed
/// is downloaded once per query, whatever the number of years.
pub struct FeedHolidays<'f> {
    url: String,
    fetch: &'f dyn Fetch,
    timeout: Duration,
    tz: Tz,
}

impl<'f> FeedHolidays<'f> {
    pub fn new(url: &str, fetch: &'f dyn Fetch, timeout: Duration, tz: Tz) -> Self {
        FeedHolidays {
            url: normalize_feed_url(url),
            fetch,
            timeout,
            tz,
        }
    }
}

impl HolidaySource for FeedHolidays<'_> {
    fn holidays(&self, years: &[i32]) -> Result<HolidaySet> {
        let body = self.fetch.get(&self.url, &[], self.timeout)?;

        Ok(ics::parse_feed(&body, &self.tz)?
            .into_iter()
            .map(|event| event.date)
            .filter(|date| years.contains(&date.year()))
            .collect())
    }
}

/// Builds the holiday sources the config asks for.
pub fn sources_from_config<'f>(config: &Config, fetch: &'f dyn Fetch) -> Vec<Box<dyn HolidaySource + 'f>> {
    let mut sources: Vec<Box<dyn HolidaySource + 'f>> = Vec::new();

    let dates = config.holidays.parsed_dates();
    if !dates.is_empty() {
        sources.push(Box::new(ConfiguredHolidays::new(dates)));
    }

    if let Some(url) = config
        .holidays
        .feed_url
        .as_deref()
        .filter(|url| !url.trim().is_empty())
    {
        sources.push(Box::new(FeedHolidays::new(
            url,
            fetch,
            config.events_timeout(),
            config.timezone,
        )));
    }

    sources
}

/// Years whose holidays a grid needs: every year it shows, and always the
/// year after the displayed month.
pub fn years_in_view(view: &MonthView) -> Vec<i32> {
    let last = view.last().year().max(view.year() + 1);
    (view.first().year()..=last).collect()
}

/// Holidays of `years`, each source asked once. Failing sources contribute
/// nothing.
pub fn resolve(sources: &[Box<dyn HolidaySource + '_>], years: &[i32]) -> HolidaySet {
    let mut set = HolidaySet::empty();

    for source in sources.iter() {
        match source.holidays(years) {
            Ok(found) => set.extend(found),
            Err(err) => log::warn!("Holidays for {:?} unavailable: {}", years, err),
        }
    }

    log::debug!("{} holidays known for {:?}", set.len(), years);
    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, ErrorKind};
    use crate::fetch::testing::RecordingFetch;

    fn day(y: i32, m: u32, d: u32) -> CalendarDate {
        CalendarDate::from_ymd(y, m, d).unwrap()
    }

    struct Broken;

    impl HolidaySource for Broken {
        fn holidays(&self, _years: &[i32]) -> Result<HolidaySet> {
            Err(Error::new(ErrorKind::Fetch, "provider down"))
        }
    }

    #[test]
    fn next_year_is_included() {
        let sources: Vec<Box<dyn HolidaySource>> = vec![Box::new(ConfiguredHolidays::new(vec![
            day(2023, 12, 25),
            day(2024, 1, 1),
            day(2025, 1, 1),
        ]))];

        let view = MonthView::build(2023, 12).unwrap();
        let set = resolve(&sources, &years_in_view(&view));

        assert!(set.contains(&day(2023, 12, 25)));
        assert!(set.contains(&day(2024, 1, 1)));
        assert!(!set.contains(&day(2025, 1, 1)));
    }

    #[test]
    fn january_grid_includes_previous_december() {
        let view = MonthView::build(2024, 1).unwrap();
        assert_eq!(view.first(), day(2023, 12, 31));
        assert_eq!(years_in_view(&view), vec![2023, 2024, 2025]);

        let sources: Vec<Box<dyn HolidaySource>> = vec![Box::new(ConfiguredHolidays::new(vec![
            day(2023, 12, 31),
            day(2022, 12, 31),
        ]))];
        let set = resolve(&sources, &years_in_view(&view));

        assert!(set.contains(&day(2023, 12, 31)));
        assert!(!set.contains(&day(2022, 12, 31)));
    }

    #[test]
    fn mid_year_grid_covers_this_and_next_year() {
        let view = MonthView::build(2024, 6).unwrap();
        assert_eq!(years_in_view(&view), vec![2024, 2025]);
    }

    #[test]
    fn failing_source_is_tolerated() {
        let sources: Vec<Box<dyn HolidaySource>> = vec![
            Box::new(Broken),
            Box::new(ConfiguredHolidays::new(vec![day(2024, 3, 1)])),
        ];

        let set = resolve(&sources, &[2024, 2025]);
        assert_eq!(set.len(), 1);
        assert!(set.contains(&day(2024, 3, 1)));

        assert!(resolve(&[Box::new(Broken) as Box<dyn HolidaySource>], &[2024]).is_empty());
    }

    #[test]
    fn feed_is_downloaded_once_for_all_years() {
        let body = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
BEGIN:VEVENT\r\nDTSTART;VALUE=DATE:20240301\r\nSUMMARY:Independence Movement Day\r\nEND:VEVENT\r\n\
BEGIN:VEVENT\r\nDTSTART;VALUE=DATE:20250101\r\nSUMMARY:New Year\r\nEND:VEVENT\r\n\
BEGIN:VEVENT\r\nDTSTART;VALUE=DATE:20230101\r\nSUMMARY:New Year\r\nEND:VEVENT\r\n\
END:VCALENDAR\r\n";
        let fetch = RecordingFetch::default().with_body("https://h/ko.ics", body);

        let mut config = Config::default();
        config.holidays.feed_url = Some("webcal://h/ko.ics".to_owned());
        let sources = sources_from_config(&config, &fetch);
        let set = resolve(&sources, &[2024, 2025]);

        assert_eq!(set.len(), 2);
        assert!(set.contains(&day(2024, 3, 1)));
        assert!(set.contains(&day(2025, 1, 1)));
        assert_eq!(fetch.request_count(), 1);
    }

    #[test]
    fn unreachable_feed_is_tried_once() {
        let fetch = RecordingFetch::default();
        let mut config = Config::default();
        config.holidays.feed_url = Some("https://h/down.ics".to_owned());
        config.holidays.dates = vec!["2024-05-05".to_owned()];

        let sources = sources_from_config(&config, &fetch);
        let set = resolve(&sources, &[2024, 2025]);

        assert_eq!(fetch.request_count(), 1);
        assert_eq!(set.len(), 1);
        assert!(set.contains(&day(2024, 5, 5)));
    }

    #[test]
    fn no_configured_sources() {
        let fetch = RecordingFetch::default();
        assert!(sources_from_config(&Config::default(), &fetch).is_empty());
    }
}
