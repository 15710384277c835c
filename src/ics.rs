use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use ical::parser::ical::component::IcalEvent;
use ical::parser::ical::IcalParser;
use ical::property::Property;
use std::convert::TryFrom;
use std::io::BufReader;

use crate::calendar::CalendarDate;
use crate::error::{Error, ErrorKind, Result};

const ISO8601_2004_LOCAL_FORMAT: &str = "%Y%m%dT%H%M%S";
const ISO8601_2004_LOCAL_FORMAT_DATE: &str = "%Y%m%d";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IcalDateTime {
    Date(NaiveDate),
    Floating(NaiveDateTime),
    Utc(DateTime<Utc>),
    Local(DateTime<Tz>),
}

fn param<'a>(property: &'a Property, name: &str) -> Option<&'a str> {
    property
        .params
        .as_ref()?
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .and_then(|(_, values)| values.first())
        .map(String::as_str)
}

impl TryFrom<&Property> for IcalDateTime {
    type Error = Error;

    fn try_from(value: &Property) -> Result<Self> {
        let val = value
            .value
            .as_deref()
            .map(str::trim)
            .ok_or_else(|| Error::from(ErrorKind::DateParse).with_msg("Missing datetime value"))?;

        if param(value, "VALUE").map_or(false, |v| v.eq_ignore_ascii_case("DATE")) {
            return Ok(Self::Date(NaiveDate::parse_from_str(
                val,
                ISO8601_2004_LOCAL_FORMAT_DATE,
            )?));
        }

        let tz = param(value, "TZID").and_then(|id| match id.parse::<Tz>() {
            Ok(tz) => Some(tz),
            Err(_) => {
                log::debug!("Unknown TZID '{}', treating time as floating", id);
                None
            }
        });

        let (local, is_utc) = match val.strip_suffix('Z').or_else(|| val.strip_suffix('z')) {
            Some(stripped) => (stripped, true),
            None => (val, false),
        };

        if let Ok(dt) = NaiveDateTime::parse_from_str(local, ISO8601_2004_LOCAL_FORMAT) {
            if is_utc {
                Ok(Self::Utc(Utc.from_utc_datetime(&dt)))
            } else if let Some(tz) = tz {
                Ok(Self::Local(localize(&tz, &dt)))
            } else {
                Ok(Self::Floating(dt))
            }
        } else {
            let date = NaiveDate::parse_from_str(val, ISO8601_2004_LOCAL_FORMAT_DATE)?;
            Ok(Self::Date(date))
        }
    }
}

/// Maps a wall-clock time of `tz` to an instant. Ambiguous times take the
/// earlier instant; times skipped by a forward transition are read with the
/// offset in force before the gap (RFC 5545, 3.3.5).
fn localize(tz: &Tz, dt: &NaiveDateTime) -> DateTime<Tz> {
    match tz.from_local_datetime(dt) {
        LocalResult::Single(local) => local,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => {
            let before = tz.offset_from_utc_datetime(&(*dt - Duration::days(1))).fix();
            let utc = *dt - Duration::seconds(i64::from(before.local_minus_utc()));
            tz.from_utc_datetime(&utc)
        }
    }
}

impl IcalDateTime {
    /// Calendar date as seen in `tz`. Dates and floating times are already
    /// local and are taken as-is.
    pub fn as_date(&self, tz: &Tz) -> NaiveDate {
        match self {
            IcalDateTime::Date(date) => *date,
            IcalDateTime::Floating(dt) => dt.date(),
            IcalDateTime::Utc(dt) => dt.with_timezone(tz).date_naive(),
            IcalDateTime::Local(dt) => dt.with_timezone(tz).date_naive(),
        }
    }
}

/// Undoes RFC 5545 TEXT escaping.
pub fn unescape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push(' '),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }

    out
}

/// The parts of a VEVENT the poster cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEvent {
    pub date: CalendarDate,
    pub summary: String,
}

fn event_property<'a>(event: &'a IcalEvent, name: &str) -> Option<&'a Property> {
    event
        .properties
        .iter()
        .find(|p| p.name.eq_ignore_ascii_case(name))
}

fn feed_event(event: &IcalEvent, tz: &Tz) -> Result<FeedEvent> {
    let start = event_property(event, "DTSTART")
        .ok_or_else(|| Error::new(ErrorKind::FeedParse, "VEVENT without DTSTART"))?;
    let date = IcalDateTime::try_from(start)?.as_date(tz);

    let summary = event_property(event, "SUMMARY")
        .and_then(|p| p.value.as_deref())
        .map(|s| unescape_text(s).trim().to_owned())
        .unwrap_or_default();

    if summary.is_empty() {
        return Err(Error::new(ErrorKind::FeedParse, "VEVENT without SUMMARY"));
    }

    Ok(FeedEvent {
        date: CalendarDate::from(date),
        summary,
    })
}

/// Extracts every usable VEVENT of an ICS document in feed order. Events
/// lacking a start or a summary are skipped; a document that cannot be parsed
/// at all is an error.
pub fn parse_feed(body: &str, tz: &Tz) -> Result<Vec<FeedEvent>> {
    let parser = IcalParser::new(BufReader::new(body.as_bytes()));
    let mut events = Vec::new();
    let mut calendars = 0;

    for calendar in parser {
        let calendar = calendar?;
        calendars += 1;

        for event in calendar.events.iter() {
            match feed_event(event, tz) {
                Ok(parsed) => events.push(parsed),
                Err(err) => log::debug!("Skipping event: {}", err),
            }
        }
    }

    if calendars == 0 {
        return Err(Error::new(ErrorKind::FeedParse, "no VCALENDAR found"));
    }

    Ok(events)
}
