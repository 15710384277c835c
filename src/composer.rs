use chrono::{DateTime, Datelike};
use chrono_tz::Tz;

use crate::calendar::{CalendarDate, MonthView};
use crate::canvas::{save_png, Canvas, DrawOp, FontSet, IconSet, RasterCanvas};
use crate::config::{Config, LayoutConfig, Palette, Rgb};
use crate::error::Result;
use crate::events::{EventResolver, EventsByDate};
use crate::fetch::Fetch;
use crate::holidays::{self, HolidaySet};
use crate::layout::{center, Anchor, Geometry, Rect};
use crate::text::{fit, FontRole, TextMeasure};
use crate::weather::{ForecastPair, WeatherResolver};

const WEEKDAY_LETTERS: [&str; 7] = ["S", "M", "T", "W", "T", "F", "S"];
const BULLET: &str = "• ";

/// Everything one poster is computed from. Built fresh per render.
#[derive(Debug, Clone, PartialEq)]
pub struct PosterInputs {
    pub now: DateTime<Tz>,
    pub view: MonthView,
    pub forecast: ForecastPair,
    pub events: EventsByDate,
    pub holidays: HolidaySet,
}

impl PosterInputs {
    pub fn today(&self) -> CalendarDate {
        CalendarDate::from(self.now.date_naive())
    }
}

/// Collects the month grid and every external source for `now`. Sources
/// that fail contribute their empty value.
pub fn gather(config: &Config, fetch: &dyn Fetch, now: DateTime<Tz>) -> Result<PosterInputs> {
    let now = now.with_timezone(&config.timezone);
    let view = MonthView::build(now.year(), now.month())?;

    let forecast = WeatherResolver::from_config(config).resolve(fetch, now);
    let events = EventResolver::from_config(config).resolve(fetch);
    let sources = holidays::sources_from_config(config, fetch);
    let holidays = holidays::resolve(&sources, &holidays::years_in_view(&view));

    Ok(PosterInputs {
        now,
        view,
        forecast,
        events,
        holidays,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Accent,
    Primary,
    Faded,
}

/// Classification of one grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayFlags {
    pub in_month: bool,
    pub sunday: bool,
    pub weekend: bool,
    pub holiday: bool,
    pub today: bool,
}

impl DayFlags {
    pub fn of(date: &CalendarDate, view: &MonthView, holidays: &HolidaySet, today: &CalendarDate) -> Self {
        DayFlags {
            in_month: view.contains_month(date),
            sunday: date.is_sunday(),
            weekend: date.is_weekend(),
            holiday: holidays.contains(date),
            today: date == today,
        }
    }

    /// Holidays and Sundays win over month membership.
    pub fn tone(&self) -> Tone {
        if self.holiday || self.sunday {
            Tone::Accent
        } else if self.in_month {
            Tone::Primary
        } else {
            Tone::Faded
        }
    }
}

fn tone_color(palette: &Palette, tone: Tone) -> Rgb {
    match tone {
        Tone::Accent => palette.accent,
        Tone::Primary => palette.text,
        Tone::Faded => palette.faded,
    }
}

fn px(v: f32) -> i32 {
    v.round() as i32
}

fn span(v: f32) -> u32 {
    v.round().max(0.0) as u32
}

/// Turns [`PosterInputs`] into an ordered list of draw instructions.
pub struct Composer<'a, M: TextMeasure + ?Sized> {
    palette: &'a Palette,
    measure: &'a M,
    geometry: Geometry,
}

impl<'a, M: TextMeasure + ?Sized> Composer<'a, M> {
    const TODAY_RADIUS_RATIO: f32 = 0.38;
    const CELL_PADDING: f32 = 6.0;
    const EVENT_GAP: f32 = 8.0;
    const EVENT_INSET: f32 = 4.0;
    const EVENT_LINE_SPACING: f32 = 1.15;
    const UNDERLINE_HEIGHT: f32 = 3.0;
    const LABEL_GAP: f32 = 4.0;

    pub fn new(layout: &LayoutConfig, palette: &'a Palette, measure: &'a M) -> Self {
        Composer {
            palette,
            measure,
            geometry: Geometry::compute(layout),
        }
    }

    pub fn compose(&self, inputs: &PosterInputs) -> Vec<DrawOp> {
        let mut ops = vec![DrawOp::Fill {
            color: self.palette.background,
        }];

        self.header(inputs, &mut ops);
        self.weather_strip(&inputs.forecast, &mut ops);
        self.weekday_row(&mut ops);

        let today = inputs.today();
        let cells: Vec<(Rect, CalendarDate, DayFlags)> = inputs
            .view
            .cells()
            .map(|(row, col, date)| {
                (
                    self.geometry.cell_rect(row, col),
                    date,
                    DayFlags::of(&date, &inputs.view, &inputs.holidays, &today),
                )
            })
            .collect();
        assert_eq!(cells.len(), MonthView::CELLS);

        for (rect, date, flags) in cells.iter() {
            let has_events = !inputs.events.on(date).is_empty();
            self.date_cell(rect, date, flags, has_events, &mut ops);
        }

        for (rect, date, flags) in cells.iter() {
            self.event_lines(rect, inputs.events.on(date), flags, &mut ops);
        }

        ops
    }

    fn header(&self, inputs: &PosterInputs, ops: &mut Vec<DrawOp>) {
        let (x, y) = self.geometry.anchor(Anchor::MonthNumeral);
        ops.push(DrawOp::Text {
            x: px(x),
            y: px(y),
            role: FontRole::Month,
            text: inputs.view.month().to_string(),
            color: self.palette.text,
        });

        let word = inputs.now.format("%A").to_string().to_uppercase();
        let width = self.measure.text_width(FontRole::Label, &word);
        let (right, y) = self.geometry.anchor(Anchor::WeekdayWord);
        ops.push(DrawOp::Text {
            x: px(right - width),
            y: px(y),
            role: FontRole::Label,
            text: word,
            color: self.palette.faded,
        });
    }

    fn weather_strip(&self, forecast: &ForecastPair, ops: &mut Vec<DrawOp>) {
        let size = self.geometry.icon_size();
        let gap = size / 4.0;
        let (right, top) = self.geometry.anchor(Anchor::WeatherStrip);
        let tomorrow_x = right - size;
        let today_x = tomorrow_x - gap - size;

        for (kind, x, label) in [
            (forecast.today, today_x, "TODAY"),
            (forecast.tomorrow, tomorrow_x, "TOMORROW"),
        ]
        .iter()
        {
            if kind.is_none() {
                continue;
            }

            ops.push(DrawOp::Icon {
                kind: *kind,
                x: px(*x),
                y: px(top),
                size: span(size),
            });

            let width = self.measure.text_width(FontRole::Label, label);
            ops.push(DrawOp::Text {
                x: px(x + center(size, width)),
                y: px(top + size + Self::LABEL_GAP),
                role: FontRole::Label,
                text: label.to_string(),
                color: self.palette.text,
            });
        }
    }

    fn weekday_row(&self, ops: &mut Vec<DrawOp>) {
        let (_, y) = self.geometry.anchor(Anchor::WeekdayRow);

        for (col, letter) in WEEKDAY_LETTERS.iter().enumerate() {
            let cell = self.geometry.cell_rect(0, col);
            let width = self.measure.text_width(FontRole::Label, letter);
            let color = if col == 0 || col == MonthView::COLUMNS - 1 {
                self.palette.accent
            } else {
                self.palette.text
            };

            ops.push(DrawOp::Text {
                x: px(cell.x + center(cell.width, width)),
                y: px(y),
                role: FontRole::Label,
                text: letter.to_string(),
                color,
            });
        }
    }

    /// Vertical center of the date digit and the today-marker radius.
    fn digit_placement(&self, rect: &Rect, has_events: bool) -> (f32, f32) {
        let date_height = self.measure.line_height(FontRole::Date);
        let full_radius = rect.width.min(rect.height) * Self::TODAY_RADIUS_RATIO;

        if has_events {
            let center_y = rect.y + Self::CELL_PADDING + date_height / 2.0;
            let radius = full_radius.min(date_height / 2.0 + Self::CELL_PADDING);
            (center_y, radius)
        } else {
            (rect.center_y(), full_radius)
        }
    }

    fn date_cell(
        &self,
        rect: &Rect,
        date: &CalendarDate,
        flags: &DayFlags,
        has_events: bool,
        ops: &mut Vec<DrawOp>,
    ) {
        let digits = date.day().to_string();
        let width = self.measure.text_width(FontRole::Date, &digits);
        let date_height = self.measure.line_height(FontRole::Date);
        let (center_y, radius) = self.digit_placement(rect, has_events);
        let x = rect.x + center(rect.width, width);
        let y = center_y - date_height / 2.0;

        let color = if flags.today {
            let cx = rect.center_x();
            ops.push(DrawOp::Ellipse {
                x: px(cx - radius),
                y: px(center_y - radius),
                width: span(2.0 * radius),
                height: span(2.0 * radius),
                color: self.palette.accent,
            });
            ops.push(DrawOp::Rect {
                x: px(cx - radius / 2.0),
                y: px(center_y + radius + 2.0),
                width: span(radius),
                height: span(Self::UNDERLINE_HEIGHT),
                color: self.palette.accent,
            });
            self.palette.inverted
        } else {
            tone_color(self.palette, flags.tone())
        };

        ops.push(DrawOp::Text {
            x: px(x),
            y: px(y),
            role: FontRole::Date,
            text: digits,
            color,
        });
    }

    fn event_lines(&self, rect: &Rect, titles: &[String], flags: &DayFlags, ops: &mut Vec<DrawOp>) {
        if titles.is_empty() {
            return;
        }

        let (center_y, radius) = self.digit_placement(rect, true);
        let line_height = self.measure.line_height(FontRole::Event) * Self::EVENT_LINE_SPACING;
        let max_width = rect.width - 2.0 * Self::EVENT_INSET;
        let color = if flags.in_month {
            self.palette.text
        } else {
            self.palette.faded
        };

        let mut y = center_y + radius + Self::EVENT_GAP;
        for title in titles.iter() {
            let line = fit(
                &format!("{}{}", BULLET, title),
                FontRole::Event,
                max_width,
                self.measure,
            );
            ops.push(DrawOp::Text {
                x: px(rect.x + Self::EVENT_INSET),
                y: px(y),
                role: FontRole::Event,
                text: line,
                color,
            });
            y += line_height;
        }
    }
}

/// Replays instructions onto a canvas in order.
pub fn paint<C: Canvas + ?Sized>(ops: &[DrawOp], canvas: &mut C) {
    for op in ops.iter() {
        op.apply(canvas);
    }
}

/// Full pipeline: fonts and icons, external data, composition, PNG output.
pub fn render(config: &Config, fetch: &dyn Fetch, now: DateTime<Tz>) -> Result<()> {
    let fonts = FontSet::load(&config.font, &config.layout)?;
    let icons = IconSet::load(&config.icon_dir);

    let inputs = gather(config, fetch, now)?;
    log::info!(
        "Composing {:04}-{:02} (today {}): {} event days, {} holidays",
        inputs.view.year(),
        inputs.view.month(),
        inputs.today(),
        inputs.events.len(),
        inputs.holidays.len()
    );

    let ops = Composer::new(&config.layout, &config.palette, &fonts).compose(&inputs);

    let mut canvas = RasterCanvas::new(config.layout.width, config.layout.height, &fonts, &icons);
    paint(&ops, &mut canvas);

    save_png(canvas.image(), &config.output)
}
