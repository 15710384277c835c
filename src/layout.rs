use crate::calendar::MonthView;
use crate::config::LayoutConfig;

/// Axis-aligned rectangle in canvas pixels. Fractional on purpose; rounding
/// only happens when a draw instruction is emitted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Rect {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center_x(&self) -> f32 {
        self.x + self.width / 2.0
    }

    pub fn center_y(&self) -> f32 {
        self.y + self.height / 2.0
    }

    pub fn contains(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }
}

/// Offset that centers `content` inside `container`.
pub fn center(container: f32, content: f32) -> f32 {
    (container - content) / 2.0
}

/// Named points outside the date grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// Top-left of the large month numeral.
    MonthNumeral,
    /// Top-right of the weekday word; text is right-aligned to it.
    WeekdayWord,
    /// Top of the weekday letter row.
    WeekdayRow,
    /// Top-right corner of the weather strip.
    WeatherStrip,
}

/// Pixel geometry of one poster, derived once from the layout config.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    grid: Rect,
    cell_width: f32,
    cell_height: f32,
    top_margin: f32,
    icon_size: f32,
}

impl Geometry {
    const WEEKDAY_ROW_OFFSET: f32 = 70.0;
    const MONTH_NUMERAL_RAISE: f32 = 10.0;

    pub fn compute(config: &LayoutConfig) -> Self {
        let canvas = Rect::new(0.0, 0.0, config.width as f32, config.height as f32);
        let side = config.side_margin as f32;
        let grid_top = config.grid_top() as f32;
        let grid = Rect::new(
            side,
            grid_top,
            canvas.width - 2.0 * side,
            config.grid_bottom() as f32 - grid_top,
        );

        let cell_width = grid.width / MonthView::COLUMNS as f32;
        let cell_height = grid.height / MonthView::ROWS as f32;

        assert!(
            cell_width > 0.0 && cell_height > 0.0,
            "cell size must be positive"
        );
        assert!(canvas.contains(&grid), "grid must lie within the canvas");

        Geometry {
            grid,
            cell_width,
            cell_height,
            top_margin: config.top_margin as f32,
            icon_size: config.icon_size as f32,
        }
    }

    pub fn grid(&self) -> Rect {
        self.grid
    }

    pub fn cell_width(&self) -> f32 {
        self.cell_width
    }

    pub fn cell_height(&self) -> f32 {
        self.cell_height
    }

    pub fn icon_size(&self) -> f32 {
        self.icon_size
    }

    pub fn cell_rect(&self, row: usize, col: usize) -> Rect {
        debug_assert!(row < MonthView::ROWS && col < MonthView::COLUMNS);
        Rect::new(
            self.grid.x + col as f32 * self.cell_width,
            self.grid.y + row as f32 * self.cell_height,
            self.cell_width,
            self.cell_height,
        )
    }

    pub fn anchor(&self, anchor: Anchor) -> (f32, f32) {
        match anchor {
            Anchor::MonthNumeral => (self.grid.x, self.top_margin - Self::MONTH_NUMERAL_RAISE),
            Anchor::WeekdayWord => (
                self.grid.right(),
                self.top_margin + self.icon_size + Self::WEEKDAY_ROW_OFFSET,
            ),
            Anchor::WeekdayRow => (self.grid.x, self.grid.y - Self::WEEKDAY_ROW_OFFSET),
            Anchor::WeatherStrip => (self.grid.right(), self.top_margin),
        }
    }
}
