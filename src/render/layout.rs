//! Fixed pixel layout for the contribution chart.
//!
//! One set of constants is shared by the single-frame preview and the
//! per-frame video path, so both outputs are pixel-consistent. Everything
//! here is logical (CSS-equivalent) geometry; device scaling happens once,
//! as a transform, in the renderer.

use chrono::Datelike;
use kurbo::{Point, Rect};

use crate::contrib::model::{ContributionDataset, GRID_WEEKS};
use crate::foundation::core::Canvas;

/// Side length of one day cell.
pub const CELL_SIZE: f64 = 12.0;
/// Gap between adjacent cells.
pub const CELL_GAP: f64 = 4.0;
/// Corner radius of a day cell.
pub const CELL_RADIUS: f64 = 3.0;
/// Height of the month-label gutter above the grid.
pub const MONTH_LABEL_HEIGHT: f64 = 24.0;
/// Width of the weekday-label gutter left of the grid.
pub const DAY_LABEL_WIDTH: f64 = 36.0;
/// Height of the legend strip below the grid.
pub const LEGEND_HEIGHT: f64 = 36.0;
/// Outer padding on all sides.
pub const PADDING: f64 = 24.0;
/// Height of the header line (count + username).
pub const HEADER_HEIGHT: f64 = 28.0;

/// Minimum horizontal distance between two drawn month labels; a label that
/// would land closer than this to the previous one is suppressed.
pub const MONTH_LABEL_MIN_SPACING: f64 = 28.0;

/// Header count line font size.
pub const HEADER_FONT_SIZE: f32 = 14.0;
/// Username font size.
pub const USERNAME_FONT_SIZE: f32 = 13.0;
/// Month / weekday label font size.
pub const LABEL_FONT_SIZE: f32 = 12.0;
/// Legend text font size.
pub const LEGEND_FONT_SIZE: f32 = 11.0;

/// Legend swatch side length.
pub const LEGEND_SWATCH_SIZE: f64 = 10.0;
/// Gap between legend swatches.
pub const LEGEND_SWATCH_GAP: f64 = 3.0;

const CELL_STEP: f64 = CELL_SIZE + CELL_GAP;

/// Month abbreviations, indexed by `month0`.
pub const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Weekday abbreviations, indexed from Sunday.
pub const DAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// Grid rows that get a weekday label (Mon/Wed/Fri, GitHub-style sparse).
pub const LABELED_DAY_ROWS: [usize; 3] = [1, 3, 5];

/// Logical chart width.
pub fn logical_width() -> f64 {
    GRID_WEEKS as f64 * CELL_STEP + DAY_LABEL_WIDTH + PADDING * 2.0
}

/// Logical chart height.
pub fn logical_height() -> f64 {
    7.0 * CELL_STEP + HEADER_HEIGHT + MONTH_LABEL_HEIGHT + LEGEND_HEIGHT + PADDING * 2.0
}

/// Device surface size for a given pixel scale.
pub fn surface_size(pixel_scale: f64) -> Canvas {
    Canvas {
        width: (logical_width() * pixel_scale).round() as u32,
        height: (logical_height() * pixel_scale).round() as u32,
    }
}

/// Top-left corner of the day-cell grid.
pub fn grid_origin() -> Point {
    Point::new(
        PADDING + DAY_LABEL_WIDTH,
        PADDING + HEADER_HEIGHT + MONTH_LABEL_HEIGHT,
    )
}

/// Logical rectangle of the cell at `(week, day)`.
pub fn cell_rect(week: usize, day: usize) -> Rect {
    let origin = grid_origin();
    let x = origin.x + week as f64 * CELL_STEP;
    let y = origin.y + day as f64 * CELL_STEP;
    Rect::new(x, y, x + CELL_SIZE, y + CELL_SIZE)
}

/// Left edge (x) of the month label for a week column.
pub fn month_label_x(week: usize) -> f64 {
    grid_origin().x + week as f64 * CELL_STEP
}

/// Vertical center of a weekday label row.
pub fn day_label_center_y(row: usize) -> f64 {
    grid_origin().y + row as f64 * CELL_STEP + CELL_SIZE / 2.0
}

/// Vertical center of the legend strip.
pub fn legend_center_y() -> f64 {
    logical_height() - LEGEND_HEIGHT / 2.0 - 4.0
}

/// Left edge of the legend block ("Less" text anchor).
pub fn legend_x() -> f64 {
    logical_width() - PADDING - 160.0
}

/// Logical rectangle of legend swatch `i` (0..5).
pub fn legend_swatch_rect(i: usize) -> Rect {
    let x = legend_x() + 30.0 + i as f64 * (LEGEND_SWATCH_SIZE + LEGEND_SWATCH_GAP);
    let y = legend_center_y() - LEGEND_SWATCH_SIZE / 2.0;
    Rect::new(x, y, x + LEGEND_SWATCH_SIZE, y + LEGEND_SWATCH_SIZE)
}

/// Which week columns get a month label, and which abbreviation.
///
/// A column is labeled when its lead day enters a new calendar month *and*
/// belongs to the dataset's target year, so boundary weeks of the prior year
/// never mislabel the grid. A candidate closer than
/// [`MONTH_LABEL_MIN_SPACING`] to the previously drawn label is suppressed.
pub fn month_label_columns(data: &ContributionDataset) -> Vec<(usize, &'static str)> {
    let mut out = Vec::new();
    let mut current_month: Option<u32> = None;
    let mut last_drawn_x: Option<f64> = None;

    for (week_idx, week) in data.weeks.iter().enumerate() {
        let Some(lead) = week.first() else { continue };
        if lead.date.year() != data.year {
            continue;
        }
        let month = lead.date.month();
        if current_month == Some(month) {
            continue;
        }
        current_month = Some(month);

        let x = month_label_x(week_idx);
        if let Some(prev) = last_drawn_x
            && x - prev < MONTH_LABEL_MIN_SPACING
        {
            continue;
        }
        last_drawn_x = Some(x);
        out.push((week_idx, MONTHS[month as usize - 1]));
    }

    out
}
