use chrono::Datelike;
use kurbo::{Affine, Rect, Shape, Vec2};

use crate::contrib::model::{ContributionDataset, Level};
use crate::foundation::error::{GitlapseError, GitlapseResult};
use crate::foundation::math::format_thousands;
use crate::render::FrameRGBA;
use crate::render::layout;
use crate::render::text::{FontSource, TextBrushRgba8, TextLayoutEngine};
use crate::theme::{Color, Theme};

/// Per-render options.
#[derive(Clone, Copy, Debug)]
pub struct RenderOpts {
    /// Render only the first N day cells chronologically; later cells are
    /// forced blank. `None` renders the full chart.
    pub reveal: Option<u64>,
    /// Device pixels per logical pixel, `>= 1`. The layout is unchanged;
    /// only the transform scales.
    pub pixel_scale: f64,
    /// Sub-pixel global translate, in device pixels, for frame-to-frame
    /// "filmed" imperfection.
    pub jitter: Vec2,
}

impl Default for RenderOpts {
    fn default() -> Self {
        Self {
            reveal: None,
            pixel_scale: 1.0,
            jitter: Vec2::ZERO,
        }
    }
}

impl RenderOpts {
    fn validate(&self) -> GitlapseResult<()> {
        if !self.pixel_scale.is_finite() || self.pixel_scale < 1.0 {
            return Err(GitlapseError::validation(
                "pixel_scale must be finite and >= 1",
            ));
        }
        if !self.jitter.x.is_finite() || !self.jitter.y.is_finite() {
            return Err(GitlapseError::validation("jitter must be finite"));
        }
        Ok(())
    }
}

/// CPU renderer for the contribution chart.
///
/// Deterministic for identical inputs: rendering the same
/// `(theme, dataset, username, reveal, pixel_scale)` twice with no jitter
/// produces byte-identical pixels. Holds the shaping contexts and a reusable
/// raster context; one renderer serves both the live preview and the video
/// frame loop.
pub struct ChartRenderer {
    text: TextLayoutEngine,
    ctx: Option<vello_cpu::RenderContext>,
}

enum HAlign {
    Left,
    Right,
}

impl ChartRenderer {
    /// Construct a renderer with the label font loaded from `font`.
    pub fn new(font: FontSource) -> GitlapseResult<Self> {
        Ok(Self {
            text: TextLayoutEngine::new(font.load()?)?,
            ctx: None,
        })
    }

    /// Render one frame at the chart's fixed dimensions.
    pub fn render_frame(
        &mut self,
        theme: &Theme,
        data: &ContributionDataset,
        username: &str,
        opts: &RenderOpts,
    ) -> GitlapseResult<FrameRGBA> {
        let size = layout::surface_size(opts.pixel_scale);
        let mut surface = new_surface(size.width, size.height)?;
        self.render_into(&mut surface, theme, data, username, opts)?;
        Ok(FrameRGBA {
            width: size.width,
            height: size.height,
            data: surface.data_as_u8_slice().to_vec(),
        })
    }

    /// Paint the chart onto `surface`, side-effecting nothing else.
    ///
    /// The surface must match [`layout::surface_size`] for
    /// `opts.pixel_scale`; the export loop reuses one exclusively-owned
    /// surface across frames.
    pub(crate) fn render_into(
        &mut self,
        surface: &mut vello_cpu::Pixmap,
        theme: &Theme,
        data: &ContributionDataset,
        username: &str,
        opts: &RenderOpts,
    ) -> GitlapseResult<()> {
        opts.validate()?;
        data.validate()?;

        let size = layout::surface_size(opts.pixel_scale);
        if u32::from(surface.width()) != size.width || u32::from(surface.height()) != size.height {
            return Err(GitlapseError::render(format!(
                "surface is {}x{}, expected {}x{} for pixel_scale {}",
                surface.width(),
                surface.height(),
                size.width,
                size.height,
                opts.pixel_scale
            )));
        }

        // Scale and jitter form one base transform; every coordinate below
        // stays in logical space.
        let base = Affine::translate(opts.jitter) * Affine::scale(opts.pixel_scale);

        let width_u16 = surface.width();
        let height_u16 = surface.height();
        surface.data_as_u8_slice_mut().fill(0);
        self.with_ctx_mut(width_u16, height_u16, |this, ctx| {
            ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);

            // Background first, in raw device space.
            ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
            set_solid_paint(ctx, theme.background);
            ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
                0.0,
                0.0,
                f64::from(size.width),
                f64::from(size.height),
            ));

            // Month labels along the top gutter.
            let month_center_y = layout::grid_origin().y - layout::MONTH_LABEL_HEIGHT / 2.0;
            for (week, label) in layout::month_label_columns(data) {
                this.draw_text(
                    ctx,
                    base,
                    label,
                    layout::LABEL_FONT_SIZE,
                    theme.text_muted,
                    layout::month_label_x(week),
                    month_center_y,
                    HAlign::Left,
                )?;
            }

            // Sparse weekday labels, right-aligned against the grid.
            let day_label_right = layout::grid_origin().x - 8.0;
            for row in layout::LABELED_DAY_ROWS {
                this.draw_text(
                    ctx,
                    base,
                    layout::DAYS[row],
                    layout::LABEL_FONT_SIZE,
                    theme.text_muted,
                    day_label_right,
                    layout::day_label_center_y(row),
                    HAlign::Right,
                )?;
            }

            // Day cells, week-major/day-minor with a 1-based running index.
            let mut day_index = 0u64;
            for (wi, week) in data.weeks.iter().enumerate() {
                for (di, day) in week.iter().enumerate() {
                    day_index += 1;

                    let mut level = day.level;
                    if day.date.year() != data.year {
                        // Boundary days of the prior/next year render blank.
                        level = Level::ZERO;
                    }
                    if let Some(k) = opts.reveal
                        && day_index > k
                    {
                        level = Level::ZERO;
                    }

                    set_solid_paint(ctx, theme.levels[level.index()]);
                    ctx.set_transform(affine_to_cpu(base));
                    let path =
                        rounded_rect_path(layout::cell_rect(wi, di), layout::CELL_RADIUS);
                    ctx.fill_path(&path);
                }
            }

            // Header: running count while revealing, authoritative total
            // otherwise.
            let count = match opts.reveal {
                Some(k) => data.visible_total(k),
                None => data.total_contributions,
            };
            let header_center_y = layout::PADDING + layout::HEADER_HEIGHT / 2.0;
            this.draw_text(
                ctx,
                base,
                &format!(
                    "{} contributions in {}",
                    format_thousands(count),
                    data.year
                ),
                layout::HEADER_FONT_SIZE,
                theme.text,
                layout::PADDING,
                header_center_y,
                HAlign::Left,
            )?;
            this.draw_text(
                ctx,
                base,
                &format!("@{username}"),
                layout::USERNAME_FONT_SIZE,
                theme.text_muted,
                layout::logical_width() - layout::PADDING,
                header_center_y,
                HAlign::Right,
            )?;

            // Legend: "Less", the five level swatches, "More".
            let legend_y = layout::legend_center_y();
            this.draw_text(
                ctx,
                base,
                "Less",
                layout::LEGEND_FONT_SIZE,
                theme.text_muted,
                layout::legend_x(),
                legend_y,
                HAlign::Left,
            )?;
            for (i, color) in theme.levels.iter().enumerate() {
                set_solid_paint(ctx, *color);
                ctx.set_transform(affine_to_cpu(base));
                let path = rounded_rect_path(layout::legend_swatch_rect(i), 2.0);
                ctx.fill_path(&path);
            }
            let more_x = layout::legend_swatch_rect(4).x1 + 4.0;
            this.draw_text(
                ctx,
                base,
                "More",
                layout::LEGEND_FONT_SIZE,
                theme.text_muted,
                more_x,
                legend_y,
                HAlign::Left,
            )?;

            // Leave the context transform-neutral for the next caller.
            ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
            ctx.flush();
            ctx.render_to_pixmap(surface);
            Ok(())
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_text(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        base: Affine,
        text: &str,
        size_px: f32,
        color: Color,
        x: f64,
        y_center: f64,
        align: HAlign,
    ) -> GitlapseResult<()> {
        let brush = TextBrushRgba8 {
            r: color.r,
            g: color.g,
            b: color.b,
            a: color.a,
        };
        let text_layout = self.text.layout(text, size_px, brush)?;

        let x0 = match align {
            HAlign::Left => x,
            HAlign::Right => x - f64::from(text_layout.width()),
        };
        let y0 = y_center - f64::from(text_layout.height()) / 2.0;
        ctx.set_transform(affine_to_cpu(base * Affine::translate((x0, y0))));

        for line in text_layout.lines() {
            for item in line.items() {
                let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                    continue;
                };
                let brush = run.style().brush;
                ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                    brush.r, brush.g, brush.b, brush.a,
                ));
                let glyphs = run.glyphs().map(|g| vello_cpu::Glyph {
                    id: g.id,
                    x: g.x,
                    y: g.y,
                });
                ctx.glyph_run(self.text.font())
                    .font_size(run.run().font_size())
                    .fill_glyphs(glyphs);
            }
        }
        Ok(())
    }

    fn with_ctx_mut<R>(
        &mut self,
        width: u16,
        height: u16,
        f: impl FnOnce(&mut Self, &mut vello_cpu::RenderContext) -> GitlapseResult<R>,
    ) -> GitlapseResult<R> {
        let mut ctx = match self.ctx.take() {
            None => vello_cpu::RenderContext::new(width, height),
            Some(ctx) if ctx.width() == width && ctx.height() == height => ctx,
            Some(_) => vello_cpu::RenderContext::new(width, height),
        };
        ctx.reset();
        let out = f(self, &mut ctx)?;
        self.ctx = Some(ctx);
        Ok(out)
    }
}

/// Allocate a surface matching the chart's device dimensions.
pub(crate) fn new_surface(width: u32, height: u32) -> GitlapseResult<vello_cpu::Pixmap> {
    let w: u16 = width
        .try_into()
        .map_err(|_| GitlapseError::render(format!("surface width exceeds u16: {width}")))?;
    let h: u16 = height
        .try_into()
        .map_err(|_| GitlapseError::render(format!("surface height exceeds u16: {height}")))?;
    Ok(vello_cpu::Pixmap::new(w, h))
}

fn set_solid_paint(ctx: &mut vello_cpu::RenderContext, color: Color) {
    ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
        color.r, color.g, color.b, color.a,
    ));
}

fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn rounded_rect_path(rect: Rect, radius: f64) -> vello_cpu::kurbo::BezPath {
    let rr = kurbo::RoundedRect::from_rect(rect, radius);
    let mut path = vello_cpu::kurbo::BezPath::new();
    for el in rr.path_elements(0.1) {
        path.push(el);
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contrib::model::{ContributionDay, GRID_DAYS, GRID_WEEKS};
    use crate::contrib::synth::{SynthOpts, synthesize};
    use crate::theme::ThemeKey;
    use chrono::{Days, NaiveDate, Weekday};

    fn renderer() -> Option<ChartRenderer> {
        match FontSource::system_default() {
            Ok(font) => Some(ChartRenderer::new(font).unwrap()),
            Err(e) => {
                eprintln!("skipping: {e}");
                None
            }
        }
    }

    fn dataset() -> ContributionDataset {
        synthesize(SynthOpts {
            year: 2024,
            seed: 11,
            today: NaiveDate::from_ymd_opt(2025, 2, 1).unwrap(),
        })
        .unwrap()
    }

    /// All-empty grid for `year`, for hand-crafting cell states.
    fn empty_dataset(year: i32) -> ContributionDataset {
        let jan1 = NaiveDate::from_ymd_opt(year, 1, 1).unwrap();
        let mut date = jan1 - Days::new(u64::from(jan1.weekday().num_days_from_sunday()));
        assert_eq!(date.weekday(), Weekday::Sun);
        let mut weeks = Vec::with_capacity(GRID_WEEKS);
        for _ in 0..GRID_WEEKS {
            let mut week = Vec::with_capacity(GRID_DAYS);
            for _ in 0..GRID_DAYS {
                week.push(ContributionDay {
                    date,
                    count: 0,
                    level: Level::ZERO,
                });
                date = date.succ_opt().unwrap();
            }
            weeks.push(week);
        }
        ContributionDataset {
            total_contributions: 0,
            weeks,
            year,
        }
    }

    fn cell_center_pixel(frame: &FrameRGBA, week: usize, day: usize, scale: f64) -> [u8; 4] {
        let rect = layout::cell_rect(week, day);
        let cx = (rect.center().x * scale) as u32;
        let cy = (rect.center().y * scale) as u32;
        frame.pixel(cx, cy)
    }

    #[test]
    fn reveal_past_end_matches_unbounded_render() {
        let Some(mut r) = renderer() else { return };
        let theme = ThemeKey::Dark.theme();
        let data = dataset();

        let full = r
            .render_frame(&theme, &data, "octocat", &RenderOpts::default())
            .unwrap();
        for reveal in [371, 400, u64::MAX] {
            let bounded = r
                .render_frame(
                    &theme,
                    &data,
                    "octocat",
                    &RenderOpts {
                        reveal: Some(reveal),
                        ..Default::default()
                    },
                )
                .unwrap();
            assert_eq!(bounded, full, "reveal {reveal}");
        }
    }

    #[test]
    fn reveal_zero_renders_every_cell_blank() {
        let Some(mut r) = renderer() else { return };
        let theme = ThemeKey::Dark.theme();
        let data = dataset();
        let frame = r
            .render_frame(
                &theme,
                &data,
                "octocat",
                &RenderOpts {
                    reveal: Some(0),
                    ..Default::default()
                },
            )
            .unwrap();

        let empty = theme.levels[0].as_rgba8();
        for wi in 0..GRID_WEEKS {
            for di in 0..GRID_DAYS {
                assert_eq!(
                    cell_center_pixel(&frame, wi, di, 1.0),
                    empty,
                    "cell ({wi},{di})"
                );
            }
        }
        // Background outside the grid.
        assert_eq!(frame.pixel(2, 2), theme.background.as_rgba8());
    }

    #[test]
    fn reveal_boundary_cells_split_shown_and_blank() {
        let Some(mut r) = renderer() else { return };
        let theme = ThemeKey::Light.theme();
        let mut data = empty_dataset(2024);
        // Two known in-year cells: index 8 (week 1 day 0) and 9 (week 1 day 1).
        data.weeks[1][0].count = 3;
        data.weeks[1][0].level = Level::try_from(2).unwrap();
        data.weeks[1][1].count = 3;
        data.weeks[1][1].level = Level::try_from(2).unwrap();
        data.total_contributions = 6;
        data.validate().unwrap();

        let frame = r
            .render_frame(
                &theme,
                &data,
                "octocat",
                &RenderOpts {
                    reveal: Some(8),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(
            cell_center_pixel(&frame, 1, 0, 1.0),
            theme.levels[2].as_rgba8(),
            "cell inside the cutoff keeps its level"
        );
        assert_eq!(
            cell_center_pixel(&frame, 1, 1, 1.0),
            theme.levels[0].as_rgba8(),
            "cell past the cutoff is forced blank"
        );
    }

    #[test]
    fn out_of_year_boundary_days_render_blank() {
        let Some(mut r) = renderer() else { return };
        let theme = ThemeKey::Dark.theme();
        // 2024 grid starts at 2023-12-31: give that boundary day activity.
        let mut data = empty_dataset(2024);
        assert_eq!(
            data.weeks[0][0].date,
            NaiveDate::from_ymd_opt(2023, 12, 31).unwrap()
        );
        data.weeks[0][0].count = 9;
        data.weeks[0][0].level = Level::MAX;
        data.validate().unwrap();

        let frame = r
            .render_frame(&theme, &data, "octocat", &RenderOpts::default())
            .unwrap();
        assert_eq!(
            cell_center_pixel(&frame, 0, 0, 1.0),
            theme.levels[0].as_rgba8()
        );
    }

    #[test]
    fn render_is_idempotent_without_jitter() {
        let Some(mut r) = renderer() else { return };
        let theme = ThemeKey::Dimmed.theme();
        let data = dataset();
        let opts = RenderOpts {
            reveal: Some(100),
            ..Default::default()
        };
        let a = r.render_frame(&theme, &data, "octocat", &opts).unwrap();
        let b = r.render_frame(&theme, &data, "octocat", &opts).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn jitter_changes_pixels_but_not_dimensions() {
        let Some(mut r) = renderer() else { return };
        let theme = ThemeKey::Dark.theme();
        let data = dataset();
        let still = r
            .render_frame(&theme, &data, "octocat", &RenderOpts::default())
            .unwrap();
        let shaken = r
            .render_frame(
                &theme,
                &data,
                "octocat",
                &RenderOpts {
                    jitter: Vec2::new(0.4, -0.3),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!((shaken.width, shaken.height), (still.width, still.height));
        assert_ne!(shaken.data, still.data);
    }

    #[test]
    fn pixel_scale_doubles_device_positions() {
        let Some(mut r) = renderer() else { return };
        let theme = ThemeKey::Light.theme();
        let mut data = empty_dataset(2024);
        data.weeks[10][3].count = 8;
        data.weeks[10][3].level = Level::MAX;
        data.total_contributions = 8;

        let one = r
            .render_frame(&theme, &data, "octocat", &RenderOpts::default())
            .unwrap();
        let two = r
            .render_frame(
                &theme,
                &data,
                "octocat",
                &RenderOpts {
                    pixel_scale: 2.0,
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(two.width, one.width * 2);
        assert_eq!(two.height, one.height * 2);
        let expected = theme.levels[4].as_rgba8();
        assert_eq!(cell_center_pixel(&one, 10, 3, 1.0), expected);
        assert_eq!(cell_center_pixel(&two, 10, 3, 2.0), expected);
    }

    #[test]
    fn render_rejects_mismatched_surface() {
        let Some(mut r) = renderer() else { return };
        let theme = ThemeKey::Dark.theme();
        let data = dataset();
        let mut small = new_surface(64, 64).unwrap();
        let err = r
            .render_into(&mut small, &theme, &data, "octocat", &RenderOpts::default())
            .unwrap_err();
        assert!(err.to_string().contains("expected"));
    }

    #[test]
    fn render_rejects_invalid_opts() {
        let Some(mut r) = renderer() else { return };
        let theme = ThemeKey::Dark.theme();
        let data = dataset();
        let err = r
            .render_frame(
                &theme,
                &data,
                "octocat",
                &RenderOpts {
                    pixel_scale: 0.5,
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, GitlapseError::Validation(_)));
    }
}
