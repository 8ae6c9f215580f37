//! Timelapse export: drives the chart renderer through increasing reveal
//! cutoffs and streams each frame into an encoding sink.
//!
//! The frame loop is an explicit state machine paced by an injected
//! [`FrameClock`], so tests can advance frames without real delays and the
//! capture rate can never drift from the loop delay (both come from one
//! [`Fps`] value).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::NaiveDate;
use kurbo::Vec2;
use tracing::{debug, warn};

use crate::contrib::model::ContributionDataset;
use crate::encode::sink::{FrameSink, SinkConfig, VideoArtifact};
use crate::encode::webm::{WebmMemorySink, WebmSinkOpts};
use crate::foundation::core::{FrameIndex, Fps};
use crate::foundation::error::{GitlapseError, GitlapseResult};
use crate::foundation::math::SplitMix64;
use crate::render::FrameRGBA;
use crate::render::chart::{ChartRenderer, RenderOpts, new_surface};
use crate::render::layout;
use crate::theme::Theme;

/// Paces the frame loop between reveal steps.
///
/// The export loop is single-threaded and cooperative: it blocks in
/// [`FrameClock::wait`] between frames rather than spinning, and everything
/// else happens on the caller's thread.
pub trait FrameClock {
    /// Block until the next frame is due. `frame` is one frame's duration.
    fn wait(&mut self, frame: Duration);
}

/// Wall-clock pacing: sleeps one frame duration per step.
#[derive(Clone, Copy, Debug, Default)]
pub struct RealtimeClock;

impl FrameClock for RealtimeClock {
    fn wait(&mut self, frame: Duration) {
        std::thread::sleep(frame);
    }
}

/// No-delay pacing for tests and offline export.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImmediateClock;

impl FrameClock for ImmediateClock {
    fn wait(&mut self, _frame: Duration) {}
}

/// Cooperative cancellation handle for an in-flight export.
///
/// Cancelling stops scheduling further reveal steps; the export finalizes
/// early and still resolves with a valid (shorter) artifact.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a fresh, un-cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Return `true` once [`CancelToken::cancel`] has been called.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Per-frame sub-pixel jitter configuration.
#[derive(Clone, Copy, Debug)]
pub struct JitterOpts {
    /// Seed for the value-passed jitter stream.
    pub seed: u64,
    /// Maximum absolute offset per axis, in device pixels. Sub-pixel values
    /// keep the "filmed" wobble subtle.
    pub amplitude: f64,
}

impl Default for JitterOpts {
    fn default() -> Self {
        Self {
            seed: 0x67_69_74_6c_61_70_73_65,
            amplitude: 0.35,
        }
    }
}

/// Options for one timelapse export.
#[derive(Clone, Debug)]
pub struct TimelapseOpts {
    /// Capture rate. Also the loop pacing: one knob, no drift.
    pub fps: Fps,
    /// Target video bitrate in kbit/s (fixed-quality export path).
    pub bitrate_kbps: u32,
    /// How long the final frame is held before finalizing, so the video does
    /// not end abruptly on the last content frame.
    pub hold_secs: f64,
    /// Optional per-frame sub-pixel jitter.
    pub jitter: Option<JitterOpts>,
    /// Reveal steps stop at this date; `None` uses the current local date.
    /// Days in the future are never animated toward.
    pub today: Option<NaiveDate>,
    /// Optional cooperative cancellation handle, checked between frames.
    pub cancel: Option<CancelToken>,
}

impl Default for TimelapseOpts {
    fn default() -> Self {
        Self {
            fps: Fps { num: 25, den: 1 },
            bitrate_kbps: 5_000,
            hold_secs: 0.5,
            jitter: None,
            today: None,
            cancel: None,
        }
    }
}

/// Export loop states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportState {
    /// Not started.
    Idle,
    /// Rendering and capturing the frame for this reveal step.
    Rendering(u64),
    /// Holding the last frame and finalizing the sink.
    Finalizing,
    /// Export finished successfully.
    Done,
    /// Export aborted; no artifact.
    Failed,
}

/// Counters for one finished export.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExportStats {
    /// Highest meaningful reveal step (bounded by "today").
    pub total_days: u64,
    /// Reveal frames pushed to the sink.
    pub frames_encoded: u64,
    /// Extra trailing frames holding the final image.
    pub hold_frames: u64,
    /// Whether the export was cut short by a [`CancelToken`].
    pub cancelled: bool,
}

/// Drives a full timelapse export.
///
/// One encoder invocation exclusively owns its off-screen surface; a single
/// encoder must not be asked to run two exports concurrently (the `&mut`
/// receiver enforces this).
pub struct TimelapseEncoder {
    renderer: ChartRenderer,
    opts: TimelapseOpts,
    clock: Box<dyn FrameClock>,
}

impl TimelapseEncoder {
    /// Create an encoder around `renderer`, paced in real time.
    pub fn new(renderer: ChartRenderer, opts: TimelapseOpts) -> Self {
        Self {
            renderer,
            opts,
            clock: Box::new(RealtimeClock),
        }
    }

    /// Replace the pacing clock (tests and offline export use
    /// [`ImmediateClock`]).
    pub fn with_clock(mut self, clock: Box<dyn FrameClock>) -> Self {
        self.clock = clock;
        self
    }

    /// Take the renderer back out (e.g. to render previews after export).
    pub fn into_renderer(self) -> ChartRenderer {
        self.renderer
    }

    /// Export the full timelapse as a WebM artifact.
    pub fn generate(
        &mut self,
        theme: &Theme,
        data: &ContributionDataset,
        username: &str,
    ) -> GitlapseResult<VideoArtifact> {
        self.generate_with_progress(theme, data, username, |_, _| {})
    }

    /// Export the full timelapse, reporting `(current, total)` after each
    /// reveal step.
    #[tracing::instrument(skip(self, theme, data, on_progress))]
    pub fn generate_with_progress(
        &mut self,
        theme: &Theme,
        data: &ContributionDataset,
        username: &str,
        mut on_progress: impl FnMut(u64, u64),
    ) -> GitlapseResult<VideoArtifact> {
        let mut sink = WebmMemorySink::new(WebmSinkOpts {
            bitrate_kbps: self.opts.bitrate_kbps,
            bg_rgba: theme.background.as_rgba8(),
        });
        self.generate_into(theme, data, username, &mut sink, &mut on_progress)?;
        sink.into_artifact()
    }

    /// Run the export loop against an arbitrary sink.
    ///
    /// Frames are captured and pushed strictly in increasing order. Any sink
    /// or render failure aborts the whole export; partial output is
    /// discarded by the caller dropping the sink.
    pub fn generate_into(
        &mut self,
        theme: &Theme,
        data: &ContributionDataset,
        username: &str,
        sink: &mut dyn FrameSink,
        on_progress: &mut dyn FnMut(u64, u64),
    ) -> GitlapseResult<ExportStats> {
        data.validate()?;

        let today = self
            .opts
            .today
            .unwrap_or_else(|| chrono::Local::now().date_naive());
        let total_days = data.days_through(today);
        let size = layout::surface_size(1.0);
        let frame_duration = Duration::from_secs_f64(self.opts.fps.frame_duration_secs());
        let hold_frames = self.opts.fps.secs_to_frames_floor(self.opts.hold_secs);

        debug!(
            width = size.width,
            height = size.height,
            fps = self.opts.fps.as_f64(),
            total_days,
            hold_frames,
            "starting timelapse export"
        );

        // Rejects before any frame is produced when the sink cannot start
        // (no ffmpeg, bad dimensions, codec init failure).
        sink.begin(SinkConfig {
            width: size.width,
            height: size.height,
            fps: self.opts.fps,
        })?;

        let mut surface = new_surface(size.width, size.height)?;
        let mut jitter_rng = self
            .opts
            .jitter
            .map(|j| (SplitMix64::new(j.seed), j.amplitude));

        let mut state = ExportState::Idle;
        let mut stats = ExportStats {
            total_days,
            ..Default::default()
        };
        let mut last_frame: Option<FrameRGBA> = None;
        let mut next_index = 0u64;
        let mut failure: Option<GitlapseError> = None;

        loop {
            state = match state {
                ExportState::Idle => ExportState::Rendering(0),

                ExportState::Rendering(day) => {
                    let jitter = match &mut jitter_rng {
                        Some((rng, amplitude)) => {
                            Vec2::new(rng.next_signed() * *amplitude, rng.next_signed() * *amplitude)
                        }
                        None => Vec2::ZERO,
                    };
                    let render_opts = RenderOpts {
                        reveal: Some(day),
                        pixel_scale: 1.0,
                        jitter,
                    };

                    let step = (|| -> GitlapseResult<()> {
                        self.renderer
                            .render_into(&mut surface, theme, data, username, &render_opts)?;
                        let frame = FrameRGBA {
                            width: size.width,
                            height: size.height,
                            data: surface.data_as_u8_slice().to_vec(),
                        };
                        sink.push_frame(FrameIndex(next_index), &frame)?;
                        last_frame = Some(frame);
                        Ok(())
                    })();

                    match step {
                        Ok(()) => {
                            next_index += 1;
                            stats.frames_encoded += 1;
                            on_progress(day, total_days);
                            self.clock.wait(frame_duration);

                            let cancelled = self
                                .opts
                                .cancel
                                .as_ref()
                                .is_some_and(CancelToken::is_cancelled);
                            if cancelled {
                                stats.cancelled = true;
                                ExportState::Finalizing
                            } else if day >= total_days {
                                ExportState::Finalizing
                            } else {
                                ExportState::Rendering(day + 1)
                            }
                        }
                        Err(e) => {
                            failure = Some(e);
                            ExportState::Failed
                        }
                    }
                }

                ExportState::Finalizing => {
                    let hold = (|| -> GitlapseResult<()> {
                        if let Some(frame) = &last_frame {
                            for _ in 0..hold_frames {
                                sink.push_frame(FrameIndex(next_index), frame)?;
                                next_index += 1;
                                stats.hold_frames += 1;
                                self.clock.wait(frame_duration);
                            }
                        }
                        sink.end()
                    })();

                    match hold {
                        Ok(()) => ExportState::Done,
                        Err(e) => {
                            failure = Some(e);
                            ExportState::Failed
                        }
                    }
                }

                ExportState::Done => {
                    debug!(
                        frames = stats.frames_encoded,
                        held = stats.hold_frames,
                        cancelled = stats.cancelled,
                        "timelapse export finished"
                    );
                    return Ok(stats);
                }

                ExportState::Failed => {
                    let err = failure
                        .take()
                        .unwrap_or_else(|| GitlapseError::encode("export failed"));
                    warn!(error = %err, "timelapse export aborted");
                    return Err(err);
                }
            };
        }
    }
}
