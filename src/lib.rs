//! Gitlapse renders a year of contribution activity as an animated
//! "timelapse" and exports it as a WebM video.
//!
//! The public API is small and split along the two halves of the pipeline:
//!
//! - Build or load a [`ContributionDataset`] and pick a [`Theme`]
//! - Render single frames with a [`ChartRenderer`] (live preview)
//! - Export the full reveal animation with a [`TimelapseEncoder`]
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

pub mod contrib;
/// Encoding sinks and the finished video artifact.
pub mod encode;
/// Chart rasterization (layout, text, CPU renderer).
pub mod render;
/// Color themes.
pub mod theme;
/// The timelapse export state machine.
pub mod timelapse;

pub use crate::foundation::core::{Canvas, FrameIndex, Fps, Point, Rect, Vec2};
pub use crate::foundation::error::{GitlapseError, GitlapseResult};
pub use crate::foundation::math::SplitMix64;

pub use crate::contrib::model::{
    ContributionDataset, ContributionDay, Level, validate_username,
};
pub use crate::contrib::synth::{SynthOpts, seed_for_username, synthesize};
pub use crate::encode::sink::{FrameSink, InMemorySink, SinkConfig, VideoArtifact, WEBM_MIME};
pub use crate::encode::webm::{WebmMemorySink, WebmSinkOpts, is_ffmpeg_on_path};
pub use crate::render::FrameRGBA;
pub use crate::render::chart::{ChartRenderer, RenderOpts};
pub use crate::render::text::FontSource;
pub use crate::theme::{Color, Theme, ThemeKey};
pub use crate::timelapse::{
    CancelToken, ExportState, ExportStats, FrameClock, ImmediateClock, JitterOpts, RealtimeClock,
    TimelapseEncoder, TimelapseOpts,
};
