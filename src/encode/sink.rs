use std::path::Path;

use crate::foundation::core::{FrameIndex, Fps};
use crate::foundation::error::{GitlapseError, GitlapseResult};
use crate::render::FrameRGBA;

/// MIME type of the fixed export container.
pub const WEBM_MIME: &str = "video/webm";

/// Configuration provided to a [`FrameSink`] at the start of an export.
#[derive(Debug, Clone, Copy)]
pub struct SinkConfig {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Output frames-per-second.
    pub fps: Fps,
}

/// Sink contract for consuming rendered frames in timeline order.
///
/// Ordering contract: `push_frame` is called in strictly increasing
/// `FrameIndex` order between one `begin`/`end` pair. Sinks must never
/// reorder or drop frames.
pub trait FrameSink: Send {
    /// Called once before any frames are pushed.
    fn begin(&mut self, cfg: SinkConfig) -> GitlapseResult<()>;
    /// Push one frame in strictly increasing timeline order.
    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> GitlapseResult<()>;
    /// Called once after the last frame is pushed.
    fn end(&mut self) -> GitlapseResult<()>;
}

/// In-memory sink for tests and debugging.
#[derive(Debug, Default)]
pub struct InMemorySink {
    cfg: Option<SinkConfig>,
    last_idx: Option<FrameIndex>,
    /// Frames in timeline order.
    pub(crate) frames: Vec<(FrameIndex, FrameRGBA)>,
}

impl InMemorySink {
    /// Create a new in-memory sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the sink configuration captured in `begin`, if any.
    pub fn config(&self) -> Option<SinkConfig> {
        self.cfg
    }

    /// Borrow the captured frames.
    pub fn frames(&self) -> &[(FrameIndex, FrameRGBA)] {
        &self.frames
    }
}

impl FrameSink for InMemorySink {
    fn begin(&mut self, cfg: SinkConfig) -> GitlapseResult<()> {
        self.cfg = Some(cfg);
        self.last_idx = None;
        self.frames.clear();
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> GitlapseResult<()> {
        if let Some(last) = self.last_idx
            && idx.0 <= last.0
        {
            return Err(GitlapseError::encode(
                "sink received out-of-order frame index",
            ));
        }
        self.last_idx = Some(idx);
        self.frames.push((idx, frame.clone()));
        Ok(())
    }

    fn end(&mut self) -> GitlapseResult<()> {
        Ok(())
    }
}

/// A finished, immutable video export.
#[derive(Clone, Debug)]
pub struct VideoArtifact {
    /// Encoded container bytes.
    pub data: Vec<u8>,
    /// MIME type tag ([`WEBM_MIME`] for the fixed export path).
    pub mime_type: &'static str,
}

impl VideoArtifact {
    /// Byte length of the encoded container.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Return `true` when no bytes were produced.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Write the artifact under `path`, creating parent directories.
    ///
    /// This is the download/export companion; the artifact itself stays
    /// in memory until dropped.
    pub fn save_to(&self, path: impl AsRef<Path>) -> GitlapseResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            use anyhow::Context as _;
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create output directory '{}'", parent.display())
            })?;
        }
        std::fs::write(path, &self.data).map_err(|e| {
            GitlapseError::encode(format!("failed to write '{}': {e}", path.display()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(width: u32, height: u32) -> FrameRGBA {
        FrameRGBA {
            width,
            height,
            data: vec![0u8; (width * height * 4) as usize],
        }
    }

    fn cfg() -> SinkConfig {
        SinkConfig {
            width: 4,
            height: 4,
            fps: Fps::new(25, 1).unwrap(),
        }
    }

    #[test]
    fn in_memory_sink_keeps_order() {
        let mut sink = InMemorySink::new();
        sink.begin(cfg()).unwrap();
        sink.push_frame(FrameIndex(0), &frame(4, 4)).unwrap();
        sink.push_frame(FrameIndex(1), &frame(4, 4)).unwrap();
        sink.end().unwrap();
        assert_eq!(sink.frames().len(), 2);
        assert!(sink.config().is_some());
    }

    #[test]
    fn in_memory_sink_rejects_out_of_order_frames() {
        let mut sink = InMemorySink::new();
        sink.begin(cfg()).unwrap();
        sink.push_frame(FrameIndex(3), &frame(4, 4)).unwrap();
        let err = sink.push_frame(FrameIndex(3), &frame(4, 4)).unwrap_err();
        assert!(err.to_string().contains("out-of-order"));
    }

    #[test]
    fn artifact_saves_bytes() {
        let artifact = VideoArtifact {
            data: vec![1, 2, 3],
            mime_type: WEBM_MIME,
        };
        assert_eq!(artifact.len(), 3);
        assert!(!artifact.is_empty());
        let path = std::env::temp_dir().join(format!(
            "gitlapse_artifact_test_{}.bin",
            std::process::id()
        ));
        artifact.save_to(&path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), vec![1, 2, 3]);
        let _ = std::fs::remove_file(&path);
    }
}
