use std::io::Read;
use std::process::{Child, ChildStdin, Command, Stdio};

use crate::encode::sink::{FrameSink, SinkConfig, VideoArtifact, WEBM_MIME};
use crate::foundation::core::FrameIndex;
use crate::foundation::error::{GitlapseError, GitlapseResult};
use crate::foundation::math::mul_div255_u16;
use crate::render::FrameRGBA;

/// Options for [`WebmMemorySink`] output.
#[derive(Clone, Debug)]
pub struct WebmSinkOpts {
    /// Target video bitrate in kbit/s.
    pub bitrate_kbps: u32,
    /// Background color used to flatten alpha (RGBA8, straight alpha).
    pub bg_rgba: [u8; 4],
}

impl Default for WebmSinkOpts {
    fn default() -> Self {
        Self {
            // 5 Mbps, the one fixed quality target of the export path.
            bitrate_kbps: 5_000,
            bg_rgba: [0, 0, 0, 255],
        }
    }
}

/// Sink that spawns the system `ffmpeg` and encodes VP9/WebM into memory.
///
/// Raw premultiplied RGBA8 frames are flattened over `bg_rgba` and streamed
/// to `ffmpeg` stdin; the container bytes come back on stdout and accumulate
/// in memory until [`WebmMemorySink::into_artifact`] hands them out.
pub struct WebmMemorySink {
    opts: WebmSinkOpts,

    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout_drain: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,
    stderr_drain: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,

    scratch: Vec<u8>,
    cfg: Option<SinkConfig>,
    last_idx: Option<FrameIndex>,
    encoded: Option<Vec<u8>>,
}

impl WebmMemorySink {
    /// Create a new sink with the given options.
    pub fn new(opts: WebmSinkOpts) -> Self {
        Self {
            opts,
            child: None,
            stdin: None,
            stdout_drain: None,
            stderr_drain: None,
            scratch: Vec::new(),
            cfg: None,
            last_idx: None,
            encoded: None,
        }
    }

    /// Consume the sink and return the finished artifact.
    ///
    /// Only valid after a successful [`FrameSink::end`]; a failed or
    /// unfinished export has no artifact (there is no partial recovery).
    pub fn into_artifact(self) -> GitlapseResult<VideoArtifact> {
        let data = self
            .encoded
            .ok_or_else(|| GitlapseError::encode("webm sink was not finalized"))?;
        Ok(VideoArtifact {
            data,
            mime_type: WEBM_MIME,
        })
    }
}

impl FrameSink for WebmMemorySink {
    fn begin(&mut self, cfg: SinkConfig) -> GitlapseResult<()> {
        if cfg.fps.num == 0 || cfg.fps.den == 0 {
            return Err(GitlapseError::validation("fps must be non-zero"));
        }
        if cfg.width == 0 || cfg.height == 0 {
            return Err(GitlapseError::validation(
                "webm sink width/height must be non-zero",
            ));
        }
        if !cfg.width.is_multiple_of(2) || !cfg.height.is_multiple_of(2) {
            return Err(GitlapseError::validation(
                "webm sink width/height must be even (required for yuv420p vp9 output)",
            ));
        }

        if !is_ffmpeg_on_path() {
            return Err(GitlapseError::encode(
                "ffmpeg is required for WebM encoding, but was not found on PATH",
            ));
        }

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        // Input: raw RGBA8 frames on stdin at the declared capture rate.
        cmd.args([
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{}x{}", cfg.width, cfg.height),
            "-r",
            &format!("{}/{}", cfg.fps.num, cfg.fps.den),
            "-i",
            "pipe:0",
        ]);
        // Output: VP9 in a WebM container on stdout. Realtime deadline keeps
        // the encoder in step with a paced frame loop.
        cmd.args([
            "-an",
            "-c:v",
            "libvpx-vp9",
            "-b:v",
            &format!("{}k", self.opts.bitrate_kbps),
            "-pix_fmt",
            "yuv420p",
            "-deadline",
            "realtime",
            "-cpu-used",
            "8",
            "-row-mt",
            "1",
            "-f",
            "webm",
            "pipe:1",
        ]);

        let mut child = cmd.spawn().map_err(|e| {
            GitlapseError::encode(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| GitlapseError::encode("failed to open ffmpeg stdin (unexpected)"))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| GitlapseError::encode("failed to open ffmpeg stdout (unexpected)"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| GitlapseError::encode("failed to open ffmpeg stderr (unexpected)"))?;

        let stdout_drain = std::thread::spawn(move || {
            let mut bytes = Vec::new();
            stdout.read_to_end(&mut bytes)?;
            Ok(bytes)
        });
        let stderr_drain = std::thread::spawn(move || {
            let mut bytes = Vec::new();
            stderr.read_to_end(&mut bytes)?;
            Ok(bytes)
        });

        self.scratch = vec![0u8; (cfg.width * cfg.height * 4) as usize];
        self.child = Some(child);
        self.stdin = Some(stdin);
        self.stdout_drain = Some(stdout_drain);
        self.stderr_drain = Some(stderr_drain);
        self.cfg = Some(cfg);
        self.last_idx = None;
        self.encoded = None;
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> GitlapseResult<()> {
        let cfg = self
            .cfg
            .as_ref()
            .ok_or_else(|| GitlapseError::encode("webm sink not started"))?;
        if let Some(last) = self.last_idx
            && idx.0 <= last.0
        {
            return Err(GitlapseError::encode(
                "webm sink received out-of-order frame index",
            ));
        }
        self.last_idx = Some(idx);

        if frame.width != cfg.width || frame.height != cfg.height {
            return Err(GitlapseError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, cfg.width, cfg.height
            )));
        }
        if frame.data.len() != self.scratch.len() {
            return Err(GitlapseError::validation(
                "frame.data size mismatch with width*height*4",
            ));
        }

        // ffmpeg does not understand premultiplied alpha; flatten first.
        flatten_premul_over_bg_to_opaque_rgba8(&mut self.scratch, &frame.data, self.opts.bg_rgba)?;

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(GitlapseError::encode("webm sink is already finalized"));
        };

        use std::io::Write as _;
        stdin.write_all(&self.scratch).map_err(|e| {
            GitlapseError::encode(format!("failed to write frame to ffmpeg stdin: {e}"))
        })?;
        Ok(())
    }

    fn end(&mut self) -> GitlapseResult<()> {
        drop(self.stdin.take());
        let mut child = self
            .child
            .take()
            .ok_or_else(|| GitlapseError::encode("webm sink not started"))?;

        let status = child.wait().map_err(|e| {
            GitlapseError::encode(format!("failed to wait for ffmpeg to finish: {e}"))
        })?;

        let stdout_bytes = match self.stdout_drain.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| GitlapseError::encode("ffmpeg stdout drain thread panicked"))?
                .map_err(|e| GitlapseError::encode(format!("ffmpeg stdout read failed: {e}")))?,
            None => Vec::new(),
        };
        let stderr_bytes = match self.stderr_drain.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| GitlapseError::encode("ffmpeg stderr drain thread panicked"))?
                .map_err(|e| GitlapseError::encode(format!("ffmpeg stderr read failed: {e}")))?,
            None => Vec::new(),
        };

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            return Err(GitlapseError::encode(format!(
                "ffmpeg exited with status {}: {}",
                status,
                stderr.trim()
            )));
        }
        if stdout_bytes.is_empty() {
            return Err(GitlapseError::encode(
                "ffmpeg produced no container bytes",
            ));
        }

        self.encoded = Some(stdout_bytes);
        self.cfg = None;
        Ok(())
    }
}

fn flatten_premul_over_bg_to_opaque_rgba8(
    dst: &mut [u8],
    src_premul: &[u8],
    bg_rgba: [u8; 4],
) -> GitlapseResult<()> {
    if dst.len() != src_premul.len() || !dst.len().is_multiple_of(4) {
        return Err(GitlapseError::validation(
            "flatten_premul_over_bg_to_opaque_rgba8 expects equal-length rgba8 buffers",
        ));
    }

    let bg_r = u16::from(bg_rgba[0]);
    let bg_g = u16::from(bg_rgba[1]);
    let bg_b = u16::from(bg_rgba[2]);

    for (d, s) in dst.chunks_exact_mut(4).zip(src_premul.chunks_exact(4)) {
        let a = u16::from(s[3]);
        if a == 255 {
            d.copy_from_slice(s);
            d[3] = 255;
            continue;
        }

        let inv = 255u16 - a;
        let r = u16::from(s[0]) + mul_div255_u16(bg_r, inv);
        let g = u16::from(s[1]) + mul_div255_u16(bg_g, inv);
        let b = u16::from(s[2]) + mul_div255_u16(bg_b, inv);

        d[0] = r.min(255) as u8;
        d[1] = g.min(255) as u8;
        d[2] = b.min(255) as u8;
        d[3] = 255;
    }

    Ok(())
}

/// Return `true` when `ffmpeg` can be invoked from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    std::process::Command::new("ffmpeg")
        .arg("-version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::core::Fps;

    #[test]
    fn flatten_premul_alpha_0_returns_bg() {
        let src = vec![0u8, 0, 0, 0];
        let mut dst = vec![0u8; 4];
        flatten_premul_over_bg_to_opaque_rgba8(&mut dst, &src, [10, 20, 30, 255]).unwrap();
        assert_eq!(dst, vec![10, 20, 30, 255]);
    }

    #[test]
    fn flatten_premul_alpha_255_is_identity() {
        let src = vec![1u8, 2, 3, 255];
        let mut dst = vec![0u8; 4];
        flatten_premul_over_bg_to_opaque_rgba8(&mut dst, &src, [10, 20, 30, 255]).unwrap();
        assert_eq!(dst, src);
    }

    #[test]
    fn begin_rejects_odd_dimensions() {
        let mut sink = WebmMemorySink::new(WebmSinkOpts::default());
        let cfg = SinkConfig {
            width: 933,
            height: 248,
            fps: Fps::new(25, 1).unwrap(),
        };
        let err = sink.begin(cfg).unwrap_err();
        assert!(err.to_string().contains("even"));
    }

    #[test]
    fn artifact_requires_finalize() {
        let sink = WebmMemorySink::new(WebmSinkOpts::default());
        assert!(sink.into_artifact().is_err());
    }
}
