//! Encoding sinks.
//!
//! Sinks consume rendered frames in timeline order; the export path uses the
//! `ffmpeg`-backed WebM sink, tests use the in-memory one.

/// Generic frame sink trait, in-memory sink, and the finished artifact type.
pub mod sink;
/// `ffmpeg`-based VP9/WebM sink encoding into memory.
pub mod webm;
