//! End-to-end WebM export through the system `ffmpeg`.
//!
//! Skips (with a note) when `ffmpeg` or a system font is unavailable.

use chrono::NaiveDate;
use gitlapse::{
    ChartRenderer, FontSource, ImmediateClock, SynthOpts, ThemeKey, TimelapseEncoder,
    TimelapseOpts, WEBM_MIME, is_ffmpeg_on_path, synthesize,
};

#[test]
fn export_produces_a_webm_artifact() {
    if !is_ffmpeg_on_path() {
        eprintln!("skipping: ffmpeg not found on PATH");
        return;
    }
    let renderer = match FontSource::system_default() {
        Ok(font) => ChartRenderer::new(font).expect("construct renderer"),
        Err(e) => {
            eprintln!("skipping: {e}");
            return;
        }
    };

    let data = synthesize(SynthOpts {
        year: 2024,
        seed: 42,
        today: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
    })
    .unwrap();
    let theme = ThemeKey::Dark.theme();

    let opts = TimelapseOpts {
        today: NaiveDate::from_ymd_opt(2025, 6, 1),
        ..Default::default()
    };
    let mut encoder =
        TimelapseEncoder::new(renderer, opts).with_clock(Box::new(ImmediateClock));

    let mut progress = Vec::new();
    let artifact = encoder
        .generate_with_progress(&theme, &data, "octocat", |current, total| {
            progress.push((current, total))
        })
        .expect("export should succeed with ffmpeg available");

    assert_eq!(artifact.mime_type, WEBM_MIME);
    assert!(!artifact.is_empty(), "artifact must contain container bytes");
    // EBML magic at the head of any WebM/Matroska stream.
    assert_eq!(&artifact.data[..4], &[0x1a, 0x45, 0xdf, 0xa3][..]);

    // Progress fired once per reveal step, strictly increasing, 0..=total.
    assert!(!progress.is_empty());
    let (_, total) = progress[0];
    assert!(total <= 371);
    for (i, &(current, t)) in progress.iter().enumerate() {
        assert_eq!(current, i as u64);
        assert_eq!(t, total);
    }
    assert_eq!(progress.last().copied(), Some((total, total)));
}
