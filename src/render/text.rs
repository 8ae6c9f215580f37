use std::path::PathBuf;

use crate::foundation::error::{GitlapseError, GitlapseResult};

/// Where the chart's label font comes from.
///
/// The renderer never rasterizes text without an explicit font; discovery of
/// a system fallback is done once, up front, so per-frame rendering stays
/// deterministic.
#[derive(Clone, Debug)]
pub enum FontSource {
    /// Raw TTF/OTF bytes.
    Bytes(Vec<u8>),
    /// Path to a TTF/OTF file on disk.
    Path(PathBuf),
}

impl FontSource {
    /// Pick a sans-serif face from the system font database.
    pub fn system_default() -> GitlapseResult<Self> {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        let query = fontdb::Query {
            families: &[fontdb::Family::SansSerif],
            weight: fontdb::Weight::NORMAL,
            stretch: fontdb::Stretch::Normal,
            style: fontdb::Style::Normal,
        };
        let id = db.query(&query).ok_or_else(|| {
            GitlapseError::validation(
                "no system sans-serif font found; supply an explicit font file",
            )
        })?;
        let bytes = db
            .with_face_data(id, |data, _index| data.to_vec())
            .ok_or_else(|| GitlapseError::validation("system font face data unavailable"))?;
        Ok(FontSource::Bytes(bytes))
    }

    pub(crate) fn load(self) -> GitlapseResult<Vec<u8>> {
        match self {
            FontSource::Bytes(bytes) => Ok(bytes),
            FontSource::Path(path) => std::fs::read(&path).map_err(|e| {
                GitlapseError::validation(format!(
                    "failed to read font '{}': {e}",
                    path.display()
                ))
            }),
        }
    }
}

/// RGBA8 brush color carried through Parley text layout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct TextBrushRgba8 {
    pub(crate) r: u8,
    pub(crate) g: u8,
    pub(crate) b: u8,
    pub(crate) a: u8,
}

/// Stateful helper for shaping the chart's text with one registered font.
pub(crate) struct TextLayoutEngine {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<TextBrushRgba8>,
    family_name: String,
    font: vello_cpu::peniko::FontData,
}

impl TextLayoutEngine {
    /// Register `font_bytes` and keep the resolved family for all layouts.
    pub(crate) fn new(font_bytes: Vec<u8>) -> GitlapseResult<Self> {
        let mut font_ctx = parley::FontContext::default();
        let families = font_ctx
            .collection
            .register_fonts(parley::fontique::Blob::from(font_bytes.clone()), None);
        let family_id = families.first().map(|(id, _)| *id).ok_or_else(|| {
            GitlapseError::validation("no font families registered from font bytes")
        })?;
        let family_name = font_ctx
            .collection
            .family_name(family_id)
            .ok_or_else(|| GitlapseError::validation("registered font family has no name"))?
            .to_string();

        let font =
            vello_cpu::peniko::FontData::new(vello_cpu::peniko::Blob::from(font_bytes), 0);

        Ok(Self {
            font_ctx,
            layout_ctx: parley::LayoutContext::new(),
            family_name,
            font,
        })
    }

    /// Shape and lay out a single line of plain text.
    pub(crate) fn layout(
        &mut self,
        text: &str,
        size_px: f32,
        brush: TextBrushRgba8,
    ) -> GitlapseResult<parley::Layout<TextBrushRgba8>> {
        if !size_px.is_finite() || size_px <= 0.0 {
            return Err(GitlapseError::validation(
                "text size_px must be finite and > 0",
            ));
        }

        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(std::borrow::Cow::Owned(self.family_name.clone())),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size_px));
        builder.push_default(parley::style::StyleProperty::Brush(brush));

        let mut layout: parley::Layout<TextBrushRgba8> = builder.build(text);
        layout.break_all_lines(None);
        Ok(layout)
    }

    /// The font used to fill glyph runs produced by [`Self::layout`].
    pub(crate) fn font(&self) -> &vello_cpu::peniko::FontData {
        &self.font
    }
}
