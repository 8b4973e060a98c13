//! Rendering: surface preparation, rasterization and section scanning

pub mod adapter;
pub mod breaks;
pub mod raster;

use crate::paginate::PageBand;
use crate::{FrameHandle, Result, SurfaceRoot};
use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, RgbImage};
use std::io::Cursor;

pub use adapter::{prepare, HostLease, ImageSummary, PreparedSurface};
pub use breaks::{detect_break_points, BreakPoints};
pub use raster::rasterize;

/// Where the document to export comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderSource {
    /// An already rendered frame, captured as-is
    Frame(FrameHandle),
    /// A self-contained HTML document, mounted off-screen before capture
    Markup(String),
}

impl RenderSource {
    pub fn label(&self) -> &'static str {
        match self {
            RenderSource::Frame(_) => "frame",
            RenderSource::Markup(_) => "markup",
        }
    }
}

/// A laid-out subtree ready for capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSurface {
    pub root: SurfaceRoot,
    /// Scrollable width in CSS pixels
    pub width: u32,
    /// Total scrollable height in CSS pixels
    pub height: u32,
    /// How the `<img>` waits ended
    pub images: ImageSummary,
}

/// Immutable RGB capture of a surface at `scale` device pixels per CSS pixel
#[derive(Debug, Clone, PartialEq)]
pub struct Bitmap {
    pixels: RgbImage,
    scale: u32,
}

impl Bitmap {
    pub fn new(pixels: RgbImage, scale: u32) -> Self {
        Self { pixels, scale }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }

    /// Copy the full-width rows covered by `band` into a standalone image
    pub fn slice(&self, band: PageBand) -> RgbImage {
        let y = band.source_y.min(self.height());
        let h = band.height.min(self.height() - y);
        image::imageops::crop_imm(&self.pixels, 0, y, self.width(), h).to_image()
    }

    pub fn encode_png(&self) -> Result<Vec<u8>> {
        let mut buf = Cursor::new(Vec::new());
        self.pixels.write_to(&mut buf, ImageFormat::Png)?;
        Ok(buf.into_inner())
    }

    pub fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        {
            let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
            encoder.encode_image(&self.pixels)?;
        }
        Ok(buf)
    }
}
