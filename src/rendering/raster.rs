//! Rasterizer: capture a prepared surface into an owned RGB bitmap

use crate::rendering::{Bitmap, RenderSurface};
use crate::{Error, LayoutHost, Result, SurfaceMetrics};
use image::{ImageFormat, Rgb, RgbImage, RgbaImage};
use log::debug;

/// Capture the full scrollable content of `surface` at `scale` device pixels
/// per CSS pixel, flattened onto `background`.
pub fn rasterize<H: LayoutHost>(
    host: &H,
    surface: &RenderSurface,
    scale: u32,
    background: [u8; 3],
) -> Result<Bitmap> {
    if surface.width == 0 || surface.height == 0 {
        return Err(Error::MissingContent(format!(
            "{} has no renderable area",
            surface.root.key
        )));
    }
    let scale = scale.max(1);
    let metrics = SurfaceMetrics {
        width: surface.width,
        height: surface.height,
    };

    let png = host
        .capture_png(&surface.root, metrics, scale)
        .map_err(|e| match e {
            Error::RasterizationFailure(_) => e,
            other => Error::RasterizationFailure(other.to_string()),
        })?;

    let decoded = image::load_from_memory_with_format(&png, ImageFormat::Png)
        .map_err(|e| Error::RasterizationFailure(format!("capture is not a valid PNG: {}", e)))?;
    let pixels = flatten(&decoded.to_rgba8(), background);

    let expected = (surface.width * scale, surface.height * scale);
    if pixels.dimensions() != expected {
        return Err(Error::RasterizationFailure(format!(
            "capture of {} is {}x{} px, expected {}x{}",
            surface.root.key,
            pixels.width(),
            pixels.height(),
            expected.0,
            expected.1
        )));
    }
    debug!(
        "rasterized {} at {}x: {}x{} px",
        surface.root.key,
        scale,
        pixels.width(),
        pixels.height()
    );

    Ok(Bitmap::new(pixels, scale))
}

/// Composite RGBA pixels over an opaque background colour
pub fn flatten(rgba: &RgbaImage, background: [u8; 3]) -> RgbImage {
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let px = rgba.get_pixel(x, y).0;
        let alpha = px[3] as u32;
        let mut out = [0u8; 3];
        for c in 0..3 {
            out[c] = ((px[c] as u32 * alpha + background[c] as u32 * (255 - alpha) + 127) / 255) as u8;
        }
        Rgb(out)
    })
}
