//! Section-boundary detection

use crate::rendering::RenderSurface;
use crate::{LayoutHost, Result};
use log::debug;

/// Candidate page-break offsets in bitmap pixels, kept sorted ascending.
///
/// Duplicates are allowed; the paginator picks at most one candidate per band.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BreakPoints(Vec<u32>);

impl BreakPoints {
    pub fn from_unsorted(mut offsets: Vec<u32>) -> Self {
        offsets.sort_unstable();
        Self(offsets)
    }

    /// Map CSS-pixel offsets into bitmap space.
    ///
    /// Each offset becomes a fraction of `content_height` and is then scaled by
    /// `bitmap_height`, rounded and clamped to `[0, bitmap_height]`. Non-finite
    /// or negative offsets are dropped.
    pub fn from_css_offsets(offsets: &[f64], content_height: f64, bitmap_height: u32) -> Self {
        if !(content_height.is_finite() && content_height > 0.0) {
            return Self::default();
        }
        let scaled = offsets
            .iter()
            .filter(|o| o.is_finite() && **o >= 0.0)
            .map(|o| {
                let y = (o / content_height * bitmap_height as f64).round();
                y.min(bitmap_height as f64) as u32
            })
            .collect();
        Self::from_unsorted(scaled)
    }

    /// Smallest offset strictly inside `(lo, hi)`
    pub fn first_within(&self, lo: u32, hi: u32) -> Option<u32> {
        let idx = self.0.partition_point(|&bp| bp <= lo);
        self.0.get(idx).copied().filter(|&bp| bp < hi)
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Scan `surface` for section-like elements and return their top edges in
/// bitmap coordinates. No matches yields an empty set, which makes the
/// paginator fall back to plain fixed-height slicing.
pub fn detect_break_points<H: LayoutHost>(
    host: &H,
    surface: &RenderSurface,
    selector: &str,
    bitmap_height: u32,
) -> Result<BreakPoints> {
    let offsets = host.section_offsets(&surface.root, selector)?;
    let points = BreakPoints::from_css_offsets(&offsets, surface.height as f64, bitmap_height);
    debug!(
        "detected {} section boundaries ({} matches) for {}",
        points.len(),
        offsets.len(),
        surface.root.key
    );
    Ok(points)
}
