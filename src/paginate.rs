//! Slicing a tall bitmap into page-height bands.
//!
//! Bands are computed greedily from the top. A band may be cut short at a
//! section boundary that falls inside (or just past) the page window, and a
//! trailing sliver shorter than `min_final_slice` is folded into the band
//! before it instead of producing a near-empty last page.

use crate::rendering::breaks::BreakPoints;
use crate::{Error, ExportConfig, Result};

/// Default slack past the page end within which a section boundary still counts
pub const DEFAULT_BREAK_SLACK: u32 = 20;

/// Default minimum height of a trailing band
pub const DEFAULT_MIN_FINAL_SLICE: u32 = 10;

/// One horizontal band of the source bitmap, in bitmap pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageBand {
    pub source_y: u32,
    pub height: u32,
}

impl PageBand {
    /// Exclusive bottom edge
    pub fn end(&self) -> u32 {
        self.source_y + self.height
    }
}

/// Greedy page slicer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    pub slack: u32,
    pub min_final_slice: u32,
    /// Whether the first band may also be cut at a section boundary
    pub snap_first_band: bool,
}

impl Default for Paginator {
    fn default() -> Self {
        Self {
            slack: DEFAULT_BREAK_SLACK,
            min_final_slice: DEFAULT_MIN_FINAL_SLICE,
            snap_first_band: true,
        }
    }
}

impl Paginator {
    pub fn from_config(config: &ExportConfig) -> Self {
        Self {
            slack: config.break_slack,
            min_final_slice: config.min_final_slice,
            snap_first_band: config.snap_first_band,
        }
    }

    /// Compute bands covering `[0, total_height)` exactly once.
    ///
    /// `page_capacity` is the number of bitmap rows that fit on one page.
    pub fn paginate(
        &self,
        total_height: u32,
        page_capacity: u32,
        break_points: &BreakPoints,
    ) -> Result<Vec<PageBand>> {
        if page_capacity == 0 {
            return Err(Error::Config("page capacity must be positive".into()));
        }

        let mut bands = Vec::with_capacity((total_height / page_capacity) as usize + 1);
        let mut source_y = 0u32;
        let mut remaining = total_height;

        while remaining > 0 {
            let mut height = remaining.min(page_capacity);

            if self.snap_first_band || !bands.is_empty() {
                let window_end = source_y.saturating_add(height).saturating_add(self.slack);
                if let Some(bp) = break_points.first_within(source_y, window_end) {
                    let cut = bp - source_y;
                    // a boundary past the content end cannot shorten anything
                    if cut <= page_capacity && cut <= remaining {
                        height = cut;
                    }
                }
            }

            let leftover = remaining - height;
            if leftover > 0 && leftover < self.min_final_slice {
                height = remaining;
            }

            bands.push(PageBand { source_y, height });
            source_y += height;
            remaining -= height;
        }

        Ok(bands)
    }
}

/// [`Paginator::paginate`] with an explicit trailing-slice threshold and the default slack
pub fn paginate(
    total_height: u32,
    page_capacity: u32,
    break_points: &BreakPoints,
    min_final_slice: u32,
) -> Result<Vec<PageBand>> {
    Paginator {
        min_final_slice,
        ..Default::default()
    }
    .paginate(total_height, page_capacity, break_points)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bands(total: u32, cap: u32, bps: &[u32]) -> Vec<(u32, u32)> {
        let bps = BreakPoints::from_unsorted(bps.to_vec());
        paginate(total, cap, &bps, DEFAULT_MIN_FINAL_SLICE)
            .unwrap()
            .into_iter()
            .map(|b| (b.source_y, b.end()))
            .collect()
    }

    fn assert_partition(total: u32, result: &[PageBand]) {
        let mut cursor = 0;
        for band in result {
            assert!(band.height > 0, "empty band in {:?}", result);
            assert_eq!(band.source_y, cursor, "gap or overlap in {:?}", result);
            cursor = band.end();
        }
        assert_eq!(cursor, total);
    }

    #[test]
    fn zero_height_yields_no_bands() {
        assert!(bands(0, 100, &[]).is_empty());
        assert!(bands(0, 100, &[5, 50]).is_empty());
    }

    #[test]
    fn short_content_fits_one_band() {
        assert_eq!(bands(42, 100, &[]), vec![(0, 42)]);
        assert_eq!(bands(100, 100, &[]), vec![(0, 100)]);
    }

    #[test]
    fn tiny_remainder_is_absorbed() {
        assert_eq!(bands(205, 100, &[]), vec![(0, 100), (100, 205)]);
    }

    #[test]
    fn remainder_at_threshold_gets_its_own_band() {
        assert_eq!(bands(210, 100, &[]), vec![(0, 100), (100, 200), (200, 210)]);
    }

    #[test]
    fn snaps_to_section_boundary() {
        assert_eq!(bands(300, 100, &[95]), vec![(0, 95), (95, 195), (195, 300)]);
    }

    #[test]
    fn first_band_snaps_by_default() {
        assert_eq!(bands(300, 100, &[40]), vec![(0, 40), (40, 140), (140, 240), (240, 300)]);
    }

    #[test]
    fn first_band_can_be_exempt_from_snapping() {
        let p = Paginator {
            snap_first_band: false,
            ..Default::default()
        };
        let bp = BreakPoints::from_unsorted(vec![95]);
        let got: Vec<(u32, u32)> = p
            .paginate(300, 100, &bp)
            .unwrap()
            .into_iter()
            .map(|b| (b.source_y, b.end()))
            .collect();
        assert_eq!(got, vec![(0, 100), (100, 200), (200, 300)]);
    }

    #[test]
    fn snaps_to_smallest_candidate_in_window() {
        let got = bands(300, 100, &[180, 150]);
        assert_eq!(&got[..3], &[(0, 100), (100, 150), (150, 180)]);
    }

    #[test]
    fn boundary_inside_slack_but_beyond_capacity_is_ignored() {
        // 215 lies inside (100, 220) but would make a 115 row band
        assert_eq!(
            bands(400, 100, &[215]),
            vec![(0, 100), (100, 200), (200, 215), (215, 315), (315, 400)]
        );
    }

    #[test]
    fn break_point_past_content_end_is_ignored() {
        assert_eq!(bands(50, 100, &[60]), vec![(0, 50)]);
    }

    #[test]
    fn out_of_window_break_points_change_nothing() {
        assert_eq!(bands(350, 100, &[1000, 2000]), bands(350, 100, &[]));
    }

    #[test]
    fn duplicate_break_points_are_harmless() {
        assert_eq!(bands(300, 100, &[95, 95, 95]), vec![(0, 95), (95, 195), (195, 300)]);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = paginate(10, 0, &BreakPoints::default(), 10).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn partitions_exactly_for_many_inputs() {
        for total in [0u32, 1, 9, 10, 99, 100, 101, 109, 110, 555, 1234, 5000] {
            for cap in [1u32, 7, 50, 100, 333] {
                for bps in [vec![], vec![3, 60, 61, 140, 700], vec![0, total, total + 10]] {
                    let bp = BreakPoints::from_unsorted(bps.clone());
                    let result = paginate(total, cap, &bp, DEFAULT_MIN_FINAL_SLICE).unwrap();
                    assert_partition(total, &result);
                    for band in &result {
                        assert!(band.height <= cap + DEFAULT_MIN_FINAL_SLICE);
                    }
                }
            }
        }
    }

    #[test]
    fn snapping_is_exact_whenever_applicable() {
        let bp = BreakPoints::from_unsorted(vec![130, 290, 310, 505]);
        let result = paginate(800, 100, &bp, DEFAULT_MIN_FINAL_SLICE).unwrap();
        for band in &result {
            let candidate = bp.first_within(band.source_y, band.source_y + 100 + DEFAULT_BREAK_SLACK);
            if let Some(c) = candidate {
                if c - band.source_y <= 100 && band.end() != 800 {
                    assert_eq!(band.height, c - band.source_y, "band {:?}", band);
                }
            }
        }
        assert_eq!(result[0], PageBand { source_y: 0, height: 100 });
        assert_eq!(result[1], PageBand { source_y: 100, height: 30 });
    }

    #[test]
    fn paginate_is_idempotent() {
        let bp = BreakPoints::from_unsorted(vec![95, 410, 388]);
        let a = paginate(1000, 120, &bp, 10).unwrap();
        let b = paginate(1000, 120, &bp, 10).unwrap();
        assert_eq!(a, b);
    }
}
