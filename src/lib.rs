//! Brochure export engine
//!
//! Turns a rendered HTML brochure into a downloadable artifact: a paginated
//! A4 PDF, a single PNG/JPEG image, or an SVG wrapping one raster image.
//!
//! # Pipeline
//!
//! - **Renderer adapter** ([`rendering::adapter`]): mounts markup (or opens an
//!   already rendered frame) in a [`LayoutHost`] and waits for styles and images
//! - **Rasterizer** ([`rendering::raster`]): captures the full scrollable
//!   content at a fixed device-pixel scale onto an opaque background
//! - **Section-boundary detector** ([`rendering::breaks`]): finds section tops
//! - **Paginator** ([`paginate`]): slices the bitmap into page-height bands,
//!   snapping to nearby section boundaries
//! - **Page compositor** ([`compose`]): draws each band on its own PDF page
//! - **Format strategy** ([`export`]): picks PDF/PNG/JPEG/SVG and falls back
//!   from the frame source to the markup source
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(feature = "cdp")]
//! # async fn run() -> brochure_export::Result<()> {
//! use brochure_export::export::{ExportFormat, ExportPipeline, SourcePlan};
//! use brochure_export::ExportConfig;
//!
//! let config = ExportConfig::default();
//! let host = brochure_export::new_host(&config)?;
//! let pipeline = ExportPipeline::new(&host, config)?;
//! let plan = SourcePlan::markup("<section><h1>Hello</h1></section>");
//! let artifact = pipeline.export(&plan, ExportFormat::Pdf, "brochure").await?;
//! artifact.save(".")?;
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

pub mod error;
pub use error::{Error, Result};

pub mod collab;
pub mod compose;
pub mod export;
pub mod paginate;
pub mod rendering;
pub mod request;
pub mod template;

#[cfg(feature = "cdp")]
pub mod cdp;

// Async-friendly exporter handle (worker-thread backed)
pub mod async_api;

pub use async_api::Exporter;
pub use compose::PageFormat;
pub use export::{ExportArtifact, ExportFormat, ExportPipeline, SourcePlan};
pub use paginate::{PageBand, Paginator};
pub use rendering::{Bitmap, RenderSource, RenderSurface};

/// Default selector for section-like elements used as page-break candidates
pub const DEFAULT_SECTION_SELECTOR: &str = r#"section, .section, [class*="section"]"#;

/// Configuration for an export run
///
/// The defaults mirror the values the brochure editor has always used: a 2x
/// oversampling scale, A4 pages with a 5 mm margin, a 1.5 s style settle,
/// 3 s per image and a 0.5 s reflow settle.
///
/// # Examples
///
/// ```
/// let cfg = brochure_export::ExportConfig::default();
/// assert_eq!(cfg.scale, 2);
/// assert_eq!(cfg.image_timeout_ms, 3000);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Device-pixel oversampling applied to the CSS pixel size
    pub scale: u32,
    /// Physical page format for PDF output
    pub page_format: PageFormat,
    /// CSS width of the off-screen host element used for markup sources
    pub host_width: String,
    /// Upper bound for the style readiness wait (and the timed fallback)
    pub style_settle_ms: u64,
    /// Independent timeout applied to each `<img>`
    pub image_timeout_ms: u64,
    /// Delay after images settle so the layout can reflow
    pub reflow_settle_ms: u64,
    /// Deadline for the whole readiness phase of one source
    pub prepare_timeout_ms: u64,
    /// How far past the page end a section boundary may sit and still be snapped to
    pub break_slack: u32,
    /// Trailing slices shorter than this are merged into the previous band
    pub min_final_slice: u32,
    /// Let the first page also end at a section boundary.
    ///
    /// `false` reproduces the editor's in-browser export, which always fills
    /// the first page before it starts looking for section boundaries.
    pub snap_first_band: bool,
    /// JPEG quality, 1..=100
    pub jpeg_quality: u8,
    /// Opaque fill behind transparent regions of the capture
    pub background: [u8; 3],
    /// CSS selector matching section-like elements
    pub section_selector: String,
    /// Browser window used by the layout host
    pub viewport: Viewport,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            scale: 2,
            page_format: PageFormat::a4(),
            host_width: "210mm".to_string(),
            style_settle_ms: 1500,
            image_timeout_ms: 3000,
            reflow_settle_ms: 500,
            prepare_timeout_ms: 30000,
            break_slack: 20,
            min_final_slice: 10,
            snap_first_band: true,
            jpeg_quality: 95,
            background: [255, 255, 255],
            section_selector: DEFAULT_SECTION_SELECTOR.to_string(),
            viewport: Viewport::default(),
        }
    }
}

impl ExportConfig {
    /// Reject settings that would make the pipeline ill-defined
    pub fn validate(&self) -> Result<()> {
        if self.scale == 0 {
            return Err(Error::Config("scale must be at least 1".into()));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(Error::Config(format!(
                "jpeg_quality must be within 1..=100, got {}",
                self.jpeg_quality
            )));
        }
        if self.host_width.trim().is_empty() {
            return Err(Error::Config("host_width must not be empty".into()));
        }
        if self.section_selector.trim().is_empty() {
            return Err(Error::Config("section_selector must not be empty".into()));
        }
        self.page_format.validate()
    }

    /// Load a configuration from a JSON document; missing keys keep their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let cfg: ExportConfig = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn style_settle(&self) -> Duration {
        Duration::from_millis(self.style_settle_ms)
    }

    pub fn image_timeout(&self) -> Duration {
        Duration::from_millis(self.image_timeout_ms)
    }

    pub fn reflow_settle(&self) -> Duration {
        Duration::from_millis(self.reflow_settle_ms)
    }

    pub fn prepare_timeout(&self) -> Duration {
        Duration::from_millis(self.prepare_timeout_ms)
    }
}

/// Viewport dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// Reference to an already rendered `<iframe>` in the host's current page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHandle {
    /// CSS selector resolving the frame element
    pub selector: String,
}

impl FrameHandle {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
        }
    }
}

/// Whether a surface was injected by us or belongs to an existing frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceKind {
    /// Off-screen host element holding injected markup
    Host,
    /// Content root (body) of an embedded frame
    Frame,
}

/// Backend-specific handle to the root element of a render surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceRoot {
    /// Host element id, or the frame selector for [`SurfaceKind::Frame`]
    pub key: String,
    pub kind: SurfaceKind,
}

/// Scrollable content size of a surface root, in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceMetrics {
    pub width: u32,
    pub height: u32,
}

/// Terminal state of one `<img>` wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageState {
    Loaded,
    Errored,
    TimedOut,
}

/// Outcome of the style readiness check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// An explicit signal (fonts + stylesheets) fired
    Ready,
    /// The check hit its bound before the signal fired
    TimedOut,
    /// The document has no observable signal; callers fall back to a timed wait
    Unobservable,
}

/// The DOM/layout engine seam the pipeline is written against.
///
/// Synchronous methods are the pipeline's synchronous phases (mount, measure,
/// capture, scan). The two waits return futures so the adapter can poll every
/// image concurrently and bound each one independently.
pub trait LayoutHost {
    /// Create a host element with the given id, inject `markup`, and attach it
    /// to the live document so CSS and images resolve.
    fn mount_markup(&self, host_id: &str, markup: &str, host_width: &str) -> Result<SurfaceRoot>;

    /// Resolve the content root of an existing frame without re-rendering it.
    ///
    /// Fails with [`Error::AccessDenied`] when the frame's origin blocks
    /// access and [`Error::MissingContent`] when there is no frame or body.
    fn open_frame(&self, frame: &FrameHandle) -> Result<SurfaceRoot>;

    /// Undo whatever `mount_markup`/`open_frame` changed in the live document
    fn release(&self, root: &SurfaceRoot) -> Result<()>;

    /// Scrollable width/height of the root
    fn measure(&self, root: &SurfaceRoot) -> Result<SurfaceMetrics>;

    /// Number of `<img>` elements under the root
    fn image_count(&self, root: &SurfaceRoot) -> Result<usize>;

    /// Resolve once image `index` has loaded or errored
    fn wait_for_image(
        &self,
        root: &SurfaceRoot,
        index: usize,
        timeout: Duration,
    ) -> impl Future<Output = Result<ImageState>>;

    /// Wait for an explicit "styles applied" signal, bounded by `timeout`
    fn wait_for_styles(
        &self,
        root: &SurfaceRoot,
        timeout: Duration,
    ) -> impl Future<Output = Result<Readiness>>;

    /// Capture the full scrollable content of the root as PNG bytes at
    /// `metrics * scale` device pixels.
    fn capture_png(&self, root: &SurfaceRoot, metrics: SurfaceMetrics, scale: u32) -> Result<Vec<u8>>;

    /// Top edges (CSS px, relative to the root's content top) of every
    /// element under the root matching `selector`
    fn section_offsets(&self, root: &SurfaceRoot, selector: &str) -> Result<Vec<f64>>;
}

/// Launch the default layout host (headless Chrome over CDP)
#[cfg(feature = "cdp")]
pub fn new_host(config: &ExportConfig) -> Result<cdp::CdpHost> {
    cdp::CdpHost::launch(config)
}
