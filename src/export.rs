//! Format strategy: drive the pipeline for one output format and pick the
//! source to capture from.
//!
//! Sources are tried in order (normally the live frame first, then the
//! markup). The first success wins; a failure is logged and the next source
//! is tried; the last source's error is returned.

use crate::compose::compose;
use crate::paginate::Paginator;
use crate::rendering::{detect_break_points, prepare, rasterize, Bitmap, BreakPoints, RenderSource};
use crate::request::ExportRequest;
use crate::template::TemplateRenderer;
use crate::{Error, ExportConfig, FrameHandle, LayoutHost, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;

/// Output format of an export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    Pdf,
    Png,
    Jpeg,
    Svg,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Pdf => "pdf",
            ExportFormat::Png => "png",
            ExportFormat::Jpeg => "jpg",
            ExportFormat::Svg => "svg",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Pdf => "application/pdf",
            ExportFormat::Png => "image/png",
            ExportFormat::Jpeg => "image/jpeg",
            ExportFormat::Svg => "image/svg+xml",
        }
    }

    /// `brochure` → `brochure.pdf`; a name that already carries the extension is kept
    pub fn file_name(&self, stem: &str) -> String {
        let stem = if stem.trim().is_empty() { "brochure" } else { stem.trim() };
        let lower = stem.to_ascii_lowercase();
        let has_ext = match self {
            ExportFormat::Jpeg => lower.ends_with(".jpg") || lower.ends_with(".jpeg"),
            other => lower.ends_with(&format!(".{}", other.extension())),
        };
        if has_ext {
            stem.to_string()
        } else {
            format!("{}.{}", stem, self.extension())
        }
    }
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdf" => Ok(ExportFormat::Pdf),
            "png" => Ok(ExportFormat::Png),
            "jpg" | "jpeg" => Ok(ExportFormat::Jpeg),
            "svg" => Ok(ExportFormat::Svg),
            other => Err(Error::Config(format!("unknown export format: {}", other))),
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// A finished export. Never returned partially.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub format: ExportFormat,
    pub filename: String,
    pub bytes: Vec<u8>,
    /// Number of pages, for PDF artifacts
    pub page_count: Option<usize>,
}

impl ExportArtifact {
    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    /// Write the artifact into `dir` under its filename
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let path = dir.as_ref().join(&self.filename);
        std::fs::write(&path, &self.bytes)?;
        Ok(path)
    }
}

/// Ordered list of sources to try
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePlan {
    pub strategies: Vec<RenderSource>,
}

impl SourcePlan {
    pub fn markup(markup: impl Into<String>) -> Self {
        Self {
            strategies: vec![RenderSource::Markup(markup.into())],
        }
    }

    pub fn frame(frame: FrameHandle) -> Self {
        Self {
            strategies: vec![RenderSource::Frame(frame)],
        }
    }

    /// The live frame first when there is one, then the markup
    pub fn preferred(frame: Option<FrameHandle>, markup: Option<String>) -> Self {
        let strategies = frame
            .map(RenderSource::Frame)
            .into_iter()
            .chain(markup.map(RenderSource::Markup))
            .collect();
        Self { strategies }
    }
}

/// Runs exports against one layout host
pub struct ExportPipeline<'h, H: LayoutHost> {
    host: &'h H,
    config: ExportConfig,
}

impl<'h, H: LayoutHost> ExportPipeline<'h, H> {
    pub fn new(host: &'h H, config: ExportConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { host, config })
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Export from the first source in `plan` that succeeds
    pub async fn export(&self, plan: &SourcePlan, format: ExportFormat, filename: &str) -> Result<ExportArtifact> {
        let mut last_err = None;
        for (i, source) in plan.strategies.iter().enumerate() {
            match self.export_from(source, format, filename).await {
                Ok(artifact) => return Ok(artifact),
                Err(e) => {
                    if i + 1 < plan.strategies.len() {
                        warn!(
                            "{} source failed ({}): {}; trying the next source",
                            source.label(),
                            e.kind(),
                            e
                        );
                    }
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| Error::MissingContent("no export source given".into())))
    }

    /// Render `request` through `template`, then export it, preferring `frame`
    /// when it is given
    pub async fn export_request<T: TemplateRenderer>(
        &self,
        request: &ExportRequest,
        template: &T,
        frame: Option<FrameHandle>,
        format: ExportFormat,
        filename: &str,
    ) -> Result<ExportArtifact> {
        let markup = template.render(request)?;
        let plan = SourcePlan::preferred(frame, Some(markup));
        self.export(&plan, format, filename).await
    }

    /// Run the whole pipeline against a single source
    pub async fn export_from(
        &self,
        source: &RenderSource,
        format: ExportFormat,
        filename: &str,
    ) -> Result<ExportArtifact> {
        let started = Instant::now();
        let prepared = prepare(self.host, source, &self.config).await?;
        let surface = prepared.surface.clone();
        debug!(
            "{} surface {} ready: {}x{} css px",
            source.label(),
            surface.root.key,
            surface.width,
            surface.height
        );

        let bitmap = rasterize(self.host, &surface, self.config.scale, self.config.background)?;

        let (bytes, page_count) = match format {
            ExportFormat::Pdf => {
                let break_points =
                    detect_break_points(self.host, &surface, &self.config.section_selector, bitmap.height())?;
                prepared.release();
                let (pdf, pages) = self.paginate_and_compose(&bitmap, &break_points)?;
                (pdf, Some(pages))
            }
            ExportFormat::Png => {
                prepared.release();
                (bitmap.encode_png()?, None)
            }
            ExportFormat::Jpeg => {
                prepared.release();
                (bitmap.encode_jpeg(self.config.jpeg_quality)?, None)
            }
            ExportFormat::Svg => {
                prepared.release();
                (wrap_svg(&bitmap)?.into_bytes(), None)
            }
        };

        let artifact = ExportArtifact {
            format,
            filename: format.file_name(filename),
            bytes,
            page_count,
        };
        info!(
            "exported {} ({} bytes{}) from {} source in {:?}",
            artifact.filename,
            artifact.bytes.len(),
            page_count.map(|n| format!(", {} pages", n)).unwrap_or_default(),
            source.label(),
            started.elapsed()
        );
        Ok(artifact)
    }

    fn paginate_and_compose(
        &self,
        bitmap: &Bitmap,
        break_points: &BreakPoints,
    ) -> Result<(Vec<u8>, usize)> {
        let format = &self.config.page_format;
        let capacity = format.capacity_px(bitmap.width());
        let bands = Paginator::from_config(&self.config).paginate(bitmap.height(), capacity, break_points)?;
        debug!(
            "{} rows at {} rows/page -> {} bands",
            bitmap.height(),
            capacity,
            bands.len()
        );
        let composer = compose(bitmap, &bands, format)?;
        let pages = composer.page_count();
        Ok((composer.to_bytes()?, pages))
    }
}

/// SVG document holding exactly one `<image>` that embeds `bitmap` as a PNG
/// data URI, sized to the bitmap's pixel dimensions.
pub fn wrap_svg(bitmap: &Bitmap) -> Result<String> {
    let png = bitmap.encode_png()?;
    let (w, h) = (bitmap.width(), bitmap.height());
    Ok(format!(
        concat!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" "#,
            r#"width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            r#"<image width="{w}" height="{h}" href="data:image/png;base64,{data}" xlink:href="data:image/png;base64,{data}"/>"#,
            "</svg>"
        ),
        w = w,
        h = h,
        data = STANDARD.encode(png)
    ))
}
