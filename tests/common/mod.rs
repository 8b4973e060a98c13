//! In-process layout host used by the integration tests

#![allow(dead_code)]

use brochure_export::{
    Error, FrameHandle, ImageState, LayoutHost, Readiness, Result, SurfaceKind, SurfaceMetrics, SurfaceRoot,
};
use image::{ImageFormat, Rgba, RgbaImage};
use std::collections::HashSet;
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageBehavior {
    LoadsAfter(Duration),
    Never,
    Errors,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameMode {
    Accessible,
    CrossOrigin,
    Missing,
}

#[derive(Debug, Clone)]
pub struct FakeOptions {
    /// Content size in CSS pixels
    pub width: u32,
    pub height: u32,
    /// Section tops in CSS pixels
    pub sections: Vec<f64>,
    pub images: Vec<ImageBehavior>,
    pub frame: FrameMode,
    pub styles: Readiness,
    pub fail_capture: bool,
    /// Capture fully transparent pixels instead of opaque stripes
    pub transparent: bool,
    /// Stop the capture after this many device rows, like a viewport-bound screenshot
    pub capture_rows: Option<u32>,
}

impl Default for FakeOptions {
    fn default() -> Self {
        Self {
            width: 200,
            height: 1000,
            sections: Vec::new(),
            images: Vec::new(),
            frame: FrameMode::Accessible,
            styles: Readiness::Ready,
            fail_capture: false,
            transparent: false,
            capture_rows: None,
        }
    }
}

/// What the fake saw, shared with the test after the host moves elsewhere
#[derive(Debug, Default)]
pub struct FakeState {
    pub attached: HashSet<String>,
    pub mounted: Vec<String>,
    pub markup: Vec<String>,
    pub opened_frames: Vec<String>,
    pub released: Vec<String>,
    pub captures: Vec<(u32, u32, u32)>,
}

pub struct FakeHost {
    pub options: FakeOptions,
    pub state: Arc<Mutex<FakeState>>,
}

impl FakeHost {
    pub fn new(options: FakeOptions) -> Self {
        Self::with_state(options, Arc::new(Mutex::new(FakeState::default())))
    }

    pub fn with_state(options: FakeOptions, state: Arc<Mutex<FakeState>>) -> Self {
        Self { options, state }
    }

    pub fn attached(&self) -> usize {
        self.state.lock().unwrap().attached.len()
    }

    pub fn mounted(&self) -> Vec<String> {
        self.state.lock().unwrap().mounted.clone()
    }

    pub fn released(&self) -> Vec<String> {
        self.state.lock().unwrap().released.clone()
    }
}

impl LayoutHost for FakeHost {
    fn mount_markup(&self, host_id: &str, markup: &str, _host_width: &str) -> Result<SurfaceRoot> {
        let mut state = self.state.lock().unwrap();
        state.attached.insert(host_id.to_string());
        state.mounted.push(host_id.to_string());
        state.markup.push(markup.to_string());
        Ok(SurfaceRoot {
            key: host_id.to_string(),
            kind: SurfaceKind::Host,
        })
    }

    fn open_frame(&self, frame: &FrameHandle) -> Result<SurfaceRoot> {
        match self.options.frame {
            FrameMode::CrossOrigin => Err(Error::AccessDenied("Cannot access iframe content".into())),
            FrameMode::Missing => Err(Error::MissingContent("Iframe body not found".into())),
            FrameMode::Accessible => {
                let mut state = self.state.lock().unwrap();
                state.attached.insert(frame.selector.clone());
                state.opened_frames.push(frame.selector.clone());
                Ok(SurfaceRoot {
                    key: frame.selector.clone(),
                    kind: SurfaceKind::Frame,
                })
            }
        }
    }

    fn release(&self, root: &SurfaceRoot) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.attached.remove(&root.key);
        state.released.push(root.key.clone());
        Ok(())
    }

    fn measure(&self, _root: &SurfaceRoot) -> Result<SurfaceMetrics> {
        Ok(SurfaceMetrics {
            width: self.options.width,
            height: self.options.height,
        })
    }

    fn image_count(&self, _root: &SurfaceRoot) -> Result<usize> {
        Ok(self.options.images.len())
    }

    async fn wait_for_image(&self, _root: &SurfaceRoot, index: usize, _timeout: Duration) -> Result<ImageState> {
        match self.options.images[index] {
            ImageBehavior::LoadsAfter(delay) => {
                tokio::time::sleep(delay).await;
                Ok(ImageState::Loaded)
            }
            ImageBehavior::Never => std::future::pending().await,
            ImageBehavior::Errors => Ok(ImageState::Errored),
        }
    }

    async fn wait_for_styles(&self, _root: &SurfaceRoot, _timeout: Duration) -> Result<Readiness> {
        Ok(self.options.styles)
    }

    fn capture_png(&self, _root: &SurfaceRoot, metrics: SurfaceMetrics, scale: u32) -> Result<Vec<u8>> {
        if self.options.fail_capture {
            return Err(Error::RasterizationFailure("compositor went away".into()));
        }
        self.state
            .lock()
            .unwrap()
            .captures
            .push((metrics.width, metrics.height, scale));

        let (w, mut h) = (metrics.width * scale, metrics.height * scale);
        if let Some(rows) = self.options.capture_rows {
            h = h.min(rows);
        }
        let transparent = self.options.transparent;
        let img = RgbaImage::from_fn(w, h, |_, y| {
            if transparent {
                Rgba([0, 0, 0, 0])
            } else if (y / 100) % 2 == 0 {
                Rgba([30, 60, 200, 255])
            } else {
                Rgba([240, 200, 40, 255])
            }
        });
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png)
            .map_err(|e| Error::RasterizationFailure(e.to_string()))?;
        Ok(buf.into_inner())
    }

    fn section_offsets(&self, _root: &SurfaceRoot, _selector: &str) -> Result<Vec<f64>> {
        Ok(self.options.sections.clone())
    }
}
