//! Renderer adapter: turn a [`RenderSource`] into a measured, settled surface.
//!
//! Markup sources are mounted into a fresh off-screen host element; frame
//! sources reuse the frame's own content root. Either way the live document is
//! touched, so the surface is held by a [`HostLease`] that undoes the change
//! when released or dropped (success, error, timeout or panic).
//!
//! Readiness is three sequential waits: style readiness (explicit signal,
//! timed fallback), all images concurrently with an independent timeout each,
//! then a short reflow settle.

use crate::rendering::{RenderSource, RenderSurface};
use crate::{Error, ExportConfig, ImageState, LayoutHost, Readiness, Result, SurfaceRoot};
use futures::future::join_all;
use log::{debug, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

static HOST_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Unique id for an off-screen host element, so overlapping exports never share a node
pub fn next_host_id() -> String {
    let n = HOST_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("brochure-export-host-{}-{}", std::process::id(), n)
}

/// Counts of how each `<img>` wait ended
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageSummary {
    pub loaded: usize,
    pub errored: usize,
    pub timed_out: usize,
}

impl ImageSummary {
    pub fn total(&self) -> usize {
        self.loaded + self.errored + self.timed_out
    }

    fn record(&mut self, state: ImageState) {
        match state {
            ImageState::Loaded => self.loaded += 1,
            ImageState::Errored => self.errored += 1,
            ImageState::TimedOut => self.timed_out += 1,
        }
    }
}

/// Exclusive hold on a mounted host element or an opened frame.
///
/// Dropping the lease releases it; [`HostLease::release`] does the same
/// explicitly. Release failures are logged, never raised.
pub struct HostLease<'h, H: LayoutHost> {
    host: &'h H,
    root: Option<SurfaceRoot>,
}

impl<'h, H: LayoutHost> HostLease<'h, H> {
    pub fn new(host: &'h H, root: SurfaceRoot) -> Self {
        Self {
            host,
            root: Some(root),
        }
    }

    pub fn root(&self) -> Option<&SurfaceRoot> {
        self.root.as_ref()
    }

    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if let Some(root) = self.root.take() {
            match self.host.release(&root) {
                Ok(()) => debug!("released {:?} surface {}", root.kind, root.key),
                Err(e) => warn!("Failed to release surface {}: {}", root.key, e),
            }
        }
    }
}

impl<H: LayoutHost> Drop for HostLease<'_, H> {
    fn drop(&mut self) {
        self.release_inner();
    }
}

/// A settled surface together with the lease that keeps it attached
pub struct PreparedSurface<'h, H: LayoutHost> {
    pub surface: RenderSurface,
    lease: HostLease<'h, H>,
}

impl<'h, H: LayoutHost> PreparedSurface<'h, H> {
    pub fn release(self) {
        self.lease.release();
    }
}

/// Acquire a surface for `source`, wait until it is ready, and measure it.
pub async fn prepare<'h, H: LayoutHost>(
    host: &'h H,
    source: &RenderSource,
    config: &ExportConfig,
) -> Result<PreparedSurface<'h, H>> {
    let root = match source {
        RenderSource::Markup(markup) => {
            let id = next_host_id();
            debug!("mounting {} bytes of markup into #{}", markup.len(), id);
            host.mount_markup(&id, markup, &config.host_width)?
        }
        RenderSource::Frame(frame) => {
            debug!("opening frame {}", frame.selector);
            host.open_frame(frame)?
        }
    };
    let lease = HostLease::new(host, root.clone());

    let images = match tokio::time::timeout(config.prepare_timeout(), await_readiness(host, &root, config)).await {
        Ok(res) => res?,
        Err(_) => return Err(Error::Timeout(config.prepare_timeout_ms)),
    };

    let metrics = host.measure(&root)?;
    if metrics.width == 0 || metrics.height == 0 {
        return Err(Error::MissingContent(format!(
            "{} has no renderable area ({}x{})",
            root.key, metrics.width, metrics.height
        )));
    }

    Ok(PreparedSurface {
        surface: RenderSurface {
            root,
            width: metrics.width,
            height: metrics.height,
            images,
        },
        lease,
    })
}

/// Style settle, then every image, then the reflow settle.
pub async fn await_readiness<H: LayoutHost>(
    host: &H,
    root: &SurfaceRoot,
    config: &ExportConfig,
) -> Result<ImageSummary> {
    settle_styles(host, root, config.style_settle()).await;
    let images = settle_images(host, root, config.image_timeout()).await?;
    if images.total() > 0 {
        debug!(
            "images settled: {} loaded, {} errored, {} timed out",
            images.loaded, images.errored, images.timed_out
        );
    }
    tokio::time::sleep(config.reflow_settle()).await;
    Ok(images)
}

async fn settle_styles<H: LayoutHost>(host: &H, root: &SurfaceRoot, bound: Duration) {
    match host.wait_for_styles(root, bound).await {
        Ok(Readiness::Ready) => debug!("styles ready for {}", root.key),
        Ok(Readiness::TimedOut) => warn!("styles not ready after {:?} for {}; capturing anyway", bound, root.key),
        Ok(Readiness::Unobservable) => {
            debug!("no style readiness signal for {}; waiting {:?}", root.key, bound);
            tokio::time::sleep(bound).await;
        }
        Err(e) => {
            warn!("style readiness check failed for {}: {}; waiting {:?}", root.key, e, bound);
            tokio::time::sleep(bound).await;
        }
    }
}

/// Wait for every `<img>` under `root`, each bounded by `per_image`.
///
/// The waits are polled together, so the total wait is bounded by the slowest
/// single image rather than the sum. Failures and timeouts count as settled.
pub async fn settle_images<H: LayoutHost>(
    host: &H,
    root: &SurfaceRoot,
    per_image: Duration,
) -> Result<ImageSummary> {
    let count = host.image_count(root)?;
    let waits = (0..count).map(|index| async move {
        match tokio::time::timeout(per_image, host.wait_for_image(root, index, per_image)).await {
            Ok(Ok(state)) => {
                if state == ImageState::TimedOut {
                    warn!("image #{} did not settle within {:?}", index, per_image);
                }
                state
            }
            Ok(Err(e)) => {
                warn!("image #{} failed to load: {}", index, e);
                ImageState::Errored
            }
            Err(_) => {
                warn!("image #{} did not settle within {:?}", index, per_image);
                ImageState::TimedOut
            }
        }
    });

    let mut summary = ImageSummary::default();
    for state in join_all(waits).await {
        summary.record(state);
    }
    Ok(summary)
}
