//! Chrome DevTools Protocol layout host (uses the `headless_chrome` crate)
//!
//! Every DOM operation is a small script evaluated in the tab. Values are
//! spliced into the scripts as JSON literals, and results that are not plain
//! strings come back as `JSON.stringify` output.

use crate::{
    Error, ExportConfig, FrameHandle, ImageState, LayoutHost, Readiness, Result, SurfaceKind, SurfaceMetrics,
    SurfaceRoot,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::{Browser, LaunchOptions};
use log::debug;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Headless Chrome instance with a single tab acting as the live document
pub struct CdpHost {
    browser: Browser,
    tab: Arc<Tab>,
    background: [u8; 3],
}

#[derive(Debug, Deserialize)]
struct FrameReply {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct Rect {
    x: f64,
    y: f64,
}

impl CdpHost {
    /// Launch Chrome and open a blank tab sized to the configured viewport
    pub fn launch(config: &ExportConfig) -> Result<Self> {
        let launch_options = LaunchOptions::default_builder()
            .headless(true)
            .window_size(Some((config.viewport.width, config.viewport.height)))
            .idle_browser_timeout(Duration::from_secs(600))
            .build()
            .map_err(|e| Error::InitializationError(format!("Failed to build launch options: {}", e)))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| Error::InitializationError(format!("Failed to launch browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| Error::InitializationError(format!("Failed to create tab: {}", e)))?;

        // promise-awaiting evaluations may run up to the whole readiness deadline
        tab.set_default_timeout(Duration::from_millis(config.prepare_timeout_ms.max(20_000)));

        Ok(Self {
            browser,
            tab,
            background: config.background,
        })
    }

    /// Load `url` into the tab, e.g. an editor page holding a preview frame
    pub fn navigate(&self, url: &str) -> Result<()> {
        self.tab.navigate_to(url)?;
        self.tab.wait_until_navigated()?;
        debug!("navigated to {}", url);
        Ok(())
    }

    pub fn close(self) -> Result<()> {
        drop(self.tab);
        drop(self.browser);
        Ok(())
    }

    fn evaluate_string(&self, script: &str, await_promise: bool) -> Result<String> {
        evaluate_string(&self.tab, script, await_promise)
    }

    fn evaluate_json<T: DeserializeOwned>(&self, script: &str) -> Result<T> {
        let raw = self.evaluate_string(script, false)?;
        serde_json::from_str(&raw).map_err(|e| Error::CdpError(format!("Unexpected script result {:?}: {}", raw, e)))
    }

    /// Run a promise-returning script on the blocking pool so several waits
    /// can be in flight at once
    async fn evaluate_promise(&self, script: String) -> Result<String> {
        let tab = Arc::clone(&self.tab);
        tokio::task::spawn_blocking(move || evaluate_string(&tab, &script, true))
            .await
            .map_err(|e| Error::Other(format!("evaluation task failed: {}", e)))?
    }
}

fn evaluate_string(tab: &Tab, script: &str, await_promise: bool) -> Result<String> {
    let result = tab.evaluate(script, await_promise)?;
    match result.value {
        Some(serde_json::Value::String(s)) => Ok(s),
        Some(other) => Ok(other.to_string()),
        None => Err(Error::CdpError("No value returned from evaluation".into())),
    }
}

fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

/// JS expression resolving the root element of `root`, or `null`
fn root_expr(root: &SurfaceRoot) -> String {
    match root.kind {
        SurfaceKind::Host => format!("document.getElementById({})", js_string(&root.key)),
        SurfaceKind::Frame => format!(
            "(function(){{ const f = document.querySelector({}); const d = f && f.contentDocument; return d ? d.documentElement : null; }})()",
            js_string(&root.key)
        ),
    }
}

fn measure_script(root: &SurfaceRoot) -> String {
    match root.kind {
        SurfaceKind::Host => MEASURE_SCRIPT.replace("{{ROOT}}", &root_expr(root)),
        SurfaceKind::Frame => MEASURE_FRAME_SCRIPT.replace("{{SELECTOR}}", &js_string(&root.key)),
    }
}

/// Clip capture that renders past the viewport edge, which
/// `Tab::capture_screenshot` does not request
fn screenshot_command(clip: Page::Viewport) -> Page::CaptureScreenshot {
    Page::CaptureScreenshot {
        format: Some(Page::CaptureScreenshotFormatOption::Png),
        quality: None,
        clip: Some(clip),
        from_surface: Some(true),
        capture_beyond_viewport: Some(true),
        optimize_for_speed: None,
    }
}

const MOUNT_SCRIPT: &str = r#"(function(){
    const host = document.createElement('div');
    host.id = {{ID}};
    host.setAttribute('data-brochure-export', 'host');
    host.style.cssText = 'position:absolute;left:0;top:0;z-index:2147483647;overflow:visible;width:' + {{WIDTH}} + ';background:' + {{BACKGROUND}} + ';';
    host.innerHTML = {{MARKUP}};
    host.querySelectorAll('script').forEach(function(old){
        const s = document.createElement('script');
        for (const a of old.attributes) s.setAttribute(a.name, a.value);
        s.textContent = old.textContent;
        old.replaceWith(s);
    });
    (document.body || document.documentElement).appendChild(host);
    return host.id;
})()"#;

const OPEN_FRAME_SCRIPT: &str = r#"(function(){
    const frame = document.querySelector({{SELECTOR}});
    if (!frame) return JSON.stringify({ error: 'missing', message: 'Frame not found' });
    let doc = null;
    try { doc = frame.contentDocument; } catch (e) { doc = null; }
    if (!doc) return JSON.stringify({ error: 'denied', message: 'Cannot access iframe content' });
    if (!doc.body) return JSON.stringify({ error: 'missing', message: 'Iframe body not found' });
    if (!frame.hasAttribute('data-brochure-export-height')) {
        frame.setAttribute('data-brochure-export-height', frame.style.height || '');
    }
    const h = Math.max(doc.body.scrollHeight, doc.documentElement.scrollHeight);
    frame.style.height = (h + frame.clientTop * 2) + 'px';
    return JSON.stringify({ message: 'ok' });
})()"#;

const RELEASE_HOST_SCRIPT: &str = r#"(function(){
    const el = document.getElementById({{ID}});
    if (el) el.remove();
    return 'ok';
})()"#;

const RELEASE_FRAME_SCRIPT: &str = r#"(function(){
    const frame = document.querySelector({{SELECTOR}});
    if (frame && frame.hasAttribute('data-brochure-export-height')) {
        frame.style.height = frame.getAttribute('data-brochure-export-height');
        frame.removeAttribute('data-brochure-export-height');
    }
    return 'ok';
})()"#;

const MEASURE_SCRIPT: &str = r#"(function(){
    const el = {{ROOT}};
    if (!el) return JSON.stringify({ width: 0, height: 0 });
    return JSON.stringify({ width: Math.ceil(el.scrollWidth), height: Math.ceil(el.scrollHeight) });
})()"#;

// Frames are re-fitted here since content can grow during the readiness waits
const MEASURE_FRAME_SCRIPT: &str = r#"(function(){
    const frame = document.querySelector({{SELECTOR}});
    const doc = frame && frame.contentDocument;
    if (!doc || !doc.body) return JSON.stringify({ width: 0, height: 0 });
    if (!frame.hasAttribute('data-brochure-export-height')) {
        frame.setAttribute('data-brochure-export-height', frame.style.height || '');
    }
    const h = Math.max(doc.body.scrollHeight, doc.documentElement.scrollHeight);
    frame.style.height = (h + frame.clientTop * 2) + 'px';
    const el = doc.documentElement;
    return JSON.stringify({ width: Math.ceil(el.scrollWidth), height: Math.ceil(Math.max(el.scrollHeight, h)) });
})()"#;

const IMAGE_COUNT_SCRIPT: &str = r#"(function(){
    const el = {{ROOT}};
    return String(el ? el.querySelectorAll('img').length : 0);
})()"#;

const IMAGE_WAIT_SCRIPT: &str = r#"new Promise(function(resolve){
    const el = {{ROOT}};
    const img = el ? el.querySelectorAll('img')[{{INDEX}}] : null;
    if (!img) { resolve('loaded'); return; }
    if (img.complete) { resolve(img.naturalWidth > 0 ? 'loaded' : 'errored'); return; }
    const timer = setTimeout(function(){ resolve('timed_out'); }, {{TIMEOUT_MS}});
    img.addEventListener('load', function(){ clearTimeout(timer); resolve('loaded'); }, { once: true });
    img.addEventListener('error', function(){ clearTimeout(timer); resolve('errored'); }, { once: true });
})"#;

const STYLES_WAIT_SCRIPT: &str = r#"new Promise(function(resolve){
    const el = {{ROOT}};
    if (!el || el.querySelector('script[src]')) { resolve('unobservable'); return; }
    const doc = el.ownerDocument;
    const pending = Array.from(el.querySelectorAll('link[rel~="stylesheet"]'))
        .filter(function(l){ return !l.sheet; })
        .map(function(l){
            return new Promise(function(r){
                l.addEventListener('load', r, { once: true });
                l.addEventListener('error', r, { once: true });
            });
        });
    const timer = setTimeout(function(){ resolve('timed_out'); }, {{TIMEOUT_MS}});
    Promise.all([doc.fonts ? doc.fonts.ready : Promise.resolve()].concat(pending))
        .then(function(){ clearTimeout(timer); resolve('ready'); });
})"#;

const HOST_ORIGIN_SCRIPT: &str = r#"(function(){
    const el = document.getElementById({{ID}});
    if (!el) return JSON.stringify({ x: 0, y: 0 });
    const r = el.getBoundingClientRect();
    return JSON.stringify({ x: r.left + window.scrollX, y: r.top + window.scrollY });
})()"#;

const FRAME_ORIGIN_SCRIPT: &str = r#"(function(){
    const f = document.querySelector({{SELECTOR}});
    if (!f) return JSON.stringify({ x: 0, y: 0 });
    const r = f.getBoundingClientRect();
    return JSON.stringify({ x: r.left + f.clientLeft + window.scrollX, y: r.top + f.clientTop + window.scrollY });
})()"#;

const SECTIONS_SCRIPT: &str = r#"(function(){
    const el = {{ROOT}};
    if (!el) return '[]';
    const top = el.getBoundingClientRect().top;
    const tops = Array.from(el.querySelectorAll({{SELECTOR}})).map(function(n){
        return n.getBoundingClientRect().top - top;
    });
    return JSON.stringify(tops);
})()"#;

impl LayoutHost for CdpHost {
    fn mount_markup(&self, host_id: &str, markup: &str, host_width: &str) -> Result<SurfaceRoot> {
        let [r, g, b] = self.background;
        let script = MOUNT_SCRIPT
            .replace("{{ID}}", &js_string(host_id))
            .replace("{{WIDTH}}", &js_string(host_width))
            .replace("{{BACKGROUND}}", &js_string(&format!("rgb({},{},{})", r, g, b)))
            .replace("{{MARKUP}}", &js_string(markup));
        let id = self.evaluate_string(&script, false)?;
        Ok(SurfaceRoot {
            key: id,
            kind: SurfaceKind::Host,
        })
    }

    fn open_frame(&self, frame: &FrameHandle) -> Result<SurfaceRoot> {
        let script = OPEN_FRAME_SCRIPT.replace("{{SELECTOR}}", &js_string(&frame.selector));
        let reply: FrameReply = self.evaluate_json(&script)?;
        match reply.error.as_deref() {
            None => Ok(SurfaceRoot {
                key: frame.selector.clone(),
                kind: SurfaceKind::Frame,
            }),
            Some("denied") => Err(Error::AccessDenied(reply.message)),
            Some(_) => Err(Error::MissingContent(reply.message)),
        }
    }

    fn release(&self, root: &SurfaceRoot) -> Result<()> {
        let script = match root.kind {
            SurfaceKind::Host => RELEASE_HOST_SCRIPT.replace("{{ID}}", &js_string(&root.key)),
            SurfaceKind::Frame => RELEASE_FRAME_SCRIPT.replace("{{SELECTOR}}", &js_string(&root.key)),
        };
        self.evaluate_string(&script, false).map(|_| ())
    }

    fn measure(&self, root: &SurfaceRoot) -> Result<SurfaceMetrics> {
        #[derive(Deserialize)]
        struct Size {
            width: u32,
            height: u32,
        }
        let size: Size = self.evaluate_json(&measure_script(root))?;
        Ok(SurfaceMetrics {
            width: size.width,
            height: size.height,
        })
    }

    fn image_count(&self, root: &SurfaceRoot) -> Result<usize> {
        self.evaluate_json(&IMAGE_COUNT_SCRIPT.replace("{{ROOT}}", &root_expr(root)))
    }

    async fn wait_for_image(&self, root: &SurfaceRoot, index: usize, timeout: Duration) -> Result<ImageState> {
        let script = IMAGE_WAIT_SCRIPT
            .replace("{{ROOT}}", &root_expr(root))
            .replace("{{INDEX}}", &index.to_string())
            .replace("{{TIMEOUT_MS}}", &timeout.as_millis().to_string());
        Ok(match self.evaluate_promise(script).await?.as_str() {
            "loaded" => ImageState::Loaded,
            "timed_out" => ImageState::TimedOut,
            _ => ImageState::Errored,
        })
    }

    async fn wait_for_styles(&self, root: &SurfaceRoot, timeout: Duration) -> Result<Readiness> {
        let script = STYLES_WAIT_SCRIPT
            .replace("{{ROOT}}", &root_expr(root))
            .replace("{{TIMEOUT_MS}}", &timeout.as_millis().to_string());
        Ok(match self.evaluate_promise(script).await?.as_str() {
            "ready" => Readiness::Ready,
            "timed_out" => Readiness::TimedOut,
            _ => Readiness::Unobservable,
        })
    }

    fn capture_png(&self, root: &SurfaceRoot, metrics: SurfaceMetrics, scale: u32) -> Result<Vec<u8>> {
        let origin_script = match root.kind {
            SurfaceKind::Host => HOST_ORIGIN_SCRIPT.replace("{{ID}}", &js_string(&root.key)),
            SurfaceKind::Frame => FRAME_ORIGIN_SCRIPT.replace("{{SELECTOR}}", &js_string(&root.key)),
        };
        let origin: Rect = self.evaluate_json(&origin_script)?;
        let clip = Page::Viewport {
            x: origin.x,
            y: origin.y,
            width: metrics.width as f64,
            height: metrics.height as f64,
            scale: scale as f64,
        };
        let data = self
            .tab
            .call_method(screenshot_command(clip))
            .map_err(|e| Error::RasterizationFailure(format!("Screenshot failed: {}", e)))?
            .data;
        STANDARD
            .decode(data)
            .map_err(|e| Error::RasterizationFailure(format!("Screenshot data is not base64: {}", e)))
    }

    fn section_offsets(&self, root: &SurfaceRoot, selector: &str) -> Result<Vec<f64>> {
        let script = SECTIONS_SCRIPT
            .replace("{{ROOT}}", &root_expr(root))
            .replace("{{SELECTOR}}", &js_string(selector));
        self.evaluate_json(&script)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_are_spliced_as_json_literals() {
        assert_eq!(js_string(r#"a"b</script>"#), r#""a\"b</script>""#);
        let root = SurfaceRoot {
            key: "host-1".into(),
            kind: SurfaceKind::Host,
        };
        assert_eq!(root_expr(&root), r#"document.getElementById("host-1")"#);
        let frame = SurfaceRoot {
            key: "iframe[title='Preview']".into(),
            kind: SurfaceKind::Frame,
        };
        assert!(root_expr(&frame).contains(r#"document.querySelector("iframe[title='Preview']")"#));
    }

    #[test]
    fn screenshot_renders_beyond_the_viewport() {
        let clip = Page::Viewport {
            x: 0.0,
            y: 0.0,
            width: 794.0,
            height: 3000.0,
            scale: 2.0,
        };
        let command = screenshot_command(clip);
        assert_eq!(command.capture_beyond_viewport, Some(true));
        assert_eq!(command.from_surface, Some(true));
        assert_eq!(command.clip.map(|c| c.height), Some(3000.0));
    }

    #[test]
    fn frames_are_refitted_when_measured() {
        let frame = SurfaceRoot {
            key: "#preview".into(),
            kind: SurfaceKind::Frame,
        };
        let script = measure_script(&frame);
        assert!(script.contains(r##"document.querySelector("#preview")"##));
        assert!(script.contains("frame.style.height ="));

        let host = SurfaceRoot {
            key: "host-1".into(),
            kind: SurfaceKind::Host,
        };
        assert!(!measure_script(&host).contains("style.height"));
    }

    #[test]
    fn test_cdp_host_creation() {
        // This test requires Chrome to be installed, so we skip it in CI
        if std::env::var("CI").is_ok() {
            return;
        }
        let result = CdpHost::launch(&ExportConfig::default());
        if let Err(e) = result {
            eprintln!("Skipping CDP host creation test because Chrome is not available or failed to launch: {}", e);
            return;
        }
        assert!(result.is_ok());
    }
}
