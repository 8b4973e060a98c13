//! Integration tests against a real headless Chrome

#![cfg(feature = "cdp")]

use brochure_export::export::{ExportFormat, SourcePlan};
use brochure_export::{ExportConfig, Exporter, FrameHandle};
use std::sync::Once;
use tiny_http::{Response, Server};

static INIT: Once = Once::new();

const BROCHURE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Brochure</title>
<style>body { margin: 0; font-family: sans-serif; } section { height: 900px; padding: 20px; }</style>
</head>
<body>
<section style="background:#3b82f6"><h1>Spring catalogue</h1></section>
<section><h2>Features</h2><img src="/missing.png" alt="gone"></section>
<section style="background:#111827;color:#fff"><h2>Contact</h2></section>
</body>
</html>"#;

// Appends a fourth section once the export has stretched the frame
const GROWING: &str = r#"<!DOCTYPE html>
<html>
<head><style>body { margin: 0; } section { height: 900px; }</style></head>
<body>
<section style="background:#3b82f6"></section>
<section><img src="/missing.png" alt="gone"></section>
<section style="background:#111827"></section>
<script>
let grown = false;
window.addEventListener('resize', function(){
    if (grown) return;
    grown = true;
    setTimeout(function(){ const s = document.createElement('section'); s.style.background = '#10b981'; document.body.appendChild(s); }, 100);
});
</script>
</body>
</html>"#;

/// Start a simple test HTTP server
fn start_test_server() -> String {
    INIT.call_once(|| {
        std::thread::spawn(|| {
            let server = Server::http("127.0.0.1:18090").unwrap();
            for request in server.incoming_requests() {
                let html = "Content-Type: text/html; charset=utf-8"
                    .parse::<tiny_http::Header>()
                    .unwrap();
                let response = match request.url() {
                    "/" => Response::from_string(
                        r#"<!DOCTYPE html><html><body><iframe id="preview" src="/brochure" style="width:794px;height:400px;border:0"></iframe></body></html>"#,
                    )
                    .with_header(html),
                    "/brochure" => Response::from_string(BROCHURE).with_header(html),
                    "/growing-editor" => Response::from_string(
                        r#"<!DOCTYPE html><html><body><iframe id="preview" src="/growing" style="width:794px;height:400px;border:0"></iframe></body></html>"#,
                    )
                    .with_header(html),
                    "/growing" => Response::from_string(GROWING).with_header(html),
                    _ => Response::from_string("Not Found").with_status_code(404),
                };
                let _ = request.respond(response);
            }
        });
        // Give the server time to start
        std::thread::sleep(std::time::Duration::from_millis(100));
    });

    "http://127.0.0.1:18090".to_string()
}

#[tokio::test]
#[ignore] // Requires Chrome to be installed
async fn test_markup_to_pdf() {
    let exporter = Exporter::launch(ExportConfig::default(), None)
        .await
        .expect("Failed to launch exporter");

    let artifact = exporter
        .export(SourcePlan::markup(BROCHURE), ExportFormat::Pdf, "brochure")
        .await
        .expect("Export failed");

    let doc = lopdf::Document::load_mem(&artifact.bytes).unwrap();
    assert!(doc.get_pages().len() >= 2);
    exporter.close().await.unwrap();
}

#[tokio::test]
#[ignore] // Requires Chrome to be installed
async fn test_markup_png_extends_past_viewport() {
    let exporter = Exporter::launch(ExportConfig::default(), None)
        .await
        .expect("Failed to launch exporter");

    let artifact = exporter
        .export(SourcePlan::markup(BROCHURE), ExportFormat::Png, "brochure")
        .await
        .expect("Export failed");

    let img = image::load_from_memory(&artifact.bytes).unwrap().to_rgb8();
    assert!(img.height() >= 2700 * 2);
    // the contact section sits far below the 720 px viewport and is dark
    let px = img.get_pixel(10, img.height() - 20).0;
    assert!(px.iter().all(|c| *c < 64), "{:?}", px);
    exporter.close().await.unwrap();
}

#[tokio::test]
#[ignore] // Requires Chrome to be installed
async fn test_frame_growth_is_captured() {
    let base_url = start_test_server();
    let exporter = Exporter::launch(ExportConfig::default(), Some(format!("{}/growing-editor", base_url)))
        .await
        .expect("Failed to launch exporter");

    let plan = SourcePlan::frame(FrameHandle::new("#preview"));
    let artifact = exporter
        .export(plan, ExportFormat::Png, "growing")
        .await
        .expect("Export failed");

    let img = image::load_from_memory(&artifact.bytes).unwrap().to_rgb8();
    assert!(img.height() >= 3600 * 2, "{}", img.height());
    assert_eq!(img.get_pixel(10, img.height() - 20).0, [0x10, 0xb9, 0x81]);
    exporter.close().await.unwrap();
}

#[tokio::test]
#[ignore] // Requires Chrome to be installed
async fn test_frame_capture_png() {
    let base_url = start_test_server();
    let exporter = Exporter::launch(ExportConfig::default(), Some(base_url))
        .await
        .expect("Failed to launch exporter");

    let plan = SourcePlan::preferred(Some(FrameHandle::new("#preview")), Some(BROCHURE.to_string()));
    let artifact = exporter
        .export(plan, ExportFormat::Png, "preview")
        .await
        .expect("Export failed");

    let img = image::load_from_memory(&artifact.bytes).unwrap();
    assert_eq!(img.width(), 794 * 2);
    assert!(img.height() >= 2700 * 2);
    exporter.close().await.unwrap();
}
