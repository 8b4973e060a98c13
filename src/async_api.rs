use crate::export::{ExportArtifact, ExportFormat, ExportPipeline, SourcePlan};
use crate::request::ExportRequest;
use crate::template::TemplateRenderer;
use crate::{Error, ExportConfig, FrameHandle, LayoutHost, Result};
use log::debug;
use std::sync::mpsc::{self, Sender};
use std::thread;
use tokio::sync::oneshot;

enum Command {
    Export {
        plan: SourcePlan,
        format: ExportFormat,
        filename: String,
        resp: oneshot::Sender<Result<ExportArtifact>>,
    },
    Close(oneshot::Sender<Result<()>>),
}

/// An async-friendly exporter backed by a dedicated worker thread.
///
/// The worker thread owns the layout host and runs each export to completion
/// on its own current-thread runtime, so callers get an async interface
/// without the host having to be `Send`. Jobs are served in submission order.
#[derive(Clone)]
pub struct Exporter {
    cmd_tx: Sender<Command>,
}

impl Exporter {
    /// Spawn the worker and build the host on it with `factory`
    pub async fn with_host<H, F>(config: ExportConfig, factory: F) -> Result<Self>
    where
        H: LayoutHost + 'static,
        F: FnOnce(&ExportConfig) -> Result<H> + Send + 'static,
    {
        config.validate()?;

        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
        let (init_tx, init_rx): (oneshot::Sender<Result<()>>, oneshot::Receiver<Result<()>>) = oneshot::channel();

        thread::spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread().enable_time().build() {
                Ok(rt) => rt,
                Err(err) => {
                    let _ = init_tx.send(Err(Error::InitializationError(format!(
                        "Failed to start worker runtime: {}",
                        err
                    ))));
                    return;
                }
            };

            // Initialize host on the worker thread
            let host = match factory(&config) {
                Ok(h) => h,
                Err(err) => {
                    let _ = init_tx.send(Err(err));
                    return;
                }
            };
            let pipeline = match ExportPipeline::new(&host, config) {
                Ok(p) => p,
                Err(err) => {
                    let _ = init_tx.send(Err(err));
                    return;
                }
            };

            let _ = init_tx.send(Ok(()));

            // Command loop
            while let Ok(cmd) = cmd_rx.recv() {
                match cmd {
                    Command::Export {
                        plan,
                        format,
                        filename,
                        resp,
                    } => {
                        let res = runtime.block_on(pipeline.export(&plan, format, &filename));
                        let _ = resp.send(res);
                    }
                    Command::Close(resp) => {
                        drop(pipeline);
                        drop(host);
                        let _ = resp.send(Ok(()));
                        debug!("export worker stopped");
                        return;
                    }
                }
            }
        });

        // Wait for the worker to report initialization success or failure
        let init_res = init_rx
            .await
            .map_err(|e| Error::Other(format!("Worker init canceled: {}", e)))?;
        init_res?;

        Ok(Self { cmd_tx })
    }

    /// Launch headless Chrome on the worker, optionally loading `url` first
    #[cfg(feature = "cdp")]
    pub async fn launch(config: ExportConfig, url: Option<String>) -> Result<Self> {
        Self::with_host(config, move |cfg| {
            let host = crate::cdp::CdpHost::launch(cfg)?;
            if let Some(url) = url {
                host.navigate(&url)?;
            }
            Ok(host)
        })
        .await
    }

    /// Export from the first source in `plan` that succeeds
    pub async fn export(&self, plan: SourcePlan, format: ExportFormat, filename: &str) -> Result<ExportArtifact> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Export {
                plan,
                format,
                filename: filename.to_string(),
                resp: tx,
            })
            .map_err(|_| Error::Other("Export worker has stopped".into()))?;
        rx.await
            .map_err(|e| Error::Other(format!("Export canceled: {}", e)))?
    }

    /// Render `request` with `template` on the caller's side, then export it
    pub async fn export_request<T: TemplateRenderer>(
        &self,
        request: &ExportRequest,
        template: &T,
        frame: Option<FrameHandle>,
        format: ExportFormat,
        filename: &str,
    ) -> Result<ExportArtifact> {
        let markup = template.render(request)?;
        self.export(SourcePlan::preferred(frame, Some(markup)), format, filename)
            .await
    }

    /// Shut down the worker and drop the host
    pub async fn close(self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        let _ = self.cmd_tx.send(Command::Close(tx));
        rx.await
            .map_err(|e| Error::Other(format!("Close canceled: {}", e)))?
    }
}
