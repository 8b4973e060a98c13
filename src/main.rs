use brochure_export::export::ExportFormat;
use brochure_export::request::ExportRequest;
use brochure_export::template::{BasicTemplate, TemplateRenderer};
use brochure_export::{ExportConfig, Result};
use clap::Parser;
use std::env;
use std::path::PathBuf;

/// Export an HTML brochure as a paginated PDF, a PNG/JPEG image or an SVG
#[derive(Parser, Debug)]
#[command(name = "brochure-export", version, about, long_about = None)]
struct Args {
    /// HTML document to export (or an export request JSON with --request)
    input: PathBuf,

    /// Output format: pdf, png, jpg/jpeg or svg
    #[arg(short, long, default_value = "pdf")]
    format: ExportFormat,

    /// Directory the artifact is written to
    #[arg(short, long, default_value = ".")]
    out: PathBuf,

    /// Artifact file name; defaults to the input's file stem
    #[arg(short, long)]
    name: Option<String>,

    /// JSON file with export settings; missing keys keep their defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the device-pixel scale
    #[arg(long)]
    scale: Option<u32>,

    /// Treat the input as an export request and render it with the basic template
    #[arg(long, default_value_t = false)]
    request: bool,

    /// Page to load before exporting, e.g. an editor holding a preview frame
    #[arg(long)]
    url: Option<String>,

    /// Selector of an iframe on --url to capture before falling back to the input
    #[arg(long, requires = "url")]
    frame: Option<String>,
}

fn load_config(args: &Args) -> Result<ExportConfig> {
    let mut config = match &args.config {
        Some(path) => ExportConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => ExportConfig::default(),
    };
    if let Some(scale) = args.scale {
        config.scale = scale;
    }
    config.validate()?;
    Ok(config)
}

fn load_markup(args: &Args) -> Result<String> {
    let text = std::fs::read_to_string(&args.input)?;
    if args.request {
        BasicTemplate.render(&ExportRequest::from_json(&text)?)
    } else {
        Ok(text)
    }
}

#[cfg(feature = "cdp")]
async fn run(args: Args) -> Result<()> {
    use brochure_export::{ExportPipeline, FrameHandle, SourcePlan};

    let config = load_config(&args)?;
    let markup = load_markup(&args)?;
    let name = args.name.clone().unwrap_or_else(|| {
        args.input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "brochure".to_string())
    });

    let host = brochure_export::new_host(&config)?;
    if let Some(url) = &args.url {
        host.navigate(url)?;
    }

    let plan = SourcePlan::preferred(args.frame.clone().map(FrameHandle::new), Some(markup));
    let pipeline = ExportPipeline::new(&host, config)?;
    let artifact = pipeline.export(&plan, args.format, &name).await?;
    let path = artifact.save(&args.out)?;

    match artifact.page_count {
        Some(pages) => println!("Wrote {} ({} pages)", path.display(), pages),
        None => println!("Wrote {}", path.display()),
    }
    Ok(())
}

#[cfg(not(feature = "cdp"))]
async fn run(args: Args) -> Result<()> {
    load_config(&args)?;
    load_markup(&args)?;
    Err(brochure_export::Error::InitializationError(
        "built without the `cdp` feature; no layout host available".into(),
    ))
}

#[tokio::main]
async fn main() {
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "brochure_export=info");
    }
    env_logger::init();

    let args = Args::parse();
    if let Err(e) = run(args).await {
        eprintln!("Export failed ({}): {}", e.kind(), e);
        std::process::exit(1);
    }
}
