//! Field editor command line host
//!
//! Loads a PDF, declares fields, replays drag gestures and writes the stamped
//! PDF and/or the field config manifest.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use pop_editor_core::{
    DocumentSource, DragEvent, EditorConfig, LopdfLoader, OverlayHost, PopEditor, RenderOutcome,
    RenderSurface,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "pop-editor")]
#[command(
    version,
    about = "Place field markers on a PDF page and stamp them into the document"
)]
struct Args {
    /// PDF to edit
    #[arg(short, long)]
    input: PathBuf,

    /// Field id to overlay (repeatable)
    #[arg(short, long = "field")]
    fields: Vec<String>,

    /// Drag gesture as field:dx:dy in rendered pixels (repeatable, applied in order)
    #[arg(long = "drag", value_parser = parse_drag)]
    drags: Vec<DragSpec>,

    /// Page to render (1-indexed)
    #[arg(short, long)]
    page: Option<u32>,

    /// Zoom, clamped to the configured bounds
    #[arg(short, long)]
    scale: Option<f64>,

    /// Rotation in degrees, multiple of 90
    #[arg(short, long, allow_negative_numbers = true)]
    rotation: Option<i64>,

    /// JSON editor config; POP_* environment variables override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Where to write the stamped PDF
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Where to write the config manifest ("-" for stdout)
    #[arg(long)]
    config_out: Option<String>,

    /// Fail if a declared field has no recorded position
    #[arg(long)]
    strict: bool,
}

#[derive(Debug, Clone, PartialEq)]
struct DragSpec {
    field_id: String,
    dx: f64,
    dy: f64,
}

fn parse_drag(s: &str) -> Result<DragSpec, String> {
    let mut parts = s.rsplitn(3, ':');
    let (dy, dx, field_id) = match (parts.next(), parts.next(), parts.next()) {
        (Some(dy), Some(dx), Some(field_id)) if !field_id.is_empty() => (dy, dx, field_id),
        _ => return Err(format!("expected field:dx:dy, got '{}'", s)),
    };
    let dx = dx
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid dx '{}': {}", dx, e))?;
    let dy = dy
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid dy '{}': {}", dy, e))?;

    Ok(DragSpec {
        field_id: field_id.to_string(),
        dx,
        dy,
    })
}

impl DragSpec {
    fn events(&self) -> [DragEvent; 3] {
        [
            DragEvent::Start {
                field_id: self.field_id.clone(),
            },
            DragEvent::Move {
                field_id: self.field_id.clone(),
                dx: self.dx,
                dy: self.dy,
            },
            DragEvent::End {
                field_id: self.field_id.clone(),
            },
        ]
    }
}

/// Surface with no pixels; only its size is tracked
#[derive(Debug, Default)]
struct HeadlessSurface {
    width: u32,
    height: u32,
}

impl RenderSurface for HeadlessSurface {
    fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Host without a marker view; bindings and transforms are logged
#[derive(Debug, Default)]
struct LoggingHost;

impl OverlayHost for LoggingHost {
    fn bind_draggable(&mut self, field_id: &str, selector: &str) {
        tracing::debug!(field = field_id, selector, "marker bound");
    }

    fn set_transform(&mut self, field_id: &str, transform: &str) {
        tracing::debug!(field = field_id, transform, "marker moved");
    }
}

async fn load_config(args: &Args) -> Result<EditorConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let json = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading config {}", path.display()))?;
            EditorConfig::from_json(&json)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => EditorConfig::default(),
    }
    .with_env()
    .context("applying POP_* environment overrides")?;

    if args.strict {
        config.strict_export = true;
    }
    Ok(config)
}

fn log_outcome(what: &str, outcome: Option<RenderOutcome>) {
    match outcome {
        Some(RenderOutcome::PendingFailed { page, error, .. }) => {
            tracing::warn!(page, %error, "{} re-rendered, queued page failed", what);
        }
        Some(outcome) => tracing::debug!(?outcome, "{} re-rendered", what),
        None => {}
    }
}

async fn run(args: Args) -> Result<()> {
    if args.output.is_none() && args.config_out.is_none() {
        tracing::info!("no --output or --config-out given, writing config manifest to stdout");
    }

    let config = load_config(&args).await?;
    let editor = PopEditor::new(
        config,
        LopdfLoader,
        LoggingHost,
        Box::new(HeadlessSurface::default()),
    )
    .context("creating editor")?;

    editor.set_fields(args.fields.iter().cloned()).await?;

    let source = DocumentSource::Url(args.input.to_string_lossy().into_owned());
    editor
        .load(source)
        .await
        .with_context(|| format!("loading {}", args.input.display()))?;

    if let Some(scale) = args.scale {
        log_outcome("scale", editor.set_scale(scale).await?);
    }
    if let Some(rotation) = args.rotation {
        log_outcome("rotation", editor.set_rotation(rotation).await?);
    }
    if let Some(page) = args.page {
        log_outcome(
            "page",
            editor
                .set_page(page)
                .await
                .with_context(|| format!("rendering page {}", page))?,
        );
    }

    for spec in &args.drags {
        let mut moved = false;
        for event in spec.events() {
            moved |= editor.drag(&event);
        }
        if !moved {
            tracing::warn!(field = %spec.field_id, "drag ignored, field is not declared");
        }
    }

    if let Some(output) = &args.output {
        let modified = editor.export_document().context("stamping fields")?;
        tokio::fs::write(output, &modified.bytes)
            .await
            .with_context(|| format!("writing {}", output.display()))?;
        tracing::info!(path = %output.display(), bytes = modified.bytes.len(), "wrote stamped PDF");
    }

    match args.config_out.as_deref() {
        Some("-") => println!("{}", editor.generate_config_json()?),
        Some(path) => {
            let json = editor.generate_config_json()?;
            tokio::fs::write(path, json)
                .await
                .with_context(|| format!("writing {}", path))?;
            tracing::info!(path, "wrote config manifest");
        }
        None if args.output.is_none() => println!("{}", editor.generate_config_json()?),
        None => {}
    }

    let orphans = editor.orphans();
    if !orphans.is_empty() {
        tracing::debug!(?orphans, "positions kept for undeclared fields");
    }

    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // stdout may carry the config manifest, so logs go to stderr
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if args.fields.is_empty() {
        bail!("at least one --field is required");
    }

    run(args).await
}
