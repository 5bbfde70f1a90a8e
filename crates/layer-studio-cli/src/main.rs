use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use layer_studio_canvas::ExportFormat;
use layer_studio_core::config::{Config, ExportConfig, LoggingConfig};
use layer_studio_core::{CANVAS_HEIGHT, CANVAS_WIDTH, ImagePayload, Layer};
use layer_studio_editor::{EditOutcome, Editor, RemovalMethod};

#[derive(Parser)]
#[command(
    name = "layer-studio",
    about = "Layer-based design editor core: generate, cut out, and export designs",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an image from a prompt and export it
    Generate {
        /// Text prompt
        #[arg(short, long)]
        prompt: String,

        /// Export format (png or jpeg)
        #[arg(long, default_value = "png")]
        format: ExportFormat,

        /// Output directory
        #[arg(long)]
        out: Option<String>,
    },

    /// Remove the background from an image file and export the result
    RemoveBg {
        /// Input image
        image: PathBuf,

        /// Use the AI service instead of the local remover
        #[arg(long)]
        ai: bool,

        #[arg(long, default_value = "png")]
        format: ExportFormat,

        #[arg(long)]
        out: Option<String>,
    },

    /// Render a JSON layer array
    Render {
        /// Document file (JSON array of layers)
        document: PathBuf,

        #[arg(long, default_value = "png")]
        format: ExportFormat,

        #[arg(long)]
        out: Option<String>,

        /// Print the SVG markup instead of exporting a raster
        #[arg(long)]
        svg: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Diagnose common issues
    Doctor,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Get a specific config value
    Get { key: String },
}

fn init_logging(logging: &LoggingConfig, verbose: bool) {
    let level = if verbose {
        "debug"
    } else {
        logging.level.as_deref().unwrap_or("info")
    };
    let directives = std::iter::once(level)
        .chain(logging.filters.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(",");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match (logging.format.as_str(), logging.output.as_str()) {
        ("json", "stdout") => builder.json().with_writer(std::io::stdout).init(),
        ("json", _) => builder.json().with_writer(std::io::stderr).init(),
        (_, "stdout") => builder.with_writer(std::io::stdout).init(),
        _ => builder.with_writer(std::io::stderr).init(),
    }
}

fn apply_out_dir(config: &mut Config, out: Option<String>) {
    if let Some(dir) = out {
        config.export.get_or_insert_with(ExportConfig::default).output_dir = Some(dir);
    }
}

/// Turn a coordinator outcome into a CLI error unless it applied.
fn require_applied(outcome: EditOutcome) -> anyhow::Result<()> {
    match outcome {
        EditOutcome::Applied { layer_id } => {
            tracing::debug!(%layer_id, "Edit applied");
            Ok(())
        }
        EditOutcome::Skipped(reason) => anyhow::bail!("Edit skipped: {reason:?}"),
        EditOutcome::Failed { message } => anyhow::bail!(message),
    }
}

async fn export(editor: &Editor, format: ExportFormat) -> anyhow::Result<()> {
    let path = editor
        .export(format)
        .await
        .context("Export failed; see log output for details")?;
    println!("{}", path.display());
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .map(PathBuf::from)
        .unwrap_or_else(Config::config_path);

    let mut config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    init_logging(&config.logging.clone().unwrap_or_default(), cli.verbose);

    match cli.command {
        Commands::Generate { prompt, format, out } => {
            apply_out_dir(&mut config, out);
            let editor = Editor::from_config(&config);
            tracing::info!(%prompt, "Generating image");
            require_applied(editor.generate(&prompt).await)?;
            export(&editor, format).await?;
        }
        Commands::RemoveBg {
            image,
            ai,
            format,
            out,
        } => {
            apply_out_dir(&mut config, out);
            let bytes = tokio::fs::read(&image)
                .await
                .with_context(|| format!("Failed to read {}", image.display()))?;
            let payload = ImagePayload::from_bytes(bytes)?;

            let editor = Editor::from_config(&config);
            let (width, height) = (f64::from(CANVAS_WIDTH), f64::from(CANVAS_HEIGHT));
            let layer = Layer::image(payload, 0.0, 0.0, width, height);
            let id = layer.id;
            editor.replace_all(vec![layer]).await;
            editor.select(Some(id)).await;

            let method = if ai { RemovalMethod::Ai } else { RemovalMethod::Local };
            require_applied(editor.remove_background(method).await)?;
            export(&editor, format).await?;
        }
        Commands::Render {
            document,
            format,
            out,
            svg,
        } => {
            apply_out_dir(&mut config, out);
            let raw = tokio::fs::read_to_string(&document)
                .await
                .with_context(|| format!("Failed to read {}", document.display()))?;
            let layers: Vec<Layer> = serde_json::from_str(&raw)
                .with_context(|| format!("{} is not a JSON layer array", document.display()))?;

            let editor = Editor::from_config(&config);
            editor.replace_all(layers).await;
            if svg {
                println!("{}", editor.scene().await.for_export().to_svg());
            } else {
                export(&editor, format).await?;
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let json = serde_json::to_string_pretty(&config)?;
                println!("{json}");
            }
            ConfigAction::Get { key } => match config.get_path(&key) {
                Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                None => anyhow::bail!("No config value at '{key}'"),
            },
        },
        Commands::Doctor => {
            println!("Layer Studio v{}", env!("CARGO_PKG_VERSION"));
            println!("Config: {}", config_path.display());
            println!("Output dir: {}", config.output_dir().display());

            let (warnings, errors) = config.validate();
            for warning in &warnings {
                println!("  warning: {warning}");
            }
            for error in &errors {
                println!("  error: {error}");
            }
            if !errors.is_empty() {
                anyhow::bail!("{} configuration error(s)", errors.len());
            }
            println!("OK ({} warning(s))", warnings.len());
        }
    }

    Ok(())
}
