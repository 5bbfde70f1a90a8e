//! Raster export of a scene to PNG or JPEG.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, RgbaImage};
use resvg::tiny_skia::{Color, Pixmap, Transform};
use resvg::usvg::{self, fontdb};
use tracing::{error, info};

use crate::scene::Scene;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to parse scene markup: {0}")]
    Parse(#[from] usvg::Error),

    #[error("cannot allocate a {width}x{height} raster surface")]
    Surface { width: u32, height: u32 },

    #[error("failed to encode image: {0}")]
    Encode(#[from] image::ImageError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Png,
    Jpeg,
}

impl ExportFormat {
    pub fn file_name(&self) -> &'static str {
        match self {
            ExportFormat::Png => "design.png",
            ExportFormat::Jpeg => "design.jpeg",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Png => "image/png",
            ExportFormat::Jpeg => "image/jpeg",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(ExportFormat::Png),
            "jpeg" | "jpg" => Ok(ExportFormat::Jpeg),
            other => Err(format!("unknown export format '{other}' (expected png or jpeg)")),
        }
    }
}

/// System fonts, loaded once per process.
fn font_database() -> Arc<fontdb::Database> {
    static FONTS: OnceLock<Arc<fontdb::Database>> = OnceLock::new();
    FONTS
        .get_or_init(|| {
            let mut db = fontdb::Database::new();
            db.load_system_fonts();
            Arc::new(db)
        })
        .clone()
}

/// Rasterize a scene as-is and encode it. JPEG output is composited over
/// opaque white; PNG keeps the alpha channel.
pub fn rasterize(
    scene: &Scene,
    format: ExportFormat,
    jpeg_quality: u8,
) -> Result<Vec<u8>, ExportError> {
    let options = usvg::Options {
        fontdb: font_database(),
        ..usvg::Options::default()
    };
    let tree = usvg::Tree::from_str(&scene.to_svg(), &options)?;

    let (width, height) = (scene.width, scene.height);
    let mut pixmap = Pixmap::new(width, height).ok_or(ExportError::Surface { width, height })?;
    if format == ExportFormat::Jpeg {
        pixmap.fill(Color::WHITE);
    }
    resvg::render(&tree, Transform::default(), &mut pixmap.as_mut());

    let mut rgba = RgbaImage::new(width, height);
    for (dst, src) in rgba.pixels_mut().zip(pixmap.pixels()) {
        let color = src.demultiply();
        dst.0 = [color.red(), color.green(), color.blue(), color.alpha()];
    }

    let mut bytes = Vec::new();
    match format {
        ExportFormat::Png => {
            DynamicImage::ImageRgba8(rgba)
                .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        }
        ExportFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgba8(rgba).to_rgb8();
            JpegEncoder::new_with_quality(&mut bytes, jpeg_quality).encode_image(&rgb)?;
        }
    }
    Ok(bytes)
}

/// Export the scene into `out_dir` as `design.png` / `design.jpeg`.
///
/// The surface background and selection outline are stripped first.
/// Failures are logged and yield `None`.
pub async fn export_scene(
    scene: &Scene,
    format: ExportFormat,
    jpeg_quality: u8,
    out_dir: &Path,
) -> Option<PathBuf> {
    let export = scene.for_export();
    let encoded =
        tokio::task::spawn_blocking(move || rasterize(&export, format, jpeg_quality)).await;

    let bytes = match encoded {
        Ok(Ok(bytes)) => bytes,
        Ok(Err(e)) => {
            error!(error = %e, ?format, "Export failed");
            return None;
        }
        Err(e) => {
            error!(error = %e, "Export task aborted");
            return None;
        }
    };

    let path = out_dir.join(format.file_name());
    if let Err(e) = tokio::fs::write(&path, &bytes).await {
        error!(error = %e, path = %path.display(), "Failed to write export");
        return None;
    }
    info!(path = %path.display(), bytes = bytes.len(), ?format, "Design exported");
    Some(path)
}
