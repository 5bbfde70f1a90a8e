//! In-process background removal.
//!
//! Treats the dominant color along the image border as the backdrop and
//! clears every pixel connected to the border whose color lies within the
//! configured tolerance of it. Pixels just outside the tolerance band next
//! to cleared ones are partially faded to soften the cut edge. Output is
//! always PNG.

use std::collections::{HashMap, VecDeque};
use std::io::Cursor;

use async_trait::async_trait;
use image::{ImageFormat, Rgba, RgbaImage};
use tracing::info;

use layer_studio_core::ImagePayload;

use crate::BackgroundRemover;

pub struct LocalBackgroundRemover {
    tolerance: u8,
}

impl LocalBackgroundRemover {
    pub fn new(tolerance: u8) -> Self {
        Self { tolerance }
    }
}

#[async_trait]
impl BackgroundRemover for LocalBackgroundRemover {
    fn id(&self) -> &str {
        "local"
    }

    async fn remove_background(&self, image: &ImagePayload) -> anyhow::Result<ImagePayload> {
        let bytes = image.data().to_vec();
        let tolerance = self.tolerance;
        let (png, cleared) =
            tokio::task::spawn_blocking(move || cut_out(&bytes, tolerance)).await??;
        info!(cleared, tolerance, "Background removed (local)");
        Ok(ImagePayload::png(png))
    }
}

/// Returns the encoded PNG and the number of pixels made fully transparent.
fn cut_out(bytes: &[u8], tolerance: u8) -> anyhow::Result<(Vec<u8>, usize)> {
    let mut img = image::load_from_memory(bytes)?.to_rgba8();
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        anyhow::bail!("image has no pixels");
    }

    let key = backdrop_color(&img);
    let tolerance = f64::from(tolerance);
    let mut cleared = vec![false; (width * height) as usize];
    let mut queue: VecDeque<(u32, u32)> = border_pixels(width, height).collect();
    let mut count = 0;

    while let Some((x, y)) = queue.pop_front() {
        let idx = (y * width + x) as usize;
        if cleared[idx] {
            continue;
        }
        let pixel = img.get_pixel(x, y);
        if pixel[3] > 0 && distance(pixel, key) > tolerance {
            continue;
        }
        cleared[idx] = true;
        count += 1;
        for (nx, ny) in neighbours(x, y, width, height) {
            if !cleared[(ny * width + nx) as usize] {
                queue.push_back((nx, ny));
            }
        }
    }

    for y in 0..height {
        for x in 0..width {
            let idx = (y * width + x) as usize;
            if cleared[idx] {
                img.get_pixel_mut(x, y)[3] = 0;
                continue;
            }
            let touches_cleared = neighbours(x, y, width, height)
                .any(|(nx, ny)| cleared[(ny * width + nx) as usize]);
            if touches_cleared && tolerance > 0.0 {
                let pixel = img.get_pixel_mut(x, y);
                let fade = ((distance(pixel, key) - tolerance) / tolerance).clamp(0.0, 1.0);
                pixel[3] = (f64::from(pixel[3]) * fade).round() as u8;
            }
        }
    }

    let mut png = Vec::new();
    image::DynamicImage::ImageRgba8(img).write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
    Ok((png, count))
}

/// Most common border color, quantized to 4 bits per channel and averaged
/// back to full precision.
fn backdrop_color(img: &RgbaImage) -> [f64; 3] {
    let (width, height) = img.dimensions();
    let mut buckets: HashMap<[u8; 3], (usize, [u64; 3])> = HashMap::new();
    for (x, y) in border_pixels(width, height) {
        let p = img.get_pixel(x, y);
        let entry = buckets
            .entry([p[0] >> 4, p[1] >> 4, p[2] >> 4])
            .or_insert((0, [0; 3]));
        entry.0 += 1;
        for c in 0..3 {
            entry.1[c] += u64::from(p[c]);
        }
    }
    let (count, sums) = buckets
        .into_values()
        .max_by_key(|(count, _)| *count)
        .unwrap_or((1, [0; 3]));
    let n = count.max(1) as f64;
    [sums[0] as f64 / n, sums[1] as f64 / n, sums[2] as f64 / n]
}

fn distance(pixel: &Rgba<u8>, key: [f64; 3]) -> f64 {
    (0..3)
        .map(|c| (f64::from(pixel[c]) - key[c]).powi(2))
        .sum::<f64>()
        .sqrt()
}

fn border_pixels(width: u32, height: u32) -> impl Iterator<Item = (u32, u32)> {
    let horizontal = (0..width).flat_map(move |x| [(x, 0), (x, height - 1)]);
    let vertical = (0..height).flat_map(move |y| [(0, y), (width - 1, y)]);
    horizontal.chain(vertical)
}

fn neighbours(x: u32, y: u32, width: u32, height: u32) -> impl Iterator<Item = (u32, u32)> {
    let candidates = [
        (x.checked_sub(1), Some(y)),
        (x.checked_add(1).filter(|&nx| nx < width), Some(y)),
        (Some(x), y.checked_sub(1)),
        (Some(x), y.checked_add(1).filter(|&ny| ny < height)),
    ];
    candidates
        .into_iter()
        .filter_map(|(nx, ny)| Some((nx?, ny?)))
}
