//! Scene construction and SVG serialization.
//!
//! A [`Scene`] is the painted form of a document: one node per layer in
//! paint order (bottom first), each rotated about its own center, plus the
//! selection outline. It serializes to standalone SVG markup that both the
//! editor surface and the rasterizer consume.

use std::fmt::Write as _;

use layer_studio_core::layer::LayerKind;
use layer_studio_core::{CANVAS_HEIGHT, CANVAS_WIDTH, DocumentStore, Layer, LayerId, ShapeType};

/// Text baseline offset below the layer origin, as a fraction of font size.
const BASELINE_RATIO: f64 = 0.8;

/// Gap between a selected layer's box and its dashed outline.
const OUTLINE_MARGIN: f64 = 2.0;
const OUTLINE_COLOR: &str = "#0078d7";

#[derive(Debug, Clone, Default)]
pub struct SceneOptions {
    /// Surface background color shown behind the layers in the editor.
    pub background: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub width: u32,
    pub height: u32,
    pub background: Option<String>,
    pub nodes: Vec<SceneNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub layer_id: LayerId,
    /// Rotation in degrees about `pivot`.
    pub rotation: f64,
    pub pivot: (f64, f64),
    pub primitive: Primitive,
    /// Dashed selection outline, `(x, y, width, height)`.
    pub outline: Option<(f64, f64, f64, f64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Text {
        x: f64,
        baseline: f64,
        text: String,
        font_family: String,
        font_size: f64,
        font_weight: u16,
        fill: String,
    },
    Rect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        fill: String,
    },
    Ellipse {
        cx: f64,
        cy: f64,
        rx: f64,
        ry: f64,
        fill: String,
    },
    Image {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        href: String,
    },
}

impl Primitive {
    fn for_layer(layer: &Layer) -> Self {
        match &layer.kind {
            LayerKind::Text(text) => Primitive::Text {
                x: layer.x,
                baseline: layer.y + text.font_size * BASELINE_RATIO,
                text: text.text.clone(),
                font_family: text.font_family.clone(),
                font_size: text.font_size,
                font_weight: text.font_weight,
                fill: text.color.clone(),
            },
            LayerKind::Shape(shape) => match shape.shape_type {
                ShapeType::Rectangle => Primitive::Rect {
                    x: layer.x,
                    y: layer.y,
                    width: layer.width,
                    height: layer.height,
                    fill: shape.background_color.clone(),
                },
                ShapeType::Ellipse => Primitive::Ellipse {
                    cx: layer.x + layer.width / 2.0,
                    cy: layer.y + layer.height / 2.0,
                    rx: layer.width / 2.0,
                    ry: layer.height / 2.0,
                    fill: shape.background_color.clone(),
                },
            },
            LayerKind::Image(image) => Primitive::Image {
                x: layer.x,
                y: layer.y,
                width: layer.width,
                height: layer.height,
                href: image.src.to_data_url(),
            },
        }
    }

    fn write_svg(&self, out: &mut String) {
        // Writing into a String cannot fail.
        let _ = match self {
            Primitive::Text {
                x,
                baseline,
                text,
                font_family,
                font_size,
                font_weight,
                fill,
            } => write!(
                out,
                r#"<text x="{x}" y="{baseline}" font-family="{}" font-size="{font_size}" font-weight="{font_weight}" fill="{}" style="user-select:none">{}</text>"#,
                escape(font_family),
                escape(fill),
                escape(text),
            ),
            Primitive::Rect {
                x,
                y,
                width,
                height,
                fill,
            } => write!(
                out,
                r#"<rect x="{x}" y="{y}" width="{width}" height="{height}" fill="{}"/>"#,
                escape(fill),
            ),
            Primitive::Ellipse { cx, cy, rx, ry, fill } => write!(
                out,
                r#"<ellipse cx="{cx}" cy="{cy}" rx="{rx}" ry="{ry}" fill="{}"/>"#,
                escape(fill),
            ),
            Primitive::Image {
                x,
                y,
                width,
                height,
                href,
            } => write!(
                out,
                r#"<image x="{x}" y="{y}" width="{width}" height="{height}" preserveAspectRatio="none" xlink:href="{}"/>"#,
                escape(href),
            ),
        };
    }
}

impl Scene {
    /// Paint the document bottom-to-top.
    pub fn from_document(document: &DocumentStore, options: &SceneOptions) -> Self {
        let selection = document.selection();
        let nodes = document
            .layers()
            .iter()
            .map(|layer| SceneNode {
                layer_id: layer.id,
                rotation: layer.rotation,
                pivot: layer.center(),
                primitive: Primitive::for_layer(layer),
                outline: (selection == Some(layer.id)).then(|| {
                    (
                        layer.x - OUTLINE_MARGIN,
                        layer.y - OUTLINE_MARGIN,
                        layer.width + 2.0 * OUTLINE_MARGIN,
                        layer.height + 2.0 * OUTLINE_MARGIN,
                    )
                }),
            })
            .collect();

        Self {
            width: CANVAS_WIDTH,
            height: CANVAS_HEIGHT,
            background: options.background.clone(),
            nodes,
        }
    }

    /// A copy of this scene with the surface background and the selection
    /// chrome stripped, so exports keep true transparency.
    pub fn for_export(&self) -> Self {
        Self {
            background: None,
            nodes: self
                .nodes
                .iter()
                .map(|node| SceneNode {
                    outline: None,
                    ..node.clone()
                })
                .collect(),
            ..self.clone()
        }
    }

    pub fn to_svg(&self) -> String {
        let mut out = String::new();
        let _ = write!(
            out,
            r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" id="editor-canvas" width="{w}" height="{h}" viewBox="0 0 {w} {h}""#,
            w = self.width,
            h = self.height,
        );
        if let Some(background) = &self.background {
            let _ = write!(out, r#" style="background-color:{}""#, escape(background));
        }
        out.push('>');

        for node in &self.nodes {
            let (px, py) = node.pivot;
            let _ = write!(out, r#"<g transform="rotate({} {px} {py})">"#, node.rotation);
            node.primitive.write_svg(&mut out);
            if let Some((x, y, width, height)) = node.outline {
                let _ = write!(
                    out,
                    r#"<rect x="{x}" y="{y}" width="{width}" height="{height}" fill="none" stroke="{OUTLINE_COLOR}" stroke-width="1" stroke-dasharray="3 3" pointer-events="none"/>"#,
                );
            }
            out.push_str("</g>");
        }

        out.push_str("</svg>");
        out
    }
}

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
