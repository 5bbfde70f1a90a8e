//! The layer model: a tagged union of text, shape, and image layers sharing a
//! common geometry.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::payload::ImagePayload;

/// Opaque layer identifier, unique within a document and immutable for the
/// lifetime of the layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerId(Uuid);

impl LayerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for LayerId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// The kinds of layer a user can add from the toolbar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NewLayerKind {
    Text,
    Shape,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeType {
    #[default]
    Rectangle,
    Ellipse,
}

impl fmt::Display for ShapeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShapeType::Rectangle => f.write_str("Rectangle"),
            ShapeType::Ellipse => f.write_str("Ellipse"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextProps {
    pub text: String,
    pub font_family: String,
    pub font_size: f64,
    pub font_weight: u16,
    pub color: String,
}

impl Default for TextProps {
    fn default() -> Self {
        Self {
            text: "New Text".into(),
            font_family: "Arial".into(),
            font_size: 24.0,
            font_weight: 400,
            color: "#ffffff".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeProps {
    pub shape_type: ShapeType,
    pub background_color: String,
}

impl Default for ShapeProps {
    fn default() -> Self {
        Self {
            shape_type: ShapeType::Rectangle,
            background_color: "#cccccc".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageProps {
    pub src: ImagePayload,
}

/// Variant-specific layer data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LayerKind {
    Text(TextProps),
    Shape(ShapeProps),
    Image(ImageProps),
}

/// A single visual element. Position is the top-left corner in document
/// units; rotation is in degrees about the layer's own center.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layer {
    pub id: LayerId,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub rotation: f64,
    #[serde(flatten)]
    pub kind: LayerKind,
}

impl Layer {
    /// A freshly added text or shape layer with toolbar defaults.
    pub fn with_defaults(kind: NewLayerKind) -> Self {
        let (width, height, kind) = match kind {
            NewLayerKind::Text => (200.0, 50.0, LayerKind::Text(TextProps::default())),
            NewLayerKind::Shape => (100.0, 100.0, LayerKind::Shape(ShapeProps::default())),
        };
        Self {
            id: LayerId::new(),
            x: 50.0,
            y: 50.0,
            width,
            height,
            rotation: 0.0,
            kind,
        }
    }

    /// An unrotated image layer with a fresh id.
    pub fn image(src: ImagePayload, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            id: LayerId::new(),
            x,
            y,
            width,
            height,
            rotation: 0.0,
            kind: LayerKind::Image(ImageProps { src }),
        }
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn is_image(&self) -> bool {
        matches!(self.kind, LayerKind::Image(_))
    }

    pub fn image_src(&self) -> Option<&ImagePayload> {
        match &self.kind {
            LayerKind::Image(image) => Some(&image.src),
            LayerKind::Text(_) | LayerKind::Shape(_) => None,
        }
    }

    /// Short tag for logs: `text`, `shape` or `image`.
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            LayerKind::Text(_) => "text",
            LayerKind::Shape(_) => "shape",
            LayerKind::Image(_) => "image",
        }
    }

    /// Name shown in the layers panel.
    pub fn display_name(&self) -> String {
        match &self.kind {
            LayerKind::Text(text) => text.text.clone(),
            LayerKind::Shape(shape) => shape.shape_type.to_string(),
            LayerKind::Image(_) => "Image Layer".into(),
        }
    }

    /// Merge a patch into this layer. Fields that do not apply to the
    /// layer's variant are ignored. Returns whether anything changed.
    pub fn apply(&mut self, patch: &LayerPatch) -> bool {
        let before = self.clone();

        set_finite(&mut self.x, patch.x);
        set_finite(&mut self.y, patch.y);
        set_finite(&mut self.rotation, patch.rotation);
        if let Some(width) = patch.width.filter(|v| v.is_finite()) {
            self.width = width.max(0.0);
        }
        if let Some(height) = patch.height.filter(|v| v.is_finite()) {
            self.height = height.max(0.0);
        }

        match &mut self.kind {
            LayerKind::Text(text) => {
                if let Some(value) = &patch.text {
                    text.text.clone_from(value);
                }
                if let Some(value) = &patch.font_family {
                    text.font_family.clone_from(value);
                }
                if let Some(size) = patch.font_size.filter(|v| v.is_finite() && *v > 0.0) {
                    text.font_size = size;
                }
                if let Some(weight) = patch.font_weight {
                    text.font_weight = weight;
                }
                if let Some(value) = &patch.color {
                    text.color.clone_from(value);
                }
            }
            LayerKind::Shape(shape) => {
                if let Some(shape_type) = patch.shape_type {
                    shape.shape_type = shape_type;
                }
                if let Some(value) = &patch.background_color {
                    shape.background_color.clone_from(value);
                }
            }
            LayerKind::Image(image) => {
                if let Some(src) = &patch.src {
                    image.src = src.clone();
                }
            }
        }

        *self != before
    }

    /// Bring a layer built outside [`Layer::apply`] (e.g. deserialized)
    /// back within the model's bounds: finite coordinates, non-negative
    /// size, positive font size. Returns whether anything was adjusted.
    pub fn normalize(&mut self) -> bool {
        let before = self.clone();

        for value in [&mut self.x, &mut self.y, &mut self.rotation] {
            if !value.is_finite() {
                *value = 0.0;
            }
        }
        for value in [&mut self.width, &mut self.height] {
            *value = if value.is_finite() { value.max(0.0) } else { 0.0 };
        }
        if let LayerKind::Text(text) = &mut self.kind {
            if !(text.font_size.is_finite() && text.font_size > 0.0) {
                text.font_size = TextProps::default().font_size;
            }
        }

        *self != before
    }
}

fn set_finite(slot: &mut f64, value: Option<f64>) {
    if let Some(v) = value.filter(|v| v.is_finite()) {
        *slot = v;
    }
}

/// A partial set of layer properties to merge into an existing layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayerPatch {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub rotation: Option<f64>,
    pub text: Option<String>,
    pub font_family: Option<String>,
    pub font_size: Option<f64>,
    pub font_weight: Option<u16>,
    pub color: Option<String>,
    pub shape_type: Option<ShapeType>,
    pub background_color: Option<String>,
    pub src: Option<ImagePayload>,
}

impl LayerPatch {
    pub fn position(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Self::default()
        }
    }

    pub fn src(src: ImagePayload) -> Self {
        Self {
            src: Some(src),
            ..Self::default()
        }
    }
}
