//! View models for the layers and properties panels.

use layer_studio_core::layer::LayerKind;
use layer_studio_core::{DocumentStore, Layer, LayerId, LayerPatch};

/// One row of the layers panel.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerEntry {
    pub id: LayerId,
    pub name: String,
    pub selected: bool,
}

/// Layers listed top-most first.
pub fn layer_entries(document: &DocumentStore) -> Vec<LayerEntry> {
    let selection = document.selection();
    document
        .layers()
        .iter()
        .rev()
        .map(|layer| LayerEntry {
            id: layer.id,
            name: layer.display_name(),
            selected: selection == Some(layer.id),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyField {
    X,
    Y,
    Width,
    Height,
    Rotation,
    Text,
    FontSize,
    FontWeight,
    Color,
    BackgroundColor,
}

impl PropertyField {
    pub fn label(&self) -> &'static str {
        match self {
            PropertyField::X => "X",
            PropertyField::Y => "Y",
            PropertyField::Width => "Width",
            PropertyField::Height => "Height",
            PropertyField::Rotation => "Rotation",
            PropertyField::Text => "Text",
            PropertyField::FontSize => "Font Size",
            PropertyField::FontWeight => "Font Weight",
            PropertyField::Color | PropertyField::BackgroundColor => "Color",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyRow {
    pub field: PropertyField,
    pub value: String,
}

/// Rows for the properties panel: geometry first, then the variant's own
/// fields. Position is shown rounded.
pub fn property_rows(layer: &Layer) -> Vec<PropertyRow> {
    let row = |field, value: String| PropertyRow { field, value };
    let mut rows = vec![
        row(PropertyField::X, format!("{}", layer.x.round())),
        row(PropertyField::Y, format!("{}", layer.y.round())),
        row(PropertyField::Width, layer.width.to_string()),
        row(PropertyField::Height, layer.height.to_string()),
        row(PropertyField::Rotation, layer.rotation.to_string()),
    ];
    match &layer.kind {
        LayerKind::Text(text) => rows.extend([
            row(PropertyField::Text, text.text.clone()),
            row(PropertyField::FontSize, text.font_size.to_string()),
            row(PropertyField::FontWeight, text.font_weight.to_string()),
            row(PropertyField::Color, text.color.clone()),
        ]),
        LayerKind::Shape(shape) => {
            rows.push(row(PropertyField::BackgroundColor, shape.background_color.clone()));
        }
        LayerKind::Image(_) => {}
    }
    rows
}

/// Turn raw panel input into a patch. Numeric fields take the integer part
/// of the input; unparseable numbers yield `None`.
pub fn parse_edit(field: PropertyField, raw: &str) -> Option<LayerPatch> {
    let number = || {
        raw.trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map(f64::trunc)
    };
    let text = || Some(raw.to_string());
    let mut patch = LayerPatch::default();
    match field {
        PropertyField::X => patch.x = Some(number()?),
        PropertyField::Y => patch.y = Some(number()?),
        PropertyField::Width => patch.width = Some(number()?),
        PropertyField::Height => patch.height = Some(number()?),
        PropertyField::Rotation => patch.rotation = Some(number()?),
        PropertyField::FontSize => patch.font_size = Some(number()?),
        PropertyField::FontWeight => {
            patch.font_weight = Some(u16::try_from(number()? as i64).ok()?);
        }
        PropertyField::Text => patch.text = text(),
        PropertyField::Color => patch.color = text(),
        PropertyField::BackgroundColor => patch.background_color = text(),
    }
    Some(patch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use layer_studio_core::{ImagePayload, NewLayerKind};

    #[test]
    fn test_entries_listed_top_down() {
        let mut doc = DocumentStore::new();
        let text = doc.add_layer(NewLayerKind::Text);
        let shape = doc.add_layer(NewLayerKind::Shape);
        let entries = layer_entries(&doc);
        assert_eq!(entries.len(), 2);
        let summary: Vec<_> = entries
            .iter()
            .map(|e| (e.id, e.name.as_str(), e.selected))
            .collect();
        assert_eq!(
            summary,
            vec![(shape, "Rectangle", true), (text, "New Text", false)]
        );
    }

    #[test]
    fn test_rows_per_variant() {
        let fields = |layer: &Layer| {
            property_rows(layer)
                .iter()
                .map(|r| r.field)
                .collect::<Vec<_>>()
        };

        let text = Layer::with_defaults(NewLayerKind::Text);
        assert_eq!(fields(&text).len(), 9);
        assert!(fields(&text).contains(&PropertyField::FontWeight));

        let shape = Layer::with_defaults(NewLayerKind::Shape);
        assert_eq!(fields(&shape).last(), Some(&PropertyField::BackgroundColor));

        let image = Layer::image(ImagePayload::png(vec![1]), 0.0, 0.0, 1.0, 1.0);
        assert_eq!(fields(&image).len(), 5);
    }

    #[test]
    fn test_position_rows_are_rounded() {
        let mut layer = Layer::with_defaults(NewLayerKind::Shape);
        layer.x = 10.6;
        let rows = property_rows(&layer);
        assert_eq!(rows[0].value, "11");
        assert_eq!(rows[0].field.label(), "X");
    }

    #[test]
    fn test_parse_numeric_edits() {
        let x = parse_edit(PropertyField::X, "42.9").unwrap();
        assert_eq!(x.x, Some(42.0));
        assert_eq!(x.y, None);
        let weight = parse_edit(PropertyField::FontWeight, "700").unwrap();
        assert_eq!(weight.font_weight, Some(700));
        assert_eq!(parse_edit(PropertyField::Width, ""), None);
        assert_eq!(parse_edit(PropertyField::Rotation, "abc"), None);
        assert_eq!(parse_edit(PropertyField::FontWeight, "-5"), None);
    }

    #[test]
    fn test_parse_text_edits() {
        let fill = parse_edit(PropertyField::BackgroundColor, "#112233").unwrap();
        assert_eq!(fill.background_color.as_deref(), Some("#112233"));
        let text = parse_edit(PropertyField::Text, "Hello").unwrap();
        assert_eq!(text.text.as_deref(), Some("Hello"));
        assert_eq!(text.color, None);
    }
}
