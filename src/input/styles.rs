use std::collections::{BTreeMap, HashMap};

use crate::model::{Color, HAlign, RowBackground, StyleSpec, TextAlign, VAlign};

/// A resolved paragraph style. Sizes and spacing are in points.
#[derive(Debug, Clone, PartialEq)]
pub struct ParagraphStyle {
    pub font_name: String,
    pub font_size: f32,
    pub leading: f32,
    pub color: Color,
    pub alignment: TextAlign,
    pub space_before: f32,
    pub space_after: f32,
    pub left_indent: f32,
    pub right_indent: f32,
}

impl ParagraphStyle {
    fn builtin(font_name: &str, font_size: f32, leading: f32) -> Self {
        ParagraphStyle {
            font_name: font_name.to_string(),
            font_size,
            leading,
            color: Color::BLACK,
            alignment: TextAlign::Left,
            space_before: 0.0,
            space_after: 0.0,
            left_indent: 0.0,
            right_indent: 0.0,
        }
    }

    fn spaced(mut self, before: f32, after: f32) -> Self {
        self.space_before = before;
        self.space_after = after;
        self
    }

    /// Derive a style from `Normal`, applying only the keys `spec` sets.
    fn derive(base: &ParagraphStyle, spec: &StyleSpec) -> Self {
        let mut style = base.clone();
        if let Some(size) = spec.font_size {
            style.font_size = size;
            style.leading = spec.leading.unwrap_or(size * 1.2);
        } else if let Some(leading) = spec.leading {
            style.leading = leading;
        }
        if let Some(color) = spec.text_color {
            style.color = color;
        }
        if let Some(alignment) = spec.alignment {
            style.alignment = alignment;
        }
        match (&spec.font_name, spec.bold) {
            (Some(name), _) => style.font_name = name.clone(),
            (None, Some(true)) => style.font_name = "Helvetica-Bold".to_string(),
            _ => {}
        }
        style.space_before = spec.space_before.unwrap_or(style.space_before);
        style.space_after = spec.space_after.unwrap_or(style.space_after);
        style.left_indent = spec.left_indent.unwrap_or(style.left_indent);
        style.right_indent = spec.right_indent.unwrap_or(style.right_indent);
        style
    }
}

/// A resolved table style.
#[derive(Debug, Clone, PartialEq)]
pub struct TableStyle {
    pub grid_color: Color,
    pub grid_width: f32,
    pub header_background: Option<Color>,
    pub header_text_color: Color,
    pub text_color: Color,
    pub row_background: Option<RowBackground>,
    pub font_size: f32,
    pub padding: f32,
    pub header_font: String,
    pub body_font: String,
    pub align: HAlign,
    pub valign: VAlign,
}

impl Default for TableStyle {
    fn default() -> Self {
        TableStyle {
            grid_color: Color([0xCC, 0xCC, 0xCC]),
            grid_width: 0.5,
            header_background: Some(Color([0x44, 0x72, 0xC4])),
            header_text_color: Color::WHITE,
            text_color: Color::BLACK,
            row_background: None,
            font_size: 9.0,
            padding: 6.0,
            header_font: "Helvetica-Bold".to_string(),
            body_font: "Helvetica".to_string(),
            align: HAlign::Left,
            valign: VAlign::Middle,
        }
    }
}

impl TableStyle {
    fn from_spec(spec: &StyleSpec) -> Self {
        let align = match spec.alignment {
            Some(TextAlign::Center) => HAlign::Center,
            Some(TextAlign::Right) => HAlign::Right,
            _ => HAlign::Left,
        };
        TableStyle {
            grid_color: spec.grid_color.unwrap_or(Color([0xCC, 0xCC, 0xCC])),
            grid_width: spec.grid_width.unwrap_or(0.5),
            header_background: spec.header_background,
            header_text_color: spec.header_text_color.unwrap_or(Color::BLACK),
            text_color: spec.text_color.unwrap_or(Color::BLACK),
            row_background: spec.row_background.clone(),
            font_size: spec.font_size.unwrap_or(10.0),
            padding: spec.padding.unwrap_or(6.0),
            header_font: spec
                .font_name
                .clone()
                .unwrap_or_else(|| "Helvetica-Bold".to_string()),
            body_font: spec.font_name.clone().unwrap_or_else(|| "Helvetica".to_string()),
            align,
            valign: spec.valignment.unwrap_or(VAlign::Middle),
        }
    }

    /// Background of body row `row` (0 is the header row).
    pub fn row_fill(&self, row: usize, header_rows: usize) -> Option<Color> {
        if row < header_rows {
            return self.header_background;
        }
        match &self.row_background {
            Some(RowBackground::Single(c)) => Some(*c),
            Some(RowBackground::PerRow(colors)) => row.checked_sub(1).and_then(|i| colors.get(i)).copied(),
            None => None,
        }
    }
}

/// Named paragraph and table styles for one document.
#[derive(Debug, Clone)]
pub struct StyleSheet {
    paragraphs: HashMap<String, ParagraphStyle>,
    normal: ParagraphStyle,
    tables: HashMap<String, TableStyle>,
    default_table: TableStyle,
}

impl StyleSheet {
    pub fn new(specs: &BTreeMap<String, StyleSpec>) -> Self {
        let normal = ParagraphStyle::builtin("Helvetica", 10.0, 12.0);
        let mut title = ParagraphStyle::builtin("Helvetica-Bold", 18.0, 22.0).spaced(0.0, 6.0);
        title.alignment = TextAlign::Center;
        let mut paragraphs = HashMap::from([
            ("Heading1".to_string(), ParagraphStyle::builtin("Helvetica-Bold", 18.0, 22.0).spaced(0.0, 6.0)),
            ("Heading2".to_string(), ParagraphStyle::builtin("Helvetica-Bold", 14.0, 18.0).spaced(12.0, 6.0)),
            ("Heading3".to_string(), ParagraphStyle::builtin("Helvetica-BoldOblique", 12.0, 14.0).spaced(12.0, 6.0)),
            ("Heading4".to_string(), ParagraphStyle::builtin("Helvetica-BoldOblique", 10.0, 12.0).spaced(10.0, 4.0)),
            ("Title".to_string(), title),
            ("BodyText".to_string(), normal.clone().spaced(6.0, 0.0)),
        ]);
        let mut tables = HashMap::new();
        for (name, spec) in specs {
            if spec.is_table_style() {
                tables.insert(name.clone(), TableStyle::from_spec(spec));
            } else {
                paragraphs.insert(name.clone(), ParagraphStyle::derive(&normal, spec));
            }
        }
        let normal = paragraphs.remove("Normal").unwrap_or(normal);
        StyleSheet {
            paragraphs,
            normal,
            tables,
            default_table: TableStyle::default(),
        }
    }

    /// Look up `name`, then `fallback`, then `Normal`.
    pub fn paragraph(&self, name: Option<&str>, fallback: &str) -> &ParagraphStyle {
        name.and_then(|n| self.paragraphs.get(n))
            .or_else(|| self.paragraphs.get(fallback))
            .unwrap_or(&self.normal)
    }

    pub fn table(&self, name: Option<&str>) -> &TableStyle {
        name.and_then(|n| self.tables.get(n))
            .unwrap_or(&self.default_table)
    }
}
