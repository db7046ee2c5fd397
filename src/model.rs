use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A parsed report description. Field names follow the JSON input (camelCase).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub styles: BTreeMap<String, StyleSpec>,
    #[serde(default)]
    pub data_sources: Vec<DataSourceSpec>,
    #[serde(default, alias = "blocks")]
    pub elements: Vec<ContentBlock>,
    #[serde(default)]
    pub page_template: Option<PageTemplate>,
    #[serde(default)]
    pub toc: TocSpec,
    #[serde(default)]
    pub cover_page: CoverSpec,
    /// Extra values reachable from `{{token}}` lookups, alongside `metadata`.
    #[serde(default)]
    pub context: Map<String, Value>,
}

fn default_page_size() -> String {
    "A4".to_string()
}

fn default_orientation() -> String {
    "portrait".to_string()
}

fn default_margin() -> f32 {
    1.0
}

fn yes() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default = "default_page_size")]
    pub page_size: String,
    #[serde(default = "default_orientation")]
    pub orientation: String,
    /// Inches.
    #[serde(default = "default_margin")]
    pub margin: f32,
    #[serde(default)]
    pub top_margin: Option<f32>,
    #[serde(default)]
    pub bottom_margin: Option<f32>,
    #[serde(default)]
    pub left_margin: Option<f32>,
    #[serde(default)]
    pub right_margin: Option<f32>,
    #[serde(default)]
    pub font_dirs: Vec<PathBuf>,
    /// Family name -> font file, consulted before any directory scan.
    #[serde(default)]
    pub fonts: BTreeMap<String, PathBuf>,
    #[serde(default = "yes")]
    pub bookmarks: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Metadata {
    fn default() -> Self {
        Metadata {
            title: None,
            author: None,
            subject: None,
            page_size: default_page_size(),
            orientation: default_orientation(),
            margin: default_margin(),
            top_margin: None,
            bottom_margin: None,
            left_margin: None,
            right_margin: None,
            font_dirs: Vec::new(),
            fonts: BTreeMap::new(),
            bookmarks: true,
            extra: Map::new(),
        }
    }
}

/// RGB color, written as `#RRGGBB` in descriptions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Color(pub [u8; 3]);

impl Color {
    pub const BLACK: Color = Color([0, 0, 0]);
    pub const WHITE: Color = Color([255, 255, 255]);
    pub const RED: Color = Color([255, 0, 0]);

    pub fn parse(s: &str) -> Option<Color> {
        let hex = s.strip_prefix('#')?;
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Color([channel(0)?, channel(2)?, channel(4)?]))
    }

    pub fn gray(level: f32) -> Color {
        let v = (level.clamp(0.0, 1.0) * 255.0).round() as u8;
        Color([v, v, v])
    }

    pub fn to_f32(self) -> [f32; 3] {
        let [r, g, b] = self.0;
        [r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0]
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Color::parse(&s).ok_or_else(|| {
            serde::de::Error::custom(format!("invalid color '{s}', expected #RRGGBB"))
        })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
pub enum TextAlign {
    #[default]
    #[serde(alias = "LEFT", rename = "left")]
    Left,
    #[serde(alias = "CENTER", alias = "centre", rename = "center")]
    Center,
    #[serde(alias = "RIGHT", rename = "right")]
    Right,
    #[serde(alias = "JUSTIFY", rename = "justify")]
    Justify,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
pub enum HAlign {
    #[default]
    #[serde(alias = "LEFT", rename = "left")]
    Left,
    #[serde(alias = "CENTER", alias = "CENTRE", rename = "center")]
    Center,
    #[serde(alias = "RIGHT", rename = "right")]
    Right,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
pub enum VAlign {
    #[serde(alias = "TOP", rename = "top")]
    Top,
    #[default]
    #[serde(alias = "MIDDLE", alias = "center", alias = "CENTER", rename = "middle")]
    Middle,
    #[serde(alias = "BOTTOM", rename = "bottom")]
    Bottom,
}

/// One entry of the style dictionary. Paragraph and table styles share the
/// namespace; a style carrying `gridColor` or `headerBackground` is a table style.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleSpec {
    pub font_size: Option<f32>,
    pub leading: Option<f32>,
    pub text_color: Option<Color>,
    pub alignment: Option<TextAlign>,
    pub valignment: Option<VAlign>,
    pub font_name: Option<String>,
    pub space_before: Option<f32>,
    pub space_after: Option<f32>,
    pub left_indent: Option<f32>,
    pub right_indent: Option<f32>,
    pub bold: Option<bool>,
    pub grid_color: Option<Color>,
    pub grid_width: Option<f32>,
    pub header_background: Option<Color>,
    pub header_text_color: Option<Color>,
    pub row_background: Option<RowBackground>,
    pub padding: Option<f32>,
}

impl StyleSpec {
    pub fn is_table_style(&self) -> bool {
        self.grid_color.is_some() || self.header_background.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RowBackground {
    Single(Color),
    /// Applied to body rows 1..=n in order, without cycling.
    PerRow(Vec<Color>),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// A named rectangular data set: ordered columns plus stringified rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl DataTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column(&self, name: &str) -> Option<Vec<&str>> {
        let idx = self.column_index(name)?;
        Some(
            self.rows
                .iter()
                .map(|r| r.get(idx).map(String::as_str).unwrap_or(""))
                .collect(),
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ContentBlock {
    Text(TextBlock),
    Heading(HeadingBlock),
    Table(TableBlock),
    Image(ImageBlock),
    #[serde(rename = "chart")]
    ChartImage(ChartBlock),
    Spacer(SpacerBlock),
    #[serde(rename = "pagebreak")]
    Break,
    List(ListBlock),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextBlock {
    pub content: String,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub keep_together: bool,
}

fn default_heading_level() -> u8 {
    1
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadingBlock {
    pub text: String,
    #[serde(default = "default_heading_level")]
    pub level: u8,
    #[serde(default)]
    pub style: Option<String>,
    /// Navigation key; generated as `heading_{n}` when absent.
    #[serde(default)]
    pub key: Option<String>,
}

fn default_repeat_rows() -> usize {
    1
}

fn default_table_align() -> HAlign {
    HAlign::Center
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableBlock {
    #[serde(default)]
    pub data: Option<Vec<Vec<CellValue>>>,
    #[serde(default)]
    pub data_source: Option<String>,
    #[serde(default)]
    pub columns: Option<Vec<String>>,
    #[serde(default)]
    pub headers: Option<Vec<String>>,
    #[serde(default)]
    pub style: Option<String>,
    /// Inches.
    #[serde(default)]
    pub column_widths: Option<Vec<f32>>,
    /// Inches.
    #[serde(default)]
    pub row_heights: Option<Vec<f32>>,
    #[serde(default)]
    pub merged_cells: Vec<MergeRegion>,
    #[serde(default)]
    pub cell_alignments: Vec<AlignmentRegion>,
    #[serde(default = "default_repeat_rows")]
    pub repeat_rows: usize,
    #[serde(default)]
    pub repeat_cols: usize,
    #[serde(default)]
    pub keep_together: bool,
    #[serde(default = "default_table_align")]
    pub h_align: HAlign,
}

/// A cell is either plain text (wrapped at layout) or pre-wrapped lines.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "Value")]
pub enum CellValue {
    Text(String),
    Lines(Vec<String>),
}

impl From<Value> for CellValue {
    fn from(v: Value) -> Self {
        match v {
            Value::String(s) => CellValue::Text(s),
            Value::Array(items) => CellValue::Lines(items.into_iter().map(scalar_text).collect()),
            other => CellValue::Text(scalar_text(other)),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

/// Display form of a JSON scalar as it appears inside a table cell.
pub fn scalar_text(v: Value) -> String {
    match v {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(from = "[usize; 4]")]
pub struct MergeRegion {
    pub top_row: usize,
    pub left_col: usize,
    pub bottom_row: usize,
    pub right_col: usize,
}

impl From<[usize; 4]> for MergeRegion {
    fn from([top_row, left_col, bottom_row, right_col]: [usize; 4]) -> Self {
        MergeRegion {
            top_row,
            left_col,
            bottom_row,
            right_col,
        }
    }
}

impl MergeRegion {
    pub fn contains(&self, row: usize, col: usize) -> bool {
        (self.top_row..=self.bottom_row).contains(&row)
            && (self.left_col..=self.right_col).contains(&col)
    }

    pub fn intersects(&self, other: &MergeRegion) -> bool {
        self.top_row <= other.bottom_row
            && other.top_row <= self.bottom_row
            && self.left_col <= other.right_col
            && other.left_col <= self.right_col
    }

    /// True when `other` lies entirely within this region.
    pub fn encloses(&self, other: &MergeRegion) -> bool {
        self.top_row <= other.top_row
            && other.bottom_row <= self.bottom_row
            && self.left_col <= other.left_col
            && other.right_col <= self.right_col
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub struct AlignmentRegion {
    pub range: MergeRegion,
    #[serde(default)]
    pub align: Option<HAlign>,
    #[serde(default)]
    pub valign: Option<VAlign>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageBlock {
    pub path: PathBuf,
    /// Points.
    #[serde(default)]
    pub width: Option<f32>,
    /// Points.
    #[serde(default)]
    pub height: Option<f32>,
    #[serde(default)]
    pub alignment: HAlign,
    #[serde(default = "yes")]
    pub keep_aspect_ratio: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Line,
    Pie,
    Scatter,
    Area,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn as_slice(&self) -> &[String] {
        match self {
            OneOrMany::One(s) => std::slice::from_ref(s),
            OneOrMany::Many(v) => v,
        }
    }
}

fn default_chart_width() -> f32 {
    6.0
}

fn default_chart_height() -> f32 {
    4.0
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartBlock {
    pub chart_type: ChartKind,
    pub data_source: String,
    #[serde(default)]
    pub x_axis: Option<String>,
    #[serde(default)]
    pub y_axis: Option<OneOrMany>,
    #[serde(default)]
    pub labels: Option<String>,
    #[serde(default)]
    pub values: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    /// Inches.
    #[serde(default = "default_chart_width")]
    pub width: f32,
    /// Inches.
    #[serde(default = "default_chart_height")]
    pub height: f32,
    #[serde(default = "default_table_align")]
    pub alignment: HAlign,
    #[serde(default)]
    pub colors: Option<Vec<Color>>,
    #[serde(default = "yes")]
    pub grid: bool,
}

fn default_spacer_height() -> f32 {
    0.5
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpacerBlock {
    /// Inches.
    #[serde(default = "default_spacer_height")]
    pub height: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulletKind {
    #[default]
    Bullet,
    Number,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListBlock {
    #[serde(default)]
    pub items: Vec<String>,
    #[serde(default)]
    pub bullet_type: BulletKind,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub keep_together: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageTemplate {
    #[serde(default)]
    pub header: BandSpec,
    #[serde(default)]
    pub footer: BandSpec,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BandSpec {
    #[serde(default)]
    pub enabled: bool,
    /// Inches. Header defaults to 0.8, footer to 0.6.
    #[serde(default)]
    pub height: Option<f32>,
    #[serde(default)]
    pub show_line: bool,
    #[serde(default)]
    pub left: Option<ZoneContent>,
    #[serde(default)]
    pub center: Option<ZoneContent>,
    #[serde(default)]
    pub right: Option<ZoneContent>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ZoneAnchor {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextLook {
    pub font_name: Option<String>,
    pub font_size: f32,
    pub color: Color,
}

/// What a header/footer zone draws.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawZone")]
pub enum ZoneContent {
    Text { template: String, look: TextLook },
    Image { path: PathBuf, width: f32, height: f32 },
    PageNumber { format: String, look: TextLook },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawZone {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    content: String,
    #[serde(default)]
    path: Option<PathBuf>,
    #[serde(default)]
    width: Option<f32>,
    #[serde(default)]
    height: Option<f32>,
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    font_name: Option<String>,
    #[serde(default)]
    font_size: Option<f32>,
    #[serde(default)]
    color: Option<Color>,
}

impl TryFrom<RawZone> for ZoneContent {
    type Error = String;

    fn try_from(raw: RawZone) -> Result<Self, Self::Error> {
        let look = TextLook {
            font_name: raw.font_name,
            font_size: raw.font_size.unwrap_or(9.0),
            color: raw.color.unwrap_or(Color::BLACK),
        };
        match raw.kind.as_deref().unwrap_or("text") {
            "text" => Ok(ZoneContent::Text {
                template: raw.content,
                look,
            }),
            "image" => {
                let path = raw
                    .path
                    .ok_or_else(|| "image zone requires 'path'".to_string())?;
                Ok(ZoneContent::Image {
                    path,
                    width: raw.width.unwrap_or(50.0),
                    height: raw.height.unwrap_or(30.0),
                })
            }
            "pageNumber" => Ok(ZoneContent::PageNumber {
                format: raw.format.unwrap_or_else(|| "{page}".to_string()),
                look,
            }),
            other => Err(format!(
                "invalid zone type '{other}', expected 'text', 'image' or 'pageNumber'"
            )),
        }
    }
}

fn default_max_level() -> u8 {
    3
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TocSpec {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default = "yes")]
    pub auto_generate: bool,
    #[serde(default = "default_max_level")]
    pub max_level: u8,
    #[serde(default)]
    pub entries: Vec<TocEntrySpec>,
}

impl Default for TocSpec {
    fn default() -> Self {
        TocSpec {
            enabled: false,
            title: None,
            auto_generate: true,
            max_level: default_max_level(),
            entries: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TocEntrySpec {
    #[serde(default = "default_heading_level")]
    pub level: u8,
    pub title: String,
    #[serde(default)]
    pub page_num: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(from = "RawCoverSpec")]
pub struct CoverSpec {
    pub enabled: bool,
    pub background: Option<Background>,
    pub elements: Vec<CoverElement>,
}

/// Preset cover layouts filled from a few named fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverTemplate {
    Simple,
    Business,
    Tech,
    Formal,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCoverSpec {
    #[serde(default)]
    enabled: Option<bool>,
    #[serde(default)]
    template: Option<CoverTemplate>,
    #[serde(default)]
    background: Option<Background>,
    #[serde(default)]
    elements: Vec<CoverElement>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    subtitle: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    company: Option<String>,
    #[serde(default)]
    logo: Option<PathBuf>,
    #[serde(default)]
    background_image: Option<PathBuf>,
    #[serde(default)]
    date: Option<String>,
}

fn centered_text(content: String, style: &str, y: f32) -> CoverElement {
    CoverElement {
        content: CoverContent::Text {
            content,
            style: Some(style.to_string()),
        },
        position: CoverPosition {
            x: center_x(),
            y: Coord::Absolute(y),
        },
    }
}

impl RawCoverSpec {
    /// Background and elements of the preset, before any explicit ones.
    fn preset(&mut self, template: CoverTemplate) -> (Background, Vec<CoverElement>) {
        let title = self
            .title
            .take()
            .unwrap_or_else(|| "{{metadata.title}}".to_string());
        let white = Background::Color {
            color: Color::WHITE,
            opacity: 1.0,
        };
        let mut elements = Vec::new();
        match template {
            CoverTemplate::Simple => {
                elements.push(centered_text(title, "Title", 500.0));
                if let Some(subtitle) = self.subtitle.take() {
                    elements.push(centered_text(subtitle, "Heading2", 450.0));
                }
                if let Some(author) = self.author.take() {
                    elements.push(centered_text(format!("Author: {author}"), "Normal", 200.0));
                }
                (white, elements)
            }
            CoverTemplate::Business => {
                if let Some(path) = self.logo.take() {
                    elements.push(CoverElement {
                        content: CoverContent::Image {
                            path,
                            width: 150.0,
                            height: None,
                        },
                        position: CoverPosition {
                            x: center_x(),
                            y: Coord::Absolute(650.0),
                        },
                    });
                }
                elements.push(centered_text(title, "Title", 400.0));
                if let Some(company) = self.company.take() {
                    elements.push(centered_text(company, "Heading2", 150.0));
                }
                let background = Background::Gradient {
                    start: Color([0xF5, 0xF5, 0xF5]),
                    end: Color::WHITE,
                };
                (background, elements)
            }
            CoverTemplate::Tech => {
                elements.push(centered_text(title, "Title", 450.0));
                if let Some(subtitle) = self.subtitle.take() {
                    elements.push(centered_text(subtitle, "Heading1", 350.0));
                }
                let background = match self.background_image.take() {
                    Some(path) => Background::Image { path, opacity: 0.3 },
                    None => Background::Color {
                        color: Color([0x1A, 0x1A, 0x1A]),
                        opacity: 1.0,
                    },
                };
                (background, elements)
            }
            CoverTemplate::Formal => {
                elements.push(centered_text(title, "Title", 550.0));
                if let Some(subtitle) = self.subtitle.take() {
                    elements.push(centered_text(subtitle, "Heading1", 480.0));
                }
                let mut y = 200.0;
                if let Some(author) = self.author.take() {
                    elements.push(centered_text(format!("Prepared by: {author}"), "Normal", y));
                    y -= 30.0;
                }
                let date = self.date.take().unwrap_or_else(|| "{{date}}".to_string());
                elements.push(centered_text(date, "Normal", y));
                (white, elements)
            }
        }
    }
}

impl From<RawCoverSpec> for CoverSpec {
    /// A template supplies the background and leading elements. An explicit
    /// background replaces the preset one; explicit elements follow the preset's.
    fn from(mut raw: RawCoverSpec) -> Self {
        let enabled = raw.enabled.unwrap_or(raw.template.is_some());
        let Some(template) = raw.template else {
            return CoverSpec {
                enabled,
                background: raw.background,
                elements: raw.elements,
            };
        };
        let (background, mut elements) = raw.preset(template);
        elements.append(&mut raw.elements);
        CoverSpec {
            enabled,
            background: Some(raw.background.unwrap_or(background)),
            elements,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawBackground")]
pub enum Background {
    Color { color: Color, opacity: f32 },
    Gradient { start: Color, end: Color },
    Image { path: PathBuf, opacity: f32 },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBackground {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    color: Option<Color>,
    #[serde(default)]
    opacity: Option<f32>,
    #[serde(default)]
    color_start: Option<Color>,
    #[serde(default)]
    color_end: Option<Color>,
    #[serde(default)]
    path: Option<PathBuf>,
}

impl TryFrom<RawBackground> for Background {
    type Error = String;

    fn try_from(raw: RawBackground) -> Result<Self, Self::Error> {
        let opacity = raw.opacity.unwrap_or(1.0).clamp(0.0, 1.0);
        match raw.kind.as_deref().unwrap_or("color") {
            "color" => Ok(Background::Color {
                color: raw.color.unwrap_or(Color::WHITE),
                opacity,
            }),
            "gradient" => Ok(Background::Gradient {
                start: raw.color_start.unwrap_or(Color::WHITE),
                end: raw.color_end.unwrap_or(Color([0xCC, 0xCC, 0xCC])),
            }),
            "image" => {
                let path = raw
                    .path
                    .ok_or_else(|| "image background requires 'path'".to_string())?;
                Ok(Background::Image { path, opacity })
            }
            other => Err(format!(
                "invalid background type '{other}', expected 'color', 'image' or 'gradient'"
            )),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum XAnchor {
    Left,
    Center,
    Right,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum YAnchor {
    Top,
    Center,
    Bottom,
}

/// A named anchor or an absolute coordinate measured from the page's bottom-left corner.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Coord<A> {
    Anchor(A),
    Absolute(f32),
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct CoverPosition {
    #[serde(default = "center_x")]
    pub x: Coord<XAnchor>,
    #[serde(default = "center_y")]
    pub y: Coord<YAnchor>,
}

fn center_x() -> Coord<XAnchor> {
    Coord::Anchor(XAnchor::Center)
}

fn center_y() -> Coord<YAnchor> {
    Coord::Anchor(YAnchor::Center)
}

impl Default for CoverPosition {
    fn default() -> Self {
        CoverPosition {
            x: center_x(),
            y: center_y(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawCoverElement")]
pub struct CoverElement {
    pub content: CoverContent,
    pub position: CoverPosition,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CoverContent {
    Text { content: String, style: Option<String> },
    Image { path: PathBuf, width: f32, height: Option<f32> },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCoverElement {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    style: Option<String>,
    #[serde(default)]
    path: Option<PathBuf>,
    #[serde(default)]
    width: Option<f32>,
    #[serde(default)]
    height: Option<f32>,
    #[serde(default)]
    position: CoverPosition,
}

impl TryFrom<RawCoverElement> for CoverElement {
    type Error = String;

    fn try_from(raw: RawCoverElement) -> Result<Self, Self::Error> {
        let content = match raw.kind.as_deref().unwrap_or("text") {
            "text" => CoverContent::Text {
                content: raw
                    .content
                    .ok_or_else(|| "cover text element requires 'content'".to_string())?,
                style: raw.style,
            },
            "image" => CoverContent::Image {
                path: raw
                    .path
                    .ok_or_else(|| "cover image element requires 'path'".to_string())?,
                width: raw.width.unwrap_or(200.0),
                height: raw.height,
            },
            other => {
                return Err(format!(
                    "invalid cover element type '{other}', expected 'text' or 'image'"
                ));
            }
        };
        Ok(CoverElement {
            content,
            position: raw.position,
        })
    }
}
