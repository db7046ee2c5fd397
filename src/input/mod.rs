//! Parsing and structural validation of JSON report descriptions, plus the
//! request's inline data sources.

mod styles;

pub use styles::{ParagraphStyle, StyleSheet, TableStyle};

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use serde_json::{Map, Value};

use crate::error::{Error, Result, Warning, WarningKind};
use crate::geometry::PageGeometry;
use crate::model::{DataSourceSpec, DataTable, Document, scalar_text};

const ELEMENT_TYPES: [&str; 8] = [
    "text", "heading", "table", "chart", "image", "spacer", "pagebreak", "list",
];
const CHART_TYPES: [&str; 5] = ["bar", "line", "pie", "scatter", "area"];
const DATA_SOURCE_TYPES: [&str; 6] = ["json", "csv", "excel", "database", "api", "inline"];

/// Parse a description, reporting every structural problem at once.
pub fn parse_description(json: &str) -> Result<Document> {
    let t0 = std::time::Instant::now();
    let value: Value = serde_json::from_str(json)?;
    let problems = validate(&value);
    if !problems.is_empty() {
        return Err(Error::Configuration(problems.join("; ")));
    }
    let doc: Document =
        serde_json::from_value(value).map_err(|e| Error::config(e.to_string()))?;
    PageGeometry::from_metadata(&doc.metadata)?;
    log::info!(
        "Parsed description: {} elements, {} data sources in {:.1}ms",
        doc.elements.len(),
        doc.data_sources.len(),
        t0.elapsed().as_secs_f64() * 1000.0,
    );
    Ok(doc)
}

/// Checks the raw JSON before typed deserialization so that messages name the
/// offending element by index.
fn validate(value: &Value) -> Vec<String> {
    let mut problems = Vec::new();
    let Some(root) = value.as_object() else {
        return vec!["description must be a JSON object".to_string()];
    };

    let mut names = HashSet::new();
    for (idx, source) in array(root, "dataSources").iter().enumerate() {
        let Some(source) = source.as_object() else {
            problems.push(format!("data source at index {idx} must be an object"));
            continue;
        };
        let Some(name) = source.get("name").and_then(Value::as_str) else {
            problems.push(format!("data source at index {idx} missing required field 'name'"));
            continue;
        };
        if !names.insert(name) {
            problems.push(format!("duplicate data source name '{name}'"));
        }
        match source.get("type").and_then(Value::as_str) {
            None => problems.push(format!("data source '{name}' missing required field 'type'")),
            Some(kind) if !DATA_SOURCE_TYPES.contains(&kind) => problems.push(format!(
                "invalid data source type '{kind}' for '{name}', expected one of {DATA_SOURCE_TYPES:?}"
            )),
            Some(_) => {}
        }
    }

    let elements = root.get("elements").or_else(|| root.get("blocks"));
    if elements.is_some_and(|e| !e.is_array()) {
        problems.push("'elements' must be an array".to_string());
    }
    for (idx, element) in elements
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
        .iter()
        .enumerate()
    {
        let Some(kind) = element.get("type").and_then(Value::as_str) else {
            problems.push(format!("element at index {idx} missing required field 'type'"));
            continue;
        };
        if !ELEMENT_TYPES.contains(&kind) {
            problems.push(format!(
                "invalid element type '{kind}' at index {idx}, expected one of {ELEMENT_TYPES:?}"
            ));
            continue;
        }
        let has = |key: &str| element.get(key).is_some();
        match kind {
            "text" if !has("content") => {
                problems.push(format!("text element at index {idx} requires 'content'"))
            }
            "heading" if !has("text") => {
                problems.push(format!("heading element at index {idx} requires 'text'"))
            }
            "heading" => {
                if element.get("level").and_then(Value::as_u64) == Some(0) {
                    problems.push(format!("heading element at index {idx} has level 0"));
                }
            }
            "table" if !has("data") && !has("dataSource") => problems.push(format!(
                "table element at index {idx} requires 'data' or 'dataSource'"
            )),
            "image" if !has("path") => {
                problems.push(format!("image element at index {idx} requires 'path'"))
            }
            "chart" => match element.get("chartType").and_then(Value::as_str) {
                None => problems.push(format!("chart element at index {idx} requires 'chartType'")),
                Some(t) if !CHART_TYPES.contains(&t) => problems.push(format!(
                    "invalid chart type '{t}' at index {idx}, expected one of {CHART_TYPES:?}"
                )),
                Some(_) if !has("dataSource") => {
                    problems.push(format!("chart element at index {idx} requires 'dataSource'"))
                }
                Some(_) => {}
            },
            _ => {}
        }
    }
    problems
}

fn array<'a>(root: &'a Map<String, Value>, key: &str) -> &'a [Value] {
    root.get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// Named tables available to table and chart blocks.
#[derive(Debug, Clone, Default)]
pub struct DataSources {
    tables: HashMap<String, DataTable>,
}

impl DataSources {
    /// Load the description's sources. Relative `path`s resolve against `base_dir`.
    /// A source that cannot be loaded is left out and reported as a warning;
    /// blocks that reference it fail individually later.
    pub fn load(specs: &[DataSourceSpec], base_dir: &Path) -> (DataSources, Vec<Warning>) {
        let mut sources = DataSources::default();
        let mut warnings = Vec::new();
        for spec in specs {
            match load_source(spec, base_dir) {
                Ok(table) => {
                    log::info!("Loaded data source '{}': {} rows", spec.name, table.rows.len());
                    sources.tables.insert(spec.name.clone(), table);
                }
                Err(msg) => {
                    log::warn!("Failed to load data source '{}': {msg}", spec.name);
                    warnings.push(Warning::new(
                        WarningKind::DataSource,
                        format!("data source '{}': {msg}", spec.name),
                    ));
                }
            }
        }
        (sources, warnings)
    }

    pub fn insert(&mut self, name: impl Into<String>, table: DataTable) {
        self.tables.insert(name.into(), table);
    }

    pub fn get(&self, name: &str) -> Option<&DataTable> {
        self.tables.get(name)
    }
}

fn load_source(spec: &DataSourceSpec, base_dir: &Path) -> std::result::Result<DataTable, String> {
    match spec.kind.as_str() {
        "json" | "inline" => {}
        other => return Err(format!("type '{other}' is not supported")),
    }
    if let Some(data) = &spec.data {
        return table_from_json(data.clone());
    }
    let Some(path) = &spec.path else {
        return Err("requires 'path' or 'data'".to_string());
    };
    let path = if path.is_relative() {
        base_dir.join(path)
    } else {
        path.clone()
    };
    let text = std::fs::read_to_string(&path)
        .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    let value: Value =
        serde_json::from_str(&text).map_err(|e| format!("invalid JSON in {}: {e}", path.display()))?;
    table_from_json(value)
}

/// Accepts a list of records, a map of column arrays, `{columns, rows}`, or
/// any of those nested under a top-level `data` key.
pub fn table_from_json(value: Value) -> std::result::Result<DataTable, String> {
    match value {
        Value::Array(items) => records_table(items),
        Value::Object(mut obj) => {
            if let (Some(Value::Array(columns)), Some(Value::Array(rows))) =
                (obj.get("columns"), obj.get("rows"))
            {
                let columns: Vec<String> = columns.iter().cloned().map(scalar_text).collect();
                let rows = rows
                    .iter()
                    .map(|r| match r {
                        Value::Array(cells) => Ok(cells.iter().cloned().map(scalar_text).collect()),
                        _ => Err("each entry of 'rows' must be an array".to_string()),
                    })
                    .collect::<std::result::Result<Vec<Vec<String>>, String>>()?;
                return Ok(DataTable { columns, rows });
            }
            if let Some(inner) = obj.remove("data") {
                return table_from_json(inner);
            }
            column_table(obj)
        }
        _ => Err("expected an array of records or an object of columns".to_string()),
    }
}

fn records_table(items: Vec<Value>) -> std::result::Result<DataTable, String> {
    let mut columns: Vec<String> = Vec::new();
    let mut records: Vec<BTreeMap<usize, String>> = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::Object(fields) => {
                let mut record = BTreeMap::new();
                for (key, v) in fields {
                    let idx = match columns.iter().position(|c| *c == key) {
                        Some(i) => i,
                        None => {
                            columns.push(key);
                            columns.len() - 1
                        }
                    };
                    record.insert(idx, scalar_text(v));
                }
                records.push(record);
            }
            Value::Array(cells) => {
                for i in columns.len()..cells.len() {
                    columns.push(i.to_string());
                }
                records.push(cells.into_iter().map(scalar_text).enumerate().collect());
            }
            _ => return Err("records must be objects or arrays".to_string()),
        }
    }
    let rows = records
        .into_iter()
        .map(|mut r| (0..columns.len()).map(|i| r.remove(&i).unwrap_or_default()).collect())
        .collect();
    Ok(DataTable { columns, rows })
}

fn column_table(obj: Map<String, Value>) -> std::result::Result<DataTable, String> {
    let mut columns = Vec::with_capacity(obj.len());
    let mut values: Vec<Vec<String>> = Vec::with_capacity(obj.len());
    for (name, v) in obj {
        let Value::Array(cells) = v else {
            return Err(format!("column '{name}' must be an array"));
        };
        columns.push(name);
        values.push(cells.into_iter().map(scalar_text).collect());
    }
    let height = values.iter().map(Vec::len).max().unwrap_or(0);
    let rows = (0..height)
        .map(|r| {
            values
                .iter()
                .map(|col| col.get(r).cloned().unwrap_or_default())
                .collect()
        })
        .collect();
    Ok(DataTable { columns, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ContentBlock;
    use serde_json::json;

    #[test]
    fn collects_every_problem() {
        let err = parse_description(
            r#"{"elements": [{"type": "video"}, {"type": "chart", "chartType": "radar"}, {"content": "x"}]}"#,
        )
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("'video' at index 0"));
        assert!(msg.contains("'radar' at index 1"));
        assert!(msg.contains("index 2 missing required field 'type'"));
    }

    #[test]
    fn unknown_zone_type_is_configuration_error() {
        let err = parse_description(
            r#"{"pageTemplate": {"header": {"enabled": true, "left": {"type": "marquee"}}}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Configuration(m) if m.contains("marquee")));
    }

    #[test]
    fn blocks_alias_and_defaults() {
        let doc = parse_description(r#"{"blocks": [{"type": "heading", "text": "Intro"}]}"#).unwrap();
        assert!(matches!(&doc.elements[0], ContentBlock::Heading(h) if h.text == "Intro" && h.level == 1));
        assert_eq!(doc.metadata.page_size, "A4");
    }

    #[test]
    fn records_keep_first_seen_column_order() {
        let t = table_from_json(json!([
            {"month": "Jan", "sales": 10},
            {"month": "Feb", "sales": 12.5, "note": "peak"}
        ]))
        .unwrap();
        assert_eq!(t.columns, vec!["month", "sales", "note"]);
        assert_eq!(t.rows[0], vec!["Jan", "10", ""]);
        assert_eq!(t.rows[1][1], "12.5");
    }

    #[test]
    fn column_map_and_columns_rows_forms() {
        let t = table_from_json(json!({"data": {"a": [1, 2], "b": ["x"]}})).unwrap();
        assert_eq!(t.rows, vec![vec!["1", "x"], vec!["2", ""]]);
        let t = table_from_json(json!({"columns": ["k"], "rows": [["v"]]})).unwrap();
        assert_eq!(t.column("k"), Some(vec!["v"]));
    }

    #[test]
    fn unsupported_source_is_a_warning() {
        let specs: Vec<DataSourceSpec> = serde_json::from_value(json!([
            {"name": "db", "type": "database"},
            {"name": "inline", "type": "json", "data": [{"x": 1}]}
        ]))
        .unwrap();
        let (sources, warnings) = DataSources::load(&specs, Path::new("."));
        assert!(sources.get("db").is_none());
        assert!(sources.get("inline").is_some());
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::DataSource);
    }
}
