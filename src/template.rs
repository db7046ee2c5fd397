//! `{{token}}` substitution for header/footer text and element content.

use std::sync::OnceLock;

use chrono::{Datelike, NaiveDateTime};
use regex::{Captures, Regex};
use serde_json::{Map, Value};

/// Values visible to template tokens for one rendering.
#[derive(Debug, Clone)]
pub struct TemplateContext {
    values: Value,
    now: NaiveDateTime,
    page: Option<usize>,
    total: Option<usize>,
}

impl TemplateContext {
    pub fn new(values: Map<String, Value>, now: NaiveDateTime) -> Self {
        TemplateContext {
            values: Value::Object(values),
            now,
            page: None,
            total: None,
        }
    }

    /// Same values with `{{page}}` and `{{total}}` bound.
    pub fn for_page(&self, page: usize, total: usize) -> Self {
        TemplateContext {
            page: Some(page),
            total: Some(total),
            ..self.clone()
        }
    }

    fn lookup(&self, token: &str) -> Option<String> {
        match token {
            "date" => return Some(self.now.format("%Y-%m-%d").to_string()),
            "datetime" => return Some(self.now.format("%Y-%m-%d %H:%M").to_string()),
            "year" => return Some(self.now.year().to_string()),
            "page" => return self.page.map(|p| p.to_string()),
            "total" => return self.total.map(|t| t.to_string()),
            _ => {}
        }
        let mut value = &self.values;
        for part in token.split('.') {
            value = value.as_object()?.get(part)?;
        }
        display(value)
    }
}

/// Truthy scalars only; null, false, zero, empty strings and containers resolve to nothing.
fn display(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Bool(true) => Some("true".to_string()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        _ => None,
    }
}

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{\{\s*([^{}]+?)\s*\}\}").expect("valid regex"))
}

/// Replace every resolvable `{{token}}`; anything unresolvable is left verbatim.
pub fn substitute(text: &str, ctx: &TemplateContext) -> String {
    if !text.contains("{{") {
        return text.to_string();
    }
    token_pattern()
        .replace_all(text, |caps: &Captures| {
            ctx.lookup(&caps[1]).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}
