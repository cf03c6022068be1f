//! Bulk configuration sources
//!
//! A source is a plain string-keyed mapping; it can come from memory or
//! from a `key=value`-per-line text file. Parsing is deliberately lenient:
//! malformed lines and unrecognized keys are skipped, never rejected.

use super::mapping::SettingsMapping;
use crate::value::Value;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;

/// Parses `key=value` lines. Blank lines and `#` comments are ignored;
/// lines without a separator are skipped with a warning.
pub fn parse_source(text: &str) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match line.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                out.insert(key.trim().to_string(), value.trim().to_string());
            }
            _ => {
                log::warn!("skipping malformed settings line: {line:?}");
            }
        }
    }
    out
}

pub fn load_source(path: impl AsRef<Path>) -> Result<HashMap<String, String>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading settings file {}", path.display()))?;
    Ok(parse_source(&text))
}

/// Interprets a source value: `true`/`false`, integer and float literals
/// become typed values, anything else stays a string and goes through the
/// normal direct/indirect classification.
pub fn parse_literal(text: &str) -> Value {
    match text {
        "true" | "True" => return Value::Bool(true),
        "false" | "False" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(i) = text.parse::<i64>() {
        return Value::Int(i);
    }
    if let Ok(f) = text.parse::<f64>() {
        return Value::Float(f);
    }
    Value::str(text)
}

impl SettingsMapping {
    /// Applies a bulk source: keys outside the schema are ignored, values
    /// are interpreted with [`parse_literal`].
    pub fn apply_source(&mut self, source: &HashMap<String, String>) {
        let names: Vec<&'static str> = self.schema().iter().map(|s| s.name).collect();
        for name in names {
            if let Some(text) = source.get(name) {
                // the name was just validated against the schema
                let _ = self.set(name, parse_literal(text));
            }
        }
    }
}
