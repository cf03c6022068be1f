//! Per-callable settings store and call-time resolution
//!
//! Each stored value is tagged direct or indirect. A direct value is fixed
//! at wrap time; an indirect value names a parameter of the wrapped
//! callable and is resolved fresh from the actual call arguments on every
//! invocation. This is what lets a caller higher in a chain propagate a
//! configuration value down through intermediate, non-cooperating
//! functions via ordinary keyword arguments, without global state.

use super::schema::{SettingSchema, SettingSpec, INDIRECT_MARKER};
use crate::errors::{Error, Result};
use crate::params::{BoundArgs, ParamSpec};
use crate::value::{Value, ValueType};
use indexmap::IndexMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct TaggedValue {
    pub indirect: bool,
    pub value: Value,
}

/// Ordered mapping from setting name to tagged value, one per instrumented
/// callable. Insertion order follows the schema's declaration order,
/// filtered to the settings actually supplied.
#[derive(Debug)]
pub struct SettingsMapping {
    schema: Arc<SettingSchema>,
    entries: IndexMap<&'static str, TaggedValue>,
}

impl SettingsMapping {
    pub fn new(schema: Arc<SettingSchema>) -> Self {
        Self {
            schema,
            entries: IndexMap::new(),
        }
    }

    pub fn schema(&self) -> &SettingSchema {
        &self.schema
    }

    /// Validates the name against the schema and classifies the raw value
    /// as direct or indirect. A non-mutable setting that is already set is
    /// left untouched; first value wins.
    pub fn set(&mut self, name: &str, raw: Value) -> Result<()> {
        let spec = self.schema.get(name).ok_or_else(|| Error::UnknownSetting {
            class_id: self.schema.class_id().to_string(),
            name: name.to_string(),
        })?;
        if !spec.mutable && self.entries.contains_key(spec.name) {
            return Ok(());
        }
        let tagged = classify(spec, raw);
        self.entries.insert(spec.name, tagged);
        let schema = &self.schema;
        self.entries
            .sort_unstable_by(|a, _, b, _| schema.position(a).cmp(&schema.position(b)));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&TaggedValue> {
        self.entries.get(name)
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &TaggedValue)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    /// Resolves the final value of a setting for one call.
    ///
    /// Direct values are returned unchanged. Indirect values are looked up
    /// in the call's argument dictionaries (keyword, positional, leftover,
    /// in that priority order); failing that, the referenced parameter's
    /// declared default is used if the parameter is keyword-capable;
    /// failing that, the schema default. The outcome is re-validated and
    /// degrades silently to the schema default; configuration errors must
    /// never break the wrapped callable's execution.
    pub fn resolve(&self, name: &str, bound: &BoundArgs, params: &[ParamSpec]) -> Value {
        let Some(spec) = self.schema.get(name) else {
            debug_assert!(false, "resolve of unknown setting '{name}'");
            return Value::None;
        };
        let Some(tagged) = self.entries.get(spec.name) else {
            return spec.default.clone();
        };
        if !tagged.indirect {
            return tagged.value.clone();
        }
        let param_name = tagged
            .value
            .as_str()
            .unwrap_or_default();
        let resolved = match bound.lookup(param_name) {
            Some(v) => Some(v.clone()),
            None => params
                .iter()
                .find(|p| p.name == param_name && p.is_keyword_capable())
                .and_then(|p| p.default.clone()),
        };
        match resolved {
            Some(v) => validate_direct(spec, v),
            None => spec.default.clone(),
        }
    }
}

/// Direct/indirect classification of a raw setting value:
/// - a non-string, or an empty string, is direct;
/// - a non-empty string for a non-`Str` setting is an indirect parameter
///   reference, with one trailing marker stripped if present;
/// - a non-empty string for a `Str` setting is indirect only when it ends
///   with the marker (stripped), otherwise it is a literal.
fn classify(spec: &SettingSpec, raw: Value) -> TaggedValue {
    let text = match raw.as_str() {
        Some(s) if !s.is_empty() && spec.allow_indirect => s,
        _ => {
            return TaggedValue {
                indirect: false,
                value: validate_direct(spec, raw),
            }
        }
    };
    if spec.value_type == ValueType::Str {
        match text.strip_suffix(INDIRECT_MARKER) {
            Some(stripped) => TaggedValue {
                indirect: true,
                value: Value::str(stripped),
            },
            None => TaggedValue {
                indirect: false,
                value: validate_direct(spec, raw.clone()),
            },
        }
    } else {
        let stripped = text.strip_suffix(INDIRECT_MARKER).unwrap_or(text);
        TaggedValue {
            indirect: true,
            value: Value::str(stripped),
        }
    }
}

/// Falsy-and-disallowed or type-mismatched direct values fall back to the
/// schema default.
fn validate_direct(spec: &SettingSpec, value: Value) -> Value {
    if value.is_falsy() && !spec.allow_falsy {
        return spec.default.clone();
    }
    if !value.matches(spec.value_type) {
        return spec.default.clone();
    }
    value
}
