//! Per-decorator-class catalogues of configurable behaviors

use crate::value::{Value, ValueType};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Trailing character that marks a string value as a parameter-name
/// reference when the setting's declared type is itself `Str`.
pub const INDIRECT_MARKER: char = '=';

/// Declarative description of one configurable behavior. Created once per
/// decorator class at schema-registration time and never mutated.
#[derive(Debug, Clone)]
pub struct SettingSpec {
    pub name: &'static str,
    pub value_type: ValueType,
    pub default: Value,
    /// When false, a falsy direct value falls back to the default.
    pub allow_falsy: bool,
    /// When false, string values are never treated as parameter references.
    pub allow_indirect: bool,
    /// When false, the first value set wins; later sets are no-ops.
    pub mutable: bool,
}

impl SettingSpec {
    pub fn new(name: &'static str, value_type: ValueType, default: impl Into<Value>) -> Self {
        Self {
            name,
            value_type,
            default: default.into(),
            allow_falsy: true,
            allow_indirect: true,
            mutable: true,
        }
    }

    pub fn no_falsy(mut self) -> Self {
        self.allow_falsy = false;
        self
    }

    pub fn no_indirect(mut self) -> Self {
        self.allow_indirect = false;
        self
    }

    pub fn immutable(mut self) -> Self {
        self.mutable = false;
        self
    }
}

/// Ordered catalogue of the settings one decorator class understands.
#[derive(Debug)]
pub struct SettingSchema {
    class_id: &'static str,
    specs: Vec<SettingSpec>,
    index: HashMap<&'static str, usize>,
}

impl SettingSchema {
    pub fn new(class_id: &'static str, specs: Vec<SettingSpec>) -> Self {
        let index = specs
            .iter()
            .enumerate()
            .map(|(i, s)| (s.name, i))
            .collect();
        Self {
            class_id,
            specs,
            index,
        }
    }

    pub fn class_id(&self) -> &'static str {
        self.class_id
    }

    pub fn get(&self, name: &str) -> Option<&SettingSpec> {
        self.index.get(name).map(|i| &self.specs[*i])
    }

    /// Declaration-order position, used to keep mappings schema-ordered.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SettingSpec> {
        self.specs.iter()
    }
}

lazy_static::lazy_static! {
    static ref G_SCHEMAS: RwLock<HashMap<&'static str, Arc<SettingSchema>>> =
        RwLock::new(HashMap::new());
}

/// Stores the catalogue for a decorator class; re-registration under the
/// same identifier replaces the previous catalogue.
pub fn register_schema(class_id: &'static str, specs: Vec<SettingSpec>) {
    let schema = Arc::new(SettingSchema::new(class_id, specs));
    let mut guard = G_SCHEMAS.write().unwrap();
    if guard.insert(class_id, schema).is_some() {
        log::debug!("schema for decorator class '{class_id}' replaced");
    }
}

/// Looking up an unregistered decorator class is a programming error.
pub fn schema(class_id: &str) -> Arc<SettingSchema> {
    ensure_builtin_schemas();
    let guard = G_SCHEMAS.read().unwrap();
    match guard.get(class_id) {
        Some(s) => s.clone(),
        None => panic!("no setting schema registered for decorator class '{class_id}'"),
    }
}

pub fn is_setting(class_id: &str, name: &str) -> bool {
    schema(class_id).contains(name)
}

/// Decorator class id of the full instrumentation wrapper.
pub const CALL_LOGGER: &str = "call_logger";
/// Decorator class id of the history-only variant.
pub const CALL_RECORDER: &str = "call_recorder";

fn call_logger_specs() -> Vec<SettingSpec> {
    vec![
        SettingSpec::new("enabled", ValueType::Bool, true),
        SettingSpec::new("args_sep", ValueType::Str, ", ").no_falsy(),
        SettingSpec::new("log_args", ValueType::Bool, true),
        SettingSpec::new("log_retval", ValueType::Bool, false),
        SettingSpec::new("log_exit", ValueType::Bool, true),
        SettingSpec::new("log_elapsed", ValueType::Bool, false),
        SettingSpec::new("log_call_numbers", ValueType::Bool, false),
        SettingSpec::new("mute", ValueType::Int, 0i64),
        SettingSpec::new("sink", ValueType::Str, "console").no_falsy(),
        SettingSpec::new("prefix", ValueType::Str, "").no_indirect().immutable(),
        SettingSpec::new("record_history", ValueType::Bool, true)
            .no_indirect()
            .immutable(),
        SettingSpec::new("max_history", ValueType::Int, 0i64)
            .no_indirect()
            .immutable(),
    ]
}

fn call_recorder_specs() -> Vec<SettingSpec> {
    vec![
        SettingSpec::new("enabled", ValueType::Bool, true),
        SettingSpec::new("prefix", ValueType::Str, "").no_indirect().immutable(),
        SettingSpec::new("max_history", ValueType::Int, 0i64)
            .no_indirect()
            .immutable(),
    ]
}

/// Registers the built-in catalogues, leaving any explicit re-registration
/// in place.
pub fn ensure_builtin_schemas() {
    let mut guard = G_SCHEMAS.write().unwrap();
    guard
        .entry(CALL_LOGGER)
        .or_insert_with(|| Arc::new(SettingSchema::new(CALL_LOGGER, call_logger_specs())));
    guard
        .entry(CALL_RECORDER)
        .or_insert_with(|| Arc::new(SettingSchema::new(CALL_RECORDER, call_recorder_specs())));
}
