//! Parameter declarations and call-argument binding
//!
//! Wrapped callables declare their parameters explicitly; a call site
//! supplies positional and keyword values that get bound against the
//! declaration before the callable runs. The binding distinguishes
//! explicitly bound parameters from leftover (variadic) keyword arguments
//! so that events and history can report them separately, and so that
//! indirect settings can be resolved by parameter name.

use crate::value::Value;
use anyhow::{bail, Result};
use indexmap::IndexMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Bound by position; may carry a default.
    Positional,
    /// Bound by keyword only; always carries a default.
    KeywordOnly,
    /// Collects keyword arguments that match no declared parameter.
    VarKeyword,
}

/// One declared parameter of a wrapped callable.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub default: Option<Value>,
}

impl ParamSpec {
    pub fn positional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::Positional,
            default: None,
        }
    }

    pub fn with_default(name: impl Into<String>, default: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::Positional,
            default: Some(default.into()),
        }
    }

    pub fn keyword_only(name: impl Into<String>, default: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::KeywordOnly,
            default: Some(default.into()),
        }
    }

    pub fn var_keyword(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::VarKeyword,
            default: None,
        }
    }

    /// A parameter an indirect setting may fall back to: it must be
    /// addressable by keyword and carry a declared default.
    pub fn is_keyword_capable(&self) -> bool {
        self.kind != ParamKind::VarKeyword && self.default.is_some()
    }
}

/// Arguments as supplied by a call site, before binding.
#[derive(Debug, Clone, Default)]
pub struct CallArgs {
    pub positional: Vec<Value>,
    pub keyword: Vec<(String, Value)>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pos(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    pub fn kw(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keyword.push((name.into(), value.into()));
        self
    }
}

/// Call arguments bound against a parameter declaration.
#[derive(Debug, Clone, Default)]
pub struct BoundArgs {
    /// Explicit positional arguments, under their declared names.
    pub by_position: IndexMap<String, Value>,
    /// Explicit keyword arguments matching declared parameters.
    pub by_keyword: IndexMap<String, Value>,
    /// Keyword arguments matching no declared parameter.
    pub leftover: IndexMap<String, Value>,
    /// Declared defaults for parameters the call did not supply.
    defaults: IndexMap<String, Value>,
}

impl BoundArgs {
    pub fn bind(params: &[ParamSpec], args: &CallArgs) -> Self {
        let mut bound = Self::default();
        let positional_params: Vec<&ParamSpec> = params
            .iter()
            .filter(|p| p.kind == ParamKind::Positional)
            .collect();
        for (i, value) in args.positional.iter().enumerate() {
            let name = match positional_params.get(i) {
                Some(p) => p.name.clone(),
                // surplus positional values keep an index-derived name
                None => format!("arg{i}"),
            };
            bound.by_position.insert(name, value.clone());
        }
        for (name, value) in &args.keyword {
            let declared = params
                .iter()
                .any(|p| p.kind != ParamKind::VarKeyword && p.name == *name);
            if declared {
                bound.by_keyword.insert(name.clone(), value.clone());
            } else {
                bound.leftover.insert(name.clone(), value.clone());
            }
        }
        for p in params {
            if p.kind == ParamKind::VarKeyword {
                continue;
            }
            if let Some(default) = &p.default {
                if !bound.by_position.contains_key(&p.name)
                    && !bound.by_keyword.contains_key(&p.name)
                {
                    bound.defaults.insert(p.name.clone(), default.clone());
                }
            }
        }
        bound
    }

    /// Priority order used for indirect-setting resolution: explicit
    /// keyword, then bound positional, then leftover keyword. Declared
    /// defaults are deliberately excluded; the resolver applies its own
    /// keyword-capable fallback.
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.by_keyword
            .get(name)
            .or_else(|| self.by_position.get(name))
            .or_else(|| self.leftover.get(name))
    }

    /// Full lookup for the wrapped callable's own use, defaults included.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.lookup(name).or_else(|| self.defaults.get(name))
    }

    pub fn int(&self, name: &str) -> Result<i64> {
        match self.get(name) {
            Some(Value::Int(i)) => Ok(*i),
            Some(other) => bail!("argument '{}' is not an int: {:?}", name, other),
            None => bail!("argument '{}' not supplied", name),
        }
    }

    pub fn float(&self, name: &str) -> Result<f64> {
        match self.get(name).and_then(Value::as_float) {
            Some(f) => Ok(f),
            None => bail!("argument '{}' is not a float", name),
        }
    }

    pub fn boolean(&self, name: &str) -> Result<bool> {
        match self.get(name) {
            Some(Value::Bool(b)) => Ok(*b),
            Some(other) => bail!("argument '{}' is not a bool: {:?}", name, other),
            None => bail!("argument '{}' not supplied", name),
        }
    }

    pub fn string(&self, name: &str) -> Result<String> {
        match self.get(name) {
            Some(Value::Str(s)) => Ok(s.to_string()),
            Some(other) => bail!("argument '{}' is not a string: {:?}", name, other),
            None => bail!("argument '{}' not supplied", name),
        }
    }
}
