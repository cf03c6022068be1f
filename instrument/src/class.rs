//! Class-level instrumentation
//!
//! A bulk-application policy layered on top of the single-callable
//! wrapper. Members live in an explicit registry; include/exclude
//! patterns are ordinary regexes matched against member names, resolved
//! once at wrap time. Re-applying instrumentation to an already wrapped
//! member only updates that wrapper's settings; it never creates a second
//! layer, so wrap-then-unwrap always restores the plain callable.

use crate::errors::{Error, NotInstrumentedReason, Result};
use crate::event::SharedEventSink;
use crate::params::{CallArgs, ParamSpec};
use crate::value::Value;
use crate::wrapper::{CallFn, InstrumentBuilder, Instrumented};
use indexmap::IndexMap;
use regex::Regex;
use std::collections::HashMap;
use std::rc::Rc;

/// A member callable that is either plain or wrapped. The `Wrapped`
/// variant is the capability marker bulk application tests for.
pub enum MethodMember {
    Plain { callable: CallFn, params: Vec<ParamSpec> },
    Wrapped(Rc<Instrumented>),
}

impl MethodMember {
    pub fn is_instrumented(&self) -> bool {
        matches!(self, Self::Wrapped(_))
    }
}

/// Property accessors are wrapped independently of one another.
#[derive(Default)]
pub struct PropertyMember {
    pub getter: Option<MethodMember>,
    pub setter: Option<MethodMember>,
    pub deleter: Option<MethodMember>,
}

pub enum Member {
    Method(MethodMember),
    Property(PropertyMember),
}

/// Which accessor of a property to address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accessor {
    Getter,
    Setter,
    Deleter,
}

impl Accessor {
    fn suffix(self) -> &'static str {
        match self {
            Self::Getter => "getter",
            Self::Setter => "setter",
            Self::Deleter => "deleter",
        }
    }
}

/// Bulk-application options: patterns plus the settings and sinks pushed
/// down to each created wrapper.
#[derive(Default)]
pub struct InstrumentOptions {
    /// When non-empty, only members matching one of these are wrapped.
    pub only: Vec<Regex>,
    /// Members matching any of these are skipped.
    pub exclude: Vec<Regex>,
    pub settings: Vec<(String, Value)>,
    pub sinks: HashMap<String, SharedEventSink>,
    /// Wrap with the history-only decorator class instead of the full one.
    pub history_only: bool,
}

impl InstrumentOptions {
    fn selects(&self, name: &str) -> bool {
        if self.exclude.iter().any(|p| p.is_match(name)) {
            return false;
        }
        self.only.is_empty() || self.only.iter().any(|p| p.is_match(name))
    }
}

/// Explicit registry of the named members of one class.
pub struct ClassRegistry {
    class_name: String,
    members: IndexMap<String, Member>,
}

impl ClassRegistry {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            members: IndexMap::new(),
        }
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn add_method<F>(&mut self, name: impl Into<String>, params: Vec<ParamSpec>, callable: F)
    where
        F: Fn(&crate::params::BoundArgs) -> anyhow::Result<Value> + 'static,
    {
        self.members.insert(
            name.into(),
            Member::Method(MethodMember::Plain {
                callable: Box::new(callable),
                params,
            }),
        );
    }

    pub fn add_property(&mut self, name: impl Into<String>, property: PropertyMember) {
        self.members.insert(name.into(), Member::Property(property));
    }

    pub fn member_names(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }

    pub fn is_instrumented(&self, name: &str) -> bool {
        match self.members.get(name) {
            Some(Member::Method(m)) => m.is_instrumented(),
            Some(Member::Property(p)) => [&p.getter, &p.setter, &p.deleter]
                .into_iter()
                .flatten()
                .any(MethodMember::is_instrumented),
            None => false,
        }
    }

    /// Instruments every member selected by the options. Idempotent:
    /// members that are already wrapped get their settings updated in
    /// place instead of gaining a second wrapper.
    pub fn instrument(&mut self, options: &InstrumentOptions) -> Result<()> {
        let names: Vec<String> = self
            .members
            .keys()
            .filter(|n| options.selects(n))
            .cloned()
            .collect();
        for name in names {
            let class_name = self.class_name.clone();
            match self.members.get_mut(&name).unwrap() {
                Member::Method(member) => {
                    wrap_member(member, &class_name, &name, options)?;
                }
                Member::Property(property) => {
                    for accessor in [Accessor::Getter, Accessor::Setter, Accessor::Deleter] {
                        let slot = match accessor {
                            Accessor::Getter => &mut property.getter,
                            Accessor::Setter => &mut property.setter,
                            Accessor::Deleter => &mut property.deleter,
                        };
                        if let Some(member) = slot {
                            let display = format!("{name}.{}", accessor.suffix());
                            wrap_member(member, &class_name, &display, options)?;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Restores a wrapped method to its plain callable.
    pub fn uninstrument(&mut self, name: &str) -> Result<()> {
        let member = self
            .members
            .get_mut(name)
            .ok_or_else(|| Error::UnknownMember(name.to_string()))?;
        match member {
            Member::Method(m) => unwrap_member(m, name),
            Member::Property(p) => {
                for slot in [&mut p.getter, &mut p.setter, &mut p.deleter]
                    .into_iter()
                    .flatten()
                {
                    unwrap_member(slot, name)?;
                }
                Ok(())
            }
        }
    }

    /// Invokes a method member, through its wrapper when instrumented.
    pub fn call(&self, name: &str, args: CallArgs) -> anyhow::Result<Value> {
        match self.members.get(name) {
            Some(Member::Method(MethodMember::Wrapped(w))) => w.call(args),
            Some(Member::Method(MethodMember::Plain { callable, params })) => {
                let bound = crate::params::BoundArgs::bind(params, &args);
                callable(&bound)
            }
            _ => Err(anyhow::anyhow!(Error::UnknownMember(name.to_string()))),
        }
    }

    /// Invokes one accessor of a property member.
    pub fn call_accessor(
        &self,
        name: &str,
        accessor: Accessor,
        args: CallArgs,
    ) -> anyhow::Result<Value> {
        let Some(Member::Property(p)) = self.members.get(name) else {
            return Err(anyhow::anyhow!(Error::UnknownMember(name.to_string())));
        };
        let slot = match accessor {
            Accessor::Getter => &p.getter,
            Accessor::Setter => &p.setter,
            Accessor::Deleter => &p.deleter,
        };
        match slot {
            Some(MethodMember::Wrapped(w)) => w.call(args),
            Some(MethodMember::Plain { callable, params }) => {
                let bound = crate::params::BoundArgs::bind(params, &args);
                callable(&bound)
            }
            None => Err(anyhow::anyhow!(Error::UnknownMember(format!(
                "{name}.{}",
                accessor.suffix()
            )))),
        }
    }

    /// The wrapper handle of an instrumented method.
    ///
    /// Asking a plain member, or a wrapper whose `enabled` was fixed to a
    /// direct falsy value, is an error identifying the callable and the
    /// reason.
    pub fn wrapper(&self, name: &str) -> Result<Rc<Instrumented>> {
        match self.members.get(name) {
            Some(Member::Method(MethodMember::Wrapped(w))) => {
                if w.is_bypassed() {
                    Err(Error::NotInstrumented {
                        name: name.to_string(),
                        reason: NotInstrumentedReason::Bypassed,
                    })
                } else {
                    Ok(w.clone())
                }
            }
            Some(_) => Err(Error::NotInstrumented {
                name: name.to_string(),
                reason: NotInstrumentedReason::NotWrapped,
            }),
            None => Err(Error::UnknownMember(name.to_string())),
        }
    }
}

fn wrap_member(
    member: &mut MethodMember,
    class_name: &str,
    name: &str,
    options: &InstrumentOptions,
) -> Result<()> {
    match member {
        MethodMember::Wrapped(w) => {
            // already wrapped: settings update only, never a second layer
            for (setting, value) in &options.settings {
                w.set_setting(setting, value.clone())?;
            }
            Ok(())
        }
        MethodMember::Plain { .. } => {
            let taken = std::mem::replace(
                member,
                MethodMember::Plain {
                    callable: Box::new(|_| Ok(Value::None)),
                    params: Vec::new(),
                },
            );
            let MethodMember::Plain { callable, params } = taken else {
                unreachable!()
            };
            let mut builder = if options.history_only {
                InstrumentBuilder::recorder(name)
            } else {
                InstrumentBuilder::new(name)
            };
            builder = builder.params(params);
            for (setting, value) in &options.settings {
                builder = builder.setting(setting.clone(), value.clone());
            }
            // prefix is first-value-wins, so this is only a fallback
            builder = builder.setting("prefix", format!("{class_name}."));
            for (sink_name, sink) in &options.sinks {
                builder = builder.sink(sink_name.clone(), sink.clone());
            }
            let wrapped = builder.build_recursive(|_| callable)?;
            *member = MethodMember::Wrapped(wrapped);
            Ok(())
        }
    }
}

fn unwrap_member(member: &mut MethodMember, name: &str) -> Result<()> {
    if let MethodMember::Wrapped(w) = member {
        let rc = w.clone();
        // drop the registry's handle before trying to take ownership back
        *member = MethodMember::Plain {
            callable: Box::new(|_| Ok(Value::None)),
            params: Vec::new(),
        };
        match Rc::try_unwrap(rc) {
            Ok(wrapper) => {
                let (callable, params) = wrapper.into_parts();
                *member = MethodMember::Plain { callable, params };
                Ok(())
            }
            Err(rc) => {
                *member = MethodMember::Wrapped(rc);
                Err(Error::HandleInUse(name.to_string()))
            }
        }
    } else {
        Ok(())
    }
}
