use anyhow::{Result, anyhow};

use crate::value::{FromOptionValue, OptionValue};

#[derive(Debug, Clone, PartialEq)]
pub struct BoundArgument {
    /// Callback parameter the value is delivered to.
    pub param: String,
    /// Option name as declared on the wire.
    pub option: String,
    pub value: OptionValue,
}

/// Typed arguments for one invocation, in option declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundArguments {
    entries: Vec<BoundArgument>,
}

impl BoundArguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, param: String, option: String, value: OptionValue) {
        self.entries.push(BoundArgument { param, option, value });
    }

    /// Raw value bound to `param`.
    pub fn value(&self, param: &str) -> Option<&OptionValue> {
        self.entries.iter().find(|e| e.param == param).map(|e| &e.value)
    }

    /// Typed value bound to `param`; `None` when absent or of another type.
    pub fn get<T: FromOptionValue>(&self, param: &str) -> Option<T> {
        self.value(param).and_then(T::from_option_value)
    }

    /// Like [`get`](Self::get) but fails when the parameter is missing.
    pub fn require<T: FromOptionValue>(&self, param: &str) -> Result<T> {
        let value = self
            .value(param)
            .ok_or_else(|| anyhow!("argument '{param}' was not bound"))?;
        T::from_option_value(value)
            .ok_or_else(|| anyhow!("argument '{param}' is a {}", value.type_name()))
    }

    /// Lookup by wire option name instead of parameter name.
    pub fn by_option(&self, option: &str) -> Option<&OptionValue> {
        self.entries.iter().find(|e| e.option == option).map(|e| &e.value)
    }

    pub fn contains(&self, param: &str) -> bool {
        self.entries.iter().any(|e| e.param == param)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BoundArgument> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
