//! Context blobs carried on events and passed to constructors

use std::fmt;

use toml::{Table, Value};

use crate::foundation::dotted;

/// A labelled bag of data.
///
/// The engine treats the data as opaque; producers and consumers agree on the
/// keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    label: String,
    data: Table,
}

impl Context {
    /// Create an empty context
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            data: Table::new(),
        }
    }

    /// Add a value at a dotted path. Values that can't be placed are dropped
    /// with a warning.
    pub fn with(mut self, path: &str, value: impl Into<Value>) -> Self {
        if dotted::insert(&mut self.data, path, value.into()).is_err() {
            log::warn!("Context '{}': cannot set '{}', a parent key isn't a table", self.label, path);
        }
        self
    }

    /// Label
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Look up a value by dotted path
    pub fn get(&self, path: &str) -> Option<&Value> {
        dotted::lookup(&self.data, path)
    }

    /// Raw data
    pub const fn data(&self) -> &Table {
        &self.data
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Context('{}', {} keys)", self.label, self.data.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_and_get() {
        let ctx = Context::new("load")
            .with("request.path", "saves/party.toml")
            .with("request.id", 7);
        assert_eq!(ctx.label(), "load");
        assert_eq!(ctx.get("request.path").and_then(Value::as_str), Some("saves/party.toml"));
        assert_eq!(ctx.get("request.id").and_then(Value::as_integer), Some(7));
        assert!(ctx.get("request.missing").is_none());
    }
}
