// ABOUTME: Variable context with a global map and a stack of local frames

use crate::error::{Error, ErrorKind, Result};
use crate::value::Value;
use std::collections::HashMap;

/// The mutable association between names and values during evaluation.
///
/// Lookup inspects only the top local frame before falling back to the
/// global map; enclosing call frames are never visible (no lexical closure
/// over them). Assignment through `set_value` targets the top frame when
/// one exists and the global map otherwise.
#[derive(Debug, Default)]
pub struct Context {
    globals: HashMap<String, Value>,
    locals: Vec<HashMap<String, Value>>,
}

impl Context {
    pub fn new() -> Self {
        Context::default()
    }

    pub fn get_value(&self, name: &str) -> Result<Value> {
        if let Some(frame) = self.locals.last() {
            if let Some(value) = frame.get(name) {
                return Ok(value.clone());
            }
        }
        self.get_global_value(name)
    }

    pub fn get_global_value(&self, name: &str) -> Result<Value> {
        self.globals.get(name).cloned().ok_or_else(|| {
            Error::new(ErrorKind::UndefinedValue {
                name: name.to_string(),
            })
        })
    }

    pub fn set_value(&mut self, name: impl Into<String>, value: Value) {
        match self.locals.last_mut() {
            Some(frame) => {
                frame.insert(name.into(), value);
            }
            None => {
                self.globals.insert(name.into(), value);
            }
        }
    }

    /// Binds a name in the top local frame. Without an active frame this
    /// degenerates to a global binding.
    pub fn set_local_value(&mut self, name: impl Into<String>, value: Value) {
        self.set_value(name, value);
    }

    pub fn push_frame(&mut self) {
        self.locals.push(HashMap::new());
    }

    pub fn pop_frame(&mut self) {
        self.locals.pop();
    }
}
