//! Typed input schema of the editor brushes.
//!
//! Every brush panel is described by a [`FieldSet`]: integer spinners and
//! option pickers, some of which only show up once another field holds a
//! particular value.

use std::fmt;

use crate::error::{EngineError, EngineResult};

/// Visibility predicate over the other fields of the same set.
pub type VisibleIf = fn(&FieldSet) -> bool;

/// One choice of a select field: stored value and display label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectOption {
    pub value: &'static str,
    pub label: &'static str,
}

impl SelectOption {
    pub const fn new(value: &'static str, label: &'static str) -> Self {
        Self { value, label }
    }
}

/// A single brush input, either a bounded integer or a closed set of options.
#[derive(Clone)]
pub enum Field {
    Integer {
        label: &'static str,
        value: i64,
        min: i64,
        max: i64,
        visible_if: Option<VisibleIf>,
    },
    Select {
        label: &'static str,
        options: Vec<SelectOption>,
        value: &'static str,
        visible_if: Option<VisibleIf>,
    },
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Integer {
                label,
                value,
                min,
                max,
                visible_if,
            } => f
                .debug_struct("Integer")
                .field("label", label)
                .field("value", value)
                .field("min", min)
                .field("max", max)
                .field("conditional", &visible_if.is_some())
                .finish(),
            Field::Select {
                label,
                options,
                value,
                visible_if,
            } => f
                .debug_struct("Select")
                .field("label", label)
                .field("options", options)
                .field("value", value)
                .field("conditional", &visible_if.is_some())
                .finish(),
        }
    }
}

impl Field {
    pub fn integer(label: &'static str, value: i64, min: i64, max: i64) -> Self {
        Field::Integer {
            label,
            value: value.clamp(min, max),
            min,
            max,
            visible_if: None,
        }
    }

    /// The first option is selected.
    pub fn select(label: &'static str, options: Vec<SelectOption>) -> Self {
        let value = options.first().map(|option| option.value).unwrap_or_default();
        Field::Select {
            label,
            options,
            value,
            visible_if: None,
        }
    }

    pub fn visible_if(mut self, predicate: VisibleIf) -> Self {
        match &mut self {
            Field::Integer { visible_if, .. } | Field::Select { visible_if, .. } => {
                *visible_if = Some(predicate)
            }
        }
        self
    }

    pub fn label(&self) -> &'static str {
        match self {
            Field::Integer { label, .. } | Field::Select { label, .. } => *label,
        }
    }

    fn predicate(&self) -> Option<VisibleIf> {
        match self {
            Field::Integer { visible_if, .. } | Field::Select { visible_if, .. } => *visible_if,
        }
    }
}

/// Ordered, keyed field schema of a brush.
#[derive(Debug, Clone, Default)]
pub struct FieldSet {
    entries: Vec<(&'static str, Field)>,
}

impl FieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &'static str, field: Field) -> Self {
        self.entries.push((key, field));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Field)> {
        self.entries.iter().map(|(key, field)| (*key, field))
    }

    pub fn get(&self, key: &str) -> Option<&Field> {
        self.entries
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, field)| field)
    }

    fn get_mut(&mut self, key: &str) -> EngineResult<&mut Field> {
        self.entries
            .iter_mut()
            .find(|(name, _)| *name == key)
            .map(|(_, field)| field)
            .ok_or_else(|| unknown_field(key))
    }

    pub fn integer(&self, key: &str) -> EngineResult<i64> {
        match self.get(key) {
            Some(Field::Integer { value, .. }) => Ok(*value),
            Some(Field::Select { .. }) => Err(invalid(key, "not an integer field")),
            None => Err(unknown_field(key)),
        }
    }

    pub fn select(&self, key: &str) -> EngineResult<&'static str> {
        match self.get(key) {
            Some(Field::Select { value, .. }) => Ok(*value),
            Some(Field::Integer { .. }) => Err(invalid(key, "not a select field")),
            None => Err(unknown_field(key)),
        }
    }

    /// Stores raw user input. Integers outside the field range are clamped;
    /// text that is not an integer, or an unknown option, is rejected and
    /// leaves the field untouched.
    pub fn set_from_input(&mut self, key: &str, input: &str) -> EngineResult<()> {
        match self.get_mut(key)? {
            Field::Integer {
                value, min, max, ..
            } => {
                let parsed: i64 = input
                    .trim()
                    .parse()
                    .map_err(|_| invalid(key, &format!("'{input}' is not an integer")))?;
                *value = parsed.clamp(*min, *max);
            }
            Field::Select { options, value, .. } => {
                let option = options
                    .iter()
                    .find(|option| option.value == input.trim())
                    .ok_or_else(|| invalid(key, &format!("'{input}' is not an option")))?;
                *value = option.value;
            }
        }
        Ok(())
    }

    pub fn set_integer(&mut self, key: &str, new_value: i64) -> EngineResult<()> {
        match self.get_mut(key)? {
            Field::Integer {
                value, min, max, ..
            } => {
                *value = new_value.clamp(*min, *max);
                Ok(())
            }
            Field::Select { .. } => Err(invalid(key, "not an integer field")),
        }
    }

    /// Fields without a predicate are always shown; unknown keys never are.
    pub fn is_visible(&self, key: &str) -> bool {
        match self.get(key) {
            Some(field) => field.predicate().map_or(true, |predicate| predicate(self)),
            None => false,
        }
    }

    pub fn visible(&self) -> impl Iterator<Item = (&'static str, &Field)> {
        self.iter().filter(|(key, _)| self.is_visible(key))
    }
}

fn unknown_field(key: &str) -> EngineError {
    invalid(key, "unknown field")
}

fn invalid(key: &str, reason: &str) -> EngineError {
    EngineError::InvalidField {
        field: key.to_string(),
        reason: reason.to_string(),
    }
}
