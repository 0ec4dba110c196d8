use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// A classifier found nothing it recognizes in a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no {what} found in debugger output")]
pub struct ParseSkipped {
    pub what: &'static str,
}

/// Functions belonging to the target program, as listed by `info functions`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionCatalogue {
    names: HashSet<String>,
}

impl FunctionCatalogue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn insert(&mut self, name: impl Into<String>) {
        self.names.insert(name.into());
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for FunctionCatalogue {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// One line of `backtrace` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
    pub function_name: String,
    pub frame_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_line: Option<u32>,
}

/// `name = value` from `info locals` / `info args`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Local {
    pub name: String,
    pub value: String,
}

/// A value as the debugger prints it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Scalar(String),
    Pointer(u64),
    Fields(Vec<(String, Literal)>),
    Elements(Vec<Literal>),
}
