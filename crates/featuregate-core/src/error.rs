use thiserror::Error;

/// Longest rendering of a mismatched value kept in a [`TreeError::WrongType`]
const MAX_FOUND_LEN: usize = 64;

/// Errors raised while reading or writing a path inside a [`ConfigTree`](crate::ConfigTree)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    /// The value found at (or on the way to) `path` has the wrong shape
    #[error("{path} accessor error: {found} is of the type {found_type}, expected {expected}")]
    WrongType {
        path: String,
        expected: &'static str,
        found: String,
        found_type: &'static str,
    },

    /// An intermediate segment holds a non-map value, so the write cannot descend
    #[error("value cannot be set because {segment} is not a map (setting {path})")]
    Blocked { path: String, segment: String },

    /// A write was requested with no path segments
    #[error("cannot set a value at an empty path")]
    EmptyPath,
}

impl TreeError {
    /// Create a new WrongType error
    pub fn wrong_type(
        path: impl Into<String>,
        expected: &'static str,
        found: &serde_json::Value,
    ) -> Self {
        Self::WrongType {
            path: path.into(),
            expected,
            found: truncate_rendering(found.to_string()),
            found_type: value_type_name(found),
        }
    }

    /// Create a new Blocked error
    pub fn blocked(path: impl Into<String>, segment: impl Into<String>) -> Self {
        Self::Blocked {
            path: path.into(),
            segment: segment.into(),
        }
    }
}

fn truncate_rendering(mut rendered: String) -> String {
    if rendered.len() <= MAX_FOUND_LEN {
        return rendered;
    }
    let mut end = MAX_FOUND_LEN;
    while !rendered.is_char_boundary(end) {
        end -= 1;
    }
    rendered.truncate(end);
    rendered.push_str("...");
    rendered
}

/// Short name of a JSON value's variant, used in error messages
pub fn value_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "map",
    }
}
