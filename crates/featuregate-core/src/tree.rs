//! Typed access to values inside an untyped nested configuration document.
//!
//! A configuration tree is a JSON object whose values are nested objects,
//! arrays, strings, numbers or booleans. Values are addressed by a sequence
//! of map keys (`["apiServerArguments", "feature-gates"]`).
//!
//! Reads distinguish three outcomes: the value is present (`Ok(Some(_))`),
//! some segment is missing (`Ok(None)`), or a value on the way has the wrong
//! shape ([`TreeError::WrongType`]). Writes create missing intermediate maps
//! and fail with [`TreeError::Blocked`] when an intermediate is not a map.

use serde_json::{Map, Value};

use crate::error::TreeError;

/// Root of a nested configuration document
pub type ConfigTree = Map<String, Value>;

/// Join path segments with `.` for use in messages
pub fn join_path<S: AsRef<str>>(path: &[S]) -> String {
    path.iter()
        .map(|segment| segment.as_ref())
        .collect::<Vec<_>>()
        .join(".")
}

/// Get a reference to the value at `path`
pub fn nested_value<'a, S: AsRef<str>>(
    tree: &'a ConfigTree,
    path: &[S],
) -> Result<Option<&'a Value>, TreeError> {
    let Some((last, parents)) = path.split_last() else {
        return Err(TreeError::EmptyPath);
    };

    let mut current = tree;
    for (i, segment) in parents.iter().enumerate() {
        current = match current.get(segment.as_ref()) {
            None => return Ok(None),
            Some(Value::Object(map)) => map,
            Some(other) => {
                return Err(TreeError::wrong_type(
                    join_path(&path[..=i]),
                    "map",
                    other,
                ));
            }
        };
    }

    Ok(current.get(last.as_ref()))
}

/// Get the list of strings stored at `path`
///
/// Every element of the array must be a string; anything else is reported as
/// a wrong-type error for the whole path.
pub fn nested_string_list<S: AsRef<str>>(
    tree: &ConfigTree,
    path: &[S],
) -> Result<Option<Vec<String>>, TreeError> {
    let Some(value) = nested_value(tree, path)? else {
        return Ok(None);
    };

    let wrong_type = || TreeError::wrong_type(join_path(path), "[]string", value);

    let items = value.as_array().ok_or_else(wrong_type)?;
    items
        .iter()
        .map(|item| item.as_str().map(str::to_owned).ok_or_else(wrong_type))
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

/// Set `value` at `path`, creating intermediate maps as needed
pub fn set_nested_value<S: AsRef<str>>(
    tree: &mut ConfigTree,
    path: &[S],
    value: Value,
) -> Result<(), TreeError> {
    let Some((last, parents)) = path.split_last() else {
        return Err(TreeError::EmptyPath);
    };

    let mut current = tree;
    for (i, segment) in parents.iter().enumerate() {
        let entry = current
            .entry(segment.as_ref())
            .or_insert_with(|| Value::Object(Map::new()));
        current = match entry {
            Value::Object(map) => map,
            _ => return Err(TreeError::blocked(join_path(path), join_path(&path[..=i]))),
        };
    }

    current.insert(last.as_ref().to_owned(), value);
    Ok(())
}

/// Set a list of strings at `path`, creating intermediate maps as needed
pub fn set_nested_string_list<S: AsRef<str>>(
    tree: &mut ConfigTree,
    path: &[S],
    list: &[String],
) -> Result<(), TreeError> {
    let value = Value::Array(list.iter().cloned().map(Value::String).collect());
    set_nested_value(tree, path, value)
}

/// Deep merge two JSON values (right takes precedence for conflicts)
pub fn deep_merge(left: &mut Value, right: Value) {
    match (left, right) {
        (Value::Object(left_map), Value::Object(right_map)) => merge_trees(left_map, right_map),
        (left, right) => {
            *left = right;
        }
    }
}

/// Deep merge `right` into `left` key by key
pub fn merge_trees(left: &mut ConfigTree, right: ConfigTree) {
    for (key, right_value) in right {
        if let Some(left_value) = left.get_mut(&key) {
            deep_merge(left_value, right_value);
        } else {
            left.insert(key, right_value);
        }
    }
}
