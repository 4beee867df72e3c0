//! Dotted-path watch sources.

use super::value::Value;

/// Split `a.b.c` into segments.
///
/// Returns `None` for anything but letters, digits, `_`, `$` and `.`;
/// such expressions need a getter closure instead.
pub fn parse_path(path: &str) -> Option<Vec<String>> {
    let valid = path
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '_' | '$' | '.'));
    if !valid {
        return None;
    }
    Some(path.split('.').map(str::to_string).collect())
}

/// Walk `segments` from `root`, stopping at the first falsy value.
pub fn resolve(root: &Value, segments: &[String]) -> Value {
    let mut current = root.clone();
    for segment in segments {
        if !current.is_truthy() {
            return Value::Undefined;
        }
        current = current.get(segment);
    }
    current
}
