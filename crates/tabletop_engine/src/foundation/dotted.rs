//! Dotted-path lookups into TOML trees
//!
//! `"rules.dice.sides"` walks table `rules`, then `dice`, then key `sides`.

use toml::{Table, Value};

/// Look up `path` in `table`, one dot-separated segment at a time.
///
/// Returns `None` if any segment is missing or an intermediate value is not a
/// table. An empty path returns `None`.
pub fn lookup<'a>(table: &'a Table, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next().filter(|s| !s.is_empty())?;
    let mut current = table.get(first)?;
    for segment in segments {
        current = current.as_table()?.get(segment)?;
    }
    Some(current)
}

/// Set `value` at `path`, creating intermediate tables as needed.
///
/// Returns the previous value, if any. Fails (returning `Err(value)`) if an
/// intermediate segment exists but isn't a table.
pub fn insert(table: &mut Table, path: &str, value: Value) -> Result<Option<Value>, Value> {
    let mut segments: Vec<&str> = path.split('.').collect();
    let Some(leaf) = segments.pop().filter(|s| !s.is_empty()) else {
        return Err(value);
    };

    let mut current = table;
    for segment in segments {
        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Table(Table::new()));
        match entry {
            Value::Table(inner) => current = inner,
            _ => return Err(value),
        }
    }
    Ok(current.insert(leaf.to_string(), value))
}
