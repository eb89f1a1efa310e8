use serde_json::{Map, Value};

/// One leaf-level difference between two JSON documents.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Change {
    pub path: String,
    pub old: Value,
    pub new: Value,
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

/// Walk `previous` and `current` in parallel and collect leaf changes.
///
/// Objects are compared key by key and arrays index by index (`elements[2]`),
/// so a single zone changing inside `zones.elements` yields only that zone's
/// leaves. Removed keys are reported with a `null` new value.
pub(crate) fn diff_json(previous: &Value, current: &Value, path: &str, changes: &mut Vec<Change>) {
    match (previous, current) {
        (Value::Object(prev_map), Value::Object(curr_map)) => {
            for (key, curr_val) in curr_map {
                let child = join(path, key);
                match prev_map.get(key) {
                    Some(prev_val) => diff_json(prev_val, curr_val, &child, changes),
                    None if curr_val.is_object() => {
                        diff_json(&Value::Object(Map::new()), curr_val, &child, changes);
                    }
                    None => changes.push(Change {
                        path: child,
                        old: Value::Null,
                        new: curr_val.clone(),
                    }),
                }
            }
            for (key, prev_val) in prev_map {
                if !curr_map.contains_key(key) {
                    changes.push(Change {
                        path: join(path, key),
                        old: prev_val.clone(),
                        new: Value::Null,
                    });
                }
            }
        }
        (Value::Array(prev_arr), Value::Array(curr_arr)) => {
            let len = prev_arr.len().max(curr_arr.len());
            for i in 0..len {
                let child = format!("{path}[{i}]");
                match (prev_arr.get(i), curr_arr.get(i)) {
                    (Some(p), Some(c)) => diff_json(p, c, &child, changes),
                    (p, c) => changes.push(Change {
                        path: child,
                        old: p.cloned().unwrap_or(Value::Null),
                        new: c.cloned().unwrap_or(Value::Null),
                    }),
                }
            }
        }
        (prev, curr) if prev != curr => changes.push(Change {
            path: path.to_string(),
            old: prev.clone(),
            new: curr.clone(),
        }),
        _ => {}
    }
}
