//! Local copy of a realtime JSON subtree, kept current from streamed events.

use serde_json::{Map, Value};

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Replace the node at `path` with `data`. `null` deletes the node.
pub(crate) fn put(root: &mut Value, path: &str, data: Value) {
    put_at(root, &segments(path), data);
}

/// Merge the children of `data` into the node at `path`.
pub(crate) fn patch(root: &mut Value, path: &str, data: Value) {
    let base = segments(path);
    match data {
        Value::Object(children) => {
            for (key, value) in children {
                let mut child_path = base.clone();
                child_path.push(key.as_str());
                put_at(root, &child_path, value);
            }
        }
        other => put_at(root, &base, other),
    }
}

fn put_at(node: &mut Value, path: &[&str], data: Value) {
    let Some((head, rest)) = path.split_first() else {
        *node = data;
        return;
    };

    if !node.is_object() {
        if data.is_null() {
            return;
        }
        *node = Value::Object(Map::new());
    }

    let now_empty = match node.as_object_mut() {
        Some(children) => {
            let child = children.entry(head.to_string()).or_insert(Value::Null);
            put_at(child, rest, data);
            let prune = match child {
                Value::Null => true,
                Value::Object(grandchildren) => grandchildren.is_empty(),
                _ => false,
            };
            if prune {
                children.remove(*head);
            }
            children.is_empty()
        }
        None => false,
    };

    // Empty nodes do not exist in the realtime tree.
    if now_empty {
        *node = Value::Null;
    }
}
