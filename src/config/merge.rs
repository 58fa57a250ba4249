//! Layer merging
//!
//! Tables merge key by key; arrays and scalars from the later layer replace
//! the earlier value outright, so a user listing `data_dirs` gets exactly
//! that list.

use serde_json::{Map, Value};

/// Overlay `overlay` onto `base`
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => Value::Object(merge_tables(base, overlay)),
        (_, overlay) => overlay,
    }
}

fn merge_tables(mut base: Map<String, Value>, overlay: Map<String, Value>) -> Map<String, Value> {
    for (key, value) in overlay {
        let merged = match base.remove(&key) {
            Some(existing) => deep_merge(existing, value),
            None => value,
        };
        base.insert(key, merged);
    }
    base
}

/// Merge layers lowest precedence first
pub fn merge_layers(layers: impl IntoIterator<Item = Value>) -> Value {
    layers
        .into_iter()
        .fold(Value::Object(Map::new()), deep_merge)
}
