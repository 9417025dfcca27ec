// src/config/merge.rs
//
// Recursive merge of a JSON patch into a configuration tree.

use serde_json::Value;

/// Merge `patch` into `base` in place.
///
/// Objects are merged key by key; every other value (including arrays and
/// `null`) replaces the existing one wholesale.
pub fn merge_patch(base: &mut Value, patch: &Value) {
    match (base, patch) {
        (Value::Object(dst), Value::Object(src)) => {
            for (key, value) in src {
                match dst.get_mut(key) {
                    Some(slot) => merge_patch(slot, value),
                    None => {
                        dst.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (slot, value) => *slot = value.clone(),
    }
}
