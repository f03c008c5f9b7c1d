//! Low-level discovery document for monitoring backends.
//!
//! Every bundle becomes one `{#PROCGROUP}` macro entry; the `idle`
//! pseudo-bundle is always appended last.

use crate::bundle::IDLE_BUNDLE;
use serde_json::{json, Value};

/// Macro name carried by each discovery entry.
pub const DISCOVERY_MACRO: &str = "{#PROCGROUP}";

pub fn discovery_document<S: AsRef<str>>(names: &[S]) -> Value {
    let mut data: Vec<Value> = names
        .iter()
        .map(|n| n.as_ref())
        .filter(|n| *n != IDLE_BUNDLE)
        .map(|n| json!({ DISCOVERY_MACRO: n }))
        .collect();
    data.push(json!({ DISCOVERY_MACRO: IDLE_BUNDLE }));
    json!({ "data": data })
}

/// Compact JSON text of the discovery document.
pub fn discovery_json<S: AsRef<str>>(names: &[S]) -> String {
    discovery_document(names).to_string()
}
