//! JSON output for listings.
//!
//! Serializes rows for scripting and piping.

use serde::Serialize;

pub fn render<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
}
