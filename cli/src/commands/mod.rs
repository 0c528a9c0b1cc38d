pub mod city;
pub mod clip;
pub mod region;

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;

/// Pretty-print `value` to `path`, or to stdout when no path is given.
pub fn emit_json(value: &Value, path: Option<&Path>) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("[commands] Failed to serialize output")?;
    match path {
        Some(path) => std::fs::write(path, text)
            .with_context(|| format!("[commands] Failed to write {}", path.display())),
        None => {
            println!("{text}");
            Ok(())
        }
    }
}
