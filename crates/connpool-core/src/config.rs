//! Key/value configuration sources
//!
//! Pool parameters are read through the `ConfigSource` trait so the
//! application decides where they come from: a `.properties` file, a TOML
//! document, or an in-memory map.

mod properties;

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::path::Path;

use crate::{PoolError, Result};

pub use properties::Properties;

/// A string key/value lookup supplying pool parameters
pub trait ConfigSource: Send + Sync {
    /// Look up a key
    fn get(&self, key: &str) -> Option<String>;

    /// Look up a key that must be present
    fn require(&self, key: &str) -> Result<String> {
        self.get(key).ok_or_else(|| {
            PoolError::Initialization(format!("missing required configuration key '{}'", key))
        })
    }
}

impl ConfigSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

/// Dotted keys walk nested tables, so `db.url` matches both a top-level
/// `"db.url"` key and `url` inside a `[db]` table.
impl ConfigSource for toml::Table {
    fn get(&self, key: &str) -> Option<String> {
        if let Some(value) = toml::Table::get(self, key) {
            return scalar_to_string(value);
        }

        let mut parts = key.split('.');
        let mut current = toml::Table::get(self, parts.next()?)?;
        for part in parts {
            current = current.as_table()?.get(part)?;
        }
        scalar_to_string(current)
    }
}

fn scalar_to_string(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(s) => Some(s.clone()),
        toml::Value::Integer(i) => Some(i.to_string()),
        toml::Value::Float(f) => Some(f.to_string()),
        toml::Value::Boolean(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Load a configuration file, choosing the format by extension
///
/// `.toml` files are parsed as TOML; anything else is read as a
/// `.properties` file.
pub fn load_file(path: impl AsRef<Path>) -> Result<Box<dyn ConfigSource>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| {
        PoolError::Initialization(format!(
            "failed to read configuration file '{}': {}",
            path.display(),
            e
        ))
    })?;

    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

    tracing::debug!(path = %path.display(), toml = is_toml, "loading configuration file");
    if is_toml {
        let table: toml::Table = text.parse().map_err(|e| {
            PoolError::Initialization(format!(
                "invalid TOML in '{}': {}",
                path.display(),
                e
            ))
        })?;
        Ok(Box::new(table))
    } else {
        Ok(Box::new(Properties::parse(&text)?))
    }
}
