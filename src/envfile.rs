//! Codec for the flat `KEY=VALUE` environment block stored on a Dokploy application.
//!
//! A block is newline-delimited when it contains a newline; a single-line block
//! is split on `&` instead. Blank lines and `#` comments are skipped, keys and
//! values are trimmed, and when a key repeats the last occurrence wins.
//!
//! [`serialize`] always emits a newline-terminated block, so a value holding
//! `&` survives the trip back through [`parse`]. Entries that `parse` could
//! not reproduce are refused instead of being written lossily.

use std::collections::BTreeMap;

use thiserror::Error;

/// Failures decoding or encoding an environment block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvFileError {
    #[error("env entry {line} is missing '=': '{entry}'")]
    MissingSeparator { line: usize, entry: String },

    #[error("env entry {line} has an empty key: '{entry}'")]
    EmptyKey { line: usize, entry: String },

    #[error("variable '{key}' cannot be stored in an env block: {reason}")]
    Unencodable { key: String, reason: &'static str },
}

/// Decode an environment block into a key/value mapping.
pub fn parse(block: &str) -> Result<BTreeMap<String, String>, EnvFileError> {
    let entries: Vec<&str> = if block.contains('\n') {
        block.lines().collect()
    } else {
        block.split('&').collect()
    };

    let mut vars = BTreeMap::new();
    for (idx, raw) in entries.into_iter().enumerate() {
        let entry = raw.trim();
        if entry.is_empty() || entry.starts_with('#') {
            continue;
        }

        let Some((key, value)) = entry.split_once('=') else {
            return Err(EnvFileError::MissingSeparator {
                line: idx + 1,
                entry: entry.to_string(),
            });
        };

        let key = key.trim();
        if key.is_empty() {
            return Err(EnvFileError::EmptyKey {
                line: idx + 1,
                entry: entry.to_string(),
            });
        }

        vars.insert(key.to_string(), value.trim().to_string());
    }

    Ok(vars)
}

/// Encode a mapping back into the flat block form, one `KEY=VALUE` per line.
pub fn serialize(vars: &BTreeMap<String, String>) -> Result<String, EnvFileError> {
    let mut block = String::new();
    for (key, value) in vars {
        check_entry(key, value)?;
        block.push_str(key);
        block.push('=');
        block.push_str(value);
        block.push('\n');
    }
    Ok(block)
}

fn check_entry(key: &str, value: &str) -> Result<(), EnvFileError> {
    let reason = if key.is_empty() {
        Some("empty key")
    } else if key.starts_with('#') {
        Some("key would be read back as a comment")
    } else if key.contains('=') {
        Some("key contains '='")
    } else if key.trim() != key {
        Some("key has surrounding whitespace")
    } else if key.contains(['\n', '\r']) || value.contains(['\n', '\r']) {
        Some("line breaks are not allowed")
    } else if value.trim() != value {
        Some("value has surrounding whitespace")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(EnvFileError::Unencodable {
            key: key.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}
