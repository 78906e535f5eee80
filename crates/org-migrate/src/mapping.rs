//! Username mapping between source and target instances.

use std::collections::HashMap;
use std::path::Path;

use crate::error::{MigrateError, Result};

/// Source-login to target-login mapping, loaded once per run and consulted
/// when replaying team membership. Injective in intent, not enforced.
#[derive(Debug, Clone, Default)]
pub struct UserMapping {
    entries: HashMap<String, String>,
}

impl UserMapping {
    /// Load from a CSV with columns `sourceUsername`/`source username` and
    /// `targetUsername`/`target username` (either header spelling accepted).
    pub fn load(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)?;

        let headers = reader.headers()?.clone();
        let source_idx = find_column(&headers, "sourceusername").ok_or_else(|| {
            MigrateError::Config(format!(
                "mapping file {} has no source username column",
                path.display()
            ))
        })?;
        let target_idx = find_column(&headers, "targetusername").ok_or_else(|| {
            MigrateError::Config(format!(
                "mapping file {} has no target username column",
                path.display()
            ))
        })?;

        let mut entries = HashMap::new();
        for record in reader.records() {
            let record = record?;
            let source = record.get(source_idx).unwrap_or("").trim();
            let target = record.get(target_idx).unwrap_or("").trim();
            if !source.is_empty() && !target.is_empty() {
                entries.insert(source.to_string(), target.to_string());
            }
        }

        Ok(Self { entries })
    }

    /// Destination login for a source login; unmapped logins pass through
    /// unchanged.
    pub fn map<'a>(&'a self, login: &'a str) -> &'a str {
        self.entries.get(login).map(String::as_str).unwrap_or(login)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn find_column(headers: &csv::StringRecord, normalized: &str) -> Option<usize> {
    headers
        .iter()
        .position(|h| h.to_lowercase().replace([' ', '_'], "") == normalized)
}
