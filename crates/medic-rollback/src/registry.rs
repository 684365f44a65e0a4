//! On-disk ticket → patch-file registry
//!
//! Persisted as `registry.json` in the patch directory. Updates replace the
//! file via a temp-file + rename so a crash mid-write never truncates it.
//! The diff file itself is written before its registry entry; a crash
//! between the two can orphan a `.patch` file but never leaves the registry
//! pointing at a missing patch.

use crate::RollbackError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const REGISTRY_FILE: &str = "registry.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryDocument {
    patches: BTreeMap<String, String>,
}

/// Write-once mapping from ticket id to patch file name
#[derive(Debug)]
pub struct PatchRegistry {
    dir: PathBuf,
    entries: BTreeMap<String, String>,
}

impl PatchRegistry {
    /// Open (or create) the registry under `dir`
    ///
    /// # Errors
    /// `RollbackError::RegistryCorrupt` if an existing registry fails to
    /// parse; `RollbackError::Io` on filesystem failure.
    pub fn open(dir: &Path) -> Result<Self, RollbackError> {
        fs::create_dir_all(dir)?;
        let path = dir.join(REGISTRY_FILE);
        let entries = if path.exists() {
            let text = fs::read_to_string(&path)?;
            serde_json::from_str::<RegistryDocument>(&text)
                .map_err(|e| RollbackError::RegistryCorrupt {
                    path: path.clone(),
                    message: e.to_string(),
                })?
                .patches
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            dir: dir.to_path_buf(),
            entries,
        })
    }

    /// Directory holding the registry and its patch files
    #[inline]
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether a patch is registered for `ticket_id`
    #[inline]
    #[must_use]
    pub fn contains(&self, ticket_id: &str) -> bool {
        self.entries.contains_key(ticket_id)
    }

    /// Full path of the registered patch file for `ticket_id`, if any
    #[must_use]
    pub fn patch_file(&self, ticket_id: &str) -> Option<PathBuf> {
        self.entries.get(ticket_id).map(|name| self.dir.join(name))
    }

    /// Ticket ids with a registered patch, in sorted order
    #[must_use]
    pub fn registered(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Record `ticket_id` → `file_name`; write-once
    pub(crate) fn insert(&mut self, ticket_id: &str, file_name: &str) -> Result<(), RollbackError> {
        if self.entries.contains_key(ticket_id) {
            return Err(RollbackError::AlreadyRegistered(ticket_id.to_string()));
        }
        self.entries
            .insert(ticket_id.to_string(), file_name.to_string());
        self.persist()
    }

    /// Drop the entry for `ticket_id`; no-op if absent
    pub(crate) fn remove(&mut self, ticket_id: &str) -> Result<(), RollbackError> {
        if self.entries.remove(ticket_id).is_some() {
            self.persist()?;
        }
        Ok(())
    }

    fn persist(&self) -> Result<(), RollbackError> {
        let doc = RegistryDocument {
            patches: self.entries.clone(),
        };
        let text = serde_json::to_string_pretty(&doc)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let path = self.dir.join(REGISTRY_FILE);
        let tmp = self.dir.join(format!("{REGISTRY_FILE}.tmp"));
        fs::write(&tmp, text)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}
