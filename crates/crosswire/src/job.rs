//! Propagation job files: the parent model to rename under, the clone
//! fan-out, and an optional duplicate policy override.
//!
//! ```toml
//! parent_model = "BCE-Reranker-Base"
//! on_duplicate = "skip"
//!
//! [[clone]]
//! source_model = "base-cfg"
//! suppliers = [1, 2]
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use crate::engine::{CloneSelection, DuplicatePolicy};

#[derive(Debug, Clone, Deserialize)]
pub struct RawJobFile {
    pub parent_model: String,
    #[serde(default, rename = "clone")]
    pub clones: Vec<RawCloneEntry>,
    #[serde(default)]
    pub on_duplicate: Option<DuplicatePolicy>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawCloneEntry {
    pub source_model: String,
    #[serde(default)]
    pub suppliers: Vec<i64>,
}

/// A validated job ready for planning.
#[derive(Debug, Clone)]
pub struct Job {
    pub parent_model: String,
    pub selections: Vec<CloneSelection>,
    /// Duplicate handling from the job file; the caller falls back to its
    /// configured policy (and finally the default) when unset.
    pub policy: Option<DuplicatePolicy>,
}

pub fn from_toml_str(s: &str) -> anyhow::Result<Job> {
    let raw: RawJobFile = toml::from_str(s)?;
    build_job(raw)
}

pub fn load_from_file(path: &Path) -> anyhow::Result<Job> {
    let content = std::fs::read_to_string(path)?;
    from_toml_str(&content)
}

fn build_job(raw: RawJobFile) -> anyhow::Result<Job> {
    let parent_model = raw.parent_model.trim().to_string();
    if parent_model.is_empty() {
        anyhow::bail!("'parent_model' must not be empty");
    }
    let mut selections: Vec<CloneSelection> = Vec::new();
    for entry in raw.clones {
        let source_model = entry.source_model.trim().to_string();
        if source_model.is_empty() {
            anyhow::bail!("[[clone]] entry with an empty 'source_model'");
        }
        // Repeated [[clone]] tables for one source merge; supplier ids are
        // de-duplicated with their first-seen order kept.
        let mut seen: HashSet<i64> = HashSet::new();
        let mut supplier_ids = Vec::new();
        for id in entry.suppliers {
            if seen.insert(id) {
                supplier_ids.push(id);
            }
        }
        if let Some(existing) = selections
            .iter_mut()
            .find(|s| s.source_model == source_model)
        {
            for id in supplier_ids {
                if !existing.supplier_ids.contains(&id) {
                    existing.supplier_ids.push(id);
                }
            }
        } else {
            selections.push(CloneSelection {
                source_model,
                supplier_ids,
            });
        }
    }
    Ok(Job {
        parent_model,
        selections,
        policy: raw.on_duplicate,
    })
}
