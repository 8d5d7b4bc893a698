// Tabular Store: job postings keyed by job_id, plus the plain-text offer corpus.

pub mod handlers;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::models::JobRecord;

/// Job records loaded from a JSON Lines file. Read-only after load.
#[derive(Debug, Default)]
pub struct JobStore {
    rows: Vec<JobRecord>,
    by_id: HashMap<String, usize>,
}

impl JobStore {
    pub fn from_records(rows: Vec<JobRecord>) -> Self {
        let mut by_id = HashMap::with_capacity(rows.len());
        for (position, row) in rows.iter().enumerate() {
            if let Some(id) = &row.job_id {
                if by_id.contains_key(id) {
                    warn!("Duplicate job_id {id}; keeping the first row");
                    continue;
                }
                by_id.insert(id.clone(), position);
            }
        }
        Self { rows, by_id }
    }

    /// One `JobRecord` object per line; blank lines are skipped.
    pub fn parse(content: &str) -> Result<Self> {
        let rows = content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(n, line)| {
                serde_json::from_str::<JobRecord>(line)
                    .with_context(|| format!("malformed job record on line {}", n + 1))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_records(rows))
    }

    /// Loads the store, or an empty one when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No job store at {}; starting empty", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read job store {}", path.display()))?;
        let store = Self::parse(&content)
            .with_context(|| format!("failed to parse job store {}", path.display()))?;
        info!("Loaded {} job records from {}", store.len(), path.display());
        Ok(store)
    }

    pub fn get(&self, job_id: &str) -> Option<&JobRecord> {
        self.by_id.get(job_id).map(|&i| &self.rows[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &JobRecord> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Recursively reads every `.txt` and `.md` file under `dir`.
/// Returns `(path relative to dir, content)` sorted by path.
pub fn load_texts(dir: &Path) -> Result<Vec<(String, String)>> {
    let mut files = Vec::new();
    collect_text_files(dir, &mut files)
        .with_context(|| format!("failed to walk {}", dir.display()))?;
    files.sort();

    files
        .into_iter()
        .map(|path| {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let relative = path.strip_prefix(dir).unwrap_or(&path);
            Ok((relative.to_string_lossy().into_owned(), content))
        })
        .collect()
}

fn collect_text_files(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_text_files(&path, out)?;
        } else if matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("txt") | Some("md")
        ) {
            out.push(path);
        }
    }
    Ok(())
}
