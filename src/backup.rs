// src/backup.rs
//! Best-effort state backups: the history file plus a checksum manifest so a
//! restore can be verified.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

#[async_trait::async_trait]
pub trait BackupSink: Send + Sync {
    /// Store (relative path, content) pairs as one backup set.
    async fn store(&self, items: Vec<(String, String)>) -> Result<()>;
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(64);
    for b in digest.iter() {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[derive(Serialize)]
struct ManifestEntry {
    path: String,
    bytes: usize,
    sha256: String,
}

#[derive(Serialize)]
struct Manifest {
    timestamp: DateTime<Utc>,
    files: Vec<ManifestEntry>,
}

/// Read `paths`, append a manifest with SHA-256 checksums, and hand the set
/// to the sink. Missing files are skipped, not errors.
pub async fn backup_state_once<S: BackupSink>(paths: &[PathBuf], sink: &S) -> Result<()> {
    let mut items = Vec::new();
    let mut entries = Vec::new();
    for path in paths {
        let Ok(content) = fs::read_to_string(path) else {
            continue;
        };
        let name = path
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        entries.push(ManifestEntry {
            path: name.clone(),
            bytes: content.len(),
            sha256: sha256_hex(content.as_bytes()),
        });
        items.push((name, content));
    }

    let manifest = Manifest {
        timestamp: Utc::now(),
        files: entries,
    };
    items.push((
        "manifest.json".to_string(),
        serde_json::to_string_pretty(&manifest).context("encoding backup manifest")?,
    ));

    sink.store(items).await
}

/// Filesystem sink: one timestamped directory per backup set, oldest sets
/// removed past `max_backups`.
pub struct DirSink {
    root: PathBuf,
    max_backups: usize,
}

impl DirSink {
    pub fn new<P: AsRef<Path>>(root: P, max_backups: usize) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            max_backups: max_backups.max(1),
        }
    }

    fn cleanup_old(&self) -> Result<()> {
        let mut dirs: Vec<PathBuf> = fs::read_dir(&self.root)?
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        dirs.sort();
        while dirs.len() > self.max_backups {
            let oldest = dirs.remove(0);
            tracing::info!(path = %oldest.display(), "removing old backup");
            fs::remove_dir_all(&oldest)
                .with_context(|| format!("removing {}", oldest.display()))?;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl BackupSink for DirSink {
    async fn store(&self, items: Vec<(String, String)>) -> Result<()> {
        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let dir = self.root.join(format!("backup_{stamp}"));
        fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
        for (name, content) in items {
            fs::write(dir.join(&name), content)
                .with_context(|| format!("writing backup file {name}"))?;
        }
        self.cleanup_old()
    }
}

// --- Test helper ---
pub struct MockSink {
    pub calls: std::sync::Mutex<Vec<Vec<(String, String)>>>,
}

impl MockSink {
    pub fn new() -> Self {
        Self {
            calls: std::sync::Mutex::new(vec![]),
        }
    }
}

impl Default for MockSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl BackupSink for MockSink {
    async fn store(&self, items: Vec<(String, String)>) -> Result<()> {
        self.calls.lock().expect("mock sink mutex").push(items);
        Ok(())
    }
}
