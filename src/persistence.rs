//! Local store adapter: one JSON document on disk.
//!
//! Writes only to data_local_dir()/osrs-bank-companion/, never to
//! arbitrary paths. A corrupt or missing file falls back to full
//! defaults, never to a half-parsed state.

use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::types::LocalDocument;

const DOCUMENT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentFile {
    pub version: u32,
    pub data: LocalDocument,
}

fn app_data_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("osrs-bank-companion"))
}

pub fn document_path() -> Option<PathBuf> {
    app_data_dir().map(|d| d.join("state.json"))
}

/// Load the persisted document. `Ok(None)` means "use defaults":
/// missing file, no data dir, or unreadable content.
pub fn load_document(path: &Path) -> io::Result<Option<LocalDocument>> {
    if !path.exists() {
        return Ok(None);
    }

    let data = fs::read_to_string(path)?;
    if let Ok(parsed) = serde_json::from_str::<DocumentFile>(&data) {
        return Ok(Some(parsed.data));
    }

    // legacy: raw document without the version wrapper
    if let Ok(legacy) = serde_json::from_str::<LocalDocument>(&data) {
        return Ok(Some(legacy));
    }

    warn!("Persisted document at {} is corrupt, falling back to defaults", path.display());
    Ok(None)
}

fn atomic_write(path: &Path, content: &str) -> io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    fs::create_dir_all(dir)?;

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, content)?;
    // Windows: rename over an existing file can fail, so remove first.
    if path.exists() {
        let _ = fs::remove_file(path);
    }
    fs::rename(tmp, path)?;
    Ok(())
}

pub fn save_document(path: &Path, doc: &LocalDocument) -> io::Result<()> {
    let file = DocumentFile { version: DOCUMENT_VERSION, data: doc.clone() };
    let json = serde_json::to_string(&file)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    atomic_write(path, &json)
}
