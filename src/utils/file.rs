//! File utilities shared by the ingestion tracker, splitter and history store.

use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// SHA-256 of `content`, hex encoded.
pub fn calculate_checksum(content: &str) -> String {
    let hash = Sha256::digest(content.as_bytes());
    hex::encode(hash)
}

/// True when `path` has `extension` (given with or without the dot), ignoring case.
pub fn has_extension(path: &Path, extension: &str) -> bool {
    let wanted = extension.trim_start_matches('.');
    path.extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(wanted))
        .unwrap_or(false)
}

/// Move a file, falling back to copy + remove when a rename crosses filesystems.
pub fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            // Only fall back when the source is still there; a vanished source is a real error.
            if !from.exists() {
                return Err(rename_err);
            }
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
    }
}

/// Write `bytes` next to `target` and rename over it, so readers never see a partial file.
pub fn write_atomic(target: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp = temp_sibling(target);
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, target).inspect_err(|_| {
        let _ = fs::remove_file(&tmp);
    })
}

/// A hidden temporary path in the same directory as `target`.
pub fn temp_sibling(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    target.with_file_name(format!(".{name}.{}.tmp", std::process::id()))
}

/// Sanitize a filename by replacing characters that are invalid on common filesystems.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c if c.is_control() => '-',
            c => c,
        })
        .collect::<String>()
        .trim_matches('-')
        .to_string()
}

/// File name of `path` as an owned string, or an empty string.
pub fn file_name_string(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}
