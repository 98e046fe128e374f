//! Provenance helpers.
//!
//! Dataset hashing, source-control revision lookup, and the footer block
//! that carries provenance inside rendered artifacts. The renderer writes
//! the block with [`render_block`] and the validator reads it back with
//! [`parse_block`], so both sides agree on one format.

use crate::models::{Provenance, ProvenanceField};
use chrono::{SecondsFormat, Utc};
use git2::Repository;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Opening marker of the provenance block.
pub const BLOCK_BEGIN: &str = "<!-- provenance:begin -->";
/// Closing marker of the provenance block.
pub const BLOCK_END: &str = "<!-- provenance:end -->";

/// SHA-256 of a single file, streamed in chunks.
pub fn file_sha256(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// SHA-256 over a set of dataset files.
///
/// Files are processed in sorted name order and each contributes its file
/// name and its bytes, so the digest does not depend on discovery order.
pub fn dataset_sha256(paths: &[PathBuf]) -> std::io::Result<String> {
    if let [single] = paths {
        return file_sha256(single);
    }

    let mut sorted: Vec<&PathBuf> = paths.iter().collect();
    sorted.sort_by_key(|p| p.file_name().map(|n| n.to_os_string()));

    let mut hasher = Sha256::new();
    for path in sorted {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
        hasher.update(std::fs::read(path)?);
        hasher.update([0u8]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Full commit id of HEAD for the repository enclosing `dir`, if any.
pub fn git_commit(dir: &Path) -> Option<String> {
    let repo = match Repository::discover(dir) {
        Ok(repo) => repo,
        Err(e) => {
            debug!("No git repository at {}: {}", dir.display(), e);
            return None;
        }
    };

    repo.head()
        .ok()
        .and_then(|head| head.peel_to_commit().ok())
        .map(|commit| commit.id().to_string())
}

/// Current UTC time in RFC 3339 form.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Render the provenance block. Unset fields are omitted.
pub fn render_block(provenance: &Provenance) -> String {
    let mut block = String::new();

    block.push_str(BLOCK_BEGIN);
    block.push('\n');
    for field in ProvenanceField::ALL {
        if let Some(value) = provenance.get(field) {
            block.push_str(&format!("- {}: {}\n", field.key(), value));
        }
    }
    block.push_str(BLOCK_END);
    block.push('\n');

    block
}

/// Provenance fields found in an artifact's block.
///
/// Returns `None` when the artifact carries no block at all. Lines with
/// unknown keys are ignored; empty values are kept so the caller can
/// report them.
pub fn parse_block(text: &str) -> Option<BTreeMap<ProvenanceField, String>> {
    let start = text.find(BLOCK_BEGIN)? + BLOCK_BEGIN.len();
    let end = start + text[start..].find(BLOCK_END)?;

    let mut fields = BTreeMap::new();
    for line in text[start..end].lines() {
        let line = line.trim().trim_start_matches(['-', '*']).trim();
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        if let Some(field) = ProvenanceField::from_key(key.trim()) {
            fields.insert(field, value.trim().to_string());
        }
    }

    Some(fields)
}

/// Text with the provenance block removed, for number scanning.
pub fn strip_block(text: &str) -> String {
    match (text.find(BLOCK_BEGIN), text.find(BLOCK_END)) {
        (Some(start), Some(end)) if end > start => {
            format!("{}{}", &text[..start], &text[end + BLOCK_END.len()..])
        }
        _ => text.to_string(),
    }
}
