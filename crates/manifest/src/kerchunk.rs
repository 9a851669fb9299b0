//! Kerchunk v1 reference JSON output.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Map, Value};
use tracing::info;

use reference_common::RefResult;

use crate::assembler::{ChunkRef, ConsolidatedManifest, GapsReport};

/// Kerchunk reference format version written.
pub const KERCHUNK_VERSION: u64 = 1;

/// The manifest as a kerchunk document.
///
/// Fill-marked chunks are left out of `refs`; readers then yield the array's
/// `fill_value` for them.
pub fn to_kerchunk(manifest: &ConsolidatedManifest) -> RefResult<Value> {
    let mut refs = Map::new();
    refs.insert(
        ".zgroup".to_string(),
        Value::String(json!({"zarr_format": 2}).to_string()),
    );
    refs.insert(
        ".zattrs".to_string(),
        Value::String(serde_json::to_string(&manifest.group_attrs)?),
    );

    for (name, array) in &manifest.arrays {
        refs.insert(
            format!("{}/.zarray", name),
            Value::String(serde_json::to_string(&array.zarray)?),
        );
        refs.insert(
            format!("{}/.zattrs", name),
            Value::String(serde_json::to_string(&array.attrs)?),
        );

        for (key, chunk) in &array.chunks {
            let value = match chunk {
                ChunkRef::Reference(entry) => json!([entry.url, entry.offset, entry.length]),
                ChunkRef::Inline(bytes) => Value::String(format!("base64:{}", STANDARD.encode(bytes))),
                ChunkRef::Fill => continue,
            };
            refs.insert(format!("{}/{}", name, key), value);
        }
    }

    Ok(json!({
        "version": KERCHUNK_VERSION,
        "refs": refs,
    }))
}

pub fn to_json_string(manifest: &ConsolidatedManifest) -> RefResult<String> {
    Ok(serde_json::to_string(&to_kerchunk(manifest)?)?)
}

/// Gaps report path for a manifest path: `<stem>.gaps.json` next to it.
pub fn gaps_path(manifest_path: &Path) -> PathBuf {
    let stem = manifest_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "manifest".to_string());
    manifest_path.with_file_name(format!("{}.gaps.json", stem))
}

fn ensure_parent(path: &Path) -> RefResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

pub fn write_manifest(manifest: &ConsolidatedManifest, path: &Path) -> RefResult<()> {
    ensure_parent(path)?;
    std::fs::write(path, to_json_string(manifest)?)?;
    info!(
        path = %path.display(),
        references = manifest.reference_count(),
        "Wrote manifest"
    );
    Ok(())
}

pub fn write_gaps(report: &GapsReport, path: &Path) -> RefResult<()> {
    ensure_parent(path)?;
    std::fs::write(path, serde_json::to_string_pretty(report)?)?;
    info!(path = %path.display(), gaps = report.gaps.len(), "Wrote gaps report");
    Ok(())
}
