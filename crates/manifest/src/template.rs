//! Template reference maps.
//!
//! A template is a kerchunk reference set produced by scanning one GRIB
//! message of the target variable. It fixes everything about a decoded chunk
//! (shape, dtype, codec, dimension names); only the byte range changes from
//! file to file.

use std::collections::BTreeMap;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{Map, Value};
use tracing::debug;

use reference_common::{RefError, RefResult};

use crate::adapter::ReferenceEntry;
use crate::assembler::ChunkRef;
use crate::zarr::{dimensions, ChunkKey, ZArray};

/// Axes the consolidated manifest prepends to the template's dimensions.
pub const GRID_DIMENSIONS: [&str; 2] = ["time", "member"];

const INLINE_PREFIX: &str = "base64:";

/// One array of a template.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateArray {
    pub zarray: ZArray,
    pub attrs: Map<String, Value>,
    /// Chunk references as they appear in the template.
    pub chunks: BTreeMap<String, Value>,
}

impl TemplateArray {
    pub fn dimensions(&self) -> Vec<String> {
        dimensions(&self.attrs).unwrap_or_default()
    }
}

/// A validated template for one data variable.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceTemplate {
    group_attrs: Map<String, Value>,
    arrays: BTreeMap<String, TemplateArray>,
    url_templates: BTreeMap<String, String>,
    data_var: String,
    data_chunk_key: ChunkKey,
}

fn invalid(msg: impl Into<String>) -> RefError {
    RefError::InvalidTemplate(msg.into())
}

/// Metadata documents are JSON strings inside `refs`, occasionally already
/// objects.
fn metadata_object(key: &str, value: &Value) -> RefResult<Map<String, Value>> {
    let parsed = match value {
        Value::String(s) => serde_json::from_str(s)
            .map_err(|e| invalid(format!("{} is not valid JSON: {}", key, e)))?,
        other => other.clone(),
    };
    match parsed {
        Value::Object(map) => Ok(map),
        _ => Err(invalid(format!("{} is not a JSON object", key))),
    }
}

impl ReferenceTemplate {
    /// Parse a kerchunk reference document (version 1, or version 0 where
    /// the refs are the top-level object).
    pub fn from_json(json: &str, data_var: &str) -> RefResult<Self> {
        let doc: Value = serde_json::from_str(json)?;
        let root = doc
            .as_object()
            .ok_or_else(|| invalid("template root is not an object"))?;

        let refs = match root.get("refs") {
            Some(Value::Object(refs)) => refs,
            Some(_) => return Err(invalid("refs is not an object")),
            None => root,
        };

        let url_templates = root
            .get("templates")
            .and_then(Value::as_object)
            .map(|t| {
                t.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default();

        let mut group_attrs = Map::new();
        let mut zarrays: BTreeMap<String, ZArray> = BTreeMap::new();
        let mut attrs: BTreeMap<String, Map<String, Value>> = BTreeMap::new();
        let mut chunks: BTreeMap<String, BTreeMap<String, Value>> = BTreeMap::new();

        for (key, value) in refs {
            let (array, leaf) = match key.rsplit_once('/') {
                Some((array, leaf)) => (array, leaf),
                None => ("", key.as_str()),
            };

            match (array, leaf) {
                ("", ".zgroup") | (_, ".zgroup") => {}
                ("", ".zattrs") => group_attrs = metadata_object(key, value)?,
                (_, ".zarray") => {
                    let zarray = serde_json::from_value(Value::Object(metadata_object(key, value)?))
                        .map_err(|e| invalid(format!("{}: {}", key, e)))?;
                    zarrays.insert(array.to_string(), zarray);
                }
                (_, ".zattrs") => {
                    attrs.insert(array.to_string(), metadata_object(key, value)?);
                }
                ("", _) => return Err(invalid(format!("unexpected top-level key {}", key))),
                (_, _) => {
                    chunks
                        .entry(array.to_string())
                        .or_default()
                        .insert(leaf.to_string(), value.clone());
                }
            }
        }

        let mut arrays = BTreeMap::new();
        for (name, zarray) in zarrays {
            arrays.insert(
                name.clone(),
                TemplateArray {
                    zarray,
                    attrs: attrs.remove(&name).unwrap_or_default(),
                    chunks: chunks.remove(&name).unwrap_or_default(),
                },
            );
        }
        if let Some(orphan) = chunks.keys().next() {
            return Err(invalid(format!("chunks for {} without .zarray", orphan)));
        }

        let data_chunk_key = Self::validate_data_array(&arrays, data_var)?;

        debug!(
            data_var = %data_var,
            arrays = arrays.len(),
            "Loaded reference template"
        );

        Ok(Self {
            group_attrs,
            arrays,
            url_templates,
            data_var: data_var.to_string(),
            data_chunk_key,
        })
    }

    /// Load a template from a JSON file.
    pub fn load(path: &Path, data_var: &str) -> RefResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json, data_var)
    }

    /// A data array must hold exactly one chunk that covers the whole array:
    /// one GRIB message decodes to one chunk.
    fn validate_data_array(
        arrays: &BTreeMap<String, TemplateArray>,
        data_var: &str,
    ) -> RefResult<ChunkKey> {
        let array = arrays
            .get(data_var)
            .ok_or_else(|| invalid(format!("no array named {}", data_var)))?;
        let zarray = &array.zarray;

        if zarray.shape.is_empty() {
            return Err(invalid(format!("{} is a scalar", data_var)));
        }
        if zarray.chunks != zarray.shape {
            return Err(invalid(format!(
                "{} chunks {:?} do not cover shape {:?}",
                data_var, zarray.chunks, zarray.shape
            )));
        }

        let dims = dimensions(&array.attrs)
            .ok_or_else(|| invalid(format!("{} has no dimension names", data_var)))?;
        if dims.len() != zarray.ndim() {
            return Err(invalid(format!(
                "{} declares {} dimensions for a {}-d array",
                data_var,
                dims.len(),
                zarray.ndim()
            )));
        }
        if let Some(dim) = dims.iter().find(|d| GRID_DIMENSIONS.contains(&d.as_str())) {
            return Err(invalid(format!(
                "{} already has a {} dimension",
                data_var, dim
            )));
        }

        if array.chunks.len() != 1 {
            return Err(invalid(format!(
                "{} has {} chunk references, expected 1",
                data_var,
                array.chunks.len()
            )));
        }
        let (key, _) = array
            .chunks
            .iter()
            .next()
            .ok_or_else(|| invalid(format!("{} has no chunk reference", data_var)))?;
        let chunk_key: ChunkKey = key
            .parse()
            .map_err(|_| invalid(format!("{}/{} is not a chunk key", data_var, key)))?;
        if chunk_key != ChunkKey::zeros(zarray.ndim()) {
            return Err(invalid(format!(
                "{}/{} is not the origin chunk",
                data_var, key
            )));
        }

        Ok(chunk_key)
    }

    pub fn data_var(&self) -> &str {
        &self.data_var
    }

    pub fn data_array(&self) -> &TemplateArray {
        // validated at construction
        &self.arrays[&self.data_var]
    }

    pub fn data_chunk_key(&self) -> &ChunkKey {
        &self.data_chunk_key
    }

    pub fn group_attrs(&self) -> &Map<String, Value> {
        &self.group_attrs
    }

    pub fn arrays(&self) -> &BTreeMap<String, TemplateArray> {
        &self.arrays
    }

    /// Arrays sharing only dimensions of the data variable (latitude,
    /// longitude); these are identical across files and copied verbatim.
    pub fn identical_dim_arrays(&self) -> impl Iterator<Item = (&str, &TemplateArray)> + '_ {
        let data_dims = self.data_array().dimensions();
        self.arrays
            .iter()
            .filter(move |(name, array)| {
                let dims = array.dimensions();
                name.as_str() != self.data_var
                    && !dims.is_empty()
                    && dims.iter().all(|d| data_dims.contains(d))
            })
            .map(|(name, array)| (name.as_str(), array))
    }

    fn expand_url(&self, url: &str) -> String {
        self.url_templates
            .iter()
            .fold(url.to_string(), |acc, (name, value)| {
                acc.replace(&format!("{{{{{}}}}}", name), value)
            })
    }

    /// Convert a template chunk reference into a manifest chunk.
    pub fn chunk_ref(&self, array: &str, key: &ChunkKey, raw: &Value) -> RefResult<ChunkRef> {
        match raw {
            Value::String(s) => match s.strip_prefix(INLINE_PREFIX) {
                Some(encoded) => STANDARD
                    .decode(encoded)
                    .map(ChunkRef::Inline)
                    .map_err(|e| invalid(format!("{}/{}: bad base64: {}", array, key, e))),
                None => Ok(ChunkRef::Inline(s.as_bytes().to_vec())),
            },
            Value::Array(parts) => match parts.as_slice() {
                [url, offset, length] => {
                    let url = url.as_str();
                    let offset = offset.as_u64();
                    let length = length.as_u64();
                    match (url, offset, length) {
                        (Some(url), Some(offset), Some(length)) => {
                            Ok(ChunkRef::Reference(ReferenceEntry {
                                chunk_key: key.clone(),
                                url: self.expand_url(url),
                                offset,
                                length,
                            }))
                        }
                        _ => Err(invalid(format!("{}/{}: malformed reference", array, key))),
                    }
                }
                _ => Err(invalid(format!(
                    "{}/{}: only [url, offset, length] references are supported",
                    array, key
                ))),
            },
            _ => Err(invalid(format!("{}/{}: unsupported chunk value", array, key))),
        }
    }
}
