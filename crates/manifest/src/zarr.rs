//! Zarr v2 array metadata as carried in kerchunk references.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// Attribute xarray reads dimension names from.
pub const ARRAY_DIMENSIONS: &str = "_ARRAY_DIMENSIONS";

/// Contents of a `.zarray` document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZArray {
    pub chunks: Vec<u64>,
    pub compressor: Option<Value>,
    pub dtype: String,
    pub fill_value: Value,
    pub filters: Option<Vec<Value>>,
    pub order: String,
    pub shape: Vec<u64>,
    pub zarr_format: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension_separator: Option<String>,
}

impl ZArray {
    /// Uncompressed, unfiltered array with a single chunk.
    pub fn inline(dtype: impl Into<String>, shape: Vec<u64>) -> Self {
        let chunks = shape.iter().map(|&n| n.max(1)).collect();
        Self {
            chunks,
            compressor: None,
            dtype: dtype.into(),
            fill_value: Value::Null,
            filters: None,
            order: "C".to_string(),
            shape,
            zarr_format: 2,
            dimension_separator: None,
        }
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }
}

/// Dimension names from an attribute map.
pub fn dimensions(attrs: &Map<String, Value>) -> Option<Vec<String>> {
    attrs
        .get(ARRAY_DIMENSIONS)?
        .as_array()?
        .iter()
        .map(|v| v.as_str().map(str::to_string))
        .collect()
}

pub fn set_dimensions(attrs: &mut Map<String, Value>, dims: &[String]) {
    attrs.insert(
        ARRAY_DIMENSIONS.to_string(),
        Value::Array(dims.iter().cloned().map(Value::String).collect()),
    );
}

/// JSON form of a floating-point fill value.
///
/// Zarr v2 spells non-finite values as strings.
pub fn fill_value_json(value: f64) -> Value {
    if value.is_nan() {
        Value::String("NaN".to_string())
    } else if value == f64::INFINITY {
        Value::String("Infinity".to_string())
    } else if value == f64::NEG_INFINITY {
        Value::String("-Infinity".to_string())
    } else {
        serde_json::Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

/// Position of a chunk in an array's chunk grid.
///
/// Ordered component-wise, so `BTreeMap<ChunkKey, _>` iterates in on-disk
/// layout order. A 0-d array has the single key `0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkKey(Vec<u64>);

impl ChunkKey {
    pub fn scalar() -> Self {
        Self(Vec::new())
    }

    pub fn zeros(ndim: usize) -> Self {
        Self(vec![0; ndim])
    }

    pub fn indices(&self) -> &[u64] {
        &self.0
    }

    /// This key with `leading` indices prepended.
    pub fn prefixed(&self, leading: &[u64]) -> Self {
        let mut indices = leading.to_vec();
        indices.extend_from_slice(&self.0);
        Self(indices)
    }
}

impl fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("0");
        }
        for (i, idx) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", idx)?;
        }
        Ok(())
    }
}

impl FromStr for ChunkKey {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split('.')
            .map(str::parse)
            .collect::<Result<Vec<u64>, _>>()
            .map(Self)
    }
}

impl Serialize for ChunkKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
