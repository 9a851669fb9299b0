//! Merges per-file references into one manifest over the coordinate grid.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use reference_common::{CoordinateGrid, Member, RefError, RefResult, SlotError, SlotKey};

use crate::adapter::{FileReference, ReferenceEntry};
use crate::encoding::{encode_epoch_seconds, encode_fixed_unicode, encode_i64};
use crate::template::{ReferenceTemplate, GRID_DIMENSIONS};
use crate::zarr::{fill_value_json, set_dimensions, ChunkKey, ZArray};

const EPOCH_UNITS: &str = "seconds since 1970-01-01T00:00:00";

/// Contents of one manifest chunk.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkRef {
    Reference(ReferenceEntry),
    Inline(Vec<u8>),
    /// No data for this chunk; readers see the array's fill value.
    Fill,
}

impl ChunkRef {
    pub fn is_fill(&self) -> bool {
        matches!(self, ChunkRef::Fill)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayManifest {
    pub zarray: ZArray,
    pub attrs: Map<String, Value>,
    pub chunks: BTreeMap<ChunkKey, ChunkRef>,
}

impl ArrayManifest {
    fn inline(dtype: impl Into<String>, shape: Vec<u64>, dims: &[&str], payload: Vec<u8>) -> Self {
        let ndim = shape.len();
        let has_data = shape.iter().all(|&n| n > 0);
        let mut attrs = Map::new();
        set_dimensions(&mut attrs, &dims.iter().map(|d| d.to_string()).collect::<Vec<_>>());

        let mut chunks = BTreeMap::new();
        if has_data {
            chunks.insert(ChunkKey::zeros(ndim), ChunkRef::Inline(payload));
        }

        Self {
            zarray: ZArray::inline(dtype, shape),
            attrs,
            chunks,
        }
    }

    fn with_attr(mut self, key: &str, value: Value) -> Self {
        self.attrs.insert(key.to_string(), value);
        self
    }
}

/// Every array of the consolidated dataset, keyed by path.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsolidatedManifest {
    pub group_attrs: Map<String, Value>,
    pub arrays: BTreeMap<String, ArrayManifest>,
    data_var: String,
}

impl ConsolidatedManifest {
    pub fn data_var(&self) -> &str {
        &self.data_var
    }

    pub fn data_array(&self) -> Option<&ArrayManifest> {
        self.arrays.get(&self.data_var)
    }

    pub fn array(&self, name: &str) -> Option<&ArrayManifest> {
        self.arrays.get(name)
    }

    /// Data chunks backed by a remote byte range.
    pub fn reference_count(&self) -> usize {
        self.data_array().map_or(0, |a| {
            a.chunks
                .values()
                .filter(|c| matches!(c, ChunkRef::Reference(_)))
                .count()
        })
    }

    /// Data chunks carrying a fill marker.
    pub fn fill_count(&self) -> usize {
        self.data_array()
            .map_or(0, |a| a.chunks.values().filter(|c| c.is_fill()).count())
    }
}

/// One fill-valued slot and why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GapEntry {
    pub time: DateTime<Utc>,
    pub member: Member,
    pub time_index: usize,
    pub member_index: usize,
    pub reason: SlotError,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GapsReport {
    pub total_slots: usize,
    pub filled_slots: usize,
    pub gaps: Vec<GapEntry>,
    /// Times with no data for any member.
    pub missing_times: Vec<DateTime<Utc>>,
}

impl GapsReport {
    pub fn is_empty(&self) -> bool {
        self.gaps.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssembleOptions {
    pub fill_value: f64,
    pub forecast_hour: u32,
    /// Fail with [`RefError::EmptyGrid`] instead of emitting an empty
    /// manifest.
    pub require_slots: bool,
}

impl Default for AssembleOptions {
    fn default() -> Self {
        Self {
            fill_value: f64::NAN,
            forecast_hour: 24,
            require_slots: false,
        }
    }
}

pub struct ManifestAssembler {
    template: Arc<ReferenceTemplate>,
    options: AssembleOptions,
}

impl ManifestAssembler {
    pub fn new(template: Arc<ReferenceTemplate>, options: AssembleOptions) -> Self {
        Self { template, options }
    }

    pub fn options(&self) -> &AssembleOptions {
        &self.options
    }

    pub fn assemble(
        &self,
        grid: &CoordinateGrid,
        results: &HashMap<SlotKey, Result<FileReference, SlotError>>,
    ) -> RefResult<(ConsolidatedManifest, GapsReport)> {
        if grid.is_empty() && self.options.require_slots {
            return Err(RefError::EmptyGrid);
        }

        for key in results.keys().filter(|k| !grid.contains(k)) {
            warn!(slot = %key, "Ignoring result for slot outside the grid");
        }

        let mut data = self.data_array(grid);
        let mut report = GapsReport {
            total_slots: grid.len(),
            ..Default::default()
        };
        let mut missing_per_time = vec![0usize; grid.times().len()];

        for (pos, key) in grid.slots() {
            let outcome = results.get(&key).cloned().unwrap_or_else(|| {
                Err(SlotError::transport(key.to_string(), "no fetch result for slot"))
            });
            let leading = [pos.time_index as u64, pos.member_index as u64];

            match outcome {
                Ok(reference) => {
                    let mut entry = reference.entry;
                    entry.chunk_key = entry.chunk_key.prefixed(&leading);
                    data.chunks
                        .insert(entry.chunk_key.clone(), ChunkRef::Reference(entry));
                    report.filled_slots += 1;
                }
                Err(reason) => {
                    let chunk_key = self.template.data_chunk_key().prefixed(&leading);
                    data.chunks.insert(chunk_key, ChunkRef::Fill);
                    missing_per_time[pos.time_index] += 1;
                    report.gaps.push(GapEntry {
                        time: key.time,
                        member: key.member,
                        time_index: pos.time_index,
                        member_index: pos.member_index,
                        reason,
                    });
                }
            }
        }

        let members = grid.members().len();
        report.missing_times = grid
            .times()
            .iter()
            .zip(&missing_per_time)
            .filter(|(_, missing)| members > 0 && **missing == members)
            .map(|(t, _)| *t)
            .collect();

        let mut arrays = BTreeMap::new();
        arrays.insert(self.template.data_var().to_string(), data);
        for (name, array) in self.coordinate_arrays(grid)? {
            arrays.insert(name, array);
        }

        info!(
            slots = report.total_slots,
            references = report.filled_slots,
            gaps = report.gaps.len(),
            missing_times = report.missing_times.len(),
            "Assembled manifest"
        );

        Ok((
            ConsolidatedManifest {
                group_attrs: self.template.group_attrs().clone(),
                arrays,
                data_var: self.template.data_var().to_string(),
            },
            report,
        ))
    }

    /// Data array metadata: `[time, member, ...template]` with one chunk per
    /// message.
    fn data_array(&self, grid: &CoordinateGrid) -> ArrayManifest {
        let template = self.template.data_array();
        let (t, m) = grid.shape();

        let mut zarray = template.zarray.clone();
        zarray.shape = [t as u64, m as u64]
            .into_iter()
            .chain(template.zarray.shape.iter().copied())
            .collect();
        zarray.chunks = [1, 1]
            .into_iter()
            .chain(template.zarray.chunks.iter().copied())
            .collect();
        zarray.fill_value = fill_value_json(self.options.fill_value);

        let mut attrs = template.attrs.clone();
        let dims: Vec<String> = GRID_DIMENSIONS
            .iter()
            .map(|d| d.to_string())
            .chain(template.dimensions())
            .collect();
        set_dimensions(&mut attrs, &dims);
        attrs.insert("coordinates".to_string(), json!("step valid_time"));

        ArrayManifest {
            zarray,
            attrs,
            chunks: BTreeMap::new(),
        }
    }

    fn coordinate_arrays(&self, grid: &CoordinateGrid) -> RefResult<Vec<(String, ArrayManifest)>> {
        let times = grid.times();
        let t = times.len() as u64;
        let step = Duration::hours(i64::from(self.options.forecast_hour));
        let valid: Vec<DateTime<Utc>> = times.iter().map(|time| *time + step).collect();

        let mut out = vec![
            (
                "time".to_string(),
                ArrayManifest::inline("<i8", vec![t], &["time"], encode_epoch_seconds(times))
                    .with_attr("units", json!(EPOCH_UNITS))
                    .with_attr("calendar", json!("proleptic_gregorian"))
                    .with_attr("standard_name", json!("forecast_reference_time"))
                    .with_attr("long_name", json!("initial time of forecast")),
            ),
            (
                "valid_time".to_string(),
                ArrayManifest::inline("<i8", vec![t], &["time"], encode_epoch_seconds(&valid))
                    .with_attr("units", json!(EPOCH_UNITS))
                    .with_attr("calendar", json!("proleptic_gregorian"))
                    .with_attr("standard_name", json!("time"))
                    .with_attr("long_name", json!("time")),
            ),
            (
                "step".to_string(),
                ArrayManifest::inline(
                    "<i8",
                    Vec::new(),
                    &[],
                    encode_i64(&[i64::from(self.options.forecast_hour)]),
                )
                .with_attr("units", json!("hours"))
                .with_attr("standard_name", json!("forecast_period"))
                .with_attr("long_name", json!("time since forecast_reference_time")),
            ),
        ];

        let ids: Vec<&str> = grid.members().iter().map(Member::as_str).collect();
        let (width, payload) = encode_fixed_unicode(&ids);
        out.push((
            "member".to_string(),
            ArrayManifest::inline(
                format!("<U{}", width),
                vec![ids.len() as u64],
                &["member"],
                payload,
            )
            .with_attr("long_name", json!("ensemble member")),
        ));

        for (name, array) in self.template.identical_dim_arrays() {
            let mut chunks = BTreeMap::new();
            for (raw_key, raw) in &array.chunks {
                let key: ChunkKey = raw_key.parse().map_err(|_| {
                    RefError::InvalidTemplate(format!("{}/{} is not a chunk key", name, raw_key))
                })?;
                let chunk = self.template.chunk_ref(name, &key, raw)?;
                chunks.insert(key, chunk);
            }
            out.push((
                name.to_string(),
                ArrayManifest {
                    zarray: array.zarray.clone(),
                    attrs: array.attrs.clone(),
                    chunks,
                },
            ));
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use test_utils::small_template_json;

    fn template() -> Arc<ReferenceTemplate> {
        Arc::new(ReferenceTemplate::from_json(&small_template_json(), "msl").unwrap())
    }

    fn grid(days: u32, members: &[&str]) -> CoordinateGrid {
        let times = (0..days)
            .map(|d| Utc.with_ymd_and_hms(2000, 1, 1 + d, 0, 0, 0).unwrap())
            .collect();
        CoordinateGrid::new(times, members.iter().map(|m| Member::from(*m)).collect()).unwrap()
    }

    fn reference(key: &SlotKey, offset: u64) -> FileReference {
        let template = template();
        let data = template.data_array();
        FileReference {
            entry: ReferenceEntry {
                chunk_key: ChunkKey::zeros(2),
                url: format!("s3://bucket/{}.grib2", key),
                offset,
                length: 100,
            },
            zarray: data.zarray.clone(),
            attrs: data.attrs.clone(),
            message_ordinal: 8,
            reference_time: key.time,
            forecast_hours: Some(24),
        }
    }

    fn assembler() -> ManifestAssembler {
        ManifestAssembler::new(template(), AssembleOptions::default())
    }

    #[test]
    fn test_counts_with_failures() {
        let grid = grid(2, &["c00", "p01"]);
        let mut results = HashMap::new();
        for (i, (_, key)) in grid.slots().enumerate() {
            let outcome = if i == 3 {
                Err(SlotError::malformed("bad line"))
            } else {
                Ok(reference(&key, i as u64 * 100))
            };
            results.insert(key, outcome);
        }

        let (manifest, gaps) = assembler().assemble(&grid, &results).unwrap();
        let data = manifest.data_array().unwrap();
        assert_eq!(data.chunks.len(), 4);
        assert_eq!(manifest.reference_count(), 3);
        assert_eq!(manifest.fill_count(), 1);
        assert_eq!(gaps.gaps.len(), 1);
        assert_eq!(gaps.gaps[0].member.as_str(), "p01");
        assert_eq!((gaps.gaps[0].time_index, gaps.gaps[0].member_index), (1, 1));
        assert!(gaps.missing_times.is_empty());

        let key: ChunkKey = "1.0.0.0".parse().unwrap();
        match &data.chunks[&key] {
            ChunkRef::Reference(entry) => assert_eq!(entry.offset, 200),
            other => panic!("unexpected chunk {:?}", other),
        }
    }

    #[test]
    fn test_data_array_metadata() {
        let grid = grid(3, &["c00", "p01"]);
        let (manifest, _) = assembler().assemble(&grid, &HashMap::new()).unwrap();
        let data = manifest.data_array().unwrap();
        assert_eq!(data.zarray.shape, vec![3, 2, 3, 4]);
        assert_eq!(data.zarray.chunks, vec![1, 1, 3, 4]);
        assert_eq!(data.zarray.fill_value, json!("NaN"));
        assert_eq!(data.zarray.dtype, "<f4");
        assert_eq!(
            data.attrs["_ARRAY_DIMENSIONS"],
            json!(["time", "member", "latitude", "longitude"])
        );
        assert_eq!(data.attrs["units"], "Pa");
    }

    #[test]
    fn test_absent_results_are_gaps() {
        let grid = grid(2, &["c00"]);
        let (manifest, gaps) = assembler().assemble(&grid, &HashMap::new()).unwrap();
        assert_eq!(manifest.fill_count(), 2);
        assert_eq!(gaps.gaps.len(), 2);
        assert_eq!(gaps.missing_times, grid.times().to_vec());
    }

    #[test]
    fn test_empty_grid() {
        let grid = CoordinateGrid::empty();
        let (manifest, gaps) = assembler().assemble(&grid, &HashMap::new()).unwrap();
        let data = manifest.data_array().unwrap();
        assert_eq!(data.zarray.shape, vec![0, 0, 3, 4]);
        assert!(data.chunks.is_empty());
        assert!(manifest.array("time").unwrap().chunks.is_empty());
        assert_eq!(gaps.total_slots, 0);
        assert!(gaps.is_empty());
    }

    #[test]
    fn test_empty_grid_required() {
        let assembler = ManifestAssembler::new(
            template(),
            AssembleOptions {
                require_slots: true,
                ..Default::default()
            },
        );
        let err = assembler
            .assemble(&CoordinateGrid::empty(), &HashMap::new())
            .unwrap_err();
        assert!(matches!(err, RefError::EmptyGrid));
    }

    #[test]
    fn test_ignores_results_outside_grid() {
        let grid = grid(1, &["c00"]);
        let stray = SlotKey::new(Utc.with_ymd_and_hms(2010, 1, 1, 0, 0, 0).unwrap(), "c00");
        let mut results = HashMap::new();
        results.insert(stray.clone(), Ok(reference(&stray, 0)));
        let (manifest, gaps) = assembler().assemble(&grid, &results).unwrap();
        assert_eq!(manifest.reference_count(), 0);
        assert_eq!(gaps.gaps.len(), 1);
    }

    #[test]
    fn test_coordinate_arrays() {
        let grid = grid(2, &["c00", "p01"]);
        let (manifest, _) = assembler().assemble(&grid, &HashMap::new()).unwrap();

        let names: Vec<&str> = manifest.arrays.keys().map(String::as_str).collect();
        assert_eq!(
            names,
            vec!["latitude", "longitude", "member", "msl", "step", "time", "valid_time"]
        );

        let member = manifest.array("member").unwrap();
        assert_eq!(member.zarray.dtype, "<U3");
        assert_eq!(member.zarray.shape, vec![2]);

        let valid = manifest.array("valid_time").unwrap();
        match &valid.chunks[&ChunkKey::zeros(1)] {
            ChunkRef::Inline(bytes) => {
                let first = i64::from_le_bytes(bytes[0..8].try_into().unwrap());
                assert_eq!(first, 946_684_800 + 24 * 3600);
            }
            other => panic!("unexpected chunk {:?}", other),
        }

        let step = manifest.array("step").unwrap();
        assert!(step.zarray.shape.is_empty());
        assert!(step.chunks.contains_key(&ChunkKey::scalar()));

        let latitude = manifest.array("latitude").unwrap();
        assert!(matches!(latitude.chunks[&ChunkKey::zeros(1)], ChunkRef::Inline(_)));
    }
}
