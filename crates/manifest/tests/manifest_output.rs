//! Integration tests: inventories through adapter and assembler to kerchunk JSON.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use grib_index::{parse_index, MessageSelector};
use manifest::{
    gaps_path, to_json_string, to_kerchunk, write_gaps, write_manifest, AssembleOptions,
    ManifestAssembler, ReferenceTemplate, TemplateAdapter,
};
use reference_common::{lookup_variable, CoordinateGrid, Member, SlotError};
use serde_json::Value;
use test_utils::{small_template_json, standard_file_size, standard_inventory, MESSAGE_SIZE};

fn template() -> Arc<ReferenceTemplate> {
    Arc::new(ReferenceTemplate::from_json(&small_template_json(), "msl").unwrap())
}

fn grid() -> CoordinateGrid {
    let times = (1..=2)
        .map(|d| Utc.with_ymd_and_hms(2000, 1, d, 0, 0, 0).unwrap())
        .collect();
    CoordinateGrid::new(times, vec![Member::from("c00"), Member::from("p01")]).unwrap()
}

fn build() -> (manifest::ConsolidatedManifest, manifest::GapsReport) {
    let template = template();
    let spec = lookup_variable("pres_msl").unwrap();
    let adapter = TemplateAdapter::new(template.clone(), MessageSelector::for_variable(&spec, 24));
    let assembler = ManifestAssembler::new(template, AssembleOptions::default());

    let grid = grid();
    let mut results = HashMap::new();
    for (pos, key) in grid.slots() {
        let outcome = if pos.time_index == 1 && pos.member_index == 1 {
            Err(SlotError::transport("s3://bucket/missing.idx", "not found"))
        } else {
            let init = key.time.format("%Y%m%d%H").to_string();
            let records = parse_index(&standard_inventory(&init, key.member.as_str())).unwrap();
            let url = format!("s3://bucket/pres_msl_{}_{}.grib2", init, key.member);
            adapter.adapt(&records, &url, standard_file_size())
        };
        results.insert(key, outcome);
    }
    assembler.assemble(&grid, &results).unwrap()
}

#[test]
fn test_kerchunk_document_layout() {
    let (manifest, gaps) = build();
    let doc = to_kerchunk(&manifest).unwrap();
    let refs = doc["refs"].as_object().unwrap();

    assert_eq!(doc["version"], 1);
    assert!(refs.contains_key(".zgroup"));

    let zarray: Value = serde_json::from_str(refs["msl/.zarray"].as_str().unwrap()).unwrap();
    assert_eq!(zarray["shape"], serde_json::json!([2, 2, 3, 4]));
    assert_eq!(zarray["fill_value"], "NaN");
    assert_eq!(zarray["filters"][0]["id"], "grib");

    let data_keys: Vec<&String> = refs
        .keys()
        .filter(|k| k.starts_with("msl/") && !k.contains("/."))
        .collect();
    assert_eq!(data_keys.len(), 3);
    assert!(!refs.contains_key("msl/1.1.0.0"));

    let chunk = refs["msl/0.1.0.0"].as_array().unwrap();
    assert_eq!(chunk[0], "s3://bucket/pres_msl_2000010100_p01.grib2");
    assert_eq!(chunk[1], 7 * MESSAGE_SIZE);
    assert_eq!(chunk[2], MESSAGE_SIZE);

    assert!(refs["time/0"].as_str().unwrap().starts_with("base64:"));
    assert!(refs.contains_key("step/0"));
    assert!(refs.contains_key("latitude/0"));

    assert_eq!(gaps.gaps.len(), 1);
    assert_eq!(gaps.gaps[0].member.as_str(), "p01");
}

#[test]
fn test_assembly_is_idempotent() {
    let (first, _) = build();
    let (second, _) = build();
    assert_eq!(to_json_string(&first).unwrap(), to_json_string(&second).unwrap());
}

#[test]
fn test_write_outputs() {
    let (manifest, gaps) = build();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("pres_msl.json");

    write_manifest(&manifest, &path).unwrap();
    write_gaps(&gaps, &gaps_path(&path)).unwrap();

    let written: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(written["version"], 1);

    let report: Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("nested/pres_msl.gaps.json")).unwrap())
            .unwrap();
    assert_eq!(report["total_slots"], 4);
    assert_eq!(report["filled_slots"], 3);
    assert_eq!(report["gaps"][0]["reason"]["kind"], "transport");
    assert_eq!(report["gaps"][0]["time"], "2000-01-02T00:00:00Z");
}

#[test]
fn test_shipped_template() {
    let path = test_utils::require_config_file!("templates/pres_msl.json");
    let template = ReferenceTemplate::load(&path, "msl").unwrap();
    assert_eq!(template.data_array().zarray.shape, vec![721, 1440]);

    let copied: Vec<&str> = template.identical_dim_arrays().map(|(n, _)| n).collect();
    assert_eq!(copied, vec!["latitude", "longitude"]);
}
