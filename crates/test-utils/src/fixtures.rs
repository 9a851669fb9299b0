//! Common test fixtures for reforecast reference tests.
//!
//! Inventories mimic the GEFSv12 reforecast `.idx` files: one variable per
//! file, one message per 3-hourly forecast step.

use serde_json::json;

/// Size of each synthetic GRIB message in bytes.
pub const MESSAGE_SIZE: u64 = 523_144;

/// Number of messages in a synthetic inventory (3h..24h).
pub const MESSAGES_PER_FILE: usize = 8;

/// Offsets for `count` messages of uniform `size`, starting at `base`.
pub fn uniform_offsets(base: u64, count: usize, size: u64) -> Vec<u64> {
    (0..count as u64).map(|i| base + i * size).collect()
}

/// Inventory line ensemble tag for a member id.
fn ens_tag(member: &str) -> String {
    match member {
        "c00" => "ENS=low-res ctl".to_string(),
        m => match m.get(1..).and_then(|n| n.parse::<u32>().ok()) {
            Some(n) => format!("ENS=+{}", n),
            None => format!("ENS={}", m),
        },
    }
}

/// A PRMSL inventory with one 3-hourly message per offset.
///
/// `init` is the reference time as `YYYYMMDDHH`.
pub fn reforecast_inventory(init: &str, member: &str, offsets: &[u64]) -> String {
    offsets
        .iter()
        .enumerate()
        .map(|(i, off)| {
            format!(
                "{}:{}:d={}:PRMSL:mean sea level:{} hour fcst:{}\n",
                i + 1,
                off,
                init,
                (i + 1) * 3,
                ens_tag(member)
            )
        })
        .collect()
}

/// Standard inventory: [`MESSAGES_PER_FILE`] messages of [`MESSAGE_SIZE`].
pub fn standard_inventory(init: &str, member: &str) -> String {
    reforecast_inventory(
        init,
        member,
        &uniform_offsets(0, MESSAGES_PER_FILE, MESSAGE_SIZE),
    )
}

/// Total GRIB file size matching [`standard_inventory`].
pub fn standard_file_size() -> u64 {
    MESSAGE_SIZE * MESSAGES_PER_FILE as u64
}

/// A small kerchunk template for `msl` on a 3x4 global grid.
///
/// Structured like a GRIB scan of one message: group metadata, the data
/// variable with a single placeholder chunk, inline latitude/longitude and a
/// scalar `time` coordinate.
pub fn small_template_json() -> String {
    let refs = json!({
        ".zgroup": json!({"zarr_format": 2}).to_string(),
        ".zattrs": json!({
            "Conventions": "CF-1.7",
            "GRIB_centre": "kwbc",
            "GRIB_edition": 2,
        })
        .to_string(),
        "msl/.zarray": json!({
            "chunks": [3, 4],
            "compressor": null,
            "dtype": "<f4",
            "fill_value": 3.4028234663852886e38,
            "filters": [{"id": "grib", "var": "msl"}],
            "order": "C",
            "shape": [3, 4],
            "zarr_format": 2,
        })
        .to_string(),
        "msl/.zattrs": json!({
            "_ARRAY_DIMENSIONS": ["latitude", "longitude"],
            "GRIB_shortName": "prmsl",
            "long_name": "Pressure reduced to MSL",
            "units": "Pa",
        })
        .to_string(),
        "msl/0.0": ["{{u}}", 0, 0],
        "latitude/.zarray": json!({
            "chunks": [3],
            "compressor": null,
            "dtype": "<f8",
            "fill_value": null,
            "filters": null,
            "order": "C",
            "shape": [3],
            "zarr_format": 2,
        })
        .to_string(),
        "latitude/.zattrs": json!({
            "_ARRAY_DIMENSIONS": ["latitude"],
            "units": "degrees_north",
        })
        .to_string(),
        "latitude/0": "base64:AAAAAACAVkAAAAAAAAAAAAAAAAAAgFbA",
        "longitude/.zarray": json!({
            "chunks": [4],
            "compressor": null,
            "dtype": "<f8",
            "fill_value": null,
            "filters": null,
            "order": "C",
            "shape": [4],
            "zarr_format": 2,
        })
        .to_string(),
        "longitude/.zattrs": json!({
            "_ARRAY_DIMENSIONS": ["longitude"],
            "units": "degrees_east",
        })
        .to_string(),
        "longitude/0": "base64:AAAAAAAAAAAAAAAAAIBWQAAAAAAAgGZAAAAAAADgcEA=",
        "time/.zarray": json!({
            "chunks": [],
            "compressor": null,
            "dtype": "<i8",
            "fill_value": null,
            "filters": null,
            "order": "C",
            "shape": [],
            "zarr_format": 2,
        })
        .to_string(),
        "time/.zattrs": json!({
            "_ARRAY_DIMENSIONS": [],
            "units": "seconds since 1970-01-01T00:00:00",
        })
        .to_string(),
        "time/0": "base64:gENtOAAAAAA=",
    });

    json!({
        "version": 1,
        "refs": refs,
        "templates": {"u": "s3://noaa-gefs-retrospective/placeholder.grib2"},
    })
    .to_string()
}
