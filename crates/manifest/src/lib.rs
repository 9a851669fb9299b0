//! Consolidated reference manifests for reforecast archives.
//!
//! A [`ReferenceTemplate`] describes how one GRIB message decodes to a zarr
//! chunk. The [`TemplateAdapter`] re-points it at the message selected from
//! each file's inventory, and the [`ManifestAssembler`] merges those per-file
//! references over a (time, member) grid into one kerchunk document.
//!
//! ```text
//! IndexRecord[] ──► TemplateAdapter::adapt ──► FileReference
//!                                                   │
//!   CoordinateGrid ──► ManifestAssembler::assemble ◄┘
//!                              │
//!                              ├─► ConsolidatedManifest ──► kerchunk JSON
//!                              └─► GapsReport           ──► <stem>.gaps.json
//! ```

pub mod adapter;
pub mod assembler;
pub mod encoding;
pub mod kerchunk;
pub mod template;
pub mod zarr;

pub use adapter::{FileReference, ReferenceEntry, TemplateAdapter};
pub use assembler::{
    ArrayManifest, AssembleOptions, ChunkRef, ConsolidatedManifest, GapEntry, GapsReport,
    ManifestAssembler,
};
pub use kerchunk::{gaps_path, to_json_string, to_kerchunk, write_gaps, write_manifest};
pub use template::ReferenceTemplate;
pub use zarr::{ChunkKey, ZArray};
